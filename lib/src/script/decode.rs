use std::io::Cursor;

use binrw::BinReaderExt;

use crate::error::ShuffleError;
use crate::script::op::{
    ActorOp, CursorOp, ExprTok, Instr, MatrixOp, Op, Operand, PrintOp, RoomOp, Script, StringOp,
    SystemOp, VerbOp, VerbRangeOp, WaitOp,
};
use crate::script::text::{read_text_tokens, TextToken};
use crate::script::var::VarRef;

/// The interpreter renumbers `actorOps` sub-opcodes through this table
/// before dispatch; input sub-opcodes run 1..=20.
const ACTOROPS_REMAP: [u8; 20] = [1, 0, 0, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 16, 17, 20];

struct Reader<'a> {
    cur: Cursor<&'a [u8]>,
}

impl<'a> Reader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self {
            cur: Cursor::new(data),
        }
    }

    fn pos(&self) -> u64 {
        self.cur.position()
    }

    fn at_end(&self) -> bool {
        self.cur.position() >= self.cur.get_ref().len() as u64
    }

    fn u8(&mut self) -> Result<u8, ShuffleError> {
        let at = self.pos();
        self.cur
            .read_le()
            .map_err(|e| ShuffleError::decode_at(at, format!("truncated instruction: {e}")))
    }

    fn i16(&mut self) -> Result<i16, ShuffleError> {
        let at = self.pos();
        self.cur
            .read_le()
            .map_err(|e| ShuffleError::decode_at(at, format!("truncated instruction: {e}")))
    }

    fn var(&mut self) -> Result<VarRef, ShuffleError> {
        VarRef::read(&mut self.cur)
    }

    /// Var reference when the source flag is set, otherwise a u8 immediate.
    fn byte_arg(&mut self, flag: bool) -> Result<Operand, ShuffleError> {
        if flag {
            Ok(Operand::Var(self.var()?))
        } else {
            Ok(Operand::Imm(self.u8()? as i32))
        }
    }

    /// Var reference when the source flag is set, otherwise an i16 immediate.
    fn word_arg(&mut self, flag: bool) -> Result<Operand, ShuffleError> {
        if flag {
            Ok(Operand::Var(self.var()?))
        } else {
            Ok(Operand::Imm(self.i16()? as i32))
        }
    }

    /// 0xFF-terminated variable argument list; each item carries its own
    /// source flag byte.
    fn vararg(&mut self) -> Result<Vec<Operand>, ShuffleError> {
        let mut result = Vec::new();
        loop {
            let test = self.u8()?;
            if test == 0xFF {
                return Ok(result);
            }
            result.push(self.word_arg(test & 0x80 != 0)?);
        }
    }

    fn text(&mut self) -> Result<Vec<TextToken>, ShuffleError> {
        read_text_tokens(&mut self.cur)
    }
}

fn parse_actorops(r: &mut Reader) -> Result<Vec<ActorOp>, ShuffleError> {
    let mut ops = Vec::new();
    let mut opcode = r.u8()?;
    while opcode != 0xFF {
        let low = opcode & 0x1F;
        if low == 0 || low > 20 {
            return Err(ShuffleError::decode_at(
                r.pos(),
                format!("actorOps sub-opcode 0x{low:02X} out of range"),
            ));
        }
        let remapped = (opcode & 0xE0) | ACTOROPS_REMAP[(low - 1) as usize];
        let a1 = remapped & 0x80 != 0;
        let a2 = remapped & 0x40 != 0;
        let a3 = remapped & 0x20 != 0;
        ops.push(match remapped & 0x1F {
            0x00 => ActorOp::Dummy(r.byte_arg(a1)?),
            0x01 => ActorOp::Costume(r.byte_arg(a1)?),
            0x02 => ActorOp::StepDist(r.byte_arg(a1)?, r.byte_arg(a2)?),
            0x03 => ActorOp::Sound(r.byte_arg(a1)?),
            0x04 => ActorOp::WalkAnimation(r.byte_arg(a1)?),
            0x05 => ActorOp::TalkAnimation(r.byte_arg(a1)?, r.byte_arg(a2)?),
            0x06 => ActorOp::StandAnimation(r.byte_arg(a1)?),
            0x07 => ActorOp::Animation(r.byte_arg(a1)?, r.byte_arg(a2)?, r.byte_arg(a3)?),
            0x08 => ActorOp::Default,
            0x09 => ActorOp::Elevation(r.word_arg(a1)?),
            0x0A => ActorOp::AnimationDefault,
            0x0B => ActorOp::Palette(r.byte_arg(a1)?, r.byte_arg(a2)?),
            0x0C => ActorOp::TalkColor(r.byte_arg(a1)?),
            0x0D => ActorOp::Name(r.text()?),
            0x0E => ActorOp::InitAnimation(r.byte_arg(a1)?),
            0x10 => ActorOp::Width(r.byte_arg(a1)?),
            0x11 => ActorOp::Scale(r.byte_arg(a1)?),
            0x12 => ActorOp::NeverZClip,
            0x13 => ActorOp::AlwaysZClip(r.byte_arg(a1)?),
            0x14 => ActorOp::IgnoreBoxes,
            0x15 => ActorOp::FollowBoxes,
            0x16 => ActorOp::AnimationSpeed(r.byte_arg(a1)?),
            0x17 => ActorOp::Shadow(r.byte_arg(a1)?),
            _ => ActorOp::Unknown,
        });
        opcode = r.u8()?;
    }
    Ok(ops)
}

fn parse_print_ops(r: &mut Reader) -> Result<Vec<PrintOp>, ShuffleError> {
    let mut ops = Vec::new();
    loop {
        let opcode = r.u8()?;
        if opcode == 0xFF {
            return Ok(ops);
        }
        let a1 = opcode & 0x80 != 0;
        let a2 = opcode & 0x40 != 0;
        ops.push(match opcode & 0x0F {
            0x00 => PrintOp::At(r.word_arg(a1)?, r.word_arg(a2)?),
            0x01 => PrintOp::Color(r.byte_arg(a1)?),
            0x02 => PrintOp::Clipped(r.word_arg(a1)?),
            0x03 => PrintOp::Erase(r.word_arg(a1)?, r.word_arg(a2)?),
            0x04 => PrintOp::Center,
            0x06 => PrintOp::Left,
            0x07 => PrintOp::Overhead,
            0x08 => PrintOp::SayVoice(r.word_arg(a1)?, r.word_arg(a2)?),
            0x0F => {
                // A text entry is the last op; no 0xFF sentinel follows.
                ops.push(PrintOp::Text(r.text()?));
                return Ok(ops);
            }
            _ => PrintOp::Unknown,
        });
    }
}

fn parse_verbops(r: &mut Reader) -> Result<Vec<VerbOp>, ShuffleError> {
    let mut ops = Vec::new();
    loop {
        let opcode = r.u8()?;
        if opcode == 0xFF {
            return Ok(ops);
        }
        let a1 = opcode & 0x80 != 0;
        let a2 = opcode & 0x40 != 0;
        ops.push(match opcode & 0x1F {
            1 => VerbOp::Image(r.word_arg(a1)?),
            2 => VerbOp::Name(r.text()?),
            3 => VerbOp::Color(r.byte_arg(a1)?),
            4 => VerbOp::HiColor(r.byte_arg(a1)?),
            5 => VerbOp::At(r.word_arg(a1)?, r.word_arg(a2)?),
            6 => VerbOp::On,
            7 => VerbOp::Off,
            8 => VerbOp::Delete,
            9 => VerbOp::New,
            16 => VerbOp::DimColor(r.byte_arg(a1)?),
            17 => VerbOp::Dim,
            18 => VerbOp::Key(r.byte_arg(a1)?),
            19 => VerbOp::Center,
            20 => VerbOp::NameStr(r.word_arg(a1)?),
            22 => VerbOp::AssignObject(r.word_arg(a1)?, r.byte_arg(a2)?),
            23 => VerbOp::BackColor(r.byte_arg(a1)?),
            _ => VerbOp::Unknown,
        });
    }
}

fn parse_stringops(r: &mut Reader) -> Result<StringOp, ShuffleError> {
    let opcode = r.u8()?;
    let a1 = opcode & 0x80 != 0;
    let a2 = opcode & 0x40 != 0;
    let a3 = opcode & 0x20 != 0;
    Ok(match opcode & 0x1F {
        1 => StringOp::LoadString {
            index: r.byte_arg(a1)?,
            string: r.text()?,
        },
        2 => StringOp::CopyString {
            a: r.byte_arg(a1)?,
            b: r.byte_arg(a2)?,
        },
        3 => StringOp::SetStringChar {
            a: r.byte_arg(a1)?,
            b: r.byte_arg(a2)?,
            c: r.byte_arg(a3)?,
        },
        4 => StringOp::GetStringChar {
            target: r.var()?,
            a: r.byte_arg(a1)?,
            b: r.byte_arg(a2)?,
        },
        5 => StringOp::CreateString {
            a: r.byte_arg(a1)?,
            b: r.byte_arg(a2)?,
        },
        _ => StringOp::Unknown,
    })
}

fn parse_cursorcommand(r: &mut Reader) -> Result<CursorOp, ShuffleError> {
    let opcode = r.u8()?;
    let a1 = opcode & 0x80 != 0;
    let a2 = opcode & 0x40 != 0;
    let a3 = opcode & 0x20 != 0;
    Ok(match opcode & 0x1F {
        1 => CursorOp::CursorOn,
        2 => CursorOp::CursorOff,
        3 => CursorOp::UserputOn,
        4 => CursorOp::UserputOff,
        5 => CursorOp::CursorSoftOn,
        6 => CursorOp::CursorSoftOff,
        7 => CursorOp::UserputSoftOn,
        8 => CursorOp::UserputSoftOff,
        10 => CursorOp::CursorImage(r.byte_arg(a1)?, r.byte_arg(a2)?),
        11 => CursorOp::CursorHotspot(r.byte_arg(a1)?, r.byte_arg(a2)?, r.byte_arg(a3)?),
        12 => CursorOp::CursorSet(r.byte_arg(a1)?),
        13 => CursorOp::CharsetSet(r.byte_arg(a1)?),
        14 => CursorOp::CharsetColors(r.vararg()?),
        _ => CursorOp::Unknown,
    })
}

fn parse_matrixops(r: &mut Reader) -> Result<MatrixOp, ShuffleError> {
    let opcode = r.u8()?;
    let a1 = opcode & 0x80 != 0;
    let a2 = opcode & 0x40 != 0;
    Ok(match opcode & 0x1F {
        1 => MatrixOp::SetBoxFlags(r.byte_arg(a1)?, r.byte_arg(a2)?),
        2 => MatrixOp::SetBoxScale(r.byte_arg(a1)?, r.byte_arg(a2)?),
        3 => MatrixOp::SetBoxScaleAlt(r.byte_arg(a1)?, r.byte_arg(a2)?),
        4 => MatrixOp::CreateBoxMatrix,
        _ => MatrixOp::Unknown,
    })
}

// Only the high bit selects indirection here; the interpreter never uses
// the 0x40/0x20 flags on roomOps arguments.
fn parse_roomops(r: &mut Reader) -> Result<RoomOp, ShuffleError> {
    let opcode = r.u8()?;
    let a1 = opcode & 0x80 != 0;
    Ok(match opcode & 0x1F {
        1 => RoomOp::Scroll(r.word_arg(a1)?, r.word_arg(a1)?),
        2 => RoomOp::Color(r.word_arg(a1)?, r.word_arg(a1)?),
        3 => RoomOp::Screen(r.word_arg(a1)?, r.word_arg(a1)?),
        4 => RoomOp::Palette(r.word_arg(a1)?, r.word_arg(a1)?),
        5 => RoomOp::ShakeOn,
        6 => RoomOp::ShakeOff,
        7 => {
            let a = r.byte_arg(a1)?;
            let b = r.byte_arg(a1)?;
            let next = r.u8()?;
            let c = r.byte_arg(next & 0x80 != 0)?;
            let d = r.byte_arg(next & 0x40 != 0)?;
            let last = r.u8()?;
            let e = r.byte_arg(last & 0x40 != 0)?;
            RoomOp::Scale(a, b, c, d, e)
        }
        8 => RoomOp::Intensity(r.byte_arg(a1)?, r.byte_arg(a1)?, r.byte_arg(a1)?),
        9 => RoomOp::SaveGame(r.byte_arg(a1)?, r.byte_arg(a1)?),
        10 => RoomOp::Fade(r.word_arg(a1)?),
        11 => {
            let a = r.byte_arg(a1)?;
            let b = r.byte_arg(a1)?;
            let c = r.byte_arg(a1)?;
            let next = r.u8()?;
            let d = r.byte_arg(next & 0x80 != 0)?;
            let e = r.byte_arg(next & 0x40 != 0)?;
            RoomOp::RgbIntensity(a, b, c, d, e)
        }
        12 => {
            let a = r.byte_arg(a1)?;
            let b = r.byte_arg(a1)?;
            let c = r.byte_arg(a1)?;
            let next = r.u8()?;
            let d = r.byte_arg(next & 0x80 != 0)?;
            let e = r.byte_arg(next & 0x40 != 0)?;
            RoomOp::Shadow(a, b, c, d, e)
        }
        13 => RoomOp::SaveString,
        14 => RoomOp::LoadString,
        15 => {
            let a = r.byte_arg(a1)?;
            let next = r.u8()?;
            let b = r.byte_arg(next & 0x80 != 0)?;
            let c = r.byte_arg(next & 0x40 != 0)?;
            let last = r.u8()?;
            let d = r.byte_arg(last & 0x80 != 0)?;
            RoomOp::Transform(a, b, c, d)
        }
        16 => RoomOp::CycleSpeed(r.byte_arg(a1)?, r.byte_arg(a1)?),
        _ => RoomOp::Unknown,
    })
}

fn parse_systemops(r: &mut Reader) -> Result<SystemOp, ShuffleError> {
    Ok(match r.u8()? {
        1 => SystemOp::Restart,
        2 => SystemOp::Pause,
        3 => SystemOp::Quit,
        _ => SystemOp::Unknown,
    })
}

fn parse_saverestoreverbs(r: &mut Reader) -> Result<Op, ShuffleError> {
    let opcode = r.u8()?;
    let verb_start = r.byte_arg(opcode & 0x80 != 0)?;
    let verb_end = r.byte_arg(opcode & 0x40 != 0)?;
    let save_id = r.byte_arg(opcode & 0x20 != 0)?;
    let op = match opcode & 0x1F {
        1 => VerbRangeOp::Save,
        2 => VerbRangeOp::Restore,
        3 => VerbRangeOp::Delete,
        _ => VerbRangeOp::Unknown,
    };
    Ok(Op::SaveRestoreVerbs {
        op,
        verb_start,
        verb_end,
        save_id,
    })
}

fn parse_wait(r: &mut Reader) -> Result<WaitOp, ShuffleError> {
    let opcode = r.u8()?;
    let a1 = opcode & 0x80 != 0;
    Ok(match opcode & 0x1F {
        1 => WaitOp::ForActor(r.byte_arg(a1)?),
        2 => WaitOp::ForMessage,
        3 => WaitOp::ForCamera,
        4 => WaitOp::ForSentence,
        _ => WaitOp::Unknown,
    })
}

fn parse_expression(r: &mut Reader) -> Result<Vec<ExprTok>, ShuffleError> {
    let mut expr = Vec::new();
    loop {
        let opcode = r.u8()?;
        if opcode == 0xFF {
            return Ok(expr);
        }
        let a1 = opcode & 0x80 != 0;
        expr.push(match opcode & 0x1F {
            1 => ExprTok::Operand(r.word_arg(a1)?),
            2 => ExprTok::Add,
            3 => ExprTok::Sub,
            4 => ExprTok::Mul,
            5 => ExprTok::Div,
            6 => {
                let instr = decode_instr(r)?.ok_or_else(|| {
                    ShuffleError::decode_at(r.pos(), "truncated nested expression instruction")
                })?;
                ExprTok::Instr(Box::new(instr))
            }
            other => {
                return Err(ShuffleError::decode_at(
                    r.pos(),
                    format!("unknown expression token {other}"),
                ))
            }
        });
    }
}

fn decode_instr(r: &mut Reader) -> Result<Option<Instr>, ShuffleError> {
    let start = r.pos();
    if r.at_end() {
        return Ok(None);
    }
    let opcode = r.u8()?;
    let a1 = opcode & 0x80 != 0;
    let a2 = opcode & 0x40 != 0;
    let a3 = opcode & 0x20 != 0;

    let op = match opcode {
        0x00 | 0xA0 => Op::StopObjectCode,
        0x01 | 0x21 | 0x41 | 0x61 | 0x81 | 0xA1 | 0xC1 | 0xE1 => Op::PutActor {
            act: r.byte_arg(a1)?,
            x: r.word_arg(a2)?,
            y: r.word_arg(a3)?,
        },
        0x02 | 0x82 => Op::StartMusic {
            cmd: r.byte_arg(a1)?,
        },
        0x03 | 0x83 => Op::GetActorRoom {
            target: r.var()?,
            act: r.byte_arg(a1)?,
        },
        0x04 | 0x84 => Op::IsGreaterEqual {
            a: r.var()?,
            b: r.word_arg(a1)?,
            offset: r.i16()?,
        },
        0x05 | 0x25 | 0x45 | 0x65 | 0x85 | 0xA5 | 0xC5 | 0xE5 => Op::DrawObject {
            obj: r.word_arg(a1)?,
            x: r.word_arg(a2)?,
            y: r.word_arg(a3)?,
        },
        0x06 | 0x86 => Op::GetActorElevation {
            target: r.var()?,
            act: r.byte_arg(a1)?,
        },
        0x07 | 0x47 | 0x87 | 0xC7 => Op::SetState {
            obj: r.word_arg(a1)?,
            state: r.byte_arg(a2)?,
        },
        0x08 | 0x88 => Op::IsNotEqual {
            a: r.var()?,
            b: r.word_arg(a1)?,
            offset: r.i16()?,
        },
        0x09 | 0x49 | 0x89 | 0xC9 => Op::FaceActor {
            act: r.byte_arg(a1)?,
            obj: r.word_arg(a2)?,
        },
        0x0A | 0x2A | 0x4A | 0x6A | 0x8A | 0xAA | 0xCA | 0xEA => Op::StartScript {
            script: r.byte_arg(a1)?,
            args: r.vararg()?,
            recursive: a2,
            freeze_resistant: a3,
        },
        0x0B | 0x4B | 0x8B | 0xCB => Op::GetVerbEntrypoint {
            obj: r.word_arg(a1)?,
            entry: r.word_arg(a2)?,
        },
        0x0C | 0x8C => {
            let opr = r.u8()?;
            let ra1 = opr & 0x80 != 0;
            let ra2 = opr & 0x40 != 0;
            let sub = opr & 0x3F;
            let resid = if sub != 17 {
                Some(r.byte_arg(ra1)?)
            } else {
                None
            };
            let (resid2, resid3) = match sub {
                20 => (Some(r.word_arg(ra2)?), None),
                36 => (Some(r.word_arg(ra2)?), Some(Operand::Imm(r.u8()? as i32))),
                37 => (None, Some(r.byte_arg(ra2)?)),
                _ => (None, None),
            };
            Op::ResourceRoutines {
                op: sub,
                resid,
                resid2,
                resid3,
            }
        }
        0x0D | 0x4D | 0x8D | 0xCD => Op::WalkActorToActor {
            nr: r.byte_arg(a1)?,
            nr2: r.byte_arg(a2)?,
            dist: r.u8()?,
        },
        0x0E | 0x4E | 0x8E | 0xCE => Op::PutActorAtObject {
            act: r.byte_arg(a1)?,
            obj: r.word_arg(a2)?,
        },
        // The interpreter also reads this opcode as getObjectState in a
        // different engine revision; the ifState shape is the V4 one.
        0x0F | 0x4F | 0x8F | 0xCF => Op::IfState {
            obj: r.word_arg(a1)?,
            val: r.byte_arg(a2)?,
            offset: r.i16()?,
        },
        0x10 | 0x90 => Op::GetObjectOwner {
            target: r.var()?,
            obj: r.word_arg(a1)?,
        },
        0x11 | 0x51 | 0x91 | 0xD1 => Op::AnimateActor {
            act: r.byte_arg(a1)?,
            anim: r.byte_arg(a2)?,
        },
        0x12 | 0x92 => Op::PanCameraTo {
            x: r.word_arg(a1)?,
        },
        0x13 | 0x53 | 0x93 | 0xD3 => Op::ActorOps {
            act: r.byte_arg(a1)?,
            ops: parse_actorops(r)?,
        },
        0x14 | 0x94 => Op::Print {
            act: r.byte_arg(a1)?,
            ops: parse_print_ops(r)?,
        },
        0x15 | 0x55 | 0x95 | 0xD5 => Op::ActorFromPos {
            target: r.var()?,
            x: r.word_arg(a1)?,
            y: r.word_arg(a2)?,
        },
        0x16 | 0x96 => Op::GetRandomNr {
            target: r.var()?,
            max: r.byte_arg(a1)?,
        },
        0x17 | 0x97 => Op::And {
            target: r.var()?,
            a: r.word_arg(a1)?,
        },
        0x18 => Op::JumpRelative { offset: r.i16()? },
        0x19 | 0x39 | 0x59 | 0x79 | 0x99 | 0xB9 | 0xD9 | 0xF9 => {
            let verb = r.byte_arg(a1)?;
            let (obj_a, obj_b) = if verb == Operand::Imm(0xFE) {
                (None, None)
            } else {
                (Some(r.word_arg(a2)?), Some(r.word_arg(a3)?))
            };
            Op::DoSentence { verb, obj_a, obj_b }
        }
        0x1A | 0x9A => Op::Move {
            target: r.var()?,
            value: r.word_arg(a1)?,
        },
        0x1B | 0x9B => Op::Multiply {
            target: r.var()?,
            a: r.word_arg(a1)?,
        },
        0x1C | 0x9C => Op::StartSound {
            sound: r.byte_arg(a1)?,
        },
        0x1D | 0x9D => {
            let obj = r.word_arg(a1)?;
            let mut classes = Vec::new();
            loop {
                let test = r.u8()?;
                if test == 0xFF {
                    break;
                }
                classes.push(r.word_arg(test & 0x80 != 0)?);
            }
            Op::IfClassOfIs {
                obj,
                classes,
                offset: r.i16()?,
            }
        }
        0x1E | 0x3E | 0x5E | 0x7E | 0x9E | 0xBE | 0xDE | 0xFE => Op::WalkActorTo {
            act: r.byte_arg(a1)?,
            x: r.word_arg(a2)?,
            y: r.word_arg(a3)?,
        },
        0x1F | 0x5F | 0x9F | 0xDF => Op::IsActorInBox {
            act: r.byte_arg(a1)?,
            box_id: r.byte_arg(a2)?,
            offset: r.i16()?,
        },
        0x20 => Op::StopMusic,
        0x22 | 0xA2 => Op::SaveLoadGame {
            target: r.var()?,
            op: r.byte_arg(a1)?,
        },
        0x23 | 0xA3 => Op::GetActorY {
            target: r.var()?,
            act: r.word_arg(a1)?,
        },
        0x24 | 0x64 | 0xA4 | 0xE4 => Op::LoadRoomWithEgo {
            obj: r.word_arg(a1)?,
            room: r.byte_arg(a2)?,
            x: r.i16()?,
            y: r.i16()?,
        },
        0x26 | 0xA6 => {
            let target = r.var()?;
            let count = r.u8()?;
            let mut values = Vec::with_capacity(count as usize);
            for _ in 0..count {
                values.push(if a1 {
                    r.i16()? as i32
                } else {
                    r.u8()? as i32
                });
            }
            Op::SetVarRange {
                target,
                values,
                use_words: a1,
            }
        }
        0x27 => Op::StringOps(parse_stringops(r)?),
        0x28 => Op::EqualZero {
            a: r.var()?,
            offset: r.i16()?,
        },
        0x29 | 0x69 | 0xA9 | 0xE9 => Op::SetOwner {
            obj: r.word_arg(a1)?,
            owner: r.byte_arg(a2)?,
        },
        0x2B => Op::DelayVariable { var: r.var()? },
        0x2C => Op::CursorCommand(parse_cursorcommand(r)?),
        0x2D | 0x6D | 0xAD | 0xED => Op::PutActorInRoom {
            act: r.byte_arg(a1)?,
            room: r.byte_arg(a2)?,
        },
        0x2E => {
            let mut delay = r.u8()? as u32;
            delay |= (r.u8()? as u32) << 8;
            delay |= (r.u8()? as u32) << 16;
            Op::Delay { delay }
        }
        0x2F | 0x6F | 0xAF | 0xEF => Op::IfNotState {
            obj: r.word_arg(a1)?,
            val: r.byte_arg(a2)?,
            offset: r.i16()?,
        },
        0x30 | 0xB0 => Op::MatrixOps(parse_matrixops(r)?),
        0x31 | 0xB1 => Op::GetInventoryCount {
            target: r.var()?,
            owner: r.byte_arg(a1)?,
        },
        0x32 | 0xB2 => Op::SetCameraAt {
            x_pos: r.word_arg(a1)?,
        },
        0x33 | 0x73 | 0xB3 | 0xF3 => Op::RoomOps(parse_roomops(r)?),
        0x34 | 0x74 | 0xB4 | 0xF4 => Op::GetDist {
            target: r.var()?,
            obj_a: r.word_arg(a1)?,
            obj_b: r.word_arg(a2)?,
        },
        0x35 | 0x75 | 0xB5 | 0xF5 => Op::FindObject {
            target: r.var()?,
            x: r.byte_arg(a1)?,
            y: r.byte_arg(a2)?,
        },
        0x36 | 0x76 | 0xB6 | 0xF6 => Op::WalkActorToObject {
            act: r.byte_arg(a1)?,
            obj: r.word_arg(a2)?,
        },
        0x37 | 0x77 | 0xB7 | 0xF7 => Op::StartObject {
            obj: r.word_arg(a1)?,
            script: r.byte_arg(a2)?,
            args: r.vararg()?,
        },
        0x38 | 0xB8 => Op::IsLessEqual {
            a: r.var()?,
            b: r.word_arg(a1)?,
            offset: r.i16()?,
        },
        0x3A | 0xBA => Op::Subtract {
            target: r.var()?,
            a: r.word_arg(a1)?,
        },
        0x3B | 0xBB => Op::GetActorScale {
            act: r.byte_arg(a1)?,
        },
        0x3C | 0xBC => Op::StopSound {
            sound: r.byte_arg(a1)?,
        },
        0x3D | 0x7D | 0xBD | 0xFD => Op::FindInventory {
            target: r.var()?,
            x: r.byte_arg(a1)?,
            y: r.byte_arg(a2)?,
        },
        0x3F | 0x7F | 0xBF | 0xFF => {
            let x = r.word_arg(a1)?;
            let y = r.word_arg(a2)?;
            let next = r.u8()?;
            Op::DrawBox {
                x,
                y,
                x2: r.word_arg(next & 0x80 != 0)?,
                y2: r.word_arg(next & 0x40 != 0)?,
                color: r.byte_arg(next & 0x20 != 0)?,
            }
        }
        0x40 => Op::Cutscene { args: r.vararg()? },
        0x42 | 0xC2 => Op::ChainScript {
            script: r.byte_arg(a1)?,
            args: r.vararg()?,
        },
        0x43 | 0xC3 => Op::GetActorX {
            target: r.var()?,
            act: r.word_arg(a1)?,
        },
        0x44 | 0xC4 => Op::IsLess {
            a: r.var()?,
            b: r.word_arg(a1)?,
            offset: r.i16()?,
        },
        0x46 => Op::Increment { target: r.var()? },
        0x48 | 0xC8 => Op::IsEqual {
            a: r.var()?,
            b: r.word_arg(a1)?,
            offset: r.i16()?,
        },
        0x50 | 0xD0 => Op::PickupObject {
            obj: r.word_arg(a1)?,
        },
        0x52 | 0xD2 => Op::ActorFollowCamera {
            act: r.byte_arg(a1)?,
        },
        0x54 | 0xD4 => Op::SetObjectName {
            obj: r.word_arg(a1)?,
            name: r.text()?,
        },
        0x56 | 0xD6 => Op::GetActorMoving {
            target: r.var()?,
            act: r.byte_arg(a1)?,
        },
        0x57 | 0xD7 => Op::Or {
            target: r.var()?,
            a: r.word_arg(a1)?,
        },
        0x58 => {
            if r.u8()? != 0 {
                Op::BeginOverride
            } else {
                Op::EndOverride
            }
        }
        0x5A | 0xDA => Op::Add {
            target: r.var()?,
            a: r.word_arg(a1)?,
        },
        0x5B | 0xDB => Op::Divide {
            target: r.var()?,
            a: r.word_arg(a1)?,
        },
        0x5C | 0xDC => {
            let sub = r.u8()?;
            let effect = if sub & 0x1F == 3 {
                Some(r.word_arg(sub & 0x80 != 0)?)
            } else {
                None
            };
            Op::OldRoomEffect { op: sub, effect }
        }
        0x5D | 0xDD => Op::SetClass {
            obj: r.word_arg(a1)?,
            cls: r.vararg()?,
        },
        0x60 | 0xE0 => Op::FreezeScripts {
            scr: r.byte_arg(a1)?,
        },
        0x62 | 0xE2 => Op::StopScript {
            idx: r.byte_arg(a1)?,
        },
        0x63 | 0xE3 => Op::GetActorFacing {
            target: r.var()?,
            act: r.byte_arg(a1)?,
        },
        0x68 | 0xE8 => Op::IsScriptRunning {
            target: r.var()?,
            idx: r.byte_arg(a1)?,
        },
        0x6C | 0xEC => Op::GetActorWidth {
            target: r.var()?,
            act: r.byte_arg(a1)?,
        },
        0x70 | 0xF0 => Op::Lights {
            lights: r.byte_arg(a1)?,
            x_strips: r.u8()?,
            y_strips: r.u8()?,
        },
        0x71 | 0xF1 => Op::GetActorCostume {
            target: r.var()?,
            act: r.byte_arg(a1)?,
        },
        0x72 | 0xF2 => Op::LoadRoom {
            room: r.byte_arg(a1)?,
        },
        0x78 | 0xF8 => Op::IsGreater {
            a: r.var()?,
            b: r.word_arg(a1)?,
            offset: r.i16()?,
        },
        0x7A | 0xFA => Op::VerbOps {
            verb: r.byte_arg(a1)?,
            ops: parse_verbops(r)?,
        },
        0x7B | 0xFB => Op::GetActorWalkBox {
            target: r.var()?,
            act: r.byte_arg(a1)?,
        },
        0x7C | 0xFC => Op::IsSoundRunning {
            target: r.var()?,
            snd: r.byte_arg(a1)?,
        },
        0x80 => Op::BreakHere,
        0x98 => Op::SystemOps(parse_systemops(r)?),
        0xA8 => Op::NotEqualZero {
            a: r.var()?,
            offset: r.i16()?,
        },
        0xAB => parse_saverestoreverbs(r)?,
        0xAC => Op::Expression {
            target: r.var()?,
            expr: parse_expression(r)?,
        },
        0xAE => Op::Wait(parse_wait(r)?),
        0xC0 => Op::EndCutscene,
        0xC6 => Op::Decrement { target: r.var()? },
        0xCC => {
            let val = r.u8()?;
            let mut sources = Vec::new();
            loop {
                let src = r.u8()?;
                if src == 0 {
                    break;
                }
                sources.push(src);
            }
            Op::PseudoRoom { val, sources }
        }
        0xD8 => Op::PrintEgo {
            ops: parse_print_ops(r)?,
        },
        other => Op::Unknown { opcode: other },
    };

    let end = r.pos();
    let raw = r.cur.get_ref()[start as usize..end as usize].to_vec();
    Ok(Some(Instr { opcode, op, raw }))
}

/// Disassembles one script body. `whole` runs to the end of the buffer
/// (global/local/entry/exit scripts); otherwise decoding stops after the
/// first `stopObjectCode`, which is how object verb code is bounded.
pub fn decode_script(data: &[u8], start: usize, whole: bool) -> Result<Script, ShuffleError> {
    let mut r = Reader::new(data);
    if start > data.len() {
        return Err(ShuffleError::decode_at(
            data.len() as u64,
            format!("script start offset 0x{start:X} beyond end of code"),
        ));
    }
    r.cur.set_position(start as u64);
    let mut result = Vec::new();
    loop {
        let ptr = r.pos() as usize;
        let Some(instr) = decode_instr(&mut r)? else {
            break;
        };
        let stop = !whole && matches!(instr.op, Op::StopObjectCode);
        result.push((ptr, instr));
        if stop {
            break;
        }
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn move_immediate() {
        // move VAR[19] <- 6
        let bytes = [0x1A, 0x13, 0x00, 0x06, 0x00];
        let script = decode_script(&bytes, 0, true).unwrap();
        assert_eq!(script.len(), 1);
        let (off, instr) = &script[0];
        assert_eq!(*off, 0);
        assert_eq!(instr.raw, bytes);
        assert_eq!(
            instr.op,
            Op::Move {
                target: VarRef::new(19),
                value: Operand::Imm(6),
            }
        );
    }

    #[test]
    fn move_variable_source() {
        // move VAR[4] <- VAR[1], high bit selects the var form
        let bytes = [0x9A, 0x04, 0x00, 0x01, 0x00];
        let script = decode_script(&bytes, 0, true).unwrap();
        assert_eq!(
            script[0].1.op,
            Op::Move {
                target: VarRef::new(4),
                value: Operand::Var(VarRef::new(1)),
            }
        );
    }

    #[test]
    fn is_equal_records_branch() {
        // isEqual VAR[101] == 38 else skip 9
        let bytes = [0x48, 0x65, 0x00, 0x26, 0x00, 0x09, 0x00];
        let script = decode_script(&bytes, 0, true).unwrap();
        assert_eq!(
            script[0].1.op,
            Op::IsEqual {
                a: VarRef::new(101),
                b: Operand::Imm(38),
                offset: 9,
            }
        );
        assert_eq!(script[0].1.op.branch_offset(), Some(9));
    }

    #[test]
    fn load_room_with_ego() {
        let bytes = [0x24, 0x55, 0x01, 0x21, 0x40, 0x00, 0x50, 0x00];
        let script = decode_script(&bytes, 0, true).unwrap();
        assert_eq!(
            script[0].1.op,
            Op::LoadRoomWithEgo {
                obj: Operand::Imm(0x155),
                room: Operand::Imm(0x21),
                x: 0x40,
                y: 0x50,
            }
        );
        assert_eq!(script[0].1.op.room_target(), Some(0x21));
    }

    #[test]
    fn put_actor_in_room_targets_ego() {
        // act is a var ref to VAR_EGO, room is an immediate
        let bytes = [0xAD, 0x01, 0x00, 0x1C];
        let script = decode_script(&bytes, 0, true).unwrap();
        assert_eq!(script[0].1.op.room_target(), Some(0x1C));
    }

    #[test]
    fn start_script_with_args() {
        // startScript 152(17, VAR[3])
        let bytes = [
            0x0A, 0x98, 0x00, 0x11, 0x00, 0x80, 0x03, 0x00, 0xFF,
        ];
        let script = decode_script(&bytes, 0, true).unwrap();
        assert_eq!(
            script[0].1.op,
            Op::StartScript {
                script: Operand::Imm(152),
                args: vec![Operand::Imm(17), Operand::Var(VarRef::new(3))],
                recursive: false,
                freeze_resistant: false,
            }
        );
        assert_eq!(script[0].1.raw.len(), bytes.len());
    }

    #[test]
    fn print_with_text() {
        // printEgo with a single text op
        let bytes = [0xD8, 0x0F, b'h', b'i', 0x00];
        let script = decode_script(&bytes, 0, true).unwrap();
        match &script[0].1.op {
            Op::PrintEgo { ops } => {
                assert_eq!(ops.len(), 1);
                assert_eq!(ops[0], PrintOp::Text(vec![TextToken::Text(b"hi".to_vec())]));
            }
            other => panic!("unexpected op {other:?}"),
        }
    }

    #[test]
    fn string_ops_load_string() {
        let bytes = [0x27, 0x01, 0x18, b'a', b'r', b'r', 0x00];
        let script = decode_script(&bytes, 0, true).unwrap();
        assert_eq!(
            script[0].1.op,
            Op::StringOps(StringOp::LoadString {
                index: Operand::Imm(0x18),
                string: vec![TextToken::Text(b"arr".to_vec())],
            })
        );
    }

    #[test]
    fn verb_script_stops_after_object_end() {
        let bytes = [
            0x18, 0x00, 0x00, // jumpRelative +0
            0x00, // stopObjectCode
            0x80, // breakHere, belongs to the next event
        ];
        let script = decode_script(&bytes, 0, false).unwrap();
        assert_eq!(script.len(), 2);
        assert!(matches!(script[1].1.op, Op::StopObjectCode));
    }

    #[test]
    fn offsets_follow_instruction_sizes() {
        let bytes = [
            0x18, 0x02, 0x00, // 0000 jumpRelative +2
            0x80, // 0003 breakHere
            0x80, // 0004 breakHere
            0x00, // 0005 stopObjectCode
        ];
        let script = decode_script(&bytes, 0, true).unwrap();
        let offsets: Vec<usize> = script.iter().map(|(o, _)| *o).collect();
        assert_eq!(offsets, vec![0, 3, 4, 5]);
    }

    #[test]
    fn truncated_instruction_is_fatal() {
        let bytes = [0x1A, 0x13]; // move missing its operand
        let err = decode_script(&bytes, 0, true).unwrap_err();
        assert!(matches!(err, ShuffleError::Decode { .. }));
    }

    #[test]
    fn unknown_opcode_consumes_one_byte() {
        let bytes = [0x67, 0x00];
        let script = decode_script(&bytes, 0, true).unwrap();
        assert_eq!(script[0].1.op, Op::Unknown { opcode: 0x67 });
        assert_eq!(script[0].1.raw, vec![0x67]);
        assert_eq!(script[1].0, 1);
    }

    #[test]
    fn actor_ops_with_name_text() {
        // actorOps act=1: sub-op 15 remaps to the actor-name op
        let bytes = [0x13, 0x01, 0x0F, b'B', b'o', b'b', 0x00, 0xFF];
        let script = decode_script(&bytes, 0, true).unwrap();
        match &script[0].1.op {
            Op::ActorOps { act, ops } => {
                assert_eq!(*act, Operand::Imm(1));
                assert_eq!(ops.len(), 1);
                assert_eq!(ops[0], ActorOp::Name(vec![TextToken::Text(b"Bob".to_vec())]));
            }
            other => panic!("unexpected op {other:?}"),
        }
    }

    #[test]
    fn room_ops_scroll() {
        let bytes = [0x33, 0x01, 0x10, 0x00, 0x40, 0x01];
        let script = decode_script(&bytes, 0, true).unwrap();
        assert_eq!(
            script[0].1.op,
            Op::RoomOps(RoomOp::Scroll(Operand::Imm(0x10), Operand::Imm(0x140)))
        );
    }
}
