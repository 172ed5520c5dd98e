use crate::error::ShuffleError;
use crate::script::op::{Instr, Op, Operand, PrintOp, Script, StringOp, VerbOp};
use crate::script::text::write_text_tokens;

fn write_byte_arg(arg: &Operand, out: &mut Vec<u8>) {
    match arg {
        Operand::Var(v) => v.write(out),
        Operand::Imm(imm) => out.push(*imm as u8),
    }
}

fn write_word_arg(arg: &Operand, out: &mut Vec<u8>) {
    match arg {
        Operand::Var(v) => v.write(out),
        Operand::Imm(imm) => out.extend_from_slice(&(*imm as i16).to_le_bytes()),
    }
}

fn flag(arg: &Operand, bit: u8) -> u8 {
    if arg.is_var() {
        bit
    } else {
        0
    }
}

fn encode_print_ops(ops: &[PrintOp], out: &mut Vec<u8>) -> Result<(), ShuffleError> {
    for op in ops {
        match op {
            PrintOp::At(x, y) => {
                out.push(0x00 | flag(x, 0x80) | flag(y, 0x40));
                write_word_arg(x, out);
                write_word_arg(y, out);
            }
            PrintOp::Color(color) => {
                out.push(0x01 | flag(color, 0x80));
                write_byte_arg(color, out);
            }
            PrintOp::Clipped(right) => {
                out.push(0x02 | flag(right, 0x80));
                write_word_arg(right, out);
            }
            PrintOp::Erase(w, h) => {
                out.push(0x03 | flag(w, 0x80) | flag(h, 0x40));
                write_word_arg(w, out);
                write_word_arg(h, out);
            }
            PrintOp::Center => out.push(0x04),
            PrintOp::Left => out.push(0x06),
            PrintOp::Overhead => out.push(0x07),
            PrintOp::SayVoice(offset, delay) => {
                out.push(0x08 | flag(offset, 0x80) | flag(delay, 0x40));
                write_word_arg(offset, out);
                write_word_arg(delay, out);
            }
            PrintOp::Text(tokens) => {
                // The text op closes the list; the string's own NUL is the
                // terminator.
                out.push(0x0F);
                write_text_tokens(tokens, out);
                return Ok(());
            }
            PrintOp::Unknown => {
                return Err(ShuffleError::Encode(
                    "cannot re-encode an unrecognised print sub-op".into(),
                ))
            }
        }
    }
    out.push(0xFF);
    Ok(())
}

fn encode_verb_ops(ops: &[VerbOp], out: &mut Vec<u8>) -> Result<(), ShuffleError> {
    for op in ops {
        match op {
            VerbOp::Image(obj) => {
                out.push(0x01 | flag(obj, 0x80));
                write_word_arg(obj, out);
            }
            VerbOp::Name(tokens) => {
                out.push(0x02);
                write_text_tokens(tokens, out);
            }
            VerbOp::Color(color) => {
                out.push(0x03 | flag(color, 0x80));
                write_byte_arg(color, out);
            }
            VerbOp::HiColor(color) => {
                out.push(0x04 | flag(color, 0x80));
                write_byte_arg(color, out);
            }
            VerbOp::At(x, y) => {
                out.push(0x05 | flag(x, 0x80) | flag(y, 0x40));
                write_word_arg(x, out);
                write_word_arg(y, out);
            }
            VerbOp::On => out.push(0x06),
            VerbOp::Off => out.push(0x07),
            VerbOp::Delete => out.push(0x08),
            VerbOp::New => out.push(0x09),
            VerbOp::DimColor(color) => {
                out.push(0x10 | flag(color, 0x80));
                write_byte_arg(color, out);
            }
            VerbOp::Dim => out.push(0x11),
            VerbOp::Key(key) => {
                out.push(0x12 | flag(key, 0x80));
                write_byte_arg(key, out);
            }
            VerbOp::Center => out.push(0x13),
            VerbOp::NameStr(idx) => {
                out.push(0x14 | flag(idx, 0x80));
                write_word_arg(idx, out);
            }
            VerbOp::AssignObject(obj, room) => {
                out.push(0x16 | flag(obj, 0x80) | flag(room, 0x40));
                write_word_arg(obj, out);
                write_byte_arg(room, out);
            }
            VerbOp::BackColor(color) => {
                out.push(0x17 | flag(color, 0x80));
                write_byte_arg(color, out);
            }
            VerbOp::Unknown => {
                return Err(ShuffleError::Encode(
                    "cannot re-encode an unrecognised verb sub-op".into(),
                ))
            }
        }
    }
    out.push(0xFF);
    Ok(())
}

fn encode_string_op(op: &StringOp, out: &mut Vec<u8>) -> Result<(), ShuffleError> {
    match op {
        StringOp::LoadString { index, string } => {
            out.push(0x01 | flag(index, 0x80));
            write_byte_arg(index, out);
            write_text_tokens(string, out);
        }
        StringOp::CopyString { a, b } => {
            out.push(0x02 | flag(a, 0x80) | flag(b, 0x40));
            write_byte_arg(a, out);
            write_byte_arg(b, out);
        }
        StringOp::SetStringChar { a, b, c } => {
            out.push(0x03 | flag(a, 0x80) | flag(b, 0x40) | flag(c, 0x20));
            write_byte_arg(a, out);
            write_byte_arg(b, out);
            write_byte_arg(c, out);
        }
        StringOp::GetStringChar { target, a, b } => {
            out.push(0x04 | flag(a, 0x80) | flag(b, 0x40));
            target.write(out);
            write_byte_arg(a, out);
            write_byte_arg(b, out);
        }
        StringOp::CreateString { a, b } => {
            out.push(0x05 | flag(a, 0x80) | flag(b, 0x40));
            write_byte_arg(a, out);
            write_byte_arg(b, out);
        }
        StringOp::Unknown => {
            return Err(ShuffleError::Encode(
                "cannot re-encode an unrecognised string sub-op".into(),
            ))
        }
    }
    Ok(())
}

/// Re-derives the wire form for the instructions mutators produce or edit.
/// Anything outside that set must still carry its original bytes.
fn encode_op(op: &Op) -> Result<Vec<u8>, ShuffleError> {
    let mut out = Vec::new();
    match op {
        Op::IsGreaterEqual { a, b, offset }
        | Op::IsNotEqual { a, b, offset }
        | Op::IsLessEqual { a, b, offset }
        | Op::IsLess { a, b, offset }
        | Op::IsEqual { a, b, offset }
        | Op::IsGreater { a, b, offset } => {
            let base = match op {
                Op::IsGreaterEqual { .. } => 0x04,
                Op::IsNotEqual { .. } => 0x08,
                Op::IsLessEqual { .. } => 0x38,
                Op::IsLess { .. } => 0x44,
                Op::IsEqual { .. } => 0x48,
                _ => 0x78,
            };
            out.push(base | flag(b, 0x80));
            a.write(&mut out);
            write_word_arg(b, &mut out);
            out.extend_from_slice(&offset.to_le_bytes());
        }
        Op::IfState { obj, val, offset } | Op::IfNotState { obj, val, offset } => {
            let base = if matches!(op, Op::IfState { .. }) {
                0x0F
            } else {
                0x2F
            };
            out.push(base | flag(obj, 0x80) | flag(val, 0x40));
            write_word_arg(obj, &mut out);
            write_byte_arg(val, &mut out);
            out.extend_from_slice(&offset.to_le_bytes());
        }
        Op::EqualZero { a, offset } | Op::NotEqualZero { a, offset } => {
            out.push(if matches!(op, Op::EqualZero { .. }) {
                0x28
            } else {
                0xA8
            });
            a.write(&mut out);
            out.extend_from_slice(&offset.to_le_bytes());
        }
        Op::JumpRelative { offset } => {
            out.push(0x18);
            out.extend_from_slice(&offset.to_le_bytes());
        }
        Op::Move { target, value } => {
            out.push(0x1A | flag(value, 0x80));
            target.write(&mut out);
            write_word_arg(value, &mut out);
        }
        Op::IfClassOfIs {
            obj,
            classes,
            offset,
        } => {
            out.push(0x1D | flag(obj, 0x80));
            write_word_arg(obj, &mut out);
            for class in classes {
                out.push(flag(class, 0x80));
                write_word_arg(class, &mut out);
            }
            out.push(0xFF);
            out.extend_from_slice(&offset.to_le_bytes());
        }
        Op::IsActorInBox {
            act,
            box_id,
            offset,
        } => {
            out.push(0x1F | flag(act, 0x80) | flag(box_id, 0x40));
            write_byte_arg(act, &mut out);
            write_byte_arg(box_id, &mut out);
            out.extend_from_slice(&offset.to_le_bytes());
        }
        Op::LoadRoomWithEgo { obj, room, x, y } => {
            out.push(0x24 | flag(obj, 0x80) | flag(room, 0x40));
            write_word_arg(obj, &mut out);
            write_byte_arg(room, &mut out);
            out.extend_from_slice(&x.to_le_bytes());
            out.extend_from_slice(&y.to_le_bytes());
        }
        Op::ActorFollowCamera { act } => {
            out.push(0x52 | flag(act, 0x80));
            write_byte_arg(act, &mut out);
        }
        Op::Print { act, ops } => {
            out.push(0x14 | flag(act, 0x80));
            write_byte_arg(act, &mut out);
            encode_print_ops(ops, &mut out)?;
        }
        Op::PrintEgo { ops } => {
            out.push(0xD8);
            encode_print_ops(ops, &mut out)?;
        }
        Op::StringOps(string_op) => {
            out.push(0x27);
            encode_string_op(string_op, &mut out)?;
        }
        Op::VerbOps { verb, ops } => {
            out.push(0x7A | flag(verb, 0x80));
            write_byte_arg(verb, &mut out);
            encode_verb_ops(ops, &mut out)?;
        }
        other => {
            return Err(ShuffleError::Encode(format!(
                "no encoder for instruction {other:?} and no raw bytes to fall back on"
            )))
        }
    }
    Ok(out)
}

/// Single-instruction encoding: the stored raw bytes are authoritative
/// until a mutator clears them.
pub fn encode_instr(instr: &Instr) -> Result<Vec<u8>, ShuffleError> {
    if !instr.raw.is_empty() {
        return Ok(instr.raw.clone());
    }
    encode_op(&instr.op)
}

/// Re-serialises a whole script, repairing every relative branch for the
/// new instruction layout. Zero-offset `jumpRelative` no-ops are emitted
/// untouched; they exist to reserve bytes.
pub fn encode_script(script: &Script) -> Result<Vec<u8>, ShuffleError> {
    if script.is_empty() {
        return Ok(Vec::new());
    }
    // Pass 1: measure the new encoding of every instruction.
    let mut encoded = Vec::with_capacity(script.len());
    for (_, instr) in script {
        encoded.push(encode_instr(instr)?);
    }
    let old_bases: Vec<usize> = script.iter().map(|(off, _)| *off).collect();
    let mut new_bases = Vec::with_capacity(script.len());
    let mut pos = script[0].0;
    for bytes in &encoded {
        new_bases.push(pos);
        pos += bytes.len();
    }

    // Pass 2: emit, remapping branch targets through the offset tables.
    let mut result = Vec::new();
    for (i, ((off, instr), bytes)) in script.iter().zip(&encoded).enumerate() {
        let rel = match instr.op.branch_offset() {
            Some(rel) if !instr.is_nop() => rel,
            _ => {
                result.extend_from_slice(bytes);
                continue;
            }
        };
        let old_len = if instr.raw.is_empty() {
            bytes.len()
        } else {
            instr.raw.len()
        };
        let target = *off as i64 + old_len as i64 + rel as i64;
        let target_idx = old_bases
            .iter()
            .position(|&b| b as i64 == target)
            .ok_or_else(|| {
                ShuffleError::Encode(format!(
                    "branch at 0x{off:X} targets 0x{target:X}, which is not an instruction boundary"
                ))
            })?;
        let new_rel = new_bases[target_idx] as i64 - bytes.len() as i64 - new_bases[i] as i64;
        let new_rel = i16::try_from(new_rel).map_err(|_| {
            ShuffleError::Encode(format!("branch at 0x{off:X} out of i16 range after reassembly"))
        })?;
        if new_rel == rel {
            result.extend_from_slice(bytes);
        } else {
            let mut patched = instr.clone();
            patched.raw.clear();
            patched.op.set_branch_offset(new_rel);
            let patched_bytes = encode_op(&patched.op)?;
            if patched_bytes.len() != bytes.len() {
                return Err(ShuffleError::Encode(format!(
                    "branch at 0x{off:X} changed size during offset repair"
                )));
            }
            result.extend_from_slice(&patched_bytes);
        }
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::decode::decode_script;
    use crate::script::op::nop;
    use crate::script::text::TextToken;
    use crate::script::var::VarRef;

    // A small script exercising branches, text and raw fallback:
    //   0000 isEqual VAR[101] == 38 else goto 000D
    //   0007 move VAR[19] <- 6
    //   000C breakHere        (raw-only opcode)
    //   000D stopObjectCode
    const SAMPLE: &[u8] = &[
        0x48, 0x65, 0x00, 0x26, 0x00, 0x06, 0x00, // isEqual, skips 6 bytes
        0x1A, 0x13, 0x00, 0x06, 0x00, // move
        0x80, // breakHere
        0x00, // stopObjectCode
    ];

    #[test]
    fn untouched_script_round_trips() {
        let script = decode_script(SAMPLE, 0, true).unwrap();
        assert_eq!(encode_script(&script).unwrap(), SAMPLE);
    }

    #[test]
    fn decode_is_a_section_of_encode() {
        let script = decode_script(SAMPLE, 0, true).unwrap();
        let bytes = encode_script(&script).unwrap();
        let again = decode_script(&bytes, 0, true).unwrap();
        assert_eq!(script, again);
    }

    #[test]
    fn same_size_edit_leaves_other_bytes_alone() {
        let mut script = decode_script(SAMPLE, 0, true).unwrap();
        script[1].1.modify(|op| {
            if let Op::Move { value, .. } = op {
                *value = Operand::Imm(2);
            }
        });
        let bytes = encode_script(&script).unwrap();
        assert_eq!(bytes.len(), SAMPLE.len());
        // only the move's immediate differs
        assert_eq!(&bytes[..7], &SAMPLE[..7]);
        assert_eq!(bytes[10], 2);
        assert_eq!(&bytes[12..], &SAMPLE[12..]);
    }

    #[test]
    fn insertion_shifts_branch_targets() {
        let mut script = decode_script(SAMPLE, 0, true).unwrap();
        // debug-mode style prepend
        let prepend = Instr::synthetic(
            0x1A,
            Op::Move {
                target: VarRef::new(39),
                value: Operand::Imm(1),
            },
        );
        script.insert(0, (0, prepend));
        let bytes = encode_script(&script).unwrap();
        let again = decode_script(&bytes, 0, true).unwrap();
        // the isEqual still skips exactly the move+breakHere pair
        match again[1].1.op {
            Op::IsEqual { offset, .. } => assert_eq!(offset, 6),
            ref other => panic!("unexpected op {other:?}"),
        }
        assert!(matches!(again[4].1.op, Op::StopObjectCode));
    }

    #[test]
    fn deletion_repairs_downstream_jump() {
        // 0000 jumpRelative +5 (to 0008)
        // 0003 move VAR[0] <- 1
        // 0008 stopObjectCode
        let bytes = [
            0x18, 0x05, 0x00, 0x1A, 0x00, 0x00, 0x01, 0x00, 0x00,
        ];
        let mut script = decode_script(&bytes, 0, true).unwrap();
        script.remove(1);
        let out = encode_script(&script).unwrap();
        assert_eq!(out, vec![0x18, 0x00, 0x00, 0x00]);
    }

    #[test]
    fn nop_is_never_remapped() {
        let mut script = decode_script(SAMPLE, 0, true).unwrap();
        // blank the move with a zero-offset jump; the branch over it is
        // repaired for the smaller slot, the nop itself stays +0
        script[1].1 = nop();
        let out = encode_script(&script).unwrap();
        let again = decode_script(&out, 0, true).unwrap();
        match again[0].1.op {
            Op::IsEqual { offset, .. } => assert_eq!(offset, 4),
            ref other => panic!("unexpected op {other:?}"),
        }
        assert!(again[1].1.is_nop());
    }

    #[test]
    fn branch_to_nowhere_is_fatal() {
        let mut script = decode_script(SAMPLE, 0, true).unwrap();
        script[0].1.modify(|op| op.set_branch_offset(1));
        let err = encode_script(&script).unwrap_err();
        assert!(matches!(err, ShuffleError::Encode(_)));
    }

    #[test]
    fn synthetic_instructions_need_an_encoder() {
        let bad = Instr::synthetic(0x80, Op::BreakHere);
        assert!(encode_instr(&bad).is_err());
        let good = nop();
        assert_eq!(encode_instr(&good).unwrap(), vec![0x18, 0x00, 0x00]);
    }

    #[test]
    fn print_with_placement_and_text() {
        let instr = Instr::synthetic(
            0xD8,
            Op::PrintEgo {
                ops: vec![
                    PrintOp::Center,
                    PrintOp::Text(vec![TextToken::Text(b"LOOM(tm)".to_vec())]),
                ],
            },
        );
        let bytes = encode_instr(&instr).unwrap();
        assert_eq!(bytes[0], 0xD8);
        assert_eq!(bytes[1], 0x04);
        assert_eq!(bytes[2], 0x0F);
        assert_eq!(bytes.last(), Some(&0x00));
        let again = decode_script(&bytes, 0, true).unwrap();
        assert_eq!(again[0].1.op, instr.op);
    }

    #[test]
    fn verb_ops_round_trip_through_ast() {
        let instr = Instr::synthetic(
            0x7A,
            Op::VerbOps {
                verb: Operand::Imm(3),
                ops: vec![
                    VerbOp::Name(vec![TextToken::Text(b"Open".to_vec())]),
                    VerbOp::On,
                ],
            },
        );
        let bytes = encode_instr(&instr).unwrap();
        let again = decode_script(&bytes, 0, true).unwrap();
        assert_eq!(again[0].1.op, instr.op);
        assert_eq!(again[0].1.raw, bytes);
    }

    #[test]
    fn string_ops_round_trip_through_ast() {
        let instr = Instr::synthetic(
            0x27,
            Op::StringOps(StringOp::LoadString {
                index: Operand::Imm(24),
                string: vec![TextToken::Text(b"You fight like a cow!".to_vec())],
            }),
        );
        let bytes = encode_instr(&instr).unwrap();
        let again = decode_script(&bytes, 0, true).unwrap();
        assert_eq!(again[0].1.op, instr.op);
    }
}
