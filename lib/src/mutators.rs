use crate::error::ShuffleError;
use crate::script::op::{Instr, Op, Operand, PrintOp, Script};
use crate::script::text::TextToken;
use crate::script::var::{VarRef, VAR_DEBUGMODE, VAR_TIMER_NEXT};
use crate::session::Session;

/// Room-10 global 1 is the boot script: it seeds variables, runs the
/// copy-protection check and jumps into the intro.
const BOOT_ROOM: u16 = 10;
const BOOT_SCRIPT: u16 = 1;
/// The version banner lives in the "Part I" title card script.
const BANNER_SCRIPT: u16 = 149;
/// The copy-protection code wheel screen.
const CODE_WHEEL_SCRIPT: i32 = 152;

/// Frame pace the turbo rewrite installs.
pub const TURBO_TIMER_INTERVAL: i32 = 2;

/// Rewrites every `move VAR_TIMER_NEXT <- imm` across globals and locals
/// so the interpreter reschedules frames as fast as it can.
pub fn turbo_mode(session: &mut Session, timer_interval: i32) -> Result<(), ShuffleError> {
    let room_ids: Vec<u16> = session.rooms.keys().copied().collect();
    for room_id in room_ids {
        let gids: Vec<u16> = session.rooms[&room_id].globals.keys().copied().collect();
        for gid in gids {
            let script = &mut session
                .rooms
                .get_mut(&room_id)
                .expect("room id came from the map")
                .globals
                .get_mut(&gid)
                .expect("global id came from the map")
                .script;
            if rewrite_timer_moves(script, timer_interval) {
                session.update_global(room_id, gid)?;
            }
        }
        let lids: Vec<u8> = session.rooms[&room_id].locals.keys().copied().collect();
        for lid in lids {
            let script = &mut session
                .rooms
                .get_mut(&room_id)
                .expect("room id came from the map")
                .locals
                .get_mut(&lid)
                .expect("local id came from the map")
                .script;
            if rewrite_timer_moves(script, timer_interval) {
                session.update_local(room_id, lid)?;
            }
        }
    }
    Ok(())
}

fn rewrite_timer_moves(script: &mut Script, timer_interval: i32) -> bool {
    let mut modded = false;
    for (_, instr) in script.iter_mut() {
        let hit = matches!(
            &instr.op,
            Op::Move { target, value: Operand::Imm(_) } if target.id == VAR_TIMER_NEXT
        );
        if hit {
            instr.modify(|op| {
                if let Op::Move { value, .. } = op {
                    *value = Operand::Imm(timer_interval);
                }
            });
            modded = true;
        }
    }
    modded
}

/// Turns on the interpreter's built-in debug features by seeding
/// VAR_DEBUGMODE at the top of the boot script.
pub fn debug_mode(session: &mut Session) -> Result<(), ShuffleError> {
    let Some(script) = boot_script_mut(session) else {
        log::warn!("boot script not found, cannot enable debug mode");
        return Ok(());
    };
    script.insert(
        0,
        (
            0,
            Instr::synthetic(
                0x1A,
                Op::Move {
                    target: VarRef::new(VAR_DEBUGMODE),
                    value: Operand::Imm(1),
                },
            ),
        ),
    );
    session.update_global(BOOT_ROOM, BOOT_SCRIPT)
}

/// Drops the four-instruction block that launches the code wheel screen,
/// so the game boots straight past the copy protection.
pub fn skip_code_wheel(session: &mut Session) -> Result<(), ShuffleError> {
    let Some(script) = boot_script_mut(session) else {
        log::warn!("boot script not found, cannot skip the code wheel");
        return Ok(());
    };
    let launch = script.iter().position(|(_, instr)| {
        matches!(
            instr.op,
            Op::StartScript {
                script: Operand::Imm(CODE_WHEEL_SCRIPT),
                ..
            }
        )
    });
    match launch {
        Some(i) if i + 4 <= script.len() => {
            script.drain(i..i + 4);
            session.update_global(BOOT_ROOM, BOOT_SCRIPT)
        }
        _ => {
            log::warn!("code wheel launch not found, skipping");
            Ok(())
        }
    }
}

fn boot_script_mut(session: &mut Session) -> Option<&mut Script> {
    session
        .rooms
        .get_mut(&BOOT_ROOM)
        .and_then(|r| r.globals.get_mut(&BOOT_SCRIPT))
        .map(|g| &mut g.script)
}

/// Tacks the tool version and the seed onto the trademark notice on the
/// title card, so shuffled installs are tellable apart.
pub fn add_version_banner(session: &mut Session, seed: u64) -> Result<(), ShuffleError> {
    let Some(script) = session
        .rooms
        .get_mut(&BOOT_ROOM)
        .and_then(|r| r.globals.get_mut(&BANNER_SCRIPT))
        .map(|g| &mut g.script)
    else {
        log::warn!("title card script not found, not stamping a version banner");
        return Ok(());
    };
    let mut modded = false;
    for (_, instr) in script.iter_mut() {
        let hit = match &instr.op {
            Op::Print { ops, .. } if ops.len() == 4 => match &ops[3] {
                PrintOp::Text(tokens) => matches!(
                    tokens.first(),
                    Some(TextToken::Text(data)) if data.starts_with(b"TM ")
                ),
                _ => false,
            },
            _ => false,
        };
        if hit {
            instr.modify(|op| {
                if let Op::Print { ops, .. } = op {
                    if let Some(PrintOp::Text(tokens)) = ops.get_mut(3) {
                        tokens.push(TextToken::Newline);
                        tokens.push(TextToken::Text(
                            format!("MI1S v{} seed #{seed}", env!("CARGO_PKG_VERSION"))
                                .into_bytes(),
                        ));
                    }
                }
            });
            modded = true;
        }
    }
    if modded {
        session.update_global(BOOT_ROOM, BANNER_SCRIPT)
    } else {
        log::warn!("trademark notice not found, not stamping a version banner");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::decode_script;
    use crate::script::encode::encode_script;

    #[test]
    fn timer_moves_are_rewritten_in_place() {
        // move VAR[19] <- 6 ; move VAR[20] <- 6 ; stopObjectCode
        let bytes = [
            0x1A, 0x13, 0x00, 0x06, 0x00, //
            0x1A, 0x14, 0x00, 0x06, 0x00, //
            0x00,
        ];
        let mut script = decode_script(&bytes, 0, true).unwrap();
        assert!(rewrite_timer_moves(&mut script, TURBO_TIMER_INTERVAL));
        let out = encode_script(&script).unwrap();
        assert_eq!(out.len(), bytes.len());
        assert_eq!(out[3], 2); // the timer move changed
        assert_eq!(out[8], 6); // the other move did not
    }

    #[test]
    fn timer_moves_from_vars_are_left_alone() {
        // move VAR[19] <- VAR[5]
        let bytes = [0x9A, 0x13, 0x00, 0x05, 0x00];
        let mut script = decode_script(&bytes, 0, true).unwrap();
        assert!(!rewrite_timer_moves(&mut script, TURBO_TIMER_INTERVAL));
    }
}
