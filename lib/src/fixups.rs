use crate::error::ShuffleError;
use crate::script::op::{nop, Op, Operand, RoomOp};
use crate::session::Session;

/// High street.
const HIGH_STREET: u16 = 34;
/// Low street.
const LOW_STREET: u16 = 35;
/// The island map screen.
const MAP_ROOM: u16 = 85;
/// Outside the storekeeper's, where the forest entrances live.
const FOREST_ENTRY_ROOM: u16 = 58;
/// The variable the entry scripts test to learn where the player came from.
const VAR_ARRIVED_FROM: u16 = 101;
/// The map the storekeeper check looks for.
const TREASURE_MAP_OBJECT: i32 = 449;

/// Entry-script surgery the room shuffle depends on. Every edit blanks
/// in place with a zero-offset jump so sibling branch targets survive.
pub fn room_script_fixups(session: &mut Session) -> Result<(), ShuffleError> {
    fix_high_street(session)?;
    fix_low_street(session)?;
    fix_bridge_on_map(session)?;
    Ok(())
}

/// The high street entry script repositions the player when arriving from
/// the lookout and scrolls the screen; both fight the shuffle.
fn fix_high_street(session: &mut Session) -> Result<(), ShuffleError> {
    let Some(entry) = session
        .rooms
        .get_mut(&HIGH_STREET)
        .and_then(|r| r.entry.as_mut())
    else {
        log::warn!("room {HIGH_STREET} has no entry script to fix");
        return Ok(());
    };
    let script = &mut entry.script;
    let mut modded = false;

    let arrival_check = script.iter().position(|(_, instr)| {
        matches!(
            &instr.op,
            Op::IsEqual { a, b: Operand::Imm(38), .. } if a.id == VAR_ARRIVED_FROM
        )
    });
    match arrival_check {
        Some(i) if i + 2 < script.len() => {
            for slot in &mut script[i..i + 3] {
                slot.1 = nop();
            }
            modded = true;
        }
        _ => log::warn!("high street arrival check not found, skipping"),
    }

    for slot in script.iter_mut() {
        if matches!(slot.1.op, Op::RoomOps(RoomOp::Scroll(..))) {
            slot.1 = nop();
            modded = true;
        }
    }

    if modded {
        session.update_entry(HIGH_STREET)?;
    }
    Ok(())
}

/// The low street entry script special-cases arrival from the dock and
/// the high street; zeroing the compared room ids defuses both checks.
fn fix_low_street(session: &mut Session) -> Result<(), ShuffleError> {
    let Some(entry) = session
        .rooms
        .get_mut(&LOW_STREET)
        .and_then(|r| r.entry.as_mut())
    else {
        log::warn!("room {LOW_STREET} has no entry script to fix");
        return Ok(());
    };
    let mut modded = false;
    for (_, instr) in entry.script.iter_mut() {
        let hit = matches!(
            &instr.op,
            Op::IsEqual { a, b: Operand::Imm(33 | 34), .. } if a.id == VAR_ARRIVED_FROM
        );
        if hit {
            instr.modify(|op| {
                if let Op::IsEqual { b, .. } = op {
                    *b = Operand::Imm(0);
                }
            });
            modded = true;
        }
    }
    if modded {
        session.update_entry(LOW_STREET)?;
    } else {
        log::warn!("low street arrival checks not found, skipping");
    }
    Ok(())
}

/// The map screen runs local script 200 while the troll still guards the
/// bridge, auto-booting the player on proximity. Blank the launcher.
fn fix_bridge_on_map(session: &mut Session) -> Result<(), ShuffleError> {
    let Some(entry) = session
        .rooms
        .get_mut(&MAP_ROOM)
        .and_then(|r| r.entry.as_mut())
    else {
        log::warn!("room {MAP_ROOM} has no entry script to fix");
        return Ok(());
    };
    let mut modded = false;
    for slot in entry.script.iter_mut() {
        if matches!(
            slot.1.op,
            Op::StartScript {
                script: Operand::Imm(200),
                ..
            }
        ) {
            slot.1 = nop();
            modded = true;
        }
    }
    if modded {
        session.update_entry(MAP_ROOM)?;
    } else {
        log::warn!("map room bridge script launcher not found, skipping");
    }
    Ok(())
}

/// The game blocks the forest until you own the map or are stalking the
/// storekeeper. Blank the whole precondition block on both entrances.
pub fn fix_forest_gate(session: &mut Session) -> Result<(), ShuffleError> {
    blank_gate_check(session, 669, 6)?;
    blank_gate_check(session, 666, 9)?;
    Ok(())
}

fn blank_gate_check(
    session: &mut Session,
    object_id: u16,
    span: usize,
) -> Result<(), ShuffleError> {
    let Some(script) = session
        .rooms
        .get_mut(&FOREST_ENTRY_ROOM)
        .and_then(|r| r.objects.get_mut(&object_id))
        .and_then(|o| o.verb_mut(10))
    else {
        log::warn!("room {FOREST_ENTRY_ROOM} object {object_id} walk_to script missing");
        return Ok(());
    };
    let check = script.iter().position(|(_, instr)| {
        matches!(
            instr.op,
            Op::GetObjectOwner {
                obj: Operand::Imm(TREASURE_MAP_OBJECT),
                ..
            }
        )
    });
    match check {
        Some(i) if i + span <= script.len() => {
            for slot in &mut script[i..i + span] {
                slot.1 = nop();
            }
            session.update_object(FOREST_ENTRY_ROOM, object_id)
        }
        _ => {
            log::warn!("forest gate check not found on object {object_id}, skipping");
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::decode_script;
    use crate::script::encode::encode_script;

    #[test]
    fn low_street_zeroes_the_compared_room() {
        // isEqual VAR[101] == 33 else +0 ; stopObjectCode
        let bytes = [0x48, 0x65, 0x00, 0x21, 0x00, 0x00, 0x00, 0x00];
        let mut script = decode_script(&bytes, 0, true).unwrap();
        let (_, instr) = &mut script[0];
        assert!(matches!(
            instr.op,
            Op::IsEqual { b: Operand::Imm(33), .. }
        ));
        instr.modify(|op| {
            if let Op::IsEqual { b, .. } = op {
                *b = Operand::Imm(0);
            }
        });
        let out = encode_script(&script).unwrap();
        assert_eq!(out.len(), bytes.len());
        assert_eq!(out[3], 0x00);
        assert_eq!(out[4], 0x00);
    }
}
