use rand::prelude::*;
use rand::rngs::StdRng;

use crate::error::ShuffleError;
use crate::script::op::{Op, PrintOp, Script, StringOp, VerbOp};
use crate::script::text::TextToken;
use crate::session::Session;

/// The swordfighting engine room: global 82 loads the insults, global 83
/// the retorts, global 79 drives the fight dialogue.
const FIGHT_ROOM: u16 = 88;
const JAB_SCRIPT: u16 = 82;
const RETORT_SCRIPT: u16 = 83;
const CONVO_SCRIPT: u16 = 79;
/// Captain Smirk's gym, where the tutorial quotes real lines.
const TRAINING_ROOM: u16 = 43;
const TRAINING_SCRIPT: u16 = 57;

const INSULT_COUNT: usize = 16;
/// "You fight like a dairy farmer."
const INSULT_FARMER: usize = 7;
/// "You make me want to puke." / shish-kabob retort.
const INSULT_SHISH: usize = 1;

/// Every third instruction of the loader scripts is a string store; the
/// regular table starts at 2, the Sword Master's copy at 50.
const JAB_BASE: usize = 2;
const SM_JAB_BASE: usize = 50;
const RETORT_BASE: usize = 2;

/// Decouples insults from their retorts. The retort order is always
/// permuted; the jab order only when `change_order` asks for it, which
/// also scrambles the dialog menu. The Sword Master's insult table and
/// the gym tutorial are patched to match.
pub fn non_sequitur_swordfighting(
    session: &mut Session,
    rng: &mut StdRng,
    change_order: bool,
) -> Result<(), ShuffleError> {
    let mut jab_ids: Vec<usize> = (0..INSULT_COUNT).collect();
    let mut retort_ids: Vec<usize> = (0..INSULT_COUNT).collect();
    if change_order {
        jab_ids.shuffle(rng);
    }
    retort_ids.shuffle(rng);

    let Some(jab_script) = global_script(session, FIGHT_ROOM, JAB_SCRIPT) else {
        log::warn!("insult loader script missing, skipping the sword shuffle");
        return Ok(());
    };
    let jabs = read_string_table(jab_script, JAB_BASE)?;
    let sm_jabs = read_string_table(jab_script, SM_JAB_BASE)?;
    let Some(retort_script) = global_script(session, FIGHT_ROOM, RETORT_SCRIPT) else {
        log::warn!("retort loader script missing, skipping the sword shuffle");
        return Ok(());
    };
    let retorts = read_string_table(retort_script, RETORT_BASE)?;

    {
        let script = global_script_mut(session, FIGHT_ROOM, JAB_SCRIPT)
            .expect("jab script just read");
        for (i, &x) in jab_ids.iter().enumerate() {
            set_loadstring(script, JAB_BASE + 3 * i, jabs[x].clone());
            set_loadstring(script, SM_JAB_BASE + 3 * i, sm_jabs[x].clone());
        }
    }
    session.update_global(FIGHT_ROOM, JAB_SCRIPT)?;
    {
        let script = global_script_mut(session, FIGHT_ROOM, RETORT_SCRIPT)
            .expect("retort script just read");
        for (i, &x) in retort_ids.iter().enumerate() {
            set_loadstring(script, RETORT_BASE + 3 * i, retorts[x].clone());
        }
    }
    session.update_global(FIGHT_ROOM, RETORT_SCRIPT)?;

    if let Some(script) = global_script_mut(session, FIGHT_ROOM, CONVO_SCRIPT) {
        set_print_text(script, 10, 0, 0, b"What an amateur non-sequitur!".to_vec());
        set_print_text(
            script,
            19,
            0,
            0,
            b"I'm non-sequitured that you'd even try to use that non-sequitur on me!".to_vec(),
        );
        set_loadstring(
            script,
            25,
            b"That's not fair, you're using the Sword Master's non-sequiturs, I see.".to_vec(),
        );
        session.update_global(FIGHT_ROOM, CONVO_SCRIPT)?;
    } else {
        log::warn!("fight dialogue script missing, leaving its lines alone");
    }

    if let Some(script) = global_script_mut(session, TRAINING_ROOM, TRAINING_SCRIPT) {
        set_print_text(
            script,
            513,
            0,
            0,
            b"^they know just when to throw their opponent with a non-sequitur^".to_vec(),
        );
        set_print_text(
            script,
            517,
            0,
            0,
            b"Let's try a couple of non-sequiturs out, shall we?".to_vec(),
        );
        set_print_text(script, 521, 0, 0, quoted(&jabs[jab_ids[INSULT_FARMER]]));
        set_verb_name(script, 543, 1, retorts[jab_ids[INSULT_FARMER]].clone());
        set_print_text(script, 558, 0, 2, quoted(&retorts[retort_ids[INSULT_FARMER]]));
        set_print_text(script, 567, 0, 0, quoted(&jabs[jab_ids[INSULT_SHISH]]));
        set_verb_name(script, 591, 1, retorts[retort_ids[INSULT_FARMER]].clone());
        set_print_text(
            script,
            612,
            0,
            2,
            b"That was the response from the last non-sequitur.".to_vec(),
        );
        set_print_text(script, 619, 0, 2, {
            let mut line = quoted(&jabs[jab_ids[INSULT_SHISH]]);
            line.push(b'^');
            line
        });
        set_print_text(script, 622, 0, 0, quoted(&retorts[retort_ids[INSULT_SHISH]]));
        set_print_text(
            script,
            626,
            0,
            0,
            b"Now I suggest you go out there and learn some non-sequiturs.".to_vec(),
        );
        session.update_global(TRAINING_ROOM, TRAINING_SCRIPT)?;
    } else {
        log::warn!("gym tutorial script missing, leaving its lines alone");
    }

    Ok(())
}

fn quoted(line: &[u8]) -> Vec<u8> {
    let mut result = b"^'".to_vec();
    result.extend_from_slice(line);
    result.extend_from_slice(b"'");
    result
}

fn global_script(session: &Session, room: u16, id: u16) -> Option<&Script> {
    session
        .rooms
        .get(&room)
        .and_then(|r| r.globals.get(&id))
        .map(|g| &g.script)
}

fn global_script_mut(session: &mut Session, room: u16, id: u16) -> Option<&mut Script> {
    session
        .rooms
        .get_mut(&room)
        .and_then(|r| r.globals.get_mut(&id))
        .map(|g| &mut g.script)
}

/// Reads sixteen strings spaced three instructions apart, the layout the
/// loader scripts use.
fn read_string_table(script: &Script, base: usize) -> Result<Vec<Vec<u8>>, ShuffleError> {
    (0..INSULT_COUNT)
        .map(|i| {
            loadstring_data(script, base + 3 * i).ok_or_else(|| {
                ShuffleError::Custom(format!(
                    "string table entry {i} at instruction {} is not a string store",
                    base + 3 * i
                ))
            })
        })
        .collect()
}

fn loadstring_data(script: &Script, index: usize) -> Option<Vec<u8>> {
    match &script.get(index)?.1.op {
        Op::StringOps(StringOp::LoadString { string, .. }) => match string.first() {
            Some(TextToken::Text(data)) => Some(data.clone()),
            _ => None,
        },
        _ => None,
    }
}

fn set_loadstring(script: &mut Script, index: usize, data: Vec<u8>) {
    let Some((_, instr)) = script.get_mut(index) else {
        log::warn!("no instruction {index} to patch a string into");
        return;
    };
    let fits = matches!(
        &instr.op,
        Op::StringOps(StringOp::LoadString { string, .. })
            if matches!(string.first(), Some(TextToken::Text(_)))
    );
    if !fits {
        log::warn!("instruction {index} is not a string store, skipping patch");
        return;
    }
    instr.modify(|op| {
        if let Op::StringOps(StringOp::LoadString { string, .. }) = op {
            string[0] = TextToken::Text(data);
        }
    });
}

/// Replaces literal token `tok` of print op `op_index` in the print
/// instruction at `index`.
fn set_print_text(script: &mut Script, index: usize, op_index: usize, tok: usize, data: Vec<u8>) {
    let Some((_, instr)) = script.get_mut(index) else {
        log::warn!("no instruction {index} to patch a line into");
        return;
    };
    let fits = {
        let ops = match &instr.op {
            Op::Print { ops, .. } | Op::PrintEgo { ops } => Some(ops),
            _ => None,
        };
        ops.and_then(|ops| match ops.get(op_index) {
            Some(PrintOp::Text(tokens)) => tokens.get(tok),
            _ => None,
        })
        .is_some_and(|t| matches!(t, TextToken::Text(_)))
    };
    if !fits {
        log::warn!("instruction {index} has no literal text at op {op_index} token {tok}");
        return;
    }
    instr.modify(|op| {
        let ops = match op {
            Op::Print { ops, .. } | Op::PrintEgo { ops } => ops,
            _ => return,
        };
        if let Some(PrintOp::Text(tokens)) = ops.get_mut(op_index) {
            tokens[tok] = TextToken::Text(data);
        }
    });
}

/// Replaces the name text of verb op `op_index` in the verbOps
/// instruction at `index`.
fn set_verb_name(script: &mut Script, index: usize, op_index: usize, data: Vec<u8>) {
    let Some((_, instr)) = script.get_mut(index) else {
        log::warn!("no instruction {index} to patch a verb name into");
        return;
    };
    let fits = matches!(
        &instr.op,
        Op::VerbOps { ops, .. }
            if matches!(
                ops.get(op_index),
                Some(VerbOp::Name(tokens)) if matches!(tokens.first(), Some(TextToken::Text(_)))
            )
    );
    if !fits {
        log::warn!("instruction {index} has no verb name at op {op_index}");
        return;
    }
    instr.modify(|op| {
        if let Op::VerbOps { ops, .. } = op {
            if let Some(VerbOp::Name(tokens)) = ops.get_mut(op_index) {
                tokens[0] = TextToken::Text(data);
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::decode_script;
    use crate::script::encode::encode_script;

    fn loadstring_bytes(index: u8, text: &[u8]) -> Vec<u8> {
        let mut out = vec![0x27, 0x01, index];
        out.extend_from_slice(text);
        out.push(0x00);
        out
    }

    #[test]
    fn loadstring_round_trip_patch() {
        let bytes = loadstring_bytes(24, b"You fight like a dairy farmer.");
        let mut script = decode_script(&bytes, 0, true).unwrap();
        assert_eq!(
            loadstring_data(&script, 0),
            Some(b"You fight like a dairy farmer.".to_vec())
        );
        set_loadstring(&mut script, 0, b"How appropriate. You fight like a cow.".to_vec());
        let out = encode_script(&script).unwrap();
        let again = decode_script(&out, 0, true).unwrap();
        assert_eq!(
            loadstring_data(&again, 0),
            Some(b"How appropriate. You fight like a cow.".to_vec())
        );
    }

    #[test]
    fn patches_miss_gracefully() {
        let bytes = [0x00u8]; // just a stopObjectCode
        let mut script = decode_script(&bytes, 0, true).unwrap();
        set_loadstring(&mut script, 5, b"nope".to_vec());
        set_print_text(&mut script, 0, 0, 0, b"nope".to_vec());
        set_verb_name(&mut script, 0, 1, b"nope".to_vec());
        let out = encode_script(&script).unwrap();
        assert_eq!(out, bytes);
    }
}
