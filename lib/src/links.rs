use std::collections::{BTreeMap, BTreeSet};

use strum::{Display, EnumString};

use crate::script::{Op, Script};
use crate::session::{ScriptRef, Session};

/// Where a room sits in the game's presentation. Card screens and
/// close-ups never take part in the shuffle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum RoomClass {
    Card,
    Map,
    Outdoors,
    Indoors,
    Closeup,
    Beach,
}

/// Which island chunk a room belongs to; links never cross clusters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum RoomCluster {
    Melee,
    Ship,
    Monkey,
}

pub fn classify(room: u16) -> Option<RoomClass> {
    Some(match room {
        90 | 96 | 10 | 97 | 98 | 95 | 94 => RoomClass::Card,
        63 | 85 | 2 | 3 | 4 | 5 | 6 => RoomClass::Map,
        38 | 33 | 61 | 35 | 32 | 34 | 57 | 36 | 59 | 58 | 43 | 52 | 48 | 64 | 15 | 19 | 17
        | 12 | 69 | 21 | 18 | 11 | 16 | 40 | 25 | 80 => RoomClass::Outdoors,
        28 | 41 | 29 | 53 | 31 | 30 | 78 | 7 | 8 | 9 | 14 | 65 | 70 | 39 | 71 | 72 | 73 | 74
        | 75 | 77 | 27 => RoomClass::Indoors,
        44 | 83 | 42 | 79 | 82 | 81 | 23 | 45 | 89 | 62 | 49 | 60 | 76 | 88 | 51 | 37 | 50
        | 84 | 87 | 86 => RoomClass::Closeup,
        20 | 1 => RoomClass::Beach,
        _ => return None,
    })
}

pub fn cluster(room: u16) -> Option<RoomCluster> {
    Some(match room {
        63 | 85 | 38 | 33 | 61 | 35 | 32 | 34 | 57 | 36 | 59 | 58 | 43 | 52 | 48 | 64 | 28
        | 41 | 29 | 53 | 31 | 30 | 78 | 44 | 83 | 42 | 79 | 82 | 81 | 23 | 45 | 89 | 62 | 49
        | 60 | 76 | 88 | 51 | 37 | 50 | 15 => RoomCluster::Melee,
        7 | 8 | 9 | 14 | 19 | 17 | 84 | 87 => RoomCluster::Ship,
        12 | 69 | 65 | 70 | 39 | 71 | 72 | 73 | 74 | 75 | 77 | 20 | 1 | 2 | 3 | 4 | 5 | 6
        | 21 | 18 | 11 | 16 | 40 | 25 | 27 | 80 => RoomCluster::Monkey,
        _ => return None,
    })
}

/// First forest subroom id; everything at or above this is handled by the
/// forest extractor instead.
pub const FOREST_BASE: u16 = 200;

/// Interpreter verb ids, for human-readable link labels.
pub fn verb_name(verb: u8) -> Option<&'static str> {
    Some(match verb {
        1 => "open",
        2 => "close",
        3 | 80 => "give",
        4 => "turn_on",
        5 => "turn_off",
        6 => "push",
        7 => "pull",
        8 => "use",
        9 => "look_at",
        10 => "walk_to",
        11 => "pick_up",
        13 => "talk_to",
        90 => "unk",
        255 => "default",
        _ => return None,
    })
}

/// Which of the two exit-causing instruction shapes realises a link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkOp {
    LoadRoomWithEgo,
    PutActorInRoom,
}

/// One decoded exit site: the script position at which the player is
/// moved into `room_dest`.
#[derive(Debug, Clone)]
pub struct RoomLink {
    pub room_src: u16,
    pub room_dest: u16,
    pub site: ScriptRef,
    /// Byte offset of the instruction inside its script.
    pub offset: usize,
    pub op: LinkOp,
}

/// Matches within one script. Close-up and card rooms contribute nothing
/// as a source; links into them are skipped.
pub fn find_room_links(room_id: u16, script: &Script) -> Vec<(usize, u16, LinkOp)> {
    let mut result = Vec::new();
    for (offset, instr) in script {
        let Some(target) = instr.op.room_target() else {
            continue;
        };
        let target = target as u16;
        if target == room_id || target == 0 || target >= FOREST_BASE {
            continue;
        }
        if matches!(classify(room_id), Some(RoomClass::Closeup | RoomClass::Card)) {
            return Vec::new();
        }
        if matches!(classify(target), Some(RoomClass::Closeup | RoomClass::Card)) {
            continue;
        }
        let op = match &instr.op {
            Op::LoadRoomWithEgo { .. } => LinkOp::LoadRoomWithEgo,
            _ => LinkOp::PutActorInRoom,
        };
        result.push((*offset, target, op));
    }
    result
}

/// Normalised pair key: the two rooms in ascending order.
pub fn pair_key(a: u16, b: u16) -> (u16, u16) {
    if a < b {
        (a, b)
    } else {
        (b, a)
    }
}

pub type LinkTable = BTreeMap<(u16, u16), Vec<RoomLink>>;

/// Scans every object verb and local script for exit sites, grouped by
/// the unordered room pair they connect.
pub fn generate_room_links(session: &Session) -> LinkTable {
    let mut result: LinkTable = BTreeMap::new();
    for (&room_id, room) in &session.rooms {
        for (&object_id, object) in &room.objects {
            for verb in &object.verbs {
                for (offset, target, op) in find_room_links(room_id, &verb.script) {
                    result.entry(pair_key(room_id, target)).or_default().push(RoomLink {
                        room_src: room_id,
                        room_dest: target,
                        site: ScriptRef::ObjectVerb {
                            room: room_id,
                            object: object_id,
                            verb: verb.verb,
                        },
                        offset,
                        op,
                    });
                }
            }
        }
        for (&local_id, local) in &room.locals {
            for (offset, target, op) in find_room_links(room_id, &local.script) {
                result.entry(pair_key(room_id, target)).or_default().push(RoomLink {
                    room_src: room_id,
                    room_dest: target,
                    site: ScriptRef::Local {
                        room: room_id,
                        id: local_id,
                    },
                    offset,
                    op,
                });
            }
        }
    }
    for (key, links) in &result {
        log::debug!("link pair {key:?}");
        for link in links {
            log::debug!(
                "- {} -> {} via {} at 0x{:04X} ({:?})",
                link.room_src,
                link.room_dest,
                link.site,
                link.offset,
                link.op
            );
        }
    }
    result
}

/// Bidirectional adjacency: only pairs with sites in both directions
/// make it in, since one-way transitions are cutscene artifacts.
pub fn generate_room_linkmap(links: &LinkTable) -> BTreeMap<u16, BTreeSet<u16>> {
    let mut all_links: BTreeSet<(u16, u16)> = BTreeSet::new();
    for entries in links.values() {
        for link in entries {
            all_links.insert((link.room_src, link.room_dest));
        }
    }
    let mut map: BTreeMap<u16, BTreeSet<u16>> = BTreeMap::new();
    for entries in links.values() {
        for link in entries {
            if all_links.contains(&(link.room_src, link.room_dest))
                && all_links.contains(&(link.room_dest, link.room_src))
            {
                map.entry(link.room_src).or_default().insert(link.room_dest);
            }
        }
    }
    map
}

/// Rooms reachable from `start` over the bidirectional link map.
pub fn find_room_cluster(
    linkmap: &BTreeMap<u16, BTreeSet<u16>>,
    start: u16,
) -> BTreeSet<u16> {
    let mut result = BTreeSet::new();
    let mut pending = vec![start];
    while let Some(next) = pending.pop() {
        let Some(neighbours) = linkmap.get(&next) else {
            continue;
        };
        for &neighbour in neighbours {
            if result.insert(neighbour) {
                pending.push(neighbour);
            }
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::decode_script;
    use crate::testutil::exit_script;

    fn decode(bytes: &[u8]) -> Script {
        decode_script(bytes, 0, true).unwrap()
    }

    #[test]
    fn hotspot_exits_are_found() {
        let script = decode(&exit_script(500, 34));
        let found = find_room_links(33, &script);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].1, 34);
        assert_eq!(found[0].2, LinkOp::LoadRoomWithEgo);
    }

    #[test]
    fn closeup_sources_contribute_nothing() {
        // room 44 is a close-up
        let script = decode(&exit_script(500, 34));
        assert!(find_room_links(44, &script).is_empty());
    }

    #[test]
    fn card_targets_are_skipped() {
        // room 90 is a card screen
        let script = decode(&exit_script(500, 90));
        assert!(find_room_links(33, &script).is_empty());
    }

    #[test]
    fn forest_and_self_links_are_skipped() {
        assert!(find_room_links(33, &decode(&exit_script(500, 201))).is_empty());
        assert!(find_room_links(33, &decode(&exit_script(500, 33))).is_empty());
    }

    #[test]
    fn put_actor_links_need_the_player_actor() {
        let ego = decode(&[0xAD, 0x01, 0x00, 0x1C, 0x00]);
        let found = find_room_links(33, &ego);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].2, LinkOp::PutActorInRoom);
        let npc = decode(&[0x2D, 0x05, 0x1C, 0x00]);
        assert!(find_room_links(33, &npc).is_empty());
    }

    #[test]
    fn classification_tables() {
        assert_eq!(classify(33), Some(RoomClass::Outdoors));
        assert_eq!(classify(88), Some(RoomClass::Closeup));
        assert_eq!(classify(85), Some(RoomClass::Map));
        assert_eq!(classify(150), None);
        assert_eq!(cluster(7), Some(RoomCluster::Ship));
        assert_eq!(cluster(33), Some(RoomCluster::Melee));
        assert_eq!(verb_name(10), Some("walk_to"));
    }

    #[test]
    fn pair_keys_are_unordered() {
        assert_eq!(pair_key(34, 33), (33, 34));
        assert_eq!(pair_key(33, 34), (33, 34));
    }
}
