//! Builders for a miniature game image, shared by the session and
//! shuffle tests. The resulting archives are structurally faithful:
//! real chunk trees, a consistent master index and file-offset table.

use crate::data::archives::GameArchives;
use crate::data::index::{
    IndexChild, MasterIndex, ResourceLocation, ResourceTable, RoomNameEntry, RoomNameTable,
};
use crate::data::lec::{
    FileOffset, FileOffsetTable, Le, LeChild, LecChild, LecFile, LocalScript, PayloadChild,
    RoomBlock, RoomChild, RoomPayload,
};
use crate::data::object::{ObjectCode, ObjectHeader};

#[derive(Default, Clone)]
pub struct RoomSpec {
    pub id: u16,
    pub name: Option<&'static str>,
    /// (object id, [(verb, code)])
    pub objects: Vec<(u16, Vec<(u8, Vec<u8>)>)>,
    pub locals: Vec<(u8, Vec<u8>)>,
    /// Global ids are assigned sequentially in declaration order across
    /// all rooms.
    pub globals: Vec<Vec<u8>>,
    pub entry: Option<Vec<u8>>,
    pub exit: Option<Vec<u8>>,
}

pub fn make_object(id: u16, name: &[u8], verbs: &[(u8, Vec<u8>)]) -> ObjectCode {
    let mut object = ObjectCode {
        header: ObjectHeader {
            id,
            unk: 0,
            x: 8,
            y: 4,
            parent_state: false,
            width: 4,
            parent: 0,
            walk_x: 16,
            walk_y: 24,
            height: 3,
            actor_dir: false,
            name_offset: 0,
        },
        events: Vec::new(),
        name: name.to_vec(),
        data: Vec::new(),
    };
    object
        .rebuild(&verbs.to_vec())
        .expect("test object code fits");
    object
}

/// Builds one disk plus a matching master index.
pub fn build_archives(rooms: Vec<RoomSpec>) -> GameArchives {
    let mut le_chunks: Vec<LeChild> = vec![LeChild::FileOffsets(FileOffsetTable {
        entries: rooms
            .iter()
            .map(|r| FileOffset {
                room_id: r.id as u8,
                offset: 0,
            })
            .collect(),
    })];

    let mut names = Vec::new();
    for spec in &rooms {
        if let Some(name) = spec.name {
            let mut padded = [0u8; 9];
            padded[..name.len()].copy_from_slice(name.as_bytes());
            names.push(RoomNameEntry {
                id: spec.id as u8,
                name: padded,
            });
        }
        let mut payload = RoomPayload { chunks: Vec::new() };
        for (id, code) in &spec.locals {
            payload.chunks.push(PayloadChild::Local(LocalScript {
                id: *id,
                code: code.clone(),
            }));
        }
        for (object_id, verbs) in &spec.objects {
            payload
                .chunks
                .push(PayloadChild::Object(make_object(*object_id, b"thing", verbs)));
        }
        payload.chunks.push(PayloadChild::Entry(
            spec.entry.clone().unwrap_or_else(|| vec![0x00]),
        ));
        payload.chunks.push(PayloadChild::Exit(
            spec.exit.clone().unwrap_or_else(|| vec![0x00]),
        ));

        let mut chunks = vec![RoomChild::Payload(payload)];
        for code in &spec.globals {
            chunks.push(RoomChild::GlobalScript(code.clone()));
        }
        le_chunks.push(LeChild::Room(RoomBlock {
            room_id: spec.id,
            chunks,
        }));
    }

    let disk = LecFile {
        chunks: vec![LecChild::Le(Le { chunks: le_chunks })],
    };

    // Index the globals the way the loader expects to find them, and give
    // the FO table its real offsets.
    let mut script_items = Vec::new();
    let le = match &disk.chunks[0] {
        LecChild::Le(le) => le,
        LecChild::Unknown(_) => unreachable!(),
    };
    for (_, _, block) in disk.rooms() {
        for (chunk_index, child) in block.chunks.iter().enumerate() {
            if matches!(child, RoomChild::GlobalScript(_)) {
                script_items.push(ResourceLocation {
                    room_id: block.room_id as u8,
                    offset: block.child_offset(chunk_index) as u32,
                });
            }
        }
    }
    let fo_entries: Vec<FileOffset> = disk
        .rooms()
        .map(|(_, lf_index, block)| FileOffset {
            room_id: block.room_id as u8,
            offset: 6 + (0..lf_index).map(|j| le.child_len(j)).sum::<usize>() as u32,
        })
        .collect();

    let mut disk = disk;
    if let Some(le) = disk.le_mut(0) {
        if let Some(fo) = le.file_offsets_mut() {
            fo.entries = fo_entries;
        }
    }

    let index = MasterIndex {
        chunks: vec![
            IndexChild::RoomNames(RoomNameTable { entries: names }),
            IndexChild::Scripts(ResourceTable {
                items: script_items,
            }),
            IndexChild::Sounds(ResourceTable::default()),
            IndexChild::Costumes(ResourceTable::default()),
        ],
    };

    GameArchives {
        disks: vec![disk],
        index,
    }
}

/// `loadRoomWithEgo(obj, room, x, y)` followed by `stopObjectCode`, the
/// shape of a plain hotspot exit script.
pub fn exit_script(obj: u16, room: u16) -> Vec<u8> {
    let mut code = vec![0x24];
    code.extend_from_slice(&(obj as i16).to_le_bytes());
    code.push(room as u8);
    code.extend_from_slice(&20i16.to_le_bytes());
    code.extend_from_slice(&30i16.to_le_bytes());
    code.push(0x00);
    code
}

/// A room with a hotspot object per destination. Object ids encode the
/// destination so tests can tell them apart.
pub fn room_with_exits(id: u16, name: &'static str, destinations: &[u16]) -> RoomSpec {
    RoomSpec {
        id,
        name: Some(name),
        objects: destinations
            .iter()
            .map(|&dest| {
                (
                    id * 10 + dest % 10,
                    vec![(10u8, exit_script(500 + dest, dest))],
                )
            })
            .collect(),
        ..RoomSpec::default()
    }
}
