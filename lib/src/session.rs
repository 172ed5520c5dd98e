use std::collections::BTreeMap;
use std::fmt::{self, Display, Formatter};
use std::path::Path;

use crate::data::archives::{write_atomic, GameArchives, DISK_NAMES, INDEX_NAME};
use crate::data::lec::{PayloadChild, RoomChild};
use crate::error::ShuffleError;
use crate::script::{decode_script, encode_script, Script};

/// Everything known about one room after load.
#[derive(Debug, Clone, Default)]
pub struct RoomData {
    pub name: Option<String>,
    pub disk: usize,
    pub le_index: usize,
    pub lf_index: usize,
    pub globals: BTreeMap<u16, GlobalScriptData>,
    pub locals: BTreeMap<u8, RoomScriptData>,
    pub objects: BTreeMap<u16, ObjectData>,
    pub sounds: BTreeMap<u16, usize>,
    pub costumes: BTreeMap<u16, usize>,
    pub entry: Option<RoomScriptData>,
    pub exit: Option<RoomScriptData>,
}

/// A global script: its chunk index inside the `LF` plus the decoded AST.
#[derive(Debug, Clone)]
pub struct GlobalScriptData {
    pub chunk_index: usize,
    pub script: Script,
}

/// A script nested inside the room payload (`LS`/`EN`/`EX`).
#[derive(Debug, Clone)]
pub struct RoomScriptData {
    pub ro_index: usize,
    pub chunk_index: usize,
    pub script: Script,
}

#[derive(Debug, Clone)]
pub struct ObjectData {
    pub name: Vec<u8>,
    pub ro_index: usize,
    pub chunk_index: usize,
    pub verbs: Vec<VerbScript>,
}

#[derive(Debug, Clone)]
pub struct VerbScript {
    pub verb: u8,
    pub script: Script,
}

impl ObjectData {
    pub fn verb(&self, verb: u8) -> Option<&Script> {
        self.verbs.iter().find(|v| v.verb == verb).map(|v| &v.script)
    }

    pub fn verb_mut(&mut self, verb: u8) -> Option<&mut Script> {
        self.verbs
            .iter_mut()
            .find(|v| v.verb == verb)
            .map(|v| &mut v.script)
    }
}

/// Stable address of one script body, independent of AST mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ScriptRef {
    Global { room: u16, id: u16 },
    Local { room: u16, id: u8 },
    ObjectVerb { room: u16, object: u16, verb: u8 },
    Entry { room: u16 },
    Exit { room: u16 },
}

impl ScriptRef {
    pub fn room(&self) -> u16 {
        match self {
            ScriptRef::Global { room, .. }
            | ScriptRef::Local { room, .. }
            | ScriptRef::ObjectVerb { room, .. }
            | ScriptRef::Entry { room }
            | ScriptRef::Exit { room } => *room,
        }
    }
}

impl Display for ScriptRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            ScriptRef::Global { room, id } => write!(f, "room {room} global {id}"),
            ScriptRef::Local { room, id } => write!(f, "room {room} local {id}"),
            ScriptRef::ObjectVerb { room, object, verb } => {
                write!(f, "room {room} object {object} verb {verb}")
            }
            ScriptRef::Entry { room } => write!(f, "room {room} entry"),
            ScriptRef::Exit { room } => write!(f, "room {room} exit"),
        }
    }
}

/// One loaded game: the archive trees plus the decoded room map. Exactly
/// one mutation sequence runs per load; the offset tables are repaired in
/// a single pass when saving.
#[derive(Debug)]
pub struct Session {
    pub archives: GameArchives,
    pub rooms: BTreeMap<u16, RoomData>,
}

impl Session {
    pub fn load(source: &Path) -> Result<Self, ShuffleError> {
        Self::from_archives(GameArchives::load(source)?)
    }

    pub fn from_archives(archives: GameArchives) -> Result<Self, ShuffleError> {
        let names = archives.index.room_names();
        let script_map = archives
            .index
            .scripts()
            .map(|t| t.reverse_map())
            .unwrap_or_default();
        let sound_map = archives
            .index
            .sounds()
            .map(|t| t.reverse_map())
            .unwrap_or_default();
        let costume_map = archives
            .index
            .costumes()
            .map(|t| t.reverse_map())
            .unwrap_or_default();

        let mut rooms: BTreeMap<u16, RoomData> = BTreeMap::new();
        for (disk, lec) in archives.disks.iter().enumerate() {
            for (le_index, lf_index, block) in lec.rooms() {
                let room_id = block.room_id;
                let mut room = RoomData {
                    name: names.get(&(room_id as u8)).cloned(),
                    disk,
                    le_index,
                    lf_index,
                    ..RoomData::default()
                };
                for (chunk_index, child) in block.chunks.iter().enumerate() {
                    let chunk_offset = block.child_offset(chunk_index) as u32;
                    let index_key = (room_id as u8, chunk_offset);
                    match child {
                        RoomChild::GlobalScript(code) => {
                            let Some(&gid) = script_map.get(&index_key) else {
                                log::warn!(
                                    "could not find a global script id for room {room_id} chunk at 0x{chunk_offset:X}"
                                );
                                continue;
                            };
                            let script = decode_script(code, 0, true).map_err(|e| {
                                e.add_context(format!("in room {room_id} global {gid}"))
                            })?;
                            room.globals
                                .insert(gid, GlobalScriptData { chunk_index, script });
                        }
                        RoomChild::Sound(_) => {
                            let Some(&sid) = sound_map.get(&index_key) else {
                                log::warn!(
                                    "could not find a sound id for room {room_id} chunk at 0x{chunk_offset:X}"
                                );
                                continue;
                            };
                            room.sounds.insert(sid, chunk_index);
                        }
                        RoomChild::Costume(_) => {
                            let Some(&cid) = costume_map.get(&index_key) else {
                                log::warn!(
                                    "could not find a costume id for room {room_id} chunk at 0x{chunk_offset:X}"
                                );
                                continue;
                            };
                            room.costumes.insert(cid, chunk_index);
                        }
                        RoomChild::Payload(ro) => {
                            let ro_index = chunk_index;
                            for (payload_index, payload_child) in ro.chunks.iter().enumerate() {
                                match payload_child {
                                    PayloadChild::Local(ls) => {
                                        let script =
                                            decode_script(&ls.code, 0, true).map_err(|e| {
                                                e.add_context(format!(
                                                    "in room {room_id} local {}",
                                                    ls.id
                                                ))
                                            })?;
                                        room.locals.insert(
                                            ls.id,
                                            RoomScriptData {
                                                ro_index,
                                                chunk_index: payload_index,
                                                script,
                                            },
                                        );
                                    }
                                    PayloadChild::Object(oc) => {
                                        let mut verbs = Vec::with_capacity(oc.events.len());
                                        for event in &oc.events {
                                            let start = oc.event_code_offset(event).map_err(
                                                |e| {
                                                    e.add_context(format!(
                                                        "in room {room_id} object {}",
                                                        oc.header.id
                                                    ))
                                                },
                                            )?;
                                            let script = decode_script(&oc.data, start, false)
                                                .map_err(|e| {
                                                    e.add_context(format!(
                                                        "in room {room_id} object {} verb {}",
                                                        oc.header.id, event.verb
                                                    ))
                                                })?;
                                            verbs.push(VerbScript {
                                                verb: event.verb,
                                                script,
                                            });
                                        }
                                        room.objects.insert(
                                            oc.header.id,
                                            ObjectData {
                                                name: oc.name.clone(),
                                                ro_index,
                                                chunk_index: payload_index,
                                                verbs,
                                            },
                                        );
                                    }
                                    PayloadChild::Entry(code) => {
                                        let script =
                                            decode_script(code, 0, true).map_err(|e| {
                                                e.add_context(format!("in room {room_id} entry"))
                                            })?;
                                        room.entry = Some(RoomScriptData {
                                            ro_index,
                                            chunk_index: payload_index,
                                            script,
                                        });
                                    }
                                    PayloadChild::Exit(code) => {
                                        let script =
                                            decode_script(code, 0, true).map_err(|e| {
                                                e.add_context(format!("in room {room_id} exit"))
                                            })?;
                                        room.exit = Some(RoomScriptData {
                                            ro_index,
                                            chunk_index: payload_index,
                                            script,
                                        });
                                    }
                                    PayloadChild::Unknown(_) => {}
                                }
                            }
                        }
                        RoomChild::Unknown(_) => {}
                    }
                }
                rooms.insert(room_id, room);
            }
        }
        Ok(Self { archives, rooms })
    }

    pub fn room(&self, room_id: u16) -> Result<&RoomData, ShuffleError> {
        self.rooms
            .get(&room_id)
            .ok_or(ShuffleError::UnknownRoom(room_id))
    }

    pub fn room_mut(&mut self, room_id: u16) -> Result<&mut RoomData, ShuffleError> {
        self.rooms
            .get_mut(&room_id)
            .ok_or(ShuffleError::UnknownRoom(room_id))
    }

    /// Borrow the AST a reference points at, if the script exists.
    pub fn script(&self, script_ref: &ScriptRef) -> Option<&Script> {
        let room = self.rooms.get(&script_ref.room())?;
        match script_ref {
            ScriptRef::Global { id, .. } => room.globals.get(id).map(|g| &g.script),
            ScriptRef::Local { id, .. } => room.locals.get(id).map(|l| &l.script),
            ScriptRef::ObjectVerb { object, verb, .. } => {
                room.objects.get(object)?.verb(*verb)
            }
            ScriptRef::Entry { .. } => room.entry.as_ref().map(|e| &e.script),
            ScriptRef::Exit { .. } => room.exit.as_ref().map(|e| &e.script),
        }
    }

    pub fn script_mut(&mut self, script_ref: &ScriptRef) -> Option<&mut Script> {
        let room = self.rooms.get_mut(&script_ref.room())?;
        match script_ref {
            ScriptRef::Global { id, .. } => room.globals.get_mut(id).map(|g| &mut g.script),
            ScriptRef::Local { id, .. } => room.locals.get_mut(id).map(|l| &mut l.script),
            ScriptRef::ObjectVerb { object, verb, .. } => {
                room.objects.get_mut(object)?.verb_mut(*verb)
            }
            ScriptRef::Entry { .. } => room.entry.as_mut().map(|e| &mut e.script),
            ScriptRef::Exit { .. } => room.exit.as_mut().map(|e| &mut e.script),
        }
    }

    /// Re-encodes the referenced script into its chunk. For object verbs
    /// the whole object is rebuilt, event table included.
    pub fn writeback(&mut self, script_ref: &ScriptRef) -> Result<(), ShuffleError> {
        match *script_ref {
            ScriptRef::Global { room, id } => self.update_global(room, id),
            ScriptRef::Local { room, id } => self.update_local(room, id),
            ScriptRef::ObjectVerb { room, object, .. } => self.update_object(room, object),
            ScriptRef::Entry { room } => self.update_entry(room),
            ScriptRef::Exit { room } => self.update_exit(room),
        }
    }

    pub fn update_global(&mut self, room_id: u16, gid: u16) -> Result<(), ShuffleError> {
        let Session { archives, rooms } = self;
        let room = rooms
            .get(&room_id)
            .ok_or(ShuffleError::UnknownRoom(room_id))?;
        let data = room.globals.get(&gid).ok_or_else(|| {
            ShuffleError::Custom(format!("room {room_id} has no global script {gid}"))
        })?;
        let bytes = encode_script(&data.script)
            .map_err(|e| e.add_context(format!("re-encoding room {room_id} global {gid}")))?;
        let block = archives.disks[room.disk]
            .le_mut(room.le_index)
            .and_then(|le| le.room_mut(room.lf_index))
            .ok_or_else(|| {
                ShuffleError::Custom(format!("stale index path for room {room_id}"))
            })?;
        match block.chunks.get_mut(data.chunk_index) {
            Some(RoomChild::GlobalScript(code)) => {
                *code = bytes;
                Ok(())
            }
            _ => Err(ShuffleError::Custom(format!(
                "chunk {} of room {room_id} is not a global script",
                data.chunk_index
            ))),
        }
    }

    pub fn update_local(&mut self, room_id: u16, lid: u8) -> Result<(), ShuffleError> {
        let Session { archives, rooms } = self;
        let room = rooms
            .get(&room_id)
            .ok_or(ShuffleError::UnknownRoom(room_id))?;
        let data = room.locals.get(&lid).ok_or_else(|| {
            ShuffleError::Custom(format!("room {room_id} has no local script {lid}"))
        })?;
        let bytes = encode_script(&data.script)
            .map_err(|e| e.add_context(format!("re-encoding room {room_id} local {lid}")))?;
        let payload = payload_at(archives, room, data.ro_index)?;
        match payload.chunks.get_mut(data.chunk_index) {
            Some(PayloadChild::Local(ls)) => {
                ls.code = bytes;
                Ok(())
            }
            _ => Err(ShuffleError::Custom(format!(
                "payload chunk {} of room {room_id} is not a local script",
                data.chunk_index
            ))),
        }
    }

    pub fn update_entry(&mut self, room_id: u16) -> Result<(), ShuffleError> {
        let Session { archives, rooms } = self;
        let room = rooms
            .get(&room_id)
            .ok_or(ShuffleError::UnknownRoom(room_id))?;
        let data = room
            .entry
            .as_ref()
            .ok_or_else(|| ShuffleError::Custom(format!("room {room_id} has no entry script")))?;
        let bytes = encode_script(&data.script)
            .map_err(|e| e.add_context(format!("re-encoding room {room_id} entry")))?;
        let payload = payload_at(archives, room, data.ro_index)?;
        match payload.chunks.get_mut(data.chunk_index) {
            Some(PayloadChild::Entry(code)) => {
                *code = bytes;
                Ok(())
            }
            _ => Err(ShuffleError::Custom(format!(
                "payload chunk {} of room {room_id} is not an entry script",
                data.chunk_index
            ))),
        }
    }

    pub fn update_exit(&mut self, room_id: u16) -> Result<(), ShuffleError> {
        let Session { archives, rooms } = self;
        let room = rooms
            .get(&room_id)
            .ok_or(ShuffleError::UnknownRoom(room_id))?;
        let data = room
            .exit
            .as_ref()
            .ok_or_else(|| ShuffleError::Custom(format!("room {room_id} has no exit script")))?;
        let bytes = encode_script(&data.script)
            .map_err(|e| e.add_context(format!("re-encoding room {room_id} exit")))?;
        let payload = payload_at(archives, room, data.ro_index)?;
        match payload.chunks.get_mut(data.chunk_index) {
            Some(PayloadChild::Exit(code)) => {
                *code = bytes;
                Ok(())
            }
            _ => Err(ShuffleError::Custom(format!(
                "payload chunk {} of room {room_id} is not an exit script",
                data.chunk_index
            ))),
        }
    }

    pub fn update_object(&mut self, room_id: u16, object_id: u16) -> Result<(), ShuffleError> {
        let Session { archives, rooms } = self;
        let room = rooms
            .get(&room_id)
            .ok_or(ShuffleError::UnknownRoom(room_id))?;
        let data = room.objects.get(&object_id).ok_or_else(|| {
            ShuffleError::Custom(format!("room {room_id} has no object {object_id}"))
        })?;
        let mut verbs = Vec::with_capacity(data.verbs.len());
        for verb in &data.verbs {
            let code = encode_script(&verb.script).map_err(|e| {
                e.add_context(format!(
                    "re-encoding room {room_id} object {object_id} verb {}",
                    verb.verb
                ))
            })?;
            verbs.push((verb.verb, code));
        }
        let payload = payload_at(archives, room, data.ro_index)?;
        let object = payload.object_mut(data.chunk_index).ok_or_else(|| {
            ShuffleError::Custom(format!(
                "payload chunk {} of room {room_id} is not an object",
                data.chunk_index
            ))
        })?;
        object.name = data.name.clone();
        object.rebuild(&verbs)
    }

    /// Repairs every offset table and writes the output files. The
    /// destination receives files with the original names; each one goes
    /// through a temp file and an atomic rename.
    pub fn save(&mut self, dest: &Path) -> Result<(), ShuffleError> {
        log::info!("Updating resource offset tables in {INDEX_NAME}...");
        let Session { archives, rooms } = self;
        let GameArchives { disks, index } = archives;

        for (&room_id, room) in rooms.iter() {
            let Some(block) = disks[room.disk]
                .le(room.le_index)
                .and_then(|le| le.room(room.lf_index))
            else {
                return Err(ShuffleError::Custom(format!(
                    "stale index path for room {room_id}"
                )));
            };
            let globals: Vec<(u16, u32)> = room
                .globals
                .iter()
                .map(|(&gid, g)| (gid, block.child_offset(g.chunk_index) as u32))
                .collect();
            let sounds: Vec<(u16, u32)> = room
                .sounds
                .iter()
                .map(|(&sid, &chunk_index)| (sid, block.child_offset(chunk_index) as u32))
                .collect();
            let costumes: Vec<(u16, u32)> = room
                .costumes
                .iter()
                .map(|(&cid, &chunk_index)| (cid, block.child_offset(chunk_index) as u32))
                .collect();

            if let Some(table) = index.scripts_mut() {
                repair_table(table, &globals, room_id, "0S");
            }
            if let Some(table) = index.sounds_mut() {
                repair_table(table, &sounds, room_id, "0N");
            }
            if let Some(table) = index.costumes_mut() {
                repair_table(table, &costumes, room_id, "0C");
            }
        }

        // Per-archive file-offset tables: the LF chunk's position in the
        // archive, header included.
        for (&room_id, room) in rooms.iter() {
            let Some(le) = disks[room.disk].le_mut(room.le_index) else {
                continue;
            };
            let lf_offset =
                6 + (0..room.lf_index).map(|j| le.child_len(j)).sum::<usize>() as u32;
            let Some(fo) = le.file_offsets_mut() else {
                log::warn!("{} has no FO table", DISK_NAMES[room.disk]);
                continue;
            };
            for entry in fo.entries.iter_mut().filter(|e| e.room_id as u16 == room_id) {
                if entry.offset != lf_offset {
                    log::debug!(
                        "{} FO table - room {}: offset {} -> {}",
                        DISK_NAMES[room.disk],
                        room_id,
                        entry.offset,
                        lf_offset
                    );
                    entry.offset = lf_offset;
                }
            }
        }

        std::fs::create_dir_all(dest).map_err(|e| {
            ShuffleError::Io(format!("Couldn't create {}", dest.display()), e)
        })?;
        log::info!("Generating new {INDEX_NAME}...");
        write_atomic(dest, INDEX_NAME, &self.archives.emit_index())?;
        for (disk_number, name) in DISK_NAMES
            .iter()
            .enumerate()
            .take(self.archives.disks.len())
        {
            log::info!("Generating new {name}...");
            write_atomic(dest, name, &self.archives.emit_disk(disk_number))?;
        }
        Ok(())
    }
}

fn payload_at<'a>(
    archives: &'a mut GameArchives,
    room: &RoomData,
    ro_index: usize,
) -> Result<&'a mut crate::data::lec::RoomPayload, ShuffleError> {
    archives.disks[room.disk]
        .le_mut(room.le_index)
        .and_then(|le| le.room_mut(room.lf_index))
        .and_then(|block| match block.chunks.get_mut(ro_index) {
            Some(RoomChild::Payload(ro)) => Some(ro),
            _ => None,
        })
        .ok_or_else(|| ShuffleError::Custom("stale room payload index".into()))
}

fn repair_table(
    table: &mut crate::data::index::ResourceTable,
    updates: &[(u16, u32)],
    room_id: u16,
    table_name: &str,
) {
    for &(id, new_offset) in updates {
        let Some(item) = table.items.get_mut(id as usize) else {
            log::warn!("{table_name} table has no entry {id} (room {room_id})");
            continue;
        };
        if item.offset != new_offset {
            log::debug!(
                "{INDEX_NAME} {table_name} table - id {id} - offset {} -> {new_offset}",
                item.offset
            );
            item.offset = new_offset;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::index::IndexChild;
    use crate::data::lec::LecFile;
    use crate::data::index::MasterIndex;
    use crate::script::op::{Instr, Op, Operand};
    use crate::script::var::VarRef;
    use crate::testutil::{build_archives, room_with_exits};
    use crate::xor::{xor_buf, ARCHIVE_KEY};

    fn sample_session() -> Session {
        let mut dock = room_with_exits(33, "dock", &[34]);
        // move VAR[19] <- 6 ; stopObjectCode
        dock.globals.push(vec![0x1A, 0x13, 0x00, 0x06, 0x00, 0x00]);
        dock.locals.push((200, vec![0x80, 0x00]));
        let high = room_with_exits(34, "high", &[33]);
        Session::from_archives(build_archives(vec![dock, high])).unwrap()
    }

    #[test]
    fn room_map_is_built() {
        let session = sample_session();
        let dock = session.room(33).unwrap();
        assert_eq!(dock.name.as_deref(), Some("dock"));
        assert_eq!(dock.globals.len(), 1);
        assert_eq!(dock.globals[&0].script.len(), 2);
        assert_eq!(dock.locals[&200].script.len(), 2);
        assert!(dock.entry.is_some());
        assert!(dock.exit.is_some());
        let object = &dock.objects[&334];
        let verb = object.verb(10).expect("walk_to verb decoded");
        assert_eq!(verb[0].1.op.room_target(), Some(34));
        assert!(session.room(34).is_ok());
        assert!(session.room(99).is_err());
    }

    #[test]
    fn script_refs_resolve() {
        let session = sample_session();
        for script_ref in [
            ScriptRef::Global { room: 33, id: 0 },
            ScriptRef::Local { room: 33, id: 200 },
            ScriptRef::ObjectVerb {
                room: 33,
                object: 334,
                verb: 10,
            },
            ScriptRef::Entry { room: 33 },
            ScriptRef::Exit { room: 33 },
        ] {
            assert!(session.script(&script_ref).is_some(), "missing {script_ref}");
        }
        assert!(session
            .script(&ScriptRef::ObjectVerb {
                room: 33,
                object: 334,
                verb: 9,
            })
            .is_none());
    }

    #[test]
    fn untouched_writeback_is_byte_identical() {
        let archives = build_archives(vec![
            {
                let mut dock = room_with_exits(33, "dock", &[34]);
                dock.globals.push(vec![0x1A, 0x13, 0x00, 0x06, 0x00, 0x00]);
                dock
            },
            room_with_exits(34, "high", &[33]),
        ]);
        let before = archives.disks[0].write();
        let mut session = Session::from_archives(archives).unwrap();
        session.update_global(33, 0).unwrap();
        session.update_object(33, 334).unwrap();
        session.update_entry(33).unwrap();
        session.update_exit(33).unwrap();
        assert_eq!(session.archives.disks[0].write(), before);
    }

    #[test]
    fn missing_index_entries_warn_and_skip() {
        let mut archives = build_archives(vec![{
            let mut dock = room_with_exits(33, "dock", &[34]);
            dock.globals.push(vec![0x00]);
            dock
        }]);
        if let Some(table) = archives.index.scripts_mut() {
            table.items.clear();
        }
        let session = Session::from_archives(archives).unwrap();
        // the chunk stays in the tree but is not addressable by id
        assert!(session.room(33).unwrap().globals.is_empty());
    }

    #[test]
    fn save_repairs_offset_tables() {
        let mut session = sample_session();
        // Grow the dock's global script so everything after it shifts.
        {
            let script = &mut session.rooms.get_mut(&33).unwrap().globals.get_mut(&0).unwrap().script;
            script.insert(
                0,
                (
                    0,
                    Instr::synthetic(
                        0x1A,
                        Op::Move {
                            target: VarRef::new(39),
                            value: Operand::Imm(1),
                        },
                    ),
                ),
            );
        }
        session.update_global(33, 0).unwrap();

        let dir = tempfile::tempdir().unwrap();
        session.save(dir.path()).unwrap();

        let mut disk_bytes = std::fs::read(dir.path().join(DISK_NAMES[0])).unwrap();
        xor_buf(&mut disk_bytes, ARCHIVE_KEY);
        let disk = LecFile::parse(&disk_bytes).unwrap();
        let index_bytes = std::fs::read(dir.path().join(INDEX_NAME)).unwrap();
        let index = MasterIndex::parse(&index_bytes).unwrap();

        // every 0S entry lands on the global script chunk it names
        let table = index.scripts().unwrap();
        let mut checked = 0;
        for (_, _, block) in disk.rooms() {
            for (chunk_index, child) in block.chunks.iter().enumerate() {
                if matches!(child, RoomChild::GlobalScript(_)) {
                    let offset = block.child_offset(chunk_index) as u32;
                    assert!(
                        table
                            .items
                            .iter()
                            .any(|item| item.room_id == block.room_id as u8
                                && item.offset == offset),
                        "no index entry for room {} chunk at {}",
                        block.room_id,
                        offset
                    );
                    checked += 1;
                }
            }
        }
        assert_eq!(checked, 1);

        // the FO table points at each LF chunk header
        let le = disk.le(0).unwrap();
        let crate::data::lec::LeChild::FileOffsets(fo) = &le.chunks[0] else {
            panic!("FO table missing");
        };
        for (_, lf_index, block) in disk.rooms() {
            let expect = 6 + (0..lf_index).map(|j| le.child_len(j)).sum::<usize>() as u32;
            let entry = fo
                .entries
                .iter()
                .find(|e| e.room_id as u16 == block.room_id)
                .unwrap();
            assert_eq!(entry.offset, expect, "room {}", block.room_id);
        }

        // the room name table is untouched
        assert!(index
            .chunks
            .iter()
            .any(|c| matches!(c, IndexChild::RoomNames(rn) if rn.entries.len() == 2)));
    }
}
