use std::collections::BTreeMap;
use std::io::Cursor;

use binrw::{binrw, BinReaderExt};

use crate::data::chunk::{write_chunk_with, ChunkReader, RawChunk};
use crate::error::ShuffleError;
use crate::xor::{xor_buf, NAME_KEY};

const NAME_LEN: usize = 9;

/// The master index file `000.LFL`. The file itself is not obfuscated;
/// only the room name entries are, each XORed with 0xFF. The `0R` and
/// `0O` tables ride along as opaque chunks.
#[derive(Debug, Clone)]
pub struct MasterIndex {
    pub chunks: Vec<IndexChild>,
}

#[derive(Debug, Clone)]
pub enum IndexChild {
    RoomNames(RoomNameTable),
    /// `0S`, global script id to (room, offset).
    Scripts(ResourceTable),
    /// `0N`, global sound id to (room, offset).
    Sounds(ResourceTable),
    /// `0C`, global costume id to (room, offset).
    Costumes(ResourceTable),
    Unknown(RawChunk),
}

/// `RN`: id plus fixed-width, NUL-padded, XOR-obfuscated name, terminated
/// by a zero id byte.
#[derive(Debug, Clone, Default)]
pub struct RoomNameTable {
    pub entries: Vec<RoomNameEntry>,
}

#[derive(Debug, Clone)]
pub struct RoomNameEntry {
    pub id: u8,
    /// De-obfuscated name bytes, still NUL-padded to width.
    pub name: [u8; NAME_LEN],
}

impl RoomNameEntry {
    pub fn name_str(&self) -> String {
        let trimmed: Vec<u8> = self
            .name
            .iter()
            .copied()
            .take_while(|&b| b != 0)
            .collect();
        String::from_utf8_lossy(&trimmed).into_owned()
    }
}

/// One of the `0S`/`0N`/`0C` tables: global id (the item's position) to
/// the owning room and the chunk offset inside that room's `LF`.
#[derive(Debug, Clone, Default)]
pub struct ResourceTable {
    pub items: Vec<ResourceLocation>,
}

#[binrw]
#[brw(little)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceLocation {
    pub room_id: u8,
    pub offset: u32,
}

impl MasterIndex {
    pub fn parse(buf: &[u8]) -> Result<Self, ShuffleError> {
        let mut chunks = Vec::new();
        let mut reader = ChunkReader::new(buf, 0);
        while let Some(chunk) = reader.next_chunk()? {
            let base = chunk.offset + 6;
            chunks.push(match &chunk.tag {
                b"RN" => IndexChild::RoomNames(RoomNameTable::parse(chunk.body, base)?),
                b"0S" => IndexChild::Scripts(ResourceTable::parse(chunk.body, base)?),
                b"0N" => IndexChild::Sounds(ResourceTable::parse(chunk.body, base)?),
                b"0C" => IndexChild::Costumes(ResourceTable::parse(chunk.body, base)?),
                _ => IndexChild::Unknown(RawChunk {
                    tag: chunk.tag,
                    body: chunk.body.to_vec(),
                }),
            });
        }
        Ok(Self { chunks })
    }

    pub fn write(&self) -> Vec<u8> {
        let mut out = Vec::new();
        for child in &self.chunks {
            match child {
                IndexChild::RoomNames(rn) => {
                    write_chunk_with(&mut out, b"RN", |out| rn.write_body(out))
                }
                IndexChild::Scripts(table) => {
                    write_chunk_with(&mut out, b"0S", |out| table.write_body(out))
                }
                IndexChild::Sounds(table) => {
                    write_chunk_with(&mut out, b"0N", |out| table.write_body(out))
                }
                IndexChild::Costumes(table) => {
                    write_chunk_with(&mut out, b"0C", |out| table.write_body(out))
                }
                IndexChild::Unknown(raw) => raw.write(&mut out),
            }
        }
        out
    }

    pub fn room_names(&self) -> BTreeMap<u8, String> {
        self.chunks
            .iter()
            .find_map(|c| match c {
                IndexChild::RoomNames(rn) => Some(rn),
                _ => None,
            })
            .map(|rn| {
                rn.entries
                    .iter()
                    .map(|e| (e.id, e.name_str()))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn scripts(&self) -> Option<&ResourceTable> {
        self.chunks.iter().find_map(|c| match c {
            IndexChild::Scripts(t) => Some(t),
            _ => None,
        })
    }

    pub fn sounds(&self) -> Option<&ResourceTable> {
        self.chunks.iter().find_map(|c| match c {
            IndexChild::Sounds(t) => Some(t),
            _ => None,
        })
    }

    pub fn costumes(&self) -> Option<&ResourceTable> {
        self.chunks.iter().find_map(|c| match c {
            IndexChild::Costumes(t) => Some(t),
            _ => None,
        })
    }

    pub fn scripts_mut(&mut self) -> Option<&mut ResourceTable> {
        self.chunks.iter_mut().find_map(|c| match c {
            IndexChild::Scripts(t) => Some(t),
            _ => None,
        })
    }

    pub fn sounds_mut(&mut self) -> Option<&mut ResourceTable> {
        self.chunks.iter_mut().find_map(|c| match c {
            IndexChild::Sounds(t) => Some(t),
            _ => None,
        })
    }

    pub fn costumes_mut(&mut self) -> Option<&mut ResourceTable> {
        self.chunks.iter_mut().find_map(|c| match c {
            IndexChild::Costumes(t) => Some(t),
            _ => None,
        })
    }
}

impl RoomNameTable {
    fn parse(body: &[u8], base: u64) -> Result<Self, ShuffleError> {
        let mut entries = Vec::new();
        let mut pos = 0usize;
        loop {
            if pos >= body.len() {
                return Err(ShuffleError::decode_at(
                    base + pos as u64,
                    "room name table missing its terminator",
                ));
            }
            let id = body[pos];
            pos += 1;
            if id == 0 {
                break;
            }
            if pos + NAME_LEN > body.len() {
                return Err(ShuffleError::decode_at(
                    base + pos as u64,
                    format!("truncated name entry for room {id}"),
                ));
            }
            let mut name = [0u8; NAME_LEN];
            name.copy_from_slice(&body[pos..pos + NAME_LEN]);
            xor_buf(&mut name, NAME_KEY);
            entries.push(RoomNameEntry { id, name });
            pos += NAME_LEN;
        }
        Ok(Self { entries })
    }

    fn write_body(&self, out: &mut Vec<u8>) {
        for entry in &self.entries {
            out.push(entry.id);
            let mut name = entry.name;
            xor_buf(&mut name, NAME_KEY);
            out.extend_from_slice(&name);
        }
        out.push(0x00);
    }
}

impl ResourceTable {
    fn parse(body: &[u8], base: u64) -> Result<Self, ShuffleError> {
        let mut cur = Cursor::new(body);
        let count: u16 = cur
            .read_le()
            .map_err(|e| ShuffleError::decode_at(base, format!("empty index table: {e}")))?;
        let mut items = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let at = base + cur.position();
            items.push(cur.read_le().map_err(|e| {
                ShuffleError::decode_at(at, format!("truncated index entry: {e}"))
            })?);
        }
        Ok(Self { items })
    }

    fn write_body(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&(self.items.len() as u16).to_le_bytes());
        for item in &self.items {
            out.push(item.room_id);
            out.extend_from_slice(&item.offset.to_le_bytes());
        }
    }

    /// Reverse map for load: (room, chunk offset) back to global id.
    pub fn reverse_map(&self) -> BTreeMap<(u8, u32), u16> {
        self.items
            .iter()
            .enumerate()
            .map(|(id, item)| ((item.room_id, item.offset), id as u16))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_index() -> Vec<u8> {
        let mut file = Vec::new();
        write_chunk_with(&mut file, b"RN", |out| {
            out.push(33);
            let mut name = *b"dock\x00\x00\x00\x00\x00";
            xor_buf(&mut name, NAME_KEY);
            out.extend_from_slice(&name);
            out.push(0x00);
        });
        // unparsed room table stays opaque
        write_chunk_with(&mut file, b"0R", |out| out.extend_from_slice(&[0, 0]));
        write_chunk_with(&mut file, b"0S", |out| {
            out.extend_from_slice(&2u16.to_le_bytes());
            out.push(33);
            out.extend_from_slice(&0u32.to_le_bytes());
            out.push(33);
            out.extend_from_slice(&0x40u32.to_le_bytes());
        });
        write_chunk_with(&mut file, b"0N", |out| {
            out.extend_from_slice(&0u16.to_le_bytes());
        });
        write_chunk_with(&mut file, b"0C", |out| {
            out.extend_from_slice(&0u16.to_le_bytes());
        });
        file
    }

    #[test]
    fn parse_and_emit_round_trip() {
        let file = sample_index();
        let parsed = MasterIndex::parse(&file).unwrap();
        assert_eq!(parsed.write(), file);
    }

    #[test]
    fn names_are_deobfuscated() {
        let parsed = MasterIndex::parse(&sample_index()).unwrap();
        assert_eq!(parsed.room_names().get(&33).map(String::as_str), Some("dock"));
    }

    #[test]
    fn reverse_map_keys_on_room_and_offset() {
        let parsed = MasterIndex::parse(&sample_index()).unwrap();
        let map = parsed.scripts().unwrap().reverse_map();
        assert_eq!(map.get(&(33, 0)), Some(&0));
        assert_eq!(map.get(&(33, 0x40)), Some(&1));
    }

    #[test]
    fn unknown_tables_kept_verbatim() {
        let parsed = MasterIndex::parse(&sample_index()).unwrap();
        assert!(parsed
            .chunks
            .iter()
            .any(|c| matches!(c, IndexChild::Unknown(raw) if raw.tag == *b"0R")));
    }
}
