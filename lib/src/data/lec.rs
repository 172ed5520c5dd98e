use std::io::Cursor;

use binrw::{binrw, BinReaderExt};

use crate::data::chunk::{write_chunk_with, ChunkReader, RawChunk, HEADER_SIZE};
use crate::data::object::ObjectCode;
use crate::error::ShuffleError;

/// One `DISK0x.LEC` archive, parsed to its chunk tree. The obfuscation is
/// already stripped by the time this sees the bytes.
#[derive(Debug, Clone)]
pub struct LecFile {
    pub chunks: Vec<LecChild>,
}

#[derive(Debug, Clone)]
pub enum LecChild {
    Le(Le),
    Unknown(RawChunk),
}

/// The single `LE` container a disk carries: a file-offset table followed
/// by the room records.
#[derive(Debug, Clone)]
pub struct Le {
    pub chunks: Vec<LeChild>,
}

#[derive(Debug, Clone)]
pub enum LeChild {
    FileOffsets(FileOffsetTable),
    Room(RoomBlock),
    Unknown(RawChunk),
}

/// `FO`: room id to absolute archive offset of the room's `LF` chunk.
#[derive(Debug, Clone, Default)]
pub struct FileOffsetTable {
    pub entries: Vec<FileOffset>,
}

#[binrw]
#[brw(little)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileOffset {
    pub room_id: u8,
    pub offset: u32,
}

/// `LF`: a room id plus the room's resource chunks.
#[derive(Debug, Clone)]
pub struct RoomBlock {
    pub room_id: u16,
    pub chunks: Vec<RoomChild>,
}

#[derive(Debug, Clone)]
pub enum RoomChild {
    /// `RO`, the room payload.
    Payload(RoomPayload),
    /// `SC`, a global script body.
    GlobalScript(Vec<u8>),
    /// `SO`, kept opaque.
    Sound(Vec<u8>),
    /// `CO`, kept opaque.
    Costume(Vec<u8>),
    Unknown(RawChunk),
}

#[derive(Debug, Clone)]
pub struct RoomPayload {
    pub chunks: Vec<PayloadChild>,
}

#[derive(Debug, Clone)]
pub enum PayloadChild {
    Local(LocalScript),
    Object(ObjectCode),
    Entry(Vec<u8>),
    Exit(Vec<u8>),
    Unknown(RawChunk),
}

/// `LS`: a local script id and its code.
#[derive(Debug, Clone)]
pub struct LocalScript {
    pub id: u8,
    pub code: Vec<u8>,
}

impl LecFile {
    pub fn parse(buf: &[u8]) -> Result<Self, ShuffleError> {
        let mut chunks = Vec::new();
        let mut reader = ChunkReader::new(buf, 0);
        while let Some(chunk) = reader.next_chunk()? {
            chunks.push(match &chunk.tag {
                b"LE" => LecChild::Le(Le::parse(chunk.body, chunk.offset + HEADER_SIZE as u64)?),
                _ => LecChild::Unknown(RawChunk {
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
                LecChild::Le(le) => write_chunk_with(&mut out, b"LE", |out| le.write_body(out)),
                LecChild::Unknown(raw) => raw.write(&mut out),
            }
        }
        out
    }

    /// The rooms of every `LE` in the archive, with their index paths.
    pub fn rooms(&self) -> impl Iterator<Item = (usize, usize, &RoomBlock)> {
        self.chunks.iter().enumerate().flat_map(|(le_index, child)| {
            let le_chunks: &[LeChild] = match child {
                LecChild::Le(le) => &le.chunks,
                LecChild::Unknown(_) => &[],
            };
            le_chunks
                .iter()
                .enumerate()
                .filter_map(move |(lf_index, lf)| match lf {
                    LeChild::Room(room) => Some((le_index, lf_index, room)),
                    _ => None,
                })
        })
    }

    pub fn le_mut(&mut self, le_index: usize) -> Option<&mut Le> {
        match self.chunks.get_mut(le_index) {
            Some(LecChild::Le(le)) => Some(le),
            _ => None,
        }
    }

    pub fn le(&self, le_index: usize) -> Option<&Le> {
        match self.chunks.get(le_index) {
            Some(LecChild::Le(le)) => Some(le),
            _ => None,
        }
    }
}

impl Le {
    fn parse(body: &[u8], base: u64) -> Result<Self, ShuffleError> {
        let mut chunks = Vec::new();
        let mut reader = ChunkReader::new(body, base);
        while let Some(chunk) = reader.next_chunk()? {
            let inner_base = chunk.offset + HEADER_SIZE as u64;
            chunks.push(match &chunk.tag {
                b"FO" => LeChild::FileOffsets(FileOffsetTable::parse(chunk.body, inner_base)?),
                b"LF" => LeChild::Room(RoomBlock::parse(chunk.body, inner_base)?),
                _ => LeChild::Unknown(RawChunk {
                    tag: chunk.tag,
                    body: chunk.body.to_vec(),
                }),
            });
        }
        Ok(Self { chunks })
    }

    fn write_body(&self, out: &mut Vec<u8>) {
        for child in &self.chunks {
            match child {
                LeChild::FileOffsets(fo) => {
                    write_chunk_with(out, b"FO", |out| fo.write_body(out))
                }
                LeChild::Room(room) => write_chunk_with(out, b"LF", |out| room.write_body(out)),
                LeChild::Unknown(raw) => raw.write(out),
            }
        }
    }

    pub fn child_len(&self, index: usize) -> usize {
        match &self.chunks[index] {
            LeChild::FileOffsets(fo) => fo.encoded_len(),
            LeChild::Room(room) => room.encoded_len(),
            LeChild::Unknown(raw) => raw.encoded_len(),
        }
    }

    pub fn file_offsets_mut(&mut self) -> Option<&mut FileOffsetTable> {
        self.chunks.iter_mut().find_map(|c| match c {
            LeChild::FileOffsets(fo) => Some(fo),
            _ => None,
        })
    }

    pub fn room_mut(&mut self, lf_index: usize) -> Option<&mut RoomBlock> {
        match self.chunks.get_mut(lf_index) {
            Some(LeChild::Room(room)) => Some(room),
            _ => None,
        }
    }

    pub fn room(&self, lf_index: usize) -> Option<&RoomBlock> {
        match self.chunks.get(lf_index) {
            Some(LeChild::Room(room)) => Some(room),
            _ => None,
        }
    }
}

impl FileOffsetTable {
    fn parse(body: &[u8], base: u64) -> Result<Self, ShuffleError> {
        let mut cur = Cursor::new(body);
        let count: u8 = cur
            .read_le()
            .map_err(|e| ShuffleError::decode_at(base, format!("empty FO table: {e}")))?;
        let mut entries = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let at = base + cur.position();
            entries.push(cur.read_le().map_err(|e| {
                ShuffleError::decode_at(at, format!("truncated FO entry: {e}"))
            })?);
        }
        Ok(Self { entries })
    }

    fn write_body(&self, out: &mut Vec<u8>) {
        out.push(self.entries.len() as u8);
        for entry in &self.entries {
            out.push(entry.room_id);
            out.extend_from_slice(&entry.offset.to_le_bytes());
        }
    }

    pub fn encoded_len(&self) -> usize {
        HEADER_SIZE + 1 + 5 * self.entries.len()
    }
}

impl RoomBlock {
    fn parse(body: &[u8], base: u64) -> Result<Self, ShuffleError> {
        if body.len() < 2 {
            return Err(ShuffleError::decode_at(base, "LF chunk too short for a room id"));
        }
        let room_id = u16::from_le_bytes(body[..2].try_into().unwrap());
        let mut chunks = Vec::new();
        let mut reader = ChunkReader::new(&body[2..], base + 2);
        while let Some(chunk) = reader.next_chunk()? {
            let inner_base = chunk.offset + HEADER_SIZE as u64;
            chunks.push(match &chunk.tag {
                b"RO" => RoomChild::Payload(RoomPayload::parse(chunk.body, inner_base)?),
                b"SC" => RoomChild::GlobalScript(chunk.body.to_vec()),
                b"SO" => RoomChild::Sound(chunk.body.to_vec()),
                b"CO" => RoomChild::Costume(chunk.body.to_vec()),
                _ => RoomChild::Unknown(RawChunk {
                    tag: chunk.tag,
                    body: chunk.body.to_vec(),
                }),
            });
        }
        Ok(Self { room_id, chunks })
    }

    fn write_body(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.room_id.to_le_bytes());
        for child in &self.chunks {
            match child {
                RoomChild::Payload(ro) => write_chunk_with(out, b"RO", |out| ro.write_body(out)),
                RoomChild::GlobalScript(code) => {
                    write_chunk_with(out, b"SC", |out| out.extend_from_slice(code))
                }
                RoomChild::Sound(body) => {
                    write_chunk_with(out, b"SO", |out| out.extend_from_slice(body))
                }
                RoomChild::Costume(body) => {
                    write_chunk_with(out, b"CO", |out| out.extend_from_slice(body))
                }
                RoomChild::Unknown(raw) => raw.write(out),
            }
        }
    }

    pub fn child_len(&self, index: usize) -> usize {
        match &self.chunks[index] {
            RoomChild::Payload(ro) => ro.encoded_len(),
            RoomChild::GlobalScript(code) => HEADER_SIZE + code.len(),
            RoomChild::Sound(body) => HEADER_SIZE + body.len(),
            RoomChild::Costume(body) => HEADER_SIZE + body.len(),
            RoomChild::Unknown(raw) => raw.encoded_len(),
        }
    }

    /// Offset of child `index` as the master index records it: relative to
    /// the first child chunk of the room block.
    pub fn child_offset(&self, index: usize) -> usize {
        (0..index).map(|i| self.child_len(i)).sum()
    }

    pub fn encoded_len(&self) -> usize {
        HEADER_SIZE + 2 + (0..self.chunks.len()).map(|i| self.child_len(i)).sum::<usize>()
    }

    pub fn payload_mut(&mut self) -> Option<&mut RoomPayload> {
        self.chunks.iter_mut().find_map(|c| match c {
            RoomChild::Payload(ro) => Some(ro),
            _ => None,
        })
    }
}

impl RoomPayload {
    fn parse(body: &[u8], base: u64) -> Result<Self, ShuffleError> {
        let mut chunks = Vec::new();
        let mut reader = ChunkReader::new(body, base);
        while let Some(chunk) = reader.next_chunk()? {
            let inner_base = chunk.offset + HEADER_SIZE as u64;
            chunks.push(match &chunk.tag {
                b"LS" => {
                    if chunk.body.is_empty() {
                        return Err(ShuffleError::decode_at(
                            inner_base,
                            "LS chunk missing its script id",
                        ));
                    }
                    PayloadChild::Local(LocalScript {
                        id: chunk.body[0],
                        code: chunk.body[1..].to_vec(),
                    })
                }
                b"OC" => PayloadChild::Object(ObjectCode::parse(chunk.body, inner_base)?),
                b"EN" => PayloadChild::Entry(chunk.body.to_vec()),
                b"EX" => PayloadChild::Exit(chunk.body.to_vec()),
                _ => PayloadChild::Unknown(RawChunk {
                    tag: chunk.tag,
                    body: chunk.body.to_vec(),
                }),
            });
        }
        Ok(Self { chunks })
    }

    fn write_body(&self, out: &mut Vec<u8>) {
        for child in &self.chunks {
            match child {
                PayloadChild::Local(ls) => write_chunk_with(out, b"LS", |out| {
                    out.push(ls.id);
                    out.extend_from_slice(&ls.code);
                }),
                PayloadChild::Object(oc) => write_chunk_with(out, b"OC", |out| oc.write(out)),
                PayloadChild::Entry(code) => {
                    write_chunk_with(out, b"EN", |out| out.extend_from_slice(code))
                }
                PayloadChild::Exit(code) => {
                    write_chunk_with(out, b"EX", |out| out.extend_from_slice(code))
                }
                PayloadChild::Unknown(raw) => raw.write(out),
            }
        }
    }

    pub fn encoded_len(&self) -> usize {
        self.chunks
            .iter()
            .map(|child| match child {
                PayloadChild::Local(ls) => HEADER_SIZE + 1 + ls.code.len(),
                PayloadChild::Object(oc) => oc.encoded_len(),
                PayloadChild::Entry(code) | PayloadChild::Exit(code) => HEADER_SIZE + code.len(),
                PayloadChild::Unknown(raw) => raw.encoded_len(),
            })
            .sum()
    }

    pub fn object_mut(&mut self, index: usize) -> Option<&mut ObjectCode> {
        match self.chunks.get_mut(index) {
            Some(PayloadChild::Object(oc)) => Some(oc),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tiny_archive() -> Vec<u8> {
        let mut lf_body = Vec::new();
        lf_body.extend_from_slice(&33u16.to_le_bytes());
        write_chunk_with(&mut lf_body, b"RO", |ro| {
            write_chunk_with(ro, b"EN", |en| en.extend_from_slice(&[0x00]));
            write_chunk_with(ro, b"EX", |ex| ex.extend_from_slice(&[0x00]));
        });
        write_chunk_with(&mut lf_body, b"SC", |sc| {
            sc.extend_from_slice(&[0x18, 0x00, 0x00, 0x00])
        });

        let mut le_body = Vec::new();
        write_chunk_with(&mut le_body, b"FO", |fo| {
            fo.push(1);
            fo.push(33);
            fo.extend_from_slice(&0u32.to_le_bytes());
        });
        write_chunk_with(&mut le_body, b"LF", |lf| lf.extend_from_slice(&lf_body));

        let mut file = Vec::new();
        write_chunk_with(&mut file, b"LE", |le| le.extend_from_slice(&le_body));
        file
    }

    #[test]
    fn parse_and_emit_round_trip() {
        let file = tiny_archive();
        let parsed = LecFile::parse(&file).unwrap();
        assert_eq!(parsed.write(), file);
    }

    #[test]
    fn rooms_iterator_reports_index_paths() {
        let parsed = LecFile::parse(&tiny_archive()).unwrap();
        let rooms: Vec<_> = parsed.rooms().collect();
        assert_eq!(rooms.len(), 1);
        let (le_index, lf_index, room) = rooms[0];
        assert_eq!((le_index, lf_index), (0, 1));
        assert_eq!(room.room_id, 33);
        assert_eq!(room.chunks.len(), 2);
    }

    #[test]
    fn child_offsets_accumulate_encoded_lengths() {
        let parsed = LecFile::parse(&tiny_archive()).unwrap();
        let room = parsed.le(0).unwrap().room(1).unwrap();
        assert_eq!(room.child_offset(0), 0);
        // the SC chunk sits after the whole RO container
        assert_eq!(room.child_offset(1), room.child_len(0));
        let ro_len = match &room.chunks[0] {
            RoomChild::Payload(ro) => ro.encoded_len(),
            _ => panic!("expected RO first"),
        };
        assert_eq!(room.child_len(0), ro_len);
    }

    #[test]
    fn unknown_tags_survive_round_trip() {
        let mut file = Vec::new();
        write_chunk_with(&mut file, b"LE", |le| {
            write_chunk_with(le, b"XX", |xx| xx.extend_from_slice(&[1, 2, 3]));
        });
        let parsed = LecFile::parse(&file).unwrap();
        assert_eq!(parsed.write(), file);
    }
}
