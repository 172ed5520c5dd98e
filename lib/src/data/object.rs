use std::io::Cursor;

use binrw::{binread, binrw, BinReaderExt};
use bitvec::prelude::*;

use crate::data::chunk::HEADER_SIZE;
use crate::error::ShuffleError;

/// Byte offset of the event table within an `OC` chunk body.
const EVENTS_START: usize = 0x0D;

/// One row of an object's event table: which verb fires which entry point.
/// `code_offset` is measured from the start of the chunk header.
#[binrw]
#[brw(little)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObjectEvent {
    pub verb: u8,
    pub code_offset: u16,
}

/// Fixed header of an `OC` chunk. Two of the bytes pack a 7-bit field
/// with a flag in the top bit.
#[binread]
#[derive(Debug, Clone)]
#[br(little)]
pub struct ObjectHeader {
    pub id: u16,
    pub unk: u8,
    pub x: u8,
    #[br(temp, map = BitArray::new)]
    packed_pos: BitArray<u8, Lsb0>,
    #[br(calc = packed_pos[..7].load_le::<u8>())]
    pub y: u8,
    #[br(calc = packed_pos[7])]
    pub parent_state: bool,
    pub width: u8,
    pub parent: u8,
    pub walk_x: i16,
    pub walk_y: i16,
    #[br(temp, map = BitArray::new)]
    packed_size: BitArray<u8, Lsb0>,
    #[br(calc = packed_size[..7].load_le::<u8>())]
    pub height: u8,
    #[br(calc = packed_size[7])]
    pub actor_dir: bool,
    pub name_offset: u8,
}

impl ObjectHeader {
    fn write(&self, name_offset: u8, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.id.to_le_bytes());
        out.push(self.unk);
        out.push(self.x);
        let mut packed_pos = BitArray::<u8, Lsb0>::ZERO;
        packed_pos[..7].store_le(self.y);
        packed_pos.set(7, self.parent_state);
        out.push(packed_pos.into_inner());
        out.push(self.width);
        out.push(self.parent);
        out.extend_from_slice(&self.walk_x.to_le_bytes());
        out.extend_from_slice(&self.walk_y.to_le_bytes());
        let mut packed_size = BitArray::<u8, Lsb0>::ZERO;
        packed_size[..7].store_le(self.height);
        packed_size.set(7, self.actor_dir);
        out.push(packed_size.into_inner());
        out.push(name_offset);
    }
}

/// Decoded `OC` chunk: header, event table, name, and the concatenated
/// verb code blob.
#[derive(Debug, Clone)]
pub struct ObjectCode {
    pub header: ObjectHeader,
    pub events: Vec<ObjectEvent>,
    /// Object name, cp437 bytes without the terminating NUL.
    pub name: Vec<u8>,
    pub data: Vec<u8>,
}

impl ObjectCode {
    pub fn parse(body: &[u8], base: u64) -> Result<Self, ShuffleError> {
        let mut cur = Cursor::new(body);
        let header: ObjectHeader = cur
            .read_le()
            .map_err(|e| ShuffleError::decode_at(base, format!("bad object header: {e}")))?;
        let mut events = Vec::new();
        loop {
            let at = base + cur.position();
            let verb: u8 = cur
                .read_le()
                .map_err(|e| ShuffleError::decode_at(at, format!("truncated event table: {e}")))?;
            if verb == 0 {
                break;
            }
            let code_offset: u16 = cur
                .read_le()
                .map_err(|e| ShuffleError::decode_at(at, format!("truncated event table: {e}")))?;
            events.push(ObjectEvent { verb, code_offset });
        }
        let mut name = Vec::new();
        loop {
            let at = base + cur.position();
            let b: u8 = cur
                .read_le()
                .map_err(|e| ShuffleError::decode_at(at, format!("unterminated object name: {e}")))?;
            if b == 0 {
                break;
            }
            name.push(b);
        }
        let data = body[cur.position() as usize..].to_vec();
        Ok(Self {
            header,
            events,
            name,
            data,
        })
    }

    /// Chunk-relative offset of the first code byte, the datum event
    /// offsets are measured against.
    pub fn code_start(&self) -> usize {
        self.data_start() + HEADER_SIZE
    }

    fn data_start(&self) -> usize {
        EVENTS_START + 3 * self.events.len() + 1 + self.name.len() + 1
    }

    /// Body offset into `data` where the given event's code begins.
    pub fn event_code_offset(&self, event: &ObjectEvent) -> Result<usize, ShuffleError> {
        let start = self.code_start();
        let rel = (event.code_offset as usize).checked_sub(start).ok_or_else(|| {
            ShuffleError::Encode(format!(
                "event for verb {} points at 0x{:X}, before the object's code blob",
                event.verb, event.code_offset
            ))
        })?;
        if rel > self.data.len() {
            return Err(ShuffleError::Encode(format!(
                "event for verb {} points past the object's code blob",
                event.verb
            )));
        }
        Ok(rel)
    }

    /// Replaces the code blob with freshly encoded verb bodies, rebuilding
    /// the event table offsets to match.
    pub fn rebuild(&mut self, verbs: &[(u8, Vec<u8>)]) -> Result<(), ShuffleError> {
        self.events.clear();
        self.data.clear();
        let start = EVENTS_START + 3 * verbs.len() + 1 + self.name.len() + 1 + HEADER_SIZE;
        for (verb, code) in verbs {
            let code_offset = start + self.data.len();
            let code_offset = u16::try_from(code_offset).map_err(|_| {
                ShuffleError::Encode(format!(
                    "object {} verb table overflows a 16-bit offset",
                    self.header.id
                ))
            })?;
            self.events.push(ObjectEvent {
                verb: *verb,
                code_offset,
            });
            self.data.extend_from_slice(code);
        }
        Ok(())
    }

    pub fn encoded_len(&self) -> usize {
        HEADER_SIZE + self.data_start() + self.data.len()
    }

    pub fn write(&self, out: &mut Vec<u8>) {
        let name_offset = (EVENTS_START + 3 * self.events.len() + 1 + HEADER_SIZE) as u8;
        self.header.write(name_offset, out);
        for event in &self.events {
            out.push(event.verb);
            out.extend_from_slice(&event.code_offset.to_le_bytes());
        }
        out.push(0x00);
        out.extend_from_slice(&self.name);
        out.push(0x00);
        out.extend_from_slice(&self.data);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_body() -> Vec<u8> {
        let mut body = Vec::new();
        body.extend_from_slice(&0x1B5u16.to_le_bytes()); // id
        body.push(0x00); // unk
        body.push(0x28); // x
        body.push(0x80 | 0x12); // parent_state + y
        body.push(0x05); // width
        body.push(0x00); // parent
        body.extend_from_slice(&0x30i16.to_le_bytes()); // walk_x
        body.extend_from_slice(&0x40i16.to_le_bytes()); // walk_y
        body.push(0x03); // height, actor_dir clear
        body.push(0x17); // name offset: events end + chunk header
        // one event: verb 10 (walk_to)
        let code_start = (EVENTS_START + 3 + 1 + 4 + 1 + HEADER_SIZE) as u16;
        body.push(10);
        body.extend_from_slice(&code_start.to_le_bytes());
        body.push(0x00); // event terminator
        body.extend_from_slice(b"door"); // name
        body.push(0x00);
        body.extend_from_slice(&[0x80, 0x00]); // breakHere, stopObjectCode
        body
    }

    #[test]
    fn parse_pulls_apart_header_and_events() {
        let body = sample_body();
        let object = ObjectCode::parse(&body, 0).unwrap();
        assert_eq!(object.header.id, 0x1B5);
        assert_eq!(object.header.y, 0x12);
        assert!(object.header.parent_state);
        assert_eq!(object.header.height, 0x03);
        assert!(!object.header.actor_dir);
        assert_eq!(object.name, b"door");
        assert_eq!(object.events.len(), 1);
        assert_eq!(object.data, vec![0x80, 0x00]);
        assert_eq!(
            object.event_code_offset(&object.events[0]).unwrap(),
            0
        );
    }

    #[test]
    fn write_round_trips() {
        let body = sample_body();
        let object = ObjectCode::parse(&body, 0).unwrap();
        let mut out = Vec::new();
        object.write(&mut out);
        assert_eq!(out, body);
        assert_eq!(object.encoded_len(), body.len() + HEADER_SIZE);
    }

    #[test]
    fn rebuild_recomputes_event_offsets() {
        let body = sample_body();
        let mut object = ObjectCode::parse(&body, 0).unwrap();
        let verbs = vec![
            (10u8, vec![0x18, 0x00, 0x00, 0x00]),
            (9u8, vec![0x00]),
        ];
        object.rebuild(&verbs).unwrap();
        assert_eq!(object.events.len(), 2);
        let first = object.event_code_offset(&object.events[0]).unwrap();
        let second = object.event_code_offset(&object.events[1]).unwrap();
        assert_eq!(first, 0);
        assert_eq!(second, 4);
        assert_eq!(object.data.len(), 5);
        // offsets point at the rebuilt blob relative to the chunk start
        assert_eq!(
            object.events[0].code_offset as usize,
            object.code_start()
        );
    }
}
