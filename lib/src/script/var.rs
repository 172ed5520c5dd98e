use std::fmt::{self, Debug, Display, Formatter};
use std::io::{Read, Seek};

use binrw::BinReaderExt;

use crate::error::ShuffleError;

/// The player actor handle.
pub const VAR_EGO: u16 = 1;
/// The room the interpreter currently has loaded.
pub const VAR_ROOM: u16 = 4;
/// Frame-pace timer; rewritten by turbo mode.
pub const VAR_TIMER_NEXT: u16 = 19;
/// Enables the interpreter's built-in debugging features.
pub const VAR_DEBUGMODE: u16 = 39;

/// Engine-assigned roles for the low global variables, straight out of the
/// V4 interpreter. Indices with no known role are `None`.
const VAR_NAMES: [Option<&str>; 68] = [
    Some("VAR_RESULT"),
    Some("VAR_EGO"),
    Some("VAR_CAMERA_POS_X"),
    Some("VAR_HAVE_MSG"),
    Some("VAR_ROOM"),
    Some("VAR_OVERRIDE"),
    Some("VAR_MACHINE_SPEED"),
    Some("VAR_ME"),
    Some("VAR_NUM_ACTOR"),
    Some("VAR_CURRENT_LIGHTS"),
    Some("VAR_CURRENTDRIVE"),
    Some("VAR_TMR_1"),
    Some("VAR_TMR_2"),
    Some("VAR_TMR_3"),
    Some("VAR_MUSIC_TIMER"),
    Some("VAR_ACTOR_RANGE_MIN"),
    Some("VAR_ACTOR_RANGE_MAX"),
    Some("VAR_CAMERA_MIN_X"),
    Some("VAR_CAMERA_MAX_X"),
    Some("VAR_TIMER_NEXT"),
    Some("VAR_VIRT_MOUSE_X"),
    Some("VAR_VIRT_MOUSE_Y"),
    Some("VAR_ROOM_RESOURCE"),
    Some("VAR_LAST_SOUND"),
    Some("VAR_CUTSCENEEXIT_KEY"),
    Some("VAR_TALK_ACTOR"),
    Some("VAR_CAMERA_FAST_X"),
    Some("VAR_SCROLL_SCRIPT"),
    Some("VAR_ENTRY_SCRIPT"),
    Some("VAR_ENTRY_SCRIPT2"),
    Some("VAR_EXIT_SCRIPT"),
    Some("VAR_EXIT_SCRIPT2"),
    Some("VAR_VERB_SCRIPT"),
    Some("VAR_SENTENCE_SCRIPT"),
    Some("VAR_INVENTORY_SCRIPT"),
    Some("VAR_CUTSCENE_START_SCRIPT"),
    Some("VAR_CUTSCENE_END_SCRIPT"),
    Some("VAR_CHARINC"),
    Some("VAR_WALKTO_OBJ"),
    Some("VAR_DEBUGMODE"),
    Some("VAR_HEAPSPACE"),
    None,
    Some("VAR_RESTART_KEY"),
    Some("VAR_PAUSE_KEY"),
    Some("VAR_MOUSE_X"),
    Some("VAR_MOUSE_Y"),
    Some("VAR_TIMER"),
    Some("VAR_TIMER_TOTAL"),
    Some("VAR_SOUNDCARD"),
    Some("VAR_VIDEOMODE"),
    Some("VAR_MAINMENU_KEY"),
    Some("VAR_FIXEDDISK"),
    Some("VAR_CURSORSTATE"),
    Some("VAR_USERPUT"),
    Some("VAR_V5_TALK_STRING_Y"),
    None,
    None,
    None,
    None,
    None,
    Some("VAR_NOSUBTITLES"),
    None,
    None,
    None,
    Some("VAR_SOUNDPARAM"),
    Some("VAR_SOUNDPARAM2"),
    Some("VAR_SOUNDPARAM3"),
    None,
];

/// A decoded variable reference. Bits in `id` classify the flavour:
/// 0x8000 bitfield addressing, 0x4000 local frame, 0x2000 indexed (the
/// index variable travels in `extra`).
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct VarRef {
    pub id: u16,
    pub extra: Option<u16>,
}

impl VarRef {
    pub fn new(id: u16) -> Self {
        Self { id, extra: None }
    }

    pub fn is_bitfield(&self) -> bool {
        self.id & 0x8000 != 0
    }

    pub fn is_local(&self) -> bool {
        self.id & 0x4000 != 0
    }

    pub fn is_indexed(&self) -> bool {
        self.id & 0x2000 != 0
    }

    pub fn read<R: Read + Seek>(reader: &mut R) -> Result<Self, ShuffleError> {
        let at = stream_pos(reader);
        let id: u16 = reader
            .read_le()
            .map_err(|e| ShuffleError::decode_at(at, format!("truncated var ref: {e}")))?;
        let extra = if id & 0x2000 != 0 {
            let word: u16 = reader
                .read_le()
                .map_err(|e| ShuffleError::decode_at(at, format!("truncated var index: {e}")))?;
            Some(word)
        } else {
            None
        };
        Ok(Self { id, extra })
    }

    pub fn write(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.id.to_le_bytes());
        if let Some(extra) = self.extra {
            out.extend_from_slice(&extra.to_le_bytes());
        }
    }

    /// Human name the way the interpreter's debugger would print it.
    pub fn name(&self) -> String {
        if let Some(Some(known)) = VAR_NAMES.get(self.id as usize) {
            return (*known).to_string();
        }
        if self.is_bitfield() {
            return format!("VAR[{} bit {}]", (self.id & 0xFF0) >> 4, self.id & 0x00F);
        }
        let base = if self.is_local() { "LOCAL" } else { "VAR" };
        if self.is_indexed() {
            if let Some(extra) = self.extra {
                return format!("{}[{} + {}]", base, self.id & 0xFFF, VarRef::new(extra).name());
            }
        }
        format!("{}[{}]", base, self.id & 0xFFF)
    }
}

impl Display for VarRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

impl Debug for VarRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

fn stream_pos<R: Seek>(reader: &mut R) -> u64 {
    reader.stream_position().unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    fn read_ref(bytes: &[u8]) -> VarRef {
        VarRef::read(&mut Cursor::new(bytes)).unwrap()
    }

    #[test]
    fn plain_global() {
        let v = read_ref(&[0x13, 0x00]);
        assert_eq!(v.id, 0x13);
        assert_eq!(v.extra, None);
        assert_eq!(v.name(), "VAR_TIMER_NEXT");
    }

    #[test]
    fn indexed_reads_extra_word() {
        let v = read_ref(&[0x05, 0x20, 0x2A, 0x00]);
        assert!(v.is_indexed());
        assert_eq!(v.extra, Some(0x2A));
        assert_eq!(v.name(), "VAR[5 + VAR_CAMERA_MIN_X]");
    }

    #[test]
    fn bitfield_name() {
        let v = VarRef::new(0x8000 | (12 << 4) | 3);
        assert_eq!(v.name(), "VAR[12 bit 3]");
    }

    #[test]
    fn local_name() {
        let v = VarRef::new(0x4000 | 7);
        assert_eq!(v.name(), "LOCAL[7]");
    }

    #[test]
    fn write_round_trips() {
        for v in [VarRef::new(0x13), read_ref(&[0x05, 0x20, 0x2A, 0x00])] {
            let mut out = Vec::new();
            v.write(&mut out);
            assert_eq!(read_ref(&out), v);
        }
    }
}
