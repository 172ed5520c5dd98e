use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use crate::data::index::MasterIndex;
use crate::data::lec::LecFile;
use crate::error::ShuffleError;
use crate::io_tricks::ReadMixer;
use crate::xor::{xor_buf, XorRead, ARCHIVE_KEY};

pub const DISK_NAMES: [&str; 4] = ["DISK01.LEC", "DISK02.LEC", "DISK03.LEC", "DISK04.LEC"];
pub const INDEX_NAME: &str = "000.LFL";

/// The shipped disk 1 carries one `SO` chunk with a wrong length field.
/// The loader recognises it by signature and rewrites the length before
/// parsing; this is part of the contract with the original media.
const BAD_SOUND_SIGNATURE: &[u8] = b"\x15\x82\x00\x00SO--";
const BAD_SOUND_FIXED_LEN: u32 = 0x8115;

const CRC32: crc::Crc<u32> = crc::Crc::<u32>::new(&crc::CRC_32_ISO_HDLC);

/// Every game file, loaded and de-obfuscated. All mutation happens on
/// these trees; `Session` owns the offset repair at save time.
#[derive(Debug, Clone)]
pub struct GameArchives {
    pub disks: Vec<LecFile>,
    pub index: MasterIndex,
}

impl GameArchives {
    pub fn load(source: &Path) -> Result<Self, ShuffleError> {
        let mut disks = Vec::with_capacity(DISK_NAMES.len());
        for (disk_number, name) in DISK_NAMES.iter().enumerate() {
            let mut buf = read_game_file(source, name, true)?;
            if disk_number == 0 {
                apply_bad_sound_fixup(&mut buf);
            }
            log::info!(
                "Parsing {} ({} bytes, crc32 {:08x})...",
                name,
                buf.len(),
                CRC32.checksum(&buf)
            );
            disks.push(
                LecFile::parse(&buf).map_err(|e| e.add_context(format!("while parsing {name}")))?,
            );
        }
        let buf = read_game_file(source, INDEX_NAME, false)?;
        log::info!(
            "Parsing {} ({} bytes, crc32 {:08x})...",
            INDEX_NAME,
            buf.len(),
            CRC32.checksum(&buf)
        );
        let index = MasterIndex::parse(&buf)
            .map_err(|e| e.add_context(format!("while parsing {INDEX_NAME}")))?;
        Ok(Self { disks, index })
    }

    /// Serialises one disk, re-applying the whole-file obfuscation.
    pub fn emit_disk(&self, disk_number: usize) -> Vec<u8> {
        let mut buf = self.disks[disk_number].write();
        xor_buf(&mut buf, ARCHIVE_KEY);
        buf
    }

    pub fn emit_index(&self) -> Vec<u8> {
        self.index.write()
    }
}

fn read_game_file(source: &Path, name: &str, obfuscated: bool) -> Result<Vec<u8>, ShuffleError> {
    let path = source.join(name);
    let file = File::open(&path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            ShuffleError::MissingGameFile(path.clone())
        } else {
            ShuffleError::Io(format!("Couldn't open {}", path.display()), e)
        }
    })?;
    let mut reader = if obfuscated {
        ReadMixer::Wrapped(XorRead::new(file, ARCHIVE_KEY))
    } else {
        ReadMixer::Plain(file)
    };
    let mut buf = Vec::new();
    reader
        .read_to_end(&mut buf)
        .map_err(|e| ShuffleError::Io(format!("Couldn't read {}", path.display()), e))?;
    Ok(buf)
}

fn apply_bad_sound_fixup(buf: &mut [u8]) {
    let Some(at) = buf
        .windows(BAD_SOUND_SIGNATURE.len())
        .position(|w| w == BAD_SOUND_SIGNATURE)
    else {
        return;
    };
    log::info!("Fixing bad sound chunk length at 0x{at:X}");
    buf[at..at + 4].copy_from_slice(&BAD_SOUND_FIXED_LEN.to_le_bytes());
}

/// Writes through a temp file and renames into place, so a failed export
/// leaves the destination untouched.
pub fn write_atomic(dest_dir: &Path, name: &str, bytes: &[u8]) -> Result<(), ShuffleError> {
    let mut tmp = tempfile::NamedTempFile::new_in(dest_dir).map_err(|e| {
        ShuffleError::Io(format!("Couldn't create temp file in {}", dest_dir.display()), e)
    })?;
    tmp.write_all(bytes)
        .map_err(|e| ShuffleError::Io(format!("Couldn't write {name}"), e))?;
    tmp.persist(dest_dir.join(name)).map_err(|e| {
        ShuffleError::Io(format!("Couldn't move {name} into place"), e.error)
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixup_rewrites_the_length_in_place() {
        let mut buf = Vec::new();
        buf.extend_from_slice(&[0xAA; 8]);
        buf.extend_from_slice(BAD_SOUND_SIGNATURE);
        buf.extend_from_slice(&[0xBB; 4]);
        apply_bad_sound_fixup(&mut buf);
        assert_eq!(&buf[8..12], &BAD_SOUND_FIXED_LEN.to_le_bytes());
        assert_eq!(&buf[12..14], b"SO");
        assert_eq!(&buf[..8], &[0xAA; 8]);
    }

    #[test]
    fn fixup_is_a_no_op_without_the_signature() {
        let mut buf = vec![0u8; 32];
        let orig = buf.clone();
        apply_bad_sound_fixup(&mut buf);
        assert_eq!(buf, orig);
    }
}
