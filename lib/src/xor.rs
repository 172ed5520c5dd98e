use std::io::Read;

/// Whole-file obfuscation key for the `DISK0x.LEC` archives.
pub const ARCHIVE_KEY: u8 = 0x69;
/// Key for the 9-byte room name entries inside the master index.
pub const NAME_KEY: u8 = 0xFF;

/// Reader that XORs every byte with a fixed key. The transform is its own
/// inverse, so the same adapter serves import and export.
pub struct XorRead<R> {
    inner: R,
    key: u8,
}

impl<R: Read> XorRead<R> {
    pub fn new(reader: R, key: u8) -> Self {
        Self { inner: reader, key }
    }
}

impl<R: Read> Read for XorRead<R> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let read_amt = self.inner.read(buf)?;
        for b in &mut buf[..read_amt] {
            *b ^= self.key;
        }
        Ok(read_amt)
    }
}

/// In-place variant for buffers that are already fully materialised.
pub fn xor_buf(buf: &mut [u8], key: u8) {
    for b in buf.iter_mut() {
        *b ^= key;
    }
}

#[cfg(test)]
mod tests {
    use std::io::{Cursor, Read};

    use super::*;

    #[test]
    fn xor_read_applies_key() {
        let data = vec![0x00u8, 0x69, 0xFF, 0x42];
        let mut out = Vec::new();
        XorRead::new(Cursor::new(&data), 0x69)
            .read_to_end(&mut out)
            .unwrap();
        assert_eq!(out, vec![0x69, 0x00, 0x96, 0x2B]);
    }

    #[test]
    fn xor_is_symmetric() {
        let mut buf = vec![1u8, 2, 3, 4, 5];
        let orig = buf.clone();
        xor_buf(&mut buf, ARCHIVE_KEY);
        assert_ne!(buf, orig);
        xor_buf(&mut buf, ARCHIVE_KEY);
        assert_eq!(buf, orig);
    }
}
