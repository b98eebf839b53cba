use byteorder::{ByteOrder, LittleEndian};

use crate::errors::{Error, Result};

// Cursor over a response buffer; little-endian, no backtracking.
#[derive(Debug)]
pub struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    pub fn rest(&self) -> &'a [u8] {
        &self.buf[self.pos..]
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        if self.remaining() < n {
            return Err(Error::Truncated(self.pos));
        }
        let slice = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    pub fn read_i16(&mut self) -> Result<i16> {
        Ok(LittleEndian::read_i16(self.take(2)?))
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        Ok(LittleEndian::read_u16(self.take(2)?))
    }

    pub fn read_i32(&mut self) -> Result<i32> {
        Ok(LittleEndian::read_i32(self.take(4)?))
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        Ok(LittleEndian::read_u32(self.take(4)?))
    }

    pub fn read_u64(&mut self) -> Result<u64> {
        Ok(LittleEndian::read_u64(self.take(8)?))
    }

    pub fn read_f32(&mut self) -> Result<f32> {
        Ok(LittleEndian::read_f32(self.take(4)?))
    }

    pub fn read_char(&mut self) -> Result<char> {
        Ok(self.read_u8()? as char)
    }

    pub fn read_string(&mut self) -> Result<String> {
        let start = self.pos;
        match self.buf[start..].iter().position(|&b| b == 0) {
            Some(end) => {
                let raw = &self.buf[start..start + end];
                self.pos = start + end + 1;
                Ok(String::from_utf8_lossy(raw).into_owned())
            }
            None => Err(Error::TruncatedString(start)),
        }
    }

    pub fn skip(&mut self, n: usize) -> Result<()> {
        self.take(n).map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integers_are_little_endian() {
        let buf = [0x10, 0x00, 0xFF, 0xFF, 0xFF, 0xFF, 0x01, 0x00, 0x00, 0x00];
        let mut r = Reader::new(&buf);
        assert_eq!(r.read_i16().unwrap(), 16);
        assert_eq!(r.read_i32().unwrap(), -1);
        assert_eq!(r.read_i32().unwrap(), 1);
        assert_eq!(r.remaining(), 0);
    }

    #[test]
    fn read_u64_and_f32() {
        let mut buf = vec![0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00];
        buf.extend_from_slice(&42.5f32.to_le_bytes());
        let mut r = Reader::new(&buf);
        assert_eq!(r.read_u64().unwrap(), 1);
        assert_eq!(r.read_f32().unwrap(), 42.5);
    }

    #[test]
    fn string_stops_at_terminator() {
        let buf = b"de_dust\0tail";
        let mut r = Reader::new(buf);
        assert_eq!(r.read_string().unwrap(), "de_dust");
        assert_eq!(r.rest(), b"tail");
    }

    #[test]
    fn unterminated_string_is_an_error() {
        let mut r = Reader::new(b"cstrike");
        assert!(matches!(r.read_string(), Err(Error::TruncatedString(0))));
    }

    #[test]
    fn read_past_end_is_truncated() {
        let mut r = Reader::new(&[0x01]);
        assert_eq!(r.read_u8().unwrap(), 1);
        assert!(matches!(r.read_i32(), Err(Error::Truncated(1))));
    }
}
