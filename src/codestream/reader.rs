use super::marker::MARKER_START_BYTE;
use crate::error::{CodecError, Result};

/// Big-endian cursor over a codestream slice.
pub struct ByteReader<'a> {
    source: &'a [u8],
    position: usize,
}

impl<'a> ByteReader<'a> {
    pub fn new(source: &'a [u8]) -> Self {
        Self {
            source,
            position: 0,
        }
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn remaining(&self) -> usize {
        self.source.len() - self.position
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        let value = *self
            .source
            .get(self.position)
            .ok_or_else(|| unexpected_end(self.position))?;
        self.position += 1;
        Ok(value)
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        let bytes = self.read_bytes(2)?;
        Ok(u16::from_be_bytes([bytes[0], bytes[1]]))
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        let bytes = self.read_bytes(4)?;
        Ok(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    pub fn read_bytes(&mut self, count: usize) -> Result<&'a [u8]> {
        let end = self
            .position
            .checked_add(count)
            .filter(|&end| end <= self.source.len())
            .ok_or_else(|| unexpected_end(self.position))?;
        let bytes = &self.source[self.position..end];
        self.position = end;
        Ok(bytes)
    }

    pub fn advance(&mut self, count: usize) -> Result<()> {
        self.read_bytes(count).map(|_| ())
    }

    /// Reads `0xFF xx` and returns `xx`.
    pub fn read_marker(&mut self) -> Result<u8> {
        let start = self.position;
        let first = self.read_u8()?;
        if first != MARKER_START_BYTE {
            return Err(CodecError::codestream(format!(
                "expected marker at offset {start}, found 0x{first:02X}"
            )));
        }
        self.read_u8()
    }

    /// Reads a segment length and returns the body size that follows it.
    pub fn read_segment_length(&mut self) -> Result<usize> {
        let length = self.read_u16()? as usize;
        if length < 2 {
            return Err(CodecError::codestream(format!("invalid segment length {length}")));
        }
        Ok(length - 2)
    }
}

fn unexpected_end(position: usize) -> CodecError {
    CodecError::codestream(format!("unexpected end of codestream at offset {position}"))
}
