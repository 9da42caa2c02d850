//! JP2 box structure (ISO/IEC 15444-1 Annex I).

use crate::error::{CodecError, Result};

const SIGNATURE_BOX: &[u8; 12] = b"\x00\x00\x00\x0CjP  \r\n\x87\n";

struct Jp2Box {
    box_type: [u8; 4],
    data_range: std::ops::Range<usize>,
}

pub struct Jp2Reader<'a> {
    data: &'a [u8],
    position: usize,
}

impl<'a> Jp2Reader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, position: 0 }
    }

    pub fn is_jp2(data: &[u8]) -> bool {
        data.len() >= SIGNATURE_BOX.len() && &data[..SIGNATURE_BOX.len()] == SIGNATURE_BOX
    }

    /// Returns the contents of the contiguous codestream box, or `None` if
    /// the data is not a JP2 file.
    pub fn find_codestream(&mut self) -> Result<Option<&'a [u8]>> {
        if !Self::is_jp2(self.data) {
            return Ok(None);
        }
        self.position = 0;
        while let Some(b) = self.read_box()? {
            if b.box_type == *b"jp2c" {
                return Ok(Some(&self.data[b.data_range]));
            }
        }
        Err(CodecError::codestream("JP2 file has no codestream box"))
    }

    fn read_box(&mut self) -> Result<Option<Jp2Box>> {
        let data = self.data;
        let start = self.position;
        if start + 8 > data.len() {
            return Ok(None);
        }

        let mut length =
            u32::from_be_bytes([data[start], data[start + 1], data[start + 2], data[start + 3]])
                as u64;
        let box_type = [data[start + 4], data[start + 5], data[start + 6], data[start + 7]];
        let mut header_size = 8usize;

        if length == 1 {
            let Some(extended) = data.get(start + 8..start + 16) else {
                return Err(CodecError::codestream("truncated JP2 box header"));
            };
            let mut bytes = [0u8; 8];
            bytes.copy_from_slice(extended);
            length = u64::from_be_bytes(bytes);
            header_size += 8;
        } else if length == 0 {
            length = (data.len() - start) as u64;
        }

        let end = usize::try_from(length)
            .ok()
            .and_then(|len| start.checked_add(len))
            .filter(|&end| end <= data.len() && end >= start + header_size)
            .ok_or_else(|| CodecError::codestream("JP2 box extends past end of file"))?;

        self.position = end;
        Ok(Some(Jp2Box {
            box_type,
            data_range: start + header_size..end,
        }))
    }
}
