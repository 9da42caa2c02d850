use num_enum::{IntoPrimitive, TryFromPrimitive};

pub const MARKER_START_BYTE: u8 = 0xFF;

/// Second byte of the JPEG 2000 Part 1 markers this crate reads or writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum MarkerCode {
    /// SOC: start of codestream.
    StartOfCodestream = 0x4F,
    /// CAP: extended capabilities (Part 15).
    Capabilities = 0x50,
    /// SIZ: image and tile size.
    ImageAndTileSize = 0x51,
    /// COD: coding style default.
    CodingStyleDefault = 0x52,
    /// COC: coding style component.
    CodingStyleComponent = 0x53,
    /// TLM: tile-part lengths.
    TilePartLengths = 0x55,
    /// PLM: packet lengths, main header.
    PacketLengthsMain = 0x57,
    /// PLT: packet lengths, tile-part header.
    PacketLengthsTile = 0x58,
    /// QCD: quantization default.
    QuantizationDefault = 0x5C,
    /// QCC: quantization component.
    QuantizationComponent = 0x5D,
    /// RGN: region of interest.
    RegionOfInterest = 0x5E,
    /// POC: progression order change.
    ProgressionOrderChange = 0x5F,
    /// CRG: component registration.
    ComponentRegistration = 0x63,
    /// COM: comment.
    Comment = 0x64,
    /// SOT: start of tile-part.
    StartOfTile = 0x90,
    /// SOD: start of data.
    StartOfData = 0x93,
    /// EOC: end of codestream.
    EndOfCodestream = 0xD9,
}

impl MarkerCode {
    /// Markers 0xFF30..=0xFF3F are reserved delimiters without a length field.
    pub fn has_no_segment(code: u8) -> bool {
        (0x30..=0x3F).contains(&code)
            || code == u8::from(MarkerCode::StartOfCodestream)
            || code == u8::from(MarkerCode::StartOfData)
            || code == u8::from(MarkerCode::EndOfCodestream)
    }
}
