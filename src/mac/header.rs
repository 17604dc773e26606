//! MAC header and addressing.
//!
//! The header is 20 bytes on the wire: destination address (8), source
//! address (8), payload size (2, big-endian), frame-control byte and
//! sequence number. The frame-control byte packs the frame type in the top
//! two bits, then the more-fragment and retry flags, then four reserved
//! bits.

use core::fmt;

/// Size of the serialized MAC header in bytes.
pub const HEADER_SIZE: usize = 20;

/// Size of the serialized LLC/SNAP encapsulation header in bytes.
pub const LLC_SIZE: usize = 8;

/// A flat 64-bit MAC address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct MacAddress(pub [u8; 8]);

impl MacAddress {
    /// The all-ones broadcast address.
    pub const BROADCAST: MacAddress = MacAddress([0xff; 8]);

    /// The all-zero coordinator/null address.
    pub const COORDINATOR: MacAddress = MacAddress([0x00; 8]);

    /// Build an address from a 64-bit integer, big-endian.
    pub fn from_u64(value: u64) -> Self {
        MacAddress(value.to_be_bytes())
    }

    /// The address as a 64-bit integer, big-endian.
    pub fn to_u64(self) -> u64 {
        u64::from_be_bytes(self.0)
    }

    /// Whether this is the broadcast address.
    pub fn is_broadcast(self) -> bool {
        self == Self::BROADCAST
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, byte) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ":")?;
            }
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

/// MAC frame type, carried in the top two bits of the frame-control byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FrameType {
    /// Request-for-data broadcast opening a round.
    Rfd = 0x00,
    /// Frame feedback packet closing a frame.
    Fbp = 0x01,
    /// Upper-layer data.
    Data = 0x02,
}

impl FrameType {
    fn from_bits(bits: u8) -> Option<FrameType> {
        match bits & 0x03 {
            0x00 => Some(FrameType::Rfd),
            0x01 => Some(FrameType::Fbp),
            0x02 => Some(FrameType::Data),
            _ => None,
        }
    }
}

/// Errors produced while parsing wire structures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireError {
    /// The buffer is shorter than the structure it should contain.
    Truncated,
    /// A field carries a value outside its defined range.
    InvalidField,
}

/// The 20-byte MAC header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MacHeader {
    /// Destination address.
    pub dst: MacAddress,
    /// Source address.
    pub src: MacAddress,
    /// Bytes following the header up to the trailer.
    pub payload_size: u16,
    /// Sequence number.
    pub seq: u8,
    frame_type: FrameType,
    more_frag: bool,
    retry: bool,
    reserved: u8,
}

impl MacHeader {
    /// Build a header of the given frame type with zeroed fields.
    pub fn new(frame_type: FrameType) -> Self {
        Self {
            dst: MacAddress::default(),
            src: MacAddress::default(),
            payload_size: 0,
            seq: 0,
            frame_type,
            more_frag: false,
            retry: false,
            reserved: 0,
        }
    }

    /// Frame type of this header.
    pub fn frame_type(&self) -> FrameType {
        self.frame_type
    }

    /// Whether the retry flag is set.
    pub fn retry(&self) -> bool {
        self.retry
    }

    /// Set or clear the retry flag.
    pub fn set_retry(&mut self, retry: bool) {
        self.retry = retry;
    }

    /// Whether the more-fragment flag is set.
    pub fn more_frag(&self) -> bool {
        self.more_frag
    }

    /// Set or clear the more-fragment flag.
    pub fn set_more_frag(&mut self, more_frag: bool) {
        self.more_frag = more_frag;
    }

    /// Pack the frame-control byte.
    pub fn frame_control(&self) -> u8 {
        let mut value = (self.frame_type as u8) << 6;
        if self.more_frag {
            value |= 0x01 << 5;
        }
        if self.retry {
            value |= 0x01 << 4;
        }
        value | (self.reserved & 0x0f)
    }

    /// Unpack the frame-control byte.
    pub fn set_frame_control(&mut self, control: u8) -> Result<(), WireError> {
        self.frame_type =
            FrameType::from_bits(control >> 6).ok_or(WireError::InvalidField)?;
        self.more_frag = (control >> 5) & 0x01 != 0;
        self.retry = (control >> 4) & 0x01 != 0;
        self.reserved = control & 0x0f;
        Ok(())
    }

    /// Serialize the header into `out`, which must hold [`HEADER_SIZE`]
    /// bytes.
    pub fn serialize(&self, out: &mut [u8]) {
        out[0..8].copy_from_slice(&self.dst.0);
        out[8..16].copy_from_slice(&self.src.0);
        out[16..18].copy_from_slice(&self.payload_size.to_be_bytes());
        out[18] = self.frame_control();
        out[19] = self.seq;
    }

    /// Parse a header from the front of `buf`.
    pub fn deserialize(buf: &[u8]) -> Result<MacHeader, WireError> {
        if buf.len() < HEADER_SIZE {
            return Err(WireError::Truncated);
        }
        let mut header = MacHeader::new(FrameType::Rfd);
        header.dst.0.copy_from_slice(&buf[0..8]);
        header.src.0.copy_from_slice(&buf[8..16]);
        header.payload_size = u16::from_be_bytes([buf[16], buf[17]]);
        header.set_frame_control(buf[18])?;
        header.seq = buf[19];
        Ok(header)
    }
}

/// Minimal LLC/SNAP encapsulation carried between the MAC header and the
/// payload, identifying the upper-layer protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LlcSnapHeader {
    /// Upper-layer protocol number.
    pub protocol: u16,
}

impl LlcSnapHeader {
    /// Protocol number used on RFD and FBP control broadcasts.
    pub const PROTO_CONTROL: u16 = 0x0000;

    /// Build an encapsulation header for the given protocol.
    pub fn new(protocol: u16) -> Self {
        Self { protocol }
    }

    /// Encapsulation header for control broadcasts.
    pub fn control() -> Self {
        Self::new(Self::PROTO_CONTROL)
    }

    /// Serialize into `out`, which must hold [`LLC_SIZE`] bytes.
    pub fn serialize(&self, out: &mut [u8]) {
        out[0] = 0xaa; // DSAP
        out[1] = 0xaa; // SSAP
        out[2] = 0x03; // control
        out[3..6].copy_from_slice(&[0, 0, 0]); // OUI
        out[6..8].copy_from_slice(&self.protocol.to_be_bytes());
    }

    /// Parse from the front of `buf`.
    pub fn deserialize(buf: &[u8]) -> Result<LlcSnapHeader, WireError> {
        if buf.len() < LLC_SIZE {
            return Err(WireError::Truncated);
        }
        if buf[0] != 0xaa || buf[1] != 0xaa || buf[2] != 0x03 {
            return Err(WireError::InvalidField);
        }
        Ok(LlcSnapHeader {
            protocol: u16::from_be_bytes([buf[6], buf[7]]),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_control_layout() {
        let mut header = MacHeader::new(FrameType::Data);
        header.set_retry(true);
        assert_eq!(header.frame_control(), 0b1001_0000);

        header.set_retry(false);
        header.set_more_frag(true);
        assert_eq!(header.frame_control(), 0b1010_0000);
    }

    #[test]
    fn test_header_roundtrip() {
        let mut header = MacHeader::new(FrameType::Fbp);
        header.src = MacAddress::from_u64(0x0102030405060708);
        header.dst = MacAddress::BROADCAST;
        header.payload_size = 0x1234;
        header.seq = 0x42;
        header.set_retry(true);

        let mut buf = [0u8; HEADER_SIZE];
        header.serialize(&mut buf);
        let parsed = MacHeader::deserialize(&buf).unwrap();
        assert_eq!(parsed, header);
    }

    #[test]
    fn test_invalid_frame_type_rejected() {
        let mut buf = [0u8; HEADER_SIZE];
        buf[18] = 0b1100_0000; // frame type 3 is undefined
        assert_eq!(MacHeader::deserialize(&buf), Err(WireError::InvalidField));
    }

    #[test]
    fn test_llc_roundtrip() {
        let llc = LlcSnapHeader::new(0x0800);
        let mut buf = [0u8; LLC_SIZE];
        llc.serialize(&mut buf);
        assert_eq!(LlcSnapHeader::deserialize(&buf).unwrap(), llc);
    }

    #[test]
    fn test_address_display() {
        let addr = MacAddress::from_u64(1);
        assert_eq!(addr.to_string(), "00:00:00:00:00:00:00:01");
        assert!(MacAddress::BROADCAST.is_broadcast());
    }
}
