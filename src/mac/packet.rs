//! Owned MAC frame: header, LLC/SNAP encapsulation, payload and CRC seal.

use crate::mac::header::{
    LlcSnapHeader, MacHeader, WireError, HEADER_SIZE, LLC_SIZE,
};
use crate::mac::trailer::{MacTrailer, TRAILER_SIZE};

/// Maximum payload carried in one MAC frame.
pub const MAX_PAYLOAD: usize = 224;

/// Maximum size of a serialized frame, trailer included.
pub const MAX_FRAME: usize = HEADER_SIZE + LLC_SIZE + MAX_PAYLOAD + TRAILER_SIZE;

/// A MAC frame under assembly or received from the radio.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    /// MAC header.
    pub header: MacHeader,
    /// Upper-layer encapsulation.
    pub llc: LlcSnapHeader,
    /// Payload bytes.
    pub payload: heapless::Vec<u8, MAX_PAYLOAD>,
    crc: u16,
}

impl Packet {
    /// Assemble a frame from its parts. The CRC seal is applied later by
    /// [`Packet::seal`], just before the frame is handed to the radio.
    ///
    /// # Panics
    ///
    /// Panics if `payload` exceeds [`MAX_PAYLOAD`]; callers enforce the MTU
    /// before building a frame, so an oversized payload here is a
    /// programming error.
    pub fn new(header: MacHeader, llc: LlcSnapHeader, payload: &[u8]) -> Self {
        let mut buf = heapless::Vec::new();
        buf.extend_from_slice(payload)
            .expect("payload exceeds maximum packet payload");
        Self {
            header,
            llc,
            payload: buf,
            crc: 0,
        }
    }

    /// Bytes this frame occupies on the air, trailer included.
    pub fn serialized_size(&self) -> usize {
        HEADER_SIZE + LLC_SIZE + self.payload.len() + TRAILER_SIZE
    }

    /// Fix up the payload-size field and compute the CRC seal over the
    /// serialized header, LLC and payload.
    pub fn seal(&mut self) {
        self.header.payload_size = (LLC_SIZE + self.payload.len()) as u16;
        let body = self.serialize_body();
        self.crc = MacTrailer::compute(&body).crc();
    }

    /// Whether the stored CRC matches the frame content.
    pub fn verify_crc(&self) -> bool {
        MacTrailer::from_crc(self.crc).check(&self.serialize_body())
    }

    fn serialize_body(&self) -> heapless::Vec<u8, MAX_FRAME> {
        let mut buf: heapless::Vec<u8, MAX_FRAME> = heapless::Vec::new();
        buf.resize_default(HEADER_SIZE + LLC_SIZE)
            .expect("frame buffer undersized");
        self.header.serialize(&mut buf[..HEADER_SIZE]);
        self.llc
            .serialize(&mut buf[HEADER_SIZE..HEADER_SIZE + LLC_SIZE]);
        buf.extend_from_slice(&self.payload)
            .expect("frame buffer undersized");
        buf
    }

    /// Serialize the whole frame, trailer included.
    pub fn to_bytes(&self) -> heapless::Vec<u8, MAX_FRAME> {
        let mut buf = self.serialize_body();
        let mut tail = [0u8; TRAILER_SIZE];
        MacTrailer::from_crc(self.crc).serialize(&mut tail);
        buf.extend_from_slice(&tail)
            .expect("frame buffer undersized");
        buf
    }

    /// Parse a serialized frame. The CRC is stored as read; callers decide
    /// whether to verify it.
    pub fn from_bytes(buf: &[u8]) -> Result<Packet, WireError> {
        if buf.len() < HEADER_SIZE + LLC_SIZE + TRAILER_SIZE {
            return Err(WireError::Truncated);
        }
        let header = MacHeader::deserialize(buf)?;
        let llc = LlcSnapHeader::deserialize(&buf[HEADER_SIZE..])?;
        let payload_bytes = &buf[HEADER_SIZE + LLC_SIZE..buf.len() - TRAILER_SIZE];
        if payload_bytes.len() > MAX_PAYLOAD
            || header.payload_size as usize != LLC_SIZE + payload_bytes.len()
        {
            return Err(WireError::InvalidField);
        }
        let trailer =
            MacTrailer::deserialize(buf).ok_or(WireError::Truncated)?;
        let mut payload = heapless::Vec::new();
        payload
            .extend_from_slice(payload_bytes)
            .map_err(|_| WireError::InvalidField)?;
        Ok(Packet {
            header,
            llc,
            payload,
            crc: trailer.crc(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mac::header::{FrameType, MacAddress};

    fn sample_packet() -> Packet {
        let mut header = MacHeader::new(FrameType::Data);
        header.src = MacAddress::from_u64(0x11);
        header.dst = MacAddress::from_u64(0x22);
        header.seq = 7;
        let mut packet = Packet::new(header, LlcSnapHeader::new(0x0800), b"hello slots");
        packet.seal();
        packet
    }

    #[test]
    fn test_serialized_size() {
        let packet = sample_packet();
        assert_eq!(packet.serialized_size(), 20 + 8 + 11 + 2);
        assert_eq!(packet.to_bytes().len(), packet.serialized_size());
    }

    #[test]
    fn test_roundtrip_preserves_frame() {
        let packet = sample_packet();
        let bytes = packet.to_bytes();
        let parsed = Packet::from_bytes(&bytes).unwrap();
        assert_eq!(parsed, packet);
        assert!(parsed.verify_crc());
    }

    #[test]
    fn test_bit_flip_fails_crc() {
        let packet = sample_packet();
        let mut bytes: Vec<u8> = packet.to_bytes().to_vec();
        bytes[HEADER_SIZE + LLC_SIZE] ^= 0x01;
        // keep the declared payload size coherent so parsing succeeds
        let parsed = Packet::from_bytes(&bytes).unwrap();
        assert!(!parsed.verify_crc());
    }

    #[test]
    fn test_truncated_rejected() {
        let packet = sample_packet();
        let bytes = packet.to_bytes();
        assert!(Packet::from_bytes(&bytes[..10]).is_err());
    }
}
