//! Slot status vector and its packed feedback-packet encoding.
//!
//! The coordinator reports one outcome per slot, two bits each, four slots
//! per byte with slot 0 in the most-significant pair of byte 0. The payload
//! is `ceil(2 * n_slots / 8)` bytes.

use crate::mac::packet::MAX_PAYLOAD;

/// Outcome of one slot within a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SlotState {
    /// Nothing was received in the slot.
    #[default]
    Empty,
    /// A frame was received and passed CRC.
    Ok,
    /// A reception error (collision or channel error) was detected.
    Error,
}

impl SlotState {
    fn to_bits(self) -> u8 {
        match self {
            SlotState::Empty => 0x00,
            SlotState::Ok => 0x01,
            SlotState::Error => 0x02,
        }
    }

    /// Decode a two-bit pattern. The fourth pattern is undefined on the
    /// wire and decodes conservatively as an error.
    fn from_bits(bits: u8) -> SlotState {
        match bits & 0x03 {
            0x00 => SlotState::Empty,
            0x01 => SlotState::Ok,
            _ => SlotState::Error,
        }
    }
}

/// Payload length of a feedback packet reporting `n_slots` slots.
pub fn feedback_len(n_slots: usize) -> usize {
    (2 * n_slots + 7) / 8
}

/// Feedback decoding error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeedbackTruncated;

/// Pack a slot status vector into feedback-packet payload bytes.
pub fn serialize_feedback(slots: &[SlotState]) -> heapless::Vec<u8, MAX_PAYLOAD> {
    let mut payload = heapless::Vec::new();
    payload
        .resize_default(feedback_len(slots.len()))
        .expect("feedback payload exceeds maximum packet payload");
    for (i, slot) in slots.iter().enumerate() {
        let shift = 6 - 2 * (i % 4) as u8;
        payload[i / 4] |= slot.to_bits() << shift;
    }
    payload
}

/// Unpack `n_slots` slot states from feedback-packet payload bytes.
pub fn deserialize_feedback(
    payload: &[u8],
    n_slots: usize,
) -> Result<Vec<SlotState>, FeedbackTruncated> {
    if payload.len() < feedback_len(n_slots) {
        return Err(FeedbackTruncated);
    }
    let mut slots = Vec::with_capacity(n_slots);
    for i in 0..n_slots {
        let shift = 6 - 2 * (i % 4) as u8;
        slots.push(SlotState::from_bits(payload[i / 4] >> shift));
    }
    Ok(slots)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_length() {
        assert_eq!(feedback_len(1), 1);
        assert_eq!(feedback_len(4), 1);
        assert_eq!(feedback_len(5), 2);
        assert_eq!(feedback_len(8), 2);
        assert_eq!(feedback_len(9), 3);
    }

    #[test]
    fn test_slot_zero_in_most_significant_pair() {
        let payload = serialize_feedback(&[SlotState::Error]);
        assert_eq!(&payload[..], &[0b1000_0000]);

        let payload = serialize_feedback(&[SlotState::Empty, SlotState::Ok]);
        assert_eq!(&payload[..], &[0b0001_0000]);
    }

    #[test]
    fn test_roundtrip_all_lengths() {
        let pattern = [
            SlotState::Empty,
            SlotState::Ok,
            SlotState::Error,
            SlotState::Ok,
            SlotState::Empty,
            SlotState::Error,
            SlotState::Error,
        ];
        for n in 1..=pattern.len() {
            let slots = &pattern[..n];
            let payload = serialize_feedback(slots);
            let decoded = deserialize_feedback(&payload, n).unwrap();
            assert_eq!(decoded.as_slice(), slots);
        }
    }

    #[test]
    fn test_undefined_pattern_decodes_as_error() {
        let decoded = deserialize_feedback(&[0b1100_0000], 1).unwrap();
        assert_eq!(decoded, vec![SlotState::Error]);
    }

    #[test]
    fn test_truncated_payload_rejected() {
        assert_eq!(deserialize_feedback(&[0x00], 5), Err(FeedbackTruncated));
    }
}
