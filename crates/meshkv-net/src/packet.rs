//! Wire format (§4.D.2): a fixed 11-byte header followed by an
//! opcode-specific payload, all integers little-endian.
//!
//! ```text
//! offset  size  field
//!   0      2   total length (includes header)
//!   2      4   hash id   (store identity)
//!   6      4   node id   (sender's session-unique tag)
//!  10      1   opcode
//!  11      …   payload
//! ```

use crate::error::ReplicationError;

pub const HEADER_LEN: usize = 11;

/// §4.D.2's opcode table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Opcode {
    /// Wakes the receiver; no state change.
    Nop = 0xEF,
    /// Upsert under the store lock; payload is `key ‖ value`.
    Set = 0x01,
    /// Delete under the store lock; payload is `key`.
    Del = 0x02,
    /// Request the addressed peer to stream its entries; payload is a
    /// node id (4 bytes).
    Sync = 0x03,
    /// "How many entries do you hold?"; no payload.
    StatReq = 0x04,
    /// Answer to `StatReq`; payload is a count, suppressed when the
    /// count is zero.
    Stat = 0x05,
}

impl Opcode {
    fn from_byte(b: u8) -> Option<Self> {
        match b {
            0xEF => Some(Opcode::Nop),
            0x01 => Some(Opcode::Set),
            0x02 => Some(Opcode::Del),
            0x03 => Some(Opcode::Sync),
            0x04 => Some(Opcode::StatReq),
            0x05 => Some(Opcode::Stat),
            _ => None,
        }
    }
}

/// A fully assembled packet, header and payload together.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub hash_id: u32,
    pub node_id: u32,
    pub opcode: Opcode,
    pub payload: Vec<u8>,
}

impl Packet {
    pub fn new(hash_id: u32, node_id: u32, opcode: Opcode, payload: Vec<u8>) -> Self {
        Self {
            hash_id,
            node_id,
            opcode,
            payload,
        }
    }

    /// Assembles header and payload into one scratch buffer for a
    /// single atomic `sendto` (§4.D.3).
    pub fn to_bytes(&self) -> Vec<u8> {
        let total_len = HEADER_LEN + self.payload.len();
        let mut bytes = Vec::with_capacity(total_len);
        bytes.extend_from_slice(&(total_len as u16).to_le_bytes());
        bytes.extend_from_slice(&self.hash_id.to_le_bytes());
        bytes.extend_from_slice(&self.node_id.to_le_bytes());
        bytes.push(self.opcode as u8);
        bytes.extend_from_slice(&self.payload);
        bytes
    }

    /// Parses a received datagram. Under-sized datagrams and unknown
    /// opcodes are reported as errors so the caller can log and
    /// discard per §4.D.6.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ReplicationError> {
        if bytes.len() < HEADER_LEN {
            return Err(ReplicationError::MalformedPacket(format!(
                "datagram too short: {} bytes",
                bytes.len()
            )));
        }
        let total_len = u16::from_le_bytes([bytes[0], bytes[1]]) as usize;
        if total_len != bytes.len() {
            return Err(ReplicationError::MalformedPacket(format!(
                "length mismatch: header says {total_len}, datagram is {}",
                bytes.len()
            )));
        }
        let hash_id = u32::from_le_bytes([bytes[2], bytes[3], bytes[4], bytes[5]]);
        let node_id = u32::from_le_bytes([bytes[6], bytes[7], bytes[8], bytes[9]]);
        let opcode = Opcode::from_byte(bytes[10])
            .ok_or_else(|| ReplicationError::MalformedPacket(format!("unknown opcode {:#x}", bytes[10])))?;
        Ok(Packet {
            hash_id,
            node_id,
            opcode,
            payload: bytes[HEADER_LEN..].to_vec(),
        })
    }
}

/// Encodes a `Stat` payload: a `u64` entry count.
pub fn encode_count(count: u64) -> Vec<u8> {
    count.to_le_bytes().to_vec()
}

/// Decodes a `Stat` payload.
pub fn decode_count(payload: &[u8]) -> Result<u64, ReplicationError> {
    let arr: [u8; 8] = payload
        .try_into()
        .map_err(|_| ReplicationError::MalformedPacket("STAT payload is not 8 bytes".into()))?;
    Ok(u64::from_le_bytes(arr))
}

/// Encodes a `Sync` payload: the target node id.
pub fn encode_node_id(node_id: u32) -> Vec<u8> {
    node_id.to_le_bytes().to_vec()
}

/// Decodes a `Sync` payload.
pub fn decode_node_id(payload: &[u8]) -> Result<u32, ReplicationError> {
    let arr: [u8; 4] = payload
        .try_into()
        .map_err(|_| ReplicationError::MalformedPacket("SYNC payload is not 4 bytes".into()))?;
    Ok(u32::from_le_bytes(arr))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_a_set_packet() {
        let p = Packet::new(0x1234_5678, 0xAABB_CCDD, Opcode::Set, vec![1, 2, 3, 4]);
        let bytes = p.to_bytes();
        assert_eq!(bytes.len(), HEADER_LEN + 4);
        let decoded = Packet::from_bytes(&bytes).unwrap();
        assert_eq!(decoded, p);
    }

    #[test]
    fn round_trips_a_nop_with_empty_payload() {
        let p = Packet::new(1, 2, Opcode::Nop, Vec::new());
        let decoded = Packet::from_bytes(&p.to_bytes()).unwrap();
        assert_eq!(decoded, p);
    }

    #[test]
    fn rejects_undersized_datagrams() {
        assert!(Packet::from_bytes(&[0u8; 3]).is_err());
    }

    #[test]
    fn rejects_unknown_opcodes() {
        let mut bytes = Packet::new(1, 2, Opcode::Nop, Vec::new()).to_bytes();
        bytes[10] = 0x77;
        assert!(Packet::from_bytes(&bytes).is_err());
    }

    #[test]
    fn rejects_length_mismatch() {
        let mut bytes = Packet::new(1, 2, Opcode::Set, vec![9, 9]).to_bytes();
        bytes[0] = 0; // claim total_len = 0
        assert!(Packet::from_bytes(&bytes).is_err());
    }

    #[test]
    fn count_payload_round_trips() {
        let encoded = encode_count(42);
        assert_eq!(decode_count(&encoded).unwrap(), 42);
    }

    #[test]
    fn node_id_payload_round_trips() {
        let encoded = encode_node_id(0xDEAD_BEEF);
        assert_eq!(decode_node_id(&encoded).unwrap(), 0xDEAD_BEEF);
    }
}
