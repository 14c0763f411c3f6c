//! Frame check sequence for the Tracer protocol
//!
//! A 16-bit CRC with polynomial 0x1041, zero initial value, no reflection and
//! no final XOR, computed over address, function code, length and payload.
//! The sync marker and trailer are not covered. The value is transmitted
//! high byte first.

use crc::{Algorithm, Crc};

/// CRC parameters used by the controller's remote-meter port
pub const CRC_16_TRACER: Algorithm<u16> = Algorithm {
    width: 16,
    poly: 0x1041,
    init: 0x0000,
    refin: false,
    refout: false,
    xorout: 0x0000,
    check: 0xAF1C,
    residue: 0x0000,
};

const TRACER_CRC: Crc<u16> = Crc::<u16>::new(&CRC_16_TRACER);

/// Compute the checksum over `bytes`
pub fn compute(bytes: &[u8]) -> u16 {
    TRACER_CRC.checksum(bytes)
}

/// Check `bytes` against a checksum received on the wire
pub fn verify(bytes: &[u8], claimed: u16) -> bool {
    compute(bytes) == claimed
}

/// Wire representation of a checksum
pub fn to_bytes(checksum: u16) -> [u8; 2] {
    checksum.to_be_bytes()
}

/// Read a checksum from its wire representation
pub fn from_bytes(bytes: [u8; 2]) -> u16 {
    u16::from_be_bytes(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_value() {
        assert_eq!(compute(b"123456789"), 0xAF1C);
    }

    #[test]
    fn test_known_request_checksum() {
        // Real-time query to controller 0x16 as sent by the MT-5 meter
        assert_eq!(compute(&[0x16, 0xA0, 0x00]), 0xB1A7);
        assert_eq!(to_bytes(0xB1A7), [0xB1, 0xA7]);
    }

    #[test]
    fn test_verify_rejects_wrong_value() {
        assert!(verify(&[0x16, 0xAA, 0x01, 0x01], 0xEC88));
        assert!(!verify(&[0x16, 0xAA, 0x01, 0x01], 0xEC89));
        assert!(!verify(&[0x16, 0xAA, 0x01, 0x00], 0xEC88));
    }
}
