//! Checksum Smartport.
//!
//! Soma de 8 bits dos bytes 2..=9 do frame, dobrando o carry a cada adição.
//! Um frame é válido quando `0xFF - soma == 0`.

use crate::protocol::FRAME_LEN;

/// Primeiro byte coberto pelo checksum (frame_id).
const CRC_START: usize = 2;

/// Soma com carry dobrado sobre `bytes`.
pub fn fold_sum(bytes: &[u8]) -> u8 {
    let mut sum: u16 = 0;
    for &b in bytes {
        sum += u16::from(b);
        sum += sum >> 8;
        sum &= 0x00FF;
    }
    sum as u8
}

/// `true` se o frame de 10 bytes tem checksum válido.
pub fn is_valid(frame: &[u8; FRAME_LEN]) -> bool {
    0xFF - fold_sum(&frame[CRC_START..FRAME_LEN]) == 0
}

/// Byte de checksum que torna válido um frame cujos bytes 0..9 são `frame`.
///
/// O último byte de `frame` é ignorado.
pub fn checksum(frame: &[u8; FRAME_LEN]) -> u8 {
    0xFF - fold_sum(&frame[CRC_START..FRAME_LEN - 1])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame_with_crc(body: [u8; 9]) -> [u8; FRAME_LEN] {
        let mut frame = [0u8; FRAME_LEN];
        frame[..9].copy_from_slice(&body);
        frame[9] = checksum(&frame);
        frame
    }

    #[test]
    fn fold_sum_folds_carry() {
        // 0xFF + 0x02 = 0x101 -> 0x01 + 0x01 = 0x02
        assert_eq!(fold_sum(&[0xFF, 0x02]), 0x02);
        assert_eq!(fold_sum(&[]), 0);
    }

    #[test]
    fn computed_checksum_validates() {
        let frame = frame_with_crc([0x7E, 0x98, 0x10, 0x00, 0x03, 0x23, 0x71, 0x1A, 0x3A]);
        assert!(is_valid(&frame));
    }

    #[test]
    fn known_rssi_frame_is_valid() {
        // RSSI (0xF101) = 50
        let frame = [0x7E, 0x98, 0x10, 0x01, 0xF1, 0x32, 0x00, 0x00, 0x00, 0xCA];
        assert!(is_valid(&frame));
    }

    #[test]
    fn single_byte_corruption_is_detected() {
        let frame = frame_with_crc([0x7E, 0x1B, 0x10, 0x10, 0x02, 0xE8, 0x03, 0x00, 0x00]);
        assert!(is_valid(&frame));
        for pos in CRC_START..FRAME_LEN {
            let mut corrupted = frame;
            corrupted[pos] ^= 0x04;
            assert!(!is_valid(&corrupted), "corrupção no byte {pos} não detectada");
        }
    }

    #[test]
    fn header_bytes_are_not_covered() {
        let mut frame = frame_with_crc([0x7E, 0x1B, 0x10, 0x00, 0x01, 0x64, 0x00, 0x00, 0x00]);
        frame[1] = 0x22;
        assert!(is_valid(&frame));
    }
}
