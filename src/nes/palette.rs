//! Fixed 64-entry system palette.
//!
//! PPU palette RAM stores 6-bit indices into this table; the renderer writes
//! the looked-up RGB triple into the back framebuffer unchanged.

pub const SYSTEM_PALETTE: [[u8; 3]; 64] = [
    [0x6A, 0x6D, 0x6A], [0x00, 0x13, 0x80], [0x1E, 0x00, 0x8A], [0x39, 0x00, 0x7A],
    [0x55, 0x00, 0x56], [0x5A, 0x00, 0x18], [0x4F, 0x10, 0x00], [0x38, 0x21, 0x00],
    [0x21, 0x33, 0x00], [0x00, 0x3D, 0x00], [0x00, 0x40, 0x00], [0x00, 0x39, 0x24],
    [0x00, 0x2E, 0x55], [0x00, 0x00, 0x00], [0x00, 0x00, 0x00], [0x00, 0x00, 0x00],
    [0xB9, 0xBC, 0xB9], [0x18, 0x50, 0xC7], [0x4B, 0x30, 0xE3], [0x73, 0x22, 0xD6],
    [0x95, 0x1F, 0xA9], [0x9D, 0x28, 0x5C], [0x96, 0x3C, 0x00], [0x7A, 0x51, 0x00],
    [0x5B, 0x67, 0x00], [0x22, 0x77, 0x00], [0x02, 0x7E, 0x02], [0x00, 0x76, 0x45],
    [0x00, 0x6E, 0x8A], [0x00, 0x00, 0x00], [0x00, 0x00, 0x00], [0x00, 0x00, 0x00],
    [0xFF, 0xFF, 0xFF], [0x68, 0xA6, 0xFF], [0x92, 0x99, 0xFF], [0xB0, 0x85, 0xFF],
    [0xD9, 0x75, 0xFD], [0xE3, 0x77, 0xB9], [0xE5, 0x8D, 0x68], [0xCF, 0xA2, 0x2C],
    [0xB3, 0xAF, 0x0C], [0x7B, 0xC2, 0x11], [0x55, 0xCA, 0x47], [0x46, 0xCB, 0x81],
    [0x47, 0xC1, 0xC5], [0x4A, 0x4D, 0x4A], [0x00, 0x00, 0x00], [0x00, 0x00, 0x00],
    [0xFF, 0xFF, 0xFF], [0xCC, 0xEA, 0xFF], [0xDD, 0xDE, 0xFF], [0xEC, 0xDA, 0xFF],
    [0xF8, 0xD7, 0xFE], [0xFC, 0xD6, 0xF5], [0xFD, 0xDB, 0xCF], [0xF9, 0xE7, 0xB5],
    [0xF1, 0xF0, 0xAA], [0xDA, 0xFA, 0xA9], [0xC9, 0xFF, 0xBC], [0xC3, 0xFB, 0xD7],
    [0xC4, 0xF6, 0xF6], [0xBE, 0xC1, 0xBE], [0x00, 0x00, 0x00], [0x00, 0x00, 0x00],
];

/// Returns the RGB triple for a 6-bit palette value. Bits 6 and 7 are ignored.
pub fn rgb(index: u8) -> [u8; 3] {
    SYSTEM_PALETTE[(index & 0x3F) as usize]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_has_expected_anchor_colors() {
        assert_eq!(rgb(0x00), [0x6A, 0x6D, 0x6A]);
        assert_eq!(rgb(0x0D), [0x00, 0x00, 0x00]);
        assert_eq!(rgb(0x15), [0x9D, 0x28, 0x5C]);
        assert_eq!(rgb(0x20), [0xFF, 0xFF, 0xFF]);
        assert_eq!(rgb(0x2D), [0x4A, 0x4D, 0x4A]);
        assert_eq!(rgb(0x3D), [0xBE, 0xC1, 0xBE]);
        assert_eq!(rgb(0x3F), [0x00, 0x00, 0x00]);
    }

    #[test]
    fn lookup_masks_to_six_bits() {
        for index in 0..64u8 {
            assert_eq!(rgb(index), SYSTEM_PALETTE[index as usize]);
            assert_eq!(rgb(index | 0xC0), SYSTEM_PALETTE[index as usize]);
        }
    }
}
