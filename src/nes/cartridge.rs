use std::{fs, io, path::Path, path::PathBuf};

use thiserror::Error;

use super::mapper::Mirroring;

pub const HEADER_SIZE: usize = 16;
pub const TRAINER_SIZE: usize = 512;
pub const PRG_BANK_SIZE: usize = 16 * 1024;
pub const CHR_BANK_SIZE: usize = 8 * 1024;

const MAGIC: [u8; 4] = *b"NES\x1A";

#[derive(Debug, Error)]
pub enum CartridgeError {
    #[error("failed to read ROM {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("invalid iNES header: expected NES<EOF> magic, found {found:02X?}")]
    InvalidHeader { found: Vec<u8> },
    #[error("ROM truncated in {section}: expected {expected} bytes but only {actual} remain")]
    Truncated {
        section: &'static str,
        expected: usize,
        actual: usize,
    },
    #[error("mapper {0} is not supported, only mapper 0 (NROM) can be loaded")]
    UnsupportedMapper(u16),
    #[error("unsupported cartridge layout: {0}")]
    UnsupportedLayout(String),
}

#[derive(Debug, Clone)]
pub struct Cartridge {
    pub mapper_id: u16,
    pub mirroring: Mirroring,
    pub has_battery: bool,
    pub trainer: Option<Vec<u8>>,
    pub prg_rom: Vec<u8>,
    pub chr_data: Vec<u8>,
    pub chr_is_ram: bool,
}

impl Cartridge {
    pub fn from_file(path: &Path) -> Result<Self, CartridgeError> {
        let bytes = fs::read(path).map_err(|source| CartridgeError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_bytes(&bytes)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CartridgeError> {
        if bytes.len() >= 4 && bytes[0..4] != MAGIC {
            return Err(CartridgeError::InvalidHeader {
                found: bytes[0..4].to_vec(),
            });
        }
        if bytes.len() < HEADER_SIZE {
            if bytes.len() < 4 {
                return Err(CartridgeError::InvalidHeader {
                    found: bytes.to_vec(),
                });
            }
            return Err(CartridgeError::Truncated {
                section: "header",
                expected: HEADER_SIZE,
                actual: bytes.len(),
            });
        }

        let prg_banks = bytes[4] as usize;
        let chr_banks = bytes[5] as usize;
        let flags6 = bytes[6];
        let flags7 = bytes[7];

        let is_nes2 = (flags7 & 0x0C) == 0x08;
        // Old dumping tools left ASCII junk in bytes 12-15; flags 7 is garbage then.
        let legacy_garbage = !is_nes2 && bytes[12..16].iter().any(|&b| b != 0);
        let mut mapper_id = (flags6 >> 4) as u16;
        if !legacy_garbage {
            mapper_id |= (flags7 & 0xF0) as u16;
        }
        if is_nes2 {
            mapper_id |= ((bytes[8] & 0x0F) as u16) << 8;
        }

        if mapper_id != 0 {
            return Err(CartridgeError::UnsupportedMapper(mapper_id));
        }
        if (flags6 & 0x08) != 0 {
            return Err(CartridgeError::UnsupportedLayout(
                "four-screen name tables need cartridge VRAM".to_string(),
            ));
        }
        if !(1..=2).contains(&prg_banks) {
            return Err(CartridgeError::UnsupportedLayout(format!(
                "NROM carries 1 or 2 PRG banks, header declares {prg_banks}"
            )));
        }
        if chr_banks > 1 {
            return Err(CartridgeError::UnsupportedLayout(format!(
                "NROM carries at most 1 CHR bank, header declares {chr_banks}"
            )));
        }

        let mirroring = if (flags6 & 0x01) != 0 {
            Mirroring::Vertical
        } else {
            Mirroring::Horizontal
        };
        let has_battery = (flags6 & 0x02) != 0;

        let mut cursor = HEADER_SIZE;
        let trainer = if (flags6 & 0x04) != 0 {
            let trainer = take_section(bytes, cursor, TRAINER_SIZE, "trainer")?;
            cursor += TRAINER_SIZE;
            Some(trainer.to_vec())
        } else {
            None
        };

        let prg_size = prg_banks * PRG_BANK_SIZE;
        let prg_rom = take_section(bytes, cursor, prg_size, "PRG-ROM")?.to_vec();
        cursor += prg_size;

        let (chr_data, chr_is_ram) = if chr_banks == 0 {
            (vec![0; CHR_BANK_SIZE], true)
        } else {
            let chr = take_section(bytes, cursor, CHR_BANK_SIZE, "CHR-ROM")?;
            (chr.to_vec(), false)
        };

        Ok(Self {
            mapper_id,
            mirroring,
            has_battery,
            trainer,
            prg_rom,
            chr_data,
            chr_is_ram,
        })
    }

    pub fn prg_banks(&self) -> usize {
        self.prg_rom.len() / PRG_BANK_SIZE
    }

    pub fn chr_banks(&self) -> usize {
        if self.chr_is_ram {
            0
        } else {
            self.chr_data.len() / CHR_BANK_SIZE
        }
    }
}

fn take_section<'a>(
    bytes: &'a [u8],
    start: usize,
    len: usize,
    section: &'static str,
) -> Result<&'a [u8], CartridgeError> {
    let available = bytes.len().saturating_sub(start);
    if available < len {
        return Err(CartridgeError::Truncated {
            section,
            expected: len,
            actual: available,
        });
    }
    Ok(&bytes[start..start + len])
}

/// Builds an iNES image in memory. Shared by unit tests across the crate.
#[cfg(test)]
pub(crate) fn build_image(prg_banks: u8, chr_banks: u8, flags6: u8, prg: &[u8]) -> Vec<u8> {
    let mut image = vec![0u8; HEADER_SIZE];
    image[0..4].copy_from_slice(&MAGIC);
    image[4] = prg_banks;
    image[5] = chr_banks;
    image[6] = flags6;
    if (flags6 & 0x04) != 0 {
        image.extend(std::iter::repeat_n(0xEE, TRAINER_SIZE));
    }
    let mut prg_rom = vec![0u8; prg_banks as usize * PRG_BANK_SIZE];
    prg_rom[..prg.len()].copy_from_slice(prg);
    image.extend_from_slice(&prg_rom);
    image.extend(std::iter::repeat_n(0x5A, chr_banks as usize * CHR_BANK_SIZE));
    image
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_single_bank_nrom() {
        let cart = Cartridge::from_bytes(&build_image(1, 1, 0x01, &[0xA9, 0x05])).unwrap();

        assert_eq!(cart.mapper_id, 0);
        assert_eq!(cart.prg_banks(), 1);
        assert_eq!(cart.chr_banks(), 1);
        assert_eq!(cart.mirroring, Mirroring::Vertical);
        assert_eq!(&cart.prg_rom[..2], &[0xA9, 0x05]);
        assert!(cart.chr_data.iter().all(|&b| b == 0x5A));
        assert!(!cart.chr_is_ram);
        assert!(cart.trainer.is_none());
    }

    #[test]
    fn zero_chr_banks_gives_chr_ram() {
        let cart = Cartridge::from_bytes(&build_image(2, 0, 0x00, &[])).unwrap();

        assert!(cart.chr_is_ram);
        assert_eq!(cart.chr_data.len(), CHR_BANK_SIZE);
        assert_eq!(cart.mirroring, Mirroring::Horizontal);
        assert_eq!(cart.prg_banks(), 2);
    }

    #[test]
    fn trainer_precedes_prg() {
        let cart = Cartridge::from_bytes(&build_image(1, 1, 0x04 | 0x02, &[0x4C])).unwrap();

        assert_eq!(cart.trainer.as_deref().map(<[u8]>::len), Some(TRAINER_SIZE));
        assert_eq!(cart.prg_rom[0], 0x4C);
        assert!(cart.has_battery);
    }

    #[test]
    fn rejects_bad_magic_with_distinct_error() {
        let mut image = build_image(1, 1, 0, &[]);
        image[3] = 0x00;

        let err = Cartridge::from_bytes(&image).unwrap_err();
        assert!(matches!(err, CartridgeError::InvalidHeader { .. }));
        assert!(err.to_string().contains("invalid iNES header"));
    }

    #[test]
    fn rejects_truncated_prg_and_chr() {
        let image = build_image(2, 1, 0, &[]);

        let err = Cartridge::from_bytes(&image[..HEADER_SIZE + PRG_BANK_SIZE]).unwrap_err();
        assert!(matches!(
            err,
            CartridgeError::Truncated {
                section: "PRG-ROM",
                ..
            }
        ));

        let err = Cartridge::from_bytes(&image[..image.len() - 1]).unwrap_err();
        assert!(matches!(
            err,
            CartridgeError::Truncated {
                section: "CHR-ROM",
                actual,
                ..
            } if actual == CHR_BANK_SIZE - 1
        ));

        let err = Cartridge::from_bytes(&image[..10]).unwrap_err();
        assert!(matches!(
            err,
            CartridgeError::Truncated {
                section: "header",
                ..
            }
        ));
    }

    #[test]
    fn rejects_bank_switching_mappers() {
        let mut image = build_image(1, 1, 0x10, &[]);
        assert!(matches!(
            Cartridge::from_bytes(&image),
            Err(CartridgeError::UnsupportedMapper(1))
        ));

        image[6] = 0x00;
        image[7] = 0x40;
        assert!(matches!(
            Cartridge::from_bytes(&image),
            Err(CartridgeError::UnsupportedMapper(0x40))
        ));
    }

    #[test]
    fn ignores_flags7_when_header_tail_has_garbage() {
        let mut image = build_image(1, 1, 0, &[]);
        image[7] = 0x40;
        image[12..16].copy_from_slice(b"Dude");

        let cart = Cartridge::from_bytes(&image).unwrap();
        assert_eq!(cart.mapper_id, 0);
    }

    #[test]
    fn rejects_layouts_outside_nrom() {
        assert!(matches!(
            Cartridge::from_bytes(&build_image(4, 1, 0, &[])),
            Err(CartridgeError::UnsupportedLayout(_))
        ));
        assert!(matches!(
            Cartridge::from_bytes(&build_image(1, 2, 0, &[])),
            Err(CartridgeError::UnsupportedLayout(_))
        ));
        assert!(matches!(
            Cartridge::from_bytes(&build_image(1, 1, 0x08, &[])),
            Err(CartridgeError::UnsupportedLayout(_))
        ));
    }
}
