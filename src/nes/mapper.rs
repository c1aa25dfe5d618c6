use super::cartridge::{Cartridge, CartridgeError, PRG_BANK_SIZE, TRAINER_SIZE};

pub const CARTRIDGE_RAM_SIZE: usize = 8 * 1024;
const TRAINER_OFFSET: usize = 0x1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mirroring {
    Horizontal,
    Vertical,
}

/// CPU-side view of the cartridge slot, $6000-$FFFF.
///
/// Bank-switching boards plug in here: they decode their bank-select
/// registers in `cpu_write` and remap reads accordingly.
pub trait Mapper {
    fn cpu_read(&self, addr: u16) -> u8;
    fn cpu_write(&mut self, addr: u16, value: u8);
    fn name(&self) -> &'static str;
    fn cartridge_ram(&self) -> &[u8];
}

pub fn mapper_name(mapper_id: u16) -> &'static str {
    match mapper_id {
        0 => "NROM",
        1 => "MMC1",
        2 => "UxROM",
        3 => "CNROM",
        4 => "MMC3",
        7 => "AxROM",
        _ => "Unknown",
    }
}

pub fn create_mapper(cart: &Cartridge) -> Result<Box<dyn Mapper>, CartridgeError> {
    match cart.mapper_id {
        0 => Ok(Box::new(Nrom::new(cart))),
        id => Err(CartridgeError::UnsupportedMapper(id)),
    }
}

/// Mapper 0: 16 or 32 KiB of fixed PRG-ROM and 8 KiB of cartridge RAM.
pub struct Nrom {
    prg_rom: Vec<u8>,
    prg_ram: Vec<u8>,
}

impl Nrom {
    pub fn new(cart: &Cartridge) -> Self {
        let mut prg_ram = vec![0; CARTRIDGE_RAM_SIZE];
        if let Some(trainer) = cart.trainer.as_deref() {
            prg_ram[TRAINER_OFFSET..TRAINER_OFFSET + TRAINER_SIZE].copy_from_slice(trainer);
        }
        Self {
            prg_rom: cart.prg_rom.clone(),
            prg_ram,
        }
    }
}

impl Mapper for Nrom {
    fn cpu_read(&self, addr: u16) -> u8 {
        match addr {
            0x6000..=0x7FFF => self.prg_ram[addr as usize - 0x6000],
            0x8000..=0xFFFF => {
                let mut idx = addr as usize - 0x8000;
                if self.prg_rom.len() == PRG_BANK_SIZE {
                    idx %= PRG_BANK_SIZE;
                }
                self.prg_rom[idx]
            }
            _ => 0,
        }
    }

    fn cpu_write(&mut self, addr: u16, value: u8) {
        match addr {
            0x6000..=0x7FFF => self.prg_ram[addr as usize - 0x6000] = value,
            _ => log::trace!("ignored PRG-ROM write ${addr:04X} <- ${value:02X}"),
        }
    }

    fn name(&self) -> &'static str {
        "NROM"
    }

    fn cartridge_ram(&self) -> &[u8] {
        &self.prg_ram
    }
}
