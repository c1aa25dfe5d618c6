use super::cartridge::{Cartridge, CartridgeError};
use super::controller::Controller;
use super::cpu::CpuBus;
use super::mapper::{Mapper, create_mapper};
use super::ppu::Ppu;

pub const RAM_SIZE: usize = 2048;

/// Bits 5-7 of a controller read are open bus; the last byte on the bus
/// was the high address byte $40.
const CONTROLLER_OPEN_BUS: u8 = 0x40;

#[derive(Debug, Clone, Copy, Default)]
pub struct BusCounters {
    pub reads: u64,
    pub writes: u64,
    pub reads_ram: u64,
    pub reads_ppu_regs: u64,
    pub reads_io: u64,
    pub reads_cart: u64,
    pub writes_ram: u64,
    pub writes_ppu_regs: u64,
    pub writes_io: u64,
    pub writes_cart: u64,
    pub dma_transfers: u64,
    pub last_read_addr: u16,
    pub last_write_addr: u16,
    pub last_write_value: u8,
}

/// The CPU's 64 KiB view of the machine: internal RAM, the PPU register
/// window, controller ports, OAM DMA and the cartridge slot.
pub struct AddressSpace {
    ram: [u8; RAM_SIZE],
    ppu: Ppu,
    mapper: Box<dyn Mapper>,
    controllers: [Controller; 2],
    dma_page: Option<u8>,
    counters: BusCounters,
}

impl AddressSpace {
    pub fn new(cart: &Cartridge) -> Result<Self, CartridgeError> {
        let mapper = create_mapper(cart)?;
        let ppu = Ppu::new(cart.chr_data.clone(), cart.chr_is_ram, cart.mirroring);
        Ok(Self {
            ram: [0; RAM_SIZE],
            ppu,
            mapper,
            controllers: [Controller::new(), Controller::new()],
            dma_page: None,
            counters: BusCounters::default(),
        })
    }

    /// Resets the PPU and controller latches. RAM and cartridge RAM keep
    /// their contents.
    pub fn reset(&mut self) {
        self.ppu.reset();
        for pad in &mut self.controllers {
            pad.write_strobe(0);
        }
        self.dma_page = None;
        self.counters = BusCounters::default();
    }

    pub fn ppu(&self) -> &Ppu {
        &self.ppu
    }

    pub fn ppu_mut(&mut self) -> &mut Ppu {
        &mut self.ppu
    }

    pub fn mapper(&self) -> &dyn Mapper {
        self.mapper.as_ref()
    }

    pub fn controller(&self, port: usize) -> Option<&Controller> {
        self.controllers.get(port)
    }

    pub fn set_buttons(&mut self, port: usize, buttons: u8) {
        if let Some(pad) = self.controllers.get_mut(port) {
            pad.set_buttons(buttons);
        }
    }

    pub fn counters(&self) -> BusCounters {
        self.counters
    }

    /// Page of the OAM DMA started by the last instruction, if any.
    pub fn take_dma_request(&mut self) -> Option<u8> {
        self.dma_page.take()
    }

    /// Reads without side effects: no register latches clear, no
    /// controller shifts, no counters move.
    pub fn peek(&self, addr: u16) -> u8 {
        match addr {
            0x0000..=0x1FFF => self.ram[addr as usize & 0x07FF],
            0x2000..=0x3FFF => self.ppu.peek_register(0x2000 | (addr & 0x0007)),
            0x4016 => CONTROLLER_OPEN_BUS | self.controllers[0].peek(),
            0x4017 => CONTROLLER_OPEN_BUS | self.controllers[1].peek(),
            0x4000..=0x5FFF => 0,
            _ => self.mapper.cpu_read(addr),
        }
    }

    fn oam_dma(&mut self, page: u8) {
        self.counters.dma_transfers = self.counters.dma_transfers.wrapping_add(1);
        let base = (page as u16) << 8;
        let mut bytes = [0u8; 256];
        for (offset, slot) in bytes.iter_mut().enumerate() {
            *slot = self.read(base.wrapping_add(offset as u16));
        }
        self.ppu.write_oam_dma(&bytes);
        self.dma_page = Some(page);
    }
}

impl CpuBus for AddressSpace {
    fn read(&mut self, addr: u16) -> u8 {
        self.counters.reads = self.counters.reads.wrapping_add(1);
        self.counters.last_read_addr = addr;
        match addr {
            0x0000..=0x1FFF => {
                self.counters.reads_ram = self.counters.reads_ram.wrapping_add(1);
                self.ram[addr as usize & 0x07FF]
            }
            0x2000..=0x3FFF => {
                self.counters.reads_ppu_regs = self.counters.reads_ppu_regs.wrapping_add(1);
                self.ppu.cpu_read_register(0x2000 | (addr & 0x0007))
            }
            0x4016 => {
                self.counters.reads_io = self.counters.reads_io.wrapping_add(1);
                CONTROLLER_OPEN_BUS | self.controllers[0].read()
            }
            0x4017 => {
                self.counters.reads_io = self.counters.reads_io.wrapping_add(1);
                CONTROLLER_OPEN_BUS | self.controllers[1].read()
            }
            0x4000..=0x5FFF => {
                self.counters.reads_io = self.counters.reads_io.wrapping_add(1);
                0
            }
            _ => {
                self.counters.reads_cart = self.counters.reads_cart.wrapping_add(1);
                self.mapper.cpu_read(addr)
            }
        }
    }

    fn write(&mut self, addr: u16, value: u8) {
        self.counters.writes = self.counters.writes.wrapping_add(1);
        self.counters.last_write_addr = addr;
        self.counters.last_write_value = value;
        match addr {
            0x0000..=0x1FFF => {
                self.counters.writes_ram = self.counters.writes_ram.wrapping_add(1);
                self.ram[addr as usize & 0x07FF] = value;
            }
            0x2000..=0x3FFF => {
                self.counters.writes_ppu_regs = self.counters.writes_ppu_regs.wrapping_add(1);
                self.ppu.cpu_write_register(0x2000 | (addr & 0x0007), value);
            }
            0x4014 => {
                self.counters.writes_io = self.counters.writes_io.wrapping_add(1);
                log::debug!("OAM DMA from page ${value:02X}");
                self.oam_dma(value);
            }
            0x4016 => {
                self.counters.writes_io = self.counters.writes_io.wrapping_add(1);
                for pad in &mut self.controllers {
                    pad.write_strobe(value);
                }
            }
            0x4000..=0x5FFF => {
                self.counters.writes_io = self.counters.writes_io.wrapping_add(1);
                log::trace!("ignored I/O write ${addr:04X} <- ${value:02X}");
            }
            _ => {
                self.counters.writes_cart = self.counters.writes_cart.wrapping_add(1);
                self.mapper.cpu_write(addr, value);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nes::cartridge::build_image;
    use crate::nes::controller::{BUTTON_A, BUTTON_SELECT, BUTTON_START};

    fn bus() -> AddressSpace {
        let cart = Cartridge::from_bytes(&build_image(1, 0, 0, &[0xEA, 0x4C])).unwrap();
        AddressSpace::new(&cart).unwrap()
    }

    #[test]
    fn ram_mirrors_share_one_byte() {
        let mut bus = bus();
        bus.write(0x0012, 0x34);
        for mirror in [0x0812, 0x1012, 0x1812] {
            assert_eq!(bus.read(mirror), 0x34);
        }

        bus.write(0x1FFF, 0x77);
        assert_eq!(bus.read(0x07FF), 0x77);
    }

    #[test]
    fn ppu_registers_mirror_every_eight_bytes() {
        let mut bus = bus();
        bus.write(0x3FFE, 0x3F);
        bus.write(0x2006, 0x00);
        bus.write(0x3FF7, 0x21);

        bus.write(0x2006, 0x3F);
        bus.write(0x2006, 0x00);
        assert_eq!(bus.read(0x3FFF), 0x21);
        assert_eq!(bus.ppu().peek_memory(0x3F00), 0x21);
    }

    #[test]
    fn prg_rom_is_mirrored_and_read_only() {
        let mut bus = bus();
        assert_eq!(bus.read(0x8000), 0xEA);
        assert_eq!(bus.read(0xC001), 0x4C);

        bus.write(0x8000, 0x00);
        assert_eq!(bus.read(0x8000), 0xEA);

        bus.write(0x6000, 0x99);
        assert_eq!(bus.read(0x6000), 0x99);
        assert_eq!(bus.mapper().cartridge_ram()[0], 0x99);
    }

    #[test]
    fn io_and_expansion_reads_are_zero() {
        let mut bus = bus();
        for addr in [0x4000, 0x4015, 0x4018, 0x401F, 0x4020, 0x5FFF] {
            bus.write(addr, 0xFF);
            assert_eq!(bus.read(addr), 0, "${addr:04X}");
        }
    }

    #[test]
    fn controller_ports_shift_with_open_bus_bits() {
        let mut bus = bus();
        bus.set_buttons(0, BUTTON_A | BUTTON_START);
        bus.set_buttons(1, BUTTON_SELECT);

        bus.write(0x4016, 1);
        bus.write(0x4016, 0);

        let pad1: Vec<u8> = (0..9).map(|_| bus.read(0x4016)).collect();
        assert_eq!(pad1, vec![0x41, 0x40, 0x40, 0x41, 0x40, 0x40, 0x40, 0x40, 0x41]);

        let pad2: Vec<u8> = (0..3).map(|_| bus.read(0x4017) & 0x01).collect();
        assert_eq!(pad2, vec![0, 0, 1]);
    }

    #[test]
    fn oam_dma_copies_page_and_requests_stall() {
        let mut bus = bus();
        for i in 0..256u16 {
            bus.write(0x0200 + i, i as u8 ^ 0x5A);
        }
        bus.write(0x2003, 0x00);
        assert_eq!(bus.take_dma_request(), None);

        bus.write(0x4014, 0x02);
        assert_eq!(bus.take_dma_request(), Some(0x02));
        assert_eq!(bus.take_dma_request(), None);
        assert_eq!(bus.ppu().oam()[0], 0x5A);
        assert_eq!(bus.ppu().oam()[0xFF], 0xFF ^ 0x5A);
        assert_eq!(bus.counters().dma_transfers, 1);
    }

    #[test]
    fn peek_has_no_side_effects() {
        let mut bus = bus();
        bus.set_buttons(0, BUTTON_A);
        bus.write(0x4016, 1);
        bus.write(0x4016, 0);
        bus.write(0x0005, 0xAB);
        let reads = bus.counters().reads;

        assert_eq!(bus.peek(0x0805), 0xAB);
        assert_eq!(bus.peek(0x4016), 0x41);
        assert_eq!(bus.peek(0x4016), 0x41);
        assert_eq!(bus.peek(0x8000), 0xEA);
        assert_eq!(bus.peek(0x2002), bus.peek(0x2002));
        assert_eq!(bus.counters().reads, reads);

        assert_eq!(bus.read(0x4016), 0x41);
        assert_eq!(bus.peek(0x4016), 0x40);
    }
}
