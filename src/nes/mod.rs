pub mod bus;
pub mod cartridge;
pub mod controller;
pub mod cpu;
pub mod frame;
pub mod instruction;
pub mod mapper;
pub mod palette;
pub mod ppu;

use std::{collections::VecDeque, path::Path};

use bus::AddressSpace;
use cartridge::{Cartridge, CartridgeError};
use cpu::{Cpu, StepError};
use frame::Frame;
use mapper::mapper_name;
use ppu::{Ppu, PpuDebugCounters};

pub use controller::{
    BUTTON_A, BUTTON_B, BUTTON_DOWN, BUTTON_LEFT, BUTTON_RIGHT, BUTTON_SELECT, BUTTON_START,
    BUTTON_UP,
};

/// OAM DMA halts the CPU for 513 cycles, plus one when it starts on an odd cycle.
pub const OAM_DMA_CYCLES: u32 = 513;
pub const PPU_TICKS_PER_CPU_CYCLE: u32 = 3;

const MAX_DEBUG_EVENTS: usize = 512;
const FRAME_STEP_GUARD: usize = 1_000_000;

#[derive(Debug, Clone, Copy, Default)]
pub struct DebugCounters {
    pub frames: u64,
    pub cpu_steps: u64,
    pub cpu_cycles: u64,
    pub ppu_ticks: u64,
    pub nmis_raised: u64,
    pub nmis_serviced: u64,
    pub dma_transfers: u64,
    pub dma_stall_cycles: u64,
}

/// A powered-on NES with one NROM cartridge inserted.
pub struct Console {
    cpu: Cpu,
    bus: AddressSpace,
    mapper_id: u16,
    has_battery: bool,
    debug: DebugCounters,
    debug_events: VecDeque<String>,
}

impl Console {
    /// Inserts `cart` and resets. Fails without building anything when the
    /// cartridge needs a mapper this core does not have.
    pub fn new(cart: Cartridge) -> Result<Self, CartridgeError> {
        let bus = AddressSpace::new(&cart)?;
        log::info!(
            "loaded {} cartridge: {} KiB PRG, {} KiB CHR{}, {:?} mirroring",
            mapper_name(cart.mapper_id),
            cart.prg_rom.len() / 1024,
            cart.chr_data.len() / 1024,
            if cart.chr_is_ram { " RAM" } else { "" },
            cart.mirroring,
        );

        let mut console = Self {
            cpu: Cpu::new(),
            bus,
            mapper_id: cart.mapper_id,
            has_battery: cart.has_battery,
            debug: DebugCounters::default(),
            debug_events: VecDeque::with_capacity(MAX_DEBUG_EVENTS),
        };
        console.reset();
        console.push_debug_event(format!("ROM loaded: {}", console.mapper_name()));
        Ok(console)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CartridgeError> {
        Self::new(Cartridge::from_bytes(bytes)?)
    }

    pub fn from_file(path: &Path) -> Result<Self, CartridgeError> {
        Self::new(Cartridge::from_file(path)?)
    }

    /// Power-up register state and PC from the reset vector. Internal RAM
    /// and cartridge RAM are left as they were.
    pub fn reset(&mut self) {
        self.bus.reset();
        self.cpu.reset(&mut self.bus);
        self.debug = DebugCounters::default();
        self.debug_events.clear();

        let pc = self.cpu.regs.pc;
        log::info!("reset, PC=${pc:04X}");
        self.push_debug_event(format!("CPU reset, PC=${pc:04X}"));
    }

    /// Executes one CPU instruction (or interrupt entry) and runs the PPU
    /// three ticks per CPU cycle it took, OAM DMA stall included. Returns
    /// the CPU cycles consumed.
    pub fn step(&mut self) -> Result<u32, StepError> {
        let was_jammed = self.cpu.jammed().is_some();
        let servicing_nmi = self.cpu.nmi_pending();

        let mut cycles = match self.cpu.step(&mut self.bus) {
            Ok(cycles) => cycles,
            Err(err) => {
                if !was_jammed {
                    self.push_debug_event(err.to_string());
                }
                return Err(err);
            }
        };

        self.debug.cpu_steps = self.debug.cpu_steps.wrapping_add(1);
        if servicing_nmi {
            self.debug.nmis_serviced = self.debug.nmis_serviced.wrapping_add(1);
            self.push_debug_event(format!(
                "NMI serviced at scanline/cycle ({}, {}), PC=${:04X}",
                self.bus.ppu().scanline(),
                self.bus.ppu().cycle(),
                self.cpu.regs.pc
            ));
        }

        if let Some(page) = self.bus.take_dma_request() {
            let odd_cycle = (self.cpu.cycles & 0x01) as u32;
            let stall = OAM_DMA_CYCLES + odd_cycle;
            self.cpu.stall(stall);
            cycles += stall;

            self.debug.dma_transfers = self.debug.dma_transfers.wrapping_add(1);
            self.debug.dma_stall_cycles = self.debug.dma_stall_cycles.wrapping_add(stall as u64);
            self.push_debug_event(format!(
                "OAM DMA page=${page:02X} cpu_phase={odd_cycle} stall_cycles={stall}"
            ));
        }

        self.debug.cpu_cycles = self.debug.cpu_cycles.wrapping_add(cycles as u64);
        self.tick_ppu(cycles * PPU_TICKS_PER_CPU_CYCLE);
        Ok(cycles)
    }

    /// Steps until the PPU publishes its next frame, then returns it.
    pub fn step_frame(&mut self) -> Result<Frame, StepError> {
        let start = self.bus.ppu().frame_count();
        let mut guard = 0usize;
        while self.bus.ppu().frame_count() == start {
            self.step()?;
            guard += 1;
            if guard > FRAME_STEP_GUARD {
                self.push_debug_event(format!(
                    "Frame guard tripped at {FRAME_STEP_GUARD} CPU steps"
                ));
                break;
            }
        }
        self.debug.frames = self.debug.frames.wrapping_add(1);
        Ok(self.frame())
    }

    fn tick_ppu(&mut self, ticks: u32) {
        for _ in 0..ticks {
            self.bus.ppu_mut().tick();
            if self.bus.ppu_mut().take_nmi() {
                self.debug.nmis_raised = self.debug.nmis_raised.wrapping_add(1);
                self.cpu.trigger_nmi();
            }
        }
        self.debug.ppu_ticks = self.debug.ppu_ticks.wrapping_add(ticks as u64);
    }

    /// `port` 0 is $4016, 1 is $4017. Bits follow the `BUTTON_*` constants.
    pub fn set_buttons(&mut self, port: usize, buttons: u8) {
        self.bus.set_buttons(port, buttons);
    }

    /// Most recently completed frame, 256x240 RGB.
    pub fn frame(&self) -> Frame {
        self.bus.ppu().frame()
    }

    pub fn frame_count(&self) -> u64 {
        self.bus.ppu().frame_count()
    }

    pub fn cpu(&self) -> &Cpu {
        &self.cpu
    }

    pub fn bus(&self) -> &AddressSpace {
        &self.bus
    }

    pub fn ppu(&self) -> &Ppu {
        self.bus.ppu()
    }

    pub fn peek(&self, addr: u16) -> u8 {
        self.bus.peek(addr)
    }

    /// Disassembles the instruction at `addr`; returns the text and its size.
    pub fn disassemble(&self, addr: u16) -> (String, u8) {
        instruction::disassemble(addr, |a| self.bus.peek(a))
    }

    /// The 8 KiB at $6000-$7FFF, for hosts that persist battery saves.
    pub fn cartridge_ram(&self) -> &[u8] {
        self.bus.mapper().cartridge_ram()
    }

    pub fn has_battery(&self) -> bool {
        self.has_battery
    }

    pub fn mapper_name(&self) -> String {
        format!("{} (mapper {})", self.bus.mapper().name(), self.mapper_id)
    }

    pub fn debug_counters(&self) -> DebugCounters {
        self.debug
    }

    pub fn debug_ppu_counters(&self) -> PpuDebugCounters {
        self.bus.ppu().debug_counters()
    }

    /// Newest first.
    pub fn recent_events(&self, limit: usize) -> Vec<String> {
        if limit == 0 {
            return Vec::new();
        }

        self.debug_events
            .iter()
            .rev()
            .take(limit)
            .cloned()
            .collect()
    }

    fn push_debug_event<S: Into<String>>(&mut self, event: S) {
        if self.debug_events.len() >= MAX_DEBUG_EVENTS {
            self.debug_events.pop_front();
        }
        self.debug_events.push_back(event.into());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cartridge::{PRG_BANK_SIZE, build_image};

    /// NROM-128 image with `program` at $8000, NMI at $9000 and IRQ at $A000.
    fn console_with(program: &[u8]) -> Console {
        let mut prg = vec![0xEA; PRG_BANK_SIZE];
        prg[..program.len()].copy_from_slice(program);
        prg[0x1000] = 0x40;
        prg[0x3FFA..].copy_from_slice(&[0x00, 0x90, 0x00, 0x80, 0x00, 0xA0]);
        Console::from_bytes(&build_image(1, 0, 0, &prg)).unwrap()
    }

    #[test]
    fn reset_loads_vector_and_power_up_registers() {
        let console = console_with(&[]);
        let regs = console.cpu().regs;

        assert_eq!(regs.pc, 0x8000);
        assert_eq!(regs.sp, 0xFD);
        assert_eq!(regs.p.bits(), 0x24);
        assert_eq!(console.recent_events(1), vec!["ROM loaded: NROM (mapper 0)"]);
        assert_eq!(console.recent_events(2)[1], "CPU reset, PC=$8000");
    }

    #[test]
    fn reset_preserves_ram() {
        let mut console = console_with(&[0xA9, 0x42, 0x85, 0x10, 0x8D, 0x00, 0x60]);
        for _ in 0..3 {
            console.step().unwrap();
        }
        console.reset();

        assert_eq!(console.peek(0x0010), 0x42);
        assert_eq!(console.cartridge_ram()[0], 0x42);
        assert_eq!(console.cpu().regs.pc, 0x8000);
        assert_eq!(console.cpu().cycles, 0);
    }

    #[test]
    fn oam_dma_stall_depends_on_cycle_parity() {
        // LDA #$02 ; STA $4014
        let mut even = console_with(&[0xA9, 0x02, 0x8D, 0x14, 0x40]);
        assert_eq!(even.step(), Ok(2));
        assert_eq!(even.step(), Ok(4 + 513));

        // LDA $00 ; LDA #$02 ; STA $4014
        let mut odd = console_with(&[0xA5, 0x00, 0xA9, 0x02, 0x8D, 0x14, 0x40]);
        assert_eq!(odd.step(), Ok(3));
        assert_eq!(odd.step(), Ok(2));
        assert_eq!(odd.step(), Ok(4 + 514));
        assert_eq!(odd.cpu().cycles, 9 + 514);
        assert_eq!(odd.debug_counters().dma_stall_cycles, 514);
    }

    #[test]
    fn ppu_runs_three_ticks_per_cpu_cycle() {
        let mut console = console_with(&[]);
        for _ in 0..10 {
            console.step().unwrap();
        }

        // Ten NOPs: 20 CPU cycles.
        assert_eq!(console.ppu().scanline(), 0);
        assert_eq!(console.ppu().cycle(), 60);
        assert_eq!(console.debug_counters().ppu_ticks, 60);
    }

    #[test]
    fn jam_is_reported_once_and_sticks() {
        let mut console = console_with(&[0xEA, 0x02]);
        console.step().unwrap();

        let err = StepError::Jammed {
            opcode: 0x02,
            pc: 0x8001,
        };
        assert_eq!(console.step(), Err(err));
        assert_eq!(console.step(), Err(err));
        assert_eq!(console.cpu().regs.pc, 0x8001);
        assert_eq!(console.recent_events(1), vec![err.to_string()]);
        assert_eq!(console.recent_events(2)[1], "ROM loaded: NROM (mapper 0)");

        console.reset();
        assert!(console.cpu().jammed().is_none());
    }

    #[test]
    fn event_ring_is_bounded() {
        let mut console = console_with(&[]);
        for i in 0..(MAX_DEBUG_EVENTS + 10) {
            console.push_debug_event(format!("event {i}"));
        }

        assert_eq!(console.recent_events(usize::MAX).len(), MAX_DEBUG_EVENTS);
        assert_eq!(
            console.recent_events(1),
            vec![format!("event {}", MAX_DEBUG_EVENTS + 9)]
        );
        assert!(console.recent_events(0).is_empty());
    }

    #[test]
    fn disassembles_through_the_bus() {
        let console = console_with(&[0xA9, 0x05, 0x4C, 0x00, 0x80]);
        assert_eq!(console.disassemble(0x8000), ("LDA #$05".to_string(), 2));
        assert_eq!(console.disassemble(0x8002), ("JMP $8000".to_string(), 3));
    }
}
