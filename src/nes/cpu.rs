use std::fmt;

use thiserror::Error;

use super::instruction::{AddressingMode, Instruction, Operation, Penalty};

pub const FLAG_CARRY: u8 = 0x01;
pub const FLAG_ZERO: u8 = 0x02;
pub const FLAG_INTERRUPT: u8 = 0x04;
pub const FLAG_DECIMAL: u8 = 0x08;
pub const FLAG_BREAK: u8 = 0x10;
pub const FLAG_UNUSED: u8 = 0x20;
pub const FLAG_OVERFLOW: u8 = 0x40;
pub const FLAG_NEGATIVE: u8 = 0x80;

pub const NMI_VECTOR: u16 = 0xFFFA;
pub const RESET_VECTOR: u16 = 0xFFFC;
pub const IRQ_VECTOR: u16 = 0xFFFE;

const STACK_PAGE: u16 = 0x0100;
const INTERRUPT_CYCLES: u32 = 7;

/// Everything the CPU can see. Reads may have side effects (PPU status,
/// controller shift registers), so both take `&mut self`.
pub trait CpuBus {
    fn read(&mut self, addr: u16) -> u8;
    fn write(&mut self, addr: u16, value: u8);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum StepError {
    #[error("CPU jammed by opcode ${opcode:02X} at ${pc:04X}")]
    Jammed { opcode: u8, pc: u16 },
}

/// Processor status register. Bit 5 reads as set at all times and the
/// break bit only exists in copies pushed to the stack.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Status(u8);

impl Status {
    pub const fn from_bits(bits: u8) -> Self {
        Self((bits & !FLAG_BREAK) | FLAG_UNUSED)
    }

    pub const fn bits(self) -> u8 {
        self.0
    }

    pub const fn get(self, flag: u8) -> bool {
        (self.0 & flag) != 0
    }

    pub fn set(&mut self, flag: u8, on: bool) {
        if on {
            self.0 |= flag;
        } else {
            self.0 &= !flag;
        }
        self.0 = (self.0 & !FLAG_BREAK) | FLAG_UNUSED;
    }

    /// The byte written to the stack by PHP/BRK (`brk = true`) or by an
    /// NMI/IRQ entry (`brk = false`).
    pub const fn pushed(self, brk: bool) -> u8 {
        let b = if brk { FLAG_BREAK } else { 0 };
        self.0 | FLAG_UNUSED | b
    }
}

impl Default for Status {
    fn default() -> Self {
        Self::from_bits(FLAG_INTERRUPT)
    }
}

impl fmt::Debug for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Status({self})")
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const NAMES: [(u8, char); 8] = [
            (FLAG_NEGATIVE, 'N'),
            (FLAG_OVERFLOW, 'V'),
            (FLAG_UNUSED, '-'),
            (FLAG_BREAK, 'B'),
            (FLAG_DECIMAL, 'D'),
            (FLAG_INTERRUPT, 'I'),
            (FLAG_ZERO, 'Z'),
            (FLAG_CARRY, 'C'),
        ];
        for (flag, name) in NAMES {
            let c = if self.get(flag) {
                name
            } else {
                name.to_ascii_lowercase()
            };
            write!(f, "{c}")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Registers {
    pub a: u8,
    pub x: u8,
    pub y: u8,
    pub sp: u8,
    pub pc: u16,
    pub p: Status,
}

impl Default for Registers {
    fn default() -> Self {
        Self {
            a: 0,
            x: 0,
            y: 0,
            sp: 0xFD,
            pc: 0,
            p: Status::default(),
        }
    }
}

#[derive(Clone, Copy)]
struct Operand {
    addr: u16,
    /// Un-indexed address; its high byte feeds the SHA/SHX/SHY/TAS quirk.
    base: u16,
    page_crossed: bool,
}

impl Operand {
    const fn at(addr: u16) -> Self {
        Self {
            addr,
            base: addr,
            page_crossed: false,
        }
    }
}

pub struct Cpu {
    pub regs: Registers,
    pub cycles: u64,
    nmi_pending: bool,
    irq_line: bool,
    jammed: Option<StepError>,
}

impl Default for Cpu {
    fn default() -> Self {
        Self::new()
    }
}

impl Cpu {
    pub fn new() -> Self {
        Self {
            regs: Registers::default(),
            cycles: 0,
            nmi_pending: false,
            irq_line: false,
            jammed: None,
        }
    }

    pub fn reset<B: CpuBus>(&mut self, bus: &mut B) {
        self.regs = Registers::default();
        self.regs.pc = read_word(bus, RESET_VECTOR);
        self.cycles = 0;
        self.nmi_pending = false;
        self.irq_line = false;
        self.jammed = None;
    }

    /// Latches an NMI edge. It is serviced at the start of the next `step`.
    pub fn trigger_nmi(&mut self) {
        self.nmi_pending = true;
    }

    pub fn nmi_pending(&self) -> bool {
        self.nmi_pending
    }

    /// Level-sensitive IRQ input. Nothing in this console drives it.
    pub fn set_irq_line(&mut self, asserted: bool) {
        self.irq_line = asserted;
    }

    pub fn jammed(&self) -> Option<StepError> {
        self.jammed
    }

    /// Charges cycles the CPU spends stalled outside an instruction (OAM DMA).
    pub fn stall(&mut self, cycles: u32) {
        self.cycles += cycles as u64;
    }

    /// Runs one instruction, or enters one pending interrupt, and returns
    /// the CPU cycles it took.
    pub fn step<B: CpuBus>(&mut self, bus: &mut B) -> Result<u32, StepError> {
        if let Some(err) = self.jammed {
            return Err(err);
        }

        if self.nmi_pending {
            self.nmi_pending = false;
            self.interrupt(bus, NMI_VECTOR, false);
            return Ok(self.charge(INTERRUPT_CYCLES));
        }

        if self.irq_line && !self.regs.p.get(FLAG_INTERRUPT) {
            self.interrupt(bus, IRQ_VECTOR, false);
            return Ok(self.charge(INTERRUPT_CYCLES));
        }

        let opcode_pc = self.regs.pc;
        let opcode = self.fetch(bus);
        let instruction = Instruction::lookup(opcode);

        if instruction.operation == Operation::Jam {
            self.regs.pc = opcode_pc;
            let err = StepError::Jammed {
                opcode,
                pc: opcode_pc,
            };
            log::warn!("{err}");
            self.jammed = Some(err);
            return Err(err);
        }

        let operand = self.resolve(bus, instruction);
        let mut cycles = instruction.cycles as u32;
        if instruction.penalty == Penalty::PageCross && operand.page_crossed {
            cycles += 1;
        }
        cycles += self.execute(bus, instruction, operand);
        Ok(self.charge(cycles))
    }

    fn charge(&mut self, cycles: u32) -> u32 {
        self.cycles += cycles as u64;
        cycles
    }

    fn fetch<B: CpuBus>(&mut self, bus: &mut B) -> u8 {
        let byte = bus.read(self.regs.pc);
        self.regs.pc = self.regs.pc.wrapping_add(1);
        byte
    }

    fn fetch_word<B: CpuBus>(&mut self, bus: &mut B) -> u16 {
        let lo = self.fetch(bus);
        let hi = self.fetch(bus);
        u16::from_le_bytes([lo, hi])
    }

    fn resolve<B: CpuBus>(&mut self, bus: &mut B, instruction: &Instruction) -> Operand {
        match instruction.mode {
            AddressingMode::Implied | AddressingMode::Accumulator => Operand::at(0),
            AddressingMode::Immediate => {
                let addr = self.regs.pc;
                self.regs.pc = addr.wrapping_add(1);
                Operand::at(addr)
            }
            AddressingMode::ZeroPage => Operand::at(self.fetch(bus) as u16),
            AddressingMode::ZeroPageX => {
                let base = self.fetch(bus);
                Operand::at(base.wrapping_add(self.regs.x) as u16)
            }
            AddressingMode::ZeroPageY => {
                let base = self.fetch(bus);
                Operand::at(base.wrapping_add(self.regs.y) as u16)
            }
            AddressingMode::Absolute => Operand::at(self.fetch_word(bus)),
            AddressingMode::AbsoluteX => {
                let base = self.fetch_word(bus);
                indexed(bus, base, self.regs.x, instruction.penalty)
            }
            AddressingMode::AbsoluteY => {
                let base = self.fetch_word(bus);
                indexed(bus, base, self.regs.y, instruction.penalty)
            }
            AddressingMode::Indirect => {
                let ptr = self.fetch_word(bus);
                let lo = bus.read(ptr);
                // The pointer's high byte never carries into the next page.
                let hi = bus.read((ptr & 0xFF00) | (ptr.wrapping_add(1) & 0x00FF));
                Operand::at(u16::from_le_bytes([lo, hi]))
            }
            AddressingMode::IndexedIndirect => {
                let zp = self.fetch(bus).wrapping_add(self.regs.x);
                Operand::at(read_zero_page_word(bus, zp))
            }
            AddressingMode::IndirectIndexed => {
                let zp = self.fetch(bus);
                let base = read_zero_page_word(bus, zp);
                indexed(bus, base, self.regs.y, instruction.penalty)
            }
            AddressingMode::Relative => {
                let offset = self.fetch(bus) as i8;
                let next = self.regs.pc;
                let target = next.wrapping_add(offset as u16);
                Operand {
                    addr: target,
                    base: next,
                    page_crossed: (next & 0xFF00) != (target & 0xFF00),
                }
            }
        }
    }

    /// Executes a resolved instruction and returns cycles beyond the base
    /// count (taken branches only).
    fn execute<B: CpuBus>(
        &mut self,
        bus: &mut B,
        instruction: &Instruction,
        operand: Operand,
    ) -> u32 {
        let mode = instruction.mode;
        let addr = operand.addr;

        match instruction.operation {
            Operation::Lda => {
                let value = bus.read(addr);
                self.regs.a = value;
                self.update_zn(value);
            }
            Operation::Ldx => {
                let value = bus.read(addr);
                self.regs.x = value;
                self.update_zn(value);
            }
            Operation::Ldy => {
                let value = bus.read(addr);
                self.regs.y = value;
                self.update_zn(value);
            }
            Operation::Sta => bus.write(addr, self.regs.a),
            Operation::Stx => bus.write(addr, self.regs.x),
            Operation::Sty => bus.write(addr, self.regs.y),

            Operation::Tax => {
                self.regs.x = self.regs.a;
                self.update_zn(self.regs.x);
            }
            Operation::Tay => {
                self.regs.y = self.regs.a;
                self.update_zn(self.regs.y);
            }
            Operation::Txa => {
                self.regs.a = self.regs.x;
                self.update_zn(self.regs.a);
            }
            Operation::Tya => {
                self.regs.a = self.regs.y;
                self.update_zn(self.regs.a);
            }
            Operation::Tsx => {
                self.regs.x = self.regs.sp;
                self.update_zn(self.regs.x);
            }
            Operation::Txs => self.regs.sp = self.regs.x,

            Operation::Pha => self.push(bus, self.regs.a),
            Operation::Php => {
                let status = self.regs.p.pushed(true);
                self.push(bus, status);
            }
            Operation::Pla => {
                let value = self.pull(bus);
                self.regs.a = value;
                self.update_zn(value);
            }
            Operation::Plp => {
                let value = self.pull(bus);
                self.regs.p = Status::from_bits(value);
            }

            Operation::And => {
                let value = bus.read(addr);
                self.and(value);
            }
            Operation::Ora => {
                let value = bus.read(addr);
                self.ora(value);
            }
            Operation::Eor => {
                let value = bus.read(addr);
                self.eor(value);
            }
            Operation::Adc => {
                let value = bus.read(addr);
                self.adc(value);
            }
            Operation::Sbc => {
                let value = bus.read(addr);
                self.sbc(value);
            }
            Operation::Cmp => {
                let value = bus.read(addr);
                self.compare(self.regs.a, value);
            }
            Operation::Cpx => {
                let value = bus.read(addr);
                self.compare(self.regs.x, value);
            }
            Operation::Cpy => {
                let value = bus.read(addr);
                self.compare(self.regs.y, value);
            }
            Operation::Bit => {
                let value = bus.read(addr);
                self.regs.p.set(FLAG_ZERO, (self.regs.a & value) == 0);
                self.regs.p.set(FLAG_NEGATIVE, (value & 0x80) != 0);
                self.regs.p.set(FLAG_OVERFLOW, (value & 0x40) != 0);
            }

            Operation::Asl => {
                self.modify(bus, mode, addr, Self::asl);
            }
            Operation::Lsr => {
                self.modify(bus, mode, addr, Self::lsr);
            }
            Operation::Rol => {
                self.modify(bus, mode, addr, Self::rol);
            }
            Operation::Ror => {
                self.modify(bus, mode, addr, Self::ror);
            }
            Operation::Inc => {
                self.modify(bus, mode, addr, Self::inc);
            }
            Operation::Dec => {
                self.modify(bus, mode, addr, Self::dec);
            }
            Operation::Inx => self.regs.x = self.inc(self.regs.x),
            Operation::Iny => self.regs.y = self.inc(self.regs.y),
            Operation::Dex => self.regs.x = self.dec(self.regs.x),
            Operation::Dey => self.regs.y = self.dec(self.regs.y),

            Operation::Jmp => self.regs.pc = addr,
            Operation::Jsr => {
                let ret = self.regs.pc.wrapping_sub(1);
                self.push_word(bus, ret);
                self.regs.pc = addr;
            }
            Operation::Rts => {
                let ret = self.pull_word(bus);
                self.regs.pc = ret.wrapping_add(1);
            }
            Operation::Rti => {
                let status = self.pull(bus);
                self.regs.p = Status::from_bits(status);
                self.regs.pc = self.pull_word(bus);
            }
            Operation::Brk => {
                // The byte after BRK is padding and is skipped on return.
                self.regs.pc = self.regs.pc.wrapping_add(1);
                self.interrupt(bus, IRQ_VECTOR, true);
            }

            Operation::Bcc => return self.branch(!self.regs.p.get(FLAG_CARRY), operand),
            Operation::Bcs => return self.branch(self.regs.p.get(FLAG_CARRY), operand),
            Operation::Bne => return self.branch(!self.regs.p.get(FLAG_ZERO), operand),
            Operation::Beq => return self.branch(self.regs.p.get(FLAG_ZERO), operand),
            Operation::Bpl => return self.branch(!self.regs.p.get(FLAG_NEGATIVE), operand),
            Operation::Bmi => return self.branch(self.regs.p.get(FLAG_NEGATIVE), operand),
            Operation::Bvc => return self.branch(!self.regs.p.get(FLAG_OVERFLOW), operand),
            Operation::Bvs => return self.branch(self.regs.p.get(FLAG_OVERFLOW), operand),

            Operation::Clc => self.regs.p.set(FLAG_CARRY, false),
            Operation::Sec => self.regs.p.set(FLAG_CARRY, true),
            Operation::Cli => self.regs.p.set(FLAG_INTERRUPT, false),
            Operation::Sei => self.regs.p.set(FLAG_INTERRUPT, true),
            Operation::Cld => self.regs.p.set(FLAG_DECIMAL, false),
            Operation::Sed => self.regs.p.set(FLAG_DECIMAL, true),
            Operation::Clv => self.regs.p.set(FLAG_OVERFLOW, false),

            Operation::Nop => {
                if mode != AddressingMode::Implied {
                    let _ = bus.read(addr);
                }
            }

            Operation::Slo => {
                let value = self.modify(bus, mode, addr, Self::asl);
                self.ora(value);
            }
            Operation::Rla => {
                let value = self.modify(bus, mode, addr, Self::rol);
                self.and(value);
            }
            Operation::Sre => {
                let value = self.modify(bus, mode, addr, Self::lsr);
                self.eor(value);
            }
            Operation::Rra => {
                let value = self.modify(bus, mode, addr, Self::ror);
                self.adc(value);
            }
            Operation::Dcp => {
                let value = self.modify(bus, mode, addr, Self::dec);
                self.compare(self.regs.a, value);
            }
            Operation::Isc => {
                let value = self.modify(bus, mode, addr, Self::inc);
                self.sbc(value);
            }
            Operation::Sax => bus.write(addr, self.regs.a & self.regs.x),
            Operation::Lax => {
                let value = bus.read(addr);
                self.regs.a = value;
                self.regs.x = value;
                self.update_zn(value);
            }
            Operation::Anc => {
                let value = bus.read(addr);
                self.and(value);
                self.regs.p.set(FLAG_CARRY, (self.regs.a & 0x80) != 0);
            }
            Operation::Alr => {
                let value = bus.read(addr);
                self.regs.a &= value;
                self.regs.a = self.lsr(self.regs.a);
            }
            Operation::Arr => {
                let value = bus.read(addr);
                let carry_in = if self.regs.p.get(FLAG_CARRY) { 0x80 } else { 0 };
                let result = ((self.regs.a & value) >> 1) | carry_in;
                self.regs.a = result;
                self.update_zn(result);
                self.regs.p.set(FLAG_CARRY, (result & 0x40) != 0);
                self.regs
                    .p
                    .set(FLAG_OVERFLOW, (((result >> 6) ^ (result >> 5)) & 0x01) != 0);
            }
            Operation::Sbx => {
                let value = bus.read(addr);
                let masked = self.regs.a & self.regs.x;
                self.regs.p.set(FLAG_CARRY, masked >= value);
                self.regs.x = masked.wrapping_sub(value);
                self.update_zn(self.regs.x);
            }
            // The two unstable immediates use the 0xEE "magic" constant seen on 2A03 parts.
            Operation::Xaa => {
                let value = bus.read(addr);
                self.regs.a = (self.regs.a | 0xEE) & self.regs.x & value;
                self.update_zn(self.regs.a);
            }
            Operation::Lxa => {
                let value = bus.read(addr);
                self.regs.a = (self.regs.a | 0xEE) & value;
                self.regs.x = self.regs.a;
                self.update_zn(self.regs.a);
            }
            Operation::Las => {
                let value = bus.read(addr) & self.regs.sp;
                self.regs.a = value;
                self.regs.x = value;
                self.regs.sp = value;
                self.update_zn(value);
            }
            Operation::Sha => {
                let high = high_plus_one(operand);
                let value = self.regs.a & self.regs.x & high;
                unstable_store(bus, operand, value, high & self.regs.x);
            }
            Operation::Shx => {
                let value = self.regs.x & high_plus_one(operand);
                unstable_store(bus, operand, value, value);
            }
            Operation::Shy => {
                let value = self.regs.y & high_plus_one(operand);
                unstable_store(bus, operand, value, value);
            }
            Operation::Tas => {
                self.regs.sp = self.regs.a & self.regs.x;
                let high = high_plus_one(operand);
                let value = self.regs.sp & high;
                unstable_store(bus, operand, value, high & self.regs.x);
            }

            // Intercepted in `step` before dispatch.
            Operation::Jam => {}
        }

        0
    }

    fn branch(&mut self, condition: bool, operand: Operand) -> u32 {
        if !condition {
            return 0;
        }
        self.regs.pc = operand.addr;
        1 + operand.page_crossed as u32
    }

    fn interrupt<B: CpuBus>(&mut self, bus: &mut B, vector: u16, brk: bool) {
        self.push_word(bus, self.regs.pc);
        let status = self.regs.p.pushed(brk);
        self.push(bus, status);
        self.regs.p.set(FLAG_INTERRUPT, true);
        self.regs.pc = read_word(bus, vector);
        if !brk {
            log::debug!(
                "interrupt via ${vector:04X} -> PC=${:04X}",
                self.regs.pc
            );
        }
    }

    /// Read-modify-write. Memory operands see the unmodified value written
    /// back first, as the 6502 does.
    fn modify<B: CpuBus>(
        &mut self,
        bus: &mut B,
        mode: AddressingMode,
        addr: u16,
        op: fn(&mut Self, u8) -> u8,
    ) -> u8 {
        if mode == AddressingMode::Accumulator {
            let a = self.regs.a;
            let result = op(self, a);
            self.regs.a = result;
            return result;
        }
        let value = bus.read(addr);
        bus.write(addr, value);
        let result = op(self, value);
        bus.write(addr, result);
        result
    }

    fn push<B: CpuBus>(&mut self, bus: &mut B, value: u8) {
        bus.write(STACK_PAGE | self.regs.sp as u16, value);
        self.regs.sp = self.regs.sp.wrapping_sub(1);
    }

    fn pull<B: CpuBus>(&mut self, bus: &mut B) -> u8 {
        self.regs.sp = self.regs.sp.wrapping_add(1);
        bus.read(STACK_PAGE | self.regs.sp as u16)
    }

    fn push_word<B: CpuBus>(&mut self, bus: &mut B, value: u16) {
        let [lo, hi] = value.to_le_bytes();
        self.push(bus, hi);
        self.push(bus, lo);
    }

    fn pull_word<B: CpuBus>(&mut self, bus: &mut B) -> u16 {
        let lo = self.pull(bus);
        let hi = self.pull(bus);
        u16::from_le_bytes([lo, hi])
    }

    fn update_zn(&mut self, value: u8) {
        self.regs.p.set(FLAG_ZERO, value == 0);
        self.regs.p.set(FLAG_NEGATIVE, (value & 0x80) != 0);
    }

    fn and(&mut self, value: u8) {
        self.regs.a &= value;
        self.update_zn(self.regs.a);
    }

    fn ora(&mut self, value: u8) {
        self.regs.a |= value;
        self.update_zn(self.regs.a);
    }

    fn eor(&mut self, value: u8) {
        self.regs.a ^= value;
        self.update_zn(self.regs.a);
    }

    fn compare(&mut self, register: u8, value: u8) {
        self.regs.p.set(FLAG_CARRY, register >= value);
        self.update_zn(register.wrapping_sub(value));
    }

    // The decimal flag is ignored: the 2A03 has no BCD unit.
    fn adc(&mut self, value: u8) {
        let a = self.regs.a;
        let sum = a as u16 + value as u16 + u16::from(self.regs.p.get(FLAG_CARRY));
        let result = sum as u8;
        self.regs.p.set(FLAG_CARRY, sum > 0xFF);
        // Operands share a sign that the result does not.
        self.regs
            .p
            .set(FLAG_OVERFLOW, (!(a ^ value) & (a ^ result) & 0x80) != 0);
        self.regs.a = result;
        self.update_zn(result);
    }

    fn sbc(&mut self, value: u8) {
        let a = self.regs.a;
        let borrow = i16::from(!self.regs.p.get(FLAG_CARRY));
        let diff = a as i16 - value as i16 - borrow;
        let result = diff as u8;
        self.regs.p.set(FLAG_CARRY, diff >= 0);
        // Operands differ in sign and the result took the subtrahend's.
        self.regs
            .p
            .set(FLAG_OVERFLOW, ((a ^ value) & (a ^ result) & 0x80) != 0);
        self.regs.a = result;
        self.update_zn(result);
    }

    fn asl(&mut self, value: u8) -> u8 {
        self.regs.p.set(FLAG_CARRY, (value & 0x80) != 0);
        let result = value << 1;
        self.update_zn(result);
        result
    }

    fn lsr(&mut self, value: u8) -> u8 {
        self.regs.p.set(FLAG_CARRY, (value & 0x01) != 0);
        let result = value >> 1;
        self.update_zn(result);
        result
    }

    fn rol(&mut self, value: u8) -> u8 {
        let carry_in = u8::from(self.regs.p.get(FLAG_CARRY));
        self.regs.p.set(FLAG_CARRY, (value & 0x80) != 0);
        let result = (value << 1) | carry_in;
        self.update_zn(result);
        result
    }

    fn ror(&mut self, value: u8) -> u8 {
        let carry_in = if self.regs.p.get(FLAG_CARRY) { 0x80 } else { 0 };
        self.regs.p.set(FLAG_CARRY, (value & 0x01) != 0);
        let result = (value >> 1) | carry_in;
        self.update_zn(result);
        result
    }

    fn inc(&mut self, value: u8) -> u8 {
        let result = value.wrapping_add(1);
        self.update_zn(result);
        result
    }

    fn dec(&mut self, value: u8) -> u8 {
        let result = value.wrapping_sub(1);
        self.update_zn(result);
        result
    }
}

fn read_word<B: CpuBus>(bus: &mut B, addr: u16) -> u16 {
    let lo = bus.read(addr);
    let hi = bus.read(addr.wrapping_add(1));
    u16::from_le_bytes([lo, hi])
}

fn read_zero_page_word<B: CpuBus>(bus: &mut B, zp: u8) -> u16 {
    let lo = bus.read(zp as u16);
    let hi = bus.read(zp.wrapping_add(1) as u16);
    u16::from_le_bytes([lo, hi])
}

fn indexed<B: CpuBus>(bus: &mut B, base: u16, index: u8, penalty: Penalty) -> Operand {
    let addr = base.wrapping_add(index as u16);
    let page_crossed = (base & 0xFF00) != (addr & 0xFF00);
    // Reads that stay on the page skip the fix-up cycle. Everything else
    // first reads the address with the un-carried high byte.
    if page_crossed || penalty != Penalty::PageCross {
        let _ = bus.read((base & 0xFF00) | (addr & 0x00FF));
    }
    Operand {
        addr,
        base,
        page_crossed,
    }
}

fn high_plus_one(operand: Operand) -> u8 {
    ((operand.base >> 8) as u8).wrapping_add(1)
}

fn unstable_store<B: CpuBus>(bus: &mut B, operand: Operand, value: u8, crossed_high: u8) {
    let addr = if operand.page_crossed {
        ((crossed_high as u16) << 8) | (operand.addr & 0x00FF)
    } else {
        operand.addr
    };
    bus.write(addr, value);
}
