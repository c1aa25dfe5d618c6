//! Opcode descriptors.
//!
//! Every one of the 256 opcodes has an entry. The dispatcher in `cpu.rs`
//! interprets `(operation, mode)` and charges `cycles` plus whatever extra
//! cycles `penalty` allows.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressingMode {
    Implied,
    Accumulator,
    Immediate,
    ZeroPage,
    ZeroPageX,
    ZeroPageY,
    Absolute,
    AbsoluteX,
    AbsoluteY,
    /// `JMP ($hhll)` only.
    Indirect,
    /// `($ll,X)`
    IndexedIndirect,
    /// `($ll),Y`
    IndirectIndexed,
    Relative,
}

impl AddressingMode {
    pub const fn operand_bytes(self) -> u8 {
        match self {
            Self::Implied | Self::Accumulator => 0,
            Self::Immediate
            | Self::ZeroPage
            | Self::ZeroPageX
            | Self::ZeroPageY
            | Self::IndexedIndirect
            | Self::IndirectIndexed
            | Self::Relative => 1,
            Self::Absolute | Self::AbsoluteX | Self::AbsoluteY | Self::Indirect => 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Adc,
    And,
    Asl,
    Bcc,
    Bcs,
    Beq,
    Bit,
    Bmi,
    Bne,
    Bpl,
    Brk,
    Bvc,
    Bvs,
    Clc,
    Cld,
    Cli,
    Clv,
    Cmp,
    Cpx,
    Cpy,
    Dec,
    Dex,
    Dey,
    Eor,
    Inc,
    Inx,
    Iny,
    Jmp,
    Jsr,
    Lda,
    Ldx,
    Ldy,
    Lsr,
    Nop,
    Ora,
    Pha,
    Php,
    Pla,
    Plp,
    Rol,
    Ror,
    Rti,
    Rts,
    Sbc,
    Sec,
    Sed,
    Sei,
    Sta,
    Stx,
    Sty,
    Tax,
    Tay,
    Tsx,
    Txa,
    Txs,
    Tya,
    // Undocumented.
    Alr,
    Anc,
    Arr,
    Dcp,
    Isc,
    Las,
    Lax,
    Lxa,
    Rla,
    Rra,
    Sax,
    Sbx,
    Sha,
    Shx,
    Shy,
    Slo,
    Sre,
    Tas,
    Xaa,
    /// Locks the bus on real hardware. The emulated CPU halts.
    Jam,
}

impl Operation {
    pub fn mnemonic(self) -> String {
        format!("{self:?}").to_ascii_uppercase()
    }
}

/// Extra cycles an instruction may take beyond its base count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Penalty {
    None,
    /// +1 when the indexed effective address lands on another page.
    PageCross,
    /// +1 when taken, +1 more when the target is on another page.
    Branch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Instruction {
    pub operation: Operation,
    pub mode: AddressingMode,
    pub cycles: u8,
    pub penalty: Penalty,
    pub official: bool,
}

impl Instruction {
    /// Encoded length including the opcode byte.
    pub const fn size(&self) -> u8 {
        1 + self.mode.operand_bytes()
    }

    pub fn lookup(opcode: u8) -> &'static Instruction {
        &INSTRUCTIONS[opcode as usize]
    }
}

use AddressingMode::{
    Absolute as ABS, AbsoluteX as ABX, AbsoluteY as ABY, Accumulator as ACC, Immediate as IMM,
    Implied as IMP, IndexedIndirect as IZX, Indirect as IND, IndirectIndexed as IZY,
    Relative as REL, ZeroPage as ZP0, ZeroPageX as ZPX, ZeroPageY as ZPY,
};
use Operation::*;
use Penalty::{Branch as BR, None as NP, PageCross as PC};

const fn op(operation: Operation, mode: AddressingMode, cycles: u8, penalty: Penalty) -> Instruction {
    Instruction {
        operation,
        mode,
        cycles,
        penalty,
        official: true,
    }
}

const fn un(operation: Operation, mode: AddressingMode, cycles: u8, penalty: Penalty) -> Instruction {
    Instruction {
        operation,
        mode,
        cycles,
        penalty,
        official: false,
    }
}

/// JAM never completes, so it charges no cycles.
const JAM: Instruction = un(Jam, IMP, 0, NP);

#[rustfmt::skip]
pub static INSTRUCTIONS: [Instruction; 256] = [
    // 0x00
    op(Brk, IMP, 7, NP), op(Ora, IZX, 6, NP), JAM,                 un(Slo, IZX, 8, NP),
    un(Nop, ZP0, 3, NP), op(Ora, ZP0, 3, NP), op(Asl, ZP0, 5, NP), un(Slo, ZP0, 5, NP),
    op(Php, IMP, 3, NP), op(Ora, IMM, 2, NP), op(Asl, ACC, 2, NP), un(Anc, IMM, 2, NP),
    un(Nop, ABS, 4, NP), op(Ora, ABS, 4, NP), op(Asl, ABS, 6, NP), un(Slo, ABS, 6, NP),
    // 0x10
    op(Bpl, REL, 2, BR), op(Ora, IZY, 5, PC), JAM,                 un(Slo, IZY, 8, NP),
    un(Nop, ZPX, 4, NP), op(Ora, ZPX, 4, NP), op(Asl, ZPX, 6, NP), un(Slo, ZPX, 6, NP),
    op(Clc, IMP, 2, NP), op(Ora, ABY, 4, PC), un(Nop, IMP, 2, NP), un(Slo, ABY, 7, NP),
    un(Nop, ABX, 4, PC), op(Ora, ABX, 4, PC), op(Asl, ABX, 7, NP), un(Slo, ABX, 7, NP),
    // 0x20
    op(Jsr, ABS, 6, NP), op(And, IZX, 6, NP), JAM,                 un(Rla, IZX, 8, NP),
    op(Bit, ZP0, 3, NP), op(And, ZP0, 3, NP), op(Rol, ZP0, 5, NP), un(Rla, ZP0, 5, NP),
    op(Plp, IMP, 4, NP), op(And, IMM, 2, NP), op(Rol, ACC, 2, NP), un(Anc, IMM, 2, NP),
    op(Bit, ABS, 4, NP), op(And, ABS, 4, NP), op(Rol, ABS, 6, NP), un(Rla, ABS, 6, NP),
    // 0x30
    op(Bmi, REL, 2, BR), op(And, IZY, 5, PC), JAM,                 un(Rla, IZY, 8, NP),
    un(Nop, ZPX, 4, NP), op(And, ZPX, 4, NP), op(Rol, ZPX, 6, NP), un(Rla, ZPX, 6, NP),
    op(Sec, IMP, 2, NP), op(And, ABY, 4, PC), un(Nop, IMP, 2, NP), un(Rla, ABY, 7, NP),
    un(Nop, ABX, 4, PC), op(And, ABX, 4, PC), op(Rol, ABX, 7, NP), un(Rla, ABX, 7, NP),
    // 0x40
    op(Rti, IMP, 6, NP), op(Eor, IZX, 6, NP), JAM,                 un(Sre, IZX, 8, NP),
    un(Nop, ZP0, 3, NP), op(Eor, ZP0, 3, NP), op(Lsr, ZP0, 5, NP), un(Sre, ZP0, 5, NP),
    op(Pha, IMP, 3, NP), op(Eor, IMM, 2, NP), op(Lsr, ACC, 2, NP), un(Alr, IMM, 2, NP),
    op(Jmp, ABS, 3, NP), op(Eor, ABS, 4, NP), op(Lsr, ABS, 6, NP), un(Sre, ABS, 6, NP),
    // 0x50
    op(Bvc, REL, 2, BR), op(Eor, IZY, 5, PC), JAM,                 un(Sre, IZY, 8, NP),
    un(Nop, ZPX, 4, NP), op(Eor, ZPX, 4, NP), op(Lsr, ZPX, 6, NP), un(Sre, ZPX, 6, NP),
    op(Cli, IMP, 2, NP), op(Eor, ABY, 4, PC), un(Nop, IMP, 2, NP), un(Sre, ABY, 7, NP),
    un(Nop, ABX, 4, PC), op(Eor, ABX, 4, PC), op(Lsr, ABX, 7, NP), un(Sre, ABX, 7, NP),
    // 0x60
    op(Rts, IMP, 6, NP), op(Adc, IZX, 6, NP), JAM,                 un(Rra, IZX, 8, NP),
    un(Nop, ZP0, 3, NP), op(Adc, ZP0, 3, NP), op(Ror, ZP0, 5, NP), un(Rra, ZP0, 5, NP),
    op(Pla, IMP, 4, NP), op(Adc, IMM, 2, NP), op(Ror, ACC, 2, NP), un(Arr, IMM, 2, NP),
    op(Jmp, IND, 5, NP), op(Adc, ABS, 4, NP), op(Ror, ABS, 6, NP), un(Rra, ABS, 6, NP),
    // 0x70
    op(Bvs, REL, 2, BR), op(Adc, IZY, 5, PC), JAM,                 un(Rra, IZY, 8, NP),
    un(Nop, ZPX, 4, NP), op(Adc, ZPX, 4, NP), op(Ror, ZPX, 6, NP), un(Rra, ZPX, 6, NP),
    op(Sei, IMP, 2, NP), op(Adc, ABY, 4, PC), un(Nop, IMP, 2, NP), un(Rra, ABY, 7, NP),
    un(Nop, ABX, 4, PC), op(Adc, ABX, 4, PC), op(Ror, ABX, 7, NP), un(Rra, ABX, 7, NP),
    // 0x80
    un(Nop, IMM, 2, NP), op(Sta, IZX, 6, NP), un(Nop, IMM, 2, NP), un(Sax, IZX, 6, NP),
    op(Sty, ZP0, 3, NP), op(Sta, ZP0, 3, NP), op(Stx, ZP0, 3, NP), un(Sax, ZP0, 3, NP),
    op(Dey, IMP, 2, NP), un(Nop, IMM, 2, NP), op(Txa, IMP, 2, NP), un(Xaa, IMM, 2, NP),
    op(Sty, ABS, 4, NP), op(Sta, ABS, 4, NP), op(Stx, ABS, 4, NP), un(Sax, ABS, 4, NP),
    // 0x90
    op(Bcc, REL, 2, BR), op(Sta, IZY, 6, NP), JAM,                 un(Sha, IZY, 6, NP),
    op(Sty, ZPX, 4, NP), op(Sta, ZPX, 4, NP), op(Stx, ZPY, 4, NP), un(Sax, ZPY, 4, NP),
    op(Tya, IMP, 2, NP), op(Sta, ABY, 5, NP), op(Txs, IMP, 2, NP), un(Tas, ABY, 5, NP),
    un(Shy, ABX, 5, NP), op(Sta, ABX, 5, NP), un(Shx, ABY, 5, NP), un(Sha, ABY, 5, NP),
    // 0xA0
    op(Ldy, IMM, 2, NP), op(Lda, IZX, 6, NP), op(Ldx, IMM, 2, NP), un(Lax, IZX, 6, NP),
    op(Ldy, ZP0, 3, NP), op(Lda, ZP0, 3, NP), op(Ldx, ZP0, 3, NP), un(Lax, ZP0, 3, NP),
    op(Tay, IMP, 2, NP), op(Lda, IMM, 2, NP), op(Tax, IMP, 2, NP), un(Lxa, IMM, 2, NP),
    op(Ldy, ABS, 4, NP), op(Lda, ABS, 4, NP), op(Ldx, ABS, 4, NP), un(Lax, ABS, 4, NP),
    // 0xB0
    op(Bcs, REL, 2, BR), op(Lda, IZY, 5, PC), JAM,                 un(Lax, IZY, 5, PC),
    op(Ldy, ZPX, 4, NP), op(Lda, ZPX, 4, NP), op(Ldx, ZPY, 4, NP), un(Lax, ZPY, 4, NP),
    op(Clv, IMP, 2, NP), op(Lda, ABY, 4, PC), op(Tsx, IMP, 2, NP), un(Las, ABY, 4, PC),
    op(Ldy, ABX, 4, PC), op(Lda, ABX, 4, PC), op(Ldx, ABY, 4, PC), un(Lax, ABY, 4, PC),
    // 0xC0
    op(Cpy, IMM, 2, NP), op(Cmp, IZX, 6, NP), un(Nop, IMM, 2, NP), un(Dcp, IZX, 8, NP),
    op(Cpy, ZP0, 3, NP), op(Cmp, ZP0, 3, NP), op(Dec, ZP0, 5, NP), un(Dcp, ZP0, 5, NP),
    op(Iny, IMP, 2, NP), op(Cmp, IMM, 2, NP), op(Dex, IMP, 2, NP), un(Sbx, IMM, 2, NP),
    op(Cpy, ABS, 4, NP), op(Cmp, ABS, 4, NP), op(Dec, ABS, 6, NP), un(Dcp, ABS, 6, NP),
    // 0xD0
    op(Bne, REL, 2, BR), op(Cmp, IZY, 5, PC), JAM,                 un(Dcp, IZY, 8, NP),
    un(Nop, ZPX, 4, NP), op(Cmp, ZPX, 4, NP), op(Dec, ZPX, 6, NP), un(Dcp, ZPX, 6, NP),
    op(Cld, IMP, 2, NP), op(Cmp, ABY, 4, PC), un(Nop, IMP, 2, NP), un(Dcp, ABY, 7, NP),
    un(Nop, ABX, 4, PC), op(Cmp, ABX, 4, PC), op(Dec, ABX, 7, NP), un(Dcp, ABX, 7, NP),
    // 0xE0
    op(Cpx, IMM, 2, NP), op(Sbc, IZX, 6, NP), un(Nop, IMM, 2, NP), un(Isc, IZX, 8, NP),
    op(Cpx, ZP0, 3, NP), op(Sbc, ZP0, 3, NP), op(Inc, ZP0, 5, NP), un(Isc, ZP0, 5, NP),
    op(Inx, IMP, 2, NP), op(Sbc, IMM, 2, NP), op(Nop, IMP, 2, NP), un(Sbc, IMM, 2, NP),
    op(Cpx, ABS, 4, NP), op(Sbc, ABS, 4, NP), op(Inc, ABS, 6, NP), un(Isc, ABS, 6, NP),
    // 0xF0
    op(Beq, REL, 2, BR), op(Sbc, IZY, 5, PC), JAM,                 un(Isc, IZY, 8, NP),
    un(Nop, ZPX, 4, NP), op(Sbc, ZPX, 4, NP), op(Inc, ZPX, 6, NP), un(Isc, ZPX, 6, NP),
    op(Sed, IMP, 2, NP), op(Sbc, ABY, 4, PC), un(Nop, IMP, 2, NP), un(Isc, ABY, 7, NP),
    un(Nop, ABX, 4, PC), op(Sbc, ABX, 4, PC), op(Inc, ABX, 7, NP), un(Isc, ABX, 7, NP),
];

/// Formats the instruction at `pc` as assembly text, reading bytes through
/// `peek`. Returns the text and the encoded size.
pub fn disassemble(pc: u16, peek: impl Fn(u16) -> u8) -> (String, u8) {
    let opcode = peek(pc);
    let instruction = Instruction::lookup(opcode);
    let lo = peek(pc.wrapping_add(1));
    let hi = peek(pc.wrapping_add(2));
    let word = u16::from_le_bytes([lo, hi]);

    let operand = match instruction.mode {
        IMP => String::new(),
        ACC => " A".to_string(),
        IMM => format!(" #${lo:02X}"),
        ZP0 => format!(" ${lo:02X}"),
        ZPX => format!(" ${lo:02X},X"),
        ZPY => format!(" ${lo:02X},Y"),
        ABS => format!(" ${word:04X}"),
        ABX => format!(" ${word:04X},X"),
        ABY => format!(" ${word:04X},Y"),
        IND => format!(" (${word:04X})"),
        IZX => format!(" (${lo:02X},X)"),
        IZY => format!(" (${lo:02X}),Y"),
        REL => {
            let target = pc.wrapping_add(2).wrapping_add(lo as i8 as u16);
            format!(" ${target:04X}")
        }
    };

    let marker = if instruction.official { "" } else { "*" };
    (
        format!("{marker}{}{operand}", instruction.operation.mnemonic()),
        instruction.size(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    // Encoded sizes of the documented opcodes; 0 marks undocumented slots.
    #[rustfmt::skip]
    const DOCUMENTED_SIZES: [u8; 256] = [
        1, 2, 0, 0, 0, 2, 2, 0, 1, 2, 1, 0, 0, 3, 3, 0,
        2, 2, 0, 0, 0, 2, 2, 0, 1, 3, 0, 0, 0, 3, 3, 0,
        3, 2, 0, 0, 2, 2, 2, 0, 1, 2, 1, 0, 3, 3, 3, 0,
        2, 2, 0, 0, 0, 2, 2, 0, 1, 3, 0, 0, 0, 3, 3, 0,
        1, 2, 0, 0, 0, 2, 2, 0, 1, 2, 1, 0, 3, 3, 3, 0,
        2, 2, 0, 0, 0, 2, 2, 0, 1, 3, 0, 0, 0, 3, 3, 0,
        1, 2, 0, 0, 0, 2, 2, 0, 1, 2, 1, 0, 3, 3, 3, 0,
        2, 2, 0, 0, 0, 2, 2, 0, 1, 3, 0, 0, 0, 3, 3, 0,
        0, 2, 0, 0, 2, 2, 2, 0, 1, 0, 1, 0, 3, 3, 3, 0,
        2, 2, 0, 0, 2, 2, 2, 0, 1, 3, 1, 0, 0, 3, 0, 0,
        2, 2, 2, 0, 2, 2, 2, 0, 1, 2, 1, 0, 3, 3, 3, 0,
        2, 2, 0, 0, 2, 2, 2, 0, 1, 3, 1, 0, 3, 3, 3, 0,
        2, 2, 0, 0, 2, 2, 2, 0, 1, 2, 1, 0, 3, 3, 3, 0,
        2, 2, 0, 0, 0, 2, 2, 0, 1, 3, 0, 0, 0, 3, 3, 0,
        2, 2, 0, 0, 2, 2, 2, 0, 1, 2, 1, 0, 3, 3, 3, 0,
        2, 2, 0, 0, 0, 2, 2, 0, 1, 3, 0, 0, 0, 3, 3, 0,
    ];

    // Base cycle counts of the documented opcodes; 0 marks undocumented slots.
    #[rustfmt::skip]
    const DOCUMENTED_CYCLES: [u8; 256] = [
        7, 6, 0, 0, 0, 3, 5, 0, 3, 2, 2, 0, 0, 4, 6, 0,
        2, 5, 0, 0, 0, 4, 6, 0, 2, 4, 0, 0, 0, 4, 7, 0,
        6, 6, 0, 0, 3, 3, 5, 0, 4, 2, 2, 0, 4, 4, 6, 0,
        2, 5, 0, 0, 0, 4, 6, 0, 2, 4, 0, 0, 0, 4, 7, 0,
        6, 6, 0, 0, 0, 3, 5, 0, 3, 2, 2, 0, 3, 4, 6, 0,
        2, 5, 0, 0, 0, 4, 6, 0, 2, 4, 0, 0, 0, 4, 7, 0,
        6, 6, 0, 0, 0, 3, 5, 0, 4, 2, 2, 0, 5, 4, 6, 0,
        2, 5, 0, 0, 0, 4, 6, 0, 2, 4, 0, 0, 0, 4, 7, 0,
        0, 6, 0, 0, 3, 3, 3, 0, 2, 0, 2, 0, 4, 4, 4, 0,
        2, 6, 0, 0, 4, 4, 4, 0, 2, 5, 2, 0, 0, 5, 0, 0,
        2, 6, 2, 0, 3, 3, 3, 0, 2, 2, 2, 0, 4, 4, 4, 0,
        2, 5, 0, 0, 4, 4, 4, 0, 2, 4, 2, 0, 4, 4, 4, 0,
        2, 6, 0, 0, 3, 3, 5, 0, 2, 2, 2, 0, 4, 4, 6, 0,
        2, 5, 0, 0, 0, 4, 6, 0, 2, 4, 0, 0, 0, 4, 7, 0,
        2, 6, 0, 0, 3, 3, 5, 0, 2, 2, 2, 0, 4, 4, 6, 0,
        2, 5, 0, 0, 0, 4, 6, 0, 2, 4, 0, 0, 0, 4, 7, 0,
    ];

    #[test]
    fn documented_opcodes_match_encoding_table() {
        for opcode in 0..=255u8 {
            let instruction = Instruction::lookup(opcode);
            let expected_size = DOCUMENTED_SIZES[opcode as usize];
            assert_eq!(
                instruction.official,
                expected_size != 0,
                "official flag of ${opcode:02X}"
            );
            if instruction.official {
                assert_eq!(instruction.size(), expected_size, "size of ${opcode:02X}");
                assert_eq!(
                    instruction.cycles, DOCUMENTED_CYCLES[opcode as usize],
                    "cycles of ${opcode:02X}"
                );
            }
        }
    }

    #[test]
    fn table_is_complete_with_explicit_jams() {
        assert_eq!(INSTRUCTIONS.len(), 256);
        assert_eq!(INSTRUCTIONS.iter().filter(|i| i.official).count(), 151);

        let jams: Vec<usize> = INSTRUCTIONS
            .iter()
            .enumerate()
            .filter(|(_, i)| i.operation == Operation::Jam)
            .map(|(opcode, _)| opcode)
            .collect();
        assert_eq!(
            jams,
            vec![0x02, 0x12, 0x22, 0x32, 0x42, 0x52, 0x62, 0x72, 0x92, 0xB2, 0xD2, 0xF2]
        );

        for instruction in INSTRUCTIONS.iter().filter(|i| i.operation != Operation::Jam) {
            assert!(instruction.cycles >= 2);
            assert!((1..=3).contains(&instruction.size()));
        }
    }

    #[test]
    fn penalty_rules_follow_addressing_mode() {
        for instruction in INSTRUCTIONS.iter() {
            match instruction.penalty {
                Penalty::Branch => assert_eq!(instruction.mode, AddressingMode::Relative),
                Penalty::PageCross => assert!(matches!(
                    instruction.mode,
                    AddressingMode::AbsoluteX
                        | AddressingMode::AbsoluteY
                        | AddressingMode::IndirectIndexed
                )),
                Penalty::None => assert_ne!(instruction.mode, AddressingMode::Relative),
            }
        }
        // Stores and read-modify-write never take the page-cross discount.
        assert_eq!(Instruction::lookup(0x9D).penalty, Penalty::None);
        assert_eq!(Instruction::lookup(0x1E).penalty, Penalty::None);
        assert_eq!(Instruction::lookup(0xBD).penalty, Penalty::PageCross);
    }

    #[test]
    fn disassembles_common_forms() {
        let program = [0xA9, 0x05, 0x6C, 0xFF, 0x02, 0xD0, 0xFE, 0xB1, 0x80, 0x02];
        let peek = |addr: u16| program.get(addr as usize).copied().unwrap_or(0);

        assert_eq!(disassemble(0, peek), ("LDA #$05".to_string(), 2));
        assert_eq!(disassemble(2, peek), ("JMP ($02FF)".to_string(), 3));
        assert_eq!(disassemble(5, peek), ("BNE $0005".to_string(), 2));
        assert_eq!(disassemble(7, peek), ("LDA ($80),Y".to_string(), 2));
        assert_eq!(disassemble(9, peek), ("*JAM".to_string(), 1));
    }
}
