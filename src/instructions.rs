// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Static instruction table for the documented 6502 set.
//!
//! Undocumented/illegal opcodes are deliberately absent. The table is small
//! enough that linear search is sufficient.

/// Addressing modes of the 6502.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressMode {
    Implied,
    Accumulator,
    Immediate,
    ZeroPage,
    ZeroPageX,
    ZeroPageY,
    Absolute,
    AbsoluteX,
    AbsoluteY,
    Indirect,
    IndirectX,
    IndirectY,
    Relative,
}

impl AddressMode {
    /// Number of operand bytes following the opcode.
    pub fn operand_size(self) -> u16 {
        match self {
            AddressMode::Implied | AddressMode::Accumulator => 0,
            AddressMode::Immediate
            | AddressMode::ZeroPage
            | AddressMode::ZeroPageX
            | AddressMode::ZeroPageY
            | AddressMode::IndirectX
            | AddressMode::IndirectY
            | AddressMode::Relative => 1,
            AddressMode::Absolute | AddressMode::AbsoluteX | AddressMode::AbsoluteY
            | AddressMode::Indirect => 2,
        }
    }

    /// Full instruction size, opcode included.
    pub fn instruction_size(self) -> u16 {
        1 + self.operand_size()
    }
}

pub struct InstructionEntry {
    pub mnemonic: &'static str,
    pub mode: AddressMode,
    pub opcode: u8,
}

const fn e(mnemonic: &'static str, mode: AddressMode, opcode: u8) -> InstructionEntry {
    InstructionEntry {
        mnemonic,
        mode,
        opcode,
    }
}

use AddressMode::*;

pub static INSTRUCTION_TABLE: &[InstructionEntry] = &[
    e("ADC", Immediate, 0x69),
    e("ADC", ZeroPage, 0x65),
    e("ADC", ZeroPageX, 0x75),
    e("ADC", Absolute, 0x6D),
    e("ADC", AbsoluteX, 0x7D),
    e("ADC", AbsoluteY, 0x79),
    e("ADC", IndirectX, 0x61),
    e("ADC", IndirectY, 0x71),
    e("AND", Immediate, 0x29),
    e("AND", ZeroPage, 0x25),
    e("AND", ZeroPageX, 0x35),
    e("AND", Absolute, 0x2D),
    e("AND", AbsoluteX, 0x3D),
    e("AND", AbsoluteY, 0x39),
    e("AND", IndirectX, 0x21),
    e("AND", IndirectY, 0x31),
    e("ASL", Accumulator, 0x0A),
    e("ASL", ZeroPage, 0x06),
    e("ASL", ZeroPageX, 0x16),
    e("ASL", Absolute, 0x0E),
    e("ASL", AbsoluteX, 0x1E),
    e("BCC", Relative, 0x90),
    e("BCS", Relative, 0xB0),
    e("BEQ", Relative, 0xF0),
    e("BIT", ZeroPage, 0x24),
    e("BIT", Absolute, 0x2C),
    e("BMI", Relative, 0x30),
    e("BNE", Relative, 0xD0),
    e("BPL", Relative, 0x10),
    e("BRK", Implied, 0x00),
    e("BVC", Relative, 0x50),
    e("BVS", Relative, 0x70),
    e("CLC", Implied, 0x18),
    e("CLD", Implied, 0xD8),
    e("CLI", Implied, 0x58),
    e("CLV", Implied, 0xB8),
    e("CMP", Immediate, 0xC9),
    e("CMP", ZeroPage, 0xC5),
    e("CMP", ZeroPageX, 0xD5),
    e("CMP", Absolute, 0xCD),
    e("CMP", AbsoluteX, 0xDD),
    e("CMP", AbsoluteY, 0xD9),
    e("CMP", IndirectX, 0xC1),
    e("CMP", IndirectY, 0xD1),
    e("CPX", Immediate, 0xE0),
    e("CPX", ZeroPage, 0xE4),
    e("CPX", Absolute, 0xEC),
    e("CPY", Immediate, 0xC0),
    e("CPY", ZeroPage, 0xC4),
    e("CPY", Absolute, 0xCC),
    e("DEC", ZeroPage, 0xC6),
    e("DEC", ZeroPageX, 0xD6),
    e("DEC", Absolute, 0xCE),
    e("DEC", AbsoluteX, 0xDE),
    e("DEX", Implied, 0xCA),
    e("DEY", Implied, 0x88),
    e("EOR", Immediate, 0x49),
    e("EOR", ZeroPage, 0x45),
    e("EOR", ZeroPageX, 0x55),
    e("EOR", Absolute, 0x4D),
    e("EOR", AbsoluteX, 0x5D),
    e("EOR", AbsoluteY, 0x59),
    e("EOR", IndirectX, 0x41),
    e("EOR", IndirectY, 0x51),
    e("INC", ZeroPage, 0xE6),
    e("INC", ZeroPageX, 0xF6),
    e("INC", Absolute, 0xEE),
    e("INC", AbsoluteX, 0xFE),
    e("INX", Implied, 0xE8),
    e("INY", Implied, 0xC8),
    e("JMP", Absolute, 0x4C),
    e("JMP", Indirect, 0x6C),
    e("JSR", Absolute, 0x20),
    e("LDA", Immediate, 0xA9),
    e("LDA", ZeroPage, 0xA5),
    e("LDA", ZeroPageX, 0xB5),
    e("LDA", Absolute, 0xAD),
    e("LDA", AbsoluteX, 0xBD),
    e("LDA", AbsoluteY, 0xB9),
    e("LDA", IndirectX, 0xA1),
    e("LDA", IndirectY, 0xB1),
    e("LDX", Immediate, 0xA2),
    e("LDX", ZeroPage, 0xA6),
    e("LDX", ZeroPageY, 0xB6),
    e("LDX", Absolute, 0xAE),
    e("LDX", AbsoluteY, 0xBE),
    e("LDY", Immediate, 0xA0),
    e("LDY", ZeroPage, 0xA4),
    e("LDY", ZeroPageX, 0xB4),
    e("LDY", Absolute, 0xAC),
    e("LDY", AbsoluteX, 0xBC),
    e("LSR", Accumulator, 0x4A),
    e("LSR", ZeroPage, 0x46),
    e("LSR", ZeroPageX, 0x56),
    e("LSR", Absolute, 0x4E),
    e("LSR", AbsoluteX, 0x5E),
    e("NOP", Implied, 0xEA),
    e("ORA", Immediate, 0x09),
    e("ORA", ZeroPage, 0x05),
    e("ORA", ZeroPageX, 0x15),
    e("ORA", Absolute, 0x0D),
    e("ORA", AbsoluteX, 0x1D),
    e("ORA", AbsoluteY, 0x19),
    e("ORA", IndirectX, 0x01),
    e("ORA", IndirectY, 0x11),
    e("PHA", Implied, 0x48),
    e("PHP", Implied, 0x08),
    e("PLA", Implied, 0x68),
    e("PLP", Implied, 0x28),
    e("ROL", Accumulator, 0x2A),
    e("ROL", ZeroPage, 0x26),
    e("ROL", ZeroPageX, 0x36),
    e("ROL", Absolute, 0x2E),
    e("ROL", AbsoluteX, 0x3E),
    e("ROR", Accumulator, 0x6A),
    e("ROR", ZeroPage, 0x66),
    e("ROR", ZeroPageX, 0x76),
    e("ROR", Absolute, 0x6E),
    e("ROR", AbsoluteX, 0x7E),
    e("RTI", Implied, 0x40),
    e("RTS", Implied, 0x60),
    e("SBC", Immediate, 0xE9),
    e("SBC", ZeroPage, 0xE5),
    e("SBC", ZeroPageX, 0xF5),
    e("SBC", Absolute, 0xED),
    e("SBC", AbsoluteX, 0xFD),
    e("SBC", AbsoluteY, 0xF9),
    e("SBC", IndirectX, 0xE1),
    e("SBC", IndirectY, 0xF1),
    e("SEC", Implied, 0x38),
    e("SED", Implied, 0xF8),
    e("SEI", Implied, 0x78),
    e("STA", ZeroPage, 0x85),
    e("STA", ZeroPageX, 0x95),
    e("STA", Absolute, 0x8D),
    e("STA", AbsoluteX, 0x9D),
    e("STA", AbsoluteY, 0x99),
    e("STA", IndirectX, 0x81),
    e("STA", IndirectY, 0x91),
    e("STX", ZeroPage, 0x86),
    e("STX", ZeroPageY, 0x96),
    e("STX", Absolute, 0x8E),
    e("STY", ZeroPage, 0x84),
    e("STY", ZeroPageX, 0x94),
    e("STY", Absolute, 0x8C),
    e("TAX", Implied, 0xAA),
    e("TAY", Implied, 0xA8),
    e("TSX", Implied, 0xBA),
    e("TXA", Implied, 0x8A),
    e("TXS", Implied, 0x9A),
    e("TYA", Implied, 0x98),
];

pub fn lookup(mnemonic: &str, mode: AddressMode) -> Option<u8> {
    INSTRUCTION_TABLE
        .iter()
        .find(|entry| entry.mode == mode && entry.mnemonic.eq_ignore_ascii_case(mnemonic))
        .map(|entry| entry.opcode)
}

pub fn has_mnemonic(mnemonic: &str) -> bool {
    INSTRUCTION_TABLE
        .iter()
        .any(|entry| entry.mnemonic.eq_ignore_ascii_case(mnemonic))
}

pub fn supports(mnemonic: &str, mode: AddressMode) -> bool {
    lookup(mnemonic, mode).is_some()
}

/// Branch mnemonics always use relative addressing.
pub fn is_branch(mnemonic: &str) -> bool {
    matches!(
        mnemonic.to_ascii_uppercase().as_str(),
        "BCC" | "BCS" | "BEQ" | "BMI" | "BNE" | "BPL" | "BVC" | "BVS"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_is_case_insensitive() {
        assert_eq!(lookup("lda", AddressMode::Immediate), Some(0xA9));
        assert_eq!(lookup("LDA", AddressMode::Immediate), Some(0xA9));
    }

    #[test]
    fn unsupported_mode_is_absent() {
        assert_eq!(lookup("STA", AddressMode::Immediate), None);
        assert_eq!(lookup("STX", AddressMode::AbsoluteY), None);
        assert_eq!(lookup("JMP", AddressMode::ZeroPage), None);
    }

    #[test]
    fn branch_set() {
        assert!(is_branch("bne"));
        assert!(is_branch("BVS"));
        assert!(!is_branch("JMP"));
    }

    #[test]
    fn operand_sizes() {
        assert_eq!(AddressMode::Implied.instruction_size(), 1);
        assert_eq!(AddressMode::Immediate.instruction_size(), 2);
        assert_eq!(AddressMode::IndirectY.instruction_size(), 2);
        assert_eq!(AddressMode::Absolute.instruction_size(), 3);
        assert_eq!(AddressMode::Indirect.instruction_size(), 3);
    }

    #[test]
    fn documented_set_has_151_opcodes() {
        assert_eq!(INSTRUCTION_TABLE.len(), 151);
        // No duplicate opcodes in the documented set.
        let mut seen = [false; 256];
        for entry in INSTRUCTION_TABLE {
            assert!(!seen[entry.opcode as usize], "dup {:02X}", entry.opcode);
            seen[entry.opcode as usize] = true;
        }
    }
}
