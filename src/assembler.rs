// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Two-pass assembler core.
//!
//! The discovery pass walks the statement list computing addresses and
//! instruction sizes, defining labels and constants as it goes. The encoding
//! pass re-walks the same list, verifies that no symbol drifted, and emits
//! bytes into the memory image. The addressing mode chosen during discovery
//! is frozen on each instruction and reused verbatim while encoding, so the
//! two passes can never disagree about sizing.

use crate::error::AsmError;
use crate::expr::{eval_expr, EvalContext, EvalError, Expr};
use crate::image::MemoryImage;
use crate::instructions::{self, AddressMode};
use crate::parser::{
    parse_source, AssignTarget, Directive, DirectiveArg, IncludeResolver, Item, Operand, Register,
    Statement,
};
use crate::symbol_table::SymbolTable;

/// Options for one assembly run.
pub struct AssembleOptions<'a> {
    /// PRG load address used when the source never declares one. Any
    /// `org`/`*=` seen during discovery overrides it.
    pub load_address: u16,
    /// Name used in error messages only.
    pub file_name: String,
    pub resolver: Option<&'a dyn IncludeResolver>,
}

impl Default for AssembleOptions<'_> {
    fn default() -> Self {
        Self {
            load_address: 0x0801,
            file_name: "(input)".to_string(),
            resolver: None,
        }
    }
}

/// Assemble a source text into a PRG image (2-byte little-endian load
/// address followed by the body). Returns an empty buffer for sources that
/// write nothing.
pub fn assemble(source: &str, options: &AssembleOptions) -> Result<Vec<u8>, AsmError> {
    let mut items = parse_source(source, &options.file_name, options.resolver)?;
    let mut assembler = Assembler::new(options.load_address);
    assembler.run(&mut items)?;
    Ok(assembler.prg())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pass {
    Discovery,
    Encoding,
}

impl Pass {
    fn verify(self) -> bool {
        self == Pass::Encoding
    }
}

pub struct Assembler {
    symbols: SymbolTable,
    image: MemoryImage,
    pc: u16,
    load_address: u16,
}

impl Assembler {
    pub fn new(load_address: u16) -> Self {
        Self {
            symbols: SymbolTable::new(),
            image: MemoryImage::new(),
            pc: 0,
            load_address,
        }
    }

    /// Run both passes over a parsed statement list.
    pub fn run(&mut self, items: &mut [Item]) -> Result<(), AsmError> {
        self.run_pass(items, Pass::Discovery)?;
        self.run_pass(items, Pass::Encoding)
    }

    pub fn symbols(&self) -> &SymbolTable {
        &self.symbols
    }

    pub fn load_address(&self) -> u16 {
        self.load_address
    }

    pub fn prg(&self) -> Vec<u8> {
        self.image.to_prg(self.load_address)
    }

    fn run_pass(&mut self, items: &mut [Item], pass: Pass) -> Result<(), AsmError> {
        self.pc = 0;
        self.symbols.reset_scope();
        for item in items.iter_mut() {
            self.process_item(item, pass)
                .map_err(|err| err.at(&item.location))?;
        }
        Ok(())
    }

    fn process_item(&mut self, item: &mut Item, pass: Pass) -> Result<(), AsmError> {
        for label in &item.labels {
            self.symbols
                .define_label(label, self.pc as i32, pass.verify())?;
        }
        let statement = match &mut item.statement {
            Some(statement) => statement,
            None => return Ok(()),
        };
        match statement {
            Statement::Assignment { target, expr } => {
                // Assignment values may not be forward references.
                let value = self.eval_defined(expr)?;
                match target {
                    AssignTarget::LocationCounter => self.set_origin(value, pass),
                    AssignTarget::Symbol(name) => {
                        self.symbols.define_constant(name, value, pass.verify())?
                    }
                }
                Ok(())
            }
            Statement::Directive { directive, args } => {
                self.process_directive(*directive, args, pass)
            }
            Statement::Instruction {
                mnemonic,
                operand,
                mode,
            } => self.process_instruction(mnemonic, operand, mode, pass),
        }
    }

    /// Relocate the PC. During discovery this also re-seeds the PRG load
    /// address, so the last `org`/`*=` of pass 0 wins.
    fn set_origin(&mut self, value: i32, pass: Pass) {
        self.pc = value as u16;
        if pass == Pass::Discovery {
            self.load_address = self.pc;
        }
    }

    fn process_directive(
        &mut self,
        directive: Directive,
        args: &[DirectiveArg],
        pass: Pass,
    ) -> Result<(), AsmError> {
        match directive {
            Directive::Org => {
                let value = self.eval_defined(single_expr(args)?)?;
                self.set_origin(value, pass);
                Ok(())
            }
            Directive::Byte => self.emit_data(args, 1, pass),
            Directive::Word => self.emit_data(args, 2, pass),
            Directive::Reserve => {
                let count = self.eval_defined(single_expr(args)?)?;
                if count < 0 {
                    return Err(AsmError::new(format!("Negative reserve size: {count}")));
                }
                match pass {
                    Pass::Discovery => self.pc = self.pc.wrapping_add(count as u16),
                    Pass::Encoding => {
                        for _ in 0..count {
                            self.image.write(&mut self.pc, 0);
                        }
                    }
                }
                Ok(())
            }
        }
    }

    /// Byte/word emission. During discovery args are only sized, never
    /// evaluated, so an argument may stay undefined until encoding.
    fn emit_data(&mut self, args: &[DirectiveArg], unit: u16, pass: Pass) -> Result<(), AsmError> {
        for arg in args {
            match arg {
                DirectiveArg::Str(text) => match pass {
                    Pass::Discovery => {
                        let count = text.chars().count() as u16;
                        self.pc = self.pc.wrapping_add(count.wrapping_mul(unit));
                    }
                    Pass::Encoding => {
                        for ch in text.chars() {
                            self.write_value(ch as i32, unit);
                        }
                    }
                },
                DirectiveArg::Expr(expr) => match pass {
                    Pass::Discovery => self.pc = self.pc.wrapping_add(unit),
                    Pass::Encoding => {
                        let value = self.eval_defined(expr)?;
                        self.write_value(value, unit);
                    }
                },
            }
        }
        Ok(())
    }

    fn write_value(&mut self, value: i32, unit: u16) {
        self.image.write(&mut self.pc, (value & 0xff) as u8);
        if unit == 2 {
            self.image.write(&mut self.pc, ((value >> 8) & 0xff) as u8);
        }
    }

    fn process_instruction(
        &mut self,
        mnemonic: &str,
        operand: &Operand,
        mode_slot: &mut Option<AddressMode>,
        pass: Pass,
    ) -> Result<(), AsmError> {
        if !instructions::has_mnemonic(mnemonic) {
            return Err(AsmError::new(format!("Unknown mnemonic: {mnemonic}")));
        }
        match pass {
            Pass::Discovery => {
                let value = match operand_expr(operand) {
                    Some(expr) => self.eval_known(expr)?,
                    None => None,
                };
                let mode = resolve_mode(mnemonic, operand, value)?;
                *mode_slot = Some(mode);
                self.pc = self.pc.wrapping_add(mode.instruction_size());
                Ok(())
            }
            Pass::Encoding => {
                let mode = match *mode_slot {
                    Some(mode) => mode,
                    None => {
                        return Err(AsmError::new(
                            "Addressing mode was not resolved during discovery",
                        ))
                    }
                };
                let opcode = match instructions::lookup(mnemonic, mode) {
                    Some(opcode) => opcode,
                    None => {
                        return Err(AsmError::new(format!(
                            "No opcode for {mnemonic} in resolved addressing mode"
                        )))
                    }
                };
                let start = self.pc;
                let value = match operand_expr(operand) {
                    Some(expr) => self.eval_defined(expr)?,
                    None => 0,
                };
                self.image.write(&mut self.pc, opcode);
                match mode {
                    AddressMode::Implied | AddressMode::Accumulator => {}
                    AddressMode::Relative => {
                        // Offset is relative to the byte after the operand.
                        let offset = value - (start as i32 + 2);
                        if !(-128..=127).contains(&offset) {
                            return Err(AsmError::new(format!(
                                "Branch target out of range: offset {offset}"
                            )));
                        }
                        self.image.write(&mut self.pc, offset as u8);
                    }
                    AddressMode::Immediate
                    | AddressMode::ZeroPage
                    | AddressMode::ZeroPageX
                    | AddressMode::ZeroPageY
                    | AddressMode::IndirectX
                    | AddressMode::IndirectY => {
                        self.write_value(value, 1);
                    }
                    AddressMode::Absolute
                    | AddressMode::AbsoluteX
                    | AddressMode::AbsoluteY
                    | AddressMode::Indirect => {
                        self.write_value(value, 2);
                    }
                }
                Ok(())
            }
        }
    }

    fn eval_defined(&self, expr: &Expr) -> Result<i32, AsmError> {
        let ctx = Ctx {
            symbols: &self.symbols,
            pc: self.pc,
        };
        eval_expr(expr, &ctx).map_err(|err| AsmError::new(err.message()))
    }

    /// Evaluate where a forward reference is still tolerable: an undefined
    /// symbol yields `None`, other failures stay errors.
    fn eval_known(&self, expr: &Expr) -> Result<Option<i32>, AsmError> {
        let ctx = Ctx {
            symbols: &self.symbols,
            pc: self.pc,
        };
        match eval_expr(expr, &ctx) {
            Ok(value) => Ok(Some(value)),
            Err(EvalError::Undefined(_)) => Ok(None),
            Err(err) => Err(AsmError::new(err.message())),
        }
    }
}

struct Ctx<'a> {
    symbols: &'a SymbolTable,
    pc: u16,
}

impl EvalContext for Ctx<'_> {
    fn lookup_symbol(&self, name: &str) -> Result<Option<i32>, EvalError> {
        self.symbols
            .resolve(name)
            .map_err(|err| EvalError::Message(err.message))
    }

    fn current_address(&self) -> Option<i32> {
        Some(self.pc as i32)
    }
}

fn operand_expr(operand: &Operand) -> Option<&Expr> {
    match operand {
        Operand::None | Operand::Accumulator => None,
        Operand::Immediate(expr)
        | Operand::Indirect(expr, _)
        | Operand::Expression(expr, _) => Some(expr),
    }
}

fn single_expr(args: &[DirectiveArg]) -> Result<&Expr, AsmError> {
    match args {
        [DirectiveArg::Expr(expr)] => Ok(expr),
        _ => Err(AsmError::new("Expected a single expression argument")),
    }
}

/// Pick an addressing mode for an instruction operand. `value` is the
/// operand's value when already known; unknown values (forward references
/// during discovery) never select a zero-page form.
fn resolve_mode(
    mnemonic: &str,
    operand: &Operand,
    value: Option<i32>,
) -> Result<AddressMode, AsmError> {
    let require = |mode: AddressMode| {
        if instructions::supports(mnemonic, mode) {
            Ok(mode)
        } else {
            Err(AsmError::new(format!(
                "Cannot resolve addressing mode for {mnemonic}"
            )))
        }
    };
    match operand {
        Operand::None => {
            if instructions::supports(mnemonic, AddressMode::Implied) {
                Ok(AddressMode::Implied)
            } else if instructions::supports(mnemonic, AddressMode::Accumulator) {
                Ok(AddressMode::Accumulator)
            } else {
                Err(AsmError::new(format!("{mnemonic} requires an operand")))
            }
        }
        Operand::Accumulator => require(AddressMode::Accumulator),
        Operand::Immediate(_) => require(AddressMode::Immediate),
        Operand::Indirect(_, register) => match register {
            Some(Register::X) => require(AddressMode::IndirectX),
            Some(Register::Y) => require(AddressMode::IndirectY),
            None => require(AddressMode::Indirect),
        },
        Operand::Expression(_, register) => {
            if instructions::is_branch(mnemonic) {
                return require(AddressMode::Relative);
            }
            let (zero_page, absolute) = match register {
                Some(Register::X) => (AddressMode::ZeroPageX, AddressMode::AbsoluteX),
                Some(Register::Y) => (AddressMode::ZeroPageY, AddressMode::AbsoluteY),
                None => (AddressMode::ZeroPage, AddressMode::Absolute),
            };
            match value {
                Some(value)
                    if (0..=255).contains(&value)
                        && instructions::supports(mnemonic, zero_page) =>
                {
                    Ok(zero_page)
                }
                _ => require(absolute),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{resolve_mode, AddressMode, Operand, Register};
    use crate::expr::Expr;

    fn expr_operand(register: Option<Register>) -> Operand {
        Operand::Expression(Expr::Number(0), register)
    }

    #[test]
    fn implied_preferred_over_accumulator() {
        assert_eq!(
            resolve_mode("RTS", &Operand::None, None).unwrap(),
            AddressMode::Implied
        );
        assert_eq!(
            resolve_mode("ASL", &Operand::None, None).unwrap(),
            AddressMode::Accumulator
        );
    }

    #[test]
    fn missing_operand_reported() {
        let err = resolve_mode("LDA", &Operand::None, None).unwrap_err();
        assert!(err.message.contains("requires an operand"));
    }

    #[test]
    fn zero_page_needs_known_small_value() {
        let operand = expr_operand(None);
        assert_eq!(
            resolve_mode("LDA", &operand, Some(0x20)).unwrap(),
            AddressMode::ZeroPage
        );
        assert_eq!(
            resolve_mode("LDA", &operand, Some(0xd020)).unwrap(),
            AddressMode::Absolute
        );
        // Unknown value (forward reference) falls back to absolute.
        assert_eq!(
            resolve_mode("LDA", &operand, None).unwrap(),
            AddressMode::Absolute
        );
    }

    #[test]
    fn indexed_forms() {
        assert_eq!(
            resolve_mode("LDA", &expr_operand(Some(Register::X)), Some(0x20)).unwrap(),
            AddressMode::ZeroPageX
        );
        assert_eq!(
            resolve_mode("LDA", &expr_operand(Some(Register::Y)), Some(0x2000)).unwrap(),
            AddressMode::AbsoluteY
        );
        // LDX $nn,Y has a zero-page encoding but no AbsoluteX form.
        assert_eq!(
            resolve_mode("LDX", &expr_operand(Some(Register::Y)), Some(0x20)).unwrap(),
            AddressMode::ZeroPageY
        );
    }

    #[test]
    fn forward_reference_without_absolute_form_fails() {
        // STX $nn,Y exists only as zero page; an unknown value cannot pick it.
        let err = resolve_mode("STX", &expr_operand(Some(Register::Y)), None).unwrap_err();
        assert!(err.message.contains("Cannot resolve addressing mode"));
    }

    #[test]
    fn branches_are_always_relative() {
        assert_eq!(
            resolve_mode("BNE", &expr_operand(None), Some(0x20)).unwrap(),
            AddressMode::Relative
        );
        assert_eq!(
            resolve_mode("BNE", &expr_operand(Some(Register::X)), None).unwrap(),
            AddressMode::Relative
        );
    }

    #[test]
    fn indirect_forms() {
        let indirect = |register| Operand::Indirect(Expr::Number(0x20), register);
        assert_eq!(
            resolve_mode("JMP", &indirect(None), Some(0xfffc)).unwrap(),
            AddressMode::Indirect
        );
        assert_eq!(
            resolve_mode("LDA", &indirect(Some(Register::X)), Some(0x20)).unwrap(),
            AddressMode::IndirectX
        );
        assert_eq!(
            resolve_mode("LDA", &indirect(Some(Register::Y)), Some(0x20)).unwrap(),
            AddressMode::IndirectY
        );
        assert!(resolve_mode("LDA", &indirect(None), Some(0x20)).is_err());
    }
}
