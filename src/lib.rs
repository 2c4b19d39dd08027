// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! prgForge: a two-pass 6502/6510 assembler producing C64 PRG images.
//!
//! The library is I/O free: sources come in as strings, includes are
//! resolved through a caller-supplied [`IncludeResolver`], and the result
//! is a PRG byte buffer. The `prgforge` binary wraps this with a
//! filesystem resolver and output writing.

pub mod assembler;
pub mod error;
pub mod expr;
pub mod image;
pub mod instructions;
pub mod parser;
pub mod symbol_table;
pub mod tokenizer;

pub use assembler::{assemble, Assembler, AssembleOptions};
pub use error::{AsmError, Location};
pub use parser::{parse_source, IncludeResolver, IncludeSource};
