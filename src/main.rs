// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::exit;

use clap::Parser;

use prgforge::assembler::Assembler;
use prgforge::parser::{parse_source, IncludeResolver, IncludeSource};

pub const VERSION: &str = "1.0";

#[derive(Parser, Debug)]
#[command(
    name = "prgforge",
    version = VERSION,
    about = "Two-pass 6502/6510 assembler producing C64 PRG files"
)]
struct Cli {
    /// Assembly source file
    input: String,

    /// Output PRG file (defaults to the input name with a .prg extension)
    #[arg(short, long)]
    outfile: Option<String>,

    /// Default load address as 4 hex digits, used when the source has no org
    #[arg(long, default_value = "0801", value_parser = parse_hex_4)]
    load_address: u16,

    /// Print the symbol table after assembling
    #[arg(short, long)]
    symbols: bool,
}

fn parse_hex_4(s: &str) -> Result<u16, String> {
    if s.len() == 4 && s.chars().all(|c| c.is_ascii_hexdigit()) {
        u16::from_str_radix(s, 16).map_err(|e| e.to_string())
    } else {
        Err(format!("'{s}' is not a 4-digit hex address"))
    }
}

/// Resolves includes relative to the directory of the including file.
struct FileResolver;

impl IncludeResolver for FileResolver {
    fn resolve(&self, path: &str, from_file: &str) -> io::Result<IncludeSource> {
        let base = Path::new(from_file).parent().unwrap_or(Path::new(""));
        let full = base.join(path);
        let contents = fs::read_to_string(&full)?;
        Ok(IncludeSource {
            contents,
            file_name: Some(full.display().to_string()),
        })
    }
}

fn output_path(cli: &Cli) -> PathBuf {
    match &cli.outfile {
        Some(name) => PathBuf::from(name),
        None => Path::new(&cli.input).with_extension("prg"),
    }
}

fn run(cli: &Cli) -> Result<(), String> {
    let source = fs::read_to_string(&cli.input)
        .map_err(|err| format!("Cannot read '{}': {err}", cli.input))?;

    let resolver = FileResolver;
    let mut items = parse_source(&source, &cli.input, Some(&resolver))
        .map_err(|err| err.to_string())?;
    let mut assembler = Assembler::new(cli.load_address);
    assembler.run(&mut items).map_err(|err| err.to_string())?;

    let prg = assembler.prg();
    let out = output_path(cli);
    fs::write(&out, &prg).map_err(|err| format!("Cannot write '{}': {err}", out.display()))?;
    if prg.len() > 2 {
        let load = u16::from_le_bytes([prg[0], prg[1]]);
        let end = load as usize + prg.len() - 3;
        println!(
            "Wrote {} bytes to {} (${:04x}-${:04x})",
            prg.len(),
            out.display(),
            load,
            end
        );
    } else {
        println!("Wrote {} bytes to {}", prg.len(), out.display());
    }

    if cli.symbols {
        let stdout = io::stdout();
        assembler
            .symbols()
            .dump(stdout.lock())
            .map_err(|err| err.to_string())?;
    }
    Ok(())
}

fn main() {
    let cli = Cli::parse();
    if let Err(message) = run(&cli) {
        eprintln!("{message}");
        exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::parse_hex_4;

    #[test]
    fn hex_address_parsing() {
        assert_eq!(parse_hex_4("0801").unwrap(), 0x0801);
        assert_eq!(parse_hex_4("C000").unwrap(), 0xc000);
        assert!(parse_hex_4("801").is_err());
        assert!(parse_hex_4("08010").is_err());
        assert!(parse_hex_4("08G1").is_err());
    }
}
