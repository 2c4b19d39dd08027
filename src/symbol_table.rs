// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

// Two-tier symbol table: globals plus per-global-scope local labels.

use std::collections::HashMap;
use std::io::{self, Write};

use crate::error::AsmError;

/// Symbol storage for one assembly run.
///
/// Names beginning with `.` are local and resolve against the most recently
/// declared global *label* (constants never move the scope). Values are
/// defined during the discovery pass and verified, not redefined, during the
/// encoding pass.
#[derive(Debug, Default)]
pub struct SymbolTable {
    globals: HashMap<String, i32>,
    locals: HashMap<String, HashMap<String, i32>>,
    current_scope: Option<String>,
}

pub fn is_local(name: &str) -> bool {
    name.starts_with('.')
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Define a label at `value`. A global label also becomes the scope for
    /// subsequent local names. With `verify` set (encoding pass) the value
    /// must match the one recorded during discovery.
    pub fn define_label(&mut self, name: &str, value: i32, verify: bool) -> Result<(), AsmError> {
        if is_local(name) {
            let scope = match &self.current_scope {
                Some(scope) => scope.clone(),
                None => {
                    return Err(AsmError::new(format!(
                        "Local label '{name}' declared before any global label"
                    )))
                }
            };
            let bucket = self.locals.entry(scope).or_default();
            Self::set_value(bucket, name, value, verify)
        } else {
            Self::set_value(&mut self.globals, name, value, verify)?;
            self.current_scope = Some(name.to_string());
            Ok(())
        }
    }

    /// Define a plain constant. Does not change the local-label scope.
    pub fn define_constant(
        &mut self,
        name: &str,
        value: i32,
        verify: bool,
    ) -> Result<(), AsmError> {
        if is_local(name) {
            let scope = match &self.current_scope {
                Some(scope) => scope.clone(),
                None => {
                    return Err(AsmError::new(format!(
                        "Local label '{name}' declared before any global label"
                    )))
                }
            };
            let bucket = self.locals.entry(scope).or_default();
            Self::set_value(bucket, name, value, verify)
        } else {
            Self::set_value(&mut self.globals, name, value, verify)
        }
    }

    fn set_value(
        bucket: &mut HashMap<String, i32>,
        name: &str,
        value: i32,
        verify: bool,
    ) -> Result<(), AsmError> {
        if verify {
            match bucket.get(name) {
                Some(previous) if *previous == value => Ok(()),
                _ => Err(AsmError::new(format!(
                    "Symbol '{name}' changed value between passes"
                ))),
            }
        } else {
            bucket.insert(name.to_string(), value);
            Ok(())
        }
    }

    /// Look a name up. `Ok(None)` means not (yet) defined, which the
    /// discovery pass tolerates for forward references.
    pub fn resolve(&self, name: &str) -> Result<Option<i32>, AsmError> {
        if name == "*" {
            return Err(AsmError::new("'*' should be resolved externally"));
        }
        if is_local(name) {
            let scope = match &self.current_scope {
                Some(scope) => scope,
                None => {
                    return Err(AsmError::new(format!(
                        "Local label '{name}' referenced before any global label"
                    )))
                }
            };
            Ok(self
                .locals
                .get(scope)
                .and_then(|bucket| bucket.get(name))
                .copied())
        } else {
            Ok(self.globals.get(name).copied())
        }
    }

    /// Reset scope tracking for the start of a pass. Contents persist.
    pub fn reset_scope(&mut self) {
        self.current_scope = None;
    }

    pub fn dump<W: Write>(&self, mut out: W) -> io::Result<()> {
        let mut names: Vec<&String> = self.globals.keys().collect();
        names.sort();
        for name in names {
            let val = self.globals[name];
            writeln!(out, "{:<16}: {:04x} ({})", name, val & 0xffff, val)?;
            if let Some(bucket) = self.locals.get(name) {
                let mut locals: Vec<&String> = bucket.keys().collect();
                locals.sort();
                for local in locals {
                    let val = bucket[local];
                    writeln!(out, "  {:<14}: {:04x} ({})", local, val & 0xffff, val)?;
                }
            }
        }
        Ok(())
    }
}
