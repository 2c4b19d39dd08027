// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

// Located assembler errors.

use std::fmt;

/// Source position of a statement, kept at statement granularity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    pub file: String,
    pub line: u32,
    pub text: String,
}

impl Location {
    pub fn new(file: &str, line: u32, text: &str) -> Self {
        Self {
            file: file.to_string(),
            line,
            text: text.to_string(),
        }
    }
}

/// The single error kind for the whole assembler.
///
/// Internal errors are created without a location; the per-statement loop
/// attaches one before propagating, unless the error is already located.
#[derive(Debug, Clone)]
pub struct AsmError {
    pub message: String,
    pub location: Option<Location>,
}

impl AsmError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            location: None,
        }
    }

    pub fn located(message: impl Into<String>, location: Location) -> Self {
        Self {
            message: message.into(),
            location: Some(location),
        }
    }

    /// Attach a location if the error does not already carry one.
    pub fn at(mut self, location: &Location) -> Self {
        if self.location.is_none() {
            self.location = Some(location.clone());
        }
        self
    }
}

impl fmt::Display for AsmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.location {
            Some(loc) => write!(f, "{}:{}: {}", loc.file, loc.line, self.message),
            None => write!(f, "{}", self.message),
        }
    }
}

impl std::error::Error for AsmError {}

#[cfg(test)]
mod tests {
    use super::{AsmError, Location};

    #[test]
    fn renders_file_and_line() {
        let err = AsmError::new("Undefined symbol: FOO").at(&Location::new("main.asm", 7, "LDA FOO"));
        assert_eq!(err.to_string(), "main.asm:7: Undefined symbol: FOO");
    }

    #[test]
    fn at_keeps_existing_location() {
        let err = AsmError::located("boom", Location::new("a.asm", 1, ""));
        let err = err.at(&Location::new("b.asm", 2, ""));
        assert_eq!(err.to_string(), "a.asm:1: boom");
    }
}
