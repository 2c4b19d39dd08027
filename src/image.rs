// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

// Simulated 64 KB memory image with written-span tracking and PRG output.

const IMAGE_SIZE: usize = 65536;

pub struct MemoryImage {
    data: Vec<u8>,
    written: Vec<bool>,
    lowest: Option<u16>,
    highest: Option<u16>,
}

impl Default for MemoryImage {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryImage {
    pub fn new() -> Self {
        Self {
            data: vec![0; IMAGE_SIZE],
            written: vec![false; IMAGE_SIZE],
            lowest: None,
            highest: None,
        }
    }

    /// Write one byte at `*pc` and advance the counter, wrapping mod 65536.
    pub fn write(&mut self, pc: &mut u16, value: u8) {
        let addr = *pc;
        self.data[addr as usize] = value;
        self.written[addr as usize] = true;
        self.lowest = Some(match self.lowest {
            Some(low) => low.min(addr),
            None => addr,
        });
        self.highest = Some(match self.highest {
            Some(high) => high.max(addr),
            None => addr,
        });
        *pc = pc.wrapping_add(1);
    }

    pub fn lowest_written(&self) -> Option<u16> {
        self.lowest
    }

    pub fn highest_written(&self) -> Option<u16> {
        self.highest
    }

    /// Slice the written span into a PRG image: 2-byte little-endian load
    /// address followed by the body. Untouched bytes inside the span stay
    /// zero. Returns an empty buffer when nothing was written.
    pub fn to_prg(&self, load_address: u16) -> Vec<u8> {
        let (lowest, highest) = match (self.lowest, self.highest) {
            (Some(lowest), Some(highest)) => (lowest, highest),
            _ => return Vec::new(),
        };
        let start = lowest.min(load_address);
        let mut out = Vec::with_capacity(2 + (highest - start) as usize + 1);
        out.push((start & 0xff) as u8);
        out.push((start >> 8) as u8);
        out.extend_from_slice(&self.data[start as usize..=highest as usize]);
        out
    }
}
