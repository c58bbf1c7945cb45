// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use crate::bus::MemoryBus;
use crate::{SimResult, SimulationError};
use serde::{Deserialize, Serialize};

/// A contiguous run of bytes destined for the bus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
    pub start_addr: u32,
    pub data: Vec<u8>,
}

/// A loadable program: data segments plus an optional start address taken
/// from the image's termination record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgramImage {
    pub entry_point: Option<u32>,
    pub segments: Vec<Segment>,
}

impl ProgramImage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append bytes at `start_addr`, merging with the previous segment when
    /// the two are contiguous.
    pub fn add_segment(&mut self, start_addr: u32, data: Vec<u8>) {
        if let Some(last) = self.segments.last_mut() {
            if last.start_addr.wrapping_add(last.data.len() as u32) == start_addr {
                last.data.extend_from_slice(&data);
                return;
            }
        }
        self.segments.push(Segment { start_addr, data });
    }

    pub fn byte_count(&self) -> usize {
        self.segments.iter().map(|s| s.data.len()).sum()
    }

    /// Write every segment through the bus, stopping at the first unmapped byte.
    pub fn load_into(&self, bus: &mut MemoryBus) -> SimResult<usize> {
        let mut written = 0;
        for segment in &self.segments {
            for (offset, byte) in segment.data.iter().enumerate() {
                let addr = segment.start_addr.wrapping_add(offset as u32);
                if !bus.poke(addr, *byte) {
                    return Err(SimulationError::Unmapped(addr));
                }
                written += 1;
            }
        }
        Ok(written)
    }
}

/// Flat byte storage backing RAM-like devices.
#[derive(Debug, Clone, Serialize)]
pub struct LinearMemory {
    #[serde(skip)]
    pub data: Vec<u8>,
    pub base_addr: u32,
}

impl LinearMemory {
    pub fn new(size: usize, base_addr: u32) -> Self {
        Self {
            data: vec![0; size],
            base_addr,
        }
    }

    fn offset(&self, addr: u32, len: usize) -> Option<usize> {
        let offset = addr.checked_sub(self.base_addr)? as usize;
        (offset.checked_add(len)? <= self.data.len()).then_some(offset)
    }

    pub fn read_u8(&self, addr: u32) -> Option<u8> {
        self.offset(addr, 1).map(|o| self.data[o])
    }

    pub fn write_u8(&mut self, addr: u32, value: u8) -> bool {
        match self.offset(addr, 1) {
            Some(o) => {
                self.data[o] = value;
                true
            }
            None => false,
        }
    }

    /// Big-endian read of `len` (1..=4) bytes, all inside the memory.
    pub fn read_be(&self, addr: u32, len: usize) -> Option<u32> {
        let o = self.offset(addr, len)?;
        Some(
            self.data[o..o + len]
                .iter()
                .fold(0u32, |acc, b| (acc << 8) | *b as u32),
        )
    }

    pub fn write_be(&mut self, addr: u32, len: usize, value: u32) -> bool {
        let Some(o) = self.offset(addr, len) else {
            return false;
        };
        for (i, slot) in self.data[o..o + len].iter_mut().enumerate() {
            *slot = (value >> (8 * (len - 1 - i))) as u8;
        }
        true
    }

    pub fn load_from_segment(&mut self, segment: &Segment) -> bool {
        match self.offset(segment.start_addr, segment.data.len()) {
            Some(o) => {
                self.data[o..o + segment.data.len()].copy_from_slice(&segment.data);
                true
            }
            None => false,
        }
    }
}
