// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use crate::memory::LinearMemory;
use crate::peripherals::Device;
use crate::signals::InterruptLine;

/// Random access memory. Never raises interrupts.
#[derive(Debug)]
pub struct Ram {
    mem: LinearMemory,
    irq: InterruptLine,
}

impl Ram {
    pub fn new(base: u32, size: u32) -> Self {
        Self {
            mem: LinearMemory::new(size as usize, base),
            irq: InterruptLine::new(),
        }
    }

    pub fn size(&self) -> u32 {
        self.mem.data.len() as u32
    }

    pub fn contents(&self) -> &[u8] {
        &self.mem.data
    }
}

impl Device for Ram {
    fn name(&self) -> &str {
        "RAM"
    }

    fn lowest_address(&self) -> u32 {
        self.mem.base_addr
    }

    fn highest_address(&self) -> u32 {
        // A zero-sized RAM reports an inverted range and is refused by the bus.
        self.mem.base_addr.wrapping_add(self.size()).wrapping_sub(1)
    }

    fn check_mapped(&self, address: u32) -> bool {
        self.mem.read_u8(address).is_some()
    }

    fn peek(&mut self, address: u32) -> u8 {
        self.mem.read_u8(address).unwrap_or(0xFF)
    }

    fn poke(&mut self, address: u32, value: u8) {
        self.mem.write_u8(address, value);
    }

    fn peek_sized(&mut self, address: u32, size: u32) -> Option<u32> {
        if !matches!(size, 1 | 2 | 4) {
            return None;
        }
        self.mem.read_be(address, size as usize)
    }

    fn poke_sized(&mut self, address: u32, size: u32, value: u32) -> bool {
        matches!(size, 1 | 2 | 4) && self.mem.write_be(address, size as usize, value)
    }

    fn interrupt_line(&mut self) -> &mut InterruptLine {
        &mut self.irq
    }

    fn as_any(&self) -> Option<&dyn std::any::Any> {
        Some(self)
    }

    fn as_any_mut(&mut self) -> Option<&mut dyn std::any::Any> {
        Some(self)
    }

    fn snapshot(&self) -> serde_json::Value {
        serde_json::json!({
            "base": self.mem.base_addr,
            "size": self.size(),
        })
    }
}
