// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! Motorola 68000 / CPU32 processor core.

mod ea;
mod exec;
mod flags;
pub mod m68k;

pub use flags::{condition_name, set_condition_codes, test_condition, Operation};
pub use m68k::M68k;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

/// Processor variant. Both share one interpreter; the differences are
/// confined to the properties below.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CpuModel {
    #[serde(alias = "68000")]
    M68000,
    #[serde(alias = "68360")]
    Cpu32,
}

impl CpuModel {
    pub fn name(self) -> &'static str {
        match self {
            CpuModel::M68000 => "68000",
            CpuModel::Cpu32 => "68360",
        }
    }

    /// Highest addressable CPU word.
    pub fn max_address(self) -> u32 {
        match self {
            CpuModel::M68000 => 0x00ff_ffff,
            CpuModel::Cpu32 => 0x0fff_ffff,
        }
    }

    /// Word and long accesses to odd addresses raise an address error.
    pub fn checks_alignment(self) -> bool {
        self == CpuModel::M68000
    }

    pub fn is_cpu32(self) -> bool {
        self == CpuModel::Cpu32
    }

    pub fn register_count(self) -> usize {
        match self {
            CpuModel::M68000 => 19,
            CpuModel::Cpu32 => 22,
        }
    }

    /// Bytes per CPU word.
    pub fn granularity(self) -> u32 {
        1
    }
}

impl std::fmt::Display for CpuModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CpuState {
    Normal,
    /// Terminal until reset: a fault occurred while stacking a fault frame.
    Halted,
    /// Waiting for an interrupt after STOP.
    Stopped,
    /// A BREAK instruction executed; cleared once the step driver sees it.
    Break,
}

/// Operand size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Size {
    Byte,
    Word,
    Long,
}

impl Size {
    /// Decode the common two-bit size field (00 = byte, 01 = word, 10 = long).
    pub fn from_bits(bits: u16) -> Option<Size> {
        match bits & 3 {
            0 => Some(Size::Byte),
            1 => Some(Size::Word),
            2 => Some(Size::Long),
            _ => None,
        }
    }

    pub fn bytes(self) -> u32 {
        match self {
            Size::Byte => 1,
            Size::Word => 2,
            Size::Long => 4,
        }
    }

    pub fn mask(self) -> u32 {
        match self {
            Size::Byte => 0xff,
            Size::Word => 0xffff,
            Size::Long => 0xffff_ffff,
        }
    }

    pub fn msb(self) -> u32 {
        match self {
            Size::Byte => 0x80,
            Size::Word => 0x8000,
            Size::Long => 0x8000_0000,
        }
    }

    pub fn bits(self) -> u32 {
        self.bytes() * 8
    }

    pub fn suffix(self) -> &'static str {
        match self {
            Size::Byte => ".B",
            Size::Word => ".W",
            Size::Long => ".L",
        }
    }

    pub fn sign_extend(self, value: u32) -> u32 {
        match self {
            Size::Byte => value as u8 as i8 as i32 as u32,
            Size::Word => value as u16 as i16 as i32 as u32,
            Size::Long => value,
        }
    }

    /// Hex digits used when printing a value of this size.
    pub fn digits(self) -> usize {
        (self.bytes() * 2) as usize
    }
}

bitflags! {
    /// Status register bits. The low byte is the condition code register.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct StatusFlags: u16 {
        const C = 0x0001;
        const V = 0x0002;
        const Z = 0x0004;
        const N = 0x0008;
        const X = 0x0010;
        const I0 = 0x0100;
        const I1 = 0x0200;
        const I2 = 0x0400;
        const S = 0x2000;
        const T = 0x8000;

        const CCR = Self::C.bits() | Self::V.bits() | Self::Z.bits() | Self::N.bits() | Self::X.bits();
        const INTERRUPT_MASK = Self::I0.bits() | Self::I1.bits() | Self::I2.bits();
        /// C, V, Z and N: the flags most instructions write.
        const CVZN = Self::C.bits() | Self::V.bits() | Self::Z.bits() | Self::N.bits();
    }
}

// Register file slots. D0..A6, USP, SSP, PC and SR are contiguous so that
// register fields of an opcode index them directly.
pub const D0: usize = 0;
pub const A0: usize = 8;
pub const USP: usize = 15;
pub const SSP: usize = 16;
pub const PC: usize = 17;
pub const SR: usize = 18;
pub const VBR: usize = 19;
pub const SFC: usize = 20;
pub const DFC: usize = 21;
pub const MAX_REGISTERS: usize = 22;

/// Static description of one register slot.
#[derive(Debug, Clone, Copy)]
pub struct RegisterData {
    pub name: &'static str,
    pub mask: u32,
    pub description: &'static str,
}

const fn reg(name: &'static str, mask: u32, description: &'static str) -> RegisterData {
    RegisterData {
        name,
        mask,
        description,
    }
}

pub const REGISTER_DATA: [RegisterData; MAX_REGISTERS] = [
    reg("D0", 0xffff_ffff, "Data Register 0"),
    reg("D1", 0xffff_ffff, "Data Register 1"),
    reg("D2", 0xffff_ffff, "Data Register 2"),
    reg("D3", 0xffff_ffff, "Data Register 3"),
    reg("D4", 0xffff_ffff, "Data Register 4"),
    reg("D5", 0xffff_ffff, "Data Register 5"),
    reg("D6", 0xffff_ffff, "Data Register 6"),
    reg("D7", 0xffff_ffff, "Data Register 7"),
    reg("A0", 0xffff_ffff, "Address Register 0"),
    reg("A1", 0xffff_ffff, "Address Register 1"),
    reg("A2", 0xffff_ffff, "Address Register 2"),
    reg("A3", 0xffff_ffff, "Address Register 3"),
    reg("A4", 0xffff_ffff, "Address Register 4"),
    reg("A5", 0xffff_ffff, "Address Register 5"),
    reg("A6", 0xffff_ffff, "Address Register 6"),
    reg("A7", 0xffff_ffff, "Address Register 7 (User Stack Pointer)"),
    reg("A7'", 0xffff_ffff, "Address Register 7 (Supervisor Stack Pointer)"),
    reg("PC", 0xffff_ffff, "Program Counter"),
    reg(
        "SR",
        0xffff,
        "Status Register: T-S--III---XNZVC (Trace, Supervisor, Interrupt mask, eXtend, Negative, Zero, oVerflow, Carry)",
    ),
    reg("VBR", 0xffff_ffff, "Vector Base Register"),
    reg("SFC", 0x7, "Source Function Code (address space identification)"),
    reg("DFC", 0x7, "Destination Function Code (address space identification)"),
];

/// Display row produced by [`M68k::register_info`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegisterInfo {
    pub name: String,
    pub value: String,
    pub mask: u32,
    pub description: String,
}

/// Faults an instruction handler can end with. The CPU turns each into an
/// exception on the simulated machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// No device maps the address.
    BusError(u32),
    /// Word or long access to an odd address (68000 only).
    AddressError(u32),
    IllegalInstruction,
}

/// Successful handler outcomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    Ok,
    /// A privileged instruction ran, or a privilege violation was taken.
    /// Suppresses the trace exception.
    Privileged,
}

pub type ExecResult = Result<Completion, Fault>;

/// What one call to `execute_instruction` reports to the step driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepStatus {
    Ok,
    /// A BREAK instruction stopped a free-running program.
    Break,
    Halted,
}

impl StepStatus {
    /// The console message for this status; empty on success.
    pub fn message(self) -> &'static str {
        match self {
            StepStatus::Ok => "",
            StepStatus::Break => "BREAK instruction",
            StepStatus::Halted => "CPU has halted",
        }
    }
}
