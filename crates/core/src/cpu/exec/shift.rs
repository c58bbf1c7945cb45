// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use super::{ea_field, reg_field, size_field};
use crate::cpu::{Completion, ExecResult, M68k, Size, StatusFlags, D0};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Arithmetic,
    Logical,
    RotateExtend,
    Rotate,
}

impl Kind {
    fn from_bits(bits: u16) -> Kind {
        match bits & 3 {
            0 => Kind::Arithmetic,
            1 => Kind::Logical,
            2 => Kind::RotateExtend,
            _ => Kind::Rotate,
        }
    }

    fn name(self, left: bool) -> &'static str {
        match (self, left) {
            (Kind::Arithmetic, true) => "ASL",
            (Kind::Arithmetic, false) => "ASR",
            (Kind::Logical, true) => "LSL",
            (Kind::Logical, false) => "LSR",
            (Kind::RotateExtend, true) => "ROXL",
            (Kind::RotateExtend, false) => "ROXR",
            (Kind::Rotate, true) => "ROL",
            (Kind::Rotate, false) => "ROR",
        }
    }
}

/// Shift `value` one bit at a time, returning the result and new flags.
fn shift(kind: Kind, left: bool, value: u32, count: u32, size: Size, sr: StatusFlags) -> (u32, StatusFlags) {
    let mask = size.mask();
    let msb = size.msb();
    let mut value = value & mask;
    let mut x = sr.contains(StatusFlags::X);
    let mut carry = false;
    let mut overflow = false;

    for _ in 0..count {
        let out = if left { value & msb != 0 } else { value & 1 != 0 };
        value = match (kind, left) {
            (Kind::Arithmetic | Kind::Logical, true) => (value << 1) & mask,
            (Kind::Arithmetic, false) => (value >> 1) | (value & msb),
            (Kind::Logical, false) => value >> 1,
            (Kind::RotateExtend, true) => ((value << 1) | x as u32) & mask,
            (Kind::RotateExtend, false) => (value >> 1) | if x { msb } else { 0 },
            (Kind::Rotate, true) => ((value << 1) | out as u32) & mask,
            (Kind::Rotate, false) => (value >> 1) | if out { msb } else { 0 },
        };
        if kind == Kind::Arithmetic && left && (value & msb != 0) != out {
            overflow = true;
        }
        carry = out;
        if kind != Kind::Rotate {
            x = out;
        }
    }

    let mut sr = sr;
    sr.set(StatusFlags::N, value & msb != 0);
    sr.set(StatusFlags::Z, value == 0);
    sr.set(StatusFlags::V, overflow);
    if count == 0 {
        // ROXL/ROXR by zero copy X into C; everything else clears C.
        sr.set(StatusFlags::C, kind == Kind::RotateExtend && x);
    } else {
        sr.set(StatusFlags::C, carry);
        sr.set(StatusFlags::X, x);
    }
    (value, sr)
}

impl M68k {
    pub(super) fn op_shift_register(&mut self, opcode: u16) -> ExecResult {
        let size = size_field(opcode)?;
        let left = opcode & 0x100 != 0;
        let kind = Kind::from_bits(opcode >> 3);
        let dn = D0 + (opcode & 7) as usize;

        let (count, count_text) = if opcode & 0x20 != 0 {
            let reg = reg_field(opcode);
            (self.regs[D0 + reg] % 64, format!("D{}", reg))
        } else {
            let n = match reg_field(opcode) as u32 {
                0 => 8,
                n => n,
            };
            (n, format!("#{}", n))
        };

        let (result, sr) = shift(kind, left, self.regs[dn], count, size, self.sr());
        self.set_sr(sr);
        self.set_register(dn, result, size);
        self.mnemonic(format_args!(
            "{}{} {},D{}",
            kind.name(left),
            size.suffix(),
            count_text,
            dn - D0
        ));
        Ok(Completion::Ok)
    }

    /// Memory shifts always move a word by one bit.
    pub(super) fn op_shift_memory(&mut self, opcode: u16) -> ExecResult {
        let left = opcode & 0x100 != 0;
        let kind = Kind::from_bits(opcode >> 9);
        let ea = self.effective_address(ea_field(opcode), Size::Word)?;
        let value = self.read_ea(&ea, Size::Word)?;
        let (result, sr) = shift(kind, left, value, 1, Size::Word, self.sr());
        self.write_ea(&ea, Size::Word, result)?;
        self.set_sr(sr);
        self.mnemonic(format_args!("{}.W {}", kind.name(left), ea.text));
        Ok(Completion::Ok)
    }
}
