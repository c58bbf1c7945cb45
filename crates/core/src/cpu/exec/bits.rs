// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use super::{ea_field, reg_field};
use crate::cpu::ea::Operand;
use crate::cpu::{Completion, ExecResult, M68k, Size, StatusFlags, D0};

impl M68k {
    /// BTST, BCHG, BCLR and BSET in both the register-count and the
    /// immediate-count form. Data registers use bit numbers modulo 32,
    /// memory operands are single bytes with bit numbers modulo 8.
    pub(super) fn op_bit(&mut self, opcode: u16) -> ExecResult {
        let (number, source) = if opcode & 0x100 != 0 {
            let reg = reg_field(opcode);
            (self.regs[D0 + reg], format!("D{}", reg))
        } else {
            let (imm, text) = self.immediate(Size::Byte)?;
            (imm, text)
        };

        let mode = (opcode >> 3) & 7;
        let size = if mode == 0 { Size::Long } else { Size::Byte };
        let ea = self.effective_address(ea_field(opcode), size)?;
        let bit = number % size.bits();
        let value = self.read_ea(&ea, size)?;
        let was_set = value & (1 << bit) != 0;

        let mut sr = self.sr();
        sr.set(StatusFlags::Z, !was_set);
        self.set_sr(sr);

        let (name, updated) = match (opcode >> 6) & 3 {
            0 => ("BTST", None),
            1 => ("BCHG", Some(value ^ (1 << bit))),
            2 => ("BCLR", Some(value & !(1 << bit))),
            _ => ("BSET", Some(value | (1 << bit))),
        };
        if let Some(updated) = updated {
            self.write_ea(&ea, size, updated)?;
        }

        let suffix = match ea.loc {
            Operand::Register(_) => Size::Long.suffix(),
            Operand::Memory(_) => Size::Byte.suffix(),
        };
        self.mnemonic(format_args!("{}{} {},{}", name, suffix, source, ea.text));
        Ok(Completion::Ok)
    }
}
