// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use super::ea_field;
use crate::cpu::{Completion, ExecResult, M68k, Size, StatusFlags};

/// Packed-BCD `dest + src + x`, returning the result byte and the decimal
/// carry.
fn bcd_add(src: u32, dest: u32, x: u32) -> (u32, bool) {
    let mut res = (src & 0xf) + (dest & 0xf) + x;
    if res > 9 {
        res += 6;
    }
    res += (src & 0xf0) + (dest & 0xf0);
    let carry = res > 0x99;
    if carry {
        res += 0x60;
    }
    (res & 0xff, carry)
}

/// Packed-BCD `dest - src - x`, returning the result byte and the decimal
/// borrow.
fn bcd_sub(src: u32, dest: u32, x: u32) -> (u32, bool) {
    let low = (dest & 0xf) as i32 - (src & 0xf) as i32 - x as i32;
    let high = (dest & 0xf0) as i32 - (src & 0xf0) as i32;
    let mut res = high + low;
    if low < 0 {
        res -= 6;
    }
    let borrow = res < 0;
    if borrow {
        res -= 0x60;
    }
    ((res as u32) & 0xff, borrow)
}

impl M68k {
    fn bcd_flags(&mut self, before: StatusFlags, result: u32, carry: bool) {
        let mut sr = self.sr();
        sr.set(StatusFlags::C | StatusFlags::X, carry);
        sr.set(StatusFlags::N, result & 0x80 != 0);
        self.set_sr(sr);
        self.sticky_zero(before, result, Size::Byte);
    }

    pub(super) fn op_abcd_sbcd(&mut self, opcode: u16, sub: bool) -> ExecResult {
        let (src_ea, dest_ea) = self.extended_operands(opcode, Size::Byte)?;
        let src = self.read_ea(&src_ea, Size::Byte)?;
        let dest = self.read_ea(&dest_ea, Size::Byte)?;
        let before = self.sr();
        let x = before.contains(StatusFlags::X) as u32;

        let (result, carry) = if sub {
            bcd_sub(src, dest, x)
        } else {
            bcd_add(src, dest, x)
        };
        self.bcd_flags(before, result, carry);
        self.write_ea(&dest_ea, Size::Byte, result)?;
        self.mnemonic(format_args!(
            "{}.B {},{}",
            if sub { "SBCD" } else { "ABCD" },
            src_ea.text,
            dest_ea.text
        ));
        Ok(Completion::Ok)
    }

    pub(super) fn op_nbcd(&mut self, opcode: u16) -> ExecResult {
        let ea = self.effective_address(ea_field(opcode), Size::Byte)?;
        let dest = self.read_ea(&ea, Size::Byte)?;
        let before = self.sr();
        let x = before.contains(StatusFlags::X) as u32;
        let (result, borrow) = bcd_sub(dest, 0, x);
        self.bcd_flags(before, result, borrow);
        self.write_ea(&ea, Size::Byte, result)?;
        self.mnemonic(format_args!("NBCD.B {}", ea.text));
        Ok(Completion::Ok)
    }
}
