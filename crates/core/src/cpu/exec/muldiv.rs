// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use super::{ea_field, reg_field};
use crate::cpu::m68k::ZERO_DIVIDE_VECTOR;
use crate::cpu::{Completion, ExecResult, Fault, M68k, Size, StatusFlags, D0};

/// Extension-word bits that must be clear in MULS.L/MULU.L/DIVS.L/DIVU.L.
const LONG_EXTENSION_RESERVED: u16 = 0x83f8;

impl M68k {
    /// N and Z from `value` (tested at `bits` width), V as given, C clear.
    fn muldiv_flags(&mut self, value: u64, bits: u32, overflow: bool) {
        let mut sr = self.sr();
        sr.remove(StatusFlags::C);
        sr.set(StatusFlags::V, overflow);
        if !overflow {
            let mask = if bits == 64 { u64::MAX } else { (1u64 << bits) - 1 };
            sr.set(StatusFlags::Z, value & mask == 0);
            sr.set(StatusFlags::N, value & (1u64 << (bits - 1)) != 0);
        }
        self.set_sr(sr);
    }

    /// MULU.W / MULS.W: 16 x 16 -> 32 bits into Dn.
    pub(super) fn op_mul_word(&mut self, opcode: u16, signed: bool) -> ExecResult {
        let dn = D0 + reg_field(opcode);
        let ea = self.effective_address(ea_field(opcode), Size::Word)?;
        let src = self.read_ea(&ea, Size::Word)?;
        let dest = self.regs[dn] & 0xffff;

        let result = if signed {
            (Size::Word.sign_extend(src) as i32).wrapping_mul(Size::Word.sign_extend(dest) as i32)
                as u32
        } else {
            src * dest
        };
        self.regs[dn] = result;
        self.muldiv_flags(result as u64, 32, false);
        self.mnemonic(format_args!(
            "{}.W {},D{}",
            if signed { "MULS" } else { "MULU" },
            ea.text,
            dn - D0
        ));
        Ok(Completion::Ok)
    }

    /// DIVU.W / DIVS.W: 32 / 16 bits, remainder in the high word of Dn and
    /// quotient in the low word. Dn is untouched on overflow.
    pub(super) fn op_div_word(&mut self, opcode: u16, signed: bool) -> ExecResult {
        let dn = D0 + reg_field(opcode);
        let ea = self.effective_address(ea_field(opcode), Size::Word)?;
        let src = self.read_ea(&ea, Size::Word)?;
        self.mnemonic(format_args!(
            "{}.W {},D{}",
            if signed { "DIVS" } else { "DIVU" },
            ea.text,
            dn - D0
        ));

        if src == 0 {
            self.process_exception(ZERO_DIVIDE_VECTOR)?;
            return Ok(Completion::Ok);
        }

        let dividend = self.regs[dn];
        let (quotient, remainder, overflow) = if signed {
            let divisor = Size::Word.sign_extend(src) as i32 as i64;
            let dividend = dividend as i32 as i64;
            let q = dividend / divisor;
            let r = dividend % divisor;
            (q as u32, r as u32, q < i16::MIN as i64 || q > i16::MAX as i64)
        } else {
            let q = dividend / src;
            (q, dividend % src, q > 0xffff)
        };

        if !overflow {
            self.regs[dn] = (remainder << 16) | (quotient & 0xffff);
        }
        self.muldiv_flags(quotient as u64, 16, overflow);
        Ok(Completion::Ok)
    }

    /// MULU.L / MULS.L with a 32- or 64-bit product.
    pub(super) fn op_mul_long(&mut self, opcode: u16) -> ExecResult {
        let ext = self.fetch_word()?;
        if ext & LONG_EXTENSION_RESERVED != 0 {
            return Err(Fault::IllegalInstruction);
        }
        let dl = D0 + ((ext >> 12) & 7) as usize;
        let dh = D0 + (ext & 7) as usize;
        let signed = ext & 0x800 != 0;
        let wide = ext & 0x400 != 0;

        let ea = self.effective_address(ea_field(opcode), Size::Long)?;
        let src = self.read_ea(&ea, Size::Long)?;
        let dest = self.regs[dl];

        let product = if signed {
            (src as i32 as i64 * dest as i32 as i64) as u64
        } else {
            src as u64 * dest as u64
        };

        if wide {
            self.regs[dh] = (product >> 32) as u32;
            self.regs[dl] = product as u32;
            self.muldiv_flags(product, 64, false);
        } else {
            let overflow = if signed {
                product as i64 != product as u32 as i32 as i64
            } else {
                product >> 32 != 0
            };
            self.regs[dl] = product as u32;
            self.muldiv_flags(product & 0xffff_ffff, 32, false);
            let mut sr = self.sr();
            sr.set(StatusFlags::V, overflow);
            self.set_sr(sr);
        }

        let name = if signed { "MULS.L" } else { "MULU.L" };
        if wide {
            self.mnemonic(format_args!("{} {},D{}:D{}", name, ea.text, dh - D0, dl - D0));
        } else {
            self.mnemonic(format_args!("{} {},D{}", name, ea.text, dl - D0));
        }
        Ok(Completion::Ok)
    }

    /// DIVU.L / DIVS.L with a 32- or 64-bit dividend. The remainder is
    /// written before the quotient, so `Dr == Dq` keeps only the quotient.
    pub(super) fn op_div_long(&mut self, opcode: u16) -> ExecResult {
        let ext = self.fetch_word()?;
        if ext & LONG_EXTENSION_RESERVED != 0 {
            return Err(Fault::IllegalInstruction);
        }
        let dq = D0 + ((ext >> 12) & 7) as usize;
        let dr = D0 + (ext & 7) as usize;
        let signed = ext & 0x800 != 0;
        let wide = ext & 0x400 != 0;

        let ea = self.effective_address(ea_field(opcode), Size::Long)?;
        let src = self.read_ea(&ea, Size::Long)?;
        let name = if signed { "DIVS.L" } else { "DIVU.L" };
        if wide || dr != dq {
            self.mnemonic(format_args!("{} {},D{}:D{}", name, ea.text, dr - D0, dq - D0));
        } else {
            self.mnemonic(format_args!("{} {},D{}", name, ea.text, dq - D0));
        }

        if src == 0 {
            self.process_exception(ZERO_DIVIDE_VECTOR)?;
            return Ok(Completion::Ok);
        }

        let low = self.regs[dq] as u64;
        let dividend = if wide {
            ((self.regs[dr] as u64) << 32) | low
        } else {
            low
        };

        let (quotient, remainder, overflow) = if signed {
            let dividend = if wide {
                dividend as i64 as i128
            } else {
                dividend as u32 as i32 as i128
            };
            let divisor = src as i32 as i128;
            let q = dividend / divisor;
            let r = dividend % divisor;
            (q as u32, r as u32, q < i32::MIN as i128 || q > i32::MAX as i128)
        } else {
            let q = dividend / src as u64;
            let r = dividend % src as u64;
            (q as u32, r as u32, q > u32::MAX as u64)
        };

        if !overflow {
            self.regs[dr] = remainder;
            self.regs[dq] = quotient;
        }
        self.muldiv_flags(quotient as u64, 32, overflow);
        Ok(Completion::Ok)
    }
}
