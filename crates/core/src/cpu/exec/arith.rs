// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use super::{ea_field, reg_field, size_field};
use crate::cpu::ea::Ea;
use crate::cpu::m68k::CHK_VECTOR;
use crate::cpu::{
    set_condition_codes, Completion, ExecResult, Fault, M68k, Operation, Size, StatusFlags, D0,
};

impl M68k {
    /// `dest + src` or `dest - src` at `size`, updating every condition code.
    fn add_sub_flags(&mut self, src: u32, dest: u32, size: Size, sub: bool) -> u32 {
        let (result, op) = if sub {
            (dest.wrapping_sub(src), Operation::Sub)
        } else {
            (dest.wrapping_add(src), Operation::Add)
        };
        let sr = set_condition_codes(self.sr(), src, dest, result, size, op, StatusFlags::CCR);
        self.set_sr(sr);
        result & size.mask()
    }

    fn compare(&mut self, src: u32, dest: u32, size: Size) {
        let result = dest.wrapping_sub(src);
        let sr = set_condition_codes(
            self.sr(),
            src,
            dest,
            result,
            size,
            Operation::Sub,
            StatusFlags::CVZN,
        );
        self.set_sr(sr);
    }

    /// N/Z from `value`, V and C cleared.
    pub(super) fn logical_flags(&mut self, value: u32, size: Size) {
        let sr = set_condition_codes(
            self.sr(),
            0,
            0,
            value,
            size,
            Operation::Other,
            StatusFlags::CVZN,
        );
        self.set_sr(sr);
    }

    pub(super) fn op_add_sub(&mut self, opcode: u16, sub: bool) -> ExecResult {
        let size = size_field(opcode)?;
        let dn = D0 + reg_field(opcode);
        let name = if sub { "SUB" } else { "ADD" };
        let ea = self.effective_address(ea_field(opcode), size)?;

        if opcode & 0x100 == 0 {
            let src = self.read_ea(&ea, size)?;
            let dest = self.regs[dn] & size.mask();
            let result = self.add_sub_flags(src, dest, size, sub);
            self.set_register(dn, result, size);
            self.mnemonic(format_args!("{}{} {},D{}", name, size.suffix(), ea.text, dn - D0));
        } else {
            let src = self.regs[dn] & size.mask();
            let dest = self.read_ea(&ea, size)?;
            let result = self.add_sub_flags(src, dest, size, sub);
            self.write_ea(&ea, size, result)?;
            self.mnemonic(format_args!("{}{} D{},{}", name, size.suffix(), dn - D0, ea.text));
        }
        Ok(Completion::Ok)
    }

    pub(super) fn op_adda_suba(&mut self, opcode: u16, sub: bool) -> ExecResult {
        let size = if opcode & 0x100 != 0 { Size::Long } else { Size::Word };
        let an = self.address_slot(reg_field(opcode));
        let ea = self.effective_address(ea_field(opcode), size)?;
        let src = size.sign_extend(self.read_ea(&ea, size)?);
        self.regs[an] = if sub {
            self.regs[an].wrapping_sub(src)
        } else {
            self.regs[an].wrapping_add(src)
        };
        self.mnemonic(format_args!(
            "{}{} {},A{}",
            if sub { "SUBA" } else { "ADDA" },
            size.suffix(),
            ea.text,
            reg_field(opcode)
        ));
        Ok(Completion::Ok)
    }

    pub(super) fn op_addi_subi(&mut self, opcode: u16, sub: bool) -> ExecResult {
        let size = size_field(opcode)?;
        let (src, imm) = self.immediate(size)?;
        let ea = self.effective_address(ea_field(opcode), size)?;
        let dest = self.read_ea(&ea, size)?;
        let result = self.add_sub_flags(src, dest, size, sub);
        self.write_ea(&ea, size, result)?;
        self.mnemonic(format_args!(
            "{}{} {},{}",
            if sub { "SUBI" } else { "ADDI" },
            size.suffix(),
            imm,
            ea.text
        ));
        Ok(Completion::Ok)
    }

    pub(super) fn op_addq_subq(&mut self, opcode: u16, sub: bool) -> ExecResult {
        let data = match reg_field(opcode) as u32 {
            0 => 8,
            n => n,
        };
        let name = if sub { "SUBQ" } else { "ADDQ" };
        let size = size_field(opcode)?;

        // Address register destinations work on the whole register and
        // leave the flags alone.
        if (opcode >> 3) & 7 == 1 {
            let an = self.address_slot((opcode & 7) as usize);
            self.regs[an] = if sub {
                self.regs[an].wrapping_sub(data)
            } else {
                self.regs[an].wrapping_add(data)
            };
            self.mnemonic(format_args!("{}{} #{},A{}", name, size.suffix(), data, opcode & 7));
            return Ok(Completion::Ok);
        }

        let ea = self.effective_address(ea_field(opcode), size)?;
        let dest = self.read_ea(&ea, size)?;
        let result = self.add_sub_flags(data, dest, size, sub);
        self.write_ea(&ea, size, result)?;
        self.mnemonic(format_args!("{}{} #{},{}", name, size.suffix(), data, ea.text));
        Ok(Completion::Ok)
    }

    /// Source and destination of ADDX/SUBX/ABCD/SBCD: `Dy,Dx` or `-(Ay),-(Ax)`.
    pub(super) fn extended_operands(
        &mut self,
        opcode: u16,
        size: Size,
    ) -> Result<(Ea, Ea), Fault> {
        let rx = reg_field(opcode) as u16;
        let ry = opcode & 7;
        if opcode & 0x8 == 0 {
            let src = self.effective_address(ry, size)?;
            let dest = self.effective_address(rx, size)?;
            Ok((src, dest))
        } else {
            let src = self.effective_address(0x20 | ry, size)?;
            let dest = self.effective_address(0x20 | rx, size)?;
            Ok((src, dest))
        }
    }

    /// Z is only ever cleared by a non-zero result, so multi-precision
    /// chains test the whole value.
    pub(super) fn sticky_zero(&mut self, before: StatusFlags, result: u32, size: Size) {
        let mut sr = self.sr();
        let zero = before.contains(StatusFlags::Z) && result & size.mask() == 0;
        sr.set(StatusFlags::Z, zero);
        self.set_sr(sr);
    }

    pub(super) fn op_addx_subx(&mut self, opcode: u16, sub: bool) -> ExecResult {
        let size = size_field(opcode)?;
        let (src_ea, dest_ea) = self.extended_operands(opcode, size)?;
        let src = self.read_ea(&src_ea, size)?;
        let dest = self.read_ea(&dest_ea, size)?;
        let x = self.sr().contains(StatusFlags::X) as u32;
        let before = self.sr();

        let (result, op) = if sub {
            (dest.wrapping_sub(src).wrapping_sub(x), Operation::Sub)
        } else {
            (dest.wrapping_add(src).wrapping_add(x), Operation::Add)
        };
        let sr = set_condition_codes(before, src, dest, result, size, op, StatusFlags::CCR);
        self.set_sr(sr);
        self.sticky_zero(before, result, size);
        self.write_ea(&dest_ea, size, result & size.mask())?;

        self.mnemonic(format_args!(
            "{}{} {},{}",
            if sub { "SUBX" } else { "ADDX" },
            size.suffix(),
            src_ea.text,
            dest_ea.text
        ));
        Ok(Completion::Ok)
    }

    pub(super) fn op_cmp(&mut self, opcode: u16) -> ExecResult {
        let size = size_field(opcode)?;
        let dn = D0 + reg_field(opcode);
        let ea = self.effective_address(ea_field(opcode), size)?;
        let src = self.read_ea(&ea, size)?;
        self.compare(src, self.regs[dn] & size.mask(), size);
        self.mnemonic(format_args!("CMP{} {},D{}", size.suffix(), ea.text, dn - D0));
        Ok(Completion::Ok)
    }

    pub(super) fn op_cmpa(&mut self, opcode: u16) -> ExecResult {
        let size = if opcode & 0x100 != 0 { Size::Long } else { Size::Word };
        let an = self.address_slot(reg_field(opcode));
        let ea = self.effective_address(ea_field(opcode), size)?;
        let src = size.sign_extend(self.read_ea(&ea, size)?);
        self.compare(src, self.regs[an], Size::Long);
        self.mnemonic(format_args!("CMPA{} {},A{}", size.suffix(), ea.text, reg_field(opcode)));
        Ok(Completion::Ok)
    }

    pub(super) fn op_cmpi(&mut self, opcode: u16) -> ExecResult {
        let size = size_field(opcode)?;
        let (src, imm) = self.immediate(size)?;
        let ea = self.effective_address(ea_field(opcode), size)?;
        let dest = self.read_ea(&ea, size)?;
        self.compare(src, dest, size);
        self.mnemonic(format_args!("CMPI{} {},{}", size.suffix(), imm, ea.text));
        Ok(Completion::Ok)
    }

    pub(super) fn op_cmpm(&mut self, opcode: u16) -> ExecResult {
        let size = size_field(opcode)?;
        let src_ea = self.effective_address(0x18 | (opcode & 7), size)?;
        let dest_ea = self.effective_address(0x18 | reg_field(opcode) as u16, size)?;
        let src = self.read_ea(&src_ea, size)?;
        let dest = self.read_ea(&dest_ea, size)?;
        self.compare(src, dest, size);
        self.mnemonic(format_args!("CMPM{} {},{}", size.suffix(), src_ea.text, dest_ea.text));
        Ok(Completion::Ok)
    }

    pub(super) fn op_neg(&mut self, opcode: u16) -> ExecResult {
        let size = size_field(opcode)?;
        let ea = self.effective_address(ea_field(opcode), size)?;
        let dest = self.read_ea(&ea, size)?;
        let result = self.add_sub_flags(dest, 0, size, true);
        self.write_ea(&ea, size, result)?;
        self.mnemonic(format_args!("NEG{} {}", size.suffix(), ea.text));
        Ok(Completion::Ok)
    }

    pub(super) fn op_negx(&mut self, opcode: u16) -> ExecResult {
        let size = size_field(opcode)?;
        let ea = self.effective_address(ea_field(opcode), size)?;
        let dest = self.read_ea(&ea, size)?;
        let before = self.sr();
        let x = before.contains(StatusFlags::X) as u32;
        let result = 0u32.wrapping_sub(dest).wrapping_sub(x);
        let sr = set_condition_codes(before, dest, 0, result, size, Operation::Sub, StatusFlags::CCR);
        self.set_sr(sr);
        self.sticky_zero(before, result, size);
        self.write_ea(&ea, size, result & size.mask())?;
        self.mnemonic(format_args!("NEGX{} {}", size.suffix(), ea.text));
        Ok(Completion::Ok)
    }

    pub(super) fn op_clr(&mut self, opcode: u16) -> ExecResult {
        let size = size_field(opcode)?;
        let ea = self.effective_address(ea_field(opcode), size)?;
        self.write_ea(&ea, size, 0)?;
        self.logical_flags(0, size);
        self.mnemonic(format_args!("CLR{} {}", size.suffix(), ea.text));
        Ok(Completion::Ok)
    }

    pub(super) fn op_tst(&mut self, opcode: u16) -> ExecResult {
        let size = size_field(opcode)?;
        let ea = self.effective_address(ea_field(opcode), size)?;
        let value = self.read_ea(&ea, size)?;
        self.logical_flags(value, size);
        self.mnemonic(format_args!("TST{} {}", size.suffix(), ea.text));
        Ok(Completion::Ok)
    }

    pub(super) fn op_ext(&mut self, opcode: u16) -> ExecResult {
        let dn = D0 + (opcode & 7) as usize;
        let (from, to, name) = match (opcode >> 6) & 7 {
            2 => (Size::Byte, Size::Word, "EXT.W"),
            3 => (Size::Word, Size::Long, "EXT.L"),
            7 => (Size::Byte, Size::Long, "EXTB.L"),
            _ => return Err(Fault::IllegalInstruction),
        };
        let value = from.sign_extend(self.regs[dn]);
        self.set_register(dn, value, to);
        self.logical_flags(value, to);
        self.mnemonic(format_args!("{} D{}", name, dn - D0));
        Ok(Completion::Ok)
    }

    pub(super) fn op_chk(&mut self, opcode: u16) -> ExecResult {
        let size = if opcode & 0x80 != 0 { Size::Word } else { Size::Long };
        let dn = D0 + reg_field(opcode);
        let ea = self.effective_address(ea_field(opcode), size)?;
        let bound = size.sign_extend(self.read_ea(&ea, size)?) as i32;
        let value = size.sign_extend(self.regs[dn]) as i32;
        self.mnemonic(format_args!("CHK{} {},D{}", size.suffix(), ea.text, dn - D0));

        let below = value < 0;
        if below || value > bound {
            let mut sr = self.sr();
            sr.set(StatusFlags::N, below);
            self.set_sr(sr);
            self.process_exception(CHK_VECTOR)?;
        }
        Ok(Completion::Ok)
    }
}
