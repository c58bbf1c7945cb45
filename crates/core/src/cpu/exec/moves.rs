// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use super::{ea_field, reg_field, size_field};
use crate::cpu::{
    Completion, ExecResult, Fault, M68k, Size, StatusFlags, D0, DFC, REGISTER_DATA, SFC, SR, USP,
    VBR,
};

impl M68k {
    /// Register-file slot for entry `i` of a MOVEM list (D0..D7, A0..A7).
    fn movem_slot(&self, i: usize) -> usize {
        if i < 8 {
            D0 + i
        } else {
            self.address_slot(i - 8)
        }
    }

    pub(super) fn op_move(&mut self, opcode: u16) -> ExecResult {
        let size = match (opcode >> 12) & 3 {
            1 => Size::Byte,
            3 => Size::Word,
            2 => Size::Long,
            _ => return Err(Fault::IllegalInstruction),
        };
        let src = self.effective_address(ea_field(opcode), size)?;
        let value = self.read_ea(&src, size)?;
        let dest_field = ((opcode >> 3) & 0x38) | ((opcode >> 9) & 7);
        let dest = self.effective_address(dest_field, size)?;
        self.write_ea(&dest, size, value)?;
        self.logical_flags(value, size);
        self.mnemonic(format_args!("MOVE{} {},{}", size.suffix(), src.text, dest.text));
        Ok(Completion::Ok)
    }

    pub(super) fn op_movea(&mut self, opcode: u16) -> ExecResult {
        let size = if (opcode >> 12) & 3 == 3 { Size::Word } else { Size::Long };
        let src = self.effective_address(ea_field(opcode), size)?;
        let value = size.sign_extend(self.read_ea(&src, size)?);
        let an = self.address_slot(reg_field(opcode));
        self.regs[an] = value;
        self.mnemonic(format_args!(
            "MOVEA{} {},{}",
            size.suffix(),
            src.text,
            REGISTER_DATA[an].name
        ));
        Ok(Completion::Ok)
    }

    pub(super) fn op_moveq(&mut self, opcode: u16) -> ExecResult {
        let value = Size::Byte.sign_extend(opcode as u32);
        let dn = D0 + reg_field(opcode);
        self.regs[dn] = value;
        self.logical_flags(value, Size::Long);
        self.mnemonic(format_args!("MOVEQ #${:02X},D{}", opcode & 0xff, dn - D0));
        Ok(Completion::Ok)
    }

    /// MOVEM in both directions. The register mask is reversed for the
    /// pre-decrement form.
    pub(super) fn op_movem(&mut self, opcode: u16) -> ExecResult {
        let size = if opcode & 0x40 != 0 { Size::Long } else { Size::Word };
        let to_registers = opcode & 0x400 != 0;
        let mask = self.fetch_word()?;
        let mode = (opcode >> 3) & 7;
        let reg = (opcode & 7) as usize;

        let (mut address, ea_text) = match mode {
            3 | 4 => {
                let slot = self.address_slot(reg);
                let text = format!(
                    "{}({}){}",
                    if mode == 4 { "-" } else { "" },
                    REGISTER_DATA[slot].name,
                    if mode == 3 { "+" } else { "" }
                );
                (self.regs[slot], text)
            }
            _ => {
                let ea = self.effective_address(ea_field(opcode), size)?;
                let address = ea.address().ok_or(Fault::IllegalInstruction)?;
                (address, ea.text)
            }
        };

        if mode == 4 {
            // Bit 0 of the mask is A7, bit 15 is D0.
            for i in (0..16).rev() {
                if mask & (1 << (15 - i)) != 0 {
                    address = address.wrapping_sub(size.bytes());
                    let value = self.regs[self.movem_slot(i)];
                    self.write(address, size, value)?;
                }
            }
            let slot = self.address_slot(reg);
            self.regs[slot] = address;
        } else if to_registers {
            for i in 0..16 {
                if mask & (1 << i) != 0 {
                    let value = size.sign_extend(self.read(address, size)?);
                    let slot = self.movem_slot(i);
                    self.regs[slot] = value;
                    address = address.wrapping_add(size.bytes());
                }
            }
            if mode == 3 {
                let slot = self.address_slot(reg);
                self.regs[slot] = address;
            }
        } else {
            for i in 0..16 {
                if mask & (1 << i) != 0 {
                    let value = self.regs[self.movem_slot(i)];
                    self.write(address, size, value)?;
                    address = address.wrapping_add(size.bytes());
                }
            }
        }

        if to_registers {
            self.mnemonic(format_args!("MOVEM{} {},#${:04X}", size.suffix(), ea_text, mask));
        } else {
            self.mnemonic(format_args!("MOVEM{} #${:04X},{}", size.suffix(), mask, ea_text));
        }
        Ok(Completion::Ok)
    }

    /// Transfer between a data register and alternate bytes of memory.
    pub(super) fn op_movep(&mut self, opcode: u16) -> ExecResult {
        let dn = D0 + reg_field(opcode);
        let an = self.address_slot((opcode & 7) as usize);
        let disp = self.fetch_word()?;
        let mut address = self.regs[an].wrapping_add(Size::Word.sign_extend(disp as u32));
        let opmode = (opcode >> 6) & 7;
        let size = if opmode & 1 != 0 { Size::Long } else { Size::Word };
        let bytes = size.bytes();

        if opmode & 2 == 0 {
            let mut value = 0u32;
            for _ in 0..bytes {
                value = (value << 8) | self.read(address, Size::Byte)?;
                address = address.wrapping_add(2);
            }
            self.set_register(dn, value, size);
            self.mnemonic(format_args!(
                "MOVEP{} (${:04X},{}),D{}",
                size.suffix(),
                disp,
                REGISTER_DATA[an].name,
                dn - D0
            ));
        } else {
            let value = self.regs[dn];
            for i in (0..bytes).rev() {
                self.write(address, Size::Byte, (value >> (8 * i)) & 0xff)?;
                address = address.wrapping_add(2);
            }
            self.mnemonic(format_args!(
                "MOVEP{} D{},(${:04X},{})",
                size.suffix(),
                dn - D0,
                disp,
                REGISTER_DATA[an].name
            ));
        }
        Ok(Completion::Ok)
    }

    pub(super) fn op_lea(&mut self, opcode: u16) -> ExecResult {
        let ea = self.effective_address(ea_field(opcode), Size::Long)?;
        let address = ea.address().ok_or(Fault::IllegalInstruction)?;
        let an = self.address_slot(reg_field(opcode));
        self.regs[an] = address;
        self.mnemonic(format_args!("LEA {},{}", ea.text, REGISTER_DATA[an].name));
        Ok(Completion::Ok)
    }

    pub(super) fn op_pea(&mut self, opcode: u16) -> ExecResult {
        let ea = self.effective_address(ea_field(opcode), Size::Long)?;
        let address = ea.address().ok_or(Fault::IllegalInstruction)?;
        self.push(Size::Long, address)?;
        self.mnemonic(format_args!("PEA {}", ea.text));
        Ok(Completion::Ok)
    }

    pub(super) fn op_exg(&mut self, opcode: u16) -> ExecResult {
        let rx = reg_field(opcode);
        let ry = (opcode & 7) as usize;
        let (x, y) = match (opcode >> 3) & 0x1f {
            0x08 => (D0 + rx, D0 + ry),
            0x09 => (self.address_slot(rx), self.address_slot(ry)),
            0x11 => (D0 + rx, self.address_slot(ry)),
            _ => return Err(Fault::IllegalInstruction),
        };
        self.regs.swap(x, y);
        self.mnemonic(format_args!(
            "EXG {},{}",
            REGISTER_DATA[x].name,
            REGISTER_DATA[y].name
        ));
        Ok(Completion::Ok)
    }

    pub(super) fn op_swap(&mut self, opcode: u16) -> ExecResult {
        let dn = D0 + (opcode & 7) as usize;
        let value = self.regs[dn].rotate_left(16);
        self.regs[dn] = value;
        self.logical_flags(value, Size::Long);
        self.mnemonic(format_args!("SWAP D{}", dn - D0));
        Ok(Completion::Ok)
    }

    pub(super) fn op_link(&mut self, opcode: u16, size: Size) -> ExecResult {
        let an = self.address_slot((opcode & 7) as usize);
        let disp = match size {
            Size::Long => self.fetch_long()?,
            _ => Size::Word.sign_extend(self.fetch_word()? as u32),
        };
        self.push(Size::Long, self.regs[an])?;
        let sp = self.address_slot(7);
        self.regs[an] = self.regs[sp];
        self.regs[sp] = self.regs[sp].wrapping_add(disp);
        self.mnemonic(format_args!(
            "LINK{} {},#${:X}",
            if size == Size::Long { ".L" } else { "" },
            REGISTER_DATA[an].name,
            disp
        ));
        Ok(Completion::Ok)
    }

    pub(super) fn op_unlk(&mut self, opcode: u16) -> ExecResult {
        let an = self.address_slot((opcode & 7) as usize);
        let sp = self.address_slot(7);
        self.regs[sp] = self.regs[an];
        self.regs[an] = self.pop(Size::Long)?;
        self.mnemonic(format_args!("UNLK {}", REGISTER_DATA[an].name));
        Ok(Completion::Ok)
    }

    /// Privileged on CPU32, open to user code on the 68000.
    pub(super) fn op_move_from_sr(&mut self, opcode: u16) -> ExecResult {
        if self.model.is_cpu32() && !self.supervisor() {
            return self.privilege_violation();
        }
        let ea = self.effective_address(ea_field(opcode), Size::Word)?;
        let sr = self.regs[SR];
        self.write_ea(&ea, Size::Word, sr)?;
        self.mnemonic(format_args!("MOVE.W SR,{}", ea.text));
        Ok(Completion::Ok)
    }

    pub(super) fn op_move_to_ccr(&mut self, opcode: u16) -> ExecResult {
        let ea = self.effective_address(ea_field(opcode), Size::Word)?;
        let value = self.read_ea(&ea, Size::Word)?;
        let ccr = value & StatusFlags::CCR.bits() as u32;
        self.regs[SR] = (self.regs[SR] & 0xff00) | ccr;
        self.mnemonic(format_args!("MOVE.W {},CCR", ea.text));
        Ok(Completion::Ok)
    }

    pub(super) fn op_move_to_sr(&mut self, opcode: u16) -> ExecResult {
        if !self.supervisor() {
            return self.privilege_violation();
        }
        let ea = self.effective_address(ea_field(opcode), Size::Word)?;
        let value = self.read_ea(&ea, Size::Word)?;
        self.regs[SR] = value;
        self.mnemonic(format_args!("MOVE.W {},SR", ea.text));
        Ok(Completion::Privileged)
    }

    pub(super) fn op_move_usp(&mut self, opcode: u16) -> ExecResult {
        if !self.supervisor() {
            return self.privilege_violation();
        }
        let an = self.address_slot((opcode & 7) as usize);
        if opcode & 0x8 != 0 {
            self.regs[an] = self.regs[USP];
            self.mnemonic(format_args!("MOVE.L USP,{}", REGISTER_DATA[an].name));
        } else {
            self.regs[USP] = self.regs[an];
            self.mnemonic(format_args!("MOVE.L {},USP", REGISTER_DATA[an].name));
        }
        Ok(Completion::Privileged)
    }

    /// General register named by bits 15-12 of a MOVEC/MOVES extension word.
    fn extension_register(&self, ext: u16) -> usize {
        let n = ((ext >> 12) & 7) as usize;
        if ext & 0x8000 != 0 {
            self.address_slot(n)
        } else {
            D0 + n
        }
    }

    pub(super) fn op_movec(&mut self, opcode: u16) -> ExecResult {
        if !self.supervisor() {
            return self.privilege_violation();
        }
        let ext = self.fetch_word()?;
        let general = self.extension_register(ext);
        let control = match ext & 0xfff {
            0x000 => SFC,
            0x001 => DFC,
            0x800 => USP,
            0x801 => VBR,
            _ => return Err(Fault::IllegalInstruction),
        };

        if opcode & 1 != 0 {
            self.regs[control] = self.regs[general] & REGISTER_DATA[control].mask;
            self.mnemonic(format_args!(
                "MOVEC {},{}",
                REGISTER_DATA[general].name,
                REGISTER_DATA[control].name
            ));
        } else {
            self.regs[general] = self.regs[control];
            self.mnemonic(format_args!(
                "MOVEC {},{}",
                REGISTER_DATA[control].name,
                REGISTER_DATA[general].name
            ));
        }
        Ok(Completion::Privileged)
    }

    /// MOVES: there is a single address space, so SFC/DFC do not redirect
    /// the access.
    pub(super) fn op_moves(&mut self, opcode: u16) -> ExecResult {
        if !self.supervisor() {
            return self.privilege_violation();
        }
        let size = size_field(opcode)?;
        let ext = self.fetch_word()?;
        let reg = self.extension_register(ext);
        let ea = self.effective_address(ea_field(opcode), size)?;

        if ext & 0x800 != 0 {
            let value = self.regs[reg];
            self.write_ea(&ea, size, value)?;
            self.mnemonic(format_args!(
                "MOVES{} {},{}",
                size.suffix(),
                REGISTER_DATA[reg].name,
                ea.text
            ));
        } else {
            let value = self.read_ea(&ea, size)?;
            if reg >= D0 + 8 {
                self.regs[reg] = size.sign_extend(value);
            } else {
                self.set_register(reg, value, size);
            }
            self.mnemonic(format_args!(
                "MOVES{} {},{}",
                size.suffix(),
                ea.text,
                REGISTER_DATA[reg].name
            ));
        }
        Ok(Completion::Privileged)
    }
}
