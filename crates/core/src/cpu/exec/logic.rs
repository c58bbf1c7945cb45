// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use super::{ea_field, reg_field, size_field};
use crate::cpu::{
    condition_name, test_condition, Completion, ExecResult, M68k, Size, StatusFlags, D0, SR,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Logic {
    And,
    Or,
    Eor,
}

impl Logic {
    fn apply(self, a: u32, b: u32) -> u32 {
        match self {
            Logic::And => a & b,
            Logic::Or => a | b,
            Logic::Eor => a ^ b,
        }
    }

    fn name(self) -> &'static str {
        match self {
            Logic::And => "AND",
            Logic::Or => "OR",
            Logic::Eor => "EOR",
        }
    }
}

impl M68k {
    /// AND/OR with a data register on either side, and EOR Dn,<ea>.
    pub(super) fn op_logic(&mut self, opcode: u16, logic: Logic) -> ExecResult {
        let size = size_field(opcode)?;
        let dn = D0 + reg_field(opcode);
        let ea = self.effective_address(ea_field(opcode), size)?;
        let operand = self.read_ea(&ea, size)?;
        let register = self.regs[dn] & size.mask();
        let result = logic.apply(operand, register);
        self.logical_flags(result, size);

        if opcode & 0x100 == 0 {
            self.set_register(dn, result, size);
            self.mnemonic(format_args!(
                "{}{} {},D{}",
                logic.name(),
                size.suffix(),
                ea.text,
                dn - D0
            ));
        } else {
            self.write_ea(&ea, size, result)?;
            self.mnemonic(format_args!(
                "{}{} D{},{}",
                logic.name(),
                size.suffix(),
                dn - D0,
                ea.text
            ));
        }
        Ok(Completion::Ok)
    }

    pub(super) fn op_logic_immediate(&mut self, opcode: u16, logic: Logic) -> ExecResult {
        let size = size_field(opcode)?;
        let (imm, imm_text) = self.immediate(size)?;
        let ea = self.effective_address(ea_field(opcode), size)?;
        let value = self.read_ea(&ea, size)?;
        let result = logic.apply(value, imm);
        self.logical_flags(result, size);
        self.write_ea(&ea, size, result)?;
        self.mnemonic(format_args!(
            "{}I{} {},{}",
            logic.name(),
            size.suffix(),
            imm_text,
            ea.text
        ));
        Ok(Completion::Ok)
    }

    pub(super) fn op_logic_ccr(&mut self, logic: Logic) -> ExecResult {
        let (imm, imm_text) = self.immediate(Size::Byte)?;
        let sr = self.sr().bits() as u32;
        let ccr = logic.apply(sr & 0xff, imm) & StatusFlags::CCR.bits() as u32;
        self.regs[SR] = (sr & 0xff00) | ccr;
        self.mnemonic(format_args!("{}I.B {},CCR", logic.name(), imm_text));
        Ok(Completion::Ok)
    }

    pub(super) fn op_logic_sr(&mut self, logic: Logic) -> ExecResult {
        if !self.supervisor() {
            return self.privilege_violation();
        }
        let (imm, imm_text) = self.immediate(Size::Word)?;
        let sr = logic.apply(self.sr().bits() as u32, imm) as u16;
        self.set_sr(StatusFlags::from_bits_retain(sr));
        self.mnemonic(format_args!("{}I.W {},SR", logic.name(), imm_text));
        Ok(Completion::Privileged)
    }

    pub(super) fn op_not(&mut self, opcode: u16) -> ExecResult {
        let size = size_field(opcode)?;
        let ea = self.effective_address(ea_field(opcode), size)?;
        let result = !self.read_ea(&ea, size)? & size.mask();
        self.logical_flags(result, size);
        self.write_ea(&ea, size, result)?;
        self.mnemonic(format_args!("NOT{} {}", size.suffix(), ea.text));
        Ok(Completion::Ok)
    }

    /// Test a byte, then set its high bit.
    pub(super) fn op_tas(&mut self, opcode: u16) -> ExecResult {
        let ea = self.effective_address(ea_field(opcode), Size::Byte)?;
        let value = self.read_ea(&ea, Size::Byte)?;
        self.logical_flags(value, Size::Byte);
        self.write_ea(&ea, Size::Byte, value | 0x80)?;
        self.mnemonic(format_args!("TAS.B {}", ea.text));
        Ok(Completion::Ok)
    }

    pub(super) fn op_scc(&mut self, opcode: u16) -> ExecResult {
        let cond = (opcode >> 8) & 0xf;
        let ea = self.effective_address(ea_field(opcode), Size::Byte)?;
        let value = if test_condition(self.sr(), cond) { 0xff } else { 0 };
        self.write_ea(&ea, Size::Byte, value)?;
        self.mnemonic(format_args!("S{}.B {}", condition_name(cond), ea.text));
        Ok(Completion::Ok)
    }
}

#[cfg(test)]
mod tests {
    use crate::cpu::exec::test_support::*;
    use crate::cpu::{CpuModel, CpuState, Size, StatusFlags, A0, D0, SR};

    #[test]
    fn test_and_clears_v_and_c_keeps_x() {
        let mut cpu = cpu(CpuModel::M68000);
        cpu.regs[SR] |= (StatusFlags::X | StatusFlags::C | StatusFlags::V).bits() as u32;
        cpu.regs[D0] = 0xf0;
        cpu.regs[D0 + 1] = 0x8f;
        load(&mut cpu, &[0xc200]); // AND.B D0,D1
        run(&mut cpu, 1);
        assert_eq!(cpu.regs[D0 + 1], 0x80);
        assert_eq!(
            cpu.regs[SR] & 0x1f,
            (StatusFlags::X | StatusFlags::N).bits() as u32
        );
    }

    #[test]
    fn test_eori_to_memory() {
        let mut cpu = cpu(CpuModel::M68000);
        cpu.regs[A0] = 0x2000;
        cpu.write(0x2000, Size::Word, 0x00ff).unwrap();
        load(&mut cpu, &[0x0a50, 0x0fff]); // EORI.W #$0FFF,(A0)
        let record = trace(&mut cpu);
        assert!(record.contains("EORI.W #$0FFF,(A0)"), "{}", record);
        assert_eq!(cpu.read(0x2000, Size::Word).unwrap(), 0x0f00);
        assert_eq!(cpu.pc(), CODE + 4);
    }

    #[test]
    fn test_ori_to_sr_requires_supervisor() {
        let mut cpu = cpu(CpuModel::M68000);
        user_mode(&mut cpu);
        cpu.regs[crate::cpu::USP] = 0x6000;
        load(&mut cpu, &[0x007c, 0x0700]); // ORI.W #$0700,SR
        let record = trace(&mut cpu);
        assert!(record.contains("Privilege Violation Exception"));
        assert_eq!(cpu.pc(), handler(8));
        // stacked PC is the faulting instruction
        assert_eq!(cpu.read(ssp(&cpu) + 2, Size::Long).unwrap(), CODE);
        assert_eq!(cpu.state(), CpuState::Normal);
    }

    #[test]
    fn test_andi_to_ccr() {
        let mut cpu = cpu(CpuModel::M68000);
        cpu.regs[SR] |= 0x1f;
        load(&mut cpu, &[0x023c, 0x0004]); // ANDI.B #4,CCR
        run(&mut cpu, 1);
        assert_eq!(cpu.regs[SR], 0x2704);
    }

    #[test]
    fn test_tas_and_scc() {
        let mut cpu = cpu(CpuModel::M68000);
        cpu.regs[D0] = 0x01;
        load(&mut cpu, &[0x4ac0, 0x57c1]); // TAS D0; SEQ D1
        run(&mut cpu, 2);
        assert_eq!(cpu.regs[D0], 0x81);
        assert_eq!(cpu.regs[D0 + 1] & 0xff, 0);
        cpu.regs[SR] |= StatusFlags::Z.bits() as u32;
        load(&mut cpu, &[0x57c1]);
        run(&mut cpu, 1);
        assert_eq!(cpu.regs[D0 + 1] & 0xff, 0xff);
    }
}
