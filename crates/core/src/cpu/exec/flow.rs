// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use super::ea_field;
use crate::cpu::m68k::{TRAPV_VECTOR, TRAP_BASE_VECTOR};
use crate::cpu::{
    condition_name, test_condition, Completion, CpuState, ExecResult, Fault, M68k, Size,
    StatusFlags, D0, PC, SR, SSP,
};

impl M68k {
    /// BRA, BSR and Bcc. Displacements are relative to the address after
    /// the opcode word.
    pub(super) fn op_branch(&mut self, opcode: u16) -> ExecResult {
        let base = self.instruction_pc.wrapping_add(2);
        let disp = match opcode & 0xff {
            0 => Size::Word.sign_extend(self.fetch_word()? as u32),
            0xff if self.model.is_cpu32() => self.fetch_long()?,
            byte => Size::Byte.sign_extend(byte as u32),
        };
        let target = base.wrapping_add(disp);
        let cond = (opcode >> 8) & 0xf;

        match cond {
            0 => {
                self.regs[PC] = target;
                self.mnemonic(format_args!("BRA ${:08X}", target));
            }
            1 => {
                self.push(Size::Long, self.regs[PC])?;
                self.regs[PC] = target;
                self.mnemonic(format_args!("BSR ${:08X}", target));
            }
            _ => {
                if test_condition(self.sr(), cond) {
                    self.regs[PC] = target;
                }
                self.mnemonic(format_args!("B{} ${:08X}", condition_name(cond), target));
            }
        }
        Ok(Completion::Ok)
    }

    /// Decrement and branch until the condition holds or the counter
    /// wraps to -1.
    pub(super) fn op_dbcc(&mut self, opcode: u16) -> ExecResult {
        let base = self.instruction_pc.wrapping_add(2);
        let disp = Size::Word.sign_extend(self.fetch_word()? as u32);
        let target = base.wrapping_add(disp);
        let cond = (opcode >> 8) & 0xf;
        let dn = D0 + (opcode & 7) as usize;

        if !test_condition(self.sr(), cond) {
            let count = (self.regs[dn] as u16).wrapping_sub(1);
            self.set_register(dn, count as u32, Size::Word);
            if count != 0xffff {
                self.regs[PC] = target;
            }
        }
        self.mnemonic(format_args!(
            "DB{} D{},${:08X}",
            condition_name(cond),
            dn - D0,
            target
        ));
        Ok(Completion::Ok)
    }

    pub(super) fn op_jump(&mut self, opcode: u16, subroutine: bool) -> ExecResult {
        let ea = self.effective_address(ea_field(opcode), Size::Long)?;
        let target = ea.address().ok_or(Fault::IllegalInstruction)?;
        if subroutine {
            self.push(Size::Long, self.regs[PC])?;
        }
        self.regs[PC] = target;
        self.mnemonic(format_args!(
            "{} {}",
            if subroutine { "JSR" } else { "JMP" },
            ea.text
        ));
        Ok(Completion::Ok)
    }

    pub(super) fn op_rts(&mut self) -> ExecResult {
        self.regs[PC] = self.pop(Size::Long)?;
        self.mnemonic(format_args!("RTS"));
        Ok(Completion::Ok)
    }

    pub(super) fn op_rtr(&mut self) -> ExecResult {
        let ccr = self.pop(Size::Word)? & StatusFlags::CCR.bits() as u32;
        self.regs[SR] = (self.regs[SR] & 0xff00) | ccr;
        self.regs[PC] = self.pop(Size::Long)?;
        self.mnemonic(format_args!("RTR"));
        Ok(Completion::Ok)
    }

    /// Unstack SR and PC (and the CPU32 format word) from the supervisor
    /// stack. The whole frame is read before SR changes, since the restored
    /// SR may select the user stack.
    pub(super) fn op_rte(&mut self) -> ExecResult {
        if !self.supervisor() {
            return self.privilege_violation();
        }
        let sp = self.regs[SSP];
        let sr = self.read(sp, Size::Word)?;
        let pc = self.read(sp.wrapping_add(2), Size::Long)?;
        let frame = if self.model.is_cpu32() {
            self.read(sp.wrapping_add(6), Size::Word)?;
            8
        } else {
            6
        };
        self.regs[SSP] = sp.wrapping_add(frame);
        self.regs[PC] = pc;
        self.regs[SR] = sr;
        self.mnemonic(format_args!("RTE"));
        Ok(Completion::Privileged)
    }

    pub(super) fn op_rtd(&mut self) -> ExecResult {
        let disp = Size::Word.sign_extend(self.fetch_word()? as u32);
        let pc = self.pop(Size::Long)?;
        let sp = self.address_slot(7);
        self.regs[sp] = self.regs[sp].wrapping_add(disp);
        self.regs[PC] = pc;
        self.mnemonic(format_args!("RTD #${:X}", disp as u16));
        Ok(Completion::Ok)
    }

    pub(super) fn op_trap(&mut self, opcode: u16) -> ExecResult {
        let n = (opcode & 0xf) as u32;
        self.mnemonic(format_args!("TRAP #{}", n));
        self.process_exception(TRAP_BASE_VECTOR + n)?;
        Ok(Completion::Ok)
    }

    pub(super) fn op_trapv(&mut self) -> ExecResult {
        self.mnemonic(format_args!("TRAPV"));
        if self.sr().contains(StatusFlags::V) {
            self.process_exception(TRAPV_VECTOR)?;
        }
        Ok(Completion::Ok)
    }

    /// Load SR and wait for an interrupt.
    pub(super) fn op_stop(&mut self) -> ExecResult {
        if !self.supervisor() {
            return self.privilege_violation();
        }
        let sr = self.fetch_word()?;
        self.regs[SR] = sr as u32;
        self.state = CpuState::Stopped;
        self.mnemonic(format_args!("STOP #${:04X}", sr));
        Ok(Completion::Privileged)
    }

    pub(super) fn op_reset(&mut self) -> ExecResult {
        if !self.supervisor() {
            return self.privilege_violation();
        }
        self.reset_devices();
        self.mnemonic(format_args!("RESET"));
        Ok(Completion::Privileged)
    }

    pub(super) fn op_break(&mut self) -> ExecResult {
        self.state = CpuState::Break;
        self.mnemonic(format_args!("BREAK"));
        Ok(Completion::Ok)
    }
}

#[cfg(test)]
mod tests {
    use crate::cpu::exec::test_support::*;
    use crate::cpu::{CpuModel, CpuState, Size, StatusFlags, StepStatus, D0, SR, USP};

    #[test]
    fn test_branch_displacements() {
        let mut cpu = cpu(CpuModel::M68000);
        load(&mut cpu, &[0x6006]); // BRA.S *+8
        let record = trace(&mut cpu);
        assert_eq!(
            record,
            "{InstructionAddress 00001000} {Mnemonic {BRA $00001008}} "
        );
        assert_eq!(cpu.pc(), CODE + 8);

        load(&mut cpu, &[0x6000, 0xfffe]); // BRA.W to itself
        run(&mut cpu, 1);
        assert_eq!(cpu.pc(), CODE);
    }

    #[test]
    fn test_long_branch_only_on_cpu32() {
        let mut cpu = cpu(CpuModel::Cpu32);
        load(&mut cpu, &[0x60ff, 0x0000, 0x0100]);
        run(&mut cpu, 1);
        assert_eq!(cpu.pc(), CODE + 2 + 0x100);

        let mut cpu = crate::cpu::exec::test_support::cpu(CpuModel::M68000);
        load(&mut cpu, &[0x60ff]);
        run(&mut cpu, 1);
        assert_eq!(cpu.pc(), CODE + 2 - 1);
    }

    #[test]
    fn test_conditional_branch() {
        let mut cpu = cpu(CpuModel::M68000);
        load(&mut cpu, &[0x6704]); // BEQ.S
        run(&mut cpu, 1);
        assert_eq!(cpu.pc(), CODE + 2);

        cpu.regs[SR] |= StatusFlags::Z.bits() as u32;
        load(&mut cpu, &[0x6704]);
        run(&mut cpu, 1);
        assert_eq!(cpu.pc(), CODE + 6);
    }

    #[test]
    fn test_bsr_rts() {
        let mut cpu = cpu(CpuModel::M68000);
        // BSR.W +$10; ... at CODE+$12: RTS
        load(&mut cpu, &[0x6100, 0x0010]);
        cpu.write(CODE + 0x12, Size::Word, 0x4e75).unwrap();
        run(&mut cpu, 1);
        assert_eq!(cpu.pc(), CODE + 0x12);
        assert_eq!(cpu.read(ssp(&cpu), Size::Long).unwrap(), CODE + 4);
        run(&mut cpu, 1);
        assert_eq!(cpu.pc(), CODE + 4);
        assert_eq!(ssp(&cpu), STACK);
    }

    #[test]
    fn test_dbra_loop_counts_down() {
        let mut cpu = cpu(CpuModel::M68000);
        cpu.regs[D0] = 0xaaaa_0002;
        load(&mut cpu, &[0x51c8, 0xfffe]); // DBRA D0,* (loops on itself)
        run(&mut cpu, 2);
        assert_eq!(cpu.pc(), CODE);
        assert_eq!(cpu.regs[D0], 0xaaaa_0000);
        run(&mut cpu, 1);
        assert_eq!(cpu.regs[D0], 0xaaaa_ffff);
        assert_eq!(cpu.pc(), CODE + 4);
    }

    #[test]
    fn test_trap_and_rte_68000() {
        let mut cpu = cpu(CpuModel::M68000);
        cpu.write(handler(35), Size::Word, 0x4e73).unwrap(); // RTE
        load(&mut cpu, &[0x4e43]); // TRAP #3
        run(&mut cpu, 1);
        assert_eq!(cpu.pc(), handler(35));
        assert_eq!(ssp(&cpu), STACK - 6);
        run(&mut cpu, 1);
        assert_eq!(cpu.pc(), CODE + 2);
        assert_eq!(ssp(&cpu), STACK);
    }

    #[test]
    fn test_rte_to_user_mode_on_cpu32() {
        let mut cpu = cpu(CpuModel::Cpu32);
        cpu.regs[USP] = 0x6000;
        cpu.write(handler(32), Size::Word, 0x4e73).unwrap();
        // MOVE #$0000,SR puts us in user mode; TRAP #0 returns there.
        load(&mut cpu, &[0x46fc, 0x0000, 0x4e40]);
        run(&mut cpu, 2);
        assert_eq!(ssp(&cpu), STACK - 8);
        assert_eq!(cpu.read(STACK - 2, Size::Word).unwrap(), 32 * 4);
        run(&mut cpu, 1);
        assert_eq!(cpu.pc(), CODE + 6);
        assert_eq!(cpu.regs[SR] & 0x2000, 0);
        assert_eq!(ssp(&cpu), STACK);
    }

    #[test]
    fn test_trapv_only_with_overflow() {
        let mut cpu = cpu(CpuModel::M68000);
        load(&mut cpu, &[0x4e76]);
        run(&mut cpu, 1);
        assert_eq!(cpu.pc(), CODE + 2);
        cpu.regs[SR] |= StatusFlags::V.bits() as u32;
        load(&mut cpu, &[0x4e76]);
        run(&mut cpu, 1);
        assert_eq!(cpu.pc(), handler(7));
    }

    #[test]
    fn test_stop_then_stays_stopped() {
        let mut cpu = cpu(CpuModel::M68000);
        load(&mut cpu, &[0x4e72, 0x2000]); // STOP #$2000
        run(&mut cpu, 1);
        assert_eq!(cpu.state(), CpuState::Stopped);
        assert_eq!(cpu.regs[SR], 0x2000);
        let record = trace(&mut cpu);
        assert_eq!(
            record,
            "{InstructionAddress 00001004} {Mnemonic {CPU is stopped}} "
        );
    }

    #[test]
    fn test_stop_in_user_mode_is_privilege_violation() {
        let mut cpu = cpu(CpuModel::M68000);
        user_mode(&mut cpu);
        load(&mut cpu, &[0x4e72, 0x2000]);
        run(&mut cpu, 1);
        assert_eq!(cpu.state(), CpuState::Normal);
        assert_eq!(cpu.pc(), handler(8));
    }

    #[test]
    fn test_break_reports_once() {
        let mut cpu = cpu(CpuModel::M68000);
        load(&mut cpu, &[0x4848, 0x4e71]);
        assert_eq!(cpu.step(), StepStatus::Break);
        assert_eq!(cpu.state(), CpuState::Normal);
        assert_eq!(cpu.step(), StepStatus::Ok);
    }
}
