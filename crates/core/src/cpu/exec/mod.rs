// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! Instruction handlers, grouped by instruction family.

mod arith;
mod bcd;
mod bits;
mod flow;
mod logic;
mod moves;
mod muldiv;
mod shift;

use super::m68k::PRIVILEGE_VIOLATION_VECTOR;
use super::{Completion, ExecResult, Fault, M68k, Size, PC};
use crate::decoder::Op;

/// Size in bits 7-6 (00 byte, 01 word, 10 long).
fn size_field(opcode: u16) -> Result<Size, Fault> {
    Size::from_bits(opcode >> 6).ok_or(Fault::IllegalInstruction)
}

/// Register number in bits 11-9.
fn reg_field(opcode: u16) -> usize {
    ((opcode >> 9) & 7) as usize
}

/// Mode/register field in bits 5-0.
fn ea_field(opcode: u16) -> u16 {
    opcode & 0x3f
}

impl M68k {
    pub(super) fn execute(&mut self, op: Op, opcode: u16) -> ExecResult {
        match op {
            Op::Invalid => Err(Fault::IllegalInstruction),

            Op::Move => self.op_move(opcode),
            Op::Movea => self.op_movea(opcode),
            Op::Moveq => self.op_moveq(opcode),
            Op::Movem => self.op_movem(opcode),
            Op::Movep => self.op_movep(opcode),
            Op::Lea => self.op_lea(opcode),
            Op::Pea => self.op_pea(opcode),
            Op::Exg => self.op_exg(opcode),
            Op::Swap => self.op_swap(opcode),
            Op::Link => self.op_link(opcode, Size::Word),
            Op::LinkLong => self.op_link(opcode, Size::Long),
            Op::Unlk => self.op_unlk(opcode),
            Op::MoveFromSr => self.op_move_from_sr(opcode),
            Op::MoveToCcr => self.op_move_to_ccr(opcode),
            Op::MoveToSr => self.op_move_to_sr(opcode),
            Op::MoveUsp => self.op_move_usp(opcode),
            Op::Movec => self.op_movec(opcode),
            Op::Moves => self.op_moves(opcode),

            Op::Add => self.op_add_sub(opcode, false),
            Op::Sub => self.op_add_sub(opcode, true),
            Op::Adda => self.op_adda_suba(opcode, false),
            Op::Suba => self.op_adda_suba(opcode, true),
            Op::Addi => self.op_addi_subi(opcode, false),
            Op::Subi => self.op_addi_subi(opcode, true),
            Op::Addq => self.op_addq_subq(opcode, false),
            Op::Subq => self.op_addq_subq(opcode, true),
            Op::Addx => self.op_addx_subx(opcode, false),
            Op::Subx => self.op_addx_subx(opcode, true),
            Op::Cmp => self.op_cmp(opcode),
            Op::Cmpa => self.op_cmpa(opcode),
            Op::Cmpi => self.op_cmpi(opcode),
            Op::Cmpm => self.op_cmpm(opcode),
            Op::Neg => self.op_neg(opcode),
            Op::Negx => self.op_negx(opcode),
            Op::Clr => self.op_clr(opcode),
            Op::Tst => self.op_tst(opcode),
            Op::Ext => self.op_ext(opcode),
            Op::Chk => self.op_chk(opcode),
            Op::Mulu => self.op_mul_word(opcode, false),
            Op::Muls => self.op_mul_word(opcode, true),
            Op::Divu => self.op_div_word(opcode, false),
            Op::Divs => self.op_div_word(opcode, true),
            Op::MulLong => self.op_mul_long(opcode),
            Op::DivLong => self.op_div_long(opcode),

            Op::And => self.op_logic(opcode, logic::Logic::And),
            Op::Or => self.op_logic(opcode, logic::Logic::Or),
            Op::Eor => self.op_logic(opcode, logic::Logic::Eor),
            Op::Andi => self.op_logic_immediate(opcode, logic::Logic::And),
            Op::Ori => self.op_logic_immediate(opcode, logic::Logic::Or),
            Op::Eori => self.op_logic_immediate(opcode, logic::Logic::Eor),
            Op::AndiToCcr => self.op_logic_ccr(logic::Logic::And),
            Op::OriToCcr => self.op_logic_ccr(logic::Logic::Or),
            Op::EoriToCcr => self.op_logic_ccr(logic::Logic::Eor),
            Op::AndiToSr => self.op_logic_sr(logic::Logic::And),
            Op::OriToSr => self.op_logic_sr(logic::Logic::Or),
            Op::EoriToSr => self.op_logic_sr(logic::Logic::Eor),
            Op::Not => self.op_not(opcode),
            Op::Tas => self.op_tas(opcode),
            Op::Scc => self.op_scc(opcode),

            Op::Abcd => self.op_abcd_sbcd(opcode, false),
            Op::Sbcd => self.op_abcd_sbcd(opcode, true),
            Op::Nbcd => self.op_nbcd(opcode),

            Op::Btst | Op::Bchg | Op::Bclr | Op::Bset => self.op_bit(opcode),

            Op::ShiftRegister => self.op_shift_register(opcode),
            Op::ShiftMemory => self.op_shift_memory(opcode),

            Op::Bra | Op::Bsr | Op::Bcc => self.op_branch(opcode),
            Op::Dbcc => self.op_dbcc(opcode),
            Op::Jmp => self.op_jump(opcode, false),
            Op::Jsr => self.op_jump(opcode, true),
            Op::Rts => self.op_rts(),
            Op::Rtr => self.op_rtr(),
            Op::Rte => self.op_rte(),
            Op::Rtd => self.op_rtd(),
            Op::Trap => self.op_trap(opcode),
            Op::Trapv => self.op_trapv(),
            Op::Stop => self.op_stop(),
            Op::Reset => self.op_reset(),
            Op::Nop => {
                self.mnemonic(format_args!("NOP"));
                Ok(Completion::Ok)
            }
            Op::Illegal => {
                self.mnemonic(format_args!("ILLEGAL"));
                Err(Fault::IllegalInstruction)
            }
            Op::Break => self.op_break(),
        }
    }

    /// Rewind to the faulting instruction and take the privilege violation
    /// exception.
    pub(super) fn privilege_violation(&mut self) -> ExecResult {
        self.regs[PC] = self.instruction_pc;
        self.process_exception(PRIVILEGE_VIOLATION_VECTOR)?;
        self.note("Privilege Violation Exception");
        Ok(Completion::Privileged)
    }

    /// Read an immediate operand of `size` from the instruction stream.
    pub(super) fn immediate(&mut self, size: Size) -> Result<(u32, String), Fault> {
        let ea = self.effective_address(0x3c, size)?;
        let value = self.read_ea(&ea, size)?;
        Ok((value, ea.text))
    }
}
