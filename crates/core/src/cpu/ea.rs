// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! Effective-address calculation.

use super::{Fault, M68k, Size, D0, PC, REGISTER_DATA};

/// Where an operand lives once its effective address is resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Operand {
    /// Register-file slot.
    Register(usize),
    Memory(u32),
}

/// A resolved operand plus its assembler text (empty unless tracing).
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) struct Ea {
    pub loc: Operand,
    pub text: String,
}

impl Ea {
    pub fn address(&self) -> Option<u32> {
        match self.loc {
            Operand::Memory(a) => Some(a),
            Operand::Register(_) => None,
        }
    }
}

impl M68k {
    /// Resolve the six-bit mode/register field `mode_reg` for an operand of
    /// `size`, consuming extension words and applying post-increment or
    /// pre-decrement side effects.
    pub(super) fn effective_address(&mut self, mode_reg: u16, size: Size) -> Result<Ea, Fault> {
        let reg = (mode_reg & 7) as usize;
        let tracing = self.tracing();
        let text = |s: String| if tracing { s } else { String::new() };

        match (mode_reg >> 3) & 7 {
            0 => Ok(Ea {
                loc: Operand::Register(D0 + reg),
                text: text(format!("D{}", reg)),
            }),
            1 => {
                let slot = self.address_slot(reg);
                Ok(Ea {
                    loc: Operand::Register(slot),
                    text: text(REGISTER_DATA[slot].name.to_string()),
                })
            }
            2 => {
                let slot = self.address_slot(reg);
                Ok(Ea {
                    loc: Operand::Memory(self.regs[slot]),
                    text: text(format!("({})", REGISTER_DATA[slot].name)),
                })
            }
            3 => {
                let slot = self.address_slot(reg);
                let address = self.regs[slot];
                self.regs[slot] = address.wrapping_add(Self::step_for(reg, size));
                Ok(Ea {
                    loc: Operand::Memory(address),
                    text: text(format!("({})+", REGISTER_DATA[slot].name)),
                })
            }
            4 => {
                let slot = self.address_slot(reg);
                let address = self.regs[slot].wrapping_sub(Self::step_for(reg, size));
                self.regs[slot] = address;
                Ok(Ea {
                    loc: Operand::Memory(address),
                    text: text(format!("-({})", REGISTER_DATA[slot].name)),
                })
            }
            5 => {
                let slot = self.address_slot(reg);
                let base = self.regs[slot];
                let disp = self.fetch_word()?;
                Ok(Ea {
                    loc: Operand::Memory(base.wrapping_add(Size::Word.sign_extend(disp as u32))),
                    text: text(format!("(${:04X},{})", disp, REGISTER_DATA[slot].name)),
                })
            }
            6 => {
                let slot = self.address_slot(reg);
                let base = self.regs[slot];
                let (address, desc) = self.indexed(base, REGISTER_DATA[slot].name)?;
                Ok(Ea {
                    loc: Operand::Memory(address),
                    text: desc,
                })
            }
            _ => match reg {
                0 => {
                    let word = self.fetch_word()?;
                    Ok(Ea {
                        loc: Operand::Memory(Size::Word.sign_extend(word as u32)),
                        text: text(format!("{:04X}.W", word)),
                    })
                }
                1 => {
                    let long = self.fetch_long()?;
                    Ok(Ea {
                        loc: Operand::Memory(long),
                        text: text(format!("{:08X}.L", long)),
                    })
                }
                2 => {
                    let base = self.regs[PC];
                    let disp = self.fetch_word()?;
                    Ok(Ea {
                        loc: Operand::Memory(base.wrapping_add(Size::Word.sign_extend(disp as u32))),
                        text: text(format!("(${:04X},PC)", disp)),
                    })
                }
                3 => {
                    let base = self.regs[PC];
                    let (address, desc) = self.indexed(base, "PC")?;
                    Ok(Ea {
                        loc: Operand::Memory(address),
                        text: desc,
                    })
                }
                4 => {
                    let pc = self.regs[PC];
                    // Byte immediates occupy the low half of a word slot.
                    let address = if size == Size::Byte { pc.wrapping_add(1) } else { pc };
                    let consumed = if size == Size::Long { 4 } else { 2 };
                    self.regs[PC] = pc.wrapping_add(consumed);
                    let desc = if tracing {
                        let value = self.read(address, size)?;
                        format!("#${:0width$X}", value, width = size.digits())
                    } else {
                        String::new()
                    };
                    Ok(Ea {
                        loc: Operand::Memory(address),
                        text: desc,
                    })
                }
                _ => Err(Fault::IllegalInstruction),
            },
        }
    }

    /// Post-increment/pre-decrement step. A7 stays word aligned.
    fn step_for(reg: usize, size: Size) -> u32 {
        if size == Size::Byte && reg == 7 {
            2
        } else {
            size.bytes()
        }
    }

    /// Indexed addressing: brief extension words on both models, full
    /// format (without memory indirection) on CPU32 only.
    fn indexed(&mut self, base: u32, base_name: &str) -> Result<(u32, String), Fault> {
        let ext = self.fetch_word()?;
        let cpu32 = self.model.is_cpu32();
        let full = cpu32 && ext & 0x100 != 0;

        let base_suppressed = full && ext & 0x180 == 0x180;
        let base = if base_suppressed { 0 } else { base };

        let displacement = if full {
            if ext & 0x40 != 0 || ext & 0x7 != 0 {
                return Err(Fault::IllegalInstruction);
            }
            match ext & 0x30 {
                0x10 => 0,
                0x20 => Size::Word.sign_extend(self.fetch_word()? as u32),
                0x30 => self.fetch_long()?,
                _ => return Err(Fault::IllegalInstruction),
            }
        } else {
            Size::Byte.sign_extend(ext as u32)
        };

        let index_reg = ((ext >> 12) & 7) as usize;
        let slot = if ext & 0x8000 != 0 {
            self.address_slot(index_reg)
        } else {
            D0 + index_reg
        };
        let long_index = ext & 0x800 != 0;
        let index = if long_index {
            self.regs[slot]
        } else {
            Size::Word.sign_extend(self.regs[slot])
        };
        let scale = if cpu32 { 1u32 << ((ext >> 9) & 3) } else { 1 };

        let address = base
            .wrapping_add(displacement)
            .wrapping_add(index.wrapping_mul(scale));

        let desc = if self.tracing() {
            let mut s = format!("(${:X}", displacement);
            if !base_suppressed {
                s.push(',');
                s.push_str(base_name);
            }
            s.push(',');
            s.push_str(REGISTER_DATA[slot].name);
            s.push_str(if long_index { ".L" } else { ".W" });
            if scale > 1 {
                s.push_str(&format!("*{}", scale));
            }
            s.push(')');
            s
        } else {
            String::new()
        };
        Ok((address, desc))
    }

    /// Read the operand at `ea`; register values are truncated to `size`.
    pub(super) fn read_ea(&mut self, ea: &Ea, size: Size) -> Result<u32, Fault> {
        match ea.loc {
            Operand::Register(slot) => Ok(self.regs[slot] & size.mask()),
            Operand::Memory(address) => self.read(address, size),
        }
    }

    /// Write the operand at `ea`. Register writes only replace the low
    /// `size` bits.
    pub(super) fn write_ea(&mut self, ea: &Ea, size: Size, value: u32) -> Result<(), Fault> {
        match ea.loc {
            Operand::Register(slot) => {
                self.set_register(slot, value, size);
                Ok(())
            }
            Operand::Memory(address) => self.write(address, size, value),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cpu::{CpuModel, StatusFlags, A0, SR, SSP, USP};
    use crate::peripherals::ram::Ram;

    fn setup(model: CpuModel) -> M68k {
        let mut cpu = M68k::new(model);
        cpu.attach_device(0, Box::new(Ram::new(0, 0x1000))).unwrap();
        cpu.regs[PC] = 0x100;
        cpu
    }

    fn poke_words(cpu: &mut M68k, at: u32, words: &[u16]) {
        for (i, w) in words.iter().enumerate() {
            cpu.write(at + 2 * i as u32, Size::Word, *w as u32).unwrap();
        }
    }

    #[test]
    fn test_stack_pointer_byte_steps_by_two() {
        let mut cpu = setup(CpuModel::M68000);
        cpu.regs[SSP] = 0x800;
        let ea = cpu.effective_address(0o37, Size::Byte).unwrap(); // (A7)+
        assert_eq!(ea.loc, Operand::Memory(0x800));
        assert_eq!(cpu.regs[SSP], 0x802);

        cpu.regs[A0] = 0x800;
        cpu.effective_address(0o30, Size::Byte).unwrap(); // (A0)+
        assert_eq!(cpu.regs[A0], 0x801);
    }

    #[test]
    fn test_user_mode_uses_usp() {
        let mut cpu = setup(CpuModel::M68000);
        cpu.regs[SR] = 0;
        cpu.regs[USP] = 0x400;
        cpu.regs[SSP] = 0x800;
        let ea = cpu.effective_address(0o47, Size::Word).unwrap(); // -(A7)
        assert_eq!(ea.loc, Operand::Memory(0x3fe));
        assert_eq!(cpu.regs[SSP], 0x800);
        assert!(!cpu.sr().contains(StatusFlags::S));
    }

    #[test]
    fn test_displacement_is_signed() {
        let mut cpu = setup(CpuModel::M68000);
        cpu.regs[A0 + 1] = 0x500;
        poke_words(&mut cpu, 0x100, &[0xfffe]);
        let ea = cpu.effective_address(0o51, Size::Word).unwrap();
        assert_eq!(ea.loc, Operand::Memory(0x4fe));
        assert_eq!(cpu.regs[PC], 0x102);
    }

    #[test]
    fn test_brief_index_with_scale_on_cpu32() {
        let mut cpu = setup(CpuModel::Cpu32);
        cpu.regs[A0] = 0x200;
        cpu.regs[D0 + 1] = 0x0001_0003;
        // D1.W*4, displacement -2
        poke_words(&mut cpu, 0x100, &[0x1400 | 0xfe]);
        let ea = cpu.effective_address(0o60, Size::Long).unwrap();
        assert_eq!(ea.loc, Operand::Memory(0x200 - 2 + 12));

        // the 68000 ignores the scale bits
        let mut cpu = setup(CpuModel::M68000);
        cpu.regs[A0] = 0x200;
        cpu.regs[D0 + 1] = 3;
        poke_words(&mut cpu, 0x100, &[0x1400 | 0xfe]);
        let ea = cpu.effective_address(0o60, Size::Long).unwrap();
        assert_eq!(ea.loc, Operand::Memory(0x200 - 2 + 3));
    }

    #[test]
    fn test_full_format_base_suppress_and_word_displacement() {
        let mut cpu = setup(CpuModel::Cpu32);
        cpu.regs[A0] = 0x9999;
        cpu.regs[D0 + 2] = 0x10;
        // D2.L, BS=1, BD=word
        poke_words(&mut cpu, 0x100, &[0x2000 | 0x0800 | 0x0180 | 0x0020, 0x0300]);
        let ea = cpu.effective_address(0o60, Size::Word).unwrap();
        assert_eq!(ea.loc, Operand::Memory(0x310));
        assert_eq!(cpu.regs[PC], 0x104);
    }

    #[test]
    fn test_full_format_memory_indirect_is_illegal() {
        let mut cpu = setup(CpuModel::Cpu32);
        poke_words(&mut cpu, 0x100, &[0x0100 | 0x0010 | 0x0001]);
        assert_eq!(
            cpu.effective_address(0o60, Size::Word),
            Err(Fault::IllegalInstruction)
        );
    }

    #[test]
    fn test_immediate_byte_reads_low_half() {
        let mut cpu = setup(CpuModel::M68000);
        poke_words(&mut cpu, 0x100, &[0x00ab]);
        let ea = cpu.effective_address(0o74, Size::Byte).unwrap();
        assert_eq!(ea.loc, Operand::Memory(0x101));
        assert_eq!(cpu.read_ea(&ea, Size::Byte).unwrap(), 0xab);
        assert_eq!(cpu.regs[PC], 0x102);
    }

    #[test]
    fn test_pc_advances_when_extension_fetch_fails() {
        let mut cpu = setup(CpuModel::M68000);
        cpu.regs[PC] = 0x2000; // unmapped
        assert_eq!(
            cpu.effective_address(0o71, Size::Long),
            Err(Fault::BusError(0x2000))
        );
        assert_eq!(cpu.regs[PC], 0x2004);
    }

    #[test]
    fn test_register_write_merges_low_bits() {
        let mut cpu = setup(CpuModel::M68000);
        cpu.regs[D0 + 3] = 0x1234_5678;
        let ea = cpu.effective_address(0o03, Size::Byte).unwrap();
        cpu.write_ea(&ea, Size::Byte, 0xff).unwrap();
        assert_eq!(cpu.regs[D0 + 3], 0x1234_56ff);
        assert_eq!(cpu.read_ea(&ea, Size::Word).unwrap(), 0x56ff);
    }
}
