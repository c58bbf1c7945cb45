// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! Opcode decoding for the 68000 family.
//!
//! A static table of `{mask, signature, op}` rows describes every legal
//! encoding. Rows are expanded per addressing-mode class, so no two rows can
//! match the same opcode. Each CPU keeps its own lazily filled cache from
//! opcode to [`Op`].

use crate::cpu::CpuModel;
use std::sync::OnceLock;

/// Instruction handler selected for an opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    Invalid,

    Move,
    Movea,
    Moveq,
    Movem,
    Movep,
    Lea,
    Pea,
    Exg,
    Swap,
    Link,
    LinkLong,
    Unlk,
    MoveFromSr,
    MoveToCcr,
    MoveToSr,
    MoveUsp,
    Movec,
    Moves,

    Add,
    Adda,
    Addi,
    Addq,
    Addx,
    Sub,
    Suba,
    Subi,
    Subq,
    Subx,
    Cmp,
    Cmpa,
    Cmpi,
    Cmpm,
    Neg,
    Negx,
    Clr,
    Tst,
    Ext,
    Chk,
    Mulu,
    Muls,
    Divu,
    Divs,
    MulLong,
    DivLong,

    And,
    Andi,
    Or,
    Ori,
    Eor,
    Eori,
    Not,
    AndiToCcr,
    AndiToSr,
    OriToCcr,
    OriToSr,
    EoriToCcr,
    EoriToSr,
    Tas,
    Scc,

    Abcd,
    Sbcd,
    Nbcd,

    Btst,
    Bchg,
    Bclr,
    Bset,

    ShiftRegister,
    ShiftMemory,

    Bra,
    Bsr,
    Bcc,
    Dbcc,
    Jmp,
    Jsr,
    Rts,
    Rtr,
    Rte,
    Rtd,
    Trap,
    Trapv,
    Stop,
    Reset,
    Nop,
    Illegal,
    Break,
}

/// One row of the decode table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeEntry {
    pub mask: u16,
    pub signature: u16,
    pub op: Op,
    /// Only decoded on CPU32 models.
    pub cpu32_only: bool,
}

impl DecodeEntry {
    pub fn matches(&self, opcode: u16) -> bool {
        opcode & self.mask == self.signature
    }
}

/// `(mask, signature)` over the six-bit mode/register field.
type Pattern = (u16, u16);

const fn mode(m: u16) -> Pattern {
    (0x38, m << 3)
}

const fn special(r: u16) -> Pattern {
    (0x3f, 0x38 | r)
}

const DN: Pattern = mode(0);
const AN: Pattern = mode(1);
const IND: Pattern = mode(2);
const POSTINC: Pattern = mode(3);
const PREDEC: Pattern = mode(4);
const DISP: Pattern = mode(5);
const INDEX: Pattern = mode(6);
const ABS_W: Pattern = special(0);
const ABS_L: Pattern = special(1);
const PC_DISP: Pattern = special(2);
const PC_INDEX: Pattern = special(3);
const IMM: Pattern = special(4);

const ALL: &[Pattern] = &[
    DN, AN, IND, POSTINC, PREDEC, DISP, INDEX, ABS_W, ABS_L, PC_DISP, PC_INDEX, IMM,
];
const DATA: &[Pattern] = &[
    DN, IND, POSTINC, PREDEC, DISP, INDEX, ABS_W, ABS_L, PC_DISP, PC_INDEX, IMM,
];
const DATA_NO_IMM: &[Pattern] = &[
    DN, IND, POSTINC, PREDEC, DISP, INDEX, ABS_W, ABS_L, PC_DISP, PC_INDEX,
];
const ALTERABLE: &[Pattern] = &[DN, AN, IND, POSTINC, PREDEC, DISP, INDEX, ABS_W, ABS_L];
const DATA_ALTERABLE: &[Pattern] = &[DN, IND, POSTINC, PREDEC, DISP, INDEX, ABS_W, ABS_L];
const MEMORY_ALTERABLE: &[Pattern] = &[IND, POSTINC, PREDEC, DISP, INDEX, ABS_W, ABS_L];
const CONTROL: &[Pattern] = &[IND, DISP, INDEX, ABS_W, ABS_L, PC_DISP, PC_INDEX];
const MOVEM_TO_MEMORY: &[Pattern] = &[IND, PREDEC, DISP, INDEX, ABS_W, ABS_L];
const MOVEM_TO_REGISTERS: &[Pattern] = &[IND, POSTINC, DISP, INDEX, ABS_W, ABS_L, PC_DISP, PC_INDEX];

/// Move a source-layout pattern into MOVE's destination field
/// (register in bits 11-9, mode in bits 8-6).
const fn destination(p: Pattern) -> Pattern {
    (
        ((p.0 >> 3) & 7) << 6 | (p.0 & 7) << 9,
        ((p.1 >> 3) & 7) << 6 | (p.1 & 7) << 9,
    )
}

#[derive(Default)]
struct TableBuilder {
    entries: Vec<DecodeEntry>,
    cpu32_only: bool,
}

impl TableBuilder {
    fn op(&mut self, mask: u16, signature: u16, op: Op) {
        self.entries.push(DecodeEntry {
            mask,
            signature,
            op,
            cpu32_only: self.cpu32_only,
        });
    }

    fn ea(&mut self, mask: u16, signature: u16, class: &[Pattern], op: Op) {
        for &(m, s) in class {
            self.op(mask | m, signature | s, op);
        }
    }

    /// Rows for the byte, word and long forms of a size-in-bits-7-6 opcode.
    fn sized(&mut self, mask: u16, signature: u16, byte: &[Pattern], wider: &[Pattern], op: Op) {
        for size in 0..3u16 {
            let class = if size == 0 { byte } else { wider };
            self.ea(mask, signature | size << 6, class, op);
        }
    }

    fn cpu32(&mut self, rows: impl FnOnce(&mut Self)) {
        self.cpu32_only = true;
        rows(self);
        self.cpu32_only = false;
    }
}

fn build_table() -> Vec<DecodeEntry> {
    let mut t = TableBuilder::default();

    // Line 0: immediate arithmetic, bit manipulation, MOVEP
    t.op(0xffff, 0x003c, Op::OriToCcr);
    t.op(0xffff, 0x007c, Op::OriToSr);
    t.op(0xffff, 0x023c, Op::AndiToCcr);
    t.op(0xffff, 0x027c, Op::AndiToSr);
    t.op(0xffff, 0x0a3c, Op::EoriToCcr);
    t.op(0xffff, 0x0a7c, Op::EoriToSr);
    for (sig, op) in [
        (0x0000, Op::Ori),
        (0x0200, Op::Andi),
        (0x0400, Op::Subi),
        (0x0600, Op::Addi),
        (0x0a00, Op::Eori),
        (0x0c00, Op::Cmpi),
    ] {
        t.sized(0xffc0, sig, DATA_ALTERABLE, DATA_ALTERABLE, op);
    }
    t.ea(0xf1c0, 0x0100, DATA, Op::Btst);
    t.ea(0xf1c0, 0x0140, DATA_ALTERABLE, Op::Bchg);
    t.ea(0xf1c0, 0x0180, DATA_ALTERABLE, Op::Bclr);
    t.ea(0xf1c0, 0x01c0, DATA_ALTERABLE, Op::Bset);
    t.op(0xf138, 0x0108, Op::Movep);
    t.ea(0xffc0, 0x0800, DATA_NO_IMM, Op::Btst);
    t.ea(0xffc0, 0x0840, DATA_ALTERABLE, Op::Bchg);
    t.ea(0xffc0, 0x0880, DATA_ALTERABLE, Op::Bclr);
    t.ea(0xffc0, 0x08c0, DATA_ALTERABLE, Op::Bset);
    t.cpu32(|t| t.sized(0xffc0, 0x0e00, MEMORY_ALTERABLE, MEMORY_ALTERABLE, Op::Moves));

    // Lines 1-3: MOVE and MOVEA
    for (code, byte) in [(0x1000u16, true), (0x3000, false), (0x2000, false)] {
        let sources = if byte { DATA } else { ALL };
        for &(sm, ss) in sources {
            for &d in DATA_ALTERABLE {
                let (dm, ds) = destination(d);
                t.op(0xf000 | sm | dm, code | ss | ds, Op::Move);
            }
            if !byte {
                t.op(0xf1c0 | sm, code | 0x0040 | ss, Op::Movea);
            }
        }
    }

    // Line 4: miscellaneous
    t.sized(0xffc0, 0x4000, DATA_ALTERABLE, DATA_ALTERABLE, Op::Negx);
    t.ea(0xffc0, 0x40c0, DATA_ALTERABLE, Op::MoveFromSr);
    t.ea(0xf1c0, 0x4180, DATA, Op::Chk);
    t.cpu32(|t| t.ea(0xf1c0, 0x4100, DATA, Op::Chk));
    t.ea(0xf1c0, 0x41c0, CONTROL, Op::Lea);
    t.cpu32(|t| t.op(0xfff8, 0x49c0, Op::Ext));
    t.sized(0xffc0, 0x4200, DATA_ALTERABLE, DATA_ALTERABLE, Op::Clr);
    t.sized(0xffc0, 0x4400, DATA_ALTERABLE, DATA_ALTERABLE, Op::Neg);
    t.ea(0xffc0, 0x44c0, DATA, Op::MoveToCcr);
    t.sized(0xffc0, 0x4600, DATA_ALTERABLE, DATA_ALTERABLE, Op::Not);
    t.ea(0xffc0, 0x46c0, DATA, Op::MoveToSr);
    t.ea(0xffc0, 0x4800, DATA_ALTERABLE, Op::Nbcd);
    t.cpu32(|t| t.op(0xfff8, 0x4808, Op::LinkLong));
    t.op(0xfff8, 0x4840, Op::Swap);
    t.op(0xfff8, 0x4848, Op::Break);
    t.ea(0xffc0, 0x4840, CONTROL, Op::Pea);
    t.op(0xfff8, 0x4880, Op::Ext);
    t.op(0xfff8, 0x48c0, Op::Ext);
    t.ea(0xffc0, 0x4880, MOVEM_TO_MEMORY, Op::Movem);
    t.ea(0xffc0, 0x48c0, MOVEM_TO_MEMORY, Op::Movem);
    t.sized(0xffc0, 0x4a00, DATA_ALTERABLE, DATA_ALTERABLE, Op::Tst);
    t.ea(0xffc0, 0x4ac0, DATA_ALTERABLE, Op::Tas);
    t.op(0xffff, 0x4afc, Op::Illegal);
    t.cpu32(|t| {
        t.ea(0xffc0, 0x4c00, DATA, Op::MulLong);
        t.ea(0xffc0, 0x4c40, DATA, Op::DivLong);
    });
    t.ea(0xffc0, 0x4c80, MOVEM_TO_REGISTERS, Op::Movem);
    t.ea(0xffc0, 0x4cc0, MOVEM_TO_REGISTERS, Op::Movem);
    t.op(0xfff0, 0x4e40, Op::Trap);
    t.op(0xfff8, 0x4e50, Op::Link);
    t.op(0xfff8, 0x4e58, Op::Unlk);
    t.op(0xfff0, 0x4e60, Op::MoveUsp);
    t.op(0xffff, 0x4e70, Op::Reset);
    t.op(0xffff, 0x4e71, Op::Nop);
    t.op(0xffff, 0x4e72, Op::Stop);
    t.op(0xffff, 0x4e73, Op::Rte);
    t.cpu32(|t| t.op(0xffff, 0x4e74, Op::Rtd));
    t.op(0xffff, 0x4e75, Op::Rts);
    t.op(0xffff, 0x4e76, Op::Trapv);
    t.op(0xffff, 0x4e77, Op::Rtr);
    t.cpu32(|t| t.op(0xfffe, 0x4e7a, Op::Movec));
    t.ea(0xffc0, 0x4e80, CONTROL, Op::Jsr);
    t.ea(0xffc0, 0x4ec0, CONTROL, Op::Jmp);

    // Line 5: ADDQ, SUBQ, Scc, DBcc
    t.sized(0xf1c0, 0x5000, DATA_ALTERABLE, ALTERABLE, Op::Addq);
    t.sized(0xf1c0, 0x5100, DATA_ALTERABLE, ALTERABLE, Op::Subq);
    t.ea(0xf0c0, 0x50c0, DATA_ALTERABLE, Op::Scc);
    t.op(0xf0f8, 0x50c8, Op::Dbcc);

    // Line 6: branches
    t.op(0xff00, 0x6000, Op::Bra);
    t.op(0xff00, 0x6100, Op::Bsr);
    for cond in 2..16u16 {
        t.op(0xff00, 0x6000 | cond << 8, Op::Bcc);
    }

    // Line 7
    t.op(0xf100, 0x7000, Op::Moveq);

    // Line 8: OR, DIV, SBCD
    t.sized(0xf1c0, 0x8000, DATA, DATA, Op::Or);
    t.sized(0xf1c0, 0x8100, MEMORY_ALTERABLE, MEMORY_ALTERABLE, Op::Or);
    t.ea(0xf1c0, 0x80c0, DATA, Op::Divu);
    t.ea(0xf1c0, 0x81c0, DATA, Op::Divs);
    t.op(0xf1f0, 0x8100, Op::Sbcd);

    // Line 9: SUB family
    t.sized(0xf1c0, 0x9000, DATA, ALL, Op::Sub);
    t.sized(0xf1c0, 0x9100, MEMORY_ALTERABLE, MEMORY_ALTERABLE, Op::Sub);
    t.ea(0xf1c0, 0x90c0, ALL, Op::Suba);
    t.ea(0xf1c0, 0x91c0, ALL, Op::Suba);
    for size in 0..3u16 {
        t.op(0xf1f0, 0x9100 | size << 6, Op::Subx);
    }

    // Line B: CMP family, EOR
    t.sized(0xf1c0, 0xb000, DATA, ALL, Op::Cmp);
    t.ea(0xf1c0, 0xb0c0, ALL, Op::Cmpa);
    t.ea(0xf1c0, 0xb1c0, ALL, Op::Cmpa);
    t.sized(0xf1c0, 0xb100, DATA_ALTERABLE, DATA_ALTERABLE, Op::Eor);
    for size in 0..3u16 {
        t.op(0xf1f8, 0xb108 | size << 6, Op::Cmpm);
    }

    // Line C: AND, MUL, ABCD, EXG
    t.sized(0xf1c0, 0xc000, DATA, DATA, Op::And);
    t.sized(0xf1c0, 0xc100, MEMORY_ALTERABLE, MEMORY_ALTERABLE, Op::And);
    t.ea(0xf1c0, 0xc0c0, DATA, Op::Mulu);
    t.ea(0xf1c0, 0xc1c0, DATA, Op::Muls);
    t.op(0xf1f0, 0xc100, Op::Abcd);
    t.op(0xf1f8, 0xc140, Op::Exg);
    t.op(0xf1f8, 0xc148, Op::Exg);
    t.op(0xf1f8, 0xc188, Op::Exg);

    // Line D: ADD family
    t.sized(0xf1c0, 0xd000, DATA, ALL, Op::Add);
    t.sized(0xf1c0, 0xd100, MEMORY_ALTERABLE, MEMORY_ALTERABLE, Op::Add);
    t.ea(0xf1c0, 0xd0c0, ALL, Op::Adda);
    t.ea(0xf1c0, 0xd1c0, ALL, Op::Adda);
    for size in 0..3u16 {
        t.op(0xf1f0, 0xd100 | size << 6, Op::Addx);
    }

    // Line E: shifts and rotates
    for direction in 0..2u16 {
        for size in 0..3u16 {
            for kind in 0..4u16 {
                t.op(
                    0xf1d8,
                    0xe000 | direction << 8 | size << 6 | kind << 3,
                    Op::ShiftRegister,
                );
            }
        }
        for kind in 0..4u16 {
            t.ea(
                0xffc0,
                0xe0c0 | kind << 9 | direction << 8,
                MEMORY_ALTERABLE,
                Op::ShiftMemory,
            );
        }
    }

    // Lines A and F are unimplemented on both models.
    t.entries
}

/// The shared, immutable decode table.
pub fn table() -> &'static [DecodeEntry] {
    static TABLE: OnceLock<Vec<DecodeEntry>> = OnceLock::new();
    TABLE.get_or_init(build_table)
}

/// First table row matching `opcode` on `model`, or [`Op::Invalid`].
pub fn lookup(model: CpuModel, opcode: u16) -> Op {
    table()
        .iter()
        .find(|e| (model.is_cpu32() || !e.cpu32_only) && e.matches(opcode))
        .map(|e| e.op)
        .unwrap_or(Op::Invalid)
}

/// Per-CPU memo of [`lookup`]. Entries never change once filled.
pub struct DecodeCache {
    model: CpuModel,
    entries: Box<[Option<Op>]>,
}

impl std::fmt::Debug for DecodeCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecodeCache")
            .field("model", &self.model)
            .field("resolved", &self.resolved())
            .finish()
    }
}

impl DecodeCache {
    pub fn new(model: CpuModel) -> Self {
        Self {
            model,
            entries: vec![None; 0x10000].into_boxed_slice(),
        }
    }

    pub fn decode(&mut self, opcode: u16) -> Op {
        let slot = &mut self.entries[opcode as usize];
        match slot {
            Some(op) => *op,
            None => {
                let op = lookup(self.model, opcode);
                tracing::trace!("decoded {:04x} as {:?}", opcode, op);
                *slot = Some(op);
                op
            }
        }
    }

    /// Number of opcodes decoded so far.
    pub fn resolved(&self) -> usize {
        self.entries.iter().filter(|e| e.is_some()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_rows_are_disjoint() {
        let table = table();
        for opcode in 0..=u16::MAX {
            let hits: Vec<_> = table.iter().filter(|e| e.matches(opcode)).collect();
            assert!(
                hits.len() <= 1,
                "opcode {:#06x} matches {:?}",
                opcode,
                hits.iter().map(|e| e.op).collect::<Vec<_>>()
            );
        }
    }

    #[test]
    fn test_common_encodings() {
        let m = CpuModel::M68000;
        assert_eq!(lookup(m, 0x7a05), Op::Moveq); // MOVEQ #5,D5
        assert_eq!(lookup(m, 0x5680), Op::Addq); // ADDQ.L #3,D0
        assert_eq!(lookup(m, 0x4e75), Op::Rts);
        assert_eq!(lookup(m, 0x4e71), Op::Nop);
        assert_eq!(lookup(m, 0x4afc), Op::Illegal);
        assert_eq!(lookup(m, 0x4ad0), Op::Tas);
        assert_eq!(lookup(m, 0x4840), Op::Swap);
        assert_eq!(lookup(m, 0x4850), Op::Pea);
        assert_eq!(lookup(m, 0x4848), Op::Break);
        assert_eq!(lookup(m, 0x48e7), Op::Movem); // MOVEM.L regs,-(A7)
        assert_eq!(lookup(m, 0x4cdf), Op::Movem); // MOVEM.L (A7)+,regs
        assert_eq!(lookup(m, 0x2040), Op::Movea); // MOVEA.L D0,A0
        assert_eq!(lookup(m, 0x1080), Op::Move); // MOVE.B D0,(A0)
        assert_eq!(lookup(m, 0x1048), Op::Invalid); // MOVEA.B does not exist
        assert_eq!(lookup(m, 0x6700), Op::Bcc);
        assert_eq!(lookup(m, 0x51c8), Op::Dbcc);
        assert_eq!(lookup(m, 0xc340), Op::Exg);
        assert_eq!(lookup(m, 0xe348), Op::ShiftRegister); // LSL.W #1,D0
        assert_eq!(lookup(m, 0xe3d0), Op::ShiftMemory); // LSL (A0)
        assert_eq!(lookup(m, 0x0108), Op::Movep);
        assert_eq!(lookup(m, 0x0800), Op::Btst);
    }

    #[test]
    fn test_line_a_and_f_are_invalid() {
        for model in [CpuModel::M68000, CpuModel::Cpu32] {
            assert_eq!(lookup(model, 0xa000), Op::Invalid);
            assert_eq!(lookup(model, 0xf000), Op::Invalid);
            assert_eq!(lookup(model, 0xffff), Op::Invalid);
        }
    }

    #[test]
    fn test_cpu32_only_encodings() {
        for (opcode, op) in [
            (0x4e7a, Op::Movec),
            (0x4e74, Op::Rtd),
            (0x49c0, Op::Ext),
            (0x4808, Op::LinkLong),
            (0x4c00, Op::MulLong),
            (0x4c40, Op::DivLong),
            (0x0e10, Op::Moves),
            (0x4100, Op::Chk),
        ] {
            assert_eq!(lookup(CpuModel::Cpu32, opcode), op, "{:#06x}", opcode);
            assert_eq!(lookup(CpuModel::M68000, opcode), Op::Invalid, "{:#06x}", opcode);
        }
    }

    #[test]
    fn test_cache_is_idempotent() {
        let mut cache = DecodeCache::new(CpuModel::Cpu32);
        assert_eq!(cache.resolved(), 0);
        for opcode in [0x7a05u16, 0x4e75, 0xa123, 0x4e7b] {
            let first = cache.decode(opcode);
            assert_eq!(cache.decode(opcode), first);
            assert_eq!(first, lookup(CpuModel::Cpu32, opcode));
        }
        assert_eq!(cache.resolved(), 4);
    }
}
