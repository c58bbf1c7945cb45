// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use super::{Size, StatusFlags};

/// Which carry/overflow equations apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Add,
    Sub,
    /// Logical and move-like results: C, V and X are cleared.
    Other,
}

/// Update `sr` for `result = dest op src` at `size`, touching only the bits
/// in `mask`.
pub fn set_condition_codes(
    sr: StatusFlags,
    src: u32,
    dest: u32,
    result: u32,
    size: Size,
    op: Operation,
    mask: StatusFlags,
) -> StatusFlags {
    let msb = size.msb();
    let s = src & msb != 0;
    let d = dest & msb != 0;
    let r = result & msb != 0;

    let carry = match op {
        Operation::Add => (s && d) || (!r && d) || (s && !r),
        Operation::Sub => (s && !d) || (r && !d) || (s && r),
        Operation::Other => false,
    };
    let overflow = match op {
        Operation::Add => (s && d && !r) || (!s && !d && r),
        Operation::Sub => (!s && d && !r) || (s && !d && r),
        Operation::Other => false,
    };

    let mut computed = StatusFlags::empty();
    computed.set(StatusFlags::C | StatusFlags::X, carry);
    computed.set(StatusFlags::V, overflow);
    computed.set(StatusFlags::Z, result & size.mask() == 0);
    computed.set(StatusFlags::N, r);

    (sr - mask) | (computed & mask)
}

/// Evaluate one of the sixteen 68000 condition codes against `sr`.
pub fn test_condition(sr: StatusFlags, code: u16) -> bool {
    let c = sr.contains(StatusFlags::C);
    let v = sr.contains(StatusFlags::V);
    let z = sr.contains(StatusFlags::Z);
    let n = sr.contains(StatusFlags::N);
    match code & 0xf {
        0x0 => true,
        0x1 => false,
        0x2 => !c && !z,
        0x3 => c || z,
        0x4 => !c,
        0x5 => c,
        0x6 => !z,
        0x7 => z,
        0x8 => !v,
        0x9 => v,
        0xa => !n,
        0xb => n,
        0xc => n == v,
        0xd => n != v,
        0xe => n == v && !z,
        _ => z || n != v,
    }
}

pub fn condition_name(code: u16) -> &'static str {
    const NAMES: [&str; 16] = [
        "T", "F", "HI", "LS", "CC", "CS", "NE", "EQ", "VC", "VS", "PL", "MI", "GE", "LT", "GT",
        "LE",
    ];
    NAMES[(code & 0xf) as usize]
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: StatusFlags = StatusFlags::CCR;

    fn add(src: u32, dest: u32, size: Size) -> StatusFlags {
        let result = dest.wrapping_add(src);
        set_condition_codes(StatusFlags::empty(), src, dest, result, size, Operation::Add, ALL)
    }

    fn sub(src: u32, dest: u32, size: Size) -> StatusFlags {
        let result = dest.wrapping_sub(src);
        set_condition_codes(StatusFlags::empty(), src, dest, result, size, Operation::Sub, ALL)
    }

    #[test]
    fn test_byte_add_overflow() {
        let sr = add(0x01, 0x7f, Size::Byte);
        assert!(sr.contains(StatusFlags::V | StatusFlags::N));
        assert!(!sr.intersects(StatusFlags::Z | StatusFlags::C | StatusFlags::X));
    }

    #[test]
    fn test_byte_add_carry_to_zero() {
        let sr = add(0x01, 0xff, Size::Byte);
        assert!(sr.contains(StatusFlags::C | StatusFlags::X | StatusFlags::Z));
        assert!(!sr.intersects(StatusFlags::N | StatusFlags::V));
    }

    #[test]
    fn test_sub_borrow_and_overflow() {
        // 0 - 1 borrows
        let sr = sub(1, 0, Size::Word);
        assert!(sr.contains(StatusFlags::C | StatusFlags::X | StatusFlags::N));
        assert!(!sr.intersects(StatusFlags::V | StatusFlags::Z));

        // 0x80000000 - 1 overflows positive
        let sr = sub(1, 0x8000_0000, Size::Long);
        assert!(sr.contains(StatusFlags::V));
        assert!(!sr.intersects(StatusFlags::C | StatusFlags::N));
    }

    #[test]
    fn test_zero_uses_sized_result() {
        let sr = add(0x100, 0x00, Size::Byte);
        assert!(sr.contains(StatusFlags::Z));
        let sr = add(0x100, 0x00, Size::Word);
        assert!(!sr.contains(StatusFlags::Z));
    }

    #[test]
    fn test_mask_limits_updates() {
        let start = StatusFlags::X | StatusFlags::S | StatusFlags::C;
        let sr = set_condition_codes(
            start,
            0,
            0,
            0,
            Size::Long,
            Operation::Other,
            StatusFlags::CVZN,
        );
        // X untouched, C cleared, Z set, S untouched
        assert_eq!(sr, StatusFlags::X | StatusFlags::S | StatusFlags::Z);
    }

    #[test]
    fn test_other_clears_extend_when_masked() {
        let sr = set_condition_codes(StatusFlags::X, 1, 1, 1, Size::Byte, Operation::Other, ALL);
        assert!(!sr.contains(StatusFlags::X));
    }

    #[test]
    fn test_conditions() {
        let z = StatusFlags::Z;
        let n = StatusFlags::N;
        let v = StatusFlags::V;
        assert!(test_condition(StatusFlags::empty(), 0x2)); // HI
        assert!(!test_condition(z, 0x2));
        assert!(test_condition(z, 0x7)); // EQ
        assert!(test_condition(n | v, 0xc)); // GE
        assert!(test_condition(n, 0xd)); // LT
        assert!(!test_condition(n | v | z, 0xe)); // GT
        assert!(test_condition(z, 0xf)); // LE
        assert!(!test_condition(StatusFlags::empty(), 0x1));
        assert_eq!(condition_name(0xe), "GT");
    }
}
