// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use crate::peripherals::DeviceId;
use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// Acknowledge response asking the CPU to use vector `24 + level`.
pub const AUTOVECTOR_INTERRUPT: i32 = -1;
/// Acknowledge response for a request that vanished; maps to vector 24.
pub const SPURIOUS_INTERRUPT: i32 = -2;

/// An interrupt request waiting for the CPU's mask to allow it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingInterrupt {
    pub level: u8,
    pub device: DeviceId,
    seq: u64,
}

impl Ord for PendingInterrupt {
    // Highest level first; equal levels are served in arrival order.
    fn cmp(&self, other: &Self) -> Ordering {
        self.level
            .cmp(&other.level)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for PendingInterrupt {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Priority queue of device interrupt requests, highest level on top.
#[derive(Debug, Default)]
pub struct InterruptQueue {
    heap: BinaryHeap<PendingInterrupt>,
    next_seq: u64,
}

impl InterruptQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a request. The 68000 has seven levels, so `level` is clamped to 1..=7.
    pub fn request(&mut self, device: DeviceId, level: i32) {
        let level = level.clamp(1, 7) as u8;
        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(PendingInterrupt { level, device, seq });
    }

    pub fn peek(&self) -> Option<&PendingInterrupt> {
        self.heap.peek()
    }

    pub fn pop(&mut self) -> Option<PendingInterrupt> {
        self.heap.pop()
    }

    /// Drop every request raised by `device`.
    pub fn remove_device(&mut self, device: DeviceId) {
        self.heap.retain(|p| p.device != device);
    }

    pub fn clear(&mut self) {
        self.heap.clear();
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Pending levels, highest priority first.
    pub fn levels(&self) -> Vec<u8> {
        let mut pending: Vec<_> = self.heap.iter().copied().collect();
        pending.sort_by(|a, b| b.cmp(a));
        pending.into_iter().map(|p| p.level).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_highest_level_first() {
        let mut q = InterruptQueue::new();
        let a = DeviceId::next();
        let b = DeviceId::next();
        q.request(a, 2);
        q.request(b, 5);
        q.request(a, 3);

        assert_eq!(q.levels(), vec![5, 3, 2]);
        let top = q.pop().unwrap();
        assert_eq!(top.level, 5);
        assert_eq!(top.device, b);
    }

    #[test]
    fn test_level_is_clamped() {
        let mut q = InterruptQueue::new();
        let dev = DeviceId::next();
        q.request(dev, 12);
        q.request(dev, 0);
        q.request(dev, -3);
        assert_eq!(q.levels(), vec![7, 1, 1]);
    }

    #[test]
    fn test_equal_levels_fifo() {
        let mut q = InterruptQueue::new();
        let first = DeviceId::next();
        let second = DeviceId::next();
        q.request(first, 4);
        q.request(second, 4);
        assert_eq!(q.pop().unwrap().device, first);
        assert_eq!(q.pop().unwrap().device, second);
    }

    #[test]
    fn test_remove_device() {
        let mut q = InterruptQueue::new();
        let keep = DeviceId::next();
        let gone = DeviceId::next();
        q.request(gone, 6);
        q.request(keep, 2);
        q.request(gone, 1);
        q.remove_device(gone);
        assert_eq!(q.len(), 1);
        assert_eq!(q.peek().unwrap().device, keep);
    }
}
