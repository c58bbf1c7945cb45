// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

pub mod m68681;
pub mod ram;
pub mod timer;

use crate::interrupt::InterruptQueue;
use crate::scheduler::EventScheduler;
use crate::signals::InterruptLine;
use std::any::Any;
use std::sync::atomic::{AtomicU32, Ordering};

static NEXT_DEVICE_ID: AtomicU32 = AtomicU32::new(1);

/// Process-unique handle naming an attached device.
///
/// Scheduler events and interrupt requests refer to their device through
/// this id rather than through a reference, so a detached device simply
/// stops matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize)]
pub struct DeviceId(u32);

impl DeviceId {
    pub fn next() -> Self {
        DeviceId(NEXT_DEVICE_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn raw(self) -> u32 {
        self.0
    }
}

impl std::fmt::Display for DeviceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "dev#{}", self.0)
    }
}

/// What a device may touch while handling a callback: the scheduler (to
/// request further callbacks) and the CPU's interrupt queue.
pub struct DeviceContext<'a> {
    pub id: DeviceId,
    pub scheduler: &'a mut EventScheduler,
    pub interrupts: &'a mut InterruptQueue,
}

impl DeviceContext<'_> {
    /// Request a callback after `delay_us` microseconds of virtual time.
    pub fn schedule(&mut self, data: i32, payload: u64, delay_us: u64) {
        self.scheduler.add(self.id, data, payload, delay_us);
    }
}

/// A memory-mapped device attached to a [`crate::bus::MemoryBus`].
pub trait Device: std::fmt::Debug + Send {
    fn name(&self) -> &str;

    /// Lowest byte address decoded by the device.
    fn lowest_address(&self) -> u32;

    /// Highest byte address decoded by the device (inclusive).
    fn highest_address(&self) -> u32;

    fn check_mapped(&self, address: u32) -> bool {
        self.lowest_address() <= address && address <= self.highest_address()
    }

    fn peek(&mut self, address: u32) -> u8;

    fn poke(&mut self, address: u32, value: u8);

    /// Big-endian read of 1, 2 or 4 bytes.
    fn peek_sized(&mut self, address: u32, size: u32) -> Option<u32> {
        if !matches!(size, 1 | 2 | 4) {
            return None;
        }
        let mut value = 0u32;
        for offset in 0..size {
            value = (value << 8) | self.peek(address.wrapping_add(offset)) as u32;
        }
        Some(value)
    }

    /// Big-endian write of 1, 2 or 4 bytes.
    fn poke_sized(&mut self, address: u32, size: u32, value: u32) -> bool {
        if !matches!(size, 1 | 2 | 4) {
            return false;
        }
        for offset in 0..size {
            let shift = 8 * (size - 1 - offset);
            self.poke(address.wrapping_add(offset), (value >> shift) as u8);
        }
        true
    }

    /// The device's interrupt-pending flag.
    fn interrupt_line(&mut self) -> &mut InterruptLine;

    fn reset(&mut self) {
        self.interrupt_line().clear();
    }

    /// Raise an interrupt toward the CPU, at most once until acknowledged.
    fn interrupt_request(&mut self, level: i32, ctx: &mut DeviceContext<'_>) -> bool {
        self.interrupt_line().request(level, ctx)
    }

    /// Answer the CPU's acknowledge cycle with a vector number or one of
    /// [`crate::interrupt::AUTOVECTOR_INTERRUPT`] / [`crate::interrupt::SPURIOUS_INTERRUPT`].
    fn interrupt_acknowledge(&mut self, _level: u8) -> i32 {
        self.interrupt_line().acknowledge()
    }

    /// Called once the device is owned by a bus.
    fn on_attach(&mut self, _ctx: &mut DeviceContext<'_>) {}

    /// Called after a CPU write to the device. Register writes that start
    /// timed activity or change interrupt status act on it here.
    fn after_write(&mut self, _ctx: &mut DeviceContext<'_>) {}

    /// Called by the scheduler for an event this device requested.
    fn event_callback(&mut self, _data: i32, _payload: u64, _ctx: &mut DeviceContext<'_>) {}

    fn as_any(&self) -> Option<&dyn Any> {
        None
    }

    fn as_any_mut(&mut self) -> Option<&mut dyn Any> {
        None
    }

    fn snapshot(&self) -> serde_json::Value {
        serde_json::Value::Null
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Default)]
    struct Latch {
        regs: [u8; 4],
        irq: InterruptLine,
    }

    impl Device for Latch {
        fn name(&self) -> &str {
            "latch"
        }
        fn lowest_address(&self) -> u32 {
            0x100
        }
        fn highest_address(&self) -> u32 {
            0x103
        }
        fn peek(&mut self, address: u32) -> u8 {
            self.regs[(address - 0x100) as usize]
        }
        fn poke(&mut self, address: u32, value: u8) {
            self.regs[(address - 0x100) as usize] = value;
        }
        fn interrupt_line(&mut self) -> &mut InterruptLine {
            &mut self.irq
        }
    }

    #[test]
    fn test_default_sized_access_is_big_endian() {
        let mut dev = Latch::default();
        assert!(dev.poke_sized(0x100, 4, 0x1234_5678));
        assert_eq!(dev.regs, [0x12, 0x34, 0x56, 0x78]);
        assert_eq!(dev.peek_sized(0x102, 2), Some(0x5678));
        assert_eq!(dev.peek_sized(0x100, 3), None);
        assert!(!dev.poke_sized(0x100, 8, 0));
    }

    #[test]
    fn test_reset_clears_pending() {
        let mut dev = Latch::default();
        dev.interrupt_line().set_pending();
        dev.reset();
        assert!(!dev.interrupt_line().is_pending());
        assert_eq!(
            dev.interrupt_acknowledge(3),
            crate::interrupt::SPURIOUS_INTERRUPT
        );
    }

    #[test]
    fn test_device_ids_are_unique() {
        let a = DeviceId::next();
        let b = DeviceId::next();
        assert_ne!(a, b);
        assert!(b.raw() > a.raw());
    }
}
