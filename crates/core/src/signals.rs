// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use crate::interrupt::{AUTOVECTOR_INTERRUPT, SPURIOUS_INTERRUPT};
use crate::peripherals::DeviceContext;

/// The interrupt-pending flag every device carries.
///
/// A line raises at most one request at a time: further requests are
/// swallowed until the CPU acknowledges the pending one.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct InterruptLine {
    pending: bool,
}

impl InterruptLine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raise an interrupt at `level` unless one is already pending.
    /// Returns true if a request was forwarded to the CPU.
    pub fn request(&mut self, level: i32, ctx: &mut DeviceContext<'_>) -> bool {
        if self.pending {
            return false;
        }
        self.pending = true;
        ctx.interrupts.request(ctx.id, level);
        true
    }

    /// Default acknowledge cycle: autovector while pending, spurious otherwise.
    pub fn acknowledge(&mut self) -> i32 {
        if self.pending {
            self.pending = false;
            AUTOVECTOR_INTERRUPT
        } else {
            SPURIOUS_INTERRUPT
        }
    }

    pub fn set_pending(&mut self) {
        self.pending = true;
    }

    pub fn clear(&mut self) {
        self.pending = false;
    }

    pub fn is_pending(&self) -> bool {
        self.pending
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interrupt::InterruptQueue;
    use crate::peripherals::DeviceId;
    use crate::scheduler::EventScheduler;

    #[test]
    fn test_interrupt_line_requests_once() {
        let mut scheduler = EventScheduler::with_fixed_budget(1000);
        let mut queue = InterruptQueue::new();
        let id = DeviceId::next();
        let mut ctx = DeviceContext {
            id,
            scheduler: &mut scheduler,
            interrupts: &mut queue,
        };

        let mut irq = InterruptLine::new();
        assert!(irq.request(4, &mut ctx));
        assert!(!irq.request(4, &mut ctx));
        assert!(irq.is_pending());
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_interrupt_line_acknowledge() {
        let mut irq = InterruptLine::new();
        assert_eq!(irq.acknowledge(), SPURIOUS_INTERRUPT);
        irq.set_pending();
        assert_eq!(irq.acknowledge(), AUTOVECTOR_INTERRUPT);
        assert!(!irq.is_pending());
        irq.set_pending();
        irq.clear();
        assert!(!irq.is_pending());
    }
}
