// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use crate::interrupt::{AUTOVECTOR_INTERRUPT, SPURIOUS_INTERRUPT};
use crate::peripherals::{Device, DeviceContext};
use crate::signals::InterruptLine;

const TCR: usize = 0;
const TIVR: usize = 2;
const NULR: usize = 4;
const CPRH: usize = 6;
const CPRM: usize = 8;
const CPRL: usize = 10;
const CNTRH: usize = 14;
const CNTRM: usize = 16;
const CNTRL: usize = 18;
const TSR: usize = 20;
const REGISTER_BYTES: usize = 22;

const TIMER_EVENT: i32 = 100;
/// Virtual microseconds between timer ticks.
pub const TICK_PERIOD_US: u64 = 2000;
/// Counter decrement per tick.
const COUNTS_PER_TICK: u32 = 250;

const MODE_VECTORED: u8 = 5;
const MODE_AUTOVECTOR: u8 = 7;

/// Programmable countdown timer of the ECB board.
///
/// Registers sit on even offsets. Setting TCR bit 0 starts a countdown from
/// the 24-bit preload (CPR); on expiry TSR bit 0 latches, TCR bit 0 clears,
/// and an interrupt is raised if TCR[7:5] selects vectored (5) or
/// autovectored (7) operation.
#[derive(Debug, serde::Serialize)]
pub struct Timer {
    base: u32,
    irq_level: u8,
    regs: [u8; REGISTER_BYTES],
    reload: bool,
    #[serde(skip)]
    irq: InterruptLine,
}

impl Timer {
    pub fn new(base: u32, irq_level: u8) -> Self {
        Self {
            base,
            irq_level: irq_level.clamp(1, 7),
            regs: [0; REGISTER_BYTES],
            reload: true,
            irq: InterruptLine::new(),
        }
    }

    fn register(&self, address: u32) -> Option<usize> {
        let offset = address.checked_sub(self.base)? as usize;
        matches!(
            offset,
            TCR | TIVR | NULR | CPRH | CPRM | CPRL | CNTRH | CNTRM | CNTRL | TSR
        )
        .then_some(offset)
    }

    fn mode(&self) -> u8 {
        self.regs[TCR] >> 5
    }

    fn counter(&self) -> u32 {
        (self.regs[CNTRH] as u32) << 16 | (self.regs[CNTRM] as u32) << 8 | self.regs[CNTRL] as u32
    }

    fn set_counter(&mut self, value: u32) {
        self.regs[CNTRH] = (value >> 16) as u8;
        self.regs[CNTRM] = (value >> 8) as u8;
        self.regs[CNTRL] = value as u8;
    }

    fn load_counter(&mut self) {
        self.regs[CNTRH] = self.regs[CPRH];
        self.regs[CNTRM] = self.regs[CPRM];
        self.regs[CNTRL] = self.regs[CPRL];
    }

    /// Current value of the countdown register.
    pub fn count(&self) -> u32 {
        self.counter()
    }

    fn tick(&mut self, ctx: &mut DeviceContext<'_>) {
        if self.regs[TCR] & 1 == 0 {
            return;
        }
        if self.reload {
            self.reload = false;
            self.load_counter();
        }

        let remaining = self.counter().saturating_sub(COUNTS_PER_TICK);
        self.set_counter(remaining);
        if remaining != 0 {
            return;
        }

        self.reload = true;
        self.regs[TCR] &= 0xFE;
        self.regs[TSR] |= 0x01;
        if matches!(self.mode(), MODE_VECTORED | MODE_AUTOVECTOR) {
            let level = self.irq_level as i32;
            self.interrupt_request(level, ctx);
        }
    }
}

impl Device for Timer {
    fn name(&self) -> &str {
        "Timer"
    }

    fn lowest_address(&self) -> u32 {
        self.base
    }

    fn highest_address(&self) -> u32 {
        self.base.saturating_add(REGISTER_BYTES as u32)
    }

    fn peek(&mut self, address: u32) -> u8 {
        self.register(address).map(|r| self.regs[r]).unwrap_or(0)
    }

    fn poke(&mut self, address: u32, value: u8) {
        match self.register(address) {
            // Counter registers are read-only.
            Some(CNTRH | CNTRM | CNTRL) | None => {}
            Some(r) => self.regs[r] = value,
        }
    }

    fn interrupt_line(&mut self) -> &mut InterruptLine {
        &mut self.irq
    }

    fn reset(&mut self) {
        self.irq.clear();
        self.reload = true;
        self.regs = [0; REGISTER_BYTES];
    }

    fn interrupt_acknowledge(&mut self, level: u8) -> i32 {
        if level > self.irq_level {
            return AUTOVECTOR_INTERRUPT;
        }
        if !self.irq.is_pending() {
            return SPURIOUS_INTERRUPT;
        }
        match self.mode() {
            MODE_VECTORED => {
                self.irq.clear();
                self.regs[TIVR] as i32
            }
            MODE_AUTOVECTOR => {
                self.irq.clear();
                AUTOVECTOR_INTERRUPT
            }
            _ => SPURIOUS_INTERRUPT,
        }
    }

    fn on_attach(&mut self, ctx: &mut DeviceContext<'_>) {
        ctx.schedule(TIMER_EVENT, 0, TICK_PERIOD_US);
    }

    fn event_callback(&mut self, data: i32, _payload: u64, ctx: &mut DeviceContext<'_>) {
        if data == TIMER_EVENT {
            self.tick(ctx);
            ctx.schedule(TIMER_EVENT, 0, TICK_PERIOD_US);
        }
    }

    fn as_any(&self) -> Option<&dyn std::any::Any> {
        Some(self)
    }

    fn as_any_mut(&mut self) -> Option<&mut dyn std::any::Any> {
        Some(self)
    }

    fn snapshot(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}
