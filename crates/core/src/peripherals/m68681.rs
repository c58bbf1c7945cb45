// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! Motorola 68681 dual UART.
//!
//! Two channels, A and B, each with mode, status, clock-select, command,
//! receive and transmit registers. Transmitted characters go to a byte sink
//! (and optionally stdout); received characters come from a per-channel
//! input queue filled with [`Duart::receive`]. Character timing follows the
//! clock-select baud rate through the event scheduler.

use crate::interrupt::SPURIOUS_INTERRUPT;
use crate::peripherals::{Device, DeviceContext};
use crate::signals::InterruptLine;
use std::collections::VecDeque;
use std::io::{self, Write};
use std::sync::{Arc, Mutex};

// Register numbers, before scaling by the register spacing.
const MR_A: u32 = 0;
const SR_CSR_A: u32 = 1;
const CR_A: u32 = 2;
const RB_TB_A: u32 = 3;
const IPCR_ACR: u32 = 4;
const ISR_IMR: u32 = 5;
const CUR_CTUR: u32 = 6;
const CLR_CTLR: u32 = 7;
const MR_B: u32 = 8;
const SR_CSR_B: u32 = 9;
const CR_B: u32 = 10;
const RB_TB_B: u32 = 11;
const IVR: u32 = 12;
const REGISTER_COUNT: u32 = 16;

// Status register bits.
pub const RX_RDY: u8 = 0x01;
pub const FFULL: u8 = 0x02;
pub const TX_RDY: u8 = 0x04;
pub const TX_EMT: u8 = 0x08;

/// IVR after reset: the 68000's uninitialized interrupt vector.
const UNINITIALIZED_VECTOR: u8 = 0x0f;

const TX_EVENT: i32 = 1;
const RX_EVENT: i32 = 3;

/// Receiver poll interval while nothing is arriving, in microseconds.
pub const RX_IDLE_POLL_US: u64 = 50_000;

/// Microseconds per character (8 bits) for each clock-select code. The
/// second half is baud rate set 2, selected by ACR bit 7.
const BAUD_PERIOD_US: [u64; 32] = [
    160_000, 72_727, 59_479, 40_000, 26_666, 13_333, 6_666, 7_619, //
    3_333, 1_666, 1_111, 833, 208, 1_666, 1_666, 1_666, //
    106_666, 72_727, 59_479, 53_333, 26_666, 13_333, 6_666, 4_000, //
    3_333, 1_666, 4_444, 833, 416, 1_666, 1_666, 1_666,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Port {
    A = 0,
    B = 1,
}

#[derive(Debug, Default, serde::Serialize)]
struct Channel {
    mr1: u8,
    mr2: u8,
    sr: u8,
    csr: u8,
    cr: u8,
    rb: u8,
    tb: u8,
    /// The mode register address selects MR1 until it is accessed once.
    mr1_selected: bool,
    receiver_enabled: bool,
    transmitter_enabled: bool,
    /// TB written; the send event is not scheduled yet.
    tx_queued: bool,
    #[serde(skip)]
    input: VecDeque<u8>,
}

impl Channel {
    fn reset(&mut self) {
        self.sr = 0;
        self.receiver_enabled = false;
        self.transmitter_enabled = false;
        self.tx_queued = false;
        self.mr1_selected = true;
    }

    /// Strip bits beyond the configured character length (MR1[1:0]).
    fn mask_char(&self, c: u8) -> u8 {
        match self.mr1 & 3 {
            0 => c & 0x1f,
            1 => c & 0x3f,
            2 => c & 0x7f,
            _ => c,
        }
    }

    /// Automatic-echo channel mode, MR2[7:6] = 01.
    fn auto_echo(&self) -> bool {
        (self.mr2 >> 6) & 3 == 1
    }

    /// Whether the channel's receiver interrupt source is active. MR1 bit 6
    /// selects FFULL instead of RxRDY.
    fn rx_interrupt(&self) -> bool {
        if self.mr1 & 0x40 != 0 {
            self.sr & FFULL != 0
        } else {
            self.sr & RX_RDY != 0
        }
    }

    fn read_mode(&mut self) -> u8 {
        if self.mr1_selected {
            self.mr1_selected = false;
            self.mr1
        } else {
            self.mr2
        }
    }

    fn write_mode(&mut self, value: u8) {
        if self.mr1_selected {
            self.mr1_selected = false;
            self.mr1 = value;
        } else {
            self.mr2 = value;
        }
    }

    fn read_buffer(&mut self) -> u8 {
        self.sr &= !(RX_RDY | FFULL);
        self.rb
    }

    fn command(&mut self, value: u8) {
        self.cr = value;
        match (value >> 4) & 7 {
            1 => self.mr1_selected = true,
            2 => {
                self.receiver_enabled = false;
                self.sr &= !(RX_RDY | FFULL);
            }
            3 => {
                self.transmitter_enabled = false;
                self.sr &= !(TX_RDY | TX_EMT);
            }
            // Clear error status.
            4 => self.sr &= 0x0f,
            _ => {}
        }
        match (value >> 2) & 3 {
            1 => {
                self.transmitter_enabled = true;
                self.sr |= TX_RDY | TX_EMT;
            }
            2 => {
                self.transmitter_enabled = false;
                self.sr &= !(TX_RDY | TX_EMT);
            }
            _ => {}
        }
        match value & 3 {
            1 => {
                self.receiver_enabled = true;
                self.sr &= !(RX_RDY | FFULL);
            }
            2 => self.receiver_enabled = false,
            _ => {}
        }
    }

    fn write_buffer(&mut self, value: u8) {
        self.tb = value;
        self.sr &= !(TX_RDY | TX_EMT);
        self.tx_queued = true;
    }
}

/// The 68681 DUART.
///
/// Register `n` sits at `base + first_offset + n * spacing`. Reads and
/// writes share addresses the way the chip does (SR/CSR, RB/TB, ISR/IMR).
#[derive(Debug, serde::Serialize)]
pub struct Duart {
    base: u32,
    first_offset: u32,
    spacing: u32,
    irq_level: u8,
    channels: [Channel; 2],
    ipcr: u8,
    acr: u8,
    isr: u8,
    imr: u8,
    ctur: u8,
    ctlr: u8,
    ivr: u8,
    echo_stdout: bool,
    #[serde(skip)]
    sink: Option<Arc<Mutex<Vec<u8>>>>,
    #[serde(skip)]
    irq: InterruptLine,
}

impl Duart {
    pub fn new(base: u32, first_offset: u32, spacing: u32, irq_level: u8) -> Self {
        let mut duart = Self {
            base,
            first_offset,
            spacing: spacing.max(1),
            irq_level: irq_level.clamp(1, 7),
            channels: [Channel::default(), Channel::default()],
            ipcr: 0,
            acr: 0,
            isr: 0,
            imr: 0,
            ctur: 0,
            ctlr: 0,
            ivr: UNINITIALIZED_VECTOR,
            echo_stdout: true,
            sink: None,
            irq: InterruptLine::new(),
        };
        duart.reset();
        duart
    }

    /// Capture transmitted bytes in `sink`, and print them to stdout when
    /// `echo_stdout` is set.
    pub fn set_sink(&mut self, sink: Option<Arc<Mutex<Vec<u8>>>>, echo_stdout: bool) {
        self.sink = sink;
        self.echo_stdout = echo_stdout;
    }

    /// Queue characters for a channel's receiver.
    pub fn receive(&mut self, port: Port, bytes: &[u8]) {
        self.channels[port as usize].input.extend(bytes);
    }

    pub fn status(&self, port: Port) -> u8 {
        self.channels[port as usize].sr
    }

    fn register(&self, address: u32) -> Option<u32> {
        let offset = address.checked_sub(self.base)?.checked_sub(self.first_offset)?;
        (offset % self.spacing == 0)
            .then_some(offset / self.spacing)
            .filter(|&r| r < REGISTER_COUNT)
    }

    fn character_period(&self, clock_select: u8) -> u64 {
        let set = if self.acr & 0x80 != 0 { 16 } else { 0 };
        BAUD_PERIOD_US[(clock_select & 0x0f) as usize + set]
    }

    fn update_isr(&mut self) {
        let [a, b] = &self.channels;
        let mut isr = 0;
        if a.sr & TX_RDY != 0 {
            isr |= 0x01;
        }
        if a.rx_interrupt() {
            isr |= 0x02;
        }
        if b.sr & TX_RDY != 0 {
            isr |= 0x10;
        }
        if b.rx_interrupt() {
            isr |= 0x20;
        }
        self.isr = isr;
    }

    /// Recompute ISR and interrupt if an unmasked source is active.
    fn raise(&mut self, ctx: &mut DeviceContext<'_>) {
        self.update_isr();
        if self.isr & self.imr != 0 {
            let level = self.irq_level as i32;
            self.interrupt_request(level, ctx);
        }
    }

    fn emit(&mut self, c: u8) {
        if let Some(sink) = &self.sink {
            if let Ok(mut guard) = sink.lock() {
                guard.push(c);
            }
        }
        if self.echo_stdout {
            let mut out = io::stdout();
            if let Err(e) = out.write_all(&[c]).and_then(|_| out.flush()) {
                tracing::warn!("DUART stdout echo failed: {}", e);
            }
        }
    }

    fn transmit(&mut self, channel: usize) {
        let ch = &mut self.channels[channel];
        if !ch.transmitter_enabled {
            return;
        }
        let c = ch.mask_char(ch.tb);
        let echo = ch.auto_echo();
        ch.sr |= TX_RDY | TX_EMT;
        // In automatic-echo mode the transmitter is disconnected.
        if !echo {
            self.emit(c);
        }
    }

    fn poll_receiver(&mut self, channel: usize, ctx: &mut DeviceContext<'_>) {
        let data = RX_EVENT + channel as i32;
        let ch = &mut self.channels[channel];
        if !ch.receiver_enabled || ch.sr & FFULL != 0 {
            ctx.schedule(data, 0, RX_IDLE_POLL_US);
            return;
        }
        let Some(c) = ch.input.pop_front() else {
            ctx.schedule(data, 0, RX_IDLE_POLL_US);
            return;
        };

        ch.rb = ch.mask_char(c);
        ch.sr |= RX_RDY | FFULL;
        let (rb, echo, csr) = (ch.rb, ch.auto_echo(), ch.csr);
        if echo {
            self.emit(rb);
        }
        ctx.schedule(data, 0, self.character_period(csr >> 4));
    }
}

impl Device for Duart {
    fn name(&self) -> &str {
        "M68681"
    }

    fn lowest_address(&self) -> u32 {
        self.base
    }

    fn highest_address(&self) -> u32 {
        self.base
            .saturating_add(self.first_offset)
            .saturating_add((REGISTER_COUNT - 1).saturating_mul(self.spacing))
    }

    fn peek(&mut self, address: u32) -> u8 {
        let value = match self.register(address) {
            Some(MR_A) => self.channels[0].read_mode(),
            Some(SR_CSR_A) => self.channels[0].sr,
            Some(RB_TB_A) => self.channels[0].read_buffer(),
            Some(IPCR_ACR) => self.ipcr,
            Some(ISR_IMR) => self.isr,
            Some(CUR_CTUR) => self.ctur,
            Some(CLR_CTLR) => self.ctlr,
            Some(MR_B) => self.channels[1].read_mode(),
            Some(SR_CSR_B) => self.channels[1].sr,
            Some(RB_TB_B) => self.channels[1].read_buffer(),
            Some(IVR) => self.ivr,
            _ => 0,
        };
        self.update_isr();
        value
    }

    fn poke(&mut self, address: u32, value: u8) {
        match self.register(address) {
            Some(MR_A) => self.channels[0].write_mode(value),
            Some(SR_CSR_A) => self.channels[0].csr = value,
            Some(CR_A) => self.channels[0].command(value),
            Some(RB_TB_A) => self.channels[0].write_buffer(value),
            Some(IPCR_ACR) => self.acr = value,
            Some(ISR_IMR) => self.imr = value,
            Some(CUR_CTUR) => self.ctur = value,
            Some(CLR_CTLR) => self.ctlr = value,
            Some(MR_B) => self.channels[1].write_mode(value),
            Some(SR_CSR_B) => self.channels[1].csr = value,
            Some(CR_B) => self.channels[1].command(value),
            Some(RB_TB_B) => self.channels[1].write_buffer(value),
            Some(IVR) => self.ivr = value,
            _ => {}
        }
        self.update_isr();
    }

    fn interrupt_line(&mut self) -> &mut InterruptLine {
        &mut self.irq
    }

    fn reset(&mut self) {
        self.irq.clear();
        self.ivr = UNINITIALIZED_VECTOR;
        self.isr = 0;
        self.imr = 0;
        for ch in &mut self.channels {
            ch.reset();
        }
    }

    /// Always vectored through IVR.
    fn interrupt_acknowledge(&mut self, _level: u8) -> i32 {
        if !self.irq.is_pending() {
            return SPURIOUS_INTERRUPT;
        }
        self.irq.clear();
        self.ivr as i32
    }

    fn on_attach(&mut self, ctx: &mut DeviceContext<'_>) {
        ctx.schedule(RX_EVENT, 0, RX_IDLE_POLL_US);
        ctx.schedule(RX_EVENT + 1, 0, RX_IDLE_POLL_US);
    }

    fn after_write(&mut self, ctx: &mut DeviceContext<'_>) {
        for channel in 0..2 {
            if std::mem::take(&mut self.channels[channel].tx_queued) {
                let period = self.character_period(self.channels[channel].csr);
                ctx.schedule(TX_EVENT + channel as i32, 0, period);
            }
        }
        self.raise(ctx);
    }

    fn event_callback(&mut self, data: i32, _payload: u64, ctx: &mut DeviceContext<'_>) {
        match data {
            d if d == TX_EVENT || d == TX_EVENT + 1 => self.transmit((d - TX_EVENT) as usize),
            d if d == RX_EVENT || d == RX_EVENT + 1 => {
                self.poll_receiver((d - RX_EVENT) as usize, ctx)
            }
            _ => return,
        }
        self.raise(ctx);
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
