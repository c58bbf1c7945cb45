// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! Virtual-time event scheduler.
//!
//! Devices ask for callbacks some number of microseconds in the future. Each
//! `check` advances virtual time by a budget of nanoseconds and dispatches
//! every event that has come due. The budget is self-calibrated from the
//! host's wall clock so that one second of host time is roughly one second
//! of virtual time, but nothing here guarantees real deadlines.

use crate::peripherals::DeviceId;
use std::time::Instant;
use tracing::debug;

const NS_PER_SECOND: u64 = 1_000_000_000;
const NS_PER_US: u64 = 1_000;
const DEFAULT_NS_PER_CHECK: u64 = 1_000;

/// A pending device callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    /// Device the callback is routed to. Not an owning reference.
    pub owner: DeviceId,
    pub data: i32,
    pub payload: u64,
    fire_at: u64,
}

impl Event {
    /// Absolute virtual time (ns) at which the event fires.
    pub fn fire_at(&self) -> u64 {
        self.fire_at
    }
}

#[derive(Debug)]
enum Calibration {
    WallClock {
        epoch: Instant,
        last_second: u64,
        iterations: u64,
    },
    Fixed,
}

/// Time-ordered queue of device callbacks.
///
/// Events are kept sorted by absolute fire time; events with equal fire
/// times keep their insertion order.
#[derive(Debug)]
pub struct EventScheduler {
    events: Vec<Event>,
    now: u64,
    ns_per_check: u64,
    calibration: Calibration,
}

impl Default for EventScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl EventScheduler {
    pub fn new() -> Self {
        Self {
            events: Vec::new(),
            now: 0,
            ns_per_check: DEFAULT_NS_PER_CHECK,
            calibration: Calibration::WallClock {
                epoch: Instant::now(),
                last_second: 0,
                iterations: 0,
            },
        }
    }

    /// A scheduler that advances a fixed amount of virtual time per `check`,
    /// independent of host speed.
    pub fn with_fixed_budget(ns_per_check: u64) -> Self {
        Self {
            events: Vec::new(),
            now: 0,
            ns_per_check: ns_per_check.max(1),
            calibration: Calibration::Fixed,
        }
    }

    /// Schedule a callback for `owner` after `delay_us` microseconds of virtual time.
    pub fn add(&mut self, owner: DeviceId, data: i32, payload: u64, delay_us: u64) {
        let fire_at = self.now.saturating_add(delay_us.saturating_mul(NS_PER_US));
        let at = self.events.partition_point(|e| e.fire_at <= fire_at);
        self.events.insert(
            at,
            Event {
                owner,
                data,
                payload,
                fire_at,
            },
        );
    }

    /// Cancel every pending event of `owner`. Other events keep their fire times.
    pub fn remove(&mut self, owner: DeviceId) -> usize {
        let before = self.events.len();
        self.events.retain(|e| e.owner != owner);
        before - self.events.len()
    }

    /// Advance virtual time by one budget and dispatch the events that came due.
    ///
    /// Events are dispatched in fire-time order, in batches. `dispatch` may
    /// schedule new events; those are relative to the end of the current
    /// window, so only zero-delay events fire in this same call.
    pub fn check<F>(&mut self, mut dispatch: F)
    where
        F: FnMut(&mut EventScheduler, Event),
    {
        self.recalibrate();
        self.now = self.now.saturating_add(self.ns_per_check);

        loop {
            let due = self.events.partition_point(|e| e.fire_at <= self.now);
            if due == 0 {
                break;
            }
            let batch: Vec<Event> = self.events.drain(..due).collect();
            for event in batch {
                dispatch(self, event);
            }
        }
    }

    fn recalibrate(&mut self) {
        let Calibration::WallClock {
            epoch,
            last_second,
            iterations,
        } = &mut self.calibration
        else {
            return;
        };

        *iterations = iterations.saturating_add(1).max(1);
        let second = epoch.elapsed().as_secs();
        if second > *last_second {
            let elapsed_ns = (second - *last_second).saturating_mul(NS_PER_SECOND);
            self.ns_per_check = (elapsed_ns / *iterations).max(1);
            debug!(
                ns_per_check = self.ns_per_check,
                checks = *iterations,
                "Recalibrated event scheduler"
            );
            *last_second = second;
            *iterations = 0;
        }
    }

    /// Current virtual time in nanoseconds.
    pub fn now(&self) -> u64 {
        self.now
    }

    pub fn ns_per_check(&self) -> u64 {
        self.ns_per_check
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Event> {
        self.events.iter()
    }

    /// Per-event delay relative to the previous event (the head relative to now).
    pub fn deltas(&self) -> Vec<u64> {
        let mut prev = self.now;
        self.events
            .iter()
            .map(|e| {
                let delta = e.fire_at.saturating_sub(prev);
                prev = e.fire_at.max(prev);
                delta
            })
            .collect()
    }
}
