// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Execution counters of one CPU.
#[derive(Debug)]
pub struct CpuMetrics {
    instructions: AtomicU64,
    exceptions: AtomicU64,
    interrupts: AtomicU64,
    start_time: Instant,
}

/// Point-in-time copy of [`CpuMetrics`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Statistics {
    pub instructions: u64,
    pub exceptions: u64,
    pub interrupts: u64,
    pub instructions_per_second: f64,
}

impl Statistics {
    /// Label/value pairs for display.
    pub fn rows(&self) -> Vec<(String, String)> {
        vec![
            ("Instructions executed".to_string(), self.instructions.to_string()),
            ("Exceptions taken".to_string(), self.exceptions.to_string()),
            ("Interrupts serviced".to_string(), self.interrupts.to_string()),
            (
                "Instructions per second".to_string(),
                format!("{:.0}", self.instructions_per_second),
            ),
        ]
    }
}

impl Default for CpuMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl CpuMetrics {
    pub fn new() -> Self {
        Self {
            instructions: AtomicU64::new(0),
            exceptions: AtomicU64::new(0),
            interrupts: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    pub fn reset(&self) {
        self.instructions.store(0, Ordering::SeqCst);
        self.exceptions.store(0, Ordering::SeqCst);
        self.interrupts.store(0, Ordering::SeqCst);
    }

    pub fn record_instruction(&self) {
        self.instructions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_exception(&self) {
        self.exceptions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_interrupt(&self) {
        self.interrupts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get_instructions(&self) -> u64 {
        self.instructions.load(Ordering::SeqCst)
    }

    pub fn get_exceptions(&self) -> u64 {
        self.exceptions.load(Ordering::SeqCst)
    }

    pub fn get_interrupts(&self) -> u64 {
        self.interrupts.load(Ordering::SeqCst)
    }

    pub fn get_ips(&self) -> f64 {
        let elapsed = self.start_time.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            self.get_instructions() as f64 / elapsed
        } else {
            0.0
        }
    }

    pub fn statistics(&self) -> Statistics {
        Statistics {
            instructions: self.get_instructions(),
            exceptions: self.get_exceptions(),
            interrupts: self.get_interrupts(),
            instructions_per_second: self.get_ips(),
        }
    }
}
