// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use crate::cpu::{CpuModel, CpuState};
use crate::metrics::Statistics;
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Serialize, Debug, Clone)]
pub struct MachineSnapshot {
    pub cpu: CpuSnapshot,
    pub devices: BTreeMap<String, serde_json::Value>,
    pub statistics: Statistics,
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct CpuSnapshot {
    pub model: CpuModel,
    pub state: CpuState,
    /// Register name to value, in register-file order.
    pub registers: Vec<(String, u32)>,
    /// Levels of queued interrupt requests, highest priority first.
    pub pending_levels: Vec<u8>,
}

impl CpuSnapshot {
    pub fn register(&self, name: &str) -> Option<u32> {
        self.registers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| *v)
    }
}
