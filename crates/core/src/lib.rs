// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

pub mod bus;
pub mod cpu;
pub mod decoder;
pub mod interrupt;
pub mod memory;
pub mod metrics;
pub mod peripherals;
pub mod scheduler;
pub mod signals;
pub mod snapshot;
pub mod system;

use std::collections::{BTreeMap, HashSet};

use cpu::{M68k, StepStatus};
use metrics::Statistics;
use peripherals::Device;

#[cfg(test)]
mod tests;

#[derive(Debug, thiserror::Error)]
pub enum SimulationError {
    #[error("No device mapped at {0:#010x}")]
    Unmapped(u32),
    #[error("Device {name} at [{low:#x}, {high:#x}] does not fit the address space")]
    AttachRejected { name: String, low: u32, high: u32 },
    #[error("No device at index {0}")]
    NoSuchDevice(usize),
    #[error("No address space {0}")]
    NoSuchAddressSpace(usize),
    #[error("Unknown register {0}")]
    UnknownRegister(String),
    #[error("Invalid register value {0:?}")]
    InvalidRegisterValue(String),
}

pub type SimResult<T> = Result<T, SimulationError>;

/// A processor the [`Machine`] driver can run.
pub trait Cpu {
    fn reset(&mut self);

    /// Execute one step. With `trace` set, the step's trace record is
    /// appended to it.
    fn step(&mut self, trace: Option<&mut String>) -> StepStatus;

    fn pc(&self) -> u32;
    fn set_pc(&mut self, pc: u32);

    // Debug access
    fn register_names(&self) -> Vec<String>;
    fn read_register(&self, name: &str) -> SimResult<u32>;
    fn write_register(&mut self, name: &str, value: &str) -> SimResult<()>;
    fn read_byte(&mut self, address: u32) -> SimResult<u8>;
    fn write_byte(&mut self, address: u32, value: u8) -> SimResult<()>;
    fn snapshot(&self) -> snapshot::CpuSnapshot;
    fn device_states(&self) -> BTreeMap<String, serde_json::Value>;
    fn statistics(&self) -> Statistics;
}

impl Cpu for M68k {
    fn reset(&mut self) {
        M68k::reset(self)
    }

    fn step(&mut self, trace: Option<&mut String>) -> StepStatus {
        self.execute_instruction(trace)
    }

    fn pc(&self) -> u32 {
        M68k::pc(self)
    }

    fn set_pc(&mut self, pc: u32) {
        M68k::set_pc(self, pc)
    }

    fn register_names(&self) -> Vec<String> {
        self.register_info().into_iter().map(|r| r.name).collect()
    }

    fn read_register(&self, name: &str) -> SimResult<u32> {
        self.register_by_name(name)
    }

    fn write_register(&mut self, name: &str, value: &str) -> SimResult<()> {
        self.set_register_by_name(name, value)
    }

    fn read_byte(&mut self, address: u32) -> SimResult<u8> {
        self.bus_mut(0)
            .ok_or(SimulationError::NoSuchAddressSpace(0))?
            .peek(address)
            .ok_or(SimulationError::Unmapped(address))
    }

    fn write_byte(&mut self, address: u32, value: u8) -> SimResult<()> {
        let bus = self
            .bus_mut(0)
            .ok_or(SimulationError::NoSuchAddressSpace(0))?;
        if bus.poke(address, value) {
            Ok(())
        } else {
            Err(SimulationError::Unmapped(address))
        }
    }

    fn snapshot(&self) -> snapshot::CpuSnapshot {
        M68k::snapshot(self)
    }

    fn device_states(&self) -> BTreeMap<String, serde_json::Value> {
        self.bus(0).map(|bus| bus.snapshot()).unwrap_or_default()
    }

    fn statistics(&self) -> Statistics {
        M68k::statistics(self)
    }
}

/// Trait for controlling the machine in debug mode
pub trait DebugControl {
    fn add_breakpoint(&mut self, addr: u32);
    fn remove_breakpoint(&mut self, addr: u32);
    fn clear_breakpoints(&mut self);

    /// Run until a breakpoint, a BREAK instruction, a halt, or the step
    /// limit.
    fn run(&mut self, max_steps: Option<u64>) -> SimResult<StopReason>;

    /// Step a single instruction
    fn step_single(&mut self) -> SimResult<StopReason>;

    fn read_register(&self, name: &str) -> SimResult<u32>;
    fn write_register(&mut self, name: &str, value: &str) -> SimResult<()>;

    fn read_memory(&mut self, addr: u32, len: usize) -> SimResult<Vec<u8>>;
    fn write_memory(&mut self, addr: u32, data: &[u8]) -> SimResult<()>;

    fn pc(&self) -> u32;
    fn set_pc(&mut self, addr: u32);
    fn register_names(&self) -> Vec<String>;
    fn step_count(&self) -> u64;
    fn reset(&mut self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    Breakpoint(u32),
    StepDone,
    MaxStepsReached,
    BreakInstruction,
    Halted,
}

impl std::fmt::Display for StopReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StopReason::Breakpoint(pc) => write!(f, "breakpoint at {:#010x}", pc),
            StopReason::StepDone => f.write_str("step done"),
            StopReason::MaxStepsReached => f.write_str("step limit reached"),
            StopReason::BreakInstruction => f.write_str(StepStatus::Break.message()),
            StopReason::Halted => f.write_str(StepStatus::Halted.message()),
        }
    }
}

/// Step driver around a CPU: breakpoints, step limits and optional trace
/// capture.
pub struct Machine<C: Cpu> {
    pub cpu: C,

    // Debug state
    pub breakpoints: HashSet<u32>,
    pub total_steps: u64,
    trace: Option<Vec<String>>,
}

impl<C: Cpu> Machine<C> {
    pub fn new(cpu: C) -> Self {
        Self {
            cpu,
            breakpoints: HashSet::new(),
            total_steps: 0,
            trace: None,
        }
    }

    /// Collect a trace record per step. The scheduler does not advance
    /// while tracing.
    pub fn set_tracing(&mut self, enabled: bool) {
        self.trace = enabled.then(Vec::new);
    }

    /// Trace records collected since the last call.
    pub fn take_trace(&mut self) -> Vec<String> {
        self.trace.as_mut().map(std::mem::take).unwrap_or_default()
    }

    pub fn step(&mut self) -> StopReason {
        self.total_steps += 1;
        let status = match &mut self.trace {
            Some(records) => {
                let mut record = String::new();
                let status = self.cpu.step(Some(&mut record));
                records.push(record);
                status
            }
            None => self.cpu.step(None),
        };
        match status {
            StepStatus::Ok => StopReason::StepDone,
            StepStatus::Break => StopReason::BreakInstruction,
            StepStatus::Halted => StopReason::Halted,
        }
    }

    pub fn snapshot(&self) -> snapshot::MachineSnapshot {
        snapshot::MachineSnapshot {
            cpu: self.cpu.snapshot(),
            devices: self.cpu.device_states(),
            statistics: self.cpu.statistics(),
        }
    }
}

impl<C: Cpu> DebugControl for Machine<C> {
    fn add_breakpoint(&mut self, addr: u32) {
        self.breakpoints.insert(addr);
    }

    fn remove_breakpoint(&mut self, addr: u32) {
        self.breakpoints.remove(&addr);
    }

    fn clear_breakpoints(&mut self) {
        self.breakpoints.clear();
    }

    fn run(&mut self, max_steps: Option<u64>) -> SimResult<StopReason> {
        let mut steps = 0u64;
        loop {
            // A breakpoint at the starting PC does not stop a resumed run.
            let pc = self.cpu.pc();
            if steps > 0 && self.breakpoints.contains(&pc) {
                tracing::debug!("breakpoint hit at {:#010x}", pc);
                return Ok(StopReason::Breakpoint(pc));
            }
            if let Some(max) = max_steps {
                if steps >= max {
                    return Ok(StopReason::MaxStepsReached);
                }
            }

            match self.step() {
                StopReason::StepDone => {}
                reason => return Ok(reason),
            }
            steps += 1;
        }
    }

    fn step_single(&mut self) -> SimResult<StopReason> {
        Ok(self.step())
    }

    fn read_register(&self, name: &str) -> SimResult<u32> {
        self.cpu.read_register(name)
    }

    fn write_register(&mut self, name: &str, value: &str) -> SimResult<()> {
        self.cpu.write_register(name, value)
    }

    fn read_memory(&mut self, addr: u32, len: usize) -> SimResult<Vec<u8>> {
        (0..len)
            .map(|i| self.cpu.read_byte(addr.wrapping_add(i as u32)))
            .collect()
    }

    fn write_memory(&mut self, addr: u32, data: &[u8]) -> SimResult<()> {
        for (i, byte) in data.iter().enumerate() {
            self.cpu.write_byte(addr.wrapping_add(i as u32), *byte)?;
        }
        Ok(())
    }

    fn pc(&self) -> u32 {
        self.cpu.pc()
    }

    fn set_pc(&mut self, addr: u32) {
        self.cpu.set_pc(addr);
    }

    fn register_names(&self) -> Vec<String> {
        self.cpu.register_names()
    }

    fn step_count(&self) -> u64 {
        self.total_steps
    }

    fn reset(&mut self) {
        self.cpu.reset();
        self.total_steps = 0;
    }
}
