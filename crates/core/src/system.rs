// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use crate::cpu::{CpuModel, M68k};
use crate::peripherals::m68681::Duart;
use crate::peripherals::ram::Ram;
use crate::peripherals::timer::Timer;
use crate::peripherals::Device;
use crate::scheduler::EventScheduler;
use anyhow::{Context, Result};
use sim68k_config::{BoardDescriptor, CpuKind, DeviceConfig, DeviceType};
use tracing::info;

/// Interrupt level of a timer whose descriptor names none.
pub const DEFAULT_TIMER_IRQ: u8 = 5;
pub const DEFAULT_DUART_IRQ: u8 = 4;
/// ECB wiring: DUART registers on odd bytes.
pub const DEFAULT_DUART_FIRST_OFFSET: u32 = 1;
pub const DEFAULT_DUART_SPACING: u32 = 2;

fn model_for(kind: CpuKind) -> CpuModel {
    match kind {
        CpuKind::M68000 => CpuModel::M68000,
        CpuKind::Cpu32 => CpuModel::Cpu32,
    }
}

fn option_u32(config: &DeviceConfig, key: &str, default: u32) -> Result<u32> {
    match config.config.get(key) {
        None => Ok(default),
        Some(value) => value
            .as_u64()
            .and_then(|v| u32::try_from(v).ok())
            .with_context(|| format!("device '{}': '{}' must be a 32-bit number", config.id, key)),
    }
}

fn option_bool(config: &DeviceConfig, key: &str, default: bool) -> Result<bool> {
    match config.config.get(key) {
        None => Ok(default),
        Some(value) => value
            .as_bool()
            .with_context(|| format!("device '{}': '{}' must be true or false", config.id, key)),
    }
}

fn build_device(config: &DeviceConfig) -> Result<Box<dyn Device>> {
    let base = u32::try_from(config.base_address)
        .with_context(|| format!("device '{}': base address out of range", config.id))?;
    let device: Box<dyn Device> = match config.r#type {
        DeviceType::Ram => {
            let size = config
                .size_bytes()?
                .with_context(|| format!("RAM device '{}' needs a size", config.id))?;
            let size = u32::try_from(size)
                .with_context(|| format!("device '{}': size out of range", config.id))?;
            Box::new(Ram::new(base, size))
        }
        DeviceType::Timer => Box::new(Timer::new(
            base,
            config.irq.unwrap_or(DEFAULT_TIMER_IRQ),
        )),
        DeviceType::Duart => {
            let mut duart = Duart::new(
                base,
                option_u32(config, "offset_to_first_register", DEFAULT_DUART_FIRST_OFFSET)?,
                option_u32(config, "offset_between_registers", DEFAULT_DUART_SPACING)?,
                config.irq.unwrap_or(DEFAULT_DUART_IRQ),
            );
            duart.set_sink(None, option_bool(config, "echo_stdout", true)?);
            Box::new(duart)
        }
    };
    Ok(device)
}

/// Build the CPU a board describes, attach its devices and reset it.
pub fn build_cpu(board: &BoardDescriptor) -> Result<M68k> {
    board.validate()?;
    let model = model_for(board.cpu);
    let scheduler = match board.scheduler.as_ref().and_then(|s| s.fixed_ns_per_check) {
        Some(ns) => EventScheduler::with_fixed_budget(ns),
        None => EventScheduler::new(),
    };
    info!("Building board '{}' ({})", board.name, model);

    let mut cpu = M68k::with_scheduler(model, scheduler);
    for config in &board.devices {
        let device = build_device(config)?;
        cpu.attach_device(0, device)
            .with_context(|| format!("Failed to attach device '{}'", config.id))?;
    }
    cpu.reset();
    Ok(cpu)
}
