// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! YAML board descriptors: which CPU model to build and which devices to
//! attach to its address space.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path;

/// Default schema version for YAML configs
fn default_schema_version() -> String {
    "1.0".to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CpuKind {
    #[serde(alias = "68000", alias = "mc68000")]
    M68000,
    #[serde(alias = "68360", alias = "mc68360")]
    Cpu32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceType {
    Ram,
    Timer,
    /// 68681 dual UART.
    #[serde(alias = "m68681")]
    Duart,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct DeviceConfig {
    pub id: String,
    pub r#type: DeviceType,
    pub base_address: u64,
    /// Human readable, e.g. "64KB" or "16MiB".
    #[serde(default)]
    pub size: Option<String>,
    #[serde(default)]
    pub irq: Option<u8>,
    #[serde(default)]
    pub config: HashMap<String, serde_yaml::Value>,
}

impl DeviceConfig {
    /// The `size` field in bytes, if given.
    pub fn size_bytes(&self) -> Result<Option<u64>> {
        self.size
            .as_deref()
            .map(|s| parse_size(s).with_context(|| format!("device '{}'", self.id)))
            .transpose()
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// Virtual nanoseconds per scheduler check. Disables wall-clock
    /// calibration, which makes runs reproducible.
    #[serde(default)]
    pub fixed_ns_per_check: Option<u64>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct BoardDescriptor {
    #[serde(default = "default_schema_version")]
    pub schema_version: String,
    pub name: String,
    pub cpu: CpuKind,
    #[serde(default)]
    pub devices: Vec<DeviceConfig>,
    #[serde(default)]
    pub scheduler: Option<SchedulerConfig>,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Unsupported schema_version '{0}'. Supported versions: '1.0'")]
    SchemaVersion(String),
    #[error("Duplicate device id '{0}'")]
    DuplicateId(String),
    #[error("Device '{0}' has zero size")]
    ZeroSize(String),
    #[error("RAM device '{0}' needs a size")]
    MissingSize(String),
    #[error("Device '{id}' uses IRQ level {level}; levels are 1 to 7")]
    IrqLevel { id: String, level: u8 },
    #[error("Device '{0}' lies beyond the 32-bit address space")]
    AddressRange(String),
}

impl BoardDescriptor {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read board descriptor at {:?}", path))?;
        let board = Self::from_yaml(&content)
            .with_context(|| format!("Invalid board descriptor {:?}", path))?;
        tracing::info!("Loaded board '{}' from {:?}", board.name, path);
        Ok(board)
    }

    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let board: Self =
            serde_yaml::from_str(yaml).context("Failed to parse Board Descriptor YAML")?;
        board.validate()?;
        Ok(board)
    }

    /// The board used when none is given: a 68000 with 16 MiB of RAM at 0.
    pub fn default_68000() -> Self {
        Self {
            schema_version: default_schema_version(),
            name: "default".to_string(),
            cpu: CpuKind::M68000,
            devices: vec![DeviceConfig {
                id: "ram".to_string(),
                r#type: DeviceType::Ram,
                base_address: 0,
                size: Some("16MiB".to_string()),
                irq: None,
                config: HashMap::new(),
            }],
            scheduler: None,
        }
    }

    pub fn validate(&self) -> std::result::Result<(), ValidationError> {
        if self.schema_version != "1.0" {
            return Err(ValidationError::SchemaVersion(self.schema_version.clone()));
        }

        let mut ids = HashSet::new();
        for dev in &self.devices {
            if !ids.insert(dev.id.as_str()) {
                return Err(ValidationError::DuplicateId(dev.id.clone()));
            }
            if dev.base_address > u32::MAX as u64 {
                return Err(ValidationError::AddressRange(dev.id.clone()));
            }

            let size = dev.size.as_deref().and_then(|s| parse_size(s).ok());
            match (dev.r#type, size) {
                (_, Some(0)) => return Err(ValidationError::ZeroSize(dev.id.clone())),
                (DeviceType::Ram, None) => {
                    return Err(ValidationError::MissingSize(dev.id.clone()))
                }
                (_, Some(size)) if dev.base_address + size - 1 > u32::MAX as u64 => {
                    return Err(ValidationError::AddressRange(dev.id.clone()))
                }
                _ => {}
            }

            if let Some(level) = dev.irq {
                if !(1..=7).contains(&level) {
                    return Err(ValidationError::IrqLevel {
                        id: dev.id.clone(),
                        level,
                    });
                }
            }
        }
        Ok(())
    }
}

pub fn parse_size(size_str: &str) -> Result<u64> {
    use human_size::{Byte, Size, SpecificSize};
    let s: Size = size_str
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid size format: {}", e))?;
    let bytes: SpecificSize<Byte> = s.into();
    Ok(bytes.value() as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn board(devices: &str) -> String {
        format!("name: test\ncpu: m68000\ndevices:\n{}", devices)
    }

    #[test]
    fn test_parse_size_units() {
        assert_eq!(parse_size("64KB").unwrap(), 64_000);
        assert_eq!(parse_size("64KiB").unwrap(), 65_536);
        assert_eq!(parse_size("16MiB").unwrap(), 16 * 1024 * 1024);
        assert!(parse_size("lots").is_err());
    }

    #[test]
    fn test_default_board_is_valid() {
        let board = BoardDescriptor::default_68000();
        assert!(board.validate().is_ok());
        assert_eq!(board.devices[0].size_bytes().unwrap(), Some(0x100_0000));
    }

    #[test]
    fn test_cpu_aliases() {
        let yaml = "name: ecb\ncpu: \"68360\"\n";
        let board = BoardDescriptor::from_yaml(yaml).unwrap();
        assert_eq!(board.cpu, CpuKind::Cpu32);
        assert!(board.devices.is_empty());
        assert_eq!(board.schema_version, "1.0");
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let yaml = board(
            "  - { id: mem, type: ram, base_address: 0, size: 1KiB }\n  - { id: mem, type: timer, base_address: 0x10000 }\n",
        );
        let err = BoardDescriptor::from_yaml(&yaml).unwrap_err();
        assert_eq!(
            err.downcast_ref::<ValidationError>(),
            Some(&ValidationError::DuplicateId("mem".to_string()))
        );
    }

    #[test]
    fn test_ram_needs_size() {
        let yaml = board("  - { id: mem, type: ram, base_address: 0 }\n");
        let err = BoardDescriptor::from_yaml(&yaml).unwrap_err();
        assert_eq!(
            err.downcast_ref::<ValidationError>(),
            Some(&ValidationError::MissingSize("mem".to_string()))
        );
    }

    #[test]
    fn test_irq_level_range() {
        let yaml = board("  - { id: tmr, type: timer, base_address: 0x10000, irq: 8 }\n");
        let err = BoardDescriptor::from_yaml(&yaml).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ValidationError>(),
            Some(ValidationError::IrqLevel { level: 8, .. })
        ));
    }

    #[test]
    fn test_duart_device() {
        let yaml = board(
            "  - id: console\n    type: m68681\n    base_address: 0xeffc00\n    irq: 4\n    config:\n      offset_between_registers: 2\n",
        );
        let board = BoardDescriptor::from_yaml(&yaml).unwrap();
        let dev = &board.devices[0];
        assert_eq!(dev.r#type, DeviceType::Duart);
        assert_eq!(dev.irq, Some(4));
        assert_eq!(dev.config["offset_between_registers"].as_u64(), Some(2));
    }

    #[test]
    fn test_unsupported_schema() {
        let yaml = "schema_version: \"2.0\"\nname: x\ncpu: cpu32\n";
        assert!(BoardDescriptor::from_yaml(yaml).is_err());
    }
}
