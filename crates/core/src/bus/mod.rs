// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use crate::interrupt::InterruptQueue;
use crate::peripherals::{Device, DeviceContext, DeviceId};
use crate::scheduler::EventScheduler;
use crate::{SimResult, SimulationError};
use std::collections::BTreeMap;

const CACHE_SLOTS: usize = 3;

struct DeviceEntry {
    id: DeviceId,
    dev: Box<dyn Device>,
}

/// Most-recently-used list of device indices, MRU first.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct MruCache {
    slots: [Option<usize>; CACHE_SLOTS],
}

impl MruCache {
    fn promote(&mut self, pos: usize) {
        self.slots[..=pos].rotate_right(1);
    }

    fn insert(&mut self, index: usize) {
        self.slots.rotate_right(1);
        self.slots[0] = Some(index);
    }

    /// Drop `index` from the cache and renumber entries above it.
    fn purge(&mut self, index: usize) {
        let mut kept = self
            .slots
            .iter()
            .flatten()
            .filter(|&&i| i != index)
            .map(|&i| if i > index { i - 1 } else { i });
        let mut slots = [None; CACHE_SLOTS];
        for slot in slots.iter_mut() {
            *slot = kept.next();
        }
        self.slots = slots;
    }
}

/// One address space: the devices attached to it and the read/write lookup
/// caches in front of them.
pub struct MemoryBus {
    devices: Vec<DeviceEntry>,
    read_cache: MruCache,
    write_cache: MruCache,
    max_address: u32,
    granularity: u32,
}

impl std::fmt::Debug for MemoryBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryBus")
            .field("devices", &self.devices.iter().map(|e| e.dev.name()).collect::<Vec<_>>())
            .field("max_address", &self.max_address)
            .field("granularity", &self.granularity)
            .finish()
    }
}

#[derive(Clone, Copy)]
enum Direction {
    Read,
    Write,
}

impl MemoryBus {
    pub fn new(max_address: u32, granularity: u32) -> Self {
        Self {
            devices: Vec::new(),
            read_cache: MruCache::default(),
            write_cache: MruCache::default(),
            max_address,
            granularity: granularity.max(1),
        }
    }

    /// Highest byte address a device may decode on this bus.
    fn byte_limit(&self) -> u64 {
        (self.max_address as u64 + 1) * self.granularity as u64 - 1
    }

    /// Take ownership of `dev`. Devices with an inverted range or one that
    /// runs past the end of the address space are dropped.
    pub fn attach(&mut self, dev: Box<dyn Device>) -> SimResult<DeviceId> {
        let low = dev.lowest_address();
        let high = dev.highest_address();
        if low > high || high as u64 > self.byte_limit() {
            tracing::warn!(
                "Rejected {} at [{:#x}, {:#x}]: outside address space (limit {:#x})",
                dev.name(),
                low,
                high,
                self.byte_limit()
            );
            return Err(SimulationError::AttachRejected {
                name: dev.name().to_string(),
                low,
                high,
            });
        }

        let id = DeviceId::next();
        tracing::info!("Attached {} ({}) at [{:#x}, {:#x}]", dev.name(), id, low, high);
        self.devices.push(DeviceEntry { id, dev });
        Ok(id)
    }

    /// Remove and drop the device at `index`.
    pub fn detach(&mut self, index: usize) -> SimResult<DeviceId> {
        if index >= self.devices.len() {
            return Err(SimulationError::NoSuchDevice(index));
        }
        self.read_cache.purge(index);
        self.write_cache.purge(index);
        let entry = self.devices.remove(index);
        tracing::info!("Detached {} ({})", entry.dev.name(), entry.id);
        Ok(entry.id)
    }

    pub fn reset(&mut self) {
        for entry in &mut self.devices {
            entry.dev.reset();
        }
    }

    fn lookup(&mut self, address: u32, dir: Direction) -> Option<usize> {
        let cache = match dir {
            Direction::Read => &mut self.read_cache,
            Direction::Write => &mut self.write_cache,
        };

        for pos in 0..CACHE_SLOTS {
            let Some(index) = cache.slots[pos] else {
                break;
            };
            if self.devices[index].dev.check_mapped(address) {
                cache.promote(pos);
                return Some(index);
            }
        }

        let index = self
            .devices
            .iter()
            .position(|e| e.dev.check_mapped(address))?;
        cache.insert(index);
        Some(index)
    }

    /// Read one byte. `None` means no device maps `address`.
    pub fn peek(&mut self, address: u32) -> Option<u8> {
        let index = self.lookup(address, Direction::Read)?;
        Some(self.devices[index].dev.peek(address))
    }

    /// Write one byte. `false` means no device maps `address`.
    pub fn poke(&mut self, address: u32, value: u8) -> bool {
        match self.lookup(address, Direction::Write) {
            Some(index) => {
                self.devices[index].dev.poke(address, value);
                true
            }
            None => false,
        }
    }

    /// Big-endian read of 1, 2 or 4 bytes.
    pub fn peek_sized(&mut self, address: u32, size: u32) -> Option<u32> {
        if !matches!(size, 1 | 2 | 4) {
            return None;
        }
        let last = address.checked_add(size - 1);
        if let (Some(index), Some(last)) = (self.lookup(address, Direction::Read), last) {
            let dev = &mut self.devices[index].dev;
            if dev.check_mapped(last) {
                if let Some(value) = dev.peek_sized(address, size) {
                    return Some(value);
                }
            }
        }

        let mut value = 0u32;
        for offset in 0..size {
            value = (value << 8) | self.peek(address.wrapping_add(offset))? as u32;
        }
        Some(value)
    }

    /// Big-endian write of 1, 2 or 4 bytes. Bytes before the first unmapped
    /// address may already have been written when this returns `false`.
    pub fn poke_sized(&mut self, address: u32, size: u32, value: u32) -> bool {
        if !matches!(size, 1 | 2 | 4) {
            return false;
        }
        let last = address.checked_add(size - 1);
        if let (Some(index), Some(last)) = (self.lookup(address, Direction::Write), last) {
            let dev = &mut self.devices[index].dev;
            if dev.check_mapped(last) && dev.poke_sized(address, size, value) {
                return true;
            }
        }

        for offset in 0..size {
            let shift = 8 * (size - 1 - offset);
            if !self.poke(address.wrapping_add(offset), (value >> shift) as u8) {
                return false;
            }
        }
        true
    }

    /// Give the device that took a CPU write at `address` its chance to
    /// schedule events or raise an interrupt.
    pub fn settle_write(
        &mut self,
        address: u32,
        scheduler: &mut EventScheduler,
        interrupts: &mut InterruptQueue,
    ) {
        if let Some(index) = self.lookup(address, Direction::Write) {
            let entry = &mut self.devices[index];
            let mut ctx = DeviceContext {
                id: entry.id,
                scheduler,
                interrupts,
            };
            entry.dev.after_write(&mut ctx);
        }
    }

    pub fn device_count(&self) -> usize {
        self.devices.len()
    }

    pub fn device(&self, index: usize) -> Option<&dyn Device> {
        self.devices.get(index).map(|e| e.dev.as_ref())
    }

    pub fn device_id(&self, index: usize) -> Option<DeviceId> {
        self.devices.get(index).map(|e| e.id)
    }

    pub fn index_of(&self, id: DeviceId) -> Option<usize> {
        self.devices.iter().position(|e| e.id == id)
    }

    pub fn device_by_id_mut(&mut self, id: DeviceId) -> Option<&mut (dyn Device + 'static)> {
        for entry in &mut self.devices {
            if entry.id == id {
                return Some(entry.dev.as_mut());
            }
        }
        None
    }

    /// Find the first device of concrete type `T`.
    pub fn find_device<T: 'static>(&self) -> Option<&T> {
        self.devices
            .iter()
            .filter_map(|e| e.dev.as_any())
            .find_map(|any| any.downcast_ref::<T>())
    }

    pub fn find_device_mut<T: 'static>(&mut self) -> Option<&mut T> {
        self.devices
            .iter_mut()
            .filter_map(|e| e.dev.as_any_mut())
            .find_map(|any| any.downcast_mut::<T>())
    }

    pub fn max_address(&self) -> u32 {
        self.max_address
    }

    pub fn granularity(&self) -> u32 {
        self.granularity
    }

    /// Device states keyed by `name@base`, so that two devices of one kind
    /// stay apart.
    pub fn snapshot(&self) -> BTreeMap<String, serde_json::Value> {
        self.devices
            .iter()
            .map(|e| {
                (
                    format!("{}@{:#x}", e.dev.name(), e.dev.lowest_address()),
                    e.dev.snapshot(),
                )
            })
            .collect()
    }
}
