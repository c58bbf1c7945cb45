// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use super::{
    Completion, CpuModel, CpuState, Fault, RegisterInfo, Size, StatusFlags, StepStatus, A0, DFC,
    MAX_REGISTERS, PC, REGISTER_DATA, SFC, SR, SSP, USP, VBR,
};
use crate::bus::MemoryBus;
use crate::decoder::DecodeCache;
use crate::interrupt::{InterruptQueue, PendingInterrupt, AUTOVECTOR_INTERRUPT};
use crate::memory::ProgramImage;
use crate::metrics::{CpuMetrics, Statistics};
use crate::peripherals::{Device, DeviceContext, DeviceId};
use crate::scheduler::EventScheduler;
use crate::snapshot::CpuSnapshot;
use crate::{SimResult, SimulationError};
use std::fmt::{self, Write as _};

pub const BUS_ERROR_VECTOR: u32 = 2;
pub const ADDRESS_ERROR_VECTOR: u32 = 3;
pub const ILLEGAL_INSTRUCTION_VECTOR: u32 = 4;
pub const ZERO_DIVIDE_VECTOR: u32 = 5;
pub const CHK_VECTOR: u32 = 6;
pub const TRAPV_VECTOR: u32 = 7;
pub const PRIVILEGE_VIOLATION_VECTOR: u32 = 8;
pub const TRACE_VECTOR: u32 = 9;
pub const SPURIOUS_VECTOR: u32 = 24;
/// Autovectored level `n` uses vector `AUTOVECTOR_BASE + n`.
pub const AUTOVECTOR_BASE: u32 = 24;
pub const TRAP_BASE_VECTOR: u32 = 32;

/// Special status word stacked last in a bus/address error frame.
const FAULT_FRAME_STATUS: u32 = 9;
/// SR after reset: supervisor mode, all interrupts masked.
const RESET_SR: u32 = 0x2700;
/// Function code loaded into SFC/DFC at reset (supervisor data).
const RESET_FUNCTION_CODE: u32 = 5;

/// A 68000 or CPU32 processor together with the address space, event
/// scheduler and interrupt queue it owns.
pub struct M68k {
    pub(super) model: CpuModel,
    pub(super) regs: [u32; MAX_REGISTERS],
    pub(super) state: CpuState,
    buses: Vec<MemoryBus>,
    scheduler: EventScheduler,
    interrupts: InterruptQueue,
    decoder: DecodeCache,
    /// Opcode of the instruction in progress; 0 if the fetch itself faulted.
    pub(super) opcode: u16,
    /// Address of the instruction in progress.
    pub(super) instruction_pc: u32,
    trace: Option<String>,
    metrics: CpuMetrics,
}

impl fmt::Debug for M68k {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("M68k")
            .field("model", &self.model)
            .field("state", &self.state)
            .field("pc", &format_args!("{:#010x}", self.regs[PC]))
            .field("sr", &format_args!("{:#06x}", self.regs[SR]))
            .field("buses", &self.buses)
            .finish()
    }
}

impl M68k {
    pub fn new(model: CpuModel) -> Self {
        Self::with_scheduler(model, EventScheduler::new())
    }

    /// Build a CPU around a caller-supplied scheduler (for instance one with
    /// a fixed per-step time budget).
    pub fn with_scheduler(model: CpuModel, scheduler: EventScheduler) -> Self {
        let mut cpu = Self {
            model,
            regs: [0; MAX_REGISTERS],
            state: CpuState::Normal,
            buses: vec![MemoryBus::new(model.max_address(), model.granularity())],
            scheduler,
            interrupts: InterruptQueue::new(),
            decoder: DecodeCache::new(model),
            opcode: 0,
            instruction_pc: 0,
            trace: None,
            metrics: CpuMetrics::new(),
        };
        cpu.reset();
        cpu
    }

    pub fn model(&self) -> CpuModel {
        self.model
    }

    pub fn state(&self) -> CpuState {
        self.state
    }

    /// Reset the devices, then load SSP and PC from vectors 0 and 1.
    pub fn reset(&mut self) {
        for bus in &mut self.buses {
            bus.reset();
        }
        self.interrupts.clear();

        if self.model.is_cpu32() {
            self.regs[VBR] = 0;
            self.regs[SFC] = RESET_FUNCTION_CODE;
            self.regs[DFC] = RESET_FUNCTION_CODE;
        }
        self.regs[SR] = RESET_SR;
        self.regs[SSP] = self.read(0, Size::Long).unwrap_or(0);
        self.regs[PC] = self.read(4, Size::Long).unwrap_or(0);
        self.state = CpuState::Normal;

        tracing::info!(
            "{} reset: SSP={:#010x} PC={:#010x}",
            self.model,
            self.regs[SSP],
            self.regs[PC]
        );
    }

    // ---- address space ------------------------------------------------

    pub fn address_spaces(&self) -> usize {
        self.buses.len()
    }

    pub fn bus(&self, space: usize) -> Option<&MemoryBus> {
        self.buses.get(space)
    }

    pub fn bus_mut(&mut self, space: usize) -> Option<&mut MemoryBus> {
        self.buses.get_mut(space)
    }

    /// Attach `dev` to address space `space` and let it register its first
    /// scheduler events.
    pub fn attach_device(&mut self, space: usize, dev: Box<dyn Device>) -> SimResult<DeviceId> {
        let bus = self
            .buses
            .get_mut(space)
            .ok_or(SimulationError::NoSuchAddressSpace(space))?;
        let id = bus.attach(dev)?;
        if let Some(dev) = bus.device_by_id_mut(id) {
            let mut ctx = DeviceContext {
                id,
                scheduler: &mut self.scheduler,
                interrupts: &mut self.interrupts,
            };
            dev.on_attach(&mut ctx);
        }
        Ok(id)
    }

    /// Detach the device at `index` and forget its events and interrupt
    /// requests.
    pub fn detach_device(&mut self, space: usize, index: usize) -> SimResult<DeviceId> {
        let bus = self
            .buses
            .get_mut(space)
            .ok_or(SimulationError::NoSuchAddressSpace(space))?;
        let id = bus.detach(index)?;
        self.scheduler.remove(id);
        self.interrupts.remove_device(id);
        Ok(id)
    }

    /// Copy a program image into address space 0.
    pub fn load_image(&mut self, image: &ProgramImage) -> SimResult<usize> {
        let bus = self
            .buses
            .get_mut(0)
            .ok_or(SimulationError::NoSuchAddressSpace(0))?;
        image.load_into(bus)
    }

    pub fn scheduler(&self) -> &EventScheduler {
        &self.scheduler
    }

    pub fn interrupts(&self) -> &InterruptQueue {
        &self.interrupts
    }

    /// Queue an interrupt request on behalf of `device`.
    pub fn interrupt_request(&mut self, device: DeviceId, level: i32) {
        self.interrupts.request(device, level);
    }

    // ---- memory access ------------------------------------------------

    pub(super) fn read(&mut self, address: u32, size: Size) -> Result<u32, Fault> {
        if self.model.checks_alignment() && size != Size::Byte && address & 1 != 0 {
            return Err(Fault::AddressError(address));
        }
        self.buses[0]
            .peek_sized(address, size.bytes())
            .ok_or(Fault::BusError(address))
    }

    pub(super) fn write(&mut self, address: u32, size: Size, value: u32) -> Result<(), Fault> {
        if self.model.checks_alignment() && size != Size::Byte && address & 1 != 0 {
            return Err(Fault::AddressError(address));
        }
        if self.buses[0].poke_sized(address, size.bytes(), value & size.mask()) {
            self.buses[0].settle_write(address, &mut self.scheduler, &mut self.interrupts);
            Ok(())
        } else {
            Err(Fault::BusError(address))
        }
    }

    /// Read a word at PC. PC moves past it even if the read faults.
    pub(super) fn fetch_word(&mut self) -> Result<u16, Fault> {
        let pc = self.regs[PC];
        self.regs[PC] = pc.wrapping_add(2);
        self.read(pc, Size::Word).map(|w| w as u16)
    }

    pub(super) fn fetch_long(&mut self) -> Result<u32, Fault> {
        let pc = self.regs[PC];
        self.regs[PC] = pc.wrapping_add(4);
        self.read(pc, Size::Long)
    }

    fn stack_slot(&self) -> usize {
        if self.supervisor() {
            SSP
        } else {
            USP
        }
    }

    pub(super) fn push(&mut self, size: Size, value: u32) -> Result<(), Fault> {
        let slot = self.stack_slot();
        let sp = self.regs[slot].wrapping_sub(size.bytes());
        self.regs[slot] = sp;
        self.write(sp, size, value)
    }

    pub(super) fn pop(&mut self, size: Size) -> Result<u32, Fault> {
        let slot = self.stack_slot();
        let sp = self.regs[slot];
        let value = self.read(sp, size)?;
        self.regs[slot] = sp.wrapping_add(size.bytes());
        Ok(value)
    }

    // ---- registers ----------------------------------------------------

    pub(super) fn sr(&self) -> StatusFlags {
        StatusFlags::from_bits_retain(self.regs[SR] as u16)
    }

    pub(super) fn set_sr(&mut self, sr: StatusFlags) {
        self.regs[SR] = sr.bits() as u32;
    }

    pub(super) fn supervisor(&self) -> bool {
        self.regs[SR] & StatusFlags::S.bits() as u32 != 0
    }

    /// Register-file slot of An; A7 is SSP in supervisor mode.
    pub(super) fn address_slot(&self, n: usize) -> usize {
        if n == 7 && self.supervisor() {
            SSP
        } else {
            A0 + n
        }
    }

    /// Replace the low `size` bits of register `slot`.
    pub(super) fn set_register(&mut self, slot: usize, value: u32, size: Size) {
        let mask = size.mask();
        self.regs[slot] = (self.regs[slot] & !mask) | (value & mask);
    }

    pub(super) fn vector_base(&self) -> u32 {
        if self.model.is_cpu32() {
            self.regs[VBR]
        } else {
            0
        }
    }

    pub fn pc(&self) -> u32 {
        self.regs[PC]
    }

    pub fn set_pc(&mut self, pc: u32) {
        self.regs[PC] = pc;
    }

    /// Raw value of register slot `index`.
    pub fn register(&self, index: usize) -> Option<u32> {
        (index < self.model.register_count()).then(|| self.regs[index])
    }

    fn register_index(&self, name: &str) -> Option<usize> {
        match name.to_ascii_uppercase().as_str() {
            "USP" => Some(USP),
            "SSP" => Some(SSP),
            "SP" => Some(self.stack_slot()),
            upper => REGISTER_DATA[..self.model.register_count()]
                .iter()
                .position(|r| r.name == upper),
        }
    }

    pub fn register_by_name(&self, name: &str) -> SimResult<u32> {
        self.register_index(name)
            .map(|i| self.regs[i])
            .ok_or_else(|| SimulationError::UnknownRegister(name.to_string()))
    }

    /// Set a register from a hex string (`1F`, `0x1F` or `$1F`). The value
    /// is masked to the register's width.
    pub fn set_register_by_name(&mut self, name: &str, value: &str) -> SimResult<()> {
        let index = self
            .register_index(name)
            .ok_or_else(|| SimulationError::UnknownRegister(name.to_string()))?;
        let trimmed = value.trim();
        let digits = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .or_else(|| trimmed.strip_prefix('$'))
            .unwrap_or(trimmed);
        let parsed = u32::from_str_radix(digits, 16)
            .map_err(|_| SimulationError::InvalidRegisterValue(value.to_string()))?;
        self.regs[index] = parsed & REGISTER_DATA[index].mask;
        Ok(())
    }

    /// Name, formatted value and description of every register this model has.
    pub fn register_info(&self) -> Vec<RegisterInfo> {
        REGISTER_DATA[..self.model.register_count()]
            .iter()
            .zip(self.regs.iter())
            .map(|(data, value)| {
                let digits = (32 - data.mask.leading_zeros()).div_ceil(4) as usize;
                RegisterInfo {
                    name: data.name.to_string(),
                    value: format!("{:0width$X}", value & data.mask, width = digits),
                    mask: data.mask,
                    description: data.description.to_string(),
                }
            })
            .collect()
    }

    pub fn statistics(&self) -> Statistics {
        self.metrics.statistics()
    }

    pub fn snapshot(&self) -> CpuSnapshot {
        CpuSnapshot {
            model: self.model,
            state: self.state,
            registers: REGISTER_DATA[..self.model.register_count()]
                .iter()
                .zip(self.regs.iter())
                .map(|(data, value)| (data.name.to_string(), *value))
                .collect(),
            pending_levels: self.interrupts.levels(),
        }
    }

    // ---- trace records ------------------------------------------------

    pub(super) fn tracing(&self) -> bool {
        self.trace.is_some()
    }

    /// Append raw text to the trace record.
    pub(super) fn note(&mut self, text: &str) {
        if let Some(trace) = &mut self.trace {
            trace.push_str(text);
        }
    }

    /// Append a `{Mnemonic {...}}` field. Nothing is formatted unless a
    /// trace record is being built.
    pub(super) fn mnemonic(&mut self, args: fmt::Arguments<'_>) {
        if let Some(trace) = &mut self.trace {
            trace.push_str("{Mnemonic {");
            let _ = trace.write_fmt(args);
            trace.push_str("}} ");
        }
    }

    // ---- execution ----------------------------------------------------

    /// Run one step: service a pending interrupt, or execute one instruction.
    ///
    /// With `trace` set, a trace record of the step is appended to it and
    /// the scheduler is not advanced.
    pub fn execute_instruction(&mut self, trace: Option<&mut String>) -> StepStatus {
        let tracing = trace.is_some();
        self.trace = tracing.then(String::new);
        self.instruction_pc = self.regs[PC];
        if let Some(record) = &mut self.trace {
            let _ = write!(record, "{{InstructionAddress {:08X}}} ", self.instruction_pc);
        }

        if self.state == CpuState::Halted {
            self.note("{Mnemonic {CPU has halted}} ");
        } else {
            match self.service_interrupts() {
                Ok(true) => {}
                Ok(false) if self.state == CpuState::Stopped => {
                    self.note("{Mnemonic {CPU is stopped}} ");
                }
                Ok(false) => self.run_instruction(),
                Err(fault) => self.handle_fault(fault),
            }
        }

        let status = match self.state {
            CpuState::Halted => StepStatus::Halted,
            CpuState::Break => {
                self.state = CpuState::Normal;
                if tracing {
                    StepStatus::Ok
                } else {
                    StepStatus::Break
                }
            }
            _ => StepStatus::Ok,
        };

        if !tracing {
            self.check_events();
        }
        if let (Some(out), Some(record)) = (trace, self.trace.take()) {
            out.push_str(&record);
        }
        status
    }

    /// Execute without producing a trace record.
    pub fn step(&mut self) -> StepStatus {
        self.execute_instruction(None)
    }

    fn run_instruction(&mut self) {
        self.opcode = 0;
        let pc = self.regs[PC];
        let result = match self.read(pc, Size::Word) {
            Ok(word) => {
                let opcode = word as u16;
                self.regs[PC] = pc.wrapping_add(2);
                self.opcode = opcode;
                let op = self.decoder.decode(opcode);
                self.execute(op, opcode)
            }
            Err(fault) => Err(fault),
        };
        self.metrics.record_instruction();

        match result {
            Ok(Completion::Ok) if self.sr().contains(StatusFlags::T) => {
                if let Err(fault) = self.process_exception(TRACE_VECTOR) {
                    self.handle_fault(fault);
                }
            }
            Ok(_) => {}
            Err(fault) => self.handle_fault(fault),
        }
    }

    fn handle_fault(&mut self, fault: Fault) {
        match fault {
            Fault::BusError(address) => {
                self.note("Bus Error Exception");
                self.fault_frame(BUS_ERROR_VECTOR, address);
            }
            Fault::AddressError(address) => {
                self.note("Address Error Exception");
                self.fault_frame(ADDRESS_ERROR_VECTOR, address);
            }
            Fault::IllegalInstruction => {
                self.regs[PC] = self.instruction_pc;
                self.note("Illegal Instruction Exception");
                if let Err(fault) = self.process_exception(ILLEGAL_INSTRUCTION_VECTOR) {
                    self.handle_fault(fault);
                }
            }
        }
    }

    /// Take a bus or address error. A fault while stacking the frame halts
    /// the processor.
    fn fault_frame(&mut self, vector: u32, address: u32) {
        if let Err(fault) = self.stack_fault_frame(vector, address) {
            self.state = CpuState::Halted;
            self.note("{Mnemonic {Double Bus/Address Error CPU halted}} ");
            tracing::warn!(
                "{} halted: {:?} while processing fault at {:#010x} (PC {:#010x})",
                self.model,
                fault,
                address,
                self.instruction_pc
            );
        }
    }

    fn stack_fault_frame(&mut self, vector: u32, address: u32) -> Result<(), Fault> {
        self.metrics.record_exception();
        let saved = self.regs[SR];
        let mut sr = self.sr();
        sr.insert(StatusFlags::S);
        sr.remove(StatusFlags::T);
        self.set_sr(sr);

        self.push(Size::Long, self.regs[PC])?;
        self.push(Size::Word, saved)?;
        self.push(Size::Word, self.opcode as u32)?;
        self.push(Size::Long, address)?;
        self.push(Size::Word, FAULT_FRAME_STATUS)?;
        self.regs[PC] = self.read(self.vector_base().wrapping_add(vector * 4), Size::Long)?;
        Ok(())
    }

    /// Enter supervisor mode and jump through `vector`, stacking PC and SR
    /// (and the format word on CPU32).
    pub(super) fn process_exception(&mut self, vector: u32) -> Result<(), Fault> {
        self.metrics.record_exception();
        let saved = self.regs[SR];
        let mut sr = self.sr();
        sr.insert(StatusFlags::S);
        sr.remove(StatusFlags::T);
        self.set_sr(sr);

        if self.model.is_cpu32() {
            self.push(Size::Word, vector * 4)?;
        }
        self.push(Size::Long, self.regs[PC])?;
        self.push(Size::Word, saved)?;
        self.regs[PC] = self.read(self.vector_base().wrapping_add(vector * 4), Size::Long)?;
        tracing::debug!("exception {} -> {:#010x}", vector, self.regs[PC]);
        Ok(())
    }

    /// Service the highest pending interrupt if the mask allows it. Level 7
    /// is non-maskable.
    fn service_interrupts(&mut self) -> Result<bool, Fault> {
        let Some(pending) = self.interrupts.peek().copied() else {
            return Ok(false);
        };
        let mask = (self.regs[SR] >> 8) & 7;
        let level = pending.level as u32;
        if level <= mask && level != 7 {
            return Ok(false);
        }
        self.interrupts.pop();
        // No instruction register for a fault while stacking the interrupt.
        self.opcode = 0;

        if self.state == CpuState::Stopped {
            self.state = CpuState::Normal;
        }
        let saved = self.regs[SR];
        let mut sr = self.sr();
        sr.remove(StatusFlags::INTERRUPT_MASK);
        sr |= StatusFlags::from_bits_retain((level as u16) << 8);
        sr.insert(StatusFlags::S);
        sr.remove(StatusFlags::T);
        self.set_sr(sr);

        let vector = if self.model.is_cpu32() {
            let vector = self.acknowledge(pending);
            self.push(Size::Word, vector * 4)?;
            self.push(Size::Long, self.regs[PC])?;
            self.push(Size::Word, saved)?;
            vector
        } else {
            self.push(Size::Long, self.regs[PC])?;
            self.push(Size::Word, saved)?;
            self.acknowledge(pending)
        };
        self.regs[PC] = self.read(self.vector_base().wrapping_add(vector * 4), Size::Long)?;
        self.metrics.record_interrupt();
        self.mnemonic(format_args!("Interrupt level {} vector {}", level, vector));
        tracing::debug!("interrupt level {} vector {} -> {:#010x}", level, vector, self.regs[PC]);
        Ok(true)
    }

    /// Run the acknowledge cycle against the requesting device.
    fn acknowledge(&mut self, pending: PendingInterrupt) -> u32 {
        let response = self
            .buses
            .iter_mut()
            .find_map(|bus| bus.device_by_id_mut(pending.device))
            .map(|dev| dev.interrupt_acknowledge(pending.level));
        match response {
            Some(AUTOVECTOR_INTERRUPT) => AUTOVECTOR_BASE + pending.level as u32,
            Some(vector) if vector >= 0 => vector as u32 & 0xff,
            _ => SPURIOUS_VECTOR,
        }
    }

    /// Give the scheduler one slice and route due events to their devices.
    fn check_events(&mut self) {
        let buses = &mut self.buses;
        let interrupts = &mut self.interrupts;
        self.scheduler.check(|scheduler, event| {
            let device = buses
                .iter_mut()
                .find_map(|bus| bus.device_by_id_mut(event.owner));
            if let Some(dev) = device {
                let mut ctx = DeviceContext {
                    id: event.owner,
                    scheduler,
                    interrupts: &mut *interrupts,
                };
                dev.event_callback(event.data, event.payload, &mut ctx);
            }
        });
    }

    /// Reset every attached device (the RESET instruction).
    pub(super) fn reset_devices(&mut self) {
        for bus in &mut self.buses {
            bus.reset();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cpu::D0;
    use crate::peripherals::ram::Ram;

    fn machine(model: CpuModel) -> M68k {
        let mut cpu = M68k::with_scheduler(model, EventScheduler::with_fixed_budget(1_000));
        cpu.attach_device(0, Box::new(Ram::new(0, 0x10000))).unwrap();
        cpu.write(0, Size::Long, 0x8000).unwrap();
        cpu.write(4, Size::Long, 0x1000).unwrap();
        cpu.reset();
        cpu
    }

    #[test]
    fn test_reset_loads_vectors() {
        let cpu = machine(CpuModel::Cpu32);
        assert_eq!(cpu.regs[SSP], 0x8000);
        assert_eq!(cpu.pc(), 0x1000);
        assert_eq!(cpu.regs[SR], 0x2700);
        assert_eq!(cpu.regs[SFC], 5);
        assert_eq!(cpu.state(), CpuState::Normal);
    }

    #[test]
    fn test_reset_without_memory_zeroes_pc() {
        let cpu = M68k::new(CpuModel::M68000);
        assert_eq!(cpu.pc(), 0);
        assert_eq!(cpu.regs[SSP], 0);
    }

    #[test]
    fn test_odd_word_access_is_address_error_on_68000_only() {
        let mut cpu = machine(CpuModel::M68000);
        assert_eq!(cpu.read(0x101, Size::Word), Err(Fault::AddressError(0x101)));
        assert_eq!(cpu.read(0x101, Size::Byte), Ok(0));
        let mut cpu = machine(CpuModel::Cpu32);
        assert!(cpu.read(0x101, Size::Word).is_ok());
    }

    #[test]
    fn test_push_pop_use_active_stack() {
        let mut cpu = machine(CpuModel::M68000);
        cpu.push(Size::Long, 0xdead_beef).unwrap();
        assert_eq!(cpu.regs[SSP], 0x7ffc);
        cpu.regs[SR] = 0;
        cpu.regs[USP] = 0x4000;
        cpu.push(Size::Word, 0x1234).unwrap();
        assert_eq!(cpu.regs[USP], 0x3ffe);
        assert_eq!(cpu.pop(Size::Word).unwrap(), 0x1234);
        cpu.regs[SR] = 0x2000;
        assert_eq!(cpu.pop(Size::Long).unwrap(), 0xdead_beef);
    }

    #[test]
    fn test_set_register_by_name() {
        let mut cpu = machine(CpuModel::M68000);
        cpu.set_register_by_name("d3", "0x1F").unwrap();
        assert_eq!(cpu.regs[D0 + 3], 0x1f);
        cpu.set_register_by_name("SR", "$12345").unwrap();
        assert_eq!(cpu.regs[SR], 0x2345);
        assert!(matches!(
            cpu.set_register_by_name("VBR", "0"),
            Err(SimulationError::UnknownRegister(_))
        ));
        assert!(matches!(
            cpu.set_register_by_name("D0", "zz"),
            Err(SimulationError::InvalidRegisterValue(_))
        ));
    }

    #[test]
    fn test_register_info_widths() {
        let cpu = machine(CpuModel::Cpu32);
        let info = cpu.register_info();
        assert_eq!(info.len(), MAX_REGISTERS);
        assert_eq!(info[SR].value, "2700");
        assert_eq!(info[PC].value, "00001000");
        assert_eq!(info[SFC].value, "5");
    }

    #[test]
    fn test_interrupt_below_mask_waits() {
        let mut cpu = machine(CpuModel::M68000);
        let dev = DeviceId::next();
        cpu.interrupt_request(dev, 3);
        assert_eq!(cpu.service_interrupts(), Ok(false));
        assert_eq!(cpu.interrupts().len(), 1);

        // Level 7 always gets through. No device answers the acknowledge
        // cycle, so the spurious vector is taken.
        cpu.interrupt_request(dev, 7);
        cpu.write(SPURIOUS_VECTOR * 4, Size::Long, 0x2000).unwrap();
        assert_eq!(cpu.service_interrupts(), Ok(true));
        assert_eq!(cpu.pc(), 0x2000);
        assert_eq!((cpu.regs[SR] >> 8) & 7, 7);
    }

    #[test]
    fn test_double_fault_halts() {
        let mut cpu = machine(CpuModel::M68000);
        cpu.regs[SSP] = 0x2_0000; // unmapped stack
        cpu.set_pc(0x3_0000); // unmapped code
        let mut trace = String::new();
        assert_eq!(cpu.execute_instruction(Some(&mut trace)), StepStatus::Halted);
        assert_eq!(cpu.state(), CpuState::Halted);
        assert!(trace.contains("Bus Error Exception"));
        assert!(trace.contains("Double Bus/Address Error CPU halted"));

        let mut trace = String::new();
        assert_eq!(cpu.execute_instruction(Some(&mut trace)), StepStatus::Halted);
        assert_eq!(trace, "{InstructionAddress 00030000} {Mnemonic {CPU has halted}} ");
    }

    #[test]
    fn test_failed_opcode_fetch_stacks_its_own_address() {
        let mut cpu = machine(CpuModel::M68000);
        cpu.write(BUS_ERROR_VECTOR * 4, Size::Long, 0x2000).unwrap();
        cpu.set_pc(0x3_0000);
        assert_eq!(cpu.step(), StepStatus::Ok);
        assert_eq!(cpu.pc(), 0x2000);

        // Frame from SSP: status, fault address, opcode, SR, PC.
        let sp = cpu.regs[SSP];
        assert_eq!(sp, 0x8000 - 14);
        assert_eq!(cpu.read(sp, Size::Word), Ok(9));
        assert_eq!(cpu.read(sp + 2, Size::Long), Ok(0x3_0000));
        assert_eq!(cpu.read(sp + 6, Size::Word), Ok(0));
        assert_eq!(cpu.read(sp + 10, Size::Long), Ok(0x3_0000));
    }

    #[test]
    fn test_fault_while_stacking_interrupt_has_no_opcode() {
        let mut cpu = machine(CpuModel::M68000);
        cpu.write(0x1000, Size::Word, 0x4e71).unwrap(); // NOP
        cpu.write(BUS_ERROR_VECTOR * 4, Size::Long, 0x2000).unwrap();
        assert_eq!(cpu.step(), StepStatus::Ok);
        assert_eq!(cpu.opcode, 0x4e71);

        // The interrupt's PC push hits $10000, just past RAM. The fault
        // frame below it still fits.
        cpu.regs[SSP] = 0x1_0004;
        cpu.interrupt_request(DeviceId::next(), 7);
        assert_eq!(cpu.step(), StepStatus::Ok);
        assert_eq!(cpu.pc(), 0x2000);
        let sp = cpu.regs[SSP];
        assert_eq!(sp, 0xfff2);
        assert_eq!(cpu.read(sp + 2, Size::Long), Ok(0x1_0000));
        assert_eq!(cpu.read(sp + 6, Size::Word), Ok(0));
    }
}
