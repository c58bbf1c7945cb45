// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

#[cfg(test)]
mod integration_tests {
    use crate::cpu::{CpuModel, CpuState, M68k};
    use crate::peripherals::ram::Ram;
    use crate::{system, DebugControl, Machine, SimulationError, StopReason};
    use sim68k_config::BoardDescriptor;

    const CODE: u32 = 0x400;
    const STACK: u32 = 0x8000;

    fn words(machine: &mut Machine<M68k>, addr: u32, code: &[u16]) {
        let bytes: Vec<u8> = code.iter().flat_map(|w| w.to_be_bytes()).collect();
        machine.write_memory(addr, &bytes).unwrap();
    }

    fn vector(machine: &mut Machine<M68k>, number: u32, handler: u32) {
        machine
            .write_memory(number * 4, &handler.to_be_bytes())
            .unwrap();
    }

    /// 64 KiB of RAM at 0, reset vectors pointing at CODE and STACK.
    fn create_machine(model: CpuModel, code: &[u16]) -> Machine<M68k> {
        let mut cpu = M68k::new(model);
        cpu.attach_device(0, Box::new(Ram::new(0, 0x10000))).unwrap();
        let mut machine = Machine::new(cpu);
        vector(&mut machine, 0, STACK);
        vector(&mut machine, 1, CODE);
        words(&mut machine, CODE, code);
        machine.reset();
        machine
    }

    #[test]
    fn test_reset_through_machine() {
        let machine = create_machine(CpuModel::M68000, &[]);
        assert_eq!(machine.pc(), CODE);
        assert_eq!(machine.read_register("A7'").unwrap(), STACK);
        assert_eq!(machine.read_register("SR").unwrap(), 0x2700);
        assert_eq!(machine.step_count(), 0);
    }

    #[test]
    fn test_breakpoint_stops_and_resumes() {
        // MOVEQ #5,D0 / ADDQ.L #1,D0 / BRA.S *-2
        let mut machine = create_machine(CpuModel::M68000, &[0x7005, 0x5280, 0x60fc]);
        machine.add_breakpoint(0x404);

        assert_eq!(machine.run(None).unwrap(), StopReason::Breakpoint(0x404));
        assert_eq!(machine.read_register("D0").unwrap(), 6);

        // Resuming at a breakpoint executes it before checking again.
        assert_eq!(machine.run(None).unwrap(), StopReason::Breakpoint(0x404));
        assert_eq!(machine.read_register("D0").unwrap(), 7);
        assert_eq!(machine.step_count(), 4);

        machine.remove_breakpoint(0x404);
        assert_eq!(machine.run(Some(6)).unwrap(), StopReason::MaxStepsReached);
        assert_eq!(machine.read_register("D0").unwrap(), 10);
    }

    #[test]
    fn test_step_limit_and_single_step() {
        let mut machine = create_machine(CpuModel::M68000, &[0x7005, 0x5280, 0x60fc]);
        assert_eq!(machine.run(Some(0)).unwrap(), StopReason::MaxStepsReached);
        assert_eq!(machine.step_single().unwrap(), StopReason::StepDone);
        assert_eq!(machine.pc(), 0x402);
        assert_eq!(machine.step_count(), 1);
    }

    #[test]
    fn test_break_instruction_stops_run() {
        let mut machine = create_machine(CpuModel::Cpu32, &[0x7001, 0x4848, 0x7002]);
        assert_eq!(machine.run(Some(100)).unwrap(), StopReason::BreakInstruction);
        assert_eq!(machine.pc(), 0x404);
        assert_eq!(machine.cpu.state(), CpuState::Normal);

        assert_eq!(machine.run(Some(1)).unwrap(), StopReason::MaxStepsReached);
        assert_eq!(machine.read_register("D0").unwrap(), 2);
    }

    #[test]
    fn test_halted_machine_stays_halted() {
        // JMP $30000: nothing is mapped there, and the stack is unmapped too.
        let mut machine = create_machine(CpuModel::M68000, &[0x4ef9, 0x0003, 0x0000]);
        machine.write_register("A7'", "00020000").unwrap();

        assert_eq!(machine.run(Some(10)).unwrap(), StopReason::Halted);
        assert_eq!(machine.cpu.state(), CpuState::Halted);
        assert_eq!(machine.step_single().unwrap(), StopReason::Halted);
    }

    #[test]
    fn test_bus_error_vector() {
        // MOVE.L $20000,D0 reads past the end of RAM.
        let mut machine =
            create_machine(CpuModel::M68000, &[0x2039, 0x0002, 0x0000, 0x4e71]);
        vector(&mut machine, 2, 0x700);
        words(&mut machine, 0x700, &[0x4848]);

        assert_eq!(machine.run(Some(10)).unwrap(), StopReason::BreakInstruction);
        assert_eq!(machine.pc(), 0x702);
        assert_eq!(machine.cpu.statistics().exceptions, 1);

        // 68000 group 0 frame: status word, access address, instruction
        // register, SR, PC.
        let frame = machine.read_memory(STACK - 14, 14).unwrap();
        assert_eq!(&frame[2..6], &[0x00, 0x02, 0x00, 0x00]);
        assert_eq!(&frame[6..8], &[0x20, 0x39]);
        assert_eq!(&frame[8..10], &[0x27, 0x00]);
    }

    #[test]
    fn test_odd_address_only_faults_on_68000() {
        // MOVE.W $501,D0
        let code = [0x3039, 0x0000, 0x0501, 0x4848];

        let mut machine = create_machine(CpuModel::M68000, &code);
        vector(&mut machine, 3, 0x700);
        words(&mut machine, 0x700, &[0x4848]);
        assert_eq!(machine.run(Some(10)).unwrap(), StopReason::BreakInstruction);
        assert_eq!(machine.pc(), 0x702);

        let mut machine = create_machine(CpuModel::Cpu32, &code);
        machine.write_memory(0x501, &[0x12, 0x34]).unwrap();
        assert_eq!(machine.run(Some(10)).unwrap(), StopReason::BreakInstruction);
        assert_eq!(machine.pc(), 0x408);
        assert_eq!(machine.read_register("D0").unwrap() & 0xffff, 0x1234);
    }

    #[test]
    fn test_stack_pointer_byte_pushes_keep_alignment() {
        // MOVE.B #$AB,-(A7) / MOVE.B (A7)+,D1
        let mut machine =
            create_machine(CpuModel::M68000, &[0x1f3c, 0x00ab, 0x121f, 0x4848]);
        assert_eq!(machine.run(Some(2)).unwrap(), StopReason::MaxStepsReached);
        assert_eq!(machine.read_register("A7'").unwrap(), STACK);
        assert_eq!(machine.read_register("D1").unwrap() & 0xff, 0xab);
        assert_eq!(machine.read_memory(STACK - 2, 1).unwrap(), vec![0xab]);
    }

    #[test]
    fn test_memory_and_register_access() {
        let mut machine = create_machine(CpuModel::M68000, &[]);
        machine.write_memory(0x2000, &[1, 2, 3]).unwrap();
        assert_eq!(machine.read_memory(0x2000, 3).unwrap(), vec![1, 2, 3]);
        assert!(matches!(
            machine.read_memory(0xffff, 2),
            Err(SimulationError::Unmapped(0x10000))
        ));
        assert!(matches!(
            machine.write_memory(0x20000, &[0]),
            Err(SimulationError::Unmapped(0x20000))
        ));

        machine.write_register("D3", "DEADBEEF").unwrap();
        assert_eq!(machine.read_register("d3").unwrap(), 0xdead_beef);
        assert!(machine.read_register("VBR").is_err());
        assert_eq!(machine.register_names().len(), 19);

        machine.set_pc(0x1234);
        assert_eq!(machine.pc(), 0x1234);
    }

    #[test]
    fn test_trace_records_one_line_per_step() {
        let mut machine = create_machine(CpuModel::M68000, &[0x7005, 0x4848, 0x7001]);
        machine.set_tracing(true);

        // A traced BREAK does not stop the run.
        assert_eq!(machine.run(Some(3)).unwrap(), StopReason::MaxStepsReached);
        let trace = machine.take_trace();
        assert_eq!(trace.len(), 3);
        assert_eq!(
            trace[0],
            "{InstructionAddress 00000400} {Mnemonic {MOVEQ #$05,D0}} "
        );
        assert!(trace[1].starts_with("{InstructionAddress 00000402}"));
        assert!(machine.take_trace().is_empty());

        machine.set_tracing(false);
        machine.step_single().unwrap();
        assert!(machine.take_trace().is_empty());
    }

    #[test]
    fn test_timer_interrupt_through_machine() {
        let yaml = r#"
name: ecb
cpu: m68000
devices:
  - { id: ram, type: ram, base_address: 0, size: 64KiB }
  - { id: timer, type: timer, base_address: 0x10000, irq: 5 }
scheduler:
  fixed_ns_per_check: 1000000
"#;
        let board = BoardDescriptor::from_yaml(yaml).unwrap();
        let mut machine = Machine::new(system::build_cpu(&board).unwrap());

        // MOVE #$2000,SR / BRA.S *
        words(&mut machine, CODE, &[0x46fc, 0x2000, 0x60fe]);
        vector(&mut machine, 0x40, 0x600);
        words(&mut machine, 0x600, &[0x4848]);
        vector(&mut machine, 0, STACK);
        vector(&mut machine, 1, CODE);
        machine.reset();

        // Vectored mode, vector $40, a single tick of preload.
        machine.write_memory(0x10002, &[0x40]).unwrap();
        machine.write_memory(0x1000a, &[100]).unwrap();
        machine.write_memory(0x10000, &[0xa1]).unwrap();

        assert_eq!(machine.run(Some(50)).unwrap(), StopReason::BreakInstruction);
        assert_eq!(machine.pc(), 0x602);
        let stats = machine.cpu.statistics();
        assert_eq!(stats.interrupts, 1);
        // Interrupt level 5 is now the mask.
        assert_eq!(machine.read_register("SR").unwrap(), 0x2500);
        // The countdown latched its status bit.
        assert_eq!(machine.read_memory(0x10014, 1).unwrap(), vec![1]);
    }

    #[test]
    fn test_snapshot_through_machine() {
        let mut machine = create_machine(CpuModel::Cpu32, &[0x7042, 0x4848]);
        machine.run(None).unwrap();

        let snap = machine.snapshot();
        assert_eq!(snap.cpu.model, CpuModel::Cpu32);
        assert_eq!(snap.cpu.register("D0"), Some(0x42));
        assert_eq!(snap.cpu.registers.len(), 22);
        assert!(snap.cpu.pending_levels.is_empty());
        assert_eq!(snap.devices.len(), 1);
        assert_eq!(snap.devices["RAM@0x0"]["size"], 0x10000);
        assert_eq!(snap.statistics.instructions, 2);

        let json = serde_json::to_value(&snap).unwrap();
        assert_eq!(json["cpu"]["state"], "Normal");
    }

    #[test]
    fn test_reset_restarts_program() {
        let mut machine = create_machine(CpuModel::M68000, &[0x7005, 0x5280, 0x60fc]);
        machine.run(Some(5)).unwrap();
        machine.reset();
        assert_eq!(machine.step_count(), 0);
        assert_eq!(machine.pc(), CODE);
    }
}
