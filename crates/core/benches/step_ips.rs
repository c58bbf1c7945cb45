// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use std::time::Duration;

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use sim68k_core::cpu::{CpuModel, M68k, StepStatus};
use sim68k_core::memory::ProgramImage;
use sim68k_core::peripherals::ram::Ram;
use sim68k_core::peripherals::timer::Timer;
use sim68k_core::scheduler::EventScheduler;

const STEPS_PER_ITER: u64 = 10_000;

fn criterion_config() -> Criterion {
    match std::env::var("SIM68K_BENCH_PROFILE").as_deref() {
        Ok("ci") => Criterion::default()
            .warm_up_time(Duration::from_millis(150))
            .measurement_time(Duration::from_millis(400))
            .sample_size(20),
        _ => Criterion::default()
            .warm_up_time(Duration::from_secs(1))
            .measurement_time(Duration::from_secs(2))
            .sample_size(50),
    }
}

/// Vectors, then an endless loop that mixes register, memory and stack
/// traffic across two RAM devices and a timer.
fn machine(model: CpuModel) -> M68k {
    let code: &[u16] = &[
        0x7000, // MOVEQ #0,D0
        0x5280, // ADDQ.L #1,D0
        0x23c0, 0x0001, 0x0000, // MOVE.L D0,$10000
        0x2f00, // MOVE.L D0,-(A7)
        0x221f, // MOVE.L (A7)+,D1
        0xc2fc, 0x0003, // MULU #3,D1
        0x60ee, // BRA.S $402
    ];
    let mut image = ProgramImage::new();
    image.add_segment(0, vec![0x00, 0x00, 0x80, 0x00, 0x00, 0x00, 0x04, 0x00]);
    image.add_segment(0x400, code.iter().flat_map(|w| w.to_be_bytes()).collect());

    let mut cpu = M68k::with_scheduler(model, EventScheduler::with_fixed_budget(100));
    cpu.attach_device(0, Box::new(Ram::new(0, 0x10000))).unwrap();
    cpu.attach_device(0, Box::new(Ram::new(0x10000, 0x10000))).unwrap();
    cpu.attach_device(0, Box::new(Timer::new(0x20000, 5))).unwrap();
    cpu.load_image(&image).unwrap();
    cpu.reset();
    cpu
}

fn bench_step(c: &mut Criterion) {
    let mut group = c.benchmark_group("step");
    group.throughput(Throughput::Elements(STEPS_PER_ITER));

    for model in [CpuModel::M68000, CpuModel::Cpu32] {
        let mut cpu = machine(model);
        assert_eq!(cpu.step(), StepStatus::Ok);

        group.bench_function(model.to_string(), |b| {
            b.iter(|| {
                for _ in 0..STEPS_PER_ITER {
                    black_box(cpu.step());
                }
            });
        });
    }

    let mut cpu = machine(CpuModel::M68000);
    let mut record = String::new();
    group.bench_function("traced", |b| {
        b.iter(|| {
            for _ in 0..STEPS_PER_ITER {
                record.clear();
                black_box(cpu.execute_instruction(Some(&mut record)));
            }
        });
    });
    group.finish();
}

criterion_group! {
    name = benches;
    config = criterion_config();
    targets = bench_step
}
criterion_main!(benches);
