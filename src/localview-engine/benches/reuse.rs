// Copyright 2026 The Simlin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

//! Benchmarks for reuse-distance analysis.
//!
//! The access stack is O(depth) per touch, so these track how the stack
//! and a full simulation scale with the number of distinct lines.

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use localview_engine::test_common::TestProgram;
use localview_engine::{AccessStack, SimulationConfig, simulate};

/// Benchmark raw stack touches cycling over `distinct` keys
fn bench_access_stack(c: &mut Criterion) {
    let mut group = c.benchmark_group("access_stack");

    for distinct in [16i64, 256, 1024] {
        group.bench_with_input(
            BenchmarkId::from_parameter(distinct),
            &distinct,
            |b, &distinct| {
                b.iter(|| {
                    let mut stack = AccessStack::new();
                    let mut total = 0;
                    for i in 0..(distinct * 4) {
                        total += stack.touch(i % distinct);
                    }
                    black_box(total)
                });
            },
        );
    }

    group.finish();
}

/// Benchmark a full simulation of C[i,j] += A[i,k] * B[k,j]
fn bench_matmul(c: &mut Criterion) {
    let mut group = c.benchmark_group("matmul");

    for n in [4i64, 8, 16] {
        let program = TestProgram::new("matmul")
            .container("A", &[("N", n), ("N", n)])
            .container("B", &[("N", n), ("N", n)])
            .container("C", &[("N", n), ("N", n)])
            .symbol("N", n as f64)
            .map("mm", &[("i", "0", "N - 1"), ("j", "0", "N - 1"), ("k", "0", "N - 1")])
            .read("A", &["i", "k"])
            .read("B", &["k", "j"])
            .access("C", localview_engine::datamodel::AccessMode::ReadWrite, &["i", "j"]);
        let graph = program.build_graph().expect("matmul should build");

        for line_bytes in [0, 64] {
            let config = SimulationConfig {
                cache_line_bytes: line_bytes,
                ..Default::default()
            };
            group.bench_with_input(
                BenchmarkId::new(format!("line{line_bytes}"), n),
                &config,
                |b, config| {
                    b.iter(|| black_box(simulate(&graph, config)));
                },
            );
        }
    }

    group.finish();
}

criterion_group!(benches, bench_access_stack, bench_matmul);

criterion_main!(benches);
