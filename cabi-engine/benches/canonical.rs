// CABI - cabi-engine
// Module: Canonical ABI benchmarks
//
// Copyright (c) 2025 The CABI Project Developers
// Licensed under the MIT license.
// SPDX-License-Identifier: MIT

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use cabi_engine::{BumpAllocator, CanonicalAbi, LinearMemory, ResolvedOptions};
use cabi_types::{ComponentValue, ValType};

fn bench_record_roundtrip(c: &mut Criterion) {
    let ty = ValType::Record(vec![
        ("a".to_string(), ValType::U32),
        ("b".to_string(), ValType::U16),
        ("c".to_string(), ValType::U32),
        ("d".to_string(), ValType::F64),
    ]);
    let value = ComponentValue::Record(vec![
        ComponentValue::U32(1),
        ComponentValue::U16(2),
        ComponentValue::U32(3),
        ComponentValue::F64(4.5),
    ]);
    let flat = ty.flat_types().unwrap();
    let options = ResolvedOptions::for_memory(0);

    c.bench_function("record_lower_lift", |b| {
        b.iter(|| {
            let mut abi =
                CanonicalAbi::new().with_host_allocator(Box::new(BumpAllocator::new(8)));
            let mut memory = LinearMemory::new(64 * 1024);
            let (operands, _) = abi
                .lower(black_box(&value), &ty, &flat, &options, &mut memory)
                .unwrap();
            black_box(abi.lift(&operands, &flat, &ty, &options, &memory).unwrap())
        })
    });
}

fn bench_list_roundtrip(c: &mut Criterion) {
    let ty = ValType::List(Box::new(ValType::U16));
    let value = ComponentValue::List((0..512).map(|i| ComponentValue::U16(i as u16)).collect());
    let flat = ty.flat_types().unwrap();
    let options = ResolvedOptions::for_memory(0);

    c.bench_function("list_512_u16_lower_lift", |b| {
        b.iter(|| {
            let mut abi =
                CanonicalAbi::new().with_host_allocator(Box::new(BumpAllocator::new(8)));
            let mut memory = LinearMemory::new(64 * 1024);
            let (operands, _) = abi
                .lower(black_box(&value), &ty, &flat, &options, &mut memory)
                .unwrap();
            black_box(abi.lift(&operands, &flat, &ty, &options, &memory).unwrap())
        })
    });
}

fn bench_string_lower(c: &mut Criterion) {
    let value = ComponentValue::String("the quick brown fox jumps over the lazy dog".repeat(8));
    let flat = ValType::String.flat_types().unwrap();
    let options = ResolvedOptions::for_memory(0);

    c.bench_function("string_344b_lower", |b| {
        b.iter(|| {
            let mut abi =
                CanonicalAbi::new().with_host_allocator(Box::new(BumpAllocator::new(8)));
            let mut memory = LinearMemory::new(64 * 1024);
            black_box(
                abi.lower(black_box(&value), &ValType::String, &flat, &options, &mut memory)
                    .unwrap(),
            )
        })
    });
}

criterion_group!(
    benches,
    bench_record_roundtrip,
    bench_list_roundtrip,
    bench_string_lower
);
criterion_main!(benches);
