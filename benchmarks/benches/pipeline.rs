//! pipeline.rs — micro-benchs du pipeline Lumen, tout en mémoire
//!
//! Lancer :
//!   cargo bench -p lumen-benches --bench pipeline
//!   cargo bench -p lumen-benches --bench pipeline -- --save-baseline main
//!   cargo bench -p lumen-benches --bench pipeline -- --baseline main

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use lumen_benches::{bench_compiler, synthetic_expr};
use lumen_core::{
    bytecode::Chunk,
    runtime::eval::{eval_chunk, EvalOptions},
};
use lumen_lexer::Scanner;

const SIZES: &[usize] = &[16, 256, 4096];

fn bench_scan(c: &mut Criterion) {
    let mut group = c.benchmark_group("scan");
    for &terms in SIZES {
        let src = synthetic_expr(terms);
        group.throughput(Throughput::Bytes(src.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(terms), &src, |b, src| {
            b.iter(|| Scanner::new(black_box(src)).tokenize().len());
        });
    }
    group.finish();
}

fn bench_compile(c: &mut Criterion) {
    let mut group = c.benchmark_group("compile");
    let compiler = bench_compiler();
    for &terms in SIZES {
        let src = synthetic_expr(terms);
        group.throughput(Throughput::Bytes(src.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(terms), &src, |b, src| {
            b.iter(|| compiler.compile(black_box(src)).chunk.len());
        });
    }
    group.finish();
}

fn bench_eval(c: &mut Criterion) {
    let mut group = c.benchmark_group("eval");
    let opts = EvalOptions::default();
    let compiler = bench_compiler();
    for &terms in SIZES {
        let Ok(chunk) = compiler.compile(&synthetic_expr(terms)).into_result() else { continue };
        group.throughput(Throughput::Elements(chunk.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(terms), &chunk, |b, chunk| {
            b.iter(|| eval_chunk(black_box(chunk), &opts).map(|out| out.value));
        });
    }
    group.finish();
}

fn bench_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("encode");
    let Ok(chunk) = bench_compiler().compile(&synthetic_expr(4096)).into_result() else { return };
    let bytes = chunk.to_bytes();
    group.throughput(Throughput::Bytes(bytes.len() as u64));
    group.bench_function("to_bytes", |b| b.iter(|| black_box(&chunk).to_bytes()));
    group.bench_function("from_bytes", |b| b.iter(|| Chunk::from_bytes(black_box(&bytes)).map(|c| c.len())));
    group.finish();
}

criterion_group!(benches, bench_scan, bench_compile, bench_eval, bench_encode);
criterion_main!(benches);
