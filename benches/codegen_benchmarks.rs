//! Benchmarks for the code-generation pipeline.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use polygen::prelude::*;

fn tiled_fill() -> Program {
    let mut program = Program::new("bench");
    let func = Function::new("fill", &mut program);
    let comp = Computation::new(
        Expr::int(3),
        "{S0[i,j]: 0<=i<=1000 and 0<=j<=1000}",
        &mut program,
        func,
    )
    .unwrap();
    let buf = Buffer::new("buf0", vec![1001, 1001], Type::UInt8, None, &mut program, func);
    program.function_mut(func).add_argument(buf);
    program.set_access(comp, "{S0[i,j]->buf0[i,j]}").unwrap();
    program.computation_mut(comp).tile(0, 1, 32, 32).unwrap();
    program.tag_parallel_dimension("S0", 1);
    program
}

fn bench_generate(c: &mut Criterion) {
    c.bench_function("generate_tiled_fill", |b| {
        b.iter(|| {
            let mut program = tiled_fill();
            program.generate_ast().unwrap();
            program.generate_target_statements().unwrap();
            black_box(program)
        })
    });
}

fn bench_schedule_algebra(c: &mut Criterion) {
    let mut ctx = Context::new();
    let set = IterationSet::parse(&mut ctx, "{S[i,j] : 0 <= i < 1024 and 0 <= j < 1024}").unwrap();
    let id = Relation::identity_on(&set);
    c.bench_function("tile_schedule", |b| {
        b.iter(|| Tile::new(0, 1, 32, 32).apply(black_box(&id)).unwrap())
    });
}

criterion_group!(benches, bench_generate, bench_schedule_algebra);
criterion_main!(benches);
