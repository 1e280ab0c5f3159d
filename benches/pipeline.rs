use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use loam::lexer::Lexer;
use loam::parser::parse;
use loam::types::Config;
use std::hint::black_box as bb;

// =============================================================================
// Corpus - Loam programs of different sizes
// =============================================================================

const SMALL: &str = "
pkg demo

greeting = 'hello'
fun greet(name) {
    return greeting + ' ' + name
}
greet('world')
";

const MEDIUM: &str = "
pkg stats

use fmt 'fmt'

fun sum(xs) {
    total = 0
    for i in xs {
        total = total + i
    }
    return total
}

fun mean(xs, n) {
    return sum(xs) / n
}

fun classify(n) {
    switch n {
    case 0:
        return 'zero'
    default:
        return 'nonzero'
    }
}

samples = a{4, 8, 15, 16, 23, 42}
labels = r{'low': 4, 'high': 42}
m = mean(samples, 6)
classify(m)
";

const LARGE: &str = "
pkg interp

fun lookup(env, name) {
    return env[[name]]
}

fun apply(op, x, y) {
    switch op {
    case 1:
        return x + y
    case 2:
        return x - y
    case 3:
        return x * y
    }
    return 0
}

fun run(prog, env) {
    pc = 0
    acc = 0
    steps = 0
    outer: for pc < 100 {
        inst = prog[pc]
        if inst == 0 {
            break outer
        }
        acc = apply(inst, acc, 1)
        pc = pc + 1
        steps = steps + 1
    }
    return acc, steps
}

fun histogram(values) {
    counts = a{0: 0}
    for _, v in values {
        counts[v] += 1
    }
    return counts
}

prog = a{1, 1, 2, 3, 1, 0}
env = r{'trace': 0}
result = run(prog, env)
histogram(prog)
";

fn token_count(input: &str) -> usize {
    Lexer::new(input).count()
}

// =============================================================================
// Benchmarks
// =============================================================================

fn bench_lexer(c: &mut Criterion) {
    let mut group = c.benchmark_group("lexer");
    for (name, input) in [("small", SMALL), ("medium", MEDIUM), ("large", LARGE)] {
        group.throughput(Throughput::Bytes(input.len() as u64));
        group.bench_with_input(BenchmarkId::new("iterate", name), &input, |b, &input| {
            b.iter(|| {
                let mut acc = 0u64;
                for tok in Lexer::new(bb(input)) {
                    acc = acc.wrapping_add(tok.offset as u64);
                }
                bb(acc);
            });
        });
        group.bench_with_input(
            BenchmarkId::new("collect_tokens", name),
            &(input, token_count(input)),
            |b, &(input, count)| {
                b.iter(|| {
                    let mut v = Vec::with_capacity(count);
                    v.extend(Lexer::new(bb(input)));
                    bb(v.len());
                });
            },
        );
    }
    group.finish();
}

fn bench_parser(c: &mut Criterion) {
    let mut group = c.benchmark_group("parser");
    for (name, input) in [("small", SMALL), ("medium", MEDIUM), ("large", LARGE)] {
        group.throughput(Throughput::Bytes(input.len() as u64));
        group.bench_with_input(BenchmarkId::new("parse", name), &input, |b, &input| {
            b.iter(|| {
                let file = parse(bb(input)).expect("benchmark corpus parses");
                bb(file.stmts.len());
                bb(file);
            });
        });
    }
    group.finish();
}

fn bench_pipeline(c: &mut Criterion) {
    let mut group = c.benchmark_group("pipeline");
    for (name, input) in [("small", SMALL), ("medium", MEDIUM), ("large", LARGE)] {
        group.throughput(Throughput::Bytes(input.len() as u64));
        group.bench_with_input(
            BenchmarkId::new("parse_and_infer", name),
            &input,
            |b, &input| {
                b.iter(|| {
                    let file = parse(bb(input)).expect("benchmark corpus parses");
                    let mut conf = Config::new(&file);
                    let res = conf.infer();
                    bb(res.is_ok());
                    bb(conf.types);
                });
            },
        );
    }
    group.finish();
}

criterion_group!(benches, bench_lexer, bench_parser, bench_pipeline);
criterion_main!(benches);
