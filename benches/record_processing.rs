use std::hint::black_box;

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use dstep::action::run_step;
use dstep::builtins::FunctionRegistry;
use dstep::config::Config;
use dstep::diagnostics::Collector;
use dstep::library::Library;
use dstep::parser::DataStep;
use dstep::runtime::{Dataset, Row, Value};

fn compile_step(src: &str) -> DataStep {
    dstep::compile(src).unwrap().steps.remove(0)
}

fn make_rows(n: usize) -> Dataset {
    let mut ds = Dataset::with_columns(["id", "region", "amount", "q1", "q2", "q3"]);
    for i in 0..n {
        let row: Row = [
            ("id", Value::from(i as f64)),
            ("region", Value::from(if i % 3 == 0 { "north" } else { "south" })),
            ("amount", Value::from((i * 7 % 1000) as f64)),
            ("q1", Value::from(i as f64)),
            ("q2", Value::from((i * 2) as f64)),
            ("q3", Value::from((i * 3) as f64)),
        ]
        .into_iter()
        .collect();
        ds.push(row);
    }
    ds
}

fn run(step: &DataStep, library: &Library) -> Option<Dataset> {
    let functions = FunctionRegistry::with_builtins();
    let mut log = Collector::new();
    run_step(step, library, &functions, &Config::default(), &mut log).unwrap()
}

fn bench_steps(c: &mut Criterion) {
    let mut library = Library::new();
    library.insert("sales", make_rows(1000));

    let cases = [
        ("assign", "data o; set sales; y = amount * 2; run;"),
        ("retain", "data o; set sales; retain total 0; total = total + amount; run;"),
        ("subset", "data o; set sales; if region = 'north' and amount > 500; run;"),
        (
            "array_loop",
            "data o; set sales; array q[3] q1-q3; do i = 1 to 3; q[i] = q[i] + 1; end; run;",
        ),
        ("functions", "data o; set sales; tag = catx('-', upcase(region), round(amount, 10)); run;"),
    ];
    for (name, src) in cases {
        let step = compile_step(src);
        c.bench_function(&format!("step/{}_1k", name), |b| b.iter(|| run(black_box(&step), &library)));
    }
}

fn bench_scaling(c: &mut Criterion) {
    let step = compile_step("data o; set sales; retain total 0; total = total + amount; if amount > 900 then output; run;");
    let mut group = c.benchmark_group("step/scaling");
    for n in [100, 1_000, 10_000] {
        let mut library = Library::new();
        library.insert("sales", make_rows(n));
        group.bench_with_input(BenchmarkId::from_parameter(n), &library, |b, library| {
            b.iter(|| run(&step, library))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_steps, bench_scaling);
criterion_main!(benches);
