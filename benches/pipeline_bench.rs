use criterion::{Criterion, black_box, criterion_group, criterion_main};
use tsr_common::DiagnosticSink;

const FIXTURE: &str = r#"
interface Shape { area(): number; }
class Rect implements Shape {
    constructor(public w: number, public h: number) {}
    area() { return this.w * this.h; }
}
class Square extends Rect {
    constructor(side: number) { super(side, side); }
}
function total<T extends Shape>(shapes: T[]): number {
    let sum = 0;
    for (const s of shapes) sum += s.area();
    return sum;
}
const shapes = [new Rect(2, 3), new Square(4)];
console.log(total(shapes));
"#;

fn scanner_bench(c: &mut Criterion) {
    c.bench_function("scan_fixture", |b| {
        b.iter(|| {
            let sink = DiagnosticSink::new();
            black_box(tsr_scanner::tokenize("bench", black_box(FIXTURE), &sink))
        })
    });
}

fn parser_bench(c: &mut Criterion) {
    c.bench_function("parse_fixture", |b| {
        b.iter(|| {
            let sink = DiagnosticSink::new();
            black_box(tsr_parser::parse_module("bench", black_box(FIXTURE), &sink))
        })
    });
}

fn checker_bench(c: &mut Criterion) {
    c.bench_function("check_fixture", |b| {
        b.iter(|| {
            let provider = tsr::provider_of(&[("bench", FIXTURE)]);
            let sink = DiagnosticSink::new();
            let options = tsr_common::CompilerOptions::default();
            black_box(tsr::compile("bench", &provider, &options, &sink))
        })
    });
}

criterion_group!(benches, scanner_bench, parser_bench, checker_bench);
criterion_main!(benches);
