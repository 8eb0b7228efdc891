//! Rule checker latency benchmark.
//!
//! The deterministic battery runs on every generation, cached or not, so
//! it has to stay well under 100ms even for chapter-length content.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use plume_core::models::rules::CheckConstraints;
use plume_engine::checker::RuleChecker;

fn chapter_length_content() -> String {
    let mut content = String::new();
    for i in 0..120 {
        content.push_str(&format!(
            "Paragraph {} follows the keeper down to the water, where the \
             ferry lights blur against the rain and the ropes creak against \
             the bollards.\n\n\"Hold the line,\" someone calls from the dark.\n\n",
            i
        ));
    }
    content
}

fn bench_check(c: &mut Criterion) {
    let checker = RuleChecker::new();
    let content = chapter_length_content();
    let constraints = CheckConstraints::new()
        .with_target_length(12_000)
        .with_required_entity("Mara Voss")
        .with_dialogue_band(0.05, 0.8);

    c.bench_function("rule_check_chapter", |b| {
        b.iter(|| checker.check(black_box(&content), black_box(&constraints)))
    });
}

criterion_group!(benches, bench_check);
criterion_main!(benches);
