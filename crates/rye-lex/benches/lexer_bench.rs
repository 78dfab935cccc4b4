//! Tokenization throughput.

use criterion::{criterion_group, criterion_main, Criterion};
use rye_lex::tokenize;

const SAMPLE: &str = r#"
model_fit <- function(data, weights = NULL) {
    if (is.null(weights)) weights <- rep(1, nrow(data))
    data |> transform(scaled = value / max(value)) |> summary()
}
x <- c(1L, 2L, 3L) * 2.5e3
label <- "a string with \t escapes and é accents"
raw <- r"(no \escapes in here)"
y <- x %in% c(2500, 5000) & !is.na(x)
"#;

fn bench_tokenize(c: &mut Criterion) {
    c.bench_function("tokenize_sample", |b| {
        b.iter(|| tokenize(SAMPLE).expect("sample lexes"));
    });
}

fn bench_tokenize_numbers(c: &mut Criterion) {
    let numbers = (0..500)
        .map(|i| format!("{}.{:03}e{}", i, i, i % 10))
        .collect::<Vec<_>>()
        .join(" + ");
    c.bench_function("tokenize_numbers", |b| {
        b.iter(|| tokenize(&numbers).expect("numbers lex"));
    });
}

criterion_group!(benches, bench_tokenize, bench_tokenize_numbers);
criterion_main!(benches);
