use criterion::{criterion_group, criterion_main, Criterion};
use rank_core::tokenizer::Tokenizer;

const TEXT: &str = "<p>How do I keep my sourdough starter alive while travelling for two weeks? \
    I have read that refrigerating it works, but the last time I tried the starter smelled of acetone \
    and took days to recover. Is drying it on parchment a better option?</p>";

fn bench_tokenize(c: &mut Criterion) {
    let tok = Tokenizer::default();
    c.bench_function("tokenize_paragraph", |b| b.iter(|| tok.tokenize(TEXT)));
}

criterion_group!(benches, bench_tokenize);
criterion_main!(benches);
