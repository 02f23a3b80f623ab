use criterion::{Criterion, criterion_group, criterion_main};
use std::hint::black_box;

use sqb::query::{ValidityConfig, layout_tokens, parse_query, validate};
use sqb::schema::{FilterKeyDescriptor, FilterKeys, ValueType};
use sqb::tokenizer::tokenize;

const QUERY: &str = "is:unresolved !browser.name:[chrome,\"firefox esr\"] \
    (transaction.duration:>1.5s OR count():>=100) AND timestamp:-24h \
    p95(transaction.duration):<300ms message:\"out of memory\" stray text";

fn keys() -> FilterKeys {
    let mut keys = FilterKeys::default();
    keys.insert("is", FilterKeyDescriptor::default());
    keys.insert(
        "transaction.duration",
        FilterKeyDescriptor {
            value_type: Some(ValueType::Duration),
            ..Default::default()
        },
    );
    keys.insert(
        "timestamp",
        FilterKeyDescriptor {
            value_type: Some(ValueType::Date),
            ..Default::default()
        },
    );
    keys
}

fn bench_tokenize(c: &mut Criterion) {
    c.bench_function("tokenize", |b| b.iter(|| tokenize(black_box(QUERY))));
}

fn bench_parse(c: &mut Criterion) {
    c.bench_function("parse_and_layout", |b| {
        b.iter(|| {
            let mut tokens = parse_query(black_box(QUERY));
            layout_tokens(&mut tokens)
        });
    });
}

fn bench_validate(c: &mut Criterion) {
    let keys = keys();
    let config = ValidityConfig {
        disallow_free_text: true,
        ..Default::default()
    };
    let tokens = parse_query(QUERY);
    c.bench_function("validate", |b| {
        b.iter(|| {
            let mut tokens = tokens.clone();
            validate(&mut tokens, black_box(&keys), &config)
        });
    });
}

criterion_group!(benches, bench_tokenize, bench_parse, bench_validate);
criterion_main!(benches);
