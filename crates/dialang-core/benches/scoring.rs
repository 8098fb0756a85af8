use std::collections::{HashMap, HashSet};

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use dialang_core::matcher::TextResponseMatcher;
use dialang_core::model::VsptWord;
use dialang_core::vspt::{meara_score, VsptTally};

fn make_words(count: usize) -> Vec<VsptWord> {
    (0..count)
        .map(|i| VsptWord {
            language: "eng".into(),
            word_id: format!("w{i}"),
            word: format!("word{i}"),
            valid: i % 3 != 0,
            weight: 1,
        })
        .collect()
}

fn bench_vspt(c: &mut Criterion) {
    let mut group = c.benchmark_group("vspt");

    let words = make_words(75);
    let responses: HashMap<String, bool> = words
        .iter()
        .enumerate()
        .map(|(i, w)| (w.word_id.clone(), i % 4 != 0))
        .collect();

    group.bench_function("tally_75_words", |b| {
        b.iter(|| VsptTally::from_responses(black_box(&words), black_box(&responses)))
    });

    let tally = VsptTally::from_responses(&words, &responses);
    group.bench_function("z_and_meara", |b| {
        b.iter(|| meara_score(black_box(tally).z_score()))
    });

    group.finish();
}

fn bench_normalize(c: &mut Criterion) {
    let mut group = c.benchmark_group("normalize");

    let punctuation: HashSet<char> = "!\"#$%&'()*+,-./:;<=>?@[]^_`{|}~".chars().collect();
    let matcher = TextResponseMatcher::new(&punctuation);
    let empty = HashSet::new();
    let plain = TextResponseMatcher::new(&empty);

    let short = " Run-dog!! ";
    let sentence = "  The quick, brown fox -- jumped over the lazy dog's back!  ";

    group.bench_function("short", |b| {
        b.iter(|| matcher.normalize(black_box(short)))
    });

    group.bench_function("sentence", |b| {
        b.iter(|| matcher.normalize(black_box(sentence)))
    });

    group.bench_function("sentence_no_punctuation_set", |b| {
        b.iter(|| plain.normalize(black_box(sentence)))
    });

    group.finish();
}

criterion_group!(benches, bench_vspt, bench_normalize);
criterion_main!(benches);
