//! Throughput of entity extraction and classification.
//!
//! Extraction runs on every inbound message before any store lookup, so it
//! should stay well under a millisecond per question.

use chrono::NaiveDate;
use criterion::{black_box, criterion_group, criterion_main, Criterion};

use clinician_chat::{EntityExtractor, QueryClassifier};

const QUESTIONS: &[&str] = &[
    "How many patients do we have?",
    "Look up Radwan Smith-404924",
    "Find patient-123456",
    "What is the goal progress for Radwan Smith?",
    "Which budgets are expiring next month?",
    "Who are the caregivers for John Smith?",
    "How much budget does patient 404924 have remaining?",
    "Show sessions between 2024-03-01 and 2024-03-31",
    "tell me something interesting",
];

fn bench_extract(c: &mut Criterion) {
    let extractor = EntityExtractor::new();
    let today = NaiveDate::from_ymd_opt(2024, 5, 15).unwrap();

    // Compile the lazily built patterns outside the measurement.
    extractor.extract_at(QUESTIONS[0], today);

    c.bench_function("extract_question_set", |b| {
        b.iter(|| {
            for q in QUESTIONS {
                black_box(extractor.extract_at(black_box(q), today));
            }
        })
    });
}

fn bench_extract_and_classify(c: &mut Criterion) {
    let extractor = EntityExtractor::new();
    let classifier = QueryClassifier::new();
    let today = NaiveDate::from_ymd_opt(2024, 5, 15).unwrap();

    c.bench_function("extract_and_classify_long_question", |b| {
        let long = format!(
            "{} and also, while you're at it, {}",
            "Could you please show me the goal progress for Radwan Smith-404924".repeat(4),
            "which budgets are expiring in the next 30 days"
        );
        b.iter(|| {
            let extraction = extractor.extract_at(black_box(&long), today);
            black_box(classifier.classify(&extraction))
        })
    });
}

criterion_group!(benches, bench_extract, bench_extract_and_classify);
criterion_main!(benches);
