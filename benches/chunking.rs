use criterion::{Criterion, criterion_group, criterion_main};
use policy_rag::documents::{Document, PolicyMetadata, clean_text};
use policy_rag::embeddings::{Chunker, ChunkingConfig};
use std::hint::black_box;

const PARAGRAPH: &str = "Employees must submit expense reports within 30 days of incurring the cost. \
Receipts are required for every expense over $25, and   itemized hotel folios are required \
for all lodging.\r\n\r\nManagers approve reports in the order received; the finance team \
reimburses approved reports in the next payroll cycle.\n";

fn policy_text(paragraphs: usize) -> String {
    PARAGRAPH.repeat(paragraphs)
}

pub fn criterion_benchmark(c: &mut Criterion) {
    let raw = policy_text(400);
    let text = clean_text(&raw);
    let chunker = Chunker::new(ChunkingConfig::default()).expect("default chunking config");
    let document = Document::new(
        "expense_policy.pdf",
        "/policies/expense_policy.pdf",
        text.clone(),
        PolicyMetadata::default(),
    );

    c.bench_function("clean_text", |b| b.iter(|| clean_text(black_box(&raw))));
    c.bench_function("split_text", |b| {
        b.iter(|| chunker.split_text(black_box(&text)))
    });
    c.bench_function("chunk_document", |b| {
        b.iter(|| chunker.chunk(black_box(&document)))
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
