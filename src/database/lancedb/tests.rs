use super::*;
use crate::documents::{Document, PolicyMetadata};
use crate::embeddings::{Chunker, ChunkingConfig};

#[test]
fn record_from_chunk() {
    let document = Document::new(
        "remote_work_policy.pdf",
        "/policies/remote_work_policy.pdf",
        "Employees may work remotely up to three days per week.",
        PolicyMetadata {
            department: "HR".to_string(),
            ..PolicyMetadata::default()
        },
    );
    let chunks = Chunker::new(ChunkingConfig::default())
        .expect("valid config")
        .chunk(&document);
    assert_eq!(chunks.len(), 1);

    let record = ChunkRecord::from_chunk(&chunks[0], vec![0.5; 4], "2024-05-01T12:00:00Z");

    assert_eq!(record.id, chunks[0].id);
    assert_eq!(record.filename, "remote_work_policy.pdf");
    assert_eq!(record.chunk_index, 0);
    assert_eq!(record.char_count, 54);
    assert_eq!(record.start_char, 0);
    assert_eq!(record.end_char, 54);
    assert_eq!(record.metadata.department, "HR");
    assert_eq!(record.source_path, "/policies/remote_work_policy.pdf");
    assert_eq!(record.ingested_at, "2024-05-01T12:00:00Z");
}

#[test]
fn literals_double_single_quotes() {
    assert_eq!(sql_literal("Finance"), "'Finance'");
    assert_eq!(sql_literal("O'Brien's policy.pdf"), "'O''Brien''s policy.pdf'");
    assert_eq!(sql_literal("x' OR '1'='1"), "'x'' OR ''1''=''1'");
}
