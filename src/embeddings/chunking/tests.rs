use super::*;
use crate::documents::{Document, PolicyMetadata};

fn chunker(chunk_size: usize, chunk_overlap: usize) -> Chunker {
    Chunker::new(ChunkingConfig {
        chunk_size,
        chunk_overlap,
    })
    .expect("valid chunking config")
}

fn finance_metadata() -> PolicyMetadata {
    PolicyMetadata {
        department: "Finance".to_string(),
        region: "Global".to_string(),
        policy_type: "Policy".to_string(),
        effective_date: "2024-01-01".to_string(),
        description: "Travel and expense reimbursement".to_string(),
    }
}

fn expense_policy_text() -> String {
    let mut text = String::from("Employee Expense Policy\n\n");
    for section in 1..=12 {
        text.push_str(&format!(
            "Section {section}: All employees must submit expense reports within 30 days of incurring expenses. \
             Receipts are required for all expenses over $25. Reports over $1000 require additional approval \
             from the finance department.\n\n"
        ));
    }
    text.trim_end().to_string()
}

fn assert_chunking_laws(text: &str, chunks: &[String], size: usize, overlap: usize) {
    let char_len = |s: &str| s.chars().count();

    for (i, chunk) in chunks.iter().enumerate() {
        assert!(
            char_len(chunk) <= size,
            "chunk {} has {} chars, limit {}",
            i,
            char_len(chunk),
            size
        );
    }

    for pair in chunks.windows(2) {
        let prev: Vec<char> = pair[0].chars().collect();
        let next: Vec<char> = pair[1].chars().collect();
        let tail: String = prev[prev.len() - overlap..].iter().collect();
        let head: String = next[..overlap].iter().collect();
        assert_eq!(tail, head, "adjacent chunks must share the overlap");
    }

    // Dropping each successor's overlap reconstructs the text
    let mut rebuilt = chunks[0].clone();
    for chunk in &chunks[1..] {
        rebuilt.extend(chunk.chars().skip(overlap));
    }
    assert_eq!(rebuilt, text);
}

#[test]
fn empty_text_yields_no_chunks() {
    let chunker = chunker(100, 20);
    assert!(chunker.split_text("").is_empty());
    assert!(chunker.split_text("   \n\n  \t").is_empty());

    let document = Document::new("empty.pdf", "/tmp/empty.pdf", "", PolicyMetadata::default());
    assert!(chunker.chunk(&document).is_empty());
}

#[test]
fn short_text_is_a_single_chunk() {
    let chunker = chunker(100, 20);
    let chunks = chunker.split_text("Remote work is allowed up to 3 days per week.");
    assert_eq!(chunks, vec!["Remote work is allowed up to 3 days per week.".to_string()]);
}

#[test]
fn text_of_exactly_chunk_size_is_a_single_chunk() {
    let chunker = chunker(10, 3);
    assert_eq!(chunker.split_text("abcdefghij").len(), 1);
    assert_eq!(chunker.split_text("abcdefghijk").len(), 2);
}

#[test]
fn long_text_obeys_size_and_overlap() {
    let text = expense_policy_text();

    for (size, overlap) in [(1000, 200), (300, 50), (120, 30), (80, 0), (64, 63)] {
        let chunks = chunker(size, overlap).split_text(&text);
        assert!(
            chunks.len() >= 2,
            "{} chars with size {} should need several chunks",
            text.chars().count(),
            size
        );
        assert_chunking_laws(&text, &chunks, size, overlap);
    }
}

#[test]
fn prefers_paragraph_breaks() {
    let paragraph = "Travel bookings must be made through the approved vendor portal";
    let text = vec![paragraph; 8].join("\n\n");

    let chunks = chunker(150, 20).split_text(&text);

    assert!(chunks.len() > 1);
    for chunk in &chunks[..chunks.len() - 1] {
        assert!(
            chunk.ends_with("\n\n"),
            "chunk should end at a paragraph break: {:?}",
            chunk
        );
    }
}

#[test]
fn prefers_sentence_boundaries() {
    let text = (1..=20)
        .map(|i| format!("Sentence number {i} is here."))
        .collect::<Vec<_>>()
        .join(" ");

    let chunks = chunker(100, 20).split_text(&text);

    assert!(chunks.len() > 1);
    for chunk in &chunks[..chunks.len() - 1] {
        assert!(
            chunk.trim_end().ends_with('.'),
            "chunk should end at a sentence boundary: {:?}",
            chunk
        );
    }
    assert_chunking_laws(&text, &chunks, 100, 20);
}

#[test]
fn falls_back_to_word_boundaries() {
    let text = "reimbursement ".repeat(40);
    let text = text.trim_end();

    let chunks = chunker(50, 10).split_text(text);

    for chunk in &chunks[..chunks.len() - 1] {
        assert!(chunk.ends_with(' '), "chunk should end between words: {:?}", chunk);
    }
    assert_chunking_laws(text, &chunks, 50, 10);
}

#[test]
fn hard_cut_without_whitespace() {
    let text = "x".repeat(95);
    let chunks = chunker(30, 5).split_text(&text);

    for chunk in &chunks[..chunks.len() - 1] {
        assert_eq!(chunk.chars().count(), 30);
    }
    assert_chunking_laws(&text, &chunks, 30, 5);
}

#[test]
fn counts_characters_not_bytes() {
    let text = "Política de viáticos é válida. ".repeat(10);
    let text = text.trim_end();

    let chunks = chunker(40, 8).split_text(text);

    assert!(chunks.len() > 1);
    assert_chunking_laws(text, &chunks, 40, 8);
}

#[test]
fn chunks_carry_metadata_and_offsets() {
    let text = expense_policy_text();
    let document = Document::new(
        "expense_policy.pdf",
        "/policies/expense_policy.pdf",
        text.clone(),
        finance_metadata(),
    );

    let chunks = chunker(300, 50).chunk(&document);

    assert!(chunks.len() > 1);
    let chars: Vec<char> = text.chars().collect();
    for (i, chunk) in chunks.iter().enumerate() {
        assert_eq!(chunk.chunk_index, i);
        assert_eq!(chunk.filename, "expense_policy.pdf");
        assert_eq!(chunk.source_path, "/policies/expense_policy.pdf");
        assert_eq!(chunk.metadata, finance_metadata());
        assert_eq!(chunk.char_count, chunk.text.chars().count());
        assert_eq!(chunk.end_char - chunk.start_char, chunk.char_count);
        let slice: String = chars[chunk.start_char..chunk.end_char].iter().collect();
        assert_eq!(slice, chunk.text);
    }
    assert_eq!(chunks[0].start_char, 0);
    assert_eq!(
        chunks.last().map(|c| c.end_char),
        Some(chars.len())
    );
}

#[test]
fn chunk_ids_are_deterministic() {
    let text = expense_policy_text();
    let document = Document::new("expense_policy.pdf", "a.pdf", text, finance_metadata());
    let chunker = chunker(300, 50);

    let first: Vec<String> = chunker.chunk(&document).into_iter().map(|c| c.id).collect();
    let second: Vec<String> = chunker.chunk(&document).into_iter().map(|c| c.id).collect();

    assert_eq!(first, second);
    assert_eq!(first[0], chunk_id("expense_policy.pdf", 0));
    assert_ne!(chunk_id("expense_policy.pdf", 0), chunk_id("travel_policy.pdf", 0));
    assert_ne!(chunk_id("expense_policy.pdf", 0), chunk_id("expense_policy.pdf", 1));

    let mut unique = first.clone();
    unique.sort();
    unique.dedup();
    assert_eq!(unique.len(), first.len());
}

#[test]
fn rejects_overlap_not_smaller_than_size() {
    assert!(matches!(
        Chunker::new(ChunkingConfig {
            chunk_size: 100,
            chunk_overlap: 100,
        }),
        Err(ConfigError::OverlapTooLarge(100, 100))
    ));
    assert!(
        Chunker::new(ChunkingConfig {
            chunk_size: 100,
            chunk_overlap: 250,
        })
        .is_err()
    );
    assert!(matches!(
        Chunker::new(ChunkingConfig {
            chunk_size: 0,
            chunk_overlap: 0,
        }),
        Err(ConfigError::InvalidChunkSize(0))
    ));
}
