use super::*;
use crate::documents::PolicyMetadata;

fn passage(filename: &str, text: &str, department: &str, distance: f32) -> RetrievedPassage {
    RetrievedPassage {
        text: text.to_string(),
        filename: filename.to_string(),
        chunk_index: 0,
        metadata: PolicyMetadata {
            department: department.to_string(),
            region: "Global".to_string(),
            policy_type: "Policy".to_string(),
            effective_date: "2024-01-01".to_string(),
            description: "Ignored in prompts".to_string(),
        },
        distance,
    }
}

#[test]
fn renders_numbered_passages() {
    let passages = vec![
        passage(
            "expense_policy.pdf",
            "Receipts are required for all expenses over $25.",
            "Finance",
            0.12,
        ),
        passage(
            "travel_guidelines.pdf",
            "Economy class is required for flights under 6 hours.",
            "Operations",
            0.31,
        ),
    ];

    let prompt = PromptBuilder::new().build("What needs a receipt?", &passages);

    assert_eq!(
        prompt.context,
        "[1] Source: expense_policy.pdf\n\
         Department: Finance | Region: Global | Type: Policy | Effective: 2024-01-01\n\
         Content:\n\
         Receipts are required for all expenses over $25.\n\
         \n---\n\
         [2] Source: travel_guidelines.pdf\n\
         Department: Operations | Region: Global | Type: Policy | Effective: 2024-01-01\n\
         Content:\n\
         Economy class is required for flights under 6 hours.\n"
    );
    assert!(prompt.has_context());
    assert_eq!(prompt.question, "What needs a receipt?");
    assert_eq!(prompt.system, DEFAULT_SYSTEM_PROMPT);
}

#[test]
fn sources_follow_passage_order() {
    let passages = vec![
        passage("a.pdf", "first", "Finance", 0.1),
        passage("b.pdf", "second", "HR", 0.2),
        passage("a.pdf", "third", "Finance", 0.3),
    ];

    let prompt = PromptBuilder::new().build("q", &passages);

    let markers: Vec<(usize, &str)> = prompt
        .sources
        .iter()
        .map(|s| (s.marker, s.filename.as_str()))
        .collect();
    assert_eq!(markers, vec![(1, "a.pdf"), (2, "b.pdf"), (3, "a.pdf")]);
    assert_eq!(prompt.sources[1].department, "HR");
    assert_eq!(prompt.sources[1].effective_date, "2024-01-01");
    assert_eq!(prompt.sources[2].distance, 0.3);
}

#[test]
fn empty_retrieval_says_so() {
    let prompt = PromptBuilder::new().build("Who approves relocation?", &[]);

    assert_eq!(prompt.context, NO_CONTEXT);
    assert!(prompt.sources.is_empty());
    assert!(!prompt.has_context());
}

#[test]
fn user_message_keeps_question_verbatim() {
    let question = "  Can I expense a $30 lunch?\nAsking for a colleague. ";
    let prompt = PromptBuilder::new().build(question, &[]);

    let message = prompt.user_message();
    assert!(message.starts_with("CONTEXT FROM POLICY DOCUMENTS:\n"));
    assert!(message.contains(NO_CONTEXT));
    assert!(message.ends_with(question));
}

#[test]
fn prompt_is_deterministic() {
    let passages = vec![passage("a.pdf", "text", "HR", 0.2)];
    let builder = PromptBuilder::new().with_system_prompt("Answer tersely.");

    let first = builder.build("q", &passages);
    let second = builder.build("q", &passages);

    assert_eq!(first, second);
    assert_eq!(first.system, "Answer tersely.");
}

#[test]
fn long_excerpts_are_shortened() {
    let text = "word ".repeat(100);
    let prompt = PromptBuilder::new().build("q", &[passage("a.pdf", &text, "HR", 0.2)]);

    let excerpt = &prompt.sources[0].excerpt;
    assert!(excerpt.ends_with("..."));
    assert!(excerpt.chars().count() <= EXCERPT_CHARS + 3);

    let short = PromptBuilder::new().build("q", &[passage("a.pdf", "Line one\n\nline two", "HR", 0.2)]);
    assert_eq!(short.sources[0].excerpt, "Line one line two");
}
