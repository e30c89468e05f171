use super::*;
use crate::semantic::RetrievedDocument;
use crate::session::{HistoryEntry, Role};

fn entry(role: Role, content: &str, timestamp: i64) -> HistoryEntry {
    HistoryEntry {
        role,
        content: content.to_string(),
        timestamp,
    }
}

#[test]
fn test_system_message_comes_first_and_utterance_last() {
    let assembler = PromptAssembler::default();
    let history = vec![
        entry(Role::User, "hi", 1),
        entry(Role::Assistant, "hello!", 2),
    ];

    let messages = assembler.build_messages(&history, &[], "show me rings");

    assert_eq!(messages.first().unwrap().role, MessageRole::System);
    assert_eq!(messages[1], ChatMessage::user("hi"));
    assert_eq!(messages[2], ChatMessage::assistant("hello!"));
    assert_eq!(messages.last().unwrap(), &ChatMessage::user("show me rings"));
}

#[test]
fn test_context_block_cites_document_ids() {
    let assembler = PromptAssembler::default();
    let context = vec![RetrievedDocument::new("p1", "30-day returns", 0.9)];

    let messages = assembler.build_messages(&[], &context, "what is your return policy?");

    let system = &messages[0].content;
    assert!(system.contains("p1"));
    assert!(system.contains("30-day returns"));
}

#[test]
fn test_no_context_block_without_documents() {
    let assembler = PromptAssembler::default();
    let messages = assembler.build_messages(&[], &[], "hello");
    assert!(!messages[0].content.contains("Retrieved context"));
}

#[test]
fn test_history_tail_is_bounded() {
    let assembler = PromptAssembler::new(3, 4000);
    let history: Vec<HistoryEntry> = (0..10)
        .map(|i| entry(Role::User, &format!("turn {i}"), i))
        .collect();

    let messages = assembler.build_messages(&history, &[], "latest");

    // System + 3 tail entries + utterance.
    assert_eq!(messages.len(), 5);
    assert_eq!(messages[1].content, "turn 7");
    assert_eq!(messages[3].content, "turn 9");
}

#[test]
fn test_budget_drops_lowest_score_whole() {
    let assembler = PromptAssembler::new(10, 60);
    let context = vec![
        RetrievedDocument::new("low", "x".repeat(30), 0.2),
        RetrievedDocument::new("high", "y".repeat(30), 0.9),
    ];

    let messages = assembler.build_messages(&[], &context, "q");
    let system = &messages[0].content;

    assert!(system.contains("high"));
    assert!(!system.contains("[low]"));
}

#[test]
fn test_budget_keeps_everything_when_it_fits() {
    let assembler = PromptAssembler::default();
    let context = vec![
        RetrievedDocument::new("a", "first", 0.5),
        RetrievedDocument::new("b", "second", 0.9),
    ];

    let messages = assembler.build_messages(&[], &context, "q");
    let system = &messages[0].content;

    assert!(system.contains("[a] first"));
    assert!(system.contains("[b] second"));
    // Higher score listed first.
    assert!(system.find("[b]").unwrap() < system.find("[a]").unwrap());
}

#[test]
fn test_roles_are_preserved_in_order() {
    let assembler = PromptAssembler::default();
    let history = vec![
        entry(Role::User, "u1", 1),
        entry(Role::Assistant, "a1", 2),
        entry(Role::User, "u2", 3),
    ];

    let messages = assembler.build_messages(&history, &[], "u3");
    let roles: Vec<MessageRole> = messages.iter().map(|m| m.role).collect();
    assert_eq!(
        roles,
        vec![
            MessageRole::System,
            MessageRole::User,
            MessageRole::Assistant,
            MessageRole::User,
            MessageRole::User,
        ]
    );
}
