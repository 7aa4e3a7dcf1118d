//! Conversation history and compaction through the chat responder

use chatty_copilot::conversation::MIN_THRESHOLD;
use chatty_copilot::persona::get_persona;
use chatty_copilot::{
    ChatFailure, ChatResponder, CompactionConfig, Conversation, HistoryCompactor, Message,
    PersonaId, Role,
};

mod common;

use common::ScriptedModel;

fn responder(model: &std::sync::Arc<ScriptedModel>, threshold: usize) -> ChatResponder {
    ChatResponder::new(
        model.clone(),
        "gpt-4o-mini".to_string(),
        HistoryCompactor::new(
            CompactionConfig {
                threshold,
                ..Default::default()
            },
            "gpt-4o-mini".to_string(),
        ),
    )
}

/// Anchor plus `turns` alternating user/assistant messages
fn history(turns: usize) -> Conversation {
    let persona = get_persona(PersonaId::Professional).unwrap();
    let mut messages = vec![Message::system(persona.compose_system_prompt())];
    for i in 0..turns {
        if i % 2 == 0 {
            messages.push(Message::user(format!("question {i}")));
        } else {
            messages.push(Message::assistant(format!("answer {i}")));
        }
    }
    Conversation::from_messages(messages)
}

#[tokio::test]
async fn test_first_exchange_anchors_persona() {
    let model = ScriptedModel::replying(&["Altitude is 35,000 feet."]);
    let persona = get_persona(PersonaId::Professional).unwrap();
    let mut conversation = Conversation::new();

    let reply = responder(&model, 20)
        .respond(&mut conversation, persona, "What's our altitude?")
        .await;

    assert_eq!(reply.as_deref(), Ok("Altitude is 35,000 feet."));
    assert_eq!(conversation.len(), 3);
    assert_eq!(
        conversation.anchor().unwrap().content,
        persona.compose_system_prompt()
    );

    let requests = model.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].len(), 2);
    assert_eq!(requests[0][0].role, Role::System);
    assert_eq!(requests[0][1], Message::user("What's our altitude?"));
}

#[tokio::test]
async fn test_long_history_is_summarized_before_request() {
    let model = ScriptedModel::replying(&["Pilot asked about weather and fuel.", "Noted."]);
    let persona = get_persona(PersonaId::Professional).unwrap();
    let mut conversation = history(20);
    assert_eq!(conversation.len(), 21);

    let reply = responder(&model, 20)
        .respond(&mut conversation, persona, "Anything else?")
        .await;
    assert_eq!(reply.as_deref(), Ok("Noted."));

    // 22 after the user message, 13 after folding ten, 14 with the reply
    assert_eq!(conversation.len(), 14);
    let messages = conversation.messages();
    assert_eq!(messages[0].role, Role::System);
    assert_eq!(
        messages[1],
        Message::system("Summary: Pilot asked about weather and fuel.")
    );
    assert_eq!(messages[2].content, "question 10");
    assert_eq!(messages[12], Message::user("Anything else?"));
    assert_eq!(messages[13], Message::assistant("Noted."));

    let requests = model.requests();
    assert_eq!(requests.len(), 2);

    // Summarization request covers positions 1..=10
    assert_eq!(requests[0].len(), 1);
    let transcript = &requests[0][0].content;
    assert!(transcript.starts_with("Summarize the following conversation concisely:\n"));
    assert!(transcript.contains("User: question 0\n"));
    assert!(transcript.contains("Assistant: answer 9\n"));
    assert!(!transcript.contains("question 10"));

    // The chat request carries the whole compacted history (13 <= 20)
    assert_eq!(requests[1].len(), 13);
    assert_eq!(requests[1].last().unwrap(), &Message::user("Anything else?"));
}

#[tokio::test]
async fn test_failed_summary_keeps_history_and_still_replies() {
    let model = ScriptedModel::replying(&["   ", "Still here."]);
    let persona = get_persona(PersonaId::Friendly).unwrap();
    let mut conversation = history(20);

    let reply = responder(&model, 20)
        .respond(&mut conversation, persona, "Hello?")
        .await;
    assert_eq!(reply.as_deref(), Ok("Still here."));
    assert_eq!(conversation.len(), 23);

    // Only the trailing window goes out
    let requests = model.requests();
    assert_eq!(requests[1].len(), 20);
    assert_eq!(requests[1].last().unwrap(), &Message::user("Hello?"));
}

#[tokio::test]
async fn test_history_stays_bounded_at_smallest_threshold() {
    let model = ScriptedModel::replying(&vec!["ok"; 200]);
    let persona = get_persona(PersonaId::Nervous).unwrap();
    let responder = responder(&model, MIN_THRESHOLD);
    let mut conversation = Conversation::new();

    for turn in 0..50 {
        responder
            .respond(&mut conversation, persona, &format!("turn {turn}"))
            .await
            .unwrap();
        assert!(
            conversation.len() <= MIN_THRESHOLD + 2,
            "turn {turn}: {} messages",
            conversation.len()
        );
    }

    // Oldest real turns were folded away
    let messages = conversation.messages();
    assert_eq!(messages[1].content, "Summary: ok");
    assert!(messages.iter().all(|m| m.content != "turn 0"));
    assert_eq!(messages.last().unwrap(), &Message::assistant("ok"));
}

#[tokio::test]
async fn test_blank_input_never_reaches_model() {
    let model = ScriptedModel::replying(&["unused"]);
    let persona = get_persona(PersonaId::Annoyed).unwrap();
    let mut conversation = Conversation::new();

    let reply = responder(&model, 20)
        .respond(&mut conversation, persona, "  \n")
        .await;

    assert_eq!(reply, Err(ChatFailure::EmptyInput));
    assert!(conversation.is_empty());
    assert_eq!(model.call_count(), 0);
}

#[tokio::test]
async fn test_empty_reply_is_a_failure() {
    let model = ScriptedModel::replying(&[""]);
    let persona = get_persona(PersonaId::Sarcastic).unwrap();
    let mut conversation = Conversation::new();

    let reply = responder(&model, 20)
        .respond(&mut conversation, persona, "Say something")
        .await;

    assert_eq!(reply, Err(ChatFailure::EmptyReply));
    assert_eq!(conversation.last().unwrap().role, Role::User);
}
