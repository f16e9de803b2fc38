//! End-to-end turn processing against a scripted model and a real in-memory store.

mod common;

use common::mocks::{classification, harness, sections, CountingStore, FailingStore};
use mioo::agents::{AgentId, AgentSelector};
use mioo::db::{ConversationStore, TursoClient};
use mioo::llm::ProviderError;
use mioo::types::{
    AppError, ConversationRecord, DisplayPayload, InteractionAction, Message, MessageRole,
    TurnState,
};
use serde_json::json;
use std::sync::Arc;

fn roles(flow: &[mioo::types::FlowStep]) -> Vec<&str> {
    flow.iter().map(|step| step.role.as_str()).collect()
}

fn chapter(text: &str) -> serde_json::Value {
    json!({"textbook_chapter": {"llm_friendly_formatted_textbook_chapter": text}})
}

// ============= Routing =============

#[tokio::test]
async fn test_concept_question_flows_through_retriever_to_milo() {
    let h = harness().build().await;
    h.client
        .reply_json(AgentId::Zene, classification("Milo", &["fiscal deficit definition"]))
        .reply_json(
            AgentId::Finn,
            sections("Fiscal deficit is the excess of total expenditure over receipts excluding borrowings."),
        )
        .reply_json(AgentId::Milo, chapter("# Fiscal Deficit\n\nDefinition..."));

    let turn = h
        .orchestrator
        .process_turn("user-1", "What is fiscal deficit?")
        .await
        .unwrap();

    assert_eq!(roles(&turn.flow), vec!["user", "zene", "finn", "milo"]);
    assert_eq!(turn.state, TurnState::Done);
    assert_eq!(
        turn.payload,
        DisplayPayload::Text("# Fiscal Deficit\n\nDefinition...".to_string())
    );

    let milo_calls = h.client.calls_for(AgentId::Milo);
    assert_eq!(milo_calls.len(), 1);
    assert_eq!(
        milo_calls[0].messages.last().unwrap().content,
        "What is fiscal deficit?\n\
         Additional context: [[\"Fiscal deficit is the excess of total expenditure over receipts excluding borrowings.\"]]\n\
         User intent: understand fiscal deficit"
    );
}

#[tokio::test]
async fn test_top_level_summary_field_becomes_context() {
    let h = harness().build().await;
    h.client
        .reply_json(AgentId::Zene, classification("Milo", &["fiscal deficit definition"]))
        .reply_json(
            AgentId::Finn,
            json!({"section_250_word_report": "Deficit overview", "sections": []}),
        )
        .reply_json(AgentId::Milo, chapter("# Chapter"));

    h.orchestrator
        .process_turn("user-1", "What is fiscal deficit?")
        .await
        .unwrap();

    let milo_calls = h.client.calls_for(AgentId::Milo);
    assert_eq!(
        milo_calls[0].messages.last().unwrap().content,
        "What is fiscal deficit?\nAdditional context: [\"Deficit overview\"]\nUser intent: understand fiscal deficit"
    );
}

#[tokio::test]
async fn test_retriever_reply_without_summary_is_passed_whole() {
    let h = harness().build().await;
    h.client
        .reply_json(AgentId::Zene, classification("Milo", &["fiscal deficit definition"]))
        .reply_json(AgentId::Finn, json!({"sections": [{"topic": "Deficits"}]}))
        .reply_json(AgentId::Milo, chapter("# Chapter"));

    let turn = h
        .orchestrator
        .process_turn("user-1", "What is fiscal deficit?")
        .await
        .unwrap();

    assert_eq!(roles(&turn.flow), vec!["user", "zene", "finn", "milo"]);
    let milo_calls = h.client.calls_for(AgentId::Milo);
    assert_eq!(
        milo_calls[0].messages.last().unwrap().content,
        "What is fiscal deficit?\nAdditional context: [{\"sections\":[{\"topic\":\"Deficits\"}]}]\nUser intent: understand fiscal deficit"
    );
}

#[tokio::test]
async fn test_retriever_receives_the_query_not_the_message() {
    let h = harness().build().await;
    h.client
        .reply_json(AgentId::Zene, classification("Milo", &["fiscal deficit definition"]))
        .reply_json(AgentId::Finn, sections("report"))
        .reply_json(AgentId::Milo, chapter("# Chapter"));

    h.orchestrator
        .process_turn("user-1", "What is fiscal deficit?")
        .await
        .unwrap();

    let finn_calls = h.client.calls_for(AgentId::Finn);
    assert_eq!(finn_calls.len(), 1);
    assert_eq!(
        finn_calls[0].messages.last().unwrap().content,
        "fiscal deficit definition"
    );
}

#[tokio::test]
async fn test_no_next_agent_returns_router_output() {
    let h = harness().build().await;
    let router_reply = classification("", &[]);
    h.client.reply_json(AgentId::Zene, router_reply.clone());

    let turn = h.orchestrator.process_turn("user-1", "hmm").await.unwrap();

    assert_eq!(roles(&turn.flow), vec!["user", "zene"]);
    assert_eq!(turn.state, TurnState::Done);
    assert_eq!(turn.payload, DisplayPayload::Structured(router_reply));
    assert_eq!(h.client.calls().len(), 1);
}

#[tokio::test]
async fn test_unknown_responder_name_returns_router_output() {
    let h = harness().build().await;
    h.client.reply_json(AgentId::Zene, classification("Mara", &[]));

    let turn = h.orchestrator.process_turn("user-1", "hello").await.unwrap();

    assert_eq!(roles(&turn.flow), vec!["user", "zene"]);
    assert!(turn.payload.as_structured().is_some());
    assert_eq!(h.client.calls().len(), 1);
}

#[tokio::test]
async fn test_named_responder_missing_from_registry_is_an_error() {
    let h = harness().without_agent(AgentId::Thalia).build().await;
    h.client.reply_json(AgentId::Zene, classification("Thalia", &[]));

    let err = h
        .orchestrator
        .process_turn("user-1", "Solve this")
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::UnknownAgent(name) if name == "thalia"));
}

#[tokio::test]
async fn test_commet_reply_becomes_heading() {
    let h = harness().build().await;
    h.client
        .reply_json(AgentId::Zene, classification("Commet", &[]))
        .reply_json(AgentId::Commet, json!({"response": "Hello! Ready to study?"}));

    let turn = h.orchestrator.process_turn("user-1", "hi").await.unwrap();

    assert_eq!(roles(&turn.flow), vec!["user", "zene", "commet"]);
    assert_eq!(
        turn.payload,
        DisplayPayload::Text("#### Hello! Ready to study?".to_string())
    );
}

#[tokio::test]
async fn test_thalia_reply_is_passed_through() {
    let h = harness().build().await;
    let solution = json!({"solution": {"final_answer": "3,000 crores"}});
    h.client
        .reply_json(AgentId::Zene, classification("thalia", &[]))
        .reply_json(AgentId::Thalia, solution.clone());

    let turn = h.orchestrator.process_turn("user-1", "Compute it").await.unwrap();

    assert_eq!(turn.payload, DisplayPayload::Structured(solution));
    assert_eq!(turn.state, TurnState::Done);
}

// ============= Retrieval =============

#[tokio::test]
async fn test_only_first_retrieval_query_is_sent_by_default() {
    let h = harness().build().await;
    h.client
        .reply_json(AgentId::Zene, classification("Commet", &["q1", "q2", "q3"]))
        .reply_json(AgentId::Finn, sections("report"))
        .reply_json(AgentId::Commet, json!({"response": "ok"}));

    let turn = h.orchestrator.process_turn("user-1", "tell me").await.unwrap();

    assert_eq!(h.client.calls_for(AgentId::Finn).len(), 1);
    assert_eq!(h.client.calls_for(AgentId::Commet).len(), 1);
    assert_eq!(roles(&turn.flow), vec!["user", "zene", "finn", "commet"]);
}

#[tokio::test]
async fn test_more_queries_still_dispatch_one_responder() {
    let h = harness().with_max_retrieval_queries(5).build().await;
    h.client
        .reply_json(AgentId::Zene, classification("Commet", &["q1", "q2", "q3"]))
        .reply_json(AgentId::Finn, sections("report"))
        .reply_json(AgentId::Commet, json!({"response": "ok"}));

    let turn = h.orchestrator.process_turn("user-1", "tell me").await.unwrap();

    assert_eq!(h.client.calls_for(AgentId::Finn).len(), 3);
    assert_eq!(h.client.calls_for(AgentId::Commet).len(), 1);
    assert_eq!(
        roles(&turn.flow),
        vec!["user", "zene", "finn", "finn", "finn", "commet"]
    );
}

#[tokio::test]
async fn test_failed_retrieval_is_skipped() {
    let h = harness().build().await;
    h.client
        .reply_json(AgentId::Zene, classification("Commet", &["q1"]))
        .reply_json(AgentId::Commet, json!({"response": "ok"}));
    // Finn has no scripted reply and fails with a non-retryable error

    let turn = h.orchestrator.process_turn("user-1", "tell me").await.unwrap();

    assert_eq!(roles(&turn.flow), vec!["user", "zene", "commet"]);
    assert_eq!(turn.state, TurnState::Done);
    let commet_calls = h.client.calls_for(AgentId::Commet);
    let prompt = &commet_calls[0].messages.last().unwrap().content;
    assert!(!prompt.contains("Additional context"));
}

#[tokio::test]
async fn test_retrieval_without_retriever_is_skipped() {
    let h = harness().without_agent(AgentId::Finn).build().await;
    h.client
        .reply_json(AgentId::Zene, classification("Commet", &["q1"]))
        .reply_json(AgentId::Commet, json!({"response": "ok"}));

    let turn = h.orchestrator.process_turn("user-1", "tell me").await.unwrap();

    assert_eq!(roles(&turn.flow), vec!["user", "zene", "commet"]);
}

// ============= Failure handling =============

#[tokio::test]
async fn test_invalid_responder_reply_falls_back_to_router_output() {
    let h = harness().build().await;
    let router_reply = classification("Milo", &[]);
    h.client
        .reply_json(AgentId::Zene, router_reply.clone())
        .reply(AgentId::Milo, "Sorry, I can only answer in prose.");

    let turn = h
        .orchestrator
        .process_turn("user-1", "Explain inflation")
        .await
        .unwrap();

    assert_eq!(turn.state, TurnState::Errored);
    assert_eq!(turn.payload, DisplayPayload::Structured(router_reply));
    assert_eq!(roles(&turn.flow), vec!["user", "zene"]);

    let milo = h.store.load("user-1", AgentId::Milo).await.unwrap().unwrap();
    let entry = milo.interaction_log.last().unwrap();
    assert!(entry.error.as_deref().unwrap().contains("teaching_notes"));
}

#[tokio::test]
async fn test_responder_generation_failure_keeps_earlier_dispatches() {
    let h = harness().build().await;
    h.client
        .reply_json(AgentId::Zene, classification("Milo", &["q1"]))
        .reply_json(AgentId::Finn, sections("report"))
        .enqueue(AgentId::Milo, Err(ProviderError::Other("bad request".into())));

    let turn = h
        .orchestrator
        .process_turn("user-1", "Explain inflation")
        .await
        .unwrap();

    assert_eq!(turn.state, TurnState::Errored);
    assert_eq!(roles(&turn.flow), vec!["user", "zene", "finn"]);

    let zene = h.store.load("user-1", AgentId::Zene).await.unwrap().unwrap();
    assert_eq!(zene.messages.len(), 2);
    let finn = h.store.load("user-1", AgentId::Finn).await.unwrap().unwrap();
    assert_eq!(finn.interaction_log.len(), 1);

    let milo = h.store.load("user-1", AgentId::Milo).await.unwrap().unwrap();
    assert!(milo.messages.is_empty());
    assert_eq!(milo.interaction_log.len(), 1);
    assert!(milo.interaction_log[0].error.is_some());
}

#[tokio::test]
async fn test_router_failure_fails_the_turn() {
    let h = harness().build().await;
    h.client
        .enqueue(AgentId::Zene, Err(ProviderError::Other("invalid api key".into())));

    let err = h.orchestrator.process_turn("user-1", "hi").await.unwrap_err();

    assert!(matches!(err, AppError::Generation(_)));
    assert_eq!(h.telemetry.snapshot().errored_turns, 1);
}

#[tokio::test]
async fn test_router_contract_violation_returns_router_output() {
    let h = harness().build().await;
    h.client.reply(AgentId::Zene, "I think Milo should take this one.");

    let turn = h.orchestrator.process_turn("user-1", "hi").await.unwrap();

    assert_eq!(turn.state, TurnState::Errored);
    let payload = turn.payload.as_structured().unwrap();
    assert!(payload.get("error").is_some());
    assert_eq!(h.client.calls().len(), 1);
}

#[tokio::test]
async fn test_transient_router_failure_is_retried() {
    let h = harness().build().await;
    h.client
        .enqueue(AgentId::Zene, Err(ProviderError::RateLimited("slow down".into())))
        .enqueue(AgentId::Zene, Err(ProviderError::Timeout("took too long".into())))
        .reply_json(AgentId::Zene, classification("", &[]));

    let turn = h.orchestrator.process_turn("user-1", "hi").await.unwrap();

    assert_eq!(turn.state, TurnState::Done);
    assert_eq!(h.client.calls_for(AgentId::Zene).len(), 3);
    let snapshot = h.telemetry.snapshot();
    let stats = &snapshot.models["test-model"];
    assert_eq!(stats.retries, 2);
    assert_eq!(stats.calls, 1);
}

#[tokio::test]
async fn test_store_failure_fails_the_turn() {
    let h = harness().with_store(Arc::new(FailingStore)).build().await;
    h.client.reply_json(AgentId::Zene, classification("", &[]));

    let err = h.orchestrator.process_turn("user-1", "hi").await.unwrap_err();

    assert!(matches!(err, AppError::Store(_)));
}

#[tokio::test]
async fn test_empty_message_is_rejected() {
    let h = harness().build().await;
    let err = h.orchestrator.process_turn("user-1", "   ").await.unwrap_err();
    assert!(matches!(err, AppError::InvalidInput(_)));
    assert!(h.client.calls().is_empty());
}

// ============= History =============

#[tokio::test]
async fn test_router_sees_its_own_history() {
    let h = harness().build().await;
    h.client.reply_json(AgentId::Zene, classification("", &[]));

    h.orchestrator.process_turn("user-1", "first").await.unwrap();
    h.orchestrator.process_turn("user-1", "second").await.unwrap();

    let calls = h.client.calls_for(AgentId::Zene);
    assert_eq!(calls[0].messages.len(), 2);
    // system, previous user, previous assistant, current user
    assert_eq!(calls[1].messages.len(), 4);
    assert_eq!(calls[1].messages[0].role, MessageRole::System);
    assert_eq!(calls[1].messages[1].content, "first");
    assert_eq!(calls[1].messages[3].content, "second");
}

#[tokio::test]
async fn test_retriever_without_history_sends_only_the_query() {
    let h = harness().build().await;
    h.client
        .reply_json(AgentId::Zene, classification("", &["q"]))
        .reply_json(AgentId::Finn, sections("report"));

    h.orchestrator.process_turn("user-1", "one").await.unwrap();
    h.orchestrator.process_turn("user-1", "two").await.unwrap();

    let calls = h.client.calls_for(AgentId::Finn);
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[1].messages.len(), 2);

    // History is still recorded
    let finn = h.store.load("user-1", AgentId::Finn).await.unwrap().unwrap();
    assert_eq!(finn.messages.len(), 4);
}

#[tokio::test]
async fn test_window_is_bounded_and_keeps_first_message() {
    let h = harness().with_token_limit(4).build().await;
    h.client.reply_json(AgentId::Zene, classification("", &[]));

    for message in ["m1", "m2", "m3"] {
        h.orchestrator.process_turn("user-1", message).await.unwrap();
    }

    let zene = h.store.load("user-1", AgentId::Zene).await.unwrap().unwrap();
    assert_eq!(zene.messages.len(), 4);
    assert_eq!(zene.messages[0].content, "m1");
    assert_eq!(zene.messages[2].content, "m3");
    assert_eq!(zene.interaction_log.len(), 3);
}

#[tokio::test]
async fn test_users_do_not_share_conversations() {
    let h = harness().build().await;
    h.client.reply_json(AgentId::Zene, classification("", &[]));

    h.orchestrator.process_turn("alice", "hi").await.unwrap();

    assert!(h.store.load("bob", AgentId::Zene).await.unwrap().is_none());
    assert!(h.store.load("alice", AgentId::Zene).await.unwrap().is_some());
}

// ============= Reset & delete =============

#[tokio::test]
async fn test_reset_of_empty_conversation_writes_nothing() {
    let counting = Arc::new(CountingStore::new(Arc::new(
        TursoClient::new_memory().await.unwrap(),
    )));
    let h = harness().with_store(counting.clone()).build().await;

    let summaries = h
        .orchestrator
        .reset_conversation("user-1", AgentSelector::One(AgentId::Milo))
        .await
        .unwrap();

    assert_eq!(
        summaries,
        vec![(
            AgentId::Milo,
            "No milo conversation history to summarize".to_string()
        )]
    );
    assert_eq!(counting.saves(), 0);
    assert!(h.client.calls().is_empty());
}

#[tokio::test]
async fn test_reset_collapses_history_into_summary() {
    let h = harness().build().await;
    let mut record = ConversationRecord::new("user-1", AgentId::Milo);
    record.messages = vec![
        Message::user("What is fiscal deficit?"),
        Message::assistant("{\"textbook_chapter\": {}}"),
        Message::user("And revenue deficit?"),
        Message::assistant("{\"textbook_chapter\": {}}"),
    ];
    h.store.save(&record).await.unwrap();
    h.client
        .reply(AgentId::Summary, "The user studied fiscal and revenue deficits.");

    let summaries = h
        .orchestrator
        .reset_conversation("user-1", AgentSelector::One(AgentId::Milo))
        .await
        .unwrap();
    assert_eq!(summaries[0].1, "The user studied fiscal and revenue deficits.");

    let summary_calls = h.client.calls_for(AgentId::Summary);
    assert_eq!(summary_calls.len(), 1);
    assert!(summary_calls[0].messages[1]
        .content
        .starts_with("Summarize the following conversation: "));

    let milo = h.store.load("user-1", AgentId::Milo).await.unwrap().unwrap();
    assert_eq!(milo.messages.len(), 1);
    assert_eq!(milo.messages[0].role, MessageRole::System);
    assert_eq!(
        milo.messages[0].content,
        "Previous conversation summary: The user studied fiscal and revenue deficits."
    );
    let entry = milo.interaction_log.last().unwrap();
    assert_eq!(entry.action, Some(InteractionAction::ConversationReset));
}

#[tokio::test]
async fn test_reset_all_covers_every_conversational_agent() {
    let h = harness().build().await;
    h.client.reply(AgentId::Summary, "summary");

    let summaries = h
        .orchestrator
        .reset_conversation("user-1", AgentSelector::All)
        .await
        .unwrap();

    let agents: Vec<AgentId> = summaries.iter().map(|(agent, _)| *agent).collect();
    assert_eq!(
        agents,
        vec![
            AgentId::Zene,
            AgentId::Finn,
            AgentId::Commet,
            AgentId::Milo,
            AgentId::Thalia
        ]
    );
}

#[tokio::test]
async fn test_reset_all_keeps_earlier_summaries_when_one_fails() {
    let h = harness().build().await;
    for agent in [AgentId::Zene, AgentId::Milo] {
        let mut record = ConversationRecord::new("user-1", agent);
        record.messages = vec![
            Message::user("What is fiscal deficit?"),
            Message::assistant("{}"),
        ];
        h.store.save(&record).await.unwrap();
    }
    h.client
        .enqueue(AgentId::Summary, Ok("zene summary".to_string()))
        .enqueue(AgentId::Summary, Err(ProviderError::Other("summarizer down".to_string())));

    let err = h
        .orchestrator
        .reset_conversation("user-1", AgentSelector::All)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Generation(_)));

    let zene = h.store.load("user-1", AgentId::Zene).await.unwrap().unwrap();
    assert_eq!(
        zene.messages,
        vec![Message::system("Previous conversation summary: zene summary")]
    );
    let milo = h.store.load("user-1", AgentId::Milo).await.unwrap().unwrap();
    assert_eq!(milo.messages.len(), 2);
    assert!(milo.interaction_log.is_empty());
}

#[tokio::test]
async fn test_reset_of_unconfigured_agent_is_an_error() {
    let h = harness().without_agent(AgentId::Thalia).build().await;
    let err = h
        .orchestrator
        .reset_conversation("user-1", AgentSelector::One(AgentId::Thalia))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::UnknownAgent(_)));
}

#[tokio::test]
async fn test_delete_one_and_all() {
    let h = harness().build().await;
    h.client
        .reply_json(AgentId::Zene, classification("Milo", &["q"]))
        .reply_json(AgentId::Finn, sections("report"))
        .reply_json(AgentId::Milo, chapter("# Chapter"));
    h.orchestrator.process_turn("user-1", "explain").await.unwrap();

    let deleted = h
        .orchestrator
        .delete_conversation("user-1", AgentSelector::One(AgentId::Finn))
        .await
        .unwrap();
    assert_eq!(deleted, 1);

    let deleted = h
        .orchestrator
        .delete_conversation("user-1", AgentSelector::All)
        .await
        .unwrap();
    assert_eq!(deleted, 2);
    assert!(h.store.load("user-1", AgentId::Zene).await.unwrap().is_none());
}

