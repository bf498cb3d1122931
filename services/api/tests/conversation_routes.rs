mod common;

use axum::http::StatusCode;
use common::{MemoryDb, ScriptedLlm, TestApp};
use readtention_core::{
    domain::{ConversationMessage, MessageKind, MessageRole},
    ports::{DatabaseService, PortError},
    prompt::FALLBACK_REPLY,
    stage::{COMPLETE_FOLLOW_UP, CENTRAL_FOLLOW_UP, DECLINED_MESSAGE},
    ConversationState, Stage,
};
use serde_json::{json, Value};

fn contents(body: &Value) -> Vec<String> {
    body["messages"]
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["content"].as_str().unwrap().to_string())
        .collect()
}

fn contents_of(app: &TestApp, book_id: uuid::Uuid) -> Vec<String> {
    app.db.messages(book_id).into_iter().map(|m| m.content).collect()
}

#[tokio::test]
async fn first_visit_posts_a_single_welcome() {
    let app = TestApp::idle();
    let book = app.db.insert_book("Atomic Habits", "James Clear");
    let uri = format!("/books/{}/conversation", book.id);

    let (status, body) = app.get(&uri).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["stage"], "welcome");
    assert_eq!(body["messages"][0]["type"], "welcome");
    assert_eq!(
        body["messages"][0]["content"],
        "👋 Welcome! Ready to generate your mind map for *Atomic Habits*?"
    );

    let (_, again) = app.get(&uri).await;
    assert_eq!(again["messages"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn book_with_history_but_no_state_resumes_in_refinement() {
    let app = TestApp::idle();
    let book = app.db.insert_book("Atomic Habits", "James Clear");
    app.db
        .push_message(ConversationMessage::new(book.id, MessageRole::User, "Old thought"));

    let (_, body) = app.get(&format!("/books/{}/conversation", book.id)).await;
    assert_eq!(body["stage"], "refinement");
    assert_eq!(contents(&body), vec!["Old thought"]);
}

#[tokio::test]
async fn step_by_step_builds_the_outline() {
    let app = TestApp::new(
        MemoryDb::default(),
        ScriptedLlm::new("gpt-4"),
        ScriptedLlm::new("gpt-4o-mini")
            .reply("Identity shapes behavior")
            .reply("[\"Identity\", \"Systems\"]")
            .reply("- Small wins")
            .reply("Environment design, Habit stacking"),
        ScriptedLlm::new("gpt-4o-mini"),
    );
    let book = app.db.insert_book("Atomic Habits", "James Clear");
    let uri = format!("/books/{}/conversation/messages", book.id);

    let (status, body) = app.post(&uri, json!({ "message": "It's really about who you become" })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["stage"], "branches");
    assert_eq!(contents(&body), vec!["It's really about who you become", CENTRAL_FOLLOW_UP]);
    assert_eq!(body["mindmap"], "# Identity shapes behavior");

    let (_, body) = app.post(&uri, json!({ "message": "identity and systems" })).await;
    assert_eq!(body["stage"], "subbranches");
    assert!(contents(&body)[1].contains("\"Identity\""));

    let (_, body) = app.post(&uri, json!({ "message": "small wins" })).await;
    assert_eq!(body["stage"], "subbranches");
    assert!(contents(&body)[1].contains("\"Systems\""));

    let (_, body) = app.post(&uri, json!({ "message": "environment, stacking" })).await;
    assert_eq!(body["stage"], "refinement");
    assert_eq!(contents(&body)[1], COMPLETE_FOLLOW_UP);
    let outline = "# Identity shapes behavior\n- Identity\n  - Small wins\n- Systems\n  - Environment design\n  - Habit stacking";
    assert_eq!(body["mindmap"], outline);

    let saved = app.db.mindmaps(book.id);
    assert_eq!(saved.len(), 1);
    assert_eq!(saved[0].content, outline);
    assert_eq!(saved[0].metadata["customization"], "step-by-step");

    // The outline prompts carry what was decided so far.
    let requests = app.reflect_llm.requests();
    assert!(requests[1].messages[0].content.contains("\"Identity shapes behavior\""));
    assert!(requests[3].messages[0].content.contains("branch \"Systems\""));

    // Refinement falls through to a Socratic reply.
    let (_, body) = app.post(&uri, json!({ "message": "One more thought" })).await;
    assert_eq!(body["stage"], "refinement");
    assert_eq!(contents(&body), vec!["One more thought", FALLBACK_REPLY]);
}

#[tokio::test]
async fn upstream_failure_posts_fallback_without_advancing() {
    let app = TestApp::idle();
    let book = app.db.insert_book("Atomic Habits", "James Clear");
    app.get(&format!("/books/{}/conversation", book.id)).await;

    let (status, body) = app
        .post(
            &format!("/books/{}/conversation/messages", book.id),
            json!({ "message": "Identity first" }),
        )
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["stage"], "welcome");
    assert_eq!(contents(&body), vec!["Identity first", FALLBACK_REPLY]);
    assert!(app.db.state(book.id).unwrap().tree.is_empty());
}

#[tokio::test]
async fn accept_generates_the_mindmap_and_moves_to_refinement() {
    let app = TestApp::new(
        MemoryDb::default(),
        ScriptedLlm::new("gpt-4").reply("# Atomic Habits\n## Key Characters"),
        ScriptedLlm::new("gpt-4o-mini"),
        ScriptedLlm::new("gpt-4o-mini"),
    );
    let book = app.db.insert_book("Atomic Habits", "James Clear");

    let (status, body) = app
        .post(
            &format!("/books/{}/conversation/accept", book.id),
            json!({ "lensData": { "preset": "people-person" } }),
        )
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["stage"], "refinement");
    assert_eq!(body["mindmap"], "# Atomic Habits\n## Key Characters");
    assert!(body.get("error").is_none());
    let messages = contents(&body);
    assert!(messages[0].contains("with character, emotional, connective perspectives"));
    assert_eq!(body["messages"][1]["type"], "mindmap_generated");

    let (_, conversation) = app.get(&format!("/books/{}/conversation", book.id)).await;
    assert_eq!(conversation["mindmap"], "# Atomic Habits\n## Key Characters");
    let kinds: Vec<Option<MessageKind>> = app.db.messages(book.id).iter().map(|m| m.kind).collect();
    assert_eq!(
        kinds,
        vec![Some(MessageKind::Welcome), None, Some(MessageKind::MindmapGenerated)]
    );
}

#[tokio::test]
async fn accept_failure_switches_to_manual_building() {
    let app = TestApp::new(
        MemoryDb::default(),
        ScriptedLlm::new("gpt-4").fail("Rate limit reached"),
        ScriptedLlm::new("gpt-4o-mini"),
        ScriptedLlm::new("gpt-4o-mini"),
    );
    let book = app.db.insert_book("Atomic Habits", "James Clear");

    let (status, body) = app
        .post(&format!("/books/{}/conversation/accept", book.id), json!({}))
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["stage"], "central");
    assert_eq!(body["error"], "OpenAI API error: Rate limit reached");
    let last = contents(&body).pop().unwrap();
    assert_eq!(
        last,
        "❌ 🤖 AI service is temporarily unavailable. Let's create your mind map manually instead! \
What's the main theme or central idea of \"Atomic Habits\"?"
    );
    assert!(app.db.mindmaps(book.id).is_empty());
}

#[tokio::test]
async fn decline_then_start_over_leaves_one_welcome() {
    let app = TestApp::idle();
    let book = app.db.insert_book("Atomic Habits", "James Clear");

    let (_, body) = app
        .post(&format!("/books/{}/conversation/decline", book.id), json!({}))
        .await;
    assert_eq!(body["stage"], "declined");
    assert_eq!(contents(&body), vec![DECLINED_MESSAGE]);

    app.post(
        &format!("/books/{}/conversation/messages", book.id),
        json!({ "message": "Changed my mind" }),
    )
    .await;
    assert_eq!(app.db.messages(book.id).len(), 4);

    let (status, body) = app
        .post(&format!("/books/{}/conversation/start-over", book.id), json!({}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["stage"], "welcome");

    let messages = app.db.messages(book.id);
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].kind, Some(MessageKind::Welcome));
    assert_eq!(app.db.state(book.id).unwrap().stage.as_str(), "welcome");
}

#[tokio::test]
async fn decline_is_rejected_after_the_welcome_step() {
    let app = TestApp::new(
        MemoryDb::default(),
        ScriptedLlm::new("gpt-4").reply("# Atomic Habits"),
        ScriptedLlm::new("gpt-4o-mini"),
        ScriptedLlm::new("gpt-4o-mini"),
    );
    let book = app.db.insert_book("Atomic Habits", "James Clear");
    app.post(&format!("/books/{}/conversation/accept", book.id), json!({}))
        .await;
    let before = app.db.messages(book.id).len();

    let (status, body) = app
        .post(&format!("/books/{}/conversation/decline", book.id), json!({}))
        .await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "Cannot decline a conversation at 'refinement'");
    assert_eq!(app.db.state(book.id).unwrap().stage, Stage::Refinement);
    assert_eq!(app.db.messages(book.id).len(), before);
}

#[tokio::test]
async fn saving_from_a_stale_version_conflicts() {
    let db = MemoryDb::default();
    let book = db.insert_book("Atomic Habits", "James Clear");
    let loaded = db
        .save_conversation_state(ConversationState::new(book.id, Stage::Welcome))
        .await
        .unwrap();

    let mut first = loaded.clone();
    first.stage = Stage::Central;
    db.save_conversation_state(first).await.unwrap();

    let mut second = loaded;
    second.stage = Stage::Declined;
    let err = db.save_conversation_state(second).await.unwrap_err();
    assert!(matches!(err, PortError::Conflict(_)));
    assert_eq!(db.state(book.id).unwrap().stage, Stage::Central);
}

#[tokio::test]
async fn concurrent_turn_gets_409_and_posts_nothing() {
    let app = TestApp::idle();
    let book = app.db.insert_book("Atomic Habits", "James Clear");
    app.get(&format!("/books/{}/conversation", book.id)).await;
    app.db.race_next_state_save();

    let (status, body) = app
        .post(
            &format!("/books/{}/conversation/messages", book.id),
            json!({ "message": "Identity first" }),
        )
        .await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["error"].as_str().unwrap().starts_with("expected version"));
    assert_eq!(app.db.messages(book.id).len(), 1);
}

#[tokio::test]
async fn start_over_conflict_keeps_the_history() {
    let app = TestApp::idle();
    let book = app.db.insert_book("Atomic Habits", "James Clear");
    app.post(&format!("/books/{}/conversation/decline", book.id), json!({}))
        .await;
    app.db.race_next_state_save();

    let (status, _) = app
        .post(&format!("/books/{}/conversation/start-over", book.id), json!({}))
        .await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(contents_of(&app, book.id), vec![
        "👋 Welcome! Ready to generate your mind map for *Atomic Habits*?".to_string(),
        DECLINED_MESSAGE.to_string(),
    ]);
    assert_eq!(app.db.state(book.id).unwrap().stage, Stage::Declined);

    // Once nobody else is writing, starting over succeeds.
    let (status, _) = app
        .post(&format!("/books/{}/conversation/start-over", book.id), json!({}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(app.db.messages(book.id).len(), 1);
}

#[tokio::test]
async fn conversation_routes_reject_bad_input() {
    let app = TestApp::idle();
    let book = app.db.insert_book("Atomic Habits", "James Clear");

    let (status, body) = app
        .post(&format!("/books/{}/conversation/messages", book.id), json!({ "message": "" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Missing message");

    let (status, _) = app
        .get(&format!("/books/{}/conversation", uuid::Uuid::new_v4()))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
