use std::sync::Arc;

use axum::http::StatusCode;
use axum_test::TestServer;
use orchestrator::{OrchestratorConfig, ScriptStep, ScriptedProvider};
use serde_json::{json, Value};
use server::{create_router, state::AppState};

fn setup_test_server(provider: &ScriptedProvider) -> TestServer {
    let state = AppState::with_provider(Arc::new(provider.clone()), OrchestratorConfig::default());
    let app = create_router(state);
    TestServer::new(app).expect("Failed to create test server")
}

fn debate_payload(participants: usize, rounds: u32) -> Value {
    let participants: Vec<Value> = (0..participants)
        .map(|i| {
            json!({
                "name": format!("Speaker {}", i + 1),
                "model": format!("vendor/model-{}", i + 1),
                "system_prompt": "Argue concisely."
            })
        })
        .collect();
    json!({
        "topic": "Is remote work better?",
        "participants": participants,
        "max_rounds": rounds
    })
}

async fn create_debate(server: &TestServer, participants: usize, rounds: u32) -> String {
    let response = server
        .post("/api/debates")
        .json(&debate_payload(participants, rounds))
        .await;
    response.assert_status(StatusCode::CREATED);
    let body: Value = response.json();
    body["id"].as_str().unwrap().to_string()
}

/// Splits an SSE body into (event name, JSON data) pairs.
fn sse_events(body: &str) -> Vec<(String, Value)> {
    let mut events = Vec::new();
    let mut name = None;
    for line in body.lines() {
        if let Some(event) = line.strip_prefix("event:") {
            name = Some(event.trim().to_string());
        } else if let Some(data) = line.strip_prefix("data:") {
            if let Some(event) = name.take() {
                events.push((event, serde_json::from_str(data.trim()).unwrap()));
            }
        }
    }
    events
}

async fn run_turn(server: &TestServer, id: &str) -> Vec<(String, Value)> {
    let response = server.post(&format!("/api/debates/{}/turns", id)).await;
    response.assert_status_ok();
    sse_events(&response.text())
}

mod health {
    use super::*;

    #[tokio::test]
    async fn test_health_endpoint() {
        let server = setup_test_server(&ScriptedProvider::new());

        let response = server.get("/health").await;

        response.assert_status_ok();
        let body: Value = response.json();
        assert_eq!(body["status"], "ok");
        assert_eq!(body["provider"], "scripted");
        assert_eq!(body["debates"], 0);
    }

    #[tokio::test]
    async fn test_openapi_document() {
        let server = setup_test_server(&ScriptedProvider::new());

        let response = server.get("/api/openapi.json").await;

        response.assert_status_ok();
        let body: Value = response.json();
        assert!(body["paths"]["/api/debates/{id}/turns"].is_object());
    }
}

mod debates_crud {
    use super::*;

    #[tokio::test]
    async fn test_create_debate_returns_201_ready() {
        let server = setup_test_server(&ScriptedProvider::new());

        let response = server
            .post("/api/debates")
            .json(&debate_payload(3, 2))
            .await;

        response.assert_status(StatusCode::CREATED);
        let body: Value = response.json();
        assert_eq!(body["state"], "ready");
        assert_eq!(body["current_round"], 1);
        assert_eq!(body["context_window"], 6);
        assert_eq!(body["participants"].as_array().unwrap().len(), 3);
        assert_eq!(body["available_commands"], json!(["next_turn", "stop"]));
    }

    #[tokio::test]
    async fn test_create_debate_rejects_out_of_range() {
        let server = setup_test_server(&ScriptedProvider::new());

        for payload in [debate_payload(1, 2), debate_payload(5, 2), debate_payload(2, 6)] {
            let response = server.post("/api/debates").json(&payload).await;
            response.assert_status(StatusCode::BAD_REQUEST);
            let body: Value = response.json();
            assert_eq!(body["error"], "bad_request");
        }

        let list: Value = server.get("/api/debates").await.json();
        assert!(list.as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_get_unknown_debate_returns_404() {
        let server = setup_test_server(&ScriptedProvider::new());

        let response = server
            .get(&format!("/api/debates/{}", uuid::Uuid::new_v4()))
            .await;

        response.assert_status(StatusCode::NOT_FOUND);
        let body: Value = response.json();
        assert_eq!(body["error"], "not_found");
    }

    #[tokio::test]
    async fn test_list_and_delete() {
        let server = setup_test_server(&ScriptedProvider::new());
        let first = create_debate(&server, 2, 1).await;
        create_debate(&server, 2, 3).await;

        let list: Value = server.get("/api/debates").await.json();
        assert_eq!(list.as_array().unwrap().len(), 2);

        server
            .delete(&format!("/api/debates/{}", first))
            .await
            .assert_status(StatusCode::NO_CONTENT);
        server
            .get(&format!("/api/debates/{}", first))
            .await
            .assert_status(StatusCode::NOT_FOUND);
        server
            .delete(&format!("/api/debates/{}", first))
            .await
            .assert_status(StatusCode::NOT_FOUND);
    }
}

mod turns {
    use super::*;

    #[tokio::test]
    async fn test_full_debate_over_sse() {
        let server = setup_test_server(&ScriptedProvider::new());
        let id = create_debate(&server, 2, 2).await;

        let mut speakers = Vec::new();
        let mut last_events = Vec::new();
        for _ in 0..4 {
            let events = run_turn(&server, &id).await;
            let complete = events
                .iter()
                .find(|(name, _)| name == "complete")
                .expect("turn should complete");
            speakers.push((
                complete.1["turn"]["round"].as_u64().unwrap(),
                complete.1["turn"]["participant_index"].as_u64().unwrap(),
            ));
            last_events = events;
        }
        assert_eq!(speakers, vec![(1, 0), (1, 1), (2, 0), (2, 1)]);

        let names: Vec<&str> = last_events.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["chunk", "complete", "round_complete", "debate_complete"]);
        assert_eq!(last_events[3].1["manual_stop"], false);

        let body: Value = server.get(&format!("/api/debates/{}", id)).await.json();
        assert_eq!(body["state"], "completed");
        assert_eq!(body["rounds"].as_array().unwrap().len(), 2);
        assert_eq!(body["available_commands"], json!([]));
        assert_eq!(
            body["metrics"]["total_cost"],
            body["metrics"]["by_participant"][0]["cost"].as_f64().unwrap()
                + body["metrics"]["by_participant"][1]["cost"].as_f64().unwrap()
        );
    }

    #[tokio::test]
    async fn test_next_turn_on_completed_debate_returns_409() {
        let server = setup_test_server(&ScriptedProvider::new());
        let id = create_debate(&server, 2, 1).await;
        run_turn(&server, &id).await;
        run_turn(&server, &id).await;

        let response = server.post(&format!("/api/debates/{}/turns", id)).await;

        response.assert_status(StatusCode::CONFLICT);
        let body: Value = response.json();
        assert_eq!(body["error"], "conflict");
        assert!(body["message"].as_str().unwrap().contains("completed"));
    }

    #[tokio::test]
    async fn test_provider_failure_moves_debate_to_error() {
        let provider = ScriptedProvider::new();
        provider.push_response(vec![ScriptStep::chunk("Opening statement."), ScriptStep::complete()]);
        provider.push_response(vec![
            ScriptStep::chunk("I would argue"),
            ScriptStep::Fail("model overloaded".to_string()),
        ]);
        let server = setup_test_server(&provider);
        let id = create_debate(&server, 2, 2).await;

        run_turn(&server, &id).await;
        let events = run_turn(&server, &id).await;
        let (name, data) = events.last().unwrap();
        assert_eq!(name, "error");
        assert_eq!(data["reason"], "model overloaded");

        let body: Value = server.get(&format!("/api/debates/{}", id)).await.json();
        assert_eq!(body["state"], "error");
        assert_eq!(body["last_error"], "model overloaded");
        assert_eq!(body["rounds"][0]["turns"].as_array().unwrap().len(), 1);
        assert_eq!(body["available_commands"], json!(["resume", "stop"]));

        let resumed: Value = server
            .post(&format!("/api/debates/{}/resume", id))
            .await
            .json();
        assert_eq!(resumed["state"], "running");
        assert!(resumed["last_error"].is_null());
    }
}

mod lifecycle {
    use super::*;

    #[tokio::test]
    async fn test_pause_requires_running() {
        let server = setup_test_server(&ScriptedProvider::new());
        let id = create_debate(&server, 2, 1).await;

        server
            .post(&format!("/api/debates/{}/pause", id))
            .await
            .assert_status(StatusCode::CONFLICT);
        server
            .post(&format!("/api/debates/{}/resume", id))
            .await
            .assert_status(StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_pause_and_resume_between_turns() {
        let server = setup_test_server(&ScriptedProvider::new());
        let id = create_debate(&server, 2, 2).await;
        run_turn(&server, &id).await;

        let paused: Value = server
            .post(&format!("/api/debates/{}/pause", id))
            .await
            .json();
        assert_eq!(paused["state"], "paused");

        server
            .post(&format!("/api/debates/{}/turns", id))
            .await
            .assert_status(StatusCode::CONFLICT);

        let resumed: Value = server
            .post(&format!("/api/debates/{}/resume", id))
            .await
            .json();
        assert_eq!(resumed["state"], "running");

        let events = run_turn(&server, &id).await;
        let complete = events.iter().find(|(n, _)| n == "complete").unwrap();
        assert_eq!(complete.1["turn"]["participant_index"], 1);
        assert_eq!(complete.1["turn"]["round"], 1);
    }

    #[tokio::test]
    async fn test_stop_completes_with_manual_flag() {
        let server = setup_test_server(&ScriptedProvider::new());
        let id = create_debate(&server, 2, 3).await;
        run_turn(&server, &id).await;

        let response = server.post(&format!("/api/debates/{}/stop", id)).await;

        response.assert_status_ok();
        let body: Value = response.json();
        assert_eq!(body["state"], "completed");
        assert_eq!(body["manually_stopped"], true);

        server
            .post(&format!("/api/debates/{}/stop", id))
            .await
            .assert_status(StatusCode::CONFLICT);
    }
}

mod summary {
    use super::*;

    #[tokio::test]
    async fn test_summary_requires_completed_turn() {
        let server = setup_test_server(&ScriptedProvider::new());
        let id = create_debate(&server, 2, 1).await;

        server
            .get(&format!("/api/debates/{}/summary", id))
            .await
            .assert_status(StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_summary_and_markdown_export() {
        let server = setup_test_server(&ScriptedProvider::new());
        let id = create_debate(&server, 2, 1).await;
        run_turn(&server, &id).await;
        run_turn(&server, &id).await;

        let summary: Value = server
            .get(&format!("/api/debates/{}/summary", id))
            .await
            .json();
        let markdown = summary["markdown"].as_str().unwrap();
        assert!(markdown.starts_with("# Debate: Is remote work better?"));
        assert!(markdown.contains("## Round 1"));
        assert!(markdown.contains("### Speaker 1"));
        assert!(markdown.contains("vendor/model-2 responds."));
        assert_eq!(
            summary["transcript"]["rounds"][0]["turns"]
                .as_array()
                .unwrap()
                .len(),
            2
        );

        let export = server.get(&format!("/api/debates/{}/export.md", id)).await;
        export.assert_status_ok();
        assert!(export
            .header("content-type")
            .to_str()
            .unwrap()
            .starts_with("text/markdown"));
        assert_eq!(export.text(), markdown);
    }
}
