//! End-to-end integration tests for the policybot pipeline.
//!
//! These tests wire the real HTTP clients (completion endpoint, LightRAG,
//! Memobase) to mock servers and drive `POST /chat` through the gateway,
//! covering profile extraction, retrieval, prompt filling, streaming, session
//! history and the memory write-back.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use policybot_agent::{ChatOrchestrator, ChatStreamEvent};
use policybot_config::{AppConfig, ContextExtraction, MissingTemplatePolicy, RetrievalMode};
use policybot_core::message::SessionId;
use policybot_gateway::{GatewayState, build_router};
use serde_json::json;
use tower::ServiceExt;
use wiremock::matchers::{body_partial_json, body_string_contains, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

// ── Mock services ────────────────────────────────────────────────────────

const SSE_ANSWER: &str = concat!(
    "data: {\"choices\":[{\"delta\":{\"reasoning_content\":\"用户想了解大赛\"}}]}\n\n",
    "data: {\"choices\":[{\"delta\":{\"content\":\"创新大赛\"}}]}\n\n",
    "data: {\"choices\":[{\"delta\":{\"content\":\"报名截止到月底。\"}}]}\n\n",
    "data: [DONE]\n\n",
);

fn memobase_ok(data: serde_json::Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({"data": data, "errno": 0, "errmsg": ""}))
}

async fn mount_memobase(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/api/v1/users/user-e2e"))
        .respond_with(memobase_ok(json!({"data": {}})))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/v1/users/profile/user-e2e"))
        .and(query_param("only_topics", "interest,basic_info,life_event"))
        .respond_with(memobase_ok(json!({
            "profiles": [
                {"id": "p1", "content": "喜欢跑步 [mention id=3] 每天",
                 "attributes": {"topic": "interest", "sub_topic": "sport"}},
                {"id": "p2", "content": "创业者",
                 "attributes": {"topic": "basic_info", "sub_topic": "occupation"}}
            ]
        })))
        .mount(server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/v1/blobs/insert/user-e2e"))
        .and(body_partial_json(json!({"blob_type": "chat"})))
        .respond_with(memobase_ok(json!({"id": "blob-1"})))
        .mount(server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/v1/users/buffer/user-e2e/chat"))
        .respond_with(memobase_ok(serde_json::Value::Null))
        .mount(server)
        .await;
}

async fn mount_lightrag(server: &MockServer) {
    let response = "-----Document Chunks(DC)-----\n\n```json\n[{\"content\":\"创新大赛报名截止到月底\"}]\n```\n";
    Mock::given(method("POST"))
        .and(path("/query"))
        .and(body_partial_json(json!({"mode": "hybrid", "only_need_context": true})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"response": response})))
        .mount(server)
        .await;
}

fn config_for(server: &MockServer, templates_dir: &std::path::Path) -> AppConfig {
    let mut config = AppConfig::default();
    config.llm.base_url = server.uri();
    config.llm.api_key = Some("ark-e2e".into());
    config.llm.model = "ep-e2e".into();
    config.retrieval.endpoint = format!("{}/query", server.uri());
    config.retrieval.mode = RetrievalMode::Hybrid;
    config.retrieval.extraction = ContextExtraction::DocumentChunks;
    config.memory.project_url = server.uri();
    config.memory.api_key = Some("sk-proj-e2e".into());
    config.memory.user_id = Some("user-e2e".into());
    config.templates.system_path = templates_dir.join("system_prompt.txt");
    config.templates.user_path = templates_dir.join("prompt.txt");
    config.templates.on_missing = MissingTemplatePolicy::Abort;
    config
}

fn write_templates(dir: &std::path::Path) {
    std::fs::write(
        dir.join("system_prompt.txt"),
        "你是政策问答助手。用户画像：\n{{USER_PROFILE}}",
    )
    .unwrap();
    std::fs::write(
        dir.join("prompt.txt"),
        "知识库：{{RAG_KNOWLEDGE_BASE}}\n问题：{{USER_QUESTION}}",
    )
    .unwrap();
}

fn chat_request(body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/chat")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn parse_ndjson(bytes: &[u8]) -> Vec<ChatStreamEvent> {
    std::str::from_utf8(bytes)
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect()
}

// ── Tests ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn chat_pipeline_end_to_end() {
    let server = MockServer::start().await;
    mount_memobase(&server).await;
    mount_lightrag(&server).await;

    // The model must see the cleaned profile in the system message and the
    // extracted chunks in the user prompt.
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_partial_json(json!({
            "model": "ep-e2e",
            "stream": true,
            "thinking": {"type": "auto"}
        })))
        .and(body_string_contains("- Sport: 喜欢跑步 每天"))
        .and(body_string_contains("- Occupation: 创业者"))
        .and(body_string_contains("创新大赛报名截止到月底"))
        .and(body_string_contains("问题：咨询创新大赛"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(SSE_ANSWER, "text/event-stream"))
        .expect(1)
        .mount(&server)
        .await;

    let templates = tempfile::tempdir().unwrap();
    write_templates(templates.path());
    let config = config_for(&server, templates.path());

    let orchestrator = Arc::new(ChatOrchestrator::from_config(&config).await.unwrap());
    let state = Arc::new(GatewayState {
        orchestrator: orchestrator.clone(),
        service_name: config.gateway.service_name.clone(),
    });
    let app = build_router(state, &config.gateway.allowed_origins);

    let response = app
        .oneshot(chat_request(json!({"message": "咨询创新大赛"})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = response.into_body().collect().await.unwrap().to_bytes();
    let events = parse_ndjson(&body);

    assert_eq!(
        events,
        vec![
            ChatStreamEvent::ReasoningStart,
            ChatStreamEvent::Reasoning {
                content: "用户想了解大赛".into()
            },
            ChatStreamEvent::AnswerStart,
            ChatStreamEvent::Answer {
                content: "创新大赛".into()
            },
            ChatStreamEvent::Answer {
                content: "报名截止到月底。".into()
            },
            ChatStreamEvent::Complete,
        ]
    );

    let history = orchestrator.sessions().snapshot(&SessionId::default()).await;
    assert_eq!(history.len(), 3);
    assert_eq!(history[1].content, "咨询创新大赛");
    assert_eq!(history[2].content, "创新大赛报名截止到月底。");

    orchestrator.flush_memory().await;
    assert_eq!(orchestrator.memory_writer().succeeded(), 1);

    let requests = server.received_requests().await.unwrap();
    let blob = requests
        .iter()
        .find(|r| r.url.path() == "/api/v1/blobs/insert/user-e2e")
        .expect("memory blob was not written");
    let blob: serde_json::Value = serde_json::from_slice(&blob.body).unwrap();
    assert_eq!(
        blob["blob_data"]["messages"],
        json!([
            {"role": "user", "content": "咨询创新大赛"},
            {"role": "assistant", "content": "创新大赛报名截止到月底。"}
        ])
    );
}

#[tokio::test]
async fn unreachable_knowledge_base_still_answers() {
    let server = MockServer::start().await;
    mount_memobase(&server).await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_string_contains("无法连接到知识库。"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(SSE_ANSWER, "text/event-stream"))
        .expect(1)
        .mount(&server)
        .await;

    let templates = tempfile::tempdir().unwrap();
    write_templates(templates.path());
    let mut config = config_for(&server, templates.path());
    config.retrieval.endpoint = "http://127.0.0.1:9/query".into();

    let orchestrator = ChatOrchestrator::from_config(&config).await.unwrap();
    let mut rx = orchestrator
        .run_stream(SessionId::default(), "咨询创新大赛")
        .await
        .unwrap();

    let mut last = None;
    while let Some(event) = rx.recv().await {
        last = Some(event);
    }
    assert_eq!(last, Some(ChatStreamEvent::Complete));
}

#[tokio::test]
async fn error_frame_mid_stream_ends_with_error_event() {
    let server = MockServer::start().await;
    mount_memobase(&server).await;
    mount_lightrag(&server).await;

    let sse = concat!(
        "data: {\"choices\":[{\"delta\":{\"content\":\"部分\"}}]}\n\n",
        "data: {\"error\":{\"code\":\"QuotaExceeded\",\"message\":\"quota exceeded\"}}\n\n",
    );
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(sse, "text/event-stream"))
        .mount(&server)
        .await;

    let templates = tempfile::tempdir().unwrap();
    write_templates(templates.path());
    let config = config_for(&server, templates.path());

    let orchestrator = Arc::new(ChatOrchestrator::from_config(&config).await.unwrap());
    let app = build_router(
        Arc::new(GatewayState {
            orchestrator: orchestrator.clone(),
            service_name: config.gateway.service_name.clone(),
        }),
        &config.gateway.allowed_origins,
    );

    let response = app
        .oneshot(chat_request(json!({"message": "咨询创新大赛"})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = response.into_body().collect().await.unwrap().to_bytes();
    let events = parse_ndjson(&body);

    assert_eq!(events[0], ChatStreamEvent::AnswerStart);
    assert_eq!(events[1], ChatStreamEvent::Answer { content: "部分".into() });
    match events.last() {
        Some(ChatStreamEvent::Error { content }) => assert!(content.contains("quota exceeded")),
        other => panic!("expected error event, got {other:?}"),
    }
    assert!(!events.contains(&ChatStreamEvent::Complete));

    let history = orchestrator.sessions().snapshot(&SessionId::default()).await;
    assert_eq!(history.len(), 1);

    orchestrator.flush_memory().await;
    assert_eq!(orchestrator.memory_writer().succeeded(), 0);
    let requests = server.received_requests().await.unwrap();
    assert!(
        requests
            .iter()
            .all(|r| r.url.path() != "/api/v1/blobs/insert/user-e2e")
    );
}

#[tokio::test]
async fn empty_message_is_rejected_before_any_upstream_call() {
    let server = MockServer::start().await;
    mount_memobase(&server).await;
    mount_lightrag(&server).await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(SSE_ANSWER, "text/event-stream"))
        .expect(0)
        .mount(&server)
        .await;

    let templates = tempfile::tempdir().unwrap();
    write_templates(templates.path());
    let config = config_for(&server, templates.path());

    let orchestrator = Arc::new(ChatOrchestrator::from_config(&config).await.unwrap());
    let app = build_router(
        Arc::new(GatewayState {
            orchestrator,
            service_name: "政策问答助手API".into(),
        }),
        &config.gateway.allowed_origins,
    );

    let response = app
        .oneshot(chat_request(json!({"message": ""})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["detail"], "消息不能为空");

    let requests = server.received_requests().await.unwrap();
    assert!(requests.iter().all(|r| r.url.path() != "/query"));
}

#[tokio::test]
async fn missing_templates_abort_startup() {
    let server = MockServer::start().await;
    let empty = tempfile::tempdir().unwrap();
    let config = config_for(&server, empty.path());

    let err = ChatOrchestrator::from_config(&config).await.err().unwrap();
    assert!(err.to_string().contains("system_prompt.txt"));
}

#[tokio::test]
async fn profile_outage_uses_unavailable_note() {
    let server = MockServer::start().await;
    mount_lightrag(&server).await;
    Mock::given(method("GET"))
        .and(path("/api/v1/users/profile/user-e2e"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_string_contains("暂无用户画像信息"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(SSE_ANSWER, "text/event-stream"))
        .expect(1)
        .mount(&server)
        .await;

    let templates = tempfile::tempdir().unwrap();
    write_templates(templates.path());
    let config = config_for(&server, templates.path());

    let orchestrator = ChatOrchestrator::from_config(&config).await.unwrap();
    let mut rx = orchestrator
        .run_stream(SessionId::default(), "咨询创新大赛")
        .await
        .unwrap();
    while rx.recv().await.is_some() {}
}
