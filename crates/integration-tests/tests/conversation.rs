mod harness;

use harness::config::ConfigBuilder;
use harness::mock_llm::MockLlm;
use harness::server::TestServer;

const MOCK_REPLY: &str = "Hello from mock LLM";

fn body_with_messages(messages: serde_json::Value) -> serde_json::Value {
    serde_json::json!({
        "model": "mock/mock-model-1",
        "messages": messages
    })
}

async fn send(server: &TestServer, body: &serde_json::Value) -> serde_json::Value {
    let resp = server
        .client()
        .post(server.url("/v1/chat/completions"))
        .json(body)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    resp.json().await.unwrap()
}

#[tokio::test]
async fn multi_turn_transcripts_share_one_conversation() {
    let mock = MockLlm::start().await.unwrap();
    let config = ConfigBuilder::new()
        .with_openai_provider("mock", &mock.base_url())
        .with_conversation(3600)
        .build();

    let server = TestServer::start(config).await.unwrap();

    // T1: [S, U1] -> A1
    let t1 = body_with_messages(serde_json::json!([
        {"role": "system", "content": "Be brief"},
        {"role": "user", "content": "u1"}
    ]));
    let r1 = send(&server, &t1).await;
    let conversation_id = r1["conversation_id"].as_str().expect("conversation id").to_owned();

    // T2: [S, U1, A1, U2] -> A2, resending the full transcript
    let t2 = body_with_messages(serde_json::json!([
        {"role": "system", "content": "Be brief"},
        {"role": "user", "content": "u1"},
        {"role": "assistant", "content": MOCK_REPLY},
        {"role": "user", "content": "u2"}
    ]));
    let r2 = send(&server, &t2).await;
    assert_eq!(r2["conversation_id"].as_str().unwrap(), conversation_id);

    // T3: [S, U1, A1, U2, A2, U3] -> A3
    let t3 = body_with_messages(serde_json::json!([
        {"role": "system", "content": "Be brief"},
        {"role": "user", "content": "u1"},
        {"role": "assistant", "content": MOCK_REPLY},
        {"role": "user", "content": "u2"},
        {"role": "assistant", "content": MOCK_REPLY},
        {"role": "user", "content": "u3"}
    ]));
    let r3 = send(&server, &t3).await;
    assert_eq!(r3["conversation_id"].as_str().unwrap(), conversation_id);

    // Each entry was consumed on match: replaying T3 cannot chain again
    let replay = send(&server, &t3).await;
    assert_ne!(replay["conversation_id"].as_str().unwrap(), conversation_id);
}

#[tokio::test]
async fn fresh_transcript_mints_new_conversation() {
    let mock = MockLlm::start().await.unwrap();
    let config = ConfigBuilder::new()
        .with_openai_provider("mock", &mock.base_url())
        .with_conversation(3600)
        .build();

    let server = TestServer::start(config).await.unwrap();

    let t1 = body_with_messages(serde_json::json!([{"role": "user", "content": "first"}]));
    let r1 = send(&server, &t1).await;

    let t2 = body_with_messages(serde_json::json!([{"role": "user", "content": "second"}]));
    let r2 = send(&server, &t2).await;

    assert_ne!(
        r1["conversation_id"].as_str().unwrap(),
        r2["conversation_id"].as_str().unwrap()
    );
}

#[tokio::test]
async fn expired_entry_starts_new_conversation() {
    let mock = MockLlm::start().await.unwrap();
    let config = ConfigBuilder::new()
        .with_openai_provider("mock", &mock.base_url())
        .with_conversation(1)
        .build();

    let server = TestServer::start(config).await.unwrap();

    let t1 = body_with_messages(serde_json::json!([{"role": "user", "content": "u1"}]));
    let r1 = send(&server, &t1).await;
    let first_id = r1["conversation_id"].as_str().unwrap().to_owned();

    // Wait past the 1-second TTL
    tokio::time::sleep(std::time::Duration::from_millis(1300)).await;

    let t2 = body_with_messages(serde_json::json!([
        {"role": "user", "content": "u1"},
        {"role": "assistant", "content": MOCK_REPLY},
        {"role": "user", "content": "u2"}
    ]));
    let r2 = send(&server, &t2).await;

    assert_ne!(r2["conversation_id"].as_str().unwrap(), first_id);
}

#[tokio::test]
async fn explicit_conversation_id_bypasses_hashing() {
    let mock = MockLlm::start().await.unwrap();
    let config = ConfigBuilder::new()
        .with_openai_provider("mock", &mock.base_url())
        .with_conversation(3600)
        .build();

    let server = TestServer::start(config).await.unwrap();

    let mut body = body_with_messages(serde_json::json!([{"role": "user", "content": "hi"}]));
    body["metadata"] = serde_json::json!({"conversation_id": "conv-pinned"});

    let response = send(&server, &body).await;
    assert_eq!(response["conversation_id"].as_str().unwrap(), "conv-pinned");
}

#[tokio::test]
async fn model_change_still_correlates() {
    // The transcript hash covers role + content only, so the same
    // transcript resent with different sampling params still chains
    let mock = MockLlm::start().await.unwrap();
    let config = ConfigBuilder::new()
        .with_openai_provider("mock", &mock.base_url())
        .with_conversation(3600)
        .build();

    let server = TestServer::start(config).await.unwrap();

    let t1 = body_with_messages(serde_json::json!([{"role": "user", "content": "u1"}]));
    let r1 = send(&server, &t1).await;
    let conversation_id = r1["conversation_id"].as_str().unwrap().to_owned();

    let mut t2 = body_with_messages(serde_json::json!([
        {"role": "user", "content": "u1"},
        {"role": "assistant", "content": MOCK_REPLY},
        {"role": "user", "content": "u2"}
    ]));
    t2["temperature"] = serde_json::json!(0.9);

    let r2 = send(&server, &t2).await;
    assert_eq!(r2["conversation_id"].as_str().unwrap(), conversation_id);
}
