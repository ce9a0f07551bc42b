//! End-to-end protocol scenarios against a real Unix domain socket,
//! following spec.md §8's concrete scenarios 1-5.

mod support;

use serde_json::json;
use support::{test_state, TestClient};

#[tokio::test]
async fn happy_path_delivery() {
    let mut bridge = test_state(500);
    bridge.start();

    let mut agent = TestClient::connect(&bridge.socket_path).await;
    let auth_ok = agent.auth("agent-client", "agent-secret").await;
    assert_eq!(auth_ok["action"], "auth_ok");
    assert_eq!(auth_ok["queued"], 0);

    let mut server = TestClient::connect(&bridge.socket_path).await;
    let auth_ok = server.auth("openclaw-server", "server-secret").await;
    assert_eq!(auth_ok["action"], "auth_ok");

    agent
        .send_json(json!({
            "action": "send",
            "to": "openclaw-server",
            "type": "command",
            "payload": {"command": "ping", "requestId": "req_1"}
        }))
        .await;

    let sent = agent.recv_json().await;
    assert_eq!(sent["action"], "sent");
    assert_eq!(sent["deliveredTo"], 1);
    assert_eq!(sent["queued"], false);

    let delivered = server.recv_json().await;
    assert_eq!(delivered["action"], "message");
    assert_eq!(delivered["envelope"]["from"], "agent-client");
    assert_eq!(delivered["envelope"]["to"], "openclaw-server");
    assert_eq!(delivered["envelope"]["payload"]["command"], "ping");
}

#[tokio::test]
async fn offline_queueing_then_drain_preserves_order() {
    let mut bridge = test_state(500);
    bridge.start();

    let mut agent = TestClient::connect(&bridge.socket_path).await;
    agent.auth("agent-client", "agent-secret").await;

    for i in 0..3 {
        agent
            .send_json(json!({
                "action": "send",
                "to": "openclaw-server",
                "payload": {"n": i}
            }))
            .await;
        let sent = agent.recv_json().await;
        assert_eq!(sent["deliveredTo"], 0);
        assert_eq!(sent["queued"], true);
    }

    let mut server = TestClient::connect(&bridge.socket_path).await;
    let auth_ok = server.auth("openclaw-server", "server-secret").await;
    assert_eq!(auth_ok["queued"], 3);

    for i in 0..3 {
        let msg = server.recv_json().await;
        assert_eq!(msg["action"], "message");
        assert_eq!(msg["envelope"]["payload"]["n"], i);
    }
}

#[tokio::test]
async fn acl_denial_blocks_routing() {
    let mut bridge = test_state(500);
    bridge.start();

    let mut agent = TestClient::connect(&bridge.socket_path).await;
    agent.auth("agent-client", "agent-secret").await;

    agent
        .send_json(json!({"action": "send", "to": "other-client", "payload": null}))
        .await;

    let resp = agent.recv_json().await;
    assert_eq!(resp["action"], "error");
    assert_eq!(resp["error"], "route_not_allowed");
    assert_eq!(bridge.state.queues.depth("other-client"), 0);
}

#[tokio::test]
async fn bad_auth_closes_connection() {
    let mut bridge = test_state(500);
    bridge.start();

    let mut agent = TestClient::connect(&bridge.socket_path).await;
    let resp = agent.auth("agent-client", "wrong-secret").await;
    assert_eq!(resp["action"], "auth_failed");

    // connection is destroyed: the next read observes EOF.
    let mut line = String::new();
    use tokio::io::AsyncBufReadExt;
    let n = agent.reader.read_line(&mut line).await.unwrap();
    assert_eq!(n, 0);

    assert!(bridge.state.connections.connections_for("agent-client").is_empty());
}

#[tokio::test]
async fn queue_overflow_keeps_newest() {
    let mut bridge = test_state(3);
    bridge.start();

    let mut agent = TestClient::connect(&bridge.socket_path).await;
    agent.auth("agent-client", "agent-secret").await;

    for i in 0..5 {
        agent
            .send_json(json!({"action": "send", "to": "openclaw-server", "payload": {"n": i}}))
            .await;
        agent.recv_json().await;
    }

    let mut server = TestClient::connect(&bridge.socket_path).await;
    let auth_ok = server.auth("openclaw-server", "server-secret").await;
    assert_eq!(auth_ok["queued"], 3);

    let mut received = Vec::new();
    for _ in 0..3 {
        let msg = server.recv_json().await;
        received.push(msg["envelope"]["payload"]["n"].as_i64().unwrap());
    }
    assert_eq!(received, vec![2, 3, 4]);
}

#[tokio::test]
async fn ping_pong_and_whoami() {
    let mut bridge = test_state(500);
    bridge.start();

    let mut agent = TestClient::connect(&bridge.socket_path).await;
    agent.auth("agent-client", "agent-secret").await;

    agent.send_json(json!({"action": "ping"})).await;
    let pong = agent.recv_json().await;
    assert_eq!(pong["action"], "pong");

    agent.send_json(json!({"action": "whoami"})).await;
    let resp = agent.recv_json().await;
    assert_eq!(resp["action"], "whoami");
    assert_eq!(resp["clientId"], "agent-client");
    assert_eq!(resp["canSendTo"], json!(["openclaw-server"]));
}

#[tokio::test]
async fn unauth_actions_are_rejected() {
    let mut bridge = test_state(500);
    bridge.start();

    let mut client = TestClient::connect(&bridge.socket_path).await;
    client.send_json(json!({"action": "ping"})).await;
    let resp = client.recv_json().await;
    assert_eq!(resp["action"], "error");
    assert_eq!(resp["error"], "auth_required");
}

#[tokio::test]
async fn unknown_target_is_rejected() {
    let mut bridge = test_state(500);
    bridge.start();

    let mut agent = TestClient::connect(&bridge.socket_path).await;
    agent.auth("agent-client", "agent-secret").await;

    agent
        .send_json(json!({"action": "send", "to": "nobody", "payload": null}))
        .await;
    let resp = agent.recv_json().await;
    assert_eq!(resp["action"], "error");
    assert_eq!(resp["error"], "unknown_target");
}

#[tokio::test]
async fn unknown_action_is_rejected() {
    let mut bridge = test_state(500);
    bridge.start();

    let mut agent = TestClient::connect(&bridge.socket_path).await;
    agent.auth("agent-client", "agent-secret").await;

    agent.send_json(json!({"action": "teleport"})).await;
    let resp = agent.recv_json().await;
    assert_eq!(resp["action"], "error");
    assert_eq!(resp["error"], "unknown_action");
}

#[tokio::test]
async fn correlation_id_round_trips() {
    let mut bridge = test_state(500);
    bridge.start();

    let mut agent = TestClient::connect(&bridge.socket_path).await;
    agent.auth("agent-client", "agent-secret").await;
    let mut server = TestClient::connect(&bridge.socket_path).await;
    server.auth("openclaw-server", "server-secret").await;

    agent
        .send_json(json!({
            "action": "send",
            "to": "openclaw-server",
            "correlationId": "corr-42",
            "payload": null
        }))
        .await;
    agent.recv_json().await; // sent ack
    let delivered = server.recv_json().await;
    assert_eq!(delivered["envelope"]["correlationId"], "corr-42");

    server
        .send_json(json!({
            "action": "send",
            "to": "agent-client",
            "correlationId": "corr-42",
            "payload": null
        }))
        .await;
    server.recv_json().await; // sent ack
    let delivered_back = agent.recv_json().await;
    assert_eq!(delivered_back["envelope"]["correlationId"], "corr-42");
}

#[tokio::test]
async fn oversized_frame_is_rejected_without_destroying_connection() {
    let mut bridge = test_state(500);
    bridge.start();

    let mut agent = TestClient::connect(&bridge.socket_path).await;
    agent.auth("agent-client", "agent-secret").await;

    let huge_payload = "x".repeat(bridge.state.config.max_frame_bytes + 1);
    agent
        .send_json(json!({"action": "ping", "payload": huge_payload}))
        .await;
    let resp = agent.recv_json().await;
    assert_eq!(resp["action"], "error");
    assert_eq!(resp["error"], "message_too_large");

    // connection survives: a follow-up ping still gets a pong.
    agent.send_json(json!({"action": "ping"})).await;
    let pong = agent.recv_json().await;
    assert_eq!(pong["action"], "pong");
}
