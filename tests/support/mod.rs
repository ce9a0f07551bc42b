use bridge_daemon::config::{ClientSpec, Config};
use bridge_daemon::state::BridgeState;
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;

pub struct TestBridge {
    pub dir: tempfile::TempDir,
    pub state: Arc<BridgeState>,
    pub socket_path: PathBuf,
    shutdown: Option<tokio::sync::watch::Sender<bool>>,
}

impl TestBridge {
    /// Bind the Unix listener and run the accept loop on a background task
    /// until this `TestBridge` is dropped.
    pub fn start(&mut self) {
        let listener = bridge_daemon::listener::bind(&self.state).expect("bind test listener");
        let (tx, rx) = tokio::sync::watch::channel(false);
        let state = self.state.clone();
        tokio::spawn(bridge_daemon::listener::serve(listener, state, rx));
        self.shutdown = Some(tx);
    }
}

impl Drop for TestBridge {
    fn drop(&mut self) {
        if let Some(tx) = &self.shutdown {
            let _ = tx.send(true);
        }
    }
}

/// Build a daemon state with two clients: `agent-client` (allowlisted to
/// `openclaw-server` only) and `openclaw-server` (wildcard allowlist), plus
/// a third, unreachable `other-client`. Mirrors spec.md §8's scenarios.
pub fn test_state(queue_limit: usize) -> TestBridge {
    let dir = tempfile::tempdir().unwrap();
    let socket_path = dir.path().join("bridge.sock");

    let clients = vec![
        ClientSpec {
            id: "agent-client".to_string(),
            key_hash: bridge_daemon::util::hash_secret("agent-secret"),
            can_send_to: vec!["openclaw-server".to_string()],
        },
        ClientSpec {
            id: "openclaw-server".to_string(),
            key_hash: bridge_daemon::util::hash_secret("server-secret"),
            can_send_to: vec!["*".to_string()],
        },
        ClientSpec {
            id: "other-client".to_string(),
            key_hash: bridge_daemon::util::hash_secret("other-secret"),
            can_send_to: vec![],
        },
    ];

    let config = build_config(socket_path.clone(), queue_limit, clients, Some("admin-secret"));
    let state = BridgeState::new(Arc::new(config));
    TestBridge {
        dir,
        state,
        socket_path,
        shutdown: None,
    }
}

fn build_config(
    socket_path: PathBuf,
    queue_limit: usize,
    clients: Vec<ClientSpec>,
    admin_token: Option<&str>,
) -> Config {
    let json_clients: Vec<serde_json::Value> = clients
        .iter()
        .map(|c| {
            json!({
                "id": c.id,
                "keyHash": c.key_hash,
                "canSendTo": c.can_send_to,
            })
        })
        .collect();

    let mut doc = json!({
        "socketPath": socket_path.to_string_lossy(),
        "queueLimit": queue_limit,
        "clients": json_clients,
    });
    if let Some(token) = admin_token {
        doc["adminTokenHash"] = json!(bridge_daemon::util::hash_secret(token));
    }

    let config_path = socket_path.with_file_name("config.json");
    std::fs::write(&config_path, doc.to_string()).unwrap();
    Config::load(&config_path).unwrap()
}

/// A connected, not-yet-authenticated test client over the Unix socket.
pub struct TestClient {
    pub reader: BufReader<tokio::net::unix::OwnedReadHalf>,
    pub writer: tokio::net::unix::OwnedWriteHalf,
}

impl TestClient {
    pub async fn connect(socket_path: &std::path::Path) -> Self {
        let stream = UnixStream::connect(socket_path).await.unwrap();
        let (read_half, writer) = stream.into_split();
        Self {
            reader: BufReader::new(read_half),
            writer,
        }
    }

    pub async fn send_json(&mut self, value: serde_json::Value) {
        let mut line = value.to_string();
        line.push('\n');
        self.writer.write_all(line.as_bytes()).await.unwrap();
    }

    pub async fn send_raw(&mut self, raw: &str) {
        let mut line = raw.to_string();
        line.push('\n');
        self.writer.write_all(line.as_bytes()).await.unwrap();
    }

    pub async fn recv_json(&mut self) -> serde_json::Value {
        let mut line = String::new();
        let n = self.reader.read_line(&mut line).await.unwrap();
        assert!(n > 0, "connection closed before a frame arrived");
        serde_json::from_str(line.trim_end()).unwrap()
    }

    pub async fn auth(&mut self, client_id: &str, api_key: &str) -> serde_json::Value {
        self.send_json(json!({"action": "auth", "clientId": client_id, "apiKey": api_key}))
            .await;
        self.recv_json().await
    }
}
