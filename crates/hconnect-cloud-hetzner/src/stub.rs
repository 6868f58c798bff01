//! Local HTTP/1.1 server answering scripted responses, one per connection

use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::Value;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use crate::client::{HetznerClient, HetznerConfig};

pub(crate) struct Reply {
    status: u16,
    body: String,
}

pub(crate) fn json(status: u16, body: Value) -> Reply {
    Reply {
        status,
        body: body.to_string(),
    }
}

pub(crate) fn raw(status: u16, body: &str) -> Reply {
    Reply {
        status,
        body: body.to_string(),
    }
}

/// A request as seen by the stub
#[derive(Debug, Clone)]
pub(crate) struct Request {
    /// e.g. `GET /v1/firewalls?page=1&per_page=50`
    pub line: String,
    /// Lowercased header block
    pub headers: String,
    pub body: String,
}

pub(crate) struct Stub {
    endpoint: String,
    requests: Arc<Mutex<Vec<Request>>>,
}

impl Stub {
    pub async fn start(replies: Vec<Reply>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let endpoint = format!("http://{}/v1", listener.local_addr().unwrap());
        let requests = Arc::new(Mutex::new(Vec::new()));
        let log = requests.clone();

        tokio::spawn(async move {
            for reply in replies {
                let Ok((mut socket, _)) = listener.accept().await else {
                    return;
                };
                let request = read_request(&mut socket).await;
                log.lock().unwrap().push(request);

                let response = format!(
                    "HTTP/1.1 {} Stub\r\ncontent-type: application/json\r\n\
                     content-length: {}\r\nconnection: close\r\n\r\n{}",
                    reply.status,
                    reply.body.len(),
                    reply.body
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            }
        });

        Self { endpoint, requests }
    }

    /// Client pointed at the stub, polling actions every 10 ms
    pub fn client(&self) -> HetznerClient {
        let mut config = HetznerConfig::new("a".repeat(64))
            .unwrap()
            .with_endpoint(self.endpoint.clone())
            .unwrap();
        config.poll_interval = Duration::from_millis(10);
        HetznerClient::new(config).unwrap()
    }

    pub fn requests(&self) -> Vec<Request> {
        self.requests.lock().unwrap().clone()
    }

    pub fn request_lines(&self) -> Vec<String> {
        self.requests().into_iter().map(|r| r.line).collect()
    }
}

async fn read_request(socket: &mut TcpStream) -> Request {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];

    let head_end = loop {
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos;
        }
        let n = socket.read(&mut chunk).await.unwrap();
        assert!(n > 0, "connection closed before request head");
        buf.extend_from_slice(&chunk[..n]);
    };

    let head = String::from_utf8_lossy(&buf[..head_end]).to_lowercase();
    let length = head
        .lines()
        .filter_map(|l| l.split_once(':'))
        .find(|(name, _)| name.trim() == "content-length")
        .and_then(|(_, value)| value.trim().parse::<usize>().ok())
        .unwrap_or(0);

    let body_start = head_end + 4;
    while buf.len() < body_start + length {
        let n = socket.read(&mut chunk).await.unwrap();
        assert!(n > 0, "connection closed before request body");
        buf.extend_from_slice(&chunk[..n]);
    }

    // Request line keeps its original case for path/query assertions
    let original = String::from_utf8_lossy(&buf[..head_end]).to_string();
    let line = original
        .lines()
        .next()
        .unwrap_or_default()
        .trim_end_matches(" HTTP/1.1")
        .to_string();

    Request {
        line,
        headers: head,
        body: String::from_utf8_lossy(&buf[body_start..body_start + length]).to_string(),
    }
}
