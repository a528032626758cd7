#![allow(dead_code)]

use std::io::ErrorKind;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use llama_buddy::{CompletionClient, Config, Dispatcher};

/// A request as seen by the fake endpoint.
#[derive(Debug, Clone)]
pub struct CapturedRequest {
    pub received_at: Instant,
    pub head: String,
    pub body: String,
}

impl CapturedRequest {
    pub fn header(&self, name: &str) -> Option<String> {
        let name = name.to_ascii_lowercase();
        self.head.lines().skip(1).find_map(|line| {
            let (key, value) = line.split_once(':')?;
            (key.trim().to_ascii_lowercase() == name).then(|| value.trim().to_string())
        })
    }

    pub fn json(&self) -> serde_json::Value {
        serde_json::from_str(&self.body).expect("request body is JSON")
    }
}

pub struct FakeEndpoint {
    pub url: String,
    pub requests: Arc<Mutex<Vec<CapturedRequest>>>,
    handle: tokio::task::JoinHandle<()>,
}

impl FakeEndpoint {
    pub fn captured(&self) -> Vec<CapturedRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl Drop for FakeEndpoint {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn bind() -> Option<TcpListener> {
    match TcpListener::bind("127.0.0.1:0").await {
        Ok(listener) => Some(listener),
        Err(err) if err.kind() == ErrorKind::PermissionDenied => None,
        Err(err) => panic!("failed to bind local test listener: {err}"),
    }
}

/// Read one HTTP/1.1 request (head plus Content-Length body).
async fn read_request(socket: &mut TcpStream) -> (String, String) {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];

    let head_end = loop {
        let n = socket.read(&mut chunk).await.unwrap_or(0);
        if n == 0 {
            break None;
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break Some(pos);
        }
    };
    let Some(head_end) = head_end else {
        return (String::from_utf8_lossy(&buf).into_owned(), String::new());
    };

    let head = String::from_utf8_lossy(&buf[..head_end]).into_owned();
    let content_length = head
        .lines()
        .find_map(|line| {
            let (key, value) = line.split_once(':')?;
            key.trim()
                .eq_ignore_ascii_case("content-length")
                .then(|| value.trim().parse::<usize>().ok())
                .flatten()
        })
        .unwrap_or(0);

    let mut body = buf[head_end + 4..].to_vec();
    while body.len() < content_length {
        let n = socket.read(&mut chunk).await.unwrap_or(0);
        if n == 0 {
            break;
        }
        body.extend_from_slice(&chunk[..n]);
    }

    (head, String::from_utf8_lossy(&body).into_owned())
}

/// Serve every connection with the next canned `(status line, body)` pair;
/// the last pair repeats.
pub async fn start_endpoint(responses: Vec<(&'static str, &'static str)>) -> Option<FakeEndpoint> {
    let listener = bind().await?;
    let addr = listener.local_addr().unwrap();
    let requests = Arc::new(Mutex::new(Vec::new()));
    let captured = requests.clone();

    let handle = tokio::spawn(async move {
        let mut served = 0usize;
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                break;
            };
            let received_at = Instant::now();
            let (head, body) = read_request(&mut socket).await;
            captured.lock().unwrap().push(CapturedRequest {
                received_at,
                head,
                body,
            });

            let (status, body) = responses[served.min(responses.len() - 1)];
            served += 1;
            let response = format!(
                "HTTP/1.1 {status}\r\nContent-Length: {}\r\nContent-Type: application/json\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            let _ = socket.write_all(response.as_bytes()).await;
            let _ = socket.shutdown().await;
        }
    });

    Some(FakeEndpoint {
        url: format!("http://{addr}/api/v1/chat/completions"),
        requests,
        handle,
    })
}

/// Accepts connections and reads the request but never answers.
pub async fn start_silent_endpoint() -> Option<FakeEndpoint> {
    let listener = bind().await?;
    let addr = listener.local_addr().unwrap();
    let requests = Arc::new(Mutex::new(Vec::new()));
    let captured = requests.clone();

    let handle = tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((mut socket, _)) = listener.accept().await {
            let received_at = Instant::now();
            let (head, body) = read_request(&mut socket).await;
            captured.lock().unwrap().push(CapturedRequest {
                received_at,
                head,
                body,
            });
            held.push(socket);
        }
    });

    Some(FakeEndpoint {
        url: format!("http://{addr}/api/v1/chat/completions"),
        requests,
        handle,
    })
}

pub fn test_config(endpoint: &str, timeout_secs: u64) -> Config {
    Config {
        api_key: Some("test-key".to_string()),
        endpoint: endpoint.to_string(),
        timeout_secs,
        ..Config::default()
    }
}

pub fn dispatcher(endpoint: &str, interval: Duration, timeout_secs: u64) -> Dispatcher {
    let config = test_config(endpoint, timeout_secs);
    let client = CompletionClient::new(&config, "test-key").expect("client builds");
    Dispatcher::new(client, interval)
}
