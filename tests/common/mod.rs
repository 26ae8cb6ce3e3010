//! Shared utilities for integration testing.

#![allow(dead_code)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::future::BoxFuture;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpSocket, TcpStream};

use title_rewrite_proxy::normalize::{NormalizationRequest, OracleError, TitleOracle};

/// A canned upstream response.
#[derive(Debug, Clone)]
pub struct MockResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
    pub delay: Duration,
}

impl MockResponse {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: body.into(),
            delay: Duration::ZERO,
        }
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

/// Request line and headers seen by a mock backend, in arrival order.
#[derive(Debug, Default, Clone)]
pub struct Recorded {
    inner: Arc<Mutex<Vec<String>>>,
}

impl Recorded {
    pub fn heads(&self) -> Vec<String> {
        self.inner.lock().unwrap().clone()
    }
}

/// Start a mock backend on an ephemeral loopback port that always answers
/// with `response`.
pub async fn start_mock_backend(response: MockResponse) -> (SocketAddr, Recorded) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let recorded = Recorded::default();
    let log = recorded.clone();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let response = response.clone();
            let log = log.clone();
            tokio::spawn(async move {
                let head = read_request(&mut socket).await;
                log.inner.lock().unwrap().push(head);

                tokio::time::sleep(response.delay).await;

                let mut raw = format!("HTTP/1.1 {} Mock\r\n", response.status);
                for (name, value) in &response.headers {
                    raw.push_str(&format!("{name}: {value}\r\n"));
                }
                raw.push_str(&format!(
                    "Content-Length: {}\r\nConnection: close\r\n\r\n",
                    response.body.len()
                ));
                let _ = socket.write_all(raw.as_bytes()).await;
                let _ = socket.write_all(&response.body).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    (addr, recorded)
}

/// Read one request head plus any `Content-Length` body; returns the head.
async fn read_request(socket: &mut TcpStream) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    let head_end = loop {
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
        match socket.read(&mut chunk).await {
            Ok(0) | Err(_) => return String::from_utf8_lossy(&buf).into_owned(),
            Ok(n) => buf.extend_from_slice(&chunk[..n]),
        }
    };

    let head = String::from_utf8_lossy(&buf[..head_end]).into_owned();
    let content_length = head
        .lines()
        .filter_map(|line| line.split_once(':'))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
        .and_then(|(_, value)| value.trim().parse::<usize>().ok())
        .unwrap_or(0);

    let mut have = buf.len() - head_end;
    while have < content_length {
        match socket.read(&mut chunk).await {
            Ok(0) | Err(_) => break,
            Ok(n) => have += n,
        }
    }
    head
}

/// A loopback port that nothing listens on.
pub async fn closed_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    port
}

/// A loopback listener whose accept queue is full, so new connects hang.
pub struct SaturatedListener {
    pub addr: SocketAddr,
    _listener: TcpListener,
    _held: Vec<TcpStream>,
}

/// Fill a never-accepting listener's backlog. `None` when the platform
/// keeps completing handshakes instead of dropping SYNs.
pub async fn saturated_listener() -> Option<SaturatedListener> {
    let socket = TcpSocket::new_v4().ok()?;
    socket.bind("127.0.0.1:0".parse().ok()?).ok()?;
    let listener = socket.listen(1).ok()?;
    let addr = listener.local_addr().ok()?;

    let mut held = Vec::new();
    for _ in 0..512 {
        match tokio::time::timeout(Duration::from_millis(200), TcpStream::connect(addr)).await {
            Ok(Ok(stream)) => held.push(stream),
            Ok(Err(_)) => return None,
            Err(_) => {
                return Some(SaturatedListener {
                    addr,
                    _listener: listener,
                    _held: held,
                })
            }
        }
    }
    None
}

/// Oracle answering from a fixed table; unknown titles fail.
pub struct TableOracle {
    answers: HashMap<String, String>,
    pub prompts: Mutex<Vec<String>>,
}

impl TableOracle {
    pub fn new(pairs: &[(&str, &str)]) -> Self {
        Self {
            answers: pairs
                .iter()
                .map(|(raw, clean)| (raw.to_string(), clean.to_string()))
                .collect(),
            prompts: Mutex::new(Vec::new()),
        }
    }
}

impl TitleOracle for TableOracle {
    fn normalize<'a>(
        &'a self,
        request: &'a NormalizationRequest,
    ) -> BoxFuture<'a, Result<String, OracleError>> {
        Box::pin(async move {
            self.prompts.lock().unwrap().push(request.to_prompt());
            self.answers
                .get(&request.raw_title)
                .cloned()
                .ok_or(OracleError::Empty)
        })
    }
}
