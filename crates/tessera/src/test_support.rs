//! In-process HTTP origin for unit tests.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use axum::Router;
use axum::body::Bytes;
use axum::http::StatusCode;
use axum::routing::get;

/// Initialize tracing for tests.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
}

/// Media playlist listing `uris`, ten seconds each.
pub fn playlist_body(uris: &[&str]) -> String {
    let mut body = String::from("#EXTM3U\n#EXT-X-VERSION:3\n#EXT-X-TARGETDURATION:10\n");
    for uri in uris {
        body.push_str("#EXTINF:10.0,\n");
        body.push_str(uri);
        body.push('\n');
    }
    body
}

pub struct TestServer {
    router: Router,
}

impl TestServer {
    pub fn start() -> Self {
        Self {
            router: Router::new(),
        }
    }

    pub fn with_text(self, path: &str, status: StatusCode, body: String) -> Self {
        self.with_bytes(path, status, body.into_bytes())
    }

    pub fn with_bytes(mut self, path: &str, status: StatusCode, body: Vec<u8>) -> Self {
        let body = Bytes::from(body);
        self.router = self.router.route(
            path,
            get(move || {
                let body = body.clone();
                async move { (status, body) }
            }),
        );
        self
    }

    /// Serves `bodies` in rotation, one per request.
    pub fn with_rotation(mut self, path: &str, bodies: Vec<String>) -> Self {
        let bodies = Arc::new(bodies);
        let hits = Arc::new(AtomicUsize::new(0));
        self.router = self.router.route(
            path,
            get(move || {
                let bodies = Arc::clone(&bodies);
                let hits = Arc::clone(&hits);
                async move {
                    let n = hits.fetch_add(1, Ordering::SeqCst);
                    bodies[n % bodies.len()].clone()
                }
            }),
        );
        self
    }

    /// Serves `responses` in order, repeating the last one. The returned
    /// counter tracks requests.
    pub fn with_sequence(
        mut self,
        path: &str,
        responses: Vec<(StatusCode, Vec<u8>)>,
    ) -> (Self, Arc<AtomicUsize>) {
        let responses: Arc<Vec<(StatusCode, Bytes)>> = Arc::new(
            responses
                .into_iter()
                .map(|(status, body)| (status, Bytes::from(body)))
                .collect(),
        );
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        self.router = self.router.route(
            path,
            get(move || {
                let responses = Arc::clone(&responses);
                let hits = Arc::clone(&hits);
                async move {
                    let n = hits.fetch_add(1, Ordering::SeqCst);
                    responses[n.min(responses.len() - 1)].clone()
                }
            }),
        );
        (self, counter)
    }

    pub async fn serve(self) -> RunningServer {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind test listener");
        let addr = listener.local_addr().expect("listener address");
        tokio::spawn(async move {
            let _ = axum::serve(listener, self.router).await;
        });
        RunningServer { addr }
    }
}

pub struct RunningServer {
    addr: SocketAddr,
}

impl RunningServer {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

/// Origin that declares `declared` bytes of body, sends `sent`, then hangs up.
pub async fn truncated_body_origin(declared: usize, sent: usize) -> String {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind test listener");
    let addr = listener.local_addr().expect("listener address");
    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let mut request = [0u8; 1024];
            let _ = socket.read(&mut request).await;
            let head = format!(
                "HTTP/1.1 200 OK\r\nContent-Length: {declared}\r\nContent-Type: video/mp2t\r\n\r\n"
            );
            let _ = socket.write_all(head.as_bytes()).await;
            let _ = socket.write_all(&vec![0u8; sent]).await;
            let _ = socket.shutdown().await;
        }
    });
    format!("http://{addr}/segment.ts")
}
