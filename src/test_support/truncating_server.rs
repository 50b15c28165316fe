//! Raw TCP server whose first ranged answer is cut short.
//!
//! wiremock always sends complete bodies, so a connection that announces a
//! full `Content-Length` and then closes early needs a hand-written server.

#![allow(dead_code)]

use std::sync::{Arc, Mutex, PoisonError};

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use super::range_server::parse_range;

/// Serves ranges of `body`; the first ranged request gets only
/// `cut_after` body bytes before the connection closes.
pub struct TruncatingServer {
    addr: std::net::SocketAddr,
    ranges: Arc<Mutex<Vec<String>>>,
}

impl TruncatingServer {
    /// Binds on loopback and starts accepting; `None` if binding fails.
    pub async fn start(body: Vec<u8>, cut_after: usize) -> Option<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await.ok()?;
        let addr = listener.local_addr().ok()?;
        let ranges = Arc::new(Mutex::new(Vec::new()));
        let body = Arc::new(body);

        let seen = Arc::clone(&ranges);
        tokio::spawn(async move {
            let mut first = true;
            while let Ok((socket, _)) = listener.accept().await {
                let cut = first.then_some(cut_after);
                first = false;
                let body = Arc::clone(&body);
                let seen = Arc::clone(&seen);
                tokio::spawn(async move {
                    let _ = answer(socket, &body, cut, &seen).await;
                });
            }
        });

        Some(Self { addr, ranges })
    }

    /// URL of the served resource.
    pub fn url(&self, route: &str) -> String {
        format!("http://{}{route}", self.addr)
    }

    /// `Range` header values received, in arrival order.
    pub fn requested_ranges(&self) -> Vec<String> {
        self.ranges
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

async fn answer(
    mut socket: TcpStream,
    body: &[u8],
    cut: Option<usize>,
    seen: &Mutex<Vec<String>>,
) -> std::io::Result<()> {
    let mut request = Vec::new();
    let mut buf = [0u8; 1024];
    while !request.windows(4).any(|w| w == b"\r\n\r\n") {
        let n = socket.read(&mut buf).await?;
        if n == 0 {
            return Ok(());
        }
        request.extend_from_slice(&buf[..n]);
    }

    let head = String::from_utf8_lossy(&request);
    let range = head.lines().find_map(|line| {
        let (name, value) = line.split_once(':')?;
        name.trim()
            .eq_ignore_ascii_case("range")
            .then(|| value.trim().to_string())
    });
    let Some((start, end)) = range.as_deref().and_then(parse_range) else {
        socket
            .write_all(b"HTTP/1.1 400 Bad Request\r\ncontent-length: 0\r\nconnection: close\r\n\r\n")
            .await?;
        return Ok(());
    };
    if let Some(range) = range {
        seen.lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(range);
    }

    let total = body.len() as u64;
    let end = end.unwrap_or(total - 1).min(total - 1);
    let slice = &body[start as usize..=end as usize];
    let header = format!(
        "HTTP/1.1 206 Partial Content\r\n\
         content-range: bytes {start}-{end}/{total}\r\n\
         content-length: {}\r\n\
         accept-ranges: bytes\r\n\
         connection: close\r\n\r\n",
        slice.len()
    );
    socket.write_all(header.as_bytes()).await?;
    let sent = cut.map_or(slice.len(), |cut| cut.min(slice.len()));
    socket.write_all(&slice[..sent]).await?;
    socket.flush().await?;
    socket.shutdown().await
}
