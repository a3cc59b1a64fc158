use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tracing::{debug, info, warn};
use crate::cafe::CafeData;
use crate::util::error;

/// Path serving the average visits per cafe.
pub const AVERAGE_PATH: &str = "/average";

const MAX_REQUEST_HEAD_BYTES: usize = 8 * 1024;

/// Accepts connections until `shutdown` turns true or its sender is dropped, answering each on its own task.
pub async fn serve(listener: TcpListener, cafe_data: Arc<CafeData>, mut shutdown: watch::Receiver<bool>) -> Result<(), error::Error> {
    info!(addr = %listener.local_addr()?, "request handler is on");
    loop {
        tokio::select! {
            accept_result = listener.accept() => {
                let (stream, addr) = match accept_result {
                    Ok(v) => v,
                    Err(e) => {
                        warn!(error = %e, "accept error");
                        continue;
                    }
                };
                let cafe_data = cafe_data.clone();
                tokio::spawn(async move {
                    if let Err(e) = handle_conn(stream, cafe_data).await {
                        debug!(addr = %addr, error = %e, "connection error");
                    }
                });
            }
            _ = shutdown.wait_for(|stop| *stop) => {
                info!("stopping accept loop");
                return Ok(());
            }
        }
    }
}

/// Reads one request and writes one response, then closes the connection.
async fn handle_conn(mut stream: TcpStream, cafe_data: Arc<CafeData>) -> Result<(), error::Error> {
    let head = match read_request_head(&mut stream).await? {
        Some(h) => h,
        None => {
            write_response(&mut stream, 400, "Bad Request", "{}").await?;
            return Ok(());
        }
    };

    match parse_request_line(&head) {
        Some(("GET", path)) if path == AVERAGE_PATH => {
            let averages = tokio::task::spawn_blocking(move || cafe_data.average_visits()).await?;
            let body = serde_json::to_string(&averages)?;
            write_response(&mut stream, 200, "OK", &body).await?;
        },
        Some(("GET", path)) => {
            warn!(path, "unknown path requested");
            write_response(&mut stream, 404, "Not Found", "{}").await?;
        },
        Some((method, path)) => {
            warn!(method, path, "unsupported method");
            write_response(&mut stream, 405, "Method Not Allowed", "{}").await?;
        },
        None => {
            write_response(&mut stream, 400, "Bad Request", "{}").await?;
        }
    }
    return Ok(());
}

/// Reads up to the blank line ending the request head.
/// Returns None if the head is too large, not UTF-8, or the peer closes early.
async fn read_request_head(stream: &mut TcpStream) -> Result<Option<String>, error::Error> {
    let mut buf: Vec<u8> = Vec::with_capacity(1024);
    let mut chunk = [0u8; 1024];
    loop {
        if buf.windows(4).any(|w| w == b"\r\n\r\n") {
            break;
        }
        if buf.len() > MAX_REQUEST_HEAD_BYTES {
            return Ok(None);
        }
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            if buf.is_empty() {
                return Ok(None);
            }
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
    }
    return Ok(String::from_utf8(buf).ok());
}

/// Splits the request line into method and path, dropping any query string.
fn parse_request_line(head: &str) -> Option<(&str, &str)> {
    let line = head.lines().next()?;
    let mut parts = line.split_whitespace();
    let method = parts.next()?;
    let target = parts.next()?;
    let version = parts.next()?;
    if !version.starts_with("HTTP/") {
        return None;
    }
    let path = match target.split_once('?') {
        Some((p, _)) => p,
        None => target
    };
    return Some((method, path));
}

async fn write_response(stream: &mut TcpStream, status: u16, reason: &str, body: &str) -> Result<(), error::Error> {
    let response = format!(
        "HTTP/1.1 {status} {reason}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    );
    stream.write_all(response.as_bytes()).await?;
    stream.shutdown().await?;
    return Ok(());
}
