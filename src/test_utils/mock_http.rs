//! Minimal in-process HTTP server for exercising the dispatcher.
//!
//! Each scripted response is served on its own connection, after which the
//! server captures the request and sends it back over a channel.

use std::io::{BufRead, BufReader, Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

/// A request as seen by the mock server.
#[derive(Debug)]
pub struct CapturedRequest {
    pub method: String,
    pub path: String,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl CapturedRequest {
    /// Value of a header, matched case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        let name = name.to_ascii_lowercase();
        self.headers
            .iter()
            .find(|(key, _)| *key == name)
            .map(|(_, value)| value.as_str())
    }
}

/// One scripted reply.
#[derive(Clone, Debug)]
pub struct MockResponse {
    pub status: u16,
    pub body: String,
}

impl MockResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }
}

fn status_text(code: u16) -> &'static str {
    match code {
        200 => "OK",
        201 => "Created",
        204 => "No Content",
        400 => "Bad Request",
        404 => "Not Found",
        422 => "Unprocessable Entity",
        500 => "Internal Server Error",
        503 => "Service Unavailable",
        _ => "Unknown",
    }
}

/// Parses a single header line into a key-value pair.
fn parse_header_line(line: &str) -> Option<(String, String)> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    line.split_once(':')
        .map(|(key, value)| (key.trim().to_lowercase(), value.trim().to_string()))
}

fn read_headers(reader: &mut BufReader<TcpStream>) -> (Vec<(String, String)>, usize) {
    let mut headers = Vec::new();
    let mut content_length = 0usize;

    loop {
        let mut line = String::new();
        reader.read_line(&mut line).expect("read header");
        if line.trim().is_empty() {
            break;
        }
        let Some((key, value)) = parse_header_line(&line) else {
            continue;
        };
        if key == "content-length" {
            content_length = value.parse().unwrap_or(0);
        }
        headers.push((key, value));
    }

    (headers, content_length)
}

fn read_body(reader: &mut BufReader<TcpStream>, content_length: usize) -> String {
    let mut body = vec![0u8; content_length];
    if content_length > 0 {
        reader.read_exact(&mut body).expect("read body");
    }
    String::from_utf8_lossy(&body).to_string()
}

fn read_http_request(stream: &mut TcpStream) -> CapturedRequest {
    let _ = stream.set_read_timeout(Some(Duration::from_secs(5)));
    let mut reader = BufReader::new(stream.try_clone().expect("clone stream"));

    let mut request_line = String::new();
    reader
        .read_line(&mut request_line)
        .expect("read request line");
    let parts: Vec<&str> = request_line.trim().split(' ').collect();
    let method = parts.first().unwrap_or(&"").to_string();
    let path = parts.get(1).unwrap_or(&"").to_string();

    let (headers, content_length) = read_headers(&mut reader);
    let body = read_body(&mut reader, content_length);

    CapturedRequest {
        method,
        path,
        headers,
        body,
    }
}

/// Bind an ephemeral listener on the loopback interface.
pub fn loopback_listener() -> TcpListener {
    TcpListener::bind(("127.0.0.1", 0)).expect("bind ephemeral listener")
}

/// Serve `responses` in order, one connection each.
pub fn spawn_mock_server(
    listener: TcpListener,
    responses: Vec<MockResponse>,
) -> (SocketAddr, mpsc::Receiver<CapturedRequest>) {
    let addr = listener.local_addr().expect("listener has address");
    let (tx, rx) = mpsc::channel();

    thread::spawn(move || {
        for reply in responses {
            let Ok((mut stream, _)) = listener.accept() else {
                break;
            };
            let captured = read_http_request(&mut stream);
            let response = format!(
                "HTTP/1.1 {} {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                reply.status,
                status_text(reply.status),
                reply.body.len(),
                reply.body
            );
            let _ = stream.write_all(response.as_bytes());
            let _ = stream.flush();
            let _ = tx.send(captured);
        }
    });

    (addr, rx)
}

/// Accept one connection, read the request and never answer.
///
/// The connection is held open for `hold` so the client's timeout fires first.
pub fn spawn_silent_server(listener: TcpListener, hold: Duration) -> SocketAddr {
    let addr = listener.local_addr().expect("listener has address");
    thread::spawn(move || {
        if let Ok((mut stream, _)) = listener.accept() {
            let _ = read_http_request(&mut stream);
            thread::sleep(hold);
        }
    });
    addr
}

/// An address on which nothing listens, so connections are refused.
pub fn refused_addr() -> SocketAddr {
    let listener = loopback_listener();
    let addr = listener.local_addr().expect("listener has address");
    drop(listener);
    addr
}

/// Endpoint URL for a mock server address.
pub fn endpoint(addr: SocketAddr) -> String {
    format!("http://{addr}/api/rfid")
}
