//! Minimal HTTP/1.1 server for integration tests.
//!
//! Serves fixed bodies by request path, each with an optional delay before
//! the response. Unknown paths answer 404.

use std::collections::HashMap;
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

#[derive(Debug, Clone)]
struct Route {
    status: u16,
    body: Vec<u8>,
    delay: Duration,
}

/// Route table; build it, then call [`HlsServer::start`].
#[derive(Debug, Clone, Default)]
pub struct HlsServer {
    routes: HashMap<String, Route>,
}

impl HlsServer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn route(self, path: &str, body: impl AsRef<[u8]>) -> Self {
        self.route_delayed(path, body, Duration::ZERO)
    }

    pub fn route_delayed(mut self, path: &str, body: impl AsRef<[u8]>, delay: Duration) -> Self {
        self.routes.insert(
            path.to_string(),
            Route {
                status: 200,
                body: body.as_ref().to_vec(),
                delay,
            },
        );
        self
    }

    pub fn route_status(mut self, path: &str, status: u16) -> Self {
        self.routes.insert(
            path.to_string(),
            Route {
                status,
                body: Vec::new(),
                delay: Duration::ZERO,
            },
        );
        self
    }

    /// Serve in a background thread until the process exits. Returns the base
    /// URL without trailing slash (e.g. "http://127.0.0.1:12345").
    pub fn start(self) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        let port = listener.local_addr().unwrap().port();
        let routes = Arc::new(self.routes);
        thread::spawn(move || {
            for stream in listener.incoming().flatten() {
                let routes = Arc::clone(&routes);
                thread::spawn(move || handle(stream, &routes));
            }
        });
        format!("http://127.0.0.1:{}", port)
    }
}

fn handle(mut stream: TcpStream, routes: &HashMap<String, Route>) {
    let _ = stream.set_read_timeout(Some(Duration::from_secs(2)));
    let _ = stream.set_write_timeout(Some(Duration::from_secs(2)));
    let mut buf = [0u8; 8192];
    let n = match stream.read(&mut buf) {
        Ok(0) | Err(_) => return,
        Ok(n) => n,
    };
    let request = match std::str::from_utf8(&buf[..n]) {
        Ok(s) => s,
        Err(_) => return,
    };
    let mut parts = request.lines().next().unwrap_or("").split_whitespace();
    let method = parts.next().unwrap_or("");
    let path = parts.next().unwrap_or("");
    if !method.eq_ignore_ascii_case("GET") {
        let _ = stream.write_all(
            b"HTTP/1.1 405 Method Not Allowed\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
        );
        return;
    }
    let (status, body) = match routes.get(path) {
        Some(route) => {
            if !route.delay.is_zero() {
                thread::sleep(route.delay);
            }
            (route.status, route.body.as_slice())
        }
        None => (404, &[][..]),
    };
    let reason = match status {
        200 => "OK",
        404 => "Not Found",
        500 => "Internal Server Error",
        _ => "Status",
    };
    let header = format!(
        "HTTP/1.1 {} {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        status,
        reason,
        body.len()
    );
    let _ = stream.write_all(header.as_bytes());
    let _ = stream.write_all(body);
}
