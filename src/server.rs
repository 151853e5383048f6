use anyhow::{Context, Result};
use colored::Colorize;
use log::{error, info, trace, warn};
use std::{
    io::{BufReader, Write},
    net::{SocketAddr, TcpListener, TcpStream},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use crate::{
    request::{read_request_line, RequestLine},
    response::{HttpResponse, HttpStatus},
    router::{RequestHandler, Router},
    routes,
    thread_pool::ThreadPool,
};

const DEFAULT_WORKERS: usize = 10;

pub struct HttpServer {
    addr: SocketAddr,
    router: Router,
    listener: TcpListener,
    pool: ThreadPool,
    running: Arc<AtomicBool>,
}

impl HttpServer {
    /// Binds the listener and sets up the default routes. Bind failure is
    /// fatal and reported to the caller.
    pub fn bind(addr: &str) -> Result<Self> {
        let listener =
            TcpListener::bind(addr).with_context(|| format!("failed to bind to {addr}"))?;
        let addr = listener.local_addr()?;

        let mut router = Router::new();
        routes::register_defaults(&mut router);

        Ok(HttpServer {
            addr,
            router,
            listener,
            pool: ThreadPool::new(DEFAULT_WORKERS)?,
            running: Arc::new(AtomicBool::new(true)),
        })
    }

    pub fn workers(mut self, size: usize) -> Result<Self> {
        self.pool = ThreadPool::new(size)?;
        Ok(self)
    }

    pub fn route(mut self, path: &str, handler: RequestHandler) -> Self {
        self.router.register(path, handler);
        self
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            running: Arc::clone(&self.running),
            addr: self.addr,
        }
    }

    /// Runs the accept loop until an unrecoverable listener error or a
    /// shutdown signal. Each accepted connection is handed to the worker
    /// pool; accepting itself stays on the calling thread.
    ///
    /// Consuming `self` freezes the route table before the first dispatch,
    /// so registration after start is impossible rather than merely
    /// discouraged.
    pub fn run(self) -> Result<()> {
        info!("{}", format!("server started on {}", self.addr).green());
        info!("awaiting connections...");

        let router = Arc::new(self.router);

        for stream in self.listener.incoming() {
            if !self.running.load(Ordering::SeqCst) {
                break;
            }

            let stream = match stream {
                Ok(stream) => stream,
                Err(err) => {
                    error!("server error: {err}");
                    return Err(err).context("accept loop terminated");
                }
            };
            trace!("got new tcp connection!");

            let router = Arc::clone(&router);
            self.pool.execute(move || {
                if let Err(err) = handle_connection(&router, stream) {
                    error!("error handling client: {err:#}");
                }
            })?;
        }

        // dropping the pool here joins in-flight handlers
        info!("server stopped");
        Ok(())
    }
}

/// Unblocks the accept loop from another thread: clears the running flag,
/// then opens a throwaway connection so the blocked `accept` returns.
pub struct ShutdownHandle {
    running: Arc<AtomicBool>,
    addr: SocketAddr,
}

impl ShutdownHandle {
    pub fn shutdown(&self) {
        self.running.store(false, Ordering::SeqCst);
        let _ = TcpStream::connect(self.addr);
    }
}

/// Serves exactly one request: read the request line, discard headers,
/// dispatch, write one response, close. The stream is owned here, so every
/// exit path closes it. I/O errors propagate to the dispatching closure;
/// handler errors get a 500 instead.
fn handle_connection(router: &Router, mut stream: TcpStream) -> Result<()> {
    let mut reader = BufReader::new(stream.try_clone().context("failed to clone tcp stream")?);

    let Some(raw_line) = read_request_line(&mut reader)? else {
        trace!("peer disconnected before sending a request line");
        return Ok(());
    };
    info!("request: {raw_line}");

    let response = match raw_line.parse::<RequestLine>() {
        Ok(request) => match router.resolve(&request.path)(&request.raw) {
            Ok(response) => response,
            Err(err) => {
                error!("handler for {} failed: {err:#}", request.path);
                HttpResponse::text(
                    HttpStatus::InternalServerError,
                    "500 - Internal server error",
                )
            }
        },
        Err(err) => {
            warn!("malformed request line {raw_line:?}: {err:#}");
            HttpResponse::text(HttpStatus::BadRequest, "400 - Bad request")
        }
    };

    stream.write_all(&response.to_bytes())?;
    stream.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::{
        io::Read,
        net::Shutdown,
        sync::Barrier,
        thread,
        time::Duration,
    };

    use anyhow::anyhow;

    use super::*;

    fn echo_path(request_line: &str) -> Result<HttpResponse> {
        let request: RequestLine = request_line.parse()?;
        Ok(HttpResponse::text(HttpStatus::Ok, &request.path))
    }

    fn failing_handler(_request_line: &str) -> Result<HttpResponse> {
        Err(anyhow!("boom"))
    }

    fn start_server() -> (SocketAddr, ShutdownHandle, thread::JoinHandle<Result<()>>) {
        let mut server = HttpServer::bind("127.0.0.1:0")
            .unwrap()
            .route("/fail", failing_handler);
        for n in 0..10 {
            server = server.route(&format!("/echo{n}"), echo_path);
        }

        let addr = server.local_addr();
        let handle = server.shutdown_handle();
        let thread = thread::spawn(move || server.run());
        (addr, handle, thread)
    }

    fn send_raw(addr: SocketAddr, request: &str) -> String {
        let mut stream = TcpStream::connect(addr).unwrap();
        stream
            .set_read_timeout(Some(Duration::from_secs(5)))
            .unwrap();
        stream.write_all(request.as_bytes()).unwrap();
        stream.flush().unwrap();

        let mut response = String::new();
        stream.read_to_string(&mut response).unwrap();
        response
    }

    fn send_request(addr: SocketAddr, path: &str) -> String {
        send_raw(addr, &format!("GET {path} HTTP/1.1\r\nHost: test\r\n\r\n"))
    }

    fn body_of(response: &str) -> &str {
        response
            .split_once("\r\n\r\n")
            .map(|(_, body)| body)
            .unwrap_or("")
    }

    #[test]
    fn test_registered_route_round_trip() {
        let (addr, handle, thread) = start_server();

        let response = send_request(addr, "/time");
        assert!(response.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(response.contains("Content-Type: application/json\r\n"));
        assert!(response.contains("Server: SimpleHttpServer/1.0\r\n"));
        assert!(response.contains("Connection: close\r\n"));

        let parsed: serde_json::Value = serde_json::from_str(body_of(&response)).unwrap();
        assert!(parsed["time"].is_string());

        handle.shutdown();
        thread.join().unwrap().unwrap();
    }

    #[test]
    fn test_unknown_route_gets_404() {
        let (addr, handle, thread) = start_server();

        let response = send_request(addr, "/nope");
        assert!(response.starts_with("HTTP/1.1 404 Not Found\r\n"));
        assert!(response.contains("Content-Type: text/plain\r\n"));
        assert_eq!("404 - Page not found", body_of(&response));

        handle.shutdown();
        thread.join().unwrap().unwrap();
    }

    #[test]
    fn test_content_length_matches_body() {
        let (addr, handle, thread) = start_server();

        let response = send_request(addr, "/");
        let length: usize = response
            .lines()
            .find_map(|line| line.strip_prefix("Content-Length: "))
            .unwrap()
            .trim()
            .parse()
            .unwrap();
        assert_eq!(length, body_of(&response).len());

        handle.shutdown();
        thread.join().unwrap().unwrap();
    }

    #[test]
    fn test_malformed_request_line_gets_400() {
        let (addr, handle, thread) = start_server();

        let response = send_raw(addr, "GARBAGE\r\n\r\n");
        assert!(response.starts_with("HTTP/1.1 400 Bad Request\r\n"));
        assert_eq!("400 - Bad request", body_of(&response));

        handle.shutdown();
        thread.join().unwrap().unwrap();
    }

    #[test]
    fn test_failing_handler_gets_500() {
        let (addr, handle, thread) = start_server();

        let response = send_raw(addr, "GET /fail HTTP/1.1\r\n\r\n");
        assert!(response.starts_with("HTTP/1.1 500 Internal Server Error\r\n"));
        assert_eq!("500 - Internal server error", body_of(&response));

        handle.shutdown();
        thread.join().unwrap().unwrap();
    }

    #[test]
    fn test_empty_request_then_next_connection_served() {
        let (addr, handle, thread) = start_server();

        // connect and hang up without sending anything
        let mut stream = TcpStream::connect(addr).unwrap();
        stream.shutdown(Shutdown::Write).unwrap();
        let mut response = String::new();
        stream.read_to_string(&mut response).unwrap();
        assert_eq!("", response);

        // the accept loop keeps serving
        let response = send_request(addr, "/health");
        assert!(response.starts_with("HTTP/1.1 200 OK\r\n"));

        handle.shutdown();
        thread.join().unwrap().unwrap();
    }

    #[test]
    fn test_repeated_requests_are_structurally_identical() {
        let (addr, handle, thread) = start_server();

        let first = send_request(addr, "/echo3");
        let second = send_request(addr, "/echo3");
        assert_eq!(first, second);

        handle.shutdown();
        thread.join().unwrap().unwrap();
    }

    #[test]
    fn test_ten_concurrent_requests_no_cross_talk() {
        let (addr, handle, thread) = start_server();
        let barrier = Arc::new(Barrier::new(10));

        let clients: Vec<_> = (0..10)
            .map(|n| {
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    send_request(addr, &format!("/echo{n}"))
                })
            })
            .collect();

        for (n, client) in clients.into_iter().enumerate() {
            let response = client.join().unwrap();
            assert!(response.starts_with("HTTP/1.1 200 OK\r\n"));
            assert_eq!(format!("/echo{n}"), body_of(&response));
        }

        handle.shutdown();
        thread.join().unwrap().unwrap();
    }

    #[test]
    fn test_shutdown_unblocks_accept_loop() {
        let (_, handle, thread) = start_server();

        handle.shutdown();
        thread.join().unwrap().unwrap();
    }
}
