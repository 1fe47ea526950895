//! `tiny_http`-based request server (§5 scheduling model: parallel OS
//! threads, each blocked in `recv()` until a request or shutdown signal).

use super::handlers::handle_get;
use super::post::handle_post;
use crate::state::State;
use std::io::Read;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tiny_http::{Method, Response, Server};

pub struct HttpServer {
    server: Arc<Server>,
    shutdown: Arc<AtomicBool>,
    workers: Vec<std::thread::JoinHandle<()>>,
}

impl HttpServer {
    pub fn bind(addr: &str, state: Arc<State>, num_threads: usize) -> std::io::Result<Self> {
        let server = Arc::new(Server::http(addr).map_err(std::io::Error::other)?);
        let shutdown = Arc::new(AtomicBool::new(false));
        let mut workers = Vec::with_capacity(num_threads);

        for _ in 0..num_threads.max(1) {
            let server = server.clone();
            let state = state.clone();
            let shutdown = shutdown.clone();
            workers.push(std::thread::spawn(move || worker_loop(&server, &state, &shutdown)));
        }

        Ok(HttpServer { server, shutdown, workers })
    }

    pub fn shutdown(self) {
        self.shutdown.store(true, Ordering::SeqCst);
        self.server.unblock();
        for w in self.workers {
            let _ = w.join();
        }
    }
}

fn worker_loop(server: &Server, state: &Arc<State>, shutdown: &AtomicBool) {
    loop {
        if shutdown.load(Ordering::SeqCst) {
            return;
        }
        let request = match server.recv_timeout(std::time::Duration::from_millis(500)) {
            Ok(Some(r)) => r,
            Ok(None) => continue,
            Err(_) => return,
        };
        dispatch(state, request);
    }
}

/// The caller's belief about which gateway owns this path travels outside
/// the URL path schema, as an `X-Coordinator-Id` header; absent or
/// unparseable, it's treated as 0 ("no opinion"), which skips the
/// coordinator check entirely (§4.9).
fn coordinator_id_header(request: &tiny_http::Request) -> u64 {
    request
        .headers()
        .iter()
        .find(|h| h.field.as_str().as_str().eq_ignore_ascii_case("X-Coordinator-Id"))
        .and_then(|h| h.value.as_str().parse().ok())
        .unwrap_or(0)
}

fn dispatch(state: &Arc<State>, mut request: tiny_http::Request) {
    let method = request.method().clone();
    let url = request.url().to_string();

    let result = match method {
        Method::Get | Method::Head => {
            let coordinator_id = coordinator_id_header(&request);
            let resp = handle_get(state, &url, coordinator_id);
            let mut builder = Response::from_data(resp.body).with_status_code(resp.status);
            if let Some(location) = resp.location {
                if let Ok(header) = tiny_http::Header::from_bytes(&b"Location"[..], location.as_bytes()) {
                    builder = builder.with_header(header);
                }
            }
            request.respond(builder)
        }
        Method::Post => {
            let mut body = Vec::new();
            if let Err(e) = request.as_reader().read_to_end(&mut body) {
                let resp = Response::from_string(e.to_string()).with_status_code(400);
                let _ = request.respond(resp);
                return;
            }
            match handle_post(state, &body) {
                Ok(payload) => request.respond(Response::from_data(payload).with_status_code(200)),
                Err(e) => {
                    let status = super::handlers::status_code(e.status_hint());
                    request.respond(Response::from_string(e.to_string()).with_status_code(status))
                }
            }
        }
        _ => request.respond(Response::from_string("method not allowed").with_status_code(405)),
    };
    let _ = result;
}
