//! HTTP request path (§4.9): URL parsing, GET/HEAD block and manifest
//! handlers, the POST verb envelope, and the `tiny_http`-backed server.

pub mod handlers;
pub mod post;
pub mod server;
pub mod url;

pub use handlers::{status_code, HttpResponse};
pub use server::HttpServer;
