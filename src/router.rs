use std::collections::HashMap;

use anyhow::Result;
use log::debug;

use crate::response::{HttpResponse, HttpStatus};

/// A handler only ever sees the raw request line. Headers and body are
/// consumed and discarded before dispatch.
pub type RequestHandler = fn(&str) -> Result<HttpResponse>;

#[derive(Debug, Default)]
pub struct Router {
    routes: HashMap<String, RequestHandler>,
}

impl Router {
    pub fn new() -> Self {
        Router {
            routes: HashMap::new(),
        }
    }

    /// Registers a handler for an exact path. Registering the same path
    /// twice replaces the previous handler, so callers can override the
    /// default routes.
    pub fn register(&mut self, path: &str, handler: RequestHandler) {
        if self.routes.insert(path.to_owned(), handler).is_some() {
            debug!("route {path} re-registered, previous handler replaced");
        }
    }

    /// Resolution is total: unknown paths get the built-in not-found
    /// handler, never an error.
    pub fn resolve(&self, path: &str) -> RequestHandler {
        debug!("route: {path}");
        self.routes.get(path).copied().unwrap_or(not_found)
    }
}

fn not_found(_request_line: &str) -> Result<HttpResponse> {
    Ok(HttpResponse::text(
        HttpStatus::NotFound,
        "404 - Page not found",
    ))
}
