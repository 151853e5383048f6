use std::fmt::Display;

use anyhow::Result;
use serde::Serialize;

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum HttpStatus {
    Ok,
    BadRequest,
    NotFound,
    InternalServerError,
}

impl Display for HttpStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HttpStatus::Ok => write!(f, "200 OK"),
            HttpStatus::BadRequest => write!(f, "400 Bad Request"),
            HttpStatus::NotFound => write!(f, "404 Not Found"),
            HttpStatus::InternalServerError => write!(f, "500 Internal Server Error"),
        }
    }
}

#[derive(Debug)]
pub struct HttpResponse {
    pub status: HttpStatus,
    pub content_type: String,
    pub body: String,
}

impl HttpResponse {
    pub fn new(status: HttpStatus, content_type: &str, body: &str) -> Self {
        HttpResponse {
            status,
            content_type: content_type.to_owned(),
            body: body.to_owned(),
        }
    }

    pub fn html(body: &str) -> Self {
        Self::new(HttpStatus::Ok, "text/html", body)
    }

    pub fn json<T: Serialize>(body: &T) -> Result<Self> {
        let body = serde_json::to_string(body)?;
        Ok(Self::new(HttpStatus::Ok, "application/json", &body))
    }

    pub fn text(status: HttpStatus, body: &str) -> Self {
        Self::new(status, "text/plain", body)
    }

    /// Serializes the response to wire format: status line, the fixed header
    /// set, a blank line and the body verbatim. Content-Length is the byte
    /// length of the body, not its character count.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut response = format!(
            "HTTP/1.1 {}\r\n\
             Content-Type: {}\r\n\
             Content-Length: {}\r\n\
             Server: SimpleHttpServer/1.0\r\n\
             Connection: close\r\n\
             \r\n",
            self.status,
            self.content_type,
            self.body.len(),
        )
        .into_bytes();

        response.extend_from_slice(self.body.as_bytes());
        response
    }
}
