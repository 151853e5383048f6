use std::{io::BufRead, str::FromStr};

use anyhow::{Context, Result};
use log::debug;

/// The first line of a request, split into its tokens. Method and version
/// are kept for handlers to inspect but play no part in routing.
#[derive(Debug, PartialEq, Eq)]
pub struct RequestLine {
    pub method: String,
    pub path: String,
    pub raw: String,
}

impl FromStr for RequestLine {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let mut parts = s.split_whitespace();

        let method = parts
            .next()
            .context("request line should have a method token")?;
        let path = parts
            .next()
            .context("request line should have a path token")?;

        Ok(RequestLine {
            method: method.to_owned(),
            path: path.to_owned(),
            raw: s.to_owned(),
        })
    }
}

/// Reads the request line, then drains header lines until a blank line or
/// end of stream. Returns `None` when the peer disconnected before sending
/// anything (or sent a blank line), in which case no response is owed.
pub fn read_request_line(reader: &mut impl BufRead) -> Result<Option<String>> {
    let mut request_line = String::new();
    reader.read_line(&mut request_line)?;

    let request_line = request_line.trim_end();
    if request_line.is_empty() {
        return Ok(None);
    }

    let mut line = String::new();
    while reader.read_line(&mut line)? > 0 {
        if line.trim().is_empty() {
            break;
        }

        debug!("header: {}", line.trim_end());
        line.clear();
    }

    Ok(Some(request_line.to_owned()))
}
