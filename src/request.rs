//! One request line in, one response out.
//!
//! Request: `<METHOD> <PATH> <VERSION>\r\n`. Only the method and path are
//! looked at. Response: status line, `Content-Type`, `Content-Length`, a blank
//! line, then the body.

use crate::error::Error;
use crate::fingerprint::Digest;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub method: String,
    /// Target with a single leading `/` removed; doubles as the cache key.
    pub path: String,
}

impl Request {
    pub fn parse(line: &str) -> Result<Self, Error> {
        let mut tokens = line.split_whitespace();

        let method = tokens.next().ok_or(Error::MalformedRequest)?;
        if method != "GET" {
            return Err(Error::UnsupportedMethod(method.to_string()));
        }

        let target = tokens.next().ok_or(Error::MalformedRequest)?;
        let path = target.strip_prefix('/').unwrap_or(target);

        Ok(Request {
            method: method.to_string(),
            path: path.to_string(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    Digest(Digest),
    NotFound,
    BadMethod,
    /// Best effort after the file vanished or could not be read.
    InternalError,
}

impl Response {
    pub fn status(&self) -> (u16, &'static str) {
        match self {
            Response::Digest(_) => (200, "OK"),
            Response::NotFound => (404, "Not Found"),
            Response::BadMethod => (400, "Bad Request"),
            Response::InternalError => (500, "Internal Server Error"),
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            Response::Digest(_) => "application/octet-stream",
            _ => "text/plain",
        }
    }

    pub fn body(&self) -> &[u8] {
        match self {
            Response::Digest(digest) => digest.as_slice(),
            Response::NotFound => b"File not found",
            Response::BadMethod => b"Method Not Allowed",
            Response::InternalError => b"Internal Server Error",
        }
    }

    /// Frames the whole response, head and body, into one buffer.
    pub fn encode(&self) -> Vec<u8> {
        let (code, reason) = self.status();
        let body = self.body();
        let head = format!(
            "HTTP/1.1 {code} {reason}\r\nContent-Type: {}\r\nContent-Length: {}\r\n\r\n",
            self.content_type(),
            body.len()
        );

        let mut out = Vec::with_capacity(head.len() + body.len());
        out.extend_from_slice(head.as_bytes());
        out.extend_from_slice(body);
        out
    }
}
