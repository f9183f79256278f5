use std::sync::Arc;

use tokio::io::{
    AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader,
};
use tracing::{debug, error, info, warn};

use crate::digests::Digests;
use crate::error::Error;
use crate::fingerprint::{self, Digest};
use crate::request::{Request, Response};
use crate::source::Source;

/// Longest request line accepted, newline included.
const MAX_REQUEST_LINE: usize = 8 * 1024;

/// Serves exactly one request per connection, then closes it.
#[derive(Clone)]
pub struct Worker {
    digests: Arc<Digests>,
    source: Arc<dyn Source>,
    fingerprint: fn(&[u8]) -> Digest,
}

impl Worker {
    pub fn new(digests: Arc<Digests>, source: Arc<dyn Source>) -> Self {
        Worker {
            digests,
            source,
            fingerprint: fingerprint::fingerprint,
        }
    }

    /// Replaces the digest function, e.g. with one that counts its calls.
    #[cfg(test)]
    pub(crate) fn with_fingerprint(mut self, fingerprint: fn(&[u8]) -> Digest) -> Self {
        self.fingerprint = fingerprint;
        self
    }

    /// Runs one connection to completion. Failures are logged and end here.
    pub async fn serve<S>(&self, stream: S)
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let mut stream = BufReader::new(stream);

        match self.respond(&mut stream).await {
            Ok(()) => {}
            Err(Error::MalformedRequest) => warn!("malformed request, closing connection"),
            Err(err) => error!(%err, "connection failed"),
        }

        if let Err(err) = stream.shutdown().await {
            debug!(%err, "shutdown");
        }
    }

    async fn respond<S>(&self, stream: &mut BufReader<S>) -> Result<(), Error>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let line = read_request_line(stream).await?;
        let response = self.handle(&line).await?;
        stream.write_all(&response.encode()).await?;
        stream.flush().await?;
        Ok(())
    }

    /// Turns a raw request line into the response to send back.
    ///
    /// Only a malformed line is returned as an error; every other outcome has
    /// a response.
    pub async fn handle(&self, line: &str) -> Result<Response, Error> {
        let request = match Request::parse(line) {
            Ok(request) => request,
            Err(Error::UnsupportedMethod(method)) => {
                warn!(%method, "unsupported method");
                return Ok(Response::BadMethod);
            }
            Err(err) => return Err(err),
        };
        info!(method = %request.method, path = %request.path, "request");

        match self.digest(&request.path).await {
            Ok(digest) => Ok(Response::Digest(digest)),
            Err(Error::FileNotFound(path)) => {
                info!(%path, "not found");
                Ok(Response::NotFound)
            }
            Err(Error::Io(err)) => {
                error!(path = %request.path, %err, "failed to read file");
                Ok(Response::InternalError)
            }
            Err(err) => Err(err),
        }
    }

    async fn digest(&self, key: &str) -> Result<Digest, Error> {
        if let Some(digest) = self.digests.get(key) {
            debug!(key, "cache hit");
            return Ok(digest);
        }

        if !self.source.exists(key).await {
            return Err(Error::FileNotFound(key.to_string()));
        }

        let bytes = self.source.read(key).await?;
        let digest = (self.fingerprint)(&bytes);
        debug!(key, digest = %fingerprint::to_hex(&digest), "cache miss");

        if let Some(evicted) = self.digests.put(key, digest) {
            debug!(%evicted, "evicted");
        }
        Ok(digest)
    }
}

/// Reads one line of at most [`MAX_REQUEST_LINE`] bytes.
///
/// Nothing to read, an over-long line and non UTF-8 bytes are all malformed.
async fn read_request_line<R>(reader: &mut R) -> Result<String, Error>
where
    R: AsyncBufRead + Unpin,
{
    let mut buf = Vec::new();
    let n = reader
        .take(MAX_REQUEST_LINE as u64)
        .read_until(b'\n', &mut buf)
        .await?;

    if n == 0 || (n == MAX_REQUEST_LINE && buf.last() != Some(&b'\n')) {
        return Err(Error::MalformedRequest);
    }
    String::from_utf8(buf).map_err(|_| Error::MalformedRequest)
}
