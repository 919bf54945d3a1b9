use anyhow::{Result, bail};
use reqwest::{Client, Response};
use std::time::Duration;

/// Default maximum body size for media downloads (10 MB).
pub const DEFAULT_MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

const ERROR_SNIPPET_BYTES: usize = 2048;

/// Build a `reqwest::Client` with a 10 s connect timeout and the given overall timeout.
///
/// Falls back to the default client if the builder fails.
pub fn http_client(timeout: Duration) -> Client {
    Client::builder()
        .connect_timeout(Duration::from_secs(10))
        .timeout(timeout)
        .build()
        .unwrap_or_else(|_| Client::new())
}

/// Download a response body with a size limit.
///
/// Returns `(bytes, was_truncated)`. A `Content-Length` above the limit is
/// rejected before any bytes are read.
pub async fn limited_body(resp: Response, max_bytes: usize) -> Result<(Vec<u8>, bool)> {
    if let Some(cl) = resp.content_length()
        && cl as usize > max_bytes
    {
        bail!(
            "response body too large: Content-Length {} exceeds limit {}",
            cl,
            max_bytes
        );
    }

    let mut buf = Vec::new();
    let mut stream = resp;
    while let Some(chunk) = stream.chunk().await? {
        if buf.len() + chunk.len() > max_bytes {
            let remaining = max_bytes.saturating_sub(buf.len());
            buf.extend_from_slice(&chunk[..remaining]);
            return Ok((buf, true));
        }
        buf.extend_from_slice(&chunk);
    }
    Ok((buf, false))
}

/// Read an error body for logging, capped so a hostile upstream cannot flood the logs.
///
/// Unlike [`limited_body`], an oversized body is cut rather than refused.
pub async fn error_snippet(mut resp: Response) -> String {
    let mut buf = Vec::with_capacity(ERROR_SNIPPET_BYTES);
    loop {
        match resp.chunk().await {
            Ok(Some(chunk)) => {
                let take = chunk.len().min(ERROR_SNIPPET_BYTES - buf.len());
                buf.extend_from_slice(&chunk[..take]);
                if buf.len() == ERROR_SNIPPET_BYTES {
                    break;
                }
            }
            Ok(None) => break,
            Err(e) if buf.is_empty() => return format!("<unreadable body: {}>", e),
            Err(_) => break,
        }
    }
    String::from_utf8_lossy(&buf).trim().to_string()
}
