use async_trait::async_trait;
use futures::stream::{self, BoxStream, Stream, StreamExt};
use reqwest::header::ACCEPT;
use url::Url;

use crate::errors::ApiError;

use super::Domain;

/// Longest frame accepted before the subscription is treated as broken.
pub const MAX_FRAME_LEN: usize = 64 * 1024;

/// Raw frames read from one push subscription, one JSON document each.
pub type FrameStream = BoxStream<'static, Result<String, ApiError>>;

#[async_trait]
pub trait PushTransport: Send + Sync + 'static {
    /// Opens the subscription for `domain`, authenticated with `token`.
    async fn connect(&self, domain: Domain, token: &str) -> Result<FrameStream, ApiError>;
}

/// Streams newline-delimited JSON from `GET stream/{domain}`.
pub struct HttpPushTransport {
    http: reqwest::Client,
    endpoint: Url,
}

impl HttpPushTransport {
    /// `endpoint` is the versioned API root. No request timeout: subscriptions are long-lived.
    pub fn new(endpoint: Url) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder().build()?;
        Ok(Self { http, endpoint })
    }
}

#[async_trait]
impl PushTransport for HttpPushTransport {
    async fn connect(&self, domain: Domain, token: &str) -> Result<FrameStream, ApiError> {
        let resource = format!("stream/{}", domain.as_str());
        let url = self.endpoint.join(&resource).map_err(|err| ApiError::InvalidRequest {
            message: format!("bad stream url: {err}"),
        })?;
        let response = self
            .http
            .get(url)
            .bearer_auth(token)
            .header(ACCEPT, "application/x-ndjson")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::from_status(status.as_u16(), &resource, &body));
        }
        Ok(ndjson_lines(response.bytes_stream(), MAX_FRAME_LEN))
    }
}

/// Splits a byte stream into lines. A trailing line without `\n` is still yielded.
///
/// A line longer than `max_len` yields one `Decode` error and ends the stream.
pub(crate) fn ndjson_lines<S, B, E>(bytes: S, max_len: usize) -> FrameStream
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: Into<ApiError> + Send + 'static,
{
    stream::unfold((bytes.boxed(), Vec::<u8>::new()), move |(mut bytes, mut buf)| async move {
        loop {
            if let Some(pos) = buf.iter().position(|byte| *byte == b'\n') {
                let line: Vec<u8> = buf.drain(..=pos).collect();
                let text = String::from_utf8_lossy(&line[..pos]).into_owned();
                return Some((Ok(text), (bytes, buf)));
            }
            if buf.len() > max_len {
                buf.clear();
                let err = ApiError::Decode {
                    message: format!("push frame exceeds {max_len} bytes"),
                };
                return Some((Err(err), (stream::empty().boxed(), buf)));
            }
            match bytes.next().await {
                Some(Ok(chunk)) => buf.extend_from_slice(chunk.as_ref()),
                Some(Err(err)) => return Some((Err(err.into()), (bytes, buf))),
                None if buf.is_empty() => return None,
                None => {
                    let text = String::from_utf8_lossy(&buf).into_owned();
                    buf.clear();
                    return Some((Ok(text), (bytes, buf)));
                }
            }
        }
    })
    .boxed()
}
