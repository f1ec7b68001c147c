//! Server-sent events framing shared by the HTTP providers
//!
//! ```text
//! bytes ──► lines ──► "data:" payloads ──► provider-specific JSON
//! ```

use crate::error::ProviderError;
use futures::{Stream, TryStreamExt};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::io::StreamReader;

/// Payload some backends send to mark the end of a stream
const DONE_MARKER: &str = "[DONE]";

/// Split a streaming response body into `data:` payloads.
///
/// Comments, blank lines and other SSE fields are skipped. The stream ends
/// at EOF or at the `[DONE]` marker; a read failure is yielded once and
/// ends it too.
pub(crate) fn data_payloads(
    response: reqwest::Response,
) -> impl Stream<Item = Result<String, ProviderError>> + Send {
    async_stream::stream! {
        let body = response
            .bytes_stream()
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e));
        let mut reader = BufReader::new(StreamReader::new(body));
        let mut line = String::new();

        loop {
            line.clear();
            match reader.read_line(&mut line).await {
                Ok(0) => break,
                Ok(_) => match data_field(&line) {
                    Some(DONE_MARKER) => break,
                    Some(data) => {
                        yield Ok(data.to_string());
                    }
                    None => {}
                },
                Err(e) => {
                    yield Err(ProviderError::StreamError(format!("Stream read error: {}", e)));
                    break;
                }
            }
        }
    }
}

/// The payload of a `data:` line, if `line` is one
pub(crate) fn data_field(line: &str) -> Option<&str> {
    let data = line.trim().strip_prefix("data:")?.trim();
    (!data.is_empty()).then_some(data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_field() {
        assert_eq!(data_field("data: {\"a\":1}\r\n"), Some("{\"a\":1}"));
        assert_eq!(data_field("data:[DONE]"), Some(DONE_MARKER));
        assert_eq!(data_field(": keep-alive"), None);
        assert_eq!(data_field("event: message_start"), None);
        assert_eq!(data_field("data:   "), None);
        assert_eq!(data_field(""), None);
    }
}
