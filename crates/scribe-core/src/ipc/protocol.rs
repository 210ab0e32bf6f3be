//! Wire format for launch handoffs.
//!
//! One message per connection: the endpoint token on the first line, then the
//! launch tokens as UTF-8 text, one per line. The sender closes its write half
//! when done, so end-of-stream marks the end of the message and no length
//! prefix is needed.
//!
//! ```text
//! 0b6f6a1e-4c1d-4f55-9a43-2b0e3f7d9c11\n/home/writer/notes.md\n-nosplash
//! ```

use crate::args::LaunchRequest;
use crate::config::IpcConfig;
use crate::{Result, ScribeError};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Read a complete launch payload from `reader` until end-of-stream.
///
/// Payloads larger than [`IpcConfig::MAX_PAYLOAD_SIZE`], not valid UTF-8, or
/// not opened by `expected_token` are rejected.
pub async fn read_payload<R: AsyncRead + Unpin>(
    reader: &mut R,
    expected_token: &str,
) -> Result<LaunchRequest> {
    let mut payload = Vec::new();
    let limit = IpcConfig::MAX_PAYLOAD_SIZE as u64 + 1;
    (&mut *reader).take(limit).read_to_end(&mut payload).await?;

    if payload.len() > IpcConfig::MAX_PAYLOAD_SIZE {
        return Err(ScribeError::Validation {
            field: "launch_payload".to_string(),
            message: format!(
                "Launch payload exceeds maximum of {} bytes",
                IpcConfig::MAX_PAYLOAD_SIZE
            ),
        });
    }

    let text = String::from_utf8(payload).map_err(|_| ScribeError::Validation {
        field: "launch_payload".to_string(),
        message: "Invalid UTF-8 in launch payload".to_string(),
    })?;

    let (token, body) = text.split_once('\n').unwrap_or((text.as_str(), ""));
    if token != expected_token {
        return Err(ScribeError::Validation {
            field: "launch_token".to_string(),
            message: "Launch payload does not carry the endpoint token".to_string(),
        });
    }

    Ok(LaunchRequest::from_wire(body))
}

/// Write `token` and `request`, then close the write half to mark the end of
/// the message.
pub async fn write_payload<W: AsyncWrite + Unpin>(
    writer: &mut W,
    token: &str,
    request: &LaunchRequest,
) -> Result<()> {
    writer.write_all(token.as_bytes()).await?;
    writer.write_all(b"\n").await?;
    writer.write_all(request.to_wire().as_bytes()).await?;
    writer.flush().await?;
    writer.shutdown().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOKEN: &str = "5d1c8f0e-token";

    #[tokio::test]
    async fn test_payload_write_then_read() {
        let request = LaunchRequest::new(vec![
            "/home/writer/report.md".to_string(),
            "-nosplash".to_string(),
        ]);
        let mut buf = Vec::new();
        write_payload(&mut buf, TOKEN, &request).await.unwrap();
        assert_eq!(buf, b"5d1c8f0e-token\n/home/writer/report.md\n-nosplash");

        let mut cursor = std::io::Cursor::new(buf);
        assert_eq!(read_payload(&mut cursor, TOKEN).await.unwrap(), request);
    }

    #[tokio::test]
    async fn test_token_alone_is_empty_request() {
        let mut cursor = std::io::Cursor::new(TOKEN.as_bytes().to_vec());
        assert!(read_payload(&mut cursor, TOKEN).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_wrong_or_missing_token_is_rejected() {
        for payload in [&b"other-token\n/etc/passwd"[..], &b"/etc/passwd"[..], &b""[..]] {
            let mut cursor = std::io::Cursor::new(payload.to_vec());
            let result = read_payload(&mut cursor, TOKEN).await;
            assert!(
                matches!(&result, Err(ScribeError::Validation { field, .. }) if field == "launch_token"),
                "Expected token rejection, got: {:?}",
                result
            );
        }
    }

    #[tokio::test]
    async fn test_oversized_payload_is_rejected() {
        let mut cursor = std::io::Cursor::new(vec![b'a'; IpcConfig::MAX_PAYLOAD_SIZE + 10]);
        let result = read_payload(&mut cursor, TOKEN).await;
        assert!(matches!(result, Err(ScribeError::Validation { .. })));
    }

    #[tokio::test]
    async fn test_invalid_utf8_is_rejected() {
        let mut cursor = std::io::Cursor::new(vec![0xff, 0xfe, b'\n']);
        assert!(read_payload(&mut cursor, TOKEN).await.is_err());
    }
}
