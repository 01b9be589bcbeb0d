//! HTTP upload endpoint.
//!
//! The body is one base64 line holding the JSON upload header, a newline,
//! then the raw content.

use axum::Json;
use axum::extract::State;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use bytes::Bytes;

use courier_realtime::Credential;
use courier_realtime::message::{UploadHeader, UploadReceipt};

use super::authenticate;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Content type recorded when the header leaves it empty.
const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Splits an upload body into its header and content.
pub fn parse_upload(body: &Bytes) -> ApiResult<(UploadHeader, Bytes)> {
    let newline = body
        .iter()
        .position(|b| *b == b'\n')
        .ok_or_else(|| ApiError::bad_request("Upload header line missing"))?;

    let raw = STANDARD
        .decode(body[..newline].trim_ascii())
        .map_err(|e| ApiError::bad_request(format!("Upload header is not base64: {e}")))?;
    let header: UploadHeader = serde_json::from_slice(&raw)
        .map_err(|e| ApiError::bad_request(format!("Invalid upload header: {e}")))?;

    Ok((header, body.slice(newline + 1..)))
}

/// POST /upload
pub async fn upload(State(state): State<AppState>, body: Bytes) -> ApiResult<Json<UploadReceipt>> {
    let (header, content) = parse_upload(&body)?;

    let credential = header.token.clone().map(Credential::SessionToken);
    let identity = authenticate(&state, credential, "/upload").await?;

    let content_type = if header.content_type.is_empty() {
        DEFAULT_CONTENT_TYPE
    } else {
        header.content_type.as_str()
    };
    let receipt = state
        .engine
        .ingest
        .ingest(&identity.user_hash(), &header.name, content_type, content)
        .await?;

    Ok(Json(UploadReceipt::stored(receipt.name, receipt.location)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body(header: &str, content: &str) -> Bytes {
        Bytes::from(format!("{}\n{content}", STANDARD.encode(header)))
    }

    #[test]
    fn test_parse_header_and_content() {
        let (header, content) = parse_upload(&body(
            r#"{"Name":"a.txt","Type":"text/plain","Token":"t1"}"#,
            "line one\nline two",
        ))
        .unwrap();

        assert_eq!(header.name, "a.txt");
        assert_eq!(header.token.as_deref(), Some("t1"));
        assert_eq!(content, Bytes::from("line one\nline two"));
    }

    #[test]
    fn test_empty_content_is_allowed() {
        let (_, content) = parse_upload(&body(r#"{"Name":"a","Type":"t"}"#, "")).unwrap();
        assert!(content.is_empty());
    }

    #[test]
    fn test_missing_newline_is_rejected() {
        let err = parse_upload(&Bytes::from("eyJOYW1lIjoiYSJ9")).unwrap_err();
        assert_eq!(err.0.kind, courier_core::error::ErrorKind::Validation);
    }

    #[test]
    fn test_header_must_be_base64_json() {
        assert!(parse_upload(&Bytes::from("!!!\nbody")).is_err());
        assert!(parse_upload(&body("not json", "body")).is_err());
    }
}
