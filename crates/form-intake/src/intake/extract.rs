use axum::{
    async_trait,
    body::Bytes,
    extract::{FromRequest, Request},
    http::{header, HeaderMap, StatusCode},
    response::Response,
};
use serde_json::Value;

use super::router::failure_response;

/// Submission body, read leniently.
///
/// A request that does not declare JSON, or declares it with an empty body, is an empty
/// submission rather than a rejection. Malformed and oversize JSON bodies answer with the
/// failure envelope instead of axum's plain-text rejections.
#[derive(Debug, Clone, PartialEq)]
pub struct SubmissionBody(pub Value);

#[async_trait]
impl<S> FromRequest<S> for SubmissionBody
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        if !declares_json(req.headers()) {
            return Ok(Self(Value::Null));
        }

        let bytes = Bytes::from_request(req, state).await.map_err(|rejection| {
            failure_response(
                rejection.status(),
                "Request body rejected",
                Some(rejection.body_text()),
            )
        })?;
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self(Value::Null));
        }

        serde_json::from_slice(&bytes).map(Self).map_err(|err| {
            failure_response(
                StatusCode::BAD_REQUEST,
                "Invalid JSON body",
                Some(err.to_string()),
            )
        })
    }
}

/// `application/json` or any `+json` media type, parameters ignored.
fn declares_json(headers: &HeaderMap) -> bool {
    let Some(content_type) = headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
    else {
        return false;
    };
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    essence == "application/json" || essence.ends_with("+json")
}
