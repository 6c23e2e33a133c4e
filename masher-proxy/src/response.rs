use std::collections::BTreeMap;

use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum::response::IntoResponse;
use serde::Serialize;

/// The only body a client ever sees when combining fails.
pub const INTERNAL_ERROR_MESSAGE: &str = "Internal Server Error";

/// What the request handler hands back: status, headers and a text body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Response {
    pub status_code: u16,
    pub headers: BTreeMap<String, String>,
    pub body: String,
    pub is_base64_encoded: bool,
}

impl Response {
    pub fn new<S: Into<String>>(status_code: u16, content_type: &str, body: S) -> Self {
        Self {
            status_code,
            headers: BTreeMap::from([("Content-Type".to_string(), content_type.to_string())]),
            body: body.into(),
            is_base64_encoded: false,
        }
    }

    pub fn calendar(body: String) -> Self {
        Self::new(200, "text/calendar", body)
    }

    pub fn internal_error() -> Self {
        Self::new(500, "text/plain", INTERNAL_ERROR_MESSAGE)
    }

    pub fn content_type(&self) -> Option<&str> {
        self.headers.get("Content-Type").map(String::as_str)
    }
}

impl IntoResponse for Response {
    fn into_response(self) -> axum::response::Response {
        let status =
            StatusCode::from_u16(self.status_code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let mut response = (status, self.body).into_response();

        for (name, value) in self.headers {
            match (HeaderName::try_from(name), HeaderValue::try_from(value)) {
                (Ok(name), Ok(value)) => {
                    response.headers_mut().insert(name, value);
                }
                _ => tracing::warn!("dropping invalid response header"),
            }
        }

        response
    }
}
