//! Response envelope shared by every JSON endpoint.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::TandaError;
use crate::SCHEMA_VERSION;

pub const INVALID_REQUEST: &str = "INVALID_REQUEST";
pub const NOT_FOUND: &str = "NOT_FOUND";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiError {
    pub code: String,
    pub message: String,
}

impl ApiError {
    pub fn new(code: &str, message: impl Into<String>) -> Self {
        Self { code: code.to_string(), message: message.into() }
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(INVALID_REQUEST, message)
    }
}

impl From<TandaError> for ApiError {
    fn from(err: TandaError) -> Self {
        Self::new(err.code(), err.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseMeta {
    pub schema_version: u8,
    pub generated_at: DateTime<Utc>,
}

/// `{success, data, meta?}` on success, `{success: false, error}` on failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<ResponseMeta>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ApiError>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T, generated_at: DateTime<Utc>) -> Self {
        Self {
            success: true,
            data: Some(data),
            meta: Some(ResponseMeta { schema_version: SCHEMA_VERSION, generated_at }),
            error: None,
        }
    }

    pub fn failure(error: ApiError) -> Self {
        Self { success: false, data: None, meta: None, error: Some(error) }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| {
            r#"{"success":false,"error":{"code":"SERIALIZATION_FAILED","message":"Serialization failed"}}"#
                .to_string()
        })
    }
}
