// src/handlers/mod.rs
use axum::{http::StatusCode, response::Json};
use serde_json::{json, Value};

pub mod form;
pub mod generate;
pub mod key;

/// Error body shared by every endpoint: `{"success": false, "error": "..."}`
pub type ApiError = (StatusCode, Json<Value>);

pub fn api_error(status: StatusCode, message: impl std::fmt::Display) -> ApiError {
    (status, Json(json!({ "success": false, "error": message.to_string() })))
}
