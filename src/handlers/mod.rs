// src/handlers/mod.rs

use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;
use validator::Validate;

use crate::{error::AppError, protocol::Response};

pub mod attempts;
pub mod auth;
pub mod classes;
pub mod courses;
pub mod materials;
pub mod quiz;
pub mod stats;
pub mod users;

/// Deserializes a command's `data` object.
pub(crate) fn parse<T: DeserializeOwned>(data: Value) -> Result<T, AppError> {
    Ok(serde_json::from_value(data)?)
}

/// Like [`parse`], then runs the payload's `validator` rules.
pub(crate) fn parse_valid<T: DeserializeOwned + Validate>(data: Value) -> Result<T, AppError> {
    let payload: T = parse(data)?;
    payload.validate()?;
    Ok(payload)
}

/// Wraps a serializable value in a `DATA_RESPONSE`.
pub(crate) fn data_response<T: Serialize>(value: &T) -> Result<Response, AppError> {
    serde_json::to_value(value)
        .map(Response::data)
        .map_err(|e| AppError::Internal(format!("failed to serialize response: {}", e)))
}
