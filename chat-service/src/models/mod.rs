//! Domain models for the chat service.
//!
//! Sessions and messages are persisted as flat string hashes; each model
//! owns its field layout through `to_fields` / `from_fields`.

pub mod message;
pub mod principal;
pub mod session;

pub use message::{Message, NewMessage, Role, TokenUsage};
pub use principal::Principal;
pub use session::Session;

use std::collections::HashMap;
use thiserror::Error;

/// A stored hash could not be turned back into a model.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("missing field '{0}'")]
    MissingField(&'static str),

    #[error("invalid value '{value}' for field '{field}'")]
    InvalidField { field: &'static str, value: String },
}

pub(crate) fn required<'a>(
    fields: &'a HashMap<String, String>,
    field: &'static str,
) -> Result<&'a str, DecodeError> {
    fields
        .get(field)
        .map(String::as_str)
        .ok_or(DecodeError::MissingField(field))
}

/// Empty strings encode `None`.
pub(crate) fn optional(fields: &HashMap<String, String>, field: &str) -> Option<String> {
    fields.get(field).filter(|v| !v.is_empty()).cloned()
}

pub(crate) fn parse_timestamp(
    fields: &HashMap<String, String>,
    field: &'static str,
) -> Result<chrono::DateTime<chrono::Utc>, DecodeError> {
    let raw = required(fields, field)?;
    chrono::DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&chrono::Utc))
        .map_err(|_| DecodeError::InvalidField {
            field,
            value: raw.to_string(),
        })
}

/// Missing or empty counters read as zero, matching how they are written.
pub(crate) fn parse_counter<T>(
    fields: &HashMap<String, String>,
    field: &'static str,
) -> Result<T, DecodeError>
where
    T: std::str::FromStr + Default,
{
    match fields.get(field).map(String::as_str) {
        None | Some("") => Ok(T::default()),
        Some(raw) => raw.parse().map_err(|_| DecodeError::InvalidField {
            field,
            value: raw.to_string(),
        }),
    }
}
