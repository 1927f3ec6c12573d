//! Protocol-boundary helpers.
//!
//! This module converts between editor-facing and protocol-facing values:
//! file paths to `file://` URIs, 1-based editor coordinates to 0-based LSP
//! positions, and raw call-hierarchy records to the tagged [`CallRecord`].

use std::path::Path;

use lsp_types::{CallHierarchyIncomingCall, CallHierarchyOutgoingCall, Position, Url};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::error::LspError;

use super::LspResult;

/// Converts a path to an LSP file:// URI.
///
/// Relative paths are resolved against the current directory and the result
/// is canonicalized so symlinked workspaces map to the URI the server sees.
/// ## Errors
/// Returns [`LspError::DocumentNotFound`] if the path does not exist or has
/// no file URI form.
pub fn path_to_url(path: &Path) -> LspResult<Url> {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map_err(|e| {
                LspError::DocumentNotFound(format!("failed to get current directory: {e}"))
            })?
            .join(path)
    };

    let canonical = absolute.canonicalize().map_err(|e| {
        LspError::DocumentNotFound(format!(
            "failed to canonicalize path '{}': {}",
            path.display(),
            e
        ))
    })?;

    Url::from_file_path(&canonical)
        .map_err(|()| LspError::DocumentNotFound(format!("invalid path: {}", canonical.display())))
}

/// Converts user-facing 1-indexed position to LSP 0-indexed position.
///
/// # Errors
///
/// Returns [`LspError::InvalidPosition`] if line or character is 0; values
/// are never clamped.
pub fn to_lsp_position(line: u32, character: u32) -> LspResult<Position> {
    if line == 0 || character == 0 {
        return Err(LspError::InvalidPosition { line, character });
    }
    Ok(Position {
        line: line - 1,
        character: character - 1,
    })
}

/// Direction of a call-hierarchy query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallDirection {
    /// Callers of the prepared item.
    Incoming,
    /// Callees of the prepared item.
    Outgoing,
}

impl std::fmt::Display for CallDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Incoming => f.write_str("incoming"),
            Self::Outgoing => f.write_str("outgoing"),
        }
    }
}

/// One edge of the call hierarchy, tagged by its direction.
///
/// Serializes as the protocol record plus a `kind` field, e.g.
/// `{"kind":"incoming","from":{..},"fromRanges":[..]}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum CallRecord {
    /// A caller: carries `from`.
    Incoming(CallHierarchyIncomingCall),
    /// A callee: carries `to`.
    Outgoing(CallHierarchyOutgoingCall),
}

impl CallRecord {
    /// Returns the direction this record belongs to.
    pub fn direction(&self) -> CallDirection {
        match self {
            Self::Incoming(_) => CallDirection::Incoming,
            Self::Outgoing(_) => CallDirection::Outgoing,
        }
    }

    /// Decodes one raw record by its structural shape.
    ///
    /// `null` and records carrying neither a decodable `from` nor `to` yield
    /// `None`.
    pub fn decode(raw: Value) -> Option<Self> {
        let Value::Object(map) = &raw else {
            if !raw.is_null() {
                warn!(record = %raw, "dropping non-object call hierarchy record");
            }
            return None;
        };

        let decoded = if map.contains_key("from") {
            serde_json::from_value(raw.clone()).map(Self::Incoming)
        } else if map.contains_key("to") {
            serde_json::from_value(raw.clone()).map(Self::Outgoing)
        } else {
            warn!(record = %raw, "dropping call hierarchy record without from/to");
            return None;
        };

        match decoded {
            Ok(record) => Some(record),
            Err(e) => {
                warn!(error = %e, "dropping malformed call hierarchy record");
                None
            }
        }
    }
}

/// Decodes a raw `callHierarchy/*Calls` response, keeping gaps as `None`.
pub fn decode_call_records(raw: Option<Vec<Value>>) -> Vec<Option<CallRecord>> {
    raw.unwrap_or_default()
        .into_iter()
        .map(CallRecord::decode)
        .collect()
}
