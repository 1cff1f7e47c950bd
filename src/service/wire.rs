//! Wire frames for the filter service.
//!
//! The protocol is newline-delimited JSON over TCP: each request is one
//! serialized [`Request`] followed by `\n`, answered by exactly one
//! serialized [`Response`] line. Malformed frames produce an error
//! response and leave the connection open; EOF ends the session.

use std::io::{BufRead, Write};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{Error, ErrorKind, Result};
use crate::item::Item;

/// A request frame, tagged by operation name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Request {
    /// Admit an item into the filter.
    InsertItem {
        /// The item to admit.
        item: Item,
    },
    /// Read the highest-scored item.
    GetMaxItem,
    /// Read the lowest-scored item.
    GetMinItem,
    /// Remove the highest-scored item.
    RemoveMaxItem,
    /// Remove the lowest-scored item.
    RemoveMinItem,
    /// Read the current item count.
    GetSize,
    /// Drop all items.
    Clear,
}

impl Request {
    /// Operation name as it appears on the wire and in log lines.
    #[must_use]
    pub const fn op(&self) -> &'static str {
        match self {
            Self::InsertItem { .. } => "insert_item",
            Self::GetMaxItem => "get_max_item",
            Self::GetMinItem => "get_min_item",
            Self::RemoveMaxItem => "remove_max_item",
            Self::RemoveMinItem => "remove_min_item",
            Self::GetSize => "get_size",
            Self::Clear => "clear",
        }
    }
}

/// A response frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Response {
    /// The operation succeeded; at most one payload field is set.
    Success {
        /// Item payload for get/remove operations.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        item: Option<Item>,
        /// Size payload for `get_size`.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        size: Option<u64>,
    },
    /// The operation failed.
    Error {
        /// The error kind, one of the names in [`ErrorKind::as_str`].
        kind: String,
        /// Human-readable detail.
        message: String,
    },
}

impl Response {
    /// A success frame with no payload (insert, clear).
    #[must_use]
    pub const fn success() -> Self {
        Self::Success {
            item: None,
            size: None,
        }
    }

    /// A success frame carrying an item.
    #[must_use]
    pub const fn with_item(item: Item) -> Self {
        Self::Success {
            item: Some(item),
            size: None,
        }
    }

    /// A success frame carrying a size.
    #[must_use]
    pub const fn with_size(size: u64) -> Self {
        Self::Success {
            item: None,
            size: Some(size),
        }
    }

    /// An error frame mirroring a core error.
    #[must_use]
    pub fn from_error(err: &Error) -> Self {
        Self::Error {
            kind: err.kind().as_str().to_string(),
            message: err.message().unwrap_or_default().to_string(),
        }
    }

    /// Converts an error frame back into a typed [`Error`]; success
    /// frames pass through.
    pub fn into_result(self) -> Result<Self> {
        match self {
            Self::Error { kind, message } => {
                let kind = kind.parse::<ErrorKind>().unwrap_or(ErrorKind::Internal);
                Err(Error::new(kind).with_message(message))
            }
            success => Ok(success),
        }
    }

    /// Short form for log lines: the payload without the item bytes.
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Self::Success { item: Some(item), .. } => format!("item(score={})", item.score),
            Self::Success { size: Some(size), .. } => format!("size={size}"),
            Self::Success { .. } => "ok".to_string(),
            Self::Error { kind, .. } => format!("error({kind})"),
        }
    }
}

/// Writes one frame and a newline, then flushes.
pub fn write_frame<W: Write, T: Serialize>(writer: &mut W, frame: &T) -> Result<()> {
    serde_json::to_writer(&mut *writer, frame)?;
    writer.write_all(b"\n")?;
    writer.flush()?;
    Ok(())
}

/// Reads one frame. Returns `Ok(None)` on a clean EOF.
pub fn read_frame<R: BufRead, T: DeserializeOwned>(reader: &mut R) -> Result<Option<T>> {
    let mut line = String::new();
    if reader.read_line(&mut line)? == 0 {
        return Ok(None);
    }
    let frame = serde_json::from_str(line.trim_end())?;
    Ok(Some(frame))
}
