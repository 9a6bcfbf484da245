//! # Pagination
//!
//! Offset cursors for pageable queries. A cursor is the standard base64
//! encoding of `{"offset":N}` and is opaque to callers; an empty cursor
//! addresses the first page.

use base64::Engine;
use serde::Deserialize;

use crate::error::{Error, Result};

const MAX_CURSOR_LEN: usize = 1000;
const MAX_DECODED_LEN: usize = 500;

/// Unpaged query result.
pub type Collection<E> = Vec<E>;

/// One page of a pageable query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<E> {
    pub items: Vec<E>,
    /// Cursor the page was requested with.
    pub start_cursor: String,
    /// Cursor addressing the following page.
    pub end_cursor: String,
    pub has_next_page: bool,
    pub total_count: u64,
}

#[derive(Debug, Deserialize)]
struct CursorData {
    offset: u64,
}

/// Encode an offset as an opaque base64 cursor
pub fn encode_cursor(offset: u64) -> String {
    let json = format!(r#"{{"offset":{offset}}}"#);
    base64::engine::general_purpose::STANDARD.encode(json.as_bytes())
}

fn cursor_error(detail: &str) -> Error {
    Error::invalid_data(format_args!("cursor is not correct: {detail}"))
}

/// Decode a cursor into an offset, validating it on the way
pub fn decode_cursor(cursor: &str) -> Result<u64> {
    if cursor.is_empty() {
        return Ok(0);
    }

    if cursor.len() > MAX_CURSOR_LEN {
        return Err(cursor_error("cursor is too long"));
    }

    if !cursor
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '+' || c == '/' || c == '=')
    {
        return Err(cursor_error("cursor contains invalid characters"));
    }

    let decoded = base64::engine::general_purpose::STANDARD
        .decode(cursor)
        .map_err(|_| cursor_error("cursor is not valid base64"))?;

    if decoded.is_empty() || decoded.len() > MAX_DECODED_LEN {
        return Err(cursor_error("decoded cursor has invalid size"));
    }

    let json = String::from_utf8(decoded)
        .map_err(|_| cursor_error("cursor contains invalid UTF-8 data"))?;

    let data: CursorData = serde_json::from_str(&json)
        .map_err(|_| cursor_error("cursor contains invalid JSON structure"))?;

    if i64::try_from(data.offset).is_err() {
        return Err(cursor_error("offset out of range"));
    }

    Ok(data.offset)
}

/// Checks `page_size` against the lower bound and the configured maximum.
pub fn validate_page_size(page_size: u32, max_page_size: u32) -> Result<()> {
    if page_size < 1 {
        return Err(Error::invalid_data("page size cannot be smaller than 1"));
    }
    if page_size > max_page_size {
        return Err(Error::invalid_data(format_args!(
            "page size cannot be bigger than {max_page_size}"
        )));
    }
    Ok(())
}

impl<E> Page<E> {
    /// Assembles a page fetched at `offset` with `page_size`.
    pub(crate) fn assemble(
        items: Vec<E>,
        cursor: &str,
        offset: u64,
        page_size: u32,
        total_count: u64,
    ) -> Self {
        let has_next_page = offset.saturating_add(items.len() as u64) < total_count;
        Self {
            items,
            start_cursor: cursor.to_string(),
            end_cursor: encode_cursor(offset.saturating_add(u64::from(page_size))),
            has_next_page,
            total_count,
        }
    }
}
