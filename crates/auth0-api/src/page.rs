//! Paginated response normalization
//!
//! The API returns collections in three shapes:
//!
//! - a bare array of items
//! - `{"<items>": [...], "start": 0, "length": 10, "limit": 50, "total": 14}`
//! - `{"<items>": [...], "next": "<cursor>"}`
//!
//! `parse_page` folds all three into one `Page<T>`. The items key is fixed
//! per resource ("users", "organizations", ...) and supplied by the caller.
//! Pagination fields that are absent stay `None`; they are never defaulted
//! to zero.

use serde::Serialize;
use serde::de::{DeserializeOwned, Error as _};
use serde_json::Value;

/// One page of a collection.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub length: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u64>,
    /// Checkpoint cursor to pass as `from` for the next page.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next: Option<String>,
}

impl<T> Page<T> {
    fn of(items: Vec<T>) -> Self {
        Self {
            items,
            start: None,
            length: None,
            total: None,
            limit: None,
            next: None,
        }
    }

    /// True when the server returned a checkpoint cursor.
    pub fn has_next(&self) -> bool {
        self.next.is_some()
    }
}

impl<T: DeserializeOwned> Page<T> {
    /// Parse a page whose items deserialize directly into `T`.
    pub fn from_json(payload: &str, items_key: &str) -> serde_json::Result<Self> {
        let value: Value = serde_json::from_str(payload)?;
        parse_page(value, items_key, |item| serde_json::from_value(item))
    }
}

/// Normalize any of the three wire shapes using `parse_item` for each item.
pub fn parse_page<T, F>(payload: Value, items_key: &str, mut parse_item: F) -> serde_json::Result<Page<T>>
where
    F: FnMut(Value) -> serde_json::Result<T>,
{
    match payload {
        Value::Array(items) => {
            let items = items.into_iter().map(&mut parse_item).collect::<Result<_, _>>()?;
            Ok(Page::of(items))
        }
        Value::Object(mut object) => {
            let items = match object.remove(items_key) {
                Some(Value::Array(items)) => items
                    .into_iter()
                    .map(&mut parse_item)
                    .collect::<Result<_, _>>()?,
                Some(other) => {
                    return Err(serde_json::Error::custom(format!(
                        "expected \"{items_key}\" to be an array, got {}",
                        kind_of(&other)
                    )));
                }
                None => {
                    return Err(serde_json::Error::custom(format!(
                        "missing \"{items_key}\" in paginated response"
                    )));
                }
            };

            let mut page = Page::of(items);
            page.start = count(&object, "start")?;
            page.length = count(&object, "length")?;
            page.total = count(&object, "total")?;
            page.limit = count(&object, "limit")?;
            page.next = match object.get("next") {
                None | Some(Value::Null) => None,
                Some(Value::String(cursor)) => Some(cursor.clone()),
                Some(other) => {
                    return Err(serde_json::Error::custom(format!(
                        "expected \"next\" to be a string, got {}",
                        kind_of(other)
                    )));
                }
            };
            Ok(page)
        }
        other => Err(serde_json::Error::custom(format!(
            "expected an array or object page, got {}",
            kind_of(&other)
        ))),
    }
}

fn count(object: &serde_json::Map<String, Value>, key: &str) -> serde_json::Result<Option<u64>> {
    match object.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => n.as_u64().map(Some).ok_or_else(|| {
            serde_json::Error::custom(format!("expected \"{key}\" to be a non-negative integer"))
        }),
        Some(other) => Err(serde_json::Error::custom(format!(
            "expected \"{key}\" to be a number, got {}",
            kind_of(other)
        ))),
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
