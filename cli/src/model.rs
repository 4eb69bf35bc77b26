//! Canonical record shapes.
//!
//! The backend is inconsistent about field names (`id` vs `_id`, `username` vs
//! `Username`, `createdBy` vs `Created_By`) and about envelopes (a bare array,
//! `{result: [...]}`, `{books: [...]}`). Everything is normalized here, once,
//! so the rest of the crate only ever sees one shape per entity.

use serde::Serialize;
use serde_json::{Map, Value};

const ID_KEYS: &[&str] = &["id", "_id"];
const USER_ID_KEYS: &[&str] = &["userId", "_id", "id"];
const USERNAME_KEYS: &[&str] = &["username", "Username"];
const CREATOR_KEYS: &[&str] = &["createdBy", "Created_By", "created_by"];

/// Reads the first of `keys` holding a non-empty string or a number, as a string.
///
/// Numbers are stringified so ids compare the same whichever way they were encoded.
pub fn first_string(value: &Value, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| match value.get(key)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

fn opt_string(value: &Value, key: &str) -> Option<String> {
    first_string(value, &[key])
}

/// Pulls the list out of a response that is either a bare array or an object
/// wrapping it under one of `keys`. Anything else yields an empty list.
pub fn items(value: &Value, keys: &[&str]) -> Vec<Value> {
    if let Some(list) = value.as_array() {
        return list.clone();
    }
    keys.iter()
        .find_map(|key| value.get(key).and_then(Value::as_array))
        .cloned()
        .unwrap_or_default()
}

/// Unwraps `{<key>: {...}}` envelopes, returning the payload itself when absent.
pub fn entity(value: &Value, key: &str) -> Value {
    match value.get(key) {
        Some(inner) if inner.is_object() => inner.clone(),
        _ => value.clone(),
    }
}

/// Who created a library or book.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Default)]
pub struct Creator {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

impl Creator {
    pub fn from_value(value: &Value) -> Option<Self> {
        if !value.is_object() {
            return None;
        }
        Some(Self {
            id: first_string(value, ID_KEYS),
            username: first_string(value, USERNAME_KEYS),
        })
    }

    fn of(record: &Value) -> Option<Self> {
        CREATOR_KEYS
            .iter()
            .find_map(|key| record.get(key))
            .and_then(Self::from_value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Library {
    pub id: String,
    pub name: String,
    pub address: String,
    pub category: Option<String>,
    pub created_by: Option<Creator>,
}

impl Library {
    pub fn from_value(value: &Value) -> Option<Self> {
        if !value.is_object() {
            return None;
        }
        Some(Self {
            id: first_string(value, ID_KEYS).unwrap_or_default(),
            name: opt_string(value, "name").unwrap_or_default(),
            address: opt_string(value, "address").unwrap_or_default(),
            category: opt_string(value, "category"),
            created_by: Creator::of(value),
        })
    }

    /// Normalizes every library in a `GET /libraries` style response.
    pub fn list(response: &Value) -> Vec<Self> {
        items(response, &["result", "libraries"])
            .iter()
            .filter_map(Self::from_value)
            .collect()
    }
}

/// The library a book sits in. The backend sends either an id or a populated object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LibraryRef {
    pub id: String,
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Book {
    pub id: String,
    pub name: String,
    pub category: String,
    pub image: Option<String>,
    pub author: Option<String>,
    pub library: Option<LibraryRef>,
    pub created_by: Option<Creator>,
    pub pdf_link: Option<String>,
}

impl Book {
    pub fn from_value(value: &Value) -> Option<Self> {
        if !value.is_object() {
            return None;
        }
        let library = match value.get("library") {
            Some(Value::String(id)) if !id.is_empty() => Some(LibraryRef {
                id: id.clone(),
                name: None,
            }),
            Some(lib @ Value::Object(_)) => Some(LibraryRef {
                id: first_string(lib, ID_KEYS).unwrap_or_default(),
                name: opt_string(lib, "name"),
            }),
            _ => None,
        };
        Some(Self {
            id: first_string(value, ID_KEYS).unwrap_or_default(),
            name: opt_string(value, "name").unwrap_or_default(),
            category: opt_string(value, "category").unwrap_or_default(),
            image: opt_string(value, "image"),
            author: opt_string(value, "author"),
            library,
            created_by: Creator::of(value),
            pdf_link: first_string(value, &["pdfLink", "pdf_link"]),
        })
    }

    /// Normalizes every book in a `GET /books` or `GET /libraries/:id/books` response.
    pub fn list(response: &Value) -> Vec<Self> {
        items(response, &["result", "books"])
            .iter()
            .filter_map(Self::from_value)
            .collect()
    }
}

/// Identity derived from the session: a cached user object or the token claims.
///
/// Only good for display and for picking ids to send; nothing here is verified.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CurrentUser {
    pub id: Option<String>,
    pub username: Option<String>,
    pub claims: Map<String, Value>,
}

impl CurrentUser {
    pub fn from_value(value: Value) -> Option<Self> {
        let id = first_string(&value, USER_ID_KEYS);
        let username = first_string(&value, USERNAME_KEYS);
        let Value::Object(claims) = value else {
            return None;
        };
        Some(Self {
            id,
            username,
            claims,
        })
    }

    pub fn display_name(&self) -> &str {
        self.username.as_deref().unwrap_or("unknown")
    }
}
