//! Fully-qualified identifiers.
//!
//! An [`Fqid`] names one model: a collection plus a numeric id, rendered
//! as `collection/id`. Fqids are assigned once and never reused; deletion
//! leaves the identity (and its event history) in place.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Maximum length of a collection name.
pub const COLLECTION_MAX_LEN: usize = 32;

/// Maximum length of a rendered fqid (`collection/id`).
pub const FQID_MAX_LEN: usize = 48;

/// Maximum length of a rendered collectionfield (`collection/field`).
pub const COLLECTIONFIELD_MAX_LEN: usize = 255;

const KEY_SEPARATOR: char = '/';

/// A fully-qualified identifier: `(collection, id)`.
///
/// Collection names are lowercase with inner underscores
/// (`[a-z]([a-z_]*[a-z])?`); ids are positive integers. Serializes as the
/// string `collection/id`, which is also the cache key and the persisted
/// event key, so the format must stay stable.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Fqid {
    collection: String,
    id: i64,
}

impl Fqid {
    /// Build an fqid from its parts, validating both.
    pub fn new(collection: &str, id: i64) -> Result<Self, TypeError> {
        validate_collection(collection)?;
        if id <= 0 {
            return Err(TypeError::InvalidFqid(format!("{collection}/{id}")));
        }
        let fqid = Self {
            collection: collection.to_string(),
            id,
        };
        let rendered_len = fqid.to_string().len();
        if rendered_len > FQID_MAX_LEN {
            return Err(TypeError::TooLong {
                what: "fqid",
                max: FQID_MAX_LEN,
                actual: rendered_len,
            });
        }
        Ok(fqid)
    }

    /// The collection part.
    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// The numeric id part.
    pub fn id(&self) -> i64 {
        self.id
    }
}

impl fmt::Display for Fqid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{KEY_SEPARATOR}{}", self.collection, self.id)
    }
}

impl fmt::Debug for Fqid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fqid({self})")
    }
}

impl FromStr for Fqid {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (collection, id) = s
            .split_once(KEY_SEPARATOR)
            .ok_or_else(|| TypeError::InvalidFqid(s.to_string()))?;
        let id: i64 = id
            .parse()
            .map_err(|_| TypeError::InvalidFqid(s.to_string()))?;
        Self::new(collection, id)
    }
}

impl TryFrom<String> for Fqid {
    type Error = TypeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Fqid> for String {
    fn from(fqid: Fqid) -> Self {
        fqid.to_string()
    }
}

/// Validate a collection name: `[a-z]([a-z_]*[a-z])?`, bounded length.
pub fn validate_collection(collection: &str) -> Result<(), TypeError> {
    if collection.is_empty() {
        return Err(TypeError::InvalidCollection(collection.to_string()));
    }
    if collection.len() > COLLECTION_MAX_LEN {
        return Err(TypeError::TooLong {
            what: "collection",
            max: COLLECTION_MAX_LEN,
            actual: collection.len(),
        });
    }
    let bytes = collection.as_bytes();
    let inner_ok = bytes.iter().all(|b| b.is_ascii_lowercase() || *b == b'_');
    let ends_ok = bytes[0].is_ascii_lowercase() && bytes[bytes.len() - 1].is_ascii_lowercase();
    if !inner_ok || !ends_ok {
        return Err(TypeError::InvalidCollection(collection.to_string()));
    }
    Ok(())
}

/// Render a collectionfield key (`collection/field`), the unit in which
/// modified fields are reported to subscribers.
pub fn collectionfield(fqid: &Fqid, field: &str) -> Result<String, TypeError> {
    let rendered = format!("{}{KEY_SEPARATOR}{field}", fqid.collection());
    if rendered.len() > COLLECTIONFIELD_MAX_LEN {
        return Err(TypeError::TooLong {
            what: "collectionfield",
            max: COLLECTIONFIELD_MAX_LEN,
            actual: rendered.len(),
        });
    }
    Ok(rendered)
}
