//! Foundation types for the quorum datastore.
//!
//! This crate provides the identifier, position, and event types used
//! throughout the quorum system. Every other quorum crate depends on
//! `quorum-types`.
//!
//! # Key Types
//!
//! - [`Fqid`] — Fully-qualified identifier, a `(collection, id)` pair
//! - [`Position`] — Global monotonic commit counter, the unit of
//!   optimistic concurrency
//! - [`FieldTable`] — A model's current fields, JSON-valued
//! - [`WriteEvent`] / [`Event`] — Elementary changes, before and after
//!   a position is assigned
//! - [`WriteBatch`] — An atomic set of events committed at one position

pub mod batch;
pub mod error;
pub mod event;
pub mod fields;
pub mod fqid;
pub mod position;

pub use batch::WriteBatch;
pub use error::TypeError;
pub use event::{Event, EventKind, EventPayload, ListUpdates, WriteEvent};
pub use fields::{is_reserved_field, validate_field_name, FieldTable, META_FIELD_PREFIX};
pub use fqid::{collectionfield, validate_collection, Fqid, COLLECTIONFIELD_MAX_LEN, COLLECTION_MAX_LEN, FQID_MAX_LEN};
pub use position::{Position, PositionInfo};
