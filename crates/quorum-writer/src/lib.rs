//! Write service of the quorum datastore.
//!
//! - [`Writer`] — the locked, position-checked commit pipeline:
//!   acquire locks → resolve expected positions → commit → write-through
//!   cache update → notify → release
//! - [`WriteRequest`] — user, information blob, events, and the client's
//!   expected positions
//! - [`ChangeNotifier`] / [`WriteNotification`] — broadcast of modified
//!   collectionfields per committed position
//!
//! Writes are atomic and totally ordered by the store; the writer adds
//! the serialization of overlapping requests and the cache/subscriber
//! bookkeeping around each commit. Conflicts and busy locks surface to
//! the caller as recoverable errors, never as silent retries.

pub mod error;
pub mod notify;
pub mod request;
pub mod service;

pub use error::{WriterError, WriterResult};
pub use notify::{ChangeNotifier, WriteNotification};
pub use request::WriteRequest;
pub use service::{Writer, WriterConfig};
