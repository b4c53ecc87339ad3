//! Content-addressed storage for files attached to graph nodes.
//!
//! Blob bytes are keyed by their blake3 digest and stored once, no matter
//! how many attachment records point to them. Attachment records add the
//! logical identity (file name and owning node) on top.

#[cfg(test)]
use rstest_reuse;

mod digests;
mod errors;

pub mod attachmentservice;
pub mod fixtures;

pub use digests::{B3Digest, B3_LEN};
pub use errors::Error;
