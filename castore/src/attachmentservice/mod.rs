use std::io;

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::{B3Digest, Error};

mod from_addr;
mod memory;
mod simplefs;

#[cfg(test)]
mod tests;

pub use self::from_addr::from_addr;
pub use self::memory::MemoryAttachmentService;
pub use self::simplefs::SimpleFilesystemAttachmentService;

/// Files at or above this size are never sniffed for text content.
pub const TEXT_SNIFF_LIMIT: usize = 1024 * 1024;

/// Identifies one attachment record.
///
/// It is derived from the owning node, the file name and the content digest,
/// so uploading identical bytes under the same name for the same node yields
/// the same id.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AttachmentId(String);

impl AttachmentId {
    pub fn derive(node_id: &str, name: &str, digest: &B3Digest) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(node_id.as_bytes());
        hasher.update(&[0]);
        hasher.update(name.as_bytes());
        hasher.update(&[0]);
        hasher.update(digest.as_slice());
        Self(B3Digest::from(hasher.finalize()).to_hex())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for AttachmentId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for AttachmentId {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

impl std::fmt::Display for AttachmentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Metadata kept for every uploaded file.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    pub id: AttachmentId,
    pub name: String,
    pub node_id: String,
    pub digest: B3Digest,
    pub size: u64,
    pub is_text: bool,
}

impl Attachment {
    /// Builds the record for `contents` uploaded as `name` for `node_id`.
    pub fn new(name: &str, node_id: &str, contents: &[u8]) -> Self {
        let digest = B3Digest::of(contents);
        Self {
            id: AttachmentId::derive(node_id, name, &digest),
            name: name.to_owned(),
            node_id: node_id.to_owned(),
            digest,
            size: contents.len() as u64,
            is_text: sniff_text(contents),
        }
    }
}

/// Small files that are valid UTF-8 without NUL bytes count as text.
pub fn sniff_text(contents: &[u8]) -> bool {
    contents.len() < TEXT_SNIFF_LIMIT
        && !contents.contains(&0)
        && std::str::from_utf8(contents).is_ok()
}

/// Rejects names that can't be placed as a single file inside a folder.
pub fn validate_name(name: &str) -> Result<(), Error> {
    if name.is_empty() || name == "." || name == ".." || name.contains(['/', '\\', '\0']) {
        return Err(Error::InvalidRequest(format!(
            "invalid attachment name: {:?}",
            name
        )));
    }
    Ok(())
}

/// The base trait all attachment stores need to implement.
///
/// Blob contents are deduplicated by their blake3 digest. Records are
/// deduplicated by [AttachmentId].
#[async_trait]
pub trait AttachmentService: Send + Sync {
    /// Stores `contents` as the file `name` attached to `node_id`.
    /// Returns the id of the existing record if the same file was already
    /// uploaded for that node.
    async fn put(&self, name: &str, node_id: &str, contents: Bytes) -> Result<AttachmentId, Error>;

    /// Looks up the record for the given id.
    async fn stat(&self, id: &AttachmentId) -> Result<Option<Attachment>, Error>;

    /// Opens the contents of an attachment, or returns None if there's no
    /// such attachment.
    async fn get(&self, id: &AttachmentId) -> Result<Option<Box<dyn BlobReader>>, Error>;

    /// Lists all attachment records, ordered by id.
    async fn list(&self) -> Result<Vec<Attachment>, Error>;

    /// Removes every record and blob.
    async fn delete_all(&self) -> Result<(), Error>;

    /// Removes a single record. Fails if the id is unknown.
    async fn delete_one(&self, id: &AttachmentId) -> Result<(), Error>;

    /// Removes all records attached to the given node.
    async fn delete_by_node_id(&self, node_id: &str) -> Result<(), Error>;
}

#[async_trait]
impl<A> AttachmentService for A
where
    A: AsRef<dyn AttachmentService> + Send + Sync,
{
    async fn put(&self, name: &str, node_id: &str, contents: Bytes) -> Result<AttachmentId, Error> {
        self.as_ref().put(name, node_id, contents).await
    }

    async fn stat(&self, id: &AttachmentId) -> Result<Option<Attachment>, Error> {
        self.as_ref().stat(id).await
    }

    async fn get(&self, id: &AttachmentId) -> Result<Option<Box<dyn BlobReader>>, Error> {
        self.as_ref().get(id).await
    }

    async fn list(&self) -> Result<Vec<Attachment>, Error> {
        self.as_ref().list().await
    }

    async fn delete_all(&self) -> Result<(), Error> {
        self.as_ref().delete_all().await
    }

    async fn delete_one(&self, id: &AttachmentId) -> Result<(), Error> {
        self.as_ref().delete_one(id).await
    }

    async fn delete_by_node_id(&self, node_id: &str) -> Result<(), Error> {
        self.as_ref().delete_by_node_id(node_id).await
    }
}

/// BlobReader is a [tokio::io::AsyncRead] over the contents of an attachment.
pub trait BlobReader: tokio::io::AsyncRead + Send + Unpin + 'static {}

impl BlobReader for io::Cursor<&'static [u8]> {}
impl BlobReader for io::Cursor<Vec<u8>> {}
impl BlobReader for io::Cursor<Bytes> {}
impl BlobReader for tokio::fs::File {}
