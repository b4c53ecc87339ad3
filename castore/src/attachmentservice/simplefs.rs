use std::{
    io,
    path::{Path, PathBuf},
};

use async_trait::async_trait;
use bytes::Bytes;
use tracing::{debug, instrument, warn};

use super::{validate_name, Attachment, AttachmentId, AttachmentService, BlobReader};
use crate::{B3Digest, Error};

/// Stores attachments in a directory on a POSIX-compliant filesystem.
///
/// It takes an existing path and builds `tmp`, `blobs` and `records`
/// directories inside of it. Writes are staged in `tmp`, then moved
/// atomically into place:
/// - blob contents go to `blobs/B3DIGEST[:2]/B3DIGEST` in a sharding style,
///   e.g. `abcdef` gets turned into `ab/abcdef`,
/// - attachment records go to `records/ID.json`.
///
/// **Disclaimer**: the on-disk format is subject to change.
#[derive(Clone)]
pub struct SimpleFilesystemAttachmentService {
    /// Where the store lives on an already mounted filesystem.
    path: PathBuf,
}

impl SimpleFilesystemAttachmentService {
    pub async fn new(path: PathBuf) -> io::Result<Self> {
        tokio::fs::create_dir_all(&path).await?;
        tokio::fs::create_dir_all(path.join("tmp")).await?;
        tokio::fs::create_dir_all(path.join("blobs")).await?;
        tokio::fs::create_dir_all(path.join("records")).await?;

        Ok(Self { path })
    }

    fn record_path(&self, id: &AttachmentId) -> PathBuf {
        self.path.join("records").join(format!("{}.json", id))
    }

    /// Writes `contents` to `dst` by staging it in `tmp` first.
    async fn write_atomic(&self, dst: &Path, contents: &[u8]) -> io::Result<()> {
        let staging = self.path.join("tmp").join(uuid::Uuid::new_v4().to_string());
        tokio::fs::write(&staging, contents).await?;
        if let Some(parent) = dst.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::rename(&staging, dst).await
    }

    async fn read_record(&self, id: &AttachmentId) -> Result<Option<Attachment>, Error> {
        match tokio::fs::read(self.record_path(id)).await {
            Ok(buf) => Ok(Some(serde_json::from_slice(&buf)?)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn remove_record(&self, record: &Attachment) -> Result<(), Error> {
        tokio::fs::remove_file(self.record_path(&record.id)).await?;
        self.collect_blob(&record.digest).await
    }

    /// Removes the blob for `digest` if no record refers to it anymore.
    async fn collect_blob(&self, digest: &B3Digest) -> Result<(), Error> {
        if self.list().await?.iter().any(|r| &r.digest == digest) {
            return Ok(());
        }

        match tokio::fs::remove_file(derive_path(&self.path, digest)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                warn!(blob.digest = %digest, "blob already gone");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}

fn derive_path(root: &Path, digest: &B3Digest) -> PathBuf {
    let pathname = digest.to_hex();
    root.join("blobs").join(&pathname[..2]).join(pathname)
}

#[async_trait]
impl AttachmentService for SimpleFilesystemAttachmentService {
    #[instrument(skip(self, contents), fields(attachment.size = contents.len()), err)]
    async fn put(&self, name: &str, node_id: &str, contents: Bytes) -> Result<AttachmentId, Error> {
        validate_name(name)?;
        let record = Attachment::new(name, node_id, &contents);

        if self.read_record(&record.id).await?.is_some() {
            debug!(attachment.id = %record.id, "attachment already present");
            return Ok(record.id);
        }

        let blob_path = derive_path(&self.path, &record.digest);
        if !tokio::fs::try_exists(&blob_path).await? {
            self.write_atomic(&blob_path, &contents).await?;
        }

        self.write_atomic(&self.record_path(&record.id), &serde_json::to_vec(&record)?)
            .await?;

        Ok(record.id)
    }

    async fn stat(&self, id: &AttachmentId) -> Result<Option<Attachment>, Error> {
        self.read_record(id).await
    }

    #[instrument(skip(self), fields(attachment.id = %id), err)]
    async fn get(&self, id: &AttachmentId) -> Result<Option<Box<dyn BlobReader>>, Error> {
        let Some(record) = self.read_record(id).await? else {
            return Ok(None);
        };

        match tokio::fs::File::open(derive_path(&self.path, &record.digest)).await {
            Ok(file) => Ok(Some(Box::new(file))),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Err(Error::StorageError(format!(
                "blob {} for attachment {} is missing",
                record.digest, id
            ))),
            Err(e) => Err(e.into()),
        }
    }

    async fn list(&self) -> Result<Vec<Attachment>, Error> {
        let mut records = Vec::new();
        let mut entries = tokio::fs::read_dir(self.path.join("records")).await?;
        while let Some(entry) = entries.next_entry().await? {
            if entry.path().extension().is_some_and(|ext| ext == "json") {
                let buf = tokio::fs::read(entry.path()).await?;
                records.push(serde_json::from_slice::<Attachment>(&buf)?);
            }
        }
        records.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(records)
    }

    #[instrument(skip(self), err)]
    async fn delete_all(&self) -> Result<(), Error> {
        for dir in ["blobs", "records"] {
            let dir = self.path.join(dir);
            tokio::fs::remove_dir_all(&dir).await?;
            tokio::fs::create_dir_all(&dir).await?;
        }
        Ok(())
    }

    #[instrument(skip(self), fields(attachment.id = %id), err)]
    async fn delete_one(&self, id: &AttachmentId) -> Result<(), Error> {
        let record = self
            .read_record(id)
            .await?
            .ok_or_else(|| Error::InvalidRequest(format!("attachment not found: {}", id)))?;
        self.remove_record(&record).await
    }

    #[instrument(skip(self), err)]
    async fn delete_by_node_id(&self, node_id: &str) -> Result<(), Error> {
        for record in self.list().await? {
            if record.node_id == node_id {
                self.remove_record(&record).await?;
            }
        }
        Ok(())
    }
}
