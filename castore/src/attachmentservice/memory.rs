use std::collections::{BTreeMap, HashMap};
use std::io::Cursor;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::RwLock;
use tracing::{debug, instrument};

use super::{validate_name, Attachment, AttachmentId, AttachmentService, BlobReader};
use crate::{B3Digest, Error};

#[derive(Default)]
struct Inner {
    blobs: HashMap<B3Digest, Bytes>,
    records: BTreeMap<AttachmentId, Attachment>,
}

impl Inner {
    /// Drops the blob for `digest` if no record refers to it anymore.
    fn collect_blob(&mut self, digest: &B3Digest) {
        if !self.records.values().any(|r| &r.digest == digest) {
            self.blobs.remove(digest);
        }
    }
}

#[derive(Clone, Default)]
pub struct MemoryAttachmentService {
    db: Arc<RwLock<Inner>>,
}

#[async_trait]
impl AttachmentService for MemoryAttachmentService {
    #[instrument(skip(self, contents), fields(attachment.size = contents.len()), err)]
    async fn put(&self, name: &str, node_id: &str, contents: Bytes) -> Result<AttachmentId, Error> {
        validate_name(name)?;
        let record = Attachment::new(name, node_id, &contents);

        let mut db = self.db.write();
        if db.records.contains_key(&record.id) {
            debug!(attachment.id = %record.id, "attachment already present");
            return Ok(record.id);
        }

        db.blobs.entry(record.digest.clone()).or_insert(contents);
        let id = record.id.clone();
        db.records.insert(id.clone(), record);

        Ok(id)
    }

    async fn stat(&self, id: &AttachmentId) -> Result<Option<Attachment>, Error> {
        Ok(self.db.read().records.get(id).cloned())
    }

    #[instrument(skip(self), fields(attachment.id = %id))]
    async fn get(&self, id: &AttachmentId) -> Result<Option<Box<dyn BlobReader>>, Error> {
        let db = self.db.read();

        let Some(record) = db.records.get(id) else {
            return Ok(None);
        };

        match db.blobs.get(&record.digest) {
            Some(contents) => Ok(Some(Box::new(Cursor::new(contents.clone())))),
            None => Err(Error::StorageError(format!(
                "blob {} for attachment {} is missing",
                record.digest, id
            ))),
        }
    }

    async fn list(&self) -> Result<Vec<Attachment>, Error> {
        Ok(self.db.read().records.values().cloned().collect())
    }

    #[instrument(skip(self))]
    async fn delete_all(&self) -> Result<(), Error> {
        let mut db = self.db.write();
        db.records.clear();
        db.blobs.clear();
        Ok(())
    }

    #[instrument(skip(self), fields(attachment.id = %id), err)]
    async fn delete_one(&self, id: &AttachmentId) -> Result<(), Error> {
        let mut db = self.db.write();
        let record = db
            .records
            .remove(id)
            .ok_or_else(|| Error::InvalidRequest(format!("attachment not found: {}", id)))?;
        db.collect_blob(&record.digest);
        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete_by_node_id(&self, node_id: &str) -> Result<(), Error> {
        let mut db = self.db.write();
        let removed: Vec<Attachment> = {
            let ids: Vec<AttachmentId> = db
                .records
                .values()
                .filter(|r| r.node_id == node_id)
                .map(|r| r.id.clone())
                .collect();
            ids.iter().filter_map(|id| db.records.remove(id)).collect()
        };

        for record in &removed {
            db.collect_blob(&record.digest);
        }
        debug!(count = removed.len(), "removed attachments of node");
        Ok(())
    }
}
