//! This contains test scenarios that a given [AttachmentService] needs to pass.
//! We use [rstest] and [rstest_reuse] to provide all services we want to test
//! against, and then apply this template to all test functions.

use rstest::*;
use rstest_reuse::{self, *};
use tokio::io::AsyncReadExt;

use super::{AttachmentId, AttachmentService};
use crate::attachmentservice::{self, MemoryAttachmentService, SimpleFilesystemAttachmentService};
use crate::fixtures::{BLOB_A, BLOB_A_DIGEST, BLOB_B, HELLOWORLD_BLOB_CONTENTS, TFVARS_BLOB};

async fn make_simplefs() -> SimpleFilesystemAttachmentService {
    // The directory is leaked on purpose, it has to outlive the service.
    let tmpdir = tempfile::TempDir::new().unwrap().into_path();
    SimpleFilesystemAttachmentService::new(tmpdir).await.unwrap()
}

/// This produces a template, which will be applied to all individual test functions.
/// See https://github.com/la10736/rstest/issues/130#issuecomment-968864832
#[template]
#[rstest]
#[case::memory(Box::<MemoryAttachmentService>::default() as Box<dyn AttachmentService>)]
#[case::memory_from_addr(attachmentservice::from_addr("memory://").await.unwrap())]
#[case::simplefs(Box::new(make_simplefs().await) as Box<dyn AttachmentService>)]
pub fn attachment_services(#[case] attachment_service: Box<dyn AttachmentService>) {}

async fn read_all(svc: &dyn AttachmentService, id: &AttachmentId) -> Vec<u8> {
    let mut r = svc
        .get(id)
        .await
        .expect("get must succeed")
        .expect("must be some");
    let mut buf = Vec::new();
    r.read_to_end(&mut buf).await.expect("read must succeed");
    buf
}

/// Trying to read a non-existing attachment should return None.
#[apply(attachment_services)]
#[tokio::test]
async fn not_found_read(attachment_service: Box<dyn AttachmentService>) {
    assert!(attachment_service
        .get(&AttachmentId::from("doesnotexist"))
        .await
        .expect("must not fail")
        .is_none())
}

/// Put a few attachments in the store, and get them back.
#[apply(attachment_services)]
#[tokio::test]
async fn put_get(attachment_service: Box<dyn AttachmentService>) {
    for (name, contents) in [("a.bin", &*BLOB_A), ("b.bin", &*BLOB_B)] {
        let id = attachment_service
            .put(name, "node-1", contents.clone())
            .await
            .expect("put must succeed");

        assert_eq!(&contents[..], &read_all(&*attachment_service, &id).await[..]);

        let record = attachment_service
            .stat(&id)
            .await
            .expect("stat must succeed")
            .expect("must be some");
        assert_eq!(name, record.name);
        assert_eq!("node-1", record.node_id);
        assert_eq!(contents.len() as u64, record.size);
        assert!(!record.is_text);
    }

    let id = attachment_service
        .put("vars.tfvars", "node-1", TFVARS_BLOB.clone())
        .await
        .unwrap();
    let record = attachment_service.stat(&id).await.unwrap().unwrap();
    assert!(record.is_text, "small utf-8 file must be detected as text");
}

/// Uploading the same file for the same node twice returns the same id
/// without creating a second record.
#[apply(attachment_services)]
#[tokio::test]
async fn put_deduplicates(attachment_service: Box<dyn AttachmentService>) {
    let first = attachment_service
        .put("a.bin", "node-1", BLOB_A.clone())
        .await
        .unwrap();
    let second = attachment_service
        .put("a.bin", "node-1", BLOB_A.clone())
        .await
        .unwrap();
    assert_eq!(first, second);

    // same bytes, different node: new record, same digest.
    let other = attachment_service
        .put("a.bin", "node-2", BLOB_A.clone())
        .await
        .unwrap();
    assert_ne!(first, other);

    let records = attachment_service.list().await.unwrap();
    assert_eq!(2, records.len());
    assert!(records.iter().all(|r| r.digest == *BLOB_A_DIGEST));
}

/// Deleting one record keeps the blob alive for other records pointing to it.
#[apply(attachment_services)]
#[tokio::test]
async fn delete_one_keeps_shared_blob(attachment_service: Box<dyn AttachmentService>) {
    let first = attachment_service
        .put("a.bin", "node-1", BLOB_A.clone())
        .await
        .unwrap();
    let second = attachment_service
        .put("a.bin", "node-2", BLOB_A.clone())
        .await
        .unwrap();

    attachment_service.delete_one(&first).await.unwrap();
    assert!(attachment_service.get(&first).await.unwrap().is_none());
    assert_eq!(&BLOB_A[..], &read_all(&*attachment_service, &second).await[..]);

    assert!(
        attachment_service.delete_one(&first).await.is_err(),
        "deleting an unknown id must fail"
    );
}

#[apply(attachment_services)]
#[tokio::test]
async fn delete_by_node_id(attachment_service: Box<dyn AttachmentService>) {
    attachment_service
        .put("a.bin", "node-1", BLOB_A.clone())
        .await
        .unwrap();
    attachment_service
        .put("hello.txt", "node-1", HELLOWORLD_BLOB_CONTENTS.into())
        .await
        .unwrap();
    let kept = attachment_service
        .put("b.bin", "node-2", BLOB_B.clone())
        .await
        .unwrap();

    attachment_service.delete_by_node_id("node-1").await.unwrap();

    let records = attachment_service.list().await.unwrap();
    assert_eq!(1, records.len());
    assert_eq!(kept, records[0].id);
}

#[apply(attachment_services)]
#[tokio::test]
async fn delete_all(attachment_service: Box<dyn AttachmentService>) {
    let id = attachment_service
        .put("a.bin", "node-1", BLOB_A.clone())
        .await
        .unwrap();

    attachment_service.delete_all().await.unwrap();

    assert!(attachment_service.list().await.unwrap().is_empty());
    assert!(attachment_service.get(&id).await.unwrap().is_none());
}

#[apply(attachment_services)]
#[tokio::test]
async fn invalid_names_rejected(attachment_service: Box<dyn AttachmentService>) {
    for name in ["", "..", "dir/file"] {
        assert!(
            attachment_service
                .put(name, "node-1", BLOB_A.clone())
                .await
                .is_err(),
            "{:?} must be rejected",
            name
        );
    }
}
