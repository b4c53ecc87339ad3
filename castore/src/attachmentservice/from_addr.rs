use std::path::PathBuf;

use url::Url;

use super::{AttachmentService, MemoryAttachmentService, SimpleFilesystemAttachmentService};
use crate::Error;

/// Constructs a new instance of an [AttachmentService] from an URI.
///
/// The following schemes are supported by the following services:
/// - `memory://` ([MemoryAttachmentService])
/// - `simplefs:///path/to/dir` ([SimpleFilesystemAttachmentService])
pub async fn from_addr(uri: &str) -> Result<Box<dyn AttachmentService>, Error> {
    let url =
        Url::parse(uri).map_err(|e| Error::StorageError(format!("unable to parse url: {}", e)))?;

    let attachment_service: Box<dyn AttachmentService> = match url.scheme() {
        "memory" => {
            // memory doesn't support host or path in the URL.
            if url.has_host() || !url.path().is_empty() {
                return Err(Error::StorageError("invalid url".to_string()));
            }
            Box::<MemoryAttachmentService>::default()
        }
        "simplefs" => {
            // simplefs needs a path, and doesn't support a host.
            if url.has_host() {
                return Err(Error::StorageError("no host allowed".to_string()));
            }

            if url.path().is_empty() {
                return Err(Error::StorageError("missing path".to_string()));
            }

            if url.path() == "/" {
                return Err(Error::StorageError(
                    "cowardly refusing to use / as attachment store".to_string(),
                ));
            }

            Box::new(SimpleFilesystemAttachmentService::new(PathBuf::from(url.path())).await?)
        }
        scheme => {
            return Err(Error::StorageError(format!("unknown scheme: {}", scheme)));
        }
    };

    Ok(attachment_service)
}
