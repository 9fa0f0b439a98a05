//! Attachment ingestion.
//!
//! An accepted attachment is downloaded into a scoped temporary file under
//! `<temp_dir>/<kind>/`, converted into a model part, and the temporary file
//! is removed when the scope ends, whatever the outcome.

use crate::descriptor::AttachmentDescriptor;
use crate::error::Rejection;
use crate::fetch::Fetcher;
use crate::media::{MediaKind, MediaType};
use async_trait::async_trait;
use chat_relay_ai::{FileUploader, Part};
use chat_relay_core::ContextScope;
use serde::Deserialize;
use std::path::PathBuf;
use tempfile::{NamedTempFile, TempPath};
use tracing::{debug, instrument, warn};

/// Configuration for attachment ingestion.
#[derive(Debug, Clone, Deserialize)]
pub struct AttachmentConfig {
    /// Root directory for temporary downloads.
    #[serde(default = "default_temp_dir")]
    pub temp_dir: PathBuf,
}

fn default_temp_dir() -> PathBuf {
    PathBuf::from("temp")
}

impl Default for AttachmentConfig {
    fn default() -> Self {
        Self {
            temp_dir: default_temp_dir(),
        }
    }
}

/// Converts an attachment into a model part.
#[async_trait]
pub trait Ingest: Send + Sync {
    /// Ingests one attachment for a message posted in `scope`.
    ///
    /// # Errors
    ///
    /// Returns a [`Rejection`] if the attachment is not accepted in this
    /// scope or could not be processed.
    async fn ingest(
        &self,
        descriptor: &AttachmentDescriptor,
        scope: ContextScope,
    ) -> Result<Part, Rejection>;
}

/// The attachment pipeline: classify, gate, fetch, convert.
pub struct AttachmentIngestor<F, U> {
    fetcher: F,
    uploader: U,
    temp_dir: PathBuf,
}

impl<F, U> AttachmentIngestor<F, U>
where
    F: Fetcher,
    U: FileUploader,
{
    /// Creates an ingestor.
    pub fn new(fetcher: F, uploader: U, config: AttachmentConfig) -> Self {
        Self {
            fetcher,
            uploader,
            temp_dir: config.temp_dir,
        }
    }

    /// Reserves a uniquely named temporary path for an attachment of `kind`.
    ///
    /// The file is deleted when the returned path is dropped. Creating it is
    /// blocking filesystem work and runs on the blocking pool.
    async fn scratch_path(&self, kind: MediaKind, filename: &str) -> std::io::Result<TempPath> {
        let dir = self.temp_dir.join(kind.dir_name());
        let suffix = format!("-{}", sanitize(filename));

        tokio::task::spawn_blocking(move || {
            std::fs::create_dir_all(&dir)?;
            tempfile::Builder::new()
                .prefix("att-")
                .suffix(&suffix)
                .tempfile_in(&dir)
                .map(NamedTempFile::into_temp_path)
        })
        .await
        .map_err(std::io::Error::other)?
    }

    async fn convert(
        &self,
        media: MediaType,
        descriptor: &AttachmentDescriptor,
        scratch: &TempPath,
    ) -> Result<Part, String> {
        self.fetcher
            .fetch(&descriptor.url, scratch)
            .await
            .map_err(|e| e.to_string())?;

        match media.kind() {
            MediaKind::Image => {
                let data = tokio::fs::read(scratch).await.map_err(|e| e.to_string())?;
                Ok(Part::inline(media.mime(), data))
            }
            MediaKind::Document => {
                let uploaded = self
                    .uploader
                    .upload(scratch, media.mime(), &descriptor.filename)
                    .await
                    .map_err(|e| e.to_string())?;
                Ok(Part::file(uploaded.mime_type, uploaded.uri))
            }
        }
    }
}

#[async_trait]
impl<F, U> Ingest for AttachmentIngestor<F, U>
where
    F: Fetcher,
    U: FileUploader,
{
    #[instrument(skip(self, descriptor), fields(filename = %descriptor.filename))]
    async fn ingest(
        &self,
        descriptor: &AttachmentDescriptor,
        scope: ContextScope,
    ) -> Result<Part, Rejection> {
        let filename = descriptor.filename.clone();

        let Some(media) = MediaType::classify(descriptor) else {
            debug!("unsupported attachment format");
            return Err(Rejection::UnsupportedFormat { filename });
        };

        if media.requires_thread() && !scope.is_thread() {
            debug!(%media, "attachment requires a thread");
            return Err(Rejection::RequiresThread { filename });
        }

        let scratch = self
            .scratch_path(media.kind(), &filename)
            .await
            .map_err(|e| Rejection::Io {
                filename: filename.clone(),
                reason: e.to_string(),
            })?;

        let result = self.convert(media, descriptor, &scratch).await;

        if let Err(e) = scratch.close() {
            warn!(error = %e, "failed to remove temporary attachment");
        }

        result.map_err(|reason| {
            warn!(%reason, "attachment processing failed");
            Rejection::Io { filename, reason }
        })
    }
}

/// Reduces a platform filename to a safe path suffix.
fn sanitize(filename: &str) -> String {
    let base = filename.rsplit(['/', '\\']).next().unwrap_or_default();
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .take(64)
        .collect();
    if cleaned.is_empty() {
        "attachment".to_string()
    } else {
        cleaned
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FetchError;
    use chat_relay_ai::{ModelError, UploadedFile};
    use std::path::Path;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct FakeFetcher {
        calls: AtomicUsize,
        paths: Mutex<Vec<PathBuf>>,
        fail: bool,
    }

    #[async_trait]
    impl Fetcher for FakeFetcher {
        async fn fetch(&self, _url: &str, destination: &Path) -> Result<u64, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.paths
                .lock()
                .expect("lock")
                .push(destination.to_path_buf());
            tokio::fs::write(destination, b"bytes")
                .await
                .expect("write scratch file");
            if self.fail {
                return Err(FetchError::Status { status: 404 });
            }
            Ok(5)
        }
    }

    #[derive(Default)]
    struct FakeUploader {
        calls: AtomicUsize,
        saw_file: Mutex<Option<bool>>,
    }

    #[async_trait]
    impl FileUploader for FakeUploader {
        async fn upload(
            &self,
            path: &Path,
            mime_type: &str,
            _display_name: &str,
        ) -> Result<UploadedFile, ModelError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.saw_file.lock().expect("lock") = Some(path.exists());
            Ok(UploadedFile {
                uri: "https://files.example/abc".to_string(),
                mime_type: mime_type.to_string(),
            })
        }
    }

    fn ingestor(
        dir: &Path,
        fetcher: FakeFetcher,
    ) -> AttachmentIngestor<FakeFetcher, FakeUploader> {
        AttachmentIngestor::new(
            fetcher,
            FakeUploader::default(),
            AttachmentConfig {
                temp_dir: dir.to_path_buf(),
            },
        )
    }

    #[tokio::test]
    async fn unsupported_format_is_rejected_without_download() {
        let dir = tempfile::tempdir().expect("tempdir");
        let ingestor = ingestor(dir.path(), FakeFetcher::default());

        let descriptor = AttachmentDescriptor::new("https://cdn.example/x", "setup.exe");
        let result = ingestor.ingest(&descriptor, ContextScope::Thread).await;

        assert_eq!(
            result,
            Err(Rejection::UnsupportedFormat {
                filename: "setup.exe".to_string()
            })
        );
        assert_eq!(ingestor.fetcher.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn pdf_outside_thread_is_rejected_without_download() {
        let dir = tempfile::tempdir().expect("tempdir");
        let ingestor = ingestor(dir.path(), FakeFetcher::default());

        let descriptor = AttachmentDescriptor::new("https://cdn.example/x", "paper.pdf");
        let result = ingestor.ingest(&descriptor, ContextScope::Channel).await;

        assert!(matches!(result, Err(Rejection::RequiresThread { .. })));
        assert_eq!(ingestor.fetcher.calls.load(Ordering::SeqCst), 0);
        assert_eq!(ingestor.uploader.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn image_becomes_inline_part_and_temp_file_is_removed() {
        let dir = tempfile::tempdir().expect("tempdir");
        let ingestor = ingestor(dir.path(), FakeFetcher::default());

        let descriptor = AttachmentDescriptor::new("https://cdn.example/x", "cat.png");
        let part = ingestor
            .ingest(&descriptor, ContextScope::Channel)
            .await
            .expect("ingest");

        assert_eq!(part, Part::inline("image/png", b"bytes".to_vec()));

        let paths = ingestor.fetcher.paths.lock().expect("lock").clone();
        assert_eq!(paths.len(), 1);
        assert!(paths[0].starts_with(dir.path().join("images")));
        assert!(!paths[0].exists());
    }

    #[tokio::test]
    async fn pdf_in_thread_is_uploaded() {
        let dir = tempfile::tempdir().expect("tempdir");
        let ingestor = ingestor(dir.path(), FakeFetcher::default());

        let descriptor = AttachmentDescriptor::new("https://cdn.example/x", "paper.pdf");
        let part = ingestor
            .ingest(&descriptor, ContextScope::Thread)
            .await
            .expect("ingest");

        assert_eq!(
            part,
            Part::file("application/pdf", "https://files.example/abc")
        );
        assert_eq!(*ingestor.uploader.saw_file.lock().expect("lock"), Some(true));

        let paths = ingestor.fetcher.paths.lock().expect("lock").clone();
        assert!(paths[0].starts_with(dir.path().join("documents")));
        assert!(!paths[0].exists());
    }

    #[tokio::test]
    async fn failed_download_is_io_rejection_and_cleans_up() {
        let dir = tempfile::tempdir().expect("tempdir");
        let fetcher = FakeFetcher {
            fail: true,
            ..FakeFetcher::default()
        };
        let ingestor = ingestor(dir.path(), fetcher);

        let descriptor = AttachmentDescriptor::new("https://cdn.example/x", "cat.webp");
        let result = ingestor.ingest(&descriptor, ContextScope::Channel).await;

        match result {
            Err(Rejection::Io { filename, reason }) => {
                assert_eq!(filename, "cat.webp");
                assert!(reason.contains("404"));
            }
            other => panic!("expected io rejection, got {other:?}"),
        }

        let paths = ingestor.fetcher.paths.lock().expect("lock").clone();
        assert!(!paths[0].exists());
    }

    #[tokio::test]
    async fn concurrent_same_name_attachments_get_distinct_paths() {
        let dir = tempfile::tempdir().expect("tempdir");
        let ingestor = ingestor(dir.path(), FakeFetcher::default());
        let descriptor = AttachmentDescriptor::new("https://cdn.example/x", "cat.png");

        let (a, b) = tokio::join!(
            ingestor.ingest(&descriptor, ContextScope::Channel),
            ingestor.ingest(&descriptor, ContextScope::Channel),
        );
        assert!(a.is_ok());
        assert!(b.is_ok());

        let paths = ingestor.fetcher.paths.lock().expect("lock").clone();
        assert_eq!(paths.len(), 2);
        assert_ne!(paths[0], paths[1]);
    }

    #[tokio::test]
    async fn scratch_directories_are_created_on_demand() {
        let dir = tempfile::tempdir().expect("tempdir");
        let root = dir.path().join("relay").join("scratch");
        let ingestor = ingestor(&root, FakeFetcher::default());

        let descriptor = AttachmentDescriptor::new("https://cdn.example/x", "My Photo.JPG");
        ingestor
            .ingest(&descriptor, ContextScope::Channel)
            .await
            .expect("ingest");

        assert!(root.join("images").is_dir());
        let paths = ingestor.fetcher.paths.lock().expect("lock").clone();
        let name = paths[0]
            .file_name()
            .and_then(|n| n.to_str())
            .expect("file name");
        assert!(name.starts_with("att-"));
        assert!(name.ends_with("-My_Photo.JPG"));
    }

    #[test]
    fn sanitize_strips_separators() {
        assert_eq!(sanitize("../../etc/passwd"), "passwd");
        assert_eq!(sanitize("my photo (1).png"), "my_photo__1_.png");
        assert_eq!(sanitize(""), "attachment");
    }
}
