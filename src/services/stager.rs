use crate::models::{TransportError, TransportStatus, UploadDescriptor, UploadRequest};
use crate::services::verifier::StagingRegistry;
use axum::extract::Multipart;
use axum::extract::multipart::Field;
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempPath;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

/// Streams multipart file parts into temp files and describes them.
pub struct UploadStager {
    dir: PathBuf,
    registry: Arc<StagingRegistry>,
    max_file_size: u64,
}

impl UploadStager {
    pub fn new(dir: impl Into<PathBuf>, registry: Arc<StagingRegistry>, max_file_size: u64) -> Self {
        Self {
            dir: dir.into(),
            registry,
            max_file_size,
        }
    }

    pub fn registry(&self) -> &Arc<StagingRegistry> {
        &self.registry
    }

    /// Reads every part of `multipart`, staging file parts and skipping text parts.
    pub async fn stage(&self, mut multipart: Multipart) -> Result<StagedRequest, TransportError> {
        let mut staged = StagedRequest::new(self.registry.clone());

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| TransportError::Multipart(e.to_string()))?
        {
            let Some(raw_name) = field.name().map(str::to_string) else {
                continue;
            };
            let Some(file_name) = field.file_name().map(str::to_string) else {
                debug!("Skipping non-file field '{}'", raw_name);
                continue;
            };
            let mime_type = field.content_type().unwrap_or_default().to_string();

            let (descriptor, stream) = self
                .stage_file(field, file_name, mime_type, &mut staged)
                .await;
            staged.request.insert(&raw_name, descriptor);

            // The body cannot be resumed past a broken part.
            if stream == PartStream::Broken {
                break;
            }
        }

        Ok(staged)
    }

    async fn stage_file(
        &self,
        mut field: Field<'_>,
        file_name: String,
        mime_type: String,
        staged: &mut StagedRequest,
    ) -> (UploadDescriptor, PartStream) {
        let temp = match tempfile::Builder::new()
            .prefix("upload-")
            .suffix(".tmp")
            .tempfile_in(&self.dir)
        {
            Ok(temp) => temp,
            Err(e) => {
                warn!("No temp file available in {}: {}", self.dir.display(), e);
                let (size, stream) = drain(&mut field).await;
                let descriptor = UploadDescriptor::new(
                    file_name,
                    mime_type,
                    PathBuf::new(),
                    TransportStatus::NoTempDir,
                    size,
                );
                return (descriptor, stream);
            }
        };

        let (file, temp_path) = temp.into_parts();
        let mut file = tokio::fs::File::from_std(file);
        let mut size: u64 = 0;
        let mut status = TransportStatus::Ok;

        loop {
            match field.chunk().await {
                Ok(Some(chunk)) => {
                    size += chunk.len() as u64;
                    if !status.is_ok() {
                        continue;
                    }
                    if size > self.max_file_size {
                        warn!(
                            "Upload '{}' exceeds transport limit of {} bytes",
                            file_name, self.max_file_size
                        );
                        status = TransportStatus::ExceedsServerLimit;
                    } else if let Err(e) = file.write_all(&chunk).await {
                        warn!("Failed to write staged upload '{}': {}", file_name, e);
                        status = TransportStatus::CantWrite;
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    warn!("Upload '{}' interrupted: {}", file_name, e);
                    status = TransportStatus::Partial;
                    break;
                }
            }
        }

        if status.is_ok() {
            if let Err(e) = file.flush().await {
                warn!("Failed to flush staged upload '{}': {}", file_name, e);
                status = TransportStatus::CantWrite;
            }
        }

        if status.is_ok() && file_name.is_empty() && size == 0 {
            status = TransportStatus::NoFile;
        }

        if !status.is_ok() {
            let stream = if status == TransportStatus::Partial {
                PartStream::Broken
            } else {
                PartStream::Intact
            };
            // Dropping the temp path removes the partial file.
            let descriptor =
                UploadDescriptor::new(file_name, mime_type, PathBuf::new(), status, size);
            return (descriptor, stream);
        }

        let storage_path = temp_path.to_path_buf();
        debug!(
            "Staged upload '{}' ({} bytes) at {}",
            file_name,
            size,
            storage_path.display()
        );
        staged.track(temp_path);

        (
            UploadDescriptor::new(file_name, mime_type, storage_path, status, size),
            PartStream::Intact,
        )
    }
}

/// Whether the multipart body can still be read after a part.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PartStream {
    Intact,
    Broken,
}

async fn drain(field: &mut Field<'_>) -> (u64, PartStream) {
    let mut size = 0;
    loop {
        match field.chunk().await {
            Ok(Some(chunk)) => size += chunk.len() as u64,
            Ok(None) => return (size, PartStream::Intact),
            Err(_) => return (size, PartStream::Broken),
        }
    }
}

/// Upload data of one request together with its staged temp files.
///
/// Dropping it unregisters and deletes every staged file.
pub struct StagedRequest {
    request: UploadRequest,
    temp_paths: Vec<TempPath>,
    registry: Arc<StagingRegistry>,
}

impl StagedRequest {
    fn new(registry: Arc<StagingRegistry>) -> Self {
        Self {
            request: UploadRequest::new(),
            temp_paths: Vec::new(),
            registry,
        }
    }

    fn track(&mut self, temp_path: TempPath) {
        self.registry.register(temp_path.to_path_buf());
        self.temp_paths.push(temp_path);
    }

    pub fn request(&self) -> &UploadRequest {
        &self.request
    }
}

impl Drop for StagedRequest {
    fn drop(&mut self) {
        for path in &self.temp_paths {
            self.registry.unregister(path);
        }
    }
}
