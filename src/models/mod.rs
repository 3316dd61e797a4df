use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use utoipa::ToSchema;

/// Status reported by the transport layer for a single uploaded file.
///
/// Codes follow the classic multipart upload status table; `5` is unused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransportStatus {
    /// The file arrived completely.
    Ok,
    /// The file exceeds the server-wide hard limit.
    ExceedsServerLimit,
    /// The file exceeds the limit declared by the form.
    ExceedsFormLimit,
    /// Only part of the file arrived.
    Partial,
    /// The field was submitted without a file.
    NoFile,
    /// No temporary directory was available.
    NoTempDir,
    /// The file could not be written to temporary storage.
    CantWrite,
    /// An extension of the transport stopped the upload.
    Extension,
}

impl TransportStatus {
    pub fn code(self) -> u8 {
        match self {
            TransportStatus::Ok => 0,
            TransportStatus::ExceedsServerLimit => 1,
            TransportStatus::ExceedsFormLimit => 2,
            TransportStatus::Partial => 3,
            TransportStatus::NoFile => 4,
            TransportStatus::NoTempDir => 6,
            TransportStatus::CantWrite => 7,
            TransportStatus::Extension => 8,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(TransportStatus::Ok),
            1 => Some(TransportStatus::ExceedsServerLimit),
            2 => Some(TransportStatus::ExceedsFormLimit),
            3 => Some(TransportStatus::Partial),
            4 => Some(TransportStatus::NoFile),
            6 => Some(TransportStatus::NoTempDir),
            7 => Some(TransportStatus::CantWrite),
            8 => Some(TransportStatus::Extension),
            _ => None,
        }
    }

    pub fn is_ok(self) -> bool {
        self == TransportStatus::Ok
    }
}

/// Metadata for one uploaded file as produced by the transport layer.
///
/// Name and MIME type come from the client and are not trusted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadDescriptor {
    pub declared_name: String,
    pub declared_mime_type: String,
    pub storage_path: PathBuf,
    pub transport_status: TransportStatus,
    pub size_bytes: u64,
}

impl UploadDescriptor {
    pub fn new(
        declared_name: impl Into<String>,
        declared_mime_type: impl Into<String>,
        storage_path: impl Into<PathBuf>,
        transport_status: TransportStatus,
        size_bytes: u64,
    ) -> Self {
        Self {
            declared_name: declared_name.into(),
            declared_mime_type: declared_mime_type.into(),
            storage_path: storage_path.into(),
            transport_status,
            size_bytes,
        }
    }

    pub fn storage_path(&self) -> &Path {
        &self.storage_path
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum TransportError {
    #[error("Parallel upload arrays differ in length (names={names}, types={types}, paths={paths}, statuses={statuses}, sizes={sizes})")]
    LengthMismatch {
        names: usize,
        types: usize,
        paths: usize,
        statuses: usize,
        sizes: usize,
    },

    #[error("Unknown transport status code {0}")]
    UnknownStatus(u8),

    #[error("Malformed multipart body: {0}")]
    Multipart(String),
}

/// Shape of the data submitted under one field name.
///
/// Decided once when the request is read, so validation never inspects raw shapes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadField {
    Single(UploadDescriptor),
    Multiple(Vec<UploadDescriptor>),
}

impl UploadField {
    /// Zips positional name/type/path/status/size arrays into one descriptor per index.
    pub fn from_parallel(
        names: Vec<String>,
        types: Vec<String>,
        paths: Vec<PathBuf>,
        statuses: Vec<u8>,
        sizes: Vec<u64>,
    ) -> Result<Self, TransportError> {
        let len = names.len();
        if [types.len(), paths.len(), statuses.len(), sizes.len()]
            .iter()
            .any(|&l| l != len)
        {
            return Err(TransportError::LengthMismatch {
                names: names.len(),
                types: types.len(),
                paths: paths.len(),
                statuses: statuses.len(),
                sizes: sizes.len(),
            });
        }

        let mut files = Vec::with_capacity(len);
        for ((((name, mime_type), path), status), size) in names
            .into_iter()
            .zip(types)
            .zip(paths)
            .zip(statuses)
            .zip(sizes)
        {
            let status =
                TransportStatus::from_code(status).ok_or(TransportError::UnknownStatus(status))?;
            files.push(UploadDescriptor::new(name, mime_type, path, status, size));
        }

        Ok(UploadField::Multiple(files))
    }

    pub fn len(&self) -> usize {
        match self {
            UploadField::Single(_) => 1,
            UploadField::Multiple(files) => files.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn descriptors(&self) -> &[UploadDescriptor] {
        match self {
            UploadField::Single(file) => std::slice::from_ref(file),
            UploadField::Multiple(files) => files,
        }
    }
}

/// Uploaded-file data of one request, keyed by field name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadRequest {
    fields: HashMap<String, UploadField>,
}

impl UploadRequest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a file under its raw form field name.
    ///
    /// `name[]` collects into a `Multiple` field named `name`; a plain name holds a
    /// single file and a repeated plain name replaces the earlier one.
    pub fn insert(&mut self, raw_field_name: &str, descriptor: UploadDescriptor) {
        match raw_field_name.strip_suffix("[]") {
            Some(name) => {
                let field = self
                    .fields
                    .entry(name.to_string())
                    .or_insert_with(|| UploadField::Multiple(Vec::new()));
                match field {
                    UploadField::Multiple(files) => files.push(descriptor),
                    UploadField::Single(_) => *field = UploadField::Multiple(vec![descriptor]),
                }
            }
            None => {
                self.fields
                    .insert(raw_field_name.to_string(), UploadField::Single(descriptor));
            }
        }
    }

    pub fn set_field(&mut self, name: impl Into<String>, field: UploadField) {
        self.fields.insert(name.into(), field);
    }

    pub fn field(&self, name: &str) -> Option<&UploadField> {
        self.fields.get(name)
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Reason a file or field failed validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UploadErrorKind {
    /// File missing, not a genuine upload, or the transport reported an error.
    NotUploaded,
    /// Declared MIME type is not in the allow-list.
    Type,
    /// File exceeds the configured maximum size.
    Size,
    /// Several files were submitted to a single-file field.
    Multiple,
}

impl UploadErrorKind {
    pub fn code(self) -> u8 {
        match self {
            UploadErrorKind::NotUploaded => 0,
            UploadErrorKind::Type => 1,
            UploadErrorKind::Size => 2,
            UploadErrorKind::Multiple => 3,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            UploadErrorKind::NotUploaded => "NOT_UPLOADED",
            UploadErrorKind::Type => "TYPE",
            UploadErrorKind::Size => "SIZE",
            UploadErrorKind::Multiple => "MULTIPLE",
        }
    }
}

impl std::fmt::Display for UploadErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of one validation run, owned by the caller.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationOutcome {
    pub field_present: bool,
    pub accepted_files: Vec<UploadDescriptor>,
    pub errors: Vec<UploadErrorKind>,
    pub success: bool,
}
