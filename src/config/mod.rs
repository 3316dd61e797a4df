use std::collections::HashSet;
use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use thiserror::Error;

/// Bytes per mebibyte, the unit `max_size_mib` is configured in.
pub const BYTES_PER_MIB: u64 = 1024 * 1024;

/// Field name used when none is configured.
pub const DEFAULT_FIELD_NAME: &str = "file";

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Upload field name cannot be empty")]
    EmptyFieldName,

    #[error("Invalid MIME type '{0}' in allow-list")]
    InvalidMimeType(String),

    #[error("Maximum size of {0} MiB does not fit in bytes")]
    SizeOverflow(u64),

    #[error("Invalid value '{value}' for {key}")]
    InvalidValue { key: &'static str, value: String },
}

/// Validation policy for one upload field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadPolicy {
    field_name: String,
    allow_multiple: bool,
    allowed_mime_types: HashSet<String>,
    max_size_bytes: Option<u64>,
}

impl UploadPolicy {
    pub fn builder() -> UploadPolicyBuilder {
        UploadPolicyBuilder::new()
    }

    pub fn field_name(&self) -> &str {
        &self.field_name
    }

    pub fn allow_multiple(&self) -> bool {
        self.allow_multiple
    }

    pub fn allowed_mime_types(&self) -> &HashSet<String> {
        &self.allowed_mime_types
    }

    pub fn is_allowed_mime_type(&self, mime_type: &str) -> bool {
        self.allowed_mime_types.contains(mime_type)
    }

    /// `None` means no size ceiling.
    pub fn max_size_bytes(&self) -> Option<u64> {
        self.max_size_bytes
    }
}

/// Chained configuration for [`UploadPolicy`]; checked once in [`UploadPolicyBuilder::build`].
#[derive(Debug, Clone)]
pub struct UploadPolicyBuilder {
    field_name: String,
    allow_multiple: bool,
    allowed_mime_types: Vec<String>,
    max_size_mib: Option<u64>,
}

impl Default for UploadPolicyBuilder {
    fn default() -> Self {
        Self {
            field_name: DEFAULT_FIELD_NAME.to_string(),
            allow_multiple: false,
            allowed_mime_types: Vec::new(),
            max_size_mib: None,
        }
    }
}

impl UploadPolicyBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the name of the form field to read.
    pub fn field_name(mut self, field_name: impl Into<String>) -> Self {
        self.field_name = field_name.into();
        self
    }

    /// Sets whether more than one file may be submitted under the field.
    pub fn multiple(mut self, allow_multiple: bool) -> Self {
        self.allow_multiple = allow_multiple;
        self
    }

    /// Replaces the MIME type allow-list.
    pub fn allowed_mime_types<I, S>(mut self, mime_types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_mime_types = mime_types.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the per-file ceiling in MiB; `None` removes it.
    pub fn max_size_mib(mut self, max_size_mib: Option<u64>) -> Self {
        self.max_size_mib = max_size_mib;
        self
    }

    pub fn build(self) -> Result<UploadPolicy, ConfigError> {
        if self.field_name.trim().is_empty() {
            return Err(ConfigError::EmptyFieldName);
        }

        for mime_type in &self.allowed_mime_types {
            if mime_type.parse::<mime::Mime>().is_err() {
                return Err(ConfigError::InvalidMimeType(mime_type.clone()));
            }
        }

        let max_size_bytes = match self.max_size_mib {
            Some(mib) => Some(
                mib.checked_mul(BYTES_PER_MIB)
                    .ok_or(ConfigError::SizeOverflow(mib))?,
            ),
            None => None,
        };

        Ok(UploadPolicy {
            field_name: self.field_name,
            allow_multiple: self.allow_multiple,
            allowed_mime_types: self.allowed_mime_types.into_iter().collect(),
            max_size_bytes,
        })
    }
}

/// Server configuration, loaded from the environment
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Listen address (default: 127.0.0.1:3000)
    pub bind_addr: SocketAddr,

    /// Upload field to validate (default: "file")
    pub field_name: String,

    /// Allow several files under the field (default: false)
    pub allow_multiple: bool,

    /// Accepted declared MIME types
    pub allowed_mime_types: Vec<String>,

    /// Per-file ceiling in MiB, none when unset (default: 10)
    pub max_size_mib: Option<u64>,

    /// Directory for staged uploads (default: system temp dir)
    pub temp_dir: PathBuf,

    /// Hard per-file limit enforced while staging, in bytes (default: 64 MB)
    pub transport_max_file_size: u64,

    /// Maximum request body in bytes (default: 256 MB)
    pub max_body_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 3000)),
            field_name: DEFAULT_FIELD_NAME.to_string(),
            allow_multiple: false,
            allowed_mime_types: vec![
                "image/jpeg".to_string(),
                "image/png".to_string(),
                "image/gif".to_string(),
                "image/webp".to_string(),
                "application/pdf".to_string(),
            ],
            max_size_mib: Some(10),
            temp_dir: env::temp_dir(),
            transport_max_file_size: 64 * 1024 * 1024, // 64 MB
            max_body_size: 256 * 1024 * 1024,          // 256 MB
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let default = Self::default();

        Ok(Self {
            bind_addr: parse_var("BIND_ADDR")?.unwrap_or(default.bind_addr),

            field_name: env::var("UPLOAD_FIELD_NAME").unwrap_or(default.field_name),

            allow_multiple: env::var("UPLOAD_ALLOW_MULTIPLE")
                .map(|v| v.to_lowercase() == "true" || v == "1")
                .unwrap_or(default.allow_multiple),

            allowed_mime_types: env::var("UPLOAD_ALLOWED_MIME_TYPES")
                .map(|v| split_list(&v))
                .unwrap_or(default.allowed_mime_types),

            max_size_mib: match env::var("UPLOAD_MAX_SIZE_MIB") {
                Ok(v) if v.trim().is_empty() || v.eq_ignore_ascii_case("none") => None,
                Ok(v) => Some(v.trim().parse().map_err(|_| ConfigError::InvalidValue {
                    key: "UPLOAD_MAX_SIZE_MIB",
                    value: v.clone(),
                })?),
                Err(_) => default.max_size_mib,
            },

            temp_dir: env::var("UPLOAD_TEMP_DIR")
                .map(PathBuf::from)
                .unwrap_or(default.temp_dir),

            transport_max_file_size: parse_var("TRANSPORT_MAX_FILE_SIZE")?
                .unwrap_or(default.transport_max_file_size),

            max_body_size: parse_var("MAX_BODY_SIZE")?.unwrap_or(default.max_body_size),
        })
    }

    /// Create config for development (multiple files, no size ceiling)
    pub fn development() -> Self {
        Self {
            allow_multiple: true,
            max_size_mib: None,
            ..Self::default()
        }
    }

    /// Create config for production (single file, strict ceiling)
    pub fn production() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 3000)),
            allow_multiple: false,
            max_size_mib: Some(5),
            transport_max_file_size: 16 * 1024 * 1024,
            max_body_size: 32 * 1024 * 1024,
            ..Self::default()
        }
    }

    /// Builds the validation policy described by this configuration.
    pub fn upload_policy(&self) -> Result<UploadPolicy, ConfigError> {
        UploadPolicy::builder()
            .field_name(self.field_name.clone())
            .multiple(self.allow_multiple)
            .allowed_mime_types(self.allowed_mime_types.iter().cloned())
            .max_size_mib(self.max_size_mib)
            .build()
    }
}

fn parse_var<T: std::str::FromStr>(key: &'static str) -> Result<Option<T>, ConfigError> {
    match env::var(key) {
        Ok(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue { key, value }),
        Err(_) => Ok(None),
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
