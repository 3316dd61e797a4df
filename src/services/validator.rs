use crate::config::UploadPolicy;
use crate::models::{UploadDescriptor, UploadErrorKind, UploadField, UploadRequest, ValidationOutcome};
use crate::services::verifier::UploadVerifier;
use tracing::{debug, info, warn};

/// Validates the files submitted under one field against an [`UploadPolicy`].
///
/// Failures never abort a run: each failing file or field records one
/// [`UploadErrorKind`] and the run continues with the remaining files.
pub struct UploadValidator<'a> {
    policy: &'a UploadPolicy,
    verifier: &'a dyn UploadVerifier,
    field_present: bool,
    files: Vec<UploadDescriptor>,
    errors: Vec<UploadErrorKind>,
    success: bool,
}

impl<'a> UploadValidator<'a> {
    pub fn new(policy: &'a UploadPolicy, verifier: &'a dyn UploadVerifier) -> Self {
        Self {
            policy,
            verifier,
            field_present: false,
            files: Vec::new(),
            errors: Vec::new(),
            success: false,
        }
    }

    /// Runs validation over the configured field of `request`.
    ///
    /// Results of an earlier run on this validator are discarded first.
    pub fn handle_uploaded_files(&mut self, request: &UploadRequest) -> &mut Self {
        self.reset();

        let policy = self.policy;
        let field_name = policy.field_name();
        let Some(field) = request.field(field_name) else {
            debug!("Upload field '{}' not present in request", field_name);
            return self;
        };

        self.field_present = true;
        self.success = true;

        match (field, policy.allow_multiple()) {
            (UploadField::Multiple(files), true) => {
                for file in files {
                    self.accept_if_valid(file);
                }
            }
            (UploadField::Single(file), _) => self.accept_if_valid(file),
            (UploadField::Multiple(files), false) => {
                warn!(
                    "Field '{}' received {} files but only one is allowed",
                    field_name,
                    files.len()
                );
                self.errors.push(UploadErrorKind::Multiple);
                self.success = false;
            }
        }

        info!(
            field = %field_name,
            accepted = self.files.len(),
            rejected = self.errors.len(),
            success = self.success,
            "Upload validation finished"
        );

        self
    }

    fn accept_if_valid(&mut self, file: &UploadDescriptor) {
        if self.check_file(file) {
            self.files.push(file.clone());
        } else {
            self.success = false;
        }
    }

    /// Checks one file in fixed order, recording at most one error.
    fn check_file(&mut self, file: &UploadDescriptor) -> bool {
        match self.first_failure(file) {
            Some(kind) => {
                warn!(
                    "Rejected upload '{}' ({}, {} bytes): {}",
                    file.declared_name, file.declared_mime_type, file.size_bytes, kind
                );
                self.errors.push(kind);
                false
            }
            None => {
                debug!("Accepted upload '{}'", file.declared_name);
                true
            }
        }
    }

    fn first_failure(&self, file: &UploadDescriptor) -> Option<UploadErrorKind> {
        if !(self.verifier.is_uploaded_file(file.storage_path()) && file.transport_status.is_ok()) {
            return Some(UploadErrorKind::NotUploaded);
        }

        if !self.policy.is_allowed_mime_type(&file.declared_mime_type) {
            return Some(UploadErrorKind::Type);
        }

        if let Some(max) = self.policy.max_size_bytes() {
            if file.size_bytes > max {
                return Some(UploadErrorKind::Size);
            }
        }

        None
    }

    fn reset(&mut self) {
        self.field_present = false;
        self.files.clear();
        self.errors.clear();
        self.success = false;
    }

    /// Files that passed every check, in submission order.
    pub fn files(&self) -> &[UploadDescriptor] {
        &self.files
    }

    /// True when the field was present and every file passed.
    pub fn successful(&self) -> bool {
        self.success
    }

    /// Failures in the order they were found.
    pub fn errors(&self) -> &[UploadErrorKind] {
        &self.errors
    }

    /// Distinguishes "field missing" from "validated" when `successful()` is false.
    pub fn field_present(&self) -> bool {
        self.field_present
    }

    pub fn into_outcome(self) -> ValidationOutcome {
        ValidationOutcome {
            field_present: self.field_present,
            accepted_files: self.files,
            errors: self.errors,
            success: self.success,
        }
    }
}

/// Validates `request` in one call and returns the owned result.
pub fn validate_request(
    policy: &UploadPolicy,
    verifier: &dyn UploadVerifier,
    request: &UploadRequest,
) -> ValidationOutcome {
    let mut validator = UploadValidator::new(policy, verifier);
    validator.handle_uploaded_files(request);
    validator.into_outcome()
}
