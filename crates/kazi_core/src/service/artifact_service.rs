//! Artifact use-case service.
//!
//! # Responsibility
//! - Provide create/update/get/list/delete entry points for artifacts.
//! - Run the advisory `(main_code, artifact_no)` uniqueness pre-check.
//! - Export one artifact as a downloadable document.
//!
//! # Invariants
//! - The pre-check and the storage constraint report conflicts through the
//!   same `DuplicateIdentifier` error.

use crate::export::{self, ExportDocument, ExportError, ExportFormat};
use crate::model::artifact::{Artifact, ArtifactDraft, ArtifactId, ArtifactValidationError};
use crate::model::main_code::MainCodeId;
use crate::repo::artifact_repo::{parse_full_artifact_no, ArtifactListQuery, ArtifactRepository};
use crate::repo::{Page, RepoError};
use log::info;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Service error for artifact use-cases.
#[derive(Debug)]
pub enum ArtifactServiceError {
    /// `(main_code, artifact_no)` already used by another artifact.
    DuplicateIdentifier { field: &'static str, value: String },
    /// Input failed field validation.
    Validation(ArtifactValidationError),
    /// Target artifact does not exist.
    ArtifactNotFound(String),
    /// Referenced main code does not exist.
    MainCodeNotFound(String),
    /// Text is not a canonical full artifact number.
    InvalidFullNumber(String),
    /// Rendering failed.
    Export(ExportError),
    /// Persistence-layer failure.
    Repo(RepoError),
}

impl Display for ArtifactServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DuplicateIdentifier { field, value } => write!(
                f,
                "`{field}` value `{value}` already exists for this main code"
            ),
            Self::Validation(err) => write!(f, "{err}"),
            Self::ArtifactNotFound(id) => write!(f, "artifact not found: {id}"),
            Self::MainCodeNotFound(id) => write!(f, "main code not found: {id}"),
            Self::InvalidFullNumber(value) => {
                write!(f, "invalid full artifact number `{value}`")
            }
            Self::Export(err) => write!(f, "{err}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ArtifactServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Export(err) => Some(err),
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for ArtifactServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::DuplicateIdentifier { field, value } => {
                Self::DuplicateIdentifier { field, value }
            }
            RepoError::ArtifactValidation(err) => Self::Validation(err),
            RepoError::NotFound {
                entity: "main code",
                id,
            } => Self::MainCodeNotFound(id),
            RepoError::NotFound { id, .. } => Self::ArtifactNotFound(id),
            other => Self::Repo(other),
        }
    }
}

impl From<ExportError> for ArtifactServiceError {
    fn from(value: ExportError) -> Self {
        Self::Export(value)
    }
}

/// Artifact service facade over repository implementations.
pub struct ArtifactService<R: ArtifactRepository> {
    repo: R,
}

impl<R: ArtifactRepository> ArtifactService<R> {
    /// Creates a service using the provided repository implementation.
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Creates an artifact after checking its number is free.
    pub fn create_artifact(&self, draft: &ArtifactDraft) -> Result<Artifact, ArtifactServiceError> {
        self.ensure_number_free(draft, None)?;
        Ok(self.repo.create_artifact(draft)?)
    }

    /// Replaces all fields of an artifact after checking its number is free.
    pub fn update_artifact(
        &self,
        id: ArtifactId,
        draft: &ArtifactDraft,
    ) -> Result<Artifact, ArtifactServiceError> {
        self.ensure_number_free(draft, Some(id))?;
        Ok(self.repo.update_artifact(id, draft)?)
    }

    pub fn get_artifact(&self, id: ArtifactId) -> Result<Option<Artifact>, ArtifactServiceError> {
        Ok(self.repo.get_artifact(id)?)
    }

    /// Looks an artifact up by its full number, e.g. `AAA0007`.
    pub fn get_by_full_no(&self, full_no: &str) -> Result<Option<Artifact>, ArtifactServiceError> {
        let (code, artifact_no) = parse_full_artifact_no(full_no)
            .ok_or_else(|| ArtifactServiceError::InvalidFullNumber(full_no.to_string()))?;
        Ok(self.repo.get_by_number(&code, artifact_no)?)
    }

    pub fn list_artifacts(
        &self,
        query: &ArtifactListQuery,
    ) -> Result<Page<Artifact>, ArtifactServiceError> {
        Ok(self.repo.list_artifacts(query)?)
    }

    pub fn delete_artifact(&self, id: ArtifactId) -> Result<(), ArtifactServiceError> {
        Ok(self.repo.delete_artifact(id)?)
    }

    /// Returns `true` when `(main_code_id, artifact_no)` is still free.
    ///
    /// `exclude_id` lets an edit form ignore the artifact being edited.
    pub fn check_unique(
        &self,
        main_code_id: MainCodeId,
        artifact_no: u32,
        exclude_id: Option<ArtifactId>,
    ) -> Result<bool, ArtifactServiceError> {
        Ok(!self.repo.number_taken(main_code_id, artifact_no, exclude_id)?)
    }

    /// Renders one artifact in the requested format.
    pub fn export_artifact(
        &self,
        id: ArtifactId,
        format: ExportFormat,
    ) -> Result<ExportDocument, ArtifactServiceError> {
        let artifact = self
            .repo
            .get_artifact(id)?
            .ok_or_else(|| ArtifactServiceError::ArtifactNotFound(id.to_string()))?;
        let document = export::export_artifact(&artifact, format)?;
        info!(
            "event=artifact_export module=service status=ok format={} bytes={}",
            format.extension(),
            document.bytes.len()
        );
        Ok(document)
    }

    fn ensure_number_free(
        &self,
        draft: &ArtifactDraft,
        exclude_id: Option<ArtifactId>,
    ) -> Result<(), ArtifactServiceError> {
        if self
            .repo
            .number_taken(draft.main_code_id, draft.artifact_no, exclude_id)?
        {
            return Err(ArtifactServiceError::DuplicateIdentifier {
                field: "artifact_no",
                value: draft.artifact_no.to_string(),
            });
        }
        Ok(())
    }
}
