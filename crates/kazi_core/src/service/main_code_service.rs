//! Main code use-case service.
//!
//! # Responsibility
//! - Provide create/seed/get/list/update/delete entry points for main codes.
//! - Surface allocation outcomes as use-case errors.
//!
//! # Invariants
//! - Callers never choose the code of a created main code.
//! - `PoolExhausted` and `DuplicateIdentifier` are rejected requests, not
//!   crashes; codec failures are logged as invariant violations.

use crate::alloc::{AllocError, SequenceState};
use crate::model::main_code::{MainCode, MainCodeDraft, MainCodeId, MainCodeValidationError};
use crate::repo::main_code_repo::{MainCodeListQuery, MainCodeRepository};
use crate::repo::{Page, RepoError};
use log::{error, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Service error for main code use-cases.
#[derive(Debug)]
pub enum MainCodeServiceError {
    /// No code remains to allocate.
    PoolExhausted,
    /// Allocation lock wait timed out; the whole request may be retried.
    LockTimeout,
    /// Seeded code is already used by another main code.
    DuplicateIdentifier { field: &'static str, value: String },
    /// Input failed field validation.
    Validation(MainCodeValidationError),
    /// Target main code does not exist.
    NotFound(String),
    /// Persistence-layer failure.
    Repo(RepoError),
}

impl Display for MainCodeServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PoolExhausted => write!(f, "{}", AllocError::PoolExhausted),
            Self::LockTimeout => write!(f, "{}", AllocError::LockTimeout),
            Self::DuplicateIdentifier { field, value } => {
                write!(f, "`{field}` value `{value}` is already in use")
            }
            Self::Validation(err) => write!(f, "{err}"),
            Self::NotFound(id) => write!(f, "main code not found: {id}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for MainCodeServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for MainCodeServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::Alloc(AllocError::PoolExhausted) => Self::PoolExhausted,
            RepoError::Alloc(AllocError::LockTimeout) => Self::LockTimeout,
            RepoError::Alloc(AllocError::InvalidCursor(err)) => {
                error!(
                    "event=invariant_violation module=service error_code=invalid_cursor error={}",
                    err
                );
                Self::Repo(RepoError::Alloc(AllocError::InvalidCursor(err)))
            }
            RepoError::DuplicateIdentifier { field, value } => {
                Self::DuplicateIdentifier { field, value }
            }
            RepoError::MainCodeValidation(err) => Self::Validation(err),
            RepoError::NotFound { id, .. } => Self::NotFound(id),
            other => Self::Repo(other),
        }
    }
}

/// Main code service facade over repository implementations.
pub struct MainCodeService<R: MainCodeRepository> {
    repo: R,
}

impl<R: MainCodeRepository> MainCodeService<R> {
    /// Creates a service using the provided repository implementation.
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Allocates the next code and creates a main code with it.
    pub fn create_main_code(
        &mut self,
        draft: &MainCodeDraft,
    ) -> Result<MainCode, MainCodeServiceError> {
        self.repo.create_main_code(draft).map_err(|err| {
            let err = MainCodeServiceError::from(err);
            if matches!(err, MainCodeServiceError::PoolExhausted) {
                warn!("event=main_code_create module=service status=rejected error_code=pool_exhausted");
            }
            err
        })
    }

    /// Inserts a main code under an explicit code without moving the cursor.
    pub fn seed_main_code(
        &mut self,
        code: &str,
        draft: &MainCodeDraft,
    ) -> Result<MainCode, MainCodeServiceError> {
        Ok(self.repo.seed_main_code(code, draft)?)
    }

    pub fn get_main_code(&self, id: MainCodeId) -> Result<Option<MainCode>, MainCodeServiceError> {
        Ok(self.repo.get_main_code(id)?)
    }

    /// Looks a main code up by its (case-insensitive) code.
    pub fn get_by_code(&self, code: &str) -> Result<Option<MainCode>, MainCodeServiceError> {
        Ok(self.repo.get_by_code(code)?)
    }

    pub fn list_main_codes(
        &self,
        query: &MainCodeListQuery,
    ) -> Result<Page<MainCode>, MainCodeServiceError> {
        Ok(self.repo.list_main_codes(query)?)
    }

    /// Replaces descriptive attributes of a main code.
    pub fn update_main_code(
        &self,
        id: MainCodeId,
        draft: &MainCodeDraft,
    ) -> Result<MainCode, MainCodeServiceError> {
        Ok(self.repo.update_main_code(id, draft)?)
    }

    /// Deletes a main code together with its artifacts.
    pub fn delete_main_code(&self, id: MainCodeId) -> Result<(), MainCodeServiceError> {
        Ok(self.repo.delete_main_code(id)?)
    }

    /// Reads the allocation cursor.
    pub fn sequence_state(&self) -> Result<SequenceState, MainCodeServiceError> {
        Ok(self.repo.sequence_state()?)
    }
}
