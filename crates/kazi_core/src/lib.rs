//! Core domain logic for the Kazi excavation catalog.
//! This crate is the single source of truth for business invariants:
//! main code allocation, artifact identity and uniqueness.

pub mod alloc;
pub mod config;
pub mod db;
pub mod export;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use crate::alloc::{allocate_next_code, sequence_state, AllocError, Allocation, SequenceState};
pub use config::{ConfigError, KaziConfig};
pub use db::{open_db, open_db_in_memory, open_db_with, DbError, OpenOptions};
pub use export::{ExportDocument, ExportError, ExportFormat};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::artifact::{full_artifact_no, Artifact, ArtifactDraft, ArtifactId, FormType};
pub use model::code::{decode, encode, CodeError};
pub use model::main_code::{MainCode, MainCodeDraft, MainCodeId};
pub use repo::artifact_repo::{
    ArtifactListQuery, ArtifactOrdering, ArtifactRepository, SqliteArtifactRepository,
};
pub use repo::main_code_repo::{
    MainCodeListQuery, MainCodeOrdering, MainCodeRepository, SqliteMainCodeRepository,
};
pub use repo::{Page, RepoError, RepoResult};
pub use service::artifact_service::{ArtifactService, ArtifactServiceError};
pub use service::main_code_service::{MainCodeService, MainCodeServiceError};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
