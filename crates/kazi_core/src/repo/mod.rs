//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define use-case oriented data access contracts.
//! - Isolate SQLite query details from service orchestration.
//! - Translate storage constraint failures into semantic errors.
//!
//! # Invariants
//! - Write paths validate drafts before SQL mutations.
//! - A UNIQUE violation is always reported as `DuplicateIdentifier`, so
//!   callers see the same error whether the pre-check or the storage layer
//!   caught the conflict.
//! - Repositories refuse connections that are not fully migrated.

use crate::alloc::AllocError;
use crate::db::migrations::latest_version;
use crate::db::DbError;
use crate::model::artifact::ArtifactValidationError;
use crate::model::code::CodeError;
use crate::model::main_code::MainCodeValidationError;
use rusqlite::Connection;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod artifact_repo;
pub mod main_code_repo;

pub type RepoResult<T> = Result<T, RepoError>;

const PAGE_SIZE_DEFAULT: u32 = 50;
const PAGE_SIZE_MAX: u32 = 500;

/// Repository error shared by main code and artifact persistence.
#[derive(Debug)]
pub enum RepoError {
    MainCodeValidation(MainCodeValidationError),
    ArtifactValidation(ArtifactValidationError),
    Alloc(AllocError),
    Db(DbError),
    /// Target row does not exist.
    NotFound { entity: &'static str, id: String },
    /// A unique identifier is already taken.
    DuplicateIdentifier { field: &'static str, value: String },
    /// Persisted row cannot be converted into a valid model.
    InvalidData(String),
    /// Connection schema is not at the expected migrated version.
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    MissingRequiredTable(&'static str),
    MissingRequiredColumn {
        table: &'static str,
        column: &'static str,
    },
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MainCodeValidation(err) => write!(f, "{err}"),
            Self::ArtifactValidation(err) => write!(f, "{err}"),
            Self::Alloc(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound { entity, id } => write!(f, "{entity} not found: {id}"),
            Self::DuplicateIdentifier { field, value } => {
                write!(f, "`{field}` value `{value}` is already in use")
            }
            Self::InvalidData(message) => write!(f, "invalid persisted data: {message}"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "repository requires schema version {expected_version}, got {actual_version}"
            ),
            Self::MissingRequiredTable(table) => {
                write!(f, "repository requires table `{table}`")
            }
            Self::MissingRequiredColumn { table, column } => write!(
                f,
                "repository requires column `{column}` in table `{table}`"
            ),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::MainCodeValidation(err) => Some(err),
            Self::ArtifactValidation(err) => Some(err),
            Self::Alloc(err) => Some(err),
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<MainCodeValidationError> for RepoError {
    fn from(value: MainCodeValidationError) -> Self {
        Self::MainCodeValidation(value)
    }
}

impl From<ArtifactValidationError> for RepoError {
    fn from(value: ArtifactValidationError) -> Self {
        Self::ArtifactValidation(value)
    }
}

impl From<CodeError> for RepoError {
    fn from(value: CodeError) -> Self {
        Self::MainCodeValidation(MainCodeValidationError::Code(value))
    }
}

impl From<AllocError> for RepoError {
    fn from(value: AllocError) -> Self {
        Self::Alloc(value)
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// One page of list results.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Rows matching the filters across all pages.
    pub total: u64,
    /// 1-based page number actually served.
    pub page: u32,
    /// Effective page size.
    pub page_size: u32,
}

impl<T> Page<T> {
    /// Number of pages for `total` rows, at least 1.
    pub fn page_count(&self) -> u64 {
        let size = u64::from(self.page_size.max(1));
        self.total.div_ceil(size).max(1)
    }
}

/// Normalizes a page size: missing or zero -> 50, clamped to 500.
pub fn normalize_page_size(page_size: Option<u32>) -> u32 {
    match page_size {
        Some(0) | None => PAGE_SIZE_DEFAULT,
        Some(value) if value > PAGE_SIZE_MAX => PAGE_SIZE_MAX,
        Some(value) => value,
    }
}

/// Normalizes a 1-based page number: missing or zero -> 1.
pub fn normalize_page(page: Option<u32>) -> u32 {
    page.filter(|value| *value > 0).unwrap_or(1)
}

/// Builds a `LIKE ... ESCAPE '\'` substring pattern from user text.
pub(crate) fn like_pattern(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len() + 2);
    escaped.push('%');
    for ch in value.trim().chars() {
        if matches!(ch, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped.push('%');
    escaped
}

pub(crate) fn bool_to_int(value: bool) -> i64 {
    if value {
        1
    } else {
        0
    }
}

pub(crate) fn ensure_connection_ready(
    conn: &Connection,
    required: &[(&'static str, &[&'static str])],
) -> RepoResult<()> {
    let expected_version = latest_version();
    let actual_version: u32 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
    if actual_version != expected_version {
        return Err(RepoError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }

    for &(table, columns) in required {
        if !table_exists(conn, table)? {
            return Err(RepoError::MissingRequiredTable(table));
        }
        for &column in columns {
            if !table_has_column(conn, table, column)? {
                return Err(RepoError::MissingRequiredColumn { table, column });
            }
        }
    }

    Ok(())
}

fn table_exists(conn: &Connection, table: &str) -> RepoResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = ?1
        );",
        [table],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

fn table_has_column(conn: &Connection, table: &str, column: &str) -> RepoResult<bool> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table});"))?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let current: String = row.get(1)?;
        if current == column {
            return Ok(true);
        }
    }
    Ok(false)
}

#[cfg(test)]
mod tests {
    use super::{like_pattern, normalize_page, normalize_page_size, Page};

    #[test]
    fn page_size_defaults_and_clamps() {
        assert_eq!(normalize_page_size(None), 50);
        assert_eq!(normalize_page_size(Some(0)), 50);
        assert_eq!(normalize_page_size(Some(20)), 20);
        assert_eq!(normalize_page_size(Some(10_000)), 500);
        assert_eq!(normalize_page(Some(0)), 1);
        assert_eq!(normalize_page(Some(3)), 3);
    }

    #[test]
    fn like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern(" 50%_a\\ "), "%50\\%\\_a\\\\%");
    }

    #[test]
    fn page_count_rounds_up() {
        let page: Page<u8> = Page {
            items: Vec::new(),
            total: 101,
            page: 1,
            page_size: 50,
        };
        assert_eq!(page.page_count(), 3);
    }
}
