//! Main code domain model.
//!
//! # Responsibility
//! - Define the excavation context record identified by a 3-letter code.
//! - Validate descriptive attributes before persistence.
//!
//! # Invariants
//! - `code` is canonical (`^[A-Z]{3}$`) and never changes after creation.
//! - `finding_place` is non-empty.

use crate::model::code::{self, CodeError};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Stable row identifier of a main code.
pub type MainCodeId = Uuid;

const FINDING_PLACE_MAX_CHARS: usize = 120;
const SHORT_FIELD_MAX_CHARS: usize = 60;
const GIS_MAX_CHARS: usize = 255;

/// Validation failure for main code input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MainCodeValidationError {
    /// Code text is not a valid 3-letter code.
    Code(CodeError),
    /// Required field is empty after trim.
    EmptyField(&'static str),
    /// Field exceeds its maximum length in characters.
    TooLong { field: &'static str, max: usize },
}

impl Display for MainCodeValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Code(err) => write!(f, "{err}"),
            Self::EmptyField(field) => write!(f, "`{field}` must not be empty"),
            Self::TooLong { field, max } => {
                write!(f, "`{field}` must be at most {max} characters")
            }
        }
    }
}

impl Error for MainCodeValidationError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Code(err) => Some(err),
            _ => None,
        }
    }
}

impl From<CodeError> for MainCodeValidationError {
    fn from(value: CodeError) -> Self {
        Self::Code(value)
    }
}

/// Caller-editable attributes of a main code.
///
/// The code itself is never part of a draft; it comes from the allocator
/// (or from explicit seeding).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MainCodeDraft {
    pub finding_place: String,
    pub plan_square: Option<String>,
    pub description: Option<String>,
    pub layer: Option<String>,
    pub level: Option<String>,
    pub grave_no: Option<String>,
    pub gis: Option<String>,
}

impl MainCodeDraft {
    /// Creates a draft with only the required field set.
    pub fn new(finding_place: impl Into<String>) -> Self {
        Self {
            finding_place: finding_place.into(),
            ..Self::default()
        }
    }

    /// Validates field presence and lengths.
    pub fn validate(&self) -> Result<(), MainCodeValidationError> {
        if self.finding_place.trim().is_empty() {
            return Err(MainCodeValidationError::EmptyField("finding_place"));
        }
        check_len("finding_place", Some(&self.finding_place), FINDING_PLACE_MAX_CHARS)?;
        check_len("plan_square", self.plan_square.as_deref(), SHORT_FIELD_MAX_CHARS)?;
        check_len("layer", self.layer.as_deref(), SHORT_FIELD_MAX_CHARS)?;
        check_len("level", self.level.as_deref(), SHORT_FIELD_MAX_CHARS)?;
        check_len("grave_no", self.grave_no.as_deref(), SHORT_FIELD_MAX_CHARS)?;
        check_len("gis", self.gis.as_deref(), GIS_MAX_CHARS)?;
        Ok(())
    }

    /// Returns a copy with text trimmed and blank optionals collapsed to `None`.
    pub fn normalized(&self) -> Self {
        Self {
            finding_place: self.finding_place.trim().to_string(),
            plan_square: blank_to_none(self.plan_square.as_deref()),
            description: blank_to_none(self.description.as_deref()),
            layer: blank_to_none(self.layer.as_deref()),
            level: blank_to_none(self.level.as_deref()),
            grave_no: blank_to_none(self.grave_no.as_deref()),
            gis: blank_to_none(self.gis.as_deref()),
        }
    }
}

/// Persisted main code record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MainCode {
    pub id: MainCodeId,
    /// Canonical 3-letter code.
    pub code: String,
    #[serde(flatten)]
    pub attrs: MainCodeDraft,
    /// Epoch milliseconds.
    pub created_at: i64,
    /// Epoch milliseconds.
    pub updated_at: i64,
}

impl MainCode {
    /// Rank of this code in allocation order.
    pub fn rank(&self) -> Result<u16, CodeError> {
        code::encode(&self.code)
    }
}

pub(crate) fn check_len(
    field: &'static str,
    value: Option<&str>,
    max: usize,
) -> Result<(), MainCodeValidationError> {
    match value {
        Some(text) if text.trim().chars().count() > max => {
            Err(MainCodeValidationError::TooLong { field, max })
        }
        _ => Ok(()),
    }
}

pub(crate) fn blank_to_none(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(str::to_string)
}
