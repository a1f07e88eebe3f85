//! Artifact domain model and composite identifier.
//!
//! # Responsibility
//! - Define artifact records registered under a main code.
//! - Derive the human-readable full artifact number.
//!
//! # Invariants
//! - `(main_code_id, artifact_no)` is unique across all artifacts.
//! - `artifact_no` is caller-supplied and `>= 1`.
//! - `full_artifact_no` is recomputed on every read and never stored.

use crate::model::main_code::{blank_to_none, MainCodeId};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Stable row identifier of an artifact.
pub type ArtifactId = Uuid;

/// Minimum digits of the numeric suffix in a full artifact number.
pub const ARTIFACT_NO_WIDTH: usize = 4;

const LONG_FIELD_MAX_CHARS: usize = 120;
const SHORT_FIELD_MAX_CHARS: usize = 60;

/// Builds the display identifier `code ++ zero_pad(artifact_no, 4)`.
///
/// Numbers wider than four digits are kept whole: `("ZZZ", 12345)` gives
/// `"ZZZ12345"`.
pub fn full_artifact_no(main_code: &str, artifact_no: u32) -> String {
    format!("{main_code}{artifact_no:0width$}", width = ARTIFACT_NO_WIDTH)
}

/// Recording form used for an artifact.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FormType {
    /// General find.
    #[default]
    Genel,
    /// Coin.
    Sikke,
    /// Ceramic.
    Seramik,
    /// Grave.
    Mezar,
}

impl FormType {
    /// Stable storage/wire value.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Genel => "GENEL",
            Self::Sikke => "SIKKE",
            Self::Seramik => "SERAMIK",
            Self::Mezar => "MEZAR",
        }
    }

    /// Parses a storage/wire value, case-insensitively.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "GENEL" => Some(Self::Genel),
            "SIKKE" => Some(Self::Sikke),
            "SERAMIK" => Some(Self::Seramik),
            "MEZAR" => Some(Self::Mezar),
            _ => None,
        }
    }
}

impl Display for FormType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Validation failure for artifact input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArtifactValidationError {
    /// `artifact_no` must be a positive integer.
    NonPositiveNumber,
    /// Field exceeds its maximum length in characters.
    TooLong { field: &'static str, max: usize },
    /// JSON document does not have the expected top-level shape.
    InvalidJsonShape {
        field: &'static str,
        expected: &'static str,
    },
}

impl Display for ArtifactValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NonPositiveNumber => write!(f, "`artifact_no` must be at least 1"),
            Self::TooLong { field, max } => {
                write!(f, "`{field}` must be at most {max} characters")
            }
            Self::InvalidJsonShape { field, expected } => {
                write!(f, "`{field}` must be a JSON {expected}")
            }
        }
    }
}

impl Error for ArtifactValidationError {}

/// Caller-supplied artifact fields used for create and update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactDraft {
    pub main_code_id: MainCodeId,
    pub artifact_no: u32,
    pub artifact_date: NaiveDate,
    #[serde(default)]
    pub form_type: FormType,
    pub production_material: Option<String>,
    pub period: Option<String>,
    pub finding_shape: Option<String>,
    pub level: Option<String>,
    pub excavation_inv_no: Option<String>,
    pub museum_inv_no: Option<String>,
    pub piece_date: Option<String>,
    pub notes: Option<String>,
    pub source_and_reference: Option<String>,
    pub is_active: bool,
    pub is_inventory: bool,
    /// Form-specific fields, a JSON object.
    pub details: Value,
    /// Measurements and colour info, a JSON object.
    pub measurements: Value,
    /// Image metadata, a JSON array.
    pub images: Value,
    /// Drawing metadata, a JSON array.
    pub drawings: Value,
}

impl ArtifactDraft {
    /// Creates a draft with defaults for every optional field.
    pub fn new(main_code_id: MainCodeId, artifact_no: u32, artifact_date: NaiveDate) -> Self {
        Self {
            main_code_id,
            artifact_no,
            artifact_date,
            form_type: FormType::Genel,
            production_material: None,
            period: None,
            finding_shape: None,
            level: None,
            excavation_inv_no: None,
            museum_inv_no: None,
            piece_date: None,
            notes: None,
            source_and_reference: None,
            is_active: true,
            is_inventory: false,
            details: Value::Object(Map::new()),
            measurements: Value::Object(Map::new()),
            images: Value::Array(Vec::new()),
            drawings: Value::Array(Vec::new()),
        }
    }

    /// Validates number, text lengths and JSON document shapes.
    pub fn validate(&self) -> Result<(), ArtifactValidationError> {
        if self.artifact_no == 0 {
            return Err(ArtifactValidationError::NonPositiveNumber);
        }

        let long_fields = [
            ("production_material", &self.production_material),
            ("period", &self.period),
            ("finding_shape", &self.finding_shape),
        ];
        for (field, value) in long_fields {
            check_len(field, value.as_deref(), LONG_FIELD_MAX_CHARS)?;
        }
        let short_fields = [
            ("level", &self.level),
            ("excavation_inv_no", &self.excavation_inv_no),
            ("museum_inv_no", &self.museum_inv_no),
            ("piece_date", &self.piece_date),
        ];
        for (field, value) in short_fields {
            check_len(field, value.as_deref(), SHORT_FIELD_MAX_CHARS)?;
        }

        expect_object("details", &self.details)?;
        expect_object("measurements", &self.measurements)?;
        expect_array("images", &self.images)?;
        expect_array("drawings", &self.drawings)?;
        Ok(())
    }

    /// Returns a copy with blank optional text collapsed to `None`.
    pub fn normalized(&self) -> Self {
        Self {
            production_material: blank_to_none(self.production_material.as_deref()),
            period: blank_to_none(self.period.as_deref()),
            finding_shape: blank_to_none(self.finding_shape.as_deref()),
            level: blank_to_none(self.level.as_deref()),
            excavation_inv_no: blank_to_none(self.excavation_inv_no.as_deref()),
            museum_inv_no: blank_to_none(self.museum_inv_no.as_deref()),
            piece_date: blank_to_none(self.piece_date.as_deref()),
            notes: blank_to_none(self.notes.as_deref()),
            source_and_reference: blank_to_none(self.source_and_reference.as_deref()),
            ..self.clone()
        }
    }
}

/// Persisted artifact joined with its parent main code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Artifact {
    pub id: ArtifactId,
    #[serde(flatten)]
    pub fields: ArtifactDraft,
    /// Parent main code text.
    pub main_code_code: String,
    /// Parent main code finding place.
    pub main_code_finding_place: String,
    /// Epoch milliseconds.
    pub created_at: i64,
    /// Epoch milliseconds.
    pub updated_at: i64,
}

impl Artifact {
    /// Display identifier, e.g. `AAA0007`.
    pub fn full_artifact_no(&self) -> String {
        full_artifact_no(&self.main_code_code, self.fields.artifact_no)
    }
}

fn check_len(
    field: &'static str,
    value: Option<&str>,
    max: usize,
) -> Result<(), ArtifactValidationError> {
    match value {
        Some(text) if text.trim().chars().count() > max => {
            Err(ArtifactValidationError::TooLong { field, max })
        }
        _ => Ok(()),
    }
}

fn expect_object(field: &'static str, value: &Value) -> Result<(), ArtifactValidationError> {
    if value.is_object() {
        Ok(())
    } else {
        Err(ArtifactValidationError::InvalidJsonShape {
            field,
            expected: "object",
        })
    }
}

fn expect_array(field: &'static str, value: &Value) -> Result<(), ArtifactValidationError> {
    if value.is_array() {
        Ok(())
    } else {
        Err(ArtifactValidationError::InvalidJsonShape {
            field,
            expected: "array",
        })
    }
}
