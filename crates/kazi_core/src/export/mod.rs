//! Single-artifact document export.
//!
//! # Responsibility
//! - Flatten an artifact into ordered `(field, value)` pairs.
//! - Render CSV, HTML and JSON documents named after the full artifact number.
//!
//! # Invariants
//! - Base fields come first in a fixed order; every other flattened key
//!   follows in alphabetical order.
//! - Nested JSON objects flatten to dotted keys; arrays stay JSON text.

mod csv;
mod html;

use crate::model::artifact::Artifact;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Supported export formats.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ExportFormat {
    #[default]
    Csv,
    Html,
    Json,
}

impl ExportFormat {
    /// Parses `csv | html | json`, trimmed and case-insensitive.
    pub fn parse(value: &str) -> Result<Self, ExportError> {
        match value.trim().to_ascii_lowercase().as_str() {
            "" | "csv" => Ok(Self::Csv),
            "html" => Ok(Self::Html),
            "json" => Ok(Self::Json),
            other => Err(ExportError::UnsupportedFormat(other.to_string())),
        }
    }

    /// File extension without the dot.
    pub fn extension(self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Html => "html",
            Self::Json => "json",
        }
    }

    /// MIME type of the rendered document.
    pub fn content_type(self) -> &'static str {
        match self {
            Self::Csv => "text/csv; charset=utf-8",
            Self::Html => "text/html; charset=utf-8",
            Self::Json => "application/json",
        }
    }
}

/// Export failure.
#[derive(Debug)]
pub enum ExportError {
    UnsupportedFormat(String),
    Serialize(serde_json::Error),
}

impl Display for ExportError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnsupportedFormat(value) => write!(
                f,
                "unsupported export format `{value}`; expected csv|html|json"
            ),
            Self::Serialize(err) => write!(f, "failed to serialize artifact: {err}"),
        }
    }
}

impl Error for ExportError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Serialize(err) => Some(err),
            Self::UnsupportedFormat(_) => None,
        }
    }
}

impl From<serde_json::Error> for ExportError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serialize(value)
    }
}

/// Rendered document ready to be written or served.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportDocument {
    /// `<full_artifact_no>.<extension>`.
    pub filename: String,
    pub content_type: &'static str,
    pub bytes: Vec<u8>,
}

/// Renders `artifact` as a document in `format`.
pub fn export_artifact(
    artifact: &Artifact,
    format: ExportFormat,
) -> Result<ExportDocument, ExportError> {
    let bytes = match format {
        ExportFormat::Csv => csv::render(&artifact_key_values(artifact)).into_bytes(),
        ExportFormat::Html => html::render(artifact).into_bytes(),
        ExportFormat::Json => serde_json::to_vec_pretty(&artifact_json(artifact)?)?,
    };

    Ok(ExportDocument {
        filename: format!("{}.{}", artifact.full_artifact_no(), format.extension()),
        content_type: format.content_type(),
        bytes,
    })
}

/// Flattens an artifact into ordered `(field, value)` pairs.
pub fn artifact_key_values(artifact: &Artifact) -> Vec<(String, String)> {
    let fields = &artifact.fields;
    let base: Vec<(&str, String)> = vec![
        ("full_artifact_no", artifact.full_artifact_no()),
        ("main_code", artifact.main_code_code.clone()),
        (
            "main_code_finding_place",
            artifact.main_code_finding_place.clone(),
        ),
        ("artifact_no", fields.artifact_no.to_string()),
        ("artifact_date", fields.artifact_date.to_string()),
        ("form_type", fields.form_type.as_str().to_string()),
        ("production_material", text(&fields.production_material)),
        ("period", text(&fields.period)),
        ("piece_date", text(&fields.piece_date)),
        ("notes", text(&fields.notes)),
        ("source_and_reference", text(&fields.source_and_reference)),
        ("is_active", fields.is_active.to_string()),
        ("is_inventory", fields.is_inventory.to_string()),
    ];

    let mut rest = BTreeMap::new();
    flatten("details", &fields.details, &mut rest);
    flatten("measurements", &fields.measurements, &mut rest);
    flatten("images", &fields.images, &mut rest);
    flatten("drawings", &fields.drawings, &mut rest);
    rest.insert("created_at".to_string(), timestamp(artifact.created_at));
    rest.insert("updated_at".to_string(), timestamp(artifact.updated_at));

    base.into_iter()
        .map(|(key, value)| (key.to_string(), value))
        .chain(rest)
        .collect()
}

fn artifact_json(artifact: &Artifact) -> Result<Value, ExportError> {
    let mut value = serde_json::to_value(artifact)?;
    if let Value::Object(map) = &mut value {
        map.insert(
            "full_artifact_no".to_string(),
            Value::String(artifact.full_artifact_no()),
        );
    }
    Ok(value)
}

pub(crate) fn flatten(key: &str, value: &Value, out: &mut BTreeMap<String, String>) {
    match value {
        Value::Object(map) => {
            for (child, nested) in map {
                flatten(&format!("{key}.{child}"), nested, out);
            }
        }
        Value::Array(_) => {
            out.insert(key.to_string(), value.to_string());
        }
        other => {
            out.insert(key.to_string(), scalar(other));
        }
    }
}

/// Renders a JSON scalar the way it should read in a document cell.
pub(crate) fn scalar(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

fn text(value: &Option<String>) -> String {
    value.clone().unwrap_or_default()
}

pub(crate) fn timestamp(epoch_ms: i64) -> String {
    DateTime::<Utc>::from_timestamp_millis(epoch_ms)
        .map(|value| value.to_rfc3339())
        .unwrap_or_else(|| epoch_ms.to_string())
}

#[cfg(test)]
mod tests {
    use super::{artifact_key_values, export_artifact, ExportError, ExportFormat};
    use crate::model::artifact::{Artifact, ArtifactDraft};
    use chrono::NaiveDate;
    use serde_json::json;
    use uuid::Uuid;

    fn sample() -> Artifact {
        let mut fields = ArtifactDraft::new(
            Uuid::new_v4(),
            7,
            NaiveDate::from_ymd_opt(2024, 7, 14).unwrap(),
        );
        fields.notes = Some("found near wall, \"north\" side".to_string());
        fields.details = json!({"obverse": {"legend": "IMP"}, "weight_g": 3.4});
        fields.images = json!(["a.jpg"]);
        Artifact {
            id: Uuid::new_v4(),
            fields,
            main_code_code: "AAB".to_string(),
            main_code_finding_place: "Trench 4".to_string(),
            created_at: 0,
            updated_at: 0,
        }
    }

    #[test]
    fn key_values_put_base_fields_first_then_sorted_rest() {
        let pairs = artifact_key_values(&sample());
        let keys: Vec<&str> = pairs.iter().map(|(key, _)| key.as_str()).collect();

        assert_eq!(keys[0], "full_artifact_no");
        assert_eq!(pairs[0].1, "AAB0007");
        assert_eq!(keys[12], "is_inventory");
        assert_eq!(
            &keys[13..],
            [
                "created_at",
                "details.obverse.legend",
                "details.weight_g",
                "drawings",
                "images",
                "updated_at"
            ]
        );
        let images = pairs.iter().find(|(key, _)| key == "images").unwrap();
        assert_eq!(images.1, "[\"a.jpg\"]");
    }

    #[test]
    fn csv_export_has_bom_header_and_quoted_values() {
        let document = export_artifact(&sample(), ExportFormat::Csv).unwrap();
        let text = String::from_utf8(document.bytes).unwrap();

        assert_eq!(document.filename, "AAB0007.csv");
        assert!(text.starts_with("\u{feff}field,value\r\n"));
        assert!(text.contains("notes,\"found near wall, \"\"north\"\" side\"\r\n"));
    }

    #[test]
    fn html_export_escapes_markup() {
        let mut artifact = sample();
        artifact.fields.notes = Some("<b>rim</b> & base".to_string());
        let document = export_artifact(&artifact, ExportFormat::Html).unwrap();
        let text = String::from_utf8(document.bytes).unwrap();

        assert!(text.contains("&lt;b&gt;rim&lt;/b&gt; &amp; base"));
        assert!(text.contains("AAB0007"));
        assert!(text.contains("Obverse / Legend"));
    }

    #[test]
    fn json_export_includes_full_number() {
        let document = export_artifact(&sample(), ExportFormat::Json).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&document.bytes).unwrap();
        assert_eq!(value["full_artifact_no"], "AAB0007");
        assert_eq!(value["artifact_no"], 7);
        assert_eq!(value["form_type"], "GENEL");
    }

    #[test]
    fn unknown_format_is_rejected() {
        assert_eq!(ExportFormat::parse(" HTML ").unwrap(), ExportFormat::Html);
        assert_eq!(ExportFormat::parse("").unwrap(), ExportFormat::Csv);
        assert!(matches!(
            ExportFormat::parse("pdf"),
            Err(ExportError::UnsupportedFormat(value)) if value == "pdf"
        ));
    }
}
