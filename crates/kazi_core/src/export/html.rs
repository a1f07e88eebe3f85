//! Printable HTML detail sheet for one artifact.

use super::{flatten, scalar, timestamp};
use crate::model::artifact::Artifact;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use std::collections::BTreeMap;

static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid ws regex"));

const MAX_MEDIA_LINES: usize = 30;

const STYLE: &str = "<style>
  @page { size: A4; margin: 16mm; }
  body { font-family: -apple-system, \"Segoe UI\", Roboto, Arial, sans-serif; color: #0f172a; }
  .card { border: 1px solid #e2e8f0; border-radius: 12px; padding: 12px; margin-bottom: 12px; }
  .card h2 { font-size: 13px; margin: 0 0 8px 0; }
  .row { display: grid; grid-template-columns: 160px 1fr; gap: 10px; padding: 6px 0; border-bottom: 1px solid #f1f5f9; }
  .k { font-size: 11px; font-weight: 700; text-transform: uppercase; color: #334155; }
  .v { font-size: 12px; }
</style>";

type Rows = Vec<(String, String)>;

pub(super) fn render(artifact: &Artifact) -> String {
    let fields = &artifact.fields;
    let full_no = artifact.full_artifact_no();

    let general: Rows = vec![
        ("Full No".into(), full_no.clone()),
        ("Main Code".into(), artifact.main_code_code.clone()),
        (
            "Finding Place".into(),
            artifact.main_code_finding_place.clone(),
        ),
        ("Artifact No".into(), fields.artifact_no.to_string()),
        ("Artifact Date".into(), fields.artifact_date.to_string()),
        ("Form".into(), fields.form_type.as_str().into()),
        (
            "Production Material".into(),
            fields.production_material.clone().unwrap_or_default(),
        ),
        ("Period".into(), fields.period.clone().unwrap_or_default()),
        (
            "Piece Date".into(),
            fields.piece_date.clone().unwrap_or_default(),
        ),
        ("Inventory".into(), yes_no(fields.is_inventory).into()),
        ("Active".into(), yes_no(fields.is_active).into()),
        ("Created".into(), timestamp(artifact.created_at)),
    ];

    let mut out = String::new();
    out.push_str("<!doctype html>\n<html><head><meta charset=\"utf-8\"/>");
    out.push_str(&format!("<title>{}</title>", escape(&full_no)));
    out.push_str(STYLE);
    out.push_str("</head>\n<body>\n");
    out.push_str(&format!(
        "<h1>Artifact {}</h1>\n",
        escape(&full_no)
    ));

    push_card(&mut out, "General", &general);
    if let Some(reference) = non_blank(&fields.source_and_reference) {
        push_card(&mut out, "Source / Reference", &[("Text".into(), reference)]);
    }
    if let Some(notes) = non_blank(&fields.notes) {
        push_card(&mut out, "Notes", &[("Text".into(), notes)]);
    }
    push_card(&mut out, "Form Details", &document_rows(&fields.details));
    push_card(&mut out, "Measurements", &document_rows(&fields.measurements));
    push_card(
        &mut out,
        "Media",
        &media_rows(&fields.images, &fields.drawings),
    );

    out.push_str("</body></html>\n");
    out
}

fn push_card(out: &mut String, title: &str, rows: &[(String, String)]) {
    if rows.is_empty() {
        return;
    }
    out.push_str(&format!("<div class=\"card\"><h2>{}</h2>\n", escape(title)));
    for (key, value) in rows {
        out.push_str(&format!(
            "<div class=\"row\"><div class=\"k\">{}</div><div class=\"v\">{}</div></div>\n",
            escape(key),
            escape(value).replace('\n', "<br/>")
        ));
    }
    out.push_str("</div>\n");
}

fn document_rows(document: &Value) -> Rows {
    let mut flat = BTreeMap::new();
    flatten("", document, &mut flat);
    flat.into_iter()
        .map(|(key, value)| (humanize_key(key.trim_start_matches('.')), value))
        .collect()
}

fn media_rows(images: &Value, drawings: &Value) -> Rows {
    let images = images.as_array().map(Vec::as_slice).unwrap_or_default();
    let drawings = drawings.as_array().map(Vec::as_slice).unwrap_or_default();

    let mut rows: Rows = vec![
        ("Photo Count".into(), images.len().to_string()),
        ("Drawing Count".into(), drawings.len().to_string()),
    ];
    if !images.is_empty() {
        rows.push(("Photos".into(), media_list(images)));
    }
    if !drawings.is_empty() {
        rows.push(("Drawings".into(), media_list(drawings)));
    }
    rows
}

fn media_list(items: &[Value]) -> String {
    let mut lines: Vec<String> = items
        .iter()
        .take(MAX_MEDIA_LINES)
        .map(|item| match item {
            Value::Object(map) => map
                .get("name")
                .map(scalar)
                .unwrap_or_else(|| item.to_string()),
            other => scalar(other),
        })
        .collect();
    if items.len() > MAX_MEDIA_LINES {
        lines.push(format!("(+{} more)", items.len() - MAX_MEDIA_LINES));
    }
    lines.join("\n")
}

/// `obverse.legend_text` -> `Obverse / Legend Text`.
fn humanize_key(key: &str) -> String {
    let spaced = key.replace('.', " / ").replace('_', " ");
    WHITESPACE_RE
        .replace_all(spaced.trim(), " ")
        .split(' ')
        .map(capitalize)
        .collect::<Vec<_>>()
        .join(" ")
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

fn escape(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn non_blank(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(str::to_string)
}

fn yes_no(value: bool) -> &'static str {
    if value {
        "Yes"
    } else {
        "No"
    }
}
