//! Artifact repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Provide CRUD and filtered listing over `artifacts`.
//! - Answer the `(main_code, artifact_no)` uniqueness question.
//!
//! # Invariants
//! - Write paths validate drafts before SQL mutations.
//! - The storage UNIQUE constraint on `(main_code_id, artifact_no)` is the
//!   final authority; its violation surfaces as `DuplicateIdentifier`.
//! - Read models always carry the parent code so `full_artifact_no` can be
//!   derived without another query.

use crate::db::is_unique_violation;
use crate::model::artifact::{
    full_artifact_no, Artifact, ArtifactDraft, ArtifactId, FormType,
};
use crate::model::code;
use crate::model::main_code::MainCodeId;
use crate::repo::{
    bool_to_int, ensure_connection_ready, like_pattern, normalize_page, normalize_page_size,
    Page, RepoError, RepoResult,
};
use chrono::NaiveDate;
use log::info;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Row};
use uuid::Uuid;

const DATE_FORMAT: &str = "%Y-%m-%d";

const ARTIFACT_SELECT_SQL: &str = "SELECT
    a.id,
    a.main_code_id,
    a.artifact_no,
    a.artifact_date,
    a.form_type,
    a.production_material,
    a.period,
    a.finding_shape,
    a.level,
    a.excavation_inv_no,
    a.museum_inv_no,
    a.piece_date,
    a.notes,
    a.source_and_reference,
    a.is_active,
    a.is_inventory,
    a.details,
    a.measurements,
    a.images,
    a.drawings,
    a.created_at,
    a.updated_at,
    m.code AS main_code_code,
    m.finding_place AS main_code_finding_place
FROM artifacts a
INNER JOIN main_codes m ON m.id = a.main_code_id";

const REQUIRED_SCHEMA: &[(&str, &[&str])] = &[
    ("main_codes", &["id", "code", "finding_place"]),
    (
        "artifacts",
        &[
            "id",
            "main_code_id",
            "artifact_no",
            "artifact_date",
            "form_type",
            "details",
            "measurements",
            "images",
            "drawings",
            "created_at",
            "updated_at",
        ],
    ),
];

/// Sort order for artifact listings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ArtifactOrdering {
    CreatedAtAsc,
    #[default]
    CreatedAtDesc,
    ArtifactDateAsc,
    ArtifactDateDesc,
    ArtifactNoAsc,
    ArtifactNoDesc,
    MainCodeAsc,
    MainCodeDesc,
}

impl ArtifactOrdering {
    /// Parses `[-]created_at | [-]artifact_date | [-]artifact_no | [-]main_code`.
    ///
    /// `main_code__code` is accepted as an alias of `main_code`.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "created_at" => Some(Self::CreatedAtAsc),
            "-created_at" => Some(Self::CreatedAtDesc),
            "artifact_date" => Some(Self::ArtifactDateAsc),
            "-artifact_date" => Some(Self::ArtifactDateDesc),
            "artifact_no" => Some(Self::ArtifactNoAsc),
            "-artifact_no" => Some(Self::ArtifactNoDesc),
            "main_code" | "main_code__code" => Some(Self::MainCodeAsc),
            "-main_code" | "-main_code__code" => Some(Self::MainCodeDesc),
            _ => None,
        }
    }

    fn order_by_sql(self) -> &'static str {
        match self {
            Self::CreatedAtAsc => "a.created_at ASC, m.code ASC, a.artifact_no ASC",
            Self::CreatedAtDesc => "a.created_at DESC, m.code DESC, a.artifact_no DESC",
            Self::ArtifactDateAsc => "a.artifact_date ASC, m.code ASC, a.artifact_no ASC",
            Self::ArtifactDateDesc => "a.artifact_date DESC, m.code DESC, a.artifact_no DESC",
            Self::ArtifactNoAsc => "a.artifact_no ASC, m.code ASC",
            Self::ArtifactNoDesc => "a.artifact_no DESC, m.code DESC",
            Self::MainCodeAsc => "m.code ASC, a.artifact_no ASC",
            Self::MainCodeDesc => "m.code DESC, a.artifact_no DESC",
        }
    }
}

/// Filter and pagination options for listing artifacts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArtifactListQuery {
    /// Exact parent main code.
    pub main_code_id: Option<MainCodeId>,
    pub form_type: Option<FormType>,
    /// Case-insensitive substring of the parent code.
    pub main_code_code: Option<String>,
    /// Case-insensitive substring of the parent finding place.
    pub finding_place: Option<String>,
    pub artifact_no: Option<u32>,
    pub production_material: Option<String>,
    pub period: Option<String>,
    /// Inclusive lower bound on `artifact_date`.
    pub date_from: Option<NaiveDate>,
    /// Inclusive upper bound on `artifact_date`.
    pub date_to: Option<NaiveDate>,
    /// Free text over code, finding place, material, period, notes,
    /// piece date and source/reference.
    pub q: Option<String>,
    pub ordering: ArtifactOrdering,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

/// Repository interface for artifact operations.
pub trait ArtifactRepository {
    fn create_artifact(&self, draft: &ArtifactDraft) -> RepoResult<Artifact>;
    fn update_artifact(&self, id: ArtifactId, draft: &ArtifactDraft) -> RepoResult<Artifact>;
    fn get_artifact(&self, id: ArtifactId) -> RepoResult<Option<Artifact>>;
    /// Looks an artifact up by its parent code and number.
    fn get_by_number(&self, code: &str, artifact_no: u32) -> RepoResult<Option<Artifact>>;
    fn list_artifacts(&self, query: &ArtifactListQuery) -> RepoResult<Page<Artifact>>;
    fn delete_artifact(&self, id: ArtifactId) -> RepoResult<()>;
    /// Returns whether another artifact already uses the pair.
    fn number_taken(
        &self,
        main_code_id: MainCodeId,
        artifact_no: u32,
        exclude_id: Option<ArtifactId>,
    ) -> RepoResult<bool>;
    fn main_code_exists(&self, main_code_id: MainCodeId) -> RepoResult<bool>;
}

/// SQLite-backed artifact repository.
pub struct SqliteArtifactRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteArtifactRepository<'conn> {
    /// Constructs a repository from a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn, REQUIRED_SCHEMA)?;
        Ok(Self { conn })
    }
}

impl ArtifactRepository for SqliteArtifactRepository<'_> {
    fn create_artifact(&self, draft: &ArtifactDraft) -> RepoResult<Artifact> {
        draft.validate()?;
        let draft = draft.normalized();
        self.require_main_code(draft.main_code_id)?;
        let id = Uuid::new_v4();
        let json = JsonColumns::encode(&draft)?;

        self.conn
            .execute(
                "INSERT INTO artifacts (
                    id,
                    main_code_id,
                    artifact_no,
                    artifact_date,
                    form_type,
                    production_material,
                    period,
                    finding_shape,
                    level,
                    excavation_inv_no,
                    museum_inv_no,
                    piece_date,
                    notes,
                    source_and_reference,
                    is_active,
                    is_inventory,
                    details,
                    measurements,
                    images,
                    drawings
                ) VALUES (
                    ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10,
                    ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20
                );",
                params![
                    id.to_string(),
                    draft.main_code_id.to_string(),
                    draft.artifact_no,
                    draft.artifact_date.format(DATE_FORMAT).to_string(),
                    draft.form_type.as_str(),
                    draft.production_material,
                    draft.period,
                    draft.finding_shape,
                    draft.level,
                    draft.excavation_inv_no,
                    draft.museum_inv_no,
                    draft.piece_date,
                    draft.notes,
                    draft.source_and_reference,
                    bool_to_int(draft.is_active),
                    bool_to_int(draft.is_inventory),
                    json.details,
                    json.measurements,
                    json.images,
                    json.drawings,
                ],
            )
            .map_err(|err| map_write_error(err, draft.artifact_no))?;

        info!(
            "event=artifact_create module=repo status=ok id={} artifact_no={}",
            id, draft.artifact_no
        );
        self.read_back(id)
    }

    fn update_artifact(&self, id: ArtifactId, draft: &ArtifactDraft) -> RepoResult<Artifact> {
        draft.validate()?;
        let draft = draft.normalized();
        self.require_main_code(draft.main_code_id)?;
        let json = JsonColumns::encode(&draft)?;

        let changed = self
            .conn
            .execute(
                "UPDATE artifacts
                 SET
                    main_code_id = ?2,
                    artifact_no = ?3,
                    artifact_date = ?4,
                    form_type = ?5,
                    production_material = ?6,
                    period = ?7,
                    finding_shape = ?8,
                    level = ?9,
                    excavation_inv_no = ?10,
                    museum_inv_no = ?11,
                    piece_date = ?12,
                    notes = ?13,
                    source_and_reference = ?14,
                    is_active = ?15,
                    is_inventory = ?16,
                    details = ?17,
                    measurements = ?18,
                    images = ?19,
                    drawings = ?20,
                    updated_at = (strftime('%s', 'now') * 1000)
                 WHERE id = ?1;",
                params![
                    id.to_string(),
                    draft.main_code_id.to_string(),
                    draft.artifact_no,
                    draft.artifact_date.format(DATE_FORMAT).to_string(),
                    draft.form_type.as_str(),
                    draft.production_material,
                    draft.period,
                    draft.finding_shape,
                    draft.level,
                    draft.excavation_inv_no,
                    draft.museum_inv_no,
                    draft.piece_date,
                    draft.notes,
                    draft.source_and_reference,
                    bool_to_int(draft.is_active),
                    bool_to_int(draft.is_inventory),
                    json.details,
                    json.measurements,
                    json.images,
                    json.drawings,
                ],
            )
            .map_err(|err| map_write_error(err, draft.artifact_no))?;

        if changed == 0 {
            return Err(not_found(id));
        }

        self.read_back(id)
    }

    fn get_artifact(&self, id: ArtifactId) -> RepoResult<Option<Artifact>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{ARTIFACT_SELECT_SQL} WHERE a.id = ?1;"))?;
        let mut rows = stmt.query([id.to_string()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_artifact_row(row)?));
        }
        Ok(None)
    }

    fn get_by_number(&self, code: &str, artifact_no: u32) -> RepoResult<Option<Artifact>> {
        let code = code::normalize_code(code)?;
        let mut stmt = self.conn.prepare(&format!(
            "{ARTIFACT_SELECT_SQL} WHERE m.code = ?1 AND a.artifact_no = ?2;"
        ))?;
        let mut rows = stmt.query(params![code, artifact_no])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_artifact_row(row)?));
        }
        Ok(None)
    }

    fn list_artifacts(&self, query: &ArtifactListQuery) -> RepoResult<Page<Artifact>> {
        let mut where_sql = String::from(" WHERE 1 = 1");
        let mut bind_values: Vec<Value> = Vec::new();

        if let Some(main_code_id) = query.main_code_id {
            where_sql.push_str(" AND a.main_code_id = ?");
            bind_values.push(Value::Text(main_code_id.to_string()));
        }

        if let Some(form_type) = query.form_type {
            where_sql.push_str(" AND a.form_type = ?");
            bind_values.push(Value::Text(form_type.as_str().to_string()));
        }

        let substring_filters = [
            ("m.code", query.main_code_code.as_deref()),
            ("m.finding_place", query.finding_place.as_deref()),
            ("a.production_material", query.production_material.as_deref()),
            ("a.period", query.period.as_deref()),
        ];
        for (column, value) in substring_filters {
            if let Some(text) = non_blank(value) {
                where_sql.push_str(&format!(" AND {column} LIKE ? ESCAPE '\\'"));
                bind_values.push(Value::Text(like_pattern(text)));
            }
        }

        if let Some(artifact_no) = query.artifact_no {
            where_sql.push_str(" AND a.artifact_no = ?");
            bind_values.push(Value::Integer(i64::from(artifact_no)));
        }

        if let Some(date_from) = query.date_from {
            where_sql.push_str(" AND a.artifact_date >= ?");
            bind_values.push(Value::Text(date_from.format(DATE_FORMAT).to_string()));
        }

        if let Some(date_to) = query.date_to {
            where_sql.push_str(" AND a.artifact_date <= ?");
            bind_values.push(Value::Text(date_to.format(DATE_FORMAT).to_string()));
        }

        if let Some(q) = non_blank(query.q.as_deref()) {
            let columns = [
                "m.code",
                "m.finding_place",
                "a.production_material",
                "a.period",
                "a.notes",
                "a.piece_date",
                "a.source_and_reference",
            ];
            let clauses: Vec<String> = columns
                .iter()
                .map(|column| format!("{column} LIKE ? ESCAPE '\\'"))
                .collect();
            where_sql.push_str(&format!(" AND ({})", clauses.join(" OR ")));
            let pattern = like_pattern(q);
            for _ in columns {
                bind_values.push(Value::Text(pattern.clone()));
            }
        }

        let total: i64 = self.conn.query_row(
            &format!(
                "SELECT COUNT(*)
                 FROM artifacts a
                 INNER JOIN main_codes m ON m.id = a.main_code_id{where_sql};"
            ),
            params_from_iter(bind_values.iter()),
            |row| row.get(0),
        )?;

        let page = normalize_page(query.page);
        let page_size = normalize_page_size(query.page_size);
        let offset = i64::from(page - 1) * i64::from(page_size);

        let sql = format!(
            "{ARTIFACT_SELECT_SQL}{where_sql} ORDER BY {} LIMIT ? OFFSET ?;",
            query.ordering.order_by_sql()
        );
        bind_values.push(Value::Integer(i64::from(page_size)));
        bind_values.push(Value::Integer(offset));

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut items = Vec::new();
        while let Some(row) = rows.next()? {
            items.push(parse_artifact_row(row)?);
        }

        Ok(Page {
            items,
            total: total.max(0) as u64,
            page,
            page_size,
        })
    }

    fn delete_artifact(&self, id: ArtifactId) -> RepoResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM artifacts WHERE id = ?1;", [id.to_string()])?;

        if changed == 0 {
            return Err(not_found(id));
        }

        Ok(())
    }

    fn number_taken(
        &self,
        main_code_id: MainCodeId,
        artifact_no: u32,
        exclude_id: Option<ArtifactId>,
    ) -> RepoResult<bool> {
        let exists: i64 = self.conn.query_row(
            "SELECT EXISTS(
                SELECT 1
                FROM artifacts
                WHERE main_code_id = ?1
                  AND artifact_no = ?2
                  AND (?3 IS NULL OR id <> ?3)
            );",
            params![
                main_code_id.to_string(),
                artifact_no,
                exclude_id.map(|id| id.to_string()),
            ],
            |row| row.get(0),
        )?;
        Ok(exists == 1)
    }

    fn main_code_exists(&self, main_code_id: MainCodeId) -> RepoResult<bool> {
        let exists: i64 = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM main_codes WHERE id = ?1);",
            [main_code_id.to_string()],
            |row| row.get(0),
        )?;
        Ok(exists == 1)
    }
}

impl SqliteArtifactRepository<'_> {
    fn require_main_code(&self, main_code_id: MainCodeId) -> RepoResult<()> {
        if self.main_code_exists(main_code_id)? {
            Ok(())
        } else {
            Err(RepoError::NotFound {
                entity: "main code",
                id: main_code_id.to_string(),
            })
        }
    }

    fn read_back(&self, id: ArtifactId) -> RepoResult<Artifact> {
        self.get_artifact(id)?
            .ok_or_else(|| RepoError::InvalidData(format!("artifact {id} missing after write")))
    }
}

/// JSON documents serialized for TEXT columns.
struct JsonColumns {
    details: String,
    measurements: String,
    images: String,
    drawings: String,
}

impl JsonColumns {
    fn encode(draft: &ArtifactDraft) -> RepoResult<Self> {
        let encode = |field: &str, value: &serde_json::Value| {
            serde_json::to_string(value).map_err(|err| {
                RepoError::InvalidData(format!("cannot serialize artifacts.{field}: {err}"))
            })
        };
        Ok(Self {
            details: encode("details", &draft.details)?,
            measurements: encode("measurements", &draft.measurements)?,
            images: encode("images", &draft.images)?,
            drawings: encode("drawings", &draft.drawings)?,
        })
    }
}

fn parse_artifact_row(row: &Row<'_>) -> RepoResult<Artifact> {
    let id = parse_uuid(row, "id")?;
    let main_code_id = parse_uuid(row, "main_code_id")?;

    let date_text: String = row.get("artifact_date")?;
    let artifact_date = NaiveDate::parse_from_str(&date_text, DATE_FORMAT).map_err(|_| {
        RepoError::InvalidData(format!(
            "invalid date `{date_text}` in artifacts.artifact_date"
        ))
    })?;

    let form_text: String = row.get("form_type")?;
    let form_type = FormType::parse(&form_text).ok_or_else(|| {
        RepoError::InvalidData(format!("invalid form type `{form_text}` in artifacts.form_type"))
    })?;

    let draft = ArtifactDraft {
        main_code_id,
        artifact_no: row.get("artifact_no")?,
        artifact_date,
        form_type,
        production_material: row.get("production_material")?,
        period: row.get("period")?,
        finding_shape: row.get("finding_shape")?,
        level: row.get("level")?,
        excavation_inv_no: row.get("excavation_inv_no")?,
        museum_inv_no: row.get("museum_inv_no")?,
        piece_date: row.get("piece_date")?,
        notes: row.get("notes")?,
        source_and_reference: row.get("source_and_reference")?,
        is_active: parse_flag(row, "is_active")?,
        is_inventory: parse_flag(row, "is_inventory")?,
        details: parse_json(row, "details")?,
        measurements: parse_json(row, "measurements")?,
        images: parse_json(row, "images")?,
        drawings: parse_json(row, "drawings")?,
    };

    Ok(Artifact {
        id,
        fields: draft,
        main_code_code: row.get("main_code_code")?,
        main_code_finding_place: row.get("main_code_finding_place")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

fn parse_uuid(row: &Row<'_>, column: &str) -> RepoResult<Uuid> {
    let text: String = row.get(column)?;
    Uuid::parse_str(&text).map_err(|_| {
        RepoError::InvalidData(format!("invalid uuid value `{text}` in artifacts.{column}"))
    })
}

fn parse_flag(row: &Row<'_>, column: &str) -> RepoResult<bool> {
    match row.get::<_, i64>(column)? {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(RepoError::InvalidData(format!(
            "invalid {column} value `{other}` in artifacts.{column}"
        ))),
    }
}

fn parse_json(row: &Row<'_>, column: &str) -> RepoResult<serde_json::Value> {
    let text: String = row.get(column)?;
    serde_json::from_str(&text).map_err(|err| {
        RepoError::InvalidData(format!("invalid JSON in artifacts.{column}: {err}"))
    })
}

fn map_write_error(err: rusqlite::Error, artifact_no: u32) -> RepoError {
    if is_unique_violation(&err) {
        RepoError::DuplicateIdentifier {
            field: "artifact_no",
            value: artifact_no.to_string(),
        }
    } else {
        RepoError::from(err)
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|text| !text.is_empty())
}

fn not_found(id: ArtifactId) -> RepoError {
    RepoError::NotFound {
        entity: "artifact",
        id: id.to_string(),
    }
}

/// Splits a full artifact number such as `AAA0007` into code and number.
///
/// Only the canonical form produced by `full_artifact_no` is accepted, so
/// `AAA7` and `AAA00007` are rejected.
pub fn parse_full_artifact_no(value: &str) -> Option<(String, u32)> {
    let trimmed = value.trim();
    let code = code::normalize_code(trimmed.get(..code::CODE_LEN)?).ok()?;
    let number_part = trimmed.get(code::CODE_LEN..)?;
    if number_part.is_empty() || !number_part.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let number: u32 = number_part.parse().ok()?;
    if full_artifact_no(&code, number) != format!("{code}{number_part}") {
        return None;
    }
    Some((code, number))
}
