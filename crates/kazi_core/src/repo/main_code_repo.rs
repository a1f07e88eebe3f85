//! Main code repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Create main codes through the allocator, atomically with the cursor.
//! - Provide lookup, filtered listing, attribute updates and deletion.
//!
//! # Invariants
//! - `create_main_code` allocates and inserts in one immediate transaction;
//!   a failed insert leaves the cursor untouched.
//! - `code` is never written by `update_main_code`.
//! - Deleting a main code cascades to its artifacts.

use crate::alloc::{self, allocate_next_code_in_tx, AllocError, SequenceState};
use crate::db::is_unique_violation;
use crate::model::code;
use crate::model::main_code::{MainCode, MainCodeDraft, MainCodeId};
use crate::repo::{
    ensure_connection_ready, like_pattern, normalize_page, normalize_page_size, Page, RepoError,
    RepoResult,
};
use log::info;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Row, TransactionBehavior};
use uuid::Uuid;

const MAIN_CODE_SELECT_SQL: &str = "SELECT
    id,
    code,
    finding_place,
    plan_square,
    description,
    layer,
    level,
    grave_no,
    gis,
    created_at,
    updated_at
FROM main_codes";

const REQUIRED_SCHEMA: &[(&str, &[&str])] = &[
    ("main_code_sequence", &["id", "last_code", "updated_at"]),
    (
        "main_codes",
        &[
            "id",
            "code",
            "finding_place",
            "plan_square",
            "description",
            "layer",
            "level",
            "grave_no",
            "gis",
            "created_at",
            "updated_at",
        ],
    ),
];

/// Sort order for main code listings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MainCodeOrdering {
    CreatedAtAsc,
    #[default]
    CreatedAtDesc,
    CodeAsc,
    CodeDesc,
}

impl MainCodeOrdering {
    /// Parses `created_at | -created_at | code | -code`.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "created_at" => Some(Self::CreatedAtAsc),
            "-created_at" => Some(Self::CreatedAtDesc),
            "code" => Some(Self::CodeAsc),
            "-code" => Some(Self::CodeDesc),
            _ => None,
        }
    }

    fn order_by_sql(self) -> &'static str {
        match self {
            Self::CreatedAtAsc => "created_at ASC, code ASC",
            Self::CreatedAtDesc => "created_at DESC, code DESC",
            Self::CodeAsc => "code ASC",
            Self::CodeDesc => "code DESC",
        }
    }
}

/// Filter and pagination options for listing main codes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MainCodeListQuery {
    /// Case-insensitive substring of `code`.
    pub code: Option<String>,
    /// Case-insensitive substring of `finding_place`.
    pub finding_place: Option<String>,
    /// Case-insensitive substring over code and every descriptive field.
    pub q: Option<String>,
    pub ordering: MainCodeOrdering,
    /// 1-based page number.
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

/// Repository interface for main code operations.
pub trait MainCodeRepository {
    /// Allocates the next code and inserts a main code carrying it.
    fn create_main_code(&mut self, draft: &MainCodeDraft) -> RepoResult<MainCode>;
    /// Inserts a main code with an explicit code, bypassing the cursor.
    fn seed_main_code(&mut self, code: &str, draft: &MainCodeDraft) -> RepoResult<MainCode>;
    fn get_main_code(&self, id: MainCodeId) -> RepoResult<Option<MainCode>>;
    fn get_by_code(&self, code: &str) -> RepoResult<Option<MainCode>>;
    fn list_main_codes(&self, query: &MainCodeListQuery) -> RepoResult<Page<MainCode>>;
    /// Replaces descriptive attributes; the code stays unchanged.
    fn update_main_code(&self, id: MainCodeId, draft: &MainCodeDraft) -> RepoResult<MainCode>;
    /// Deletes a main code and, by cascade, its artifacts.
    fn delete_main_code(&self, id: MainCodeId) -> RepoResult<()>;
    fn sequence_state(&self) -> RepoResult<SequenceState>;
}

/// SQLite-backed main code repository.
pub struct SqliteMainCodeRepository<'conn> {
    conn: &'conn mut Connection,
}

impl<'conn> SqliteMainCodeRepository<'conn> {
    /// Constructs a repository from a migrated connection.
    pub fn try_new(conn: &'conn mut Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn, REQUIRED_SCHEMA)?;
        Ok(Self { conn })
    }
}

impl MainCodeRepository for SqliteMainCodeRepository<'_> {
    fn create_main_code(&mut self, draft: &MainCodeDraft) -> RepoResult<MainCode> {
        draft.validate()?;
        let draft = draft.normalized();
        let id = Uuid::new_v4();

        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(AllocError::from)?;
        let allocation = allocate_next_code_in_tx(&tx)?;
        insert_main_code(&tx, id, &allocation.code, &draft)?;
        tx.commit().map_err(AllocError::from)?;

        info!(
            "event=main_code_create module=repo status=ok code={} skipped={}",
            allocation.code, allocation.skipped
        );
        read_back(self.conn, id)
    }

    fn seed_main_code(&mut self, code: &str, draft: &MainCodeDraft) -> RepoResult<MainCode> {
        let code = code::normalize_code(code)?;
        draft.validate()?;
        let draft = draft.normalized();
        let id = Uuid::new_v4();

        insert_main_code(self.conn, id, &code, &draft)?;
        info!(
            "event=main_code_seed module=repo status=ok code={}",
            code
        );
        read_back(self.conn, id)
    }

    fn get_main_code(&self, id: MainCodeId) -> RepoResult<Option<MainCode>> {
        query_one(
            self.conn,
            &format!("{MAIN_CODE_SELECT_SQL} WHERE id = ?1;"),
            &id.to_string(),
        )
    }

    fn get_by_code(&self, code: &str) -> RepoResult<Option<MainCode>> {
        let code = code::normalize_code(code)?;
        query_one(
            self.conn,
            &format!("{MAIN_CODE_SELECT_SQL} WHERE code = ?1;"),
            &code,
        )
    }

    fn list_main_codes(&self, query: &MainCodeListQuery) -> RepoResult<Page<MainCode>> {
        let mut where_sql = String::from(" WHERE 1 = 1");
        let mut bind_values: Vec<Value> = Vec::new();

        if let Some(code) = non_blank(query.code.as_deref()) {
            where_sql.push_str(" AND code LIKE ? ESCAPE '\\'");
            bind_values.push(Value::Text(like_pattern(code)));
        }

        if let Some(place) = non_blank(query.finding_place.as_deref()) {
            where_sql.push_str(" AND finding_place LIKE ? ESCAPE '\\'");
            bind_values.push(Value::Text(like_pattern(place)));
        }

        if let Some(q) = non_blank(query.q.as_deref()) {
            let columns = [
                "code",
                "finding_place",
                "plan_square",
                "description",
                "layer",
                "level",
                "grave_no",
                "gis",
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
            &format!("SELECT COUNT(*) FROM main_codes{where_sql};"),
            params_from_iter(bind_values.iter()),
            |row| row.get(0),
        )?;

        let page = normalize_page(query.page);
        let page_size = normalize_page_size(query.page_size);
        let offset = i64::from(page - 1) * i64::from(page_size);

        let sql = format!(
            "{MAIN_CODE_SELECT_SQL}{where_sql} ORDER BY {} LIMIT ? OFFSET ?;",
            query.ordering.order_by_sql()
        );
        bind_values.push(Value::Integer(i64::from(page_size)));
        bind_values.push(Value::Integer(offset));

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut items = Vec::new();
        while let Some(row) = rows.next()? {
            items.push(parse_main_code_row(row)?);
        }

        Ok(Page {
            items,
            total: total.max(0) as u64,
            page,
            page_size,
        })
    }

    fn update_main_code(&self, id: MainCodeId, draft: &MainCodeDraft) -> RepoResult<MainCode> {
        draft.validate()?;
        let draft = draft.normalized();

        let changed = self.conn.execute(
            "UPDATE main_codes
             SET
                finding_place = ?2,
                plan_square = ?3,
                description = ?4,
                layer = ?5,
                level = ?6,
                grave_no = ?7,
                gis = ?8,
                updated_at = (strftime('%s', 'now') * 1000)
             WHERE id = ?1;",
            params![
                id.to_string(),
                draft.finding_place,
                draft.plan_square,
                draft.description,
                draft.layer,
                draft.level,
                draft.grave_no,
                draft.gis,
            ],
        )?;

        if changed == 0 {
            return Err(not_found(id));
        }

        read_back(self.conn, id)
    }

    fn delete_main_code(&self, id: MainCodeId) -> RepoResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM main_codes WHERE id = ?1;", [id.to_string()])?;

        if changed == 0 {
            return Err(not_found(id));
        }

        info!("event=main_code_delete module=repo status=ok id={}", id);
        Ok(())
    }

    fn sequence_state(&self) -> RepoResult<SequenceState> {
        Ok(alloc::sequence_state(self.conn)?)
    }
}

fn insert_main_code(
    conn: &Connection,
    id: MainCodeId,
    code: &str,
    draft: &MainCodeDraft,
) -> RepoResult<()> {
    conn.execute(
        "INSERT INTO main_codes (
            id,
            code,
            finding_place,
            plan_square,
            description,
            layer,
            level,
            grave_no,
            gis
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9);",
        params![
            id.to_string(),
            code,
            draft.finding_place,
            draft.plan_square,
            draft.description,
            draft.layer,
            draft.level,
            draft.grave_no,
            draft.gis,
        ],
    )
    .map_err(|err| {
        if is_unique_violation(&err) {
            RepoError::DuplicateIdentifier {
                field: "code",
                value: code.to_string(),
            }
        } else {
            RepoError::from(err)
        }
    })?;
    Ok(())
}

fn read_back(conn: &Connection, id: MainCodeId) -> RepoResult<MainCode> {
    query_one(
        conn,
        &format!("{MAIN_CODE_SELECT_SQL} WHERE id = ?1;"),
        &id.to_string(),
    )?
    .ok_or_else(|| RepoError::InvalidData(format!("main code {id} missing after write")))
}

fn query_one(conn: &Connection, sql: &str, key: &str) -> RepoResult<Option<MainCode>> {
    let mut stmt = conn.prepare(sql)?;
    let mut rows = stmt.query([key])?;
    if let Some(row) = rows.next()? {
        return Ok(Some(parse_main_code_row(row)?));
    }
    Ok(None)
}

fn parse_main_code_row(row: &Row<'_>) -> RepoResult<MainCode> {
    let id_text: String = row.get("id")?;
    let id = Uuid::parse_str(&id_text).map_err(|_| {
        RepoError::InvalidData(format!("invalid uuid value `{id_text}` in main_codes.id"))
    })?;

    let code_text: String = row.get("code")?;
    if !code::is_canonical(&code_text) {
        return Err(RepoError::InvalidData(format!(
            "invalid code `{code_text}` in main_codes.code"
        )));
    }

    Ok(MainCode {
        id,
        code: code_text,
        attrs: MainCodeDraft {
            finding_place: row.get("finding_place")?,
            plan_square: row.get("plan_square")?,
            description: row.get("description")?,
            layer: row.get("layer")?,
            level: row.get("level")?,
            grave_no: row.get("grave_no")?,
            gis: row.get("gis")?,
        },
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|text| !text.is_empty())
}

fn not_found(id: MainCodeId) -> RepoError {
    RepoError::NotFound {
        entity: "main code",
        id: id.to_string(),
    }
}
