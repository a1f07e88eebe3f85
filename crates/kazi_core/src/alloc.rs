//! Sequential main code allocation.
//!
//! # Responsibility
//! - Hand out the next unused main code in strictly increasing rank order.
//! - Persist the allocation cursor (`main_code_sequence`, row `id = 1`).
//!
//! # Invariants
//! - The cursor read, the free-rank search and the cursor write happen in
//!   one `BEGIN IMMEDIATE` transaction; a concurrent allocator blocks on the
//!   database write lock until this one commits or rolls back.
//! - Ranks are never re-issued, including across process restarts.
//! - Codes inserted out of band ahead of the cursor are skipped.
//! - Once no rank above the cursor is free, every call fails with
//!   `PoolExhausted`.

use crate::db::{is_lock_contention, DbError};
use crate::model::code::{self, CodeError, MAX_RANK};
use log::{error, info, warn};
use rusqlite::{Connection, OptionalExtension, Transaction, TransactionBehavior};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Instant;

pub type AllocResult<T> = Result<T, AllocError>;

/// Allocation failure.
#[derive(Debug)]
pub enum AllocError {
    /// Every code up to `ZZZ` has been issued or taken.
    PoolExhausted,
    /// The database write lock could not be acquired within the busy
    /// timeout. Nothing was committed; retrying from scratch is safe.
    LockTimeout,
    /// The persisted cursor holds a value the codec rejects.
    InvalidCursor(CodeError),
    /// A searched rank fell outside the code space. The search bounds every
    /// rank by `MAX_RANK` first, so this marks an allocator defect.
    RankOutOfRange(CodeError),
    /// Underlying storage failure.
    Db(DbError),
}

impl Display for AllocError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PoolExhausted => write!(
                f,
                "main code pool exhausted: all codes up to {} are assigned",
                code::LAST_CODE
            ),
            Self::LockTimeout => write!(f, "timed out waiting for the allocation lock"),
            Self::InvalidCursor(err) => write!(f, "corrupt allocation cursor: {err}"),
            Self::RankOutOfRange(err) => write!(f, "allocator produced an invalid rank: {err}"),
            Self::Db(err) => write!(f, "{err}"),
        }
    }
}

impl Error for AllocError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidCursor(err) | Self::RankOutOfRange(err) => Some(err),
            Self::Db(err) => Some(err),
            Self::PoolExhausted | Self::LockTimeout => None,
        }
    }
}

impl From<DbError> for AllocError {
    fn from(value: DbError) -> Self {
        if value.is_lock_contention() {
            Self::LockTimeout
        } else {
            Self::Db(value)
        }
    }
}

impl From<rusqlite::Error> for AllocError {
    fn from(value: rusqlite::Error) -> Self {
        if is_lock_contention(&value) {
            Self::LockTimeout
        } else {
            Self::Db(DbError::Sqlite(value))
        }
    }
}

/// Result of one successful allocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Allocation {
    /// Issued code.
    pub code: String,
    /// Rank of `code`.
    pub rank: u16,
    /// Ranks passed over because a main code already used them.
    pub skipped: u16,
}

/// Snapshot of the allocation cursor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequenceState {
    /// Last issued code, `None` before the first allocation.
    pub last_code: Option<String>,
    /// Epoch milliseconds of the last cursor write.
    pub updated_at: Option<i64>,
    /// Ranks strictly above the cursor (an upper bound on what can still be
    /// issued; seeded codes may occupy some of them).
    pub remaining: u16,
}

/// Allocates the next free main code in its own immediate transaction.
///
/// Blocks while another connection holds the database write lock, up to the
/// connection's busy timeout.
pub fn allocate_next_code(conn: &mut Connection) -> AllocResult<String> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let allocation = allocate_next_code_in_tx(&tx)?;
    tx.commit()?;
    Ok(allocation.code)
}

/// Allocates the next free main code inside a caller-owned transaction.
///
/// The caller must have opened `tx` with `TransactionBehavior::Immediate`
/// so the lock spans the whole read-modify-write. The cursor advance only
/// becomes durable when the caller commits; dropping `tx` discards it.
pub fn allocate_next_code_in_tx(tx: &Transaction<'_>) -> AllocResult<Allocation> {
    let started_at = Instant::now();
    tx.execute(
        "INSERT OR IGNORE INTO main_code_sequence (id, last_code) VALUES (1, NULL);",
        [],
    )?;

    let last_code: Option<String> = tx.query_row(
        "SELECT last_code FROM main_code_sequence WHERE id = 1;",
        [],
        |row| row.get(0),
    )?;

    let candidate = match last_code.as_deref() {
        None => 0,
        Some(value) => match code::encode(value) {
            Ok(rank) => i64::from(rank) + 1,
            Err(err) => {
                error!(
                    "event=code_alloc module=alloc status=error error_code=invalid_cursor error={}",
                    err
                );
                return Err(AllocError::InvalidCursor(err));
            }
        },
    };

    let rank = match first_free_rank(tx, candidate)? {
        Some(rank) => rank,
        None => {
            warn!(
                "event=code_alloc module=alloc status=rejected error_code=pool_exhausted last_code={}",
                last_code.as_deref().unwrap_or("-")
            );
            return Err(AllocError::PoolExhausted);
        }
    };
    let issued = code_at(i64::from(rank))?;

    tx.execute(
        "UPDATE main_code_sequence
         SET
            last_code = ?1,
            updated_at = (strftime('%s', 'now') * 1000)
         WHERE id = 1;",
        [issued.as_str()],
    )?;

    let skipped = (i64::from(rank) - candidate) as u16;
    info!(
        "event=code_alloc module=alloc status=ok code={} skipped={} duration_ms={}",
        issued,
        skipped,
        started_at.elapsed().as_millis()
    );

    Ok(Allocation {
        code: issued,
        rank,
        skipped,
    })
}

/// Reads the cursor without taking the write lock.
pub fn sequence_state(conn: &Connection) -> AllocResult<SequenceState> {
    let row: Option<(Option<String>, i64)> = conn
        .query_row(
            "SELECT last_code, updated_at FROM main_code_sequence WHERE id = 1;",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?;

    let (last_code, updated_at) = match row {
        Some((last_code, updated_at)) => (last_code, Some(updated_at)),
        None => (None, None),
    };

    let remaining = match last_code.as_deref() {
        None => MAX_RANK + 1,
        Some(value) => MAX_RANK - code::encode(value).map_err(AllocError::InvalidCursor)?,
    };

    Ok(SequenceState {
        last_code,
        updated_at,
        remaining,
    })
}

fn code_at(rank: i64) -> AllocResult<String> {
    code::decode(rank).map_err(|err| {
        error!(
            "event=code_alloc module=alloc status=error error_code=rank_out_of_range error={}",
            err
        );
        AllocError::RankOutOfRange(err)
    })
}

/// Finds the lowest rank `>= candidate` not used by any main code.
///
/// Canonical codes sort in rank order, so one ascending range scan from the
/// candidate walks the run of occupied codes and stops at the first gap.
fn first_free_rank(tx: &Transaction<'_>, candidate: i64) -> AllocResult<Option<u16>> {
    if candidate > i64::from(MAX_RANK) {
        return Ok(None);
    }

    let mut expected = candidate;
    let start = code_at(expected)?;
    let mut stmt = tx.prepare("SELECT code FROM main_codes WHERE code >= ?1 ORDER BY code ASC;")?;
    let mut rows = stmt.query([start.as_str()])?;

    while let Some(row) = rows.next()? {
        let taken: String = row.get(0)?;
        let expected_code = code_at(expected)?;
        if taken.as_str() < expected_code.as_str() {
            continue;
        }
        if taken != expected_code {
            break;
        }
        expected += 1;
        if expected > i64::from(MAX_RANK) {
            return Ok(None);
        }
    }

    Ok(Some(expected as u16))
}
