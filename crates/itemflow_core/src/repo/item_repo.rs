//! Item repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Provide CRUD and identifier listing over the `items` table.
//! - Keep SQL details inside the persistence boundary.
//!
//! # Invariants
//! - Write paths validate the item before any SQL mutation.
//! - Read paths reject invalid persisted state instead of masking it.
//! - One connection is shared by all callers and serialized by a mutex.

use crate::db::migrations::{current_user_version, latest_version};
use crate::db::DbError;
use crate::model::item::{Item, ItemDraft, ItemId, ItemValidationError};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::error::Error;
use std::fmt::{Display, Formatter};

const ITEM_SELECT_SQL: &str = "SELECT
    id,
    name,
    description,
    status,
    email
FROM items";

const REQUIRED_ITEM_COLUMNS: &[&str] = &["id", "name", "description", "status", "email"];

pub type RepoResult<T> = Result<T, RepoError>;

/// Generic repository error for item persistence and query operations.
#[derive(Debug)]
pub enum RepoError {
    Validation(ItemValidationError),
    Db(DbError),
    NotFound(ItemId),
    InvalidData(String),
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
            Self::Validation(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound(id) => write!(f, "item not found: {id}"),
            Self::InvalidData(message) => write!(f, "invalid persisted item data: {message}"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "connection schema version {actual_version} does not match expected {expected_version}"
            ),
            Self::MissingRequiredTable(table) => write!(f, "missing required table `{table}`"),
            Self::MissingRequiredColumn { table, column } => {
                write!(f, "missing required column `{table}.{column}`")
            }
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ItemValidationError> for RepoError {
    fn from(value: ItemValidationError) -> Self {
        Self::Validation(value)
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

/// Repository interface for item persistence.
///
/// Implementations must be safe to call from many worker threads at once.
pub trait ItemRepository: Send + Sync {
    /// Inserts a new item and returns it with its store-assigned id.
    fn create_item(&self, draft: &ItemDraft) -> RepoResult<Item>;
    fn get_item(&self, id: ItemId) -> RepoResult<Option<Item>>;
    /// Lists all items ordered by id.
    fn list_items(&self) -> RepoResult<Vec<Item>>;
    /// Lists every item id, ordered ascending.
    fn list_item_ids(&self) -> RepoResult<Vec<ItemId>>;
    /// Replaces every field of the existing row keyed by `item.id` and
    /// returns the persisted state. Never inserts; a missing row is
    /// `NotFound`.
    fn save_item(&self, item: &Item) -> RepoResult<Item>;
    /// Rewrites only the status of an existing row. `Ok(None)` when the row
    /// does not exist.
    fn update_item_status(&self, id: ItemId, status: &str) -> RepoResult<Option<Item>>;
    /// Returns `true` when a row was removed.
    fn delete_item(&self, id: ItemId) -> RepoResult<bool>;
}

/// SQLite-backed item repository.
pub struct SqliteItemRepository {
    conn: Mutex<Connection>,
}

impl SqliteItemRepository {
    /// Wraps a migrated connection after checking its schema.
    ///
    /// # Errors
    /// - `UninitializedConnection` when `PRAGMA user_version` is not the
    ///   latest known migration.
    /// - `MissingRequiredTable` / `MissingRequiredColumn` when the `items`
    ///   table does not have the expected shape.
    pub fn try_new(conn: Connection) -> RepoResult<Self> {
        ensure_schema_ready(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Runs `f` with exclusive access to the underlying connection.
    pub fn with_connection<T>(&self, f: impl FnOnce(&Connection) -> T) -> T {
        let conn = self.conn.lock();
        f(&conn)
    }
}

impl ItemRepository for SqliteItemRepository {
    fn create_item(&self, draft: &ItemDraft) -> RepoResult<Item> {
        draft.validate()?;

        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO items (name, description, status, email)
             VALUES (?1, ?2, ?3, ?4);",
            params![
                draft.name.as_str(),
                draft.description.as_str(),
                draft.status.as_str(),
                draft.email.as_str(),
            ],
        )?;
        let id = conn.last_insert_rowid();

        Ok(draft.clone().into_item(id))
    }

    fn get_item(&self, id: ItemId) -> RepoResult<Option<Item>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare_cached(&format!("{ITEM_SELECT_SQL} WHERE id = ?1;"))?;
        let mut rows = stmt.query([id])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_item_row(row)?));
        }

        Ok(None)
    }

    fn list_items(&self) -> RepoResult<Vec<Item>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&format!("{ITEM_SELECT_SQL} ORDER BY id ASC;"))?;
        let mut rows = stmt.query([])?;
        let mut items = Vec::new();

        while let Some(row) = rows.next()? {
            items.push(parse_item_row(row)?);
        }

        Ok(items)
    }

    fn list_item_ids(&self) -> RepoResult<Vec<ItemId>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare("SELECT id FROM items ORDER BY id ASC;")?;
        let ids = stmt
            .query_map([], |row| row.get::<_, ItemId>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ids)
    }

    fn save_item(&self, item: &Item) -> RepoResult<Item> {
        item.validate()?;

        let conn = self.conn.lock();
        let changed = conn.execute(
            "UPDATE items
             SET
                name = ?2,
                description = ?3,
                status = ?4,
                email = ?5,
                updated_at = (strftime('%s', 'now') * 1000)
             WHERE id = ?1;",
            params![
                item.id,
                item.name.as_str(),
                item.description.as_str(),
                item.status.as_str(),
                item.email.as_str(),
            ],
        )?;
        if changed == 0 {
            return Err(RepoError::NotFound(item.id));
        }

        read_back(&conn, item.id)?.ok_or(RepoError::NotFound(item.id))
    }

    fn update_item_status(&self, id: ItemId, status: &str) -> RepoResult<Option<Item>> {
        let conn = self.conn.lock();
        let changed = conn.execute(
            "UPDATE items
             SET
                status = ?2,
                updated_at = (strftime('%s', 'now') * 1000)
             WHERE id = ?1;",
            params![id, status],
        )?;
        if changed == 0 {
            return Ok(None);
        }

        read_back(&conn, id)
    }

    fn delete_item(&self, id: ItemId) -> RepoResult<bool> {
        let conn = self.conn.lock();
        let changed = conn.execute("DELETE FROM items WHERE id = ?1;", [id])?;
        Ok(changed > 0)
    }
}

fn read_back(conn: &Connection, id: ItemId) -> RepoResult<Option<Item>> {
    conn.query_row(&format!("{ITEM_SELECT_SQL} WHERE id = ?1;"), [id], |row| {
        Ok(parse_item_row(row))
    })
    .optional()?
    .transpose()
}

fn ensure_schema_ready(conn: &Connection) -> RepoResult<()> {
    let expected_version = latest_version();
    let actual_version = current_user_version(conn)?;
    if actual_version != expected_version {
        return Err(RepoError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }

    let mut stmt = conn.prepare("SELECT name FROM pragma_table_info('items');")?;
    let columns = stmt
        .query_map([], |row| row.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;
    if columns.is_empty() {
        return Err(RepoError::MissingRequiredTable("items"));
    }

    for &column in REQUIRED_ITEM_COLUMNS {
        if !columns.iter().any(|existing| existing.as_str() == column) {
            return Err(RepoError::MissingRequiredColumn {
                table: "items",
                column,
            });
        }
    }

    Ok(())
}

fn parse_item_row(row: &Row<'_>) -> RepoResult<Item> {
    let item = Item {
        id: row.get("id")?,
        name: row.get("name")?,
        description: row.get("description")?,
        status: row.get("status")?,
        email: row.get("email")?,
    };
    item.validate().map_err(|err| {
        RepoError::InvalidData(format!("item {} in items.email: {err}", item.id))
    })?;
    Ok(item)
}
