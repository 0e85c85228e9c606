//! `SQLite` implementation of [`ScriptRepository`].

use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row, SqlitePool};

use homestead_app::ports::ScriptRepository;
use homestead_domain::error::HomesteadError;
use homestead_domain::script_def::Script;

use crate::error::StorageError;

struct Wrapper(Script);

impl<'r> FromRow<'r, SqliteRow> for Wrapper {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self(Script {
            id: row.try_get("id")?,
            owner: row.try_get("owner")?,
            name: row.try_get("name")?,
            code: row.try_get("code")?,
        }))
    }
}

/// `SQLite`-backed script repository.
pub struct SqliteScriptRepository {
    pool: SqlitePool,
}

impl SqliteScriptRepository {
    /// Create a new repository backed by the given connection pool.
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

impl ScriptRepository for SqliteScriptRepository {
    async fn create(&self, script: Script) -> Result<Script, HomesteadError> {
        sqlx::query("INSERT INTO scripts (id, owner, name, code) VALUES (?, ?, ?, ?)")
            .bind(&script.id)
            .bind(&script.owner)
            .bind(&script.name)
            .bind(&script.code)
            .execute(&self.pool)
            .await
            .map_err(StorageError::from)?;
        Ok(script)
    }

    async fn get_by_id(&self, owner: &str, id: &str) -> Result<Option<Script>, HomesteadError> {
        let row: Option<Wrapper> =
            sqlx::query_as("SELECT * FROM scripts WHERE id = ? AND owner = ?")
                .bind(id)
                .bind(owner)
                .fetch_optional(&self.pool)
                .await
                .map_err(StorageError::from)?;
        Ok(row.map(|w| w.0))
    }
}
