// SQLite-backed catalog storage

use anyhow::Context;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use uuid::Uuid;

use crate::error::{ApiError, Result};
use crate::models::{Comment, NewStrain, Strain, User};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    user_name     TEXT PRIMARY KEY,
    password_hash TEXT NOT NULL,
    first_name    TEXT NOT NULL DEFAULT '',
    last_name     TEXT NOT NULL DEFAULT ''
);

CREATE TABLE IF NOT EXISTS strains (
    id          TEXT PRIMARY KEY,
    name        TEXT NOT NULL UNIQUE,
    kind        TEXT NOT NULL,
    description TEXT NOT NULL,
    flavor      TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS comments (
    id        TEXT PRIMARY KEY,
    strain_id TEXT NOT NULL REFERENCES strains(id) ON DELETE CASCADE,
    content   TEXT NOT NULL,
    author    TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS cabinet (
    user_name TEXT NOT NULL REFERENCES users(user_name) ON DELETE CASCADE,
    strain_id TEXT NOT NULL REFERENCES strains(id) ON DELETE CASCADE,
    PRIMARY KEY (user_name, strain_id)
);
"#;

/// Stored account: public fields plus the argon2 PHC string
#[derive(Debug, Clone)]
pub struct UserRecord {
    pub user: User,
    pub password_hash: String,
}

/// Thread-safe handle to the catalog database
#[derive(Clone)]
pub struct Store {
    conn: Arc<Mutex<Connection>>,
}

impl Store {
    /// Open (or create) the database at `path`
    pub fn open(path: &Path) -> anyhow::Result<Self> {
        tracing::info!("Opening SQLite database: {}", path.display());
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open SQLite database: {}", path.display()))?;
        Self::from_connection(conn)
    }

    /// Open a private in-memory database
    pub fn open_in_memory() -> anyhow::Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to open in-memory database")?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> anyhow::Result<Self> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")
            .context("Failed to enable foreign keys")?;
        conn.execute_batch(SCHEMA)
            .context("Failed to create schema")?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| ApiError::Internal(anyhow::anyhow!("SQLite connection lock poisoned")))
    }

    // === Users ===

    /// Insert a new account. Returns `None` when the user name is taken.
    pub fn create_user(&self, user: &User, password_hash: &str) -> Result<Option<User>> {
        let conn = self.lock()?;
        let inserted = conn.execute(
            "INSERT OR IGNORE INTO users (user_name, password_hash, first_name, last_name)
             VALUES (?1, ?2, ?3, ?4)",
            params![user.user_name, password_hash, user.first_name, user.last_name],
        )?;

        if inserted == 0 {
            return Ok(None);
        }

        tracing::debug!("Created user {}", user.user_name);
        Ok(Some(user.clone()))
    }

    pub fn find_user(&self, user_name: &str) -> Result<Option<UserRecord>> {
        let conn = self.lock()?;
        let record = conn
            .query_row(
                "SELECT user_name, password_hash, first_name, last_name
                 FROM users WHERE user_name = ?1",
                [user_name],
                |row| {
                    Ok(UserRecord {
                        user: User {
                            user_name: row.get(0)?,
                            first_name: row.get(2)?,
                            last_name: row.get(3)?,
                        },
                        password_hash: row.get(1)?,
                    })
                },
            )
            .optional()?;
        Ok(record)
    }

    // === Strains ===

    /// Every strain in insertion order, comments included
    pub fn list_strains(&self) -> Result<Vec<Strain>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT id, name, kind, description, flavor FROM strains ORDER BY rowid",
        )?;
        let mut strains = stmt
            .query_map([], strain_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        attach_comments(&conn, &mut strains)?;
        Ok(strains)
    }

    pub fn get_strain(&self, strain_id: &str) -> Result<Option<Strain>> {
        let conn = self.lock()?;
        let strain = conn
            .query_row(
                "SELECT id, name, kind, description, flavor FROM strains WHERE id = ?1",
                [strain_id],
                strain_from_row,
            )
            .optional()?;

        match strain {
            Some(strain) => {
                let mut strains = vec![strain];
                attach_comments(&conn, &mut strains)?;
                Ok(strains.pop())
            }
            None => Ok(None),
        }
    }

    /// Insert a strain. Returns `None` when the name is already used.
    pub fn create_strain(&self, new: &NewStrain) -> Result<Option<Strain>> {
        let conn = self.lock()?;
        let id = Uuid::new_v4().to_string();
        let inserted = conn.execute(
            "INSERT OR IGNORE INTO strains (id, name, kind, description, flavor)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![id, new.name, new.kind, new.description, new.flavor],
        )?;

        if inserted == 0 {
            return Ok(None);
        }

        Ok(Some(Strain {
            id,
            name: new.name.clone(),
            kind: new.kind.clone(),
            description: new.description.clone(),
            flavor: new.flavor.clone(),
            comments: Vec::new(),
        }))
    }

    // === Comments ===

    pub fn add_comment(&self, strain_id: &str, content: &str, author: &str) -> Result<Comment> {
        let conn = self.lock()?;
        let comment = Comment {
            id: Uuid::new_v4().to_string(),
            content: content.to_string(),
            author: author.to_string(),
        };
        conn.execute(
            "INSERT INTO comments (id, strain_id, content, author) VALUES (?1, ?2, ?3, ?4)",
            params![comment.id, strain_id, comment.content, comment.author],
        )?;
        Ok(comment)
    }

    pub fn delete_comment(&self, strain_id: &str, comment_id: &str) -> Result<bool> {
        let conn = self.lock()?;
        let deleted = conn.execute(
            "DELETE FROM comments WHERE id = ?1 AND strain_id = ?2",
            params![comment_id, strain_id],
        )?;
        Ok(deleted > 0)
    }

    // === Cabinet ===

    /// Strains in a user's cabinet, in the order they were added
    pub fn cabinet_strains(&self, user_name: &str) -> Result<Vec<Strain>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT s.id, s.name, s.kind, s.description, s.flavor
             FROM cabinet c JOIN strains s ON s.id = c.strain_id
             WHERE c.user_name = ?1
             ORDER BY c.rowid",
        )?;
        let mut strains = stmt
            .query_map([user_name], strain_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        attach_comments(&conn, &mut strains)?;
        Ok(strains)
    }

    /// Returns true when the strain was not already present
    pub fn add_to_cabinet(&self, user_name: &str, strain_id: &str) -> Result<bool> {
        let conn = self.lock()?;
        let inserted = conn.execute(
            "INSERT OR IGNORE INTO cabinet (user_name, strain_id) VALUES (?1, ?2)",
            params![user_name, strain_id],
        )?;
        Ok(inserted > 0)
    }

    /// Returns true when the strain was present
    pub fn remove_from_cabinet(&self, user_name: &str, strain_id: &str) -> Result<bool> {
        let conn = self.lock()?;
        let deleted = conn.execute(
            "DELETE FROM cabinet WHERE user_name = ?1 AND strain_id = ?2",
            params![user_name, strain_id],
        )?;
        Ok(deleted > 0)
    }
}

fn strain_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Strain> {
    Ok(Strain {
        id: row.get(0)?,
        name: row.get(1)?,
        kind: row.get(2)?,
        description: row.get(3)?,
        flavor: row.get(4)?,
        comments: Vec::new(),
    })
}

fn attach_comments(conn: &Connection, strains: &mut [Strain]) -> rusqlite::Result<()> {
    let mut stmt = conn.prepare_cached(
        "SELECT id, content, author FROM comments WHERE strain_id = ?1 ORDER BY rowid",
    )?;
    for strain in strains.iter_mut() {
        strain.comments = stmt
            .query_map([&strain.id], |row| {
                Ok(Comment {
                    id: row.get(0)?,
                    content: row.get(1)?,
                    author: row.get(2)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
    }
    Ok(())
}
