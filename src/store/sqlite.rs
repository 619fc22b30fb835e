use std::collections::HashSet;
use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, NaiveDateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{
    Connection, OptionalExtension, Params, Row, ToSql, ffi, params, params_from_iter,
};

use super::schema::SCHEMA;
use super::{AuthorizeStore, RegistryStore, Store, StoreOp, TeamStore, UserStore, VersionStore};
use crate::error::{Error, Result};
use crate::types::*;

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let conn = Connection::open(db_path)?;

        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.pragma_update(None, "journal_mode", "WAL")?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Opens a private in-memory database, used by tests and embedding callers.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339()
}

/// Accepts RFC 3339, as written by the store, and the `YYYY-MM-DD HH:MM:SS`
/// form produced by the `datetime('now')` column defaults.
fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S")
                .ok()
                .map(|ndt| ndt.and_utc())
        })
}

fn placeholders(start: usize, count: usize) -> String {
    (start..start + count)
        .map(|i| format!("?{i}"))
        .collect::<Vec<_>>()
        .join(", ")
}

fn conversion_error(idx: usize, message: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, message.into())
}

fn datetime_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let value: String = row.get(idx)?;
    parse_timestamp(&value)
        .ok_or_else(|| conversion_error(idx, format!("invalid timestamp '{value}'")))
}

fn optional_datetime_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    match row.get::<_, Option<String>>(idx)? {
        Some(_) => datetime_column(row, idx).map(Some),
        None => Ok(None),
    }
}

fn enum_column<T>(row: &Row<'_>, idx: usize, parse: fn(&str) -> Option<T>) -> rusqlite::Result<T> {
    let value: String = row.get(idx)?;
    parse(&value).ok_or_else(|| conversion_error(idx, format!("unexpected value '{value}'")))
}

fn json_column<T: serde::de::DeserializeOwned>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T> {
    let value: String = row.get(idx)?;
    serde_json::from_str(&value).map_err(|e| conversion_error(idx, e.to_string()))
}

/// Maps a uniqueness violation to `conflict`; every other failure passes through.
fn on_conflict(err: rusqlite::Error, conflict: Error) -> Error {
    match &err {
        rusqlite::Error::SqliteFailure(e, _)
            if matches!(
                e.extended_code,
                ffi::SQLITE_CONSTRAINT_UNIQUE | ffi::SQLITE_CONSTRAINT_PRIMARYKEY
            ) =>
        {
            conflict
        }
        _ => Error::from(err),
    }
}

fn insert<P: Params>(conn: &Connection, sql: &str, params: P) -> Result<()> {
    conn.execute(sql, params)
        .map_err(|e| on_conflict(e, Error::AlreadyExists))?;
    Ok(())
}

fn query_ids<P: Params>(conn: &Connection, sql: &str, params: P) -> Result<Vec<String>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(params, |row| row.get(0))?;
    rows.collect::<std::result::Result<Vec<_>, _>>()
        .map_err(Error::from)
}

const AUTH_COLUMNS: &str =
    "id, type, type_id, target_id, mask, allow, creator, created_at, updated_at";

fn auth_from_row(row: &Row<'_>) -> rusqlite::Result<AuthEntry> {
    Ok(AuthEntry {
        id: row.get(0)?,
        auth_type: enum_column(row, 1, AuthType::parse)?,
        type_id: row.get(2)?,
        target_id: row.get(3)?,
        mask: Mask::from(row.get::<_, i64>(4)?),
        allow: row.get(5)?,
        creator: row.get(6)?,
        created_at: datetime_column(row, 7)?,
        updated_at: datetime_column(row, 8)?,
    })
}

fn organization_from_row(row: &Row<'_>) -> rusqlite::Result<Organization> {
    Ok(Organization {
        id: row.get(0)?,
        name: row.get(1)?,
        creator: row.get(2)?,
        created_at: datetime_column(row, 3)?,
    })
}

const TEAM_COLUMNS: &str = "id, organization_id, name, creator, created_at";

fn team_from_row(row: &Row<'_>) -> rusqlite::Result<Team> {
    Ok(Team {
        id: row.get(0)?,
        organization_id: row.get(1)?,
        name: row.get(2)?,
        creator: row.get(3)?,
        created_at: datetime_column(row, 4)?,
    })
}

fn application_from_row(row: &Row<'_>) -> rusqlite::Result<Application> {
    Ok(Application {
        id: row.get(0)?,
        organization_id: row.get(1)?,
        name: row.get(2)?,
        creator: row.get(3)?,
        created_at: datetime_column(row, 4)?,
    })
}

const FILE_COLUMNS: &str =
    "id, application_id, name, type, status, creator, created_at, updated_at";

fn file_from_row(row: &Row<'_>) -> rusqlite::Result<FileRecord> {
    Ok(FileRecord {
        id: row.get(0)?,
        application_id: row.get(1)?,
        name: row.get(2)?,
        file_type: enum_column(row, 3, FileType::parse)?,
        status: enum_column(row, 4, FileStatus::parse)?,
        creator: row.get(5)?,
        created_at: datetime_column(row, 6)?,
        updated_at: datetime_column(row, 7)?,
    })
}

const CONTENT_COLUMNS: &str = "id, file_id, title, creator, created_at";

fn content_from_row(row: &Row<'_>) -> rusqlite::Result<Content> {
    Ok(Content {
        id: row.get(0)?,
        file_id: row.get(1)?,
        title: row.get(2)?,
        creator: row.get(3)?,
        created_at: datetime_column(row, 4)?,
    })
}

const VERSION_COLUMNS: &str = "v.id, v.content_id, v.version_number, v.relations, v.schemas, \
                               v.live, v.creator, v.created_at";

// Live: flagged live and the owning file is not deleted.
const LIVE_VERSIONS_FROM: &str = "FROM content_versions v
     JOIN contents c ON c.id = v.content_id
     JOIN files f ON f.id = c.file_id
     WHERE v.live = 1 AND f.status = 'active'";

fn version_from_row(row: &Row<'_>) -> rusqlite::Result<ContentVersion> {
    Ok(ContentVersion {
        id: row.get(0)?,
        content_id: row.get(1)?,
        version_number: row.get(2)?,
        relations: json_column(row, 3)?,
        schemas: json_column(row, 4)?,
        live: row.get(5)?,
        creator: row.get(6)?,
        created_at: datetime_column(row, 7)?,
    })
}

const USER_COLUMNS: &str = "id, name, created_at";

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        name: row.get(1)?,
        created_at: datetime_column(row, 2)?,
    })
}

const TOKEN_COLUMNS: &str =
    "id, token_hash, token_lookup, is_admin, user_id, created_at, expires_at, last_used_at";

fn token_from_row(row: &Row<'_>) -> rusqlite::Result<Token> {
    Ok(Token {
        id: row.get(0)?,
        token_hash: row.get(1)?,
        token_lookup: row.get(2)?,
        is_admin: row.get(3)?,
        user_id: row.get(4)?,
        created_at: datetime_column(row, 5)?,
        expires_at: optional_datetime_column(row, 6)?,
        last_used_at: optional_datetime_column(row, 7)?,
    })
}

/// Live contents outside `file_id` whose live version lists one of the file's
/// contents among its relations.
fn live_referrers(conn: &Connection, file_id: &str) -> Result<Vec<String>> {
    query_ids(
        conn,
        &format!(
            "SELECT DISTINCT v.content_id {LIVE_VERSIONS_FROM}
               AND c.file_id <> ?1
               AND EXISTS (
                   SELECT 1 FROM json_tree(v.relations) r
                   JOIN contents own ON own.id = r.value
                   WHERE r.type = 'text' AND own.file_id = ?1
               )
             ORDER BY v.content_id"
        ),
        params![file_id],
    )
}

fn live_content_ids(conn: &Connection, content_ids: &[String]) -> Result<HashSet<String>> {
    if content_ids.is_empty() {
        return Ok(HashSet::new());
    }

    let ids = query_ids(
        conn,
        &format!(
            "SELECT v.content_id {LIVE_VERSIONS_FROM} AND v.content_id IN ({})",
            placeholders(1, content_ids.len())
        ),
        params_from_iter(content_ids),
    )?;
    Ok(ids.into_iter().collect())
}

fn apply_op(conn: &Connection, op: &StoreOp) -> Result<()> {
    match op {
        StoreOp::CreateUser(user) => {
            insert(
                conn,
                "INSERT INTO users (id, name, created_at) VALUES (?1, ?2, ?3)",
                params![user.id, user.name, format_datetime(&user.created_at)],
            )?;
        }
        StoreOp::CreateToken(token) => {
            conn.execute(
                "INSERT INTO tokens (id, token_hash, token_lookup, is_admin, user_id, created_at, expires_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    token.id,
                    token.token_hash,
                    token.token_lookup,
                    token.is_admin,
                    token.user_id,
                    format_datetime(&token.created_at),
                    token.expires_at.as_ref().map(format_datetime),
                ],
            )
            .map_err(|e| on_conflict(e, Error::TokenLookupCollision))?;
        }
        StoreOp::CreateOrganization(org) => {
            insert(
                conn,
                "INSERT INTO organizations (id, name, creator, created_at) VALUES (?1, ?2, ?3, ?4)",
                params![org.id, org.name, org.creator, format_datetime(&org.created_at)],
            )?;
        }
        StoreOp::CreateTeam(team) => {
            insert(
                conn,
                "INSERT INTO teams (id, organization_id, name, creator, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    team.id,
                    team.organization_id,
                    team.name,
                    team.creator,
                    format_datetime(&team.created_at),
                ],
            )?;
        }
        StoreOp::AddTeamMembers { team_id, user_ids } => {
            let now = format_datetime(&Utc::now());
            let mut stmt = conn.prepare(
                "INSERT OR IGNORE INTO team_members (team_id, user_id, created_at) VALUES (?1, ?2, ?3)",
            )?;
            for user_id in user_ids {
                stmt.execute(params![team_id, user_id, now])?;
            }
        }
        StoreOp::RemoveTeamMembers { team_id, user_ids } => {
            let mut stmt =
                conn.prepare("DELETE FROM team_members WHERE team_id = ?1 AND user_id = ?2")?;
            for user_id in user_ids {
                stmt.execute(params![team_id, user_id])?;
            }
        }
        StoreOp::CreateApplication(app) => {
            insert(
                conn,
                "INSERT INTO applications (id, organization_id, name, creator, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    app.id,
                    app.organization_id,
                    app.name,
                    app.creator,
                    format_datetime(&app.created_at),
                ],
            )?;
        }
        StoreOp::CreateFile(file) => {
            insert(
                conn,
                "INSERT INTO files (id, application_id, name, type, status, creator, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    file.id,
                    file.application_id,
                    file.name,
                    file.file_type.as_str(),
                    file.status.as_str(),
                    file.creator,
                    format_datetime(&file.created_at),
                    format_datetime(&file.updated_at),
                ],
            )?;
        }
        StoreOp::CreateContent(content) => {
            insert(
                conn,
                "INSERT INTO contents (id, file_id, title, creator, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    content.id,
                    content.file_id,
                    content.title,
                    content.creator,
                    format_datetime(&content.created_at),
                ],
            )?;
        }
        StoreOp::CreateVersion(version) => {
            insert(
                conn,
                "INSERT INTO content_versions
                 (id, content_id, version_number, relations, schemas, live, creator, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    version.id,
                    version.content_id,
                    version.version_number,
                    serde_json::to_string(&version.relations)?,
                    serde_json::to_string(&version.schemas)?,
                    version.live,
                    version.creator,
                    format_datetime(&version.created_at),
                ],
            )?;
        }
        StoreOp::SetLiveVersion {
            content_id,
            version_number,
        } => {
            conn.execute(
                "UPDATE content_versions SET live = 0 WHERE content_id = ?1 AND live = 1",
                params![content_id],
            )?;
            let rows = conn.execute(
                "UPDATE content_versions SET live = 1 WHERE content_id = ?1 AND version_number = ?2",
                params![content_id, version_number],
            )?;
            if rows == 0 {
                return Err(Error::NotFound);
            }
        }
        StoreOp::SetFileStatus { file_id, status } => {
            let rows = conn.execute(
                "UPDATE files SET status = ?1, updated_at = ?2 WHERE id = ?3",
                params![status.as_str(), format_datetime(&Utc::now()), file_id],
            )?;
            if rows == 0 {
                return Err(Error::NotFound);
            }
        }
        StoreOp::InsertAuthorizes(entries) => {
            let mut stmt = conn.prepare(
                "INSERT INTO authorizes (id, type, type_id, target_id, mask, allow, creator, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            )?;
            for entry in entries {
                stmt.execute(params![
                    entry.id,
                    entry.auth_type.as_str(),
                    entry.type_id,
                    entry.target_id,
                    i64::from(entry.mask),
                    entry.allow,
                    entry.creator,
                    format_datetime(&entry.created_at),
                    format_datetime(&entry.updated_at),
                ])
                .map_err(|e| on_conflict(e, Error::AlreadyExists))?;
            }
        }
        StoreOp::UpdateAuthorizes { ids, mask, allow } => {
            let now = format_datetime(&Utc::now());
            let mut stmt = conn.prepare(
                "UPDATE authorizes SET mask = ?1, allow = ?2, updated_at = ?3 WHERE id = ?4",
            )?;
            for id in ids {
                stmt.execute(params![i64::from(*mask), allow, now, id])?;
            }
        }
        StoreOp::RequireLive(content_ids) => {
            let live = live_content_ids(conn, content_ids)?;
            let mut missing: Vec<String> = Vec::new();
            for id in content_ids {
                if !live.contains(id) && !missing.contains(id) {
                    missing.push(id.clone());
                }
            }
            if !missing.is_empty() {
                return Err(Error::DependencyMissing(missing));
            }
        }
        StoreOp::RequireUnreferenced { file_id } => {
            let referrers = live_referrers(conn, file_id)?;
            if !referrers.is_empty() {
                return Err(Error::CannotDelete(referrers));
            }
        }
    }
    Ok(())
}

impl Store for SqliteStore {
    fn initialize(&self) -> Result<()> {
        self.conn().execute_batch(SCHEMA)?;
        Ok(())
    }

    fn run_transaction(&self, ops: &[StoreOp]) -> Result<()> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;

        for (index, op) in ops.iter().enumerate() {
            apply_op(&tx, op).map_err(|source| {
                tracing::debug!(index, op = op.name(), error = %source, "batch operation failed");
                Error::Commit {
                    index,
                    source: Box::new(source),
                }
            })?;
        }

        // Dropping `tx` on the error path above rolls everything back.
        tx.commit()?;
        Ok(())
    }
}

impl AuthorizeStore for SqliteStore {
    fn find_authorizes(
        &self,
        auth_type: AuthType,
        type_id: &str,
        target_ids: &[String],
    ) -> Result<Vec<AuthEntry>> {
        if target_ids.is_empty() {
            return Ok(Vec::new());
        }

        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {AUTH_COLUMNS} FROM authorizes
             WHERE type = ?1 AND type_id = ?2 AND target_id IN ({})
             ORDER BY created_at, id",
            placeholders(3, target_ids.len())
        ))?;

        let type_str = auth_type.as_str();
        let mut values: Vec<&dyn ToSql> = vec![&type_str, &type_id];
        values.extend(target_ids.iter().map(|id| id as &dyn ToSql));

        let rows = stmt.query_map(values.as_slice(), auth_from_row)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn list_authorizes(&self, auth_type: AuthType, type_id: &str) -> Result<Vec<AuthEntry>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {AUTH_COLUMNS} FROM authorizes WHERE type = ?1 AND type_id = ?2
             ORDER BY created_at, id"
        ))?;

        let rows = stmt.query_map(params![auth_type.as_str(), type_id], auth_from_row)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }
}

impl RegistryStore for SqliteStore {
    fn get_organization(&self, id: &str) -> Result<Option<Organization>> {
        let conn = self.conn();
        conn.query_row(
            "SELECT id, name, creator, created_at FROM organizations WHERE id = ?1",
            params![id],
            organization_from_row,
        )
        .optional()
        .map_err(Error::from)
    }

    fn get_team(&self, id: &str) -> Result<Option<Team>> {
        let conn = self.conn();
        conn.query_row(
            &format!("SELECT {TEAM_COLUMNS} FROM teams WHERE id = ?1"),
            params![id],
            team_from_row,
        )
        .optional()
        .map_err(Error::from)
    }

    fn list_teams(&self, organization_id: &str) -> Result<Vec<Team>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {TEAM_COLUMNS} FROM teams WHERE organization_id = ?1 ORDER BY name"
        ))?;

        let rows = stmt.query_map(params![organization_id], team_from_row)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn get_application(&self, id: &str) -> Result<Option<Application>> {
        let conn = self.conn();
        conn.query_row(
            "SELECT id, organization_id, name, creator, created_at FROM applications WHERE id = ?1",
            params![id],
            application_from_row,
        )
        .optional()
        .map_err(Error::from)
    }

    fn get_file(&self, id: &str) -> Result<Option<FileRecord>> {
        let conn = self.conn();
        conn.query_row(
            &format!("SELECT {FILE_COLUMNS} FROM files WHERE id = ?1"),
            params![id],
            file_from_row,
        )
        .optional()
        .map_err(Error::from)
    }

    fn get_content(&self, id: &str) -> Result<Option<Content>> {
        let conn = self.conn();
        conn.query_row(
            &format!("SELECT {CONTENT_COLUMNS} FROM contents WHERE id = ?1"),
            params![id],
            content_from_row,
        )
        .optional()
        .map_err(Error::from)
    }

    fn get_contents(&self, ids: &[String]) -> Result<Vec<Content>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {CONTENT_COLUMNS} FROM contents WHERE id IN ({})",
            placeholders(1, ids.len())
        ))?;

        let rows = stmt.query_map(params_from_iter(ids), content_from_row)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn get_files(&self, ids: &[String]) -> Result<Vec<FileRecord>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {FILE_COLUMNS} FROM files WHERE id IN ({})",
            placeholders(1, ids.len())
        ))?;

        let rows = stmt.query_map(params_from_iter(ids), file_from_row)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn list_file_contents(&self, file_id: &str) -> Result<Vec<Content>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {CONTENT_COLUMNS} FROM contents WHERE file_id = ?1 ORDER BY created_at, id"
        ))?;

        let rows = stmt.query_map(params![file_id], content_from_row)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn list_deleted_files(
        &self,
        application_id: &str,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<FileRecord>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {FILE_COLUMNS} FROM files
             WHERE application_id = ?1 AND status = 'deleted'
             ORDER BY updated_at DESC, id
             LIMIT ?2 OFFSET ?3"
        ))?;

        let rows = stmt.query_map(params![application_id, limit, offset], file_from_row)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn count_deleted_files(&self, application_id: &str) -> Result<u64> {
        let conn = self.conn();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM files WHERE application_id = ?1 AND status = 'deleted'",
            params![application_id],
            |row| row.get(0),
        )?;
        Ok(count.unsigned_abs())
    }
}

impl VersionStore for SqliteStore {
    fn get_live_versions(&self, content_ids: &[String]) -> Result<Vec<ContentVersion>> {
        if content_ids.is_empty() {
            return Ok(Vec::new());
        }

        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {VERSION_COLUMNS} {LIVE_VERSIONS_FROM} AND v.content_id IN ({})",
            placeholders(1, content_ids.len())
        ))?;

        let rows = stmt.query_map(params_from_iter(content_ids), version_from_row)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn list_application_live_versions(&self, application_id: &str) -> Result<Vec<ContentVersion>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {VERSION_COLUMNS} {LIVE_VERSIONS_FROM} AND f.application_id = ?1
             ORDER BY v.content_id"
        ))?;

        let rows = stmt.query_map(params![application_id], version_from_row)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn get_version(
        &self,
        content_id: &str,
        version_number: i64,
    ) -> Result<Option<ContentVersion>> {
        let conn = self.conn();
        conn.query_row(
            &format!(
                "SELECT {VERSION_COLUMNS} FROM content_versions v
                 WHERE v.content_id = ?1 AND v.version_number = ?2"
            ),
            params![content_id, version_number],
            version_from_row,
        )
        .optional()
        .map_err(Error::from)
    }

    fn latest_version_number(&self, content_id: &str) -> Result<Option<i64>> {
        let conn = self.conn();
        conn.query_row(
            "SELECT MAX(version_number) FROM content_versions WHERE content_id = ?1",
            params![content_id],
            |row| row.get(0),
        )
        .map_err(Error::from)
    }
}

impl TeamStore for SqliteStore {
    fn list_team_members(&self, team_id: &str) -> Result<Vec<User>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT u.id, u.name, u.created_at FROM team_members m
             JOIN users u ON u.id = m.user_id
             WHERE m.team_id = ?1
             ORDER BY u.name",
        )?;

        let rows = stmt.query_map(params![team_id], user_from_row)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn list_user_team_ids(&self, user_id: &str) -> Result<Vec<String>> {
        query_ids(
            &self.conn(),
            "SELECT team_id FROM team_members WHERE user_id = ?1 ORDER BY team_id",
            params![user_id],
        )
    }
}

impl UserStore for SqliteStore {
    fn get_user(&self, id: &str) -> Result<Option<User>> {
        let conn = self.conn();
        conn.query_row(
            &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
            params![id],
            user_from_row,
        )
        .optional()
        .map_err(Error::from)
    }

    fn get_users(&self, ids: &[String]) -> Result<Vec<User>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id IN ({})",
            placeholders(1, ids.len())
        ))?;

        let rows = stmt.query_map(params_from_iter(ids), user_from_row)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn get_token_by_lookup(&self, lookup: &str) -> Result<Option<Token>> {
        let conn = self.conn();
        conn.query_row(
            &format!("SELECT {TOKEN_COLUMNS} FROM tokens WHERE token_lookup = ?1"),
            params![lookup],
            token_from_row,
        )
        .optional()
        .map_err(Error::from)
    }

    fn touch_token(&self, id: &str) -> Result<()> {
        self.conn().execute(
            "UPDATE tokens SET last_used_at = ?1 WHERE id = ?2",
            params![format_datetime(&Utc::now()), id],
        )?;
        Ok(())
    }

    fn has_admin_token(&self) -> Result<bool> {
        let conn = self.conn();
        conn.query_row(
            "SELECT EXISTS (SELECT 1 FROM tokens WHERE is_admin = 1)",
            [],
            |row| row.get(0),
        )
        .map_err(Error::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Transaction;
    use tempfile::TempDir;

    fn open(temp: &TempDir) -> SqliteStore {
        let store = SqliteStore::new(temp.path().join("test.db")).unwrap();
        store.initialize().unwrap();
        store
    }

    fn seed_application(store: &SqliteStore) {
        let now = Utc::now();
        store
            .run_transaction(&[
                StoreOp::CreateOrganization(Organization {
                    id: "org-1".to_string(),
                    name: "acme".to_string(),
                    creator: "user-1".to_string(),
                    created_at: now,
                }),
                StoreOp::CreateApplication(Application {
                    id: "app-1".to_string(),
                    organization_id: "org-1".to_string(),
                    name: "site".to_string(),
                    creator: "user-1".to_string(),
                    created_at: now,
                }),
            ])
            .unwrap();
    }

    fn file_ops(file_id: &str, file_type: FileType, content_id: &str) -> Vec<StoreOp> {
        let now = Utc::now();
        vec![
            StoreOp::CreateFile(FileRecord {
                id: file_id.to_string(),
                application_id: "app-1".to_string(),
                name: file_id.to_string(),
                file_type,
                status: FileStatus::Active,
                creator: "user-1".to_string(),
                created_at: now,
                updated_at: now,
            }),
            StoreOp::CreateContent(Content {
                id: content_id.to_string(),
                file_id: file_id.to_string(),
                title: content_id.to_string(),
                creator: "user-1".to_string(),
                created_at: now,
            }),
        ]
    }

    fn version_with(content_id: &str, number: i64, live: bool, relations: Relations<String>) -> StoreOp {
        StoreOp::CreateVersion(ContentVersion {
            id: format!("{content_id}-v{number}"),
            content_id: content_id.to_string(),
            version_number: number,
            relations,
            schemas: serde_json::json!({ "n": number }),
            live,
            creator: "user-1".to_string(),
            created_at: Utc::now(),
        })
    }

    fn version(content_id: &str, number: i64, live: bool) -> StoreOp {
        version_with(content_id, number, live, Relations::default())
    }

    fn auth(id: &str, target_id: &str) -> AuthEntry {
        let now = Utc::now();
        AuthEntry {
            id: id.to_string(),
            auth_type: AuthType::Application,
            type_id: "app-1".to_string(),
            target_id: target_id.to_string(),
            mask: Mask::VIEW,
            allow: true,
            creator: "user-1".to_string(),
            created_at: now,
            updated_at: now,
        }
    }

    fn user(id: &str) -> StoreOp {
        StoreOp::CreateUser(User {
            id: id.to_string(),
            name: id.to_string(),
            created_at: Utc::now(),
        })
    }

    fn admin_token(id: &str, lookup: &str) -> StoreOp {
        StoreOp::CreateToken(Token {
            id: id.to_string(),
            token_hash: "hash".to_string(),
            token_lookup: lookup.to_string(),
            is_admin: true,
            user_id: None,
            created_at: Utc::now(),
            expires_at: None,
            last_used_at: None,
        })
    }

    fn rejection(result: Result<()>) -> Error {
        match result {
            Err(Error::Commit { source, .. }) => *source,
            other => panic!("expected commit error, got {other:?}"),
        }
    }

    #[test]
    fn test_initialize_creates_tables() {
        let temp = TempDir::new().unwrap();
        let store = open(&temp);

        let conn = store.conn();
        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<std::result::Result<Vec<_>, _>>()
            .unwrap();

        for table in [
            "users",
            "tokens",
            "organizations",
            "teams",
            "team_members",
            "applications",
            "files",
            "contents",
            "content_versions",
            "authorizes",
        ] {
            assert!(tables.contains(&table.to_string()), "missing {table}");
        }
    }

    #[test]
    fn test_failed_operation_rolls_back_whole_batch() {
        let temp = TempDir::new().unwrap();
        let store = open(&temp);
        seed_application(&store);

        let mut tx = Transaction::new();
        tx.enqueue(StoreOp::InsertAuthorizes(vec![auth("auth-1", "user-a")]));
        for op in file_ops("file-1", FileType::Page, "content-1") {
            tx.enqueue(op);
        }
        // Same primary key as the first entry: fails mid-batch.
        tx.enqueue(StoreOp::InsertAuthorizes(vec![auth("auth-1", "user-b")]));
        tx.enqueue(StoreOp::InsertAuthorizes(vec![auth("auth-3", "user-c")]));

        let result = tx.commit(&store);
        match result {
            Err(Error::Commit { index, .. }) => assert_eq!(index, 3),
            other => panic!("expected commit error, got {other:?}"),
        }

        assert!(store.list_authorizes(AuthType::Application, "app-1").unwrap().is_empty());
        assert!(store.get_file("file-1").unwrap().is_none());
        assert!(store.get_content("content-1").unwrap().is_none());
    }

    #[test]
    fn test_duplicate_authorize_target_is_rejected() {
        let temp = TempDir::new().unwrap();
        let store = open(&temp);
        seed_application(&store);

        store
            .run_transaction(&[StoreOp::InsertAuthorizes(vec![auth("auth-1", "user-a")])])
            .unwrap();
        let result =
            store.run_transaction(&[StoreOp::InsertAuthorizes(vec![auth("auth-2", "user-a")])]);
        assert!(matches!(rejection(result), Error::AlreadyExists));
    }

    #[test]
    fn test_missing_parent_is_not_a_conflict() {
        let temp = TempDir::new().unwrap();
        let store = open(&temp);

        // No organization "org-9": a foreign key failure, not a duplicate.
        let result = store.run_transaction(&[StoreOp::CreateApplication(Application {
            id: "app-9".to_string(),
            organization_id: "org-9".to_string(),
            name: "site".to_string(),
            creator: "user-1".to_string(),
            created_at: Utc::now(),
        })]);
        assert!(matches!(rejection(result), Error::Database(_)));
    }

    #[test]
    fn test_set_live_version_keeps_single_live() {
        let temp = TempDir::new().unwrap();
        let store = open(&temp);
        seed_application(&store);

        let mut ops = file_ops("file-1", FileType::Template, "content-1");
        ops.push(version("content-1", 1, true));
        ops.push(version("content-1", 2, false));
        store.run_transaction(&ops).unwrap();

        store
            .run_transaction(&[StoreOp::SetLiveVersion {
                content_id: "content-1".to_string(),
                version_number: 2,
            }])
            .unwrap();

        let live = store.get_live_versions(&["content-1".to_string()]).unwrap();
        assert_eq!(live.len(), 1);
        assert_eq!(live[0].version_number, 2);
        assert!(!store.get_version("content-1", 1).unwrap().unwrap().live);
        assert_eq!(store.latest_version_number("content-1").unwrap(), Some(2));
    }

    #[test]
    fn test_set_live_unknown_version_leaves_previous_live() {
        let temp = TempDir::new().unwrap();
        let store = open(&temp);
        seed_application(&store);

        let mut ops = file_ops("file-1", FileType::Template, "content-1");
        ops.push(version("content-1", 1, true));
        store.run_transaction(&ops).unwrap();

        let result = store.run_transaction(&[StoreOp::SetLiveVersion {
            content_id: "content-1".to_string(),
            version_number: 7,
        }]);
        assert!(matches!(result, Err(Error::Commit { index: 0, .. })));

        let live = store.get_live_versions(&["content-1".to_string()]).unwrap();
        assert_eq!(live[0].version_number, 1);
    }

    #[test]
    fn test_deleted_file_has_no_live_versions() {
        let temp = TempDir::new().unwrap();
        let store = open(&temp);
        seed_application(&store);

        let mut ops = file_ops("file-1", FileType::Variable, "content-1");
        ops.push(version("content-1", 1, true));
        store.run_transaction(&ops).unwrap();
        assert_eq!(store.list_application_live_versions("app-1").unwrap().len(), 1);

        store
            .run_transaction(&[StoreOp::SetFileStatus {
                file_id: "file-1".to_string(),
                status: FileStatus::Deleted,
            }])
            .unwrap();

        assert!(store.get_live_versions(&["content-1".to_string()]).unwrap().is_empty());
        assert!(store.list_application_live_versions("app-1").unwrap().is_empty());
        assert_eq!(
            store.get_file("file-1").unwrap().unwrap().status,
            FileStatus::Deleted
        );
    }

    #[test]
    fn test_deleted_files_are_paged_newest_first() {
        let temp = TempDir::new().unwrap();
        let store = open(&temp);
        seed_application(&store);

        let mut ops = Vec::new();
        for n in 1..=3 {
            ops.extend(file_ops(&format!("file-{n}"), FileType::Page, &format!("content-{n}")));
        }
        store.run_transaction(&ops).unwrap();

        for n in [2, 1] {
            store
                .run_transaction(&[StoreOp::SetFileStatus {
                    file_id: format!("file-{n}"),
                    status: FileStatus::Deleted,
                }])
                .unwrap();
            std::thread::sleep(std::time::Duration::from_millis(5));
        }

        assert_eq!(store.count_deleted_files("app-1").unwrap(), 2);
        let first = store.list_deleted_files("app-1", 1, 0).unwrap();
        assert_eq!(first[0].id, "file-1");
        let second = store.list_deleted_files("app-1", 1, 1).unwrap();
        assert_eq!(second[0].id, "file-2");
        assert!(store.list_deleted_files("app-1", 1, 2).unwrap().is_empty());
    }

    #[test]
    fn test_require_live_lists_missing_contents() {
        let temp = TempDir::new().unwrap();
        let store = open(&temp);
        seed_application(&store);

        let mut ops = file_ops("file-1", FileType::Template, "content-1");
        ops.extend(file_ops("file-2", FileType::Template, "content-2"));
        ops.push(version("content-1", 1, true));
        ops.push(version("content-2", 1, false));
        store.run_transaction(&ops).unwrap();

        store
            .run_transaction(&[StoreOp::RequireLive(vec!["content-1".to_string()])])
            .unwrap();

        let result = store.run_transaction(&[StoreOp::RequireLive(vec![
            "content-1".to_string(),
            "content-2".to_string(),
            "ghost".to_string(),
        ])]);
        match rejection(result) {
            Error::DependencyMissing(ids) => assert_eq!(ids, vec!["content-2", "ghost"]),
            other => panic!("expected missing dependency, got {other:?}"),
        }
    }

    #[test]
    fn test_require_unreferenced_sees_live_references() {
        let temp = TempDir::new().unwrap();
        let store = open(&temp);
        seed_application(&store);

        let mut relations = Relations::default();
        relations.push(RelationKind::Condition, "cond".to_string());

        let mut ops = file_ops("cond-file", FileType::Condition, "cond");
        ops.extend(file_ops("page-file", FileType::Page, "page"));
        ops.push(version("cond", 1, true));
        ops.push(version_with("page", 1, true, relations));
        store.run_transaction(&ops).unwrap();

        let result = store.run_transaction(&[StoreOp::RequireUnreferenced {
            file_id: "cond-file".to_string(),
        }]);
        match rejection(result) {
            Error::CannotDelete(ids) => assert_eq!(ids, vec!["page"]),
            other => panic!("expected cannot delete, got {other:?}"),
        }

        store
            .run_transaction(&[StoreOp::RequireUnreferenced {
                file_id: "page-file".to_string(),
            }])
            .unwrap();
    }

    #[test]
    fn test_update_authorizes_in_place() {
        let temp = TempDir::new().unwrap();
        let store = open(&temp);
        seed_application(&store);

        store
            .run_transaction(&[StoreOp::InsertAuthorizes(vec![auth("auth-1", "user-a")])])
            .unwrap();
        store
            .run_transaction(&[StoreOp::UpdateAuthorizes {
                ids: vec!["auth-1".to_string()],
                mask: Mask::EDIT.union(Mask::DELETE),
                allow: false,
            }])
            .unwrap();

        let entries = store
            .find_authorizes(AuthType::Application, "app-1", &["user-a".to_string()])
            .unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].mask, Mask::new(6));
        assert!(!entries[0].allow);
    }

    #[test]
    fn test_team_membership() {
        let temp = TempDir::new().unwrap();
        let store = open(&temp);
        seed_application(&store);

        store
            .run_transaction(&[
                user("alice"),
                user("bob"),
                StoreOp::CreateTeam(Team {
                    id: "team-1".to_string(),
                    organization_id: "org-1".to_string(),
                    name: "editors".to_string(),
                    creator: "alice".to_string(),
                    created_at: Utc::now(),
                }),
                StoreOp::AddTeamMembers {
                    team_id: "team-1".to_string(),
                    user_ids: vec!["alice".to_string(), "bob".to_string()],
                },
                // Re-adding a member is a no-op.
                StoreOp::AddTeamMembers {
                    team_id: "team-1".to_string(),
                    user_ids: vec!["bob".to_string()],
                },
            ])
            .unwrap();

        let members: Vec<String> = store
            .list_team_members("team-1")
            .unwrap()
            .into_iter()
            .map(|u| u.id)
            .collect();
        assert_eq!(members, vec!["alice", "bob"]);
        assert_eq!(store.list_user_team_ids("bob").unwrap(), vec!["team-1"]);
        assert_eq!(store.list_teams("org-1").unwrap().len(), 1);

        store
            .run_transaction(&[StoreOp::RemoveTeamMembers {
                team_id: "team-1".to_string(),
                user_ids: vec!["bob".to_string()],
            }])
            .unwrap();
        assert!(store.list_user_team_ids("bob").unwrap().is_empty());
    }

    #[test]
    fn test_duplicate_user_name_is_conflict() {
        let temp = TempDir::new().unwrap();
        let store = open(&temp);

        store.run_transaction(&[user("alice")]).unwrap();
        let result = store.run_transaction(&[StoreOp::CreateUser(User {
            id: "other-id".to_string(),
            name: "alice".to_string(),
            created_at: Utc::now(),
        })]);
        assert!(matches!(rejection(result), Error::AlreadyExists));
    }

    #[test]
    fn test_token_lookup_collision() {
        let temp = TempDir::new().unwrap();
        let store = open(&temp);

        store
            .run_transaction(&[admin_token("token-1", "0a1b2c3d")])
            .unwrap();

        let result = store.run_transaction(&[admin_token("token-2", "0a1b2c3d")]);
        assert!(matches!(rejection(result), Error::TokenLookupCollision));
        assert!(store.has_admin_token().unwrap());
    }

    #[test]
    fn test_corrupt_timestamp_is_a_read_error() {
        let temp = TempDir::new().unwrap();
        let store = open(&temp);

        store
            .conn()
            .execute(
                "INSERT INTO users (id, name, created_at) VALUES ('u1', 'alice', 'yesterday')",
                [],
            )
            .unwrap();
        assert!(store.get_user("u1").is_err());

        store
            .conn()
            .execute(
                "INSERT INTO users (id, name) VALUES ('u2', 'bob')",
                [],
            )
            .unwrap();
        assert_eq!(store.get_user("u2").unwrap().unwrap().name, "bob");
    }
}
