use crate::Database;
use crate::models::{
    BoardChanges, BoardListRow, BoardRow, GrantRow, NewBoard, NewSticker, ShareRow,
    StickerChanges, StickerRow, UserRow,
};
use anyhow::{Result, ensure};
use chrono::{SecondsFormat, Utc};
use mirumir_types::Permission;
use mirumir_types::api::BoardFilter;
use mirumir_types::models::{BoardId, StickerId, Timestamp, UserId};
use rusqlite::{Connection, Row};
use tracing::warn;

const BOARD_COLUMNS: &str = "b.id, b.creator_id, u.login, b.title, b.description, \
     b.background_color, b.is_public, b.created_at, b.updated_at";

const STICKER_COLUMNS: &str = "id, board_id, created_by, x, y, width, height, color, text, \
     layer_level, created_at, updated_at";

const GRANT_COLUMNS: &str = "board_id, user_id, permission, granted_by, granted_at";

impl Database {
    // -- Users --

    /// Insert a user. Returns `None` when the login is already taken.
    pub fn create_user(&self, login: &str, password_hash: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| {
            let inserted = conn.execute(
                "INSERT INTO users (login, password, created_at) VALUES (?1, ?2, ?3)",
                (login, password_hash, now()),
            );
            match inserted {
                Ok(_) => {}
                Err(rusqlite::Error::SqliteFailure(e, _))
                    if e.code == rusqlite::ErrorCode::ConstraintViolation =>
                {
                    return Ok(None);
                }
                Err(e) => return Err(e.into()),
            }
            query_user_by_id(conn, conn.last_insert_rowid())
        })
    }

    pub fn get_user_by_login(&self, login: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user_by_login(conn, login))
    }

    pub fn get_user_by_id(&self, id: UserId) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user_by_id(conn, id))
    }

    // -- Boards --

    pub fn create_board(&self, new: &NewBoard<'_>) -> Result<BoardRow> {
        self.with_conn(|conn| {
            let ts = now();
            conn.execute(
                "INSERT INTO boards (creator_id, title, description, background_color, is_public, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
                rusqlite::params![
                    new.creator_id,
                    new.title,
                    new.description,
                    new.background_color,
                    new.is_public,
                    ts
                ],
            )?;
            query_board(conn, conn.last_insert_rowid())?
                .ok_or_else(|| anyhow::anyhow!("board vanished after insert"))
        })
    }

    pub fn get_board(&self, id: BoardId) -> Result<Option<BoardRow>> {
        self.with_conn(|conn| query_board(conn, id))
    }

    /// Boards visible to a user through ownership and/or an explicit grant,
    /// most recently updated first.
    pub fn list_boards_for_user(&self, user_id: UserId, filter: BoardFilter) -> Result<Vec<BoardListRow>> {
        self.with_conn(|conn| {
            let scope = match filter {
                BoardFilter::Own => "b.creator_id = ?1",
                BoardFilter::Shared => {
                    "b.creator_id != ?1 AND b.id IN (SELECT board_id FROM grants WHERE user_id = ?1)"
                }
                BoardFilter::All => {
                    "b.creator_id = ?1 OR b.id IN (SELECT board_id FROM grants WHERE user_id = ?1)"
                }
            };
            let sql = format!(
                "SELECT {BOARD_COLUMNS},
                        (SELECT COUNT(*) FROM stickers s WHERE s.board_id = b.id)
                 FROM boards b
                 LEFT JOIN users u ON u.id = b.creator_id
                 WHERE {scope}
                 ORDER BY b.updated_at DESC, b.id DESC"
            );

            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([user_id], |row| {
                    Ok(BoardListRow {
                        board: board_from_row(row)?,
                        sticker_count: row.get(9)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }

    /// Apply a partial update. Returns `None` if the board does not exist.
    pub fn update_board(&self, id: BoardId, changes: &BoardChanges<'_>) -> Result<Option<BoardRow>> {
        self.with_conn(|conn| {
            let updated = conn.execute(
                "UPDATE boards SET
                    title = COALESCE(?2, title),
                    description = COALESCE(?3, description),
                    background_color = COALESCE(?4, background_color),
                    is_public = COALESCE(?5, is_public),
                    updated_at = ?6
                 WHERE id = ?1",
                rusqlite::params![
                    id,
                    changes.title,
                    changes.description,
                    changes.background_color,
                    changes.is_public,
                    now()
                ],
            )?;
            if updated == 0 {
                return Ok(None);
            }
            query_board(conn, id)
        })
    }

    /// Delete a board; stickers and grants go with it. Returns false if absent.
    pub fn delete_board(&self, id: BoardId) -> Result<bool> {
        self.with_conn(|conn| {
            let deleted = conn.execute("DELETE FROM boards WHERE id = ?1", [id])?;
            Ok(deleted > 0)
        })
    }

    // -- Stickers --

    pub fn create_sticker(&self, new: &NewSticker<'_>) -> Result<StickerRow> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let ts = now();
            tx.execute(
                "INSERT INTO stickers (board_id, created_by, x, y, width, height, color, text, layer_level, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?10)",
                rusqlite::params![
                    new.board_id,
                    new.created_by,
                    new.x,
                    new.y,
                    new.width,
                    new.height,
                    new.color,
                    new.text,
                    new.layer_level,
                    ts
                ],
            )?;
            let id = tx.last_insert_rowid();
            touch_board(&tx, new.board_id, &ts)?;
            let row = query_sticker(&tx, new.board_id, id)?
                .ok_or_else(|| anyhow::anyhow!("sticker vanished after insert"))?;
            tx.commit()?;
            Ok(row)
        })
    }

    #[cfg(test)]
    pub fn get_sticker(&self, board_id: BoardId, sticker_id: StickerId) -> Result<Option<StickerRow>> {
        self.with_conn(|conn| query_sticker(conn, board_id, sticker_id))
    }

    pub fn list_stickers(&self, board_id: BoardId) -> Result<Vec<StickerRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {STICKER_COLUMNS} FROM stickers WHERE board_id = ?1 ORDER BY layer_level, id"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([board_id], sticker_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Apply a partial update to a sticker on the given board. Returns `None`
    /// if no such sticker exists on that board.
    pub fn update_sticker(
        &self,
        board_id: BoardId,
        sticker_id: StickerId,
        changes: &StickerChanges<'_>,
    ) -> Result<Option<StickerRow>> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let ts = now();
            let updated = tx.execute(
                "UPDATE stickers SET
                    x = COALESCE(?3, x),
                    y = COALESCE(?4, y),
                    width = COALESCE(?5, width),
                    height = COALESCE(?6, height),
                    color = COALESCE(?7, color),
                    text = COALESCE(?8, text),
                    layer_level = COALESCE(?9, layer_level),
                    updated_at = ?10
                 WHERE id = ?1 AND board_id = ?2",
                rusqlite::params![
                    sticker_id,
                    board_id,
                    changes.x,
                    changes.y,
                    changes.width,
                    changes.height,
                    changes.color,
                    changes.text,
                    changes.layer_level,
                    ts
                ],
            )?;
            if updated == 0 {
                return Ok(None);
            }
            touch_board(&tx, board_id, &ts)?;
            let row = query_sticker(&tx, board_id, sticker_id)?;
            tx.commit()?;
            Ok(row)
        })
    }

    pub fn delete_sticker(&self, board_id: BoardId, sticker_id: StickerId) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let deleted = tx.execute(
                "DELETE FROM stickers WHERE id = ?1 AND board_id = ?2",
                [sticker_id, board_id],
            )?;
            if deleted > 0 {
                touch_board(&tx, board_id, &now())?;
            }
            tx.commit()?;
            Ok(deleted > 0)
        })
    }

    // -- Grants --

    pub fn get_grant(&self, board_id: BoardId, user_id: UserId) -> Result<Option<GrantRow>> {
        self.with_conn(|conn| query_grant(conn, board_id, user_id))
    }

    /// Batch-fetch one user's grants on a set of boards in a single query.
    pub fn get_grants_for_user(&self, user_id: UserId, board_ids: &[BoardId]) -> Result<Vec<GrantRow>> {
        if board_ids.is_empty() {
            return Ok(vec![]);
        }

        self.with_conn(|conn| {
            let placeholders: Vec<String> = (2..=board_ids.len() + 1).map(|i| format!("?{}", i)).collect();
            let sql = format!(
                "SELECT {GRANT_COLUMNS} FROM grants WHERE user_id = ?1 AND board_id IN ({})",
                placeholders.join(", ")
            );

            let mut stmt = conn.prepare(&sql)?;
            let mut params: Vec<&dyn rusqlite::types::ToSql> = Vec::with_capacity(board_ids.len() + 1);
            params.push(&user_id);
            params.extend(board_ids.iter().map(|id| id as &dyn rusqlite::types::ToSql));

            let rows = stmt
                .query_map(params.as_slice(), grant_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }

    /// All grants on a board, with the grantee's login.
    pub fn list_grants_for_board(&self, board_id: BoardId) -> Result<Vec<ShareRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT g.board_id, g.user_id, g.permission, g.granted_by, g.granted_at, u.login
                 FROM grants g
                 JOIN users u ON u.id = g.user_id
                 WHERE g.board_id = ?1
                 ORDER BY g.granted_at, g.user_id",
            )?;
            let rows = stmt
                .query_map([board_id], |row| {
                    Ok(ShareRow {
                        grant: grant_from_row(row)?,
                        user_login: row.get(5)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Create or replace the grant for (board, user). At most one row exists
    /// per pair; an existing row has its permission, grantor and time refreshed.
    pub fn upsert_grant(
        &self,
        board_id: BoardId,
        user_id: UserId,
        permission: Permission,
        granted_by: UserId,
    ) -> Result<GrantRow> {
        ensure!(permission.is_grantable(), "{} cannot be stored as a grant", permission);

        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO grants (board_id, user_id, permission, granted_by, granted_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(board_id, user_id) DO UPDATE SET
                    permission = excluded.permission,
                    granted_by = excluded.granted_by,
                    granted_at = excluded.granted_at",
                rusqlite::params![board_id, user_id, permission.as_str(), granted_by, now()],
            )?;
            query_grant(conn, board_id, user_id)?
                .ok_or_else(|| anyhow::anyhow!("grant vanished after upsert"))
        })
    }

    /// Change the level of an existing grant. Returns `None` if there is none.
    pub fn update_grant(
        &self,
        board_id: BoardId,
        user_id: UserId,
        permission: Permission,
        granted_by: UserId,
    ) -> Result<Option<GrantRow>> {
        ensure!(permission.is_grantable(), "{} cannot be stored as a grant", permission);

        self.with_conn(|conn| {
            let updated = conn.execute(
                "UPDATE grants SET permission = ?3, granted_by = ?4, granted_at = ?5
                 WHERE board_id = ?1 AND user_id = ?2",
                rusqlite::params![board_id, user_id, permission.as_str(), granted_by, now()],
            )?;
            if updated == 0 {
                return Ok(None);
            }
            query_grant(conn, board_id, user_id)
        })
    }

    pub fn delete_grant(&self, board_id: BoardId, user_id: UserId) -> Result<bool> {
        self.with_conn(|conn| {
            let deleted = conn.execute(
                "DELETE FROM grants WHERE board_id = ?1 AND user_id = ?2",
                [board_id, user_id],
            )?;
            Ok(deleted > 0)
        })
    }
}

fn now() -> String {
    format_timestamp(&Utc::now())
}

/// Fixed-width RFC 3339 so that text ordering matches time ordering.
fn format_timestamp(ts: &Timestamp) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(raw: &str) -> Timestamp {
    chrono::DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|_| {
            // Rows written by hand through the sqlite shell use datetime('now').
            chrono::NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
        })
        .unwrap_or_else(|e| {
            warn!("Corrupt timestamp '{}': {}", raw, e);
            Timestamp::default()
        })
}

fn timestamp_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<Timestamp> {
    let raw: String = row.get(idx)?;
    Ok(parse_timestamp(&raw))
}

fn permission_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<Permission> {
    let raw: String = row.get(idx)?;
    raw.parse().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

fn touch_board(conn: &Connection, board_id: BoardId, ts: &str) -> Result<()> {
    conn.execute("UPDATE boards SET updated_at = ?2 WHERE id = ?1", (board_id, ts))?;
    Ok(())
}

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: row.get(0)?,
        login: row.get(1)?,
        password: row.get(2)?,
        created_at: timestamp_at(row, 3)?,
    })
}

fn board_from_row(row: &Row<'_>) -> rusqlite::Result<BoardRow> {
    Ok(BoardRow {
        id: row.get(0)?,
        creator_id: row.get(1)?,
        owner_login: row.get(2)?,
        title: row.get(3)?,
        description: row.get(4)?,
        background_color: row.get(5)?,
        is_public: row.get(6)?,
        created_at: timestamp_at(row, 7)?,
        updated_at: timestamp_at(row, 8)?,
    })
}

fn sticker_from_row(row: &Row<'_>) -> rusqlite::Result<StickerRow> {
    Ok(StickerRow {
        id: row.get(0)?,
        board_id: row.get(1)?,
        created_by: row.get(2)?,
        x: row.get(3)?,
        y: row.get(4)?,
        width: row.get(5)?,
        height: row.get(6)?,
        color: row.get(7)?,
        text: row.get(8)?,
        layer_level: row.get(9)?,
        created_at: timestamp_at(row, 10)?,
        updated_at: timestamp_at(row, 11)?,
    })
}

fn grant_from_row(row: &Row<'_>) -> rusqlite::Result<GrantRow> {
    Ok(GrantRow {
        board_id: row.get(0)?,
        user_id: row.get(1)?,
        permission: permission_at(row, 2)?,
        granted_by: row.get(3)?,
        granted_at: timestamp_at(row, 4)?,
    })
}

fn query_user_by_login(conn: &Connection, login: &str) -> Result<Option<UserRow>> {
    let mut stmt = conn.prepare("SELECT id, login, password, created_at FROM users WHERE login = ?1")?;
    let row = stmt.query_row([login], user_from_row).optional()?;
    Ok(row)
}

fn query_user_by_id(conn: &Connection, id: UserId) -> Result<Option<UserRow>> {
    let mut stmt = conn.prepare("SELECT id, login, password, created_at FROM users WHERE id = ?1")?;
    let row = stmt.query_row([id], user_from_row).optional()?;
    Ok(row)
}

fn query_board(conn: &Connection, id: BoardId) -> Result<Option<BoardRow>> {
    let sql = format!(
        "SELECT {BOARD_COLUMNS} FROM boards b LEFT JOIN users u ON u.id = b.creator_id WHERE b.id = ?1"
    );
    let row = conn.query_row(&sql, [id], board_from_row).optional()?;
    Ok(row)
}

fn query_sticker(conn: &Connection, board_id: BoardId, sticker_id: StickerId) -> Result<Option<StickerRow>> {
    let sql = format!("SELECT {STICKER_COLUMNS} FROM stickers WHERE id = ?1 AND board_id = ?2");
    let row = conn.query_row(&sql, [sticker_id, board_id], sticker_from_row).optional()?;
    Ok(row)
}

fn query_grant(conn: &Connection, board_id: BoardId, user_id: UserId) -> Result<Option<GrantRow>> {
    let sql = format!("SELECT {GRANT_COLUMNS} FROM grants WHERE board_id = ?1 AND user_id = ?2");
    let row = conn.query_row(&sql, [board_id, user_id], grant_from_row).optional()?;
    Ok(row)
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
