use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS users (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            login       TEXT NOT NULL UNIQUE,
            password    TEXT NOT NULL,
            created_at  TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS boards (
            id                INTEGER PRIMARY KEY AUTOINCREMENT,
            creator_id        INTEGER NOT NULL REFERENCES users(id),
            title             TEXT NOT NULL,
            description       TEXT,
            background_color  TEXT,
            is_public         INTEGER NOT NULL DEFAULT 0,
            created_at        TEXT NOT NULL,
            updated_at        TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_boards_creator
            ON boards(creator_id);

        CREATE TABLE IF NOT EXISTS stickers (
            id           INTEGER PRIMARY KEY AUTOINCREMENT,
            board_id     INTEGER NOT NULL REFERENCES boards(id) ON DELETE CASCADE,
            created_by   INTEGER NOT NULL REFERENCES users(id),
            x            REAL NOT NULL,
            y            REAL NOT NULL,
            width        REAL NOT NULL,
            height       REAL NOT NULL,
            color        TEXT NOT NULL,
            text         TEXT,
            layer_level  INTEGER NOT NULL DEFAULT 0,
            created_at   TEXT NOT NULL,
            updated_at   TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_stickers_board
            ON stickers(board_id, layer_level);

        -- The owner never has a row here; ownership comes from boards.creator_id.
        CREATE TABLE IF NOT EXISTS grants (
            board_id    INTEGER NOT NULL REFERENCES boards(id) ON DELETE CASCADE,
            user_id     INTEGER NOT NULL REFERENCES users(id),
            permission  TEXT NOT NULL CHECK (permission IN ('view', 'edit')),
            granted_by  INTEGER NOT NULL REFERENCES users(id),
            granted_at  TEXT NOT NULL,
            UNIQUE(board_id, user_id)
        );

        CREATE INDEX IF NOT EXISTS idx_grants_user
            ON grants(user_id);
        ",
    )?;

    info!("Database migrations complete");
    Ok(())
}
