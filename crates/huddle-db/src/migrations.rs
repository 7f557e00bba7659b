use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 =
        conn.query_row("SELECT COALESCE(MAX(version), 0) FROM schema_version", [], |r| r.get(0))?;

    if version < 1 {
        info!("Running migration v1 (initial schema)");
        conn.execute_batch(
            "
            CREATE TABLE users (
                id          TEXT PRIMARY KEY,
                name        TEXT NOT NULL,
                email       TEXT NOT NULL UNIQUE COLLATE NOCASE,
                password    TEXT NOT NULL,
                image       TEXT,
                created_at  TEXT NOT NULL
            );

            CREATE TABLE workspaces (
                id          TEXT PRIMARY KEY,
                name        TEXT NOT NULL,
                user_id     TEXT NOT NULL REFERENCES users(id),
                join_code   TEXT NOT NULL,
                created_at  TEXT NOT NULL
            );

            CREATE TABLE members (
                id            TEXT PRIMARY KEY,
                workspace_id  TEXT NOT NULL REFERENCES workspaces(id),
                user_id       TEXT NOT NULL REFERENCES users(id),
                role          TEXT NOT NULL CHECK (role IN ('admin', 'member')),
                created_at    TEXT NOT NULL,
                UNIQUE(workspace_id, user_id)
            );

            CREATE INDEX idx_members_user ON members(user_id);

            CREATE TABLE channels (
                id            TEXT PRIMARY KEY,
                workspace_id  TEXT NOT NULL REFERENCES workspaces(id),
                name          TEXT NOT NULL,
                created_at    TEXT NOT NULL
            );

            CREATE INDEX idx_channels_workspace ON channels(workspace_id, created_at);

            CREATE TABLE conversations (
                id             TEXT PRIMARY KEY,
                workspace_id   TEXT NOT NULL REFERENCES workspaces(id),
                member_one_id  TEXT NOT NULL REFERENCES members(id),
                member_two_id  TEXT NOT NULL REFERENCES members(id),
                created_at     TEXT NOT NULL
            );

            CREATE INDEX idx_conversations_workspace ON conversations(workspace_id);

            CREATE TABLE storage_objects (
                id            TEXT PRIMARY KEY,
                uploader_id   TEXT NOT NULL REFERENCES users(id),
                content_type  TEXT NOT NULL,
                size          INTEGER NOT NULL,
                sha256        TEXT NOT NULL,
                created_at    TEXT NOT NULL
            );

            CREATE TABLE messages (
                id                 TEXT PRIMARY KEY,
                workspace_id       TEXT NOT NULL REFERENCES workspaces(id),
                member_id          TEXT NOT NULL REFERENCES members(id),
                body               TEXT NOT NULL,
                image              TEXT REFERENCES storage_objects(id),
                channel_id         TEXT REFERENCES channels(id),
                conversation_id    TEXT REFERENCES conversations(id),
                parent_message_id  TEXT REFERENCES messages(id),
                created_at         TEXT NOT NULL,
                updated_at         TEXT,
                CHECK ((channel_id IS NULL) <> (conversation_id IS NULL))
            );

            CREATE INDEX idx_messages_channel
                ON messages(channel_id, parent_message_id, created_at);
            CREATE INDEX idx_messages_conversation
                ON messages(conversation_id, parent_message_id, created_at);
            CREATE INDEX idx_messages_parent ON messages(parent_message_id, created_at);
            CREATE INDEX idx_messages_member ON messages(member_id);
            CREATE INDEX idx_messages_workspace ON messages(workspace_id);

            CREATE TABLE reactions (
                id            TEXT PRIMARY KEY,
                workspace_id  TEXT NOT NULL REFERENCES workspaces(id),
                message_id    TEXT NOT NULL REFERENCES messages(id),
                member_id     TEXT NOT NULL REFERENCES members(id),
                emoji         TEXT NOT NULL,
                created_at    TEXT NOT NULL,
                UNIQUE(message_id, member_id, emoji)
            );

            CREATE INDEX idx_reactions_message ON reactions(message_id);
            CREATE INDEX idx_reactions_member ON reactions(member_id);

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}
