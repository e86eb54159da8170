use rusqlite::Connection;

pub mod tables {
    pub const PLAY_COUNTS: &str = "play_counts";

    #[cfg(test)]
    pub const ALL_TABLES: &[&str] = &[PLAY_COUNTS];
}

pub mod columns {
    pub const TITLE: &str = "title";
    pub const PLAYS: &str = "plays";
    pub const LAST_PLAYED_AT: &str = "last_played_at";
}

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS play_counts (
    title TEXT PRIMARY KEY NOT NULL,
    plays INTEGER NOT NULL DEFAULT 0 CHECK (plays >= 0),
    last_played_at INTEGER
);
"#;

pub fn init(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA)
}
