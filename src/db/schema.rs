/// Schema for the catalog cache tables.
///
/// `characters.id` is an INTEGER PRIMARY KEY, so it aliases the rowid and
/// `INSERT OR REPLACE` keyed by id gives last-write-wins.
pub const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS characters (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    status TEXT NOT NULL,
    species TEXT NOT NULL,
    image TEXT NOT NULL,
    page INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_characters_page ON characters(page);

-- Pagination continuation per cached character
CREATE TABLE IF NOT EXISTS remote_keys (
    character_id INTEGER PRIMARY KEY,
    prev_page INTEGER,
    next_page INTEGER
);
"#;
