//! Database schema and migrations for the photo gallery.
//!
//! Migrations are applied sequentially when the database is first opened or
//! upgraded. The `schema_version` table tracks which ones have run.

/// Database migrations.
pub const MIGRATIONS: &[&str] = &[
    // v1: photos table holding both originals and their thumbnails
    r#"
CREATE TABLE photos (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    kind        TEXT NOT NULL,                  -- 'original' or 'thumbnail'
    file_name   TEXT NOT NULL,                  -- <content digest>.<ext>, shared by a pair
    location    TEXT NOT NULL UNIQUE,
    format      TEXT NOT NULL,                  -- 'jpg', 'png', 'gif'
    size_bytes  INTEGER NOT NULL,
    width       INTEGER NOT NULL,
    height      INTEGER NOT NULL,
    status      TEXT NOT NULL DEFAULT 'pending', -- 'pending', 'ready', 'failed'
    created_at  TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE UNIQUE INDEX idx_photos_kind_file_name ON photos(kind, file_name);
"#,
];
