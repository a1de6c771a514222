#![deny(warnings)]

pub static DDL_STATEMENTS: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS media (
       id                   INTEGER PRIMARY KEY AUTOINCREMENT,
       content_hash         TEXT NOT NULL UNIQUE,
       file_ext             TEXT NOT NULL,
       media_type           TEXT NOT NULL CHECK (media_type IN ('image', 'video', 'audio')),
       mime_type            TEXT NOT NULL,
       file_size            INTEGER NOT NULL,
       width                INTEGER,
       height               INTEGER,
       duration             REAL,
       codec                TEXT,
       rating               TEXT NOT NULL DEFAULT 'safe'
                            CHECK (rating IN ('safe', 'questionable', 'explicit')),
       is_favorite          INTEGER NOT NULL DEFAULT 0 CHECK (is_favorite IN (0, 1)),
       tag_count            INTEGER NOT NULL DEFAULT 0,
       tag_count_general    INTEGER NOT NULL DEFAULT 0,
       tag_count_artist     INTEGER NOT NULL DEFAULT 0,
       tag_count_copyright  INTEGER NOT NULL DEFAULT 0,
       tag_count_character  INTEGER NOT NULL DEFAULT 0,
       tag_count_metadata   INTEGER NOT NULL DEFAULT 0,
       parent_id            INTEGER REFERENCES media(id) ON DELETE SET NULL,
       has_children         INTEGER NOT NULL DEFAULT 0 CHECK (has_children IN (0, 1)),
       source_url           TEXT,
       created_at           INTEGER NOT NULL,
       updated_at           INTEGER NOT NULL,
       last_viewed_at       INTEGER
     )",
    "CREATE TABLE IF NOT EXISTS tags (
       id           INTEGER PRIMARY KEY AUTOINCREMENT,
       name         TEXT NOT NULL UNIQUE COLLATE NOCASE,
       category     INTEGER NOT NULL DEFAULT 0 CHECK (category IN (0, 1, 2, 3, 4)),
       usage_count  INTEGER NOT NULL DEFAULT 0,
       created_at   INTEGER NOT NULL
     )",
    "CREATE TABLE IF NOT EXISTS media_tags (
       media_id    INTEGER NOT NULL,
       tag_id      INTEGER NOT NULL,
       created_at  INTEGER NOT NULL,

       PRIMARY KEY (media_id, tag_id),
       FOREIGN KEY (media_id) REFERENCES media(id),
       FOREIGN KEY (tag_id) REFERENCES tags(id)
     )",
    "CREATE TABLE IF NOT EXISTS view_history (
       id         INTEGER PRIMARY KEY AUTOINCREMENT,
       media_id   INTEGER NOT NULL REFERENCES media(id) ON DELETE CASCADE,
       viewed_at  INTEGER NOT NULL
     )",
    "CREATE INDEX IF NOT EXISTS media_created_at ON media (created_at DESC, id DESC)",
    "CREATE INDEX IF NOT EXISTS media_parent_id ON media (parent_id)",
    "CREATE INDEX IF NOT EXISTS media_rating ON media (rating)",
    "CREATE INDEX IF NOT EXISTS media_media_type ON media (media_type)",
    "CREATE INDEX IF NOT EXISTS media_tags_tag ON media_tags (tag_id)",
    "CREATE INDEX IF NOT EXISTS view_history_media ON view_history (media_id, viewed_at DESC)",
    "CREATE INDEX IF NOT EXISTS tags_usage ON tags (usage_count DESC)",
    "CREATE INDEX IF NOT EXISTS tags_category_usage ON tags (category, usage_count DESC)",
];
