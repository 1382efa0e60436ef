pub const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS file (
        id INTEGER PRIMARY KEY,
        name TEXT NOT NULL,
        path TEXT UNIQUE NOT NULL
    );

    CREATE TABLE IF NOT EXISTS attr (
        id INTEGER PRIMARY KEY,
        name TEXT UNIQUE NOT NULL
    );

    CREATE TABLE IF NOT EXISTS attr_value (
        id INTEGER PRIMARY KEY,
        value TEXT UNIQUE NOT NULL
    );

    CREATE TABLE IF NOT EXISTS link (
        id INTEGER PRIMARY KEY,
        file_id INTEGER NOT NULL,
        attr_id INTEGER NOT NULL,
        value_id INTEGER NOT NULL,
        FOREIGN KEY(file_id) REFERENCES file(id),
        FOREIGN KEY(attr_id) REFERENCES attr(id),
        FOREIGN KEY(value_id) REFERENCES attr_value(id),
        UNIQUE(file_id, attr_id, value_id)
    );

    CREATE INDEX IF NOT EXISTS idx_file_name ON file(name);
    CREATE INDEX IF NOT EXISTS idx_link_attr_value ON link(attr_id, value_id);
    CREATE INDEX IF NOT EXISTS idx_link_file ON link(file_id);
";
