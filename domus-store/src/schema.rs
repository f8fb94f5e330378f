//! SQL schema for the domus SQLite store.

/// Full schema DDL; idempotent thanks to `CREATE ... IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS properties (
    id             INTEGER PRIMARY KEY,
    property_key   TEXT NOT NULL UNIQUE,
    address_line1  TEXT NOT NULL,
    city           TEXT NOT NULL,
    state          TEXT NOT NULL,
    zip            TEXT NOT NULL,
    lat            REAL,
    lon            REAL,
    created_at     TEXT NOT NULL,
    updated_at     TEXT NOT NULL,
    last_fetch_at  TEXT NOT NULL,
    stale_after    TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS properties_zip_idx ON properties(zip);

CREATE TABLE IF NOT EXISTS listings (
    id             INTEGER PRIMARY KEY,
    property_id    INTEGER NOT NULL REFERENCES properties(id) ON DELETE CASCADE,
    provider       TEXT NOT NULL,
    source_id      TEXT NOT NULL,
    listing_id     TEXT NOT NULL DEFAULT '',
    status         TEXT NOT NULL,
    list_price     INTEGER,
    beds           INTEGER,
    baths          REAL,
    sqft           INTEGER,
    property_type  TEXT,
    created_at     TEXT NOT NULL,
    updated_at     TEXT NOT NULL,
    last_fetch_at  TEXT NOT NULL,
    stale_after    TEXT NOT NULL,
    -- Empty string rather than NULL when the provider gives no listing id,
    -- so the upsert conflict target always matches.
    UNIQUE (provider, source_id, listing_id)
);

CREATE INDEX IF NOT EXISTS listings_property_idx ON listings(property_id);
CREATE INDEX IF NOT EXISTS listings_listing_id_idx ON listings(listing_id);

-- Replaced wholesale per refresh: delete then insert.
CREATE TABLE IF NOT EXISTS listing_photos (
    id           INTEGER PRIMARY KEY,
    listing_id   INTEGER NOT NULL REFERENCES listings(id) ON DELETE CASCADE,
    href         TEXT NOT NULL,
    description  TEXT,
    title        TEXT,
    kind         TEXT,
    media_type   TEXT,
    position     INTEGER NOT NULL,
    created_at   TEXT NOT NULL,
    UNIQUE (listing_id, href)
);

CREATE TABLE IF NOT EXISTS listing_photo_tags (
    id        INTEGER PRIMARY KEY,
    photo_id  INTEGER NOT NULL REFERENCES listing_photos(id) ON DELETE CASCADE,
    label     TEXT NOT NULL,
    UNIQUE (photo_id, label)
);

-- Append-only audit trail. No UPDATE or DELETE is ever issued against this table.
CREATE TABLE IF NOT EXISTS raw_snapshots (
    id              INTEGER PRIMARY KEY,
    provider        TEXT NOT NULL,
    endpoint        TEXT NOT NULL,
    external_id     TEXT,
    payload         BLOB NOT NULL,
    payload_sha256  TEXT NOT NULL,
    fetched_at      TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS raw_snapshots_provider_idx ON raw_snapshots(provider, endpoint, fetched_at);

PRAGMA user_version = 1;
";
