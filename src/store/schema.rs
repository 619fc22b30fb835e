pub const SCHEMA: &str = r#"
-- Users own authorizations; tokens are just auth credentials for users
CREATE TABLE IF NOT EXISTS users (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL UNIQUE,
    created_at TEXT DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS tokens (
    id TEXT PRIMARY KEY,
    token_hash TEXT NOT NULL,          -- argon2id hash with embedded salt
    token_lookup TEXT NOT NULL,        -- first 8 chars of a uuid for fast lookup
    is_admin INTEGER NOT NULL DEFAULT 0,
    user_id TEXT REFERENCES users(id) ON DELETE CASCADE,
    created_at TEXT DEFAULT (datetime('now')),
    expires_at TEXT,                   -- NULL = never
    last_used_at TEXT
);

CREATE TABLE IF NOT EXISTS organizations (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL UNIQUE,
    creator TEXT NOT NULL,
    created_at TEXT DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS teams (
    id TEXT PRIMARY KEY,
    organization_id TEXT NOT NULL REFERENCES organizations(id),
    name TEXT NOT NULL,
    creator TEXT NOT NULL,
    created_at TEXT DEFAULT (datetime('now')),

    UNIQUE(organization_id, name)
);

CREATE TABLE IF NOT EXISTS team_members (
    team_id TEXT NOT NULL REFERENCES teams(id),
    user_id TEXT NOT NULL REFERENCES users(id),
    created_at TEXT DEFAULT (datetime('now')),

    PRIMARY KEY (team_id, user_id)
);

CREATE TABLE IF NOT EXISTS applications (
    id TEXT PRIMARY KEY,
    organization_id TEXT NOT NULL REFERENCES organizations(id),
    name TEXT NOT NULL,
    creator TEXT NOT NULL,
    created_at TEXT DEFAULT (datetime('now')),

    UNIQUE(organization_id, name)
);

-- Files are never removed; status flips to 'deleted'
CREATE TABLE IF NOT EXISTS files (
    id TEXT PRIMARY KEY,
    application_id TEXT NOT NULL REFERENCES applications(id),
    name TEXT NOT NULL,
    type TEXT NOT NULL CHECK (type IN ('page', 'template', 'variable', 'condition', 'function')),
    status TEXT NOT NULL DEFAULT 'active' CHECK (status IN ('active', 'deleted')),
    creator TEXT NOT NULL,
    created_at TEXT DEFAULT (datetime('now')),
    updated_at TEXT DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS contents (
    id TEXT PRIMARY KEY,
    file_id TEXT NOT NULL REFERENCES files(id),
    title TEXT NOT NULL,
    creator TEXT NOT NULL,
    created_at TEXT DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS content_versions (
    id TEXT PRIMARY KEY,
    content_id TEXT NOT NULL REFERENCES contents(id),
    version_number INTEGER NOT NULL,
    relations TEXT NOT NULL DEFAULT '{}',   -- JSON: {templates, variables, conditions, functions}
    schemas TEXT NOT NULL DEFAULT 'null',   -- JSON payload, opaque to the core
    live INTEGER NOT NULL DEFAULT 0,
    creator TEXT NOT NULL,
    created_at TEXT DEFAULT (datetime('now')),

    UNIQUE(content_id, version_number)
);

-- At most one effective entry per (type, type_id, target_id); entries are never removed.
-- target_id is a user id or a team id
CREATE TABLE IF NOT EXISTS authorizes (
    id TEXT PRIMARY KEY,
    type TEXT NOT NULL CHECK (type IN ('organization', 'team', 'application', 'file', 'content')),
    type_id TEXT NOT NULL,
    target_id TEXT NOT NULL,
    mask INTEGER NOT NULL DEFAULT 0,
    allow INTEGER NOT NULL DEFAULT 1,
    creator TEXT NOT NULL,
    created_at TEXT DEFAULT (datetime('now')),
    updated_at TEXT DEFAULT (datetime('now')),

    UNIQUE(type, type_id, target_id)
);

CREATE UNIQUE INDEX IF NOT EXISTS idx_tokens_lookup ON tokens(token_lookup);
CREATE INDEX IF NOT EXISTS idx_tokens_user ON tokens(user_id);
CREATE INDEX IF NOT EXISTS idx_teams_organization ON teams(organization_id);
CREATE INDEX IF NOT EXISTS idx_team_members_user ON team_members(user_id);
CREATE INDEX IF NOT EXISTS idx_applications_organization ON applications(organization_id);
CREATE INDEX IF NOT EXISTS idx_files_application ON files(application_id, status);
CREATE INDEX IF NOT EXISTS idx_contents_file ON contents(file_id);
CREATE INDEX IF NOT EXISTS idx_versions_content ON content_versions(content_id);
CREATE UNIQUE INDEX IF NOT EXISTS idx_versions_one_live ON content_versions(content_id) WHERE live = 1;
CREATE INDEX IF NOT EXISTS idx_authorizes_target ON authorizes(target_id);
"#;
