use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Mask;

/// Scope an authorization entry is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthType {
    Organization,
    Team,
    Application,
    File,
    Content,
}

impl AuthType {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Organization => "organization",
            Self::Team => "team",
            Self::Application => "application",
            Self::File => "file",
            Self::Content => "content",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "organization" => Some(Self::Organization),
            "team" => Some(Self::Team),
            "application" => Some(Self::Application),
            "file" => Some(Self::File),
            "content" => Some(Self::Content),
            _ => None,
        }
    }
}

impl fmt::Display for AuthType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthEntry {
    pub id: String,
    #[serde(rename = "type")]
    pub auth_type: AuthType,
    pub type_id: String,
    pub target_id: String,
    pub mask: Mask,
    pub allow: bool,
    pub creator: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    Page,
    Template,
    Variable,
    Condition,
    Function,
}

impl FileType {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Page => "page",
            Self::Template => "template",
            Self::Variable => "variable",
            Self::Condition => "condition",
            Self::Function => "function",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "page" => Some(Self::Page),
            "template" => Some(Self::Template),
            "variable" => Some(Self::Variable),
            "condition" => Some(Self::Condition),
            "function" => Some(Self::Function),
            _ => None,
        }
    }

    /// Parses the plural route segment, e.g. "conditions".
    pub fn from_plural(s: &str) -> Option<Self> {
        Self::parse(s.strip_suffix('s')?)
    }
}

impl fmt::Display for FileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileStatus {
    Active,
    Deleted,
}

impl FileStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Deleted => "deleted",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "active" => Some(Self::Active),
            "deleted" => Some(Self::Deleted),
            _ => None,
        }
    }

    pub const fn is_deleted(self) -> bool {
        matches!(self, Self::Deleted)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Organization {
    pub id: String,
    pub name: String,
    pub creator: String,
    pub created_at: DateTime<Utc>,
}

/// A group of users inside an organization. Authorization entries may target
/// a team id, in which case they apply to every member.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Team {
    pub id: String,
    pub organization_id: String,
    pub name: String,
    pub creator: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Application {
    pub id: String,
    pub organization_id: String,
    pub name: String,
    pub creator: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileRecord {
    pub id: String,
    pub application_id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub file_type: FileType,
    pub status: FileStatus,
    pub creator: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Content {
    pub id: String,
    pub file_id: String,
    pub title: String,
    pub creator: String,
    pub created_at: DateTime<Utc>,
}

/// The four kinds of content a version may reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RelationKind {
    Template,
    Variable,
    Condition,
    Function,
}

impl RelationKind {
    pub const ALL: [RelationKind; 4] = [
        Self::Template,
        Self::Variable,
        Self::Condition,
        Self::Function,
    ];

    /// The file type a referenced content must have.
    pub const fn file_type(self) -> FileType {
        match self {
            Self::Template => FileType::Template,
            Self::Variable => FileType::Variable,
            Self::Condition => FileType::Condition,
            Self::Function => FileType::Function,
        }
    }
}

/// Per-kind lists, used both for a version's relation ids and for resolved trees.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relations<T> {
    #[serde(default)]
    pub templates: Vec<T>,
    #[serde(default)]
    pub variables: Vec<T>,
    #[serde(default)]
    pub conditions: Vec<T>,
    #[serde(default)]
    pub functions: Vec<T>,
}

impl<T> Default for Relations<T> {
    fn default() -> Self {
        Self {
            templates: Vec::new(),
            variables: Vec::new(),
            conditions: Vec::new(),
            functions: Vec::new(),
        }
    }
}

impl<T> Relations<T> {
    pub fn get(&self, kind: RelationKind) -> &[T] {
        match kind {
            RelationKind::Template => &self.templates,
            RelationKind::Variable => &self.variables,
            RelationKind::Condition => &self.conditions,
            RelationKind::Function => &self.functions,
        }
    }

    pub fn push(&mut self, kind: RelationKind, item: T) {
        match kind {
            RelationKind::Template => self.templates.push(item),
            RelationKind::Variable => self.variables.push(item),
            RelationKind::Condition => self.conditions.push(item),
            RelationKind::Function => self.functions.push(item),
        }
    }

    /// Iterates every item tagged with its kind, in kind order.
    pub fn iter(&self) -> impl Iterator<Item = (RelationKind, &T)> {
        RelationKind::ALL
            .into_iter()
            .flat_map(move |kind| self.get(kind).iter().map(move |item| (kind, item)))
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
            && self.variables.is_empty()
            && self.conditions.is_empty()
            && self.functions.is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentVersion {
    pub id: String,
    pub content_id: String,
    pub version_number: i64,
    #[serde(default)]
    pub relations: Relations<String>,
    #[serde(default)]
    pub schemas: serde_json::Value,
    pub live: bool,
    pub creator: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Token {
    pub id: String,
    #[serde(skip)]
    pub token_hash: String,
    #[serde(skip)]
    pub token_lookup: String,
    pub is_admin: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_used_at: Option<DateTime<Utc>>,
}
