use crate::error::Result;
use crate::types::{
    Application, AuthEntry, Content, ContentVersion, FileRecord, FileStatus, Mask, Organization,
    Team, Token, User,
};

use super::Store;

/// A deferred mutation. Every operation carries its own ids, so none depends on
/// values generated by an earlier operation in the same batch.
#[derive(Debug, Clone)]
pub enum StoreOp {
    CreateUser(User),
    CreateToken(Token),
    CreateOrganization(Organization),
    CreateTeam(Team),
    /// Adds users to a team. Users that are already members are skipped.
    AddTeamMembers {
        team_id: String,
        user_ids: Vec<String>,
    },
    RemoveTeamMembers {
        team_id: String,
        user_ids: Vec<String>,
    },
    CreateApplication(Application),
    CreateFile(FileRecord),
    CreateContent(Content),
    CreateVersion(ContentVersion),
    /// Clears the current live flag of the content and sets it on `version_number`.
    SetLiveVersion {
        content_id: String,
        version_number: i64,
    },
    SetFileStatus {
        file_id: String,
        status: FileStatus,
    },
    InsertAuthorizes(Vec<AuthEntry>),
    UpdateAuthorizes {
        ids: Vec<String>,
        mask: Mask,
        allow: bool,
    },
    /// Fails with `DependencyMissing` unless every content has a live version
    /// at the moment the batch runs.
    RequireLive(Vec<String>),
    /// Fails with `CannotDelete` while live content outside the file still
    /// references one of its contents.
    RequireUnreferenced { file_id: String },
}

impl StoreOp {
    pub fn name(&self) -> &'static str {
        match self {
            Self::CreateUser(_) => "create_user",
            Self::CreateToken(_) => "create_token",
            Self::CreateOrganization(_) => "create_organization",
            Self::CreateTeam(_) => "create_team",
            Self::AddTeamMembers { .. } => "add_team_members",
            Self::RemoveTeamMembers { .. } => "remove_team_members",
            Self::CreateApplication(_) => "create_application",
            Self::CreateFile(_) => "create_file",
            Self::CreateContent(_) => "create_content",
            Self::CreateVersion(_) => "create_version",
            Self::SetLiveVersion { .. } => "set_live_version",
            Self::SetFileStatus { .. } => "set_file_status",
            Self::InsertAuthorizes(_) => "insert_authorizes",
            Self::UpdateAuthorizes { .. } => "update_authorizes",
            Self::RequireLive(_) => "require_live",
            Self::RequireUnreferenced { .. } => "require_unreferenced",
        }
    }
}

/// Request-scoped unit of work.
///
/// Handlers enqueue operations while they check authorization and resolve
/// relations, then commit once. `commit` consumes the batch, so a batch can
/// never be committed twice or outlive its request.
#[derive(Debug, Default)]
pub struct Transaction {
    ops: Vec<StoreOp>,
}

impl Transaction {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enqueue(&mut self, op: StoreOp) {
        self.ops.push(op);
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn commit<S: Store + ?Sized>(self, store: &S) -> Result<()> {
        if self.ops.is_empty() {
            return Ok(());
        }

        let names: Vec<&str> = self.ops.iter().map(StoreOp::name).collect();
        match store.run_transaction(&self.ops) {
            Ok(()) => {
                tracing::debug!(ops = ?names, "transaction committed");
                Ok(())
            }
            Err(e) => {
                tracing::warn!(ops = ?names, "transaction rolled back: {e}");
                Err(e)
            }
        }
    }
}
