mod schema;
mod sqlite;
mod unit_of_work;

pub use sqlite::SqliteStore;
pub use unit_of_work::{StoreOp, Transaction};

use crate::error::Result;
use crate::types::*;

/// Authorization entries, keyed by (type, type_id, target_id).
pub trait AuthorizeStore: Send + Sync {
    fn find_authorizes(
        &self,
        auth_type: AuthType,
        type_id: &str,
        target_ids: &[String],
    ) -> Result<Vec<AuthEntry>>;
    fn list_authorizes(&self, auth_type: AuthType, type_id: &str) -> Result<Vec<AuthEntry>>;
}

/// Organizations, teams, applications, files and contents.
pub trait RegistryStore: Send + Sync {
    fn get_organization(&self, id: &str) -> Result<Option<Organization>>;
    fn get_team(&self, id: &str) -> Result<Option<Team>>;
    fn list_teams(&self, organization_id: &str) -> Result<Vec<Team>>;
    fn get_application(&self, id: &str) -> Result<Option<Application>>;
    fn get_file(&self, id: &str) -> Result<Option<FileRecord>>;
    fn get_content(&self, id: &str) -> Result<Option<Content>>;
    fn get_contents(&self, ids: &[String]) -> Result<Vec<Content>>;
    fn get_files(&self, ids: &[String]) -> Result<Vec<FileRecord>>;
    fn list_file_contents(&self, file_id: &str) -> Result<Vec<Content>>;
    /// Deleted files of an application, most recently deleted first.
    fn list_deleted_files(
        &self,
        application_id: &str,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<FileRecord>>;
    fn count_deleted_files(&self, application_id: &str) -> Result<u64>;
}

/// Content versions. A version is live when its flag is set and its file is active.
pub trait VersionStore: Send + Sync {
    fn get_live_versions(&self, content_ids: &[String]) -> Result<Vec<ContentVersion>>;
    fn list_application_live_versions(&self, application_id: &str) -> Result<Vec<ContentVersion>>;
    fn get_version(&self, content_id: &str, version_number: i64)
    -> Result<Option<ContentVersion>>;
    fn latest_version_number(&self, content_id: &str) -> Result<Option<i64>>;
}

/// Team membership, the second kind of principal an entry can target.
pub trait TeamStore: Send + Sync {
    fn list_team_members(&self, team_id: &str) -> Result<Vec<User>>;
    /// Ids of the teams `user_id` belongs to.
    fn list_user_team_ids(&self, user_id: &str) -> Result<Vec<String>>;
}

/// Users and their API tokens. Users and tokens are created through
/// [`StoreOp`]s; this trait only reads them.
pub trait UserStore: Send + Sync {
    fn get_user(&self, id: &str) -> Result<Option<User>>;
    fn get_users(&self, ids: &[String]) -> Result<Vec<User>>;
    fn get_token_by_lookup(&self, lookup: &str) -> Result<Option<Token>>;
    fn touch_token(&self, id: &str) -> Result<()>;
    fn has_admin_token(&self) -> Result<bool>;
}

/// Store defines the database interface.
pub trait Store: AuthorizeStore + RegistryStore + VersionStore + TeamStore + UserStore {
    fn initialize(&self) -> Result<()>;

    /// Applies every operation inside one database transaction.
    /// Nothing is persisted unless all of them succeed.
    fn run_transaction(&self, ops: &[StoreOp]) -> Result<()>;
}
