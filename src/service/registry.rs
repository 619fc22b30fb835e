use std::collections::{HashMap, HashSet};

use crate::error::Result;
use crate::store::RegistryStore;
use crate::types::{AuthType, FileRecord, FileType};

/// What an authorization check is performed against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthTarget {
    Scope { auth_type: AuthType, type_id: String },
    File(String),
}

impl AuthTarget {
    pub fn scope(auth_type: AuthType, type_id: impl Into<String>) -> Self {
        Self::Scope {
            auth_type,
            type_id: type_id.into(),
        }
    }

    /// The scope the target itself names, before any ancestor.
    pub fn as_scope(&self) -> (AuthType, &str) {
        match self {
            Self::Scope { auth_type, type_id } => (*auth_type, type_id.as_str()),
            Self::File(file_id) => (AuthType::File, file_id.as_str()),
        }
    }
}

/// Returns the target scope followed by its ancestors, most specific first.
///
/// content → file → application → organization, and team → organization.
/// The chain stops early when a parent record is missing.
pub fn scope_chain<S: RegistryStore + ?Sized>(
    store: &S,
    target: &AuthTarget,
) -> Result<Vec<(AuthType, String)>> {
    let (auth_type, type_id) = target.as_scope();
    let (mut auth_type, mut type_id) = (auth_type, type_id.to_string());

    let mut chain = Vec::with_capacity(4);
    loop {
        chain.push((auth_type, type_id.clone()));

        let parent = match auth_type {
            AuthType::Content => store
                .get_content(&type_id)?
                .map(|c| (AuthType::File, c.file_id)),
            AuthType::File => store
                .get_file(&type_id)?
                .map(|f| (AuthType::Application, f.application_id)),
            AuthType::Application => store
                .get_application(&type_id)?
                .map(|a| (AuthType::Organization, a.organization_id)),
            AuthType::Team => store
                .get_team(&type_id)?
                .map(|t| (AuthType::Organization, t.organization_id)),
            AuthType::Organization => None,
        };

        match parent {
            Some((next_type, next_id)) => {
                auth_type = next_type;
                type_id = next_id;
            }
            None => return Ok(chain),
        }
    }
}

/// Maps each known content id to the file that owns it. Unknown ids are absent.
pub fn content_files<S: RegistryStore + ?Sized>(
    store: &S,
    content_ids: &[String],
) -> Result<HashMap<String, FileRecord>> {
    let contents = store.get_contents(content_ids)?;

    let mut file_ids: Vec<String> = contents.iter().map(|c| c.file_id.clone()).collect();
    file_ids.sort();
    file_ids.dedup();

    let files: HashMap<String, FileRecord> = store
        .get_files(&file_ids)?
        .into_iter()
        .map(|f| (f.id.clone(), f))
        .collect();

    Ok(contents
        .into_iter()
        .filter_map(|c| files.get(&c.file_id).map(|f| (c.id, f.clone())))
        .collect())
}

/// Keeps the ids whose file belongs to `application_id` (and has `file_type`,
/// when given), in request order without duplicates.
pub fn filter_application_contents<S: RegistryStore + ?Sized>(
    store: &S,
    application_id: &str,
    content_ids: &[String],
    file_type: Option<FileType>,
) -> Result<Vec<String>> {
    let files = content_files(store, content_ids)?;
    let mut seen = HashSet::new();

    Ok(content_ids
        .iter()
        .filter(|id| {
            files.get(*id).is_some_and(|f| {
                f.application_id == application_id
                    && file_type.is_none_or(|t| f.file_type == t)
            })
        })
        .filter(|id| seen.insert(id.as_str()))
        .cloned()
        .collect())
}
