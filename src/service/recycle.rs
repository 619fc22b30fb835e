use std::collections::HashMap;

use serde::Serialize;

use crate::error::Result;
use crate::store::{RegistryStore, UserStore};
use crate::types::{Application, FileRecord};

pub const DEFAULT_PAGE_SIZE: u32 = 20;
pub const MAX_PAGE_SIZE: u32 = 100;

/// A deleted file with the names a listing shows next to it.
#[derive(Debug, Clone, Serialize)]
pub struct RecycledFile {
    #[serde(flatten)]
    pub file: FileRecord,
    pub application_name: String,
    /// `None` when the creator id no longer names a user.
    pub creator_name: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RecyclePage {
    pub items: Vec<RecycledFile>,
    pub page: u32,
    pub size: u32,
    pub total: u64,
}

/// Lists one page of the application's deleted files, most recently deleted
/// first. `page` starts at 1.
pub fn list_recycled<S: RegistryStore + UserStore + ?Sized>(
    store: &S,
    application: &Application,
    page: u32,
    size: u32,
) -> Result<RecyclePage> {
    let offset = page.saturating_sub(1).saturating_mul(size);
    let files = store.list_deleted_files(&application.id, size, offset)?;
    let total = store.count_deleted_files(&application.id)?;

    let mut creator_ids: Vec<String> = files.iter().map(|f| f.creator.clone()).collect();
    creator_ids.sort();
    creator_ids.dedup();

    let names: HashMap<String, String> = store
        .get_users(&creator_ids)?
        .into_iter()
        .map(|u| (u.id, u.name))
        .collect();

    let items = files
        .into_iter()
        .map(|file| RecycledFile {
            application_name: application.name.clone(),
            creator_name: names.get(&file.creator).cloned(),
            file,
        })
        .collect();

    Ok(RecyclePage {
        items,
        page,
        size,
        total,
    })
}
