use std::collections::HashSet;
use std::slice;

use chrono::Utc;
use uuid::Uuid;

use super::authorize::new_entry;
use super::registry::content_files;
use super::relation::{RelationBundle, deletion_blockers, ensure_complete, resolve_version};
use crate::error::{Error, Result};
use crate::store::{RegistryStore, StoreOp, Transaction, VersionStore};
use crate::types::{
    Application, AuthType, Content, ContentVersion, FileRecord, FileStatus, FileType, Mask,
    Organization, Relations,
};

/// Enqueues a new organization and a full-mask entry for its owner.
pub fn enqueue_organization(tx: &mut Transaction, name: &str, owner_id: &str) -> Organization {
    let org = Organization {
        id: Uuid::new_v4().to_string(),
        name: name.to_string(),
        creator: owner_id.to_string(),
        created_at: Utc::now(),
    };

    tx.enqueue(StoreOp::CreateOrganization(org.clone()));
    tx.enqueue(StoreOp::InsertAuthorizes(vec![new_entry(
        AuthType::Organization,
        &org.id,
        owner_id,
        Mask::ALL,
        true,
        owner_id,
    )]));
    org
}

/// Enqueues a new application and a full-mask entry for its creator.
pub fn enqueue_application(
    tx: &mut Transaction,
    organization_id: &str,
    name: &str,
    creator: &str,
) -> Application {
    let app = Application {
        id: Uuid::new_v4().to_string(),
        organization_id: organization_id.to_string(),
        name: name.to_string(),
        creator: creator.to_string(),
        created_at: Utc::now(),
    };

    tx.enqueue(StoreOp::CreateApplication(app.clone()));
    tx.enqueue(StoreOp::InsertAuthorizes(vec![new_entry(
        AuthType::Application,
        &app.id,
        creator,
        Mask::ALL,
        true,
        creator,
    )]));
    app
}

/// Enqueues a file together with its first content.
pub fn enqueue_file(
    tx: &mut Transaction,
    application_id: &str,
    name: &str,
    file_type: FileType,
    creator: &str,
) -> (FileRecord, Content) {
    let now = Utc::now();
    let file = FileRecord {
        id: Uuid::new_v4().to_string(),
        application_id: application_id.to_string(),
        name: name.to_string(),
        file_type,
        status: FileStatus::Active,
        creator: creator.to_string(),
        created_at: now,
        updated_at: now,
    };
    let content = Content {
        id: Uuid::new_v4().to_string(),
        file_id: file.id.clone(),
        title: name.to_string(),
        creator: creator.to_string(),
        created_at: now,
    };

    tx.enqueue(StoreOp::CreateFile(file.clone()));
    tx.enqueue(StoreOp::CreateContent(content.clone()));
    (file, content)
}

/// Checks that every relation id exists, belongs to `application_id` and
/// points at a file of the kind it is listed under.
pub fn validate_relations<S: RegistryStore + ?Sized>(
    store: &S,
    application_id: &str,
    relations: &Relations<String>,
) -> Result<()> {
    let ids: Vec<String> = relations.iter().map(|(_, id)| id.clone()).collect();
    let files = content_files(store, &ids)?;

    let mut seen = HashSet::new();
    let unknown: Vec<String> = ids
        .iter()
        .filter(|id| !files.contains_key(*id) && seen.insert(id.as_str()))
        .cloned()
        .collect();
    if !unknown.is_empty() {
        return Err(Error::ContentNotFound(unknown));
    }

    for (kind, id) in relations.iter() {
        let file = &files[id];
        if file.application_id != application_id {
            return Err(Error::BadRequest(format!(
                "content {id} belongs to another application"
            )));
        }
        if file.file_type != kind.file_type() {
            return Err(Error::BadRequest(format!(
                "content {id} is a {}, not a {}",
                file.file_type,
                kind.file_type()
            )));
        }
    }
    Ok(())
}

/// Enqueues the next version of `content`. The version is not live.
pub fn enqueue_version<S: RegistryStore + VersionStore + ?Sized>(
    store: &S,
    tx: &mut Transaction,
    file: &FileRecord,
    content: &Content,
    relations: Relations<String>,
    schemas: serde_json::Value,
    creator: &str,
) -> Result<ContentVersion> {
    validate_relations(store, &file.application_id, &relations)?;

    let version_number = store.latest_version_number(&content.id)?.unwrap_or(0) + 1;
    let version = ContentVersion {
        id: Uuid::new_v4().to_string(),
        content_id: content.id.clone(),
        version_number,
        relations,
        schemas,
        live: false,
        creator: creator.to_string(),
        created_at: Utc::now(),
    };

    tx.enqueue(StoreOp::CreateVersion(version.clone()));
    Ok(version)
}

/// Resolves the relation tree of a version and, when complete, enqueues
/// making it the live version of its content.
///
/// The direct relations are checked again inside the commit, so a dependency
/// deleted after resolution fails the batch with `DependencyMissing`.
pub fn enqueue_publish<S: VersionStore + ?Sized>(
    store: &S,
    tx: &mut Transaction,
    content_id: &str,
    version_number: i64,
) -> Result<RelationBundle> {
    let version = store
        .get_version(content_id, version_number)?
        .ok_or(Error::NotFound)?;

    let mut direct: Vec<String> = version.relations.iter().map(|(_, id)| id.clone()).collect();
    direct.sort();
    direct.dedup();

    let bundle = resolve_version(store, version)?;
    ensure_complete(slice::from_ref(&bundle))?;

    if !direct.is_empty() {
        tx.enqueue(StoreOp::RequireLive(direct));
    }
    tx.enqueue(StoreOp::SetLiveVersion {
        content_id: content_id.to_string(),
        version_number,
    });
    Ok(bundle)
}

/// Enqueues flipping `file` to deleted, unless other live content still
/// references it. The reference check is repeated inside the commit, so a
/// referrer published in between fails the batch with `CannotDelete`.
pub fn enqueue_file_delete<S: RegistryStore + VersionStore + ?Sized>(
    store: &S,
    tx: &mut Transaction,
    file: &FileRecord,
) -> Result<()> {
    let blockers = deletion_blockers(store, file)?;
    if !blockers.is_empty() {
        return Err(Error::CannotDelete(blockers));
    }

    tx.enqueue(StoreOp::RequireUnreferenced {
        file_id: file.id.clone(),
    });
    tx.enqueue(StoreOp::SetFileStatus {
        file_id: file.id.clone(),
        status: FileStatus::Deleted,
    });
    Ok(())
}
