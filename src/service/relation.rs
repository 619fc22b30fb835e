//! Live relation resolution.
//!
//! A content's live version references other contents by id. Resolving a root
//! walks those references depth-first, loading the live version of every
//! referenced content, and produces a tree per root. Two conditions make a
//! root incomplete:
//!
//! - a referenced id has no live version (`depend_missing`)
//! - a referenced id is already on the path from the root (`recursive_item`)
//!
//! Neither is an error here; callers decide via [`ensure_complete`]. A diamond,
//! where two branches share a dependency, is not a cycle and the shared node
//! appears once under each branch. Stacked diamonds grow exponentially, so one
//! call expands at most [`MAX_RESOLVED_NODES`] nodes before failing with
//! [`Error::RelationLimit`].

use std::collections::{HashMap, HashSet};

use serde::Serialize;

use super::registry::filter_application_contents;
use crate::error::{Error, Result};
use crate::store::{RegistryStore, VersionStore};
use crate::types::{ContentVersion, FileRecord, FileType, Relations};

/// Upper bound on tree nodes built by a single resolution call.
pub const MAX_RESOLVED_NODES: usize = 10_000;

#[derive(Debug, Clone, Serialize)]
pub struct ResolvedNode {
    pub content: ContentVersion,
    pub relations: Relations<ResolvedNode>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RelationBundle {
    /// Root content id, present even when the root has no live version.
    pub content_id: String,
    pub content: Option<ContentVersion>,
    pub relations: Relations<ResolvedNode>,
    pub depend_missing: Vec<String>,
    pub recursive_item: Option<String>,
}

impl RelationBundle {
    fn new(content_id: &str) -> Self {
        Self {
            content_id: content_id.to_string(),
            content: None,
            relations: Relations::default(),
            depend_missing: Vec::new(),
            recursive_item: None,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.depend_missing.is_empty() && self.recursive_item.is_none()
    }

    fn mark_missing(&mut self, id: &str) {
        if !self.depend_missing.iter().any(|m| m == id) {
            self.depend_missing.push(id.to_string());
        }
    }

    fn mark_recursive(&mut self, id: &str) {
        if self.recursive_item.is_none() {
            self.recursive_item = Some(id.to_string());
        }
    }
}

/// Walks relation graphs, caching live versions for the duration of one call.
///
/// The cache makes every root in a call observe the same snapshot of each
/// content, and lets diamonds be expanded without refetching.
struct Resolver<'a, S: ?Sized> {
    store: &'a S,
    live: HashMap<String, Option<ContentVersion>>,
    nodes: usize,
}

impl<'a, S: VersionStore + ?Sized> Resolver<'a, S> {
    fn new(store: &'a S) -> Self {
        Self {
            store,
            live: HashMap::new(),
            nodes: 0,
        }
    }

    /// Loads the live versions of all uncached ids with a single store call.
    fn prefetch<'i>(&mut self, ids: impl IntoIterator<Item = &'i String>) -> Result<()> {
        let mut pending: Vec<String> = ids
            .into_iter()
            .filter(|id| !self.live.contains_key(*id))
            .cloned()
            .collect();
        pending.sort();
        pending.dedup();

        if pending.is_empty() {
            return Ok(());
        }

        let mut found: HashMap<String, ContentVersion> = self
            .store
            .get_live_versions(&pending)?
            .into_iter()
            .map(|v| (v.content_id.clone(), v))
            .collect();

        for id in pending {
            let version = found.remove(&id);
            self.live.insert(id, version);
        }
        Ok(())
    }

    fn cached(&self, id: &str) -> Option<ContentVersion> {
        self.live.get(id).cloned().flatten()
    }

    fn resolve_root(&mut self, root_id: &str) -> Result<RelationBundle> {
        let mut bundle = RelationBundle::new(root_id);

        let Some(version) = self.cached(root_id) else {
            bundle.mark_missing(root_id);
            return Ok(bundle);
        };

        self.resolve_from(version, &mut bundle)?;
        Ok(bundle)
    }

    fn resolve_from(&mut self, version: ContentVersion, bundle: &mut RelationBundle) -> Result<()> {
        let mut path = vec![version.content_id.clone()];
        bundle.relations = self.expand(&version, &mut path, bundle)?;
        bundle.content = Some(version);
        Ok(())
    }

    fn expand(
        &mut self,
        version: &ContentVersion,
        path: &mut Vec<String>,
        bundle: &mut RelationBundle,
    ) -> Result<Relations<ResolvedNode>> {
        self.prefetch(version.relations.iter().map(|(_, id)| id))?;

        let mut resolved = Relations::default();
        for (kind, id) in version.relations.iter() {
            if path.contains(id) {
                bundle.mark_recursive(id);
                continue;
            }

            let Some(child) = self.cached(id) else {
                bundle.mark_missing(id);
                continue;
            };

            self.nodes += 1;
            if self.nodes > MAX_RESOLVED_NODES {
                return Err(Error::RelationLimit(MAX_RESOLVED_NODES));
            }

            path.push(id.clone());
            let relations = self.expand(&child, path, bundle)?;
            path.pop();

            resolved.push(
                kind,
                ResolvedNode {
                    content: child,
                    relations,
                },
            );
        }

        Ok(resolved)
    }
}

/// Resolves the live relation tree of each root, in input order.
///
/// Roots are taken as given; see [`resolve_live`] for the application filter.
/// Only store faults are errors.
pub fn resolve_roots<S: VersionStore + ?Sized>(
    store: &S,
    content_ids: &[String],
) -> Result<Vec<RelationBundle>> {
    if content_ids.is_empty() {
        return Ok(Vec::new());
    }

    let mut resolver = Resolver::new(store);
    resolver.prefetch(content_ids)?;

    let mut bundles = Vec::with_capacity(content_ids.len());
    for root_id in content_ids {
        let bundle = resolver.resolve_root(root_id)?;
        if !bundle.is_complete() {
            tracing::debug!(
                root = %root_id,
                missing = ?bundle.depend_missing,
                recursive = ?bundle.recursive_item,
                "incomplete relation tree"
            );
        }
        bundles.push(bundle);
    }

    Ok(bundles)
}

/// Resolves live relation trees for the ids of `application_id`.
///
/// Ids that are unknown or owned by another application are dropped before
/// resolution. An empty id list returns immediately without touching the store.
pub fn resolve_live<S: RegistryStore + VersionStore + ?Sized>(
    store: &S,
    application_id: &str,
    content_ids: &[String],
) -> Result<Vec<RelationBundle>> {
    if content_ids.is_empty() {
        return Ok(Vec::new());
    }

    let roots = filter_application_contents(store, application_id, content_ids, None)?;
    resolve_roots(store, &roots)
}

/// Resolves the relation tree below a version that need not be live yet, as
/// done before publishing it.
pub fn resolve_version<S: VersionStore + ?Sized>(
    store: &S,
    version: ContentVersion,
) -> Result<RelationBundle> {
    let mut resolver = Resolver::new(store);
    let mut bundle = RelationBundle::new(&version.content_id);
    resolver.resolve_from(version, &mut bundle)?;
    Ok(bundle)
}

/// Rejects the whole set if any root is incomplete. Missing dependencies are
/// reported before cycles; the error lists offending ids across all roots.
pub fn ensure_complete(bundles: &[RelationBundle]) -> Result<()> {
    let mut missing: Vec<String> = Vec::new();
    let mut recursive: Vec<String> = Vec::new();

    for bundle in bundles {
        for id in &bundle.depend_missing {
            if !missing.contains(id) {
                missing.push(id.clone());
            }
        }
        if let Some(id) = &bundle.recursive_item {
            if !recursive.contains(id) {
                recursive.push(id.clone());
            }
        }
    }

    if !missing.is_empty() {
        return Err(Error::DependencyMissing(missing));
    }
    if !recursive.is_empty() {
        return Err(Error::RecursiveDependency(recursive));
    }
    Ok(())
}

/// Returns the ids of live contents, outside `file`, whose live version
/// references any content of `file`. The file may only be deleted when this
/// is empty.
pub fn deletion_blockers<S: RegistryStore + VersionStore + ?Sized>(
    store: &S,
    file: &FileRecord,
) -> Result<Vec<String>> {
    let own: HashSet<String> = store
        .list_file_contents(&file.id)?
        .into_iter()
        .map(|c| c.id)
        .collect();

    if own.is_empty() {
        return Ok(Vec::new());
    }

    let mut blockers: Vec<String> = store
        .list_application_live_versions(&file.application_id)?
        .into_iter()
        .filter(|v| !own.contains(&v.content_id))
        .filter(|v| v.relations.iter().any(|(_, id)| own.contains(id)))
        .map(|v| v.content_id)
        .collect();

    blockers.sort();
    blockers.dedup();
    Ok(blockers)
}

/// Live versions of the given ids of one type in an application, without
/// expanding relations.
pub fn live_contents<S: RegistryStore + VersionStore + ?Sized>(
    store: &S,
    application_id: &str,
    file_type: FileType,
    content_ids: &[String],
) -> Result<Vec<ContentVersion>> {
    if content_ids.is_empty() {
        return Ok(Vec::new());
    }

    let ids = filter_application_contents(store, application_id, content_ids, Some(file_type))?;
    let mut versions: HashMap<String, ContentVersion> = store
        .get_live_versions(&ids)?
        .into_iter()
        .map(|v| (v.content_id.clone(), v))
        .collect();

    Ok(ids.iter().filter_map(|id| versions.remove(id)).collect())
}
