use std::collections::HashSet;

use chrono::Utc;
use uuid::Uuid;

use super::registry::{AuthTarget, scope_chain};
use crate::error::{Error, Result};
use crate::store::{AuthorizeStore, RegistryStore, StoreOp, TeamStore, Transaction};
use crate::types::{AuthEntry, AuthType, Mask};

/// Returns true if `actor_id` holds every bit of `required` on `target`.
///
/// The actor's principals are its own id plus the teams it belongs to. Scopes
/// are walked from the target up through its ancestors, and the first scope
/// with a decision wins:
///
/// - a deny entry sharing any bit with `required` denies;
/// - otherwise, an allow entry whose mask covers all of `required` allows.
///
/// A scope with neither passes the question to its parent. No decision is a
/// denial.
pub fn check_authorize<S: AuthorizeStore + RegistryStore + TeamStore + ?Sized>(
    store: &S,
    target: &AuthTarget,
    required: Mask,
    actor_id: &str,
) -> Result<bool> {
    let mut principals = vec![actor_id.to_string()];
    principals.extend(store.list_user_team_ids(actor_id)?);

    for (auth_type, type_id) in scope_chain(store, target)? {
        let entries = store.find_authorizes(auth_type, &type_id, &principals)?;
        if entries.is_empty() {
            continue;
        }

        let denied = entries
            .iter()
            .any(|e| !e.allow && e.mask.intersects(required));
        let granted = entries.iter().any(|e| e.allow && e.mask.has(required));

        if denied || granted {
            let allow = !denied;
            tracing::debug!(
                actor = actor_id,
                scope = %auth_type,
                type_id = %type_id,
                mask = required.bits(),
                allow,
                "authorization decided"
            );
            return Ok(allow);
        }
    }

    Ok(false)
}

/// Like [`check_authorize`], but denial is an [`Error::AccessDenied`].
pub fn require_authorize<S: AuthorizeStore + RegistryStore + TeamStore + ?Sized>(
    store: &S,
    target: &AuthTarget,
    required: Mask,
    actor_id: &str,
) -> Result<()> {
    if check_authorize(store, target, required, actor_id)? {
        Ok(())
    } else {
        Err(Error::AccessDenied)
    }
}

/// Mask and allow flag to apply to a set of targets on one scope.
#[derive(Debug, Clone)]
pub struct AuthGrant {
    pub auth_type: AuthType,
    pub type_id: String,
    pub target_ids: Vec<String>,
    pub mask: Mask,
    pub allow: bool,
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct MergeSummary {
    pub inserted: Vec<String>,
    pub updated: Vec<String>,
}

pub fn new_entry(
    auth_type: AuthType,
    type_id: &str,
    target_id: &str,
    mask: Mask,
    allow: bool,
    creator: &str,
) -> AuthEntry {
    let now = Utc::now();
    AuthEntry {
        id: Uuid::new_v4().to_string(),
        auth_type,
        type_id: type_id.to_string(),
        target_id: target_id.to_string(),
        mask,
        allow,
        creator: creator.to_string(),
        created_at: now,
        updated_at: now,
    }
}

/// Enqueues the upsert of `grant`: targets that already hold an entry on the
/// scope get mask/allow overwritten in place, the rest get a fresh entry.
pub fn enqueue_merge<S: AuthorizeStore + ?Sized>(
    store: &S,
    tx: &mut Transaction,
    grant: &AuthGrant,
    creator: &str,
) -> Result<MergeSummary> {
    let mut seen = HashSet::new();
    let target_ids: Vec<String> = grant
        .target_ids
        .iter()
        .filter(|id| seen.insert(id.as_str()))
        .cloned()
        .collect();

    let existing = store.find_authorizes(grant.auth_type, &grant.type_id, &target_ids)?;
    let existing_targets: HashSet<&str> = existing.iter().map(|e| e.target_id.as_str()).collect();

    let fresh: Vec<AuthEntry> = target_ids
        .iter()
        .filter(|id| !existing_targets.contains(id.as_str()))
        .map(|id| {
            new_entry(
                grant.auth_type,
                &grant.type_id,
                id,
                grant.mask,
                grant.allow,
                creator,
            )
        })
        .collect();

    let summary = MergeSummary {
        inserted: fresh.iter().map(|e| e.target_id.clone()).collect(),
        updated: existing.iter().map(|e| e.target_id.clone()).collect(),
    };

    if !fresh.is_empty() {
        tx.enqueue(StoreOp::InsertAuthorizes(fresh));
    }
    if !existing.is_empty() {
        tx.enqueue(StoreOp::UpdateAuthorizes {
            ids: existing.into_iter().map(|e| e.id).collect(),
            mask: grant.mask,
            allow: grant.allow,
        });
    }

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{SqliteStore, Store};
    use crate::types::{Application, FileRecord, FileStatus, FileType, Organization, Team, User};

    fn store_with_app() -> SqliteStore {
        let store = SqliteStore::open_in_memory().unwrap();
        store.initialize().unwrap();
        let now = Utc::now();
        store
            .run_transaction(&[
                StoreOp::CreateOrganization(Organization {
                    id: "org-1".to_string(),
                    name: "acme".to_string(),
                    creator: "owner".to_string(),
                    created_at: now,
                }),
                StoreOp::CreateApplication(Application {
                    id: "app-1".to_string(),
                    organization_id: "org-1".to_string(),
                    name: "site".to_string(),
                    creator: "owner".to_string(),
                    created_at: now,
                }),
                StoreOp::CreateApplication(Application {
                    id: "app-2".to_string(),
                    organization_id: "org-1".to_string(),
                    name: "blog".to_string(),
                    creator: "owner".to_string(),
                    created_at: now,
                }),
                StoreOp::CreateFile(FileRecord {
                    id: "file-1".to_string(),
                    application_id: "app-1".to_string(),
                    name: "home".to_string(),
                    file_type: FileType::Page,
                    status: FileStatus::Active,
                    creator: "owner".to_string(),
                    created_at: now,
                    updated_at: now,
                }),
            ])
            .unwrap();
        store
    }

    fn add_team(store: &SqliteStore, team_id: &str, members: &[&str]) {
        let now = Utc::now();
        let mut ops: Vec<StoreOp> = members
            .iter()
            .map(|id| {
                StoreOp::CreateUser(User {
                    id: id.to_string(),
                    name: id.to_string(),
                    created_at: now,
                })
            })
            .collect();
        ops.push(StoreOp::CreateTeam(Team {
            id: team_id.to_string(),
            organization_id: "org-1".to_string(),
            name: team_id.to_string(),
            creator: "owner".to_string(),
            created_at: now,
        }));
        ops.push(StoreOp::AddTeamMembers {
            team_id: team_id.to_string(),
            user_ids: members.iter().map(|id| id.to_string()).collect(),
        });
        store.run_transaction(&ops).unwrap();
    }

    fn grant(store: &SqliteStore, auth_type: AuthType, type_id: &str, actor: &str, mask: Mask, allow: bool) {
        let mut tx = Transaction::new();
        enqueue_merge(
            store,
            &mut tx,
            &AuthGrant {
                auth_type,
                type_id: type_id.to_string(),
                target_ids: vec![actor.to_string()],
                mask,
                allow,
            },
            "owner",
        )
        .unwrap();
        tx.commit(store).unwrap();
    }

    #[test]
    fn test_no_entry_is_denied() {
        let store = store_with_app();
        let target = AuthTarget::scope(AuthType::Application, "app-1");
        assert!(!check_authorize(&store, &target, Mask::VIEW, "alice").unwrap());
    }

    #[test]
    fn test_entry_on_other_type_id_does_not_grant() {
        let store = store_with_app();
        grant(&store, AuthType::Application, "app-2", "alice", Mask::ALL, true);

        let target = AuthTarget::scope(AuthType::Application, "app-1");
        assert!(!check_authorize(&store, &target, Mask::VIEW, "alice").unwrap());
        let other = AuthTarget::scope(AuthType::Application, "app-2");
        assert!(check_authorize(&store, &other, Mask::VIEW, "alice").unwrap());
    }

    #[test]
    fn test_mask_must_cover_every_required_bit() {
        let store = store_with_app();
        grant(&store, AuthType::Application, "app-1", "alice", Mask::EDIT, true);

        let target = AuthTarget::scope(AuthType::Application, "app-1");
        assert!(check_authorize(&store, &target, Mask::EDIT, "alice").unwrap());
        assert!(!check_authorize(&store, &target, Mask::EDIT.union(Mask::DELETE), "alice").unwrap());
    }

    #[test]
    fn test_organization_entry_cascades_to_file() {
        let store = store_with_app();
        grant(&store, AuthType::Organization, "org-1", "alice", Mask::DELETE, true);

        let file = AuthTarget::File("file-1".to_string());
        assert!(check_authorize(&store, &file, Mask::DELETE, "alice").unwrap());
        assert!(!check_authorize(&store, &file, Mask::EDIT, "alice").unwrap());
    }

    #[test]
    fn test_closer_deny_overrides_ancestor_allow() {
        let store = store_with_app();
        grant(&store, AuthType::Organization, "org-1", "alice", Mask::ALL, true);
        grant(&store, AuthType::Application, "app-1", "alice", Mask::DELETE, false);

        let file = AuthTarget::File("file-1".to_string());
        assert!(!check_authorize(&store, &file, Mask::DELETE, "alice").unwrap());
        // The application entry shares no bit with EDIT, so the organization decides.
        assert!(check_authorize(&store, &file, Mask::EDIT, "alice").unwrap());
    }

    #[test]
    fn test_deny_blocks_request_overlapping_its_bits() {
        let store = store_with_app();
        grant(&store, AuthType::Organization, "org-1", "alice", Mask::ALL, true);
        grant(&store, AuthType::Application, "app-1", "alice", Mask::VIEW, false);

        let file = AuthTarget::File("file-1".to_string());
        assert!(!check_authorize(&store, &file, Mask::VIEW.union(Mask::EDIT), "alice").unwrap());
        assert!(!check_authorize(&store, &file, Mask::ALL, "alice").unwrap());
        assert!(check_authorize(&store, &file, Mask::EDIT, "alice").unwrap());
    }

    #[test]
    fn test_allow_must_come_from_one_entry() {
        let store = store_with_app();
        add_team(&store, "team-1", &["alice"]);
        grant(&store, AuthType::Application, "app-1", "alice", Mask::VIEW, true);
        grant(&store, AuthType::Application, "app-1", "team-1", Mask::EDIT, true);

        let target = AuthTarget::scope(AuthType::Application, "app-1");
        assert!(check_authorize(&store, &target, Mask::VIEW, "alice").unwrap());
        assert!(check_authorize(&store, &target, Mask::EDIT, "alice").unwrap());
        assert!(!check_authorize(&store, &target, Mask::VIEW.union(Mask::EDIT), "alice").unwrap());
    }

    #[test]
    fn test_team_entry_applies_to_members() {
        let store = store_with_app();
        add_team(&store, "team-1", &["alice"]);
        grant(&store, AuthType::Organization, "org-1", "team-1", Mask::VIEW, true);

        let file = AuthTarget::File("file-1".to_string());
        assert!(check_authorize(&store, &file, Mask::VIEW, "alice").unwrap());
        assert!(!check_authorize(&store, &file, Mask::VIEW, "bob").unwrap());

        let team = AuthTarget::scope(AuthType::Team, "team-1");
        assert!(check_authorize(&store, &team, Mask::VIEW, "alice").unwrap());
    }

    #[test]
    fn test_user_deny_beats_team_allow_on_same_scope() {
        let store = store_with_app();
        add_team(&store, "team-1", &["alice"]);
        grant(&store, AuthType::Application, "app-1", "team-1", Mask::ALL, true);
        grant(&store, AuthType::Application, "app-1", "alice", Mask::DELETE, false);

        let target = AuthTarget::scope(AuthType::Application, "app-1");
        assert!(!check_authorize(&store, &target, Mask::DELETE, "alice").unwrap());
        assert!(check_authorize(&store, &target, Mask::EDIT, "alice").unwrap());
    }

    #[test]
    fn test_require_authorize_maps_to_access_denied() {
        let store = store_with_app();
        let target = AuthTarget::scope(AuthType::Organization, "org-1");
        let result = require_authorize(&store, &target, Mask::ADMIN, "mallory");
        assert!(matches!(result, Err(Error::AccessDenied)));
    }

    #[test]
    fn test_merge_updates_existing_and_inserts_new() {
        let store = store_with_app();
        grant(&store, AuthType::Application, "app-1", "t1", Mask::VIEW, true);

        let mut tx = Transaction::new();
        let summary = enqueue_merge(
            &store,
            &mut tx,
            &AuthGrant {
                auth_type: AuthType::Application,
                type_id: "app-1".to_string(),
                target_ids: vec!["t1".to_string(), "t2".to_string(), "t2".to_string()],
                mask: Mask::EDIT.union(Mask::VIEW),
                allow: false,
            },
            "owner",
        )
        .unwrap();
        assert_eq!(summary.inserted, vec!["t2".to_string()]);
        assert_eq!(summary.updated, vec!["t1".to_string()]);
        assert_eq!(tx.len(), 2);
        tx.commit(&store).unwrap();

        let entries = store.list_authorizes(AuthType::Application, "app-1").unwrap();
        assert_eq!(entries.len(), 2);
        for target in ["t1", "t2"] {
            let matching: Vec<_> = entries.iter().filter(|e| e.target_id == target).collect();
            assert_eq!(matching.len(), 1, "one entry for {target}");
            assert_eq!(matching[0].mask, Mask::new(2 | 8));
            assert!(!matching[0].allow);
        }
    }

    #[test]
    fn test_merge_twice_is_idempotent() {
        let store = store_with_app();
        grant(&store, AuthType::Application, "app-1", "t1", Mask::VIEW, true);
        let first = store.list_authorizes(AuthType::Application, "app-1").unwrap().remove(0);

        grant(&store, AuthType::Application, "app-1", "t1", Mask::VIEW, true);
        let entries = store.list_authorizes(AuthType::Application, "app-1").unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].id, first.id);
    }
}
