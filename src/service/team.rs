use std::collections::HashSet;

use chrono::Utc;
use uuid::Uuid;

use super::authorize::new_entry;
use crate::error::{Error, Result};
use crate::store::{StoreOp, TeamStore, Transaction, UserStore};
use crate::types::{AuthType, Mask, Team};

/// Enqueues a new team and a full-mask entry for its creator on the team scope.
pub fn enqueue_team(
    tx: &mut Transaction,
    organization_id: &str,
    name: &str,
    creator: &str,
) -> Team {
    let team = Team {
        id: Uuid::new_v4().to_string(),
        organization_id: organization_id.to_string(),
        name: name.to_string(),
        creator: creator.to_string(),
        created_at: Utc::now(),
    };

    tx.enqueue(StoreOp::CreateTeam(team.clone()));
    tx.enqueue(StoreOp::InsertAuthorizes(vec![new_entry(
        AuthType::Team,
        &team.id,
        creator,
        Mask::ALL,
        true,
        creator,
    )]));
    team
}

fn dedup(ids: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    ids.iter()
        .filter(|id| seen.insert(id.as_str()))
        .cloned()
        .collect()
}

fn current_members<S: TeamStore + ?Sized>(store: &S, team_id: &str) -> Result<HashSet<String>> {
    Ok(store
        .list_team_members(team_id)?
        .into_iter()
        .map(|u| u.id)
        .collect())
}

/// Enqueues adding `user_ids` to the team and returns the ids that are new
/// members. Unknown users reject the whole request.
pub fn enqueue_add_members<S: TeamStore + UserStore + ?Sized>(
    store: &S,
    tx: &mut Transaction,
    team_id: &str,
    user_ids: &[String],
) -> Result<Vec<String>> {
    let requested = dedup(user_ids);

    let known: HashSet<String> = store
        .get_users(&requested)?
        .into_iter()
        .map(|u| u.id)
        .collect();
    let unknown: Vec<String> = requested
        .iter()
        .filter(|id| !known.contains(*id))
        .cloned()
        .collect();
    if !unknown.is_empty() {
        return Err(Error::UserNotFound(unknown));
    }

    let members = current_members(store, team_id)?;
    let added: Vec<String> = requested
        .into_iter()
        .filter(|id| !members.contains(id))
        .collect();

    if !added.is_empty() {
        tx.enqueue(StoreOp::AddTeamMembers {
            team_id: team_id.to_string(),
            user_ids: added.clone(),
        });
    }
    Ok(added)
}

/// Enqueues removing `user_ids` from the team and returns the ids that were
/// members. Ids that are not members are ignored.
pub fn enqueue_remove_members<S: TeamStore + ?Sized>(
    store: &S,
    tx: &mut Transaction,
    team_id: &str,
    user_ids: &[String],
) -> Result<Vec<String>> {
    let members = current_members(store, team_id)?;
    let removed: Vec<String> = dedup(user_ids)
        .into_iter()
        .filter(|id| members.contains(id))
        .collect();

    if !removed.is_empty() {
        tx.enqueue(StoreOp::RemoveTeamMembers {
            team_id: team_id.to_string(),
            user_ids: removed.clone(),
        });
    }
    Ok(removed)
}
