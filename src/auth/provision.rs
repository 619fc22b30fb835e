use chrono::Utc;
use uuid::Uuid;

use super::{RawToken, TokenHasher};
use crate::error::{Error, Result};
use crate::store::{Store, StoreOp, Transaction};
use crate::types::{Token, User};

/// Who a new token authenticates.
#[derive(Debug, Clone, Copy)]
pub enum TokenOwner<'a> {
    Admin,
    User(&'a User),
}

/// Builds the stored record for a fresh token. The raw token is returned once
/// and never persisted.
pub fn issue_token(hasher: &TokenHasher, owner: TokenOwner<'_>) -> Result<(Token, RawToken)> {
    let raw = RawToken::generate();
    let (is_admin, user_id) = match owner {
        TokenOwner::Admin => (true, None),
        TokenOwner::User(user) => (false, Some(user.id.clone())),
    };

    let token = Token {
        id: Uuid::new_v4().to_string(),
        token_hash: hasher.hash(&raw)?,
        token_lookup: raw.lookup().to_string(),
        is_admin,
        user_id,
        created_at: Utc::now(),
        expires_at: None,
        last_used_at: None,
    };
    Ok((token, raw))
}

/// Creates a user and its first token in one batch.
pub fn create_user_with_token<S: Store + ?Sized>(
    store: &S,
    hasher: &TokenHasher,
    name: &str,
) -> Result<(User, RawToken)> {
    let user = User {
        id: Uuid::new_v4().to_string(),
        name: name.to_string(),
        created_at: Utc::now(),
    };
    let (token, raw) = issue_token(hasher, TokenOwner::User(&user))?;

    let mut tx = Transaction::new();
    tx.enqueue(StoreOp::CreateUser(user.clone()));
    tx.enqueue(StoreOp::CreateToken(token));
    tx.commit(store).map_err(Error::into_rejection)?;

    tracing::info!(user_id = %user.id, name, "user created");
    Ok((user, raw))
}

/// Creates the admin token, unless one exists already.
pub fn create_admin_token<S: Store + ?Sized>(
    store: &S,
    hasher: &TokenHasher,
) -> Result<Option<RawToken>> {
    if store.has_admin_token()? {
        return Ok(None);
    }

    let (token, raw) = issue_token(hasher, TokenOwner::Admin)?;
    let mut tx = Transaction::new();
    tx.enqueue(StoreOp::CreateToken(token));
    tx.commit(store).map_err(Error::into_rejection)?;
    Ok(Some(raw))
}
