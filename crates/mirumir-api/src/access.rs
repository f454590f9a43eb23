//! Who may do what on a board.
//!
//! Resolution order is fixed: the creator is always `Owner`, an explicit
//! grant comes next, public boards fall back to `View`, and anything else has
//! no access at all. The guard compares the resolved level against what an
//! endpoint needs.

use std::collections::HashMap;

use thiserror::Error;
use tracing::debug;

use mirumir_db::Database;
use mirumir_db::models::{BoardRow, GrantRow};
use mirumir_types::Permission;
use mirumir_types::models::{BoardId, UserId};

use crate::auth::AppStateInner;
use crate::error::ApiError;

/// Grants already fetched for one user, keyed by board. Built once per list
/// request so resolving N boards costs a single query.
pub type GrantCache = HashMap<BoardId, GrantRow>;

/// Source of explicit grants when no cache is supplied.
pub trait GrantStore {
    fn grant_for(&self, board_id: BoardId, user_id: UserId) -> anyhow::Result<Option<GrantRow>>;
}

impl GrantStore for Database {
    fn grant_for(&self, board_id: BoardId, user_id: UserId) -> anyhow::Result<Option<GrantRow>> {
        self.get_grant(board_id, user_id)
    }
}

#[derive(Debug, Error)]
pub enum AccessError {
    #[error("No access to this board")]
    NoAccess { board_id: BoardId },

    #[error("Requires {required} permission, but user has {have}")]
    InsufficientPermission { have: Permission, required: Permission },

    #[error("grant lookup failed: {0}")]
    Store(#[from] anyhow::Error),
}

/// Sharing requests that are well-formed but break the grant rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum GrantRuleViolation {
    #[error("Owner permission cannot be granted; use 'view' or 'edit'")]
    OwnerNotGrantable,

    #[error("The board owner's access cannot be shared, changed, or revoked")]
    TargetIsOwner,
}

pub fn build_cache(grants: impl IntoIterator<Item = GrantRow>) -> GrantCache {
    grants.into_iter().map(|g| (g.board_id, g)).collect()
}

/// Effective permission of `user_id` on `board`, or `None` for no access.
///
/// With a cache, a board absent from it counts as "no grant" and the store is
/// not consulted.
pub fn resolve<S>(
    store: &S,
    user_id: UserId,
    board: &BoardRow,
    cache: Option<&GrantCache>,
) -> anyhow::Result<Option<Permission>>
where
    S: GrantStore + ?Sized,
{
    if board.creator_id == user_id {
        return Ok(Some(Permission::Owner));
    }

    let granted = match cache {
        Some(cache) => cache.get(&board.id).map(|g| g.permission),
        None => store.grant_for(board.id, user_id)?.map(|g| g.permission),
    };
    if granted.is_some() {
        return Ok(granted);
    }

    if board.is_public {
        return Ok(Some(Permission::View));
    }
    Ok(None)
}

/// Resolve, then insist on at least `required`.
pub fn require<S>(
    store: &S,
    user_id: UserId,
    board: &BoardRow,
    cache: Option<&GrantCache>,
    required: Permission,
) -> Result<Permission, AccessError>
where
    S: GrantStore + ?Sized,
{
    let Some(have) = resolve(store, user_id, board, cache)? else {
        return Err(AccessError::NoAccess { board_id: board.id });
    };
    if !have.satisfies(required) {
        return Err(AccessError::InsufficientPermission { have, required });
    }
    Ok(have)
}

/// Only `view` and `edit` can be handed out.
pub fn check_grantable(permission: Permission) -> Result<(), GrantRuleViolation> {
    if permission.is_grantable() {
        Ok(())
    } else {
        Err(GrantRuleViolation::OwnerNotGrantable)
    }
}

/// The creator's implicit ownership is never the subject of a grant.
pub fn check_grant_target(board: &BoardRow, target: UserId) -> Result<(), GrantRuleViolation> {
    if board.creator_id == target {
        Err(GrantRuleViolation::TargetIsOwner)
    } else {
        Ok(())
    }
}

/// Load a board and check the caller against `required`.
///
/// Missing boards are 404 before any permission is looked at.
pub(crate) fn guard_board(
    state: &AppStateInner,
    board_id: BoardId,
    user_id: UserId,
    required: Permission,
) -> Result<(BoardRow, Permission), ApiError> {
    let board = state
        .db
        .get_board(board_id)?
        .ok_or_else(ApiError::board_not_found)?;

    match require(&state.db, user_id, &board, None, required) {
        Ok(permission) => Ok((board, permission)),
        Err(e) => {
            debug!("User {} denied {} on board {}: {}", user_id, required, board_id, e);
            Err(e.into())
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use chrono::Utc;

    use super::*;

    const CREATOR: UserId = 1;
    const OTHER: UserId = 2;

    #[derive(Default)]
    struct MemoryStore {
        grants: HashMap<(BoardId, UserId), GrantRow>,
        lookups: Cell<usize>,
    }

    impl MemoryStore {
        fn with_grant(board_id: BoardId, user_id: UserId, permission: Permission) -> Self {
            let mut store = Self::default();
            store.grants.insert((board_id, user_id), grant(board_id, user_id, permission));
            store
        }
    }

    impl GrantStore for MemoryStore {
        fn grant_for(&self, board_id: BoardId, user_id: UserId) -> anyhow::Result<Option<GrantRow>> {
            self.lookups.set(self.lookups.get() + 1);
            Ok(self.grants.get(&(board_id, user_id)).cloned())
        }
    }

    struct BrokenStore;

    impl GrantStore for BrokenStore {
        fn grant_for(&self, _: BoardId, _: UserId) -> anyhow::Result<Option<GrantRow>> {
            anyhow::bail!("database is locked")
        }
    }

    fn grant(board_id: BoardId, user_id: UserId, permission: Permission) -> GrantRow {
        GrantRow {
            board_id,
            user_id,
            permission,
            granted_by: CREATOR,
            granted_at: Utc::now(),
        }
    }

    fn board(id: BoardId, is_public: bool) -> BoardRow {
        BoardRow {
            id,
            creator_id: CREATOR,
            owner_login: Some("creator".into()),
            title: "Retro".into(),
            description: None,
            background_color: None,
            is_public,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn creator_is_owner_without_lookup() {
        let store = MemoryStore::with_grant(10, CREATOR, Permission::View);
        let level = resolve(&store, CREATOR, &board(10, false), None).unwrap();
        assert_eq!(level, Some(Permission::Owner));
        assert_eq!(store.lookups.get(), 0);
    }

    #[test]
    fn explicit_grant_wins_over_public_view() {
        let store = MemoryStore::with_grant(10, OTHER, Permission::Edit);
        let level = resolve(&store, OTHER, &board(10, true), None).unwrap();
        assert_eq!(level, Some(Permission::Edit));
    }

    #[test]
    fn public_board_falls_back_to_view() {
        let store = MemoryStore::default();
        assert_eq!(
            resolve(&store, OTHER, &board(10, true), None).unwrap(),
            Some(Permission::View)
        );
        assert_eq!(resolve(&store, OTHER, &board(10, false), None).unwrap(), None);
    }

    #[test]
    fn cache_miss_means_no_grant() {
        let store = MemoryStore::with_grant(10, OTHER, Permission::Edit);
        let cache = GrantCache::new();
        let level = resolve(&store, OTHER, &board(10, false), Some(&cache)).unwrap();
        assert_eq!(level, None);
        assert_eq!(store.lookups.get(), 0);
    }

    #[test]
    fn cached_and_uncached_resolution_agree() {
        let grants = [None, Some(Permission::View), Some(Permission::Edit)];
        for caller in [CREATOR, OTHER] {
            for is_public in [false, true] {
                for granted in grants {
                    let mut store = MemoryStore::default();
                    if let Some(p) = granted {
                        store.grants.insert((7, caller), grant(7, caller, p));
                    }
                    let cache = build_cache(store.grants.values().cloned());
                    let b = board(7, is_public);

                    let direct = resolve(&store, caller, &b, None).unwrap();
                    let cached = resolve(&store, caller, &b, Some(&cache)).unwrap();
                    assert_eq!(direct, cached, "caller={caller} public={is_public} grant={granted:?}");
                }
            }
        }
    }

    #[test]
    fn require_is_monotonic_in_level() {
        let levels = [Permission::View, Permission::Edit, Permission::Owner];
        for (user, store) in [
            (OTHER, MemoryStore::with_grant(3, OTHER, Permission::View)),
            (OTHER, MemoryStore::with_grant(3, OTHER, Permission::Edit)),
            (CREATOR, MemoryStore::default()),
        ] {
            let b = board(3, false);
            let mut passed_higher = false;
            for required in levels.iter().rev() {
                let ok = require(&store, user, &b, None, *required).is_ok();
                if passed_higher {
                    assert!(ok, "passing a higher level must pass {required}");
                }
                passed_higher |= ok;
            }
        }
    }

    #[test]
    fn require_distinguishes_denials() {
        let store = MemoryStore::with_grant(4, OTHER, Permission::View);
        let err = require(&store, OTHER, &board(4, false), None, Permission::Edit).unwrap_err();
        assert!(matches!(
            err,
            AccessError::InsufficientPermission { have: Permission::View, required: Permission::Edit }
        ));

        let err = require(&store, 99, &board(4, false), None, Permission::View).unwrap_err();
        assert!(matches!(err, AccessError::NoAccess { board_id: 4 }));
    }

    #[test]
    fn owner_passes_every_check() {
        let store = MemoryStore::default();
        for required in [Permission::View, Permission::Edit, Permission::Owner] {
            assert_eq!(
                require(&store, CREATOR, &board(1, false), None, required).unwrap(),
                Permission::Owner
            );
        }
    }

    #[test]
    fn store_failure_propagates() {
        let err = require(&BrokenStore, OTHER, &board(1, true), None, Permission::View).unwrap_err();
        assert!(matches!(err, AccessError::Store(_)));
    }

    #[test]
    fn grant_rules() {
        assert_eq!(check_grantable(Permission::Owner), Err(GrantRuleViolation::OwnerNotGrantable));
        assert!(check_grantable(Permission::Edit).is_ok());
        assert_eq!(
            check_grant_target(&board(1, false), CREATOR),
            Err(GrantRuleViolation::TargetIsOwner)
        );
        assert!(check_grant_target(&board(1, false), OTHER).is_ok());
    }
}
