use crate::error::{AppError, AppResult, BlockDirection};
use crate::models::User;
use crate::repository::ChatStore;
use error_types::error_codes;
use crate::services::UserService;
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// Outcome of a block request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockOutcome {
    Blocked,
    AlreadyBlocked,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockedUserEntry {
    pub user_id: Uuid,
    pub display_name: Option<String>,
    pub blocked_at: DateTime<Utc>,
}

pub struct RelationshipService;

impl RelationshipService {
    /// Fail with the block direction if either user has blocked the other.
    ///
    /// `label` names the other user in the message when known.
    pub fn check_block(current: &User, other: &User, label: Option<&str>) -> AppResult<()> {
        if current.has_blocked(other.id) {
            let message = match label {
                Some(name) => format!("You have blocked {name}"),
                None => "You have blocked this user".to_string(),
            };
            return Err(AppError::Blocked {
                direction: BlockDirection::Outgoing,
                message,
            });
        }
        if other.has_blocked(current.id) {
            let message = match label {
                Some(name) => format!("{name} has blocked you"),
                None => "You have been blocked by this user".to_string(),
            };
            return Err(AppError::Blocked {
                direction: BlockDirection::Incoming,
                message,
            });
        }
        Ok(())
    }

    pub async fn block(
        store: &dyn ChatStore,
        auth0_id: &str,
        target: Uuid,
    ) -> AppResult<BlockOutcome> {
        let user = UserService::current_user(store, auth0_id).await?;
        if user.id == target {
            return Err(AppError::BadRequest("You cannot block yourself".into()));
        }
        UserService::find(store, target).await?;

        let added = store.add_block(user.id, target, Utc::now()).await?;
        if added {
            tracing::info!(user_id = %user.id, blocked_user_id = %target, "user blocked");
            Ok(BlockOutcome::Blocked)
        } else {
            Ok(BlockOutcome::AlreadyBlocked)
        }
    }

    pub async fn unblock(store: &dyn ChatStore, auth0_id: &str, target: Uuid) -> AppResult<()> {
        let user = UserService::current_user(store, auth0_id).await?;
        if !store.remove_block(user.id, target).await? {
            return Err(AppError::not_found(error_codes::BLOCK_NOT_FOUND, "User is not blocked"));
        }
        tracing::info!(user_id = %user.id, blocked_user_id = %target, "user unblocked");
        Ok(())
    }

    pub async fn blocked_users(
        store: &dyn ChatStore,
        auth0_id: &str,
    ) -> AppResult<Vec<BlockedUserEntry>> {
        let user = UserService::current_user(store, auth0_id).await?;
        let mut entries = Vec::with_capacity(user.blocked_users.len());
        for blocked in &user.blocked_users {
            let display_name = store
                .find_user(blocked.user_id)
                .await?
                .map(|u| u.profile.display_name);
            entries.push(BlockedUserEntry {
                user_id: blocked.user_id,
                display_name,
                blocked_at: blocked.blocked_at,
            });
        }
        Ok(entries)
    }
}
