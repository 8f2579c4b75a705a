use crate::error::{AppError, AppResult};
use crate::models::user::{MAX_BIO_LEN, MAX_DISPLAY_NAME_LEN};
use crate::models::{ProfileUpdate, PublicUser, User};
use crate::repository::ChatStore;
use error_types::error_codes;
use actix_middleware::AuthSubject;
use uuid::Uuid;

pub struct UserService;

impl UserService {
    /// Resolve the caller, creating the user on first authenticated use
    pub async fn ensure_user(store: &dyn ChatStore, subject: &AuthSubject) -> AppResult<User> {
        if let Some(user) = store.find_user_by_auth0_id(&subject.subject).await? {
            return Ok(user);
        }

        let display_name: String = subject
            .display_name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .unwrap_or(subject.subject.as_str())
            .chars()
            .take(MAX_DISPLAY_NAME_LEN)
            .collect();

        let user = store
            .insert_user(User::new(&subject.subject, &display_name))
            .await?;
        tracing::info!(user_id = %user.id, "created user on first authenticated request");
        Ok(user)
    }

    /// Resolve the caller without creating it
    pub async fn current_user(store: &dyn ChatStore, auth0_id: &str) -> AppResult<User> {
        store
            .find_user_by_auth0_id(auth0_id)
            .await?
            .ok_or_else(|| AppError::not_found(error_codes::USER_NOT_FOUND, "User not found"))
    }

    pub async fn find(store: &dyn ChatStore, user_id: Uuid) -> AppResult<User> {
        store
            .find_user(user_id)
            .await?
            .ok_or_else(|| AppError::not_found(error_codes::USER_NOT_FOUND, "User not found"))
    }

    pub async fn public_profile(store: &dyn ChatStore, user_id: Uuid) -> AppResult<PublicUser> {
        Self::find(store, user_id).await.map(|u| PublicUser::from(&u))
    }

    pub async fn update_profile(
        store: &dyn ChatStore,
        auth0_id: &str,
        update: ProfileUpdate,
    ) -> AppResult<User> {
        let user = Self::current_user(store, auth0_id).await?;
        let mut profile = user.profile.clone();

        if let Some(name) = update.display_name {
            let name = name.trim();
            if name.is_empty() {
                return Err(AppError::BadRequest("Display name cannot be empty".into()));
            }
            if name.chars().count() > MAX_DISPLAY_NAME_LEN {
                return Err(AppError::BadRequest(format!(
                    "Display name must be at most {MAX_DISPLAY_NAME_LEN} characters"
                )));
            }
            profile.display_name = name.to_string();
        }
        if let Some(bio) = update.bio {
            if bio.chars().count() > MAX_BIO_LEN {
                return Err(AppError::BadRequest(format!(
                    "Bio must be at most {MAX_BIO_LEN} characters"
                )));
            }
            profile.bio = bio;
        }
        if let Some(is_public) = update.is_public {
            profile.is_public = is_public;
        }

        let updated = store
            .update_profile(user.id, profile)
            .await?
            .ok_or_else(|| AppError::not_found(error_codes::USER_NOT_FOUND, "User not found"))?;
        tracing::info!(user_id = %updated.id, "profile updated");
        Ok(updated)
    }
}
