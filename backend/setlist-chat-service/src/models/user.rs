use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const MAX_DISPLAY_NAME_LEN: usize = 50;
pub const MAX_BIO_LEN: usize = 500;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub display_name: String,
    #[serde(default)]
    pub bio: String,
    #[serde(default = "default_public")]
    pub is_public: bool,
}

fn default_public() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockedUser {
    pub user_id: Uuid,
    pub blocked_at: DateTime<Utc>,
}

/// A Set Track'r user as seen by the chat service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    /// Subject issued by the identity provider
    pub auth0_id: String,
    pub profile: Profile,
    #[serde(default)]
    pub blocked_users: Vec<BlockedUser>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn new(auth0_id: &str, display_name: &str) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            auth0_id: auth0_id.to_string(),
            profile: Profile {
                display_name: display_name.to_string(),
                bio: String::new(),
                is_public: true,
            },
            blocked_users: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn display_name(&self) -> &str {
        &self.profile.display_name
    }

    pub fn has_blocked(&self, other: Uuid) -> bool {
        self.blocked_users.iter().any(|b| b.user_id == other)
    }
}

/// What other users may see of a profile
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicUser {
    pub id: Uuid,
    pub display_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    pub is_public: bool,
}

impl From<&User> for PublicUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            display_name: user.profile.display_name.clone(),
            bio: user
                .profile
                .is_public
                .then(|| user.profile.bio.clone()),
            is_public: user.profile.is_public,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    pub display_name: Option<String>,
    pub bio: Option<String>,
    pub is_public: Option<bool>,
}
