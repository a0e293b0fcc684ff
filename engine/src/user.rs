//! Application users.

use crate::{Entity, EntityKind, RecordId, Timestamp};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UserRole {
    #[default]
    Player,
    Groundkeeper,
    Admin,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(default)]
    pub id: RecordId,
    pub email: String,
    pub display_name: String,
    #[serde(default)]
    pub role: UserRole,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub profile_image: Option<String>,
    #[serde(default)]
    pub created_at: Timestamp,
    #[serde(default, with = "crate::wire::bool_flag")]
    pub synced: bool,
}

impl User {
    pub fn new(
        email: impl Into<String>,
        display_name: impl Into<String>,
        role: UserRole,
        now: Timestamp,
    ) -> Self {
        Self {
            id: RecordId::new(),
            email: email.into(),
            display_name: display_name.into(),
            role,
            phone: None,
            profile_image: None,
            created_at: now,
            synced: false,
        }
    }
}

impl Entity for User {
    const KIND: EntityKind = EntityKind::User;

    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: RecordId) {
        self.id = id;
    }

    fn is_synced(&self) -> bool {
        self.synced
    }

    fn set_synced(&mut self, synced: bool) {
        self.synced = synced;
    }
}
