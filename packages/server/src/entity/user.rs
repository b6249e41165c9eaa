use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// The role assigned to newly registered users.
pub const DEFAULT_ROLE: &str = "participant";

/// Role with access to the private admin views.
pub const ADMIN_ROLE: &str = "admin";

#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "user")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    #[sea_orm(unique)]
    pub username: String,

    /// Public half of the credential pair, handed out at registration.
    #[sea_orm(unique)]
    pub api_key: String,
    /// Argon2 hash of the secret half. The plaintext is shown exactly once.
    pub api_secret: String,

    /// One of: admin, participant
    pub role: String,

    #[sea_orm(has_many)]
    pub competitions: HasMany<super::competition::Entity>,

    #[sea_orm(has_many)]
    pub submissions: HasMany<super::submission::Entity>,

    pub created_at: DateTimeUtc,
}

impl ActiveModelBehavior for ActiveModel {}
