use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use skyhold_shared::pii::Masked;

use crate::{CoreError, CoreResult};

/// The authenticated caller, as vouched for by the identity provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PassengerIdentity {
    /// Opaque subject id, stable per passenger.
    pub id: String,
    pub display_name: String,
    pub email: Masked<String>,
    pub is_admin: bool,
}

impl PassengerIdentity {
    pub fn passenger(id: impl Into<String>, display_name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            email: Masked(email.into()),
            is_admin: false,
        }
    }

    pub fn admin(id: impl Into<String>, display_name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            is_admin: true,
            ..Self::passenger(id, display_name, email)
        }
    }

    pub fn require_admin(&self) -> CoreResult<()> {
        if self.is_admin {
            Ok(())
        } else {
            Err(CoreError::Forbidden(format!(
                "administrator role required (subject {})",
                self.id
            )))
        }
    }

    /// Owners and administrators may act on a passenger's records.
    pub fn can_access(&self, owner_id: &str) -> bool {
        self.is_admin || self.id == owner_id
    }
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Resolve a bearer credential into a verified identity.
    async fn resolve(&self, credential: &str) -> CoreResult<PassengerIdentity>;
}
