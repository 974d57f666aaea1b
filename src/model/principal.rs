use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The acting principal a collaborator supplies for provenance stamps and
/// assigning-application checks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub identity_key: Uuid,
    pub application_key: String,
}

impl Principal {
    pub fn new(identity_key: Uuid, application_key: impl Into<String>) -> Self {
        Self {
            identity_key,
            application_key: application_key.into(),
        }
    }
}

pub trait PrincipalProvider: Send + Sync {
    fn current(&self) -> Principal;
}

/// Provider that always returns the same principal. Suitable for embedded
/// use and tests; a request-scoped provider belongs to the transport layer.
pub struct FixedPrincipal {
    principal: Principal,
}

impl FixedPrincipal {
    pub fn new(principal: Principal) -> Self {
        Self { principal }
    }

    pub fn application(application_key: impl Into<String>) -> Self {
        Self::new(Principal::new(Uuid::new_v4(), application_key))
    }
}

impl PrincipalProvider for FixedPrincipal {
    fn current(&self) -> Principal {
        self.principal.clone()
    }
}
