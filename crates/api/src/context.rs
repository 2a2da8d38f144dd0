use storefront_auth::{JwtClaims, Permission, Principal, Role};
use storefront_core::UserId;

use crate::authz::permissions_for_roles;

/// Authenticated caller for a request (from a verified bearer token).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentUser {
    user_id: UserId,
    email: Option<String>,
    roles: Vec<Role>,
    permissions: Vec<Permission>,
}

impl CurrentUser {
    pub fn from_claims(claims: JwtClaims) -> Self {
        let permissions = permissions_for_roles(&claims.roles);
        Self {
            user_id: claims.sub,
            email: claims.email,
            roles: claims.roles,
            permissions,
        }
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    pub fn email(&self) -> Option<&str> {
        self.email.as_deref()
    }

    pub fn roles(&self) -> &[Role] {
        &self.roles
    }

    pub fn permissions(&self) -> &[Permission] {
        &self.permissions
    }

    pub fn principal(&self) -> Principal {
        Principal {
            user_id: self.user_id,
            roles: self.roles.clone(),
            permissions: self.permissions.clone(),
        }
    }
}
