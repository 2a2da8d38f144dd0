use thiserror::Error;

use storefront_core::UserId;

use crate::{Permission, Role};

/// A resolved principal: who is calling and what they may do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub user_id: UserId,
    pub roles: Vec<Role>,
    pub permissions: Vec<Permission>,
}

impl Principal {
    pub fn has_role(&self, name: &str) -> bool {
        self.roles.iter().any(|r| r.as_str() == name)
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("forbidden: missing permission '{0}'")]
    Forbidden(String),
}

/// Pure policy check: no IO, no panics.
pub fn authorize(principal: &Principal, required: &Permission) -> Result<(), AuthzError> {
    let granted = principal
        .permissions
        .iter()
        .any(|p| p.is_wildcard() || p == required);

    if granted {
        Ok(())
    } else {
        Err(AuthzError::Forbidden(required.as_str().to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn principal(perms: &[&'static str]) -> Principal {
        Principal {
            user_id: UserId::new(),
            roles: vec![Role::new("staff")],
            permissions: perms.iter().map(|p| Permission::new(*p)).collect(),
        }
    }

    #[test]
    fn wildcard_grants_everything() {
        let p = principal(&["*"]);
        assert!(authorize(&p, &Permission::new("discounts.manage")).is_ok());
    }

    #[test]
    fn exact_permission_is_required() {
        let p = principal(&["catalog.manage"]);
        assert!(authorize(&p, &Permission::new("catalog.manage")).is_ok());
        assert_eq!(
            authorize(&p, &Permission::new("discounts.manage")),
            Err(AuthzError::Forbidden("discounts.manage".to_string()))
        );
    }

    #[test]
    fn no_permissions_means_forbidden() {
        let p = principal(&[]);
        assert!(p.has_role("staff"));
        assert!(authorize(&p, &Permission::new("orders.manage")).is_err());
    }
}
