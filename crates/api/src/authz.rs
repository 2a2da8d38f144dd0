//! Role policy and the permission guard used by admin handlers.

use storefront_auth::{AuthzError, Permission, Role, authorize};

use crate::context::CurrentUser;

pub const CATALOG_MANAGE: &str = "catalog.manage";
pub const DISCOUNTS_MANAGE: &str = "discounts.manage";
pub const ORDERS_MANAGE: &str = "orders.manage";

/// `admin` grants everything; `staff` runs the shop. Unknown roles grant nothing.
pub fn permissions_for_roles(roles: &[Role]) -> Vec<Permission> {
    if roles.iter().any(|r| r.as_str() == "admin") {
        return vec![Permission::new("*")];
    }

    let mut out = Vec::new();
    if roles.iter().any(|r| r.as_str() == "staff") {
        out.extend([CATALOG_MANAGE, DISCOUNTS_MANAGE, ORDERS_MANAGE].map(Permission::new));
    }
    out
}

/// Check a permission before dispatching an admin command.
pub fn require(user: &CurrentUser, permission: &'static str) -> Result<(), AuthzError> {
    authorize(&user.principal(), &Permission::new(permission))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn staff_manage_the_shop_but_are_not_wildcards() {
        let perms = permissions_for_roles(&[Role::new("staff")]);
        assert!(perms.contains(&Permission::new(DISCOUNTS_MANAGE)));
        assert!(!perms.iter().any(Permission::is_wildcard));
    }

    #[test]
    fn customers_get_no_permissions() {
        assert!(permissions_for_roles(&[Role::new("customer")]).is_empty());
        assert_eq!(permissions_for_roles(&[Role::new("admin")]), vec![Permission::new("*")]);
    }
}
