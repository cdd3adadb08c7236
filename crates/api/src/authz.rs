//! API-side authorization guard for commands.
//!
//! This enforces authorization at the command boundary (before dispatch),
//! while keeping domain aggregates and infra auth-agnostic.

use gatepass_auth::{AuthzError, CommandAuthorization, Permission, Principal, Role, authorize};

use crate::context::PrincipalContext;

/// Check authorization for a command in the current request context.
///
/// This is intended to be called **before** dispatching a command.
pub fn authorize_command<C: CommandAuthorization>(
    principal: &PrincipalContext,
    command: &C,
) -> Result<(), AuthzError> {
    let resolved = Principal {
        user_id: principal.user_id(),
        role: principal.role(),
        permissions: permissions_for_role(principal.role()),
    };

    for perm in command.required_permissions() {
        authorize(&resolved, perm)?;
    }

    Ok(())
}

/// Check a single permission for the current request context (read/listing
/// gates, where there is no command to attach requirements to).
pub fn require(principal: &PrincipalContext, permission: &Permission) -> Result<(), AuthzError> {
    let resolved = Principal {
        user_id: principal.user_id(),
        role: principal.role(),
        permissions: permissions_for_role(principal.role()),
    };

    authorize(&resolved, permission)
}

/// Role → permission mapping.
///
/// Admins and superadmins hold the wildcard; hosts get the host surface;
/// guests and moderators book and browse only.
pub fn permissions_for_role(role: Role) -> Vec<Permission> {
    match role {
        Role::Admin | Role::Superadmin => vec![Permission::new("*")],
        Role::Host => vec![
            Permission::new("events.submit"),
            Permission::new("tickets.create"),
            Permission::new("bookings.list_host"),
        ],
        Role::Guest | Role::Moderator => Vec::new(),
    }
}

/// Small helper wrapper to associate required permissions with a command.
pub struct CmdAuth<C> {
    pub inner: C,
    pub required: Vec<Permission>,
}

impl<C> CommandAuthorization for CmdAuth<C> {
    fn required_permissions(&self) -> &[Permission] {
        &self.required
    }
}
