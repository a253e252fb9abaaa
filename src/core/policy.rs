//! Role-based authorization for every portal operation.
//!
//! Handlers never compare role strings; they name the [`Action`] they are
//! about to perform and ask [`authorize`] for a [`Decision`].

use crate::models::users::Role;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Read own identity, notifications, access state.
    UsePortal,
    SubmitAccessRequest,
    ConsumeResource,
    ListPendingRequests,
    ReviewSingle,
    ReviewBulk,
    ApproveRange,
    SendNotification,
    ListUsers,
    ChangeUserStatus,
    AssignLeader,
    ChangeRole,
    ViewRoleAudit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny,
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allow)
    }
}

pub fn authorize(role: Role, action: Action) -> Decision {
    use Action::*;
    use Role::*;

    let allowed = match action {
        UsePortal | ConsumeResource => true,
        SubmitAccessRequest => role == Student,
        // Leaders only ever see and act on their own students; the scoping
        // is applied by the handlers.
        ListPendingRequests | ReviewBulk => matches!(role, Leader | Admin | SuperAdmin),
        ReviewSingle | ApproveRange | SendNotification | ListUsers | ChangeUserStatus
        | AssignLeader => matches!(role, Admin | SuperAdmin),
        ChangeRole | ViewRoleAudit => role == SuperAdmin,
    };

    if allowed {
        Decision::Allow
    } else {
        Decision::Deny
    }
}
