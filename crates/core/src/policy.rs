//! Access policy over an explicit `(actor, action, resource)` triple.
//!
//! Handlers build an [`Actor`] from the authenticated token and a
//! [`Resource`] from what they loaded, then call [`authorize`]. Nothing
//! here reads request-bound state.

use crate::error::CoreError;
use crate::types::DbId;

/// The caller, as far as policy is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub user_id: DbId,
    pub is_superuser: bool,
    pub is_staff: bool,
}

/// What the actor wants to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Read a record or list.
    View,
    /// Create a request on behalf of a project (e.g. a change request).
    Request,
    /// Change status or content.
    Update,
}

/// What the action targets. Project-scoped resources carry the ids of the
/// project's PIs and managers.
#[derive(Debug, Clone, Copy)]
pub enum Resource<'a> {
    ClusterAccessRequest,
    Allocation { project_managers: &'a [DbId] },
    ChangeRequest { project_managers: &'a [DbId] },
}

impl Resource<'_> {
    fn project_managers(&self) -> &[DbId] {
        match self {
            Resource::ClusterAccessRequest => &[],
            Resource::Allocation { project_managers }
            | Resource::ChangeRequest { project_managers } => *project_managers,
        }
    }
}

/// Decide whether `actor` may perform `action` on `resource`.
///
/// - Superusers may do anything.
/// - Staff may view everything.
/// - Project PIs and managers may view their project's allocations and
///   change requests, and request changes to their allocations.
pub fn is_allowed(actor: &Actor, action: Action, resource: &Resource<'_>) -> bool {
    if actor.is_superuser {
        return true;
    }
    let is_manager = resource.project_managers().contains(&actor.user_id);
    match (action, resource) {
        (Action::View, _) => actor.is_staff || is_manager,
        (Action::Request, Resource::Allocation { .. }) => is_manager,
        _ => false,
    }
}

/// [`is_allowed`] as a `Result`, yielding `CoreError::Forbidden` on denial.
pub fn authorize(actor: &Actor, action: Action, resource: &Resource<'_>) -> Result<(), CoreError> {
    if is_allowed(actor, action, resource) {
        Ok(())
    } else {
        Err(CoreError::Forbidden(
            "You do not have permission to perform this action.".into(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    const SUPER: Actor = Actor { user_id: 1, is_superuser: true, is_staff: true };
    const STAFF: Actor = Actor { user_id: 2, is_superuser: false, is_staff: true };
    const PI: Actor = Actor { user_id: 3, is_superuser: false, is_staff: false };
    const OTHER: Actor = Actor { user_id: 4, is_superuser: false, is_staff: false };

    #[test]
    fn superuser_may_update_cluster_access() {
        assert!(is_allowed(&SUPER, Action::Update, &Resource::ClusterAccessRequest));
    }

    #[test]
    fn staff_may_only_view_cluster_access() {
        assert!(is_allowed(&STAFF, Action::View, &Resource::ClusterAccessRequest));
        assert!(!is_allowed(&STAFF, Action::Update, &Resource::ClusterAccessRequest));
    }

    #[test]
    fn regular_user_may_not_view_cluster_access() {
        assert!(!is_allowed(&OTHER, Action::View, &Resource::ClusterAccessRequest));
    }

    #[test]
    fn project_manager_may_view_and_request_changes() {
        let managers = [3];
        let allocation = Resource::Allocation { project_managers: &managers };
        assert!(is_allowed(&PI, Action::View, &allocation));
        assert!(is_allowed(&PI, Action::Request, &allocation));
        assert!(!is_allowed(&PI, Action::Update, &allocation));
        assert!(!is_allowed(&OTHER, Action::Request, &allocation));
    }

    #[test]
    fn manager_cannot_approve_change_requests() {
        let managers = [3];
        let cr = Resource::ChangeRequest { project_managers: &managers };
        assert!(is_allowed(&PI, Action::View, &cr));
        assert!(!is_allowed(&PI, Action::Update, &cr));
    }

    #[test]
    fn authorize_maps_denial_to_forbidden() {
        assert_matches!(
            authorize(&OTHER, Action::Update, &Resource::ClusterAccessRequest),
            Err(CoreError::Forbidden(_))
        );
    }
}
