//! # Permission Resolution Engine
//!
//! Computes effective permissions and policies for roles and subjects and
//! answers containment queries. The resolver borrows an [`RbacState`] and
//! never mutates it.
//!
//! ## Resolution
//!
//! ```text
//! role_permissions(R, inherited)  = direct(R) [∪ direct(A) for A in ancestors(R)]
//! subject_permissions(S)          = ∪ role_permissions(R, true) for R in roles(S)
//! check(X, requested)             = ∃ g ∈ effective(X): g.matches(requested)
//! ```
//!
//! Permission sets are deduplicated by value. Policy sets keep the granting
//! role, so the same permission granted by two ancestors yields two policies.

use std::collections::BTreeSet;

use crate::directory::RbacState;
use crate::error::{RbacError, RbacResult};
use crate::ids::{RoleId, SubjectId};
use crate::permissions::{Permission, PermissionSet, Policy};

/// Read-only resolver over a consistent state.
#[derive(Debug, Clone, Copy)]
pub struct Resolver<'a> {
    state: &'a RbacState,
}

impl<'a> Resolver<'a> {
    /// Create a resolver over `state`.
    pub fn new(state: &'a RbacState) -> Self {
        Self { state }
    }

    /// `role` followed by all of its ancestors when `inherited` is set.
    fn role_closure(&self, role: &str, inherited: bool) -> RbacResult<BTreeSet<RoleId>> {
        let roles = self.state.roles();
        roles.require(role)?;
        let mut closure = if inherited {
            roles.hierarchy().ancestors(role, true)?
        } else {
            BTreeSet::new()
        };
        closure.insert(RoleId::new(role)?);
        Ok(closure)
    }

    /// Permissions of `role`, direct only or including every ancestor's.
    ///
    /// # Errors
    ///
    /// `NotFound` if the role is unknown
    pub fn role_permissions(&self, role: &str, inherited: bool) -> RbacResult<PermissionSet> {
        let mut permissions = PermissionSet::new();
        for r in self.role_closure(role, inherited)? {
            permissions.merge(self.state.roles().direct_permissions(r.as_str())?);
        }
        Ok(permissions)
    }

    /// Policies of `role`, keeping the originating role of each grant.
    pub fn role_policies(&self, role: &str, inherited: bool) -> RbacResult<BTreeSet<Policy>> {
        let mut policies = BTreeSet::new();
        for r in self.role_closure(role, inherited)? {
            let direct = self.state.roles().direct_permissions(r.as_str())?;
            policies.extend(direct.iter().map(|p| Policy::new(r.clone(), p.clone())));
        }
        Ok(policies)
    }

    /// Subjects assigned to `role`, and when `include_descendants` is set, to
    /// any role inheriting from it.
    pub fn role_subjects(&self, role: &str, include_descendants: bool) -> RbacResult<BTreeSet<SubjectId>> {
        let roles = self.state.roles();
        roles.require(role)?;
        let mut subjects = roles.members(role)?.clone();
        if include_descendants {
            for descendant in roles.hierarchy().descendants(role, true)? {
                subjects.extend(roles.members(descendant.as_str())?.iter().cloned());
            }
        }
        Ok(subjects)
    }

    /// Roles assigned to `subject`, plus all of their ancestors when
    /// `ascendant` is set.
    pub fn subject_roles(&self, subject: &str, ascendant: bool) -> RbacResult<BTreeSet<RoleId>> {
        self.state.subjects().require(subject)?;
        let direct = self.state.subjects().roles(subject)?;
        let mut roles = direct.clone();
        if ascendant {
            let hierarchy = self.state.roles().hierarchy();
            for role in direct {
                roles.extend(hierarchy.ancestors(role.as_str(), true)?);
            }
        }
        Ok(roles)
    }

    /// Effective permissions of `subject` over every assigned role.
    pub fn subject_permissions(&self, subject: &str) -> RbacResult<PermissionSet> {
        let mut permissions = PermissionSet::new();
        for role in self.subject_roles(subject, true)? {
            permissions.merge(self.state.roles().direct_permissions(role.as_str())?);
        }
        Ok(permissions)
    }

    /// Effective policies of `subject` over every assigned role.
    pub fn subject_policies(&self, subject: &str) -> RbacResult<BTreeSet<Policy>> {
        let mut policies = BTreeSet::new();
        for role in self.subject_roles(subject, true)? {
            let direct = self.state.roles().direct_permissions(role.as_str())?;
            policies.extend(direct.iter().map(|p| Policy::new(role.clone(), p.clone())));
        }
        Ok(policies)
    }

    /// Check whether `role` holds a permission matching `requested`.
    ///
    /// Never fails for a missing grant, only for an unknown role.
    pub fn check_role_permission(&self, role: &str, requested: &Permission) -> RbacResult<bool> {
        Ok(self.role_permissions(role, true)?.has(requested))
    }

    /// Like [`check_role_permission`](Self::check_role_permission) but fails
    /// with `PermissionDenied` when the permission is not granted.
    pub fn assert_role_permission(&self, role: &str, requested: &Permission) -> RbacResult<()> {
        if self.check_role_permission(role, requested)? {
            return Ok(());
        }
        Err(RbacError::PermissionDenied(format!(
            "Permission '{requested}' is not granted for Role '{role}'!"
        )))
    }

    /// Check whether `subject` holds a permission matching `requested`.
    pub fn check_permission(&self, subject: &str, requested: &Permission) -> RbacResult<bool> {
        Ok(self.subject_permissions(subject)?.has(requested))
    }

    /// Like [`check_permission`](Self::check_permission) but fails with
    /// `PermissionDenied` when the permission is not granted.
    pub fn assert_permission(&self, subject: &str, requested: &Permission) -> RbacResult<()> {
        if self.check_permission(subject, requested)? {
            return Ok(());
        }
        Err(RbacError::PermissionDenied(format!(
            "Permission '{requested}' is not granted for Subject '{subject}'!"
        )))
    }

    /// Actions `role` may perform on one resource.
    pub fn role_actions_on_resource(
        &self,
        role: &str,
        resource_type: &str,
        resource_id: &str,
        inherited: bool,
    ) -> RbacResult<BTreeSet<String>> {
        require_resource_type(resource_type)?;
        Ok(self
            .role_permissions(role, inherited)?
            .actions_on(resource_type, resource_id))
    }

    /// Actions `subject` may perform on one resource.
    ///
    /// With `inherited` unset only grants on the directly assigned roles count.
    pub fn subject_actions_on_resource(
        &self,
        subject: &str,
        resource_type: &str,
        resource_id: &str,
        inherited: bool,
    ) -> RbacResult<BTreeSet<String>> {
        require_resource_type(resource_type)?;
        let mut permissions = PermissionSet::new();
        for role in self.subject_roles(subject, inherited)? {
            permissions.merge(self.state.roles().direct_permissions(role.as_str())?);
        }
        Ok(permissions.actions_on(resource_type, resource_id))
    }
}

fn require_resource_type(resource_type: &str) -> RbacResult<()> {
    if resource_type.is_empty() {
        return Err(RbacError::InvalidArgument(
            "Resource type cannot be empty!".to_string(),
        ));
    }
    Ok(())
}

impl RbacState {
    /// A resolver over this state.
    pub fn resolver(&self) -> Resolver<'_> {
        Resolver::new(self)
    }
}
