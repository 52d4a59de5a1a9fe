//! # Permissions
//!
//! Core permission and policy types.
//! A permission combines a resource type, a resource id and an action;
//! a policy records that a role is directly granted a permission.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use crate::error::{RbacError, RbacResult};
use crate::ids::RoleId;

/// Resource id that matches every concrete resource id when granted.
pub const WILDCARD: &str = "*";

/// A permission is a combination of resource type, resource id and action.
///
/// Permissions can be:
/// - **Global**: granted with the wildcard resource id `*`, apply to all resources of the type
/// - **Resource-specific**: apply only to the resource with exactly that id
///
/// # Example
///
/// ```
/// use permgraph_rbac::Permission;
///
/// let perm = Permission::new("event", "*", "view").unwrap();
/// assert_eq!(perm.to_string(), "event[*]:view");
/// assert!(perm.is_global());
///
/// let perm = Permission::new("event", "19", "edit").unwrap();
/// assert_eq!(perm.to_string(), "event[19]:edit");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "PermissionRecord")]
pub struct Permission {
    resource_type: String,
    resource_id: String,
    action: String,
}

/// Unvalidated wire form of a [`Permission`].
#[derive(Deserialize)]
struct PermissionRecord {
    resource_type: String,
    #[serde(default)]
    resource_id: String,
    action: String,
}

impl TryFrom<PermissionRecord> for Permission {
    type Error = RbacError;

    fn try_from(record: PermissionRecord) -> RbacResult<Self> {
        Permission::new(record.resource_type, record.resource_id, record.action)
    }
}

impl Permission {
    /// Create a new permission.
    ///
    /// # Arguments
    ///
    /// * `resource_type` - The resource type (non-empty)
    /// * `resource_id` - The resource id, `*` for every resource, may be empty
    /// * `action` - The action (non-empty)
    ///
    /// # Errors
    ///
    /// `InvalidArgument` if `resource_type` or `action` is empty.
    pub fn new(
        resource_type: impl Into<String>,
        resource_id: impl Into<String>,
        action: impl Into<String>,
    ) -> RbacResult<Self> {
        let resource_type = resource_type.into();
        let action = action.into();
        if resource_type.is_empty() {
            return Err(RbacError::InvalidArgument(
                "Resource type cannot be empty!".to_string(),
            ));
        }
        if action.is_empty() {
            return Err(RbacError::InvalidArgument("Action cannot be empty!".to_string()));
        }
        Ok(Self {
            resource_type,
            resource_id: resource_id.into(),
            action,
        })
    }

    /// Create a permission on every resource of a type.
    ///
    /// # Example
    ///
    /// ```
    /// use permgraph_rbac::Permission;
    ///
    /// let perm = Permission::global("event", "view").unwrap();
    /// assert_eq!(perm.resource_id(), "*");
    /// ```
    pub fn global(resource_type: impl Into<String>, action: impl Into<String>) -> RbacResult<Self> {
        Self::new(resource_type, WILDCARD, action)
    }

    /// The resource type.
    pub fn resource_type(&self) -> &str {
        &self.resource_type
    }

    /// The resource id (`*` for global permissions).
    pub fn resource_id(&self) -> &str {
        &self.resource_id
    }

    /// The action.
    pub fn action(&self) -> &str {
        &self.action
    }

    /// Check if this is a global permission (applies to all resources of this type).
    pub fn is_global(&self) -> bool {
        self.resource_id == WILDCARD
    }

    /// Check if this granted permission covers a requested permission.
    ///
    /// A granted permission matches if:
    /// - Resource types are equal
    /// - Actions are equal
    /// - The granted resource id is `*`, or both resource ids are equal
    ///
    /// The wildcard only works in one direction: a grant of `event[19]:view`
    /// does not match a request for `event[*]:view`.
    ///
    /// # Example
    ///
    /// ```
    /// use permgraph_rbac::Permission;
    ///
    /// let global = Permission::new("event", "*", "view").unwrap();
    /// let specific = Permission::new("event", "19", "view").unwrap();
    ///
    /// assert!(global.matches(&specific));
    /// assert!(!specific.matches(&global));
    /// ```
    pub fn matches(&self, requested: &Permission) -> bool {
        self.resource_type == requested.resource_type
            && self.action == requested.action
            && self.covers_resource_id(&requested.resource_id)
    }

    /// Check if this permission grants something on `(resource_type, resource_id)`,
    /// regardless of the action.
    pub fn applies_to(&self, resource_type: &str, resource_id: &str) -> bool {
        self.resource_type == resource_type && self.covers_resource_id(resource_id)
    }

    fn covers_resource_id(&self, resource_id: &str) -> bool {
        self.resource_id == WILDCARD || self.resource_id == resource_id
    }
}

impl fmt::Display for Permission {
    /// Formats as `resource_type[resource_id]:action`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]:{}", self.resource_type, self.resource_id, self.action)
    }
}

impl FromStr for Permission {
    type Err = RbacError;

    /// Parse from the display form, e.g. `event[*]:view` or `event[uuid:12]:edit`.
    fn from_str(s: &str) -> RbacResult<Self> {
        let malformed = || RbacError::InvalidArgument(format!("Malformed permission '{s}'!"));

        let open = s.find('[').ok_or_else(malformed)?;
        let close = s.rfind("]:").ok_or_else(malformed)?;
        if close < open {
            return Err(malformed());
        }

        Permission::new(&s[..open], &s[open + 1..close], &s[close + 2..])
    }
}

/// A policy records that `role` is directly granted `permission`.
///
/// The same permission granted to two roles yields two distinct policies.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Policy {
    /// The role holding the grant.
    pub role: RoleId,
    /// The granted permission.
    pub permission: Permission,
}

impl Policy {
    /// Create a new policy.
    pub fn new(role: RoleId, permission: Permission) -> Self {
        Self { role, permission }
    }
}

impl fmt::Display for Policy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.role, self.permission)
    }
}

/// A deduplicated set of permissions.
///
/// `contains` tests exact membership, `has` applies the wildcard matching rule.
///
/// # Example
///
/// ```
/// use permgraph_rbac::{Permission, PermissionSet};
///
/// let mut set = PermissionSet::new();
/// set.add(Permission::new("event", "*", "view").unwrap());
/// set.add(Permission::new("event", "*", "view").unwrap());
///
/// assert_eq!(set.len(), 1);
/// assert!(set.has(&Permission::new("event", "5", "view").unwrap()));
/// assert!(!set.contains(&Permission::new("event", "5", "view").unwrap()));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PermissionSet {
    permissions: BTreeSet<Permission>,
}

impl PermissionSet {
    /// Create a new empty permission set.
    pub fn new() -> Self {
        Self {
            permissions: BTreeSet::new(),
        }
    }

    /// Add a permission to the set.
    ///
    /// # Returns
    ///
    /// `true` if the permission was not present before
    pub fn add(&mut self, permission: Permission) -> bool {
        self.permissions.insert(permission)
    }

    /// Remove a permission from the set.
    ///
    /// # Returns
    ///
    /// `true` if the permission was present, `false` otherwise
    pub fn remove(&mut self, permission: &Permission) -> bool {
        self.permissions.remove(permission)
    }

    /// Check if the set contains exactly this permission.
    pub fn contains(&self, permission: &Permission) -> bool {
        self.permissions.contains(permission)
    }

    /// Check if any permission in the set matches the requested one.
    pub fn has(&self, requested: &Permission) -> bool {
        self.permissions.iter().any(|granted| granted.matches(requested))
    }

    /// Actions granted on a resource by the permissions in this set.
    pub fn actions_on(&self, resource_type: &str, resource_id: &str) -> BTreeSet<String> {
        self.permissions
            .iter()
            .filter(|p| p.applies_to(resource_type, resource_id))
            .map(|p| p.action.clone())
            .collect()
    }

    /// Merge another permission set into this one.
    pub fn merge(&mut self, other: &PermissionSet) {
        self.permissions.extend(other.permissions.iter().cloned());
    }

    /// Iterate over the permissions in order.
    pub fn iter(&self) -> impl Iterator<Item = &Permission> {
        self.permissions.iter()
    }

    /// Get the count of permissions.
    pub fn len(&self) -> usize {
        self.permissions.len()
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.permissions.is_empty()
    }

    /// Consume the set.
    pub fn into_inner(self) -> BTreeSet<Permission> {
        self.permissions
    }
}

impl FromIterator<Permission> for PermissionSet {
    fn from_iter<T: IntoIterator<Item = Permission>>(iter: T) -> Self {
        Self {
            permissions: iter.into_iter().collect(),
        }
    }
}

impl Extend<Permission> for PermissionSet {
    fn extend<T: IntoIterator<Item = Permission>>(&mut self, iter: T) {
        self.permissions.extend(iter);
    }
}

impl IntoIterator for PermissionSet {
    type Item = Permission;
    type IntoIter = std::collections::btree_set::IntoIter<Permission>;

    fn into_iter(self) -> Self::IntoIter {
        self.permissions.into_iter()
    }
}

impl<'a> IntoIterator for &'a PermissionSet {
    type Item = &'a Permission;
    type IntoIter = std::collections::btree_set::Iter<'a, Permission>;

    fn into_iter(self) -> Self::IntoIter {
        self.permissions.iter()
    }
}
