//! Role policy model
//!
//! Roles are named sets of permissions. The policy table is built once at
//! startup (from configuration or `RolePolicy::default_roles`) and handed to
//! the services that authorize actions.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Permission granted by a role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    /// Read versions in Draft status
    ReadDraftedArticle,
    /// Read versions in Archived status
    ReadArchivedArticle,
    /// Create articles and new article versions
    CreateArticle,
    /// Delete whole articles
    DeleteArticle,
    /// Move versions through the lifecycle
    UpdateStatusArticle,
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Permission::ReadDraftedArticle => "read_drafted_article",
            Permission::ReadArchivedArticle => "read_archived_article",
            Permission::CreateArticle => "create_article",
            Permission::DeleteArticle => "delete_article",
            Permission::UpdateStatusArticle => "update_status_article",
        };
        write!(f, "{}", name)
    }
}

impl FromStr for Permission {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "read_drafted_article" => Ok(Permission::ReadDraftedArticle),
            "read_archived_article" => Ok(Permission::ReadArchivedArticle),
            "create_article" => Ok(Permission::CreateArticle),
            "delete_article" => Ok(Permission::DeleteArticle),
            "update_status_article" => Ok(Permission::UpdateStatusArticle),
            _ => Err(anyhow::anyhow!("Invalid permission: {}", s)),
        }
    }
}

/// Named set of permissions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub name: String,
    pub permissions: HashSet<Permission>,
}

impl Role {
    pub fn new(name: impl Into<String>, permissions: impl IntoIterator<Item = Permission>) -> Self {
        Self {
            name: name.into(),
            permissions: permissions.into_iter().collect(),
        }
    }

    pub fn has_permission(&self, permission: Permission) -> bool {
        self.permissions.contains(&permission)
    }
}

/// Role table consulted by the services
#[derive(Debug, Clone, Default)]
pub struct RolePolicy {
    roles: HashMap<String, Role>,
}

impl RolePolicy {
    /// Build a policy from roles; a later role with the same name replaces an earlier one
    pub fn new(roles: impl IntoIterator<Item = Role>) -> Self {
        Self {
            roles: roles.into_iter().map(|r| (r.name.clone(), r)).collect(),
        }
    }

    /// The stock ContentWriter / Editor table
    pub fn default_roles() -> Self {
        Self::new([
            Role::new(
                "ContentWriter",
                [
                    Permission::ReadDraftedArticle,
                    Permission::ReadArchivedArticle,
                    Permission::CreateArticle,
                ],
            ),
            Role::new(
                "Editor",
                [
                    Permission::ReadDraftedArticle,
                    Permission::ReadArchivedArticle,
                    Permission::CreateArticle,
                    Permission::DeleteArticle,
                    Permission::UpdateStatusArticle,
                ],
            ),
        ])
    }

    pub fn role(&self, name: &str) -> Option<&Role> {
        self.roles.get(name)
    }

    /// Unknown roles are granted nothing
    pub fn allows(&self, role: &str, permission: Permission) -> bool {
        self.role(role)
            .map(|r| r.has_permission(permission))
            .unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.roles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.roles.is_empty()
    }
}

/// The user on whose behalf an operation runs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    pub id: Uuid,
    pub role: String,
}

impl Author {
    pub fn new(id: Uuid, role: impl Into<String>) -> Self {
        Self {
            id,
            role: role.into(),
        }
    }
}
