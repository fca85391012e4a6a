//! Role resolution from user ids.
//!
//! User ids are allocated in blocks of one thousand per role, so the role is a
//! pure function of the id's thousands bucket.

use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use utoipa::ToSchema;

use super::user::OrgLevel;

const BUCKET_SIZE: i64 = 1000;

/// Sorted `(bucket, role)` table; ids outside every bucket resolve to `User`.
const ROLE_BUCKETS: [(i64, Role); 6] = [
    (1000, Role::AdminArea),
    (2000, Role::AdminRegion),
    (3000, Role::AdminBranch),
    (4000, Role::AdminClusterMcot),
    (5000, Role::AdminClusterGm),
    (6000, Role::UserCluster),
];

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    AdminArea,
    AdminRegion,
    AdminBranch,
    AdminClusterMcot,
    AdminClusterGm,
    UserCluster,
    User,
}

/// Capability flags handed to the rendering layer after login.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Permissions {
    pub can_view_area: bool,
    pub can_view_region: bool,
    pub can_view_branch: bool,
    pub can_view_cluster: bool,
    pub is_admin: bool,
}

impl Role {
    /// Resolve the role owning the thousands bucket of `id`.
    #[must_use]
    pub fn from_user_id(id: i64) -> Self {
        let bucket = id.div_euclid(BUCKET_SIZE) * BUCKET_SIZE;
        ROLE_BUCKETS
            .iter()
            .find(|(threshold, _)| *threshold == bucket)
            .map_or(Self::User, |(_, role)| *role)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::AdminArea => "admin_area",
            Self::AdminRegion => "admin_region",
            Self::AdminBranch => "admin_branch",
            Self::AdminClusterMcot => "admin_cluster_mcot",
            Self::AdminClusterGm => "admin_cluster_gm",
            Self::UserCluster => "user_cluster",
            Self::User => "user",
        }
    }

    /// Organizational level owned by an admin role.
    #[must_use]
    pub const fn scope(self) -> Option<OrgLevel> {
        match self {
            Self::AdminArea => Some(OrgLevel::Area),
            Self::AdminRegion => Some(OrgLevel::Region),
            Self::AdminBranch => Some(OrgLevel::Branch),
            Self::AdminClusterMcot | Self::AdminClusterGm => Some(OrgLevel::Cluster),
            Self::UserCluster | Self::User => None,
        }
    }

    #[must_use]
    pub const fn is_admin(self) -> bool {
        self.scope().is_some()
    }

    /// Dashboard root the role lands on after login or when bounced off a page.
    #[must_use]
    pub const fn home_path(self) -> &'static str {
        match self {
            Self::AdminArea => "/dashboard/admin/area",
            Self::AdminRegion => "/dashboard/admin/region",
            Self::AdminBranch => "/dashboard/admin/branch",
            Self::AdminClusterMcot | Self::AdminClusterGm => "/dashboard/admin/cluster",
            Self::UserCluster | Self::User => "/dashboard/user",
        }
    }

    /// True when the role's scope contains every unit at `level`'s breadth.
    #[must_use]
    pub fn covers(self, level: OrgLevel) -> bool {
        self.scope().is_some_and(|scope| scope.rank() <= level.rank())
    }

    #[must_use]
    pub fn permissions(self) -> Permissions {
        Permissions {
            can_view_area: self.covers(OrgLevel::Area),
            can_view_region: self.covers(OrgLevel::Region),
            can_view_branch: self.covers(OrgLevel::Branch),
            can_view_cluster: self.covers(OrgLevel::Cluster),
            is_admin: self.is_admin(),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "admin_area" => Ok(Self::AdminArea),
            "admin_region" => Ok(Self::AdminRegion),
            "admin_branch" => Ok(Self::AdminBranch),
            "admin_cluster_mcot" => Ok(Self::AdminClusterMcot),
            "admin_cluster_gm" => Ok(Self::AdminClusterGm),
            "user_cluster" => Ok(Self::UserCluster),
            "user" => Ok(Self::User),
            other => Err(format!("unknown role: {other}")),
        }
    }
}
