//! Bookable resources: cars and gear units.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Conflict, FleetError, FleetResult};
use crate::id::ResourceId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Car,
    Gear,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceStatus {
    Available,
    Unavailable,
    Maintenance,
    Retired,
}

impl fmt::Display for ResourceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ResourceStatus::Available => "available",
            ResourceStatus::Unavailable => "unavailable",
            ResourceStatus::Maintenance => "maintenance",
            ResourceStatus::Retired => "retired",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for ResourceStatus {
    type Err = FleetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "available" => Ok(ResourceStatus::Available),
            "unavailable" => Ok(ResourceStatus::Unavailable),
            "maintenance" => Ok(ResourceStatus::Maintenance),
            "retired" => Ok(ResourceStatus::Retired),
            other => Err(FleetError::MalformedRecord(format!(
                "unknown resource status '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ResourceKind::Car => "car",
            ResourceKind::Gear => "gear",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for ResourceKind {
    type Err = FleetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "car" => Ok(ResourceKind::Car),
            "gear" => Ok(ResourceKind::Gear),
            other => Err(FleetError::MalformedRecord(format!(
                "unknown resource kind '{}'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    pub id: ResourceId,
    pub label: String,
    pub kind: ResourceKind,
    pub status: ResourceStatus,
    /// Checked out and not yet returned
    pub in_use: bool,

    // Multi-unit gear
    pub quantity: Option<u32>,
    pub available_quantity: Option<u32>,

    pub image_url: Option<String>,
}

impl Resource {
    /// Status and check-out gate, independent of any time window.
    pub fn check_assignable(&self) -> Result<(), Conflict> {
        if self.status != ResourceStatus::Available {
            return Err(Conflict::ResourceUnavailable {
                resource_id: self.id.clone(),
                label: self.label.clone(),
                status: self.status,
            });
        }
        if self.is_checked_out() {
            return Err(Conflict::CheckedOut {
                resource_id: self.id.clone(),
                label: self.label.clone(),
            });
        }
        Ok(())
    }

    pub fn is_checked_out(&self) -> bool {
        self.in_use || self.available_quantity == Some(0)
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label)
    }
}

/// Request body for registering a resource.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewResource {
    pub label: String,
    pub kind: ResourceKind,
    #[serde(default)]
    pub quantity: Option<u32>,
    #[serde(default)]
    pub image_url: Option<String>,
}

/// Resource row as the backend reports it, every field optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResourceRecord {
    pub id: Option<String>,
    pub label: Option<String>,
    pub kind: Option<String>,
    pub status: Option<String>,
    pub in_use: Option<bool>,
    pub quantity: Option<u32>,
    pub available_quantity: Option<u32>,
    pub image_url: Option<String>,
}

impl TryFrom<ResourceRecord> for Resource {
    type Error = FleetError;

    fn try_from(record: ResourceRecord) -> FleetResult<Self> {
        let id = match record.id {
            Some(id) if !id.is_empty() => ResourceId::new(id),
            _ => return Err(FleetError::MalformedRecord("resource without id".into())),
        };
        let label = record.label.unwrap_or_else(|| id.to_string());
        let kind = match record.kind.as_deref() {
            Some(k) => k.parse()?,
            None => ResourceKind::Gear,
        };
        // A row we cannot read a status from is never offered for assignment
        let status = match record.status.as_deref() {
            Some(s) => s.parse()?,
            None => {
                tracing::warn!(resource = %id, "resource row has no status, treating as unavailable");
                ResourceStatus::Unavailable
            }
        };
        Ok(Resource {
            id,
            label,
            kind,
            status,
            in_use: record.in_use.unwrap_or(false),
            quantity: record.quantity,
            available_quantity: record.available_quantity,
            image_url: record.image_url,
        })
    }
}
