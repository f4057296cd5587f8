use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::geo::Coordinates;

/// The three actor roles. Identity arrives pre-verified as an `{id, role}`
/// pair; the role string here matches what the identity layer supplies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Patient,
    Hospital,
    Driver,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Role::Patient => "patient",
            Role::Hospital => "hospital",
            Role::Driver => "driver",
        };
        f.write_str(s)
    }
}

impl FromStr for Role {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "patient" => Ok(Role::Patient),
            "hospital" => Ok(Role::Hospital),
            "driver" => Ok(Role::Driver),
            _ => Err(()),
        }
    }
}

/// Hospital bed availability. Absent entirely means "unknown" — counts are
/// never defaulted to zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BedCounts {
    pub icu: u32,
    pub general: u32,
    pub emergency: u32,
}

/// Role-specific registration shape, tagged on `role`. Each variant carries
/// only the fields that role actually has, so required-field validation is
/// per variant rather than a struct of universally-optional fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum RoleProfile {
    Patient,
    #[serde(rename_all = "camelCase")]
    Hospital {
        #[serde(skip_serializing_if = "Option::is_none")]
        license_number: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        bed_counts: Option<BedCounts>,
    },
    #[serde(rename_all = "camelCase")]
    Driver {
        /// Must equal the linked hospital's license number. Compatibility
        /// for ambulance dispatch is defined by this equality.
        linked_hospital_license: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub active: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<Coordinates>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_location_update: Option<DateTime<Utc>>,
    pub registered_at: DateTime<Utc>,
    #[serde(flatten)]
    pub profile: RoleProfile,
}

impl User {
    pub fn new(name: impl Into<String>, profile: RoleProfile) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            active: true,
            location: None,
            last_location_update: None,
            registered_at: Utc::now(),
            profile,
        }
    }

    pub fn role(&self) -> Role {
        match self.profile {
            RoleProfile::Patient => Role::Patient,
            RoleProfile::Hospital { .. } => Role::Hospital,
            RoleProfile::Driver { .. } => Role::Driver,
        }
    }

    pub fn license_number(&self) -> Option<&str> {
        match &self.profile {
            RoleProfile::Hospital { license_number, .. } => license_number.as_deref(),
            RoleProfile::Driver {
                linked_hospital_license,
            } => Some(linked_hospital_license),
            RoleProfile::Patient => None,
        }
    }
}
