use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Authorization role stored on the application user record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    #[default]
    Resident,
    Admin,
    Security,
    SuperAdmin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Resident => "resident",
            Role::Admin => "admin",
            Role::Security => "security",
            Role::SuperAdmin => "super_admin",
        }
    }

    /// Admin gates accept `admin` and `super_admin`.
    pub fn is_admin(&self) -> bool {
        matches!(self, Role::Admin | Role::SuperAdmin)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "resident" => Ok(Role::Resident),
            "admin" => Ok(Role::Admin),
            "security" => Ok(Role::Security),
            "super_admin" => Ok(Role::SuperAdmin),
            other => Err(format!("unknown role '{}'", other)),
        }
    }
}
