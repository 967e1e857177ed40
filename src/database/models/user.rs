use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::role::Role;

/// Application-side user record, keyed by the identity provider's id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    pub id: String,
    pub email: String,
    pub role: Role,
    pub display_name: Option<String>,
    pub phone: Option<String>,
    pub unit: Option<String>,
    pub block: Option<String>,
    pub flat_number: Option<String>,
    pub privacy: PrivacySettings,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PrivacySettings {
    pub show_email: bool,
    pub show_phone: bool,
    pub show_in_directory: bool,
}

impl Default for PrivacySettings {
    fn default() -> Self {
        Self {
            show_email: false,
            show_phone: false,
            show_in_directory: true,
        }
    }
}

/// Seed for a record that does not exist yet.
#[derive(Debug, Clone, PartialEq)]
pub struct NewUser {
    pub id: String,
    pub email: String,
    pub role: Role,
    pub display_name: Option<String>,
    pub phone: Option<String>,
    pub unit: Option<String>,
    pub block: Option<String>,
    pub flat_number: Option<String>,
}

impl NewUser {
    /// Default record created on first authenticated request.
    pub fn resident(id: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            email: email.into(),
            role: Role::Resident,
            display_name: None,
            phone: None,
            unit: None,
            block: None,
            flat_number: None,
        }
    }

    pub fn into_record(self, now: DateTime<Utc>) -> UserRecord {
        UserRecord {
            id: self.id,
            email: self.email,
            role: self.role,
            display_name: self.display_name,
            phone: self.phone,
            unit: self.unit,
            block: self.block,
            flat_number: self.flat_number,
            privacy: PrivacySettings::default(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// Field merge applied to a record. `None` leaves the field untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserUpdate {
    pub display_name: Option<String>,
    pub phone: Option<String>,
    pub privacy: Option<PrivacySettings>,
    // Privileged
    pub role: Option<Role>,
    pub unit: Option<String>,
    pub block: Option<String>,
    pub flat_number: Option<String>,
}

impl UserUpdate {
    pub fn touches_privileged(&self) -> bool {
        self.role.is_some() || self.unit.is_some() || self.block.is_some() || self.flat_number.is_some()
    }

    /// Keep only the fields a resident may change on their own record.
    pub fn self_service(self) -> Self {
        Self {
            display_name: self.display_name,
            phone: self.phone,
            privacy: self.privacy,
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

impl UserRecord {
    pub fn apply(&mut self, update: UserUpdate, now: DateTime<Utc>) {
        if let Some(v) = update.display_name {
            self.display_name = Some(v);
        }
        if let Some(v) = update.phone {
            self.phone = Some(v);
        }
        if let Some(v) = update.privacy {
            self.privacy = v;
        }
        if let Some(v) = update.role {
            self.role = v;
        }
        if let Some(v) = update.unit {
            self.unit = Some(v);
        }
        if let Some(v) = update.block {
            self.block = Some(v);
        }
        if let Some(v) = update.flat_number {
            self.flat_number = Some(v);
        }
        self.updated_at = now;
    }
}

/// Directory view of a resident, honoring their privacy flags.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectoryEntry {
    pub id: String,
    pub display_name: Option<String>,
    pub unit: Option<String>,
    pub block: Option<String>,
    pub flat_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

impl From<UserRecord> for DirectoryEntry {
    fn from(record: UserRecord) -> Self {
        Self {
            email: record.privacy.show_email.then_some(record.email),
            phone: if record.privacy.show_phone { record.phone } else { None },
            id: record.id,
            display_name: record.display_name,
            unit: record.unit,
            block: record.block,
            flat_number: record.flat_number,
        }
    }
}
