use serde::Deserialize;
use std::collections::HashMap;
use tracing::info;

use super::session::AuthContext;
use crate::config::ApiConfig;
use crate::database::models::{DirectoryEntry, NewUser, Role, UserRecord, UserUpdate};
use crate::database::UserStore;
use crate::error::ApiError;
use crate::filter::{Filter, FilterSpec, Page, SortDirection};

pub const RESIDENT_FILTER: FilterSpec = FilterSpec {
    filters: &["role", "block", "unit"],
    search_fields: &["displayName", "email"],
    sort_fields: Some(&["email", "role", "displayName", "unit", "block", "flatNumber", "createdAt", "updatedAt"]),
    default_order: ("createdAt", SortDirection::Desc),
};

const DIRECTORY_FILTER: FilterSpec = FilterSpec {
    filters: &["block"],
    search_fields: &["displayName", "unit"],
    sort_fields: Some(&["displayName", "unit", "block", "flatNumber"]),
    default_order: ("displayName", SortDirection::Asc),
};

/// Admin-created resident record for an existing identity.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewResident {
    pub email: Option<String>,
    pub role: Option<Role>,
    pub display_name: Option<String>,
    pub phone: Option<String>,
    pub unit: Option<String>,
    pub block: Option<String>,
    pub flat_number: Option<String>,
}

fn resident_not_found() -> ApiError {
    ApiError::not_found("Resident not found")
}

fn require_super_admin(ctx: &AuthContext, action: &str) -> Result<(), ApiError> {
    if ctx.role() != Role::SuperAdmin {
        return Err(ApiError::forbidden(format!("Only a super admin can {}", action)));
    }
    Ok(())
}

/// Admin or self.
pub async fn get(users: &dyn UserStore, ctx: &AuthContext, id: &str) -> Result<UserRecord, ApiError> {
    if !ctx.owns(id) && !ctx.is_admin() {
        return Err(ApiError::forbidden("You can only view your own profile"));
    }
    users.get(id).await?.ok_or_else(resident_not_found)
}

pub async fn list(
    users: &dyn UserStore,
    params: &HashMap<String, String>,
    api: &ApiConfig,
) -> Result<Page<UserRecord>, ApiError> {
    let filter = Filter::from_params(params, &RESIDENT_FILTER, api)?;
    Ok(users.list(&filter).await?)
}

/// Residents who opted into the directory, with contact details masked per their privacy flags.
pub async fn directory(
    users: &dyn UserStore,
    params: &HashMap<String, String>,
    api: &ApiConfig,
) -> Result<Vec<DirectoryEntry>, ApiError> {
    let mut filter = Filter::from_params(params, &DIRECTORY_FILTER, api)?;
    // Directory is one bounded page; privacy filtering happens on the records
    filter.limit(api.max_page_size, api)?;
    let page = users.list(&filter).await?;
    Ok(page
        .items
        .into_iter()
        .filter(|record| record.privacy.show_in_directory)
        .map(DirectoryEntry::from)
        .collect())
}

/// Owner-or-admin update. Non-admins silently lose privileged fields.
pub async fn update(
    users: &dyn UserStore,
    ctx: &AuthContext,
    id: &str,
    update: UserUpdate,
) -> Result<UserRecord, ApiError> {
    let update = if ctx.is_admin() {
        update
    } else if ctx.owns(id) {
        update.self_service()
    } else {
        return Err(ApiError::forbidden("You can only update your own profile"));
    };

    let current = users.get(id).await?.ok_or_else(resident_not_found)?;

    if ctx.is_admin() && update.touches_privileged() {
        if current.role == Role::SuperAdmin && !ctx.owns(id) {
            require_super_admin(ctx, "modify a super admin")?;
        }
        if update.role == Some(Role::SuperAdmin) {
            require_super_admin(ctx, "grant the super_admin role")?;
        }
    }

    if update.is_empty() {
        return Ok(current);
    }

    let role_change = update.role.filter(|role| *role != current.role);
    let record = users.update(id, update).await?.ok_or_else(resident_not_found)?;
    if let Some(role) = role_change {
        info!(target_id = %id, by = %ctx.identity_id(), "Role changed from {} to {}", current.role, role);
    }
    Ok(record)
}

/// Self-service update of the caller's own record.
pub async fn update_self(users: &dyn UserStore, ctx: &AuthContext, update: UserUpdate) -> Result<UserRecord, ApiError> {
    let update = update.self_service();
    if update.is_empty() {
        return Err(ApiError::validation("No fields to update"));
    }
    users
        .update(ctx.identity_id(), update)
        .await?
        .ok_or_else(resident_not_found)
}

pub async fn create(
    users: &dyn UserStore,
    ctx: &AuthContext,
    id: &str,
    input: NewResident,
) -> Result<UserRecord, ApiError> {
    let email = input
        .email
        .map(|e| e.trim().to_string())
        .filter(|e| !e.is_empty())
        .ok_or_else(|| {
            let mut fields = HashMap::new();
            fields.insert("email".to_string(), "This field is required".to_string());
            ApiError::validation_fields("Missing required fields: email", fields)
        })?;

    let role = input.role.unwrap_or_default();
    if role == Role::SuperAdmin {
        require_super_admin(ctx, "grant the super_admin role")?;
    }

    let record = users
        .create(NewUser {
            role,
            display_name: input.display_name,
            phone: input.phone,
            unit: input.unit,
            block: input.block,
            flat_number: input.flat_number,
            ..NewUser::resident(id, email)
        })
        .await?;
    info!(target_id = %id, by = %ctx.identity_id(), role = %record.role, "Resident record created");
    Ok(record)
}

pub async fn delete(users: &dyn UserStore, ctx: &AuthContext, id: &str) -> Result<(), ApiError> {
    let current = users.get(id).await?.ok_or_else(resident_not_found)?;
    if current.role == Role::SuperAdmin {
        require_super_admin(ctx, "delete a super admin")?;
    }
    if !users.delete(id).await? {
        return Err(resident_not_found());
    }
    info!(target_id = %id, by = %ctx.identity_id(), "Resident record deleted");
    Ok(())
}
