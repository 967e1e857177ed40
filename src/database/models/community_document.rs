use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use super::document::{to_fields, Collection};
use super::validate::{optional_text, Validator};
use crate::error::ApiError;
use crate::filter::{FilterSpec, SortDirection};
use crate::services::resources::Resource;

/// Community document (bylaws, minutes, notices). The file itself lives in object storage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommunityDocument {
    pub id: Uuid,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub category: String,
    pub file_url: String,
    #[serde(default)]
    pub file_name: Option<String>,
    #[serde(default)]
    pub file_type: Option<String>,
    #[serde(default)]
    pub file_size: Option<u64>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewCommunityDocument {
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub file_url: Option<String>,
    pub file_name: Option<String>,
    pub file_type: Option<String>,
    pub file_size: Option<u64>,
}

pub type CommunityDocumentUpdate = NewCommunityDocument;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DocumentFields {
    #[serde(skip_serializing_if = "Option::is_none")]
    title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    file_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    file_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    file_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    file_size: Option<u64>,
}

impl Resource for CommunityDocument {
    const COLLECTION: Collection = Collection::Documents;
    const LABEL: &'static str = "Document";
    const FILTER: FilterSpec = FilterSpec {
        filters: &["category", "fileType", "createdBy"],
        search_fields: &["title", "description", "fileName"],
        sort_fields: None,
        default_order: ("createdAt", SortDirection::Desc),
    };

    type Create = NewCommunityDocument;
    type Update = CommunityDocumentUpdate;

    fn prepare_create(input: NewCommunityDocument) -> Result<Map<String, Value>, ApiError> {
        let mut v = Validator::new();
        let title = v.required("title", input.title);
        let category = v.required("category", input.category);
        let file_url = v.required("fileUrl", input.file_url);
        v.finish()?;

        to_fields(&DocumentFields {
            title: Some(title),
            description: optional_text(input.description),
            category: Some(category),
            file_url: Some(file_url),
            file_name: optional_text(input.file_name),
            file_type: optional_text(input.file_type),
            file_size: input.file_size,
        })
        .map_err(ApiError::upstream)
    }

    fn prepare_update(_current: &CommunityDocument, input: CommunityDocumentUpdate) -> Result<Map<String, Value>, ApiError> {
        let mut v = Validator::new();
        let title = v.not_blank("title", input.title);
        let category = v.not_blank("category", input.category);
        let file_url = v.not_blank("fileUrl", input.file_url);
        v.finish()?;

        let fields = to_fields(&DocumentFields {
            title,
            description: optional_text(input.description),
            category,
            file_url,
            file_name: optional_text(input.file_name),
            file_type: optional_text(input.file_type),
            file_size: input.file_size,
        })
        .map_err(ApiError::upstream)?;

        if fields.is_empty() {
            return Err(ApiError::validation("No fields to update"));
        }
        Ok(fields)
    }
}
