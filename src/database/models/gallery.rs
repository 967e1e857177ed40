use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use super::document::{to_fields, Collection};
use super::validate::{optional_text, Validator};
use crate::error::ApiError;
use crate::filter::{FilterSpec, SortDirection};
use crate::services::resources::Resource;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GalleryImage {
    pub id: Uuid,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub image_url: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewGalleryImage {
    pub title: Option<String>,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub category: Option<String>,
    pub tags: Option<Vec<String>>,
}

pub type GalleryImageUpdate = NewGalleryImage;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GalleryFields {
    #[serde(skip_serializing_if = "Option::is_none")]
    title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    image_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tags: Option<Vec<String>>,
}

fn normalize_tags(tags: Option<Vec<String>>) -> Option<Vec<String>> {
    tags.map(|tags| {
        let mut out: Vec<String> = Vec::with_capacity(tags.len());
        for tag in tags {
            let tag = tag.trim().to_lowercase();
            if !tag.is_empty() && !out.contains(&tag) {
                out.push(tag);
            }
        }
        out
    })
}

impl Resource for GalleryImage {
    const COLLECTION: Collection = Collection::Gallery;
    const LABEL: &'static str = "Image";
    const FILTER: FilterSpec = FilterSpec {
        filters: &["category", "tags", "createdBy"],
        search_fields: &["title", "description"],
        sort_fields: None,
        default_order: ("createdAt", SortDirection::Desc),
    };

    type Create = NewGalleryImage;
    type Update = GalleryImageUpdate;

    fn prepare_create(input: NewGalleryImage) -> Result<Map<String, Value>, ApiError> {
        let mut v = Validator::new();
        let title = v.required("title", input.title);
        let image_url = v.required("imageUrl", input.image_url);
        v.finish()?;

        to_fields(&GalleryFields {
            title: Some(title),
            description: optional_text(input.description),
            image_url: Some(image_url),
            category: optional_text(input.category),
            tags: Some(normalize_tags(input.tags).unwrap_or_default()),
        })
        .map_err(ApiError::upstream)
    }

    fn prepare_update(_current: &GalleryImage, input: GalleryImageUpdate) -> Result<Map<String, Value>, ApiError> {
        let mut v = Validator::new();
        let title = v.not_blank("title", input.title);
        let image_url = v.not_blank("imageUrl", input.image_url);
        v.finish()?;

        let fields = to_fields(&GalleryFields {
            title,
            description: optional_text(input.description),
            image_url,
            category: optional_text(input.category),
            tags: normalize_tags(input.tags),
        })
        .map_err(ApiError::upstream)?;

        if fields.is_empty() {
            return Err(ApiError::validation("No fields to update"));
        }
        Ok(fields)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags_are_normalized() {
        let fields = GalleryImage::prepare_create(NewGalleryImage {
            title: Some("Diwali".to_string()),
            image_url: Some("https://cdn.example.com/d.jpg".to_string()),
            tags: Some(vec![" Lights ".to_string(), "lights".to_string(), "".to_string()]),
            ..NewGalleryImage::default()
        })
        .unwrap();
        assert_eq!(fields["tags"], serde_json::json!(["lights"]));
    }
}
