//! Tag service
//!
//! Tags are admin-managed reference data. Public callers only read them;
//! `create` exists for seeding and administration.

use crate::db::repositories::TagRepository;
use crate::models::{CreateTagInput, Tag};
use anyhow::Context;
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;

const MAX_TAG_NAME_LENGTH: usize = 200;

static SLUG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[-a-zA-Z0-9_]{1,200}$").unwrap());
static COLOR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^#(?:[0-9a-fA-F]{3}|[0-9a-fA-F]{6})$").unwrap());

/// Error types for tag service operations
#[derive(Debug, thiserror::Error)]
pub enum TagServiceError {
    #[error("Tag not found")]
    NotFound,

    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Name or slug already used by another tag
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

pub struct TagService {
    repo: Arc<dyn TagRepository>,
}

impl TagService {
    pub fn new(repo: Arc<dyn TagRepository>) -> Self {
        Self { repo }
    }

    /// All tags ordered by name
    pub async fn list(&self) -> Result<Vec<Tag>, TagServiceError> {
        let tags = self.repo.list().await.context("Failed to list tags")?;
        Ok(tags)
    }

    pub async fn get_by_id(&self, id: i64) -> Result<Tag, TagServiceError> {
        self.repo
            .get_by_id(id)
            .await
            .context("Failed to get tag")?
            .ok_or(TagServiceError::NotFound)
    }

    /// Create a tag after validating name, slug and color.
    ///
    /// # Errors
    /// - `ValidationError` for an empty or too long name, a slug with
    ///   characters outside `[-a-zA-Z0-9_]`, or a color that is not `#RGB`/`#RRGGBB`
    /// - `Conflict` if the name or slug is taken
    pub async fn create(&self, input: CreateTagInput) -> Result<Tag, TagServiceError> {
        let input = CreateTagInput::new(input.name.trim(), input.slug.trim(), input.color.trim());

        if input.name.is_empty() || input.name.chars().count() > MAX_TAG_NAME_LENGTH {
            return Err(TagServiceError::ValidationError(
                "Tag name must be 1-200 characters".to_string(),
            ));
        }
        if !SLUG_RE.is_match(&input.slug) {
            return Err(TagServiceError::ValidationError(format!(
                "Invalid slug '{}'",
                input.slug
            )));
        }
        if !COLOR_RE.is_match(&input.color) {
            return Err(TagServiceError::ValidationError(format!(
                "Invalid color '{}', expected a hex code like #E26C2D",
                input.color
            )));
        }

        if self
            .repo
            .name_or_slug_taken(&input.name, &input.slug)
            .await
            .context("Failed to check tag uniqueness")?
        {
            return Err(TagServiceError::Conflict(format!(
                "Tag '{}' or slug '{}' already exists",
                input.name, input.slug
            )));
        }

        let tag = self.repo.create(&input).await.context("Failed to create tag")?;
        tracing::info!("Created tag {} ({})", tag.name, tag.slug);
        Ok(tag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::SqlxTagRepository;
    use crate::db::{create_test_pool, migrations};

    async fn setup_test_service() -> TagService {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        TagService::new(SqlxTagRepository::boxed(pool))
    }

    #[tokio::test]
    async fn test_create_and_list() {
        let service = setup_test_service().await;
        service.create(CreateTagInput::new("Lunch", "lunch", "#49B64E")).await.unwrap();
        let breakfast = service
            .create(CreateTagInput::new(" Breakfast ", "breakfast", "#E26C2D"))
            .await
            .unwrap();

        assert_eq!(breakfast.name, "Breakfast");
        let names: Vec<String> = service.list().await.unwrap().into_iter().map(|t| t.name).collect();
        assert_eq!(names, vec!["Breakfast", "Lunch"]);
        assert_eq!(service.get_by_id(breakfast.id).await.unwrap(), breakfast);
    }

    #[tokio::test]
    async fn test_get_missing_tag() {
        let service = setup_test_service().await;

        assert!(matches!(service.get_by_id(42).await, Err(TagServiceError::NotFound)));
    }

    #[tokio::test]
    async fn test_create_validation() {
        let service = setup_test_service().await;

        for (name, slug, color) in [
            ("", "empty", "#fff"),
            ("Dinner", "din ner", "#fff"),
            ("Dinner", "dinner", "red"),
            ("Dinner", "dinner", "#12345"),
        ] {
            let result = service.create(CreateTagInput::new(name, slug, color)).await;
            assert!(
                matches!(result, Err(TagServiceError::ValidationError(_))),
                "expected validation error for ({}, {}, {})",
                name,
                slug,
                color
            );
        }
    }

    #[tokio::test]
    async fn test_duplicate_name_or_slug_conflicts() {
        let service = setup_test_service().await;
        service.create(CreateTagInput::new("Dinner", "dinner", "#8775D2")).await.unwrap();

        let same_name = service.create(CreateTagInput::new("Dinner", "supper", "#000")).await;
        let same_slug = service.create(CreateTagInput::new("Supper", "dinner", "#000")).await;

        assert!(matches!(same_name, Err(TagServiceError::Conflict(_))));
        assert!(matches!(same_slug, Err(TagServiceError::Conflict(_))));
    }
}
