//! Recipe service
//!
//! Implements business logic for recipes:
//! - validation of names, cooking time, tag and ingredient sets
//! - author-only update and delete
//! - image storage through [`ImageStore`]
//! - detail assembly for listings, loading each per-recipe attribute
//!   (tags, ingredient lines, author, subscription, viewer flags) with one
//!   query for the whole page

use crate::db::repositories::{
    IngredientRepository, MarkRepository, RecipeRepository, SubscriptionRepository, TagRepository,
    UserRepository,
};
use crate::models::{
    CreateRecipeInput, IngredientAmount, ListParams, MarkFilter, PagedResult, Recipe,
    RecipeFilter, RecipeIngredient, RecipeMark, Tag, UpdateRecipeInput, User,
};
use crate::services::annotation::{RecipeAnnotator, RecipeFlags, Viewer};
use crate::services::image::{ImageError, ImageStore};
use anyhow::Context;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

const MAX_RECIPE_NAME_LENGTH: usize = 255;

/// Error types for recipe service operations
#[derive(Debug, thiserror::Error)]
pub enum RecipeServiceError {
    #[error("Recipe not found")]
    NotFound,

    /// The caller is not the recipe's author
    #[error("Only the author can change this recipe")]
    Forbidden,

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

impl From<ImageError> for RecipeServiceError {
    fn from(err: ImageError) -> Self {
        match err {
            ImageError::Invalid(msg) => RecipeServiceError::ValidationError(msg),
            ImageError::InternalError(e) => RecipeServiceError::InternalError(e),
        }
    }
}

/// Recipe with everything a response needs, as seen by one viewer
#[derive(Debug, Clone)]
pub struct RecipeDetail {
    pub recipe: Recipe,
    pub author: User,
    /// Whether the viewer follows the author
    pub author_subscribed: bool,
    pub tags: Vec<Tag>,
    pub ingredients: Vec<RecipeIngredient>,
    pub flags: RecipeFlags,
}

/// Raw listing filters as received from a client
#[derive(Debug, Clone, Default)]
pub struct RecipeQuery {
    pub author: Option<i64>,
    pub tags: Vec<String>,
    pub is_favorited: Option<String>,
    pub is_in_shopping_cart: Option<String>,
}

/// Parse a boolean filter value: `1`/`true` or `0`/`false`
pub fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" => Some(true),
        "0" | "false" => Some(false),
        _ => None,
    }
}

/// Turn client filters into a store filter.
///
/// A mark filter set to `0`/`false` is the same as leaving it out. Mark
/// filters only apply to an authenticated viewer; for anonymous viewers
/// they are validated and then ignored.
pub fn build_filter(viewer: Viewer, query: &RecipeQuery) -> Result<RecipeFilter, RecipeServiceError> {
    let mut marks = Vec::new();
    let requested = [
        (RecipeMark::Favorite, "is_favorited", &query.is_favorited),
        (RecipeMark::ShoppingCart, "is_in_shopping_cart", &query.is_in_shopping_cart),
    ];

    for (mark, field, raw) in requested {
        let Some(raw) = raw else { continue };
        let wanted = parse_flag(raw).ok_or_else(|| {
            RecipeServiceError::ValidationError(format!(
                "{} must be one of 1, 0, true, false",
                field
            ))
        })?;
        match viewer {
            Viewer::User(user_id) if wanted => marks.push(MarkFilter { mark, user_id }),
            _ => {}
        }
    }

    Ok(RecipeFilter {
        author_id: query.author,
        tag_slugs: query
            .tags
            .iter()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect(),
        marks,
    })
}

/// Recipe service
pub struct RecipeService {
    recipes: Arc<dyn RecipeRepository>,
    tags: Arc<dyn TagRepository>,
    ingredients: Arc<dyn IngredientRepository>,
    users: Arc<dyn UserRepository>,
    subscriptions: Arc<dyn SubscriptionRepository>,
    annotator: RecipeAnnotator,
    images: Arc<ImageStore>,
}

impl RecipeService {
    pub fn new(
        recipes: Arc<dyn RecipeRepository>,
        tags: Arc<dyn TagRepository>,
        ingredients: Arc<dyn IngredientRepository>,
        users: Arc<dyn UserRepository>,
        subscriptions: Arc<dyn SubscriptionRepository>,
        marks: Arc<dyn MarkRepository>,
        images: Arc<ImageStore>,
    ) -> Self {
        Self {
            recipes,
            tags,
            ingredients,
            users,
            subscriptions,
            annotator: RecipeAnnotator::new(marks),
            images,
        }
    }

    /// Create a recipe authored by `author_id`.
    ///
    /// `input.image` is a data URI; it is stored before the recipe rows are
    /// written and removed again if that write fails.
    ///
    /// # Errors
    /// - `ValidationError` for invalid fields, links or image
    /// - `InternalError` for database or file system errors
    pub async fn create(
        &self,
        author_id: i64,
        input: CreateRecipeInput,
    ) -> Result<RecipeDetail, RecipeServiceError> {
        let name = validate_name(&input.name)?;
        let text = validate_text(&input.text)?;
        validate_cooking_time(input.cooking_time)?;
        let ingredients = self.validate_ingredients(&input.ingredients).await?;
        let tags = self.validate_tags(&input.tags).await?;
        if input.image.trim().is_empty() {
            return Err(RecipeServiceError::ValidationError(
                "Image is required".to_string(),
            ));
        }

        let image = self.images.save_data_uri(&input.image).await?;
        let stored = CreateRecipeInput {
            name,
            text,
            cooking_time: input.cooking_time,
            image: image.clone(),
            tags,
            ingredients,
        };

        let recipe = match self.recipes.create(author_id, &stored).await {
            Ok(recipe) => recipe,
            Err(e) => {
                self.images.remove(&image).await;
                return Err(RecipeServiceError::InternalError(e.context("Failed to create recipe")));
            }
        };

        tracing::info!("Recipe {} '{}' created by user {}", recipe.id, recipe.name, author_id);
        self.detail(Viewer::User(author_id), recipe).await
    }

    /// Partially update a recipe. Only its author may do this.
    ///
    /// Present tag/ingredient sets replace the old ones; a new image replaces
    /// the old file.
    pub async fn update(
        &self,
        editor_id: i64,
        id: i64,
        input: UpdateRecipeInput,
    ) -> Result<RecipeDetail, RecipeServiceError> {
        let existing = self.get_owned(editor_id, id).await?;

        let mut stored = UpdateRecipeInput {
            name: input.name.as_deref().map(validate_name).transpose()?,
            text: input.text.as_deref().map(validate_text).transpose()?,
            cooking_time: input.cooking_time,
            image: None,
            tags: None,
            ingredients: None,
        };
        if let Some(cooking_time) = stored.cooking_time {
            validate_cooking_time(cooking_time)?;
        }
        if let Some(ingredients) = &input.ingredients {
            stored.ingredients = Some(self.validate_ingredients(ingredients).await?);
        }
        if let Some(tags) = &input.tags {
            stored.tags = Some(self.validate_tags(tags).await?);
        }
        if let Some(uri) = &input.image {
            stored.image = Some(self.images.save_data_uri(uri).await?);
        }

        let recipe = match self.recipes.update(id, &stored).await {
            Ok(recipe) => recipe,
            Err(e) => {
                if let Some(image) = &stored.image {
                    self.images.remove(image).await;
                }
                return Err(RecipeServiceError::InternalError(e.context("Failed to update recipe")));
            }
        };

        if stored.image.is_some() {
            self.images.remove(&existing.image).await;
        }

        tracing::info!("Recipe {} updated by user {}", id, editor_id);
        self.detail(Viewer::User(editor_id), recipe).await
    }

    /// Delete a recipe. Only its author may do this.
    pub async fn delete(&self, editor_id: i64, id: i64) -> Result<(), RecipeServiceError> {
        let existing = self.get_owned(editor_id, id).await?;

        if !self.recipes.delete(id).await.context("Failed to delete recipe")? {
            return Err(RecipeServiceError::NotFound);
        }
        self.images.remove(&existing.image).await;

        tracing::info!("Recipe {} deleted by user {}", id, editor_id);
        Ok(())
    }

    /// Plain recipe row, without viewer-specific data
    pub async fn get_recipe(&self, id: i64) -> Result<Recipe, RecipeServiceError> {
        self.recipes
            .get_by_id(id)
            .await
            .context("Failed to get recipe")?
            .ok_or(RecipeServiceError::NotFound)
    }

    pub async fn get(&self, viewer: Viewer, id: i64) -> Result<RecipeDetail, RecipeServiceError> {
        let recipe = self.get_recipe(id).await?;
        self.detail(viewer, recipe).await
    }

    /// One page of recipes matching the query, with viewer flags
    pub async fn list(
        &self,
        viewer: Viewer,
        query: &RecipeQuery,
        params: ListParams,
    ) -> Result<PagedResult<RecipeDetail>, RecipeServiceError> {
        let filter = build_filter(viewer, query)?;
        let (recipes, total) = self
            .recipes
            .list(&filter, params.limit, params.offset)
            .await
            .context("Failed to list recipes")?;

        let details = self.details(viewer, recipes).await?;
        Ok(PagedResult::new(details, total))
    }

    async fn get_owned(&self, editor_id: i64, id: i64) -> Result<Recipe, RecipeServiceError> {
        let recipe = self.get_recipe(id).await?;
        if recipe.author_id != editor_id {
            return Err(RecipeServiceError::Forbidden);
        }
        Ok(recipe)
    }

    async fn detail(&self, viewer: Viewer, recipe: Recipe) -> Result<RecipeDetail, RecipeServiceError> {
        self.details(viewer, vec![recipe])
            .await?
            .pop()
            .ok_or(RecipeServiceError::NotFound)
    }

    /// Assemble details for a batch of recipes, preserving order
    async fn details(
        &self,
        viewer: Viewer,
        recipes: Vec<Recipe>,
    ) -> Result<Vec<RecipeDetail>, RecipeServiceError> {
        if recipes.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<i64> = recipes.iter().map(|r| r.id).collect();
        let mut author_ids: Vec<i64> = recipes.iter().map(|r| r.author_id).collect();
        author_ids.sort_unstable();
        author_ids.dedup();

        let mut tags: HashMap<i64, Vec<Tag>> = HashMap::new();
        for link in self.tags.for_recipes(&ids).await.context("Failed to load recipe tags")? {
            tags.entry(link.recipe_id).or_default().push(link.tag);
        }

        let mut lines: HashMap<i64, Vec<RecipeIngredient>> = HashMap::new();
        for line in self
            .recipes
            .ingredients_for(&ids)
            .await
            .context("Failed to load recipe ingredients")?
        {
            lines.entry(line.recipe_id).or_default().push(line);
        }

        let authors: HashMap<i64, User> = self
            .users
            .get_by_ids(&author_ids)
            .await
            .context("Failed to load recipe authors")?
            .into_iter()
            .map(|u| (u.id, u))
            .collect();

        let subscribed = match viewer {
            Viewer::User(user_id) => self
                .subscriptions
                .subscribed_author_ids(user_id, &author_ids)
                .await
                .context("Failed to load subscriptions")?,
            Viewer::Anonymous => HashSet::new(),
        };

        let annotated = self
            .annotator
            .annotate(viewer, recipes)
            .await
            .context("Failed to load recipe marks")?;

        annotated
            .into_iter()
            .map(|item| -> Result<RecipeDetail, RecipeServiceError> {
                let recipe = item.recipe;
                let author = authors
                    .get(&recipe.author_id)
                    .cloned()
                    .with_context(|| format!("Author {} of recipe {} is missing", recipe.author_id, recipe.id))?;
                Ok(RecipeDetail {
                    author_subscribed: subscribed.contains(&recipe.author_id),
                    tags: tags.remove(&recipe.id).unwrap_or_default(),
                    ingredients: lines.remove(&recipe.id).unwrap_or_default(),
                    flags: item.flags,
                    author,
                    recipe,
                })
            })
            .collect()
    }

    async fn validate_ingredients(
        &self,
        ingredients: &[IngredientAmount],
    ) -> Result<Vec<IngredientAmount>, RecipeServiceError> {
        if ingredients.is_empty() {
            return Err(RecipeServiceError::ValidationError(
                "A recipe needs at least one ingredient".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for item in ingredients {
            if !seen.insert(item.id) {
                return Err(RecipeServiceError::ValidationError(format!(
                    "Ingredient {} is listed more than once",
                    item.id
                )));
            }
            if !item.amount.is_finite() || item.amount < 0.0 {
                return Err(RecipeServiceError::ValidationError(format!(
                    "Amount of ingredient {} must be a non-negative number",
                    item.id
                )));
            }
        }

        let ids: Vec<i64> = ingredients.iter().map(|i| i.id).collect();
        let known: HashSet<i64> = self
            .ingredients
            .get_by_ids(&ids)
            .await
            .context("Failed to look up ingredients")?
            .into_iter()
            .map(|i| i.id)
            .collect();
        if let Some(missing) = ids.iter().find(|id| !known.contains(id)) {
            return Err(RecipeServiceError::ValidationError(format!(
                "Ingredient {} does not exist",
                missing
            )));
        }

        Ok(ingredients.to_vec())
    }

    /// Check tag ids exist; duplicates collapse, first occurrence kept
    async fn validate_tags(&self, tags: &[i64]) -> Result<Vec<i64>, RecipeServiceError> {
        let mut seen = HashSet::new();
        let unique: Vec<i64> = tags.iter().copied().filter(|id| seen.insert(*id)).collect();

        let known: HashSet<i64> = self
            .tags
            .get_by_ids(&unique)
            .await
            .context("Failed to look up tags")?
            .into_iter()
            .map(|t| t.id)
            .collect();
        if let Some(missing) = unique.iter().find(|id| !known.contains(id)) {
            return Err(RecipeServiceError::ValidationError(format!(
                "Tag {} does not exist",
                missing
            )));
        }

        Ok(unique)
    }
}

fn validate_name(name: &str) -> Result<String, RecipeServiceError> {
    let name = name.trim();
    if name.is_empty() || name.chars().count() > MAX_RECIPE_NAME_LENGTH {
        return Err(RecipeServiceError::ValidationError(
            "Recipe name must be 1-255 characters".to_string(),
        ));
    }
    Ok(name.to_string())
}

fn validate_text(text: &str) -> Result<String, RecipeServiceError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(RecipeServiceError::ValidationError(
            "Recipe text cannot be empty".to_string(),
        ));
    }
    Ok(text.to_string())
}

fn validate_cooking_time(minutes: i64) -> Result<(), RecipeServiceError> {
    if minutes < 1 {
        return Err(RecipeServiceError::ValidationError(
            "Cooking time must be at least 1 minute".to_string(),
        ));
    }
    Ok(())
}
