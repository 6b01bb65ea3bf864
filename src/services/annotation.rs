//! Per-viewer recipe annotation
//!
//! Attaches `is_favorited` / `is_in_shopping_cart` to a batch of recipes.
//! An anonymous viewer gets `false` for both without touching the store;
//! an authenticated one costs exactly one membership lookup per mark kind,
//! however many recipes are in the batch.

use crate::db::repositories::MarkRepository;
use crate::models::{Recipe, RecipeMark};
use anyhow::Result;
use serde::Serialize;
use std::sync::Arc;

/// Who is looking at a response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Viewer {
    Anonymous,
    User(i64),
}

impl Viewer {
    pub fn user_id(&self) -> Option<i64> {
        match self {
            Viewer::Anonymous => None,
            Viewer::User(id) => Some(*id),
        }
    }
}

impl From<Option<i64>> for Viewer {
    fn from(user_id: Option<i64>) -> Self {
        user_id.map_or(Viewer::Anonymous, Viewer::User)
    }
}

/// Viewer-specific flags of one recipe
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RecipeFlags {
    pub is_favorited: bool,
    pub is_in_shopping_cart: bool,
}

impl RecipeFlags {
    fn set(&mut self, mark: RecipeMark) {
        match mark {
            RecipeMark::Favorite => self.is_favorited = true,
            RecipeMark::ShoppingCart => self.is_in_shopping_cart = true,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnnotatedRecipe {
    pub recipe: Recipe,
    pub flags: RecipeFlags,
}

pub struct RecipeAnnotator {
    marks: Arc<dyn MarkRepository>,
}

impl RecipeAnnotator {
    pub fn new(marks: Arc<dyn MarkRepository>) -> Self {
        Self { marks }
    }

    /// Flags for each id in `recipe_ids`, in the same order
    pub async fn flags(&self, viewer: Viewer, recipe_ids: &[i64]) -> Result<Vec<RecipeFlags>> {
        let mut flags = vec![RecipeFlags::default(); recipe_ids.len()];
        let user_id = match viewer {
            Viewer::User(id) if !recipe_ids.is_empty() => id,
            _ => return Ok(flags),
        };

        for mark in RecipeMark::ALL {
            let marked = self.marks.marked_recipe_ids(mark, user_id, recipe_ids).await?;
            for (flag, id) in flags.iter_mut().zip(recipe_ids) {
                if marked.contains(id) {
                    flag.set(mark);
                }
            }
        }

        Ok(flags)
    }

    /// Pair every recipe with the viewer's flags, preserving count and order
    pub async fn annotate(&self, viewer: Viewer, recipes: Vec<Recipe>) -> Result<Vec<AnnotatedRecipe>> {
        let ids: Vec<i64> = recipes.iter().map(|r| r.id).collect();
        let flags = self.flags(viewer, &ids).await?;

        Ok(recipes
            .into_iter()
            .zip(flags)
            .map(|(recipe, flags)| AnnotatedRecipe { recipe, flags })
            .collect())
    }
}
