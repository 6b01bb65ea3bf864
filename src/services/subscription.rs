//! Subscription service
//!
//! Users follow authors. Listing subscriptions returns author cards: the
//! author, their recipe count and their recipes (optionally truncated).

use crate::db::repositories::{RecipeRepository, SubscriptionRepository, UserRepository};
use crate::models::{ListParams, PagedResult, Recipe, User};
use anyhow::Context;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum SubscriptionServiceError {
    #[error("Author not found")]
    NotFound,

    #[error("You cannot subscribe to yourself")]
    SelfSubscription,

    #[error("Already subscribed to this author")]
    AlreadySubscribed,

    #[error("Not subscribed to this author")]
    NotSubscribed,

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// Followed author with a preview of their recipes
#[derive(Debug, Clone)]
pub struct AuthorCard {
    pub author: User,
    pub recipes: Vec<Recipe>,
    pub recipes_count: i64,
}

pub struct SubscriptionService {
    subscriptions: Arc<dyn SubscriptionRepository>,
    users: Arc<dyn UserRepository>,
    recipes: Arc<dyn RecipeRepository>,
}

impl SubscriptionService {
    pub fn new(
        subscriptions: Arc<dyn SubscriptionRepository>,
        users: Arc<dyn UserRepository>,
        recipes: Arc<dyn RecipeRepository>,
    ) -> Self {
        Self {
            subscriptions,
            users,
            recipes,
        }
    }

    /// Follow `author_id`, returning the author's card
    pub async fn subscribe(
        &self,
        subscriber_id: i64,
        author_id: i64,
        recipes_limit: Option<usize>,
    ) -> Result<AuthorCard, SubscriptionServiceError> {
        let author = self.existing_author(author_id).await?;
        if author.id == subscriber_id {
            return Err(SubscriptionServiceError::SelfSubscription);
        }

        if !self
            .subscriptions
            .create(subscriber_id, author_id)
            .await
            .context("Failed to create subscription")?
        {
            return Err(SubscriptionServiceError::AlreadySubscribed);
        }

        tracing::info!("User {} subscribed to {}", subscriber_id, author_id);
        let mut cards = self.cards(vec![author], recipes_limit).await?;
        cards.pop().ok_or(SubscriptionServiceError::NotFound)
    }

    pub async fn unsubscribe(&self, subscriber_id: i64, author_id: i64) -> Result<(), SubscriptionServiceError> {
        self.existing_author(author_id).await?;

        if !self
            .subscriptions
            .delete(subscriber_id, author_id)
            .await
            .context("Failed to delete subscription")?
        {
            return Err(SubscriptionServiceError::NotSubscribed);
        }

        tracing::info!("User {} unsubscribed from {}", subscriber_id, author_id);
        Ok(())
    }

    /// Authors the user follows, most recent subscription first
    pub async fn list(
        &self,
        subscriber_id: i64,
        params: ListParams,
        recipes_limit: Option<usize>,
    ) -> Result<PagedResult<AuthorCard>, SubscriptionServiceError> {
        let (authors, total) = self
            .subscriptions
            .list_authors(subscriber_id, params.limit, params.offset)
            .await
            .context("Failed to list subscriptions")?;

        let cards = self.cards(authors, recipes_limit).await?;
        Ok(PagedResult::new(cards, total))
    }

    /// Which of `author_ids` the viewer follows
    pub async fn subscribed_among(
        &self,
        subscriber_id: i64,
        author_ids: &[i64],
    ) -> Result<HashSet<i64>, SubscriptionServiceError> {
        let ids = self
            .subscriptions
            .subscribed_author_ids(subscriber_id, author_ids)
            .await
            .context("Failed to look up subscriptions")?;
        Ok(ids)
    }

    async fn existing_author(&self, author_id: i64) -> Result<User, SubscriptionServiceError> {
        self.users
            .get_by_id(author_id)
            .await
            .context("Failed to get author")?
            .ok_or(SubscriptionServiceError::NotFound)
    }

    /// Build cards for a page of authors with one count query and one recipe query
    async fn cards(
        &self,
        authors: Vec<User>,
        recipes_limit: Option<usize>,
    ) -> Result<Vec<AuthorCard>, SubscriptionServiceError> {
        if authors.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<i64> = authors.iter().map(|a| a.id).collect();

        let counts = self
            .recipes
            .count_by_authors(&ids)
            .await
            .context("Failed to count author recipes")?;

        let mut by_author: HashMap<i64, Vec<Recipe>> = HashMap::new();
        for recipe in self
            .recipes
            .list_by_authors(&ids)
            .await
            .context("Failed to load author recipes")?
        {
            by_author.entry(recipe.author_id).or_default().push(recipe);
        }

        Ok(authors
            .into_iter()
            .map(|author| {
                let mut recipes = by_author.remove(&author.id).unwrap_or_default();
                if let Some(limit) = recipes_limit {
                    recipes.truncate(limit);
                }
                AuthorCard {
                    recipes_count: counts.get(&author.id).copied().unwrap_or(0),
                    recipes,
                    author,
                }
            })
            .collect())
    }
}
