//! Foodgram - A recipe sharing service
//!
//! This library provides the core functionality of Foodgram: users and
//! token sessions, recipes with tags and ingredients, favorites, a shopping
//! cart with a downloadable shopping list, and author subscriptions.

pub mod api;
pub mod config;
pub mod db;
pub mod models;
pub mod services;
