//! Persistence contract shared by the two backends.
//!
//! `MemStorage` is the development/demo fallback: plain maps behind a mutex,
//! per-collection auto-increment ids, seeded with a handful of ingredients
//! and pairings. `DbStorage` is the sqlite-backed implementation used when
//! `DATABASE_URL` is set. Route handlers only ever see `dyn Storage`, so the
//! two must behave identically from the caller's perspective; the parity
//! test suite runs the same assertions against both.
//!
//! Pairings are symmetric: `get_pairing(a, b)` must find a row stored as
//! `(b, a)`. Ingredient name lookup is case-insensitive.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::schema::{
    CuisinePreference, DietaryPreference, FlavorPreference, Ingredient, NewCuisinePreference,
    NewDietaryPreference, NewFlavorPreference, NewIngredient, NewPairing, NewUser,
    NewUserIngredient, Pairing, User, UserIngredient,
};

mod database;
mod memory;

pub use database::DbStorage;
pub use memory::MemStorage;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("corrupt stored value: {0}")]
    Corrupt(#[from] serde_json::Error),
}

pub type StorageResult<T> = Result<T, StorageError>;

#[async_trait]
pub trait Storage: Send + Sync {
    // Users. Uniqueness of username/email is checked by the route layer
    // before create_user is called.
    async fn get_user(&self, id: i64) -> StorageResult<Option<User>>;
    async fn get_user_by_username(&self, username: &str) -> StorageResult<Option<User>>;
    async fn get_user_by_email(&self, email: &str) -> StorageResult<Option<User>>;
    async fn create_user(&self, user: NewUser) -> StorageResult<User>;

    // Dietary preferences.
    async fn dietary_preferences(&self, user_id: i64) -> StorageResult<Vec<DietaryPreference>>;
    async fn add_dietary_preference(
        &self,
        pref: NewDietaryPreference,
    ) -> StorageResult<DietaryPreference>;
    async fn remove_dietary_preference(&self, id: i64) -> StorageResult<()>;

    // Flavor preferences.
    async fn flavor_preferences(&self, user_id: i64) -> StorageResult<Vec<FlavorPreference>>;
    async fn add_flavor_preference(
        &self,
        pref: NewFlavorPreference,
    ) -> StorageResult<FlavorPreference>;
    /// Returns `None` when the id does not exist; otherwise the record with
    /// only `preference_level` changed.
    async fn update_flavor_preference(
        &self,
        id: i64,
        level: i32,
    ) -> StorageResult<Option<FlavorPreference>>;

    // Cuisine preferences.
    async fn cuisine_preferences(&self, user_id: i64) -> StorageResult<Vec<CuisinePreference>>;
    async fn add_cuisine_preference(
        &self,
        pref: NewCuisinePreference,
    ) -> StorageResult<CuisinePreference>;
    async fn remove_cuisine_preference(&self, id: i64) -> StorageResult<()>;

    // Ingredients.
    async fn get_ingredient(&self, id: i64) -> StorageResult<Option<Ingredient>>;
    /// Case-insensitive exact match on name.
    async fn get_ingredient_by_name(&self, name: &str) -> StorageResult<Option<Ingredient>>;
    async fn all_ingredients(&self) -> StorageResult<Vec<Ingredient>>;
    async fn create_ingredient(&self, ingredient: NewIngredient) -> StorageResult<Ingredient>;
    /// Case-insensitive substring match over name, category and
    /// primary_taste.
    async fn search_ingredients(&self, query: &str) -> StorageResult<Vec<Ingredient>>;

    // Pairings.
    async fn get_pairing(&self, ingredient1_id: i64, ingredient2_id: i64)
        -> StorageResult<Option<Pairing>>;
    async fn all_pairings(&self) -> StorageResult<Vec<Pairing>>;
    async fn create_pairing(&self, pairing: NewPairing) -> StorageResult<Pairing>;
    /// Pairings where either side matches the given ingredient.
    async fn pairings_for_ingredient(&self, ingredient_id: i64) -> StorageResult<Vec<Pairing>>;

    // Kitchen inventory.
    async fn user_ingredients(&self, user_id: i64) -> StorageResult<Vec<UserIngredient>>;
    async fn add_user_ingredient(&self, item: NewUserIngredient) -> StorageResult<UserIngredient>;
    async fn remove_user_ingredient(&self, id: i64) -> StorageResult<()>;
    /// Omitting `expiry_date` keeps the stored value.
    async fn update_user_ingredient(
        &self,
        id: i64,
        quantity: String,
        expiry_date: Option<DateTime<Utc>>,
    ) -> StorageResult<Option<UserIngredient>>;
}
