//! Shared data model: the stored entities and their insert payloads.
//!
//! Insert payloads deliberately exclude the server-generated fields (`id`,
//! `created_at`); handlers deserialize them straight from request bodies and
//! run `validate()` before anything touches storage.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Five-axis taste composition, each axis on a 0-100 scale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlavorProfile {
    pub sweet: i32,
    pub salty: i32,
    pub sour: i32,
    pub bitter: i32,
    pub umami: i32,
}

impl FlavorProfile {
    pub fn in_range(&self) -> bool {
        [self.sweet, self.salty, self.sour, self.bitter, self.umami]
            .iter()
            .all(|v| (0..=100).contains(v))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub password: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewUser {
    pub username: String,
    pub password: String,
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DietaryPreference {
    pub id: i64,
    pub user_id: i64,
    pub preference_type: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewDietaryPreference {
    pub user_id: i64,
    pub preference_type: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlavorPreference {
    pub id: i64,
    pub user_id: i64,
    pub flavor_type: String,
    pub preference_level: i32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewFlavorPreference {
    pub user_id: i64,
    pub flavor_type: String,
    pub preference_level: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CuisinePreference {
    pub id: i64,
    pub user_id: i64,
    pub cuisine_type: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewCuisinePreference {
    pub user_id: i64,
    pub cuisine_type: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ingredient {
    pub id: i64,
    pub name: String,
    pub flavor_profile: FlavorProfile,
    pub primary_taste: String,
    pub category: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewIngredient {
    pub name: String,
    pub flavor_profile: FlavorProfile,
    pub primary_taste: String,
    pub category: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pairing {
    pub id: i64,
    pub ingredient1_id: i64,
    pub ingredient2_id: i64,
    pub affinity_score: i32,
    pub pairing_notes: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewPairing {
    pub ingredient1_id: i64,
    pub ingredient2_id: i64,
    pub affinity_score: i32,
    pub pairing_notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserIngredient {
    pub id: i64,
    pub user_id: i64,
    pub ingredient_id: i64,
    pub quantity: Option<String>,
    pub expiry_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewUserIngredient {
    pub user_id: i64,
    pub ingredient_id: i64,
    pub quantity: Option<String>,
    pub expiry_date: Option<DateTime<Utc>>,
}

fn require(ok: bool, message: &str) -> Result<(), AppError> {
    if ok {
        Ok(())
    } else {
        Err(AppError::Validation(message.to_string()))
    }
}

impl NewUser {
    pub fn validate(&self) -> Result<(), AppError> {
        require(!self.username.is_empty(), "username must not be empty")?;
        require(!self.password.is_empty(), "password must not be empty")?;
        require(self.email.contains('@'), "email must be a valid address")
    }
}

impl NewDietaryPreference {
    pub fn validate(&self) -> Result<(), AppError> {
        require(
            !self.preference_type.is_empty(),
            "preference_type must not be empty",
        )
    }
}

impl NewFlavorPreference {
    pub fn validate(&self) -> Result<(), AppError> {
        require(!self.flavor_type.is_empty(), "flavor_type must not be empty")?;
        require(
            (0..=100).contains(&self.preference_level),
            "preference_level must be between 0 and 100",
        )
    }
}

impl NewCuisinePreference {
    pub fn validate(&self) -> Result<(), AppError> {
        require(
            !self.cuisine_type.is_empty(),
            "cuisine_type must not be empty",
        )
    }
}

impl NewIngredient {
    pub fn validate(&self) -> Result<(), AppError> {
        require(!self.name.is_empty(), "name must not be empty")?;
        require(
            self.flavor_profile.in_range(),
            "flavor_profile values must be between 0 and 100",
        )
    }
}
