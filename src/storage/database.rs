//! sqlite-backed store.
//!
//! The schema is applied on connect, so a fresh database file (or
//! `sqlite::memory:` in tests) is usable immediately. `flavor_profile` is
//! kept as a JSON text column, mirroring the shape the API serves.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;

use super::{Storage, StorageError, StorageResult};
use crate::schema::{
    CuisinePreference, DietaryPreference, FlavorPreference, Ingredient, NewCuisinePreference,
    NewDietaryPreference, NewFlavorPreference, NewIngredient, NewPairing, NewUser,
    NewUserIngredient, Pairing, User, UserIngredient,
};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS users (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    username TEXT NOT NULL UNIQUE,
    password TEXT NOT NULL,
    email TEXT NOT NULL UNIQUE,
    created_at TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS dietary_preferences (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER NOT NULL REFERENCES users(id),
    preference_type TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS flavor_preferences (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER NOT NULL REFERENCES users(id),
    flavor_type TEXT NOT NULL,
    preference_level INTEGER NOT NULL
);
CREATE TABLE IF NOT EXISTS cuisine_preferences (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER NOT NULL REFERENCES users(id),
    cuisine_type TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS ingredients (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE,
    flavor_profile TEXT NOT NULL,
    primary_taste TEXT NOT NULL,
    category TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS pairings (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    ingredient1_id INTEGER NOT NULL REFERENCES ingredients(id),
    ingredient2_id INTEGER NOT NULL REFERENCES ingredients(id),
    affinity_score INTEGER NOT NULL,
    pairing_notes TEXT
);
CREATE TABLE IF NOT EXISTS user_ingredients (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER NOT NULL REFERENCES users(id),
    ingredient_id INTEGER NOT NULL REFERENCES ingredients(id),
    quantity TEXT,
    expiry_date TEXT
);
";

pub struct DbStorage {
    pool: SqlitePool,
}

impl DbStorage {
    pub async fn connect(url: &str) -> StorageResult<Self> {
        // An in-memory sqlite database exists per connection, so the pool
        // must not hand out more than one.
        let max_connections = if url.contains(":memory:") { 1 } else { 5 };
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await?;
        sqlx::raw_sql(SCHEMA).execute(&pool).await?;
        Ok(Self { pool })
    }
}

fn user_from_row(row: &SqliteRow) -> Result<User, sqlx::Error> {
    Ok(User {
        id: row.try_get("id")?,
        username: row.try_get("username")?,
        password: row.try_get("password")?,
        email: row.try_get("email")?,
        created_at: row.try_get("created_at")?,
    })
}

fn ingredient_from_row(row: &SqliteRow) -> Result<Ingredient, StorageError> {
    let profile: String = row.try_get("flavor_profile")?;
    Ok(Ingredient {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        flavor_profile: serde_json::from_str(&profile)?,
        primary_taste: row.try_get("primary_taste")?,
        category: row.try_get("category")?,
    })
}

fn pairing_from_row(row: &SqliteRow) -> Result<Pairing, sqlx::Error> {
    Ok(Pairing {
        id: row.try_get("id")?,
        ingredient1_id: row.try_get("ingredient1_id")?,
        ingredient2_id: row.try_get("ingredient2_id")?,
        affinity_score: row.try_get("affinity_score")?,
        pairing_notes: row.try_get("pairing_notes")?,
    })
}

fn user_ingredient_from_row(row: &SqliteRow) -> Result<UserIngredient, sqlx::Error> {
    Ok(UserIngredient {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        ingredient_id: row.try_get("ingredient_id")?,
        quantity: row.try_get("quantity")?,
        expiry_date: row.try_get("expiry_date")?,
    })
}

fn flavor_preference_from_row(row: &SqliteRow) -> Result<FlavorPreference, sqlx::Error> {
    Ok(FlavorPreference {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        flavor_type: row.try_get("flavor_type")?,
        preference_level: row.try_get("preference_level")?,
    })
}

#[async_trait]
impl Storage for DbStorage {
    async fn get_user(&self, id: i64) -> StorageResult<Option<User>> {
        let row = sqlx::query("SELECT * FROM users WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(user_from_row).transpose()?)
    }

    async fn get_user_by_username(&self, username: &str) -> StorageResult<Option<User>> {
        let row = sqlx::query("SELECT * FROM users WHERE username = ?1")
            .bind(username)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(user_from_row).transpose()?)
    }

    async fn get_user_by_email(&self, email: &str) -> StorageResult<Option<User>> {
        let row = sqlx::query("SELECT * FROM users WHERE email = ?1")
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(user_from_row).transpose()?)
    }

    async fn create_user(&self, user: NewUser) -> StorageResult<User> {
        let row = sqlx::query(
            "INSERT INTO users (username, password, email, created_at)
             VALUES (?1, ?2, ?3, ?4) RETURNING *",
        )
        .bind(&user.username)
        .bind(&user.password)
        .bind(&user.email)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;
        Ok(user_from_row(&row)?)
    }

    async fn dietary_preferences(&self, user_id: i64) -> StorageResult<Vec<DietaryPreference>> {
        let rows = sqlx::query_as::<_, (i64, i64, String)>(
            "SELECT id, user_id, preference_type FROM dietary_preferences WHERE user_id = ?1",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(|(id, user_id, preference_type)| DietaryPreference {
                id,
                user_id,
                preference_type,
            })
            .collect())
    }

    async fn add_dietary_preference(
        &self,
        pref: NewDietaryPreference,
    ) -> StorageResult<DietaryPreference> {
        let (id, user_id, preference_type) = sqlx::query_as::<_, (i64, i64, String)>(
            "INSERT INTO dietary_preferences (user_id, preference_type)
             VALUES (?1, ?2) RETURNING id, user_id, preference_type",
        )
        .bind(pref.user_id)
        .bind(&pref.preference_type)
        .fetch_one(&self.pool)
        .await?;
        Ok(DietaryPreference {
            id,
            user_id,
            preference_type,
        })
    }

    async fn remove_dietary_preference(&self, id: i64) -> StorageResult<()> {
        sqlx::query("DELETE FROM dietary_preferences WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn flavor_preferences(&self, user_id: i64) -> StorageResult<Vec<FlavorPreference>> {
        let rows = sqlx::query("SELECT * FROM flavor_preferences WHERE user_id = ?1")
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows
            .iter()
            .map(flavor_preference_from_row)
            .collect::<Result<_, _>>()?)
    }

    async fn add_flavor_preference(
        &self,
        pref: NewFlavorPreference,
    ) -> StorageResult<FlavorPreference> {
        let row = sqlx::query(
            "INSERT INTO flavor_preferences (user_id, flavor_type, preference_level)
             VALUES (?1, ?2, ?3) RETURNING *",
        )
        .bind(pref.user_id)
        .bind(&pref.flavor_type)
        .bind(pref.preference_level)
        .fetch_one(&self.pool)
        .await?;
        Ok(flavor_preference_from_row(&row)?)
    }

    async fn update_flavor_preference(
        &self,
        id: i64,
        level: i32,
    ) -> StorageResult<Option<FlavorPreference>> {
        let row = sqlx::query(
            "UPDATE flavor_preferences SET preference_level = ?2 WHERE id = ?1 RETURNING *",
        )
        .bind(id)
        .bind(level)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.as_ref().map(flavor_preference_from_row).transpose()?)
    }

    async fn cuisine_preferences(&self, user_id: i64) -> StorageResult<Vec<CuisinePreference>> {
        let rows = sqlx::query_as::<_, (i64, i64, String)>(
            "SELECT id, user_id, cuisine_type FROM cuisine_preferences WHERE user_id = ?1",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(|(id, user_id, cuisine_type)| CuisinePreference {
                id,
                user_id,
                cuisine_type,
            })
            .collect())
    }

    async fn add_cuisine_preference(
        &self,
        pref: NewCuisinePreference,
    ) -> StorageResult<CuisinePreference> {
        let (id, user_id, cuisine_type) = sqlx::query_as::<_, (i64, i64, String)>(
            "INSERT INTO cuisine_preferences (user_id, cuisine_type)
             VALUES (?1, ?2) RETURNING id, user_id, cuisine_type",
        )
        .bind(pref.user_id)
        .bind(&pref.cuisine_type)
        .fetch_one(&self.pool)
        .await?;
        Ok(CuisinePreference {
            id,
            user_id,
            cuisine_type,
        })
    }

    async fn remove_cuisine_preference(&self, id: i64) -> StorageResult<()> {
        sqlx::query("DELETE FROM cuisine_preferences WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn get_ingredient(&self, id: i64) -> StorageResult<Option<Ingredient>> {
        let row = sqlx::query("SELECT * FROM ingredients WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(ingredient_from_row).transpose()
    }

    async fn get_ingredient_by_name(&self, name: &str) -> StorageResult<Option<Ingredient>> {
        let row = sqlx::query("SELECT * FROM ingredients WHERE LOWER(name) = LOWER(?1)")
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(ingredient_from_row).transpose()
    }

    async fn all_ingredients(&self) -> StorageResult<Vec<Ingredient>> {
        let rows = sqlx::query("SELECT * FROM ingredients ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(ingredient_from_row).collect()
    }

    async fn create_ingredient(&self, ingredient: NewIngredient) -> StorageResult<Ingredient> {
        let profile = serde_json::to_string(&ingredient.flavor_profile)?;
        let row = sqlx::query(
            "INSERT INTO ingredients (name, flavor_profile, primary_taste, category)
             VALUES (?1, ?2, ?3, ?4) RETURNING *",
        )
        .bind(&ingredient.name)
        .bind(profile)
        .bind(&ingredient.primary_taste)
        .bind(&ingredient.category)
        .fetch_one(&self.pool)
        .await?;
        ingredient_from_row(&row)
    }

    async fn search_ingredients(&self, query: &str) -> StorageResult<Vec<Ingredient>> {
        // LIKE wildcards in the query are matched literally.
        let escaped = query
            .to_lowercase()
            .replace('\\', "\\\\")
            .replace('%', "\\%")
            .replace('_', "\\_");
        let pattern = format!("%{escaped}%");
        let rows = sqlx::query(
            "SELECT * FROM ingredients
             WHERE LOWER(name) LIKE ?1 ESCAPE '\\'
                OR LOWER(category) LIKE ?1 ESCAPE '\\'
                OR LOWER(primary_taste) LIKE ?1 ESCAPE '\\'
             ORDER BY id",
        )
        .bind(pattern)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(ingredient_from_row).collect()
    }

    async fn get_pairing(
        &self,
        ingredient1_id: i64,
        ingredient2_id: i64,
    ) -> StorageResult<Option<Pairing>> {
        let row = sqlx::query(
            "SELECT * FROM pairings
             WHERE (ingredient1_id = ?1 AND ingredient2_id = ?2)
                OR (ingredient1_id = ?2 AND ingredient2_id = ?1)",
        )
        .bind(ingredient1_id)
        .bind(ingredient2_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.as_ref().map(pairing_from_row).transpose()?)
    }

    async fn all_pairings(&self) -> StorageResult<Vec<Pairing>> {
        let rows = sqlx::query("SELECT * FROM pairings ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows
            .iter()
            .map(pairing_from_row)
            .collect::<Result<_, _>>()?)
    }

    async fn create_pairing(&self, pairing: NewPairing) -> StorageResult<Pairing> {
        let row = sqlx::query(
            "INSERT INTO pairings (ingredient1_id, ingredient2_id, affinity_score, pairing_notes)
             VALUES (?1, ?2, ?3, ?4) RETURNING *",
        )
        .bind(pairing.ingredient1_id)
        .bind(pairing.ingredient2_id)
        .bind(pairing.affinity_score)
        .bind(&pairing.pairing_notes)
        .fetch_one(&self.pool)
        .await?;
        Ok(pairing_from_row(&row)?)
    }

    async fn pairings_for_ingredient(&self, ingredient_id: i64) -> StorageResult<Vec<Pairing>> {
        let rows = sqlx::query(
            "SELECT * FROM pairings WHERE ingredient1_id = ?1 OR ingredient2_id = ?1 ORDER BY id",
        )
        .bind(ingredient_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .iter()
            .map(pairing_from_row)
            .collect::<Result<_, _>>()?)
    }

    async fn user_ingredients(&self, user_id: i64) -> StorageResult<Vec<UserIngredient>> {
        let rows = sqlx::query("SELECT * FROM user_ingredients WHERE user_id = ?1 ORDER BY id")
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows
            .iter()
            .map(user_ingredient_from_row)
            .collect::<Result<_, _>>()?)
    }

    async fn add_user_ingredient(&self, item: NewUserIngredient) -> StorageResult<UserIngredient> {
        let row = sqlx::query(
            "INSERT INTO user_ingredients (user_id, ingredient_id, quantity, expiry_date)
             VALUES (?1, ?2, ?3, ?4) RETURNING *",
        )
        .bind(item.user_id)
        .bind(item.ingredient_id)
        .bind(&item.quantity)
        .bind(item.expiry_date)
        .fetch_one(&self.pool)
        .await?;
        Ok(user_ingredient_from_row(&row)?)
    }

    async fn remove_user_ingredient(&self, id: i64) -> StorageResult<()> {
        sqlx::query("DELETE FROM user_ingredients WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn update_user_ingredient(
        &self,
        id: i64,
        quantity: String,
        expiry_date: Option<DateTime<Utc>>,
    ) -> StorageResult<Option<UserIngredient>> {
        // An omitted expiry date keeps the stored value.
        let row = match expiry_date {
            Some(expiry) => {
                sqlx::query(
                    "UPDATE user_ingredients SET quantity = ?2, expiry_date = ?3
                     WHERE id = ?1 RETURNING *",
                )
                .bind(id)
                .bind(quantity)
                .bind(expiry)
                .fetch_optional(&self.pool)
                .await?
            }
            None => {
                sqlx::query(
                    "UPDATE user_ingredients SET quantity = ?2 WHERE id = ?1 RETURNING *",
                )
                .bind(id)
                .bind(quantity)
                .fetch_optional(&self.pool)
                .await?
            }
        };
        Ok(row.as_ref().map(user_ingredient_from_row).transpose()?)
    }
}
