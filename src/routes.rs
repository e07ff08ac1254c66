use std::sync::Arc;

use axum::extract::{FromRequestParts, Multipart, Path, Query, State};
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;

use crate::error::AppError;
use crate::schema::{
    FlavorProfile, Ingredient, NewCuisinePreference, NewDietaryPreference, NewFlavorPreference,
    NewIngredient, NewUser, NewUserIngredient, Pairing,
};
use crate::state::AppState;
use crate::storage::StorageError;

/// Deserializes a request body into an insert payload, reporting shape
/// problems as a 400 instead of the extractor's default rejection.
fn parse<T: DeserializeOwned>(body: Value) -> Result<T, AppError> {
    serde_json::from_value(body).map_err(|err| AppError::Validation(err.to_string()))
}

/// Numeric `:id` path segment. Non-numeric values get the API's JSON 400
/// body instead of axum's plain-text rejection.
pub struct PathId(pub i64);

#[axum::async_trait]
impl<S: Send + Sync> FromRequestParts<S> for PathId {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(id) = Path::<i64>::from_request_parts(parts, state)
            .await
            .map_err(|_| AppError::Validation("Invalid ID".to_string()))?;
        Ok(PathId(id))
    }
}

/// Numeric `:user_id` path segment.
pub struct PathUserId(pub i64);

#[axum::async_trait]
impl<S: Send + Sync> FromRequestParts<S> for PathUserId {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(user_id) = Path::<i64>::from_request_parts(parts, state)
            .await
            .map_err(|_| AppError::Validation("Invalid user ID".to_string()))?;
        Ok(PathUserId(user_id))
    }
}

// --- users ---

pub async fn create_user_handler(
    State(state): State<Arc<AppState>>,
    Json(body): Json<Value>,
) -> Result<impl IntoResponse, AppError> {
    let user: NewUser = parse(body)?;
    user.validate()?;

    if state
        .storage
        .get_user_by_username(&user.username)
        .await
        .map_err(AppError::internal("Failed to create user"))?
        .is_some()
    {
        return Err(AppError::Conflict("Username already exists"));
    }
    if state
        .storage
        .get_user_by_email(&user.email)
        .await
        .map_err(AppError::internal("Failed to create user"))?
        .is_some()
    {
        return Err(AppError::Conflict("Email already exists"));
    }

    let created = state
        .storage
        .create_user(user)
        .await
        .map_err(AppError::internal("Failed to create user"))?;
    Ok((StatusCode::CREATED, Json(created)))
}

#[derive(Deserialize)]
pub struct LoginRequest {
    username: Option<String>,
    password: Option<String>,
}

pub async fn login_handler(
    State(state): State<Arc<AppState>>,
    Json(body): Json<LoginRequest>,
) -> Result<Json<Value>, AppError> {
    let (username, password) = match (body.username, body.password) {
        (Some(username), Some(password)) if !username.is_empty() && !password.is_empty() => {
            (username, password)
        }
        _ => {
            return Err(AppError::Validation(
                "Username and password are required".to_string(),
            ));
        }
    };

    let user = state
        .storage
        .get_user_by_username(&username)
        .await
        .map_err(AppError::internal("Login failed"))?;

    // TODO: hash passwords; this is a plaintext comparison.
    match user {
        Some(user) if user.password == password => Ok(Json(json!({
            "id": user.id,
            "username": user.username,
            "email": user.email,
        }))),
        _ => Err(AppError::Unauthorized),
    }
}

// --- dietary preferences ---

pub async fn list_dietary_preferences_handler(
    State(state): State<Arc<AppState>>,
    PathUserId(user_id): PathUserId,
) -> Result<impl IntoResponse, AppError> {
    let preferences = state
        .storage
        .dietary_preferences(user_id)
        .await
        .map_err(AppError::internal("Failed to fetch dietary preferences"))?;
    Ok(Json(preferences))
}

pub async fn add_dietary_preference_handler(
    State(state): State<Arc<AppState>>,
    Json(body): Json<Value>,
) -> Result<impl IntoResponse, AppError> {
    let pref: NewDietaryPreference = parse(body)?;
    pref.validate()?;
    let created = state
        .storage
        .add_dietary_preference(pref)
        .await
        .map_err(AppError::internal("Failed to add dietary preference"))?;
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn remove_dietary_preference_handler(
    State(state): State<Arc<AppState>>,
    PathId(id): PathId,
) -> Result<impl IntoResponse, AppError> {
    state
        .storage
        .remove_dietary_preference(id)
        .await
        .map_err(AppError::internal("Failed to remove dietary preference"))?;
    Ok(StatusCode::NO_CONTENT)
}

// --- flavor preferences ---

pub async fn list_flavor_preferences_handler(
    State(state): State<Arc<AppState>>,
    PathUserId(user_id): PathUserId,
) -> Result<impl IntoResponse, AppError> {
    let preferences = state
        .storage
        .flavor_preferences(user_id)
        .await
        .map_err(AppError::internal("Failed to fetch flavor preferences"))?;
    Ok(Json(preferences))
}

pub async fn add_flavor_preference_handler(
    State(state): State<Arc<AppState>>,
    Json(body): Json<Value>,
) -> Result<impl IntoResponse, AppError> {
    let pref: NewFlavorPreference = parse(body)?;
    pref.validate()?;
    let created = state
        .storage
        .add_flavor_preference(pref)
        .await
        .map_err(AppError::internal("Failed to add flavor preference"))?;
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn update_flavor_preference_handler(
    State(state): State<Arc<AppState>>,
    PathId(id): PathId,
    Json(body): Json<Value>,
) -> Result<impl IntoResponse, AppError> {
    let level = match body.get("preference_level").and_then(Value::as_i64) {
        Some(level) if (0..=100).contains(&level) => level as i32,
        _ => {
            return Err(AppError::Validation(
                "Preference level must be a number between 0 and 100".to_string(),
            ));
        }
    };

    let updated = state
        .storage
        .update_flavor_preference(id, level)
        .await
        .map_err(AppError::internal("Failed to update flavor preference"))?
        .ok_or(AppError::NotFound("Flavor preference not found"))?;
    Ok(Json(updated))
}

// --- cuisine preferences ---

pub async fn list_cuisine_preferences_handler(
    State(state): State<Arc<AppState>>,
    PathUserId(user_id): PathUserId,
) -> Result<impl IntoResponse, AppError> {
    let preferences = state
        .storage
        .cuisine_preferences(user_id)
        .await
        .map_err(AppError::internal("Failed to fetch cuisine preferences"))?;
    Ok(Json(preferences))
}

pub async fn add_cuisine_preference_handler(
    State(state): State<Arc<AppState>>,
    Json(body): Json<Value>,
) -> Result<impl IntoResponse, AppError> {
    let pref: NewCuisinePreference = parse(body)?;
    pref.validate()?;
    let created = state
        .storage
        .add_cuisine_preference(pref)
        .await
        .map_err(AppError::internal("Failed to add cuisine preference"))?;
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn remove_cuisine_preference_handler(
    State(state): State<Arc<AppState>>,
    PathId(id): PathId,
) -> Result<impl IntoResponse, AppError> {
    state
        .storage
        .remove_cuisine_preference(id)
        .await
        .map_err(AppError::internal("Failed to remove cuisine preference"))?;
    Ok(StatusCode::NO_CONTENT)
}

// --- ingredients ---

#[derive(Deserialize)]
pub struct IngredientQuery {
    q: Option<String>,
}

pub async fn list_ingredients_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<IngredientQuery>,
) -> Result<impl IntoResponse, AppError> {
    let ingredients = match params.q {
        Some(query) if !query.is_empty() => state.storage.search_ingredients(&query).await,
        _ => state.storage.all_ingredients().await,
    }
    .map_err(AppError::internal("Failed to fetch ingredients"))?;
    Ok(Json(ingredients))
}

pub async fn get_ingredient_handler(
    State(state): State<Arc<AppState>>,
    PathId(id): PathId,
) -> Result<impl IntoResponse, AppError> {
    let ingredient = state
        .storage
        .get_ingredient(id)
        .await
        .map_err(AppError::internal("Failed to fetch ingredient"))?
        .ok_or(AppError::NotFound("Ingredient not found"))?;
    Ok(Json(ingredient))
}

pub async fn create_ingredient_handler(
    State(state): State<Arc<AppState>>,
    Json(body): Json<Value>,
) -> Result<impl IntoResponse, AppError> {
    let ingredient: NewIngredient = parse(body)?;
    ingredient.validate()?;

    if state
        .storage
        .get_ingredient_by_name(&ingredient.name)
        .await
        .map_err(AppError::internal("Failed to create ingredient"))?
        .is_some()
    {
        return Err(AppError::Conflict("Ingredient already exists"));
    }

    let created = state
        .storage
        .create_ingredient(ingredient)
        .await
        .map_err(AppError::internal("Failed to create ingredient"))?;
    Ok((StatusCode::CREATED, Json(created)))
}

// --- pairings ---

#[derive(Serialize)]
struct EnrichedPairing {
    #[serde(flatten)]
    pairing: Pairing,
    ingredient1_name: String,
    ingredient2_name: String,
}

pub async fn list_pairings_handler(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, AppError> {
    let failed = || AppError::internal::<StorageError>("Failed to fetch pairings");
    let pairings = state.storage.all_pairings().await.map_err(failed())?;

    let mut enriched = Vec::with_capacity(pairings.len());
    for pairing in pairings {
        let name = |ingredient: Option<Ingredient>| {
            ingredient.map_or_else(|| "Unknown".to_string(), |i| i.name)
        };
        let ingredient1 = state
            .storage
            .get_ingredient(pairing.ingredient1_id)
            .await
            .map_err(failed())?;
        let ingredient2 = state
            .storage
            .get_ingredient(pairing.ingredient2_id)
            .await
            .map_err(failed())?;
        enriched.push(EnrichedPairing {
            ingredient1_name: name(ingredient1),
            ingredient2_name: name(ingredient2),
            pairing,
        });
    }
    Ok(Json(enriched))
}

#[derive(Serialize)]
struct IngredientPairing {
    #[serde(flatten)]
    pairing: Pairing,
    paired_ingredient_id: i64,
    paired_ingredient_name: String,
}

pub async fn ingredient_pairings_handler(
    State(state): State<Arc<AppState>>,
    PathId(id): PathId,
) -> Result<impl IntoResponse, AppError> {
    let failed = || AppError::internal::<StorageError>("Failed to fetch pairings for ingredient");
    state
        .storage
        .get_ingredient(id)
        .await
        .map_err(failed())?
        .ok_or(AppError::NotFound("Ingredient not found"))?;

    let pairings = state
        .storage
        .pairings_for_ingredient(id)
        .await
        .map_err(failed())?;

    let mut enriched = Vec::with_capacity(pairings.len());
    for pairing in pairings {
        // The requested ingredient can sit on either side of the pair.
        let paired_ingredient_id = if pairing.ingredient1_id == id {
            pairing.ingredient2_id
        } else {
            pairing.ingredient1_id
        };
        let paired_ingredient_name = state
            .storage
            .get_ingredient(paired_ingredient_id)
            .await
            .map_err(failed())?
            .map_or_else(|| "Unknown".to_string(), |i| i.name);
        enriched.push(IngredientPairing {
            pairing,
            paired_ingredient_id,
            paired_ingredient_name,
        });
    }
    Ok(Json(enriched))
}

// --- kitchen inventory ---

pub async fn list_user_ingredients_handler(
    State(state): State<Arc<AppState>>,
    PathUserId(user_id): PathUserId,
) -> Result<impl IntoResponse, AppError> {
    let items = state
        .storage
        .user_ingredients(user_id)
        .await
        .map_err(AppError::internal("Failed to fetch user ingredients"))?;
    Ok(Json(items))
}

pub async fn add_user_ingredient_handler(
    State(state): State<Arc<AppState>>,
    Json(body): Json<Value>,
) -> Result<impl IntoResponse, AppError> {
    let item: NewUserIngredient = parse(body)?;
    let created = state
        .storage
        .add_user_ingredient(item)
        .await
        .map_err(AppError::internal("Failed to add user ingredient"))?;
    Ok((StatusCode::CREATED, Json(created)))
}

#[derive(Deserialize)]
pub struct UpdateUserIngredientRequest {
    quantity: String,
    expiry_date: Option<chrono::DateTime<chrono::Utc>>,
}

pub async fn update_user_ingredient_handler(
    State(state): State<Arc<AppState>>,
    PathId(id): PathId,
    Json(body): Json<Value>,
) -> Result<impl IntoResponse, AppError> {
    let update: UpdateUserIngredientRequest = parse(body)?;
    let updated = state
        .storage
        .update_user_ingredient(id, update.quantity, update.expiry_date)
        .await
        .map_err(AppError::internal("Failed to update user ingredient"))?
        .ok_or(AppError::NotFound("User ingredient not found"))?;
    Ok(Json(updated))
}

pub async fn remove_user_ingredient_handler(
    State(state): State<Arc<AppState>>,
    PathId(id): PathId,
) -> Result<impl IntoResponse, AppError> {
    state
        .storage
        .remove_user_ingredient(id)
        .await
        .map_err(AppError::internal("Failed to remove user ingredient"))?;
    Ok(StatusCode::NO_CONTENT)
}

// --- AI endpoints ---

/// The slice of the identification result the server acts on; the full
/// result is still returned to the client untouched.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct IdentifiedIngredients {
    #[serde(default)]
    identified_ingredients: Vec<IdentifiedIngredient>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct IdentifiedIngredient {
    name: String,
    flavor_profile: FlavorProfile,
    primary_taste: String,
}

pub async fn identify_ingredients_handler(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<Value>, AppError> {
    let mut image = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| AppError::Validation(err.to_string()))?
    {
        if field.name() == Some("image") {
            let is_image = field
                .content_type()
                .is_some_and(|content_type| content_type.starts_with("image/"));
            if !is_image {
                return Err(AppError::Validation(
                    "Uploaded file must be an image".to_string(),
                ));
            }
            image = Some(
                field
                    .bytes()
                    .await
                    .map_err(|err| AppError::Validation(err.to_string()))?,
            );
            break;
        }
    }
    let image = image.ok_or_else(|| AppError::Validation("No image file provided".to_string()))?;

    let result = state
        .ai
        .identify_ingredients(&image)
        .await
        .map_err(AppError::upstream("Failed to process image with AI"))?;

    // Newly recognized names become ingredient rows so later pairing and
    // search queries can see them. The existence check is case-insensitive.
    let identified: IdentifiedIngredients = serde_json::from_value(result.clone())
        .map_err(AppError::upstream("Failed to process image with AI"))?;
    for ingredient in identified.identified_ingredients {
        let existing = state
            .storage
            .get_ingredient_by_name(&ingredient.name)
            .await
            .map_err(AppError::internal("Server error processing image"))?;
        if existing.is_none() {
            info!("Adding newly identified ingredient: {}", ingredient.name);
            state
                .storage
                .create_ingredient(NewIngredient {
                    name: ingredient.name,
                    flavor_profile: ingredient.flavor_profile,
                    primary_taste: ingredient.primary_taste,
                    category: "Unknown".to_string(),
                })
                .await
                .map_err(AppError::internal("Server error processing image"))?;
        }
    }

    Ok(Json(result))
}

pub async fn pairing_recommendations_handler(
    State(state): State<Arc<AppState>>,
    Json(body): Json<Value>,
) -> Result<Json<Value>, AppError> {
    // Clients send ids as numbers or numeric strings; both are accepted.
    let ingredient_ids: Vec<i64> = match body.get("ingredientIds") {
        Some(Value::Array(entries)) if !entries.is_empty() => entries
            .iter()
            .filter_map(|entry| match entry {
                Value::Number(n) => n.as_i64(),
                Value::String(s) => s.parse().ok(),
                _ => None,
            })
            .collect(),
        _ => {
            return Err(AppError::Validation(
                "Ingredient IDs array is required".to_string(),
            ));
        }
    };

    // Unresolvable ids are dropped rather than failing the whole request.
    let mut names = Vec::new();
    for id in ingredient_ids {
        if let Some(ingredient) = state
            .storage
            .get_ingredient(id)
            .await
            .map_err(AppError::internal("Failed to process pairing recommendations"))?
        {
            names.push(ingredient.name);
        }
    }
    if names.is_empty() {
        return Err(AppError::Validation("No valid ingredients found".to_string()));
    }

    let result = state
        .ai
        .pairing_recommendations(&names.join(", "))
        .await
        .map_err(AppError::upstream("Failed to get pairing recommendations"))?;
    Ok(Json(result))
}
