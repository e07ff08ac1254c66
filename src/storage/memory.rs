//! Map-backed store for development and tests.
//!
//! Not safe for multi-process use and makes no atomicity promises across
//! calls; each operation takes the mutex once. Pairings keep the row as
//! inserted but are indexed by the canonical `(min, max)` id pair so the
//! symmetric lookup is a single map hit instead of a scan.

use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::{Storage, StorageResult};
use crate::schema::{
    CuisinePreference, DietaryPreference, FlavorPreference, FlavorProfile, Ingredient,
    NewCuisinePreference, NewDietaryPreference, NewFlavorPreference, NewIngredient, NewPairing,
    NewUser, NewUserIngredient, Pairing, User, UserIngredient,
};

fn pair_key(a: i64, b: i64) -> (i64, i64) {
    if a <= b { (a, b) } else { (b, a) }
}

#[derive(Default)]
struct Tables {
    users: BTreeMap<i64, User>,
    dietary_preferences: BTreeMap<i64, DietaryPreference>,
    flavor_preferences: BTreeMap<i64, FlavorPreference>,
    cuisine_preferences: BTreeMap<i64, CuisinePreference>,
    ingredients: BTreeMap<i64, Ingredient>,
    pairings: BTreeMap<i64, Pairing>,
    pairing_index: BTreeMap<(i64, i64), i64>,
    user_ingredients: BTreeMap<i64, UserIngredient>,

    next_user_id: i64,
    next_dietary_id: i64,
    next_flavor_id: i64,
    next_cuisine_id: i64,
    next_ingredient_id: i64,
    next_pairing_id: i64,
    next_user_ingredient_id: i64,
}

impl Tables {
    fn empty() -> Self {
        Self {
            next_user_id: 1,
            next_dietary_id: 1,
            next_flavor_id: 1,
            next_cuisine_id: 1,
            next_ingredient_id: 1,
            next_pairing_id: 1,
            next_user_ingredient_id: 1,
            ..Self::default()
        }
    }

    fn insert_ingredient(&mut self, ingredient: NewIngredient) -> Ingredient {
        let id = self.next_ingredient_id;
        self.next_ingredient_id += 1;
        let row = Ingredient {
            id,
            name: ingredient.name,
            flavor_profile: ingredient.flavor_profile,
            primary_taste: ingredient.primary_taste,
            category: ingredient.category,
        };
        self.ingredients.insert(id, row.clone());
        row
    }

    fn insert_pairing(&mut self, pairing: NewPairing) -> Pairing {
        let id = self.next_pairing_id;
        self.next_pairing_id += 1;
        let row = Pairing {
            id,
            ingredient1_id: pairing.ingredient1_id,
            ingredient2_id: pairing.ingredient2_id,
            affinity_score: pairing.affinity_score,
            pairing_notes: pairing.pairing_notes,
        };
        self.pairing_index
            .insert(pair_key(row.ingredient1_id, row.ingredient2_id), id);
        self.pairings.insert(id, row.clone());
        row
    }
}

pub struct MemStorage {
    inner: Mutex<Tables>,
}

impl MemStorage {
    /// An empty store. Tests start from here.
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Tables::empty()),
        }
    }

    /// The demo store: eight ingredients and five classic pairings.
    pub fn seeded() -> Self {
        let store = Self::new();
        {
            let mut tables = store.inner.lock().unwrap();
            let profile = |sweet, salty, sour, bitter, umami| FlavorProfile {
                sweet,
                salty,
                sour,
                bitter,
                umami,
            };
            let seed = [
                ("Tomato", profile(65, 10, 80, 5, 60), "Sweet, Acidic, Umami", "Vegetable"),
                ("Basil", profile(30, 5, 5, 20, 10), "Aromatic, Sweet, Peppery", "Herb"),
                ("Bell Pepper", profile(70, 5, 20, 5, 10), "Sweet, Crisp, Slightly Tangy", "Vegetable"),
                ("Lemon", profile(20, 0, 90, 10, 0), "Sour, Bright, Citrusy", "Fruit"),
                ("Garlic", profile(30, 10, 5, 20, 80), "Pungent, Savory", "Vegetable"),
                ("Chocolate", profile(80, 5, 10, 60, 20), "Sweet, Bitter, Rich", "Confectionery"),
                ("Berries", profile(70, 0, 60, 10, 0), "Sweet, Tart", "Fruit"),
                ("Olive Oil", profile(10, 5, 5, 30, 40), "Fruity, Peppery, Rich", "Oil"),
            ];
            for (name, flavor_profile, primary_taste, category) in seed {
                tables.insert_ingredient(NewIngredient {
                    name: name.to_string(),
                    flavor_profile,
                    primary_taste: primary_taste.to_string(),
                    category: category.to_string(),
                });
            }

            let (tomato, basil, lemon, garlic, chocolate, berries, olive_oil) =
                (1, 2, 4, 5, 6, 7, 8);
            let pairings = [
                (tomato, basil, 95, "The bright acidity of tomatoes perfectly complements the aromatic, slightly peppery notes of fresh basil."),
                (lemon, garlic, 85, "Lemon's brightness cuts through garlic's pungency while enhancing its savory qualities."),
                (chocolate, berries, 90, "The rich, bitter notes of chocolate balance perfectly with the sweet-tart flavor profile of fresh berries."),
                (tomato, olive_oil, 88, "Tomato's acidity is beautifully balanced by the rich, fruity notes of quality olive oil."),
                (basil, olive_oil, 92, "Basil's aromatic qualities are enhanced and preserved by the subtle richness of olive oil."),
            ];
            for (ingredient1_id, ingredient2_id, affinity_score, notes) in pairings {
                tables.insert_pairing(NewPairing {
                    ingredient1_id,
                    ingredient2_id,
                    affinity_score,
                    pairing_notes: Some(notes.to_string()),
                });
            }
        }
        store
    }
}

impl Default for MemStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Storage for MemStorage {
    async fn get_user(&self, id: i64) -> StorageResult<Option<User>> {
        Ok(self.inner.lock().unwrap().users.get(&id).cloned())
    }

    async fn get_user_by_username(&self, username: &str) -> StorageResult<Option<User>> {
        let tables = self.inner.lock().unwrap();
        Ok(tables
            .users
            .values()
            .find(|user| user.username == username)
            .cloned())
    }

    async fn get_user_by_email(&self, email: &str) -> StorageResult<Option<User>> {
        let tables = self.inner.lock().unwrap();
        Ok(tables
            .users
            .values()
            .find(|user| user.email == email)
            .cloned())
    }

    async fn create_user(&self, user: NewUser) -> StorageResult<User> {
        let mut tables = self.inner.lock().unwrap();
        let id = tables.next_user_id;
        tables.next_user_id += 1;
        let row = User {
            id,
            username: user.username,
            password: user.password,
            email: user.email,
            created_at: Utc::now(),
        };
        tables.users.insert(id, row.clone());
        Ok(row)
    }

    async fn dietary_preferences(&self, user_id: i64) -> StorageResult<Vec<DietaryPreference>> {
        let tables = self.inner.lock().unwrap();
        Ok(tables
            .dietary_preferences
            .values()
            .filter(|pref| pref.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn add_dietary_preference(
        &self,
        pref: NewDietaryPreference,
    ) -> StorageResult<DietaryPreference> {
        let mut tables = self.inner.lock().unwrap();
        let id = tables.next_dietary_id;
        tables.next_dietary_id += 1;
        let row = DietaryPreference {
            id,
            user_id: pref.user_id,
            preference_type: pref.preference_type,
        };
        tables.dietary_preferences.insert(id, row.clone());
        Ok(row)
    }

    async fn remove_dietary_preference(&self, id: i64) -> StorageResult<()> {
        self.inner.lock().unwrap().dietary_preferences.remove(&id);
        Ok(())
    }

    async fn flavor_preferences(&self, user_id: i64) -> StorageResult<Vec<FlavorPreference>> {
        let tables = self.inner.lock().unwrap();
        Ok(tables
            .flavor_preferences
            .values()
            .filter(|pref| pref.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn add_flavor_preference(
        &self,
        pref: NewFlavorPreference,
    ) -> StorageResult<FlavorPreference> {
        let mut tables = self.inner.lock().unwrap();
        let id = tables.next_flavor_id;
        tables.next_flavor_id += 1;
        let row = FlavorPreference {
            id,
            user_id: pref.user_id,
            flavor_type: pref.flavor_type,
            preference_level: pref.preference_level,
        };
        tables.flavor_preferences.insert(id, row.clone());
        Ok(row)
    }

    async fn update_flavor_preference(
        &self,
        id: i64,
        level: i32,
    ) -> StorageResult<Option<FlavorPreference>> {
        let mut tables = self.inner.lock().unwrap();
        Ok(tables.flavor_preferences.get_mut(&id).map(|pref| {
            pref.preference_level = level;
            pref.clone()
        }))
    }

    async fn cuisine_preferences(&self, user_id: i64) -> StorageResult<Vec<CuisinePreference>> {
        let tables = self.inner.lock().unwrap();
        Ok(tables
            .cuisine_preferences
            .values()
            .filter(|pref| pref.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn add_cuisine_preference(
        &self,
        pref: NewCuisinePreference,
    ) -> StorageResult<CuisinePreference> {
        let mut tables = self.inner.lock().unwrap();
        let id = tables.next_cuisine_id;
        tables.next_cuisine_id += 1;
        let row = CuisinePreference {
            id,
            user_id: pref.user_id,
            cuisine_type: pref.cuisine_type,
        };
        tables.cuisine_preferences.insert(id, row.clone());
        Ok(row)
    }

    async fn remove_cuisine_preference(&self, id: i64) -> StorageResult<()> {
        self.inner.lock().unwrap().cuisine_preferences.remove(&id);
        Ok(())
    }

    async fn get_ingredient(&self, id: i64) -> StorageResult<Option<Ingredient>> {
        Ok(self.inner.lock().unwrap().ingredients.get(&id).cloned())
    }

    async fn get_ingredient_by_name(&self, name: &str) -> StorageResult<Option<Ingredient>> {
        let tables = self.inner.lock().unwrap();
        Ok(tables
            .ingredients
            .values()
            .find(|ingredient| ingredient.name.eq_ignore_ascii_case(name))
            .cloned())
    }

    async fn all_ingredients(&self) -> StorageResult<Vec<Ingredient>> {
        Ok(self.inner.lock().unwrap().ingredients.values().cloned().collect())
    }

    async fn create_ingredient(&self, ingredient: NewIngredient) -> StorageResult<Ingredient> {
        Ok(self.inner.lock().unwrap().insert_ingredient(ingredient))
    }

    async fn search_ingredients(&self, query: &str) -> StorageResult<Vec<Ingredient>> {
        let needle = query.to_lowercase();
        let tables = self.inner.lock().unwrap();
        Ok(tables
            .ingredients
            .values()
            .filter(|ingredient| {
                ingredient.name.to_lowercase().contains(&needle)
                    || ingredient.category.to_lowercase().contains(&needle)
                    || ingredient.primary_taste.to_lowercase().contains(&needle)
            })
            .cloned()
            .collect())
    }

    async fn get_pairing(
        &self,
        ingredient1_id: i64,
        ingredient2_id: i64,
    ) -> StorageResult<Option<Pairing>> {
        let tables = self.inner.lock().unwrap();
        Ok(tables
            .pairing_index
            .get(&pair_key(ingredient1_id, ingredient2_id))
            .and_then(|id| tables.pairings.get(id))
            .cloned())
    }

    async fn all_pairings(&self) -> StorageResult<Vec<Pairing>> {
        Ok(self.inner.lock().unwrap().pairings.values().cloned().collect())
    }

    async fn create_pairing(&self, pairing: NewPairing) -> StorageResult<Pairing> {
        Ok(self.inner.lock().unwrap().insert_pairing(pairing))
    }

    async fn pairings_for_ingredient(&self, ingredient_id: i64) -> StorageResult<Vec<Pairing>> {
        let tables = self.inner.lock().unwrap();
        Ok(tables
            .pairings
            .values()
            .filter(|pairing| {
                pairing.ingredient1_id == ingredient_id || pairing.ingredient2_id == ingredient_id
            })
            .cloned()
            .collect())
    }

    async fn user_ingredients(&self, user_id: i64) -> StorageResult<Vec<UserIngredient>> {
        let tables = self.inner.lock().unwrap();
        Ok(tables
            .user_ingredients
            .values()
            .filter(|item| item.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn add_user_ingredient(&self, item: NewUserIngredient) -> StorageResult<UserIngredient> {
        let mut tables = self.inner.lock().unwrap();
        let id = tables.next_user_ingredient_id;
        tables.next_user_ingredient_id += 1;
        let row = UserIngredient {
            id,
            user_id: item.user_id,
            ingredient_id: item.ingredient_id,
            quantity: item.quantity,
            expiry_date: item.expiry_date,
        };
        tables.user_ingredients.insert(id, row.clone());
        Ok(row)
    }

    async fn remove_user_ingredient(&self, id: i64) -> StorageResult<()> {
        self.inner.lock().unwrap().user_ingredients.remove(&id);
        Ok(())
    }

    async fn update_user_ingredient(
        &self,
        id: i64,
        quantity: String,
        expiry_date: Option<DateTime<Utc>>,
    ) -> StorageResult<Option<UserIngredient>> {
        let mut tables = self.inner.lock().unwrap();
        Ok(tables.user_ingredients.get_mut(&id).map(|item| {
            item.quantity = Some(quantity);
            if let Some(expiry) = expiry_date {
                item.expiry_date = Some(expiry);
            }
            item.clone()
        }))
    }
}
