use crate::models::{NewUser, Restaurant, RestaurantInput, Review, ReviewInput, User};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgPool;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;
use uuid::Uuid;

/// RepoError
///
/// Failures surfaced by the persistence layer. `Conflict` carries a message fit
/// for users (duplicate username or email); everything else is infrastructure.
#[derive(Error, Debug)]
pub enum RepoError {
    #[error("{0}")]
    Conflict(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository Trait
///
/// The abstract contract for all persistence operations. Handlers only ever
/// talk to `Arc<dyn Repository>`, so the Postgres implementation and the
/// in-memory implementation are interchangeable.
///
/// **Send + Sync + async_trait** make the trait object shareable across Axum's
/// asynchronous task boundaries.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Restaurants ---
    // All restaurants, oldest first.
    async fn list_restaurants(&self) -> RepoResult<Vec<Restaurant>>;
    async fn get_restaurant(&self, id: Uuid) -> RepoResult<Option<Restaurant>>;
    async fn create_restaurant(&self, input: RestaurantInput, author: Uuid) -> RepoResult<Restaurant>;
    // Full-field replace. `author` and `reviews` are left untouched.
    async fn update_restaurant(&self, id: Uuid, input: RestaurantInput) -> RepoResult<Option<Restaurant>>;
    // Deletes the restaurant and every review it references.
    async fn delete_restaurant(&self, id: Uuid) -> RepoResult<Option<Restaurant>>;
    // Deletes every restaurant and every referenced review. Used by seeding.
    async fn clear_restaurants(&self) -> RepoResult<u64>;

    // --- Reviews ---
    // Existing reviews among `ids`, in the order of `ids`. Dangling ids are skipped.
    async fn get_reviews(&self, ids: &[Uuid]) -> RepoResult<Vec<Review>>;
    // Creates the review and appends its id to the restaurant's list.
    // Returns None (and stores nothing) if the restaurant does not exist.
    async fn add_review(&self, restaurant_id: Uuid, input: ReviewInput) -> RepoResult<Option<Review>>;
    // Pulls the id from the restaurant's list, then deletes the review.
    // Returns false (and changes nothing) unless the restaurant lists the review.
    async fn delete_review(&self, restaurant_id: Uuid, review_id: Uuid) -> RepoResult<bool>;

    // --- Users ---
    async fn get_user(&self, id: Uuid) -> RepoResult<Option<User>>;
    async fn find_user_by_username(&self, username: &str) -> RepoResult<Option<User>>;
    // Fails with `RepoError::Conflict` on a duplicate username or email.
    async fn create_user(&self, user: NewUser) -> RepoResult<User>;
}

/// RepositoryState
///
/// The concrete type used to share the persistence layer across the application state.
pub type RepositoryState = Arc<dyn Repository>;

/// Restores the order of `ids` on a set of fetched reviews.
fn order_by_ids(ids: &[Uuid], reviews: Vec<Review>) -> Vec<Review> {
    let mut by_id: HashMap<Uuid, Review> = reviews.into_iter().map(|r| (r.id, r)).collect();
    ids.iter().filter_map(|id| by_id.remove(id)).collect()
}

fn duplicate_user_message(field: &str) -> String {
    format!("A user with the given {field} is already registered")
}

/// PostgresRepository
///
/// The `Repository` implementation backed by PostgreSQL. Restaurant review
/// lists live in a `UUID[]` column; multi-statement operations run in a single
/// transaction.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    /// Creates a new repository instance using the initialized connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Maps unique-constraint violations on `users` to a `Conflict`.
fn map_user_insert_error(e: sqlx::Error) -> RepoError {
    if let sqlx::Error::Database(db) = &e {
        if db.is_unique_violation() {
            let field = match db.constraint() {
                Some("users_email_key") => "email",
                _ => "username",
            };
            return RepoError::Conflict(duplicate_user_message(field));
        }
    }
    tracing::error!("create_user error: {:?}", e);
    RepoError::Database(e)
}

#[async_trait]
impl Repository for PostgresRepository {
    async fn list_restaurants(&self) -> RepoResult<Vec<Restaurant>> {
        let restaurants = sqlx::query_as::<_, Restaurant>(
            r#"SELECT id, title, location, image, price, description, reviews, author, created_at
               FROM restaurants
               ORDER BY created_at ASC"#,
        )
        .fetch_all(&self.pool)
        .await
        .inspect_err(|e| tracing::error!("list_restaurants error: {:?}", e))?;
        Ok(restaurants)
    }

    async fn get_restaurant(&self, id: Uuid) -> RepoResult<Option<Restaurant>> {
        let restaurant = sqlx::query_as::<_, Restaurant>(
            r#"SELECT id, title, location, image, price, description, reviews, author, created_at
               FROM restaurants
               WHERE id = $1"#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .inspect_err(|e| tracing::error!("get_restaurant error: {:?}", e))?;
        Ok(restaurant)
    }

    /// create_restaurant
    ///
    /// Inserts a new restaurant with an empty review list. `author` is only
    /// ever written here.
    async fn create_restaurant(&self, input: RestaurantInput, author: Uuid) -> RepoResult<Restaurant> {
        let restaurant = sqlx::query_as::<_, Restaurant>(
            r#"INSERT INTO restaurants (id, title, location, image, price, description, reviews, author, created_at)
               VALUES ($1, $2, $3, $4, $5, $6, '{}', $7, NOW())
               RETURNING id, title, location, image, price, description, reviews, author, created_at"#,
        )
        .bind(Uuid::new_v4())
        .bind(input.title)
        .bind(input.location)
        .bind(input.image)
        .bind(input.price)
        .bind(input.description)
        .bind(author)
        .fetch_one(&self.pool)
        .await
        .inspect_err(|e| tracing::error!("create_restaurant error: {:?}", e))?;
        Ok(restaurant)
    }

    async fn update_restaurant(&self, id: Uuid, input: RestaurantInput) -> RepoResult<Option<Restaurant>> {
        let restaurant = sqlx::query_as::<_, Restaurant>(
            r#"UPDATE restaurants
               SET title = $2, location = $3, image = $4, price = $5, description = $6
               WHERE id = $1
               RETURNING id, title, location, image, price, description, reviews, author, created_at"#,
        )
        .bind(id)
        .bind(input.title)
        .bind(input.location)
        .bind(input.image)
        .bind(input.price)
        .bind(input.description)
        .fetch_optional(&self.pool)
        .await
        .inspect_err(|e| tracing::error!("update_restaurant error: {:?}", e))?;
        Ok(restaurant)
    }

    /// delete_restaurant
    ///
    /// Deletes the restaurant and its referenced reviews in one transaction, so
    /// no review is orphaned by a failure between the two statements.
    async fn delete_restaurant(&self, id: Uuid) -> RepoResult<Option<Restaurant>> {
        let mut tx = self.pool.begin().await?;

        let deleted = sqlx::query_as::<_, Restaurant>(
            r#"DELETE FROM restaurants
               WHERE id = $1
               RETURNING id, title, location, image, price, description, reviews, author, created_at"#,
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await
        .inspect_err(|e| tracing::error!("delete_restaurant error: {:?}", e))?;

        if let Some(restaurant) = &deleted {
            let removed = sqlx::query("DELETE FROM reviews WHERE id = ANY($1)")
                .bind(&restaurant.reviews)
                .execute(&mut *tx)
                .await
                .inspect_err(|e| tracing::error!("delete_restaurant cascade error: {:?}", e))?;
            tracing::debug!(
                restaurant = %restaurant.id,
                reviews = removed.rows_affected(),
                "cascaded review deletion"
            );
        }

        tx.commit().await?;
        Ok(deleted)
    }

    async fn clear_restaurants(&self) -> RepoResult<u64> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM reviews WHERE id IN (SELECT UNNEST(reviews) FROM restaurants)")
            .execute(&mut *tx)
            .await?;
        let removed = sqlx::query("DELETE FROM restaurants").execute(&mut *tx).await?;
        tx.commit().await?;
        Ok(removed.rows_affected())
    }

    async fn get_reviews(&self, ids: &[Uuid]) -> RepoResult<Vec<Review>> {
        if ids.is_empty() {
            return Ok(vec![]);
        }
        let reviews = sqlx::query_as::<_, Review>(
            "SELECT id, body, rating, created_at FROM reviews WHERE id = ANY($1)",
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await
        .inspect_err(|e| tracing::error!("get_reviews error: {:?}", e))?;
        Ok(order_by_ids(ids, reviews))
    }

    /// add_review
    ///
    /// Inserts the review and appends its id to the parent's list in one
    /// transaction. Rolls back if the parent does not exist.
    async fn add_review(&self, restaurant_id: Uuid, input: ReviewInput) -> RepoResult<Option<Review>> {
        let mut tx = self.pool.begin().await?;

        let review = sqlx::query_as::<_, Review>(
            r#"INSERT INTO reviews (id, body, rating, created_at)
               VALUES ($1, $2, $3, NOW())
               RETURNING id, body, rating, created_at"#,
        )
        .bind(Uuid::new_v4())
        .bind(input.body)
        .bind(input.rating)
        .fetch_one(&mut *tx)
        .await
        .inspect_err(|e| tracing::error!("add_review error: {:?}", e))?;

        let appended = sqlx::query(
            "UPDATE restaurants SET reviews = array_append(reviews, $2) WHERE id = $1",
        )
        .bind(restaurant_id)
        .bind(review.id)
        .execute(&mut *tx)
        .await?;

        if appended.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(None);
        }

        tx.commit().await?;
        Ok(Some(review))
    }

    /// delete_review
    ///
    /// Removes the id from the parent's list, then the review itself, in one
    /// transaction. Rolls back if the parent does not list the review.
    async fn delete_review(&self, restaurant_id: Uuid, review_id: Uuid) -> RepoResult<bool> {
        let mut tx = self.pool.begin().await?;

        let pulled = sqlx::query(
            "UPDATE restaurants SET reviews = array_remove(reviews, $2) WHERE id = $1 AND $2 = ANY(reviews)",
        )
        .bind(restaurant_id)
        .bind(review_id)
        .execute(&mut *tx)
        .await
        .inspect_err(|e| tracing::error!("delete_review pull error: {:?}", e))?;

        if pulled.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        sqlx::query("DELETE FROM reviews WHERE id = $1")
            .bind(review_id)
            .execute(&mut *tx)
            .await
            .inspect_err(|e| tracing::error!("delete_review error: {:?}", e))?;

        tx.commit().await?;
        Ok(true)
    }

    async fn get_user(&self, id: Uuid) -> RepoResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, username, email, password_hash, created_at FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn find_user_by_username(&self, username: &str) -> RepoResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, username, email, password_hash, created_at FROM users WHERE username = $1",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn create_user(&self, user: NewUser) -> RepoResult<User> {
        sqlx::query_as::<_, User>(
            r#"INSERT INTO users (id, username, email, password_hash, created_at)
               VALUES ($1, $2, $3, $4, NOW())
               RETURNING id, username, email, password_hash, created_at"#,
        )
        .bind(Uuid::new_v4())
        .bind(user.username)
        .bind(user.email)
        .bind(user.password_hash)
        .fetch_one(&self.pool)
        .await
        .map_err(map_user_insert_error)
    }
}

// --- In-Memory Implementation ---

#[derive(Default)]
struct MemoryStore {
    // Insertion order doubles as listing order.
    restaurants: Vec<Restaurant>,
    reviews: HashMap<Uuid, Review>,
    users: Vec<User>,
}

/// InMemoryRepository
///
/// A `Repository` held entirely in process memory. Every operation runs under
/// one write lock, so the multi-step operations are atomic. Used by the
/// integration tests and for running the server without a database.
#[derive(Default)]
pub struct InMemoryRepository {
    store: RwLock<MemoryStore>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Repository for InMemoryRepository {
    async fn list_restaurants(&self) -> RepoResult<Vec<Restaurant>> {
        Ok(self.store.read().await.restaurants.clone())
    }

    async fn get_restaurant(&self, id: Uuid) -> RepoResult<Option<Restaurant>> {
        let store = self.store.read().await;
        Ok(store.restaurants.iter().find(|r| r.id == id).cloned())
    }

    async fn create_restaurant(&self, input: RestaurantInput, author: Uuid) -> RepoResult<Restaurant> {
        let restaurant = Restaurant {
            id: Uuid::new_v4(),
            title: input.title,
            location: input.location,
            image: input.image,
            price: input.price,
            description: input.description,
            reviews: vec![],
            author,
            created_at: Utc::now(),
        };
        self.store.write().await.restaurants.push(restaurant.clone());
        Ok(restaurant)
    }

    async fn update_restaurant(&self, id: Uuid, input: RestaurantInput) -> RepoResult<Option<Restaurant>> {
        let mut store = self.store.write().await;
        let Some(restaurant) = store.restaurants.iter_mut().find(|r| r.id == id) else {
            return Ok(None);
        };
        restaurant.title = input.title;
        restaurant.location = input.location;
        restaurant.image = input.image;
        restaurant.price = input.price;
        restaurant.description = input.description;
        Ok(Some(restaurant.clone()))
    }

    async fn delete_restaurant(&self, id: Uuid) -> RepoResult<Option<Restaurant>> {
        let mut store = self.store.write().await;
        let Some(position) = store.restaurants.iter().position(|r| r.id == id) else {
            return Ok(None);
        };
        let restaurant = store.restaurants.remove(position);
        for review_id in &restaurant.reviews {
            store.reviews.remove(review_id);
        }
        Ok(Some(restaurant))
    }

    async fn clear_restaurants(&self) -> RepoResult<u64> {
        let mut store = self.store.write().await;
        let removed = store.restaurants.len() as u64;
        let restaurants = std::mem::take(&mut store.restaurants);
        for review_id in restaurants.iter().flat_map(|r| r.reviews.iter()) {
            store.reviews.remove(review_id);
        }
        Ok(removed)
    }

    async fn get_reviews(&self, ids: &[Uuid]) -> RepoResult<Vec<Review>> {
        let store = self.store.read().await;
        Ok(ids
            .iter()
            .filter_map(|id| store.reviews.get(id).cloned())
            .collect())
    }

    async fn add_review(&self, restaurant_id: Uuid, input: ReviewInput) -> RepoResult<Option<Review>> {
        let mut store = self.store.write().await;
        let review = Review {
            id: Uuid::new_v4(),
            body: input.body,
            rating: input.rating,
            created_at: Utc::now(),
        };
        let Some(restaurant) = store.restaurants.iter_mut().find(|r| r.id == restaurant_id) else {
            return Ok(None);
        };
        restaurant.reviews.push(review.id);
        store.reviews.insert(review.id, review.clone());
        Ok(Some(review))
    }

    async fn delete_review(&self, restaurant_id: Uuid, review_id: Uuid) -> RepoResult<bool> {
        let mut store = self.store.write().await;
        let Some(restaurant) = store.restaurants.iter_mut().find(|r| r.id == restaurant_id) else {
            return Ok(false);
        };
        let listed = restaurant.reviews.len();
        restaurant.reviews.retain(|id| *id != review_id);
        if restaurant.reviews.len() == listed {
            return Ok(false);
        }
        store.reviews.remove(&review_id);
        Ok(true)
    }

    async fn get_user(&self, id: Uuid) -> RepoResult<Option<User>> {
        let store = self.store.read().await;
        Ok(store.users.iter().find(|u| u.id == id).cloned())
    }

    async fn find_user_by_username(&self, username: &str) -> RepoResult<Option<User>> {
        let store = self.store.read().await;
        Ok(store.users.iter().find(|u| u.username == username).cloned())
    }

    async fn create_user(&self, user: NewUser) -> RepoResult<User> {
        let mut store = self.store.write().await;
        if store.users.iter().any(|u| u.username == user.username) {
            return Err(RepoError::Conflict(duplicate_user_message("username")));
        }
        if store.users.iter().any(|u| u.email == user.email) {
            return Err(RepoError::Conflict(duplicate_user_message("email")));
        }
        let created = User {
            id: Uuid::new_v4(),
            username: user.username,
            email: user.email,
            password_hash: user.password_hash,
            created_at: Utc::now(),
        };
        store.users.push(created.clone());
        Ok(created)
    }
}
