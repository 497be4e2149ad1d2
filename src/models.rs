use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use ts_rs::TS;
use utoipa::ToSchema;
use uuid::Uuid;

// --- Core Application Schemas (Mapped to Database) ---

/// Restaurant
///
/// A restaurant listing from the `restaurants` table.
/// `reviews` is an ordered list of Review ids (creation order), stored as a
/// `UUID[]` column. `author` is fixed at creation time.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default, PartialEq)]
#[ts(export)]
pub struct Restaurant {
    pub id: Uuid,
    pub title: String,
    pub location: String,
    pub image: Option<String>,
    pub price: f64,
    pub description: String,
    pub reviews: Vec<Uuid>,
    // FK to users.id (Owner).
    pub author: Uuid,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

/// Review
///
/// A review record from the `reviews` table. Owned by exactly one restaurant
/// through that restaurant's `reviews` list; there is no back-reference.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default, PartialEq)]
#[ts(export)]
pub struct Review {
    pub id: Uuid,
    pub body: String,
    pub rating: i32,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

/// User
///
/// A registered account from the `users` table. The password is only ever
/// stored as an Argon2id PHC string and is never serialized.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, Default)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

/// UserProfile
///
/// The public face of a `User` handed to the presentation layer.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default, PartialEq)]
#[ts(export)]
pub struct UserProfile {
    pub id: Uuid,
    pub username: String,
    pub email: String,
}

impl From<User> for UserProfile {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
        }
    }
}

/// --- Validated Inputs ---

/// RestaurantInput
///
/// A restaurant submission that passed validation. Used for both creation and
/// the full-field replace performed by the update endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Default, PartialEq)]
pub struct RestaurantInput {
    pub title: String,
    pub location: String,
    pub image: Option<String>,
    pub price: f64,
    pub description: String,
}

/// ReviewInput
///
/// A review submission that passed validation (`rating` within 1..=5).
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Default, PartialEq)]
pub struct ReviewInput {
    pub body: String,
    pub rating: i32,
}

/// NewUser
///
/// Insert payload for the `users` table. Built by the credentials layer after
/// hashing; never constructed from raw request data.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
}

/// --- Request Payloads (Forms) ---

/// RegisterForm
///
/// Urlencoded body of `POST /register`. Missing fields deserialize as empty and
/// are reported back through a flash message.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Default)]
pub struct RegisterForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

/// LoginForm
///
/// Urlencoded body of `POST /login`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Default)]
pub struct LoginForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

/// --- View Schemas (Output) ---

/// RestaurantDetails
///
/// Data bag of the detail page: the restaurant with its reviews populated in
/// list order and its author resolved.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct RestaurantDetails {
    pub restaurant: Restaurant,
    pub reviews: Vec<Review>,
    pub author: Option<UserProfile>,
}
