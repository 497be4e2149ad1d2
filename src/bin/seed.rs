use fake::{
    Fake,
    faker::address::en::{CityName, StateAbbr},
    faker::lorem::en::Paragraph,
};
use resto_find::{
    config::AppConfig,
    models::RestaurantInput,
    repository::{PostgresRepository, Repository},
};
use sqlx::postgres::PgPoolOptions;

const RESTAURANT_COUNT: usize = 50;

const PREFIXES: &[&str] = &[
    "Golden", "Spicy", "Rustic", "Little", "Royal", "Midnight", "Smoky", "Urban", "Coastal",
    "Humble",
];

const SUFFIXES: &[&str] = &[
    "Kitchen", "Bistro", "Diner", "Tandoor", "Grill", "Canteen", "Eatery", "Dhaba", "Table",
    "Pantry",
];

fn pick<'a>(items: &[&'a str]) -> &'a str {
    items[(0..items.len()).fake::<usize>()]
}

/// seed
///
/// Clears every restaurant (and its reviews) and inserts sample restaurants
/// authored by the existing user named in `SEED_AUTHOR`.
#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt().init();

    let config = AppConfig::load();
    let author_name =
        std::env::var("SEED_AUTHOR").expect("FATAL: SEED_AUTHOR (an existing username) must be set");

    let pool = PgPoolOptions::new()
        .max_connections(1)
        .connect(&config.db_url)
        .await
        .expect("FATAL: Failed to connect to Postgres. Check DATABASE_URL.");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("FATAL: Failed to run database migrations.");

    let repo = PostgresRepository::new(pool);

    let author = repo
        .find_user_by_username(&author_name)
        .await
        .expect("FATAL: Failed to look up the seed author")
        .unwrap_or_else(|| panic!("FATAL: no user named {author_name:?}; register it first"));

    let removed = repo
        .clear_restaurants()
        .await
        .expect("FATAL: Failed to clear restaurants");
    tracing::info!("removed {} existing restaurants", removed);

    for n in 0..RESTAURANT_COUNT {
        let city: String = CityName().fake();
        let state: String = StateAbbr().fake();
        let price: i32 = (100..1000).fake();

        let input = RestaurantInput {
            title: format!("{} {}", pick(PREFIXES), pick(SUFFIXES)),
            location: format!("{city}, {state}"),
            image: Some(format!("https://picsum.photos/seed/resto-{n}/800/600")),
            price: f64::from(price),
            description: Paragraph(2..4).fake(),
        };

        repo.create_restaurant(input, author.id)
            .await
            .expect("FATAL: Failed to insert a seed restaurant");
    }

    tracing::info!("seeded {} restaurants for {}", RESTAURANT_COUNT, author.username);
}
