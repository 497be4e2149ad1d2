use fake::{
    Dummy, Fake, Faker,
    faker::{address::en::CityName, company::en::CompanyName, lorem::en::Paragraph},
};
use resto_find::{
    models::{User, UserProfile},
    validation::{validate_restaurant, validate_review},
};
use uuid::Uuid;

// --- Test Utilities ---

fn form(fields: &[(&str, &str)]) -> Vec<(String, String)> {
    fields
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn problems_of(result: Result<impl std::fmt::Debug, resto_find::validation::ValidationError>) -> Vec<String> {
    result.expect_err("submission should be rejected").problems
}

#[derive(Debug, Dummy)]
struct RestaurantSubmission {
    #[dummy(faker = "CompanyName()")]
    title: String,
    #[dummy(faker = "CityName()")]
    location: String,
    #[dummy(faker = "0..5000")]
    price: u32,
    #[dummy(faker = "Paragraph(1..3)")]
    description: String,
}

// --- Restaurant Submissions ---

#[test]
fn test_generated_restaurants_pass_validation() {
    for _ in 0..20 {
        let submission: RestaurantSubmission = Faker.fake();
        let price = submission.price.to_string();

        let input = validate_restaurant(&form(&[
            ("restaurant[title]", &submission.title),
            ("restaurant[location]", &submission.location),
            ("restaurant[price]", &price),
            ("restaurant[description]", &submission.description),
            ("_method", "PUT"),
        ]))
        .expect("generated submission should be valid");

        assert_eq!(input.title, submission.title);
        assert_eq!(input.description, submission.description);
        assert_eq!(input.price, f64::from(submission.price));
        assert_eq!(input.image, None);
    }
}

#[test]
fn test_restaurant_text_is_kept_as_submitted() {
    let input = validate_restaurant(&form(&[
        ("restaurant[title]", "  Dosa Plaza "),
        ("restaurant[location]", "Chennai"),
        ("restaurant[image]", "http://img.example.com/dosa.png"),
        ("restaurant[price]", "99.5"),
        ("restaurant[description]", "Crisp."),
    ]))
    .unwrap();

    assert_eq!(input.title, "  Dosa Plaza ");
    assert_eq!(input.image.as_deref(), Some("http://img.example.com/dosa.png"));
    assert_eq!(input.price, 99.5);
}

#[test]
fn test_blank_image_counts_as_absent() {
    let input = validate_restaurant(&form(&[
        ("restaurant[title]", "Plain"),
        ("restaurant[location]", "Goa"),
        ("restaurant[image]", "   "),
        ("restaurant[price]", "0"),
        ("restaurant[description]", "Nothing to see."),
    ]))
    .unwrap();

    assert_eq!(input.image, None);
    assert_eq!(input.price, 0.0);
}

#[test]
fn test_restaurant_problems_are_all_reported_in_order() {
    let problems = problems_of(validate_restaurant(&form(&[
        ("restaurant[title]", "   "),
        ("restaurant[image]", "ftp://files.example.com/a.png"),
        ("restaurant[price]", "cheap"),
        ("restaurant[description]", "ok"),
    ])));

    assert_eq!(
        problems,
        vec![
            "\"restaurant.title\" is not allowed to be empty",
            "\"restaurant.location\" is required",
            "\"restaurant.image\" must be a valid uri",
            "\"restaurant.price\" must be a number",
        ]
    );
}

#[test]
fn test_missing_restaurant_scope_is_one_problem() {
    let problems = problems_of(validate_restaurant(&form(&[("_method", "PUT")])));

    assert_eq!(problems, vec!["\"restaurant\" is required"]);
}

#[test]
fn test_unknown_keys_are_not_allowed() {
    let err = validate_restaurant(&form(&[
        ("restaurant[title]", "T"),
        ("restaurant[location]", "L"),
        ("restaurant[price]", "1"),
        ("restaurant[description]", "D"),
        ("restaurant[author]", "someone-else"),
        ("admin", "true"),
    ]))
    .unwrap_err();

    assert_eq!(
        err.problems,
        vec!["\"admin\" is not allowed", "\"restaurant.author\" is not allowed"]
    );
    // The display form joins every problem.
    assert_eq!(
        err.to_string(),
        "\"admin\" is not allowed, \"restaurant.author\" is not allowed"
    );
}

// --- Review Submissions ---

#[test]
fn test_review_rating_bounds() {
    for rating in ["1", "3", "5"] {
        let input = validate_review(&form(&[("review[body]", "Nice"), ("review[rating]", rating)]))
            .unwrap();
        assert_eq!(input.rating.to_string(), rating);
    }

    let low = problems_of(validate_review(&form(&[("review[body]", "Meh"), ("review[rating]", "0")])));
    assert_eq!(low, vec!["\"review.rating\" must be greater than or equal to 1"]);

    let high = problems_of(validate_review(&form(&[("review[body]", "Wow"), ("review[rating]", "9")])));
    assert_eq!(high, vec!["\"review.rating\" must be less than or equal to 5"]);
}

#[test]
fn test_review_rating_must_be_an_integer() {
    let fractional = problems_of(validate_review(&form(&[("review[body]", "Hmm"), ("review[rating]", "3.5")])));
    assert_eq!(fractional, vec!["\"review.rating\" must be an integer"]);

    let text = problems_of(validate_review(&form(&[("review[body]", "Hmm"), ("review[rating]", "five")])));
    assert_eq!(text, vec!["\"review.rating\" must be a number"]);
}

#[test]
fn test_review_requires_body() {
    let problems = problems_of(validate_review(&form(&[("review[rating]", "4")])));

    assert_eq!(problems, vec!["\"review.body\" is required"]);
}

// --- Models ---

#[test]
fn test_user_serialization_omits_password_hash() {
    let user = User {
        id: Uuid::new_v4(),
        username: "alice".to_string(),
        email: "alice@example.com".to_string(),
        password_hash: "$argon2id$secret".to_string(),
        ..Default::default()
    };

    let json = serde_json::to_value(&user).unwrap();
    assert!(json.get("password_hash").is_none());

    let profile = UserProfile::from(user.clone());
    assert_eq!(profile.id, user.id);
    assert_eq!(profile.username, "alice");
}
