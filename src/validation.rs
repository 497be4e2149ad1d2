//! Validation of raw form submissions.
//!
//! Forms are posted with nested field names (`restaurant[title]`,
//! `review[rating]`). A submission is checked field by field and every problem
//! is collected; the caller either gets a typed input or a single
//! `ValidationError` whose message joins all problems with `", "`.

use std::collections::HashMap;

use thiserror::Error;

use crate::models::{RestaurantInput, ReviewInput};

/// Form key used by the method override; never part of a resource.
const METHOD_OVERRIDE_KEY: &str = "_method";

pub const RATING_MIN: i32 = 1;
pub const RATING_MAX: i32 = 5;

/// ValidationError
///
/// Every individual field problem found in one submission, in discovery order.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{}", .problems.join(", "))]
pub struct ValidationError {
    pub problems: Vec<String>,
}

/// Submission
///
/// The fields of one resource scope pulled out of a raw form, plus the
/// problems found so far.
struct Submission<'a> {
    scope: &'static str,
    fields: HashMap<&'a str, &'a str>,
    // Field names in the order they were posted, for stable unknown-key reports.
    order: Vec<&'a str>,
    problems: Vec<String>,
}

impl<'a> Submission<'a> {
    fn parse(scope: &'static str, form: &'a [(String, String)]) -> Self {
        let mut submission = Submission {
            scope,
            fields: HashMap::new(),
            order: Vec::new(),
            problems: Vec::new(),
        };

        for (key, value) in form {
            if key == METHOD_OVERRIDE_KEY {
                continue;
            }
            let field = key
                .strip_prefix(scope)
                .and_then(|rest| rest.strip_prefix('['))
                .and_then(|rest| rest.strip_suffix(']'));
            match field {
                Some(name) => {
                    if submission.fields.insert(name, value.as_str()).is_none() {
                        submission.order.push(name);
                    }
                }
                None => submission.problems.push(format!("\"{key}\" is not allowed")),
            }
        }

        submission
    }

    fn label(&self, field: &str) -> String {
        format!("\"{}.{}\"", self.scope, field)
    }

    fn reject(&mut self, field: &str, problem: &str) {
        let label = self.label(field);
        self.problems.push(format!("{label} {problem}"));
    }

    /// A present, non-blank text value, kept exactly as submitted.
    fn required_text(&mut self, field: &str) -> String {
        match self.fields.get(field).copied() {
            None => {
                self.reject(field, "is required");
                String::new()
            }
            Some(value) if value.trim().is_empty() => {
                self.reject(field, "is not allowed to be empty");
                String::new()
            }
            Some(value) => value.to_string(),
        }
    }

    /// An optional `http(s)` URL; a blank value counts as absent.
    fn optional_uri(&mut self, field: &str) -> Option<String> {
        let value = self.fields.get(field).copied()?;
        if value.trim().is_empty() {
            return None;
        }
        if !is_web_uri(value) {
            self.reject(field, "must be a valid uri");
            return None;
        }
        Some(value.to_string())
    }

    /// A required finite number, at least `min`.
    fn number(&mut self, field: &str, min: f64) -> f64 {
        let Some(raw) = self.fields.get(field).map(|v| v.trim()) else {
            self.reject(field, "is required");
            return 0.0;
        };
        match raw.parse::<f64>() {
            Ok(value) if value.is_finite() => {
                if value < min {
                    self.reject(field, &format!("must be greater than or equal to {min}"));
                }
                value
            }
            _ => {
                self.reject(field, "must be a number");
                0.0
            }
        }
    }

    /// A required integer within `min..=max`.
    fn integer(&mut self, field: &str, min: i32, max: i32) -> i32 {
        let Some(raw) = self.fields.get(field).map(|v| v.trim()) else {
            self.reject(field, "is required");
            return 0;
        };
        let value = match raw.parse::<i32>() {
            Ok(value) => value,
            Err(_) => {
                let problem = match raw.parse::<f64>() {
                    Ok(n) if n.is_finite() => "must be an integer",
                    _ => "must be a number",
                };
                self.reject(field, problem);
                return 0;
            }
        };
        if value < min {
            self.reject(field, &format!("must be greater than or equal to {min}"));
        } else if value > max {
            self.reject(field, &format!("must be less than or equal to {max}"));
        }
        value
    }

    /// Reports unknown field names, then yields the collected result.
    fn finish<T>(mut self, allowed: &[&str], value: T) -> Result<T, ValidationError> {
        if self.fields.is_empty() {
            let scope = self.scope;
            // A missing scope makes every per-field message noise.
            self.problems
                .retain(|problem| !problem.starts_with(&format!("\"{scope}.")));
            self.problems.insert(0, format!("\"{scope}\" is required"));
        }

        let unknown: Vec<String> = self
            .order
            .iter()
            .filter(|name| !allowed.contains(*name))
            .map(|name| format!("{} is not allowed", self.label(name)))
            .collect();
        self.problems.extend(unknown);

        if self.problems.is_empty() {
            Ok(value)
        } else {
            Err(ValidationError {
                problems: self.problems,
            })
        }
    }
}

fn is_web_uri(value: &str) -> bool {
    let rest = value
        .strip_prefix("https://")
        .or_else(|| value.strip_prefix("http://"));
    match rest {
        Some(rest) => {
            let host = rest.split(['/', '?', '#']).next().unwrap_or_default();
            !host.is_empty() && !value.chars().any(char::is_whitespace)
        }
        None => false,
    }
}

/// validate_restaurant
///
/// Checks a restaurant submission: `title`, `location`, `description`
/// required; `price` a number ≥ 0; `image` an optional web URL.
pub fn validate_restaurant(form: &[(String, String)]) -> Result<RestaurantInput, ValidationError> {
    let mut submission = Submission::parse("restaurant", form);

    let input = RestaurantInput {
        title: submission.required_text("title"),
        location: submission.required_text("location"),
        image: submission.optional_uri("image"),
        price: submission.number("price", 0.0),
        description: submission.required_text("description"),
    };

    submission.finish(&["title", "location", "image", "price", "description"], input)
}

/// validate_review
///
/// Checks a review submission: `body` required; `rating` an integer in 1..=5.
pub fn validate_review(form: &[(String, String)]) -> Result<ReviewInput, ValidationError> {
    let mut submission = Submission::parse("review", form);

    let input = ReviewInput {
        body: submission.required_text("body"),
        rating: submission.integer("rating", RATING_MIN, RATING_MAX),
    };

    submission.finish(&["body", "rating"], input)
}
