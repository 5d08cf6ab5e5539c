//! Fake value generators for customers and products.
//!
//! Names, emails and product names are drawn from small built-in word lists;
//! numeric values are drawn uniformly from the configured bounds.

use rand::Rng;
use rust_decimal::Decimal;
use std::ops::RangeInclusive;

/// Product price bounds in cents (5.00 ..= 200.00).
pub const PRICE_CENTS: RangeInclusive<i64> = 500..=20_000;
/// Stock bounds for new products and restocks.
pub const STOCK: RangeInclusive<i32> = 5..=100;
/// Order quantity bounds.
pub const QUANTITY: RangeInclusive<i32> = 1..=5;

const FIRST_NAMES: &[&str] = &[
    "James", "Mary", "Robert", "Patricia", "John", "Jennifer", "Michael", "Linda", "David",
    "Elizabeth", "William", "Barbara", "Richard", "Susan", "Joseph", "Jessica", "Thomas", "Sarah",
    "Charles", "Karen", "Daniel", "Nancy", "Matthew", "Lisa", "Anthony", "Betty", "Mark", "Sandra",
    "Donald", "Ashley", "Steven", "Emily", "Andrew", "Michelle", "Joshua", "Amanda", "Kevin",
    "Melissa", "Brian", "Stephanie",
];

const LAST_NAMES: &[&str] = &[
    "Smith", "Johnson", "Williams", "Brown", "Jones", "Garcia", "Miller", "Davis", "Rodriguez",
    "Martinez", "Hernandez", "Lopez", "Gonzalez", "Wilson", "Anderson", "Thomas", "Taylor",
    "Moore", "Jackson", "Martin", "Lee", "Perez", "Thompson", "White", "Harris", "Sanchez",
    "Clark", "Ramirez", "Lewis", "Robinson", "Walker", "Young", "Allen", "King", "Wright",
    "Scott", "Torres", "Nguyen", "Hill", "Flores",
];

const EMAIL_DOMAINS: &[&str] = &["example.com", "example.org", "example.net"];

const WORDS: &[&str] = &[
    "alias", "amet", "aperiam", "atque", "beatae", "blanditiis", "commodi", "corporis",
    "culpa", "debitis", "delectus", "dolor", "dolore", "ducimus", "eius", "enim", "error",
    "eveniet", "facere", "fugiat", "harum", "illo", "impedit", "ipsum", "iure", "labore",
    "laborum", "magnam", "maxime", "minima", "molestiae", "natus", "neque", "nihil", "nobis",
    "odio", "officia", "omnis", "optio", "pariatur", "placeat", "porro", "quae", "quasi",
    "quidem", "quis", "ratione", "rerum", "saepe", "sequi", "similique", "sint", "soluta",
    "tempora", "tenetur", "totam", "ullam", "vel", "veniam", "vero", "vitae", "voluptas",
];

fn pick<R: Rng>(rng: &mut R, words: &[&'static str]) -> &'static str {
    words[rng.random_range(0..words.len())]
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// A person's full name, `"<First> <Last>"`.
pub fn person_name<R: Rng>(rng: &mut R) -> String {
    format!("{} {}", pick(rng, FIRST_NAMES), pick(rng, LAST_NAMES))
}

/// An email address such as `mary.smith42@example.org`.
pub fn email<R: Rng>(rng: &mut R) -> String {
    format!(
        "{}.{}{}@{}",
        pick(rng, FIRST_NAMES).to_lowercase(),
        pick(rng, LAST_NAMES).to_lowercase(),
        rng.random_range(1..1000),
        pick(rng, EMAIL_DOMAINS)
    )
}

/// A two-word product name with the first word capitalized, e.g. `"Dolor sint"`.
pub fn product_name<R: Rng>(rng: &mut R) -> String {
    format!("{} {}", capitalize(pick(rng, WORDS)), pick(rng, WORDS))
}

/// A unit price with two decimal places in [5.00, 200.00].
pub fn price<R: Rng>(rng: &mut R) -> Decimal {
    Decimal::new(rng.random_range(PRICE_CENTS), 2)
}

/// A stock level in [5, 100].
pub fn stock<R: Rng>(rng: &mut R) -> i32 {
    rng.random_range(STOCK)
}

/// An order quantity in [1, 5].
pub fn quantity<R: Rng>(rng: &mut R) -> i32 {
    rng.random_range(QUANTITY)
}
