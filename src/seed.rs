//! First-run seed data and the starter categories for newly created trips.

use chrono::NaiveDate;

use crate::models::{category::Category, member::Member, trip::Trip};

const DEFAULT_TRIP_NAME: &str = "Mysore and Bangalore Mini Trip";

const DEFAULT_MEMBER_NAMES: [&str; 7] = [
    "Sandy", "Vicky", "Abi", "Lachu", "Yuva", "Kalai", "Karthi",
];
const DEFAULT_MEMBER_PLANNED: f64 = 3000.0;
const DEFAULT_MEMBER_GIVEN: f64 = 2000.0;

// name, planned, actual, color, icon
const DEFAULT_CATEGORIES: [(&str, f64, f64, &str, &str); 14] = [
    ("Transportation (Internal)", 0.0, 0.0, "#3B82F6", "car"),
    ("Travel - Train/Bus", 1980.0, 0.0, "#8B5CF6", "plane"),
    ("Activities Fun World", 4497.0, 4497.0, "#10B981", "ticket"),
    ("Turf", 1000.0, 0.0, "#F59E0B", "trophy"),
    ("Food Friday Night", 400.0, 0.0, "#EF4444", "utensils"),
    ("Food Saturday", 2100.0, 0.0, "#EF4444", "utensils"),
    ("Food Sunday", 2100.0, 0.0, "#EF4444", "utensils"),
    ("Food Monday", 2100.0, 0.0, "#EF4444", "utensils"),
    ("Tickets/Entry", 0.0, 0.0, "#06B6D4", "ticket"),
    ("Drinks/Beverages", 0.0, 0.0, "#EC4899", "coffee"),
    ("Emergency/Medical", 500.0, 0.0, "#DC2626", "alert"),
    ("Entertainment", 0.0, 0.0, "#A855F7", "music"),
    ("Tips/Service", 0.0, 0.0, "#84CC16", "heart"),
    ("Souvenirs/Gifts", 0.0, 0.0, "#F97316", "gift"),
];

const STARTER_CATEGORIES: [(&str, &str, &str); 4] = [
    ("Transportation", "#3B82F6", "car"),
    ("Food", "#EF4444", "utensils"),
    ("Accommodation", "#F59E0B", "hotel"),
    ("Activities", "#10B981", "ticket"),
];

pub fn default_trip() -> Trip {
    Trip::new(DEFAULT_TRIP_NAME, date(2026, 1, 24), date(2026, 1, 27))
}

pub fn default_members(trip_id: &str) -> Vec<Member> {
    DEFAULT_MEMBER_NAMES
        .iter()
        .map(|name| {
            let mut member = Member::new(*name, trip_id);
            member.planned = DEFAULT_MEMBER_PLANNED;
            member.given = DEFAULT_MEMBER_GIVEN;
            member
        })
        .collect()
}

pub fn default_categories(trip_id: &str) -> Vec<Category> {
    DEFAULT_CATEGORIES
        .iter()
        .map(|(name, planned, actual, color, icon)| {
            let mut category = Category::new(*name, *planned, *color, *icon, trip_id);
            category.actual = *actual;
            category
        })
        .collect()
}

/// Every trip created after first run starts with these four, budgets at
/// zero.
pub fn starter_categories(trip_id: &str) -> Vec<Category> {
    STARTER_CATEGORIES
        .iter()
        .map(|(name, color, icon)| Category::new(*name, 0.0, *color, *icon, trip_id))
        .collect()
}

fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).expect("seed dates are valid")
}
