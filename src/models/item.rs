use chrono::{DateTime, NaiveDateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};

use super::User;
use crate::schema::items;

/// An item offered for sale
///
/// `date_posted` is set once at creation and never written again; listings
/// are ordered by it.
#[derive(Queryable, Selectable, Identifiable, Associations, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[diesel(belongs_to(User))]
#[diesel(table_name = items)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct Item {
    id: i32,
    title: String,
    description: String,
    value: f64,
    date_posted: NaiveDateTime,
    user_id: i32,
}

impl Item {
    /// Gets the item's ID
    pub fn get_id(&self) -> i32 {
        self.id
    }

    /// Gets the item's title
    pub fn get_title(&self) -> String {
        self.title.clone()
    }

    /// Gets the item's description
    pub fn get_description(&self) -> String {
        self.description.clone()
    }

    /// Gets the asking price
    pub fn get_value(&self) -> f64 {
        self.value
    }

    /// Gets the ID of the user selling the item
    pub fn get_user_id(&self) -> i32 {
        self.user_id
    }

    /// Gets the creation timestamp as a `DateTime<Utc>`
    pub fn get_date_posted(&self) -> DateTime<Utc> {
        DateTime::from_naive_utc_and_offset(self.date_posted, Utc)
    }

    /// Whether `user` is the seller of this item
    pub fn is_owned_by(&self, user: &User) -> bool {
        self.user_id == user.get_id()
    }
}

/// Insertable form of [`Item`]
#[derive(Insertable, Debug)]
#[diesel(table_name = items)]
pub struct NewItem<'a> {
    pub title: &'a str,
    pub description: &'a str,
    pub value: f64,
    pub date_posted: NaiveDateTime,
    pub user_id: i32,
}

impl<'a> NewItem<'a> {
    /// Builds a new item stamped with the current time
    ///
    /// The value is rounded to two decimal places, i.e. whole cents.
    pub fn new(title: &'a str, description: &'a str, value: f64, user_id: i32) -> Self {
        Self {
            title,
            description,
            value: round_to_cents(value),
            date_posted: Utc::now().naive_utc(),
            user_id,
        }
    }
}

/// Rounds a currency amount to two decimal places
pub fn round_to_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
