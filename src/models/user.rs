use diesel::prelude::*;
use serde::Serialize;

use crate::schema::users;

/// Profile picture every account starts with
pub const DEFAULT_PROFILE_IMAGE: &str = "default.jpg";

/// A registered account
///
/// The password column holds an argon2 PHC string and is never serialized.
#[derive(Queryable, Selectable, Identifiable, Debug, Clone, PartialEq, Eq, Serialize)]
#[diesel(table_name = users)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct User {
    id: i32,
    username: String,
    email: String,
    profile_image: String,
    #[serde(skip_serializing)]
    password: String,
}

impl User {
    /// Gets the user's ID
    pub fn get_id(&self) -> i32 {
        self.id
    }

    /// Gets the user's username
    pub fn get_username(&self) -> String {
        self.username.clone()
    }

    /// Gets the user's email address
    pub fn get_email(&self) -> String {
        self.email.clone()
    }

    /// Gets the filename of the user's profile picture
    pub fn get_profile_image(&self) -> String {
        self.profile_image.clone()
    }

    /// Gets the stored password hash
    pub fn get_password_hash(&self) -> &str {
        &self.password
    }
}

/// Insertable form of [`User`]; `password` must already be hashed
#[derive(Insertable, Debug)]
#[diesel(table_name = users)]
pub struct NewUser<'a> {
    pub username: &'a str,
    pub email: &'a str,
    pub password: &'a str,
}
