use crate::db::DbPool;
use crate::models::{NewUser, User};
use crate::schema::users;
use diesel::prelude::*;
use anyhow::Result;
use tracing::{instrument, debug, info};

/// Creates a new user in the database
///
/// ### Arguments
///
/// * `pool` - A reference to the database connection pool
/// * `username` - The unique display name
/// * `email` - The unique email address
/// * `password_hash` - An already hashed password
///
/// ### Returns
///
/// A Result containing the newly created User if successful
///
/// ### Errors
///
/// Returns an error if:
/// - Unable to get a connection from the pool
/// - The username or email is already taken (a diesel `UniqueViolation`)
#[instrument(skip(pool, password_hash), fields(username = %username))]
pub fn create_user(pool: &DbPool, username: &str, email: &str, password_hash: &str) -> Result<User> {
    debug!("Creating new user");

    let conn = &mut pool.get()?;

    let user = diesel::insert_into(users::table)
        .values(&NewUser { username, email, password: password_hash })
        .returning(User::as_returning())
        .get_result(conn)?;

    info!("Successfully created user with id: {}", user.get_id());
    Ok(user)
}

/// Retrieves a user by ID
///
/// ### Returns
///
/// A Result containing an Option with the User if found, or None if not found
#[instrument(skip(pool))]
pub fn get_user(pool: &DbPool, user_id: i32) -> Result<Option<User>> {
    let conn = &mut pool.get()?;

    let user = users::table
        .find(user_id)
        .select(User::as_select())
        .first(conn)
        .optional()?;

    Ok(user)
}

/// Retrieves a user by email address
#[instrument(skip(pool))]
pub fn get_user_by_email(pool: &DbPool, email: &str) -> Result<Option<User>> {
    let conn = &mut pool.get()?;

    let user = users::table
        .filter(users::email.eq(email))
        .select(User::as_select())
        .first(conn)
        .optional()?;

    Ok(user)
}

/// Retrieves a user by username
#[instrument(skip(pool))]
pub fn get_user_by_username(pool: &DbPool, username: &str) -> Result<Option<User>> {
    let conn = &mut pool.get()?;

    let user = users::table
        .filter(users::username.eq(username))
        .select(User::as_select())
        .first(conn)
        .optional()?;

    Ok(user)
}

/// Updates the editable account fields
///
/// `profile_image` is only written when a new picture was stored.
///
/// ### Errors
///
/// Returns an error if the user does not exist or the new username/email
/// collides with another account.
#[instrument(skip(pool), fields(user_id = %user_id))]
pub fn update_account(
    pool: &DbPool,
    user_id: i32,
    username: &str,
    email: &str,
    profile_image: Option<&str>,
) -> Result<User> {
    debug!("Updating account");

    #[derive(AsChangeset)]
    #[diesel(table_name = users)]
    struct AccountChangeset<'a> {
        username: &'a str,
        email: &'a str,
        profile_image: Option<&'a str>,
    }

    let conn = &mut pool.get()?;

    let user = diesel::update(users::table.find(user_id))
        .set(&AccountChangeset { username, email, profile_image })
        .returning(User::as_returning())
        .get_result(conn)
        .optional()?
        .ok_or_else(|| anyhow::anyhow!("User with id {} not found", user_id))?;

    info!("Account {} updated", user_id);
    Ok(user)
}

/// Replaces the stored password hash
#[instrument(skip(pool, password_hash), fields(user_id = %user_id))]
pub fn update_password(pool: &DbPool, user_id: i32, password_hash: &str) -> Result<()> {
    let conn = &mut pool.get()?;

    let updated = diesel::update(users::table.find(user_id))
        .set(users::password.eq(password_hash))
        .execute(conn)?;

    if updated == 0 {
        return Err(anyhow::anyhow!("User with id {} not found", user_id));
    }

    info!("Password updated for user {}", user_id);
    Ok(())
}
