//! Password hashing and cookie sessions
//!
//! The session is a signed cookie holding the user id. A "remember me" login
//! gets a persistent cookie; otherwise it lives as long as the browser session.

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::SaltString;
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use axum::extract::{FromRef, FromRequestParts};
use axum::http::request::Parts;
use axum::response::{IntoResponse, Redirect, Response};
use axum_extra::extract::cookie::{Cookie, Key, SameSite, SignedCookieJar};
use tracing::{debug, warn};

use crate::errors::ApiError;
use crate::flash::{self, FlashLevel};
use crate::models::User;
use crate::repo;
use crate::AppState;

/// Name of the session cookie
pub const SESSION_COOKIE: &str = "session";

/// Hashes a password with argon2 and a fresh random salt
pub fn hash_password(password: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("Failed to hash password: {}", e))?;
    Ok(hash.to_string())
}

/// Checks a password against a stored hash; an unparsable hash never matches
pub fn verify_password(password: &str, hash: &str) -> bool {
    match PasswordHash::new(hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(e) => {
            warn!("Stored password hash could not be parsed: {}", e);
            false
        }
    }
}

/// Starts a session for `user`
pub fn login_user(jar: SignedCookieJar, user: &User, remember: bool, remember_days: u32) -> SignedCookieJar {
    let mut cookie = Cookie::build((SESSION_COOKIE, user.get_id().to_string()))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax);
    if remember {
        cookie = cookie.max_age(time::Duration::days(i64::from(remember_days)));
    }
    jar.add(cookie)
}

/// Ends the current session
pub fn logout_user(jar: SignedCookieJar) -> SignedCookieJar {
    jar.remove(Cookie::build(SESSION_COOKIE).path("/"))
}

/// The user id stored in the session cookie, if any
pub fn session_user_id(jar: &SignedCookieJar) -> Option<i32> {
    jar.get(SESSION_COOKIE)
        .and_then(|cookie| cookie.value().parse::<i32>().ok())
}

fn load_session_user(state: &AppState, jar: &SignedCookieJar) -> Result<Option<User>, ApiError> {
    let Some(user_id) = session_user_id(jar) else {
        return Ok(None);
    };
    let user = repo::get_user(&state.pool, user_id).map_err(ApiError::Database)?;
    if user.is_none() {
        debug!("Session refers to missing user {}", user_id);
    }
    Ok(user)
}

/// The logged-in user; anonymous requests are sent to the login page
///
/// The rejection redirects to `/login?next=<path>` with an info flash.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
    AppState: FromRef<S>,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let state = AppState::from_ref(state);
        let jar = SignedCookieJar::from_headers(&parts.headers, Key::from_ref(&state));

        match load_session_user(&state, &jar) {
            Ok(Some(user)) => Ok(CurrentUser(user)),
            Ok(None) => {
                let next = parts
                    .uri
                    .path_and_query()
                    .map(|pq| pq.as_str().to_string())
                    .unwrap_or_else(|| "/".to_string());
                let jar = flash::push(jar, FlashLevel::Info, "Please log in to access this page.");
                let target = format!("/login?next={}", encode_query_value(&next));
                Err((jar, Redirect::to(&target)).into_response())
            }
            Err(e) => Err(e.into_response()),
        }
    }
}

/// The logged-in user, if there is one
#[derive(Debug, Clone)]
pub struct MaybeUser(pub Option<User>);

impl<S> FromRequestParts<S> for MaybeUser
where
    S: Send + Sync,
    AppState: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let state = AppState::from_ref(state);
        let jar = SignedCookieJar::from_headers(&parts.headers, Key::from_ref(&state));
        Ok(MaybeUser(load_session_user(&state, &jar)?))
    }
}

/// Percent-encodes a value for use inside a query string
fn encode_query_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for byte in value.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' | b'/' => {
                out.push(byte as char)
            }
            _ => out.push_str(&format!("%{:02X}", byte)),
        }
    }
    out
}
