//! Password-reset tokens
//!
//! A reset token is an HS256 JWT carrying the user id and an expiry. It is
//! stateless: nothing is stored server side, so a token stays usable until it
//! expires.

use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::db::DbPool;
use crate::models::User;
use crate::repo;

/// Default lifetime of a reset token
pub const DEFAULT_EXPIRY_SECS: i64 = 1800;

#[derive(Debug, Serialize, Deserialize)]
struct ResetClaims {
    user_id: i32,
    exp: i64,
}

/// Issues and checks reset tokens with the server secret
#[derive(Clone)]
pub struct ResetTokens {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    expires_secs: i64,
}

impl ResetTokens {
    pub fn new(secret: &[u8], expires_secs: i64) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.validate_exp = true;
        validation.set_required_spec_claims(&["exp"]);

        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            validation,
            expires_secs,
        }
    }

    /// Token for `user_id` with the configured lifetime
    pub fn get_reset_token(&self, user_id: i32) -> Result<String, jsonwebtoken::errors::Error> {
        self.get_reset_token_with_expiry(user_id, self.expires_secs)
    }

    /// Token for `user_id` that expires `expires_secs` from now
    pub fn get_reset_token_with_expiry(
        &self,
        user_id: i32,
        expires_secs: i64,
    ) -> Result<String, jsonwebtoken::errors::Error> {
        let claims = ResetClaims {
            user_id,
            exp: Utc::now().timestamp() + expires_secs,
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
    }

    /// The user id inside a well-formed, correctly signed, unexpired token
    pub fn decode_user_id(&self, token: &str) -> Option<i32> {
        match decode::<ResetClaims>(token, &self.decoding_key, &self.validation) {
            Ok(data) => Some(data.claims.user_id),
            Err(e) => {
                debug!("Rejected reset token: {}", e);
                None
            }
        }
    }

    /// Resolves a token to its user
    ///
    /// Every failure (bad encoding, bad signature, expired, unknown user,
    /// database error) yields `None`.
    pub fn verify_reset_token(&self, pool: &DbPool, token: &str) -> Option<User> {
        let user_id = self.decode_user_id(token)?;
        match repo::get_user(pool, user_id) {
            Ok(user) => user,
            Err(e) => {
                debug!("Could not load user {} for reset token: {:#}", user_id, e);
                None
            }
        }
    }
}
