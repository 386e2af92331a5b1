//! One-shot user notifications
//!
//! Messages are queued in a signed cookie and drained by the next rendered
//! page, which then clears the cookie.

use axum_extra::extract::cookie::{Cookie, SameSite, SignedCookieJar};
use serde::{Deserialize, Serialize};
use tracing::debug;

pub const FLASH_COOKIE: &str = "_flashes";

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FlashLevel {
    Success,
    Info,
    Warning,
    Danger,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct FlashMessage {
    pub category: FlashLevel,
    pub message: String,
}

fn read(jar: &SignedCookieJar) -> Vec<FlashMessage> {
    jar.get(FLASH_COOKIE)
        .and_then(|cookie| match serde_json::from_str(cookie.value()) {
            Ok(messages) => Some(messages),
            Err(e) => {
                debug!("Dropping unreadable flash cookie: {}", e);
                None
            }
        })
        .unwrap_or_default()
}

/// Queues a message for the next rendered page
pub fn push(jar: SignedCookieJar, category: FlashLevel, message: &str) -> SignedCookieJar {
    let mut messages = read(&jar);
    messages.push(FlashMessage {
        category,
        message: message.to_string(),
    });
    let value = serde_json::to_string(&messages).unwrap_or_else(|_| "[]".to_string());
    jar.add(
        Cookie::build((FLASH_COOKIE, value))
            .path("/")
            .http_only(true)
            .same_site(SameSite::Lax),
    )
}

/// Drains all queued messages
pub fn take(jar: SignedCookieJar) -> (SignedCookieJar, Vec<FlashMessage>) {
    let messages = read(&jar);
    if messages.is_empty() {
        return (jar, messages);
    }
    (jar.remove(Cookie::build(FLASH_COOKIE).path("/")), messages)
}
