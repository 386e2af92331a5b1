/// Integration tests for accounts and sessions
///
/// This file contains tests for:
/// - Registering, including duplicate usernames and emails
/// - Logging in and out, "remember me" and the `next` redirect
/// - The login requirement on protected pages
/// - The password reset flow through emailed tokens

use axum::http::StatusCode;
use quickswap::dto::{EMAIL_TAKEN, NO_ACCOUNT_FOR_EMAIL, USERNAME_TAKEN};
use quickswap::repo;

mod common;
use common::*;

/// Pulls the reset token out of a reset mail body
fn token_from_mail(body: &str) -> String {
    let start = body.find("/reset_password/").unwrap() + "/reset_password/".len();
    body[start..].split_whitespace().next().unwrap().to_string()
}

#[tokio::test]
async fn test_register_then_login() {
    let env = TestEnv::new();
    let mut client = env.client();

    let page = client.get("/register").await;
    assert_eq!(page.status, StatusCode::OK);
    assert_eq!(page.json()["legend"], "Join Today");

    register(&mut client, "alice").await.assert_redirect("/login");

    let page = client.get("/login").await.json();
    assert_eq!(
        flash_messages(&page),
        vec!["Your account has been created! You are now able to log in"]
    );

    login(&mut client, "alice").await.assert_redirect("/");
    assert!(client.has_cookie("session"));

    let home = client.get("/").await.json();
    assert_eq!(home["current_user"]["username"], "alice");
    assert_eq!(home["current_user"]["profile_image"], "default.jpg");
    assert!(home["current_user"].get("password").is_none());
}

#[tokio::test]
async fn test_duplicate_email_is_rejected() {
    let env = TestEnv::new();
    register(&mut env.client(), "alice").await.assert_redirect("/login");

    let mut other = env.client();
    let response = other
        .post_form(
            "/register",
            &[
                ("username", "alicia"),
                ("email", "alice@example.com"),
                ("password", PASSWORD),
                ("confirm_password", PASSWORD),
            ],
        )
        .await;

    assert_eq!(response.status, StatusCode::UNPROCESSABLE_ENTITY);
    let body = response.json();
    assert_eq!(body["fields"]["email"][0], EMAIL_TAKEN);
    assert!(body["fields"].get("username").is_none());
}

#[tokio::test]
async fn test_duplicate_username_is_rejected() {
    let env = TestEnv::new();
    register(&mut env.client(), "alice").await.assert_redirect("/login");

    let response = env
        .client()
        .post_form(
            "/register",
            &[
                ("username", "alice"),
                ("email", "someone.else@example.com"),
                ("password", PASSWORD),
                ("confirm_password", PASSWORD),
            ],
        )
        .await;

    assert_eq!(response.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(response.json()["fields"]["username"][0], USERNAME_TAKEN);
}

#[tokio::test]
async fn test_registration_form_errors() {
    let env = TestEnv::new();
    let response = env
        .client()
        .post_form(
            "/register",
            &[
                ("username", "a"),
                ("email", "not-an-email"),
                ("password", "one"),
                ("confirm_password", "two"),
            ],
        )
        .await;

    assert_eq!(response.status, StatusCode::UNPROCESSABLE_ENTITY);
    let fields = &response.json()["fields"];
    assert!(fields.get("username").is_some());
    assert!(fields.get("email").is_some());
    assert!(fields.get("confirm_password").is_some());
}

#[tokio::test]
async fn test_login_with_wrong_password() {
    let env = TestEnv::new();
    let mut client = env.client();
    register(&mut client, "alice").await.assert_redirect("/login");
    client.get("/login").await;

    let response = client
        .post_form("/login", &[("email", "alice@example.com"), ("password", "wrong")])
        .await;

    assert_eq!(response.status, StatusCode::OK);
    let page = response.json();
    assert_eq!(
        flash_messages(&page),
        vec!["Login Unsuccessful. Please check email and password"]
    );
    assert_eq!(page["form"]["email"], "alice@example.com");
    assert_eq!(page["form"]["password"], "");
    assert!(!client.has_cookie("session"));
}

#[tokio::test]
async fn test_login_with_unknown_email() {
    let env = TestEnv::new();
    let mut client = env.client();

    let response = client
        .post_form("/login", &[("email", "ghost@example.com"), ("password", PASSWORD)])
        .await;

    assert_eq!(response.status, StatusCode::OK);
    assert!(!client.has_cookie("session"));
}

#[tokio::test]
async fn test_protected_page_redirects_to_login() {
    let env = TestEnv::new();
    let mut client = env.client();
    register(&mut client, "alice").await.assert_redirect("/login");
    client.get("/login").await;

    client.get("/account").await.assert_redirect("/login?next=/account");

    let page = client.get("/login").await.json();
    assert_eq!(flash_messages(&page), vec!["Please log in to access this page."]);

    client
        .post_form("/login?next=/account", &[("email", "alice@example.com"), ("password", PASSWORD)])
        .await
        .assert_redirect("/account");

    let account = client.get("/account").await;
    assert_eq!(account.status, StatusCode::OK);
}

#[tokio::test]
async fn test_login_ignores_offsite_next() {
    let env = TestEnv::new();
    register(&mut env.client(), "alice").await.assert_redirect("/login");

    let targets = [
        "https://evil.example.com/",
        "//evil.example.com",
        "/%09/evil.example.com",
        "/%0A/evil.example.com",
        "/%0D%0A/evil.example.com",
        "/caf%C3%A9",
    ];
    for target in targets {
        let mut client = env.client();
        client
            .post_form(
                &format!("/login?next={}", target),
                &[("email", "alice@example.com"), ("password", PASSWORD)],
            )
            .await
            .assert_redirect("/");
    }
}

#[tokio::test]
async fn test_remember_me_makes_session_persistent() {
    let env = TestEnv::new();
    let mut client = env.client();
    register(&mut client, "alice").await.assert_redirect("/login");

    let remembered = client
        .post_form(
            "/login",
            &[("email", "alice@example.com"), ("password", PASSWORD), ("remember", "y")],
        )
        .await;
    let cookie = remembered.set_cookie("session").unwrap();
    assert!(cookie.contains("Max-Age=31536000"), "cookie: {}", cookie);

    let mut other = env.client();
    let plain = login(&mut other, "alice").await;
    let cookie = plain.set_cookie("session").unwrap();
    assert!(!cookie.contains("Max-Age"), "cookie: {}", cookie);
}

#[tokio::test]
async fn test_logout() {
    let env = TestEnv::new();
    let mut client = logged_in(&env, "alice").await;

    client.get("/logout").await.assert_redirect("/");
    assert!(!client.has_cookie("session"));

    let home = client.get("/").await.json();
    assert!(home["current_user"].is_null());
    client.get("/account").await.assert_redirect("/login?next=/account");
}

#[tokio::test]
async fn test_logged_in_users_skip_auth_pages() {
    let env = TestEnv::new();
    let mut client = logged_in(&env, "alice").await;

    client.get("/register").await.assert_redirect("/");
    client.get("/login").await.assert_redirect("/");
    client.get("/reset_password").await.assert_redirect("/");
    client.get("/reset_password/whatever").await.assert_redirect("/");
}

#[tokio::test]
async fn test_password_reset_flow() {
    let env = TestEnv::new();
    let mut client = env.client();
    register(&mut client, "alice").await.assert_redirect("/login");

    client
        .post_form("/reset_password", &[("email", "alice@example.com")])
        .await
        .assert_redirect("/login");

    let page = client.get("/login").await.json();
    assert!(flash_messages(&page)
        .contains(&"An email has been sent with instructions to reset your password.".to_string()));

    let mail = env.state.mailer.outbox().unwrap().last().unwrap();
    assert_eq!(mail.to, "alice@example.com");
    assert_eq!(mail.subject, "Password Reset Request");
    assert!(mail.body.contains("http://quickswap.test/reset_password/"));
    let token = token_from_mail(&mail.body);

    let form_page = client.get(&format!("/reset_password/{}", token)).await;
    assert_eq!(form_page.status, StatusCode::OK);
    assert_eq!(form_page.json()["legend"], "Reset Password");

    client
        .post_form(
            &format!("/reset_password/{}", token),
            &[("password", "brand-new-pw"), ("confirm_password", "brand-new-pw")],
        )
        .await
        .assert_redirect("/login");

    let page = client.get("/login").await.json();
    assert_eq!(
        flash_messages(&page),
        vec!["Your password has been updated! You are now able to log in"]
    );

    // The old password no longer works
    let old = login(&mut client, "alice").await;
    assert_eq!(old.status, StatusCode::OK);

    client
        .post_form("/login", &[("email", "alice@example.com"), ("password", "brand-new-pw")])
        .await
        .assert_redirect("/");
}

#[tokio::test]
async fn test_reset_request_for_unknown_email() {
    let env = TestEnv::new();

    let response = env
        .client()
        .post_form("/reset_password", &[("email", "ghost@example.com")])
        .await;

    assert_eq!(response.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(response.json()["fields"]["email"][0], NO_ACCOUNT_FOR_EMAIL);
    assert!(env.state.mailer.outbox().unwrap().messages().is_empty());
}

#[tokio::test]
async fn test_invalid_reset_token() {
    let env = TestEnv::new();
    let mut client = env.client();

    client
        .get("/reset_password/not-a-token")
        .await
        .assert_redirect("/reset_password");

    let page = client.get("/reset_password").await.json();
    assert_eq!(page["flashes"][0]["category"], "warning");
    assert_eq!(page["flashes"][0]["message"], "That is an invalid or expired token");
}

#[tokio::test]
async fn test_expired_reset_token_is_refused() {
    let env = TestEnv::new();
    let mut client = env.client();
    register(&mut client, "alice").await.assert_redirect("/login");

    let user = repo::get_user_by_email(&env.state.pool, "alice@example.com").unwrap().unwrap();
    let token = env.state.reset_tokens.get_reset_token_with_expiry(user.get_id(), -60).unwrap();

    client
        .post_form(
            &format!("/reset_password/{}", token),
            &[("password", "brand-new-pw"), ("confirm_password", "brand-new-pw")],
        )
        .await
        .assert_redirect("/reset_password");

    // Password unchanged
    client.get("/reset_password").await;
    login(&mut client, "alice").await.assert_redirect("/");
}
