use axum::{
    extract::{Multipart, Path, State},
    response::{IntoResponse, Redirect, Response},
    Form,
};
use axum_extra::extract::cookie::SignedCookieJar;
use axum_extra::extract::Query;
use serde::Serialize;
use tracing::{instrument, debug, info, warn};

use crate::auth::{self, CurrentUser, MaybeUser};
use crate::dto::{
    AccountForm, LoginForm, NextQuery, PageQuery, RegistrationForm, RequestResetForm,
    ResetPasswordForm, EMAIL_TAKEN, NO_ACCOUNT_FOR_EMAIL, USERNAME_TAKEN,
};
use crate::errors::ApiError;
use crate::flash::{self, FlashLevel};
use crate::images::PROFILE_PICS;
use crate::models::User;
use crate::repo::{self, ItemListing, Paginated};
use crate::views::{self, redirect_with_flash, FormPage, Rendered};
use crate::AppState;

use super::{
    discard_picture_on_error, ensure_page_exists, requested_page, static_url, store_picture, MultipartForm,
};

/// Subject of the password reset mail
pub const RESET_MAIL_SUBJECT: &str = "Password Reset Request";

#[derive(Serialize, Debug)]
pub struct AccountPage {
    pub legend: &'static str,
    pub image_file: String,
    pub form: AccountForm,
}

#[derive(Serialize, Debug)]
pub struct SellerPage {
    pub seller: User,
    pub items: Paginated<ItemListing>,
}

fn already_logged_in() -> Response {
    Redirect::to("/").into_response()
}

/// Handler for the sign-up page
#[instrument(skip_all)]
pub async fn register_page_handler(jar: SignedCookieJar, MaybeUser(user): MaybeUser) -> Response {
    if user.is_some() {
        return already_logged_in();
    }
    let page = FormPage { legend: "Join Today", form: RegistrationForm::default() };
    views::render(jar, None, Some("Register"), page).into_response()
}

/// Handler for creating an account
///
/// This function handles POST requests to `/register`.
///
/// ### Returns
///
/// A redirect to the login page, or 422 with the failing fields. A username
/// or email that is already taken is reported inline.
#[instrument(skip_all, fields(username = %form.username))]
pub async fn register_handler(
    State(state): State<AppState>,
    jar: SignedCookieJar,
    MaybeUser(user): MaybeUser,
    Form(form): Form<RegistrationForm>,
) -> Result<Response, ApiError> {
    if user.is_some() {
        return Ok(already_logged_in());
    }

    let mut errors = form.validate().err().unwrap_or_default();
    if errors.get("username").is_empty()
        && repo::get_user_by_username(&state.pool, &form.username).map_err(ApiError::from_db)?.is_some()
    {
        errors.add("username", USERNAME_TAKEN);
    }
    if errors.get("email").is_empty()
        && repo::get_user_by_email(&state.pool, &form.email).map_err(ApiError::from_db)?.is_some()
    {
        errors.add("email", EMAIL_TAKEN);
    }
    errors.into_result().map_err(ApiError::Validation)?;

    let password_hash = auth::hash_password(&form.password)?;
    let user = repo::create_user(&state.pool, &form.username, &form.email, &password_hash)
        .map_err(ApiError::from_db)?;

    info!("Registered user {}", user.get_id());
    Ok(redirect_with_flash(
        jar,
        FlashLevel::Success,
        "Your account has been created! You are now able to log in",
        "/login",
    ))
}

/// Handler for the login page
#[instrument(skip_all)]
pub async fn login_page_handler(jar: SignedCookieJar, MaybeUser(user): MaybeUser) -> Response {
    if user.is_some() {
        return already_logged_in();
    }
    let page = FormPage { legend: "Log In", form: LoginForm::default() };
    views::render(jar, None, Some("Login"), page).into_response()
}

/// Handler for logging in
///
/// This function handles POST requests to `/login`. On success the session
/// cookie is set and the browser is sent to `next` when it is a local path,
/// otherwise to `/`. Bad credentials re-render the login page with a flash.
#[instrument(skip_all, fields(email = %form.email))]
pub async fn login_handler(
    State(state): State<AppState>,
    jar: SignedCookieJar,
    MaybeUser(user): MaybeUser,
    Query(next): Query<NextQuery>,
    Form(form): Form<LoginForm>,
) -> Result<Response, ApiError> {
    if user.is_some() {
        return Ok(already_logged_in());
    }
    form.validate().map_err(ApiError::Validation)?;

    let user = repo::get_user_by_email(&state.pool, &form.email).map_err(ApiError::from_db)?;
    match user {
        Some(user) if auth::verify_password(&form.password, user.get_password_hash()) => {
            info!("User {} logged in", user.get_id());
            let jar = auth::login_user(jar, &user, form.remember(), state.remember_days);
            let target = next.local_target().unwrap_or("/");
            Ok((jar, Redirect::to(target)).into_response())
        }
        _ => {
            debug!("Login rejected");
            let jar = flash::push(jar, FlashLevel::Danger, "Login Unsuccessful. Please check email and password");
            let form = LoginForm { password: String::new(), ..form };
            let page = FormPage { legend: "Log In", form };
            Ok(views::render(jar, None, Some("Login"), page).into_response())
        }
    }
}

/// Handler for `/logout`
#[instrument(skip_all)]
pub async fn logout_handler(jar: SignedCookieJar) -> impl IntoResponse {
    (auth::logout_user(jar), Redirect::to("/"))
}

fn account_page(user: &User, form: AccountForm) -> AccountPage {
    AccountPage {
        legend: "Account Info",
        image_file: static_url(PROFILE_PICS, &user.get_profile_image()),
        form,
    }
}

/// Handler for the account page
#[instrument(skip_all, fields(user_id = %user.get_id()))]
pub async fn account_page_handler(jar: SignedCookieJar, CurrentUser(user): CurrentUser) -> Rendered<AccountPage> {
    let form = AccountForm { username: user.get_username(), email: user.get_email() };
    let page = account_page(&user, form);
    views::render(jar, Some(user), Some("Account"), page)
}

/// Handler for updating the account
///
/// This function handles multipart POST requests to `/account` with the
/// fields `username`, `email` and an optional `picture`. A new picture is
/// stored as a thumbnail and becomes the profile picture.
#[instrument(skip_all, fields(user_id = %user.get_id()))]
pub async fn update_account_handler(
    State(state): State<AppState>,
    jar: SignedCookieJar,
    CurrentUser(user): CurrentUser,
    multipart: Multipart,
) -> Result<Response, ApiError> {
    let mut body = MultipartForm::read(multipart).await?;
    let form = AccountForm { username: body.text("username"), email: body.text("email") };
    let picture = body.take_file("picture");

    let mut errors = form.validate().err().unwrap_or_default();
    if errors.get("username").is_empty()
        && form.username != user.get_username()
        && repo::get_user_by_username(&state.pool, &form.username).map_err(ApiError::from_db)?.is_some()
    {
        errors.add("username", USERNAME_TAKEN);
    }
    if errors.get("email").is_empty()
        && form.email != user.get_email()
        && repo::get_user_by_email(&state.pool, &form.email).map_err(ApiError::from_db)?.is_some()
    {
        errors.add("email", EMAIL_TAKEN);
    }
    if let Some(picture) = &picture {
        errors.merge(picture.validate_image("picture").err().unwrap_or_default());
    }
    errors.into_result().map_err(ApiError::Validation)?;

    let profile_image = match &picture {
        Some(picture) => Some(store_picture(&state, picture, "picture", PROFILE_PICS)?),
        None => None,
    };

    let updated = repo::update_account(
        &state.pool,
        user.get_id(),
        &form.username,
        &form.email,
        profile_image.as_deref(),
    );
    discard_picture_on_error(&state.images, PROFILE_PICS, profile_image.as_deref(), updated)?;

    info!("Account {} updated", user.get_id());
    Ok(redirect_with_flash(jar, FlashLevel::Success, "Your account has been updated!", "/account"))
}

/// Handler for one seller's items
///
/// This function handles GET requests to `/user/{username}`.
///
/// ### Returns
///
/// The seller's listing page, or 404 for an unknown username or a page past
/// the end
#[instrument(skip_all, fields(username = %username))]
pub async fn user_items_handler(
    State(state): State<AppState>,
    jar: SignedCookieJar,
    MaybeUser(current): MaybeUser,
    Path(username): Path<String>,
    Query(query): Query<PageQuery>,
) -> Result<Rendered<SellerPage>, ApiError> {
    let page = requested_page(&query)?;

    let seller = repo::get_user_by_username(&state.pool, &username)
        .map_err(ApiError::from_db)?
        .ok_or(ApiError::NotFound)?;

    let items = repo::list_items_for_user(&state.pool, seller.get_id(), page).map_err(ApiError::from_db)?;
    ensure_page_exists(&items)?;

    Ok(views::render(jar, current, None, SellerPage { seller, items }))
}

/// Mails a reset link to `user`
async fn send_reset_email(state: &AppState, user: &User) -> Result<(), ApiError> {
    let token = state
        .reset_tokens
        .get_reset_token(user.get_id())
        .map_err(|e| ApiError::Internal(anyhow::Error::new(e).context("Failed to sign reset token")))?;

    let body = format!(
        "To reset your password, visit the following link:\n\
         {}/reset_password/{}\n\n\
         If you did not make this request then simply ignore this email and no changes will be made.\n",
        state.public_url, token
    );

    state
        .mailer
        .send(&user.get_email(), RESET_MAIL_SUBJECT, body)
        .await
        .map_err(|e| ApiError::Internal(anyhow::Error::new(e).context("Failed to send reset mail")))
}

/// Handler for the "forgot password" page
#[instrument(skip_all)]
pub async fn reset_request_page_handler(jar: SignedCookieJar, MaybeUser(user): MaybeUser) -> Response {
    if user.is_some() {
        return already_logged_in();
    }
    let page = FormPage { legend: "Reset Password", form: RequestResetForm::default() };
    views::render(jar, None, Some("Reset Password"), page).into_response()
}

/// Handler for requesting a reset link
///
/// This function handles POST requests to `/reset_password`. The address
/// must belong to an account.
#[instrument(skip_all)]
pub async fn reset_request_handler(
    State(state): State<AppState>,
    jar: SignedCookieJar,
    MaybeUser(user): MaybeUser,
    Form(form): Form<RequestResetForm>,
) -> Result<Response, ApiError> {
    if user.is_some() {
        return Ok(already_logged_in());
    }
    form.validate().map_err(ApiError::Validation)?;

    let user = repo::get_user_by_email(&state.pool, &form.email)
        .map_err(ApiError::from_db)?
        .ok_or_else(|| ApiError::invalid("email", NO_ACCOUNT_FOR_EMAIL))?;

    send_reset_email(&state, &user).await?;

    info!("Reset link sent to user {}", user.get_id());
    Ok(redirect_with_flash(
        jar,
        FlashLevel::Info,
        "An email has been sent with instructions to reset your password.",
        "/login",
    ))
}

fn invalid_token(jar: SignedCookieJar) -> Response {
    redirect_with_flash(jar, FlashLevel::Warning, "That is an invalid or expired token", "/reset_password")
}

/// Handler for the page behind a reset link
#[instrument(skip_all)]
pub async fn reset_token_page_handler(
    State(state): State<AppState>,
    jar: SignedCookieJar,
    MaybeUser(user): MaybeUser,
    Path(token): Path<String>,
) -> Response {
    if user.is_some() {
        return already_logged_in();
    }
    if state.reset_tokens.verify_reset_token(&state.pool, &token).is_none() {
        return invalid_token(jar);
    }
    let page = FormPage { legend: "Reset Password", form: ResetPasswordForm::default() };
    views::render(jar, None, Some("Reset Password"), page).into_response()
}

/// Handler for choosing a new password through a reset link
///
/// This function handles POST requests to `/reset_password/{token}`.
#[instrument(skip_all)]
pub async fn reset_token_handler(
    State(state): State<AppState>,
    jar: SignedCookieJar,
    MaybeUser(user): MaybeUser,
    Path(token): Path<String>,
    Form(form): Form<ResetPasswordForm>,
) -> Result<Response, ApiError> {
    if user.is_some() {
        return Ok(already_logged_in());
    }
    let Some(user) = state.reset_tokens.verify_reset_token(&state.pool, &token) else {
        warn!("Password reset attempted with an unusable token");
        return Ok(invalid_token(jar));
    };
    form.validate().map_err(ApiError::Validation)?;

    let password_hash = auth::hash_password(&form.password)?;
    repo::update_password(&state.pool, user.get_id(), &password_hash).map_err(ApiError::from_db)?;

    info!("Password reset for user {}", user.get_id());
    Ok(redirect_with_flash(
        jar,
        FlashLevel::Success,
        "Your password has been updated! You are now able to log in",
        "/login",
    ))
}
