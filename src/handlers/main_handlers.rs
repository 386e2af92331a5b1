use axum::extract::State;
use axum_extra::extract::cookie::SignedCookieJar;
use axum_extra::extract::Query;
use serde::Serialize;
use tracing::{instrument, debug};

use crate::auth::MaybeUser;
use crate::dto::PageQuery;
use crate::errors::ApiError;
use crate::repo::{self, ItemListing, Paginated};
use crate::views::{self, Rendered};
use crate::AppState;

use super::{ensure_page_exists, requested_page};

#[derive(Serialize, Debug)]
pub struct ListingPage {
    pub items: Paginated<ItemListing>,
}

#[derive(Serialize, Debug)]
pub struct AboutPage {}

/// Handler for the front page
///
/// This function handles GET requests to `/` and `/index`, listing every
/// item newest first, five per page.
///
/// ### Returns
///
/// The listing page, or 404 for a page that does not exist
#[instrument(skip_all, fields(page = ?query.page))]
pub async fn home_handler(
    State(state): State<AppState>,
    jar: SignedCookieJar,
    MaybeUser(user): MaybeUser,
    Query(query): Query<PageQuery>,
) -> Result<Rendered<ListingPage>, ApiError> {
    let page = requested_page(&query)?;
    debug!("Listing page {}", page);

    let items = repo::list_items(&state.pool, page).map_err(ApiError::from_db)?;
    ensure_page_exists(&items)?;

    Ok(views::render(jar, user, None, ListingPage { items }))
}

/// Handler for `/about`
#[instrument(skip_all)]
pub async fn about_handler(jar: SignedCookieJar, MaybeUser(user): MaybeUser) -> Rendered<AboutPage> {
    views::render(jar, user, Some("About"), AboutPage {})
}
