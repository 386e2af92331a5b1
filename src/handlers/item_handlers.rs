use axum::{
    extract::{Multipart, Path, State},
    response::Response,
    Form,
};
use axum_extra::extract::cookie::SignedCookieJar;
use serde::Serialize;
use tracing::{instrument, debug, info, warn};

use crate::auth::{CurrentUser, MaybeUser};
use crate::dto::{ItemForm, REQUIRED};
use crate::errors::ApiError;
use crate::flash::FlashLevel;
use crate::images::ITEM_PICS;
use crate::models::{Item, User};
use crate::repo::{self, PLACEHOLDER_IMAGE_TITLE};
use crate::views::{self, redirect_with_flash, FormPage, Rendered};
use crate::AppState;

use super::{discard_picture_on_error, parse_id, static_url, store_picture, MultipartForm};

/// One picture on the item page
#[derive(Serialize, Debug)]
pub struct ImageView {
    pub id: i32,
    pub title: String,
    pub url: String,
}

#[derive(Serialize, Debug)]
pub struct ItemPage {
    pub item: Item,
    pub seller: String,
    pub images: Vec<ImageView>,
    pub is_owner: bool,
}

/// Loads an item, 404 when it is missing
fn find_item(state: &AppState, item_id: i32) -> Result<Item, ApiError> {
    repo::get_item(&state.pool, item_id)
        .map_err(ApiError::from_db)?
        .ok_or(ApiError::NotFound)
}

/// Loads an item that `user` is allowed to change
///
/// ### Errors
///
/// `NotFound` when the item is missing, `Forbidden` when `user` is not the
/// seller
fn owned_item(state: &AppState, item_id: i32, user: &User) -> Result<Item, ApiError> {
    let item = find_item(state, item_id)?;
    if !item.is_owned_by(user) {
        warn!("User {} may not change item {}", user.get_id(), item_id);
        return Err(ApiError::Forbidden);
    }
    Ok(item)
}

/// Validated title, description and value of an item form
fn item_fields(form: &ItemForm) -> Result<f64, ApiError> {
    form.validate().map_err(ApiError::Validation)?;
    form.parsed_value()
        .ok_or_else(|| ApiError::invalid("value", "Not a valid float value."))
}

/// Handler for the "new item" page
#[instrument(skip_all, fields(user_id = %user.get_id()))]
pub async fn new_item_page_handler(jar: SignedCookieJar, CurrentUser(user): CurrentUser) -> Rendered<FormPage<ItemForm>> {
    let page = FormPage { legend: "New Item", form: ItemForm::default() };
    views::render(jar, Some(user), Some("New Item"), page)
}

/// Handler for posting a new item
///
/// This function handles POST requests to `/item/new`. The item is owned by
/// the session user and starts with a placeholder picture.
///
/// ### Returns
///
/// A redirect to `/`, or 422 with the failing fields
#[instrument(skip_all, fields(user_id = %user.get_id(), title = %form.title))]
pub async fn create_item_handler(
    State(state): State<AppState>,
    jar: SignedCookieJar,
    CurrentUser(user): CurrentUser,
    Form(form): Form<ItemForm>,
) -> Result<Response, ApiError> {
    let value = item_fields(&form)?;

    let item = repo::create_item(&state.pool, user.get_id(), &form.title, &form.description, value)
        .map_err(ApiError::from_db)?;

    info!("Item {} posted", item.get_id());
    Ok(redirect_with_flash(jar, FlashLevel::Success, "Your item has been posted!", "/"))
}

/// Handler for retrieving a specific item
///
/// This function handles GET requests to `/item/{id}`.
///
/// ### Returns
///
/// The item page with the seller's name and the item's pictures, or 404
#[instrument(skip_all, fields(item_id = %item_id))]
pub async fn item_page_handler(
    State(state): State<AppState>,
    jar: SignedCookieJar,
    MaybeUser(viewer): MaybeUser,
    Path(item_id): Path<String>,
) -> Result<Rendered<ItemPage>, ApiError> {
    let item = find_item(&state, parse_id(&item_id)?)?;

    let seller = repo::get_user(&state.pool, item.get_user_id())
        .map_err(ApiError::from_db)?
        .map(|seller| seller.get_username())
        .unwrap_or_default();

    let images = repo::get_images_for_item(&state.pool, item.get_id())
        .map_err(ApiError::from_db)?
        .into_iter()
        .map(|image| ImageView {
            id: image.get_id(),
            title: image.get_title(),
            url: static_url(ITEM_PICS, &image.get_item_image()),
        })
        .collect();

    let is_owner = viewer.as_ref().is_some_and(|viewer| item.is_owned_by(viewer));
    debug!("Item found, viewer is owner: {}", is_owner);

    let title = item.get_title();
    Ok(views::render(jar, viewer, Some(title.as_str()), ItemPage { item, seller, images, is_owner }))
}

/// Handler for the edit page of an item
#[instrument(skip_all, fields(item_id = %item_id))]
pub async fn update_item_page_handler(
    State(state): State<AppState>,
    jar: SignedCookieJar,
    CurrentUser(user): CurrentUser,
    Path(item_id): Path<String>,
) -> Result<Rendered<FormPage<ItemForm>>, ApiError> {
    let item = owned_item(&state, parse_id(&item_id)?, &user)?;

    let form = ItemForm {
        title: item.get_title(),
        description: item.get_description(),
        value: format!("{:.2}", item.get_value()),
    };
    Ok(views::render(jar, Some(user), Some("Update Item"), FormPage { legend: "Update Item", form }))
}

/// Handler for updating an item
///
/// This function handles POST requests to `/item/{id}/update`. Title,
/// description and value are replaced; the posting date is kept.
#[instrument(skip_all, fields(item_id = %item_id))]
pub async fn update_item_handler(
    State(state): State<AppState>,
    jar: SignedCookieJar,
    CurrentUser(user): CurrentUser,
    Path(item_id): Path<String>,
    Form(form): Form<ItemForm>,
) -> Result<Response, ApiError> {
    let item = owned_item(&state, parse_id(&item_id)?, &user)?;
    let value = item_fields(&form)?;

    repo::update_item(&state.pool, item.get_id(), &form.title, &form.description, value)
        .map_err(ApiError::from_db)?;

    info!("Item {} updated", item.get_id());
    Ok(redirect_with_flash(
        jar,
        FlashLevel::Success,
        "Your item has been updated!",
        &format!("/item/{}", item.get_id()),
    ))
}

/// Handler for deleting an item
///
/// This function handles POST requests to `/item/{id}/delete`. The item's
/// pictures are removed with it.
#[instrument(skip_all, fields(item_id = %item_id))]
pub async fn delete_item_handler(
    State(state): State<AppState>,
    jar: SignedCookieJar,
    CurrentUser(user): CurrentUser,
    Path(item_id): Path<String>,
) -> Result<Response, ApiError> {
    let item = owned_item(&state, parse_id(&item_id)?, &user)?;

    repo::delete_item(&state.pool, item.get_id()).map_err(ApiError::from_db)?;

    info!("Item {} removed", item.get_id());
    Ok(redirect_with_flash(jar, FlashLevel::Success, "Your item has been removed!", "/"))
}

/// Handler for adding a picture to an item
///
/// This function handles multipart POST requests to `/item/{id}/images` with
/// a required `item_image` file and an optional `title`. The first upload
/// replaces the placeholder picture.
#[instrument(skip_all, fields(item_id = %item_id))]
pub async fn add_item_image_handler(
    State(state): State<AppState>,
    jar: SignedCookieJar,
    CurrentUser(user): CurrentUser,
    Path(item_id): Path<String>,
    multipart: Multipart,
) -> Result<Response, ApiError> {
    let item = owned_item(&state, parse_id(&item_id)?, &user)?;

    let mut body = MultipartForm::read(multipart).await?;
    let upload = body
        .take_file("item_image")
        .ok_or_else(|| ApiError::invalid("item_image", REQUIRED))?;

    let caption = body.text("title");
    let title = match caption.trim() {
        "" => PLACEHOLDER_IMAGE_TITLE,
        trimmed => trimmed,
    };
    if title.chars().count() > 100 {
        return Err(ApiError::invalid("title", "Field must be between 1 and 100 characters long."));
    }

    let filename = store_picture(&state, &upload, "item_image", ITEM_PICS)?;
    let added = repo::add_item_image(&state.pool, item.get_id(), title, &filename);
    discard_picture_on_error(&state.images, ITEM_PICS, Some(filename.as_str()), added)?;

    info!("Picture {} added to item {}", filename, item.get_id());
    Ok(redirect_with_flash(
        jar,
        FlashLevel::Success,
        "Your image has been added!",
        &format!("/item/{}", item.get_id()),
    ))
}
