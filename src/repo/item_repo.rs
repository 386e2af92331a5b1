use crate::db::DbPool;
use crate::models::{Item, ItemImage, NewItem, NewItemImage, DEFAULT_ITEM_IMAGE};
use crate::models::round_to_cents;
use crate::schema::{item_images, items, users};
use diesel::prelude::*;
use anyhow::Result;
use serde::Serialize;
use tracing::{instrument, debug, info};

use super::pagination::{Paginated, PER_PAGE};

/// Title of the picture row created alongside every new item
pub const PLACEHOLDER_IMAGE_TITLE: &str = "item image";

/// An item as shown in a listing
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct ItemListing {
    #[serde(flatten)]
    pub item: Item,
    /// Username of the seller
    pub seller: String,
    /// First picture of the item, if it has any
    pub image_file: Option<String>,
}

/// Creates a new item owned by `user_id`
///
/// The item is inserted together with a placeholder picture row, in one
/// transaction.
///
/// ### Errors
///
/// Returns an error if:
/// - Unable to get a connection from the pool
/// - `user_id` does not name an existing user (foreign key violation)
#[instrument(skip(pool, description), fields(user_id = %user_id, title = %title))]
pub fn create_item(pool: &DbPool, user_id: i32, title: &str, description: &str, value: f64) -> Result<Item> {
    debug!("Creating new item");

    let conn = &mut pool.get()?;
    let new_item = NewItem::new(title, description, value, user_id);

    let item = conn.transaction::<_, diesel::result::Error, _>(|conn| {
        let item = diesel::insert_into(items::table)
            .values(&new_item)
            .returning(Item::as_returning())
            .get_result(conn)?;

        diesel::insert_into(item_images::table)
            .values(&NewItemImage {
                title: PLACEHOLDER_IMAGE_TITLE,
                item_image: DEFAULT_ITEM_IMAGE,
                item_id: item.get_id(),
            })
            .execute(conn)?;

        Ok(item)
    })?;

    info!("Successfully created item with id: {}", item.get_id());
    Ok(item)
}

/// Retrieves an item from the database by its ID
///
/// ### Returns
///
/// A Result containing an Option with the Item if found, or None if not found
#[instrument(skip(pool), fields(item_id = %item_id))]
pub fn get_item(pool: &DbPool, item_id: i32) -> Result<Option<Item>> {
    debug!("Retrieving item by id");

    let conn = &mut pool.get()?;

    let result = items::table
        .find(item_id)
        .select(Item::as_select())
        .first(conn)
        .optional()?;

    if result.is_none() {
        debug!("Item not found");
    }

    Ok(result)
}

/// Updates the editable fields of an item
///
/// `date_posted` and the owner never change.
///
/// ### Errors
///
/// Returns an error if the item is not found
#[instrument(skip(pool, description), fields(item_id = %item_id))]
pub fn update_item(pool: &DbPool, item_id: i32, title: &str, description: &str, value: f64) -> Result<Item> {
    debug!("Updating item by id");

    let conn = &mut pool.get()?;

    let item = diesel::update(items::table.find(item_id))
        .set((
            items::title.eq(title),
            items::description.eq(description),
            items::value.eq(round_to_cents(value)),
        ))
        .returning(Item::as_returning())
        .get_result(conn)
        .optional()?
        .ok_or_else(|| anyhow::anyhow!("Item with id {} not found", item_id))?;

    info!("Successfully updated item with id: {}", item_id);
    Ok(item)
}

/// Deletes an item and its pictures
///
/// Both deletes run in one transaction so no picture row is left pointing at
/// a missing item.
#[instrument(skip(pool), fields(item_id = %item_id))]
pub fn delete_item(pool: &DbPool, item_id: i32) -> Result<()> {
    debug!("Deleting item by id");

    let conn = &mut pool.get()?;

    let (images, deleted) = conn.transaction::<_, diesel::result::Error, _>(|conn| {
        let images = diesel::delete(item_images::table.filter(item_images::item_id.eq(item_id)))
            .execute(conn)?;
        let deleted = diesel::delete(items::table.find(item_id)).execute(conn)?;
        Ok((images, deleted))
    })?;

    if deleted == 0 {
        return Err(anyhow::anyhow!("Item with id {} not found", item_id));
    }

    info!("Deleted item {} and {} picture(s)", item_id, images);
    Ok(())
}

/// Attaches the first picture of each item and the seller name
fn into_listings(conn: &mut SqliteConnection, rows: Vec<(Item, String)>) -> QueryResult<Vec<ItemListing>> {
    let (page_items, sellers): (Vec<Item>, Vec<String>) = rows.into_iter().unzip();

    let images = ItemImage::belonging_to(&page_items)
        .select(ItemImage::as_select())
        .order(item_images::id.asc())
        .load(conn)?
        .grouped_by(&page_items);

    Ok(page_items
        .into_iter()
        .zip(sellers)
        .zip(images)
        .map(|((item, seller), images)| ItemListing {
            item,
            seller,
            image_file: images.first().map(ItemImage::get_item_image),
        })
        .collect())
}

/// Lists every item, newest first, one page at a time
///
/// Items posted at the same instant are ordered by descending id so the
/// order is stable across requests.
///
/// ### Arguments
///
/// * `pool` - A reference to the database connection pool
/// * `page` - 1-based page number
#[instrument(skip(pool))]
pub fn list_items(pool: &DbPool, page: i64) -> Result<Paginated<ItemListing>> {
    debug!("Listing items");

    let conn = &mut pool.get()?;

    let total: i64 = items::table.count().get_result(conn)?;

    let rows: Vec<(Item, String)> = items::table
        .inner_join(users::table)
        .order((items::date_posted.desc(), items::id.desc()))
        .limit(PER_PAGE)
        .offset(Paginated::<ItemListing>::offset(page, PER_PAGE))
        .select((Item::as_select(), users::username))
        .load(conn)?;

    let listings = into_listings(conn, rows)?;

    info!("Retrieved {} of {} items for page {}", listings.len(), total, page);
    Ok(Paginated::new(listings, page, PER_PAGE, total))
}

/// Lists the items of one seller, newest first, one page at a time
#[instrument(skip(pool), fields(user_id = %user_id))]
pub fn list_items_for_user(pool: &DbPool, user_id: i32, page: i64) -> Result<Paginated<ItemListing>> {
    debug!("Listing items for user");

    let conn = &mut pool.get()?;

    let total: i64 = items::table
        .filter(items::user_id.eq(user_id))
        .count()
        .get_result(conn)?;

    let rows: Vec<(Item, String)> = items::table
        .inner_join(users::table)
        .filter(items::user_id.eq(user_id))
        .order((items::date_posted.desc(), items::id.desc()))
        .limit(PER_PAGE)
        .offset(Paginated::<ItemListing>::offset(page, PER_PAGE))
        .select((Item::as_select(), users::username))
        .load(conn)?;

    let listings = into_listings(conn, rows)?;

    info!("Retrieved {} of {} items for user {}", listings.len(), total, user_id);
    Ok(Paginated::new(listings, page, PER_PAGE, total))
}
