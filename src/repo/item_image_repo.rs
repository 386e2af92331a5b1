use crate::db::DbPool;
use crate::models::{ItemImage, NewItemImage, DEFAULT_ITEM_IMAGE};
use crate::schema::item_images;
use diesel::prelude::*;
use anyhow::Result;
use tracing::{instrument, debug, info};

/// Stores a picture for an item
///
/// The placeholder row created with the item is reused when it is still
/// present; otherwise a new row is added.
///
/// ### Arguments
///
/// * `pool` - A reference to the database connection pool
/// * `item_id` - The item the picture belongs to
/// * `title` - Caption of the picture
/// * `filename` - Name of the stored file under the item pictures directory
///
/// ### Errors
///
/// Returns an error if the item does not exist (foreign key violation)
#[instrument(skip(pool), fields(item_id = %item_id))]
pub fn add_item_image(pool: &DbPool, item_id: i32, title: &str, filename: &str) -> Result<ItemImage> {
    debug!("Adding picture to item");

    let conn = &mut pool.get()?;

    let image = conn.transaction::<_, diesel::result::Error, _>(|conn| {
        let placeholder = item_images::table
            .filter(item_images::item_id.eq(item_id))
            .filter(item_images::item_image.eq(DEFAULT_ITEM_IMAGE))
            .select(ItemImage::as_select())
            .first(conn)
            .optional()?;

        match placeholder {
            Some(placeholder) => diesel::update(item_images::table.find(placeholder.get_id()))
                .set((
                    item_images::title.eq(title),
                    item_images::item_image.eq(filename),
                ))
                .returning(ItemImage::as_returning())
                .get_result(conn),
            None => diesel::insert_into(item_images::table)
                .values(&NewItemImage { title, item_image: filename, item_id })
                .returning(ItemImage::as_returning())
                .get_result(conn),
        }
    })?;

    info!("Stored picture {} for item {}", image.get_id(), item_id);
    Ok(image)
}

/// Lists the pictures of an item in insertion order
#[instrument(skip(pool), fields(item_id = %item_id))]
pub fn get_images_for_item(pool: &DbPool, item_id: i32) -> Result<Vec<ItemImage>> {
    let conn = &mut pool.get()?;

    let images = item_images::table
        .filter(item_images::item_id.eq(item_id))
        .order(item_images::id.asc())
        .select(ItemImage::as_select())
        .load(conn)?;

    Ok(images)
}
