use diesel::prelude::*;
use serde::{Deserialize, Serialize};

use super::Item;
use crate::schema::item_images;

/// Placeholder picture attached to freshly posted items
pub const DEFAULT_ITEM_IMAGE: &str = "default_item.png";

/// A picture of an item
#[derive(Queryable, Selectable, Identifiable, Associations, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[diesel(belongs_to(Item))]
#[diesel(table_name = item_images)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct ItemImage {
    id: i32,
    title: String,
    item_image: String,
    item_id: i32,
}

impl ItemImage {
    pub fn get_id(&self) -> i32 {
        self.id
    }

    pub fn get_title(&self) -> String {
        self.title.clone()
    }

    /// Filename under the item pictures directory
    pub fn get_item_image(&self) -> String {
        self.item_image.clone()
    }

    /// Whether this row still points at the placeholder picture
    pub fn is_placeholder(&self) -> bool {
        self.item_image == DEFAULT_ITEM_IMAGE
    }
}

#[derive(Insertable, Debug)]
#[diesel(table_name = item_images)]
pub struct NewItemImage<'a> {
    pub title: &'a str,
    pub item_image: &'a str,
    pub item_id: i32,
}
