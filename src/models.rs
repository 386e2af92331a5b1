/// Data models module
///
/// This module defines the records stored by the marketplace: the users who
/// sell things, the items they post, and the pictures attached to those items.
/// Each model maps to one table in `crate::schema`; the `New*` structs are the
/// matching insertables.

mod user;
pub use user::{NewUser, User, DEFAULT_PROFILE_IMAGE};

mod item;
pub use item::{round_to_cents, Item, NewItem};

mod item_image;
pub use item_image::{ItemImage, NewItemImage, DEFAULT_ITEM_IMAGE};
