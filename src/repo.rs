/// Repository module
///
/// This module provides the data access layer for the application.
/// It contains functions for creating, retrieving, updating and deleting
/// users, items and item pictures, plus the paginated listings.
///
/// The repository pattern abstracts away the details of database access
/// and provides a clean API for the rest of the application to use.

mod pagination;
mod user_repo;
mod item_repo;
mod item_image_repo;

// Re-export all repository functions
pub use pagination::*;
pub use user_repo::*;
pub use item_repo::*;
pub use item_image_repo::*;
