/// Route handlers
///
/// This module contains the handlers for the marketplace's pages and forms.
/// Each handler is responsible for processing a specific type of HTTP request,
/// extracting the session user and form data, calling the appropriate
/// repository functions, and answering with a page view or a redirect.

mod main_handlers;
mod user_handlers;
mod item_handlers;

// Re-export all handlers
pub use main_handlers::*;
pub use user_handlers::*;
pub use item_handlers::*;

use axum::extract::Multipart;
use std::collections::HashMap;
use tracing::{debug, warn};

use crate::dto::{PageQuery, Upload};
use crate::errors::ApiError;
use crate::images::{ImageError, ImageStore};
use crate::repo::Paginated;
use crate::AppState;

/// Fields and files of a `multipart/form-data` body
///
/// File inputs left empty by the browser (no filename or no bytes) are
/// dropped.
#[derive(Debug, Default)]
pub struct MultipartForm {
    fields: HashMap<String, String>,
    files: HashMap<String, Upload>,
}

impl MultipartForm {
    pub async fn read(mut multipart: Multipart) -> Result<Self, ApiError> {
        let mut form = Self::default();

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| ApiError::BadRequest(e.body_text()))?
        {
            let Some(name) = field.name().map(str::to_string) else {
                continue;
            };

            match field.file_name().map(str::to_string) {
                Some(file_name) => {
                    let bytes = field.bytes().await.map_err(|e| ApiError::BadRequest(e.body_text()))?;
                    if file_name.is_empty() || bytes.is_empty() {
                        debug!("Ignoring empty file field {}", name);
                        continue;
                    }
                    form.files.insert(name, Upload { file_name, bytes: bytes.to_vec() });
                }
                None => {
                    let text = field.text().await.map_err(|e| ApiError::BadRequest(e.body_text()))?;
                    form.fields.insert(name, text);
                }
            }
        }

        Ok(form)
    }

    /// A text field, empty when absent
    pub fn text(&self, name: &str) -> String {
        self.fields.get(name).cloned().unwrap_or_default()
    }

    pub fn take_file(&mut self, name: &str) -> Option<Upload> {
        self.files.remove(name)
    }
}

/// The requested listing page; anything below 1 does not exist
fn requested_page(query: &PageQuery) -> Result<i64, ApiError> {
    let page = query.page();
    if page < 1 {
        debug!("Rejecting page {}", page);
        return Err(ApiError::NotFound);
    }
    Ok(page)
}

/// Only the first page may be empty
fn ensure_page_exists<T>(listing: &Paginated<T>) -> Result<(), ApiError> {
    if listing.items.is_empty() && listing.page != 1 {
        debug!("Page {} is past the end of the listing", listing.page);
        return Err(ApiError::NotFound);
    }
    Ok(())
}

/// Numeric ids in paths; anything else names nothing
fn parse_id(raw: &str) -> Result<i32, ApiError> {
    raw.parse::<i32>().map_err(|_| ApiError::NotFound)
}

/// Validates and stores an uploaded picture under `subdir`
///
/// Problems with the file itself are reported against `field`.
fn store_picture(state: &AppState, upload: &Upload, field: &str, subdir: &str) -> Result<String, ApiError> {
    upload.validate_image(field).map_err(ApiError::Validation)?;

    state.images.save_picture(upload, subdir).map_err(|e| match e {
        ImageError::UnsupportedExtension(_) | ImageError::Decode(_) => {
            warn!("Rejected upload {:?}: {}", upload.file_name, e);
            ApiError::invalid(field, "The file could not be read as a picture.")
        }
        other => ApiError::Internal(anyhow::Error::new(other).context("Failed to store picture")),
    })
}

/// Passes a repository result through, deleting the just-stored picture
/// when the row that would refer to it was not written
fn discard_picture_on_error<T>(
    images: &ImageStore,
    subdir: &str,
    filename: Option<&str>,
    result: anyhow::Result<T>,
) -> Result<T, ApiError> {
    result.map_err(|e| {
        if let Some(filename) = filename {
            if let Err(io) = images.remove_picture(subdir, filename) {
                warn!("Could not remove orphaned picture {}: {}", filename, io);
            }
        }
        ApiError::from_db(e)
    })
}

/// Path of a stored picture under `/static`
fn static_url(subdir: &str, filename: &str) -> String {
    format!("/static/{}/{}", subdir, filename)
}
