//! Picture uploads
//!
//! Uploaded pictures are decoded, shrunk to fit a 125x125 box and written
//! under the static directory with a random name that keeps the original
//! extension.

use std::path::{Path, PathBuf};

use image::DynamicImage;
use rand::Rng;
use thiserror::Error;
use tracing::{debug, info};

use crate::dto::{Upload, ALLOWED_IMAGE_EXTENSIONS};

/// Bounding box of stored pictures
pub const THUMBNAIL_SIZE: (u32, u32) = (125, 125);

/// Subdirectory for account pictures
pub const PROFILE_PICS: &str = "profile_pics";
/// Subdirectory for item pictures
pub const ITEM_PICS: &str = "item_pics";

#[derive(Error, Debug)]
pub enum ImageError {
    #[error("unsupported picture extension: {0:?}")]
    UnsupportedExtension(Option<String>),
    #[error("could not decode picture: {0}")]
    Decode(#[source] image::ImageError),
    #[error("could not write picture: {0}")]
    Encode(#[source] image::ImageError),
    #[error("could not create picture directory: {0}")]
    Io(#[from] std::io::Error),
}

/// Where uploaded pictures live
#[derive(Debug, Clone)]
pub struct ImageStore {
    root: PathBuf,
}

impl ImageStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of a stored picture
    pub fn path_of(&self, subdir: &str, filename: &str) -> PathBuf {
        self.root.join(subdir).join(filename)
    }

    /// Deletes a stored picture
    pub fn remove_picture(&self, subdir: &str, filename: &str) -> std::io::Result<()> {
        let path = self.path_of(subdir, filename);
        debug!("Removing picture {:?}", path);
        std::fs::remove_file(path)
    }

    /// Resizes `upload` and stores it under `subdir`, returning the new filename
    pub fn save_picture(&self, upload: &Upload, subdir: &str) -> Result<String, ImageError> {
        let extension = upload
            .extension()
            .filter(|ext| ALLOWED_IMAGE_EXTENSIONS.contains(&ext.as_str()))
            .ok_or_else(|| ImageError::UnsupportedExtension(upload.extension()))?;

        let picture = image::load_from_memory(&upload.bytes).map_err(ImageError::Decode)?;
        let (max_w, max_h) = THUMBNAIL_SIZE;
        // Never upscale
        let mut thumbnail = if picture.width() > max_w || picture.height() > max_h {
            picture.thumbnail(max_w, max_h)
        } else {
            picture
        };
        if extension != "png" {
            // JPEG has no alpha channel
            thumbnail = DynamicImage::ImageRgb8(thumbnail.to_rgb8());
        }

        let dir = self.root.join(subdir);
        std::fs::create_dir_all(&dir)?;

        let filename = format!("{}.{}", random_hex(8), extension);
        let path = dir.join(&filename);
        debug!("Writing {}x{} picture to {:?}", thumbnail.width(), thumbnail.height(), path);
        thumbnail.save(&path).map_err(ImageError::Encode)?;

        info!("Stored picture {}", filename);
        Ok(filename)
    }
}

/// `len` random bytes as lower-case hex
fn random_hex(len: usize) -> String {
    let mut rng = rand::rng();
    (0..len).map(|_| format!("{:02x}", rng.random::<u8>())).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, RgbaImage};
    use std::io::Cursor;
    use tempfile::tempdir;

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let picture = DynamicImage::ImageRgba8(RgbaImage::new(width, height));
        let mut bytes = Cursor::new(Vec::new());
        picture.write_to(&mut bytes, ImageFormat::Png).unwrap();
        bytes.into_inner()
    }

    #[test]
    fn test_save_picture_shrinks_and_keeps_extension() {
        let dir = tempdir().unwrap();
        let store = ImageStore::new(dir.path());
        let upload = Upload { file_name: "holiday.PNG".to_string(), bytes: png_bytes(400, 200) };

        let filename = store.save_picture(&upload, PROFILE_PICS).unwrap();

        assert!(filename.ends_with(".png"));
        assert_eq!(filename.len(), 16 + ".png".len());
        let saved = image::open(store.path_of(PROFILE_PICS, &filename)).unwrap();
        assert_eq!(saved.width(), 125);
        assert!(saved.height() <= 125);
    }

    #[test]
    fn test_save_picture_converts_for_jpeg() {
        let dir = tempdir().unwrap();
        let store = ImageStore::new(dir.path());
        // PNG data uploaded under a .jpg name still ends up a valid JPEG
        let upload = Upload { file_name: "me.jpg".to_string(), bytes: png_bytes(50, 60) };

        let filename = store.save_picture(&upload, ITEM_PICS).unwrap();

        let saved = image::open(store.path_of(ITEM_PICS, &filename)).unwrap();
        assert_eq!((saved.width(), saved.height()), (50, 60));
    }

    #[test]
    fn test_save_picture_names_are_random() {
        let dir = tempdir().unwrap();
        let store = ImageStore::new(dir.path());
        let upload = Upload { file_name: "a.png".to_string(), bytes: png_bytes(10, 10) };

        let first = store.save_picture(&upload, ITEM_PICS).unwrap();
        let second = store.save_picture(&upload, ITEM_PICS).unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn test_save_picture_rejects_bad_input() {
        let dir = tempdir().unwrap();
        let store = ImageStore::new(dir.path());

        let gif = Upload { file_name: "a.gif".to_string(), bytes: png_bytes(10, 10) };
        assert!(matches!(store.save_picture(&gif, ITEM_PICS), Err(ImageError::UnsupportedExtension(_))));

        let junk = Upload { file_name: "a.png".to_string(), bytes: b"not a picture".to_vec() };
        assert!(matches!(store.save_picture(&junk, ITEM_PICS), Err(ImageError::Decode(_))));
    }

    #[test]
    fn test_remove_picture() {
        let dir = tempdir().unwrap();
        let store = ImageStore::new(dir.path());
        let upload = Upload { file_name: "a.png".to_string(), bytes: png_bytes(10, 10) };
        let filename = store.save_picture(&upload, PROFILE_PICS).unwrap();

        store.remove_picture(PROFILE_PICS, &filename).unwrap();

        assert!(!store.path_of(PROFILE_PICS, &filename).exists());
        assert!(store.remove_picture(PROFILE_PICS, &filename).is_err());
    }

    #[test]
    fn test_random_hex() {
        let hex = random_hex(8);
        assert_eq!(hex.len(), 16);
        assert!(hex.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }
}
