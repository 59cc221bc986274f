//! Upload validation and photo storage.
//!
//! # Responsibility
//! - Gate uploads on size and on decoding as JPEG, PNG or GIF.
//! - Store accepted person photos under generated file names.
//!
//! # Invariants
//! - Stored photo names are `{uuid}.{ext}`; caller-supplied names never reach
//!   the file system.

use image::ImageFormat;
use log::warn;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;
use uuid::Uuid;

/// Upload size ceiling in megabytes.
pub const MAX_IMAGE_MB: usize = 5;
pub const MAX_IMAGE_BYTES: usize = MAX_IMAGE_MB * 1024 * 1024;
pub const ALLOWED_FORMATS: [ImageFormat; 3] = [ImageFormat::Jpeg, ImageFormat::Png, ImageFormat::Gif];

/// Reason an upload was refused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageRejection {
    TooLarge { size: usize },
    Unsupported(ImageFormat),
    Invalid(String),
}

impl Display for ImageRejection {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TooLarge { .. } => write!(f, "File size exceeds {MAX_IMAGE_MB}MB limit"),
            Self::Unsupported(_) => write!(
                f,
                "Unsupported image format. Allowed: {}",
                ALLOWED_FORMATS
                    .iter()
                    .map(format_label)
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
            Self::Invalid(reason) => write!(f, "Invalid image file: {reason}"),
        }
    }
}

impl Error for ImageRejection {}

/// Checks size, detected format and that the bytes decode fully.
pub fn validate_image(bytes: &[u8]) -> Result<ImageFormat, ImageRejection> {
    if bytes.len() > MAX_IMAGE_BYTES {
        return Err(ImageRejection::TooLarge { size: bytes.len() });
    }

    let format =
        image::guess_format(bytes).map_err(|err| ImageRejection::Invalid(err.to_string()))?;
    if !ALLOWED_FORMATS.contains(&format) {
        return Err(ImageRejection::Unsupported(format));
    }

    image::load_from_memory_with_format(bytes, format)
        .map_err(|err| ImageRejection::Invalid(err.to_string()))?;
    Ok(format)
}

fn format_label(format: &ImageFormat) -> &'static str {
    match format {
        ImageFormat::Jpeg => "JPEG",
        ImageFormat::Png => "PNG",
        ImageFormat::Gif => "GIF",
        _ => "other",
    }
}

/// Directory of stored person photos.
#[derive(Debug, Clone)]
pub struct PhotoStore {
    dir: PathBuf,
}

impl PhotoStore {
    /// Opens (creating if needed) the uploads directory.
    pub fn open(dir: impl Into<PathBuf>) -> std::io::Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn path_of(&self, file_name: &str) -> PathBuf {
        self.dir.join(file_name)
    }

    /// Writes `bytes` under a fresh name and returns that file name.
    pub fn save(&self, bytes: &[u8], format: ImageFormat) -> std::io::Result<String> {
        let extension = format.extensions_str().first().copied().unwrap_or("img");
        let file_name = format!("{}.{extension}", Uuid::new_v4());
        fs::write(self.path_of(&file_name), bytes)?;
        Ok(file_name)
    }

    /// Removes a stored photo; a missing file is not an error.
    pub fn remove(&self, file_name: &str) -> std::io::Result<()> {
        match fs::remove_file(self.path_of(file_name)) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                warn!("event=photo_remove module=media status=missing file={file_name}");
                Ok(())
            }
            Err(err) => Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Rgb};
    use std::io::Cursor;

    fn encoded(format: ImageFormat) -> Vec<u8> {
        let img = ImageBuffer::from_pixel(2, 2, Rgb([200u8, 10, 10]));
        let mut bytes = Cursor::new(Vec::new());
        img.write_to(&mut bytes, format).unwrap();
        bytes.into_inner()
    }

    #[test]
    fn accepts_png_and_jpeg() {
        assert_eq!(validate_image(&encoded(ImageFormat::Png)), Ok(ImageFormat::Png));
        assert_eq!(validate_image(&encoded(ImageFormat::Jpeg)), Ok(ImageFormat::Jpeg));
    }

    #[test]
    fn rejects_oversized_upload_before_decoding() {
        let bytes = vec![0u8; MAX_IMAGE_BYTES + 1];
        let err = validate_image(&bytes).unwrap_err();
        assert_eq!(err, ImageRejection::TooLarge { size: MAX_IMAGE_BYTES + 1 });
        assert_eq!(err.to_string(), "File size exceeds 5MB limit");
    }

    #[test]
    fn rejects_non_image_bytes() {
        let err = validate_image(b"definitely not an image").unwrap_err();
        assert!(matches!(err, ImageRejection::Invalid(_)));
        assert!(err.to_string().starts_with("Invalid image file: "));
    }

    #[test]
    fn rejects_truncated_png() {
        let bytes = encoded(ImageFormat::Png);
        let err = validate_image(&bytes[..bytes.len() / 2]).unwrap_err();
        assert!(matches!(err, ImageRejection::Invalid(_)));
    }

    #[test]
    fn rejects_formats_outside_allow_list() {
        let mut bmp = b"BM".to_vec();
        bmp.extend_from_slice(&[0u8; 64]);
        let err = validate_image(&bmp).unwrap_err();
        assert_eq!(err, ImageRejection::Unsupported(ImageFormat::Bmp));
        assert_eq!(
            err.to_string(),
            "Unsupported image format. Allowed: JPEG, PNG, GIF"
        );
    }

    #[test]
    fn photo_store_saves_under_generated_names() {
        let dir = tempfile::tempdir().unwrap();
        let store = PhotoStore::open(dir.path().join("uploads")).unwrap();
        let name = store.save(b"png-bytes", ImageFormat::Png).unwrap();
        assert!(name.ends_with(".png"));
        assert!(store.path_of(&name).exists());

        store.remove(&name).unwrap();
        assert!(!store.path_of(&name).exists());
        store.remove(&name).unwrap();
    }
}
