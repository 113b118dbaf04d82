//! Profile photo storage.
//!
//! Uploads are sniffed by content, never trusted by extension, and land in
//! one flat directory as `profile_<id>.<ext>` so a re-upload simply
//! replaces the previous file.

use std::path::PathBuf;

use thiserror::Error;
use tokio::fs;
use tracing::info;

/// Public URL prefix the stored photo paths start with.
pub const PUBLIC_PREFIX: &str = "uploads";

#[derive(Debug, Error)]
pub enum PhotoError {
    #[error("Photo is too large (max {} MB).", .0 / (1024 * 1024))]
    TooLarge(u64),
    #[error("File is not an image.")]
    NotAnImage,
    #[error("Unsupported image format, use JPG, PNG or WEBP.")]
    UnsupportedFormat,
    #[error("Cannot save photo: {0}")]
    Io(#[from] std::io::Error),
}

impl PhotoError {
    /// True for upload problems the client can fix, false for disk trouble.
    #[must_use]
    pub const fn is_client_error(&self) -> bool {
        !matches!(self, Self::Io(_))
    }
}

pub struct PhotoService {
    dir: PathBuf,
    max_bytes: u64,
}

impl PhotoService {
    pub fn new(dir: impl Into<PathBuf>, max_bytes: u64) -> Self {
        Self {
            dir: dir.into(),
            max_bytes,
        }
    }

    #[must_use]
    pub fn dir(&self) -> &PathBuf {
        &self.dir
    }

    /// Validates and stores one uploaded photo, returning the public path
    /// (`uploads/profile_<digits-of-id>.<ext>`) to persist in the table.
    pub async fn save(&self, user_id: &str, bytes: &[u8]) -> Result<String, PhotoError> {
        if bytes.len() as u64 > self.max_bytes {
            return Err(PhotoError::TooLarge(self.max_bytes));
        }
        let extension = sniff_extension(bytes)?;

        if !self.dir.exists() {
            fs::create_dir_all(&self.dir).await?;
        }

        let filename = format!("profile_{}.{}", digits_of(user_id), extension);
        let file_path = self.dir.join(&filename);
        fs::write(&file_path, bytes).await?;

        info!(path = %file_path.display(), "Stored profile photo");
        Ok(format!("{PUBLIC_PREFIX}/{filename}"))
    }
}

/// Picks the stored file extension from the image magic bytes.
fn sniff_extension(bytes: &[u8]) -> Result<&'static str, PhotoError> {
    if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        return Ok("jpg");
    }
    if bytes.starts_with(&[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A]) {
        return Ok("png");
    }
    if bytes.len() >= 12 && &bytes[..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
        return Ok("webp");
    }
    // Recognizably an image, just not one we keep.
    if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") || bytes.starts_with(b"BM") {
        return Err(PhotoError::UnsupportedFormat);
    }
    Err(PhotoError::NotAnImage)
}

fn digits_of(user_id: &str) -> String {
    user_id.chars().filter(char::is_ascii_digit).collect()
}
