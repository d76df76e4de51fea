use std::path::{Component, Path, PathBuf};

use chrono::Utc;
use tokio::{
    fs,
    io::{self, AsyncRead, AsyncReadExt, AsyncWriteExt, BufWriter},
};

use crate::error::{AppError, Result};

/// URL prefix under which the public directory is served.
pub const PUBLIC_URL_PREFIX: &str = "/public";

/// Raster formats accepted as post images. SVG is excluded since it can
/// carry script.
const ALLOWED_IMAGE_TYPES: &[&str] = &["image/png", "image/apng", "image/jpeg", "image/gif", "image/webp"];

/// How many leading bytes are inspected to detect the format.
const SNIFF_LEN: usize = 32;

/// A file written by [`store_image`].
#[derive(Debug, Clone)]
pub struct StoredImage {
    /// Web path, e.g. `/public/uploads/user/7/1700000000000000000_cat.png`.
    pub url: String,
    /// Location on disk.
    pub path: PathBuf,
    /// Number of bytes written.
    pub size: u64,
}

/// `{public_dir}/uploads/user/{user_id}`
pub fn user_upload_dir(public_dir: &Path, user_id: i64) -> PathBuf {
    public_dir
        .join("uploads")
        .join("user")
        .join(user_id.to_string())
}

/// Reduces a client-supplied file name to a safe final path component.
pub fn sanitize_filename(original: &str) -> String {
    let base = original.rsplit(['/', '\\']).next().unwrap_or_default();
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();

    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() {
        "upload".to_string()
    } else {
        cleaned.to_string()
    }
}

fn timestamp_nanos() -> i64 {
    Utc::now().timestamp_nanos_opt().unwrap_or_default()
}

/// Streams `source` into the user's upload directory.
///
/// Only raster images are accepted, detected from their leading bytes; the
/// stored name gets the extension of the detected format, so the file is
/// served with a matching content type whatever the client called it.
///
/// The file is named `{nanosecond-timestamp}_{sanitized-stem}.{ext}` and
/// created with create-new semantics, so an existing file is never
/// overwritten. Nothing is left on disk when this fails.
pub async fn store_image<R>(
    public_dir: &Path,
    user_id: i64,
    original_filename: &str,
    source: &mut R,
) -> Result<StoredImage>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let head = read_head(source)
        .await
        .map_err(|e| AppError::Upload(format!("reading upload: {}", e)))?;
    let extension = image_extension(&head).ok_or_else(|| {
        tracing::warn!("❌ Rejected upload from user {}: {} is not an image", user_id, original_filename);
        AppError::Validation("Only PNG, JPEG, GIF or WebP images can be uploaded".to_string())
    })?;

    let dir = user_upload_dir(public_dir, user_id);
    fs::create_dir_all(&dir).await.map_err(|e| {
        AppError::Upload(format!("creating upload directory {}: {}", dir.display(), e))
    })?;

    let file_name = format!(
        "{}_{}.{}",
        timestamp_nanos(),
        file_stem(&sanitize_filename(original_filename)),
        extension
    );
    let path = dir.join(&file_name);
    let mut content = (&head[..]).chain(source);
    let size = write_new_file(&path, &mut content).await?;

    tracing::info!("📁 Stored upload for user {}: {} ({} bytes)", user_id, file_name, size);

    Ok(StoredImage {
        url: format!("{}/uploads/user/{}/{}", PUBLIC_URL_PREFIX, user_id, file_name),
        path,
        size,
    })
}

async fn read_head<R>(source: &mut R) -> io::Result<Vec<u8>>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let mut head = vec![0u8; SNIFF_LEN];
    let mut filled = 0;
    while filled < SNIFF_LEN {
        let n = source.read(&mut head[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    head.truncate(filled);
    Ok(head)
}

/// The file extension for an allowed image format, `None` for anything else.
pub fn image_extension(head: &[u8]) -> Option<&'static str> {
    let kind = infer::get(head)?;
    if ALLOWED_IMAGE_TYPES.contains(&kind.mime_type()) {
        Some(kind.extension())
    } else {
        None
    }
}

fn file_stem(sanitized: &str) -> &str {
    match sanitized.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => sanitized,
    }
}

async fn write_new_file<R>(path: &Path, source: &mut R) -> Result<u64>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let file = fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .await
        .map_err(|e| AppError::Upload(format!("creating {}: {}", path.display(), e)))?;

    let mut writer = BufWriter::new(file);
    match copy_all(source, &mut writer).await {
        Ok(size) => Ok(size),
        Err(e) => {
            drop(writer);
            discard(path).await;
            Err(AppError::Upload(format!("saving {}: {}", path.display(), e)))
        }
    }
}

async fn copy_all<R>(source: &mut R, writer: &mut BufWriter<fs::File>) -> io::Result<u64>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let size = io::copy(source, writer).await?;
    writer.flush().await?;
    writer.get_ref().sync_all().await?;
    Ok(size)
}

/// Maps a web path produced by [`store_image`] back to its file. Paths
/// outside the uploads tree, or containing `..`, map to `None`.
pub fn path_for_url(public_dir: &Path, url: &str) -> Option<PathBuf> {
    let relative = url
        .strip_prefix(PUBLIC_URL_PREFIX)?
        .strip_prefix("/uploads/user/")?;
    let relative = Path::new(relative);

    if relative
        .components()
        .any(|c| !matches!(c, Component::Normal(_)))
    {
        return None;
    }
    Some(public_dir.join("uploads").join("user").join(relative))
}

/// Best-effort removal of a stored file.
pub async fn discard(path: &Path) {
    match fs::remove_file(path).await {
        Ok(()) => tracing::debug!("🧹 Removed {}", path.display()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!("⚠️ Could not remove {}: {}", path.display(), e),
    }
}

/// Best-effort removal of the file behind a stored image URL.
pub async fn discard_url(public_dir: &Path, url: &str) {
    match path_for_url(public_dir, url) {
        Some(path) => discard(&path).await,
        None => tracing::warn!("⚠️ Not removing image outside the uploads tree: {}", url),
    }
}
