//! Image ingestion: download, re-encode to WebP, register as a media asset.

use std::collections::BTreeMap;
use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Local};
use image::codecs::webp::WebPEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ExtendedColorType, GenericImageView};
use tracing::{debug, info, warn};
use url::Url;

use crate::app::{Result, SkufillError};
use crate::domain::{DerivedSize, MediaAsset, MediaMetadata};
use crate::fetcher::Fetcher;
use crate::store::Store;

pub const WEB_IMAGE_EXTENSION: &str = "webp";

/// Derived sizes generated for every ingested image (name, bounding box edge).
pub const DERIVED_SIZES: [(&str, u32); 2] = [("thumbnail", 150), ("medium", 300)];

pub struct ImageIngester<S: Store> {
    fetcher: Arc<dyn Fetcher + Send + Sync>,
    store: Arc<S>,
    uploads_dir: PathBuf,
}

impl<S: Store + Send + Sync> ImageIngester<S> {
    pub fn new(
        fetcher: Arc<dyn Fetcher + Send + Sync>,
        store: Arc<S>,
        uploads_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            fetcher,
            store,
            uploads_dir: uploads_dir.into(),
        }
    }

    /// Download `image_url`, store it as WebP and register it as an asset
    /// attached to `owner_id`. Returns the new asset id.
    ///
    /// An existing file with the same name is overwritten. Re-ingesting the
    /// same file for the same product reuses its asset.
    pub async fn ingest(&self, image_url: &str, owner_id: i64) -> Result<i64> {
        let bytes = self.fetcher.fetch(image_url).await?;
        let file_name = target_file_name(image_url, owner_id);

        let image =
            image::load_from_memory(&bytes).map_err(|e| SkufillError::ImageDecode {
                url: image_url.to_string(),
                reason: e.to_string(),
            })?;

        let dir = self.resolve_upload_dir()?;
        let path = dir.join(&file_name);
        let filesize = encode_webp(&image, &path)?;
        let relative = self.relative_path(&path);

        // Same product, same file: the file was overwritten, keep its asset
        let asset_id = match self.store.find_media(owner_id, &relative)? {
            Some(existing) => existing.id,
            None => {
                let asset = MediaAsset::new(
                    owner_id,
                    relative.clone(),
                    mime_for(&file_name),
                    media_title(&file_name),
                );
                self.store.add_media(&asset)?
            }
        };

        let metadata = self.generate_metadata(&image, &dir, &file_name, relative, filesize);
        self.store.set_media_metadata(asset_id, &metadata)?;

        info!(
            "Stored {} as media asset {} for product {}",
            path.display(),
            asset_id,
            owner_id
        );

        Ok(asset_id)
    }

    /// The dated uploads directory, or the uploads root if it cannot be created.
    fn resolve_upload_dir(&self) -> Result<PathBuf> {
        let dated = dated_dir(&self.uploads_dir, Local::now());

        match fs::create_dir_all(&dated) {
            Ok(()) => Ok(dated),
            Err(e) => {
                warn!(
                    "Could not create {}: {}; using {}",
                    dated.display(),
                    e,
                    self.uploads_dir.display()
                );
                fs::create_dir_all(&self.uploads_dir)?;
                Ok(self.uploads_dir.clone())
            }
        }
    }

    fn relative_path(&self, path: &Path) -> String {
        let relative = path.strip_prefix(&self.uploads_dir).unwrap_or(path);
        relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/")
    }

    fn generate_metadata(
        &self,
        image: &DynamicImage,
        dir: &Path,
        file_name: &str,
        relative: String,
        filesize: u64,
    ) -> MediaMetadata {
        let (width, height) = image.dimensions();
        let stem = file_stem(file_name);
        let mut sizes = BTreeMap::new();

        for (name, max_edge) in DERIVED_SIZES {
            if width <= max_edge && height <= max_edge {
                continue;
            }

            let (target_width, target_height) = fit_within(width, height, max_edge);
            let derived_name = format!(
                "{}-{}x{}.{}",
                stem, target_width, target_height, WEB_IMAGE_EXTENSION
            );
            let resized = image.resize_exact(target_width, target_height, FilterType::Triangle);

            match encode_webp(&resized, &dir.join(&derived_name)) {
                Ok(_) => {
                    debug!("Generated {} size {}", name, derived_name);
                    sizes.insert(
                        name.to_string(),
                        DerivedSize {
                            file: derived_name,
                            width: target_width,
                            height: target_height,
                            mime_type: mime_for(file_name).to_string(),
                        },
                    );
                }
                Err(e) => warn!("Failed to generate {} size for {}: {}", name, file_name, e),
            }
        }

        MediaMetadata {
            width,
            height,
            file: relative,
            filesize,
            sizes,
        }
    }
}

/// `<base>/<YYYY>/<MM>` for a single instant.
fn dated_dir(base: &Path, now: DateTime<Local>) -> PathBuf {
    base.join(now.format("%Y").to_string())
        .join(now.format("%m").to_string())
}

/// Encode `image` as lossless WebP at `path`, returning the written size.
fn encode_webp(image: &DynamicImage, path: &Path) -> Result<u64> {
    let rgba = image.to_rgba8();
    let (width, height) = rgba.dimensions();

    let mut writer = BufWriter::new(fs::File::create(path)?);
    WebPEncoder::new_lossless(&mut writer).encode(
        rgba.as_raw(),
        width,
        height,
        ExtendedColorType::Rgba8,
    )?;
    writer.flush()?;

    Ok(fs::metadata(path)?.len())
}

fn fit_within(width: u32, height: u32, max_edge: u32) -> (u32, u32) {
    if width >= height {
        let scaled = ((height as f64) * (max_edge as f64) / (width as f64)).round() as u32;
        (max_edge, scaled.max(1))
    } else {
        let scaled = ((width as f64) * (max_edge as f64) / (height as f64)).round() as u32;
        (scaled.max(1), max_edge)
    }
}

/// Target file name: the URL's last path segment with a `.webp` extension.
pub fn target_file_name(image_url: &str, owner_id: i64) -> String {
    let segment = match Url::parse(image_url) {
        Ok(url) => url
            .path_segments()
            .and_then(|mut segments| segments.next_back())
            .map(String::from),
        Err(_) => image_url
            .split(['?', '#'])
            .next()
            .and_then(|path| path.rsplit('/').next())
            .map(String::from),
    };

    let stem = segment
        .as_deref()
        .map(|s| sanitize_file_name(file_stem(s)))
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| format!("product-{}", owner_id));

    format!("{}.{}", stem, WEB_IMAGE_EXTENSION)
}

fn file_stem(file_name: &str) -> &str {
    match file_name.rfind('.') {
        Some(idx) if idx > 0 => &file_name[..idx],
        _ => file_name,
    }
}

/// Drop characters that are unsafe in file names and turn whitespace into dashes.
pub fn sanitize_file_name(name: &str) -> String {
    const SPECIAL: &[char] = &[
        '?', '[', ']', '/', '\\', '=', '<', '>', ':', ';', ',', '\'', '"', '&', '$', '#', '*',
        '(', ')', '|', '~', '`', '!', '{', '}', '%', '+', '\0',
    ];

    let cleaned: String = name
        .chars()
        .filter(|c| !SPECIAL.contains(c))
        .map(|c| if c.is_whitespace() { '-' } else { c })
        .collect();

    let mut collapsed = String::with_capacity(cleaned.len());
    for c in cleaned.chars() {
        if c == '-' && collapsed.ends_with('-') {
            continue;
        }
        collapsed.push(c);
    }

    collapsed.trim_matches(|c| c == '.' || c == '-' || c == '_').to_string()
}

/// Asset title: the sanitized file name without its extension.
pub fn media_title(file_name: &str) -> String {
    sanitize_file_name(file_stem(file_name))
}

pub fn mime_for(file_name: &str) -> &'static str {
    let extension = Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());

    match extension.as_deref() {
        Some("webp") => "image/webp",
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        _ => "application/octet-stream",
    }
}
