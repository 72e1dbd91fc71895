//! Single-page HTML gallery over the image tree.
//!
//! One tile per original image, linking to the file. The tile shows the
//! extracted thumbnail `thumbnails/<name>.jpg` when there is one, otherwise
//! the original itself. Paths are written relative to the root, so the page
//! works when opened straight from disk next to the images.

use crate::scan::{self, ScanError};
use maud::{DOCTYPE, Markup, html};
use std::path::{Path, PathBuf};
use thiserror::Error;

const CSS: &str = r#"
body { font-family: Arial, sans-serif; background-color: #f0f0f0; padding: 20px; }
.gallery { display: flex; flex-wrap: wrap; gap: 20px; }
.image-item { display: flex; flex-direction: column; align-items: center; background: white; padding: 10px; border-radius: 8px; box-shadow: 0 2px 5px rgba(0,0,0,0.1); }
.image-item img { max-width: 150px; max-height: 150px; cursor: pointer; }
.image-item p { margin: 5px 0; font-size: 12px; }
"#;

#[derive(Error, Debug)]
pub enum GalleryError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Scan(#[from] ScanError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GalleryItem {
    /// Link target: the original, relative to the root.
    pub href: String,
    /// Image shown in the tile, relative to the root.
    pub src: String,
    /// File name, used as caption and alt text.
    pub name: String,
}

/// Root-relative path with forward slashes.
fn web_path(path: &Path, root: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Build tiles for `images`, preferring extracted thumbnails.
pub fn collect_items(root: &Path, images: &[PathBuf], thumbnails_dir: &str) -> Vec<GalleryItem> {
    images
        .iter()
        .filter_map(|path| {
            let name = path.file_name()?.to_string_lossy().into_owned();
            let thumbnail = root.join(thumbnails_dir).join(format!("{name}.jpg"));
            let href = web_path(path, root);
            let src = if thumbnail.is_file() {
                web_path(&thumbnail, root)
            } else {
                href.clone()
            };
            Some(GalleryItem { href, src, name })
        })
        .collect()
}

pub fn render_gallery(items: &[GalleryItem]) -> Markup {
    html! {
        (DOCTYPE)
        html lang="en" {
            head {
                meta charset="UTF-8";
                meta name="viewport" content="width=device-width, initial-scale=1.0";
                title { "Image Gallery" }
                style { (CSS) }
            }
            body {
                h1 { "Image Gallery" }
                div class="gallery" {
                    @for item in items {
                        div class="image-item" {
                            a href=(item.href) target="_blank" {
                                img src=(item.src) alt=(item.name);
                            }
                            p { (item.name) }
                        }
                    }
                }
            }
        }
    }
}

/// Scan `root`, render, and write `<root>/<gallery_file>`.
///
/// Returns the written path and the number of tiles.
pub fn write_gallery(
    root: &Path,
    converted_dir: &str,
    thumbnails_dir: &str,
    gallery_file: &str,
) -> Result<(PathBuf, usize), GalleryError> {
    let images = scan::find_images(root, scan::IMAGE_EXTENSIONS, &[converted_dir, thumbnails_dir])?;
    let items = collect_items(root, &images, thumbnails_dir);
    let target = root.join(gallery_file);
    std::fs::write(&target, render_gallery(&items).into_string())?;
    tracing::info!(path = %target.display(), images = items.len(), "gallery written");
    Ok((target, items.len()))
}
