//! Cutting a composite image into its individual panel frames.
//!
//! Panels are assumed to be laid out left to right with equal widths.  The
//! panel width is `floor(width / panel_count)`; any remainder columns at the
//! right edge are discarded.

use std::path::{Path, PathBuf};

use image::{GenericImageView, ImageFormat};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PanelError {
    #[error("could not decode composite image: {0}")]
    Decode(#[source] image::ImageError),

    #[error("composite image is {width}px wide, too narrow for {panels} panels")]
    TooNarrow { width: u32, panels: usize },

    #[error("could not write frame {}: {source}", .path.display())]
    Save {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
}

/// File extension matching an image MIME type (defaults to `png`).
pub fn extension_for_mime(mime: &str) -> &'static str {
    match mime {
        "image/jpeg" | "image/jpg" => "jpg",
        "image/webp" => "webp",
        _ => "png",
    }
}

/// Decode `composite` and write one PNG per entry of `frame_paths`, in
/// left-to-right order.  The number of panels is `frame_paths.len()`.
///
/// This is CPU-bound; callers on the async runtime should wrap it in
/// `spawn_blocking`.
pub fn split_into_panels(composite: &[u8], frame_paths: &[PathBuf]) -> Result<(), PanelError> {
    let image = image::load_from_memory(composite).map_err(PanelError::Decode)?;
    let (width, height) = image.dimensions();
    let panels = frame_paths.len();

    let panel_width = width / panels.max(1) as u32;
    if panels == 0 || panel_width == 0 {
        return Err(PanelError::TooNarrow { width, panels });
    }

    for (i, path) in frame_paths.iter().enumerate() {
        let left = i as u32 * panel_width;
        let panel = image.crop_imm(left, 0, panel_width, height);
        save_png(&panel, path)?;
        log::debug!(
            "image: split panel {}/{} -> {}",
            i + 1,
            panels,
            path.display()
        );
    }
    Ok(())
}

fn save_png(panel: &image::DynamicImage, path: &Path) -> Result<(), PanelError> {
    panel
        .save_with_format(path, ImageFormat::Png)
        .map_err(|source| PanelError::Save {
            path: path.to_path_buf(),
            source,
        })
}
