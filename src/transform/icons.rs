//! Icon fan-out: one vector icon, one PNG per configured size.
//!
//! Every size is rendered on its own scoped thread; completion order does
//! not matter because each size writes its own file. After the rasterizer
//! returns, the PNG is checked with the `image` crate and resized to the
//! exact square if the tool honoured the aspect ratio instead.

use super::{Rasterize, TransformError};
use image::imageops::FilterType;
use image::GenericImageView;
use std::path::{Path, PathBuf};

/// Output file name for one icon size: `<stem><size>.png`.
///
/// ```
/// use extpack::transform::icon_file_name;
/// use std::path::Path;
///
/// assert_eq!(icon_file_name(Path::new("img/cursor.svg"), 16), "cursor16.png");
/// ```
pub fn icon_file_name(svg: &Path, size: u32) -> String {
    let stem = svg.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default();
    format!("{}{}.png", stem, size)
}

/// Rasterize `svg` into `out_dir` once per size.
///
/// Returns one result per size, in the order of `sizes`.
pub fn rasterize_icons(
    rasterizer: &dyn Rasterize,
    svg: &Path,
    sizes: &[u32],
    out_dir: &Path,
) -> Vec<Result<PathBuf, TransformError>> {
    std::thread::scope(|s| {
        let handles: Vec<_> = sizes
            .iter()
            .map(|&size| {
                s.spawn(move || -> Result<PathBuf, TransformError> {
                    tracing::debug!(size, "creating icon");
                    let dest = out_dir.join(icon_file_name(svg, size));
                    rasterizer.rasterize(svg, size, &dest)?;
                    ensure_square(&dest, size)?;
                    Ok(dest)
                })
            })
            .collect();

        handles
            .into_iter()
            .map(|handle| {
                handle.join().unwrap_or_else(|_| {
                    Err(TransformError::invalid(svg, "icon rasterizer panicked"))
                })
            })
            .collect()
    })
}

/// Make sure the PNG at `path` is exactly `size`x`size`.
fn ensure_square(path: &Path, size: u32) -> Result<(), TransformError> {
    let img = image::open(path).map_err(|e| TransformError::invalid(path, e.to_string()))?;
    if img.dimensions() == (size, size) {
        return Ok(());
    }

    tracing::debug!(
        path = %path.display(),
        width = img.width(),
        height = img.height(),
        size,
        "resizing icon to exact size"
    );
    img.resize_exact(size, size, FilterType::Lanczos3)
        .save(path)
        .map_err(|e| TransformError::invalid(path, e.to_string()))
}
