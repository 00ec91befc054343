use crate::error::Result;
use image::RgbaImage;
use log::info;
use std::fs;
use std::path::Path;

/// Saves a rendered frame; the format follows the file extension.
pub fn save_image(image: &RgbaImage, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)?;
    }
    image.save(path)?;
    info!(
        "Saved {}x{} image to {}",
        image.width(),
        image.height(),
        path.display()
    );
    Ok(())
}

/// Inserts a zero-padded frame number before the extension: `out.png` -> `out_0003.png`.
pub fn frame_path(path: &Path, frame: u32) -> std::path::PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "frame".to_string());
    let name = match path.extension() {
        Some(ext) => format!("{stem}_{frame:04}.{}", ext.to_string_lossy()),
        None => format!("{stem}_{frame:04}"),
    };
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_numbers_go_before_the_extension() {
        assert_eq!(
            frame_path(Path::new("out/render.png"), 3),
            Path::new("out/render_0003.png")
        );
        assert_eq!(frame_path(Path::new("render"), 12), Path::new("render_0012"));
    }

    #[test]
    fn saved_png_can_be_read_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/frame.png");
        let image = RgbaImage::from_pixel(2, 2, image::Rgba([10, 20, 30, 255]));
        save_image(&image, &path).unwrap();
        let loaded = image::open(&path).unwrap().to_rgba8();
        assert_eq!(loaded.get_pixel(1, 1).0, [10, 20, 30, 255]);
    }
}
