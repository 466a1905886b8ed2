use std::path::{Path, PathBuf};

use image::{ImageFormat, Rgba, RgbaImage};

use crate::error::{ConvertError, ConvertResult};

use super::types::{BakedTexture, Channel};

/// Square scratch buffer the backend writes every pass into.
#[derive(Debug, Clone)]
pub struct BakeImage {
    pixels: RgbaImage,
}

impl BakeImage {
    pub fn new(resolution: u32) -> Self {
        Self {
            pixels: RgbaImage::new(resolution, resolution),
        }
    }

    pub fn resolution(&self) -> u32 {
        self.pixels.width()
    }

    pub fn pixels(&self) -> &RgbaImage {
        &self.pixels
    }

    pub fn pixels_mut(&mut self) -> &mut RgbaImage {
        &mut self.pixels
    }

    /// Reset to transparent black between passes.
    pub fn clear(&mut self) {
        for p in self.pixels.pixels_mut() {
            *p = Rgba([0, 0, 0, 0]);
        }
    }

    /// Still in the state `clear` leaves it in.
    pub fn is_blank(&self) -> bool {
        self.pixels.pixels().all(|p| *p == Rgba([0, 0, 0, 0]))
    }
}

pub fn texture_path(dir: &Path, stem: &str, channel: Channel) -> PathBuf {
    dir.join(format!("{stem}_{}.png", channel.suffix()))
}

/// Save the buffer as PNG and reload it as a read-only texture handle.
pub fn persist_and_reload(
    image: &BakeImage,
    dir: &Path,
    stem: &str,
    channel: Channel,
) -> ConvertResult<BakedTexture> {
    let path = texture_path(dir, stem, channel);
    image
        .pixels
        .save_with_format(&path, ImageFormat::Png)
        .map_err(|source| ConvertError::ImagePersist {
            path: path.clone(),
            source,
        })?;

    let reloaded = image::open(&path).map_err(|source| ConvertError::ImagePersist {
        path: path.clone(),
        source,
    })?;

    log::info!("[bake] saved {} texture: {}", channel, path.display());
    Ok(BakedTexture {
        channel,
        width: reloaded.width(),
        height: reloaded.height(),
        path,
    })
}
