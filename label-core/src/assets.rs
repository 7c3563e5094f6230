//! Decoded logo bitmaps and the upload ingestion pass.
//!
//! The design only ever holds an [`ImageId`]. Decoding is the one step that
//! can be slow and can fail, so entries move through `Pending` before they
//! become `Ready` or `Failed`; renderers treat anything but `Ready` as "no
//! logo yet".

use std::collections::{BTreeMap, VecDeque};
use std::fmt;
use std::sync::Arc;

use image::RgbaImage;
use image::imageops::FilterType;
use png::{BitDepth, ColorType, Compression, Encoder};
use serde::{Deserialize, Serialize};

use crate::constants::{BACKGROUND_EDGE_RATIO, BACKGROUND_THRESHOLD};
use crate::error::AssetError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ImageId(pub u64);

impl fmt::Display for ImageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "img{}", self.0)
    }
}

/// A decoded logo with straight (non-premultiplied) RGBA pixels.
#[derive(Clone, PartialEq)]
pub struct Logo {
    pixels: RgbaImage,
}

impl fmt::Debug for Logo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Logo")
            .field("width", &self.width())
            .field("height", &self.height())
            .finish()
    }
}

impl Logo {
    pub fn from_rgba(width: u32, height: u32, rgba: Vec<u8>) -> Result<Self, AssetError> {
        RgbaImage::from_raw(width, height, rgba)
            .filter(|img| img.width() > 0 && img.height() > 0)
            .map(|pixels| Logo { pixels })
            .ok_or_else(|| AssetError::Decode(format!("bad {width}x{height} RGBA buffer")))
    }

    /// Decode PNG or JPEG bytes.
    pub fn decode(bytes: &[u8]) -> Result<Self, AssetError> {
        let img = image::load_from_memory(bytes).map_err(|e| AssetError::Decode(e.to_string()))?;
        let pixels = img.to_rgba8();
        if pixels.width() == 0 || pixels.height() == 0 {
            return Err(AssetError::Decode("empty image".into()));
        }
        Ok(Logo { pixels })
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn rgba(&self) -> &[u8] {
        self.pixels.as_raw()
    }

    pub fn has_transparency(&self) -> bool {
        self.pixels.pixels().any(|p| p[3] < 255)
    }

    /// Resample to exactly `width` x `height` with a Lanczos filter.
    pub fn resized(&self, width: u32, height: u32) -> Logo {
        if width == self.width() && height == self.height() {
            return self.clone();
        }
        Logo {
            pixels: image::imageops::resize(&self.pixels, width.max(1), height.max(1), FilterType::Lanczos3),
        }
    }

    pub fn to_png(&self) -> Result<Vec<u8>, AssetError> {
        encode_rgba_png(self.width(), self.height(), self.rgba())
    }
}

/// Deterministic PNG encoding of straight RGBA pixels.
pub fn encode_rgba_png(width: u32, height: u32, rgba: &[u8]) -> Result<Vec<u8>, AssetError> {
    let mut buf = Vec::new();
    {
        let mut enc = Encoder::new(&mut buf, width, height);
        enc.set_color(ColorType::Rgba);
        enc.set_depth(BitDepth::Eight);
        enc.set_compression(Compression::Default);
        let mut writer = enc
            .write_header()
            .map_err(|e| AssetError::Png(e.to_string()))?;
        writer
            .write_image_data(rgba)
            .map_err(|e| AssetError::Png(e.to_string()))?;
    }
    Ok(buf)
}

fn is_light(p: &image::Rgba<u8>) -> bool {
    p[3] > 0 && p[0] > BACKGROUND_THRESHOLD && p[1] > BACKGROUND_THRESHOLD && p[2] > BACKGROUND_THRESHOLD
}

/// Share of border pixels that count as light background.
pub fn light_border_ratio(logo: &Logo) -> f64 {
    let (w, h) = (logo.width(), logo.height());
    let mut total = 0usize;
    let mut light = 0usize;
    for (x, y, p) in logo.pixels.enumerate_pixels() {
        if x == 0 || y == 0 || x + 1 == w || y + 1 == h {
            total += 1;
            if is_light(p) {
                light += 1;
            }
        }
    }
    if total == 0 { 0.0 } else { light as f64 / total as f64 }
}

/// Clear light pixels connected to the border. Interior whites (lettering,
/// highlights) stay opaque. `None` when nothing would remain visible.
pub fn remove_light_background(logo: &Logo) -> Option<Logo> {
    let (w, h) = (logo.width() as usize, logo.height() as usize);
    let mut out = logo.pixels.clone();
    let mut seen = vec![false; w * h];
    let mut queue = VecDeque::new();
    for x in 0..w {
        queue.push_back((x, 0));
        queue.push_back((x, h - 1));
    }
    for y in 0..h {
        queue.push_back((0, y));
        queue.push_back((w - 1, y));
    }
    while let Some((x, y)) = queue.pop_front() {
        let idx = y * w + x;
        if seen[idx] {
            continue;
        }
        seen[idx] = true;
        let px = out.get_pixel_mut(x as u32, y as u32);
        if !is_light(px) {
            continue;
        }
        px[3] = 0;
        if x > 0 {
            queue.push_back((x - 1, y));
        }
        if x + 1 < w {
            queue.push_back((x + 1, y));
        }
        if y > 0 {
            queue.push_back((x, y - 1));
        }
        if y + 1 < h {
            queue.push_back((x, y + 1));
        }
    }
    if out.pixels().all(|p| p[3] == 0) {
        return None;
    }
    Some(Logo { pixels: out })
}

/// Upload pass: keep images that already carry alpha, otherwise knock out a
/// light border-connected background. Falls back to the input on failure.
pub fn ingest(logo: Logo) -> Logo {
    if logo.has_transparency() {
        return logo;
    }
    let ratio = light_border_ratio(&logo);
    if ratio < BACKGROUND_EDGE_RATIO {
        tracing::debug!(ratio, "logo border is not light, keeping background");
        return logo;
    }
    match remove_light_background(&logo) {
        Some(processed) => processed,
        None => {
            tracing::warn!("background removal cleared the whole logo, keeping original");
            logo
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum ImageState {
    Pending,
    Ready(Arc<Logo>),
    Failed(String),
}

/// Owner of every decoded logo in a session.
#[derive(Debug, Default)]
pub struct ImageStore {
    next: u64,
    entries: BTreeMap<ImageId, ImageState>,
}

impl ImageStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve a handle for an image whose bytes are still being read.
    pub fn begin_load(&mut self) -> ImageId {
        self.next += 1;
        let id = ImageId(self.next);
        self.entries.insert(id, ImageState::Pending);
        id
    }

    /// Decode and ingest the bytes for a pending handle. A decode failure
    /// marks the entry `Failed` and is returned to the caller.
    pub fn complete_load(&mut self, id: ImageId, bytes: &[u8]) -> Result<Arc<Logo>, AssetError> {
        if !self.entries.contains_key(&id) {
            return Err(AssetError::UnknownImage(id.0));
        }
        match Logo::decode(bytes) {
            Ok(logo) => {
                let logo = Arc::new(ingest(logo));
                tracing::debug!(%id, width = logo.width(), height = logo.height(), "logo ready");
                self.entries.insert(id, ImageState::Ready(logo.clone()));
                Ok(logo)
            }
            Err(e) => {
                tracing::warn!(%id, error = %e, "logo failed to decode");
                self.entries.insert(id, ImageState::Failed(e.to_string()));
                Err(e)
            }
        }
    }

    /// Mark a pending handle failed without bytes (the read itself failed).
    pub fn fail_load(&mut self, id: ImageId, reason: impl Into<String>) {
        if let Some(state) = self.entries.get_mut(&id) {
            *state = ImageState::Failed(reason.into());
        }
    }

    /// Store an already decoded bitmap as-is.
    pub fn insert(&mut self, logo: Logo) -> ImageId {
        let id = self.begin_load();
        self.entries.insert(id, ImageState::Ready(Arc::new(logo)));
        id
    }

    /// `begin_load` and `complete_load` in one step. The handle is returned
    /// even when decoding fails so the caller can render the placeholder.
    pub fn load(&mut self, bytes: &[u8]) -> (ImageId, Result<Arc<Logo>, AssetError>) {
        let id = self.begin_load();
        let res = self.complete_load(id, bytes);
        (id, res)
    }

    pub fn state(&self, id: ImageId) -> Option<&ImageState> {
        self.entries.get(&id)
    }

    pub fn resolve(&self, id: ImageId) -> Result<Arc<Logo>, AssetError> {
        match self.entries.get(&id) {
            Some(ImageState::Ready(logo)) => Ok(logo.clone()),
            Some(ImageState::Pending) => Err(AssetError::Pending),
            Some(ImageState::Failed(reason)) => Err(AssetError::Decode(reason.clone())),
            None => Err(AssetError::UnknownImage(id.0)),
        }
    }

    /// Drop an entry. Returns whether it existed.
    pub fn release(&mut self, id: ImageId) -> bool {
        let existed = self.entries.remove(&id).is_some();
        if existed {
            tracing::debug!(%id, "released logo");
        }
        existed
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Ready bitmaps for the given handles, for an export snapshot.
    pub fn snapshot(&self, ids: impl IntoIterator<Item = ImageId>) -> ImageStore {
        let mut out = ImageStore {
            next: self.next,
            entries: BTreeMap::new(),
        };
        for id in ids {
            if let Some(state) = self.entries.get(&id) {
                out.entries.insert(id, state.clone());
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid(w: u32, h: u32, rgba: [u8; 4]) -> Logo {
        Logo::from_rgba(w, h, rgba.repeat((w * h) as usize)).unwrap()
    }

    fn framed(w: u32, h: u32) -> Logo {
        // White sheet with a dark square and a white dot inside it.
        let mut img = RgbaImage::from_pixel(w, h, image::Rgba([255, 255, 255, 255]));
        for y in h / 4..3 * h / 4 {
            for x in w / 4..3 * w / 4 {
                img.put_pixel(x, y, image::Rgba([20, 30, 40, 255]));
            }
        }
        img.put_pixel(w / 2, h / 2, image::Rgba([255, 255, 255, 255]));
        Logo { pixels: img }
    }

    #[test]
    fn decodes_png_bytes() {
        let logo = solid(3, 2, [10, 20, 30, 255]);
        let png = logo.to_png().unwrap();
        let back = Logo::decode(&png).unwrap();
        assert_eq!((back.width(), back.height()), (3, 2));
        assert_eq!(&back.rgba()[..4], &[10, 20, 30, 255]);
    }

    #[test]
    fn garbage_bytes_fail_to_decode() {
        assert!(matches!(Logo::decode(b"not an image"), Err(AssetError::Decode(_))));
    }

    #[test]
    fn light_background_is_cleared_but_interior_white_stays() {
        let out = ingest(framed(16, 16));
        assert!(out.has_transparency());
        let px = |x: u32, y: u32| out.pixels.get_pixel(x, y)[3];
        assert_eq!(px(0, 0), 0);
        assert_eq!(px(6, 6), 255);
        assert_eq!(px(8, 8), 255);
    }

    #[test]
    fn images_with_alpha_are_kept_as_uploaded() {
        let logo = solid(4, 4, [255, 255, 255, 128]);
        assert_eq!(ingest(logo.clone()), logo);
    }

    #[test]
    fn dark_border_skips_the_pass() {
        let logo = solid(4, 4, [0, 0, 0, 255]);
        assert_eq!(ingest(logo.clone()), logo);
    }

    #[test]
    fn all_white_image_falls_back_to_original() {
        let logo = solid(4, 4, [255, 255, 255, 255]);
        let out = ingest(logo.clone());
        assert_eq!(out, logo);
    }

    #[test]
    fn store_lifecycle() {
        let mut store = ImageStore::new();
        let id = store.begin_load();
        assert_eq!(store.resolve(id), Err(AssetError::Pending));

        let png = solid(2, 2, [1, 2, 3, 255]).to_png().unwrap();
        store.complete_load(id, &png).unwrap();
        assert!(store.resolve(id).is_ok());

        let (bad, res) = store.load(b"nope");
        assert!(res.is_err());
        assert!(matches!(store.state(bad), Some(ImageState::Failed(_))));

        assert!(store.release(id));
        assert!(!store.release(id));
        assert_eq!(store.resolve(id), Err(AssetError::UnknownImage(id.0)));
        assert_eq!(
            store.complete_load(ImageId(99), &png),
            Err(AssetError::UnknownImage(99))
        );
    }

    #[test]
    fn resize_hits_requested_size() {
        let logo = solid(10, 5, [9, 9, 9, 255]).resized(40, 20);
        assert_eq!((logo.width(), logo.height()), (40, 20));
    }
}
