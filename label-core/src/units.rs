use serde::{Deserialize, Serialize};

use crate::constants::{BLEED_MM, MM_PER_INCH, PT_PER_INCH, TRIM_HEIGHT_MM, TRIM_WIDTH_MM};

/// Convert millimeters to pixels at `dpi`. No rounding.
pub fn mm_to_px(mm: f64, dpi: f64) -> f64 {
    mm * dpi / MM_PER_INCH
}

pub fn px_to_mm(px: f64, dpi: f64) -> f64 {
    px * MM_PER_INCH / dpi
}

/// Millimeters to PDF points (1/72 inch).
pub fn mm_to_pt(mm: f64) -> f64 {
    mm_to_px(mm, PT_PER_INCH)
}

pub fn pt_to_mm(pt: f64) -> f64 {
    px_to_mm(pt, PT_PER_INCH)
}

/// Percentage of an extent, in the extent's unit.
pub fn pct_to_mm(pct: f64, extent_mm: f64) -> f64 {
    pct * extent_mm / 100.0
}

/// Axis-aligned rectangle in millimeters. Origin is the top-left corner of
/// the page (bleed included), y grows downward.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
}

impl Rect {
    pub const fn new(x: f64, y: f64, w: f64, h: f64) -> Self {
        Rect { x, y, w, h }
    }

    /// Rectangle of size `w` x `h` centred on (`cx`, `cy`).
    pub fn centered(cx: f64, cy: f64, w: f64, h: f64) -> Self {
        Rect {
            x: cx - w / 2.0,
            y: cy - h / 2.0,
            w,
            h,
        }
    }

    pub fn center(&self) -> (f64, f64) {
        (self.x + self.w / 2.0, self.y + self.h / 2.0)
    }

    pub fn right(&self) -> f64 {
        self.x + self.w
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.h
    }

    pub fn inset(&self, d: f64) -> Self {
        Rect {
            x: self.x + d,
            y: self.y + d,
            w: (self.w - 2.0 * d).max(0.0),
            h: (self.h - 2.0 * d).max(0.0),
        }
    }

    /// Map a percentage position inside this rectangle to absolute mm.
    pub fn point_at_pct(&self, x_pct: f64, y_pct: f64) -> (f64, f64) {
        (
            self.x + pct_to_mm(x_pct, self.w),
            self.y + pct_to_mm(y_pct, self.h),
        )
    }

    /// Place content with the given pixel aspect inside this frame.
    pub fn fit(&self, content_w: f64, content_h: f64, fit: Fit) -> Rect {
        if content_w <= 0.0 || content_h <= 0.0 || self.w <= 0.0 || self.h <= 0.0 {
            return *self;
        }
        let sx = self.w / content_w;
        let sy = self.h / content_h;
        let s = match fit {
            Fit::Contain => sx.min(sy),
            Fit::Cover => sx.max(sy),
        };
        let (cx, cy) = self.center();
        Rect::centered(cx, cy, content_w * s, content_h * s)
    }
}

/// How an image fills its frame.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Fit {
    /// Whole image visible, letterboxed inside the frame.
    #[default]
    Contain,
    /// Frame fully covered, overflow clipped.
    Cover,
}

/// Physical label geometry. The page always equals trim plus bleed on every
/// side.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PhysicalDimensions {
    pub trim_w_mm: f64,
    pub trim_h_mm: f64,
    pub bleed_mm: f64,
}

impl PhysicalDimensions {
    pub const CANONICAL: PhysicalDimensions = PhysicalDimensions {
        trim_w_mm: TRIM_WIDTH_MM,
        trim_h_mm: TRIM_HEIGHT_MM,
        bleed_mm: BLEED_MM,
    };

    /// (width, height) of the printed page in mm.
    pub fn page_size(&self) -> (f64, f64) {
        (
            self.trim_w_mm + 2.0 * self.bleed_mm,
            self.trim_h_mm + 2.0 * self.bleed_mm,
        )
    }

    pub fn page_rect(&self) -> Rect {
        let (w, h) = self.page_size();
        Rect::new(0.0, 0.0, w, h)
    }

    /// Trim area expressed in page coordinates.
    pub fn trim_rect(&self) -> Rect {
        Rect::new(self.bleed_mm, self.bleed_mm, self.trim_w_mm, self.trim_h_mm)
    }

    pub fn page_size_pt(&self) -> (f64, f64) {
        let (w, h) = self.page_size();
        (mm_to_pt(w), mm_to_pt(h))
    }

    /// Page size in pixels at `dpi`, rounded up to whole pixels.
    pub fn page_size_px(&self, dpi: f64) -> (u32, u32) {
        let (w, h) = self.page_size();
        (
            mm_to_px(w, dpi).ceil().max(1.0) as u32,
            mm_to_px(h, dpi).ceil().max(1.0) as u32,
        )
    }
}

impl Default for PhysicalDimensions {
    fn default() -> Self {
        Self::CANONICAL
    }
}
