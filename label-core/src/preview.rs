//! Preview renderer: scene -> SVG (for the page) and SVG -> PNG (for files
//! and tests).
//!
//! The SVG is sized in pixels at the preview DPI but drawn in millimetres
//! through its viewBox, so scene coordinates are written out unchanged. The
//! bleed guide is appended after the clipped content group; it only exists in
//! preview output.

use std::sync::{Arc, OnceLock};

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};

use crate::assets::{ImageId, ImageStore, encode_rgba_png};
use crate::constants::{BLEED_GUIDE_COLOR, PREVIEW_DPI};
use crate::design::Face;
use crate::error::AssetError;
use crate::layout::TextAlign;
use crate::scene::{DrawOp, Scene, TextOp};
use crate::units::{Fit, pt_to_mm};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PreviewOptions {
    /// Pixels per inch of the outer SVG size.
    pub dpi: f64,
    pub show_bleed_guide: bool,
}

impl Default for PreviewOptions {
    fn default() -> Self {
        PreviewOptions {
            dpi: PREVIEW_DPI,
            show_bleed_guide: true,
        }
    }
}

/// Turns a logo handle into something an `<image href>` can load.
pub trait ImageHrefs {
    fn href(&self, id: ImageId) -> Option<String>;
}

impl<F> ImageHrefs for F
where
    F: Fn(ImageId) -> Option<String>,
{
    fn href(&self, id: ImageId) -> Option<String> {
        self(id)
    }
}

/// Inline PNG data URLs straight from the image store.
pub struct DataUrlHrefs<'a> {
    pub images: &'a ImageStore,
}

impl ImageHrefs for DataUrlHrefs<'_> {
    fn href(&self, id: ImageId) -> Option<String> {
        let logo = self.images.resolve(id).ok()?;
        match logo.to_png() {
            Ok(png) => Some(format!("data:image/png;base64,{}", STANDARD.encode(png))),
            Err(e) => {
                tracing::warn!(%id, error = %e, "failed to encode logo for preview");
                None
            }
        }
    }
}

/// The two faces as last rendered by the session.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewPair {
    /// Bumped on every edit; a host can skip DOM work when it has not moved.
    pub revision: u64,
    pub facing_out: Scene,
    pub facing_in: Scene,
}

impl PreviewPair {
    pub fn scene(&self, face: Face) -> &Scene {
        match face {
            Face::FacingOut => &self.facing_out,
            Face::FacingIn => &self.facing_in,
        }
    }
}

fn svg_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(ch),
        }
    }
    out
}

/// Compact decimal for SVG attributes.
fn num(v: f64) -> String {
    let s = format!("{v:.3}");
    let s = s.trim_end_matches('0').trim_end_matches('.');
    if s == "-0" { "0".to_string() } else { s.to_string() }
}

pub fn render_preview_svg(scene: &Scene, opts: &PreviewOptions, hrefs: &dyn ImageHrefs) -> String {
    let (w_px, h_px) = (
        crate::units::mm_to_px(scene.page.w, opts.dpi).round().max(1.0),
        crate::units::mm_to_px(scene.page.h, opts.dpi).round().max(1.0),
    );
    let clip_id = format!("page-clip-{}", scene.face.slug());
    let mut s = String::new();
    s.push_str(&format!(
        r#"<svg xmlns="http://www.w3.org/2000/svg" xmlns:xlink="http://www.w3.org/1999/xlink" width="{}" height="{}" viewBox="{} {} {} {}" data-face="{}">"#,
        num(w_px),
        num(h_px),
        num(scene.page.x),
        num(scene.page.y),
        num(scene.page.w),
        num(scene.page.h),
        scene.face.slug(),
    ));
    s.push_str(&format!(
        r#"<defs><clipPath id="{clip_id}"><rect x="{}" y="{}" width="{}" height="{}"/></clipPath></defs>"#,
        num(scene.page.x),
        num(scene.page.y),
        num(scene.page.w),
        num(scene.page.h),
    ));
    s.push_str(&format!(r#"<g clip-path="url(#{clip_id})">"#));
    for op in &scene.ops {
        write_op(&mut s, op, hrefs);
    }
    s.push_str("</g>");
    if opts.show_bleed_guide {
        let t = scene.trim;
        s.push_str(&format!(
            r#"<rect class="bleed-guide" x="{}" y="{}" width="{}" height="{}" fill="none" stroke="{}" stroke-width="0.25" stroke-dasharray="1 0.75"/>"#,
            num(t.x),
            num(t.y),
            num(t.w),
            num(t.h),
            BLEED_GUIDE_COLOR,
        ));
    }
    s.push_str("</svg>");
    s
}

fn write_op(s: &mut String, op: &DrawOp, hrefs: &dyn ImageHrefs) {
    match op {
        DrawOp::FillRect { rect, color } => s.push_str(&format!(
            r#"<rect x="{}" y="{}" width="{}" height="{}" fill="{}"/>"#,
            num(rect.x),
            num(rect.y),
            num(rect.w),
            num(rect.h),
            color
        )),
        DrawOp::StrokeRect {
            rect,
            color,
            width,
            dashed,
        } => {
            let dash = if *dashed {
                r#" stroke-dasharray="1.2 0.8""#
            } else {
                ""
            };
            s.push_str(&format!(
                r#"<rect x="{}" y="{}" width="{}" height="{}" fill="none" stroke="{}" stroke-width="{}"{dash}/>"#,
                num(rect.x),
                num(rect.y),
                num(rect.w),
                num(rect.h),
                color,
                num(*width),
            ));
        }
        DrawOp::PlaceImage { frame, image, fit } => {
            let Some(href) = hrefs.href(*image) else {
                tracing::debug!(%image, "no href for logo, skipping");
                return;
            };
            let aspect = match fit {
                Fit::Contain => "xMidYMid meet",
                Fit::Cover => "xMidYMid slice",
            };
            s.push_str(&format!(
                r#"<image x="{}" y="{}" width="{}" height="{}" preserveAspectRatio="{aspect}" href="{}" xlink:href="{}"/>"#,
                num(frame.x),
                num(frame.y),
                num(frame.w),
                num(frame.h),
                svg_escape(&href),
                svg_escape(&href),
            ));
        }
        DrawOp::PlaceText(t) => write_text(s, t),
        DrawOp::PlaceSvg { frame, svg } => {
            let href = format!("data:image/svg+xml;base64,{}", STANDARD.encode(svg.as_bytes()));
            s.push_str(&format!(
                r#"<image x="{}" y="{}" width="{}" height="{}" preserveAspectRatio="none" href="{href}" xlink:href="{href}"/>"#,
                num(frame.x),
                num(frame.y),
                num(frame.w),
                num(frame.h),
            ));
        }
    }
}

fn write_text(s: &mut String, t: &TextOp) {
    let anchor = match t.align {
        TextAlign::Left => "start",
        TextAlign::Center => "middle",
        TextAlign::Right => "end",
    };
    s.push_str(&format!(
        r#"<text x="{}" y="{}" font-family="{}" font-size="{}" font-weight="{}" fill="{}" text-anchor="{anchor}" style="white-space:pre">{}</text>"#,
        num(t.x),
        num(t.baseline),
        svg_escape(t.font.css_family),
        num(pt_to_mm(t.size_pt)),
        t.weight.css(),
        t.color,
        svg_escape(&t.text),
    ));
}

fn font_database() -> Arc<usvg::fontdb::Database> {
    static DB: OnceLock<Arc<usvg::fontdb::Database>> = OnceLock::new();
    DB.get_or_init(|| {
        let mut db = usvg::fontdb::Database::new();
        db.load_system_fonts();
        Arc::new(db)
    })
    .clone()
}

/// Parse SVG text into a usvg tree with system fonts available.
pub fn parse_svg(svg: &str) -> Result<usvg::Tree, AssetError> {
    let mut opt = usvg::Options::default();
    opt.fontdb = font_database();
    usvg::Tree::from_str(svg, &opt).map_err(|e| AssetError::Template(e.to_string()))
}

/// Render SVG at `scale` times its intrinsic pixel size.
pub fn rasterize_svg(svg: &str, scale: f32) -> Result<tiny_skia::Pixmap, AssetError> {
    let tree = parse_svg(svg)?;
    rasterize_tree(&tree, scale)
}

pub fn rasterize_tree(tree: &usvg::Tree, scale: f32) -> Result<tiny_skia::Pixmap, AssetError> {
    let size = tree.size();
    let width = (size.width() * scale).ceil().max(1.0) as u32;
    let height = (size.height() * scale).ceil().max(1.0) as u32;
    let mut pixmap = tiny_skia::Pixmap::new(width, height).ok_or(AssetError::Raster { width, height })?;
    let mut pm = pixmap.as_mut();
    resvg::render(tree, tiny_skia::Transform::from_scale(scale, scale), &mut pm);
    Ok(pixmap)
}

/// Straight-alpha RGBA of a pixmap (tiny-skia stores premultiplied).
pub fn demultiplied_rgba(pixmap: &tiny_skia::Pixmap) -> Vec<u8> {
    let mut out = Vec::with_capacity(pixmap.data().len());
    for p in pixmap.pixels() {
        let c = p.demultiply();
        out.extend_from_slice(&[c.red(), c.green(), c.blue(), c.alpha()]);
    }
    out
}

pub fn encode_png(pixmap: &tiny_skia::Pixmap) -> Result<Vec<u8>, AssetError> {
    encode_rgba_png(pixmap.width(), pixmap.height(), &demultiplied_rgba(pixmap))
}

/// Preview of one face as PNG bytes at `opts.dpi`.
pub fn render_preview_png(
    scene: &Scene,
    opts: &PreviewOptions,
    hrefs: &dyn ImageHrefs,
) -> Result<Vec<u8>, AssetError> {
    let svg = render_preview_svg(scene, opts, hrefs);
    let pixmap = rasterize_svg(&svg, 1.0)?;
    encode_png(&pixmap)
}
