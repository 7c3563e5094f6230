//! Label render model: design + face -> ordered draw operations.
//!
//! All coordinates are millimetres in page space (bleed included, origin
//! top-left, y down). Both the preview and the PDF writer consume this list;
//! neither re-derives geometry on its own.

use serde::Serialize;

use crate::assets::{ImageId, ImageStore};
use crate::color::{HexColor, Rgb, contrast_color};
use crate::constants::LINE_HEIGHT_RATIO;
use crate::design::{Face, LabelDesign, Placement, TextStyle, split_lines};
use crate::error::AssetError;
use crate::fonts::{FontChoice, FontLibrary, FontWeight, resolve_font};
use crate::layout::{LayoutRegistry, LayoutTemplate, Palette, Panel, Surface, TemplateArt, TextAlign, TextSlot};
use crate::units::{Fit, PhysicalDimensions, Rect, pt_to_mm};

pub const LOGO_PLACEHOLDER_TEXT: &str = "LOGO";
pub const NO_LAYOUT_TEXT: &str = "no layout selected";

const LOGO_PLACEHOLDER_PT: f64 = 14.0;
const SLOT_PLACEHOLDER_PT: f64 = 10.0;
const DIAGNOSTIC_PT: f64 = 8.0;
const PLACEHOLDER_STROKE_MM: f64 = 0.3;

// Vertical font metrics (em fractions) used to put a baseline inside its
// line box the way a browser does.
const ASCENT: f64 = 0.905;
const DESCENT: f64 = 0.212;

/// One line of text. `x` is the anchor named by `align`.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TextOp {
    pub x: f64,
    pub baseline: f64,
    pub text: String,
    pub font: FontChoice,
    pub size_pt: f64,
    pub weight: FontWeight,
    pub align: TextAlign,
    pub color: HexColor,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "op", rename_all = "camelCase")]
pub enum DrawOp {
    FillRect {
        rect: Rect,
        color: HexColor,
    },
    StrokeRect {
        rect: Rect,
        color: HexColor,
        width: f64,
        dashed: bool,
    },
    /// `frame` is the slot; the renderer fits the bitmap into it.
    PlaceImage {
        frame: Rect,
        image: ImageId,
        fit: Fit,
    },
    PlaceText(TextOp),
    /// Recoloured template artwork whose viewBox maps onto `frame`.
    PlaceSvg {
        frame: Rect,
        svg: String,
    },
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Scene {
    pub face: Face,
    pub page: Rect,
    pub trim: Rect,
    pub ops: Vec<DrawOp>,
}

impl Scene {
    pub fn texts(&self) -> impl Iterator<Item = &TextOp> {
        self.ops.iter().filter_map(|op| match op {
            DrawOp::PlaceText(t) => Some(t),
            _ => None,
        })
    }

    /// Logo handles the scene draws.
    pub fn images(&self) -> impl Iterator<Item = ImageId> + '_ {
        self.ops.iter().filter_map(|op| match op {
            DrawOp::PlaceImage { image, .. } => Some(*image),
            _ => None,
        })
    }
}

/// What rendering reads besides the design.
#[derive(Clone, Copy, Debug)]
pub struct RenderContext<'a> {
    pub registry: &'a LayoutRegistry,
    pub images: &'a ImageStore,
    /// Only the PDF writer reads this; scenes name fonts by catalog entry.
    pub fonts: &'a FontLibrary,
    pub dims: PhysicalDimensions,
}

impl<'a> RenderContext<'a> {
    pub fn new(registry: &'a LayoutRegistry, images: &'a ImageStore) -> Self {
        RenderContext {
            registry,
            images,
            fonts: FontLibrary::empty(),
            dims: PhysicalDimensions::CANONICAL,
        }
    }

    pub fn with_fonts(self, fonts: &'a FontLibrary) -> Self {
        RenderContext { fonts, ..self }
    }
}

pub fn render(design: &LabelDesign, face: Face, ctx: &RenderContext<'_>) -> Scene {
    let mut scene = Scene {
        face,
        page: ctx.dims.page_rect(),
        trim: ctx.dims.trim_rect(),
        ops: Vec::new(),
    };
    match face {
        Face::FacingOut => render_facing_out(design, ctx, &mut scene),
        Face::FacingIn => match ctx.registry.get(&design.selected_layout_id) {
            Ok(layout) => render_facing_in(design, layout, ctx, &mut scene),
            Err(e) => {
                tracing::warn!(error = %e, "rendering diagnostic face");
                let (cx, cy) = scene.trim.center();
                scene.ops.push(DrawOp::PlaceText(text_line(
                    cx,
                    cy,
                    NO_LAYOUT_TEXT,
                    crate::fonts::FALLBACK_FONT,
                    DIAGNOSTIC_PT,
                    FontWeight::Normal,
                    TextAlign::Center,
                    HexColor::from_rgb(Rgb::BLACK),
                )));
            }
        },
    }
    tracing::debug!(face = ?face, ops = scene.ops.len(), "scene rendered");
    scene
}

fn render_facing_out(design: &LabelDesign, ctx: &RenderContext<'_>, scene: &mut Scene) {
    scene.ops.push(DrawOp::FillRect {
        rect: scene.page,
        color: design.background_color.clone(),
    });
    let scale = design.logo_size_facing_out.max(0.0) / 100.0;
    let (cx, cy) = scene.trim.center();
    let frame = Rect::centered(cx, cy, scene.trim.w * scale, scene.trim.h * scale);
    let ink = HexColor::from_rgb(contrast_color(design.background_color.rgb()));
    match usable_logo(design, ctx) {
        Some(image) => scene.ops.push(DrawOp::PlaceImage {
            frame,
            image,
            fit: Fit::Contain,
        }),
        None => scene.ops.push(DrawOp::PlaceText(text_line(
            cx,
            cy,
            LOGO_PLACEHOLDER_TEXT,
            resolve_font(&design.phone_style.font),
            LOGO_PLACEHOLDER_PT,
            FontWeight::Bold,
            TextAlign::Center,
            ink,
        ))),
    }
}

fn render_facing_in(
    design: &LabelDesign,
    layout: &LayoutTemplate,
    ctx: &RenderContext<'_>,
    scene: &mut Scene,
) {
    let palette = Palette {
        background: design.background_color.clone(),
        accent: design.accent_color.clone(),
    };
    match &layout.background {
        TemplateArt::Svg(source) => scene.ops.push(DrawOp::PlaceSvg {
            frame: scene.page,
            svg: palette.recolor_svg(source),
        }),
        TemplateArt::Panels(panels) => {
            for panel in panels {
                push_panel(panel, &palette, scene);
            }
        }
    }

    // Logo
    let slot = layout.slots.logo;
    let at = design.logo_position.unwrap_or(Placement::new(slot.x, slot.y));
    let scale = design.logo_size_facing_in.max(0.0) / 100.0;
    let (cx, cy) = scene.trim.point_at_pct(at.x, at.y);
    let frame = Rect::centered(
        cx,
        cy,
        scene.trim.w * slot.w / 100.0 * scale,
        scene.trim.h * slot.h / 100.0 * scale,
    );
    match usable_logo(design, ctx) {
        Some(image) => scene.ops.push(DrawOp::PlaceImage {
            frame,
            image,
            fit: Fit::Contain,
        }),
        None => {
            let ink = ink_on(slot.surface, &palette);
            scene.ops.push(DrawOp::StrokeRect {
                rect: frame,
                color: ink.clone(),
                width: PLACEHOLDER_STROKE_MM,
                dashed: true,
            });
            scene.ops.push(DrawOp::PlaceText(text_line(
                cx,
                cy,
                LOGO_PLACEHOLDER_TEXT,
                resolve_font(&design.phone_style.font),
                SLOT_PLACEHOLDER_PT,
                FontWeight::Bold,
                TextAlign::Center,
                ink,
            )));
        }
    }

    push_text_block(
        &design.phone_text,
        &design.phone_style,
        design.phone_position,
        layout.slots.phone,
        &palette,
        scene,
    );
    push_text_block(
        &design.location_text,
        &design.location_style,
        design.location_position,
        layout.slots.location,
        &palette,
        scene,
    );
}

/// Logo handle when its bitmap is ready; otherwise the caller draws the
/// placeholder. Only decode failures are worth a warning.
fn usable_logo(design: &LabelDesign, ctx: &RenderContext<'_>) -> Option<ImageId> {
    let id = design.logo?;
    match ctx.images.resolve(id) {
        Ok(_) => Some(id),
        Err(AssetError::Pending) => {
            tracing::debug!(%id, "logo still decoding, drawing placeholder");
            None
        }
        Err(e) => {
            tracing::warn!(%id, error = %e, "logo unavailable, drawing placeholder");
            None
        }
    }
}

fn push_panel(panel: &Panel, palette: &Palette, scene: &mut Scene) {
    let rect = panel.rect.resolve(scene.trim, scene.page);
    if let Some(fill) = panel.fill {
        match HexColor::parse(palette.substitute(fill)) {
            Ok(color) => scene.ops.push(DrawOp::FillRect { rect, color }),
            Err(e) => tracing::warn!(error = %e, "skipping panel fill"),
        }
    }
    if let Some((stroke, width)) = panel.stroke {
        match HexColor::parse(palette.substitute(stroke)) {
            Ok(color) => scene.ops.push(DrawOp::StrokeRect {
                rect,
                color,
                width,
                dashed: false,
            }),
            Err(e) => tracing::warn!(error = %e, "skipping panel stroke"),
        }
    }
    if let Some(caption) = &panel.caption {
        let color = HexColor::parse(palette.substitute(caption.color))
            .unwrap_or_else(|_| HexColor::from_rgb(Rgb::BLACK));
        let (cx, cy) = rect.center();
        scene.ops.push(DrawOp::PlaceText(text_line(
            cx,
            cy,
            caption.text,
            resolve_font(caption.font),
            caption.size_pt,
            caption.weight,
            TextAlign::Center,
            color,
        )));
    }
}

/// Contrast ink for content sitting on `surface`.
fn ink_on(surface: Surface, palette: &Palette) -> HexColor {
    let fill = match surface {
        Surface::Background => &palette.background,
        Surface::Accent => &palette.accent,
    };
    HexColor::from_rgb(contrast_color(fill.rgb()))
}

fn push_text_block(
    text: &str,
    style: &TextStyle,
    position: Option<Placement>,
    slot: TextSlot,
    palette: &Palette,
    scene: &mut Scene,
) {
    let at = position.unwrap_or(Placement::new(slot.x, slot.y));
    let (x, cy) = scene.trim.point_at_pct(at.x, at.y);
    let color = ink_on(slot.surface, palette);
    let font = resolve_font(&style.font);
    let lines = split_lines(text);
    let line_h = line_height_mm(style.size_pt);
    let top = cy - line_h * lines.len() as f64 / 2.0;
    for (i, line) in lines.iter().enumerate() {
        // Blank lines keep their slot in the stack but draw nothing.
        if line.trim().is_empty() {
            continue;
        }
        scene.ops.push(DrawOp::PlaceText(TextOp {
            x,
            baseline: baseline_in_line(top + line_h * i as f64, style.size_pt),
            text: (*line).to_string(),
            font,
            size_pt: style.size_pt,
            weight: style.weight,
            align: slot.align,
            color: color.clone(),
        }));
    }
}

/// Height of one stacked line in mm.
pub fn line_height_mm(size_pt: f64) -> f64 {
    pt_to_mm(size_pt * LINE_HEIGHT_RATIO)
}

fn baseline_in_line(line_top: f64, size_pt: f64) -> f64 {
    let size = pt_to_mm(size_pt);
    let content = (ASCENT + DESCENT) * size;
    line_top + (line_height_mm(size_pt) - content) / 2.0 + ASCENT * size
}

/// Single line whose line box is centred on (`x`, `cy`).
#[allow(clippy::too_many_arguments)]
fn text_line(
    x: f64,
    cy: f64,
    text: &str,
    font: FontChoice,
    size_pt: f64,
    weight: FontWeight,
    align: TextAlign,
    color: HexColor,
) -> TextOp {
    let top = cy - line_height_mm(size_pt) / 2.0;
    TextOp {
        x,
        baseline: baseline_in_line(top, size_pt),
        text: text.to_string(),
        font,
        size_pt,
        weight,
        align,
        color,
    }
}
