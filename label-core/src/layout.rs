//! Layout template registry.
//!
//! A layout is plain data: background artwork with recolourable regions plus
//! default slots for the logo and the two text blocks. Adding a layout means
//! registering another `LayoutTemplate`, never a new render branch.

use serde::Serialize;

use crate::color::HexColor;
use crate::error::LayoutNotFound;
use crate::fonts::FontWeight;
use crate::units::Rect;

/// Fill value in template artwork replaced by the design's background colour.
pub const BACKGROUND_PLACEHOLDER: &str = "#FF00FF";
/// Fill value in template artwork replaced by the design's accent colour.
pub const ACCENT_PLACEHOLDER: &str = "#00FFFF";

pub const DEFAULT_LAYOUT_ID: &str = "classic";

const CLASSIC_SVG: &str = include_str!("../assets/templates/classic.svg");
const PANEL_SVG: &str = include_str!("../assets/templates/panel.svg");

/// Horizontal anchor of a text block.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextAlign {
    Left,
    #[default]
    Center,
    Right,
}

/// Which design colour text placed in a slot sits on; the ink is the
/// contrast colour of that surface.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Surface {
    Background,
    Accent,
}

/// Anchor for the logo. Position is the centre, size is the frame, all in
/// percent of the trim area. `surface` colours the placeholder ink.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct LogoSlot {
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
    pub surface: Surface,
}

/// Anchor for a text block: centre of the block vertically, alignment anchor
/// horizontally.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct TextSlot {
    pub x: f64,
    pub y: f64,
    pub align: TextAlign,
    pub surface: Surface,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct Slots {
    pub logo: LogoSlot,
    pub phone: TextSlot,
    pub location: TextSlot,
}

/// Rectangle in percent of the trim area. Edges lying on the trim line
/// (0 or 100) are pushed out to the page edge so fills run into the bleed.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct PctRect {
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
}

impl PctRect {
    pub const fn new(x: f64, y: f64, w: f64, h: f64) -> Self {
        PctRect { x, y, w, h }
    }

    pub fn resolve(&self, trim: Rect, page: Rect) -> Rect {
        let (mut x0, mut y0) = trim.point_at_pct(self.x, self.y);
        let (mut x1, mut y1) = trim.point_at_pct(self.x + self.w, self.y + self.h);
        if self.x <= 0.0 {
            x0 = page.x;
        }
        if self.y <= 0.0 {
            y0 = page.y;
        }
        if self.x + self.w >= 100.0 {
            x1 = page.right();
        }
        if self.y + self.h >= 100.0 {
            y1 = page.bottom();
        }
        Rect::new(x0, y0, x1 - x0, y1 - y0)
    }
}

/// Fixed text printed inside a panel.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Caption {
    pub text: &'static str,
    pub font: &'static str,
    pub size_pt: f64,
    pub weight: FontWeight,
    pub color: &'static str,
}

/// One procedural region. `fill` and `stroke` may name a placeholder.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Panel {
    pub rect: PctRect,
    pub fill: Option<&'static str>,
    /// Stroke colour and width in mm.
    pub stroke: Option<(&'static str, f64)>,
    pub caption: Option<Caption>,
}

impl Panel {
    pub const fn fill(rect: PctRect, fill: &'static str) -> Self {
        Panel {
            rect,
            fill: Some(fill),
            stroke: None,
            caption: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "kind", content = "data", rename_all = "lowercase")]
pub enum TemplateArt {
    /// Vector artwork in page coordinates (viewBox = page in mm).
    Svg(&'static str),
    Panels(Vec<Panel>),
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutTemplate {
    pub id: &'static str,
    pub display_name: &'static str,
    /// Earlier ids this layout was known by.
    #[serde(skip)]
    pub aliases: &'static [&'static str],
    pub background: TemplateArt,
    pub slots: Slots,
}

/// The two design colours a template's placeholders resolve to.
#[derive(Clone, Debug, PartialEq)]
pub struct Palette {
    pub background: HexColor,
    pub accent: HexColor,
}

impl Palette {
    /// Substitute a single colour token. Anything that is not exactly a
    /// placeholder (ignoring case) is returned unchanged.
    pub fn substitute<'a>(&'a self, token: &'a str) -> &'a str {
        let t = token.trim();
        if t.eq_ignore_ascii_case(BACKGROUND_PLACEHOLDER) {
            self.background.as_str()
        } else if t.eq_ignore_ascii_case(ACCENT_PLACEHOLDER) {
            self.accent.as_str()
        } else {
            token
        }
    }

    /// Replace every placeholder token in SVG source. A token only matches
    /// when it is a complete `#RRGGBB` value, not the prefix of a longer hex run.
    pub fn recolor_svg(&self, svg: &str) -> String {
        let bytes = svg.as_bytes();
        let mut out = String::with_capacity(svg.len());
        let mut last = 0;
        let mut i = 0;
        while i < bytes.len() {
            if bytes[i] == b'#' && i + 7 <= bytes.len() {
                // Compare bytes; the 7 bytes after `#` may end inside a multibyte char.
                let candidate = &bytes[i..i + 7];
                let ends = bytes.get(i + 7).is_none_or(|b| !b.is_ascii_hexdigit());
                let replacement = if !ends {
                    None
                } else if candidate.eq_ignore_ascii_case(BACKGROUND_PLACEHOLDER.as_bytes()) {
                    Some(self.background.as_str())
                } else if candidate.eq_ignore_ascii_case(ACCENT_PLACEHOLDER.as_bytes()) {
                    Some(self.accent.as_str())
                } else {
                    None
                };
                if let Some(r) = replacement {
                    out.push_str(&svg[last..i]);
                    out.push_str(r);
                    i += 7;
                    last = i;
                    continue;
                }
            }
            i += 1;
        }
        out.push_str(&svg[last..]);
        out
    }
}

/// Catalog of layouts keyed by id.
#[derive(Clone, Debug)]
pub struct LayoutRegistry {
    templates: Vec<LayoutTemplate>,
}

impl LayoutRegistry {
    pub fn empty() -> Self {
        LayoutRegistry {
            templates: Vec::new(),
        }
    }

    /// The three shipped layouts.
    pub fn builtin() -> Self {
        let mut reg = LayoutRegistry::empty();
        reg.register(classic());
        reg.register(panel());
        reg.register(split());
        reg
    }

    /// Add a layout. A template with an id already present replaces it in place.
    pub fn register(&mut self, template: LayoutTemplate) {
        if let Some(slot) = self.templates.iter_mut().find(|t| t.id == template.id) {
            *slot = template;
        } else {
            self.templates.push(template);
        }
    }

    pub fn get(&self, id: &str) -> Result<&LayoutTemplate, LayoutNotFound> {
        let id = id.trim();
        self.templates
            .iter()
            .find(|t| t.id.eq_ignore_ascii_case(id))
            .or_else(|| {
                self.templates
                    .iter()
                    .find(|t| t.aliases.iter().any(|a| a.eq_ignore_ascii_case(id)))
            })
            .ok_or_else(|| LayoutNotFound(id.to_string()))
    }

    /// Layouts in registration order.
    pub fn list(&self) -> &[LayoutTemplate] {
        &self.templates
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_ok()
    }
}

impl Default for LayoutRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

fn classic() -> LayoutTemplate {
    LayoutTemplate {
        id: "classic",
        display_name: "Classic",
        aliases: &["layout1"],
        background: TemplateArt::Svg(CLASSIC_SVG),
        slots: Slots {
            logo: LogoSlot {
                x: 30.0,
                y: 42.0,
                w: 45.0,
                h: 42.0,
                surface: Surface::Background,
            },
            phone: TextSlot {
                x: 95.0,
                y: 22.0,
                align: TextAlign::Right,
                surface: Surface::Background,
            },
            location: TextSlot {
                x: 95.0,
                y: 42.0,
                align: TextAlign::Right,
                surface: Surface::Background,
            },
        },
    }
}

fn panel() -> LayoutTemplate {
    LayoutTemplate {
        id: "panel",
        display_name: "Panel",
        aliases: &["layout2"],
        background: TemplateArt::Svg(PANEL_SVG),
        slots: Slots {
            logo: LogoSlot {
                x: 25.0,
                y: 35.0,
                w: 42.0,
                h: 45.0,
                surface: Surface::Background,
            },
            phone: TextSlot {
                x: 25.0,
                y: 72.0,
                align: TextAlign::Center,
                surface: Surface::Background,
            },
            location: TextSlot {
                x: 25.0,
                y: 86.0,
                align: TextAlign::Center,
                surface: Surface::Background,
            },
        },
    }
}

const FIELD_X: f64 = 56.0;
const HEADER_W: f64 = 29.5;
const HEADER_H: f64 = 8.6;
const BOX_W: f64 = 38.3;
const BOX_H: f64 = 25.0;

// Black caption bar over a bordered write-on box.
fn write_on_field(label: &'static str, top: f64) -> [Panel; 2] {
    [
        Panel {
            rect: PctRect::new(FIELD_X, top, HEADER_W, HEADER_H),
            fill: Some("#000000"),
            stroke: None,
            caption: Some(Caption {
                text: label,
                font: "arial-narrow",
                size_pt: 6.0,
                weight: FontWeight::Bold,
                color: "#FFFFFF",
            }),
        },
        Panel {
            rect: PctRect::new(FIELD_X, top + HEADER_H, BOX_W, BOX_H),
            fill: Some("#FFFFFF"),
            stroke: Some(("#000000", 0.3)),
            caption: None,
        },
    ]
}

fn split() -> LayoutTemplate {
    let mut panels = vec![
        Panel::fill(PctRect::new(0.0, 0.0, 100.0, 100.0), BACKGROUND_PLACEHOLDER),
        Panel::fill(PctRect::new(0.0, 0.0, 50.8, 100.0), ACCENT_PLACEHOLDER),
    ];
    panels.extend(write_on_field("DATE", 11.7));
    panels.extend(write_on_field("KM", 54.7));
    LayoutTemplate {
        id: "split",
        display_name: "Split",
        aliases: &["layout3"],
        background: TemplateArt::Panels(panels),
        slots: Slots {
            logo: LogoSlot {
                x: 25.4,
                y: 30.0,
                w: 40.0,
                h: 40.0,
                surface: Surface::Accent,
            },
            phone: TextSlot {
                x: 25.4,
                y: 66.0,
                align: TextAlign::Center,
                surface: Surface::Accent,
            },
            location: TextSlot {
                x: 25.4,
                y: 82.0,
                align: TextAlign::Center,
                surface: Surface::Accent,
            },
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::units::PhysicalDimensions;

    fn palette() -> Palette {
        Palette {
            background: HexColor::parse("#112233").unwrap(),
            accent: HexColor::parse("#FFAA00").unwrap(),
        }
    }

    #[test]
    fn builtin_has_three_layouts_in_order() {
        let reg = LayoutRegistry::builtin();
        let ids: Vec<_> = reg.list().iter().map(|t| t.id).collect();
        assert_eq!(ids, ["classic", "panel", "split"]);
    }

    #[test]
    fn legacy_ids_resolve_as_aliases() {
        let reg = LayoutRegistry::builtin();
        assert_eq!(reg.get("layout1").unwrap().id, "classic");
        assert_eq!(reg.get("layout2").unwrap().id, "panel");
        assert_eq!(reg.get("LAYOUT3").unwrap().id, "split");
        assert_eq!(reg.get("nope"), Err(LayoutNotFound("nope".into())));
    }

    #[test]
    fn register_replaces_same_id() {
        let mut reg = LayoutRegistry::builtin();
        let mut t = reg.get("panel").unwrap().clone();
        t.display_name = "Panel II";
        reg.register(t);
        assert_eq!(reg.list().len(), 3);
        assert_eq!(reg.get("panel").unwrap().display_name, "Panel II");
    }

    #[test]
    fn recolor_is_exact_and_case_insensitive() {
        let svg = r##"<rect fill="#ff00ff"/><rect fill="#00FFFF"/><rect fill="#FF00FFAA"/><rect fill="#FE00FF"/>"##;
        let out = palette().recolor_svg(svg);
        assert_eq!(
            out,
            r##"<rect fill="#112233"/><rect fill="#FFAA00"/><rect fill="#FF00FFAA"/><rect fill="#FE00FF"/>"##
        );
    }

    #[test]
    fn recolor_tolerates_multibyte_text_after_hash() {
        let p = palette();
        assert_eq!(p.recolor_svg("<text>#1 Schön</text>"), "<text>#1 Schön</text>");
        assert_eq!(p.recolor_svg("#ö#ff00ff"), "#ö#112233");
        assert_eq!(p.recolor_svg("ab#€"), "ab#€");
    }

    #[test]
    fn substitute_leaves_other_colors() {
        let p = palette();
        assert_eq!(p.substitute("#ff00ff"), "#112233");
        assert_eq!(p.substitute("#00ffff"), "#FFAA00");
        assert_eq!(p.substitute("#1F2937"), "#1F2937");
    }

    #[test]
    fn shipped_svgs_carry_both_placeholders() {
        for svg in [CLASSIC_SVG, PANEL_SVG] {
            assert!(svg.contains(BACKGROUND_PLACEHOLDER));
            assert!(svg.contains(ACCENT_PLACEHOLDER));
        }
    }

    #[test]
    fn edge_panels_extend_into_bleed() {
        let dims = PhysicalDimensions::CANONICAL;
        let r = PctRect::new(0.0, 0.0, 50.0, 100.0).resolve(dims.trim_rect(), dims.page_rect());
        assert_eq!(r.x, 0.0);
        assert_eq!(r.y, 0.0);
        assert!((r.right() - (3.0 + 34.0)).abs() < 1e-9);
        assert!((r.bottom() - 51.0).abs() < 1e-9);

        let inner = PctRect::new(50.0, 50.0, 10.0, 10.0).resolve(dims.trim_rect(), dims.page_rect());
        assert!((inner.x - 37.0).abs() < 1e-9);
        assert!((inner.w - 6.8).abs() < 1e-9);
    }
}
