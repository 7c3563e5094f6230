use serde::{Deserialize, Serialize};

use crate::assets::ImageId;
use crate::color::{HexColor, Rgb};
use crate::constants::{PLACEMENT_MAX_PCT, PLACEMENT_MIN_PCT};
use crate::fonts::FontWeight;
use crate::layout::DEFAULT_LAYOUT_ID;

/// One printed side of the label.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Face {
    /// Logo on the background colour, independent of the layout.
    FacingOut,
    /// Full service-record layout.
    FacingIn,
}

impl Face {
    /// Print order.
    pub const ALL: [Face; 2] = [Face::FacingOut, Face::FacingIn];

    pub fn slug(self) -> &'static str {
        match self {
            Face::FacingOut => "facing-out",
            Face::FacingIn => "facing-in",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextStyle {
    /// Font catalog id or display name.
    pub font: String,
    pub size_pt: f64,
    #[serde(default)]
    pub weight: FontWeight,
}

impl TextStyle {
    pub fn new(font: &str, size_pt: f64, weight: FontWeight) -> Self {
        TextStyle {
            font: font.to_string(),
            size_pt,
            weight,
        }
    }
}

/// Centre of an element in percent of the trim area.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Placement {
    pub x: f64,
    pub y: f64,
}

impl Placement {
    pub fn new(x: f64, y: f64) -> Self {
        Placement { x, y }
    }

    /// The editor's soft range. Rendering itself accepts any value.
    pub fn clamped(self) -> Self {
        Placement {
            x: self.x.clamp(PLACEMENT_MIN_PCT, PLACEMENT_MAX_PCT),
            y: self.y.clamp(PLACEMENT_MIN_PCT, PLACEMENT_MAX_PCT),
        }
    }
}

/// The element a placement or style applies to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Element {
    Logo,
    Phone,
    Location,
}

/// Everything the user controls. Owned by the editing session; export works
/// on a clone taken at request time.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LabelDesign {
    /// Handle into the session's image store. Not part of the JSON form.
    #[serde(skip)]
    pub logo: Option<ImageId>,
    pub phone_text: String,
    /// May contain line breaks; each line is placed on its own.
    pub location_text: String,
    pub background_color: HexColor,
    pub accent_color: HexColor,
    pub selected_layout_id: String,
    pub phone_style: TextStyle,
    pub location_style: TextStyle,
    pub logo_position: Option<Placement>,
    pub phone_position: Option<Placement>,
    pub location_position: Option<Placement>,
    /// Logo frame on the outward face, percent of the trim size.
    pub logo_size_facing_out: f64,
    /// Logo frame on the inward face, percent of the layout's logo slot.
    pub logo_size_facing_in: f64,
}

impl Default for LabelDesign {
    fn default() -> Self {
        LabelDesign {
            logo: None,
            phone_text: "(555) 123-4567".to_string(),
            location_text: "123 Main Street\nYour City".to_string(),
            background_color: HexColor::from_rgb(Rgb::WHITE),
            accent_color: HexColor::from_rgb(Rgb::new(0xF9, 0x73, 0x16)),
            selected_layout_id: DEFAULT_LAYOUT_ID.to_string(),
            phone_style: TextStyle::new("bebas-neue", 11.0, FontWeight::Bold),
            location_style: TextStyle::new("bebas-neue", 9.0, FontWeight::Normal),
            logo_position: None,
            phone_position: None,
            location_position: None,
            logo_size_facing_out: 75.0,
            logo_size_facing_in: 100.0,
        }
    }
}

impl LabelDesign {
    pub fn position(&self, element: Element) -> Option<Placement> {
        match element {
            Element::Logo => self.logo_position,
            Element::Phone => self.phone_position,
            Element::Location => self.location_position,
        }
    }

    pub fn position_mut(&mut self, element: Element) -> &mut Option<Placement> {
        match element {
            Element::Logo => &mut self.logo_position,
            Element::Phone => &mut self.phone_position,
            Element::Location => &mut self.location_position,
        }
    }

    /// Lines of the location block with line endings normalised.
    pub fn location_lines(&self) -> Vec<&str> {
        split_lines(&self.location_text)
    }
}

/// Split on `\n`, dropping a trailing `\r` from each line.
pub fn split_lines(text: &str) -> Vec<&str> {
    text.split('\n').map(|l| l.strip_suffix('\r').unwrap_or(l)).collect()
}
