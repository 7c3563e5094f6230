//! Font catalog for phone/location text.
//!
//! The preview hands the CSS family stack to the browser. The PDF writer
//! embeds the font program a [`FontLibrary`] holds for the choice; when it
//! has none, the choice names the base-14 family it prints with and widths
//! come from the standard AFM tables so alignment still matches.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, OnceLock};

use serde::{Deserialize, Serialize};
use usvg::fontdb;

use crate::error::AssetError;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FontWeight {
    #[default]
    Normal,
    Bold,
}

impl FontWeight {
    pub fn css(self) -> &'static str {
        match self {
            FontWeight::Normal => "normal",
            FontWeight::Bold => "bold",
        }
    }

    fn other(self) -> Self {
        match self {
            FontWeight::Normal => FontWeight::Bold,
            FontWeight::Bold => FontWeight::Normal,
        }
    }

    fn fontdb(self) -> fontdb::Weight {
        match self {
            FontWeight::Normal => fontdb::Weight::NORMAL,
            FontWeight::Bold => fontdb::Weight::BOLD,
        }
    }
}

/// PDF base-14 families the export can print with.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PdfBaseFont {
    Helvetica,
    Courier,
}

impl PdfBaseFont {
    pub fn base_name(self, weight: FontWeight) -> &'static str {
        match (self, weight) {
            (PdfBaseFont::Helvetica, FontWeight::Normal) => "Helvetica",
            (PdfBaseFont::Helvetica, FontWeight::Bold) => "Helvetica-Bold",
            (PdfBaseFont::Courier, FontWeight::Normal) => "Courier",
            (PdfBaseFont::Courier, FontWeight::Bold) => "Courier-Bold",
        }
    }

    /// Advance width of `text` in font units (1/1000 em).
    pub fn text_width_units(self, weight: FontWeight, text: &str) -> u32 {
        text.chars().map(|ch| self.char_width(weight, ch)).sum()
    }

    /// Width of `text` in the same unit as `size`.
    pub fn text_width(self, weight: FontWeight, text: &str, size: f64) -> f64 {
        self.text_width_units(weight, text) as f64 * size / 1000.0
    }

    fn char_width(self, weight: FontWeight, ch: char) -> u32 {
        if self == PdfBaseFont::Courier {
            return 600;
        }
        let table = match weight {
            FontWeight::Normal => &HELVETICA_WIDTHS,
            FontWeight::Bold => &HELVETICA_BOLD_WIDTHS,
        };
        let code = ch as u32;
        if (0x20..=0x7E).contains(&code) {
            table[(code - 0x20) as usize] as u32
        } else {
            // Latin-1 and substituted glyphs; close to the digit advance.
            556
        }
    }
}

// Printable ASCII 0x20..=0x7E, WinAnsi glyph advances.
#[rustfmt::skip]
const HELVETICA_WIDTHS: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278,
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 278, 278, 584, 584, 584, 556,
    1015, 667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, 722, 778,
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 278, 278, 278, 469, 556,
    333, 556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, 556, 556,
    556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, 334, 260, 334, 584,
];

#[rustfmt::skip]
const HELVETICA_BOLD_WIDTHS: [u16; 95] = [
    278, 333, 474, 556, 556, 889, 722, 238, 333, 333, 389, 584, 278, 333, 278, 278,
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 333, 333, 584, 584, 584, 611,
    975, 722, 722, 722, 722, 667, 611, 778, 722, 278, 556, 722, 611, 833, 722, 778,
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 333, 278, 333, 584, 556,
    333, 556, 611, 556, 611, 556, 333, 611, 611, 278, 278, 556, 278, 889, 611, 611,
    611, 611, 389, 556, 333, 611, 556, 778, 556, 556, 500, 389, 280, 389, 584,
];

/// One entry of the fixed font catalog.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct FontChoice {
    pub id: &'static str,
    pub display_name: &'static str,
    /// CSS `font-family` value, always ending in a generic family.
    pub css_family: &'static str,
    pub pdf_base: PdfBaseFont,
}

pub const FALLBACK_FONT: FontChoice = FontChoice {
    id: "sans-serif",
    display_name: "Sans Serif",
    css_family: "sans-serif",
    pdf_base: PdfBaseFont::Helvetica,
};

pub const FONT_CATALOG: [FontChoice; 8] = [
    FontChoice {
        id: "bebas-neue",
        display_name: "Bebas Neue",
        css_family: "'Bebas Neue', sans-serif",
        pdf_base: PdfBaseFont::Helvetica,
    },
    FontChoice {
        id: "oswald",
        display_name: "Oswald",
        css_family: "'Oswald', sans-serif",
        pdf_base: PdfBaseFont::Helvetica,
    },
    FontChoice {
        id: "roboto",
        display_name: "Roboto",
        css_family: "'Roboto', sans-serif",
        pdf_base: PdfBaseFont::Helvetica,
    },
    FontChoice {
        id: "montserrat",
        display_name: "Montserrat",
        css_family: "'Montserrat', sans-serif",
        pdf_base: PdfBaseFont::Helvetica,
    },
    FontChoice {
        id: "arial",
        display_name: "Arial",
        css_family: "Arial, sans-serif",
        pdf_base: PdfBaseFont::Helvetica,
    },
    FontChoice {
        id: "arial-narrow",
        display_name: "Arial Narrow",
        css_family: "'Arial Narrow', sans-serif",
        pdf_base: PdfBaseFont::Helvetica,
    },
    FontChoice {
        id: "impact",
        display_name: "Impact",
        css_family: "Impact, sans-serif",
        pdf_base: PdfBaseFont::Helvetica,
    },
    FontChoice {
        id: "courier-prime",
        display_name: "Courier Prime",
        css_family: "'Courier Prime', monospace, sans-serif",
        pdf_base: PdfBaseFont::Courier,
    },
];

/// Look up a catalog entry by id or display name; unknown names fall back to
/// the generic sans-serif choice.
pub fn resolve_font(name: &str) -> FontChoice {
    let name = name.trim();
    FONT_CATALOG
        .iter()
        .find(|f| f.id.eq_ignore_ascii_case(name) || f.display_name.eq_ignore_ascii_case(name))
        .copied()
        .unwrap_or_else(|| {
            tracing::debug!(font = name, "unknown font, using sans-serif");
            FALLBACK_FONT
        })
}

/// Font programs available to the PDF writer.
///
/// Faces registered for a catalog id win; otherwise the choice's display
/// name is looked up among whatever else the database holds (system fonts
/// for the CLI). Clones share the loaded data until one of them registers
/// another face.
#[derive(Clone, Default)]
pub struct FontLibrary {
    inner: Arc<LibraryInner>,
}

#[derive(Clone)]
struct LibraryInner {
    db: fontdb::Database,
    bound: HashMap<(&'static str, FontWeight), fontdb::ID>,
}

impl Default for LibraryInner {
    fn default() -> Self {
        LibraryInner {
            db: fontdb::Database::new(),
            bound: HashMap::new(),
        }
    }
}

impl fmt::Debug for FontLibrary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FontLibrary")
            .field("faces", &self.inner.db.len())
            .field("bound", &self.inner.bound.len())
            .finish()
    }
}

impl FontLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Library shared by contexts that were not given one; it holds no faces.
    pub fn empty() -> &'static FontLibrary {
        static EMPTY: OnceLock<FontLibrary> = OnceLock::new();
        EMPTY.get_or_init(FontLibrary::new)
    }

    pub fn system() -> Self {
        let mut lib = Self::new();
        let inner = Arc::make_mut(&mut lib.inner);
        inner.db.load_system_fonts();
        tracing::debug!(faces = inner.db.len(), "loaded system fonts");
        lib
    }

    pub fn is_empty(&self) -> bool {
        self.inner.db.len() == 0
    }

    /// Bind a TrueType/OpenType file to catalog entry `font` at `weight`.
    pub fn register(&mut self, font: &str, weight: FontWeight, data: Vec<u8>) -> Result<(), AssetError> {
        let choice = std::iter::once(&FALLBACK_FONT)
            .chain(FONT_CATALOG.iter())
            .find(|f| f.id.eq_ignore_ascii_case(font.trim()))
            .ok_or_else(|| AssetError::Font(format!("{font} is not in the font catalog")))?;
        ttf_parser::Face::parse(&data, 0).map_err(|e| AssetError::Font(e.to_string()))?;
        let inner = Arc::make_mut(&mut self.inner);
        let id = inner
            .db
            .load_font_source(fontdb::Source::Binary(Arc::new(data)))
            .first()
            .copied()
            .ok_or_else(|| AssetError::Font(format!("no usable face for {}", choice.id)))?;
        inner.bound.insert((choice.id, weight), id);
        tracing::info!(font = choice.id, ?weight, "registered font program");
        Ok(())
    }

    /// Face to print `font` with, preferring the requested weight.
    pub fn face_for(&self, font: &FontChoice, weight: FontWeight) -> Option<fontdb::ID> {
        let inner = &self.inner;
        if let Some(id) = inner
            .bound
            .get(&(font.id, weight))
            .or_else(|| inner.bound.get(&(font.id, weight.other())))
        {
            return Some(*id);
        }
        inner.db.query(&fontdb::Query {
            families: &[fontdb::Family::Name(font.display_name)],
            weight: weight.fontdb(),
            stretch: fontdb::Stretch::Normal,
            style: fontdb::Style::Normal,
        })
    }

    pub fn post_script_name(&self, id: fontdb::ID) -> Option<String> {
        self.inner.db.face(id).map(|f| f.post_script_name.clone())
    }

    /// Run `f` over the raw file and face index of `id`.
    pub fn with_face_data<T>(&self, id: fontdb::ID, f: impl FnOnce(&[u8], u32) -> T) -> Option<T> {
        self.inner.db.with_face_data(id, f)
    }
}

/// Google Fonts stylesheet URL for the catalog's web fonts. The host page
/// injects it once; system fonts are skipped.
pub fn web_font_stylesheet_url() -> String {
    let families = FONT_CATALOG
        .iter()
        .filter(|f| !matches!(f.id, "arial" | "arial-narrow" | "impact"))
        .map(|f| format!("family={}", f.display_name.replace(' ', "+")))
        .collect::<Vec<_>>()
        .join("&");
    format!("https://fonts.googleapis.com/css2?{families}&display=swap")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_font_falls_back_to_sans_serif() {
        assert_eq!(resolve_font("Comic Papyrus"), FALLBACK_FONT);
        assert_eq!(resolve_font("Bebas Neue").id, "bebas-neue");
        assert_eq!(resolve_font("OSWALD").id, "oswald");
    }

    #[test]
    fn catalog_families_end_in_a_generic_family() {
        for f in FONT_CATALOG {
            assert!(f.css_family.ends_with("sans-serif"), "{}", f.id);
        }
    }

    #[test]
    fn bold_digits_share_regular_width_but_letters_differ() {
        let h = PdfBaseFont::Helvetica;
        assert_eq!(h.text_width_units(FontWeight::Normal, "0800"), 4 * 556);
        assert_eq!(h.text_width_units(FontWeight::Bold, "0800"), 4 * 556);
        assert!(h.text_width_units(FontWeight::Bold, "km") > h.text_width_units(FontWeight::Normal, "km"));
        assert!((PdfBaseFont::Courier.text_width(FontWeight::Bold, "ab", 10.0) - 12.0).abs() < 1e-9);
    }

    fn mono() -> Vec<u8> {
        std::fs::read(concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fonts/DejaVuSansMono.ttf")).unwrap()
    }

    #[test]
    fn registered_face_serves_both_weights_until_bold_is_bound() {
        let mut lib = FontLibrary::new();
        let bebas = resolve_font("bebas-neue");
        assert!(lib.face_for(&bebas, FontWeight::Bold).is_none());

        lib.register("Bebas-Neue", FontWeight::Normal, mono()).unwrap();
        let regular = lib.face_for(&bebas, FontWeight::Normal).unwrap();
        assert_eq!(lib.face_for(&bebas, FontWeight::Bold), Some(regular));
        assert_eq!(lib.post_script_name(regular).as_deref(), Some("DejaVuSansMono"));
        assert!(lib.face_for(&resolve_font("oswald"), FontWeight::Normal).is_none());

        lib.register("bebas-neue", FontWeight::Bold, mono()).unwrap();
        assert_ne!(lib.face_for(&bebas, FontWeight::Bold), Some(regular));
    }

    #[test]
    fn register_rejects_unknown_ids_and_garbage() {
        let mut lib = FontLibrary::new();
        assert!(matches!(
            lib.register("comic-papyrus", FontWeight::Normal, mono()),
            Err(AssetError::Font(_))
        ));
        assert!(matches!(
            lib.register("roboto", FontWeight::Normal, b"not a font".to_vec()),
            Err(AssetError::Font(_))
        ));
        assert!(lib.is_empty());
        assert!(FontLibrary::empty().is_empty());
    }

    #[test]
    fn stylesheet_lists_web_fonts_only() {
        let url = web_font_stylesheet_url();
        assert!(url.contains("family=Bebas+Neue"));
        assert!(!url.contains("Impact"));
    }
}
