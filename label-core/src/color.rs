use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::ColorError;

/// The configurator's predefined swatches.
pub const PRESET_COLORS: [&str; 8] = [
    "#222222", // black
    "#FFFFFF", // white
    "#F97316", // orange
    "#0EA5E9", // blue
    "#8B5CF6", // purple
    "#22C55E", // green
    "#EF4444", // red
    "#F59E0B", // amber
];

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const BLACK: Rgb = Rgb { r: 0, g: 0, b: 0 };
    pub const WHITE: Rgb = Rgb {
        r: 255,
        g: 255,
        b: 255,
    };

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Rgb { r, g, b }
    }

    /// Channels scaled to 0.0..=1.0, the form PDF colour operators take.
    pub fn to_unit(self) -> [f32; 3] {
        [
            self.r as f32 / 255.0,
            self.g as f32 / 255.0,
            self.b as f32 / 255.0,
        ]
    }
}

/// Integer percentages 0-100.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cmyk {
    pub c: u8,
    pub m: u8,
    pub y: u8,
    pub k: u8,
}

/// Parse `#RGB`, `#RRGGBB`, `RGB` or `RRGGBB`.
pub fn hex_to_rgb(hex: &str) -> Result<Rgb, ColorError> {
    let invalid = || ColorError::InvalidColorFormat {
        input: hex.to_string(),
    };
    let digits = hex.trim().strip_prefix('#').unwrap_or(hex.trim());
    if !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(invalid());
    }
    let channel = |s: &str| u8::from_str_radix(s, 16).map_err(|_| invalid());
    match digits.len() {
        3 => {
            let mut out = [0u8; 3];
            for (i, c) in digits.chars().enumerate() {
                let doubled: String = [c, c].iter().collect();
                out[i] = channel(&doubled)?;
            }
            Ok(Rgb::new(out[0], out[1], out[2]))
        }
        6 => Ok(Rgb::new(
            channel(&digits[0..2])?,
            channel(&digits[2..4])?,
            channel(&digits[4..6])?,
        )),
        _ => Err(invalid()),
    }
}

pub fn rgb_to_hex(c: Rgb) -> String {
    format!("#{:02X}{:02X}{:02X}", c.r, c.g, c.b)
}

/// Canonical `#RRGGBB` uppercase form of any accepted hex input.
pub fn normalize_hex(hex: &str) -> Result<String, ColorError> {
    hex_to_rgb(hex).map(rgb_to_hex)
}

pub fn rgb_to_cmyk(c: Rgb) -> Cmyk {
    let r = c.r as f64 / 255.0;
    let g = c.g as f64 / 255.0;
    let b = c.b as f64 / 255.0;
    let k = 1.0 - r.max(g).max(b);
    let k_pct = pct(k);
    // Rounded key of 100 is pure black; the chroma terms divide by ~0.
    if k_pct >= 100 {
        return Cmyk {
            c: 0,
            m: 0,
            y: 0,
            k: 100,
        };
    }
    let chroma = |v: f64| pct((1.0 - v - k) / (1.0 - k));
    Cmyk {
        c: chroma(r),
        m: chroma(g),
        y: chroma(b),
        k: k_pct,
    }
}

pub fn cmyk_to_rgb(c: Cmyk) -> Rgb {
    let k = c.k.min(100) as f64 / 100.0;
    let channel = |v: u8| {
        let v = v.min(100) as f64 / 100.0;
        (255.0 * (1.0 - v) * (1.0 - k)).round().clamp(0.0, 255.0) as u8
    };
    Rgb::new(channel(c.c), channel(c.m), channel(c.y))
}

fn pct(v: f64) -> u8 {
    (v * 100.0).round().clamp(0.0, 100.0) as u8
}

/// Perceived brightness in 0.0..=1.0.
pub fn relative_luminance(c: Rgb) -> f64 {
    (0.299 * c.r as f64 + 0.587 * c.g as f64 + 0.114 * c.b as f64) / 255.0
}

pub fn is_light(c: Rgb) -> bool {
    relative_luminance(c) > 0.5
}

/// Legible overlay colour for text drawn on `background`.
pub fn contrast_color(background: Rgb) -> Rgb {
    if is_light(background) {
        Rgb::BLACK
    } else {
        Rgb::WHITE
    }
}

/// A validated sRGB colour kept in `#RRGGBB` uppercase form.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct HexColor(String);

impl HexColor {
    pub fn parse(s: &str) -> Result<Self, ColorError> {
        normalize_hex(s).map(HexColor)
    }

    pub fn from_rgb(c: Rgb) -> Self {
        HexColor(rgb_to_hex(c))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn rgb(&self) -> Rgb {
        // Constructors only store normalised strings.
        hex_to_rgb(&self.0).unwrap_or_default()
    }

    pub fn cmyk(&self) -> Cmyk {
        rgb_to_cmyk(self.rgb())
    }

    /// Case-insensitive comparison against an arbitrary hex token.
    pub fn matches(&self, other: &str) -> bool {
        self.0.eq_ignore_ascii_case(other.trim())
    }
}

impl fmt::Display for HexColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for HexColor {
    type Err = ColorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        HexColor::parse(s)
    }
}

impl Serialize for HexColor {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for HexColor {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        HexColor::parse(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_short_and_long_forms_with_or_without_hash() {
        assert_eq!(hex_to_rgb("#fa0").unwrap(), Rgb::new(255, 170, 0));
        assert_eq!(hex_to_rgb("FFAA00").unwrap(), Rgb::new(255, 170, 0));
        assert_eq!(hex_to_rgb("#112233").unwrap(), Rgb::new(0x11, 0x22, 0x33));
        assert_eq!(normalize_hex("abc").unwrap(), "#AABBCC");
    }

    #[test]
    fn rejects_malformed_hex() {
        for bad in ["", "#", "#12", "#1234", "#GGGGGG", "12345", "#1234567", "#12 345"] {
            assert!(
                matches!(hex_to_rgb(bad), Err(ColorError::InvalidColorFormat { .. })),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn hex_round_trip_is_exact() {
        for v in (0u32..=0xFFFFFF).step_by(0x010203) {
            let hex = format!("#{v:06x}");
            let back = rgb_to_hex(hex_to_rgb(&hex).unwrap());
            assert!(back.eq_ignore_ascii_case(&hex));
        }
    }

    #[test]
    fn rgb_through_cmyk_stays_within_two_units() {
        for r in (0..=255u16).step_by(3) {
            for g in (0..=255u16).step_by(5) {
                for b in (0..=255u16).step_by(7) {
                    let c = Rgb::new(r as u8, g as u8, b as u8);
                    let back = cmyk_to_rgb(rgb_to_cmyk(c));
                    assert!((back.r as i16 - c.r as i16).abs() <= 2, "{c:?} -> {back:?}");
                    assert!((back.g as i16 - c.g as i16).abs() <= 2, "{c:?} -> {back:?}");
                    assert!((back.b as i16 - c.b as i16).abs() <= 2, "{c:?} -> {back:?}");
                }
            }
        }
    }

    // Chroma is quantised by integer RGB: half an RGB step moves it by
    // 50 / (255 * (1 - k)) percent, so the two-point bound only holds up to
    // k = 80 and widens towards black.
    fn chroma_tolerance(k: u8) -> i16 {
        let remaining = (255.0 * (1.0 - k as f64 / 100.0)).max(1.0);
        (1 + (50.0 / remaining).ceil() as i16).max(2)
    }

    #[test]
    fn cmyk_produced_from_rgb_survives_the_reverse_trip() {
        for r in 0..=255u16 {
            for g in (0..=255u16).step_by(3) {
                for b in (0..=255u16).step_by(3) {
                    let first = rgb_to_cmyk(Rgb::new(r as u8, g as u8, b as u8));
                    let second = rgb_to_cmyk(cmyk_to_rgb(first));
                    assert!((first.k as i16 - second.k as i16).abs() <= 2, "{first:?} vs {second:?}");
                    let tol = chroma_tolerance(first.k);
                    for (a, b) in [(first.c, second.c), (first.m, second.m), (first.y, second.y)] {
                        assert!((a as i16 - b as i16).abs() <= tol, "{first:?} vs {second:?}");
                    }
                }
            }
        }
    }

    #[test]
    fn light_and_mid_tones_keep_the_two_point_bound() {
        assert!((0..=80).all(|k| chroma_tolerance(k) == 2));
        assert_eq!(chroma_tolerance(98), 11);
        let first = Cmyk { c: 100, m: 50, y: 0, k: 98 };
        let second = rgb_to_cmyk(cmyk_to_rgb(first));
        assert!((first.m as i16 - second.m as i16).abs() <= chroma_tolerance(98));
    }

    #[test]
    fn pure_black_has_no_chroma() {
        assert_eq!(
            rgb_to_cmyk(Rgb::BLACK),
            Cmyk {
                c: 0,
                m: 0,
                y: 0,
                k: 100
            }
        );
        assert_eq!(rgb_to_cmyk(Rgb::new(0, 1, 0)).c, 0);
        assert_eq!(cmyk_to_rgb(rgb_to_cmyk(Rgb::WHITE)), Rgb::WHITE);
    }

    #[test]
    fn luminance_threshold_is_strict() {
        assert!(relative_luminance(Rgb::WHITE) > 0.5);
        assert!(relative_luminance(Rgb::BLACK) <= 0.5);
        assert_eq!(contrast_color(Rgb::WHITE), Rgb::BLACK);
        assert_eq!(contrast_color(Rgb::new(0x11, 0x22, 0x33)), Rgb::WHITE);
    }

    #[test]
    fn hex_color_serializes_normalized() {
        let c: HexColor = serde_json::from_str("\"#f97316\"").unwrap();
        assert_eq!(c.as_str(), "#F97316");
        assert_eq!(serde_json::to_string(&c).unwrap(), "\"#F97316\"");
        assert!(serde_json::from_str::<HexColor>("\"orange\"").is_err());
        assert!(c.matches("#f97316"));
    }
}
