/// Application-wide numeric constants.
/// Values are expressed in millimeters unless noted otherwise.
/// Final label width after cutting.
pub const TRIM_WIDTH_MM: f64 = 68.0;
/// Final label height after cutting.
pub const TRIM_HEIGHT_MM: f64 = 45.0;
/// Extra margin printed on every side of the trim line.
pub const BLEED_MM: f64 = 3.0;
/// Reference resolution of the on-screen preview (px per inch).
pub const PREVIEW_DPI: f64 = 72.0;
/// Minimum resolution for raster content in the print artifact (px per inch).
pub const PRINT_RASTER_DPI: u32 = 400;
/// Line box height relative to font size for stacked text.
pub const LINE_HEIGHT_RATIO: f64 = 1.2;
/// Millimeters per inch.
pub const MM_PER_INCH: f64 = 25.4;
/// PDF user-space points per inch.
pub const PT_PER_INCH: f64 = 72.0;
/// Channel value above which a pixel counts as light background (0-255).
pub const BACKGROUND_THRESHOLD: u8 = 240;
/// Share of border pixels that must be light before the background pass runs.
pub const BACKGROUND_EDGE_RATIO: f64 = 0.6;
/// Soft clamp applied by the editor to percentage placements.
pub const PLACEMENT_MIN_PCT: f64 = 10.0;
pub const PLACEMENT_MAX_PCT: f64 = 90.0;
/// Colour of the non-printing trim guide in the preview.
pub const BLEED_GUIDE_COLOR: &str = "#F87171";
/// Default file name of the exported document.
pub const EXPORT_FILE_NAME: &str = "service-label.pdf";
