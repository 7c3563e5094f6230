//! Service label rendering and export.
//!
//! A [`LabelDesign`] is turned into a [`Scene`] per face by [`render`]. The
//! same scene feeds the SVG preview ([`render_preview_svg`]) and the print
//! PDF ([`export_document`]), so what is previewed is what is printed.

pub mod assets;
pub mod color;
pub mod constants;
pub mod design;
pub mod error;
pub mod export;
pub mod fonts;
pub mod job;
pub mod layout;
pub mod preview;
pub mod scene;
pub mod session;
pub mod submit;
pub mod units;

pub use assets::{ImageId, ImageState, ImageStore, Logo};
pub use color::{Cmyk, HexColor, Rgb, cmyk_to_rgb, hex_to_rgb, relative_luminance, rgb_to_cmyk, rgb_to_hex};
pub use design::{Element, Face, LabelDesign, Placement, TextStyle};
pub use error::{AssetError, ColorError, ExportError, LayoutNotFound, SubmissionError, TransportError};
pub use export::{ExportArtifact, ExportOptions, TemplateMode, export_document};
pub use fonts::{FONT_CATALOG, FontChoice, FontLibrary, FontWeight, resolve_font};
pub use job::{ExportJob, ExportStatus, Exporter};
pub use layout::{LayoutRegistry, LayoutTemplate};
pub use preview::{DataUrlHrefs, ImageHrefs, PreviewOptions, PreviewPair, render_preview_png, render_preview_svg};
pub use scene::{DrawOp, RenderContext, Scene, TextOp, render};
pub use session::LabelSession;
pub use submit::{CustomerContact, LogTransport, SubmissionPackage, Transport, submit};
pub use units::{PhysicalDimensions, Rect, mm_to_px};
