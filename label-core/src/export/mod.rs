//! Export pipeline: design -> print PDF, one page per face.
//!
//! Pages are built from the same [`Scene`](crate::scene::Scene) the preview
//! draws. Flat fills and text stay vector, the logo is the only raster, and
//! template artwork is embedded as vector with a raster fallback.

mod pdf;

use serde::{Deserialize, Serialize};

use crate::constants::{EXPORT_FILE_NAME, PRINT_RASTER_DPI};
use crate::design::{Face, LabelDesign};
use crate::error::ExportError;
use crate::scene::{RenderContext, render};

use pdf::DocWriter;

/// How recoloured template artwork reaches the page.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TemplateMode {
    /// Form XObject through svg2pdf, raster when conversion fails.
    #[default]
    Vector,
    /// Always rasterise at `raster_dpi`.
    Raster,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ExportOptions {
    /// Minimum resolution of every raster on the page.
    pub raster_dpi: u32,
    pub template_mode: TemplateMode,
    /// Flate-compress page content streams.
    pub compress: bool,
    pub file_name: String,
}

impl Default for ExportOptions {
    fn default() -> Self {
        ExportOptions {
            raster_dpi: PRINT_RASTER_DPI,
            template_mode: TemplateMode::Vector,
            compress: true,
            file_name: EXPORT_FILE_NAME.to_string(),
        }
    }
}

/// A finished document. Owned by whoever asked for it.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportArtifact {
    #[serde(skip)]
    pub bytes: Vec<u8>,
    pub page_count: usize,
    pub page_size_mm: (f64, f64),
    pub file_name: String,
}

impl ExportArtifact {
    pub const MIME_TYPE: &'static str = "application/pdf";
}

/// Print order with duplicates removed: FacingOut always precedes FacingIn.
pub fn normalize_faces(faces: &[Face]) -> Vec<Face> {
    let mut out = faces.to_vec();
    out.sort();
    out.dedup();
    out
}

/// A document that grows one face at a time. Faces must arrive in print
/// order; [`normalize_faces`] gives it.
pub(crate) struct DocumentBuilder<'a> {
    doc: DocWriter<'a>,
    design: &'a LabelDesign,
    ctx: RenderContext<'a>,
    opts: &'a ExportOptions,
    pages: usize,
}

impl<'a> DocumentBuilder<'a> {
    pub(crate) fn new(design: &'a LabelDesign, ctx: RenderContext<'a>, opts: &'a ExportOptions) -> Self {
        DocumentBuilder {
            doc: DocWriter::new(ctx.images, ctx.fonts, opts),
            design,
            ctx,
            opts,
            pages: 0,
        }
    }

    pub(crate) fn add_face(&mut self, face: Face) -> Result<(), ExportError> {
        let scene = render(self.design, face, &self.ctx);
        self.doc.add_page(&scene)?;
        self.pages += 1;
        tracing::debug!(?face, "page added");
        Ok(())
    }

    pub(crate) fn finish(self) -> Result<ExportArtifact, ExportError> {
        let bytes = self.doc.finish()?;
        tracing::info!(
            pages = self.pages,
            bytes = bytes.len(),
            file = %self.opts.file_name,
            "exported label document"
        );
        Ok(ExportArtifact {
            bytes,
            page_count: self.pages,
            page_size_mm: self.ctx.dims.page_size(),
            file_name: self.opts.file_name.clone(),
        })
    }
}

/// Render and write the requested faces. `design` is only read.
pub fn export_document(
    design: &LabelDesign,
    faces: &[Face],
    ctx: &RenderContext<'_>,
    opts: &ExportOptions,
) -> Result<ExportArtifact, ExportError> {
    let faces = normalize_faces(faces);
    if faces.is_empty() {
        return Err(ExportError::NoFaces);
    }
    let mut builder = DocumentBuilder::new(design, *ctx, opts);
    for face in faces {
        builder.add_face(face)?;
    }
    builder.finish()
}
