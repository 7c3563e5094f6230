//! The editing session: sole owner of the live design.
//!
//! Every setter validates, mutates and re-renders both faces before it
//! returns, so `previews()` never shows a frame older than the last edit.

use crate::assets::{ImageId, ImageStore};
use crate::color::HexColor;
use crate::design::{Element, Face, LabelDesign, Placement, TextStyle};
use crate::error::{AssetError, ColorError, ExportError, LayoutNotFound};
use crate::export::ExportOptions;
use crate::fonts::FontLibrary;
use crate::job::{ExportJob, Exporter};
use crate::layout::LayoutRegistry;
use crate::preview::{ImageHrefs, PreviewOptions, PreviewPair, render_preview_svg};
use crate::scene::{RenderContext, Scene, render};

#[derive(Debug)]
pub struct LabelSession {
    design: LabelDesign,
    images: ImageStore,
    registry: LayoutRegistry,
    fonts: FontLibrary,
    previews: PreviewPair,
    exporter: Exporter,
}

impl Default for LabelSession {
    fn default() -> Self {
        Self::new(LayoutRegistry::builtin())
    }
}

impl LabelSession {
    pub fn new(registry: LayoutRegistry) -> Self {
        Self::with_design(registry, LabelDesign::default())
    }

    /// Start from a saved design. Its logo handle cannot refer to this
    /// session's store, so it is dropped.
    pub fn with_design(registry: LayoutRegistry, mut design: LabelDesign) -> Self {
        design.logo = None;
        let images = ImageStore::new();
        let previews = {
            let ctx = RenderContext::new(&registry, &images);
            PreviewPair {
                revision: 0,
                facing_out: render(&design, Face::FacingOut, &ctx),
                facing_in: render(&design, Face::FacingIn, &ctx),
            }
        };
        LabelSession {
            design,
            images,
            registry,
            fonts: FontLibrary::new(),
            previews,
            exporter: Exporter::new(),
        }
    }

    pub fn design(&self) -> &LabelDesign {
        &self.design
    }

    pub fn images(&self) -> &ImageStore {
        &self.images
    }

    pub fn registry(&self) -> &LayoutRegistry {
        &self.registry
    }

    pub fn previews(&self) -> &PreviewPair {
        &self.previews
    }

    pub fn exporter(&self) -> &Exporter {
        &self.exporter
    }

    pub fn fonts(&self) -> &FontLibrary {
        &self.fonts
    }

    /// Font programs for later exports. Previews are unaffected.
    pub fn set_fonts(&mut self, fonts: FontLibrary) {
        self.fonts = fonts;
    }

    pub fn context(&self) -> RenderContext<'_> {
        RenderContext::new(&self.registry, &self.images).with_fonts(&self.fonts)
    }

    /// Owned copy of the current design.
    pub fn snapshot(&self) -> LabelDesign {
        self.design.clone()
    }

    fn rerender(&mut self) {
        let ctx = RenderContext::new(&self.registry, &self.images);
        self.previews = PreviewPair {
            revision: self.previews.revision + 1,
            facing_out: render(&self.design, Face::FacingOut, &ctx),
            facing_in: render(&self.design, Face::FacingIn, &ctx),
        };
    }

    pub fn set_phone_text(&mut self, text: &str) {
        self.design.phone_text = text.to_string();
        self.rerender();
    }

    pub fn set_location_text(&mut self, text: &str) {
        self.design.location_text = text.to_string();
        self.rerender();
    }

    /// Rejects malformed input and keeps the previous colour.
    pub fn set_background_color(&mut self, hex: &str) -> Result<(), ColorError> {
        self.design.background_color = HexColor::parse(hex)?;
        self.rerender();
        Ok(())
    }

    pub fn set_accent_color(&mut self, hex: &str) -> Result<(), ColorError> {
        self.design.accent_color = HexColor::parse(hex)?;
        self.rerender();
        Ok(())
    }

    /// Unknown ids are rejected; the current layout stays selected.
    pub fn set_layout(&mut self, id: &str) -> Result<(), LayoutNotFound> {
        let canonical = self.registry.get(id)?.id;
        self.design.selected_layout_id = canonical.to_string();
        self.rerender();
        Ok(())
    }

    pub fn set_style(&mut self, element: Element, style: TextStyle) {
        match element {
            Element::Phone => self.design.phone_style = style,
            Element::Location => self.design.location_style = style,
            Element::Logo => {
                tracing::debug!("logo has no text style");
                return;
            }
        }
        self.rerender();
    }

    /// `None` returns the element to its layout slot. Values are soft-clamped
    /// to the editor range.
    pub fn set_position(&mut self, element: Element, placement: Option<Placement>) {
        *self.design.position_mut(element) = placement.map(Placement::clamped);
        self.rerender();
    }

    pub fn set_logo_size(&mut self, face: Face, pct: f64) {
        let pct = pct.max(0.0);
        match face {
            Face::FacingOut => self.design.logo_size_facing_out = pct,
            Face::FacingIn => self.design.logo_size_facing_in = pct,
        }
        self.rerender();
    }

    /// Replace the whole design, keeping the current logo.
    pub fn replace_design(&mut self, mut design: LabelDesign) {
        design.logo = self.design.logo;
        self.design = design;
        self.rerender();
    }

    /// Start a logo upload. The previous logo is released and the faces show
    /// the placeholder until the new one decodes.
    pub fn begin_logo_load(&mut self) -> ImageId {
        self.release_logo();
        let id = self.images.begin_load();
        self.design.logo = Some(id);
        self.rerender();
        id
    }

    /// Finish an upload started with `begin_logo_load`. Bytes for an upload
    /// that has since been superseded are discarded.
    pub fn complete_logo_load(&mut self, id: ImageId, bytes: &[u8]) -> Result<(), AssetError> {
        if self.design.logo != Some(id) {
            tracing::debug!(%id, "discarding superseded logo upload");
            self.images.release(id);
            return Err(AssetError::UnknownImage(id.0));
        }
        let res = self.images.complete_load(id, bytes).map(|_| ());
        self.rerender();
        res
    }

    pub fn fail_logo_load(&mut self, id: ImageId, reason: &str) {
        if self.design.logo == Some(id) {
            tracing::warn!(%id, reason, "logo upload failed");
            self.images.fail_load(id, reason);
            self.rerender();
        }
    }

    /// Synchronous upload for callers that already hold the bytes.
    pub fn load_logo(&mut self, bytes: &[u8]) -> Result<ImageId, AssetError> {
        let id = self.begin_logo_load();
        self.complete_logo_load(id, bytes).map(|_| id)
    }

    pub fn clear_logo(&mut self) {
        self.release_logo();
        self.rerender();
    }

    fn release_logo(&mut self) {
        if let Some(old) = self.design.logo.take() {
            self.images.release(old);
        }
    }

    pub fn scene(&self, face: Face) -> &Scene {
        self.previews.scene(face)
    }

    pub fn preview_svg(&self, face: Face, opts: &PreviewOptions, hrefs: &dyn ImageHrefs) -> String {
        render_preview_svg(self.scene(face), opts, hrefs)
    }

    /// Snapshot the design now and claim the export slot.
    pub fn request_export(&self, faces: &[Face], opts: ExportOptions) -> Result<ExportJob, ExportError> {
        self.exporter
            .request(&self.design, faces, &self.context(), opts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::Logo;
    use crate::scene::DrawOp;

    fn png() -> Vec<u8> {
        Logo::from_rgba(2, 2, vec![10, 20, 30, 255].repeat(4))
            .unwrap()
            .to_png()
            .unwrap()
    }

    #[test]
    fn every_edit_bumps_the_revision() {
        let mut s = LabelSession::default();
        let r0 = s.previews().revision;
        s.set_phone_text("0800 1");
        assert_eq!(s.previews().revision, r0 + 1);
        assert!(s.scene(Face::FacingIn).texts().any(|t| t.text == "0800 1"));
    }

    #[test]
    fn invalid_color_keeps_previous_value() {
        let mut s = LabelSession::default();
        s.set_background_color("#123456").unwrap();
        let rev = s.previews().revision;
        assert!(s.set_background_color("#12345G").is_err());
        assert_eq!(s.design().background_color.as_str(), "#123456");
        assert_eq!(s.previews().revision, rev);
    }

    #[test]
    fn unknown_layout_is_rejected_and_aliases_canonicalize() {
        let mut s = LabelSession::default();
        assert!(s.set_layout("layout9").is_err());
        assert_eq!(s.design().selected_layout_id, "classic");
        s.set_layout("layout3").unwrap();
        assert_eq!(s.design().selected_layout_id, "split");
    }

    #[test]
    fn new_logo_releases_the_previous_one() {
        let mut s = LabelSession::default();
        let first = s.load_logo(&png()).unwrap();
        let second = s.load_logo(&png()).unwrap();
        assert_ne!(first, second);
        assert_eq!(s.images().len(), 1);
        assert!(s.images().resolve(first).is_err());
        s.clear_logo();
        assert!(s.images().is_empty());
        assert!(s.design().logo.is_none());
    }

    #[test]
    fn pending_logo_shows_placeholder_then_image() {
        let mut s = LabelSession::default();
        let id = s.begin_logo_load();
        assert!(s.scene(Face::FacingOut).texts().any(|t| t.text == "LOGO"));
        s.complete_logo_load(id, &png()).unwrap();
        assert!(
            s.scene(Face::FacingOut)
                .ops
                .iter()
                .any(|op| matches!(op, DrawOp::PlaceImage { image, .. } if *image == id))
        );
    }

    #[test]
    fn superseded_upload_is_discarded() {
        let mut s = LabelSession::default();
        let stale = s.begin_logo_load();
        let fresh = s.begin_logo_load();
        assert_eq!(s.complete_logo_load(stale, &png()), Err(AssetError::UnknownImage(stale.0)));
        assert_eq!(s.design().logo, Some(fresh));
        assert_eq!(s.images().len(), 1);
    }

    #[test]
    fn positions_are_soft_clamped() {
        let mut s = LabelSession::default();
        s.set_position(Element::Phone, Some(Placement::new(0.0, 120.0)));
        assert_eq!(s.design().phone_position, Some(Placement::new(10.0, 90.0)));
        s.set_position(Element::Phone, None);
        assert!(s.design().phone_position.is_none());
    }
}
