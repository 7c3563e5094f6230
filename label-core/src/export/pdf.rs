use std::collections::{BTreeMap, HashMap};

use pdf_writer::types::{CidFontType, FontFlags, SystemInfo, UnicodeCmap};
use pdf_writer::{Content, Filter, Finish, Name, Pdf, Rect as PdfRect, Ref, Str, TextStr};
use usvg::fontdb;

use super::{ExportOptions, TemplateMode};
use crate::assets::ImageStore;
use crate::color::HexColor;
use crate::error::ExportError;
use crate::fonts::{FontChoice, FontLibrary, FontWeight};
use crate::layout::TextAlign;
use crate::preview::{demultiplied_rgba, parse_svg, rasterize_tree};
use crate::scene::{DrawOp, Scene, TextOp};
use crate::units::{Fit, Rect, mm_to_pt, mm_to_px, pt_to_mm};

const PLACEHOLDER_GRAY: &str = "#9CA3AF";
const PLACEHOLDER_STROKE_MM: f64 = 0.3;

/// Names used by one page's resource dictionary.
#[derive(Default)]
struct PageResources {
    fonts: Vec<(String, Ref)>,
    x_objects: Vec<(String, Ref)>,
}

impl PageResources {
    fn font(&mut self, font: Ref) -> String {
        if let Some((name, _)) = self.fonts.iter().find(|(_, r)| *r == font) {
            return name.clone();
        }
        let name = format!("F{}", self.fonts.len() + 1);
        self.fonts.push((name.clone(), font));
        name
    }

    fn x_object(&mut self, xobj: Ref) -> String {
        let name = format!("X{}", self.x_objects.len() + 1);
        self.x_objects.push((name.clone(), xobj));
        name
    }
}

/// Where text in one (font, weight) prints from, decided once per document.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum FontSource {
    Embedded(fontdb::ID),
    Base14,
}

/// Glyphs drawn from one embedded face. The font objects are written by
/// [`DocWriter::finish`] once every page has been laid out.
struct EmbeddedFont {
    font_ref: Ref,
    remapper: subsetter::GlyphRemapper,
    /// Original glyph id per CID.
    gids: Vec<u16>,
    /// Advance per CID in 1/1000 em.
    widths: BTreeMap<u16, f32>,
    to_unicode: BTreeMap<u16, char>,
}

impl EmbeddedFont {
    fn new(font_ref: Ref) -> Self {
        let mut remapper = subsetter::GlyphRemapper::new();
        remapper.remap(0);
        EmbeddedFont {
            font_ref,
            remapper,
            gids: vec![0],
            widths: BTreeMap::new(),
            to_unicode: BTreeMap::new(),
        }
    }

    fn cid(&mut self, gid: u16) -> u16 {
        let cid = self.remapper.remap(gid);
        if usize::from(cid) == self.gids.len() {
            self.gids.push(gid);
        }
        cid
    }
}

/// The font file and descriptor values of an embedded face.
struct FontProgram {
    data: Vec<u8>,
    /// False when subsetting failed and `data` is the whole file.
    subset: bool,
    flags: FontFlags,
    bbox: PdfRect,
    italic_angle: f32,
    ascent: f32,
    descent: f32,
    cap_height: f32,
    stem_v: f32,
}

impl FontProgram {
    fn build(data: &[u8], index: u32, remapper: &subsetter::GlyphRemapper) -> Option<Self> {
        let face = ttf_parser::Face::parse(data, index).ok()?;
        let scale = 1000.0 / f32::from(face.units_per_em());
        let bb = face.global_bounding_box();
        let mut flags = FontFlags::NON_SYMBOLIC;
        if face.is_monospaced() {
            flags |= FontFlags::FIXED_PITCH;
        }
        if face.is_italic() {
            flags |= FontFlags::ITALIC;
        }
        let (data, subset) = match subsetter::subset(data, index, remapper) {
            Ok(subset) => (subset, true),
            Err(e) => {
                tracing::warn!(error = ?e, "font subsetting failed, embedding the whole file");
                (data.to_vec(), false)
            }
        };
        Some(FontProgram {
            data,
            subset,
            flags,
            bbox: PdfRect::new(
                f32::from(bb.x_min) * scale,
                f32::from(bb.y_min) * scale,
                f32::from(bb.x_max) * scale,
                f32::from(bb.y_max) * scale,
            ),
            italic_angle: face.italic_angle(),
            ascent: f32::from(face.ascender()) * scale,
            descent: f32::from(face.descender()) * scale,
            cap_height: f32::from(face.capital_height().unwrap_or(face.ascender())) * scale,
            stem_v: 10.0 + 0.244 * (f32::from(face.weight().to_number()) - 50.0),
        })
    }
}

fn identity_info() -> SystemInfo<'static> {
    SystemInfo {
        registry: Str(b"Adobe"),
        ordering: Str(b"Identity"),
        supplement: 0,
    }
}

/// Six capital letters naming a subset, as PDF requires before `+`.
fn subset_tag(font_ref: Ref) -> String {
    let mut n = font_ref.get().unsigned_abs();
    (0..6)
        .map(|_| {
            let ch = char::from(b'A' + (n % 26) as u8);
            n /= 26;
            ch
        })
        .collect()
}

/// Only `glyf` outlines go into FontFile2.
fn has_truetype_outlines(data: &[u8], index: u32) -> bool {
    ttf_parser::Face::parse(data, index).is_ok_and(|f| f.tables().glyf.is_some())
}

/// Page-space transform: scene millimetres (y down) to PDF points (y up).
struct Flip {
    page_h_pt: f64,
}

impl Flip {
    /// (x, y_bottom, w, h) in points.
    fn rect(&self, r: &Rect) -> (f32, f32, f32, f32) {
        (
            mm_to_pt(r.x) as f32,
            (self.page_h_pt - mm_to_pt(r.bottom())) as f32,
            mm_to_pt(r.w) as f32,
            mm_to_pt(r.h) as f32,
        )
    }

    fn y(&self, y_mm: f64) -> f32 {
        (self.page_h_pt - mm_to_pt(y_mm)) as f32
    }
}

/// A document built one page at a time.
pub(crate) struct DocWriter<'a> {
    pdf: Pdf,
    next_id: i32,
    catalog_id: Ref,
    page_tree_id: Ref,
    info_id: Ref,
    page_ids: Vec<Ref>,
    /// Base-14 fonts are written once and shared by all pages.
    base_fonts: HashMap<&'static str, Ref>,
    sources: HashMap<(&'static str, FontWeight), FontSource>,
    embedded: HashMap<fontdb::ID, EmbeddedFont>,
    images: &'a ImageStore,
    fonts: &'a FontLibrary,
    opts: &'a ExportOptions,
}

impl<'a> DocWriter<'a> {
    pub(crate) fn new(images: &'a ImageStore, fonts: &'a FontLibrary, opts: &'a ExportOptions) -> Self {
        DocWriter {
            pdf: Pdf::new(),
            next_id: 4,
            catalog_id: Ref::new(1),
            page_tree_id: Ref::new(2),
            info_id: Ref::new(3),
            page_ids: Vec::new(),
            base_fonts: HashMap::new(),
            sources: HashMap::new(),
            embedded: HashMap::new(),
            images,
            fonts,
            opts,
        }
    }

    /// Append a page for `scene`.
    pub(crate) fn add_page(&mut self, scene: &Scene) -> Result<(), ExportError> {
        if scene.page.w <= 0.0 || scene.page.h <= 0.0 {
            return Err(ExportError::Document(format!(
                "{} page has no area",
                scene.face.slug()
            )));
        }
        let id = self.write_page(scene);
        self.page_ids.push(id);
        Ok(())
    }

    /// Write the fonts, the page tree and the trailer.
    pub(crate) fn finish(mut self) -> Result<Vec<u8>, ExportError> {
        if self.page_ids.is_empty() {
            return Err(ExportError::NoFaces);
        }
        let mut embedded: Vec<_> = std::mem::take(&mut self.embedded).into_iter().collect();
        embedded.sort_by_key(|(_, font)| font.font_ref.get());
        for (id, font) in embedded {
            self.write_embedded_font(id, font)?;
        }

        self.pdf.catalog(self.catalog_id).pages(self.page_tree_id);
        self.pdf
            .pages(self.page_tree_id)
            .kids(self.page_ids.iter().copied())
            .count(self.page_ids.len() as i32);
        self.pdf
            .document_info(self.info_id)
            .title(TextStr("Service label"))
            .producer(TextStr(concat!("label-core ", env!("CARGO_PKG_VERSION"))));
        Ok(self.pdf.finish())
    }
}

impl DocWriter<'_> {
    fn alloc(&mut self) -> Ref {
        let r = Ref::new(self.next_id);
        self.next_id += 1;
        r
    }

    fn base_font(&mut self, base: &'static str) -> Ref {
        if let Some(r) = self.base_fonts.get(base) {
            return *r;
        }
        let id = self.alloc();
        self.pdf
            .type1_font(id)
            .base_font(Name(base.as_bytes()))
            .encoding_predefined(Name(b"WinAnsiEncoding"));
        self.base_fonts.insert(base, id);
        id
    }

    fn font_source(&mut self, font: &FontChoice, weight: FontWeight) -> FontSource {
        if let Some(source) = self.sources.get(&(font.id, weight)) {
            return *source;
        }
        let source = match self.fonts.face_for(font, weight) {
            Some(id) if self.fonts.with_face_data(id, has_truetype_outlines) == Some(true) => {
                tracing::debug!(font = font.id, ?weight, "embedding font program");
                FontSource::Embedded(id)
            }
            Some(_) => {
                tracing::warn!(font = font.id, "font has no TrueType outlines, printing base-14");
                FontSource::Base14
            }
            None => {
                tracing::debug!(font = font.id, ?weight, "no font program, printing base-14");
                FontSource::Base14
            }
        };
        self.sources.insert((font.id, weight), source);
        source
    }

    /// Glyph ids as 2-byte codes, plus the advance in points.
    fn encode_embedded(&mut self, id: fontdb::ID, text: &str, size_pt: f64) -> Option<(Ref, Vec<u8>, f64)> {
        if !self.embedded.contains_key(&id) {
            let font_ref = self.alloc();
            self.embedded.insert(id, EmbeddedFont::new(font_ref));
        }
        let fonts = self.fonts;
        let font = self.embedded.get_mut(&id)?;
        fonts
            .with_face_data(id, |data, index| {
                let face = ttf_parser::Face::parse(data, index).ok()?;
                let per_em = f64::from(face.units_per_em());
                let mut codes = Vec::with_capacity(text.len() * 2);
                let mut advance = 0.0;
                for ch in text.chars() {
                    let own = face.glyph_index(ch);
                    let gid = own
                        .or_else(|| face.glyph_index('?'))
                        .unwrap_or(ttf_parser::GlyphId(0));
                    let units = f64::from(face.glyph_hor_advance(gid).unwrap_or(0));
                    advance += units;
                    let cid = font.cid(gid.0);
                    font.widths.insert(cid, (units * 1000.0 / per_em) as f32);
                    if own.is_some() {
                        font.to_unicode.entry(cid).or_insert(ch);
                    }
                    codes.extend_from_slice(&cid.to_be_bytes());
                }
                Some((font.font_ref, codes, advance * size_pt / per_em))
            })
            .flatten()
    }

    /// Type0 font over a CIDFontType2 with the subset as FontFile2.
    fn write_embedded_font(&mut self, id: fontdb::ID, font: EmbeddedFont) -> Result<(), ExportError> {
        let program = self
            .fonts
            .with_face_data(id, |data, index| FontProgram::build(data, index, &font.remapper))
            .flatten()
            .ok_or_else(|| ExportError::Document("embedded font could not be read back".into()))?;
        let post_script = self
            .fonts
            .post_script_name(id)
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| "Embedded".to_string());
        let base_name = if program.subset {
            format!("{}+{}", subset_tag(font.font_ref), post_script)
        } else {
            post_script
        };
        let cid_ref = self.alloc();
        let descriptor_ref = self.alloc();
        let file_ref = self.alloc();
        let cmap_ref = self.alloc();
        let gid_map_ref = (!program.subset).then(|| self.alloc());

        self.pdf
            .type0_font(font.font_ref)
            .base_font(Name(base_name.as_bytes()))
            .encoding_predefined(Name(b"Identity-H"))
            .descendant_font(cid_ref)
            .to_unicode(cmap_ref);

        let mut cid = self.pdf.cid_font(cid_ref);
        cid.subtype(CidFontType::Type2)
            .base_font(Name(base_name.as_bytes()))
            .system_info(identity_info())
            .font_descriptor(descriptor_ref)
            .default_width(0.0);
        {
            let mut widths = cid.widths();
            for (&c, &w) in &font.widths {
                widths.consecutive(c, [w]);
            }
        }
        match gid_map_ref {
            Some(r) => cid.cid_to_gid_map_stream(r),
            None => cid.cid_to_gid_map_predefined(Name(b"Identity")),
        };
        cid.finish();

        self.pdf
            .font_descriptor(descriptor_ref)
            .name(Name(base_name.as_bytes()))
            .flags(program.flags)
            .bbox(program.bbox)
            .italic_angle(program.italic_angle)
            .ascent(program.ascent)
            .descent(program.descent)
            .cap_height(program.cap_height)
            .stem_v(program.stem_v)
            .font_file2(file_ref);

        let compressed = miniz_oxide::deflate::compress_to_vec_zlib(&program.data, 6);
        let mut file = self.pdf.stream(file_ref, &compressed);
        file.filter(Filter::FlateDecode);
        file.pair(Name(b"Length1"), program.data.len() as i32);
        file.finish();

        if let Some(r) = gid_map_ref {
            let map: Vec<u8> = font.gids.iter().flat_map(|g| g.to_be_bytes()).collect();
            self.pdf.stream(r, &map);
        }

        let mut cmap = UnicodeCmap::new(Name(b"Custom"), identity_info());
        for (&c, &ch) in &font.to_unicode {
            cmap.pair(c, ch);
        }
        let cmap_data = cmap.finish();
        self.pdf.cmap(cmap_ref, &cmap_data);

        tracing::debug!(
            font = %base_name,
            glyphs = font.gids.len(),
            bytes = program.data.len(),
            "embedded font"
        );
        Ok(())
    }

    fn write_page(&mut self, scene: &Scene) -> Ref {
        let flip = Flip {
            page_h_pt: mm_to_pt(scene.page.h),
        };
        let mut content = Content::new();
        let mut res = PageResources::default();
        for op in &scene.ops {
            self.write_op(&mut content, &mut res, &flip, op);
        }

        let page_id = self.alloc();
        let content_id = self.alloc();
        let raw = content.finish();
        if self.opts.compress {
            let compressed = miniz_oxide::deflate::compress_to_vec_zlib(&raw, 6);
            self.pdf
                .stream(content_id, &compressed)
                .filter(Filter::FlateDecode);
        } else {
            self.pdf.stream(content_id, &raw);
        }

        let (pw, ph) = (mm_to_pt(scene.page.w) as f32, mm_to_pt(scene.page.h) as f32);
        let (tx, ty, tw, th) = flip.rect(&scene.trim);
        let media = PdfRect::new(0.0, 0.0, pw, ph);
        let mut page = self.pdf.page(page_id);
        page.media_box(media)
            .bleed_box(media)
            .trim_box(PdfRect::new(tx, ty, tx + tw, ty + th))
            .parent(self.page_tree_id)
            .contents(content_id);
        {
            let mut resources = page.resources();
            if !res.fonts.is_empty() {
                let mut fonts = resources.fonts();
                for (name, r) in &res.fonts {
                    fonts.pair(Name(name.as_bytes()), *r);
                }
            }
            if !res.x_objects.is_empty() {
                let mut xobjects = resources.x_objects();
                for (name, r) in &res.x_objects {
                    xobjects.pair(Name(name.as_bytes()), *r);
                }
            }
        }
        page.finish();
        tracing::debug!(face = ?scene.face, page = ?page_id, "page written");
        page_id
    }

    fn write_op(&mut self, c: &mut Content, res: &mut PageResources, flip: &Flip, op: &DrawOp) {
        match op {
            DrawOp::FillRect { rect, color } => {
                let (x, y, w, h) = flip.rect(rect);
                let [r, g, b] = color.rgb().to_unit();
                c.set_fill_rgb(r, g, b);
                c.rect(x, y, w, h);
                c.fill_nonzero();
            }
            DrawOp::StrokeRect {
                rect,
                color,
                width,
                dashed,
            } => stroke_rect(c, flip, rect, color, *width, *dashed),
            DrawOp::PlaceText(t) => self.write_text(c, res, flip, t),
            DrawOp::PlaceImage { frame, image, fit } => {
                let logo = match self.images.resolve(*image) {
                    Ok(logo) => logo,
                    Err(e) => {
                        tracing::warn!(%image, error = %e, "logo missing at export, drawing placeholder");
                        placeholder(c, flip, frame);
                        return;
                    }
                };
                let placed = frame.fit(logo.width() as f64, logo.height() as f64, *fit);
                let dpi = self.opts.raster_dpi as f64;
                let need = (mm_to_px(placed.w, dpi) / logo.width() as f64)
                    .max(mm_to_px(placed.h, dpi) / logo.height() as f64)
                    .max(1.0);
                let (pw, ph) = (
                    (logo.width() as f64 * need).ceil() as u32,
                    (logo.height() as f64 * need).ceil() as u32,
                );
                let scaled = logo.resized(pw, ph);
                tracing::debug!(
                    %image,
                    from = ?(logo.width(), logo.height()),
                    to = ?(pw, ph),
                    "resampled logo for print"
                );
                let xobj = self.embed_rgba(pw, ph, scaled.rgba());
                let name = res.x_object(xobj);
                c.save_state();
                if *fit == Fit::Cover {
                    let (x, y, w, h) = flip.rect(frame);
                    c.rect(x, y, w, h);
                    c.clip_nonzero();
                    c.end_path();
                }
                place_unit_xobject(c, flip, &placed, &name);
                c.restore_state();
            }
            DrawOp::PlaceSvg { frame, svg } => {
                let tree = match parse_svg(svg) {
                    Ok(tree) => tree,
                    Err(e) => {
                        tracing::warn!(error = %e, "template artwork unreadable, drawing placeholder");
                        placeholder(c, flip, frame);
                        return;
                    }
                };
                let vector = match self.opts.template_mode {
                    TemplateMode::Vector => match self.embed_svg_vector(&tree) {
                        Ok(xobj) => Some(xobj),
                        Err(e) => {
                            tracing::warn!(error = %e, "vector template embedding failed, rasterizing");
                            None
                        }
                    },
                    TemplateMode::Raster => None,
                };
                let xobj = match vector {
                    Some(xobj) => xobj,
                    None => match self.embed_svg_raster(&tree, frame) {
                        Ok(xobj) => xobj,
                        Err(e) => {
                            tracing::warn!(error = %e, "template raster failed, drawing placeholder");
                            placeholder(c, flip, frame);
                            return;
                        }
                    },
                };
                let name = res.x_object(xobj);
                c.save_state();
                place_unit_xobject(c, flip, frame, &name);
                c.restore_state();
            }
        }
    }

    fn write_text(&mut self, c: &mut Content, res: &mut PageResources, flip: &Flip, t: &TextOp) {
        let embedded = match self.font_source(&t.font, t.weight) {
            FontSource::Embedded(id) => self.encode_embedded(id, &t.text, t.size_pt),
            FontSource::Base14 => None,
        };
        let (font, encoded, width_pt) = match embedded {
            Some(encoded) => encoded,
            None => {
                let base = t.font.pdf_base.base_name(t.weight);
                (
                    self.base_font(base),
                    win_ansi(&t.text),
                    t.font.pdf_base.text_width(t.weight, &t.text, t.size_pt),
                )
            }
        };
        let name = res.font(font);
        let width_mm = pt_to_mm(width_pt);
        let left = match t.align {
            TextAlign::Left => t.x,
            TextAlign::Center => t.x - width_mm / 2.0,
            TextAlign::Right => t.x - width_mm,
        };
        let [r, g, b] = t.color.rgb().to_unit();
        c.set_fill_rgb(r, g, b);
        c.begin_text();
        c.set_font(Name(name.as_bytes()), t.size_pt as f32);
        c.next_line(mm_to_pt(left) as f32, flip.y(t.baseline));
        c.show(Str(&encoded));
        c.end_text();
    }

    /// RGB image with an alpha soft mask when any pixel is not opaque.
    fn embed_rgba(&mut self, width: u32, height: u32, rgba: &[u8]) -> Ref {
        let has_alpha = rgba.chunks_exact(4).any(|p| p[3] < 255);
        let rgb: Vec<u8> = rgba.chunks_exact(4).flat_map(|p| [p[0], p[1], p[2]]).collect();
        let smask = if has_alpha {
            let alpha: Vec<u8> = rgba.chunks_exact(4).map(|p| p[3]).collect();
            let compressed = miniz_oxide::deflate::compress_to_vec_zlib(&alpha, 6);
            let mask_id = self.alloc();
            let mut mask = self.pdf.image_xobject(mask_id, &compressed);
            mask.filter(Filter::FlateDecode);
            mask.width(width as i32);
            mask.height(height as i32);
            mask.color_space().device_gray();
            mask.bits_per_component(8);
            mask.finish();
            Some(mask_id)
        } else {
            None
        };
        let compressed = miniz_oxide::deflate::compress_to_vec_zlib(&rgb, 6);
        let id = self.alloc();
        let mut xobj = self.pdf.image_xobject(id, &compressed);
        xobj.filter(Filter::FlateDecode);
        xobj.width(width as i32);
        xobj.height(height as i32);
        xobj.color_space().device_rgb();
        xobj.bits_per_component(8);
        if let Some(mask_id) = smask {
            xobj.s_mask(mask_id);
        }
        xobj.finish();
        id
    }

    /// Convert artwork to a Form XObject and splice its objects into the
    /// document under fresh ids.
    fn embed_svg_vector(&mut self, tree: &usvg::Tree) -> Result<Ref, String> {
        let (chunk, root) =
            svg2pdf::to_chunk(tree, svg2pdf::ConversionOptions::default()).map_err(|e| e.to_string())?;
        let mut map = HashMap::new();
        let next_id = &mut self.next_id;
        let chunk = chunk.renumber(|old| {
            *map.entry(old).or_insert_with(|| {
                let r = Ref::new(*next_id);
                *next_id += 1;
                r
            })
        });
        let root = map
            .get(&root)
            .copied()
            .ok_or_else(|| "converted artwork has no root object".to_string())?;
        self.pdf.extend(&chunk);
        Ok(root)
    }

    fn embed_svg_raster(&mut self, tree: &usvg::Tree, frame: &Rect) -> Result<Ref, String> {
        let target_w = mm_to_px(frame.w, self.opts.raster_dpi as f64);
        let scale = (target_w / tree.size().width() as f64) as f32;
        let pixmap = rasterize_tree(tree, scale).map_err(|e| e.to_string())?;
        let rgba = demultiplied_rgba(&pixmap);
        tracing::debug!(
            width = pixmap.width(),
            height = pixmap.height(),
            "template rasterized"
        );
        Ok(self.embed_rgba(pixmap.width(), pixmap.height(), &rgba))
    }
}

fn stroke_rect(c: &mut Content, flip: &Flip, rect: &Rect, color: &HexColor, width: f64, dashed: bool) {
    let (x, y, w, h) = flip.rect(rect);
    let [r, g, b] = color.rgb().to_unit();
    c.save_state();
    c.set_stroke_rgb(r, g, b);
    c.set_line_width(mm_to_pt(width) as f32);
    if dashed {
        c.set_dash_pattern([mm_to_pt(1.2) as f32, mm_to_pt(0.8) as f32], 0.0);
    }
    c.rect(x, y, w, h);
    c.stroke();
    c.restore_state();
}

fn placeholder(c: &mut Content, flip: &Flip, frame: &Rect) {
    if let Ok(gray) = HexColor::parse(PLACEHOLDER_GRAY) {
        stroke_rect(c, flip, frame, &gray, PLACEHOLDER_STROKE_MM, true);
    }
}

/// Image and converted-SVG XObjects occupy the unit square.
fn place_unit_xobject(c: &mut Content, flip: &Flip, rect: &Rect, name: &str) {
    let (x, y, w, h) = flip.rect(rect);
    c.transform([w, 0.0, 0.0, h, x, y]);
    c.x_object(Name(name.as_bytes()));
}

/// WinAnsi bytes for a base-14 font; unmappable characters print as `?`.
fn win_ansi(text: &str) -> Vec<u8> {
    text.chars()
        .map(|ch| match ch as u32 {
            0x20..=0x7E | 0xA0..=0xFF => ch as u32 as u8,
            _ => b'?',
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::design::{Face, LabelDesign};
    use crate::layout::LayoutRegistry;
    use crate::scene::{RenderContext, render};

    fn mono_library() -> FontLibrary {
        let data = std::fs::read(concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fonts/DejaVuSansMono.ttf")).unwrap();
        let mut lib = FontLibrary::new();
        lib.register("bebas-neue", FontWeight::Bold, data).unwrap();
        lib
    }

    fn document(fonts: &FontLibrary, design: &LabelDesign) -> Vec<u8> {
        let reg = LayoutRegistry::builtin();
        let images = ImageStore::new();
        let ctx = RenderContext::new(&reg, &images).with_fonts(fonts);
        let opts = ExportOptions::default();
        let mut doc = DocWriter::new(&images, fonts, &opts);
        doc.add_page(&render(design, Face::FacingOut, &ctx)).unwrap();
        doc.finish().unwrap()
    }

    fn contains(haystack: &[u8], needle: &str) -> bool {
        haystack.windows(needle.len()).any(|w| w == needle.as_bytes())
    }

    #[test]
    fn registered_font_is_embedded_as_a_subset() {
        // The facing-out placeholder prints in the phone font.
        let pdf = document(&mono_library(), &LabelDesign::default());
        assert!(contains(&pdf, "/FontFile2"));
        assert!(contains(&pdf, "/Subtype /CIDFontType2"));
        assert!(contains(&pdf, "/Encoding /Identity-H"));
        assert!(contains(&pdf, "/CIDToGIDMap /Identity"));
        assert!(contains(&pdf, "+DejaVuSansMono"));
        assert!(contains(&pdf, "/ToUnicode"));
        assert!(!contains(&pdf, "/Helvetica"));
    }

    #[test]
    fn missing_font_program_falls_back_to_base_14() {
        let pdf = document(&FontLibrary::new(), &LabelDesign::default());
        assert!(contains(&pdf, "/BaseFont /Helvetica-Bold"));
        assert!(!contains(&pdf, "/FontFile2"));
    }

    #[test]
    fn embedded_widths_come_from_the_font() {
        let lib = mono_library();
        let images = ImageStore::new();
        let opts = ExportOptions::default();
        let mut doc = DocWriter::new(&images, &lib, &opts);
        let bebas = crate::fonts::resolve_font("bebas-neue");
        let FontSource::Embedded(id) = doc.font_source(&bebas, FontWeight::Bold) else {
            panic!("registered font not used");
        };
        let (_, codes, width) = doc.encode_embedded(id, "08", 10.0).unwrap();
        // Two CIDs after .notdef, two bytes each.
        assert_eq!(codes, [0, 1, 0, 2]);
        // DejaVu Sans Mono advances 1233 of 2048 units per glyph.
        assert!((width - 2.0 * 1233.0 / 2048.0 * 10.0).abs() < 1e-9);
        let (_, again, _) = doc.encode_embedded(id, "80", 10.0).unwrap();
        assert_eq!(again, [0, 2, 0, 1]);
        assert_eq!(doc.embedded[&id].gids.len(), 3);
    }

    #[test]
    fn subset_tag_is_six_capitals() {
        let tag = subset_tag(Ref::new(12345));
        assert_eq!(tag.len(), 6);
        assert!(tag.chars().all(|c| c.is_ascii_uppercase()));
        assert_ne!(tag, subset_tag(Ref::new(12346)));
    }

    #[test]
    fn win_ansi_keeps_latin1_and_replaces_the_rest() {
        assert_eq!(win_ansi("Km 5"), b"Km 5");
        assert_eq!(win_ansi("Café"), [b'C', b'a', b'f', 0xE9]);
        assert_eq!(win_ansi("電話"), b"??");
    }

    #[test]
    fn flip_maps_page_top_to_pdf_top() {
        let flip = Flip {
            page_h_pt: mm_to_pt(51.0),
        };
        let (x, y, w, h) = flip.rect(&Rect::new(0.0, 0.0, 74.0, 51.0));
        assert_eq!((x, y), (0.0, 0.0));
        assert!((w - 209.76378).abs() < 1e-3);
        assert!((h - 144.56693).abs() < 1e-3);
        assert!((flip.y(51.0)).abs() < 1e-6);
    }
}
