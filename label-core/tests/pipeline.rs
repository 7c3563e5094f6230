use std::cell::Cell;

use futures::executor::block_on;
use label_core::error::TransportError;
use label_core::layout::{ACCENT_PLACEHOLDER, BACKGROUND_PLACEHOLDER, TemplateArt};
use label_core::scene::line_height_mm;
use label_core::submit::SubmissionPackage;
use label_core::*;

fn uncompressed() -> ExportOptions {
    ExportOptions {
        compress: false,
        ..ExportOptions::default()
    }
}

fn export(design: &LabelDesign, faces: &[Face], opts: &ExportOptions) -> ExportArtifact {
    let reg = LayoutRegistry::builtin();
    let images = ImageStore::new();
    export_document(design, faces, &RenderContext::new(&reg, &images), opts).unwrap()
}

fn boxes(pdf: &[u8], key: &str) -> Vec<[f64; 4]> {
    let text = String::from_utf8_lossy(pdf);
    let needle = format!("/{key} [");
    text.match_indices(&needle)
        .map(|(i, _)| {
            let rest = &text[i + needle.len()..];
            let end = rest.find(']').unwrap();
            let nums: Vec<f64> = rest[..end]
                .split_whitespace()
                .map(|n| n.parse().unwrap())
                .collect();
            [nums[0], nums[1], nums[2], nums[3]]
        })
        .collect()
}

fn contains(haystack: &[u8], needle: &str) -> bool {
    haystack.windows(needle.len()).any(|w| w == needle.as_bytes())
}

fn find(haystack: &[u8], needle: &str) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle.as_bytes())
}

#[test]
fn every_page_is_exactly_74_by_51_mm() {
    let designs = [
        LabelDesign::default(),
        LabelDesign {
            selected_layout_id: "split".into(),
            phone_text: "0800 000 000 000 000 000 000 000 000".into(),
            location_text: "a\nb\nc\nd\ne\nf".into(),
            ..LabelDesign::default()
        },
    ];
    for design in &designs {
        let artifact = export(design, &Face::ALL, &ExportOptions::default());
        assert_eq!(artifact.page_size_mm, (74.0, 51.0));
        let media = boxes(&artifact.bytes, "MediaBox");
        assert_eq!(media.len(), 2);
        for [x0, y0, x1, y1] in media {
            assert_eq!((x0, y0), (0.0, 0.0));
            assert!(((x1 - x0) * 25.4 / 72.0 - 74.0).abs() < 0.01);
            assert!(((y1 - y0) * 25.4 / 72.0 - 51.0).abs() < 0.01);
        }
        for [x0, y0, x1, y1] in boxes(&artifact.bytes, "TrimBox") {
            assert!((x0 * 25.4 / 72.0 - 3.0).abs() < 0.01);
            assert!((y0 * 25.4 / 72.0 - 3.0).abs() < 0.01);
            assert!(((x1 - x0) * 25.4 / 72.0 - 68.0).abs() < 0.01);
            assert!(((y1 - y0) * 25.4 / 72.0 - 45.0).abs() < 0.01);
        }
    }
}

#[test]
fn facing_out_alone_is_a_single_page() {
    let artifact = export(&LabelDesign::default(), &[Face::FacingOut], &ExportOptions::default());
    assert_eq!(artifact.page_count, 1);
    assert!(contains(&artifact.bytes, "/Count 1"));
    assert!(artifact.bytes.starts_with(b"%PDF-"));
}

#[test]
fn both_faces_print_facing_out_first() {
    let design = LabelDesign {
        phone_text: "INSIDE ONLY".into(),
        ..LabelDesign::default()
    };
    let artifact = export(&design, &[Face::FacingIn, Face::FacingOut], &uncompressed());
    assert_eq!(artifact.page_count, 2);
    assert!(contains(&artifact.bytes, "/Count 2"));
    let outward = find(&artifact.bytes, "(LOGO) Tj").unwrap();
    let inward = find(&artifact.bytes, "(INSIDE ONLY) Tj").unwrap();
    assert!(outward < inward);
}

#[test]
fn no_faces_is_an_export_failure() {
    let reg = LayoutRegistry::builtin();
    let images = ImageStore::new();
    let err = export_document(
        &LabelDesign::default(),
        &[],
        &RenderContext::new(&reg, &images),
        &ExportOptions::default(),
    )
    .unwrap_err();
    assert_eq!(err, ExportError::NoFaces);
}

#[test]
fn split_layout_substitutes_exactly_the_two_design_colors() {
    let reg = LayoutRegistry::builtin();
    let images = ImageStore::new();
    let design = LabelDesign {
        background_color: HexColor::parse("#112233").unwrap(),
        accent_color: HexColor::parse("#FFAA00").unwrap(),
        selected_layout_id: "split".into(),
        ..LabelDesign::default()
    };
    let scene = render(&design, Face::FacingIn, &RenderContext::new(&reg, &images));

    let fills: Vec<&str> = scene
        .ops
        .iter()
        .filter_map(|op| match op {
            DrawOp::FillRect { color, .. } => Some(color.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(fills[0], "#112233");
    assert_eq!(fills[1], "#FFAA00");
    for other in &fills[2..] {
        assert!(["#000000", "#FFFFFF"].contains(other), "unexpected fill {other}");
    }

    let template = reg.get("split").unwrap();
    let TemplateArt::Panels(panels) = &template.background else {
        panic!("split layout is procedural");
    };
    let fixed: Vec<&str> = panels
        .iter()
        .filter_map(|p| p.fill)
        .filter(|f| *f != BACKGROUND_PLACEHOLDER && *f != ACCENT_PLACEHOLDER)
        .collect();
    assert_eq!(fixed.len(), fills.len() - 2);

    for op in &scene.ops {
        let serialized = serde_json::to_string(op).unwrap();
        assert!(!serialized.contains(BACKGROUND_PLACEHOLDER));
        assert!(!serialized.contains(ACCENT_PLACEHOLDER));
    }
    assert!(scene.texts().any(|t| t.text == "DATE" && t.color.as_str() == "#FFFFFF"));
    assert!(scene.texts().any(|t| t.text == "KM"));
}

#[test]
fn two_location_lines_stack_at_line_height_on_one_anchor() {
    let reg = LayoutRegistry::builtin();
    let images = ImageStore::new();
    let design = LabelDesign {
        location_text: "123 STREET\nCITY TOWN".into(),
        ..LabelDesign::default()
    };
    for layout in ["classic", "panel", "split"] {
        let design = LabelDesign {
            selected_layout_id: layout.into(),
            ..design.clone()
        };
        let scene = render(&design, Face::FacingIn, &RenderContext::new(&reg, &images));
        let lines: Vec<&TextOp> = scene
            .texts()
            .filter(|t| t.text == "123 STREET" || t.text == "CITY TOWN")
            .collect();
        assert_eq!(lines.len(), 2, "{layout}");
        assert_eq!(lines[0].text, "123 STREET");
        assert_eq!(lines[0].x, lines[1].x);
        assert_eq!(lines[0].align, lines[1].align);
        let step = line_height_mm(design.location_style.size_pt);
        assert!((lines[1].baseline - lines[0].baseline - step).abs() < 1e-9);
        // 1.2 x 9 pt in millimetres.
        assert!((step - 10.8 * 25.4 / 72.0).abs() < 1e-9);
    }
}

#[test]
fn missing_logo_is_a_placeholder_on_both_faces() {
    let reg = LayoutRegistry::builtin();
    let images = ImageStore::new();
    let ctx = RenderContext::new(&reg, &images);
    let dangling = LabelDesign {
        logo: Some(ImageId(42)),
        ..LabelDesign::default()
    };
    for design in [LabelDesign::default(), dangling] {
        for face in Face::ALL {
            let scene = render(&design, face, &ctx);
            assert_eq!(scene.images().count(), 0);
            assert!(scene.texts().any(|t| t.text == "LOGO"), "{face:?}");
        }
    }
}

#[test]
fn unknown_layout_renders_only_the_diagnostic() {
    let reg = LayoutRegistry::builtin();
    let images = ImageStore::new();
    let design = LabelDesign {
        selected_layout_id: "retired-layout".into(),
        ..LabelDesign::default()
    };
    let scene = render(&design, Face::FacingIn, &RenderContext::new(&reg, &images));
    assert_eq!(scene.ops.len(), 1);
    match &scene.ops[0] {
        DrawOp::PlaceText(t) => assert_eq!(t.text, "no layout selected"),
        other => panic!("unexpected {other:?}"),
    }
    let artifact = export(&design, &Face::ALL, &uncompressed());
    assert_eq!(artifact.page_count, 2);
    assert!(contains(&artifact.bytes, "(no layout selected) Tj"));
}

#[test]
fn export_reflects_the_design_at_request_time() {
    let mut session = LabelSession::default();
    session.set_phone_text("DESIGN-A");
    let job = session.request_export(&Face::ALL, uncompressed()).unwrap();
    session.set_phone_text("DESIGN-B");
    session.set_background_color("#000000").unwrap();
    assert!(matches!(
        session.request_export(&Face::ALL, uncompressed()),
        Err(ExportError::Busy)
    ));

    let artifact = block_on(job.run()).unwrap();
    assert!(contains(&artifact.bytes, "(DESIGN-A) Tj"));
    assert!(!contains(&artifact.bytes, "DESIGN-B"));
    assert_eq!(session.design().phone_text, "DESIGN-B");
    assert!(matches!(
        session.exporter().status(),
        ExportStatus::Succeeded { page_count: 2, .. }
    ));
}

#[test]
fn logo_is_resampled_to_print_resolution_with_soft_mask() {
    let mut session = LabelSession::default();
    let mut rgba = vec![200u8, 30, 30, 255].repeat(100);
    rgba[3] = 0;
    let png = Logo::from_rgba(10, 10, rgba).unwrap().to_png().unwrap();
    session.load_logo(&png).unwrap();

    let job = session.request_export(&[Face::FacingOut], ExportOptions::default()).unwrap();
    let artifact = block_on(job.run()).unwrap();
    // 75 % of the 45 mm trim height is 33.75 mm; at 400 dpi that is 531.5 px.
    assert!(contains(&artifact.bytes, "/Width 532"));
    assert!(contains(&artifact.bytes, "/SMask"));
}

#[test]
fn raster_template_mode_embeds_an_image_instead_of_a_form() {
    let design = LabelDesign::default();
    let raster = export(
        &design,
        &[Face::FacingIn],
        &ExportOptions {
            template_mode: TemplateMode::Raster,
            raster_dpi: 150,
            ..uncompressed()
        },
    );
    assert!(contains(&raster.bytes, "/Subtype /Image"));
    assert!(!contains(&raster.bytes, "/Subtype /Form"));

    let vector = export(&design, &[Face::FacingIn], &uncompressed());
    assert!(contains(&vector.bytes, "/Subtype /Form"));
}

#[test]
fn unreadable_template_degrades_to_a_placeholder() {
    let mut reg = LayoutRegistry::builtin();
    let mut broken = reg.get("classic").unwrap().clone();
    broken.id = "broken";
    broken.aliases = &[];
    broken.background = TemplateArt::Svg("<svg this is not");
    reg.register(broken);
    let images = ImageStore::new();
    let design = LabelDesign {
        selected_layout_id: "broken".into(),
        phone_text: "STILL HERE".into(),
        ..LabelDesign::default()
    };
    let artifact = export_document(
        &design,
        &Face::ALL,
        &RenderContext::new(&reg, &images),
        &uncompressed(),
    )
    .unwrap();
    assert_eq!(artifact.page_count, 2);
    assert!(contains(&artifact.bytes, "(STILL HERE) Tj"));
}

#[test]
fn session_fonts_are_embedded_instead_of_base_14() {
    let mut session = LabelSession::default();
    let mut fonts = FontLibrary::new();
    let mono = std::fs::read(concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fonts/DejaVuSansMono.ttf")).unwrap();
    fonts.register("bebas-neue", FontWeight::Bold, mono).unwrap();
    session.set_fonts(fonts);

    let job = session.request_export(&Face::ALL, uncompressed()).unwrap();
    let artifact = block_on(job.run()).unwrap();
    assert!(contains(&artifact.bytes, "/FontFile2"));
    assert!(contains(&artifact.bytes, "+DejaVuSansMono"));
    // Phone and location both use Bebas Neue; the bold face serves both weights.
    assert!(!contains(&artifact.bytes, "/BaseFont /Helvetica"));

    session.set_fonts(FontLibrary::new());
    let job = session.request_export(&[Face::FacingOut], uncompressed()).unwrap();
    let artifact = block_on(job.run()).unwrap();
    assert!(contains(&artifact.bytes, "/BaseFont /Helvetica-Bold"));
    assert!(!contains(&artifact.bytes, "/FontFile2"));
}

#[test]
fn preview_carries_the_guide_and_the_pdf_does_not() {
    let session = LabelSession::default();
    let svg = session.preview_svg(
        Face::FacingIn,
        &PreviewOptions::default(),
        &DataUrlHrefs {
            images: session.images(),
        },
    );
    assert!(svg.contains("bleed-guide"));
    assert!(svg.contains("#F87171"));
    assert!(
        !session
            .scene(Face::FacingIn)
            .ops
            .iter()
            .any(|op| serde_json::to_string(op).unwrap().contains("F87171"))
    );
}

struct Refusing {
    calls: Cell<u32>,
}

impl Transport for Refusing {
    async fn send(&self, _: &SubmissionPackage) -> Result<(), TransportError> {
        self.calls.set(self.calls.get() + 1);
        Err(TransportError::new("relay unreachable"))
    }
}

#[test]
fn failed_submission_keeps_the_artifact_for_retry() {
    let artifact = export(&LabelDesign::default(), &Face::ALL, &ExportOptions::default());
    let contact = CustomerContact {
        name: "Pat".into(),
        email: "pat@example.com".into(),
        phone: Some("021 555".into()),
        message: None,
    };
    let refusing = Refusing { calls: Cell::new(0) };
    let err = block_on(submit(&artifact, &contact, &refusing)).unwrap_err();
    assert_eq!(err, SubmissionError::Transport("relay unreachable".into()));
    assert_eq!(refusing.calls.get(), 1);

    let package = SubmissionPackage::new(&artifact, &contact).unwrap();
    assert_eq!(package.text("phone"), Some("021 555"));
    assert!(block_on(submit(&artifact, &contact, &LogTransport)).is_ok());
}
