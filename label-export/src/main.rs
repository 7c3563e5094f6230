//! `labelgen` renders a label design from JSON.
//!
//! ```bash
//! labelgen --design demos/design.json --logo logo.png pdf -o label.pdf
//! labelgen --design demos/design.json png --face facing-in --dpi 300 -o inside.png
//! labelgen --font bebas-neue:bold=BebasNeue-Regular.ttf pdf -o label.pdf
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, bail};
use clap::{Parser, Subcommand, ValueEnum};
use futures::executor::block_on;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use label_core::{
    CustomerContact, DataUrlHrefs, ExportOptions, Face, FontLibrary, FontWeight, LabelDesign, LabelSession,
    LayoutRegistry, LogTransport, PreviewOptions, TemplateMode, render_preview_png, submit,
};

/// Service label renderer
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Design JSON (camelCase fields); defaults apply to anything missing
    #[arg(short, long)]
    design: Option<PathBuf>,

    /// Logo image (PNG or JPEG)
    #[arg(short, long)]
    logo: Option<PathBuf>,

    /// Override the design's layout id
    #[arg(long)]
    layout: Option<String>,

    /// Font file for a catalog entry, as ID[:bold]=PATH; repeatable
    #[arg(long = "font", value_parser = parse_font_arg)]
    fonts: Vec<FontArg>,

    /// Only embed fonts given with --font
    #[arg(long)]
    no_system_fonts: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Debug)]
struct FontArg {
    id: String,
    weight: FontWeight,
    path: PathBuf,
}

fn parse_font_arg(s: &str) -> Result<FontArg, String> {
    let (key, path) = s
        .split_once('=')
        .ok_or_else(|| format!("expected ID[:bold]=PATH, got {s}"))?;
    let (id, weight) = match key.split_once(':') {
        Some((id, "bold")) => (id, FontWeight::Bold),
        Some((id, "normal")) => (id, FontWeight::Normal),
        Some((_, other)) => return Err(format!("unknown weight {other}")),
        None => (key, FontWeight::Normal),
    };
    Ok(FontArg {
        id: id.to_string(),
        weight,
        path: PathBuf::from(path),
    })
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum FaceArg {
    FacingOut,
    FacingIn,
}

impl From<FaceArg> for Face {
    fn from(f: FaceArg) -> Self {
        match f {
            FaceArg::FacingOut => Face::FacingOut,
            FaceArg::FacingIn => Face::FacingIn,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Write the print PDF
    Pdf {
        #[arg(short, long, default_value = "service-label.pdf")]
        out: PathBuf,
        /// Faces to include; both when omitted
        #[arg(long, value_delimiter = ',')]
        faces: Vec<FaceArg>,
        /// Minimum raster resolution
        #[arg(long, default_value_t = label_core::constants::PRINT_RASTER_DPI)]
        dpi: u32,
        /// Rasterize template artwork instead of embedding vectors
        #[arg(long)]
        raster_templates: bool,
    },
    /// Write the preview SVG of one face
    Svg {
        #[arg(long, value_enum, default_value = "facing-in")]
        face: FaceArg,
        #[arg(short, long)]
        out: PathBuf,
        /// Leave out the trim guide
        #[arg(long)]
        no_guide: bool,
    },
    /// Write the preview PNG of one face
    Png {
        #[arg(long, value_enum, default_value = "facing-in")]
        face: FaceArg,
        #[arg(short, long)]
        out: PathBuf,
        #[arg(long, default_value_t = 300.0)]
        dpi: f64,
        #[arg(long)]
        no_guide: bool,
    },
    /// List the available layouts
    Layouts,
    /// Export both faces and hand them to the logging transport
    Submit {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        phone: Option<String>,
        #[arg(long)]
        message: Option<String>,
    },
}

fn load_design(path: Option<&Path>) -> anyhow::Result<LabelDesign> {
    let Some(path) = path else {
        return Ok(LabelDesign::default());
    };
    let txt = fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&txt).with_context(|| format!("invalid design JSON in {}", path.display()))
}

fn load_fonts(args: &Args) -> anyhow::Result<FontLibrary> {
    let mut fonts = if args.no_system_fonts {
        FontLibrary::new()
    } else {
        FontLibrary::system()
    };
    for font in &args.fonts {
        let data = fs::read(&font.path).with_context(|| format!("failed to read font {}", font.path.display()))?;
        fonts
            .register(&font.id, font.weight, data)
            .with_context(|| format!("failed to register {}", font.path.display()))?;
    }
    Ok(fonts)
}

fn build_session(args: &Args) -> anyhow::Result<LabelSession> {
    let design = load_design(args.design.as_deref())?;
    let mut session = LabelSession::with_design(LayoutRegistry::builtin(), design);
    if let Some(id) = &args.layout {
        session.set_layout(id)?;
    }
    session.set_fonts(load_fonts(args)?);
    if let Some(path) = &args.logo {
        let bytes = fs::read(path).with_context(|| format!("failed to read logo {}", path.display()))?;
        // A logo that does not decode still yields a label with the placeholder.
        if let Err(e) = session.load_logo(&bytes) {
            tracing::warn!(error = %e, "continuing without logo");
        }
    }
    Ok(session)
}

fn write_file(path: &Path, bytes: &[u8]) -> anyhow::Result<()> {
    fs::write(path, bytes).with_context(|| format!("failed to write {}", path.display()))?;
    info!("wrote {} ({} bytes)", path.display(), bytes.len());
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let filter = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    if let Command::Layouts = args.command {
        for t in LayoutRegistry::builtin().list() {
            println!("{:<10} {}  (aliases: {})", t.id, t.display_name, t.aliases.join(", "));
        }
        return Ok(());
    }

    let session = build_session(&args)?;
    match &args.command {
        Command::Pdf {
            out,
            faces,
            dpi,
            raster_templates,
        } => {
            let faces: Vec<Face> = if faces.is_empty() {
                Face::ALL.to_vec()
            } else {
                faces.iter().map(|&f| f.into()).collect()
            };
            let opts = ExportOptions {
                raster_dpi: *dpi,
                template_mode: if *raster_templates {
                    TemplateMode::Raster
                } else {
                    TemplateMode::Vector
                },
                file_name: out
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| label_core::constants::EXPORT_FILE_NAME.to_string()),
                ..ExportOptions::default()
            };
            let job = session.request_export(&faces, opts)?;
            let artifact = block_on(job.run())?;
            write_file(out, &artifact.bytes)?;
        }
        Command::Svg { face, out, no_guide } => {
            let opts = PreviewOptions {
                show_bleed_guide: !no_guide,
                ..PreviewOptions::default()
            };
            let hrefs = DataUrlHrefs {
                images: session.images(),
            };
            let svg = session.preview_svg((*face).into(), &opts, &hrefs);
            write_file(out, svg.as_bytes())?;
        }
        Command::Png {
            face,
            out,
            dpi,
            no_guide,
        } => {
            if *dpi <= 0.0 {
                bail!("dpi must be positive");
            }
            let opts = PreviewOptions {
                dpi: *dpi,
                show_bleed_guide: !no_guide,
            };
            let hrefs = DataUrlHrefs {
                images: session.images(),
            };
            let png = render_preview_png(session.scene((*face).into()), &opts, &hrefs)?;
            write_file(out, &png)?;
        }
        Command::Submit {
            name,
            email,
            phone,
            message,
        } => {
            let job = session.request_export(&Face::ALL, ExportOptions::default())?;
            let artifact = block_on(job.run())?;
            let contact = CustomerContact {
                name: name.clone(),
                email: email.clone(),
                phone: phone.clone(),
                message: message.clone(),
            };
            block_on(submit(&artifact, &contact, &LogTransport))?;
            info!("submitted {}", artifact.file_name);
        }
        Command::Layouts => {}
    }
    Ok(())
}
