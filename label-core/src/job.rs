//! Export lifecycle: one job at a time, each working on its own snapshot.
//!
//! `Exporter::request` copies everything a job reads (design, the logo
//! bitmaps it references, the layout table) before returning, so edits made
//! while the job is in flight cannot leak into its output. Status moves
//! `Idle -> Pending -> Succeeded | Failed`; a job dropped before it ran puts
//! the exporter back to `Idle`.

use std::cell::RefCell;
use std::fmt;
use std::future;
use std::rc::Rc;

use crate::assets::ImageStore;
use crate::design::{Face, LabelDesign};
use crate::error::ExportError;
use crate::export::{DocumentBuilder, ExportArtifact, ExportOptions, normalize_faces};
use crate::fonts::FontLibrary;
use crate::layout::LayoutRegistry;
use crate::scene::RenderContext;
use crate::units::PhysicalDimensions;

#[derive(Clone, Debug, PartialEq)]
pub enum ExportStatus {
    Idle,
    Pending,
    Succeeded { file_name: String, page_count: usize },
    Failed(ExportError),
}

type Listener = Rc<dyn Fn(&ExportStatus)>;

struct Shared {
    status: ExportStatus,
    listener: Option<Listener>,
}

/// Handle to the export slot. Clones share the same slot.
#[derive(Clone)]
pub struct Exporter {
    shared: Rc<RefCell<Shared>>,
}

impl fmt::Debug for Exporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Exporter")
            .field("status", &self.status())
            .finish()
    }
}

impl Default for Exporter {
    fn default() -> Self {
        Self::new()
    }
}

impl Exporter {
    pub fn new() -> Self {
        Exporter {
            shared: Rc::new(RefCell::new(Shared {
                status: ExportStatus::Idle,
                listener: None,
            })),
        }
    }

    pub fn status(&self) -> ExportStatus {
        self.shared.borrow().status.clone()
    }

    pub fn is_busy(&self) -> bool {
        matches!(self.shared.borrow().status, ExportStatus::Pending)
    }

    /// Called after every status change.
    pub fn set_listener(&self, listener: impl Fn(&ExportStatus) + 'static) {
        self.shared.borrow_mut().listener = Some(Rc::new(listener));
    }

    /// Snapshot the inputs and claim the slot.
    pub fn request(
        &self,
        design: &LabelDesign,
        faces: &[Face],
        ctx: &RenderContext<'_>,
        opts: ExportOptions,
    ) -> Result<ExportJob, ExportError> {
        if self.is_busy() {
            tracing::info!("export rejected, another export is in flight");
            return Err(ExportError::Busy);
        }
        let faces = normalize_faces(faces);
        if faces.is_empty() {
            publish(&self.shared, ExportStatus::Failed(ExportError::NoFaces));
            return Err(ExportError::NoFaces);
        }
        let job = ExportJob {
            design: design.clone(),
            faces,
            images: ctx.images.snapshot(design.logo),
            registry: ctx.registry.clone(),
            fonts: ctx.fonts.clone(),
            dims: ctx.dims,
            opts,
            shared: self.shared.clone(),
            settled: false,
        };
        publish(&self.shared, ExportStatus::Pending);
        tracing::info!(faces = ?job.faces, "export requested");
        Ok(job)
    }
}

fn publish(shared: &Rc<RefCell<Shared>>, status: ExportStatus) {
    let listener = {
        let mut s = shared.borrow_mut();
        s.status = status.clone();
        s.listener.clone()
    };
    // Borrow released so the listener may query the exporter.
    if let Some(listener) = listener {
        listener(&status);
    }
}

/// A claimed export with its own copy of every input.
pub struct ExportJob {
    design: LabelDesign,
    faces: Vec<Face>,
    images: ImageStore,
    registry: LayoutRegistry,
    fonts: FontLibrary,
    dims: PhysicalDimensions,
    opts: ExportOptions,
    shared: Rc<RefCell<Shared>>,
    settled: bool,
}

impl fmt::Debug for ExportJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExportJob")
            .field("faces", &self.faces)
            .field("layout", &self.design.selected_layout_id)
            .finish()
    }
}

impl ExportJob {
    pub fn design(&self) -> &LabelDesign {
        &self.design
    }

    pub fn faces(&self) -> &[Face] {
        &self.faces
    }

    /// Build the document and publish exactly one final status.
    pub async fn run(self) -> Result<ExportArtifact, ExportError> {
        self.run_yielding(|| future::ready(())).await
    }

    /// Like [`run`](Self::run), awaiting `yield_now()` after each page so a
    /// single-threaded host gets control back between faces. Dropping the
    /// future while it is suspended abandons the job.
    pub async fn run_yielding<F, Fut>(mut self, mut yield_now: F) -> Result<ExportArtifact, ExportError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = ()>,
    {
        let result = self.build(&mut yield_now).await;
        let status = match &result {
            Ok(artifact) => ExportStatus::Succeeded {
                file_name: artifact.file_name.clone(),
                page_count: artifact.page_count,
            },
            Err(e) => {
                tracing::warn!(error = %e, "export failed");
                ExportStatus::Failed(e.clone())
            }
        };
        self.settled = true;
        publish(&self.shared, status);
        result
    }

    async fn build<F, Fut>(&self, yield_now: &mut F) -> Result<ExportArtifact, ExportError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = ()>,
    {
        let ctx = RenderContext {
            registry: &self.registry,
            images: &self.images,
            fonts: &self.fonts,
            dims: self.dims,
        };
        let mut builder = DocumentBuilder::new(&self.design, ctx, &self.opts);
        for &face in &self.faces {
            builder.add_face(face)?;
            yield_now().await;
        }
        builder.finish()
    }
}

impl Drop for ExportJob {
    fn drop(&mut self) {
        if !self.settled {
            tracing::info!("export abandoned before it ran");
            publish(&self.shared, ExportStatus::Idle);
        }
    }
}
