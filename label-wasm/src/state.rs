use std::cell::RefCell;
use std::rc::Rc;

use label_core::{ExportArtifact, ImageId, LabelSession};
use web_sys::{Document, Window};

/// Browser-side state shared by every callback through `Rc<RefCell<_>>`.
pub struct State {
    pub window: Window,
    pub document: Document,
    pub session: LabelSession,
    /// Object URL currently standing in for the logo in the previews.
    pub logo_url: Option<(ImageId, String)>,
    /// Export waiting to be submitted; kept after a failed attempt.
    pub last_artifact: Option<ExportArtifact>,
}

impl State {
    /// Revoke the logo object URL unless it still belongs to `keep`.
    pub fn release_logo_url(&mut self, keep: Option<ImageId>) {
        if let Some((id, url)) = self.logo_url.take() {
            if Some(id) == keep {
                self.logo_url = Some((id, url));
            } else {
                crate::utils::revoke_url(&url);
            }
        }
    }
}

thread_local! {
    pub static STATE: RefCell<Option<Rc<RefCell<State>>>> = const { RefCell::new(None) };
}
