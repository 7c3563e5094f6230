use std::cell::RefCell;
use std::rc::Rc;

use label_core::fonts::web_font_stylesheet_url;
use label_core::submit::FormPart;
use label_core::{
    CustomerContact, Element, ExportArtifact, ExportOptions, ExportStatus, FONT_CATALOG, Face, ImageId,
    ImageState, LabelSession, LayoutRegistry, PreviewOptions, SubmissionPackage, Transport, TransportError,
    submit,
};
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::JsFuture;
use web_sys::{Document, Event, FormData, RequestInit, Response, Window};

mod state;
mod upload;
mod utils;

use state::{STATE, State};
use utils::{field_value, log, next_tick, object_url, save_bytes_as_file, set_text, submit_endpoint};

/// Posts the package as `multipart/form-data` with `fetch`.
struct FetchTransport {
    window: Window,
    endpoint: String,
}

impl Transport for FetchTransport {
    async fn send(&self, package: &SubmissionPackage) -> Result<(), TransportError> {
        let js_err = |e: JsValue| TransportError::new(format!("{e:?}"));
        let form = FormData::new().map_err(js_err)?;
        for part in &package.parts {
            match part {
                FormPart::Text { name, value } => form.append_with_str(name, value).map_err(js_err)?,
                FormPart::File {
                    name,
                    file_name,
                    content_type,
                    bytes,
                } => {
                    let blob = utils::blob_from_bytes(bytes, content_type).map_err(js_err)?;
                    form.append_with_blob_and_filename(name, &blob, file_name)
                        .map_err(js_err)?
                }
            }
        }
        let init = RequestInit::new();
        init.set_method("POST");
        init.set_body(&form);
        let resp = JsFuture::from(self.window.fetch_with_str_and_init(&self.endpoint, &init))
            .await
            .map_err(js_err)?;
        let resp: Response = resp.dyn_into().map_err(js_err)?;
        if !resp.ok() {
            return Err(TransportError::new(format!("HTTP {}", resp.status())));
        }
        Ok(())
    }
}

/// Keep the logo object URL in step with the design's logo.
pub(crate) fn refresh_logo_url(state: &mut State) {
    let current = state.session.design().logo;
    state.release_logo_url(current);
    let Some(id) = current else {
        return;
    };
    if state.logo_url.is_some() {
        return;
    }
    if let Some(ImageState::Ready(logo)) = state.session.images().state(id) {
        match logo.to_png().map_err(|e| JsValue::from_str(&e.to_string())).and_then(|png| object_url(&png, "image/png")) {
            Ok(url) => state.logo_url = Some((id, url)),
            Err(e) => log(&format!("Failed to create logo URL: {e:?}")),
        }
    }
}

/// Mount both face previews into the page.
pub(crate) fn refresh_previews(state: &State) {
    let hrefs = |id: ImageId| {
        state
            .logo_url
            .as_ref()
            .filter(|(i, _)| *i == id)
            .map(|(_, url)| url.clone())
    };
    let opts = PreviewOptions::default();
    for face in Face::ALL {
        if let Some(el) = state.document.get_element_by_id(&format!("preview-{}", face.slug())) {
            el.set_inner_html(&state.session.preview_svg(face, &opts, &hrefs));
        }
    }
}

fn show_status(document: &Document, status: &ExportStatus) {
    let text = match status {
        ExportStatus::Idle => String::new(),
        ExportStatus::Pending => "Preparing PDF…".to_string(),
        ExportStatus::Succeeded { file_name, page_count } => format!("{file_name} ({page_count} pages)"),
        ExportStatus::Failed(e) => format!("Export failed: {e}"),
    };
    set_text(document, "exportStatus", &text);
}

// Registers `f` for `event` on the element with `id`, passing the element's
// current value. Missing elements are skipped so partial pages still work.
fn on_field(
    state: &Rc<RefCell<State>>,
    id: &'static str,
    event: &str,
    f: impl Fn(&mut State, String) + 'static,
) -> Result<(), JsValue> {
    let doc = state.borrow().document.clone();
    let Some(el) = doc.get_element_by_id(id) else {
        return Ok(());
    };
    let st = state.clone();
    let cb = Closure::<dyn FnMut(Event)>::wrap(Box::new(move |_e: Event| {
        let mut s = st.borrow_mut();
        let Some(value) = field_value(&s.document, id) else {
            return;
        };
        f(&mut s, value);
        refresh_previews(&s);
    }));
    el.add_event_listener_with_callback(event, cb.as_ref().unchecked_ref())?;
    cb.forget();
    Ok(())
}

fn on_click(state: &Rc<RefCell<State>>, id: &str, f: impl Fn(Rc<RefCell<State>>) + 'static) -> Result<(), JsValue> {
    let doc = state.borrow().document.clone();
    let Some(el) = doc.get_element_by_id(id) else {
        return Ok(());
    };
    let st = state.clone();
    let cb = Closure::<dyn FnMut(Event)>::wrap(Box::new(move |_e: Event| f(st.clone())));
    el.add_event_listener_with_callback("click", cb.as_ref().unchecked_ref())?;
    cb.forget();
    Ok(())
}

fn fill_select(document: &Document, id: &str, options: impl IntoIterator<Item = (&'static str, &'static str)>) {
    let Some(sel) = document.get_element_by_id(id) else {
        return;
    };
    sel.set_inner_html("");
    for (value, label) in options {
        let opt = match document.create_element("option") {
            Ok(opt) => opt,
            Err(e) => {
                log(&format!("#{id}: cannot create option: {e:?}"));
                continue;
            }
        };
        if let Err(e) = opt.set_attribute("value", value) {
            log(&format!("#{id}: cannot set option {value}: {e:?}"));
        }
        opt.set_text_content(Some(label));
        if let Err(e) = sel.append_child(&opt) {
            log(&format!("#{id}: cannot add option {value}: {e:?}"));
        }
    }
}

fn set_size(state: &mut State, element: Element, value: &str) {
    let Ok(size) = value.trim().parse::<f64>() else {
        return;
    };
    let design = state.session.design();
    let mut style = match element {
        Element::Location => design.location_style.clone(),
        _ => design.phone_style.clone(),
    };
    style.size_pt = size.max(1.0);
    state.session.set_style(element, style);
}

fn set_font(state: &mut State, element: Element, font: String) {
    let design = state.session.design();
    let mut style = match element {
        Element::Location => design.location_style.clone(),
        _ => design.phone_style.clone(),
    };
    style.font = font;
    state.session.set_style(element, style);
}

fn export_pdf(st: Rc<RefCell<State>>, then_submit: bool) {
    let (job, window) = {
        let s = st.borrow();
        (
            s.session.request_export(&Face::ALL, ExportOptions::default()),
            s.window.clone(),
        )
    };
    let job = match job {
        Ok(job) => job,
        Err(e) => {
            log(&format!("Export not started: {e}"));
            return;
        }
    };
    wasm_bindgen_futures::spawn_local(async move {
        // Give the page a frame between faces so the pending status paints.
        let artifact = match job.run_yielding(move || next_tick(window.clone())).await {
            Ok(a) => a,
            Err(e) => {
                log(&format!("Export failed: {e}"));
                return;
            }
        };
        if then_submit {
            st.borrow_mut().last_artifact = Some(artifact);
            submit_last(st).await;
        } else {
            let doc = st.borrow().document.clone();
            if let Err(e) = save_bytes_as_file(&doc, &artifact.file_name, ExportArtifact::MIME_TYPE, &artifact.bytes) {
                log(&format!("Download failed: {e:?}"));
            }
        }
    });
}

// Sends the kept artifact. It stays in the state after a failure so the user
// can retry without another export.
async fn submit_last(st: Rc<RefCell<State>>) {
    let (artifact, contact, window, document) = {
        let s = st.borrow();
        let Some(artifact) = s.last_artifact.clone() else {
            return;
        };
        let doc = &s.document;
        let optional = |id: &str| field_value(doc, id).filter(|v| !v.trim().is_empty());
        let contact = CustomerContact {
            name: field_value(doc, "contactName").unwrap_or_default(),
            email: field_value(doc, "contactEmail").unwrap_or_default(),
            phone: optional("contactPhone"),
            message: optional("contactMessage"),
        };
        (artifact, contact, s.window.clone(), s.document.clone())
    };
    let Some(endpoint) = submit_endpoint() else {
        set_text(&document, "submitStatus", "No submission endpoint configured");
        return;
    };
    let transport = FetchTransport { window, endpoint };
    match submit(&artifact, &contact, &transport).await {
        Ok(()) => {
            st.borrow_mut().last_artifact = None;
            set_text(&document, "submitStatus", "Sent");
        }
        Err(e) => set_text(&document, "submitStatus", &format!("Not sent: {e}")),
    }
}

fn attach_ui(state: Rc<RefCell<State>>) -> Result<(), JsValue> {
    let doc = state.borrow().document.clone();

    fill_select(
        &doc,
        "layoutSel",
        state
            .borrow()
            .session
            .registry()
            .list()
            .iter()
            .map(|t| (t.id, t.display_name))
            .collect::<Vec<_>>(),
    );
    for id in ["phoneFont", "locationFont"] {
        fill_select(&doc, id, FONT_CATALOG.iter().map(|f| (f.id, f.display_name)));
    }

    upload::attach_logo_input(state.clone())?;

    on_field(&state, "phoneText", "input", |s, v| s.session.set_phone_text(&v))?;
    on_field(&state, "locationText", "input", |s, v| s.session.set_location_text(&v))?;
    on_field(&state, "bgColor", "input", |s, v| {
        if let Err(e) = s.session.set_background_color(&v) {
            log(&e.to_string());
        }
    })?;
    on_field(&state, "accentColor", "input", |s, v| {
        if let Err(e) = s.session.set_accent_color(&v) {
            log(&e.to_string());
        }
    })?;
    on_field(&state, "layoutSel", "change", |s, v| {
        if let Err(e) = s.session.set_layout(&v) {
            log(&e.to_string());
        }
    })?;
    on_field(&state, "phoneFont", "change", |s, v| set_font(s, Element::Phone, v))?;
    on_field(&state, "locationFont", "change", |s, v| set_font(s, Element::Location, v))?;
    on_field(&state, "phoneSize", "input", |s, v| set_size(s, Element::Phone, &v))?;
    on_field(&state, "locationSize", "input", |s, v| set_size(s, Element::Location, &v))?;
    on_field(&state, "logoSizeOut", "input", |s, v| {
        if let Ok(pct) = v.parse() {
            s.session.set_logo_size(Face::FacingOut, pct);
        }
    })?;
    on_field(&state, "logoSizeIn", "input", |s, v| {
        if let Ok(pct) = v.parse() {
            s.session.set_logo_size(Face::FacingIn, pct);
        }
    })?;

    on_click(&state, "clearLogo", |st| {
        let mut s = st.borrow_mut();
        s.session.clear_logo();
        refresh_logo_url(&mut s);
        refresh_previews(&s);
    })?;
    on_click(&state, "exportPdf", |st| export_pdf(st, false))?;
    on_click(&state, "submitLabel", |st| {
        // A kept artifact from a failed attempt is retried as is.
        if st.borrow().last_artifact.is_some() {
            wasm_bindgen_futures::spawn_local(submit_last(st));
        } else {
            export_pdf(st, true);
        }
    })?;

    let status_doc = doc.clone();
    state
        .borrow()
        .session
        .exporter()
        .set_listener(move |status| show_status(&status_doc, status));
    Ok(())
}

fn load_web_fonts(document: &Document) -> Result<(), JsValue> {
    let Some(head) = document.query_selector("head")? else {
        return Ok(());
    };
    let link = document.create_element("link")?;
    link.set_attribute("rel", "stylesheet")?;
    link.set_attribute("href", &web_font_stylesheet_url())?;
    head.append_child(&link)?;
    Ok(())
}

#[wasm_bindgen(start)]
pub fn start() -> Result<(), JsValue> {
    let window = web_sys::window().ok_or("no window")?;
    let document = window.document().ok_or("no document")?;
    load_web_fonts(&document)?;

    let state = Rc::new(RefCell::new(State {
        window,
        document,
        session: LabelSession::new(LayoutRegistry::builtin()),
        logo_url: None,
        last_artifact: None,
    }));
    STATE.with(|st| st.replace(Some(state.clone())));

    attach_ui(state.clone())?;
    refresh_previews(&state.borrow());
    Ok(())
}

/// Current design as JSON, for saving from the host page.
#[wasm_bindgen]
pub fn design_json() -> Option<String> {
    STATE.with(|st| {
        let st = st.borrow();
        let s = st.as_ref()?.borrow();
        serde_json::to_string(s.session.design()).ok()
    })
}

/// Replace the design from JSON, keeping the uploaded logo.
#[wasm_bindgen]
pub fn load_design_json(json: &str) -> Result<(), JsValue> {
    let design = serde_json::from_str(json).map_err(|e| JsValue::from_str(&e.to_string()))?;
    STATE.with(|st| {
        let st = st.borrow();
        let Some(state) = st.as_ref() else {
            return Err(JsValue::from_str("not started"));
        };
        let mut s = state.borrow_mut();
        s.session.replace_design(design);
        refresh_previews(&s);
        Ok(())
    })
}
