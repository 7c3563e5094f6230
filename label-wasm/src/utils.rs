use wasm_bindgen::{JsCast, JsValue};
use wasm_bindgen_futures::JsFuture;
use web_sys::{Blob, BlobPropertyBag, Document, HtmlElement, Url, Window};

/// Log a message to the browser console.
pub fn log(s: &str) {
    web_sys::console::log_1(&JsValue::from_str(s));
}

/// Resolves on the next macrotask, after the browser had a chance to paint.
pub async fn next_tick(window: Window) {
    let promise = js_sys::Promise::new(&mut |resolve: js_sys::Function, _reject| {
        if let Err(e) = window.set_timeout_with_callback_and_timeout_and_arguments_0(&resolve, 0) {
            log(&format!("setTimeout failed: {e:?}"));
            if let Err(e) = resolve.call0(&JsValue::NULL) {
                log(&format!("resolve failed: {e:?}"));
            }
        }
    });
    if let Err(e) = JsFuture::from(promise).await {
        log(&format!("tick rejected: {e:?}"));
    }
}

pub fn blob_from_bytes(bytes: &[u8], mime: &str) -> Result<Blob, JsValue> {
    let array = js_sys::Array::new();
    array.push(&js_sys::Uint8Array::from(bytes));
    let props = BlobPropertyBag::new();
    props.set_type(mime);
    Blob::new_with_u8_array_sequence_and_options(&array, &props)
}

/// Object URL for `bytes`. The caller owns the URL and must revoke it.
pub fn object_url(bytes: &[u8], mime: &str) -> Result<String, JsValue> {
    Url::create_object_url_with_blob(&blob_from_bytes(bytes, mime)?)
}

pub fn revoke_url(url: &str) {
    if let Err(e) = Url::revoke_object_url(url) {
        log(&format!("failed to revoke {url}: {e:?}"));
    }
}

/// Hand `bytes` to the browser as a download.
pub fn save_bytes_as_file(document: &Document, filename: &str, mime: &str, bytes: &[u8]) -> Result<(), JsValue> {
    let url = object_url(bytes, mime)?;
    let a = document.create_element("a")?.dyn_into::<HtmlElement>()?;
    a.set_attribute("href", &url)?;
    a.set_attribute("download", filename)?;
    a.click();
    Url::revoke_object_url(&url)?;
    Ok(())
}

pub fn set_text(document: &Document, id: &str, text: &str) {
    if let Some(el) = document.get_element_by_id(id) {
        el.set_text_content(Some(text));
    }
}

/// Value of an `<input>`, `<textarea>` or `<select>` by id.
pub fn field_value(document: &Document, id: &str) -> Option<String> {
    let el = document.get_element_by_id(id)?;
    if let Some(i) = el.dyn_ref::<web_sys::HtmlInputElement>() {
        return Some(i.value());
    }
    if let Some(t) = el.dyn_ref::<web_sys::HtmlTextAreaElement>() {
        return Some(t.value());
    }
    el.dyn_ref::<web_sys::HtmlSelectElement>().map(|s| s.value())
}

/// Read the submission endpoint from `window.__SUBMIT_URL`, set by the host page.
pub fn submit_endpoint() -> Option<String> {
    let w = web_sys::window()?;
    js_sys::Reflect::get(&w, &JsValue::from_str("__SUBMIT_URL"))
        .ok()?
        .as_string()
        .filter(|s| !s.trim().is_empty())
}
