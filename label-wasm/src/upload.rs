use std::cell::RefCell;
use std::rc::Rc;

use label_core::ImageId;
use wasm_bindgen::JsCast;
use wasm_bindgen::closure::Closure;
use wasm_bindgen::prelude::*;
use web_sys::{Event, FileReader, HtmlInputElement};

use crate::state::State;
use crate::utils::log;
use crate::{refresh_logo_url, refresh_previews};

// Wires up the logo file input. Decoding happens in the reader's onload; a
// newer upload supersedes any still in flight.
pub fn attach_logo_input(state: Rc<RefCell<State>>) -> Result<(), JsValue> {
    let doc = state.borrow().document.clone();
    let Some(input) = doc.get_element_by_id("logoFile") else {
        return Ok(());
    };
    let input: HtmlInputElement = input.dyn_into()?;
    let input_for_closure = input.clone();
    let st = state.clone();
    let onchange = Closure::<dyn FnMut(Event)>::wrap(Box::new(move |_e: Event| {
        let Some(file) = input_for_closure.files().and_then(|f| f.item(0)) else {
            log("No logo selected");
            return;
        };
        let reader = match FileReader::new() {
            Ok(r) => r,
            Err(e) => {
                log(&format!("FileReader unavailable: {e:?}"));
                return;
            }
        };
        let id = {
            let mut s = st.borrow_mut();
            let id = s.session.begin_logo_load();
            refresh_logo_url(&mut s);
            refresh_previews(&s);
            id
        };

        let st_load = st.clone();
        let reader_for_closure = reader.clone();
        let onload = Closure::<dyn FnMut(Event)>::wrap(Box::new(move |_ev: Event| {
            let bytes = match reader_for_closure.result() {
                Ok(v) => js_sys::Uint8Array::new(&v).to_vec(),
                Err(e) => {
                    finish_failed(&st_load, id, &format!("{e:?}"));
                    return;
                }
            };
            let mut s = st_load.borrow_mut();
            if let Err(e) = s.session.complete_logo_load(id, &bytes) {
                log(&format!("Logo rejected: {e}"));
            }
            refresh_logo_url(&mut s);
            refresh_previews(&s);
        }));

        let st_err = st.clone();
        let onerror = Closure::<dyn FnMut(Event)>::wrap(Box::new(move |_ev: Event| {
            finish_failed(&st_err, id, "read error");
        }));

        reader.set_onload(Some(onload.as_ref().unchecked_ref()));
        reader.set_onerror(Some(onerror.as_ref().unchecked_ref()));
        if let Err(e) = reader.read_as_array_buffer(&file) {
            finish_failed(&st, id, &format!("{e:?}"));
        }
        onload.forget();
        onerror.forget();
    }));
    input.set_onchange(Some(onchange.as_ref().unchecked_ref()));
    onchange.forget();
    Ok(())
}

fn finish_failed(state: &Rc<RefCell<State>>, id: ImageId, reason: &str) {
    let mut s = state.borrow_mut();
    s.session.fail_logo_load(id, reason);
    refresh_logo_url(&mut s);
    refresh_previews(&s);
}
