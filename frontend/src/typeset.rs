use js_sys::{Array, Function, Promise, Reflect};
use leptos::task::spawn_local;
use wasm_bindgen::{JsCast, JsValue};
use wasm_bindgen_futures::JsFuture;
use web_sys::Element;

/// Highlights code blocks and typesets LaTeX under `element`.
/// Prism and MathJax are loaded by `index.html`; when either is missing a warning is logged.
pub fn enhance(element: &Element) {
    highlight(element);
    typeset(element);
}

fn global(name: &str) -> Option<JsValue> {
    let window = web_sys::window()?;
    Reflect::get(&window, &JsValue::from_str(name))
        .ok()
        .filter(|v| !v.is_undefined() && !v.is_null())
}

fn method(target: &JsValue, name: &str) -> Option<Function> {
    Reflect::get(target, &JsValue::from_str(name))
        .ok()
        .and_then(|v| v.dyn_into::<Function>().ok())
}

fn highlight(element: &Element) {
    let Some(prism) = global("Prism") else {
        log::warn!("Prism not loaded; skipping syntax highlighting");
        return;
    };
    let Some(highlight_all_under) = method(&prism, "highlightAllUnder") else {
        log::warn!("Prism.highlightAllUnder not available");
        return;
    };
    if let Err(e) = highlight_all_under.call1(&prism, element) {
        log::error!("Syntax highlighting failed: {e:?}");
    }
}

fn typeset(element: &Element) {
    let Some(mathjax) = global("MathJax") else {
        log::warn!("MathJax not loaded yet");
        return;
    };
    let targets = Array::of1(element);

    if let Some(typeset_promise) = method(&mathjax, "typesetPromise") {
        match typeset_promise.call1(&mathjax, &targets) {
            Ok(value) => {
                let promise = Promise::from(value);
                spawn_local(async move {
                    match JsFuture::from(promise).await {
                        Ok(_) => log::debug!("MathJax rendering complete"),
                        Err(e) => log::warn!("MathJax error: {e:?}"),
                    }
                });
            }
            Err(e) => log::error!("Error rendering LaTeX: {e:?}"),
        }
    } else if let Some(typeset_sync) = method(&mathjax, "typeset") {
        if let Err(e) = typeset_sync.call1(&mathjax, &targets) {
            log::error!("Error rendering LaTeX: {e:?}");
        }
    } else {
        log::warn!("MathJax typesetting function not available");
    }
}
