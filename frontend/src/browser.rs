use wasm_bindgen::JsValue;

/// `window.alert`, logged when no window is available.
pub fn alert(message: &str) {
    match web_sys::window() {
        Some(window) => {
            if let Err(e) = window.alert_with_message(message) {
                log::error!("alert failed: {e:?}");
            }
        }
        None => log::warn!("{message}"),
    }
}

/// `window.confirm`; anything but an explicit OK counts as cancel.
pub fn confirm(message: &str) -> bool {
    web_sys::window()
        .and_then(|w| w.confirm_with_message(message).ok())
        .unwrap_or(false)
}

/// Current time as an ISO-8601 string, for optimistic messages.
pub fn now_iso() -> String {
    String::from(js_sys::Date::new_0().to_iso_string())
}

/// Local time of day for a message timestamp; empty when it cannot be parsed.
pub fn local_time(timestamp: &str) -> String {
    if timestamp.is_empty() {
        return String::new();
    }
    let date = js_sys::Date::new(&JsValue::from_str(timestamp));
    if date.get_time().is_nan() {
        return String::new();
    }
    String::from(date.to_locale_time_string("default"))
}
