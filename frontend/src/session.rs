//! Browser-side state: auth token, CSRF cookie and the persisted sync ledger.

use wasm_bindgen::JsCast;
use web_sys::{HtmlDocument, Storage};

use crate::sync::SyncLedger;

const TOKEN_KEY: &str = "token";
const API_URL_KEY: &str = "api_url";
const LEDGER_KEY: &str = "presupuesto_totales_sync";
const CSRF_COOKIE: &str = "csrftoken";

fn local_storage() -> Option<Storage> {
    web_sys::window().and_then(|window| window.local_storage().ok().flatten())
}

fn stored_item(key: &str) -> Option<String> {
    local_storage()
        .and_then(|storage| storage.get_item(key).ok().flatten())
        .filter(|v| !v.trim().is_empty() && v != "null")
}

pub fn auth_token() -> Option<String> {
    stored_item(TOKEN_KEY)
}

pub fn stored_api_url() -> Option<String> {
    stored_item(API_URL_KEY)
}

pub fn csrf_token() -> Option<String> {
    let document = web_sys::window()?.document()?;
    let html: HtmlDocument = document.dyn_into().ok()?;
    let cookies = html.cookie().ok()?;
    cookie_value(&cookies, CSRF_COOKIE)
}

pub fn load_ledger() -> SyncLedger {
    if let Some(raw) = stored_item(LEDGER_KEY) {
        match serde_json::from_str::<SyncLedger>(&raw) {
            Ok(ledger) => return ledger,
            Err(err) => log::warn!("discarding unreadable sync ledger: {}", err),
        }
    }
    SyncLedger::default()
}

pub fn save_ledger(ledger: &SyncLedger) {
    if let Some(storage) = local_storage() {
        if let Ok(raw) = serde_json::to_string(ledger) {
            if storage.set_item(LEDGER_KEY, &raw).is_err() {
                log::warn!("could not persist sync ledger ({} entries)", ledger.len());
            }
        }
    }
}

/// Value of `name` in a `document.cookie` string.
fn cookie_value(cookies: &str, name: &str) -> Option<String> {
    cookies
        .split(';')
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.to_string())
        .filter(|value| !value.is_empty())
}
