use gloo_net::http::{Request, RequestBuilder};
use web_sys::RequestCredentials;

use crate::config::ApiConfig;
use crate::error::ApiError;
use crate::model::{Presupuesto, TotalPayload};
use crate::session;
use crate::sync::{SyncLedger, SyncOutcome};

const PRESUPUESTOS_PATH: &str = "/InformeDetalladoPresupuesto/";
const SAVE_TOTAL_PATH: &str = "/save-presupuesto-total/";

fn authorized(req: RequestBuilder) -> RequestBuilder {
    let mut req = req
        .credentials(RequestCredentials::Include)
        .header("Content-Type", "application/json");
    if let Some(csrf) = session::csrf_token() {
        req = req.header("X-CSRFToken", &csrf);
    }
    if let Some(token) = session::auth_token() {
        req = req.header("Authorization", &format!("Token {}", token));
    }
    req
}

pub async fn fetch_presupuestos(config: &ApiConfig) -> Result<Vec<Presupuesto>, ApiError> {
    let url = config.endpoint(PRESUPUESTOS_PATH);
    let resp = authorized(Request::get(&url)).send().await?;
    if !resp.ok() {
        return Err(ApiError::Status(resp.status()));
    }
    let list = resp
        .json::<Vec<Presupuesto>>()
        .await
        .map_err(ApiError::Decode)?;
    log::info!("fetched {} budget lines", list.len());
    Ok(list)
}

pub async fn save_total(config: &ApiConfig, payload: &TotalPayload) -> Result<(), ApiError> {
    let url = config.endpoint(SAVE_TOTAL_PATH);
    let req = authorized(Request::post(&url))
        .json(payload)
        .map_err(ApiError::Encode)?;
    let resp = req.send().await?;
    if !resp.ok() {
        return Err(ApiError::Status(resp.status()));
    }
    Ok(())
}

/// Posts `payloads` one at a time. The first failure in a kind group ends that
/// group; the remaining groups still run.
pub async fn save_totals(
    config: &ApiConfig,
    payloads: Vec<TotalPayload>,
    ledger: &mut SyncLedger,
) -> SyncOutcome {
    let mut outcome = SyncOutcome::default();
    for payload in payloads {
        if outcome.has_failed(payload.kind) {
            continue;
        }
        match save_total(config, &payload).await {
            Ok(()) => {
                ledger.record(&payload);
                outcome.posted += 1;
            }
            Err(err) => {
                log::error!("Error saving totals ({}): {}", payload.nombre, err);
                outcome.failed.push((payload.kind, err.to_string()));
            }
        }
    }
    outcome
}
