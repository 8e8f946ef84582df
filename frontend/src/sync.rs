use std::cell::Cell;
use std::collections::BTreeMap;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::model::{TotalKind, TotalPayload};

/// Last total successfully posted for each `(fecha, nombre)`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SyncLedger {
    #[serde(default)]
    entries: BTreeMap<String, String>,
}

impl SyncLedger {
    fn key(payload: &TotalPayload) -> String {
        format!("{}|{}", payload.fecha, payload.nombre)
    }

    fn value(payload: &TotalPayload) -> String {
        payload.total.normalize().to_string()
    }

    pub fn is_current(&self, payload: &TotalPayload) -> bool {
        self.entries.get(&Self::key(payload)) == Some(&Self::value(payload))
    }

    /// Payloads whose total differs from what was last posted.
    pub fn pending(&self, payloads: &[TotalPayload]) -> Vec<TotalPayload> {
        payloads
            .iter()
            .filter(|p| !self.is_current(p))
            .cloned()
            .collect()
    }

    pub fn record(&mut self, payload: &TotalPayload) {
        self.entries.insert(Self::key(payload), Self::value(payload));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct SyncOutcome {
    pub posted: usize,
    pub unchanged: usize,
    /// Groups whose loop stopped, with the error that stopped it.
    pub failed: Vec<(TotalKind, String)>,
}

impl SyncOutcome {
    pub fn has_failed(&self, kind: TotalKind) -> bool {
        self.failed.iter().any(|(k, _)| *k == kind)
    }

    pub fn summary(&self) -> String {
        let mut out = format!(
            "{} totales guardados, {} sin cambios",
            self.posted, self.unchanged
        );
        if !self.failed.is_empty() {
            let groups: Vec<&str> = self.failed.iter().map(|(k, _)| k.label()).collect();
            out.push_str(&format!("; error al guardar {}", groups.join(", ")));
        }
        out
    }
}

/// Allows one submission round at a time. Clones share the same flag.
#[derive(Clone, Debug, Default)]
pub struct SyncGuard(Rc<Cell<bool>>);

/// Held for the length of a round; dropping it frees the guard.
#[derive(Debug)]
pub struct SyncTicket(Rc<Cell<bool>>);

impl SyncGuard {
    pub fn try_start(&self) -> Option<SyncTicket> {
        if self.0.replace(true) {
            return None;
        }
        Some(SyncTicket(self.0.clone()))
    }

    pub fn is_running(&self) -> bool {
        self.0.get()
    }
}

impl Drop for SyncTicket {
    fn drop(&mut self) {
        self.0.set(false);
    }
}
