//! Per-kind "dynamic updates enabled" switches.
//!
//! A disabled kind is an operational kill-switch: dispatch becomes a no-op.
//! Reads may observe a reload late, but always see either the old table or
//! the new one as a whole.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use super::EventKind;

pub trait FeatureToggles: Send + Sync {
    fn is_event_enabled(&self, kind: EventKind) -> bool;
}

/// In-memory toggle table. Kinds without an entry are enabled.
#[derive(Debug, Default)]
pub struct ToggleTable {
    enabled: RwLock<HashMap<EventKind, bool>>,
}

impl ToggleTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from the `[dynamic_updates]` config table (kind name -> enabled).
    pub fn from_config(entries: &HashMap<String, bool>) -> Self {
        let table = Self::new();
        table.reload(entries);
        table
    }

    /// Replace every switch with the given table.
    pub fn reload(&self, entries: &HashMap<String, bool>) {
        let mut table = HashMap::with_capacity(entries.len());
        for (name, enabled) in entries {
            // Env keys arrive snake_cased
            match EventKind::from_name(&name.replace('_', "-")) {
                Some(kind) => {
                    table.insert(kind, *enabled);
                }
                None => {
                    tracing::warn!(name = %name, "Ignoring toggle for unknown event kind");
                }
            }
        }
        let disabled: Vec<&str> = EventKind::ALL
            .iter()
            .filter(|kind| !table.get(kind).copied().unwrap_or(true))
            .map(|kind| kind.as_str())
            .collect();

        *self.enabled.write().unwrap_or_else(PoisonError::into_inner) = table;

        if !disabled.is_empty() {
            tracing::info!(disabled = ?disabled, "Dynamic updates disabled for some event kinds");
        }
    }

    pub fn set(&self, kind: EventKind, enabled: bool) {
        self.enabled
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(kind, enabled);
    }
}

impl FeatureToggles for ToggleTable {
    fn is_event_enabled(&self, kind: EventKind) -> bool {
        self.enabled
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&kind)
            .copied()
            .unwrap_or(true)
    }
}
