//! Wiring between sync-affecting settings and whatever schedules the
//! periodic background sync. The store never schedules anything itself; the
//! host supplies a [`PeriodicSyncConfigurator`] and is handed a
//! `force_replace` signal whenever a relevant setting changes.

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Settings that influence how the periodic sync is scheduled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncSettings {
    #[serde(default = "default_frequency_minutes")]
    pub frequency_minutes: u32,

    #[serde(default)]
    pub only_on_wifi: bool,

    #[serde(default)]
    pub only_when_charging: bool,
}

fn default_frequency_minutes() -> u32 {
    60
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            frequency_minutes: default_frequency_minutes(),
            only_on_wifi: false,
            only_when_charging: false,
        }
    }
}

/// External consumer of sync configuration changes.
pub trait PeriodicSyncConfigurator {
    fn configure_periodic_sync(&self, settings: &SyncSettings, force_replace: bool);
}

/// Owns the current sync settings and notifies the configurator whenever a
/// sync-affecting field changes.
pub struct SyncSettingsHandle<C: PeriodicSyncConfigurator> {
    settings: SyncSettings,
    configurator: C,
}

impl<C: PeriodicSyncConfigurator> SyncSettingsHandle<C> {
    pub fn new(settings: SyncSettings, configurator: C) -> Self {
        Self {
            settings,
            configurator,
        }
    }

    pub fn settings(&self) -> &SyncSettings {
        &self.settings
    }

    /// Adopt new settings. A change replaces any scheduled sync.
    pub fn update(&mut self, settings: SyncSettings) {
        if settings == self.settings {
            return;
        }
        debug!(?settings, "sync settings changed");
        self.settings = settings;
        self.configurator
            .configure_periodic_sync(&self.settings, true);
    }
}
