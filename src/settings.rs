//! Player preferences
//!
//! Persisted in LocalStorage, separate from the scene tuning.

use serde::{Deserialize, Serialize};

/// Quality preset levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum QualityPreset {
    Low,
    #[default]
    Medium,
    High,
}

impl QualityPreset {
    pub fn as_str(&self) -> &'static str {
        match self {
            QualityPreset::Low => "Low",
            QualityPreset::Medium => "Medium",
            QualityPreset::High => "High",
        }
    }

    /// Next preset, wrapping from High back to Low
    pub fn next(self) -> Self {
        match self {
            QualityPreset::Low => QualityPreset::Medium,
            QualityPreset::Medium => QualityPreset::High,
            QualityPreset::High => QualityPreset::Low,
        }
    }

    /// Sphere tessellation as (segments around, rings pole to pole)
    pub fn sphere_tessellation(&self) -> (u32, u32) {
        match self {
            QualityPreset::Low => (10, 6),
            QualityPreset::Medium => (20, 12),
            QualityPreset::High => (40, 24),
        }
    }

    /// Segments around a wheel
    pub fn wheel_segments(&self) -> u32 {
        match self {
            QualityPreset::Low => 8,
            QualityPreset::Medium => 16,
            QualityPreset::High => 32,
        }
    }

    /// Whether the background gets the sky gradient or a flat clear
    pub fn sky_gradient(&self) -> bool {
        !matches!(self, QualityPreset::Low)
    }
}

/// Player settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Graphics quality preset
    pub quality: QualityPreset,
    /// Vertical field of view in degrees
    pub fov_degrees: f32,
    /// Impact debris
    pub sparks: bool,
    /// Show FPS counter
    pub show_fps: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            quality: QualityPreset::Medium,
            fov_degrees: 60.0,
            sparks: true,
            show_fps: true,
        }
    }
}

impl Settings {
    pub const MIN_FOV: f32 = 30.0;
    pub const MAX_FOV: f32 = 110.0;

    /// Apply a quality preset
    pub fn apply_preset(&mut self, preset: QualityPreset) {
        self.quality = preset;
        if preset == QualityPreset::Low {
            self.sparks = false;
        }
    }

    /// Field of view in radians, clamped to a usable range
    pub fn fov_radians(&self) -> f32 {
        let fov = if self.fov_degrees.is_finite() {
            self.fov_degrees
        } else {
            60.0
        };
        fov.clamp(Self::MIN_FOV, Self::MAX_FOV).to_radians()
    }

    /// Handle a settings hotkey (`KeyboardEvent.key` value).
    /// Returns true if a setting changed.
    ///
    /// - `F`: toggle the FPS counter
    /// - `K`: toggle impact sparks
    /// - `Q`: cycle the quality preset
    pub fn apply_hotkey(&mut self, key: &str) -> bool {
        match key {
            "f" | "F" => self.show_fps = !self.show_fps,
            "k" | "K" => self.sparks = !self.sparks,
            "q" | "Q" => self.apply_preset(self.quality.next()),
            _ => return false,
        }
        true
    }

    /// LocalStorage key
    const STORAGE_KEY: &'static str = "chase_drive_settings";

    /// Load settings from LocalStorage (WASM only)
    #[cfg(target_arch = "wasm32")]
    pub fn load() -> Self {
        let storage = web_sys::window()
            .and_then(|w| w.local_storage().ok())
            .flatten();

        if let Some(storage) = storage {
            if let Ok(Some(json)) = storage.get_item(Self::STORAGE_KEY) {
                match serde_json::from_str(&json) {
                    Ok(settings) => {
                        log::info!("Loaded settings from LocalStorage");
                        return settings;
                    }
                    Err(e) => log::warn!("Ignoring stored settings: {}", e),
                }
            }
        }

        log::info!("Using default settings");
        Self::default()
    }

    /// Save settings to LocalStorage (WASM only)
    #[cfg(target_arch = "wasm32")]
    pub fn save(&self) {
        let storage = web_sys::window()
            .and_then(|w| w.local_storage().ok())
            .flatten();

        if let Some(storage) = storage {
            if let Ok(json) = serde_json::to_string(self) {
                let _ = storage.set_item(Self::STORAGE_KEY, &json);
                log::info!("Settings saved");
            }
        }
    }

    /// Native stubs
    #[cfg(not(target_arch = "wasm32"))]
    pub fn load() -> Self {
        Self::default()
    }

    #[cfg(not(target_arch = "wasm32"))]
    pub fn save(&self) {
        log::debug!("Settings not persisted on native ({})", Self::STORAGE_KEY);
    }
}
