use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Overlay placement configuration stored as JSON next to the executable,
/// so users can edit it in place.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlacementConfig {
    /// Image file, relative to the executable directory or absolute.
    pub image_file: String,
    /// Scale factor applied to the image before compositing.
    pub scale: f64,
    /// Uniform opacity multiplier, 0.0 (invisible) to 1.0 (per-pixel alpha only).
    pub opacity: f64,
    /// Anchor point as a fraction of screen width, 0.0 to 1.0.
    pub x_frac: f64,
    /// Anchor point as a fraction of screen height, 0.0 to 1.0.
    pub y_frac: f64,
    /// Long/short screen-dimension ratio filter (e.g. 1.78); 0 disables.
    #[serde(default)]
    pub aspect_filter: f64,
    /// Keep the image's physical position when the screen rotates.
    #[serde(default)]
    pub rotate_lock: bool,
    /// Rebuild the overlay every this many seconds; 0 disables the timer.
    #[serde(default)]
    pub renew_secs: u64,
}

impl Default for PlacementConfig {
    fn default() -> Self {
        Self {
            image_file: "Cross.png".into(),
            scale: 2.0,
            opacity: 0.4,
            x_frac: 0.5,
            y_frac: 0.5,
            aspect_filter: 0.0,
            rotate_lock: false,
            renew_secs: 60,
        }
    }
}

impl PlacementConfig {
    /// Reject values the overlay pipeline cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.image_file.is_empty() {
            bail!("image_file is not set");
        }
        if !(self.scale > 0.0 && self.scale.is_finite()) {
            bail!("scale must be a positive number, got {}", self.scale);
        }
        if !(0.0..=1.0).contains(&self.opacity) {
            bail!("opacity must be within 0..=1, got {}", self.opacity);
        }
        if !(0.0..=1.0).contains(&self.x_frac) || !(0.0..=1.0).contains(&self.y_frac) {
            bail!(
                "x_frac/y_frac must be within 0..=1, got ({}, {})",
                self.x_frac,
                self.y_frac
            );
        }
        if !(self.aspect_filter >= 0.0 && self.aspect_filter.is_finite()) {
            bail!("aspect_filter must be >= 0, got {}", self.aspect_filter);
        }
        Ok(())
    }

    /// True when display-configuration changes can affect the computed
    /// position or visibility, so a geometry-change trigger is worth wiring.
    pub fn tracks_display_changes(&self) -> bool {
        self.rotate_lock || self.aspect_filter > 0.0
    }

    /// Resolve the configured image file against the executable directory.
    pub fn image_path(&self) -> PathBuf {
        let path = Path::new(&self.image_file);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            exe_dir().join(path)
        }
    }
}

fn exe_dir() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(Path::to_path_buf))
        .unwrap_or_else(|| PathBuf::from("."))
}

pub fn config_path() -> PathBuf {
    exe_dir().join("DesktopImage.json")
}

/// Load the config file, or write the defaults to disk on first run so the
/// user has something to edit.
pub fn load_or_init(path: &Path) -> Result<PlacementConfig> {
    let config = if path.exists() {
        let data = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        serde_json::from_str(&data)
            .with_context(|| format!("malformed config file {}", path.display()))?
    } else {
        let defaults = PlacementConfig::default();
        tracing::info!(path = %path.display(), "config not found, writing defaults");
        if let Some(parent) = path.parent() {
            let _ = fs::create_dir_all(parent);
        }
        let data = serde_json::to_string_pretty(&defaults)?;
        fs::write(path, data)
            .with_context(|| format!("failed to write default config {}", path.display()))?;
        defaults
    };
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(PlacementConfig::default().validate().is_ok());
    }

    #[test]
    fn validation_rejects_bad_fields() {
        let mut cfg = PlacementConfig::default();
        cfg.scale = 0.0;
        assert!(cfg.validate().is_err());

        let mut cfg = PlacementConfig::default();
        cfg.opacity = 1.5;
        assert!(cfg.validate().is_err());

        let mut cfg = PlacementConfig::default();
        cfg.x_frac = -0.1;
        assert!(cfg.validate().is_err());

        let mut cfg = PlacementConfig::default();
        cfg.aspect_filter = -1.0;
        assert!(cfg.validate().is_err());

        let mut cfg = PlacementConfig::default();
        cfg.image_file.clear();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn missing_file_writes_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("DesktopImage.json");

        let cfg = load_or_init(&path).unwrap();
        assert_eq!(cfg.image_file, "Cross.png");
        assert!(path.exists());

        // Second load reads the file that was just written.
        let again = load_or_init(&path).unwrap();
        assert_eq!(again.scale, cfg.scale);
    }

    #[test]
    fn partial_file_uses_field_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("DesktopImage.json");
        fs::write(
            &path,
            r#"{"image_file":"logo.png","scale":1.0,"opacity":0.8,"x_frac":0.1,"y_frac":0.9}"#,
        )
        .unwrap();

        let cfg = load_or_init(&path).unwrap();
        assert_eq!(cfg.image_file, "logo.png");
        assert_eq!(cfg.aspect_filter, 0.0);
        assert!(!cfg.rotate_lock);
        assert_eq!(cfg.renew_secs, 0);
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("DesktopImage.json");
        fs::write(&path, "not json").unwrap();
        assert!(load_or_init(&path).is_err());
    }

    #[test]
    fn display_change_tracking() {
        let mut cfg = PlacementConfig::default();
        assert!(!cfg.tracks_display_changes());
        cfg.rotate_lock = true;
        assert!(cfg.tracks_display_changes());
        cfg.rotate_lock = false;
        cfg.aspect_filter = 1.78;
        assert!(cfg.tracks_display_changes());
    }
}
