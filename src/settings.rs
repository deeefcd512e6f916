use std::path::PathBuf;

use log::{info, warn};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DrawSettings {
    #[serde(default = "DrawSettings::default_backend")]
    pub backend: String,
    #[serde(default = "DrawSettings::default_shadow_map_size")]
    pub shadow_map_size: u32,
    /// Directory for linked program binaries; `None` disables the cache.
    #[serde(default)]
    pub program_cache_dir: Option<PathBuf>,
    #[serde(default = "DrawSettings::default_shadow_cast_alpha_threshold")]
    pub shadow_cast_alpha_threshold: f32,
    #[serde(default = "DrawSettings::default_max_prim_vertices")]
    pub max_prim_vertices: u32,
    #[serde(default = "DrawSettings::default_max_prim_indices")]
    pub max_prim_indices: u32,
    #[serde(default = "DrawSettings::default_msaa")]
    pub msaa: bool,
}

impl Default for DrawSettings {
    fn default() -> Self {
        Self {
            backend: Self::default_backend(),
            shadow_map_size: Self::default_shadow_map_size(),
            program_cache_dir: None,
            shadow_cast_alpha_threshold: Self::default_shadow_cast_alpha_threshold(),
            max_prim_vertices: Self::default_max_prim_vertices(),
            max_prim_indices: Self::default_max_prim_indices(),
            msaa: Self::default_msaa(),
        }
    }
}

impl DrawSettings {
    pub fn load() -> Self {
        Self::load_from_path("draw_settings.json")
    }

    pub fn load_from_path<P: AsRef<std::path::Path>>(path: P) -> Self {
        use std::fs;

        let path = path.as_ref();
        match fs::read_to_string(path) {
            Ok(contents) => match serde_json::from_str::<DrawSettings>(&contents) {
                Ok(settings) => {
                    info!("Loaded draw settings from {:?}", path);
                    settings.validate()
                }
                Err(err) => {
                    warn!(
                        "Failed to parse {:?} ({}). Falling back to default draw settings.",
                        path, err
                    );
                    DrawSettings::default()
                }
            },
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                info!("Draw settings file {:?} not found. Using default settings.", path);
                DrawSettings::default()
            }
            Err(err) => {
                warn!(
                    "Failed to read {:?} ({}). Falling back to default draw settings.",
                    path, err
                );
                DrawSettings::default()
            }
        }
    }

    pub(crate) fn validate(mut self) -> Self {
        if self.backend.trim().is_empty() {
            warn!("Backend name is empty. Using {:?}.", Self::default_backend());
            self.backend = Self::default_backend();
        }

        if self.shadow_map_size == 0 || !self.shadow_map_size.is_power_of_two() {
            warn!(
                "Shadow map size {} must be a non-zero power of two. Using default value.",
                self.shadow_map_size
            );
            self.shadow_map_size = Self::default_shadow_map_size();
        }

        if !(0.0..=1.0).contains(&self.shadow_cast_alpha_threshold) {
            warn!("Shadow cast alpha threshold must lie in [0, 1]. Using default value.");
            self.shadow_cast_alpha_threshold = Self::default_shadow_cast_alpha_threshold();
        }

        if self.max_prim_vertices == 0 || self.max_prim_indices == 0 {
            warn!("Primitive buffer limits must be greater than zero. Using defaults.");
            self.max_prim_vertices = Self::default_max_prim_vertices();
            self.max_prim_indices = Self::default_max_prim_indices();
        }

        self
    }

    fn default_backend() -> String {
        "ogl".to_string()
    }

    const fn default_shadow_map_size() -> u32 {
        2048
    }

    const fn default_shadow_cast_alpha_threshold() -> f32 {
        0.5
    }

    const fn default_max_prim_vertices() -> u32 {
        4096
    }

    const fn default_max_prim_indices() -> u32 {
        8192
    }

    const fn default_msaa() -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_take_defaults() {
        let settings: DrawSettings = serde_json::from_str(r#"{ "backend": "null" }"#).unwrap();
        assert_eq!(settings.backend, "null");
        assert_eq!(settings.shadow_map_size, 2048);
        assert!(settings.program_cache_dir.is_none());
        assert!(settings.msaa);
    }

    #[test]
    fn validate_repairs_bad_values() {
        let settings = DrawSettings {
            backend: "  ".into(),
            shadow_map_size: 1000,
            shadow_cast_alpha_threshold: 3.0,
            max_prim_vertices: 0,
            ..DrawSettings::default()
        }
        .validate();
        assert_eq!(settings.backend, "ogl");
        assert_eq!(settings.shadow_map_size, 2048);
        assert_eq!(settings.shadow_cast_alpha_threshold, 0.5);
        assert_eq!(settings.max_prim_vertices, 4096);
    }

    #[test]
    fn absent_file_yields_defaults() {
        let settings = DrawSettings::load_from_path("does/not/exist.json");
        assert_eq!(settings.shadow_map_size, 2048);
    }

    #[test]
    fn malformed_file_yields_defaults() {
        let path = std::env::temp_dir().join("gl_batch_bad_settings.json");
        std::fs::write(&path, "{ not json").unwrap();
        let settings = DrawSettings::load_from_path(&path);
        assert_eq!(settings.backend, "ogl");
        let _ = std::fs::remove_file(&path);
    }
}
