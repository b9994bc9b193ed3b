// SPDX-License-Identifier: CEPL-1.0
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use easyvk_platform::WindowConfig;
use easyvk_render::RenderSize;
use easyvk_render_vk::ShaderPaths;
use serde::Deserialize;
use tracing::{info, warn};

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct WindowCfg {
    pub width: u32,
    pub height: u32,
    pub title: String,
    pub fullscreen: bool,
    pub resizable: bool,
}

impl Default for WindowCfg {
    fn default() -> Self {
        WindowCfg {
            width: 1280,
            height: 720,
            title: "EasyVK".to_owned(),
            fullscreen: false,
            resizable: true,
        }
    }
}

impl WindowCfg {
    pub fn to_window_config(&self) -> WindowConfig {
        WindowConfig {
            title: self.title.clone(),
            size: RenderSize::new(self.width.max(1), self.height.max(1)),
            fullscreen: self.fullscreen,
            resizable: self.resizable,
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct RenderCfg {
    /// FIFO when true; MAILBOX (if offered) when false.
    pub limit_frame_rate: bool,
    pub clear_color: [f32; 4],
    pub vertex_shader: Option<PathBuf>,
    pub fragment_shader: Option<PathBuf>,
}

impl Default for RenderCfg {
    fn default() -> Self {
        RenderCfg {
            limit_frame_rate: true,
            clear_color: [0.0, 0.0, 0.0, 1.0],
            vertex_shader: None,
            fragment_shader: None,
        }
    }
}

impl RenderCfg {
    pub fn shader_paths(&self) -> ShaderPaths {
        let bundled = ShaderPaths::default();
        ShaderPaths {
            vertex: self.vertex_shader.clone().unwrap_or(bundled.vertex),
            fragment: self.fragment_shader.clone().unwrap_or(bundled.fragment),
        }
    }
}

#[derive(Debug, Deserialize, Default, Clone, PartialEq)]
pub struct AppCfg {
    #[serde(default)]
    pub window: WindowCfg,
    #[serde(default)]
    pub render: RenderCfg,
}

pub fn parse_cfg(src: &str) -> Result<AppCfg> {
    toml::from_str::<AppCfg>(src).context("invalid config")
}

/// A missing file means defaults; a malformed one is reported and ignored.
pub fn load_cfg(path: &Path) -> AppCfg {
    match fs::read_to_string(path) {
        Ok(s) => match parse_cfg(&s) {
            Ok(cfg) => {
                info!("config loaded from {}", path.display());
                cfg
            }
            Err(e) => {
                warn!("{}: {e:#}; using defaults", path.display());
                AppCfg::default()
            }
        },
        Err(_) => AppCfg::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        let cfg = parse_cfg("").unwrap();
        assert_eq!(cfg, AppCfg::default());
        assert_eq!((cfg.window.width, cfg.window.height), (1280, 720));
        assert!(cfg.render.limit_frame_rate);
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let cfg = parse_cfg(
            r#"
            [window]
            title = "tri"
            fullscreen = true

            [render]
            limit_frame_rate = false
            clear_color = [0.1, 0.2, 0.3, 1.0]
            "#,
        )
        .unwrap();
        assert_eq!(cfg.window.title, "tri");
        assert!(cfg.window.fullscreen);
        assert_eq!(cfg.window.width, 1280);
        assert!(cfg.window.resizable);
        assert!(!cfg.render.limit_frame_rate);
        assert_eq!(cfg.render.clear_color, [0.1, 0.2, 0.3, 1.0]);
    }

    #[test]
    fn malformed_config_is_an_error() {
        assert!(parse_cfg("[window]\nwidth = \"wide\"").is_err());
    }

    #[test]
    fn missing_file_gives_defaults() {
        let cfg = load_cfg(Path::new("definitely/not/here/easyvk.toml"));
        assert_eq!(cfg, AppCfg::default());
    }

    #[test]
    fn shader_overrides_replace_only_what_is_set() {
        let cfg = parse_cfg("[render]\nvertex_shader = \"my.vert.spv\"").unwrap();
        let paths = cfg.render.shader_paths();
        assert_eq!(paths.vertex, PathBuf::from("my.vert.spv"));
        assert_eq!(paths.fragment, ShaderPaths::default().fragment);
    }

    #[test]
    fn zero_sized_window_is_clamped() {
        let w = WindowCfg {
            width: 0,
            ..WindowCfg::default()
        };
        assert_eq!(w.to_window_config().size, RenderSize::new(1, 720));
    }
}
