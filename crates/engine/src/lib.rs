use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

pub mod app;
pub mod content;
mod image_paths;

pub use app::{
    compute_visible_window, run_app, run_app_with_metrics, screen_to_world, world_to_screen,
    Actor, ActorState, AppError, DrawSurface, Drawable, DrawableKind, GridPos, InputAction,
    InputSnapshot, IsoProjection, LoopConfig, LoopMetricsSnapshot, MetricsHandle, RenderList,
    Renderer, Scene, SceneCommand, SceneWorld, ScrollCamera, SortKeyRules, Tile, TileKey,
    TileSprite, TileStore, Vec2, Viewport, VisibleWindow, WindowMargins,
    ACTOR_ARRIVAL_THRESHOLD, DEFAULT_PROJECTION_ORIGIN_Y, SLOW_FRAME_ENV_VAR,
};
pub use content::{
    load_tmx_map, GridMap, ImageId, ImageRegistry, ImageSource, MapErrorCode, MapLoadError,
    MapSource, PixelRect, SourceLocation, TmxMap, OUTLINE_TINT,
};

pub use image_paths::{validate_image_path, ImagePathError};

pub const ROOT_ENV_VAR: &str = "ISO_ROOT";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppPaths {
    pub root: PathBuf,
    pub assets_dir: PathBuf,
    pub maps_dir: PathBuf,
}

impl AppPaths {
    pub fn for_root(root: PathBuf) -> Self {
        let assets_dir = root.join("assets");
        let maps_dir = assets_dir.join("maps");
        Self {
            root,
            assets_dir,
            maps_dir,
        }
    }
}

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("cannot read {var}: {source}")]
    EnvVar {
        var: &'static str,
        #[source]
        source: env::VarError,
    },
    #[error("cannot locate the running executable: {0}")]
    CurrentExe(#[source] std::io::Error),
    #[error("executable path {0} has no parent directory")]
    ExeHasNoParent(PathBuf),
    #[error(
        "{var}={path} is not a project root (expected Cargo.toml next to crates/ or assets/)"
    )]
    InvalidEnvRoot { var: &'static str, path: PathBuf },
    #[error(
        "no project root found above {start_dir} (expected Cargo.toml next to crates/ or assets/); \
set {var} to the project directory"
    )]
    RootNotFound {
        start_dir: PathBuf,
        var: &'static str,
    },
}

pub fn resolve_app_paths() -> Result<AppPaths, StartupError> {
    let root = resolve_root(env::var(ROOT_ENV_VAR), env::current_exe)?;
    Ok(AppPaths::for_root(root))
}

fn resolve_root(
    env_value: Result<String, env::VarError>,
    current_exe: impl FnOnce() -> std::io::Result<PathBuf>,
) -> Result<PathBuf, StartupError> {
    match env_value {
        Ok(value) => {
            let path = canonical_or_raw(Path::new(&value));
            if looks_like_project_root(&path) {
                Ok(path)
            } else {
                Err(StartupError::InvalidEnvRoot {
                    var: ROOT_ENV_VAR,
                    path,
                })
            }
        }
        Err(env::VarError::NotPresent) => {
            let exe = current_exe().map_err(StartupError::CurrentExe)?;
            let start_dir = exe
                .parent()
                .ok_or_else(|| StartupError::ExeHasNoParent(exe.clone()))?;
            start_dir
                .ancestors()
                .find(|candidate| looks_like_project_root(candidate))
                .map(canonical_or_raw)
                .ok_or_else(|| StartupError::RootNotFound {
                    start_dir: canonical_or_raw(start_dir),
                    var: ROOT_ENV_VAR,
                })
        }
        Err(source) => Err(StartupError::EnvVar {
            var: ROOT_ENV_VAR,
            source,
        }),
    }
}

fn looks_like_project_root(path: &Path) -> bool {
    path.join("Cargo.toml").is_file()
        && (path.join("crates").is_dir() || path.join("assets").is_dir())
}

fn canonical_or_raw(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn project_dir() -> TempDir {
        let temp = TempDir::new().expect("temp");
        fs::write(temp.path().join("Cargo.toml"), "[workspace]\n").expect("write");
        fs::create_dir_all(temp.path().join("assets/maps")).expect("mkdir");
        temp
    }

    #[test]
    fn project_root_needs_cargo_toml_and_a_content_dir() {
        let temp = TempDir::new().expect("temp");
        fs::write(temp.path().join("Cargo.toml"), "[workspace]\n").expect("write");
        assert!(!looks_like_project_root(temp.path()));
        fs::create_dir_all(temp.path().join("crates")).expect("mkdir");
        assert!(looks_like_project_root(temp.path()));
        assert!(!looks_like_project_root(&temp.path().join("crates")));
    }

    #[test]
    fn env_root_wins_when_valid() {
        let project = project_dir();
        let raw = project.path().to_string_lossy().into_owned();
        let root = resolve_root(Ok(raw), || panic!("exe lookup not needed")).expect("root");
        assert_eq!(root, canonical_or_raw(project.path()));
    }

    #[test]
    fn invalid_env_root_is_an_error() {
        let temp = TempDir::new().expect("temp");
        let raw = temp.path().to_string_lossy().into_owned();
        let err = resolve_root(Ok(raw), || panic!("exe lookup not needed")).expect_err("invalid");
        assert!(matches!(err, StartupError::InvalidEnvRoot { .. }));
        assert!(err.to_string().contains(ROOT_ENV_VAR));
    }

    #[test]
    fn root_is_found_above_the_executable() {
        let project = project_dir();
        let exe_dir = project.path().join("target/debug");
        fs::create_dir_all(&exe_dir).expect("mkdir");
        let exe = exe_dir.join("iso_game");
        let root = resolve_root(Err(env::VarError::NotPresent), || Ok(exe)).expect("root");
        assert_eq!(root, canonical_or_raw(project.path()));
    }

    #[test]
    fn missing_root_names_the_env_var() {
        let temp = TempDir::new().expect("temp");
        let exe = temp.path().join("bin/iso_game");
        let err =
            resolve_root(Err(env::VarError::NotPresent), || Ok(exe)).expect_err("no root");
        assert!(matches!(err, StartupError::RootNotFound { .. }));
        assert!(err.to_string().contains(ROOT_ENV_VAR));
    }

    #[test]
    fn app_paths_place_maps_under_assets() {
        let paths = AppPaths::for_root(PathBuf::from("/srv/iso"));
        assert_eq!(paths.assets_dir, PathBuf::from("/srv/iso/assets"));
        assert_eq!(paths.maps_dir, PathBuf::from("/srv/iso/assets/maps"));
    }
}
