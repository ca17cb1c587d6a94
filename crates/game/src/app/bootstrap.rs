use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use engine::{
    load_tmx_map, resolve_app_paths, validate_image_path, ImageSource, LoopConfig, MapLoadError,
    Scene, SceneWorld, StartupError, Vec2, Viewport,
};
use serde::Deserialize;
use thiserror::Error;
use tracing::info;
use tracing_subscriber::EnvFilter;

use super::demo_scene::{DemoScene, DemoSceneConfig};

pub(crate) const SETTINGS_FILE: &str = "settings.json";

pub(crate) struct AppWiring {
    pub(crate) config: LoopConfig,
    pub(crate) world: SceneWorld,
    pub(crate) scene: Box<dyn Scene>,
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub(crate) struct SettingsVec2 {
    pub(crate) x: f32,
    pub(crate) y: f32,
}

impl From<SettingsVec2> for Vec2 {
    fn from(value: SettingsVec2) -> Self {
        Vec2 {
            x: value.x,
            y: value.y,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct DemoSettings {
    pub(crate) window_title: String,
    pub(crate) window_width: u32,
    pub(crate) window_height: u32,
    pub(crate) target_tps: u32,
    pub(crate) map: String,
    pub(crate) player_image: String,
    pub(crate) player_start: SettingsVec2,
    pub(crate) player_feet_offset: SettingsVec2,
    pub(crate) walk_speed: f32,
    pub(crate) view_offset: SettingsVec2,
    pub(crate) scroll_speed: f32,
}

impl Default for DemoSettings {
    fn default() -> Self {
        Self {
            window_title: "Isometric Renderer".to_string(),
            window_width: 800,
            window_height: 600,
            target_tps: 60,
            map: "maps/test_map.tmx".to_string(),
            player_image: "player.png".to_string(),
            player_start: SettingsVec2 {
                x: -96.0,
                y: 1349.0,
            },
            player_feet_offset: SettingsVec2 { x: 32.0, y: 64.0 },
            walk_speed: 100.0,
            view_offset: SettingsVec2 {
                x: 332.0,
                y: -1100.0,
            },
            scroll_speed: 300.0,
        }
    }
}

#[derive(Debug, Error)]
pub(crate) enum SettingsError {
    #[error("failed to read settings file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse settings file {path} at {json_path}: {source}")]
    Parse {
        path: PathBuf,
        json_path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid settings value in {path}: {field}: {message}")]
    Invalid {
        path: PathBuf,
        field: &'static str,
        message: String,
    },
}

#[derive(Debug, Error)]
pub(crate) enum BootstrapError {
    #[error(transparent)]
    Startup(#[from] StartupError),
    #[error(transparent)]
    Settings(#[from] SettingsError),
    #[error(transparent)]
    Map(#[from] MapLoadError),
}

pub(crate) fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_names(true)
        .compact()
        .init();
}

pub(crate) fn build_app() -> Result<AppWiring, BootstrapError> {
    info!("=== Isometric Renderer Startup ===");
    let paths = resolve_app_paths()?;
    let settings = load_demo_settings(&paths.assets_dir.join(SETTINGS_FILE))?;
    build_app_from_assets(&paths.assets_dir, settings)
}

pub(crate) fn build_app_from_assets(
    assets_dir: &Path,
    settings: DemoSettings,
) -> Result<AppWiring, BootstrapError> {
    let map = load_tmx_map(&assets_dir.join(&settings.map))?;
    let viewport = Viewport {
        width: settings.window_width,
        height: settings.window_height,
    };
    let mut world = SceneWorld::from_map(&map, viewport);
    let player_image = world.register_image(ImageSource::file(
        assets_dir.join(&settings.player_image),
    ));

    let scene = DemoScene::new(DemoSceneConfig {
        player_image,
        player_start: settings.player_start.into(),
        player_feet_offset: settings.player_feet_offset.into(),
        walk_speed: settings.walk_speed,
        view_offset: settings.view_offset.into(),
        scroll_speed: settings.scroll_speed,
    });
    let config = LoopConfig {
        window_title: settings.window_title,
        window_width: settings.window_width,
        window_height: settings.window_height,
        target_tps: settings.target_tps,
        ..LoopConfig::default()
    };

    Ok(AppWiring {
        config,
        world,
        scene: Box::new(scene),
    })
}

pub(crate) fn load_demo_settings(path: &Path) -> Result<DemoSettings, SettingsError> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(error) if error.kind() == io::ErrorKind::NotFound => {
            info!(path = %path.display(), "settings_file_missing_using_defaults");
            return Ok(DemoSettings::default());
        }
        Err(source) => {
            return Err(SettingsError::Read {
                path: path.to_path_buf(),
                source,
            })
        }
    };
    let settings = parse_settings_json(&raw, path)?;
    validate_settings(&settings, path)?;
    info!(
        path = %path.display(),
        map = %settings.map,
        window_width = settings.window_width,
        window_height = settings.window_height,
        "settings_loaded"
    );
    Ok(settings)
}

fn parse_settings_json(raw: &str, path: &Path) -> Result<DemoSettings, SettingsError> {
    let mut deserializer = serde_json::Deserializer::from_str(raw);
    serde_path_to_error::deserialize::<_, DemoSettings>(&mut deserializer).map_err(|error| {
        let json_path = error.path().to_string();
        SettingsError::Parse {
            path: path.to_path_buf(),
            json_path,
            source: error.into_inner(),
        }
    })
}

fn validate_settings(settings: &DemoSettings, path: &Path) -> Result<(), SettingsError> {
    let invalid = |field: &'static str, message: String| SettingsError::Invalid {
        path: path.to_path_buf(),
        field,
        message,
    };

    if settings.window_width == 0 || settings.window_height == 0 {
        return Err(invalid(
            "window_width/window_height",
            "window dimensions must be positive".to_string(),
        ));
    }
    if settings.target_tps == 0 {
        return Err(invalid("target_tps", "must be positive".to_string()));
    }
    validate_image_path(&settings.player_image)
        .map_err(|error| invalid("player_image", error.to_string()))?;
    let map_path = Path::new(&settings.map);
    let is_tmx = map_path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("tmx"));
    if map_path.is_absolute() || !is_tmx {
        return Err(invalid(
            "map",
            format!("expected a relative .tmx path, got '{}'", settings.map),
        ));
    }
    if !settings.walk_speed.is_finite() || settings.walk_speed <= 0.0 {
        return Err(invalid("walk_speed", "must be finite and positive".to_string()));
    }
    if !settings.scroll_speed.is_finite() || settings.scroll_speed < 0.0 {
        return Err(invalid(
            "scroll_speed",
            "must be finite and non-negative".to_string(),
        ));
    }
    for (field, value) in [
        ("player_start", settings.player_start),
        ("player_feet_offset", settings.player_feet_offset),
        ("view_offset", settings.view_offset),
    ] {
        if !value.x.is_finite() || !value.y.is_finite() {
            return Err(invalid(field, "coordinates must be finite".to_string()));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn settings_path() -> PathBuf {
        PathBuf::from("/assets/settings.json")
    }

    const TEST_MAP: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<map version="1.10" orientation="isometric" renderorder="right-down" width="3" height="2" tilewidth="64" tileheight="32" infinite="0">
 <tileset firstgid="1" name="iso" tilewidth="64" tileheight="64" tilecount="8" columns="4">
  <image source="iso_tiles.png" width="256" height="128"/>
 </tileset>
 <layer id="1" name="ground" width="3" height="2">
  <data encoding="csv">
1,1,1,
1,1,1
</data>
 </layer>
</map>"#;

    #[test]
    fn missing_file_yields_defaults() {
        let temp = TempDir::new().expect("temp");
        let settings = load_demo_settings(&temp.path().join(SETTINGS_FILE)).expect("defaults");
        assert_eq!(settings, DemoSettings::default());
        assert_eq!(settings.view_offset, SettingsVec2 { x: 332.0, y: -1100.0 });
    }

    #[test]
    fn partial_file_keeps_remaining_defaults() {
        let settings =
            parse_settings_json(r#"{"scroll_speed": 150.0, "window_width": 1024}"#, &settings_path())
                .expect("parse");
        assert_eq!(settings.scroll_speed, 150.0);
        assert_eq!(settings.window_width, 1024);
        assert_eq!(settings.window_height, 600);
        assert_eq!(settings.map, "maps/test_map.tmx");
    }

    #[test]
    fn parse_error_reports_json_path() {
        let err = parse_settings_json(r#"{"player_start": {"x": 1.0, "y": "up"}}"#, &settings_path())
            .expect_err("type error");
        match &err {
            SettingsError::Parse { json_path, .. } => assert_eq!(json_path, "player_start.y"),
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(err.to_string().contains("player_start.y"));
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let err = parse_settings_json(r#"{"scrol_speed": 10.0}"#, &settings_path())
            .expect_err("unknown field");
        assert!(matches!(err, SettingsError::Parse { .. }));
    }

    #[test]
    fn validation_rejects_bad_values() {
        let cases: [(&str, fn(&mut DemoSettings)); 5] = [
            ("player_image", |s| s.player_image = "player.bmp".to_string()),
            ("map", |s| s.map = "/abs/map.tmx".to_string()),
            ("walk_speed", |s| s.walk_speed = 0.0),
            ("scroll_speed", |s| s.scroll_speed = f32::NAN),
            ("target_tps", |s| s.target_tps = 0),
        ];
        for (expected_field, mutate) in cases {
            let mut settings = DemoSettings::default();
            mutate(&mut settings);
            match validate_settings(&settings, &settings_path()) {
                Err(SettingsError::Invalid { field, .. }) => assert_eq!(field, expected_field),
                other => panic!("{expected_field}: unexpected {other:?}"),
            }
        }
        assert!(validate_settings(&DemoSettings::default(), &settings_path()).is_ok());
    }

    #[test]
    fn settings_file_is_read_and_validated() {
        let temp = TempDir::new().expect("temp");
        let path = temp.path().join(SETTINGS_FILE);
        fs::write(&path, r#"{"walk_speed": -5.0}"#).expect("write");
        assert!(matches!(
            load_demo_settings(&path),
            Err(SettingsError::Invalid {
                field: "walk_speed",
                ..
            })
        ));

        fs::write(&path, r#"{"walk_speed": 80.0}"#).expect("write");
        assert_eq!(load_demo_settings(&path).expect("load").walk_speed, 80.0);
    }

    #[test]
    fn app_is_wired_from_assets_dir() {
        let temp = TempDir::new().expect("temp");
        fs::create_dir_all(temp.path().join("maps")).expect("mkdir");
        fs::write(temp.path().join("maps/test_map.tmx"), TEST_MAP).expect("write map");

        let app = build_app_from_assets(temp.path(), DemoSettings::default()).expect("wire");
        assert_eq!(app.config.window_width, 800);
        assert_eq!(app.config.window_title, "Isometric Renderer");
        assert_eq!(app.world.tiles().occupied_count(), 6);
        assert_eq!(app.world.camera().viewport.width, 800);
        let player = app
            .world
            .images()
            .iter()
            .find(|(_, source)| source.path.ends_with("player.png"));
        assert!(player.is_some());
    }

    #[test]
    fn missing_map_is_a_map_error() {
        let temp = TempDir::new().expect("temp");
        let err = build_app_from_assets(temp.path(), DemoSettings::default())
            .err()
            .expect("map error");
        assert!(matches!(err, BootstrapError::Map(_)));
    }
}
