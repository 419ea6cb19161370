//! Command-line flags and the optional TOML settings file.

use std::{
    fs, io,
    path::{Path, PathBuf},
    time::Duration,
};

use clap::Parser;
use serde::Deserialize;
use thiserror::Error;
use token_trek_core::{GridFrame, TokenValue, WorldPosition};
use token_trek_system_persistence::DEFAULT_AUTOSAVE_INTERVAL;
use token_trek_world::{ValueDraw, WorldConfig};

const DEFAULT_SAVE_DIR: &str = ".token-trek";
const MAX_WINDOW_RADIUS: u32 = 64;
const VALUE_SEED_SALT: u64 = 0x9e37_79b9_7f4a_7c15;

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Walk an endless grid, collect tokens and merge equal ones",
    long_about = None
)]
pub(crate) struct Cli {
    /// TOML settings file. Flags take precedence over its values.
    #[arg(long)]
    pub(crate) config: Option<PathBuf>,
    /// Directory holding the saved session.
    #[arg(long)]
    pub(crate) save_dir: Option<PathBuf>,
    /// Seed for the world layout and token values.
    #[arg(long)]
    pub(crate) seed: Option<u64>,
    /// Cells between the player and the edge of the active window.
    #[arg(long)]
    pub(crate) radius: Option<u32>,
    /// Start with the simulated position feed driving the player.
    #[arg(long)]
    pub(crate) tracked: bool,
}

/// Failures while loading or validating settings.
#[derive(Debug, Error)]
pub(crate) enum ConfigError {
    #[error("could not read settings file {}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("could not parse settings file {}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("setting `{field}` is invalid: {reason}")]
    Invalid { field: &'static str, reason: String },
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
enum DrawPolicy {
    #[default]
    Session,
    Cell,
}

impl From<DrawPolicy> for ValueDraw {
    fn from(policy: DrawPolicy) -> Self {
        match policy {
            DrawPolicy::Session => ValueDraw::SessionStream,
            DrawPolicy::Cell => ValueDraw::CellSeeded,
        }
    }
}

#[derive(Debug, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct FileConfig {
    origin_lat: f64,
    origin_lng: f64,
    tile_degrees: f64,
    window_radius: u32,
    spawn_probability: f64,
    win_value: u32,
    world_seed: u64,
    value_seed: u64,
    value_draw: DrawPolicy,
    save_dir: Option<PathBuf>,
    autosave_secs: u64,
    tracked: bool,
}

impl Default for FileConfig {
    fn default() -> Self {
        let world = WorldConfig::default();
        let origin = world.frame.origin();
        Self {
            origin_lat: origin.lat(),
            origin_lng: origin.lng(),
            tile_degrees: world.frame.tile_degrees(),
            window_radius: world.window_radius,
            spawn_probability: world.spawn_probability,
            win_value: world.win_value,
            world_seed: world.world_seed,
            value_seed: world.value_seed,
            value_draw: DrawPolicy::default(),
            save_dir: None,
            autosave_secs: DEFAULT_AUTOSAVE_INTERVAL.as_secs(),
            tracked: false,
        }
    }
}

impl FileConfig {
    fn read(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&contents, path)
    }

    fn parse(contents: &str, path: &Path) -> Result<Self, ConfigError> {
        toml::from_str(contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Fully resolved runtime settings.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct Settings {
    pub(crate) world: WorldConfig,
    pub(crate) save_dir: PathBuf,
    pub(crate) autosave: Duration,
    pub(crate) tracked: bool,
}

impl Settings {
    pub(crate) fn load(cli: &Cli) -> Result<Self, ConfigError> {
        let file = match &cli.config {
            Some(path) => FileConfig::read(path)?,
            None => FileConfig::default(),
        };
        Self::resolve(cli, file)
    }

    fn resolve(cli: &Cli, file: FileConfig) -> Result<Self, ConfigError> {
        let (world_seed, value_seed) = match cli.seed {
            Some(seed) => (seed, seed ^ VALUE_SEED_SALT),
            None => (file.world_seed, file.value_seed),
        };
        let window_radius = cli.radius.unwrap_or(file.window_radius);

        if !(file.origin_lat.is_finite() && file.origin_lng.is_finite()) {
            return Err(invalid("origin", "coordinates must be finite"));
        }
        if !(file.tile_degrees.is_finite() && file.tile_degrees > 0.0) {
            return Err(invalid("tile_degrees", "must be a positive number"));
        }
        if !(0.0..=1.0).contains(&file.spawn_probability) {
            return Err(invalid("spawn_probability", "must lie within 0..=1"));
        }
        if window_radius > MAX_WINDOW_RADIUS {
            return Err(invalid(
                "window_radius",
                format!("must not exceed {MAX_WINDOW_RADIUS}"),
            ));
        }
        let win_value = TokenValue::new(file.win_value)
            .map_err(|error| invalid("win_value", error.to_string()))?;

        Ok(Self {
            world: WorldConfig {
                frame: GridFrame::new(
                    WorldPosition::new(file.origin_lat, file.origin_lng),
                    file.tile_degrees,
                ),
                window_radius,
                spawn_probability: file.spawn_probability,
                win_value: win_value.get(),
                world_seed,
                value_seed,
                value_draw: file.value_draw.into(),
            },
            save_dir: cli
                .save_dir
                .clone()
                .or(file.save_dir)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_SAVE_DIR)),
            autosave: Duration::from_secs(file.autosave_secs),
            tracked: cli.tracked || file.tracked,
        })
    }
}

fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cli(args: &[&str]) -> Cli {
        Cli::parse_from(std::iter::once("token-trek").chain(args.iter().copied()))
    }

    fn parse(contents: &str) -> Result<FileConfig, ConfigError> {
        FileConfig::parse(contents, Path::new("settings.toml"))
    }

    #[test]
    fn no_flags_and_no_file_reproduce_world_defaults() {
        let settings = Settings::resolve(&cli(&[]), FileConfig::default()).expect("valid");

        assert_eq!(settings.world, WorldConfig::default());
        assert_eq!(settings.save_dir, PathBuf::from(DEFAULT_SAVE_DIR));
        assert_eq!(settings.autosave, DEFAULT_AUTOSAVE_INTERVAL);
        assert!(!settings.tracked);
    }

    #[test]
    fn file_values_fill_in_and_flags_win() {
        let file = parse(
            r#"
            window_radius = 3
            spawn_probability = 0.25
            win_value = 64
            value_draw = "cell"
            save_dir = "from-file"
            autosave_secs = 30
            "#,
        )
        .expect("parses");
        let settings = Settings::resolve(
            &cli(&["--radius", "5", "--save-dir", "from-flag", "--seed", "9"]),
            file,
        )
        .expect("valid");

        assert_eq!(settings.world.window_radius, 5);
        assert_eq!(settings.world.spawn_probability, 0.25);
        assert_eq!(settings.world.win_value, 64);
        assert_eq!(settings.world.value_draw, ValueDraw::CellSeeded);
        assert_eq!(settings.world.world_seed, 9);
        assert_ne!(settings.world.value_seed, 9);
        assert_eq!(settings.save_dir, PathBuf::from("from-flag"));
        assert_eq!(settings.autosave, Duration::from_secs(30));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(matches!(
            parse("radius = 3"),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn win_value_must_be_a_power_of_two() {
        let file = parse("win_value = 100").expect("parses");
        let error = Settings::resolve(&cli(&[]), file).expect_err("rejected");

        assert!(matches!(
            error,
            ConfigError::Invalid {
                field: "win_value",
                ..
            }
        ));
    }

    #[test]
    fn out_of_range_probability_is_rejected() {
        let file = parse("spawn_probability = 1.5").expect("parses");
        assert!(Settings::resolve(&cli(&[]), file).is_err());
    }

    #[test]
    fn missing_file_reports_its_path() {
        let error = Settings::load(&cli(&["--config", "/nonexistent/settings.toml"]))
            .expect_err("missing file");

        assert!(error.to_string().contains("/nonexistent/settings.toml"));
    }
}
