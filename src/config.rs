//! Viewer configuration
//!
//! Defaults reproduce the stock two-level demo; every path and the window size
//! can be overridden on the command line.

use std::{ffi::OsString, path::PathBuf};

use cgmath::{Deg, Point3};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};

use crate::gfx::constants::LightConfig;

#[derive(Clone, Debug, PartialEq)]
pub struct ViewerConfig {
    pub width: u32,
    pub height: u32,
    pub clear_color: [f64; 4],
    pub eye: Point3<f32>,
    pub target: Point3<f32>,
    pub fov_y: Deg<f32>,
    pub near: f32,
    pub far: f32,
    /// Camera speed in world units per second.
    pub speed: f32,
    pub light: LightConfig,
    /// Level files selectable with the number keys, `1` first.
    pub levels: Vec<PathBuf>,
    /// Folder holding the `.h2b` files the levels reference.
    pub models: PathBuf,
    pub log_file: Option<PathBuf>,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            width: 1000,
            height: 800,
            clear_color: [57.0 / 255.0, 0.6, 0.8, 1.0],
            eye: Point3::new(0.0, 8.0, -18.0),
            target: Point3::new(0.0, 0.0, 0.0),
            fov_y: Deg(65.0),
            near: 0.1,
            far: 100.0,
            speed: 3.0,
            light: LightConfig::default(),
            levels: vec![
                PathBuf::from("Levels/GameLevelOne.txt"),
                PathBuf::from("Levels/GameLevelTwo.txt"),
            ],
            models: PathBuf::from("Models"),
            log_file: None,
        }
    }
}

fn command() -> Command {
    Command::new("level-viewer")
        .about("Renders Blender level exports built from H2B meshes")
        .arg(
            Arg::new("level")
                .long("level")
                .short('l')
                .help("Level file; repeat to bind levels to keys 1..9")
                .action(ArgAction::Append)
                .value_parser(value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("models")
                .long("models")
                .short('m')
                .help("Folder containing the .h2b mesh assets")
                .value_parser(value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("log-file")
                .long("log-file")
                .help("Mirror the log into this file")
                .value_parser(value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("width")
                .long("width")
                .value_parser(value_parser!(u32).range(1..)),
        )
        .arg(
            Arg::new("height")
                .long("height")
                .value_parser(value_parser!(u32).range(1..)),
        )
}

impl ViewerConfig {
    /// Parses process arguments, exiting with usage on error.
    pub fn from_args() -> Self {
        Self::from_matches(&command().get_matches())
    }

    pub fn try_from_args<I, T>(args: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        Ok(Self::from_matches(&command().try_get_matches_from(args)?))
    }

    fn from_matches(matches: &ArgMatches) -> Self {
        let mut config = Self::default();
        if let Some(levels) = matches.get_many::<PathBuf>("level") {
            config.levels = levels.cloned().collect();
        }
        if let Some(models) = matches.get_one::<PathBuf>("models") {
            config.models = models.clone();
        }
        config.log_file = matches.get_one::<PathBuf>("log-file").cloned();
        if let Some(&width) = matches.get_one::<u32>("width") {
            config.width = width;
        }
        if let Some(&height) = matches.get_one::<u32>("height") {
            config.height = height;
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_without_arguments() {
        let config = ViewerConfig::try_from_args(["level-viewer"]).unwrap();
        assert_eq!(config, ViewerConfig::default());
        assert_eq!(config.levels.len(), 2);
        assert_eq!(config.models, PathBuf::from("Models"));
    }

    #[test]
    fn test_overrides() {
        let config = ViewerConfig::try_from_args([
            "level-viewer",
            "--level",
            "a.txt",
            "-l",
            "b.txt",
            "--level",
            "c.txt",
            "--models",
            "assets",
            "--log-file",
            "LevelLoaderLog.txt",
            "--width",
            "640",
        ])
        .unwrap();

        assert_eq!(
            config.levels,
            vec![
                PathBuf::from("a.txt"),
                PathBuf::from("b.txt"),
                PathBuf::from("c.txt")
            ]
        );
        assert_eq!(config.models, PathBuf::from("assets"));
        assert_eq!(config.log_file, Some(PathBuf::from("LevelLoaderLog.txt")));
        assert_eq!((config.width, config.height), (640, 800));
    }

    #[test]
    fn test_rejects_zero_width() {
        assert!(ViewerConfig::try_from_args(["level-viewer", "--width", "0"]).is_err());
    }
}
