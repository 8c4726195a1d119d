//! Scene registry
//!
//! A [`Level`] is the ordered list of [`Model`]s read from one level file plus
//! the sun light they share. File order is render order.

use std::path::{Path, PathBuf};

use cgmath::Matrix4;

use crate::{
    assets::level_file::LevelReader,
    error::{AssetError, LevelError, RenderError},
    gfx::{
        constants::LightConfig,
        device::GraphicsDevice,
        model::{Model, UploadParams},
    },
    logging::{LevelLog, LogCategory},
};

/// What happened to one record of a level file.
#[derive(Debug)]
pub enum LoadOutcome {
    Loaded {
        name: String,
    },
    /// The record was read but its mesh asset could not be decoded.
    AssetFailed {
        name: String,
        path: PathBuf,
        error: AssetError,
    },
    /// The record itself could not be read.
    Skipped(LevelError),
}

#[derive(Debug, Default)]
pub struct LoadReport {
    pub entries: Vec<LoadOutcome>,
}

impl LoadReport {
    pub fn loaded(&self) -> usize {
        self.entries
            .iter()
            .filter(|entry| matches!(entry, LoadOutcome::Loaded { .. }))
            .count()
    }

    pub fn failed(&self) -> usize {
        self.entries.len() - self.loaded()
    }
}

#[derive(Debug, Default)]
pub struct UploadReport {
    pub uploaded: usize,
    pub failed: Vec<(String, RenderError)>,
}

#[derive(Debug, Default)]
pub struct RenderReport {
    pub drawn: usize,
    /// Models without GPU resources, usually because their upload failed.
    pub skipped: usize,
    pub failed: Vec<(String, RenderError)>,
}

pub struct Level<D: GraphicsDevice + ?Sized> {
    models: Vec<Model<D>>,
    light: LightConfig,
}

impl<D: GraphicsDevice + ?Sized> Default for Level<D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D: GraphicsDevice + ?Sized> Level<D> {
    pub fn new() -> Self {
        Self {
            models: Vec::new(),
            light: LightConfig::default(),
        }
    }

    /// Replaces the current contents with the objects listed in `level_path`.
    ///
    /// Each object's mesh is read from `asset_folder`. Objects whose mesh is
    /// missing or invalid are reported and left out; loading continues. Only
    /// a level file that cannot be opened is an error, and it leaves the
    /// level empty.
    pub fn load_level(
        &mut self,
        level_path: impl AsRef<Path>,
        asset_folder: impl AsRef<Path>,
        log: &mut dyn LevelLog,
    ) -> Result<LoadReport, LevelError> {
        let level_path = level_path.as_ref();
        let asset_folder = asset_folder.as_ref();

        log.log(LogCategory::Event, "LOADING GAME LEVEL");
        log.log(LogCategory::Message, "Begin Reading Game Level Text File.");
        self.unload_level();

        let reader = match LevelReader::open(level_path) {
            Ok(reader) => reader,
            Err(err) => {
                log.log(
                    LogCategory::Error,
                    &format!("Game level not found: {}", level_path.display()),
                );
                return Err(err);
            }
        };

        let mut report = LoadReport::default();
        for record in reader {
            let entry = match record {
                Ok(entry) => entry,
                Err(err) => {
                    log.log(LogCategory::Error, &format!("Skipping level record: {err}"));
                    report.entries.push(LoadOutcome::Skipped(err));
                    continue;
                }
            };

            log.log(LogCategory::Info, &format!("Model Detected: {}", entry.name));
            let [x, y, z, _] = entry.rows[3];
            log.log(
                LogCategory::Info,
                &format!("Location: X {x:.6} Y {y:.6} Z {z:.6}"),
            );

            log.log(LogCategory::Message, "Begin Importing .H2B File Data.");
            let path = asset_folder.join(&entry.asset_file);
            match Model::load(entry.name.clone(), entry.transform(), &path) {
                Ok(model) => {
                    self.models.push(model);
                    log.log(
                        LogCategory::Info,
                        &format!("H2B Imported: {}", path.display()),
                    );
                    report.entries.push(LoadOutcome::Loaded { name: entry.name });
                }
                Err(error) => {
                    let message = match &error {
                        AssetError::Io { .. } => format!("H2B Not Found: {}", path.display()),
                        other => format!("H2B Rejected: {} ({other})", path.display()),
                    };
                    log.log(LogCategory::Error, &message);
                    log.log(
                        LogCategory::Warning,
                        "Loading will continue but model(s) are missing.",
                    );
                    report.entries.push(LoadOutcome::AssetFailed {
                        name: entry.name,
                        path,
                        error,
                    });
                }
            }
            log.log(LogCategory::Message, "Importing of .H2B File Data Complete.");
        }

        log.log(LogCategory::Message, "Game Level File Reading Complete.");
        log.log(LogCategory::Event, "GAME LEVEL WAS LOADED TO CPU");
        Ok(report)
    }

    /// Uploads every model with the level's light.
    ///
    /// Models that fail are logged and counted and the rest still upload. A
    /// fatal error stops the batch and is returned.
    pub fn upload_level_to_device(
        &mut self,
        device: &mut D,
        world: Matrix4<f32>,
        view: Matrix4<f32>,
        projection: Matrix4<f32>,
        log: &mut dyn LevelLog,
    ) -> Result<UploadReport, RenderError> {
        let params = UploadParams {
            world,
            view,
            projection,
            light: self.light,
        };

        let mut report = UploadReport::default();
        for model in &mut self.models {
            match model.upload(device, &params) {
                Ok(()) => report.uploaded += 1,
                Err(err) if err.is_fatal() => {
                    log.log(
                        LogCategory::Error,
                        &format!("Upload of '{}' failed: {err}", model.name()),
                    );
                    return Err(err);
                }
                Err(err) => {
                    log.log(
                        LogCategory::Error,
                        &format!("Upload of '{}' failed: {err}", model.name()),
                    );
                    report.failed.push((model.name().to_owned(), err));
                }
            }
        }

        log.log(
            LogCategory::Event,
            &format!("GAME LEVEL WAS UPLOADED TO GPU ({} models)", report.uploaded),
        );
        Ok(report)
    }

    /// Draws every resident model in order. A model that fails to draw does
    /// not stop the others.
    pub fn render_level(
        &mut self,
        device: &mut D,
        view: Matrix4<f32>,
        camera_world: Matrix4<f32>,
    ) -> RenderReport {
        let mut report = RenderReport::default();
        for model in &mut self.models {
            if !model.is_resident() {
                report.skipped += 1;
                continue;
            }
            match model.draw(device, view, camera_world) {
                Ok(()) => report.drawn += 1,
                Err(err) => {
                    log::error!("Unable to render '{}': {}", model.name(), err);
                    report.failed.push((model.name().to_owned(), err));
                }
            }
        }
        report
    }

    /// Sends a new projection to every resident model, e.g. after a resize.
    pub fn set_projection(&mut self, device: &mut D, projection: Matrix4<f32>) {
        for model in &mut self.models {
            if let Err(err) = model.set_projection(device, projection) {
                log::error!("Unable to update projection of '{}': {}", model.name(), err);
            }
        }
    }

    /// Drops every model along with its GPU resources.
    pub fn unload_level(&mut self) {
        self.models.clear();
    }

    pub fn models(&self) -> &[Model<D>] {
        &self.models
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    pub fn light(&self) -> LightConfig {
        self.light
    }

    /// Sets the light used by the next upload.
    pub fn set_light(&mut self, light: LightConfig) {
        self.light = light;
    }
}
