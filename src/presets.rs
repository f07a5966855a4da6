use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use retrocam_core::CameraModel;
use retrocam_core::camera_model::find_in;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// On-disk preset file: camera models added to, or replacing, the
/// built-in ones by id.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PresetFile {
    #[serde(default)]
    pub models: Vec<CameraModel>,
}

pub fn default_presets_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("retrocam").join("presets.json"))
}

/// Built-in models merged with the preset file.
///
/// An explicit path must exist; the default location is optional.
pub fn load_models(explicit: Option<&Path>) -> Result<Vec<CameraModel>> {
    let mut models = CameraModel::all();
    let path = match explicit {
        Some(p) => p.to_path_buf(),
        None => match default_presets_path() {
            Some(p) if p.is_file() => p,
            _ => {
                debug!("no preset file, using built-in models");
                return Ok(models);
            }
        },
    };

    let file = read_preset_file(&path)?;
    let count = file.models.len();
    merge_models(&mut models, file.models);
    info!(path = %path.display(), count, "presets loaded");
    Ok(models)
}

pub fn read_preset_file(path: &Path) -> Result<PresetFile> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("read preset file {}", path.display()))?;
    let file: PresetFile = serde_json::from_str(&text)
        .with_context(|| format!("parse preset file {}", path.display()))?;
    for model in &file.models {
        if model.id.trim().is_empty() {
            bail!("preset in {} has an empty id", path.display());
        }
        model
            .filter_config
            .validate()
            .with_context(|| format!("preset '{}' in {}", model.id, path.display()))?;
    }
    Ok(file)
}

fn merge_models(models: &mut Vec<CameraModel>, extra: Vec<CameraModel>) {
    for model in extra {
        match models.iter_mut().find(|m| m.id.eq_ignore_ascii_case(&model.id)) {
            Some(existing) => *existing = model,
            None => models.push(model),
        }
    }
}

pub fn resolve_model<'a>(models: &'a [CameraModel], id: &str) -> Result<&'a CameraModel> {
    match find_in(models, id) {
        Some(m) => Ok(m),
        None => {
            let known: Vec<&str> = models.iter().map(|m| m.id.as_str()).collect();
            bail!("unknown camera model '{id}' (available: {})", known.join(", "))
        }
    }
}
