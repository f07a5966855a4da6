use serde::{Deserialize, Serialize};

use crate::config::FilterConfig;

/// A reproduced phone model and the filter parameters tied to it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CameraModel {
    /// Stable identifier handed in by the session controller, e.g. `iphone4`.
    pub id: String,
    pub name: String,
    pub era: String,
    pub year: u16,
    pub megapixels: f64,
    /// 35mm-equivalent focal length.
    pub focal_length_mm: f64,
    pub filter_config: FilterConfig,
    pub is_free: bool,
}

impl CameraModel {
    pub fn iphone4() -> Self {
        Self {
            id: "iphone4".into(),
            name: "iPhone 4".into(),
            era: "iOS 4-6".into(),
            year: 2010,
            megapixels: 5.0,
            focal_length_mm: 32.0,
            filter_config: FilterConfig::iphone4(),
            is_free: true,
        }
    }

    pub fn iphone6() -> Self {
        Self {
            id: "iphone6".into(),
            name: "iPhone 6".into(),
            era: "iOS 8".into(),
            year: 2014,
            megapixels: 8.0,
            focal_length_mm: 29.0,
            filter_config: FilterConfig::iphone6(),
            is_free: true,
        }
    }

    /// Built-in models, oldest first.
    pub fn all() -> Vec<CameraModel> {
        vec![Self::iphone4(), Self::iphone6()]
    }

    /// Look a model up by id, case-insensitively.
    pub fn find(id: &str) -> Option<CameraModel> {
        find_in(&Self::all(), id).cloned()
    }
}

/// Look a model up by id in an arbitrary list (e.g. presets loaded from disk).
pub fn find_in<'a>(models: &'a [CameraModel], id: &str) -> Option<&'a CameraModel> {
    models.iter().find(|m| m.id.eq_ignore_ascii_case(id))
}
