//! Processing parameters attached to every upload.
//!
//! The parameter bundle is stored verbatim in the metadata record and forwarded
//! to the processing endpoint, so the wire names are camelCase.

use serde::{Deserialize, Deserializer, Serialize};

/// Default output resolution on either axis.
pub const DEFAULT_RESOLUTION: u32 = 512;

/// Default level for brightness, contrast and saturation sliders.
pub const DEFAULT_LEVEL: u8 = 50;

/// Default opacity (fully opaque).
pub const DEFAULT_OPACITY: u8 = 100;

/// Upper bound for every slider level.
pub const MAX_LEVEL: u8 = 100;

/// Largest accepted rotation in either direction, in degrees.
pub const MAX_ROTATION: i32 = 360;

/// Output format requested from the processing endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Png,
    #[serde(alias = "jpg")]
    Jpeg,
    Webp,
}

impl OutputFormat {
    /// Parse a format name, accepting `jpg` as an alias.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "png" => Some(Self::Png),
            "jpeg" | "jpg" => Some(Self::Jpeg),
            "webp" => Some(Self::Webp),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpeg",
            Self::Webp => "webp",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
            Self::Webp => "image/webp",
        }
    }
}

/// Display-name override for the images of one upload.
///
/// Older records carry a single name for the whole upload, newer ones a list
/// with one entry per image. Lists are not guaranteed to be as long as the key
/// list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilenameOverride {
    Single(String),
    PerImage(Vec<String>),
}

impl Default for FilenameOverride {
    fn default() -> Self {
        Self::Single(String::new())
    }
}

impl FilenameOverride {
    /// Override for the image at `index`, if one is set and non-empty.
    pub fn for_index(&self, index: usize) -> Option<&str> {
        let name = match self {
            Self::Single(name) => Some(name.as_str()),
            Self::PerImage(names) => names.get(index).map(String::as_str),
        };
        name.map(str::trim).filter(|n| !n.is_empty())
    }

    /// Drop the entry belonging to the image at `index`.
    ///
    /// Single overrides apply to every image and are left untouched.
    pub fn remove_index(&mut self, index: usize) {
        if let Self::PerImage(names) = self {
            if index < names.len() {
                names.remove(index);
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Self::Single(name) => name.trim().is_empty(),
            Self::PerImage(names) => names.iter().all(|n| n.trim().is_empty()),
        }
    }
}

/// Adjustable processing parameters for an upload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageParameters {
    #[serde(default)]
    pub overwritten_filename: FilenameOverride,

    #[serde(default = "default_resolution", deserialize_with = "resolution_or_default")]
    pub res_x: u32,

    #[serde(default = "default_resolution", deserialize_with = "resolution_or_default")]
    pub res_y: u32,

    /// Rotation in degrees
    #[serde(default, deserialize_with = "rotation_or_default")]
    pub rotation_state: i32,

    #[serde(default = "default_level", deserialize_with = "level_or_default")]
    pub brightness: u8,

    #[serde(default = "default_level", deserialize_with = "level_or_default")]
    pub contrast: u8,

    #[serde(default = "default_level", deserialize_with = "level_or_default")]
    pub saturation: u8,

    #[serde(default = "default_opacity", deserialize_with = "opacity_or_default")]
    pub opacity: u8,

    #[serde(default)]
    pub output_format: OutputFormat,
}

impl Default for ImageParameters {
    fn default() -> Self {
        Self {
            overwritten_filename: FilenameOverride::default(),
            res_x: DEFAULT_RESOLUTION,
            res_y: DEFAULT_RESOLUTION,
            rotation_state: 0,
            brightness: DEFAULT_LEVEL,
            contrast: DEFAULT_LEVEL,
            saturation: DEFAULT_LEVEL,
            opacity: DEFAULT_OPACITY,
            output_format: OutputFormat::default(),
        }
    }
}

impl ImageParameters {
    /// Check every field against its accepted range.
    pub fn validate(&self) -> Result<(), String> {
        if self.res_x == 0 || self.res_y == 0 {
            return Err(format!(
                "resolution must be positive, got {}x{}",
                self.res_x, self.res_y
            ));
        }

        if self.rotation_state.abs() > MAX_ROTATION {
            return Err(format!(
                "rotationState must be between -{} and {}, got {}",
                MAX_ROTATION, MAX_ROTATION, self.rotation_state
            ));
        }

        for (name, value) in [
            ("brightness", self.brightness),
            ("contrast", self.contrast),
            ("saturation", self.saturation),
            ("opacity", self.opacity),
        ] {
            if value > MAX_LEVEL {
                return Err(format!(
                    "{} must be between 0 and {}, got {}",
                    name, MAX_LEVEL, value
                ));
            }
        }

        Ok(())
    }
}

fn default_resolution() -> u32 {
    DEFAULT_RESOLUTION
}

fn default_level() -> u8 {
    DEFAULT_LEVEL
}

fn default_opacity() -> u8 {
    DEFAULT_OPACITY
}

/// Treat an explicit JSON `null` like a missing field.
///
/// Only reached when the key is present; missing keys use the field default.
fn null_or<'de, D, T>(deserializer: D, default: fn() -> T) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_else(default))
}

fn resolution_or_default<'de, D: Deserializer<'de>>(d: D) -> Result<u32, D::Error> {
    null_or(d, default_resolution)
}

fn rotation_or_default<'de, D: Deserializer<'de>>(d: D) -> Result<i32, D::Error> {
    null_or(d, i32::default)
}

fn level_or_default<'de, D: Deserializer<'de>>(d: D) -> Result<u8, D::Error> {
    null_or(d, default_level)
}

fn opacity_or_default<'de, D: Deserializer<'de>>(d: D) -> Result<u8, D::Error> {
    null_or(d, default_opacity)
}
