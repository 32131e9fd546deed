use crate::types::{Rgb, Tick};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;

pub const DEFAULT_CODECS: [&str; 4] = ["libx264", "libopenh264", "h264_videotoolbox", "mpeg4"];

#[derive(thiserror::Error, Debug)]
pub enum StorageError {
    #[error("io error: {0}")]
    Io(String),
    #[error("serialization error: {0}")]
    Serde(String),
}

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum SettingsError {
    #[error("invalid setting: {0}")]
    Invalid(String),
    #[error("unknown {kind} '{value}'")]
    UnknownVariant { kind: &'static str, value: String },
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HorizontalAlign {
    Left,
    #[default]
    Center,
    Right,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerticalAlign {
    Top,
    #[default]
    Center,
    Bottom,
    Baseline,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlacementMode {
    /// Line layout recomputed every frame from the segments already shown.
    #[default]
    Dynamic,
    /// Line layout computed once from every segment's final text.
    Fixed,
}

impl FromStr for HorizontalAlign {
    type Err = SettingsError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "left" => Ok(Self::Left),
            "center" => Ok(Self::Center),
            "right" => Ok(Self::Right),
            _ => Err(SettingsError::UnknownVariant {
                kind: "horizontal alignment",
                value: raw.to_string(),
            }),
        }
    }
}

impl FromStr for VerticalAlign {
    type Err = SettingsError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "top" => Ok(Self::Top),
            "center" => Ok(Self::Center),
            "bottom" => Ok(Self::Bottom),
            "baseline" => Ok(Self::Baseline),
            _ => Err(SettingsError::UnknownVariant {
                kind: "vertical alignment",
                value: raw.to_string(),
            }),
        }
    }
}

impl FromStr for PlacementMode {
    type Err = SettingsError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "dynamic" => Ok(Self::Dynamic),
            "fixed" => Ok(Self::Fixed),
            _ => Err(SettingsError::UnknownVariant {
                kind: "placement mode",
                value: raw.to_string(),
            }),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderSettings {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub font_size_base: u32,
    pub char_spacing: u32,
    pub bg_color: Rgb,
    pub text_color: Rgb,
    pub vertical_align: VerticalAlign,
    pub placement_mode: PlacementMode,
    pub horizontal_align: HorizontalAlign,
    /// Defaults to the canvas centre when unset.
    pub anchor_x: Option<i32>,
    pub anchor_y: Option<i32>,
    pub pitch_offset_scale: f32,
    pub pitch_size_scale: f32,
    pub velocity_size_scale: f32,
    pub reference_pitch: u8,
    pub reference_velocity: u8,
    pub duration_padding_threshold_ticks: Tick,
    pub duration_padding_scale_per_tick: f32,
    pub min_char_render_size: u32,
    pub max_char_render_size: u32,
    pub font_path: Option<PathBuf>,
    pub ticks_per_beat_override: Option<u16>,
    /// Tried in order; the first codec the encoder accepts wins.
    pub codecs: Vec<String>,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            width: 1920,
            height: 1080,
            fps: 30,
            font_size_base: 60,
            char_spacing: 10,
            bg_color: Rgb::BLACK,
            text_color: Rgb::WHITE,
            vertical_align: VerticalAlign::Center,
            placement_mode: PlacementMode::Dynamic,
            horizontal_align: HorizontalAlign::Center,
            anchor_x: None,
            anchor_y: None,
            pitch_offset_scale: 0.0,
            pitch_size_scale: 0.0,
            velocity_size_scale: 0.0,
            reference_pitch: 60,
            reference_velocity: 64,
            duration_padding_threshold_ticks: 240,
            duration_padding_scale_per_tick: 0.1,
            min_char_render_size: 8,
            max_char_render_size: 300,
            font_path: None,
            ticks_per_beat_override: None,
            codecs: DEFAULT_CODECS.iter().map(|c| c.to_string()).collect(),
        }
    }
}

impl RenderSettings {
    pub fn anchor_x(&self) -> i32 {
        self.anchor_x.unwrap_or((self.width / 2) as i32)
    }

    pub fn anchor_y(&self) -> i32 {
        self.anchor_y.unwrap_or((self.height / 2) as i32)
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.width == 0 || self.height == 0 {
            return Err(SettingsError::Invalid(format!(
                "canvas must be non-empty, got {}x{}",
                self.width, self.height
            )));
        }
        if self.fps == 0 {
            return Err(SettingsError::Invalid("fps must be positive".to_string()));
        }
        if self.min_char_render_size > self.max_char_render_size {
            return Err(SettingsError::Invalid(format!(
                "min glyph size {} exceeds max glyph size {}",
                self.min_char_render_size, self.max_char_render_size
            )));
        }
        if self.codecs.iter().all(|c| c.trim().is_empty()) {
            return Err(SettingsError::Invalid("codec list is empty".to_string()));
        }
        Ok(())
    }
}

pub trait SettingsStore: Send + Sync {
    fn load_settings(&self) -> Result<RenderSettings, StorageError>;
    fn save_settings(&self, s: &RenderSettings) -> Result<(), StorageError>;
}
