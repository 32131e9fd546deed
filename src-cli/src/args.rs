use clap::Parser;
use lyrisync_ports::settings::{HorizontalAlign, PlacementMode, RenderSettings, VerticalAlign};
use lyrisync_ports::types::{Rgb, Tick};
use std::path::PathBuf;

/// Render a MIDI melody and its lyrics into a timed lyric video.
#[derive(Parser, Debug)]
#[command(name = "lyrisync", version, about, long_about = None)]
pub struct Args {
    /// MIDI file whose notes drive the lyric timing
    pub midi: PathBuf,

    /// Lyric file: one line per screen line, segments separated by `/`
    pub lyrics: PathBuf,

    /// Output video path
    #[arg(short, long)]
    pub output: PathBuf,

    /// Settings JSON to start from instead of the user config file
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Write the merged settings back to the settings file
    #[arg(long)]
    pub save_settings: bool,

    /// Print every render event as a JSON line on stdout
    #[arg(long)]
    pub json: bool,

    #[command(flatten)]
    pub overrides: SettingsOverrides,
}

/// Command-line values that replace the loaded settings field by field.
#[derive(clap::Args, Debug, Default)]
pub struct SettingsOverrides {
    /// TTF/OTF font file
    #[arg(long)]
    pub font: Option<PathBuf>,
    #[arg(long)]
    pub width: Option<u32>,
    #[arg(long)]
    pub height: Option<u32>,
    #[arg(long)]
    pub fps: Option<u32>,
    #[arg(long)]
    pub font_size: Option<u32>,
    #[arg(long)]
    pub char_spacing: Option<u32>,
    /// Background color as #RRGGBB
    #[arg(long)]
    pub bg_color: Option<Rgb>,
    /// Text color as #RRGGBB
    #[arg(long)]
    pub text_color: Option<Rgb>,
    /// top, center, bottom or baseline
    #[arg(long)]
    pub vertical_align: Option<VerticalAlign>,
    /// left, center or right
    #[arg(long)]
    pub horizontal_align: Option<HorizontalAlign>,
    /// dynamic or fixed
    #[arg(long)]
    pub placement: Option<PlacementMode>,
    #[arg(long, allow_negative_numbers = true)]
    pub anchor_x: Option<i32>,
    #[arg(long, allow_negative_numbers = true)]
    pub anchor_y: Option<i32>,
    #[arg(long, allow_negative_numbers = true)]
    pub pitch_offset_scale: Option<f32>,
    #[arg(long, allow_negative_numbers = true)]
    pub pitch_size_scale: Option<f32>,
    #[arg(long, allow_negative_numbers = true)]
    pub velocity_size_scale: Option<f32>,
    #[arg(long)]
    pub reference_pitch: Option<u8>,
    #[arg(long)]
    pub reference_velocity: Option<u8>,
    /// Note length in ticks above which a segment gets trailing padding
    #[arg(long)]
    pub padding_threshold: Option<Tick>,
    /// Pixels of trailing padding per tick above the threshold
    #[arg(long)]
    pub padding_scale: Option<f32>,
    #[arg(long)]
    pub min_size: Option<u32>,
    #[arg(long)]
    pub max_size: Option<u32>,
    /// Ticks per beat to use instead of the MIDI header value
    #[arg(long)]
    pub ticks_per_beat: Option<u16>,
    /// Codec to try, in order; repeat to build a fallback list
    #[arg(long = "codec")]
    pub codecs: Vec<String>,
}

fn set<T>(slot: &mut T, value: Option<T>) {
    if let Some(value) = value {
        *slot = value;
    }
}

impl SettingsOverrides {
    pub fn apply(self, settings: &mut RenderSettings) {
        if self.font.is_some() {
            settings.font_path = self.font;
        }
        set(&mut settings.width, self.width);
        set(&mut settings.height, self.height);
        set(&mut settings.fps, self.fps);
        set(&mut settings.font_size_base, self.font_size);
        set(&mut settings.char_spacing, self.char_spacing);
        set(&mut settings.bg_color, self.bg_color);
        set(&mut settings.text_color, self.text_color);
        set(&mut settings.vertical_align, self.vertical_align);
        set(&mut settings.horizontal_align, self.horizontal_align);
        set(&mut settings.placement_mode, self.placement);
        if self.anchor_x.is_some() {
            settings.anchor_x = self.anchor_x;
        }
        if self.anchor_y.is_some() {
            settings.anchor_y = self.anchor_y;
        }
        set(&mut settings.pitch_offset_scale, self.pitch_offset_scale);
        set(&mut settings.pitch_size_scale, self.pitch_size_scale);
        set(&mut settings.velocity_size_scale, self.velocity_size_scale);
        set(&mut settings.reference_pitch, self.reference_pitch);
        set(&mut settings.reference_velocity, self.reference_velocity);
        set(
            &mut settings.duration_padding_threshold_ticks,
            self.padding_threshold,
        );
        set(
            &mut settings.duration_padding_scale_per_tick,
            self.padding_scale,
        );
        set(&mut settings.min_char_render_size, self.min_size);
        set(&mut settings.max_char_render_size, self.max_size);
        if self.ticks_per_beat.is_some() {
            settings.ticks_per_beat_override = self.ticks_per_beat;
        }
        if !self.codecs.is_empty() {
            settings.codecs = self.codecs;
        }
    }
}
