//! Fixture types and their target-value policies
//!
//! A fixture turns logical light state (on/off, brightness, color, color
//! temperature) into the byte values its channel should fade to. The
//! policies are pure functions; [`Fixture`] keeps the logical state and
//! installs the fades.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::channel::ChannelHandle;
use crate::curve::ValueCurve;
use crate::error::{CoreError, Result};

/// Default coolest color temperature (mireds)
pub const DEFAULT_MIN_MIREDS: u16 = 153;
/// Default warmest color temperature (mireds)
pub const DEFAULT_MAX_MIREDS: u16 = 500;

/// Supported fixture layouts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FixtureKind {
    /// Single intensity slot
    #[default]
    #[serde(rename = "dimmer")]
    Dimmer,
    /// Red, green, blue
    #[serde(rename = "rgb")]
    Rgb,
    /// Warm white, cool white
    #[serde(rename = "ww")]
    WarmWhite,
    /// Red, green, blue, white
    #[serde(rename = "rgbw")]
    Rgbw,
}

impl FixtureKind {
    /// Number of DMX slots used
    pub fn width(self) -> u16 {
        match self {
            FixtureKind::Dimmer => 1,
            FixtureKind::Rgb => 3,
            FixtureKind::WarmWhite => 2,
            FixtureKind::Rgbw => 4,
        }
    }

    /// Name used in configuration files
    pub fn name(self) -> &'static str {
        match self {
            FixtureKind::Dimmer => "dimmer",
            FixtureKind::Rgb => "rgb",
            FixtureKind::WarmWhite => "ww",
            FixtureKind::Rgbw => "rgbw",
        }
    }

    pub fn all() -> [FixtureKind; 4] {
        [
            FixtureKind::Dimmer,
            FixtureKind::Rgb,
            FixtureKind::WarmWhite,
            FixtureKind::Rgbw,
        ]
    }
}

impl fmt::Display for FixtureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for FixtureKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        FixtureKind::all()
            .into_iter()
            .find(|k| k.name() == s)
            .ok_or_else(|| CoreError::UnknownFixtureType(s.to_string()))
    }
}

/// Logical state of a fixture
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FixtureState {
    pub is_on: bool,
    /// 0-255
    pub brightness: u8,
    pub rgb: [u8; 3],
    /// White slot of RGBW fixtures
    pub white: u8,
    /// Color temperature in mireds
    pub color_temp: u16,
    /// Multiplier applied to color slots (1.0 when the color itself
    /// carries the intensity)
    pub scale: f64,
    pub min_mireds: u16,
    pub max_mireds: u16,
}

impl Default for FixtureState {
    fn default() -> Self {
        Self {
            is_on: false,
            brightness: 255,
            rgb: [255, 255, 255],
            white: 255,
            color_temp: 250,
            scale: 1.0,
            min_mireds: DEFAULT_MIN_MIREDS,
            max_mireds: DEFAULT_MAX_MIREDS,
        }
    }
}

fn to_dmx(value: f64) -> u8 {
    value.round().clamp(0.0, 255.0) as u8
}

/// Dimmer: the brightness itself
pub fn dimmer_target(brightness: u8) -> Vec<u8> {
    vec![brightness]
}

/// RGB: each component times the scale factor
pub fn rgb_target(rgb: [u8; 3], scale: f64) -> Vec<u8> {
    rgb.iter().map(|&c| to_dmx(f64::from(c) * scale)).collect()
}

/// RGBW: the RGB policy plus a scaled white slot
pub fn rgbw_target(rgb: [u8; 3], white: u8, scale: f64) -> Vec<u8> {
    let mut values = rgb_target(rgb, scale);
    values.push(to_dmx(f64::from(white) * scale));
    values
}

/// Warm/cool white: split brightness by color temperature.
///
/// The dominant side is normalized to full brightness. The temperature is
/// clamped into `min_mireds..=max_mireds`.
pub fn white_target(
    color_temp: u16,
    min_mireds: u16,
    max_mireds: u16,
    brightness: u8,
    is_on: bool,
) -> Vec<u8> {
    if !is_on {
        return vec![0, 0];
    }
    let span = f64::from(max_mireds.saturating_sub(min_mireds));
    let warm = if span > 0.0 {
        let ct = color_temp.clamp(min_mireds, max_mireds);
        f64::from(ct - min_mireds) / span
    } else {
        0.5
    };
    let cool = 1.0 - warm;
    let dominant = warm.max(cool);
    let brightness = f64::from(brightness);
    vec![
        to_dmx(brightness * warm / dominant),
        to_dmx(brightness * cool / dominant),
    ]
}

/// Target values for `kind` in `state`
pub fn compute_target(kind: FixtureKind, state: &FixtureState) -> Vec<u8> {
    match kind {
        FixtureKind::Dimmer => dimmer_target(state.brightness),
        FixtureKind::Rgb => rgb_target(state.rgb, state.scale),
        FixtureKind::WarmWhite => white_target(
            state.color_temp,
            state.min_mireds,
            state.max_mireds,
            state.brightness,
            state.is_on,
        ),
        FixtureKind::Rgbw => rgbw_target(state.rgb, state.white, state.scale),
    }
}

/// A turn-on request. Unset fields keep their previous value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TurnOn {
    pub brightness: Option<u8>,
    pub rgb: Option<[u8; 3]>,
    pub white: Option<u8>,
    /// Color temperature in mireds
    pub color_temp: Option<u16>,
    /// Fade time in seconds, overrides the fixture default
    pub transition: Option<f64>,
}

/// Values exposed alongside a fixture's state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FixtureAttributes {
    pub dmx_channels: Vec<u16>,
    pub dmx_values: Vec<u8>,
    /// Default transition in seconds
    pub transition: f64,
}

/// A configured light bound to a channel
#[derive(Debug)]
pub struct Fixture {
    name: String,
    kind: FixtureKind,
    channel: ChannelHandle,
    state: FixtureState,
    transition: f64,
}

impl Fixture {
    /// Bind a fixture to a channel of matching width
    pub fn new(
        name: impl Into<String>,
        kind: FixtureKind,
        channel: ChannelHandle,
        transition: f64,
    ) -> Result<Self> {
        let name = name.into();
        let width = channel.lock().width();
        if width != kind.width() {
            return Err(CoreError::FadeWidthMismatch {
                channel: name,
                expected: width as usize,
                actual: kind.width() as usize,
            });
        }
        Ok(Self {
            name,
            kind,
            channel,
            state: FixtureState::default(),
            transition,
        })
    }

    /// Set the color temperature bounds of a warm/cool fixture
    pub fn with_mireds(mut self, min_mireds: u16, max_mireds: u16) -> Self {
        self.state.min_mireds = min_mireds;
        self.state.max_mireds = max_mireds;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> FixtureKind {
        self.kind
    }

    pub fn state(&self) -> &FixtureState {
        &self.state
    }

    pub fn is_on(&self) -> bool {
        self.state.is_on
    }

    pub fn channel(&self) -> &ChannelHandle {
        &self.channel
    }

    /// Default transition in seconds
    pub fn transition(&self) -> f64 {
        self.transition
    }

    pub fn set_transition(&mut self, seconds: f64) {
        self.transition = seconds;
    }

    /// Values the channel is (or will be) fading to
    pub fn target_values(&self) -> Vec<u8> {
        compute_target(self.kind, &self.state)
    }

    /// Apply a turn-on request and fade to the resulting target.
    ///
    /// A color sets brightness to its brightest component and resets the
    /// scale; an explicit brightness in the same request wins over that.
    pub fn turn_on(&mut self, request: &TurnOn) -> Result<()> {
        self.state.is_on = true;

        match self.kind {
            FixtureKind::Dimmer => {
                if let Some(brightness) = request.brightness {
                    self.state.brightness = brightness;
                }
            }
            FixtureKind::Rgb | FixtureKind::Rgbw => {
                if let Some(rgb) = request.rgb {
                    self.state.rgb = rgb;
                    self.state.brightness = rgb.iter().copied().max().unwrap_or(0);
                    self.state.scale = 1.0;
                }
                if let Some(white) = request.white {
                    self.state.white = white;
                }
                if let Some(brightness) = request.brightness {
                    self.state.brightness = brightness;
                    self.state.scale = f64::from(brightness) / 255.0;
                }
            }
            FixtureKind::WarmWhite => {
                if let Some(ct) = request.color_temp {
                    self.state.color_temp = ct;
                    self.state.brightness = 255;
                }
                if let Some(brightness) = request.brightness {
                    self.state.brightness = brightness;
                }
            }
        }

        let target = self.target_values();
        self.fade_to(&target, request.transition)
    }

    /// Fade every slot to zero
    pub fn turn_off(&mut self, transition: Option<f64>) -> Result<()> {
        tracing::debug!("Turning off {}", self.name);
        self.state.is_on = false;
        let zeros = vec![0; self.kind.width() as usize];
        self.fade_to(&zeros, transition)
    }

    /// Channel addresses, current values and default transition
    pub fn attributes(&self) -> FixtureAttributes {
        let channel = self.channel.lock();
        FixtureAttributes {
            dmx_channels: channel.addresses().collect(),
            dmx_values: channel.get_values(),
            transition: self.transition,
        }
    }

    fn fade_to(&self, target: &[u8], transition: Option<f64>) -> Result<()> {
        let seconds = transition.unwrap_or(self.transition);
        self.channel
            .lock()
            .add_fade(target, seconds_to_duration(seconds), ValueCurve::Linear)
    }
}

/// Convert a transition in seconds, treating negative or invalid input as 0
pub fn seconds_to_duration(seconds: f64) -> Duration {
    Duration::try_from_secs_f64(seconds.max(0.0)).unwrap_or(Duration::ZERO)
}
