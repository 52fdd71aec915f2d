//! Core capture types: camera selection, presets, orientation, and the
//! sample buffers delivered to a frame consumer.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Which physical camera feeds the capture session.
///
/// Changing the position on a running controller switches the video input
/// to the other camera in place; audio capture is unaffected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CameraPosition {
    /// User-facing camera (no torch).
    Front,
    /// World-facing camera (torch-capable on most devices).
    Back,
}

impl CameraPosition {
    /// The opposite position, for camera-flip UI affordances.
    pub fn flipped(self) -> Self {
        match self {
            CameraPosition::Front => CameraPosition::Back,
            CameraPosition::Back => CameraPosition::Front,
        }
    }
}

impl Default for CameraPosition {
    fn default() -> Self {
        CameraPosition::Front
    }
}

impl fmt::Display for CameraPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CameraPosition::Front => write!(f, "front"),
            CameraPosition::Back => write!(f, "back"),
        }
    }
}

/// Capture resolution selector.
///
/// Presets are nominal: the platform picks the closest format the selected
/// device supports, so the frames that arrive may differ from
/// [`dimensions`](ResolutionPreset::dimensions). Changing the preset on a
/// running controller reconfigures the video input in place.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResolutionPreset {
    /// Low resolution, suitable for previews and thumbnails.
    Low,
    /// Balanced default for processing pipelines.
    Medium,
    /// Highest quality the device offers without a fixed geometry.
    High,
    /// Exactly 1280x720.
    Hd720,
    /// Exactly 1920x1080.
    Hd1080,
    /// Exactly 3840x2160.
    Uhd4k,
}

impl ResolutionPreset {
    /// Nominal width/height hint for this preset.
    pub fn dimensions(self) -> (u32, u32) {
        match self {
            ResolutionPreset::Low => (320, 240),
            ResolutionPreset::Medium => (640, 480),
            ResolutionPreset::High => (1280, 720),
            ResolutionPreset::Hd720 => (1280, 720),
            ResolutionPreset::Hd1080 => (1920, 1080),
            ResolutionPreset::Uhd4k => (3840, 2160),
        }
    }
}

impl Default for ResolutionPreset {
    fn default() -> Self {
        ResolutionPreset::Hd720
    }
}

impl fmt::Display for ResolutionPreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolutionPreset::Low => write!(f, "low"),
            ResolutionPreset::Medium => write!(f, "medium"),
            ResolutionPreset::High => write!(f, "high"),
            ResolutionPreset::Hd720 => write!(f, "hd720"),
            ResolutionPreset::Hd1080 => write!(f, "hd1080"),
            ResolutionPreset::Uhd4k => write!(f, "uhd4k"),
        }
    }
}

/// How captured frames should be interpreted for display and processing.
///
/// The host updates this when the device rotates. Orientation is delivery
/// metadata only: changing it never restarts the capture session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum VideoOrientation {
    Portrait,
    PortraitUpsideDown,
    LandscapeLeft,
    LandscapeRight,
}

impl VideoOrientation {
    /// True for either landscape variant.
    pub fn is_landscape(self) -> bool {
        matches!(
            self,
            VideoOrientation::LandscapeLeft | VideoOrientation::LandscapeRight
        )
    }
}

impl Default for VideoOrientation {
    fn default() -> Self {
        VideoOrientation::Portrait
    }
}

impl fmt::Display for VideoOrientation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VideoOrientation::Portrait => write!(f, "portrait"),
            VideoOrientation::PortraitUpsideDown => write!(f, "portrait-upside-down"),
            VideoOrientation::LandscapeLeft => write!(f, "landscape-left"),
            VideoOrientation::LandscapeRight => write!(f, "landscape-right"),
        }
    }
}

/// Lifecycle state of a capture controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No capture path active; property writes only store values.
    Idle,
    /// Transient: negotiating a device, preset, or orientation change.
    Configuring,
    /// At least one of video/audio is capturing and delivering.
    Running,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Idle => write!(f, "idle"),
            SessionState::Configuring => write!(f, "configuring"),
            SessionState::Running => write!(f, "running"),
        }
    }
}

/// Pixel layout of a captured video frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    /// Biplanar 4:2:0 YCbCr, the native camera format on most devices.
    Nv12,
    /// 32-bit BGRA.
    Bgra8,
}

impl PixelFormat {
    /// Buffer size in bytes for a frame of the given dimensions.
    pub fn buffer_size(self, width: u32, height: u32) -> usize {
        let pixels = width as usize * height as usize;
        match self {
            PixelFormat::Nv12 => pixels + pixels / 2,
            PixelFormat::Bgra8 => pixels * 4,
        }
    }
}

impl fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PixelFormat::Nv12 => write!(f, "nv12"),
            PixelFormat::Bgra8 => write!(f, "bgra8"),
        }
    }
}

/// A captured video sample buffer as handed to the frame consumer.
#[derive(Clone)]
pub struct VideoFrame {
    /// Raw pixel data in `format` layout.
    pub data: Vec<u8>,
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Pixel layout of `data`.
    pub format: PixelFormat,
    /// Capture time relative to session start; strictly increasing within
    /// one capture run.
    pub timestamp: Duration,
    /// Orientation configured on the controller when the frame was delivered.
    pub orientation: VideoOrientation,
    /// True when the frame comes from the front camera and selfie mirroring
    /// is enabled.
    pub mirrored: bool,
}

impl fmt::Debug for VideoFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VideoFrame")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("format", &self.format)
            .field("timestamp", &self.timestamp)
            .field("orientation", &self.orientation)
            .field("mirrored", &self.mirrored)
            .field("data_len", &self.data.len())
            .finish()
    }
}

/// A captured audio sample buffer (interleaved signed 16-bit PCM).
#[derive(Clone)]
pub struct AudioChunk {
    /// Interleaved samples, `channels` values per sampling instant.
    pub samples: Vec<i16>,
    /// Sampling rate in Hz.
    pub sample_rate: u32,
    /// Channel count (1 = mono, 2 = stereo).
    pub channels: u16,
    /// Capture time relative to session start.
    pub timestamp: Duration,
}

impl fmt::Debug for AudioChunk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AudioChunk")
            .field("sample_rate", &self.sample_rate)
            .field("channels", &self.channels)
            .field("timestamp", &self.timestamp)
            .field("samples_len", &self.samples.len())
            .finish()
    }
}

/// Requested format for the audio input path.
///
/// The platform treats this as a hint the same way video presets are hints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioSettings {
    /// Sampling rate in Hz.
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,
    /// Channel count.
    #[serde(default = "default_channels")]
    pub channels: u16,
}

fn default_sample_rate() -> u32 {
    44_100
}

fn default_channels() -> u16 {
    1
}

impl Default for AudioSettings {
    fn default() -> Self {
        Self {
            sample_rate: default_sample_rate(),
            channels: default_channels(),
        }
    }
}
