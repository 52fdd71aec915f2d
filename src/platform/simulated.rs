//! In-memory capture platform for tests and headless hosts.
//!
//! [`SimulatedPlatform`] behaves like a phone: it has a fixed set of
//! cameras, remembers permission answers, and produces synthetic frames
//! from background threads at a steady cadence. Every call that would
//! touch hardware is recorded in an event log so tests can assert not
//! just the outcome but how the platform was driven (how many times a
//! video input was negotiated, in what order inputs came and went).

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use futures_util::future::BoxFuture;
use tokio::sync::oneshot;

use super::{CameraDeviceInfo, CapturePlatform, CaptureSession};
use crate::consumer::FrameSink;
use crate::error::SessionError;
use crate::permissions::{Authorization, Capability};
use crate::types::{
    AudioChunk, AudioSettings, CameraPosition, PixelFormat, ResolutionPreset, VideoFrame,
    VideoOrientation,
};

/// One recorded interaction with the simulated device layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlatformEvent {
    StatusChecked(Capability),
    PermissionPrompted(Capability),
    SessionCreated,
    VideoAttached {
        device_id: String,
        preset: ResolutionPreset,
    },
    VideoAttachFailed(String),
    VideoDetached,
    AudioAttached {
        sample_rate: u32,
    },
    AudioAttachFailed(String),
    AudioDetached,
    OrientationSet(VideoOrientation),
    TorchSet(bool),
}

/// Handle for answering a deferred permission prompt.
///
/// Returned by [`SimulatedPlatform::defer_next_prompt`]. The matching
/// `request_access` future stays pending until [`answer`](Self::answer)
/// is called; dropping the gate unanswered resolves the future with the
/// platform's configured answer instead.
pub struct PromptGate {
    tx: oneshot::Sender<Authorization>,
}

impl PromptGate {
    /// Resolve the pending prompt with `authorization`.
    pub fn answer(self, authorization: Authorization) {
        let _ = self.tx.send(authorization);
    }
}

struct SimulatedState {
    cameras: Vec<CameraDeviceInfo>,
    status: Mutex<HashMap<Capability, Authorization>>,
    prompt_answers: HashMap<Capability, Authorization>,
    deferred: Mutex<HashMap<Capability, oneshot::Receiver<Authorization>>>,
    video_failures: Mutex<VecDeque<String>>,
    audio_failures: Mutex<VecDeque<String>>,
    events: Mutex<Vec<PlatformEvent>>,
    frame_interval: Duration,
    chunk_interval: Duration,
    pixel_format: PixelFormat,
}

impl SimulatedState {
    fn record(&self, event: PlatformEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}

/// A software stand-in for the device capture stack.
///
/// By default it has a front camera without torch and a back camera with
/// one, both capabilities undetermined, and prompts that resolve to
/// [`Authorization::Authorized`]. Builder methods reshape that before the
/// platform is handed to a controller.
pub struct SimulatedPlatform {
    state: Arc<SimulatedState>,
}

impl SimulatedPlatform {
    pub fn new() -> Self {
        let cameras = vec![
            CameraDeviceInfo {
                id: "sim-front".to_string(),
                name: "Simulated Front Camera".to_string(),
                position: CameraPosition::Front,
                has_torch: false,
            },
            CameraDeviceInfo {
                id: "sim-back".to_string(),
                name: "Simulated Back Camera".to_string(),
                position: CameraPosition::Back,
                has_torch: true,
            },
        ];

        let mut status = HashMap::new();
        status.insert(Capability::Camera, Authorization::NotDetermined);
        status.insert(Capability::Microphone, Authorization::NotDetermined);

        let mut prompt_answers = HashMap::new();
        prompt_answers.insert(Capability::Camera, Authorization::Authorized);
        prompt_answers.insert(Capability::Microphone, Authorization::Authorized);

        Self {
            state: Arc::new(SimulatedState {
                cameras,
                status: Mutex::new(status),
                prompt_answers,
                deferred: Mutex::new(HashMap::new()),
                video_failures: Mutex::new(VecDeque::new()),
                audio_failures: Mutex::new(VecDeque::new()),
                events: Mutex::new(Vec::new()),
                frame_interval: Duration::from_millis(33),
                chunk_interval: Duration::from_millis(10),
                pixel_format: PixelFormat::Nv12,
            }),
        }
    }

    /// Replace the camera inventory.
    pub fn with_cameras(self, cameras: Vec<CameraDeviceInfo>) -> Self {
        self.map_state(|state| state.cameras = cameras)
    }

    /// Preset the stored authorization for a capability.
    pub fn with_authorization(self, capability: Capability, authorization: Authorization) -> Self {
        if let Ok(mut status) = self.state.status.lock() {
            status.insert(capability, authorization);
        }
        self
    }

    /// Set what a prompt for `capability` resolves to.
    pub fn with_prompt_answer(self, capability: Capability, answer: Authorization) -> Self {
        self.map_state(|state| {
            state.prompt_answers.insert(capability, answer);
        })
    }

    /// Set the synthetic video frame cadence.
    pub fn with_frame_interval(self, interval: Duration) -> Self {
        self.map_state(|state| state.frame_interval = interval)
    }

    /// Set the pixel format of synthetic frames.
    pub fn with_pixel_format(self, format: PixelFormat) -> Self {
        self.map_state(|state| state.pixel_format = format)
    }

    fn map_state(mut self, f: impl FnOnce(&mut SimulatedState)) -> Self {
        // Builder methods run before the platform is shared, so the Arc
        // still has a single owner here.
        if let Some(state) = Arc::get_mut(&mut self.state) {
            f(state);
        }
        self
    }

    /// Hold the next `request_access` for `capability` open until the
    /// returned [`PromptGate`] answers it.
    pub fn defer_next_prompt(&self, capability: Capability) -> PromptGate {
        let (tx, rx) = oneshot::channel();
        if let Ok(mut deferred) = self.state.deferred.lock() {
            deferred.insert(capability, rx);
        }
        PromptGate { tx }
    }

    /// Make the next video input attach fail with `message`.
    pub fn fail_next_video_attach(&self, message: impl Into<String>) {
        if let Ok(mut failures) = self.state.video_failures.lock() {
            failures.push_back(message.into());
        }
    }

    /// Make the next audio input attach fail with `message`.
    pub fn fail_next_audio_attach(&self, message: impl Into<String>) {
        if let Ok(mut failures) = self.state.audio_failures.lock() {
            failures.push_back(message.into());
        }
    }

    /// Snapshot of everything recorded so far.
    pub fn events(&self) -> Vec<PlatformEvent> {
        self.state
            .events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    /// Forget all recorded events.
    pub fn clear_events(&self) {
        if let Ok(mut events) = self.state.events.lock() {
            events.clear();
        }
    }

    /// How many times a video input was successfully negotiated.
    pub fn video_attach_count(&self) -> usize {
        self.events()
            .iter()
            .filter(|event| matches!(event, PlatformEvent::VideoAttached { .. }))
            .count()
    }
}

impl Default for SimulatedPlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl CapturePlatform for SimulatedPlatform {
    fn authorization_status(&self, capability: Capability) -> Authorization {
        self.state.record(PlatformEvent::StatusChecked(capability));
        self.state
            .status
            .lock()
            .ok()
            .and_then(|status| status.get(&capability).copied())
            .unwrap_or(Authorization::NotDetermined)
    }

    fn request_access(&self, capability: Capability) -> BoxFuture<'static, Authorization> {
        let state = Arc::clone(&self.state);
        state.record(PlatformEvent::PermissionPrompted(capability));

        let deferred = state
            .deferred
            .lock()
            .ok()
            .and_then(|mut deferred| deferred.remove(&capability));
        let fallback = state
            .prompt_answers
            .get(&capability)
            .copied()
            .unwrap_or(Authorization::Denied);

        Box::pin(async move {
            let answer = match deferred {
                Some(rx) => rx.await.unwrap_or(fallback),
                None => fallback,
            };
            if let Ok(mut status) = state.status.lock() {
                status.insert(capability, answer);
            }
            answer
        })
    }

    fn cameras(&self) -> Vec<CameraDeviceInfo> {
        self.state.cameras.clone()
    }

    fn create_session(&self, sink: FrameSink) -> Box<dyn CaptureSession> {
        self.state.record(PlatformEvent::SessionCreated);
        Box::new(SimulatedSession {
            state: Arc::clone(&self.state),
            sink,
            video: None,
            video_device: None,
            audio: None,
        })
    }
}

/// Background generator thread, one per attached input.
struct Pump {
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl Pump {
    fn spawn(body: impl FnOnce(Arc<AtomicBool>) + Send + 'static) -> Self {
        let stop = Arc::new(AtomicBool::new(false));
        let stop_for_thread = Arc::clone(&stop);
        let handle = std::thread::spawn(move || body(stop_for_thread));
        Self {
            stop,
            handle: Some(handle),
        }
    }

    fn stop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for Pump {
    fn drop(&mut self) {
        self.stop();
    }
}

struct SimulatedSession {
    state: Arc<SimulatedState>,
    sink: FrameSink,
    video: Option<Pump>,
    video_device: Option<CameraDeviceInfo>,
    audio: Option<Pump>,
}

impl CaptureSession for SimulatedSession {
    fn attach_video_input(
        &mut self,
        device: &CameraDeviceInfo,
        preset: ResolutionPreset,
    ) -> Result<(), SessionError> {
        if self.video.is_some() {
            return Err(SessionError::Platform(
                "video input already attached".to_string(),
            ));
        }

        if let Ok(mut failures) = self.state.video_failures.lock() {
            if let Some(message) = failures.pop_front() {
                drop(failures);
                self.state
                    .record(PlatformEvent::VideoAttachFailed(message.clone()));
                return Err(SessionError::Platform(message));
            }
        }

        if !self.state.cameras.iter().any(|d| d.id == device.id) {
            self.state
                .record(PlatformEvent::VideoAttachFailed(format!(
                    "device {} not present",
                    device.id
                )));
            return Err(SessionError::DeviceUnavailable(device.position));
        }

        let (width, height) = preset.dimensions();
        let format = self.state.pixel_format;
        let interval = self.state.frame_interval;
        let sink = self.sink.clone();

        self.video = Some(Pump::spawn(move |stop| {
            let mut seq: u32 = 0;
            while !stop.load(Ordering::SeqCst) {
                // Orientation and mirroring are stamped by the sink at
                // delivery time; the values here are placeholders.
                sink.deliver_video(VideoFrame {
                    data: vec![0; format.buffer_size(width, height)],
                    width,
                    height,
                    format,
                    timestamp: interval * seq,
                    orientation: VideoOrientation::Portrait,
                    mirrored: false,
                });
                seq += 1;
                std::thread::sleep(interval);
            }
        }));
        self.video_device = Some(device.clone());
        self.state.record(PlatformEvent::VideoAttached {
            device_id: device.id.clone(),
            preset,
        });
        Ok(())
    }

    fn detach_video_input(&mut self) {
        if let Some(mut pump) = self.video.take() {
            pump.stop();
            self.video_device = None;
            self.state.record(PlatformEvent::VideoDetached);
        }
    }

    fn attach_audio_input(&mut self, settings: AudioSettings) -> Result<(), SessionError> {
        if self.audio.is_some() {
            return Err(SessionError::Platform(
                "audio input already attached".to_string(),
            ));
        }

        if let Ok(mut failures) = self.state.audio_failures.lock() {
            if let Some(message) = failures.pop_front() {
                drop(failures);
                self.state
                    .record(PlatformEvent::AudioAttachFailed(message.clone()));
                return Err(SessionError::Platform(message));
            }
        }

        let interval = self.state.chunk_interval;
        let sample_rate = settings.sample_rate;
        let channels = settings.channels;
        let samples_per_chunk =
            (sample_rate as u64 * interval.as_millis() as u64 / 1000) as usize * channels as usize;
        let sink = self.sink.clone();

        self.audio = Some(Pump::spawn(move |stop| {
            let mut seq: u32 = 0;
            while !stop.load(Ordering::SeqCst) {
                sink.deliver_audio(AudioChunk {
                    samples: vec![0; samples_per_chunk],
                    sample_rate,
                    channels,
                    timestamp: interval * seq,
                });
                seq += 1;
                std::thread::sleep(interval);
            }
        }));
        self.state
            .record(PlatformEvent::AudioAttached { sample_rate });
        Ok(())
    }

    fn detach_audio_input(&mut self) {
        if let Some(mut pump) = self.audio.take() {
            pump.stop();
            self.state.record(PlatformEvent::AudioDetached);
        }
    }

    fn set_orientation(&mut self, orientation: VideoOrientation) {
        self.state.record(PlatformEvent::OrientationSet(orientation));
    }

    fn set_torch(&mut self, on: bool) -> Result<(), SessionError> {
        let device = self
            .video_device
            .as_ref()
            .ok_or_else(|| SessionError::Platform("no video input attached".to_string()))?;
        if !device.has_torch {
            return Err(SessionError::TorchUnsupported(device.position));
        }
        self.state.record(PlatformEvent::TorchSet(on));
        Ok(())
    }
}

impl Drop for SimulatedSession {
    fn drop(&mut self) {
        self.detach_video_input();
        self.detach_audio_input();
    }
}
