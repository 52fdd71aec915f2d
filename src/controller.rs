//! The camera session controller.
//!
//! [`CameraController`] owns the capture lifecycle on behalf of a host
//! application: it resolves permissions, picks devices, builds the platform
//! session, and keeps the session in agreement with the configured camera
//! position, resolution preset, and orientation. Lifecycle calls never
//! return errors; a call that cannot proceed logs why, reports through the
//! status handler if one is set, and leaves the controller in a consistent
//! state. Frames flow to the consumer only between a start call and the
//! matching stop.

use std::sync::{Arc, Mutex, MutexGuard, Weak};

use crate::config::CaptureConfig;
use crate::consumer::{FrameConsumer, FrameSink};
use crate::error::SessionError;
use crate::permissions::{self, Authorization, Capability};
use crate::platform::{CameraDeviceInfo, CapturePlatform, CaptureSession};
use crate::types::{
    AudioSettings, CameraPosition, ResolutionPreset, SessionState, VideoOrientation,
};

/// Out-of-band notification from the controller to the host.
///
/// Emitted after the operation that caused it has finished updating the
/// controller, so a handler may call back into the controller freely.
#[derive(Debug, Clone, PartialEq)]
pub enum StatusEvent {
    /// The lifecycle state changed.
    StateChanged(SessionState),
    /// An operation was refused or an input failed; the controller has
    /// already handled it.
    Error(SessionError),
}

type StatusHandler = Arc<dyn Fn(StatusEvent) + Send + Sync>;

type SessionSlot = Option<Box<dyn CaptureSession>>;

struct ControllerInner {
    position: CameraPosition,
    preset: ResolutionPreset,
    orientation: VideoOrientation,
    mirror_front: bool,
    audio_settings: AudioSettings,
    state: SessionState,
    video_running: bool,
    audio_running: bool,
    torch_on: bool,
}

/// Configures and drives one capture session against a [`CapturePlatform`].
///
/// All methods take `&self`; the controller is safe to share behind an
/// `Arc` and call from any thread. Start calls are async because they may
/// have to wait for the user to answer a permission prompt; everything
/// after that resolves synchronously.
///
/// Mutating operations serialize on an internal session lock, which is the
/// only lock held across platform calls. Observable state sits behind a
/// separate short-lived lock, so a frame-delivery callback can read the
/// controller (state, properties) while a stop or swap is still winding
/// down the capture thread.
pub struct CameraController {
    platform: Arc<dyn CapturePlatform>,
    sink: FrameSink,
    session: Mutex<SessionSlot>,
    inner: Mutex<ControllerInner>,
    status_handler: Mutex<Option<StatusHandler>>,
}

impl CameraController {
    /// Create a controller with default capture settings: front camera,
    /// 720p, portrait, selfie mirroring on.
    pub fn new(platform: Arc<dyn CapturePlatform>) -> Self {
        Self::with_config(platform, CaptureConfig::default())
    }

    /// Create a controller seeded from a loaded [`CaptureConfig`].
    pub fn with_config(platform: Arc<dyn CapturePlatform>, config: CaptureConfig) -> Self {
        let sink = FrameSink::new(config.camera.orientation);
        Self {
            platform,
            sink,
            session: Mutex::new(None),
            inner: Mutex::new(ControllerInner {
                position: config.camera.position,
                preset: config.camera.preset,
                orientation: config.camera.orientation,
                mirror_front: config.camera.mirror_front,
                audio_settings: config.audio,
                state: SessionState::Idle,
                video_running: false,
                audio_running: false,
                torch_on: false,
            }),
            status_handler: Mutex::new(None),
        }
    }

    /// Set the consumer that receives captured frames.
    ///
    /// The controller holds the reference weakly: the host keeps ownership,
    /// and capture continues (dropping frames) if the consumer goes away.
    pub fn set_consumer(&self, consumer: Weak<dyn FrameConsumer>) {
        self.sink.set_consumer(consumer);
    }

    /// Detach the current consumer. Capture keeps running.
    pub fn clear_consumer(&self) {
        self.sink.clear_consumer();
    }

    /// Install a handler for [`StatusEvent`] notifications.
    ///
    /// The handler runs on whichever thread performed the operation, after
    /// the controller has released its internal locks.
    pub fn set_status_handler(&self, handler: impl Fn(StatusEvent) + Send + Sync + 'static) {
        if let Ok(mut slot) = self.status_handler.lock() {
            *slot = Some(Arc::new(handler));
        }
    }

    /// Remove the status handler.
    pub fn clear_status_handler(&self) {
        if let Ok(mut slot) = self.status_handler.lock() {
            *slot = None;
        }
    }

    /// Resolve camera authorization, prompting the user if it has never
    /// been asked. A denial is reported through the status handler.
    pub async fn check_camera_permission(&self) -> Authorization {
        self.resolve_capability(Capability::Camera).await
    }

    /// Resolve microphone authorization, prompting the user if it has
    /// never been asked. A denial is reported through the status handler.
    pub async fn check_microphone_permission(&self) -> Authorization {
        self.resolve_capability(Capability::Microphone).await
    }

    async fn resolve_capability(&self, capability: Capability) -> Authorization {
        let authorization = permissions::resolve(self.platform.as_ref(), capability).await;
        if !authorization.is_granted() {
            self.emit_all(vec![StatusEvent::Error(SessionError::PermissionDenied(
                capability,
            ))]);
        }
        authorization
    }

    /// Start video capture with the configured position and preset.
    ///
    /// Resolves camera permission first, prompting if needed. Does nothing
    /// if video is already running. On denial or device failure the call
    /// logs, emits [`StatusEvent::Error`], and returns with video stopped.
    pub async fn start_camera(&self) {
        if !self.check_camera_permission().await.is_granted() {
            log::warn!("camera start refused: camera access not granted");
            return;
        }

        let mut events = Vec::new();
        {
            let mut slot = self.lock_session();
            self.start_video_locked(&mut slot, &mut events);
        }
        self.emit_all(events);
    }

    /// Stop video capture. Does nothing if video is not running.
    ///
    /// Frame delivery stops before the device is released, so no frame
    /// arrives after this call returns. Audio capture is unaffected.
    pub fn stop_camera(&self) {
        let mut events = Vec::new();
        {
            let mut slot = self.lock_session();
            self.stop_video_locked(&mut slot, &mut events);
        }
        self.emit_all(events);
    }

    /// Start audio capture with the configured settings.
    ///
    /// Resolves microphone permission first, prompting if needed. Does
    /// nothing if audio is already running. Independent of video: either
    /// path can start and stop without the other.
    pub async fn start_audio(&self) {
        if !self.check_microphone_permission().await.is_granted() {
            log::warn!("audio start refused: microphone access not granted");
            return;
        }

        let mut events = Vec::new();
        {
            let mut slot = self.lock_session();
            self.start_audio_locked(&mut slot, &mut events);
        }
        self.emit_all(events);
    }

    /// Stop audio capture. Does nothing if audio is not running.
    pub fn stop_audio(&self) {
        let mut events = Vec::new();
        {
            let mut slot = self.lock_session();
            self.stop_audio_locked(&mut slot, &mut events);
        }
        self.emit_all(events);
    }

    /// Select which camera feeds the session.
    ///
    /// While idle this only stores the value for the next start. While
    /// video runs the input is swapped in place: the old camera detaches,
    /// the new one attaches, audio keeps flowing throughout. If the device
    /// does not exist the change is refused and the previous camera keeps
    /// running. Torch state resets with the swap.
    pub fn set_camera_position(&self, position: CameraPosition) {
        let mut events = Vec::new();
        {
            let mut slot = self.lock_session();
            self.set_position_locked(&mut slot, &mut events, position);
        }
        self.emit_all(events);
    }

    /// Select the capture resolution preset.
    ///
    /// While idle this only stores the value. While video runs the input
    /// is renegotiated in place at the new preset; on failure the previous
    /// preset is restored, and if even that fails the video path stops.
    pub fn set_resolution_preset(&self, preset: ResolutionPreset) {
        let mut events = Vec::new();
        {
            let mut slot = self.lock_session();
            self.set_preset_locked(&mut slot, &mut events, preset);
        }
        self.emit_all(events);
    }

    /// Set the orientation stamped on delivered frames.
    ///
    /// Takes effect from the next frame on. Never interrupts capture and
    /// never changes lifecycle state.
    pub fn set_video_orientation(&self, orientation: VideoOrientation) {
        let mut slot = self.lock_session();
        {
            let mut inner = self.lock_inner();
            if inner.orientation == orientation {
                return;
            }
            inner.orientation = orientation;
        }
        self.sink.set_orientation(orientation);
        if let Some(session) = slot.as_mut() {
            session.set_orientation(orientation);
        }
        log::debug!("video orientation set to {}", orientation);
    }

    /// Enable or disable selfie mirroring of front-camera frames.
    pub fn set_mirror_front(&self, mirror: bool) {
        let _slot = self.lock_session();
        let stamp = {
            let mut inner = self.lock_inner();
            if inner.mirror_front == mirror {
                return;
            }
            inner.mirror_front = mirror;
            inner.position == CameraPosition::Front && mirror
        };
        self.sink.set_mirrored(stamp);
    }

    /// Switch the torch on or off.
    ///
    /// Ignored while video is not running and on the front camera, which
    /// has no torch. A hardware refusal is absorbed the same way; torch
    /// problems never interrupt capture and are never reported as errors.
    pub fn toggle_torch(&self, on: bool) {
        let mut slot = self.lock_session();
        {
            let inner = self.lock_inner();
            if !inner.video_running {
                log::debug!("torch ignored: video not running");
                return;
            }
            if inner.position == CameraPosition::Front {
                log::debug!("torch ignored: front camera has none");
                return;
            }
        }
        let Some(session) = slot.as_mut() else {
            return;
        };
        match session.set_torch(on) {
            Ok(()) => {
                self.lock_inner().torch_on = on;
                log::info!("torch {}", if on { "on" } else { "off" });
            }
            Err(e) => {
                log::warn!("torch request ignored: {}", e);
            }
        }
    }

    pub fn camera_position(&self) -> CameraPosition {
        self.lock_inner().position
    }

    pub fn resolution_preset(&self) -> ResolutionPreset {
        self.lock_inner().preset
    }

    pub fn video_orientation(&self) -> VideoOrientation {
        self.lock_inner().orientation
    }

    pub fn mirror_front(&self) -> bool {
        self.lock_inner().mirror_front
    }

    pub fn audio_settings(&self) -> AudioSettings {
        self.lock_inner().audio_settings
    }

    pub fn state(&self) -> SessionState {
        self.lock_inner().state
    }

    pub fn is_video_running(&self) -> bool {
        self.lock_inner().video_running
    }

    pub fn is_audio_running(&self) -> bool {
        self.lock_inner().audio_running
    }

    pub fn torch_on(&self) -> bool {
        self.lock_inner().torch_on
    }

    fn lock_session(&self) -> MutexGuard<'_, SessionSlot> {
        self.session.lock().expect("session lock poisoned")
    }

    fn lock_inner(&self) -> MutexGuard<'_, ControllerInner> {
        self.inner.lock().expect("controller state lock poisoned")
    }

    fn emit_all(&self, events: Vec<StatusEvent>) {
        if events.is_empty() {
            return;
        }
        let handler = self
            .status_handler
            .lock()
            .ok()
            .and_then(|slot| slot.clone());
        if let Some(handler) = handler {
            for event in events {
                handler(event);
            }
        }
    }

    fn set_position_locked(
        &self,
        slot: &mut SessionSlot,
        events: &mut Vec<StatusEvent>,
        position: CameraPosition,
    ) {
        let (preset, mirror_front) = {
            let mut inner = self.lock_inner();
            if inner.position == position {
                return;
            }
            if !inner.video_running {
                log::debug!("camera position set to {} (video idle)", position);
                inner.position = position;
                return;
            }
            (inner.preset, inner.mirror_front)
        };

        let Some(device) = self.platform.camera_at(position) else {
            log::warn!("camera switch refused: no {} camera", position);
            events.push(StatusEvent::Error(SessionError::DeviceUnavailable(
                position,
            )));
            return;
        };

        self.update_state(events, SessionState::Configuring);
        // Stamp metadata for the new camera before its first frame can
        // pass the gate.
        self.sink
            .set_mirrored(position == CameraPosition::Front && mirror_front);
        match self.swap_video_input(slot, &device, preset) {
            Ok(()) => {
                {
                    let mut inner = self.lock_inner();
                    inner.position = position;
                    inner.torch_on = false;
                }
                self.update_state(events, SessionState::Running);
                log::info!("camera switched to {}", position);
            }
            Err(e) => {
                log::error!("camera switch to {} failed: {}", position, e);
                events.push(StatusEvent::Error(e));
                self.restore_or_halt_video(slot, events);
            }
        }
    }

    fn set_preset_locked(
        &self,
        slot: &mut SessionSlot,
        events: &mut Vec<StatusEvent>,
        preset: ResolutionPreset,
    ) {
        let position = {
            let mut inner = self.lock_inner();
            if inner.preset == preset {
                return;
            }
            if !inner.video_running {
                log::debug!("resolution preset set to {} (video idle)", preset);
                inner.preset = preset;
                return;
            }
            inner.position
        };

        let Some(device) = self.platform.camera_at(position) else {
            // The running camera has vanished; treat like a failed swap.
            log::error!("preset change failed: no {} camera", position);
            events.push(StatusEvent::Error(SessionError::DeviceUnavailable(
                position,
            )));
            self.halt_video_locked(slot, events);
            return;
        };

        self.update_state(events, SessionState::Configuring);
        match self.swap_video_input(slot, &device, preset) {
            Ok(()) => {
                {
                    let mut inner = self.lock_inner();
                    inner.preset = preset;
                    inner.torch_on = false;
                }
                self.update_state(events, SessionState::Running);
                log::info!("resolution preset changed to {}", preset);
            }
            Err(e) => {
                log::error!("preset change to {} failed: {}", preset, e);
                events.push(StatusEvent::Error(e));
                self.restore_or_halt_video(slot, events);
            }
        }
    }

    fn start_video_locked(&self, slot: &mut SessionSlot, events: &mut Vec<StatusEvent>) {
        let (position, preset, orientation, mirror_front) = {
            let inner = self.lock_inner();
            if inner.video_running {
                log::debug!("start_camera ignored: already running");
                return;
            }
            (
                inner.position,
                inner.preset,
                inner.orientation,
                inner.mirror_front,
            )
        };

        let Some(device) = self.platform.camera_at(position) else {
            log::error!("camera start failed: no {} camera", position);
            events.push(StatusEvent::Error(SessionError::DeviceUnavailable(
                position,
            )));
            return;
        };

        self.update_state(events, SessionState::Configuring);

        let session =
            slot.get_or_insert_with(|| self.platform.create_session(self.sink.clone()));
        match session.attach_video_input(&device, preset) {
            Ok(()) => {
                session.set_orientation(orientation);
                {
                    let mut inner = self.lock_inner();
                    inner.video_running = true;
                    inner.torch_on = false;
                }
                self.sink
                    .set_mirrored(position == CameraPosition::Front && mirror_front);
                self.sink.set_video_live(true);
                self.update_state(events, SessionState::Running);
                log::info!("camera started: {} at {}", position, preset);
            }
            Err(e) => {
                log::error!("camera start failed: {}", e);
                events.push(StatusEvent::Error(e));
                self.release_session_if_unused(slot);
                let fallback = if self.lock_inner().audio_running {
                    SessionState::Running
                } else {
                    SessionState::Idle
                };
                self.update_state(events, fallback);
            }
        }
    }

    fn stop_video_locked(&self, slot: &mut SessionSlot, events: &mut Vec<StatusEvent>) {
        {
            let inner = self.lock_inner();
            if !inner.video_running {
                log::debug!("stop_camera ignored: not running");
                return;
            }
        }

        self.update_state(events, SessionState::Configuring);

        // Close the gate first so no frame outlives the stop call. The
        // state lock is not held while the platform winds the input down,
        // so an in-flight delivery callback can still read the controller.
        self.sink.set_video_live(false);
        if let Some(session) = slot.as_mut() {
            session.detach_video_input();
        }
        let next = {
            let mut inner = self.lock_inner();
            inner.video_running = false;
            inner.torch_on = false;
            if inner.audio_running {
                SessionState::Running
            } else {
                SessionState::Idle
            }
        };
        self.release_session_if_unused(slot);
        self.update_state(events, next);
        log::info!("camera stopped");
    }

    fn start_audio_locked(&self, slot: &mut SessionSlot, events: &mut Vec<StatusEvent>) {
        let settings = {
            let inner = self.lock_inner();
            if inner.audio_running {
                log::debug!("start_audio ignored: already running");
                return;
            }
            inner.audio_settings
        };

        self.update_state(events, SessionState::Configuring);

        let session =
            slot.get_or_insert_with(|| self.platform.create_session(self.sink.clone()));
        match session.attach_audio_input(settings) {
            Ok(()) => {
                self.lock_inner().audio_running = true;
                self.sink.set_audio_live(true);
                self.update_state(events, SessionState::Running);
                log::info!(
                    "audio started: {} Hz, {} channel(s)",
                    settings.sample_rate,
                    settings.channels
                );
            }
            Err(e) => {
                log::error!("audio start failed: {}", e);
                events.push(StatusEvent::Error(e));
                self.release_session_if_unused(slot);
                let fallback = if self.lock_inner().video_running {
                    SessionState::Running
                } else {
                    SessionState::Idle
                };
                self.update_state(events, fallback);
            }
        }
    }

    fn stop_audio_locked(&self, slot: &mut SessionSlot, events: &mut Vec<StatusEvent>) {
        {
            let inner = self.lock_inner();
            if !inner.audio_running {
                log::debug!("stop_audio ignored: not running");
                return;
            }
        }

        self.update_state(events, SessionState::Configuring);

        self.sink.set_audio_live(false);
        if let Some(session) = slot.as_mut() {
            session.detach_audio_input();
        }
        let next = {
            let mut inner = self.lock_inner();
            inner.audio_running = false;
            if inner.video_running {
                SessionState::Running
            } else {
                SessionState::Idle
            }
        };
        self.release_session_if_unused(slot);
        self.update_state(events, next);
        log::info!("audio stopped");
    }

    /// Detach the current video input and attach `device` at `preset`.
    /// Delivery is gated off for the whole swap and back on only when the
    /// new input is live, so no half-configured frame slips through.
    fn swap_video_input(
        &self,
        slot: &mut SessionSlot,
        device: &CameraDeviceInfo,
        preset: ResolutionPreset,
    ) -> Result<(), SessionError> {
        let orientation = self.lock_inner().orientation;
        let session = slot
            .as_mut()
            .ok_or_else(|| SessionError::Platform("no active capture session".to_string()))?;

        self.sink.set_video_live(false);
        session.detach_video_input();
        session.attach_video_input(device, preset)?;
        session.set_orientation(orientation);
        self.sink.set_video_live(true);
        Ok(())
    }

    /// After a failed swap: try to bring the previous input back, and stop
    /// the video path if that fails too.
    fn restore_or_halt_video(&self, slot: &mut SessionSlot, events: &mut Vec<StatusEvent>) {
        let (position, preset, mirror_front) = {
            let inner = self.lock_inner();
            (inner.position, inner.preset, inner.mirror_front)
        };
        self.sink
            .set_mirrored(position == CameraPosition::Front && mirror_front);
        let restored = match self.platform.camera_at(position) {
            Some(device) => self.swap_video_input(slot, &device, preset),
            None => Err(SessionError::DeviceUnavailable(position)),
        };

        match restored {
            Ok(()) => {
                self.lock_inner().torch_on = false;
                self.update_state(events, SessionState::Running);
                log::warn!("previous camera restored after failed switch");
            }
            Err(e) => {
                log::error!("could not restore previous camera: {}", e);
                events.push(StatusEvent::Error(e));
                self.halt_video_locked(slot, events);
            }
        }
    }

    /// Force the video path down after an unrecoverable input failure.
    fn halt_video_locked(&self, slot: &mut SessionSlot, events: &mut Vec<StatusEvent>) {
        self.sink.set_video_live(false);
        if let Some(session) = slot.as_mut() {
            session.detach_video_input();
        }
        let next = {
            let mut inner = self.lock_inner();
            inner.video_running = false;
            inner.torch_on = false;
            if inner.audio_running {
                SessionState::Running
            } else {
                SessionState::Idle
            }
        };
        self.release_session_if_unused(slot);
        self.update_state(events, next);
    }

    fn release_session_if_unused(&self, slot: &mut SessionSlot) {
        let unused = {
            let inner = self.lock_inner();
            !inner.video_running && !inner.audio_running
        };
        if unused {
            *slot = None;
        }
    }

    fn update_state(&self, events: &mut Vec<StatusEvent>, next: SessionState) {
        let mut inner = self.lock_inner();
        if inner.state != next {
            log::debug!("session state: {} -> {}", inner.state, next);
            inner.state = next;
            events.push(StatusEvent::StateChanged(next));
        }
    }
}

impl Drop for CameraController {
    fn drop(&mut self) {
        // Tear everything down without emitting events; the host is gone.
        self.sink.set_video_live(false);
        self.sink.set_audio_live(false);
        let retired = match self.session.get_mut() {
            Ok(slot) => slot.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        drop(retired);
    }
}
