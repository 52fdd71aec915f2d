//! End-to-end tests for the camera session controller.
//!
//! These tests drive a controller against the simulated platform and verify
//! the acceptance criteria:
//! - Frames flow only between start and stop, in capture order
//! - Start/stop are idempotent; permission denial refuses a start
//! - Position and preset changes renegotiate the video input in place
//! - Orientation changes never renegotiate
//! - Torch is ignored on the front camera and resets on stop and swap
//! - A dropped consumer never takes down capture
//! - Stop returns even while a delivery callback reads the controller

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use camkit::platform::simulated::{PlatformEvent, SimulatedPlatform};
use camkit::{
    AudioChunk, Authorization, CameraController, CameraDeviceInfo, CameraPosition, Capability,
    CapturePlatform, FrameConsumer, ResolutionPreset, SessionError, SessionState, StatusEvent,
    VideoFrame, VideoOrientation,
};

/// Test helper: consumer that records everything it is handed.
struct TestConsumer {
    frames: Mutex<Vec<VideoFrame>>,
    chunks: Mutex<Vec<AudioChunk>>,
}

impl TestConsumer {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            frames: Mutex::new(Vec::new()),
            chunks: Mutex::new(Vec::new()),
        })
    }

    fn frame_count(&self) -> usize {
        self.frames.lock().unwrap().len()
    }

    fn chunk_count(&self) -> usize {
        self.chunks.lock().unwrap().len()
    }

    fn frames(&self) -> Vec<VideoFrame> {
        self.frames.lock().unwrap().clone()
    }

    fn last_frame(&self) -> Option<VideoFrame> {
        self.frames.lock().unwrap().last().cloned()
    }

    /// Poll until at least `count` frames arrived or the timeout passes.
    async fn wait_for_frames(&self, count: usize, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while self.frame_count() < count {
            if Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        true
    }

    /// Poll until at least `count` audio chunks arrived or the timeout passes.
    async fn wait_for_chunks(&self, count: usize, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while self.chunk_count() < count {
            if Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        true
    }
}

impl FrameConsumer for TestConsumer {
    fn on_video_frame(&self, frame: VideoFrame) {
        self.frames.lock().unwrap().push(frame);
    }

    fn on_audio_chunk(&self, chunk: AudioChunk) {
        self.chunks.lock().unwrap().push(chunk);
    }
}

/// Test helper: platform with a fast frame cadence so tests stay quick.
fn fast_platform() -> Arc<SimulatedPlatform> {
    Arc::new(SimulatedPlatform::new().with_frame_interval(Duration::from_millis(5)))
}

/// Test helper: controller bound to `platform` with a fresh consumer attached.
fn controller_on(platform: &Arc<SimulatedPlatform>) -> (CameraController, Arc<TestConsumer>) {
    let shared: Arc<dyn CapturePlatform> = platform.clone();
    let controller = CameraController::new(shared);
    let consumer = TestConsumer::new();
    let weak = Arc::downgrade(&consumer);
    controller.set_consumer(weak);
    (controller, consumer)
}

/// Test helper: record every status event the controller emits.
fn record_status(controller: &CameraController) -> Arc<Mutex<Vec<StatusEvent>>> {
    let log: Arc<Mutex<Vec<StatusEvent>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&log);
    controller.set_status_handler(move |event| sink.lock().unwrap().push(event));
    log
}

fn prompted_count(platform: &SimulatedPlatform, capability: Capability) -> usize {
    platform
        .events()
        .iter()
        .filter(|e| **e == PlatformEvent::PermissionPrompted(capability))
        .count()
}

// === Lifecycle ===

#[tokio::test]
async fn test_frames_flow_between_start_and_stop() {
    let platform = fast_platform();
    let (controller, consumer) = controller_on(&platform);

    controller.start_camera().await;
    assert!(
        consumer.wait_for_frames(5, Duration::from_secs(2)).await,
        "expected frames after start, got {}",
        consumer.frame_count()
    );

    controller.stop_camera();
    let frozen = consumer.frame_count();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(
        consumer.frame_count(),
        frozen,
        "no frame may arrive after stop_camera returns"
    );
}

#[tokio::test]
async fn test_frames_arrive_in_capture_order() {
    let platform = fast_platform();
    let (controller, consumer) = controller_on(&platform);

    controller.start_camera().await;
    consumer.wait_for_frames(10, Duration::from_secs(2)).await;
    controller.stop_camera();

    let frames = consumer.frames();
    assert!(frames.len() >= 10);
    for pair in frames.windows(2) {
        assert!(
            pair[0].timestamp < pair[1].timestamp,
            "timestamps must be strictly increasing: {:?} then {:?}",
            pair[0].timestamp,
            pair[1].timestamp
        );
    }
}

#[tokio::test]
async fn test_stop_without_start_is_silent() {
    let platform = fast_platform();
    let (controller, _consumer) = controller_on(&platform);
    let status = record_status(&controller);

    controller.stop_camera();
    controller.stop_audio();

    assert_eq!(controller.state(), SessionState::Idle);
    assert!(platform.events().is_empty(), "platform was never touched");
    assert!(status.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_restart_negotiates_a_fresh_input() {
    let platform = fast_platform();
    let (controller, consumer) = controller_on(&platform);

    controller.start_camera().await;
    consumer.wait_for_frames(2, Duration::from_secs(2)).await;
    controller.stop_camera();

    controller.start_camera().await;
    let after_restart = consumer.frame_count();
    assert!(
        consumer
            .wait_for_frames(after_restart + 2, Duration::from_secs(2))
            .await,
        "restart should deliver frames again"
    );
    controller.stop_camera();

    assert_eq!(platform.video_attach_count(), 2);
    // The session is torn down once both paths are stopped.
    let created = platform
        .events()
        .iter()
        .filter(|e| **e == PlatformEvent::SessionCreated)
        .count();
    assert_eq!(created, 2);
}

// === Permissions ===

#[tokio::test]
async fn test_first_start_prompts_once_and_is_remembered() {
    let platform = fast_platform();
    let (controller, consumer) = controller_on(&platform);

    controller.start_camera().await;
    consumer.wait_for_frames(1, Duration::from_secs(2)).await;
    controller.stop_camera();
    controller.start_camera().await;
    controller.stop_camera();

    assert_eq!(
        prompted_count(&platform, Capability::Camera),
        1,
        "the user is asked exactly once"
    );
}

#[tokio::test]
async fn test_denied_camera_refuses_start() {
    let platform = Arc::new(
        SimulatedPlatform::new().with_prompt_answer(Capability::Camera, Authorization::Denied),
    );
    let (controller, consumer) = controller_on(&platform);
    let status = record_status(&controller);

    controller.start_camera().await;

    assert_eq!(controller.state(), SessionState::Idle);
    assert!(!controller.is_video_running());
    assert_eq!(consumer.frame_count(), 0);
    assert_eq!(
        *status.lock().unwrap(),
        vec![StatusEvent::Error(SessionError::PermissionDenied(
            Capability::Camera
        ))]
    );
    assert!(
        !platform.events().contains(&PlatformEvent::SessionCreated),
        "a refused start must not build a session"
    );
}

#[tokio::test]
async fn test_restricted_access_refuses_without_prompting() {
    let platform = Arc::new(
        SimulatedPlatform::new().with_authorization(Capability::Camera, Authorization::Restricted),
    );
    let (controller, _consumer) = controller_on(&platform);

    controller.start_camera().await;

    assert_eq!(controller.state(), SessionState::Idle);
    assert_eq!(
        prompted_count(&platform, Capability::Camera),
        0,
        "restricted access never shows a prompt"
    );
}

#[tokio::test]
async fn test_start_waits_for_prompt_answer() {
    let platform = fast_platform();
    let gate = platform.defer_next_prompt(Capability::Camera);
    let (controller, consumer) = controller_on(&platform);
    let controller = Arc::new(controller);

    let starter = {
        let controller = Arc::clone(&controller);
        tokio::spawn(async move { controller.start_camera().await })
    };

    // Wait until the prompt is actually showing.
    let deadline = Instant::now() + Duration::from_secs(2);
    while prompted_count(&platform, Capability::Camera) == 0 && Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert_eq!(prompted_count(&platform, Capability::Camera), 1);

    // Nothing may start while the user is deciding.
    assert_eq!(controller.state(), SessionState::Idle);
    assert_eq!(consumer.frame_count(), 0);

    gate.answer(Authorization::Authorized);
    starter.await.expect("start task panicked");

    assert_eq!(controller.state(), SessionState::Running);
    assert!(consumer.wait_for_frames(1, Duration::from_secs(2)).await);
    controller.stop_camera();
}

// === Audio path ===

#[tokio::test]
async fn test_audio_runs_independently_of_video() {
    let platform = fast_platform();
    let (controller, consumer) = controller_on(&platform);

    controller.start_audio().await;
    assert!(
        consumer.wait_for_chunks(3, Duration::from_secs(2)).await,
        "expected audio chunks, got {}",
        consumer.chunk_count()
    );
    assert_eq!(consumer.frame_count(), 0, "audio start must not open video");

    controller.stop_audio();
    let frozen = consumer.chunk_count();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(consumer.chunk_count(), frozen);
    assert_eq!(controller.state(), SessionState::Idle);
}

#[tokio::test]
async fn test_stopping_video_leaves_audio_running() {
    let platform = fast_platform();
    let (controller, consumer) = controller_on(&platform);

    controller.start_camera().await;
    controller.start_audio().await;
    consumer.wait_for_chunks(2, Duration::from_secs(2)).await;

    controller.stop_camera();
    assert_eq!(controller.state(), SessionState::Running);

    let before = consumer.chunk_count();
    assert!(
        consumer
            .wait_for_chunks(before + 3, Duration::from_secs(2))
            .await,
        "audio must keep flowing after video stops"
    );
    controller.stop_audio();
}

// === Reconfiguration ===

#[tokio::test]
async fn test_position_change_swaps_input_without_touching_audio() {
    let platform = fast_platform();
    let (controller, consumer) = controller_on(&platform);

    controller.start_camera().await;
    controller.start_audio().await;
    consumer.wait_for_chunks(2, Duration::from_secs(2)).await;

    controller.set_camera_position(CameraPosition::Back);
    assert_eq!(controller.camera_position(), CameraPosition::Back);
    assert_eq!(controller.state(), SessionState::Running);

    let before = consumer.chunk_count();
    assert!(
        consumer
            .wait_for_chunks(before + 3, Duration::from_secs(2))
            .await,
        "audio must keep flowing across a camera swap"
    );

    let events = platform.events();
    assert_eq!(platform.video_attach_count(), 2);
    let audio_attached = events
        .iter()
        .filter(|e| matches!(e, PlatformEvent::AudioAttached { .. }))
        .count();
    assert_eq!(audio_attached, 1, "audio input is negotiated exactly once");
    assert!(!events.contains(&PlatformEvent::AudioDetached));
    let created = events
        .iter()
        .filter(|e| **e == PlatformEvent::SessionCreated)
        .count();
    assert_eq!(created, 1, "a swap reuses the existing session");

    controller.stop_camera();
    controller.stop_audio();
}

#[tokio::test]
async fn test_position_change_to_missing_camera_is_refused() {
    let platform = Arc::new(
        SimulatedPlatform::new()
            .with_cameras(vec![CameraDeviceInfo {
                id: "front-only".to_string(),
                name: "Front".to_string(),
                position: CameraPosition::Front,
                has_torch: false,
            }])
            .with_frame_interval(Duration::from_millis(5)),
    );
    let (controller, consumer) = controller_on(&platform);
    let status = record_status(&controller);

    controller.start_camera().await;
    consumer.wait_for_frames(1, Duration::from_secs(2)).await;

    controller.set_camera_position(CameraPosition::Back);

    // The change is refused; the front camera keeps running untouched.
    assert_eq!(controller.camera_position(), CameraPosition::Front);
    assert_eq!(controller.state(), SessionState::Running);
    assert_eq!(platform.video_attach_count(), 1);
    assert!(status
        .lock()
        .unwrap()
        .contains(&StatusEvent::Error(SessionError::DeviceUnavailable(
            CameraPosition::Back
        ))));

    let before = consumer.frame_count();
    assert!(
        consumer
            .wait_for_frames(before + 2, Duration::from_secs(2))
            .await,
        "frames keep flowing after a refused switch"
    );
    controller.stop_camera();
}

#[tokio::test]
async fn test_preset_change_renegotiates_in_place() {
    let platform = fast_platform();
    let (controller, consumer) = controller_on(&platform);

    controller.start_camera().await;
    consumer.wait_for_frames(2, Duration::from_secs(2)).await;

    controller.set_resolution_preset(ResolutionPreset::Hd1080);
    assert_eq!(controller.resolution_preset(), ResolutionPreset::Hd1080);

    let before = consumer.frame_count();
    assert!(
        consumer
            .wait_for_frames(before + 2, Duration::from_secs(2))
            .await
    );
    let frame = consumer.last_frame().expect("frames were delivered");
    assert_eq!((frame.width, frame.height), (1920, 1080));

    let presets: Vec<ResolutionPreset> = platform
        .events()
        .iter()
        .filter_map(|e| match e {
            PlatformEvent::VideoAttached { preset, .. } => Some(*preset),
            _ => None,
        })
        .collect();
    assert_eq!(presets, vec![ResolutionPreset::Hd720, ResolutionPreset::Hd1080]);
    controller.stop_camera();
}

#[tokio::test]
async fn test_preset_change_leaves_running_audio_untouched() {
    let platform = fast_platform();
    let (controller, consumer) = controller_on(&platform);

    controller.start_camera().await;
    controller.start_audio().await;
    consumer.wait_for_chunks(2, Duration::from_secs(2)).await;

    controller.set_resolution_preset(ResolutionPreset::Hd1080);
    assert_eq!(controller.resolution_preset(), ResolutionPreset::Hd1080);
    assert_eq!(controller.state(), SessionState::Running);
    assert!(controller.is_audio_running());

    let before = consumer.chunk_count();
    assert!(
        consumer
            .wait_for_chunks(before + 3, Duration::from_secs(2))
            .await,
        "audio must keep flowing across a preset change"
    );

    let events = platform.events();
    assert_eq!(platform.video_attach_count(), 2);
    let audio_attached = events
        .iter()
        .filter(|e| matches!(e, PlatformEvent::AudioAttached { .. }))
        .count();
    assert_eq!(audio_attached, 1, "audio input is negotiated exactly once");
    assert!(!events.contains(&PlatformEvent::AudioDetached));

    controller.stop_camera();
    controller.stop_audio();
}

#[tokio::test]
async fn test_setting_the_same_value_does_nothing() {
    let platform = fast_platform();
    let (controller, consumer) = controller_on(&platform);
    let status = record_status(&controller);

    controller.start_camera().await;
    consumer.wait_for_frames(1, Duration::from_secs(2)).await;
    platform.clear_events();
    status.lock().unwrap().clear();

    controller.set_camera_position(CameraPosition::Front);
    controller.set_resolution_preset(ResolutionPreset::Hd720);
    controller.set_video_orientation(VideoOrientation::Portrait);

    assert!(
        platform.events().is_empty(),
        "same-value writes must not touch the platform: {:?}",
        platform.events()
    );
    assert!(status.lock().unwrap().is_empty());
    controller.stop_camera();
}

#[tokio::test]
async fn test_failed_swap_restores_previous_camera() {
    let platform = fast_platform();
    let (controller, consumer) = controller_on(&platform);
    let status = record_status(&controller);

    controller.start_camera().await;
    consumer.wait_for_frames(1, Duration::from_secs(2)).await;

    platform.fail_next_video_attach("sensor busy");
    controller.set_camera_position(CameraPosition::Back);

    // The switch failed but the previous camera is back.
    assert_eq!(controller.camera_position(), CameraPosition::Front);
    assert!(controller.is_video_running());
    assert_eq!(controller.state(), SessionState::Running);
    assert!(status
        .lock()
        .unwrap()
        .contains(&StatusEvent::Error(SessionError::Platform(
            "sensor busy".to_string()
        ))));

    let before = consumer.frame_count();
    assert!(
        consumer
            .wait_for_frames(before + 2, Duration::from_secs(2))
            .await,
        "restored camera must deliver frames"
    );
    controller.stop_camera();
}

#[tokio::test]
async fn test_failed_swap_and_restore_stops_video() {
    let platform = fast_platform();
    let (controller, consumer) = controller_on(&platform);
    let status = record_status(&controller);

    controller.start_camera().await;
    consumer.wait_for_frames(1, Duration::from_secs(2)).await;

    platform.fail_next_video_attach("sensor busy");
    platform.fail_next_video_attach("still busy");
    controller.set_camera_position(CameraPosition::Back);

    assert!(!controller.is_video_running());
    assert_eq!(controller.state(), SessionState::Idle);

    let events = status.lock().unwrap();
    let errors: Vec<&StatusEvent> = events
        .iter()
        .filter(|e| matches!(e, StatusEvent::Error(_)))
        .collect();
    assert_eq!(errors.len(), 2, "both failures are reported: {:?}", events);
    assert_eq!(
        events.last(),
        Some(&StatusEvent::StateChanged(SessionState::Idle))
    );
    drop(events);

    let frozen = consumer.frame_count();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(consumer.frame_count(), frozen, "video is fully stopped");
}

// === Orientation and mirroring ===

#[tokio::test]
async fn test_orientation_change_stamps_frames_without_renegotiating() {
    let platform = fast_platform();
    let (controller, consumer) = controller_on(&platform);

    controller.start_camera().await;
    consumer.wait_for_frames(2, Duration::from_secs(2)).await;

    controller.set_video_orientation(VideoOrientation::LandscapeLeft);

    let deadline = Instant::now() + Duration::from_secs(2);
    let mut stamped = false;
    while Instant::now() < deadline {
        if let Some(frame) = consumer.last_frame() {
            if frame.orientation == VideoOrientation::LandscapeLeft {
                stamped = true;
                break;
            }
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert!(stamped, "new orientation must reach delivered frames");
    assert_eq!(
        platform.video_attach_count(),
        1,
        "orientation is metadata only, never a renegotiation"
    );
    assert_eq!(controller.state(), SessionState::Running);
    controller.stop_camera();
}

#[tokio::test]
async fn test_front_frames_are_mirrored_and_back_frames_are_not() {
    let platform = fast_platform();
    let (controller, consumer) = controller_on(&platform);

    controller.start_camera().await;
    consumer.wait_for_frames(2, Duration::from_secs(2)).await;
    let frame = consumer.last_frame().expect("front frames were delivered");
    assert!(frame.mirrored, "front camera frames are mirrored by default");

    controller.set_camera_position(CameraPosition::Back);
    let deadline = Instant::now() + Duration::from_secs(2);
    let mut unmirrored = false;
    while Instant::now() < deadline {
        if let Some(frame) = consumer.last_frame() {
            if !frame.mirrored {
                unmirrored = true;
                break;
            }
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert!(unmirrored, "back camera frames are never mirrored");
    controller.stop_camera();
}

// === Torch ===

#[tokio::test]
async fn test_torch_resets_when_the_input_changes() {
    let platform = fast_platform();
    let (controller, _consumer) = controller_on(&platform);

    controller.set_camera_position(CameraPosition::Back);
    controller.start_camera().await;
    controller.toggle_torch(true);
    assert!(controller.torch_on());

    controller.set_camera_position(CameraPosition::Front);
    assert!(
        !controller.torch_on(),
        "torch does not survive an input swap"
    );

    controller.set_camera_position(CameraPosition::Back);
    assert!(!controller.torch_on(), "torch stays off until asked again");
    controller.stop_camera();
}

#[tokio::test]
async fn test_torch_while_idle_is_ignored() {
    let platform = fast_platform();
    let (controller, _consumer) = controller_on(&platform);
    let status = record_status(&controller);

    controller.set_camera_position(CameraPosition::Back);
    controller.toggle_torch(true);

    assert!(!controller.torch_on());
    assert!(platform.events().is_empty());
    assert!(status.lock().unwrap().is_empty());
}

// === Consumer lifetime ===

#[tokio::test]
async fn test_dropped_consumer_never_stops_capture() {
    let platform = fast_platform();
    let (controller, consumer) = controller_on(&platform);

    controller.start_camera().await;
    assert!(consumer.wait_for_frames(2, Duration::from_secs(2)).await);

    drop(consumer);
    tokio::time::sleep(Duration::from_millis(30)).await;
    assert_eq!(
        controller.state(),
        SessionState::Running,
        "capture survives its consumer"
    );

    // A replacement consumer picks the stream back up.
    let replacement = TestConsumer::new();
    let weak = Arc::downgrade(&replacement);
    controller.set_consumer(weak);
    assert!(
        replacement.wait_for_frames(2, Duration::from_secs(2)).await,
        "a new consumer receives frames without a restart"
    );
    assert_eq!(platform.video_attach_count(), 1);
    controller.stop_camera();
}

// === Delivery-thread reentrancy ===

/// Test helper: consumer that reads controller state on every frame.
struct StatePollingConsumer {
    controller: Mutex<Option<Arc<CameraController>>>,
    reads: Mutex<Vec<SessionState>>,
}

impl StatePollingConsumer {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            controller: Mutex::new(None),
            reads: Mutex::new(Vec::new()),
        })
    }

    fn read_count(&self) -> usize {
        self.reads.lock().unwrap().len()
    }
}

impl FrameConsumer for StatePollingConsumer {
    fn on_video_frame(&self, _frame: VideoFrame) {
        // Linger so a stop call overlaps an in-flight delivery.
        std::thread::sleep(Duration::from_millis(2));
        let controller = self.controller.lock().unwrap().clone();
        if let Some(controller) = controller {
            self.reads.lock().unwrap().push(controller.state());
        }
    }
}

#[tokio::test]
async fn test_stop_returns_while_a_callback_reads_state() {
    let platform =
        Arc::new(SimulatedPlatform::new().with_frame_interval(Duration::from_millis(1)));
    let shared: Arc<dyn CapturePlatform> = platform.clone();
    let controller = Arc::new(CameraController::new(shared));
    let consumer = StatePollingConsumer::new();
    *consumer.controller.lock().unwrap() = Some(Arc::clone(&controller));
    let weak = Arc::downgrade(&consumer);
    controller.set_consumer(weak);

    controller.start_camera().await;
    let deadline = Instant::now() + Duration::from_secs(2);
    while consumer.read_count() < 3 && Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert!(
        consumer.read_count() >= 3,
        "callbacks should be reading controller state"
    );

    let stopper = {
        let controller = Arc::clone(&controller);
        std::thread::spawn(move || controller.stop_camera())
    };
    let deadline = Instant::now() + Duration::from_secs(3);
    while !stopper.is_finished() && Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert!(
        stopper.is_finished(),
        "stop_camera must return while a delivery callback reads controller state"
    );
    stopper.join().unwrap();
    assert_eq!(controller.state(), SessionState::Idle);
    assert!(!controller.is_video_running());
}
