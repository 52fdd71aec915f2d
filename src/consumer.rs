//! Frame delivery to the external consumer (the AR SDK).
//!
//! The consumer is held weakly: its lifetime belongs to the host application,
//! and the controller keeps working after the consumer goes away, silently
//! dropping frames. Delivery runs on the platform's capture thread and
//! forwards buffers in arrival order; backpressure handling is the consumer's
//! job, never this crate's.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};

use crate::types::{AudioChunk, VideoFrame, VideoOrientation};

/// Receiver of captured sample buffers.
///
/// Implemented by the AR SDK integration. Methods are called on the
/// platform's capture threads, so implementations must hand the data off
/// quickly rather than block. A callback may read controller state, but
/// must not call lifecycle or setter operations: those wait on the
/// operation that is driving the capture thread.
pub trait FrameConsumer: Send + Sync {
    /// Called for every captured video frame while the video path runs.
    fn on_video_frame(&self, frame: VideoFrame);

    /// Called for every captured audio buffer while the audio path runs.
    fn on_audio_chunk(&self, chunk: AudioChunk) {
        let _ = chunk;
    }
}

/// Shared state between the controller and the platform session.
struct SinkShared {
    consumer: Mutex<Weak<dyn FrameConsumer>>,
    orientation: Mutex<VideoOrientation>,
    mirrored: AtomicBool,
    video_gate: AtomicBool,
    audio_gate: AtomicBool,
}

/// Delivery handle a platform session pushes captured samples into.
///
/// Cloneable; the controller keeps one clone to flip gates and restamp
/// metadata, the platform session keeps another to deliver. A closed gate
/// drops samples immediately, which is what makes stop take effect before
/// the platform has finished detaching its input.
#[derive(Clone)]
pub struct FrameSink {
    shared: Arc<SinkShared>,
}

impl FrameSink {
    pub(crate) fn new(orientation: VideoOrientation) -> Self {
        Self {
            shared: Arc::new(SinkShared {
                consumer: Mutex::new(Weak::<NullConsumer>::new()),
                orientation: Mutex::new(orientation),
                mirrored: AtomicBool::new(false),
                video_gate: AtomicBool::new(false),
                audio_gate: AtomicBool::new(false),
            }),
        }
    }

    /// Deliver one video frame to the consumer, stamping the current
    /// orientation and mirror flag. Dropped without error when the video
    /// gate is closed or the consumer is unset/gone.
    pub fn deliver_video(&self, mut frame: VideoFrame) {
        if !self.shared.video_gate.load(Ordering::SeqCst) {
            return;
        }

        let consumer = match self.shared.consumer.lock() {
            Ok(weak) => weak.upgrade(),
            Err(_) => None,
        };
        let Some(consumer) = consumer else {
            return;
        };

        if let Ok(orientation) = self.shared.orientation.lock() {
            frame.orientation = *orientation;
        }
        frame.mirrored = self.shared.mirrored.load(Ordering::SeqCst);

        // The consumer lock is released here: a consumer callback may call
        // back into the controller without deadlocking.
        consumer.on_video_frame(frame);
    }

    /// Deliver one audio buffer to the consumer. Same drop rules as video,
    /// gated independently.
    pub fn deliver_audio(&self, chunk: AudioChunk) {
        if !self.shared.audio_gate.load(Ordering::SeqCst) {
            return;
        }

        let consumer = match self.shared.consumer.lock() {
            Ok(weak) => weak.upgrade(),
            Err(_) => None,
        };
        if let Some(consumer) = consumer {
            consumer.on_audio_chunk(chunk);
        }
    }

    pub(crate) fn set_consumer(&self, consumer: Weak<dyn FrameConsumer>) {
        if let Ok(mut slot) = self.shared.consumer.lock() {
            *slot = consumer;
        }
    }

    pub(crate) fn clear_consumer(&self) {
        self.set_consumer(Weak::<NullConsumer>::new());
    }

    pub(crate) fn set_orientation(&self, orientation: VideoOrientation) {
        if let Ok(mut slot) = self.shared.orientation.lock() {
            *slot = orientation;
        }
    }

    pub(crate) fn set_mirrored(&self, mirrored: bool) {
        self.shared.mirrored.store(mirrored, Ordering::SeqCst);
    }

    pub(crate) fn set_video_live(&self, live: bool) {
        self.shared.video_gate.store(live, Ordering::SeqCst);
    }

    pub(crate) fn set_audio_live(&self, live: bool) {
        self.shared.audio_gate.store(live, Ordering::SeqCst);
    }
}

/// Placeholder type so an empty `Weak<dyn FrameConsumer>` can be built
/// without ever allocating a consumer.
struct NullConsumer;

impl FrameConsumer for NullConsumer {
    fn on_video_frame(&self, _frame: VideoFrame) {}
}
