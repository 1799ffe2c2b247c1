//! Audio capture
//!
//! Wraps CPAL microphone capture for the recording flows. A take is one
//! fixed-window recording; the recorder buffers raw samples in memory and the
//! take renders them as WAV for upload (or saves them to disk when asked).

mod recorder;

pub use recorder::{AudioDeviceInfo, AudioRecorder, Take};
