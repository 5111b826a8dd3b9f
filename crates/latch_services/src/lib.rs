//! Latch Services Layer
//!
//! Platform abstraction the script bridge reads from: the per-frame input
//! snapshot (plus recorded timelines for replays) and engine settings.

pub mod input;
pub mod settings;

pub use input::{InputError, InputQuery, InputState, InputTimeline, KeyCode};
pub use settings::{Settings, SettingsError, UpdateFailurePolicy};
