//! Input abstraction and recording for replays
//!
//! The native side captures one `InputState` per frame; scripts read it
//! through `InputQuery`. Nothing here buffers past frames.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use thiserror::Error;

/// Key codes shared with the native side (GLFW numbering).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u32)]
pub enum KeyCode {
    Space = 32,
    A = 65,
    D = 68,
    S = 83,
    W = 87,
    Escape = 256,
    Enter = 257,
    Right = 262,
    Left = 263,
    Down = 264,
    Up = 265,
}

impl KeyCode {
    pub const ALL: [KeyCode; 11] = [
        KeyCode::Space,
        KeyCode::A,
        KeyCode::D,
        KeyCode::S,
        KeyCode::W,
        KeyCode::Escape,
        KeyCode::Enter,
        KeyCode::Right,
        KeyCode::Left,
        KeyCode::Down,
        KeyCode::Up,
    ];

    pub fn code(self) -> u32 {
        self as u32
    }

    pub fn from_code(code: u32) -> Result<Self, InputError> {
        Self::ALL
            .into_iter()
            .find(|key| key.code() == code)
            .ok_or(InputError::UnknownCode(code))
    }

    pub fn name(self) -> &'static str {
        match self {
            KeyCode::Space => "Space",
            KeyCode::A => "A",
            KeyCode::D => "D",
            KeyCode::S => "S",
            KeyCode::W => "W",
            KeyCode::Escape => "Escape",
            KeyCode::Enter => "Enter",
            KeyCode::Right => "Right",
            KeyCode::Left => "Left",
            KeyCode::Down => "Down",
            KeyCode::Up => "Up",
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum InputError {
    #[error("unknown input code {0}")]
    UnknownCode(u32),
}

/// Keys held during one native frame.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InputState {
    frame: u64,
    down: BTreeSet<KeyCode>,
}

impl InputState {
    /// Snapshot captured for `frame` with the given keys held.
    pub fn capture(frame: u64, keys: impl IntoIterator<Item = KeyCode>) -> Self {
        Self {
            frame,
            down: keys.into_iter().collect(),
        }
    }

    pub fn frame(&self) -> u64 {
        self.frame
    }

    pub fn press(&mut self, key: KeyCode) {
        self.down.insert(key);
    }

    pub fn release(&mut self, key: KeyCode) {
        self.down.remove(&key);
    }

    pub fn is_down(&self, key: KeyCode) -> bool {
        self.down.contains(&key)
    }

    pub fn held(&self) -> impl Iterator<Item = KeyCode> + '_ {
        self.down.iter().copied()
    }
}

/// Stateless read access to one frame's snapshot.
#[derive(Debug, Clone, Copy)]
pub struct InputQuery<'a> {
    state: &'a InputState,
}

impl<'a> InputQuery<'a> {
    pub fn new(state: &'a InputState) -> Self {
        Self { state }
    }

    /// Whether `code` is held in this snapshot. Codes outside the shared
    /// enumeration are an error, not `false`.
    pub fn key_down(&self, code: u32) -> Result<bool, InputError> {
        Ok(self.state.is_down(KeyCode::from_code(code)?))
    }

    pub fn frame(&self) -> u64 {
        self.state.frame()
    }
}

/// Recorded per-frame key sets, replayed into snapshots.
///
/// Index 0 holds the keys for frame 1. Frames past the end have no keys held.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputTimeline {
    frames: Vec<Vec<KeyCode>>,
}

impl InputTimeline {
    pub fn new(frames: Vec<Vec<KeyCode>>) -> Self {
        Self { frames }
    }

    /// Hold `key` for `frames` consecutive frames starting at frame 1.
    pub fn hold(key: KeyCode, frames: usize) -> Self {
        Self {
            frames: vec![vec![key]; frames],
        }
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn snapshot(&self, frame: u64) -> InputState {
        let keys = frame
            .checked_sub(1)
            .and_then(|i| self.frames.get(i as usize))
            .cloned()
            .unwrap_or_default();
        InputState::capture(frame, keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_roundtrip_through_enumeration() {
        for key in KeyCode::ALL {
            assert_eq!(KeyCode::from_code(key.code()), Ok(key));
        }
    }

    #[test]
    fn test_unknown_code_is_an_error() {
        let state = InputState::capture(1, [KeyCode::D]);
        let query = InputQuery::new(&state);
        assert_eq!(query.key_down(9999), Err(InputError::UnknownCode(9999)));
    }

    #[test]
    fn test_query_reflects_snapshot_only() {
        let state = InputState::capture(3, [KeyCode::Right]);
        let query = InputQuery::new(&state);
        assert_eq!(query.key_down(KeyCode::Right.code()), Ok(true));
        assert_eq!(query.key_down(KeyCode::Left.code()), Ok(false));
        assert_eq!(query.frame(), 3);
    }

    #[test]
    fn test_press_and_release() {
        let mut state = InputState::default();
        state.press(KeyCode::Space);
        assert!(state.is_down(KeyCode::Space));
        state.release(KeyCode::Space);
        assert_eq!(state.held().count(), 0);
    }

    #[test]
    fn test_timeline_replays_frames() {
        let timeline = InputTimeline::hold(KeyCode::D, 2);
        assert!(timeline.snapshot(1).is_down(KeyCode::D));
        assert!(timeline.snapshot(2).is_down(KeyCode::D));
        assert!(!timeline.snapshot(3).is_down(KeyCode::D));
        assert!(!timeline.snapshot(0).is_down(KeyCode::D));
        assert_eq!(timeline.snapshot(2).frame(), 2);
    }

    #[test]
    fn test_timeline_deserializes_from_json() {
        let timeline: InputTimeline =
            serde_json::from_str(r#"{ "frames": [["Right"], [], ["Space", "Up"]] }"#).unwrap();
        assert_eq!(timeline.len(), 3);
        assert!(timeline.snapshot(3).is_down(KeyCode::Up));
    }
}
