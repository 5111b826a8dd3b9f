//! Latch Engine Core
//!
//! Native-side state that scripts reach through the bridge:
//! - Entity allocation with generation-tagged handles
//! - Component type registry with field layouts
//! - Byte-column component storage owned by the `World`
//! - Frame clock and math re-exports

pub mod ecs;
pub mod math;
pub mod time;

pub use glam;

/// Engine version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_is_set() {
        assert!(!VERSION.is_empty());
    }
}
