//! Math types shared with scripts
//!
//! Re-exports glam; `Vec2` is the engine's two-field float vector.

pub use glam::*;

/// Component-wise comparison within `epsilon`, for tests and tolerance checks.
pub fn approx_eq(a: Vec2, b: Vec2, epsilon: f32) -> bool {
    a.abs_diff_eq(b, epsilon)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_approx_eq() {
        assert!(approx_eq(vec2(1.0, 2.0), vec2(1.0 + 1e-6, 2.0), 1e-4));
        assert!(!approx_eq(vec2(1.0, 2.0), vec2(1.1, 2.0), 1e-4));
    }
}
