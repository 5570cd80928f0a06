//! Confidence levels and numeric thresholds shared by the engine

/// Confidence of a node whose position is known a priori
pub const ANCHOR_CONFIDENCE: f64 = 1.0;

/// Default confidence of an unknown node before refinement
pub const LOW_CONFIDENCE: f64 = 0.1;

/// Confidence of a node that must not be used as a reference
pub const ZERO_CONFIDENCE: f64 = 0.0;

/// The refinement convergence threshold is `range / CONVERGENCE_DIVISOR`
pub const CONVERGENCE_DIVISOR: f64 = 1000.0;

/// Accepted window for the second-pass hop scale correction
pub const HOP_SCALE_WINDOW: (f64, f64) = (0.9, 1.1);

/// Singular values below this are treated as rank deficiency
pub const SINGULAR_EPSILON: f64 = 1e-9;
