//! Linear algebra type system for the longitudinal estimators
//!
//! Fixed-size aliases so every matrix product in the 2-state filter is
//! dimension-checked at compile time.

use nalgebra::{SMatrix, SVector};

// ===== State Dimensions =====
pub const STATE_DIM: usize = 2; // (position, velocity)

// ===== Measurement Dimensions =====
pub const MEASURE_DIM_POS: usize = 1; // longitudinal position

// ===== 2-State Filter Types =====
pub type StateVec2 = SVector<f64, STATE_DIM>;
pub type StateMat2 = SMatrix<f64, STATE_DIM, STATE_DIM>;

// Control input model B (2×1)
pub type ControlVec2 = SVector<f64, STATE_DIM>;

// Measurement model H (1×2)
pub type MeasurementRow = SMatrix<f64, MEASURE_DIM_POS, STATE_DIM>;

// Kalman gain (2×1)
pub type KalmanGainPos = SMatrix<f64, STATE_DIM, MEASURE_DIM_POS>;
