//! Factor transform engine
//!
//! - `quaternion`: Hamilton-product quaternions
//! - `rotate`: slot packing and the rotate read-modify-write

pub mod quaternion;
pub mod rotate;

pub use quaternion::Quaternion;
pub use rotate::{pack, rotate_factors, unpack, FactorTransform, RotateResult, PSI1_PRIMES, PSI2_PRIMES};
