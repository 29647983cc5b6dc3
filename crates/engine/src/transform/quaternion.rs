//! Minimal quaternion arithmetic for factor rotation

use std::ops::Mul;

use qpledger_core::{LedgerError, LedgerResult};

/// `w + xi + yj + zk`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quaternion {
    /// Scalar part
    pub w: f64,
    /// `i` component
    pub x: f64,
    /// `j` component
    pub y: f64,
    /// `k` component
    pub z: f64,
}

impl Quaternion {
    /// The multiplicative identity
    pub const IDENTITY: Quaternion = Quaternion::new(1.0, 0.0, 0.0, 0.0);

    /// Build from components
    pub const fn new(w: f64, x: f64, y: f64, z: f64) -> Self {
        Self { w, x, y, z }
    }

    /// Build from `[w, x, y, z]`
    pub const fn from_array(a: [f64; 4]) -> Self {
        Self::new(a[0], a[1], a[2], a[3])
    }

    /// Components as `[w, x, y, z]`
    pub const fn to_array(self) -> [f64; 4] {
        [self.w, self.x, self.y, self.z]
    }

    /// Unit rotation quaternion for `angle` radians about `axis`.
    ///
    /// The axis is normalized here; it must be finite and non-zero.
    pub fn from_axis_angle(axis: [f64; 3], angle: f64) -> LedgerResult<Self> {
        if !angle.is_finite() {
            return Err(LedgerError::invalid_rotation(format!("angle {angle} is not finite")));
        }
        if axis.iter().any(|c| !c.is_finite()) {
            return Err(LedgerError::invalid_rotation("axis has a non-finite component"));
        }
        let len = (axis[0] * axis[0] + axis[1] * axis[1] + axis[2] * axis[2]).sqrt();
        if len == 0.0 || !len.is_finite() {
            return Err(LedgerError::invalid_rotation("axis must have non-zero finite length"));
        }

        let half = angle / 2.0;
        let s = half.sin() / len;
        Ok(Self::new(half.cos(), axis[0] * s, axis[1] * s, axis[2] * s))
    }

    /// Conjugate `w - xi - yj - zk`
    pub fn conjugate(self) -> Self {
        Self::new(self.w, -self.x, -self.y, -self.z)
    }

    /// Squared norm
    pub fn norm_squared(self) -> f64 {
        self.w * self.w + self.x * self.x + self.y * self.y + self.z * self.z
    }

    /// Euclidean norm
    pub fn norm(self) -> f64 {
        self.norm_squared().sqrt()
    }

    /// Multiplicative inverse; `None` for the zero quaternion
    pub fn inverse(self) -> Option<Self> {
        let n = self.norm_squared();
        if n == 0.0 {
            return None;
        }
        let c = self.conjugate();
        Some(Self::new(c.w / n, c.x / n, c.y / n, c.z / n))
    }

    /// `self * v * self⁻¹`, treating `self` as a unit quaternion.
    ///
    /// `v` is used as-is (not normalized), so the identity rotation returns
    /// `v` bit for bit apart from the sign of zeros.
    pub fn conjugate_apply(self, v: Quaternion) -> Quaternion {
        self * v * self.conjugate()
    }
}

impl Mul for Quaternion {
    type Output = Quaternion;

    /// Hamilton product
    fn mul(self, r: Quaternion) -> Quaternion {
        Quaternion::new(
            self.w * r.w - self.x * r.x - self.y * r.y - self.z * r.z,
            self.w * r.x + self.x * r.w + self.y * r.z - self.z * r.y,
            self.w * r.y - self.x * r.z + self.y * r.w + self.z * r.x,
            self.w * r.z + self.x * r.y - self.y * r.x + self.z * r.w,
        )
    }
}
