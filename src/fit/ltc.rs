//! Linearly transformed cosine lobe.
//!
//! A clamped cosine distribution `D_o(w) = max(w.z, 0) / pi` transformed by a
//! 3x3 matrix `M`. The lobe is parameterised by a frame `(x, y, z)` and the
//! scale/skew terms `m11`, `m22`, `m13`:
//!
//! ```text
//! M = [x y z] * | m11  0   m13 |
//!               |  0  m22   0  |
//!               |  0   0    1  |
//! ```

use std::f64::consts::{FRAC_1_PI, PI};

use nalgebra::{Matrix3, Vector3};

#[derive(Debug, Clone)]
pub struct LtcLobe {
    /// Lobe magnitude (BRDF albedo).
    pub magnitude: f64,
    /// Average Schlick fresnel term.
    pub fresnel: f64,

    pub m11: f64,
    pub m22: f64,
    pub m13: f64,
    pub x: Vector3<f64>,
    pub y: Vector3<f64>,
    pub z: Vector3<f64>,

    m: Matrix3<f64>,
    inv_m: Matrix3<f64>,
    det_m: f64,
    invertible: bool,
}

impl Default for LtcLobe {
    fn default() -> Self {
        let mut lobe = Self {
            magnitude: 1.0,
            fresnel: 1.0,
            m11: 1.0,
            m22: 1.0,
            m13: 0.0,
            x: Vector3::x(),
            y: Vector3::y(),
            z: Vector3::z(),
            m: Matrix3::identity(),
            inv_m: Matrix3::identity(),
            det_m: 1.0,
            invertible: true,
        };
        lobe.update();
        lobe
    }
}

impl LtcLobe {
    /// Recompute the matrix form after changing the parametric form.
    #[rustfmt::skip]
    pub fn update(&mut self) {
        let frame = Matrix3::from_columns(&[self.x, self.y, self.z]);
        self.m = frame * Matrix3::new(
            self.m11, 0.0,      self.m13,
            0.0,      self.m22, 0.0,
            0.0,      0.0,      1.0,
        );
        self.det_m = self.m.determinant().abs();
        match self.m.try_inverse() {
            Some(inv) => {
                self.inv_m = inv;
                self.invertible = true;
            }
            None => {
                self.inv_m = Matrix3::identity();
                self.invertible = false;
            }
        }
    }

    pub fn matrix(&self) -> &Matrix3<f64> {
        &self.m
    }

    /// Whether the current matrix can be inverted and stored.
    pub fn is_well_formed(&self) -> bool {
        self.invertible
            && self.m.iter().all(|v| v.is_finite())
            && self.det_m.is_finite()
            && self.det_m > 0.0
            && self.magnitude.is_finite()
            && self.fresnel.is_finite()
    }

    /// Evaluate the lobe in direction `l` (unit vector).
    pub fn eval(&self, l: &Vector3<f64>) -> f64 {
        let original = self.inv_m * l;
        let norm = original.norm();
        if norm <= 0.0 || !norm.is_finite() {
            return 0.0;
        }
        let original = original / norm;
        let transformed = self.m * original;
        let len = transformed.norm();
        let jacobian = self.det_m / (len * len * len);
        if jacobian <= 0.0 || !jacobian.is_finite() {
            return 0.0;
        }
        let d = original.z.max(0.0) * FRAC_1_PI;
        self.magnitude * d / jacobian
    }

    /// Importance-sample a direction from two uniform numbers in `[0, 1)`.
    pub fn sample(&self, u1: f64, u2: f64) -> Vector3<f64> {
        let theta = u1.sqrt().acos();
        let phi = 2.0 * PI * u2;
        let dir = Vector3::new(theta.sin() * phi.cos(), theta.sin() * phi.sin(), theta.cos());
        (self.m * dir).normalize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_lobe_is_a_clamped_cosine() {
        let lobe = LtcLobe::default();
        let l = Vector3::new(0.6, 0.0, 0.8);
        assert!((lobe.eval(&l) - 0.8 * FRAC_1_PI).abs() < 1e-12);
        assert_eq!(lobe.eval(&Vector3::new(0.0, 0.6, -0.8)), 0.0);
    }

    #[test]
    fn lobe_integrates_to_its_magnitude() {
        let mut lobe = LtcLobe {
            magnitude: 0.7,
            m11: 0.3,
            m22: 0.5,
            m13: 0.1,
            ..LtcLobe::default()
        };
        lobe.update();

        // Uniform sphere quadrature.
        let n = 400;
        let mut sum = 0.0;
        for j in 0..n {
            for i in 0..2 * n {
                let cos_t = 1.0 - 2.0 * (j as f64 + 0.5) / n as f64;
                let sin_t = (1.0 - cos_t * cos_t).sqrt();
                let phi = 2.0 * PI * (i as f64 + 0.5) / (2 * n) as f64;
                let l = Vector3::new(sin_t * phi.cos(), sin_t * phi.sin(), cos_t);
                sum += lobe.eval(&l);
            }
        }
        let integral = sum * 4.0 * PI / (2 * n * n) as f64;
        assert!((integral - 0.7).abs() < 1e-2, "got {integral}");
    }

    #[test]
    fn samples_follow_the_transform() {
        let lobe = LtcLobe::default();
        let d = lobe.sample(1.0, 0.3);
        assert!((d - Vector3::z()).norm() < 1e-12);

        // Cosine-distributed: the identity lobe puts cos(theta) at sqrt(u1).
        for u1 in [0.0, 0.1, 0.25, 0.64, 0.9] {
            let d = lobe.sample(u1, 0.7);
            assert!((d.z - u1.sqrt()).abs() < 1e-12, "u1 {u1}: z {}", d.z);
            assert!((d.norm() - 1.0).abs() < 1e-12);
        }

        let mut stretched = LtcLobe {
            m11: 0.5,
            m22: 0.5,
            ..LtcLobe::default()
        };
        stretched.update();
        let d = stretched.sample(0.25, 0.0);
        let expected = (stretched.matrix() * Vector3::new(0.75f64.sqrt(), 0.0, 0.5)).normalize();
        assert!((d - expected).norm() < 1e-12);
    }
}
