//! "Charlie" sheen model (Estevez & Kulla) with the Neubelt visibility term.
//!
//! Meant for cloth-like surfaces. Sampling is uniform over the hemisphere.

use std::f64::consts::PI;

use nalgebra::Vector3;

use crate::models::brdf::{Brdf, BrdfEval};

#[derive(Debug, Clone, Copy, Default)]
pub struct Charlie;

impl Charlie {
    fn ndf(h: &Vector3<f64>, alpha: f64) -> f64 {
        let inv_alpha = 1.0 / alpha;
        let sin_theta = (1.0 - h.z * h.z).max(0.0).sqrt();
        (2.0 + inv_alpha) * sin_theta.powf(inv_alpha) / (2.0 * PI)
    }
}

impl Brdf for Charlie {
    fn eval(&self, v: &Vector3<f64>, l: &Vector3<f64>, alpha: f64) -> BrdfEval {
        if v.z <= 0.0 || l.z <= 0.0 {
            return BrdfEval::ZERO;
        }
        let h = (v + l).normalize();
        let vis = 1.0 / (4.0 * (l.z + v.z - l.z * v.z));
        BrdfEval {
            value: Self::ndf(&h, alpha) * vis * l.z,
            pdf: 1.0 / (2.0 * PI),
        }
    }

    fn sample(&self, _v: &Vector3<f64>, _alpha: f64, u1: f64, u2: f64) -> Vector3<f64> {
        let z = u1;
        let r = (1.0 - z * z).max(0.0).sqrt();
        let phi = 2.0 * PI * u2;
        Vector3::new(r * phi.cos(), r * phi.sin(), z)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::brdf::test_support::albedo;

    #[test]
    fn albedo_is_finite_and_positive() {
        let a = albedo(&Charlie, 0.4, 0.5, 24);
        assert!(a.is_finite() && a > 0.0, "got {a}");
    }
}
