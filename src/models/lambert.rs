//! Lambertian diffuse model.

use std::f64::consts::FRAC_1_PI;

use nalgebra::Vector3;

use crate::models::brdf::{cosine_direction, Brdf, BrdfEval};

/// Ideal diffuse reflector with unit albedo. Roughness is ignored.
#[derive(Debug, Clone, Copy, Default)]
pub struct Lambert;

impl Brdf for Lambert {
    fn eval(&self, v: &Vector3<f64>, l: &Vector3<f64>, _alpha: f64) -> BrdfEval {
        if v.z <= 0.0 || l.z <= 0.0 {
            return BrdfEval::ZERO;
        }
        let value = l.z * FRAC_1_PI;
        BrdfEval { value, pdf: value }
    }

    fn sample(&self, _v: &Vector3<f64>, _alpha: f64, u1: f64, u2: f64) -> Vector3<f64> {
        cosine_direction(u1, u2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::brdf::test_support::albedo;

    #[test]
    fn albedo_is_one() {
        let a = albedo(&Lambert, 0.7, 0.5, 16);
        assert!((a - 1.0).abs() < 1e-9);
    }

    #[test]
    fn below_horizon_is_black() {
        let v = Vector3::new(0.0, 0.0, 1.0);
        let l = Vector3::new(0.0, 0.6, -0.8);
        assert_eq!(Lambert.eval(&v, &l, 0.2), BrdfEval::ZERO);
    }
}
