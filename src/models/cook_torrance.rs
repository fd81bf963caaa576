//! Cook-Torrance model: Beckmann distribution with the rational Smith
//! approximation for masking-shadowing.

use std::f64::consts::PI;

use nalgebra::Vector3;

use crate::models::brdf::{
    microfacet_pdf, normal_from_slope, reflect, tan2_theta, Brdf, BrdfEval,
};

#[derive(Debug, Clone, Copy, Default)]
pub struct CookTorrance;

impl CookTorrance {
    fn ndf(h: &Vector3<f64>, alpha: f64) -> f64 {
        if h.z <= 0.0 {
            return 0.0;
        }
        let a2 = alpha * alpha;
        let cos4 = h.z * h.z * h.z * h.z;
        (-tan2_theta(h) / a2).exp() / (PI * a2 * cos4)
    }

    fn lambda(w: &Vector3<f64>, alpha: f64) -> f64 {
        let t2 = tan2_theta(w);
        if t2 == 0.0 {
            return 0.0;
        }
        let a = 1.0 / (alpha * t2.sqrt());
        if a >= 1.6 {
            return 0.0;
        }
        (1.0 - 1.259 * a + 0.396 * a * a) / (3.535 * a + 2.181 * a * a)
    }
}

impl Brdf for CookTorrance {
    fn eval(&self, v: &Vector3<f64>, l: &Vector3<f64>, alpha: f64) -> BrdfEval {
        if v.z <= 0.0 || l.z <= 0.0 {
            return BrdfEval::ZERO;
        }
        let h = (v + l).normalize();
        let d = Self::ndf(&h, alpha);
        let g2 = 1.0 / (1.0 + Self::lambda(v, alpha) + Self::lambda(l, alpha));
        BrdfEval {
            value: d * g2 / (4.0 * v.z),
            pdf: microfacet_pdf(d, &h, v),
        }
    }

    fn sample(&self, v: &Vector3<f64>, alpha: f64, u1: f64, u2: f64) -> Vector3<f64> {
        let phi = 2.0 * PI * u1;
        let tan_theta = (-(alpha * alpha) * (1.0 - u2).ln()).max(0.0).sqrt();
        reflect(v, &normal_from_slope(tan_theta, phi))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::brdf::test_support::albedo;

    #[test]
    fn masking_vanishes_at_normal_incidence() {
        let n = Vector3::new(0.0, 0.0, 1.0);
        assert_eq!(CookTorrance::lambda(&n, 0.5), 0.0);
    }

    #[test]
    fn albedo_stays_below_one() {
        let a = albedo(&CookTorrance, 0.3, 0.25, 32);
        assert!(a > 0.5 && a <= 1.05, "got {a}");
    }
}
