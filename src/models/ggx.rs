//! GGX (Trowbridge-Reitz) microfacet specular model with height-correlated
//! Smith masking-shadowing.

use std::f64::consts::PI;

use nalgebra::Vector3;

use crate::models::brdf::{
    microfacet_pdf, normal_from_slope, reflect, tan2_theta, Brdf, BrdfEval,
};

#[derive(Debug, Clone, Copy, Default)]
pub struct Ggx;

impl Ggx {
    fn ndf(h: &Vector3<f64>, alpha: f64) -> f64 {
        if h.z <= 0.0 {
            return 0.0;
        }
        let a2 = alpha * alpha;
        let slope2 = tan2_theta(h);
        let denom = 1.0 + slope2 / a2;
        let cos4 = h.z * h.z * h.z * h.z;
        1.0 / (denom * denom * PI * a2 * cos4)
    }

    fn lambda(w: &Vector3<f64>, alpha: f64) -> f64 {
        let t2 = tan2_theta(w);
        if t2 == 0.0 {
            return 0.0;
        }
        if !t2.is_finite() {
            return f64::INFINITY;
        }
        0.5 * (-1.0 + (1.0 + alpha * alpha * t2).sqrt())
    }
}

impl Brdf for Ggx {
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
        let tan_theta = alpha * (u2 / (1.0 - u2)).sqrt();
        reflect(v, &normal_from_slope(tan_theta, phi))
    }
}
