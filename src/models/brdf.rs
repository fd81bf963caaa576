//! The capability shared by all fittable models.
//!
//! Conventions follow the usual LTC fitting setup: the surface normal is `+Z`,
//! the view direction lies in the XZ plane, `alpha` is the squared roughness.

use std::f64::consts::PI;

use nalgebra::Vector3;

/// Result of evaluating a BRDF for one direction pair.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BrdfEval {
    /// BRDF multiplied by the cosine of the light direction.
    pub value: f64,
    /// Density of [`Brdf::sample`] producing that light direction.
    pub pdf: f64,
}

impl BrdfEval {
    pub const ZERO: BrdfEval = BrdfEval { value: 0.0, pdf: 0.0 };
}

/// A reflectance model.
pub trait Brdf: Send + Sync {
    /// Evaluate for view `v` and light `l` (both unit vectors).
    fn eval(&self, v: &Vector3<f64>, l: &Vector3<f64>, alpha: f64) -> BrdfEval;

    /// Importance-sample a light direction from two uniform numbers in `(0, 1)`.
    fn sample(&self, v: &Vector3<f64>, alpha: f64, u1: f64, u2: f64) -> Vector3<f64>;
}

/// Mirror `v` about the microfacet normal `n`.
pub(crate) fn reflect(v: &Vector3<f64>, n: &Vector3<f64>) -> Vector3<f64> {
    -v + n * (2.0 * n.dot(v))
}

/// Microfacet normal from its spherical slope coordinates.
pub(crate) fn normal_from_slope(tan_theta: f64, phi: f64) -> Vector3<f64> {
    Vector3::new(tan_theta * phi.cos(), tan_theta * phi.sin(), 1.0).normalize()
}

/// Cosine-weighted hemisphere direction.
pub(crate) fn cosine_direction(u1: f64, u2: f64) -> Vector3<f64> {
    let r = u1.sqrt();
    let phi = 2.0 * PI * u2;
    Vector3::new(r * phi.cos(), r * phi.sin(), (1.0 - u1).max(0.0).sqrt())
}

/// Standard microfacet reflection pdf for a sampled half vector.
pub(crate) fn microfacet_pdf(d: f64, h: &Vector3<f64>, v: &Vector3<f64>) -> f64 {
    let v_dot_h = v.dot(h);
    if v_dot_h <= 0.0 {
        return 0.0;
    }
    (d * h.z / (4.0 * v_dot_h)).abs()
}

/// `tan(theta)^2` of a unit direction.
pub(crate) fn tan2_theta(w: &Vector3<f64>) -> f64 {
    let cos2 = w.z * w.z;
    if cos2 <= 0.0 {
        return f64::INFINITY;
    }
    ((1.0 - cos2).max(0.0)) / cos2
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    /// Monte-Carlo estimate of the directional albedo using the model's own
    /// importance sampling.
    pub fn albedo(brdf: &dyn Brdf, theta: f64, alpha: f64, n: usize) -> f64 {
        let v = Vector3::new(theta.sin(), 0.0, theta.cos());
        let mut sum = 0.0;
        for j in 0..n {
            for i in 0..n {
                let u1 = (i as f64 + 0.5) / n as f64;
                let u2 = (j as f64 + 0.5) / n as f64;
                let l = brdf.sample(&v, alpha, u1, u2);
                let e = brdf.eval(&v, &l, alpha);
                if e.pdf > 0.0 {
                    sum += e.value / e.pdf;
                }
            }
        }
        sum / (n * n) as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reflect_about_normal_keeps_normal_incidence() {
        let v = Vector3::new(0.0, 0.0, 1.0);
        let n = Vector3::new(0.0, 0.0, 1.0);
        let r = reflect(&v, &n);
        assert!((r - v).norm() < 1e-12);
    }

    #[test]
    fn cosine_directions_are_unit_and_upper() {
        for &(u1, u2) in &[(0.1, 0.2), (0.5, 0.5), (0.9, 0.75)] {
            let d = cosine_direction(u1, u2);
            assert!((d.norm() - 1.0).abs() < 1e-12);
            assert!(d.z >= 0.0);
        }
    }
}
