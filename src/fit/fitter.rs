//! LTC table fitting for a single BRDF model.
//!
//! The table is indexed by roughness and view angle:
//! - `alpha = max(roughness^2, min_alpha)` with `roughness = a / (N - 1)`
//! - `theta` parameterised by `x = t / (N - 1)` with `cos(theta) = 1 - x^2`
//!
//! Rows are processed from the roughest to the smoothest and each entry seeds
//! the next one, which keeps the Nelder–Mead searches short. Every entry is a
//! checkpoint: progress is reported and the abort signal honoured there.

use std::path::PathBuf;

use nalgebra::Vector3;

use crate::domain::{FitReport, FitTarget};
use crate::error::FitError;
use crate::fit::ltc::LtcLobe;
use crate::fit::routine::{FitRoutine, RoutineFactory};
use crate::io::table::{LtcEntry, LtcTable};
use crate::math::{nelder_mead, SimplexOptions};
use crate::models::Brdf;

/// Largest view angle fitted; grazing angles are numerically unusable.
const MAX_THETA: f64 = 1.57;

/// Parameters of the table fit. Also acts as the factory of [`LtcFitter`]s.
#[derive(Debug, Clone)]
pub struct LtcFitConfig {
    /// Size of the precomputed table (theta, alpha).
    pub table_size: usize,
    /// Samples per dimension used to estimate averages and errors.
    pub sample_count: usize,
    /// Number of newly fitted entries between two partial saves.
    pub flush_interval: usize,
    /// Minimal alpha, avoids singular lobes.
    pub min_alpha: f64,
    pub simplex: SimplexOptions,
}

impl Default for LtcFitConfig {
    fn default() -> Self {
        Self {
            table_size: 64,
            sample_count: 32,
            flush_interval: 64,
            min_alpha: 0.00001,
            simplex: SimplexOptions::default(),
        }
    }
}

impl RoutineFactory for LtcFitConfig {
    fn create(&self, brdf: Box<dyn Brdf>, target: &FitTarget) -> Box<dyn FitRoutine> {
        Box::new(LtcFitter::new(brdf, target.table_path.clone(), self.clone()))
    }
}

pub struct LtcFitter {
    brdf: Box<dyn Brdf>,
    table_path: PathBuf,
    config: LtcFitConfig,
}

/// BRDF moments used to initialise a lobe.
#[derive(Debug, Clone, Copy)]
struct AverageTerms {
    norm: f64,
    fresnel: f64,
    direction: Vector3<f64>,
}

impl LtcFitter {
    pub fn new(brdf: Box<dyn Brdf>, table_path: PathBuf, config: LtcFitConfig) -> Self {
        Self {
            brdf,
            table_path,
            config,
        }
    }

    fn initial_table(&self, overwrite: bool) -> LtcTable {
        let size = self.config.table_size;
        if overwrite || !self.table_path.is_file() {
            return LtcTable::new(size);
        }
        match LtcTable::read(&self.table_path) {
            Ok(table) if table.size() == size => {
                log::info!(
                    "Resuming {} with {}/{} entries already fitted",
                    self.table_path.display(),
                    table.fitted_count(),
                    table.len()
                );
                table
            }
            Ok(table) => {
                log::warn!(
                    "Discarding {}: table size {} does not match {size}",
                    self.table_path.display(),
                    table.size()
                );
                LtcTable::new(size)
            }
            Err(err) => {
                log::warn!("Discarding unreadable table: {err}");
                LtcTable::new(size)
            }
        }
    }

    fn fit_entry(
        &self,
        lobe: &mut LtcLobe,
        table: &LtcTable,
        a: usize,
        t: usize,
        report: &mut FitReport,
    ) -> LtcEntry {
        let n = self.config.table_size;
        let x = t as f64 / (n - 1) as f64;
        let theta = (1.0 - x * x).acos().min(MAX_THETA);
        let v = Vector3::new(theta.sin(), 0.0, theta.cos());
        let roughness = a as f64 / (n - 1) as f64;
        let alpha = (roughness * roughness).max(self.config.min_alpha);

        let avg = average_terms(self.brdf.as_ref(), &v, alpha, self.config.sample_count);
        lobe.magnitude = avg.norm;
        lobe.fresnel = avg.fresnel;

        // At normal incidence the lobe is rotationally symmetric around Z.
        let isotropic = t == 0;
        if isotropic {
            lobe.x = Vector3::x();
            lobe.y = Vector3::y();
            lobe.z = Vector3::z();
            let previous_row = if a + 1 < n { table.get(a + 1, 0) } else { None };
            match previous_row {
                Some(prev) => {
                    lobe.m11 = prev.m11 as f64;
                    lobe.m22 = prev.m22 as f64;
                }
                None => {
                    lobe.m11 = 1.0;
                    lobe.m22 = 1.0;
                }
            }
            lobe.m13 = 0.0;
        } else {
            let l = avg.direction;
            lobe.x = Vector3::new(l.z, 0.0, -l.x);
            lobe.y = Vector3::y();
            lobe.z = l;
        }
        lobe.update();

        let start = [lobe.m11, lobe.m22, lobe.m13];
        let mut trial = lobe.clone();
        let (best, error) = nelder_mead(start, &self.config.simplex, |params| {
            apply_params(&mut trial, params, isotropic);
            lobe_error(&trial, self.brdf.as_ref(), &v, alpha, self.config.sample_count)
        });
        apply_params(lobe, &best, isotropic);

        if error.is_finite() && lobe.is_well_formed() {
            return entry_from_lobe(lobe);
        }

        report.errors_count += 1;
        let line = format!(
            "entry (theta {t}, alpha {a}): fit did not converge (error {error:.3e})\n"
        );
        log::debug!("{}: {}", self.table_path.display(), line.trim_end());
        report.error_log.push_str(&line);

        let mut fallback = LtcLobe::default();
        fallback.magnitude = if avg.norm.is_finite() { avg.norm } else { 0.0 };
        fallback.fresnel = if avg.fresnel.is_finite() { avg.fresnel } else { 0.0 };
        *lobe = fallback;
        LtcEntry {
            fallback: true,
            ..entry_from_lobe(lobe)
        }
    }

    fn save(&self, table: &LtcTable) -> Result<(), FitError> {
        table.write(&self.table_path)?;
        log::debug!(
            "Saved {} ({}/{} entries)",
            self.table_path.display(),
            table.fitted_count(),
            table.len()
        );
        Ok(())
    }
}

impl FitRoutine for LtcFitter {
    fn fit(
        &mut self,
        overwrite: bool,
        on_progress: &mut dyn FnMut(f32) -> bool,
    ) -> Result<FitReport, FitError> {
        let n = self.config.table_size;
        if n < 2 {
            return Err(FitError::Failure(format!("table size {n} is too small")));
        }
        if self.config.sample_count == 0 {
            return Err(FitError::Failure("sample count must be positive".to_string()));
        }

        let mut table = self.initial_table(overwrite);
        let total = table.len() as f32;
        let mut report = FitReport::default();

        if !on_progress(table.fitted_count() as f32 / total) {
            return Err(FitError::UserAbort);
        }

        let mut lobe = LtcLobe::default();
        let mut unsaved = 0usize;
        for a in (0..n).rev() {
            for t in 0..n {
                if let Some(done) = table.get(a, t) {
                    if done.fallback {
                        report.errors_count += 1;
                        report.error_log.push_str(&format!(
                            "entry (theta {t}, alpha {a}): identity fallback from an earlier run\n"
                        ));
                    }
                    // Keep the seeding chain intact across resumed entries.
                    lobe.m11 = done.m11 as f64;
                    lobe.m22 = done.m22 as f64;
                    lobe.m13 = done.m13 as f64;
                    continue;
                }

                let entry = self.fit_entry(&mut lobe, &table, a, t, &mut report);
                table.set(a, t, entry);
                unsaved += 1;
                log::trace!("{}: fitted alpha {a} theta {t}", self.table_path.display());

                if unsaved >= self.config.flush_interval.max(1) {
                    self.save(&table)?;
                    unsaved = 0;
                }

                if !on_progress(table.fitted_count() as f32 / total) {
                    if unsaved > 0 {
                        self.save(&table)?;
                    }
                    return Err(FitError::UserAbort);
                }
            }
        }

        self.save(&table)?;
        Ok(report)
    }
}

fn apply_params(lobe: &mut LtcLobe, params: &[f64; 3], isotropic: bool) {
    let m11 = params[0].max(1e-7);
    let m22 = params[1].max(1e-7);
    if isotropic {
        lobe.m11 = m11;
        lobe.m22 = m11;
        lobe.m13 = 0.0;
    } else {
        lobe.m11 = m11;
        lobe.m22 = m22;
        lobe.m13 = params[2];
    }
    lobe.update();
}

fn entry_from_lobe(lobe: &LtcLobe) -> LtcEntry {
    let mut m = *lobe.matrix();
    // Terms that are zero for isotropic BRDFs.
    m[(0, 1)] = 0.0;
    m[(1, 0)] = 0.0;
    m[(1, 2)] = 0.0;
    m[(2, 1)] = 0.0;

    let mut matrix = [0.0f32; 9];
    for r in 0..3 {
        for c in 0..3 {
            matrix[r * 3 + c] = m[(r, c)] as f32;
        }
    }
    LtcEntry {
        matrix,
        magnitude: lobe.magnitude as f32,
        fresnel: lobe.fresnel as f32,
        m11: lobe.m11 as f32,
        m22: lobe.m22 as f32,
        m13: lobe.m13 as f32,
        fallback: false,
    }
}

/// Albedo, average Schlick fresnel and average direction of the BRDF lobe.
fn average_terms(brdf: &dyn Brdf, v: &Vector3<f64>, alpha: f64, n: usize) -> AverageTerms {
    let mut norm = 0.0;
    let mut fresnel = 0.0;
    let mut direction = Vector3::zeros();

    for j in 0..n {
        for i in 0..n {
            let u1 = (i as f64 + 0.5) / n as f64;
            let u2 = (j as f64 + 0.5) / n as f64;
            let l = brdf.sample(v, alpha, u1, u2);
            let e = brdf.eval(v, &l, alpha);
            if e.pdf > 0.0 {
                let weight = e.value / e.pdf;
                let h = (v + l).normalize();
                norm += weight;
                fresnel += weight * (1.0 - v.dot(&h).max(0.0)).powi(5);
                direction += l * weight;
            }
        }
    }

    let count = (n * n) as f64;
    direction.y = 0.0;
    let direction = direction
        .try_normalize(1e-12)
        .unwrap_or_else(Vector3::z);
    AverageTerms {
        norm: norm / count,
        fresnel: fresnel / count,
        direction,
    }
}

/// Multiple-importance-sampled cubic error between BRDF and lobe.
fn lobe_error(lobe: &LtcLobe, brdf: &dyn Brdf, v: &Vector3<f64>, alpha: f64, n: usize) -> f64 {
    let mut error = 0.0;
    for j in 0..n {
        for i in 0..n {
            let u1 = (i as f64 + 0.5) / n as f64;
            let u2 = (j as f64 + 0.5) / n as f64;
            for l in [lobe.sample(u1, u2), brdf.sample(v, alpha, u1, u2)] {
                let b = brdf.eval(v, &l, alpha);
                let eval_ltc = lobe.eval(&l);
                let pdf_ltc = if lobe.magnitude > 0.0 {
                    eval_ltc / lobe.magnitude
                } else {
                    0.0
                };
                let denom = pdf_ltc + b.pdf;
                if denom > 0.0 {
                    let diff = (b.value - eval_ltc).abs();
                    error += diff * diff * diff / denom;
                }
            }
        }
    }
    error / (n * n) as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Ggx, Lambert};
    use tempfile::tempdir;

    fn small_config() -> LtcFitConfig {
        LtcFitConfig {
            table_size: 3,
            sample_count: 4,
            flush_interval: 2,
            min_alpha: 0.00001,
            simplex: SimplexOptions {
                delta: 0.05,
                tolerance: 1e-4,
                max_iters: 20,
            },
        }
    }

    #[test]
    fn lambert_table_is_complete_with_unit_magnitude() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("Lambert.ltc");
        let mut fitter = LtcFitter::new(Box::new(Lambert), path.clone(), small_config());

        let mut seen = Vec::new();
        let report = fitter
            .fit(true, &mut |p| {
                seen.push(p);
                true
            })
            .unwrap();

        assert_eq!(report.errors_count, 0);
        assert_eq!(seen.first().copied(), Some(0.0));
        assert_eq!(seen.last().copied(), Some(1.0));
        assert!(seen.windows(2).all(|w| w[0] <= w[1]));

        let table = LtcTable::read(&path).unwrap();
        assert!(table.is_complete());
        let entry = table.get(0, 0).unwrap();
        assert!((entry.magnitude - 1.0).abs() < 1e-5);
    }

    #[test]
    fn abort_keeps_partial_work_for_resume() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("GGX.ltc");
        let config = small_config();

        let mut calls = 0;
        let mut fitter = LtcFitter::new(Box::new(Ggx), path.clone(), config.clone());
        let result = fitter.fit(true, &mut |_| {
            calls += 1;
            calls < 4
        });
        assert!(matches!(result, Err(FitError::UserAbort)));

        // Three entries were fitted before the fourth checkpoint refused to go on.
        let partial = LtcTable::read(&path).unwrap();
        assert_eq!(partial.fitted_count(), 3);

        let mut first = None;
        let mut fitter = LtcFitter::new(Box::new(Ggx), path.clone(), config);
        fitter
            .fit(false, &mut |p| {
                first.get_or_insert(p);
                true
            })
            .unwrap();
        assert_eq!(first, Some(3.0 / 9.0));
        assert!(LtcTable::read(&path).unwrap().is_complete());
    }

    #[test]
    fn resumed_table_reports_earlier_fallbacks() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("GGX.ltc");
        let config = small_config();

        let clean = entry_from_lobe(&LtcLobe::default());
        let mut table = LtcTable::new(config.table_size);
        for a in 0..3 {
            for t in 0..3 {
                table.set(a, t, clean);
            }
        }
        table.set(1, 2, LtcEntry {
            fallback: true,
            ..clean
        });
        table.write(&path).unwrap();

        let mut progress = Vec::new();
        let mut fitter = LtcFitter::new(Box::new(Ggx), path.clone(), config);
        let report = fitter
            .fit(false, &mut |p| {
                progress.push(p);
                true
            })
            .unwrap();
        assert_eq!(progress, vec![1.0]);
        assert_eq!(report.errors_count, 1);
        assert!(report.error_log.contains("theta 2, alpha 1"));
        assert!(LtcTable::read(&path).unwrap().get(1, 2).unwrap().fallback);
    }

    #[test]
    fn overwrite_ignores_existing_table() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("Lambert.ltc");
        let mut fitter = LtcFitter::new(Box::new(Lambert), path.clone(), small_config());
        fitter.fit(true, &mut |_| true).unwrap();

        let mut first = None;
        fitter
            .fit(true, &mut |p| {
                first.get_or_insert(p);
                true
            })
            .unwrap();
        assert_eq!(first, Some(0.0));
    }

    #[test]
    fn unreadable_table_restarts_from_scratch() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("Lambert.ltc");
        std::fs::write(&path, b"garbage").unwrap();

        let mut first = None;
        let mut fitter = LtcFitter::new(Box::new(Lambert), path.clone(), small_config());
        fitter
            .fit(false, &mut |p| {
                first.get_or_insert(p);
                true
            })
            .unwrap();
        assert_eq!(first, Some(0.0));
        assert!(LtcTable::read(&path).unwrap().is_complete());
    }

    #[test]
    fn abort_at_first_checkpoint_writes_nothing() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("Lambert.ltc");
        let mut fitter = LtcFitter::new(Box::new(Lambert), path.clone(), small_config());
        assert!(matches!(
            fitter.fit(true, &mut |_| false),
            Err(FitError::UserAbort)
        ));
        assert!(!path.exists());
    }
}
