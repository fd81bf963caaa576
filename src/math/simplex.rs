//! Nelder–Mead downhill simplex minimisation.
//!
//! The LTC error surface is cheap to evaluate but noisy and non-smooth, so a
//! derivative-free method is used. The problem dimension is tiny (1–3).

/// Tuning of the simplex search.
#[derive(Debug, Clone, Copy)]
pub struct SimplexOptions {
    /// Edge length of the initial simplex around the start point.
    pub delta: f64,
    /// Relative spread of objective values at which the search stops.
    pub tolerance: f64,
    pub max_iters: usize,
}

impl Default for SimplexOptions {
    fn default() -> Self {
        Self {
            delta: 0.05,
            tolerance: 1e-5,
            max_iters: 100,
        }
    }
}

const REFLECT: f64 = 1.0;
const EXPAND: f64 = 2.0;
const CONTRACT: f64 = 0.5;
const SHRINK: f64 = 0.5;

/// Minimise `objective` starting from `start`. Returns the best point and its value.
///
/// Non-finite objective values are treated as `+inf`.
pub fn nelder_mead<const D: usize>(
    start: [f64; D],
    opts: &SimplexOptions,
    mut objective: impl FnMut(&[f64; D]) -> f64,
) -> ([f64; D], f64) {
    let mut eval = |p: &[f64; D]| {
        let v = objective(p);
        if v.is_nan() { f64::INFINITY } else { v }
    };

    let mut points: Vec<[f64; D]> = Vec::with_capacity(D + 1);
    points.push(start);
    for i in 0..D {
        let mut p = start;
        p[i] += opts.delta;
        points.push(p);
    }
    let mut values: Vec<f64> = points.iter().map(&mut eval).collect();

    let mut order: Vec<usize> = (0..=D).collect();
    for _ in 0..opts.max_iters {
        order.sort_by(|&a, &b| values[a].total_cmp(&values[b]));
        let lo = order[0];
        let hi = order[D];
        let next_hi = order[D.saturating_sub(1)];

        let a = values[lo].abs();
        let b = values[hi].abs();
        if 2.0 * (a - b).abs() <= (a + b) * opts.tolerance {
            break;
        }

        // Centroid of every point but the worst.
        let mut centroid = [0.0; D];
        for (k, p) in points.iter().enumerate() {
            if k == hi {
                continue;
            }
            for i in 0..D {
                centroid[i] += p[i];
            }
        }
        for c in centroid.iter_mut() {
            *c /= D as f64;
        }

        let along = |t: f64, from: &[f64; D]| {
            let mut out = [0.0; D];
            for i in 0..D {
                out[i] = centroid[i] + t * (centroid[i] - from[i]);
            }
            out
        };

        let reflected = along(REFLECT, &points[hi]);
        let f_reflected = eval(&reflected);

        if f_reflected < values[lo] {
            let mut expanded = [0.0; D];
            for i in 0..D {
                expanded[i] = centroid[i] + EXPAND * (reflected[i] - centroid[i]);
            }
            let f_expanded = eval(&expanded);
            if f_expanded < f_reflected {
                points[hi] = expanded;
                values[hi] = f_expanded;
                continue;
            }
        }

        if f_reflected < values[next_hi] {
            points[hi] = reflected;
            values[hi] = f_reflected;
            continue;
        }

        let contracted = along(-CONTRACT, &points[hi]);
        let f_contracted = eval(&contracted);
        if f_contracted < values[hi] {
            points[hi] = contracted;
            values[hi] = f_contracted;
            continue;
        }

        let best = points[lo];
        for k in 0..=D {
            if k == lo {
                continue;
            }
            for i in 0..D {
                points[k][i] = best[i] + SHRINK * (points[k][i] - best[i]);
            }
            values[k] = eval(&points[k]);
        }
    }

    let lo = (0..=D)
        .min_by(|&a, &b| values[a].total_cmp(&values[b]))
        .unwrap_or(0);
    (points[lo], values[lo])
}
