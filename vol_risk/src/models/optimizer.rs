/// models/optimizer.rs — Nelder-Mead simplex minimiser
///
/// Derivative-free, so the likelihood only has to be evaluable, not
/// differentiable.  Standard coefficients:
///   reflection ρ = 1, expansion χ = 2, contraction γ = ½, shrink σ = ½
///
/// Terminates when the spread of objective values across the simplex falls
/// below `ftol · (1 + |f_best|)` or after `max_iter` iterations, in which case the
/// result is reported as not converged.

#[derive(Debug, Clone, Copy)]
pub struct NelderMeadOptions {
    pub max_iter: usize,
    /// Tolerance on the spread of simplex function values
    pub ftol: f64,
    /// Initial simplex edge along each axis
    pub step: f64,
}

impl Default for NelderMeadOptions {
    fn default() -> Self {
        Self { max_iter: 5_000, ftol: 1e-10, step: 0.25 }
    }
}

#[derive(Debug, Clone)]
pub struct Minimum {
    pub x:          Vec<f64>,
    pub fx:         f64,
    pub iterations: usize,
    pub converged:  bool,
}

pub fn nelder_mead<F>(f: F, x0: &[f64], opts: NelderMeadOptions) -> Minimum
where
    F: Fn(&[f64]) -> f64,
{
    let n = x0.len();
    // Non-finite objective values are treated as +∞ so the simplex walks away.
    let eval = |x: &[f64]| {
        let v = f(x);
        if v.is_finite() { v } else { f64::INFINITY }
    };

    let mut simplex: Vec<Vec<f64>> = Vec::with_capacity(n + 1);
    simplex.push(x0.to_vec());
    for i in 0..n {
        let mut v = x0.to_vec();
        v[i] += opts.step;
        simplex.push(v);
    }
    let mut values: Vec<f64> = simplex.iter().map(|x| eval(x)).collect();

    let mut iterations = 0;
    let mut converged = false;

    while iterations < opts.max_iter {
        // ── Order: best first, worst last ─────────────────────────────────
        let mut order: Vec<usize> = (0..=n).collect();
        order.sort_by(|&a, &b| values[a].total_cmp(&values[b]));
        simplex = order.iter().map(|&i| simplex[i].clone()).collect();
        values = order.iter().map(|&i| values[i]).collect();

        let best = values[0];
        let worst = values[n];
        if best.is_finite() && (worst - best).abs() <= opts.ftol * (1.0 + best.abs()) {
            converged = true;
            break;
        }
        iterations += 1;

        let centroid: Vec<f64> = (0..n)
            .map(|j| simplex[..n].iter().map(|v| v[j]).sum::<f64>() / n as f64)
            .collect();
        let towards = |t: f64| -> Vec<f64> {
            centroid
                .iter()
                .zip(&simplex[n])
                .map(|(c, w)| c + t * (w - c))
                .collect()
        };

        // ── Reflect ───────────────────────────────────────────────────────
        let xr = towards(-1.0);
        let fr = eval(&xr);

        if fr < values[0] {
            // ── Expand ────────────────────────────────────────────────────
            let xe = towards(-2.0);
            let fe = eval(&xe);
            if fe < fr {
                simplex[n] = xe;
                values[n] = fe;
            } else {
                simplex[n] = xr;
                values[n] = fr;
            }
            continue;
        }
        if fr < values[n - 1] {
            simplex[n] = xr;
            values[n] = fr;
            continue;
        }

        // ── Contract (outside if the reflection helped at all) ────────────
        let (xc, fc) = if fr < values[n] {
            let xc = towards(-0.5);
            let fc = eval(&xc);
            (xc, fc)
        } else {
            let xc = towards(0.5);
            let fc = eval(&xc);
            (xc, fc)
        };
        if fc < values[n].min(fr) {
            simplex[n] = xc;
            values[n] = fc;
            continue;
        }

        // ── Shrink towards the best vertex ────────────────────────────────
        let best_x = simplex[0].clone();
        for i in 1..=n {
            simplex[i] = best_x
                .iter()
                .zip(&simplex[i])
                .map(|(b, x)| b + 0.5 * (x - b))
                .collect();
            values[i] = eval(&simplex[i]);
        }
    }

    let (best_i, _) = values
        .iter()
        .enumerate()
        .min_by(|a, b| a.1.total_cmp(b.1))
        .unwrap_or((0, &f64::INFINITY));

    Minimum {
        x: simplex[best_i].clone(),
        fx: values[best_i],
        iterations,
        converged,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimises_quadratic() {
        let f = |x: &[f64]| (x[0] - 3.0).powi(2) + 2.0 * (x[1] + 1.0).powi(2) + 5.0;
        let m = nelder_mead(f, &[0.0, 0.0], NelderMeadOptions::default());
        assert!(m.converged);
        assert!((m.x[0] - 3.0).abs() < 1e-3, "x = {:?}", m.x);
        assert!((m.x[1] + 1.0).abs() < 1e-3, "x = {:?}", m.x);
        assert!((m.fx - 5.0).abs() < 1e-6);
    }

    #[test]
    fn minimises_rosenbrock() {
        let f = |x: &[f64]| (1.0 - x[0]).powi(2) + 100.0 * (x[1] - x[0] * x[0]).powi(2);
        let m = nelder_mead(f, &[-1.2, 1.0], NelderMeadOptions::default());
        assert!(m.converged);
        assert!((m.x[0] - 1.0).abs() < 1e-2, "x = {:?}", m.x);
    }

    #[test]
    fn reports_non_convergence_at_iteration_cap() {
        let f = |x: &[f64]| (x[0] - 1e6).powi(2);
        let m = nelder_mead(f, &[0.0], NelderMeadOptions { max_iter: 3, ..Default::default() });
        assert!(!m.converged);
        assert_eq!(m.iterations, 3);
    }

    #[test]
    fn walks_away_from_nan_region() {
        let f = |x: &[f64]| if x[0] < 0.0 { f64::NAN } else { (x[0] - 2.0).powi(2) };
        let m = nelder_mead(f, &[0.5], NelderMeadOptions::default());
        assert!((m.x[0] - 2.0).abs() < 1e-3);
    }
}
