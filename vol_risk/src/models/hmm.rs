/// models/hmm.rs — Two-State Gaussian Hidden Markov Regime Model
///
/// ─────────────────────────────────────────────────────────────────────────
/// MATHEMATICAL SPECIFICATION
/// ─────────────────────────────────────────────────────────────────────────
///
///   Hidden state s_t ∈ {0, 1},  Markov with transition matrix A
///   Emission:  r_t | s_t = k  ~  N(μ_k, σ²_k)
///   Initial distribution π
///
/// BAUM-WELCH (EM), scaled forward-backward:
///
///   α̂_t(j) = b_j(r_t) · Σ_i α̂_{t-1}(i) A_ij / c_t,   c_t = normaliser
///   β̂_t(i) = Σ_j A_ij b_j(r_{t+1}) β̂_{t+1}(j) / c_{t+1}
///   log L   = Σ_t ln c_t
///
///   γ_t(k)    = α̂_t(k) β̂_t(k)
///   ξ_t(i,j)  = α̂_t(i) A_ij b_j(r_{t+1}) β̂_{t+1}(j) / c_{t+1}
///
///   M-step:
///     π_k   = γ_0(k)
///     A_ij  = Σ_t ξ_t(i,j) / Σ_t Σ_j ξ_t(i,j)
///     μ_k   = Σ_t γ_t(k) r_t / Σ_t γ_t(k)
///     σ²_k  = Σ_t γ_t(k) (r_t − μ_k)² / Σ_t γ_t(k)  +  min_covar
///
///   Stops after `n_iter` iterations or when log L improves by less than `tol`.
///
/// INITIALISATION (reproducible):
///   π, A uniform; μ from 1-D k-means seeded by a pinned StdRng;
///   σ²_k = pooled variance + min_covar.
///
/// DECODING: Viterbi in log-space.
///
/// LABELS: the state with the larger fitted mean is "Stress", the other is
/// "Calm".  Exactly equal means cannot be ordered and are a fit failure.
/// ─────────────────────────────────────────────────────────────────────────
use ndarray::{Array1, Array2};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use statrs::distribution::{Continuous, Normal};
use statrs::statistics::Statistics;
use tracing::{debug, info, warn};

use crate::error::{FitStage, Result, RiskError};

pub const N_STATES: usize = 2;

/// Smallest return series we attempt to fit.
pub const MIN_OBSERVATIONS: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HmmRegime {
    Calm,
    Stress,
}

impl std::fmt::Display for HmmRegime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HmmRegime::Calm => write!(f, "Calm"),
            HmmRegime::Stress => write!(f, "Stress"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HmmConfig {
    /// EM iteration cap
    pub n_iter:    usize,
    /// Minimum log-likelihood gain to keep iterating
    pub tol:       f64,
    /// Variance floor added to every state
    pub min_covar: f64,
    /// Seed for the k-means initialisation
    pub seed:      u64,
}

impl Default for HmmConfig {
    fn default() -> Self {
        Self { n_iter: 100, tol: 1e-2, min_covar: 1e-3, seed: 42 }
    }
}

#[derive(Debug, Clone)]
pub struct GaussianHmm {
    pub start:     Array1<f64>,
    pub transmat:  Array2<f64>,
    pub means:     Array1<f64>,
    pub variances: Array1<f64>,
}

#[derive(Debug, Clone)]
pub struct HmmFit {
    pub model:          GaussianHmm,
    pub log_likelihood: f64,
    pub iterations:     usize,
    pub converged:      bool,
}

fn fail(reason: impl Into<String>) -> RiskError {
    RiskError::fit(FitStage::Hmm, reason)
}

impl GaussianHmm {
    /// Uniform π and A, k-means means, pooled variance.
    pub fn initialise(x: &[f64], cfg: &HmmConfig) -> Result<Self> {
        let var = x.population_variance();
        if !var.is_finite() {
            return Err(fail("empty return series"));
        }
        let centers = kmeans_1d(x, N_STATES, cfg.seed);
        let uniform = 1.0 / N_STATES as f64;

        Ok(Self {
            start:     Array1::from_elem(N_STATES, uniform),
            transmat:  Array2::from_elem((N_STATES, N_STATES), uniform),
            means:     Array1::from(centers),
            variances: Array1::from_elem(N_STATES, var + cfg.min_covar),
        })
    }

    /// ln b_k(r_t) for every t, k.
    fn log_emissions(&self, x: &[f64]) -> Result<Array2<f64>> {
        let dists = (0..N_STATES)
            .map(|k| {
                Normal::new(self.means[k], self.variances[k].sqrt())
                    .map_err(|e| fail(format!("invalid emission for state {k}: {e}")))
            })
            .collect::<Result<Vec<_>>>()?;

        let mut out: Array2<f64> = Array2::zeros((x.len(), N_STATES));
        for (t, &r) in x.iter().enumerate() {
            for (k, d) in dists.iter().enumerate() {
                out[[t, k]] = d.ln_pdf(r);
            }
        }
        Ok(out)
    }

    /// One E-step + M-step.  Returns the log-likelihood under the parameters
    /// *before* the update.
    fn em_step(&mut self, x: &[f64], min_covar: f64) -> Result<f64> {
        let t_len = x.len();
        let log_b = self.log_emissions(x)?;

        // Emission probabilities shifted per row to avoid underflow; the shift
        // is added back into the likelihood.
        let mut b: Array2<f64> = Array2::zeros((t_len, N_STATES));
        let mut shift: Array1<f64> = Array1::zeros(t_len);
        for t in 0..t_len {
            let m = log_b.row(t).fold(f64::NEG_INFINITY, |a, &v| a.max(v));
            shift[t] = m;
            for k in 0..N_STATES {
                b[[t, k]] = (log_b[[t, k]] - m).exp();
            }
        }

        // ── Forward ───────────────────────────────────────────────────────
        let mut alpha: Array2<f64> = Array2::zeros((t_len, N_STATES));
        let mut c: Array1<f64> = Array1::zeros(t_len);
        for t in 0..t_len {
            for j in 0..N_STATES {
                let prior = if t == 0 {
                    self.start[j]
                } else {
                    (0..N_STATES).map(|i| alpha[[t - 1, i]] * self.transmat[[i, j]]).sum()
                };
                alpha[[t, j]] = prior * b[[t, j]];
            }
            let s: f64 = alpha.row(t).sum();
            if !(s > 0.0) || !s.is_finite() {
                return Err(fail(format!("forward pass collapsed at t={t}")));
            }
            c[t] = s;
            for j in 0..N_STATES {
                alpha[[t, j]] /= s;
            }
        }
        let log_likelihood: f64 = c.iter().map(|v| v.ln()).sum::<f64>() + shift.sum();

        // ── Backward ──────────────────────────────────────────────────────
        let mut beta: Array2<f64> = Array2::zeros((t_len, N_STATES));
        for k in 0..N_STATES {
            beta[[t_len - 1, k]] = 1.0;
        }
        for t in (0..t_len - 1).rev() {
            for i in 0..N_STATES {
                let s: f64 = (0..N_STATES)
                    .map(|j| self.transmat[[i, j]] * b[[t + 1, j]] * beta[[t + 1, j]])
                    .sum();
                beta[[t, i]] = s / c[t + 1];
            }
        }

        // ── Posteriors ────────────────────────────────────────────────────
        let mut gamma = &alpha * &beta;
        for t in 0..t_len {
            let s: f64 = gamma.row(t).sum();
            if s > 0.0 {
                for k in 0..N_STATES {
                    gamma[[t, k]] /= s;
                }
            }
        }

        let mut xi_sum: Array2<f64> = Array2::zeros((N_STATES, N_STATES));
        for t in 0..t_len - 1 {
            for i in 0..N_STATES {
                for j in 0..N_STATES {
                    xi_sum[[i, j]] += alpha[[t, i]] * self.transmat[[i, j]] * b[[t + 1, j]]
                        * beta[[t + 1, j]]
                        / c[t + 1];
                }
            }
        }

        // ── M-step ────────────────────────────────────────────────────────
        for k in 0..N_STATES {
            self.start[k] = gamma[[0, k]];
        }
        for i in 0..N_STATES {
            let row: f64 = xi_sum.row(i).sum();
            if row > 0.0 {
                for j in 0..N_STATES {
                    self.transmat[[i, j]] = xi_sum[[i, j]] / row;
                }
            }
        }
        for k in 0..N_STATES {
            let w: f64 = gamma.column(k).sum();
            if w <= 0.0 {
                continue;
            }
            let mu = x.iter().enumerate().map(|(t, r)| gamma[[t, k]] * r).sum::<f64>() / w;
            let var = x
                .iter()
                .enumerate()
                .map(|(t, r)| gamma[[t, k]] * (r - mu).powi(2))
                .sum::<f64>()
                / w;
            self.means[k] = mu;
            self.variances[k] = var + min_covar;
        }

        Ok(log_likelihood)
    }

    /// Most likely state path.
    pub fn viterbi(&self, x: &[f64]) -> Result<Vec<usize>> {
        let t_len = x.len();
        if t_len == 0 {
            return Ok(Vec::new());
        }
        let log_b = self.log_emissions(x)?;
        let log_a = self.transmat.mapv(f64::ln);

        let mut delta = Array2::from_elem((t_len, N_STATES), f64::NEG_INFINITY);
        let mut psi = Array2::<usize>::zeros((t_len, N_STATES));
        for k in 0..N_STATES {
            delta[[0, k]] = self.start[k].ln() + log_b[[0, k]];
        }
        for t in 1..t_len {
            for j in 0..N_STATES {
                let (arg, best) = (0..N_STATES)
                    .map(|i| (i, delta[[t - 1, i]] + log_a[[i, j]]))
                    .fold((0, f64::NEG_INFINITY), |acc, v| if v.1 > acc.1 { v } else { acc });
                delta[[t, j]] = best + log_b[[t, j]];
                psi[[t, j]] = arg;
            }
        }

        let mut path = vec![0usize; t_len];
        path[t_len - 1] = (0..N_STATES)
            .fold(0, |acc, k| if delta[[t_len - 1, k]] > delta[[t_len - 1, acc]] { k } else { acc });
        for t in (0..t_len - 1).rev() {
            path[t] = psi[[t + 1, path[t + 1]]];
        }
        Ok(path)
    }

    /// Label per state: larger mean → Stress.
    pub fn state_labels(&self) -> Result<[HmmRegime; N_STATES]> {
        let (m0, m1) = (self.means[0], self.means[1]);
        if m0 == m1 {
            return Err(fail(format!("state means are indistinguishable ({m0:.6e})")));
        }
        Ok(if m0 > m1 {
            [HmmRegime::Stress, HmmRegime::Calm]
        } else {
            [HmmRegime::Calm, HmmRegime::Stress]
        })
    }
}

/// Fit by Baum-Welch.
pub fn fit(x: &[f64], cfg: &HmmConfig) -> Result<HmmFit> {
    if x.len() < MIN_OBSERVATIONS {
        return Err(fail(format!(
            "need at least {MIN_OBSERVATIONS} returns for {N_STATES} states, got {}",
            x.len()
        )));
    }
    if x.iter().any(|v| !v.is_finite()) {
        return Err(fail("non-finite return in input"));
    }
    if Statistics::min(x) == Statistics::max(x) {
        return Err(fail("return series is constant"));
    }

    let mut model = GaussianHmm::initialise(x, cfg)?;
    let mut prev = f64::NEG_INFINITY;
    let mut converged = false;
    let mut iterations = 0;

    for _ in 0..cfg.n_iter {
        let ll = model.em_step(x, cfg.min_covar)?;
        iterations += 1;
        if !ll.is_finite() {
            return Err(fail("log-likelihood is not finite"));
        }
        if ll - prev < cfg.tol {
            converged = true;
            prev = ll;
            break;
        }
        prev = ll;
    }
    if !converged {
        warn!("HMM reached the {}-iteration cap before converging", cfg.n_iter);
    }
    if model.variances.iter().any(|v| !(*v > 0.0) || !v.is_finite()) {
        return Err(fail("degenerate state variance"));
    }

    info!(
        "HMM: μ=[{:.5}, {:.5}] σ=[{:.5}, {:.5}] logL={:.2} ({} iterations)",
        model.means[0],
        model.means[1],
        model.variances[0].sqrt(),
        model.variances[1].sqrt(),
        prev,
        iterations
    );

    Ok(HmmFit { model, log_likelihood: prev, iterations, converged })
}

/// Fit, decode, and label every observation.
pub fn detect_hmm_regime(returns: &[f64], cfg: &HmmConfig) -> Result<Vec<HmmRegime>> {
    let fitted = fit(returns, cfg)?;
    let labels = fitted.model.state_labels()?;
    let path = fitted.model.viterbi(returns)?;
    let stressed = path.iter().filter(|&&s| labels[s] == HmmRegime::Stress).count();
    debug!("HMM decode: {} of {} observations in Stress", stressed, path.len());
    Ok(path.into_iter().map(|s| labels[s]).collect())
}

/// Lloyd's algorithm in one dimension with k-means++ seeding.  Returns the
/// centres sorted ascending.
fn kmeans_1d(x: &[f64], k: usize, seed: u64) -> Vec<f64> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut centers = vec![x[rng.gen_range(0..x.len())]];

    while centers.len() < k {
        let d2: Vec<f64> = x
            .iter()
            .map(|v| centers.iter().map(|c| (v - c).powi(2)).fold(f64::INFINITY, f64::min))
            .collect();
        let total: f64 = d2.iter().sum();
        let mut target = rng.gen::<f64>() * total;
        let mut pick = x.len() - 1;
        for (i, w) in d2.iter().enumerate() {
            if *w > 0.0 && target < *w {
                pick = i;
                break;
            }
            target -= w;
        }
        centers.push(x[pick]);
    }

    for _ in 0..100 {
        let mut sums = vec![0.0; k];
        let mut counts = vec![0usize; k];
        for v in x {
            let nearest = (0..k)
                .min_by(|&a, &b| (v - centers[a]).abs().total_cmp(&(v - centers[b]).abs()))
                .unwrap_or(0);
            sums[nearest] += v;
            counts[nearest] += 1;
        }
        let next: Vec<f64> = (0..k)
            .map(|i| if counts[i] > 0 { sums[i] / counts[i] as f64 } else { centers[i] })
            .collect();
        if next == centers {
            break;
        }
        centers = next;
    }

    centers.sort_by(f64::total_cmp);
    centers
}
