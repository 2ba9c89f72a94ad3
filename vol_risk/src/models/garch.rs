// models/garch.rs — GARCH(1,1) Conditional Volatility Estimator
//
// ─────────────────────────────────────────────────────────────────────────
// MATHEMATICAL SPECIFICATION
// ─────────────────────────────────────────────────────────────────────────
//
// GARCH(1,1): Bollerslev (1986), zero-mean
//
//   Returns are scaled before fitting:  r_t = 100 · R_t
//   Innovation:                          ε_t = r_t           (μ = 0)
//   Conditional variance update:
//
//       σ²_t = ω  +  α · ε²_{t-1}  +  β · σ²_{t-1}
//
//   Constraints (covariance stationarity):
//     ω > 0,  α ≥ 0,  β ≥ 0,  α + β < 1
//
//   Initial variance (backcast, exponentially weighted, λ = 0.94):
//       σ²_0 = Σ_{i<τ} w_i · r²_i,   w_i ∝ λ^i,   τ = min(75, n)
//
//   Gaussian log-likelihood, maximised over (ω, α, β):
//       L = −½ Σ_t [ ln(2π) + ln(σ²_t) + ε²_t / σ²_t ]
//
//   Unconstrained reparameterisation used by the optimiser:
//       ω = e^{θ₀}
//       α = e^{θ₁} / (1 + e^{θ₁} + e^{θ₂})
//       β = e^{θ₂} / (1 + e^{θ₁} + e^{θ₂})
//   which enforces every constraint above by construction.
//
//   Long-run (unconditional) variance:
//       σ²_∞ = ω / (1 − α − β)
//
//   Multi-step forecast (h-step ahead):
//       σ²_{t+h} = σ²_∞ + (α+β)^(h-1) · (σ²_{t+1} − σ²_∞)
//
// The fitted σ_t path stays on the scaled axis: a 1% daily move reads as
// 1.0, not 0.01, so it is not directly comparable to realized volatility.
// ─────────────────────────────────────────────────────────────────────────
use statrs::statistics::Statistics;
use tracing::{debug, info};

use crate::error::{FitStage, Result, RiskError};
use crate::models::optimizer::{nelder_mead, NelderMeadOptions};

/// Multiplicative conditioning constant applied to returns before fitting.
pub const DEFAULT_SCALE: f64 = 100.0;

/// Smallest return series we attempt to fit.
pub const MIN_OBSERVATIONS: usize = 30;

const BACKCAST_DECAY: f64 = 0.94;
const BACKCAST_SPAN: usize = 75;
const LN_2PI: f64 = 1.837_877_066_409_345_5;

#[derive(Debug, Clone)]
pub struct Garch11 {
    /// ω: long-run variance weight
    pub omega: f64,
    /// α: ARCH (shock) coefficient
    pub alpha: f64,
    /// β: GARCH (persistence) coefficient
    pub beta: f64,
    /// Variance for the next, not yet observed, return
    pub sigma2: f64,
}

impl Garch11 {
    /// Construct GARCH(1,1) with given parameters and starting variance.
    ///
    /// Returns `None` when the parameters violate positivity or stationarity.
    pub fn new(omega: f64, alpha: f64, beta: f64, initial_variance: f64) -> Option<Self> {
        let valid = omega > 0.0
            && alpha >= 0.0
            && beta >= 0.0
            && alpha + beta < 1.0
            && initial_variance > 0.0
            && [omega, alpha, beta, initial_variance].iter().all(|v| v.is_finite());
        valid.then_some(Self { omega, alpha, beta, sigma2: initial_variance })
    }

    /// Feed the realised (scaled) return and roll σ² forward one step.
    ///
    /// Formula:  σ²_{t+1} = ω + α·ε²_t + β·σ²_t
    pub fn update(&mut self, r: f64) {
        self.sigma2 = self.omega + self.alpha * r * r + self.beta * self.sigma2;
    }

    pub fn persistence(&self) -> f64 {
        self.alpha + self.beta
    }

    /// σ²_∞ = ω / (1 − α − β)
    pub fn long_run_variance(&self) -> f64 {
        self.omega / (1.0 - self.persistence())
    }

    /// h-step ahead variance forecast (h ≥ 1).
    ///
    /// σ²_{t+h} = σ²_∞ + (α+β)^(h−1) · (σ²_{t+1} − σ²_∞)
    pub fn forecast_variance(&self, h: usize) -> f64 {
        let longrun = self.long_run_variance();
        let steps = h.max(1) as i32 - 1;
        longrun + self.persistence().powi(steps) * (self.sigma2 - longrun)
    }
}

/// Run GARCH(1,1) over a return series, return the σ²_t used for each r_t.
pub fn garch_filter(garch: &mut Garch11, returns: &[f64]) -> Vec<f64> {
    let mut variances = Vec::with_capacity(returns.len());
    for &r in returns {
        variances.push(garch.sigma2);
        garch.update(r);
    }
    variances
}

/// Exponentially weighted starting variance.
pub fn backcast(returns: &[f64]) -> f64 {
    let tau = returns.len().min(BACKCAST_SPAN);
    let mut num = 0.0;
    let mut den = 0.0;
    let mut w = 1.0;
    for r in &returns[..tau] {
        num += w * r * r;
        den += w;
        w *= BACKCAST_DECAY;
    }
    if den > 0.0 { num / den } else { 0.0 }
}

/// Fitted model plus the in-sample conditional volatility path.
#[derive(Debug, Clone)]
pub struct GarchFit {
    /// Parameters, with `sigma2` holding the one-step-ahead variance after the
    /// last observation
    pub model:                  Garch11,
    pub log_likelihood:         f64,
    pub iterations:             usize,
    /// σ_t on the scaled axis, one per input return
    pub conditional_volatility: Vec<f64>,
}

fn to_params(theta: &[f64]) -> (f64, f64, f64) {
    let ea = theta[1].exp();
    let eb = theta[2].exp();
    let denom = 1.0 + ea + eb;
    (theta[0].exp(), ea / denom, eb / denom)
}

fn to_theta(omega: f64, alpha: f64, beta: f64) -> [f64; 3] {
    let rest = 1.0 - alpha - beta;
    [omega.ln(), (alpha / rest).ln(), (beta / rest).ln()]
}

fn neg_log_likelihood(omega: f64, alpha: f64, beta: f64, start: f64, r: &[f64]) -> f64 {
    let Some(mut g) = Garch11::new(omega, alpha, beta, start) else {
        return f64::INFINITY;
    };
    let mut nll = 0.0;
    for &x in r {
        let s2 = g.sigma2;
        if !(s2 > 0.0) || !s2.is_finite() {
            return f64::INFINITY;
        }
        nll += 0.5 * (LN_2PI + s2.ln() + x * x / s2);
        g.update(x);
    }
    nll
}

/// Fit a zero-mean GARCH(1,1) by maximum likelihood and return the fitted
/// conditional volatility, index-aligned with `returns`.
///
/// `returns` must already have undefined entries removed.
pub fn fit(returns: &[f64], scale: f64) -> Result<GarchFit> {
    let fail = |reason: String| RiskError::fit(FitStage::Garch, reason);

    if returns.len() < MIN_OBSERVATIONS {
        return Err(fail(format!(
            "need at least {MIN_OBSERVATIONS} returns, got {}",
            returns.len()
        )));
    }
    let r: Vec<f64> = returns.iter().map(|x| x * scale).collect();
    if r.iter().any(|x| !x.is_finite()) {
        return Err(fail("non-finite return in input".into()));
    }

    let var = r.iter().map(|x| x * x).mean();
    if !(var > 1e-12) {
        return Err(fail("return series has zero variance".into()));
    }
    let start = backcast(&r);
    if !(start > 0.0) {
        return Err(fail("degenerate backcast variance".into()));
    }

    // ── Starting values: coarse grid over (α, α+β) ────────────────────────
    let mut best: Option<([f64; 3], f64)> = None;
    for &alpha in &[0.01, 0.05, 0.1, 0.2] {
        for &persistence in &[0.5, 0.7, 0.9, 0.98] {
            let beta = persistence - alpha;
            if beta <= 0.0 {
                continue;
            }
            let omega = var * (1.0 - persistence);
            let nll = neg_log_likelihood(omega, alpha, beta, start, &r);
            if best.map_or(true, |(_, b)| nll < b) {
                best = Some((to_theta(omega, alpha, beta), nll));
            }
        }
    }
    let (theta0, _) = best.ok_or_else(|| fail("no admissible starting point".into()))?;

    // ── Maximum likelihood ────────────────────────────────────────────────
    let objective = |theta: &[f64]| {
        let (omega, alpha, beta) = to_params(theta);
        neg_log_likelihood(omega, alpha, beta, start, &r)
    };
    let min = nelder_mead(objective, &theta0, NelderMeadOptions::default());
    if !min.converged {
        return Err(fail(format!("optimizer did not converge after {} iterations", min.iterations)));
    }
    if !min.fx.is_finite() {
        return Err(fail("likelihood is not finite at the optimum".into()));
    }

    let (omega, alpha, beta) = to_params(&min.x);
    let mut model = Garch11::new(omega, alpha, beta, start).ok_or_else(|| {
        fail(format!("degenerate parameters ω={omega:.3e} α={alpha:.4} β={beta:.4}"))
    })?;
    let variances = garch_filter(&mut model, &r);

    let mut conditional_volatility = Vec::with_capacity(variances.len());
    for s2 in variances {
        if !(s2 > 0.0) || !s2.is_finite() {
            return Err(fail("non-positive conditional variance".into()));
        }
        conditional_volatility.push(s2.sqrt());
    }

    info!(
        "GARCH(1,1): ω={:.4e} α={:.4} β={:.4} logL={:.2} ({} iterations)",
        omega, alpha, beta, -min.fx, min.iterations
    );
    debug!("GARCH long-run σ={:.4}", model.long_run_variance().sqrt());

    Ok(GarchFit {
        model,
        log_likelihood: -min.fx,
        iterations: min.iterations,
        conditional_volatility,
    })
}
