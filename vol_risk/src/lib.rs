pub mod alerts;
pub mod cache;
pub mod config;
pub mod data;
pub mod error;
pub mod features;
pub mod models;
pub mod outputs;
pub mod pipeline;
pub mod regime;
pub mod risk;
pub mod stats;
pub mod table;

pub use alerts::{generate_risk_alerts, Alert};
pub use error::{FitStage, InputError, Result, RiskError};
pub use features::{compute_returns, compute_volatility};
pub use models::hmm::{detect_hmm_regime, HmmRegime};
pub use pipeline::{run_pipeline, PipelineOutput};
pub use regime::{detect_market_regime, MarketRegime};
pub use risk::{assign_risk_levels, RiskLevel, VolatilityColumn};
pub use table::{RiskRow, RiskTable};
