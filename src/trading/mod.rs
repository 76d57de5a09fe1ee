//! Trading engine
//!
//! Entry gate, sizing, order placement, scale-in, per-tick position
//! management and settlement.

mod engine;
pub mod gate;
mod position;
mod settings;
mod sizing;
mod types;

pub use engine::{EngineDeps, TradingEngine};
pub use gate::GateContext;
pub use position::{NewPosition, Position, ScaleInPlan};
pub use settings::{
    apply_profile, select_profile, MarketRegime, ProfileName, ProfilesConfig, SettingsOverride,
    TradingSettings,
};
pub use sizing::{position_notional, scale_in_fractions, stop_plan, SizingInputs, StopPlan};
pub use types::{
    CloseReason, OpenOutcome, PartialExit, PartialKind, PositionStatus, RejectReason,
    TradeCandidate, TradingError,
};
