//! Realtime analyzer
//!
//! Three-timeframe pipeline over closed candles: 15m admission to the
//! hotlist, debounced 1m micro triggers, optional 5m confirmation.

mod batch;
mod pending;
mod realtime;
pub mod scoring;

pub use batch::MicroBatch;
pub use pending::PendingConfirmation;
pub use realtime::{AnalyzerOutputs, HotlistChange, HydrationRequest, RealtimeAnalyzer};
pub use scoring::{analyze_intraday, confirm_score, hotlist_score, micro_signal, MicroSignal};
