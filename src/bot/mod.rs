//! Coordinator
//!
//! One task owns [`BotState`](crate::state::BotState) and serializes every
//! mutation through a `tokio::select!` loop. Discovery, sentiment polling
//! and history fetches run in spawned tasks and report back over channels.

mod coordinator;

pub use coordinator::{Bot, BotDeps};
