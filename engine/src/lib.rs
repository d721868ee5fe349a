pub mod adapter;
pub mod barrier;
pub mod client;
pub mod config;
pub mod conversation;
pub mod error;
pub mod events;
pub mod identity;
pub mod ledger;
pub mod lifecycle;
pub mod listener;
pub mod notify;

pub use adapter::{SessionPaths, SessionStore};
pub use barrier::{values_match, BarrierPhase, Reveal, RoundBarrier};
pub use client::{GameClient, RoundEngine};
pub use config::EngineConfig;
pub use conversation::{ConversationEngine, TodPhase};
pub use error::EngineError;
pub use events::{Effect, EngineEvent};
pub use identity::IdentitySources;
pub use ledger::IdempotencyLedger;
pub use lifecycle::{Observation, SessionMirror};
pub use listener::{ListenerKey, ListenerSlot, StartGuard};
pub use notify::{NoopNotifier, PartnerEvent, PartnerNotifier, RecordingNotifier};
