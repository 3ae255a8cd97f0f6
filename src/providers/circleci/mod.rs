mod aggregator;
mod api;
mod assembler;
mod client;
mod dedup;
mod organizations;
mod pagination;
mod provider;
mod types;

#[cfg(test)]
pub(crate) mod testing;

pub use api::CircleApi;
pub use assembler::Transitions;
pub use assembler::TransitionTracker;
pub use client::{CircleCiClient, ClientSettings, DEFAULT_BASE_URL};
pub use provider::CircleCiProvider;
