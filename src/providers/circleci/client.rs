mod core;
mod pipelines;
mod users;
mod workflows;

pub use self::core::{CircleCiClient, ClientSettings, DEFAULT_BASE_URL};
