pub mod channel;
pub mod config;
pub mod proxy;
pub mod spawn;
pub mod target;
pub mod worker;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Channel(#[from] channel::ChannelError),

    #[error(transparent)]
    Config(#[from] config::ConfigError),

    #[error(transparent)]
    Proxy(#[from] proxy::ProxyError),

    #[error(transparent)]
    Spawn(#[from] spawn::SpawnError),

    #[error(transparent)]
    Target(#[from] target::TargetError),

    #[error(transparent)]
    Worker(#[from] worker::WorkerError),
}
