pub mod broker;
pub mod config;
pub mod context;
pub mod crypto;
pub mod error;
pub mod metrics;
pub mod relay;
pub mod routes;

pub use config::Config;
pub use context::AppContext;
pub use crypto::KeyStore;
pub use error::{RelayError, RelayResult};
pub use relay::RelayService;
