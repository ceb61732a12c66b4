pub mod loader;
pub mod model;
pub mod persona;

pub use loader::load_app_config;
pub use model::{
    AppConfig, DatabaseConfig, GatewayConfig, ProviderConfig, SmtpConfig, WatcherConfig,
};
pub use persona::PersonaConfig;
