mod settings;

pub use settings::{
    BroadcastConfig, DatabaseConfig, EmailConfig, JwtConfig, OtelConfig, PushProviderConfig,
    ServerConfig, Settings,
};
