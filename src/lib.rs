// Infrastructure layer (shared components)
pub mod infrastructure;

// Re-export infrastructure modules for backward compatibility
pub use infrastructure::backoff;
pub use infrastructure::config;
pub use infrastructure::error;
pub use infrastructure::metrics;
pub use infrastructure::postgres;

// Domain layer (business logic)
pub mod broadcast;
pub mod directory;
pub mod providers;
pub mod template;

// Application layer
pub mod api;
pub mod auth;
pub mod server;

// Supporting modules
pub mod shutdown;
pub mod tasks;
pub mod telemetry;
