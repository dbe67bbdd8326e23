mod handlers;
mod health;
mod metrics;
mod models;
mod routes;

pub use routes::api_routes;
