pub mod engine;
pub mod models;
pub mod routes;
pub mod server;
pub mod websocket;
