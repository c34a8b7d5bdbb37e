pub mod payloads;
pub mod research;
pub mod rest;
pub mod routes;
pub mod state;
pub mod upload;

// Re-export the router builder so the server binary and tests share one
// route table.
pub use routes::build_router;
pub use state::AppState;
