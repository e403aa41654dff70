// LaTeX Lab - LaTeX math workbench with a symbolic engine, plots and model explanations

pub mod algebra;   // In-crate symbolic engine behind the AlgebraEngine trait
pub mod config;
pub mod llm;
pub mod math;
pub mod middleware;
pub mod models;
pub mod plot;
pub mod render;
pub mod routes;
pub mod settings;  // API settings, encrypted persistence and theme
pub mod types;
pub mod utils;
pub mod workbench;

// Re-exports for convenience
pub use config::Config;
pub use models::AppState;
pub use workbench::Workbench;

pub fn create_router(state: AppState) -> axum::Router {
    routes::create_router(state)
}
