pub mod app;
pub mod dispatch;
pub mod error;
pub mod handlers;
pub mod state;

pub use app::build_app;
pub use state::AppState;
