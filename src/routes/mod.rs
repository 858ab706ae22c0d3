pub mod api;
pub mod app;
pub mod ws;

pub use app::create_app_router;
