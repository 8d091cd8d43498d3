//! Core trait definitions

mod app;

pub use app::App;
