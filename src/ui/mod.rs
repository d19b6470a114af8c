//! Ratatui front-end for the switchboard directory.

mod app;
mod forms;
mod helpers;
mod registry;
mod screens;
mod terminal;

pub use app::App;
pub use terminal::run_app;
