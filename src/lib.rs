pub mod ops;

mod app;
pub mod browser;
pub mod config;
pub mod diff;
pub mod editor;
pub mod logging;
pub mod parent;
pub mod prompt;
pub mod provider;
pub mod remote;
pub mod review;
pub mod suggest;
pub mod sync;

// Re-export App and Config from modules
pub use app::App;
pub use app::Outcome;
pub use config::Config;

// Disable colors for all tests to get clean output
#[cfg(test)]
#[ctor::ctor]
fn init_tests() {
    colored::control::set_override(false);
}
