// Library surface for the CLI and integration tests.
// Host-specific glue (browsers, page scraping) lives behind the traits in `host`.
pub mod app_dirs;
pub mod cadence;
pub mod config;
pub mod driver;
pub mod error;
pub mod host;
pub mod logging;
pub mod mistakes;
pub mod runtime;
pub mod schedule;
pub mod session;
pub mod time_series;
pub mod util;
pub mod watcher;

pub use cadence::CadenceController;
pub use driver::TypingSessionDriver;
pub use mistakes::MistakeInjector;
pub use schedule::{generate_schedule, Preset, WpmSchedule};
pub use session::{run_session, EndReason, SessionReport};
pub use watcher::CompletionWatcher;
