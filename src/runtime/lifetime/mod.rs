pub mod shutdown;
pub mod startup;

pub use shutdown::{listen_for_shutdown, perform_shutdown_tasks};
pub use startup::{StartupContext, build_components, prepare_server_startup};
