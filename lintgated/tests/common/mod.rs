pub mod daemon;
pub mod logging;

pub use daemon::DaemonProcess;
pub use logging::init_test_logging;
