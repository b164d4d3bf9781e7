pub mod assertions;
pub mod fixtures;
pub mod logging;

pub use assertions::{assert_contains, assert_empty};
pub use fixtures::{RunResult, TestProject};
pub use logging::init_test_logging;
