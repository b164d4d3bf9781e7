mod command_tests;
mod hook_tests;
mod skip_tests;
