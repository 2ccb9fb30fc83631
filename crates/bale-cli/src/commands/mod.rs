//! One module per subcommand, each exposing `execute`.

pub mod build;
pub mod config;
pub mod test;
pub(crate) mod utils;

pub use build::execute as build_execute;
pub use config::execute as config_execute;
pub use test::execute as test_execute;
