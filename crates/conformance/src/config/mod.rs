pub mod cli;
pub mod run;
pub mod test_config;

pub use cli::*;
pub use run::*;
pub use test_config::*;
