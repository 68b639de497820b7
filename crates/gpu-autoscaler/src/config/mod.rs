pub mod cli;
pub mod error;
pub mod inventory;
pub mod run;

pub use cli::*;
pub use error::ConfigError;
pub use inventory::load_inventory;
pub use run::*;
