//! Command implementations for the Compass CLI

mod evaluate;
mod run;

pub use evaluate::cmd_evaluate;
pub use run::{cmd_detect, cmd_run};
