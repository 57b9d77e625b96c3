//! The [`Command`] trait implemented by every subcommand, dispatched with
//! `enum_dispatch`.

use anyhow::Result;
use enum_dispatch::enum_dispatch;

#[enum_dispatch]
pub trait Command {
    /// Runs the command. `command_line` is the full invocation, recorded in
    /// `@PG` headers of BAM output.
    #[allow(clippy::missing_errors_doc)]
    fn execute(&self, command_line: &str) -> Result<()>;
}
