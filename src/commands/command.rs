use anyhow::Result;
use enum_dispatch::enum_dispatch;

/// Common interface for all subcommands.
#[enum_dispatch]
pub trait Command {
    /// Run the subcommand.
    fn execute(&self) -> Result<()>;
}
