//! Command dispatch: bridges CLI args -> `Vantage` calls -> output formatting.

pub mod button;
pub mod config_cmd;
pub mod invoke;
pub mod monitor;
pub mod objects;
pub mod util;

use vantage_core::Vantage;

use crate::cli::{Command, GlobalOpts};
use crate::error::CliError;

/// Dispatch a controller-bound command to the appropriate handler.
pub async fn dispatch(cmd: Command, vantage: &Vantage, global: &GlobalOpts) -> Result<(), CliError> {
    match cmd {
        Command::Monitor(args) => monitor::handle(vantage, args, global).await,
        Command::List(args) => objects::list(vantage, &args, global).await,
        Command::Get(args) => objects::get(vantage, &args, global).await,
        Command::Invoke(args) => invoke::invoke(vantage, &args, global).await,
        Command::Raw(args) => invoke::raw(vantage, &args, global).await,
        Command::Press(args) => button::press(vantage, &args, global).await,
        Command::Led(args) => button::led(vantage, &args, global).await,
        Command::Config(_) | Command::Completions(_) => Err(CliError::Validation {
            field: "command".into(),
            reason: "handled before connecting".into(),
        }),
    }
}
