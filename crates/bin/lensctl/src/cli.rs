//! Command-line surface.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use lens_domain::id::{ActionId, DeviceId};

#[derive(Debug, Parser)]
#[command(name = "lensctl")]
#[command(author, version, about = "Inspect and edit IF/THEN/EVALUATE rule chains")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// List stored actions.
    Actions,
    /// Load an action into the editor and print the form.
    Show { id: ActionId },
    /// Validate an action JSON file against live schemas and store it.
    Save {
        #[arg(short, long)]
        file: PathBuf,
        /// Update this action instead of the id carried by the file.
        #[arg(long)]
        id: Option<ActionId>,
    },
    /// Delete a stored action.
    Delete { id: ActionId },
    /// Print the topics and command topics of a device.
    Schema { device: DeviceId },
    /// Report whether an action's trigger fires for a payload.
    Check {
        id: ActionId,
        #[arg(short, long)]
        payload: String,
    },
}
