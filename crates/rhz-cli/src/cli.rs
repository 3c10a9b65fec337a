use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "rhz",
    about = "Rhizome: content-addressed entries, signed action chains, and link indices",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,

    /// State directory holding rhz.toml, agent.key and dht.json
    #[arg(long, global = true, default_value = ".rhizome")]
    pub state: PathBuf,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Create a state directory with a fresh agent key
    Init(InitArgs),
    /// Create an entry
    Create(CreateArgs),
    /// Append a revision to an entry
    Update(UpdateArgs),
    /// Delete an entry
    Delete(DeleteArgs),
    /// Show the latest revision of an entry
    Get(GetArgs),
    /// Show every revision of an entry
    History(GetArgs),
    /// Link a base (path or address) to a target
    Link(LinkArgs),
    /// Remove a link
    Unlink(UnlinkArgs),
    /// List entries linked from a path
    List(ListArgs),
    /// Audit every action chain
    Verify,
}

#[derive(Args)]
pub struct InitArgs {
    /// Overwrite an existing state directory
    #[arg(long)]
    pub force: bool,
}

#[derive(Args)]
pub struct CreateArgs {
    /// Entry type, as `name` or `name@version`
    pub entry_type: String,
    /// Entry content as JSON
    pub json: String,
}

#[derive(Args)]
pub struct UpdateArgs {
    /// Original action address of the entry
    pub original: String,
    /// New content as JSON
    pub json: String,
    /// Tip the update is based on; defaults to the current tip
    #[arg(long)]
    pub previous: Option<String>,
}

#[derive(Args)]
pub struct DeleteArgs {
    pub original: String,
}

#[derive(Args)]
pub struct GetArgs {
    /// Original action address, or any revision of it
    pub address: String,
}

#[derive(Args)]
pub struct LinkArgs {
    /// Dotted path (e.g. `notes.open`) or 64-char hex address
    pub base: String,
    /// Target address
    pub target: String,
    /// Link type, by name or number
    #[arg(short = 't', long = "type")]
    pub link_type: String,
    #[arg(long, default_value = "")]
    pub tag: String,
}

#[derive(Args)]
pub struct UnlinkArgs {
    /// Link id (the address of the action that created it)
    pub link: String,
}

#[derive(Args)]
pub struct ListArgs {
    /// Dotted path
    pub path: String,
    /// Link type, by name or number
    #[arg(short = 't', long = "type")]
    pub link_type: String,
    /// Only links whose tag starts with this prefix
    #[arg(long)]
    pub tag_prefix: Option<String>,
}
