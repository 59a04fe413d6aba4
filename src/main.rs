use clap::Parser;

use issueboard::cli::{self, RootCommand};
use issueboard::logging::init_logging;

#[derive(Parser, Debug)]
#[command(
    name = "issueboard",
    about = "GitHub-backed kanban issue dashboard",
    long_about = "A local issue dashboard that mirrors a GitHub repository: \
                  issues and labels sync into a sqlite cache, and board \
                  placement, priorities, groups and notifications stay local.",
    version = env!("ISSUEBOARD_BUILD_VERSION"),
    author
)]
struct Cli {
    /// Act as this user for commands that need one.
    #[arg(long, global = true, value_name = "USERNAME")]
    user: Option<String>,

    #[arg(long, global = true)]
    json: bool,

    #[arg(long)]
    quiet: bool,

    #[command(subcommand)]
    command: RootCommand,
}

fn main() {
    if let Err(err) = init_logging() {
        eprintln!("warning: failed to initialize logging: {err}");
    }

    let cli = Cli::parse();
    let code = cli::run(cli.command, cli.user.as_deref(), cli.json, cli.quiet);
    std::process::exit(code);
}
