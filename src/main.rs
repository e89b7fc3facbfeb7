use clap::Parser;
use miette::Result;
use tplm::cli::{Cli, Commands};

fn main() -> Result<()> {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(2)
                .tab_width(4)
                .build(),
        )
    }))?;

    let cli = Cli::parse();
    tplm::cli::init_logging(cli.global.verbose, cli.global.quiet);

    let global = cli.global;
    match cli.command {
        Commands::Init(args) => tplm::cli::commands::init::run(args),
        Commands::Part(cmd) => tplm::cli::commands::part::run(cmd, &global),
        Commands::Product(cmd) => tplm::cli::commands::product::run(cmd, &global),
        Commands::Tree(args) => tplm::cli::commands::tree::run_tree(args, &global),
        Commands::Paths(args) => tplm::cli::commands::tree::run_paths(args, &global),
        Commands::Rollup(args) => tplm::cli::commands::tree::run_rollup(args, &global),
        Commands::Baseline(cmd) => tplm::cli::commands::baseline::run(cmd, &global),
        Commands::Instance(cmd) => tplm::cli::commands::instance::run(cmd, &global),
        Commands::Link(cmd) => tplm::cli::commands::link::run(cmd, &global),
        Commands::Completions(args) => tplm::cli::commands::completions::run(args),
    }
}
