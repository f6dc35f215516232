use colored::*;
use sitemap_audit::commands::command_argument_builder;
use sitemap_audit::handlers::{EXIT_FATAL, handle_crawl, handle_inspect, init_tracing};
use sitemap_audit_core::print_banner;

#[tokio::main]
async fn main() {
    let cmd = command_argument_builder();
    let chosen_command = cmd.get_matches();
    let quiet = chosen_command.get_flag("quiet");
    init_tracing(chosen_command.get_count("verbose"));

    // Show banner unless --quiet flag is set
    if !quiet {
        print_banner();
    }

    let outcome = match chosen_command.subcommand() {
        Some(("crawl", primary_command)) => handle_crawl(primary_command, quiet).await,
        Some(("inspect", primary_command)) => handle_inspect(primary_command).await.map(|_| 0),
        _ => unreachable!("clap should ensure we don't get here"),
    };

    match outcome {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("{} {:#}", "Error:".red().bold(), e);
            std::process::exit(EXIT_FATAL);
        }
    }
}
