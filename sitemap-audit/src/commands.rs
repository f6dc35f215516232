use clap::{arg, command};
use url::Url;

pub const CLAP_STYLING: clap::builder::styling::Styles = clap::builder::styling::Styles::styled()
    .header(clap_cargo::style::HEADER)
    .usage(clap_cargo::style::USAGE)
    .literal(clap_cargo::style::LITERAL)
    .placeholder(clap_cargo::style::PLACEHOLDER)
    .error(clap_cargo::style::ERROR)
    .valid(clap_cargo::style::VALID)
    .invalid(clap_cargo::style::INVALID);

pub fn command_argument_builder() -> clap::Command {
    clap::Command::new("sitemap-audit")
        .version(env!("CARGO_PKG_VERSION"))
        .bin_name("sitemap-audit")
        .about("Walks a sitemap tree and records the HTTP status of every sitemap and URL in it")
        .styles(CLAP_STYLING)
        .arg(
            arg!(-q --"quiet" "Suppress banner and progress output")
                .required(false)
                .global(true),
        )
        .arg(
            arg!(-v --"verbose" ... "Increase log verbosity (-v info, -vv debug, -vvv trace)")
                .required(false)
                .global(true),
        )
        .subcommand_required(true)
        .subcommand(
            command!("crawl")
                .about(
                    "Recursively resolve a sitemap index and check the status of every \
                sitemap and URL it references.",
                )
                .arg(
                    arg!(<URL>)
                        .help("The root sitemap index (or sitemap) URL")
                        .value_parser(clap::value_parser!(Url)),
                )
                .arg(
                    arg!(-t --"threads" <NUM_WORKERS>)
                        .required(false)
                        .help("Maximum number of requests in flight at once")
                        .value_parser(clap::value_parser!(usize))
                        .default_value("10"),
                )
                .arg(
                    arg!(--"max-depth" <DEPTH>)
                        .required(false)
                        .help("Deepest level of the tree to visit (the root is 0)")
                        .value_parser(clap::value_parser!(usize))
                        .default_value("8"),
                )
                .arg(
                    arg!(--"max-nodes" <COUNT>)
                        .required(false)
                        .help("Maximum number of distinct locations to visit")
                        .value_parser(clap::value_parser!(usize))
                        .default_value("100000"),
                )
                .arg(
                    arg!(--"timeout" <SECONDS>)
                        .required(false)
                        .help("Per-request timeout in seconds")
                        .value_parser(clap::value_parser!(u64))
                        .default_value("10"),
                )
                .arg(
                    arg!(--"crawl-timeout" <SECONDS>)
                        .required(false)
                        .help("Stop the whole crawl after this many seconds and report what was found")
                        .value_parser(clap::value_parser!(u64)),
                )
                .arg(
                    arg!(--"user-agent" <AGENT>)
                        .required(false)
                        .help("User-Agent header sent with every request"),
                )
                .arg(
                    arg!(--"no-head-fallback")
                        .required(false)
                        .help("Do not retry with GET when a server rejects HEAD requests")
                        .action(clap::ArgAction::SetTrue),
                )
                .arg(
                    arg!(-o --"output" <PATH>)
                        .required(false)
                        .help("Save report to file (default: print to stdout)"),
                )
                .arg(
                    arg!(-f --"format" <FORMAT>)
                        .required(false)
                        .help("Report format: csv, json, text")
                        .value_parser(["csv", "json", "text"])
                        .default_value("csv"),
                ),
        )
        .subcommand(
            command!("inspect")
                .about("Fetch and decode a single sitemap document without crawling it")
                .arg(
                    arg!(<URL>)
                        .help("The sitemap document URL")
                        .value_parser(clap::value_parser!(Url)),
                )
                .arg(
                    arg!(--"timeout" <SECONDS>)
                        .required(false)
                        .help("Request timeout in seconds")
                        .value_parser(clap::value_parser!(u64))
                        .default_value("10"),
                ),
        )
}
