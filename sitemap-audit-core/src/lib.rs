pub mod crawl;
pub mod report;

use colored::Colorize;

pub fn print_banner() {
    let banner = r#"
     _ _                                             _ _ _
 ___(_) |_ ___ _ __ ___   __ _ _ __     __ _ _   _  __| (_) |_
/ __| | __/ _ \ '_ ` _ \ / _` | '_ \   / _` | | | |/ _` | | __|
\__ \ | ||  __/ | | | | | (_| | |_) | | (_| | |_| | (_| | | |_
|___/_|\__\___|_| |_| |_|\__,_| .__/   \__,_|\__,_|\__,_|_|\__|
                              |_|"#;
    eprintln!("{}", banner.bright_cyan());
    eprintln!(
        "  {} {}\n",
        "sitemap-audit".bright_white().bold(),
        env!("CARGO_PKG_VERSION").bright_black()
    );
}
