pub mod commands;
pub mod handlers;

// Re-export commonly used handler functions for convenience
pub use commands::command_argument_builder;
pub use handlers::{
    build_crawl_config, exit_code_for, handle_crawl, handle_inspect, init_tracing,
    resolve_output_path, selected_format,
};
