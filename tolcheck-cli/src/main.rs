// These Clippy lints are disabled because this is a CLI binary, not a library:
// - print_stdout/print_stderr: CLI tools are expected to print to stdout/stderr for user output.
// - exit: Calling `std::process::exit()` is standard for CLI apps to signal failure to the shell.
#![allow(clippy::print_stdout, clippy::print_stderr, clippy::exit)]

use tolcheck_cli::{cli, launcher};

#[tokio::main]
async fn main() {
    if let Err(e) = cli::run().await {
        eprintln!("Error: {e}");
        if e.downcast_ref::<launcher::MissingPrerequisite>().is_some() {
            launcher::pause_on_windows();
        }
        std::process::exit(1);
    }
}
