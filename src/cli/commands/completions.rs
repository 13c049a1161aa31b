//! Completions command - print shell completion scripts
//!
//! ```bash
//! lzc-dtl completions bash > ~/.local/share/bash-completion/completions/lzc-dtl
//! lzc-dtl completions zsh > ~/.zfunc/_lzc-dtl
//! ```

use crate::cli::args::Cli;
use clap::CommandFactory;
use clap_complete::{generate, Shell};
use std::io::Write;

/// Write the completion script for `shell` to `out`
pub fn write_completions(shell: Shell, out: &mut dyn Write) {
    let mut cmd = Cli::command();
    generate(shell, &mut cmd, "lzc-dtl", out);
}

/// Execute the completions command
pub fn execute(shell: Shell) {
    write_completions(shell, &mut std::io::stdout());
}
