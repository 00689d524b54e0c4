//! `wbemcli repl`: run commands interactively against one context.
//!
//! Lines are split shell-style and parsed like the command line minus the
//! program name and global options. `exit`, `quit` or EOF ends the loop.
//! A failing command prints its error and the loop continues.

use anyhow::Result;
use clap::Parser;
use std::io::{self, BufRead, Write};

use crate::cmd::format::OutputFormat;
use crate::cmd::shared::Context;
use crate::cmd::{Commands, execute};

const PROMPT: &str = "wbemcli> ";

#[derive(Parser, Debug)]
#[command(name = "wbemcli", no_binary_name = true)]
struct ReplLine {
    #[command(subcommand)]
    command: Commands,
}

/// Interactive loop on stdin; the prompt goes to stderr.
pub fn execute_repl(ctx: &mut Context) -> Result<()> {
    let stdin = io::stdin();
    run_repl(ctx, stdin.lock(), io::stderr())
}

pub fn run_repl<R: BufRead, W: Write>(ctx: &mut Context, mut input: R, mut prompt: W) -> Result<()> {
    tracing::debug!(connected = ctx.is_connected(), "repl started");
    let mut line = String::new();
    loop {
        write!(prompt, "{PROMPT}")?;
        prompt.flush()?;
        line.clear();
        if input.read_line(&mut line)? == 0 {
            writeln!(prompt)?;
            break;
        }
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if matches!(trimmed, "exit" | "quit") {
            break;
        }

        let words = match shell_words::split(trimmed) {
            Ok(w) => w,
            Err(e) => {
                ctx.renderer(OutputFormat::Text)
                    .error(format!("Cannot split line: {e}"))?;
                continue;
            }
        };
        let parsed = match ReplLine::try_parse_from(&words) {
            Ok(p) => p,
            Err(e) => {
                let text = e.render().to_string();
                let mut out = ctx.renderer(OutputFormat::Text);
                if e.use_stderr() {
                    out.error(text.trim_end().trim_start_matches("error: "))?;
                } else {
                    out.line(text.trim_end())?;
                }
                continue;
            }
        };
        if matches!(parsed.command, Commands::Repl) {
            ctx.renderer(OutputFormat::Text)
                .error("Already in the repl")?;
            continue;
        }
        if let Err(e) = execute(parsed.command, ctx) {
            tracing::debug!(error = ?e, "repl command failed");
            ctx.renderer(OutputFormat::Text).error(format!("{e:#}"))?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cmd::shared::testing::mock_context;

    fn session(script: &str) -> (String, String) {
        let (mut ctx, out, err) = mock_context(OutputFormat::Text);
        let mut prompt = Vec::new();
        run_repl(&mut ctx, script.as_bytes(), &mut prompt).unwrap();
        (out.contents(), err.contents())
    }

    #[test]
    fn runs_commands_until_exit() {
        let (out, _) = session(
            "namespace interop\n\nclass find 'tst_p*' -n root/cimv2\nexit\nnamespace interop\n",
        );
        assert_eq!(out, "interop\nTST_Person\n");
    }

    #[test]
    fn errors_do_not_end_the_loop() {
        let (out, err) = session("class get NoSuchClass\nbogus\nrepl\nnamespace interop\n");
        assert!(err.contains("NoSuchClass"));
        assert!(err.contains("Already in the repl"));
        assert!(err.matches("Error:").count() >= 3);
        assert_eq!(out.lines().last(), Some("interop"));
    }

    #[test]
    fn state_persists_between_lines() {
        let (out, _) = session(
            "instance create TST_Person -p name=Gabi\ninstance count tst_person -n root/cimv2\n",
        );
        assert!(out.ends_with("TST_Person: 4\n"));
    }

    #[test]
    fn unbalanced_quotes_reported() {
        let (_, err) = session("class get 'oops\n");
        assert!(err.contains("Cannot split line"));
    }
}
