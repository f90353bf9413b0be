//! Interactive command loop.
//!
//! Prints the introduction, walks the user through the initial registration,
//! then reads `!`-marked commands until quit, end of input, or Ctrl-C. The
//! loop body is generic over its line endpoints so integration tests drive
//! the whole conversation through in-memory pipes.

use anyhow::Result;
use tokio::io::{AsyncBufRead, AsyncWrite, BufReader};
use tokio::select;
use tracing::warn;

use crate::command::{self, Parsed};
use crate::dispatch::{self, read_trimmed_line, write_line, DispatchConfig, Flow};
use crate::session::Session;
use crate::store::Store;

const BANNER: &str = "\
Hello! I'm here to make your messaging experience smoother: I store your
messages, manage channels, and serve up interesting tidbits whenever you
need them.";

/// Runs the conversation over the process's stdin/stdout.
pub async fn run(store: Store, config: DispatchConfig) -> Result<()> {
    let stdin = BufReader::new(tokio::io::stdin());
    let stdout = tokio::io::stdout();
    run_loop(store, config, stdin, stdout).await
}

/// Drives the whole conversation over arbitrary line endpoints.
pub async fn run_loop<R, W>(
    store: Store,
    config: DispatchConfig,
    mut input: R,
    mut output: W,
) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut session = Session::new();

    write_line(&mut output, BANNER).await?;
    write_line(&mut output, dispatch::COMMAND_LIST).await?;

    // Registration is not optional: every later command may need an author.
    write_line(&mut output, "Before we begin, please enter your user info.").await?;
    if dispatch::run_identify(&mut session, &store, &mut input, &mut output).await? == Flow::Quit {
        return Ok(());
    }
    write_line(&mut output, "Thank you for registering!").await?;

    loop {
        write_line(&mut output, "Please enter a command (or '!quit' to exit):").await?;

        let line = select! {
            line = read_trimmed_line(&mut input) => match line? {
                Some(line) => line,
                None => break,
            },
            ctrl_c = tokio::signal::ctrl_c() => {
                if let Err(error) = ctrl_c {
                    warn!(?error, "ctrl-c handler failed");
                }
                break;
            }
        };

        match command::parse(&line) {
            Parsed::NotACommand => {
                if line.is_empty() {
                    continue;
                }
                write_line(
                    &mut output,
                    "Please enter a command. Use !help to see all commands.",
                )
                .await?;
            }
            Parsed::Unknown { .. } => {
                write_line(
                    &mut output,
                    "Command not recognized. Use !help to see all commands.",
                )
                .await?;
            }
            Parsed::Command(command) => {
                let flow = dispatch::dispatch(
                    command,
                    &mut session,
                    &store,
                    &config,
                    &mut input,
                    &mut output,
                )
                .await?;
                if flow == Flow::Quit {
                    break;
                }
            }
        }
    }

    session.stop_all().await;
    write_line(&mut output, "Goodbye!").await?;
    Ok(())
}
