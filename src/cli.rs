use std::path::PathBuf;

use clap::{Parser, ValueHint};

/// Command-driven chat assistant over a key-value + pub/sub store.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// How long a channel listener waits for a message before re-checking
    /// for shutdown, in milliseconds.
    #[arg(long, default_value_t = 250)]
    pub receive_timeout_ms: u64,

    /// Channel reserved for direct messages to the bot.
    #[arg(long, default_value = "chatbot:dm")]
    pub dm_channel: String,

    /// JSON file overriding the built-in weather and fact data.
    #[arg(long, value_hint = ValueHint::FilePath)]
    pub seed: Option<PathBuf>,
}
