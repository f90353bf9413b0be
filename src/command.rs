//! Parsing of `!`-prefixed chat commands.
//!
//! A line either carries the command marker or it is ordinary chatter. The
//! command name is matched case-insensitively; everything after the first
//! whitespace boundary is carried whole as a single argument, so a channel
//! name containing spaces survives intact. Argument validation belongs to the
//! dispatcher, which is why arguments are `Option<String>` here.

/// Marker that distinguishes commands from ordinary chatter.
pub const COMMAND_MARKER: char = '!';

/// Commands the bot understands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Help,
    Fact,
    Weather { city: Option<String> },
    WhoAmI,
    UpdateInfo,
    JoinChannel { channel: Option<String> },
    SendMessage { channel: Option<String> },
    LeaveChannel { channel: Option<String> },
    ReadMessages { channel: Option<String> },
    DirectMessage,
    Quit,
}

/// Outcome of parsing one input line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Parsed {
    Command(Command),
    /// Marker present but the name matches nothing the bot understands.
    /// This earns the user a hint, never an error.
    Unknown { token: String },
    /// Ordinary chatter without the command marker.
    NotACommand,
}

/// Parses one input line into a command, an unknown token, or chatter.
pub fn parse(line: &str) -> Parsed {
    let trimmed = line.trim();
    let Some(body) = trimmed.strip_prefix(COMMAND_MARKER) else {
        return Parsed::NotACommand;
    };

    let (token, remainder) = match body.split_once(char::is_whitespace) {
        Some((token, rest)) => (token, rest.trim()),
        None => (body, ""),
    };
    let argument = (!remainder.is_empty()).then(|| remainder.to_string());

    let command = match token.to_ascii_lowercase().as_str() {
        "help" => Command::Help,
        "fact" => Command::Fact,
        "weather" => Command::Weather { city: argument },
        "whoami" => Command::WhoAmI,
        "updateinfo" => Command::UpdateInfo,
        "joinchannel" => Command::JoinChannel { channel: argument },
        "sendmessage" => Command::SendMessage { channel: argument },
        "leavechannel" => Command::LeaveChannel { channel: argument },
        "readmessages" => Command::ReadMessages { channel: argument },
        "directmessage" => Command::DirectMessage,
        "quit" => Command::Quit,
        _ => {
            return Parsed::Unknown {
                token: token.to_string(),
            }
        }
    };
    Parsed::Command(command)
}
