//! Command dispatch and handlers.
//!
//! Handlers are stateless: each takes the session, the store, and the line
//! endpoints it needs, generic over `AsyncBufRead`/`AsyncWrite` so tests can
//! drive them through in-memory pipes. User-facing problems (missing
//! arguments, not identified, store unavailable) are reported to the output
//! and the loop carries on; only I/O failures propagate.

use std::time::Duration;

use anyhow::Result;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::warn;

use crate::command::Command;
use crate::listener::ChannelListener;
use crate::session::{Session, SessionError};
use crate::store::{Store, StoreError, UserProfile};

/// What the command loop should do after a handler finishes.
#[derive(Debug, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

/// Tunables the dispatcher threads through to handlers.
pub struct DispatchConfig {
    /// How long a listener waits on its subscription before re-checking for
    /// shutdown.
    pub receive_timeout: Duration,
    /// Channel reserved for direct messages to the bot.
    pub dm_channel: String,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            receive_timeout: Duration::from_millis(250),
            dm_channel: "chatbot:dm".to_string(),
        }
    }
}

/// Token that ends the interactive send loop.
pub const STOP_TOKEN: &str = "!quit";

/// Printed by `!help` and as part of the startup banner.
pub const COMMAND_LIST: &str = "\
Here is a list of commands this bot supports:
  !help: List of commands
  !fact: Random fun fact
  !weather <city>: Weather update
  !whoami: Your user information
  !updateinfo: Update your user information
  !joinchannel <channel>: Join a channel
  !sendmessage <channel>: Send a message to a channel
  !leavechannel <channel>: Leave a channel
  !readmessages <channel>: Read all messages from a channel
  !directmessage: Message the bot
  !quit: Exit";

const BOT_REPLY: &str =
    "[bot]: While I would love to chat, I must get back to keeping track of everyone's usernames and messages!";

/// Routes one parsed command to its handler.
pub async fn dispatch<R, W>(
    command: Command,
    session: &mut Session,
    store: &Store,
    config: &DispatchConfig,
    input: &mut R,
    output: &mut W,
) -> Result<Flow>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    match command {
        Command::Help => help(output).await?,
        Command::Fact => fact(store, output).await?,
        Command::Weather { city } => weather(city, store, output).await?,
        Command::WhoAmI => who_am_i(session, store, output).await?,
        Command::UpdateInfo => return run_identify(session, store, input, output).await,
        Command::JoinChannel { channel } => {
            join_channel(channel, session, store, config, output).await?
        }
        Command::SendMessage { channel } => {
            return send_message(channel, session, store, input, output).await
        }
        Command::LeaveChannel { channel } => leave_channel(channel, session, output).await?,
        Command::ReadMessages { channel } => read_messages(channel, store, output).await?,
        Command::DirectMessage => {
            return direct_message(session, store, config, input, output).await
        }
        Command::Quit => return Ok(Flow::Quit),
    }
    Ok(Flow::Continue)
}

async fn help<W>(output: &mut W) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    write_line(output, COMMAND_LIST).await
}

async fn fact<W>(store: &Store, output: &mut W) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    match store.random_fact() {
        Ok(Some(fact)) => write_line(output, &fact).await,
        Ok(None) => write_line(output, "No facts available yet.").await,
        Err(error) => report_store_error(error, output).await,
    }
}

async fn weather<W>(city: Option<String>, store: &Store, output: &mut W) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let Some(city) = city else {
        return write_line(output, "Please specify a city. Usage: !weather <city>").await;
    };
    match store.lookup_weather(&city) {
        Ok(Some(description)) => {
            write_line(output, &format!("Weather in {city}: {description}")).await
        }
        Ok(None) => {
            let known = store.known_cities().unwrap_or_default();
            write_line(
                output,
                &format!(
                    "Weather data for {city} is not available. Try: {}",
                    known.join(", ")
                ),
            )
            .await
        }
        Err(error) => report_store_error(error, output).await,
    }
}

async fn who_am_i<W>(session: &Session, store: &Store, output: &mut W) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    match session.who_am_i(store) {
        Ok(profile) => {
            write_line(output, "User data:").await?;
            write_line(output, &format!("  Name: {}", profile.username)).await?;
            write_line(output, &format!("  Age: {}", profile.age)).await?;
            write_line(output, &format!("  Gender: {}", profile.gender)).await?;
            write_line(output, &format!("  Location: {}", profile.location)).await
        }
        Err(error) => report_session_error(error, output).await,
    }
}

/// Four-prompt registration, used by `!updateinfo` and the startup flow.
/// Returns `Flow::Quit` when the input ends mid-way.
pub async fn run_identify<R, W>(
    session: &mut Session,
    store: &Store,
    input: &mut R,
    output: &mut W,
) -> Result<Flow>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let Some(username) = prompt(input, output, "Please enter a username:").await? else {
        return Ok(Flow::Quit);
    };
    let Some(age) = prompt(input, output, "Please enter your age:").await? else {
        return Ok(Flow::Quit);
    };
    let Some(gender) = prompt(input, output, "Please enter your gender:").await? else {
        return Ok(Flow::Quit);
    };
    let Some(location) = prompt(input, output, "Please enter your location:").await? else {
        return Ok(Flow::Quit);
    };

    let profile = UserProfile {
        username,
        age,
        gender,
        location,
    };
    match session.identify(store, profile) {
        Ok(()) => write_line(output, "Your information has been saved.").await?,
        Err(error) => report_store_error(error, output).await?,
    }
    Ok(Flow::Continue)
}

async fn join_channel<W>(
    channel: Option<String>,
    session: &mut Session,
    store: &Store,
    config: &DispatchConfig,
    output: &mut W,
) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let Some(channel) = channel else {
        return write_line(output, "Please specify a channel. Usage: !joinchannel <channel>").await;
    };
    if session.is_listening(&channel) {
        return write_line(output, &format!("Already listening to channel: {channel}")).await;
    }
    match store.subscribe(&channel) {
        Ok(subscription) => {
            session.add_listener(ChannelListener::spawn(subscription, config.receive_timeout));
            write_line(
                output,
                &format!("Listening to channel: {channel} (use !leavechannel {channel} to stop)"),
            )
            .await
        }
        Err(error) => report_store_error(error, output).await,
    }
}

async fn send_message<R, W>(
    channel: Option<String>,
    session: &mut Session,
    store: &Store,
    input: &mut R,
    output: &mut W,
) -> Result<Flow>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let Some(channel) = channel else {
        write_line(output, "Please specify a channel. Usage: !sendmessage <channel>").await?;
        return Ok(Flow::Continue);
    };
    // Messages carry their author, so an identity is required up front.
    let author = match session.username() {
        Ok(username) => username.to_string(),
        Err(error) => {
            report_session_error(error, output).await?;
            return Ok(Flow::Continue);
        }
    };

    write_line(
        output,
        &format!("Sending messages to channel: {channel} (type '{STOP_TOKEN}' to stop)"),
    )
    .await?;
    loop {
        write_line(output, "Enter your message:").await?;
        let Some(text) = read_trimmed_line(input).await? else {
            return Ok(Flow::Quit);
        };
        if text.eq_ignore_ascii_case(STOP_TOKEN) {
            write_line(output, "Stopped sending messages.").await?;
            return Ok(Flow::Continue);
        }
        if text.is_empty() {
            continue;
        }

        let live = format!("[{author}] - {text}");
        let stored = store
            .publish(&channel, &live)
            .and_then(|_| store.append_message(&channel, &author, &text));
        if let Err(error) = stored {
            report_store_error(error, output).await?;
            return Ok(Flow::Continue);
        }
        write_line(output, "Message sent!").await?;
    }
}

async fn leave_channel<W>(
    channel: Option<String>,
    session: &mut Session,
    output: &mut W,
) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let Some(channel) = channel else {
        return write_line(output, "Please specify a channel. Usage: !leavechannel <channel>").await;
    };
    match session.remove_listener(&channel) {
        Some(listener) => {
            listener.stop().await;
            write_line(output, &format!("Left channel: {channel}")).await
        }
        None => write_line(output, &format!("You were not listening to channel: {channel}")).await,
    }
}

async fn read_messages<W>(channel: Option<String>, store: &Store, output: &mut W) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let Some(channel) = channel else {
        return write_line(output, "Please specify a channel. Usage: !readmessages <channel>").await;
    };
    match store.list_messages(&channel) {
        Ok(messages) if messages.is_empty() => {
            write_line(output, &format!("No messages in channel: {channel}")).await
        }
        Ok(messages) => {
            write_line(output, &format!("--- Messages from {channel} ---")).await?;
            for message in &messages {
                write_line(output, message).await?;
            }
            Ok(())
        }
        Err(error) => report_store_error(error, output).await,
    }
}

async fn direct_message<R, W>(
    session: &Session,
    store: &Store,
    config: &DispatchConfig,
    input: &mut R,
    output: &mut W,
) -> Result<Flow>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let author = match session.username() {
        Ok(username) => username.to_string(),
        Err(error) => {
            report_session_error(error, output).await?;
            return Ok(Flow::Continue);
        }
    };

    let Some(text) = prompt(input, output, "Please enter your message:").await? else {
        return Ok(Flow::Quit);
    };
    if let Err(error) = store.publish(&config.dm_channel, &text) {
        report_store_error(error, output).await?;
        return Ok(Flow::Continue);
    }
    write_line(output, &format!("[{author}]: {text}")).await?;
    write_line(output, BOT_REPLY).await?;
    Ok(Flow::Continue)
}

async fn report_store_error<W>(error: StoreError, output: &mut W) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    warn!(%error, "store operation failed");
    write_line(output, "The store is unavailable right now; try again later.").await
}

async fn report_session_error<W>(error: SessionError, output: &mut W) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    match error {
        SessionError::NotIdentified => {
            write_line(
                output,
                "You have not identified yourself yet. Use !updateinfo to register.",
            )
            .await
        }
        SessionError::ProfileNotFound(username) => {
            warn!(username, "profile missing from the store");
            write_line(
                output,
                &format!("No profile found for '{username}'. Use !updateinfo to register again."),
            )
            .await
        }
        SessionError::Store(error) => report_store_error(error, output).await,
    }
}

async fn prompt<R, W>(input: &mut R, output: &mut W, question: &str) -> Result<Option<String>>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    write_line(output, question).await?;
    read_trimmed_line(input).await
}

/// Reads one line, stripping the trailing newline. `None` means end of input.
pub(crate) async fn read_trimmed_line<R>(input: &mut R) -> Result<Option<String>>
where
    R: AsyncBufRead + Unpin,
{
    let mut line = String::new();
    let bytes = input.read_line(&mut line).await?;
    if bytes == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim_end_matches(['\r', '\n']).to_string()))
}

pub(crate) async fn write_line<W>(output: &mut W, line: &str) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    output.write_all(line.as_bytes()).await?;
    output.write_all(b"\n").await?;
    output.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use tokio::io::BufReader;

    async fn run(
        command: Command,
        session: &mut Session,
        store: &Store,
        script: &str,
    ) -> (Flow, String) {
        let config = DispatchConfig::default();
        let mut input = BufReader::new(script.as_bytes());
        let mut output = Cursor::new(Vec::new());
        let flow = dispatch(command, session, store, &config, &mut input, &mut output)
            .await
            .expect("dispatch");
        (flow, String::from_utf8(output.into_inner()).expect("utf8"))
    }

    fn identified_session(store: &Store) -> Session {
        let mut session = Session::new();
        session
            .identify(
                store,
                UserProfile {
                    username: "alice".to_string(),
                    age: "30".to_string(),
                    gender: "f".to_string(),
                    location: "NYC".to_string(),
                },
            )
            .expect("identify");
        session
    }

    #[tokio::test]
    async fn missing_arguments_get_usage_lines() {
        let store = Store::new();
        let mut session = Session::new();

        let (flow, output) = run(Command::Weather { city: None }, &mut session, &store, "").await;
        assert_eq!(flow, Flow::Continue);
        assert!(output.contains("Usage: !weather <city>"));

        let (_, output) = run(
            Command::ReadMessages { channel: None },
            &mut session,
            &store,
            "",
        )
        .await;
        assert!(output.contains("Usage: !readmessages <channel>"));
    }

    #[tokio::test]
    async fn whoami_before_identify_prompts_for_registration() {
        let store = Store::new();
        let mut session = Session::new();

        let (flow, output) = run(Command::WhoAmI, &mut session, &store, "").await;
        assert_eq!(flow, Flow::Continue);
        assert!(output.contains("not identified"));
        assert!(output.contains("!updateinfo"));
    }

    #[tokio::test]
    async fn fact_with_empty_store_reports_no_facts() {
        let store = Store::new();
        let mut session = Session::new();

        let (_, output) = run(Command::Fact, &mut session, &store, "").await;
        assert!(output.contains("No facts available yet."));
    }

    #[tokio::test]
    async fn weather_miss_lists_known_cities() {
        let store = Store::new();
        store.put_weather("chicago", "Rainy, 60°F").expect("seed");
        store.put_weather("miami", "Hot and humid, 85°F").expect("seed");
        let mut session = Session::new();

        let (_, output) = run(
            Command::Weather {
                city: Some("atlantis".to_string()),
            },
            &mut session,
            &store,
            "",
        )
        .await;
        assert!(output.contains("Weather data for atlantis is not available."));
        assert!(output.contains("chicago, miami"));
    }

    #[tokio::test]
    async fn send_loop_persists_until_the_stop_token() {
        let store = Store::new();
        let mut session = identified_session(&store);

        let (flow, output) = run(
            Command::SendMessage {
                channel: Some("general".to_string()),
            },
            &mut session,
            &store,
            "hello there\nsecond\n!quit\n",
        )
        .await;
        assert_eq!(flow, Flow::Continue);
        assert!(output.contains("Message sent!"));
        assert!(output.contains("Stopped sending messages."));

        let messages = store.list_messages("general").expect("list");
        assert_eq!(messages, vec!["[alice]: second", "[alice]: hello there"]);
    }

    #[tokio::test]
    async fn send_message_requires_identity() {
        let store = Store::new();
        let mut session = Session::new();

        let (_, output) = run(
            Command::SendMessage {
                channel: Some("general".to_string()),
            },
            &mut session,
            &store,
            "never sent\n!quit\n",
        )
        .await;
        assert!(output.contains("not identified"));
        assert!(store.list_messages("general").expect("list").is_empty());
    }

    #[tokio::test]
    async fn leaving_a_channel_never_joined_is_reported_gently() {
        let store = Store::new();
        let mut session = Session::new();

        let (flow, output) = run(
            Command::LeaveChannel {
                channel: Some("general".to_string()),
            },
            &mut session,
            &store,
            "",
        )
        .await;
        assert_eq!(flow, Flow::Continue);
        assert!(output.contains("not listening to channel: general"));
    }

    #[tokio::test]
    async fn join_then_leave_stops_the_listener() {
        let store = Store::new();
        let mut session = Session::new();
        let config = DispatchConfig {
            receive_timeout: Duration::from_millis(50),
            ..DispatchConfig::default()
        };

        let mut input = BufReader::new("".as_bytes());
        let mut output = Cursor::new(Vec::new());
        dispatch(
            Command::JoinChannel {
                channel: Some("general".to_string()),
            },
            &mut session,
            &store,
            &config,
            &mut input,
            &mut output,
        )
        .await
        .expect("join");
        assert!(session.is_listening("general"));

        let leave = dispatch(
            Command::LeaveChannel {
                channel: Some("general".to_string()),
            },
            &mut session,
            &store,
            &config,
            &mut input,
            &mut output,
        );
        tokio::time::timeout(Duration::from_secs(1), leave)
            .await
            .expect("leave should not hang")
            .expect("leave");
        assert!(!session.is_listening("general"));
    }

    #[tokio::test]
    async fn direct_message_publishes_to_the_reserved_channel() {
        let store = Store::new();
        let mut session = identified_session(&store);
        let config = DispatchConfig::default();
        let mut subscription = store.subscribe(&config.dm_channel).expect("subscribe");

        let mut input = BufReader::new("hi bot\n".as_bytes());
        let mut output = Cursor::new(Vec::new());
        dispatch(
            Command::DirectMessage,
            &mut session,
            &store,
            &config,
            &mut input,
            &mut output,
        )
        .await
        .expect("direct message");

        let received = subscription
            .next(Duration::from_millis(200))
            .await
            .expect("receive")
            .expect("message expected");
        assert_eq!(received.text, "hi bot");

        let text = String::from_utf8(output.into_inner()).expect("utf8");
        assert!(text.contains("[alice]: hi bot"));
    }

    #[tokio::test]
    async fn store_failures_are_reported_and_survivable() {
        let store = Store::new();
        let mut session = identified_session(&store);
        store.close();

        let (flow, output) = run(Command::Fact, &mut session, &store, "").await;
        assert_eq!(flow, Flow::Continue);
        assert!(output.contains("store is unavailable"));
    }
}
