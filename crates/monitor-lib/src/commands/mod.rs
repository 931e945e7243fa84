//! Remote chat commands
//!
//! Inbound chat text is parsed into a `Command`, checked against the
//! allow-listed chat, and answered by the `CommandDispatcher`. The
//! `CommandPoller` drives the whole thing from the long-poll loop.

mod dispatcher;
mod poller;

pub use dispatcher::{CommandDispatcher, Reply};
pub use poller::{CommandPoller, POLL_ERROR_PAUSE};

/// Commands understood by the bot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Start,
    Stop,
    Usage,
    Status,
    Help,
}

impl Command {
    /// Parse the leading `/command` (or `/command@botname`) of a message
    pub fn parse(text: &str) -> Option<Self> {
        Self::parse_addressed(text, None)
    }

    /// Like `parse`, but when `bot_username` is known a `/command@name`
    /// addressed to any other bot is ignored
    ///
    /// Usernames compare case-insensitively.
    pub fn parse_addressed(text: &str, bot_username: Option<&str>) -> Option<Self> {
        let first = text.split_whitespace().next()?;
        let first = first.strip_prefix('/')?;
        let (name, addressee) = match first.split_once('@') {
            Some((name, addressee)) => (name, Some(addressee)),
            None => (first, None),
        };

        if let (Some(addressee), Some(bot)) = (addressee, bot_username) {
            if !addressee.eq_ignore_ascii_case(bot.trim_start_matches('@')) {
                return None;
            }
        }

        match name {
            "start" => Some(Command::Start),
            "stop" => Some(Command::Stop),
            "usage" => Some(Command::Usage),
            "status" => Some(Command::Status),
            "help" => Some(Command::Help),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Command::Start => "start",
            Command::Stop => "stop",
            Command::Usage => "usage",
            Command::Status => "status",
            Command::Help => "help",
        }
    }
}
