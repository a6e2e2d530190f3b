use teloxide::prelude::*;

use crate::identity::BotIdentity;

/// The text following a command, trimmed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct CommandArgs(pub String);

pub(crate) fn command_filter(
    cmd: &'static str,
) -> impl Fn(Message, BotIdentity) -> Option<CommandArgs> {
    move |msg: Message, identity: BotIdentity| {
        msg.text()
            .and_then(|text| parse_command(text, cmd, &identity))
            .map(CommandArgs)
    }
}

pub(crate) fn is_command(text: &str) -> bool {
    text.starts_with('/')
}

pub(crate) fn parse_command(text: &str, cmd: &str, identity: &BotIdentity) -> Option<String> {
    let rest = text.strip_prefix('/')?.strip_prefix(cmd)?;

    let (suffix, args) = match rest.find(char::is_whitespace) {
        Some(pos) => rest.split_at(pos),
        None => (rest, ""),
    };

    // When sending commands in a group, a mention suffix may be attached to
    // the text. For example: "/start@xxxx_bot".
    if !suffix.is_empty() {
        let name = suffix.strip_prefix('@')?;
        if !identity.is_addressed_as(name) {
            return None;
        }
    }

    Some(args.trim().to_owned())
}
