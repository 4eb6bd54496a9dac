//! The closed command vocabulary
//!
//! Every action a script can invoke is one of these variants. Keeping the
//! vocabulary closed makes dispatch a table lookup and lets
//! `ActionRegistry::unhandled_commands` prove an embedding covers (or
//! deliberately skips) every command.
//!
//! A handful of commands are engine-internal: they mutate engine state
//! (variables, pacing) and never reach the registry.

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// A command name that is not part of the vocabulary
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown command '{0}'")]
pub struct UnknownCommand(pub String);

/// The fixed set of script-invokable commands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    // Channel
    ChannelSetName,
    ChannelSetTopic,
    ChannelSetTopicTo,
    ChannelSetSlowmode,
    ChannelSetNsfw,
    ChannelSend,
    ChannelSendTo,
    ChannelSendEmbed,
    ChannelSendEmbedTo,
    ChannelPurge,
    ChannelDelete,
    ChannelCreate,
    ChannelCreateVoice,
    // Webhook
    WebhookSend,
    WebhookSendEmbed,
    // Message
    MessageDelete,
    MessageReply,
    MessagePin,
    MessageUnpin,
    MessageEdit,
    // Thread
    ThreadCreate,
    ThreadArchive,
    ThreadJoin,
    // Reaction
    ReactionAdd,
    ReactionRemove,
    // Member
    MemberTimeout,
    MemberNickname,
    MemberAddRole,
    MemberRemoveRole,
    MemberKick,
    MemberBan,
    MemberUnban,
    MemberDm,
    // Role
    RoleCreate,
    RoleDelete,
    // Guild
    GuildSetName,
    GuildSetIcon,
    // System / variables (engine-internal except push/remove)
    SystemWait,
    GlobalSet,
    GlobalDel,
    GlobalPush,
    GlobalRemove,
    UserSet,
    UserDel,
    EphemeralSet,
    // Diagnostics
    Print,
}

impl Command {
    /// Every command in the vocabulary
    pub const ALL: [Command; 46] = [
        Command::ChannelSetName,
        Command::ChannelSetTopic,
        Command::ChannelSetTopicTo,
        Command::ChannelSetSlowmode,
        Command::ChannelSetNsfw,
        Command::ChannelSend,
        Command::ChannelSendTo,
        Command::ChannelSendEmbed,
        Command::ChannelSendEmbedTo,
        Command::ChannelPurge,
        Command::ChannelDelete,
        Command::ChannelCreate,
        Command::ChannelCreateVoice,
        Command::WebhookSend,
        Command::WebhookSendEmbed,
        Command::MessageDelete,
        Command::MessageReply,
        Command::MessagePin,
        Command::MessageUnpin,
        Command::MessageEdit,
        Command::ThreadCreate,
        Command::ThreadArchive,
        Command::ThreadJoin,
        Command::ReactionAdd,
        Command::ReactionRemove,
        Command::MemberTimeout,
        Command::MemberNickname,
        Command::MemberAddRole,
        Command::MemberRemoveRole,
        Command::MemberKick,
        Command::MemberBan,
        Command::MemberUnban,
        Command::MemberDm,
        Command::RoleCreate,
        Command::RoleDelete,
        Command::GuildSetName,
        Command::GuildSetIcon,
        Command::SystemWait,
        Command::GlobalSet,
        Command::GlobalDel,
        Command::GlobalPush,
        Command::GlobalRemove,
        Command::UserSet,
        Command::UserDel,
        Command::EphemeralSet,
        Command::Print,
    ];

    /// The name scripts use to invoke this command
    pub fn as_str(&self) -> &'static str {
        match self {
            Command::ChannelSetName => "channel.setname",
            Command::ChannelSetTopic => "channel.settopic",
            Command::ChannelSetTopicTo => "channel.settopic_to",
            Command::ChannelSetSlowmode => "channel.setslowmode",
            Command::ChannelSetNsfw => "channel.setnsfw",
            Command::ChannelSend => "channel.send",
            Command::ChannelSendTo => "channel.send_to",
            Command::ChannelSendEmbed => "channel.send_embed",
            Command::ChannelSendEmbedTo => "channel.send_embed_to",
            Command::ChannelPurge => "channel.purge",
            Command::ChannelDelete => "channel.delete",
            Command::ChannelCreate => "channel.create",
            Command::ChannelCreateVoice => "channel.create_voice",
            Command::WebhookSend => "webhook.send",
            Command::WebhookSendEmbed => "webhook.send_embed",
            Command::MessageDelete => "message.delete",
            Command::MessageReply => "message.reply",
            Command::MessagePin => "message.pin",
            Command::MessageUnpin => "message.unpin",
            Command::MessageEdit => "message.edit",
            Command::ThreadCreate => "thread.create",
            Command::ThreadArchive => "thread.archive",
            Command::ThreadJoin => "thread.join",
            Command::ReactionAdd => "reaction.add",
            Command::ReactionRemove => "reaction.remove",
            Command::MemberTimeout => "member.timeout",
            Command::MemberNickname => "member.nickname",
            Command::MemberAddRole => "member.addrole",
            Command::MemberRemoveRole => "member.removerole",
            Command::MemberKick => "member.kick",
            Command::MemberBan => "member.ban",
            Command::MemberUnban => "member.unban",
            Command::MemberDm => "member.dm",
            Command::RoleCreate => "role.create",
            Command::RoleDelete => "role.delete",
            Command::GuildSetName => "guild.setname",
            Command::GuildSetIcon => "guild.seticon",
            Command::SystemWait => "system.wait",
            Command::GlobalSet => "global.set",
            Command::GlobalDel => "global.del",
            Command::GlobalPush => "global.push",
            Command::GlobalRemove => "global.remove",
            Command::UserSet => "user.set",
            Command::UserDel => "user.del",
            Command::EphemeralSet => "ephemeral.set",
            Command::Print => "print",
        }
    }

    /// Commands the executor handles itself, never the registry
    pub fn is_engine_internal(&self) -> bool {
        matches!(
            self,
            Command::SystemWait
                | Command::GlobalSet
                | Command::GlobalDel
                | Command::UserSet
                | Command::UserDel
                | Command::EphemeralSet
        )
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Command {
    type Err = UnknownCommand;

    /// Case-insensitive lookup by invocation name
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.to_lowercase();
        Command::ALL
            .iter()
            .find(|c| c.as_str() == lowered)
            .copied()
            .ok_or_else(|| UnknownCommand(s.to_string()))
    }
}
