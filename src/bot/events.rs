use poise::serenity_prelude as serenity;
use serenity::Mentionable;

use super::Data;
use crate::models::{ChatEvent, DrawOutcome, Scope};

pub async fn handle_event(ctx: &serenity::Context, event: &serenity::FullEvent, data: &Data) {
    if let serenity::FullEvent::Message { new_message } = event {
        handle_message(ctx, new_message, data).await;
    }
}

async fn handle_message(ctx: &serenity::Context, msg: &serenity::Message, data: &Data) {
    let Some(event) = chat_event_from_message(msg) else {
        return;
    };
    let outcome = data.dispatcher.handle_event(&event).await;
    let Some(reply) = render_outcome(&outcome, &msg.author.mention().to_string()) else {
        return;
    };
    if let Err(e) = msg.channel_id.say(&ctx.http, reply).await {
        log::warn!(
            "Failed to post draw result in channel {}: {e}",
            msg.channel_id
        );
    }
}

/// 机器人消息和私信不会触发扭蛋
pub fn chat_event_from_message(msg: &serenity::Message) -> Option<ChatEvent> {
    if msg.author.bot {
        return None;
    }
    let guild_id = msg.guild_id?;
    let author_roles = msg
        .member
        .as_ref()
        .map(|m| m.roles.iter().map(ToString::to_string).collect())
        .unwrap_or_default();

    Some(ChatEvent {
        scope: Scope::channel(guild_id.to_string(), msg.channel_id.to_string()),
        text: msg.content.clone(),
        author: msg.author.name.clone(),
        author_roles,
    })
}

/// 仅在成功抽取时回复
pub fn render_outcome(outcome: &DrawOutcome, author: &str) -> Option<String> {
    let item = outcome.item()?;
    if item.rarity.is_empty() {
        Some(format!("🎉 {author} drew **{}**!", item.item_name))
    } else {
        Some(format!(
            "🎉 {author} drew **{}** ({})!",
            item.item_name, item.rarity
        ))
    }
}
