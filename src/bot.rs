//! Discord front-end: event validation, dispatch, and reconciliation wiring.

use crate::command;
use crate::config::Config;
use crate::error::{PlatformError, Result};
use crate::handler::watch::WatchNotifier;
use crate::handler::{CommandEvent, Dispatcher};
use crate::market;
use crate::providers::MarketDataProvider;
use crate::reconcile::{MessageHandle, Reconciler, SendTarget};
use crate::watch::WatchListService;
use serenity::all::{
    ActivityData, ChannelId, Context, EditMessage, EventHandler, GatewayIntents, Message,
    MessageId, MessageUpdateEvent, Ready,
};
use serenity::http::Http;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::time::Duration;

/// How often the bot activity line refreshes.
const STATUS_INTERVAL_SECS: u64 = 5 * 60;

/// Gateway intents the bot needs: guild + DM messages with content.
pub fn intents() -> GatewayIntents {
    GatewayIntents::GUILDS
        | GatewayIntents::GUILD_MESSAGES
        | GatewayIntents::DIRECT_MESSAGES
        | GatewayIntents::MESSAGE_CONTENT
}

/// Send/edit/delete capability for one Discord channel.
pub struct DiscordTarget {
    http: Arc<Http>,
    channel_id: ChannelId,
}

impl DiscordTarget {
    pub fn new(http: Arc<Http>, channel_id: u64) -> Self {
        Self {
            http,
            channel_id: ChannelId::new(channel_id),
        }
    }
}

#[async_trait::async_trait]
impl SendTarget for DiscordTarget {
    async fn send(&self, text: &str) -> Result<MessageHandle> {
        let message = self
            .channel_id
            .say(&self.http, text)
            .await
            .map_err(|error| PlatformError::Send(error.to_string()))?;
        Ok(MessageHandle {
            channel_id: self.channel_id.get(),
            message_id: message.id.get(),
        })
    }

    async fn edit(&self, handle: &MessageHandle, text: &str) -> Result<MessageHandle> {
        let channel = ChannelId::new(handle.channel_id);
        let builder = EditMessage::new().content(text);
        let message = channel
            .edit_message(&self.http, MessageId::new(handle.message_id), builder)
            .await
            .map_err(|error| PlatformError::Edit {
                message_id: handle.message_id,
                reason: error.to_string(),
            })?;
        Ok(MessageHandle {
            channel_id: handle.channel_id,
            message_id: message.id.get(),
        })
    }

    async fn delete(&self, handle: &MessageHandle) -> Result<()> {
        let channel = ChannelId::new(handle.channel_id);
        channel
            .delete_message(&self.http, MessageId::new(handle.message_id))
            .await
            .map_err(|error| PlatformError::Delete {
                message_id: handle.message_id,
                reason: error.to_string(),
            })?;
        Ok(())
    }
}

/// The serenity event handler. Owns the full message pipeline.
pub struct Bot {
    config: Config,
    dispatcher: Dispatcher,
    reconciler: Arc<Reconciler>,
    watches: Arc<WatchListService>,
    notifier: Arc<WatchNotifier>,
    status_started: AtomicBool,
}

impl Bot {
    pub fn new(
        config: Config,
        provider: Arc<dyn MarketDataProvider>,
        reconciler: Arc<Reconciler>,
        watches: Arc<WatchListService>,
        notifier: Arc<WatchNotifier>,
    ) -> Self {
        Self {
            config,
            dispatcher: Dispatcher::new(provider),
            reconciler,
            watches,
            notifier,
            status_started: AtomicBool::new(false),
        }
    }

    fn validate(&self, author_is_bot: bool, channel_id: u64, content: &str) -> bool {
        // Ignoring other bots also makes the bot ignore itself.
        if author_is_bot {
            return false;
        }
        if !content.starts_with(&self.config.prefix) {
            return false;
        }
        self.config.is_channel_allowed(channel_id)
    }

    async fn process(
        &self,
        ctx: &Context,
        message_id: u64,
        channel_id: u64,
        author_id: u64,
        author_is_bot: bool,
        content: &str,
        old_content: Option<&str>,
    ) {
        if !self.validate(author_is_bot, channel_id, content) {
            return;
        }

        tracing::debug!(message_id, channel_id, "handling command message");

        let current = command::parse(&self.config.prefix, content);
        let old = old_content.map(|old| command::parse(&self.config.prefix, old));
        let event = CommandEvent {
            current: current.clone(),
            old,
        };

        // Claim the revision before any lookup so a slower earlier edit
        // cannot clobber this one.
        let source_id = message_id.to_string();
        let revision = self.reconciler.begin(&source_id).await;

        if let Some(payload) = self.dispatcher.dispatch(&self.config, &event).await {
            let target = DiscordTarget::new(ctx.http.clone(), channel_id);
            self.reconciler
                .apply(&source_id, revision, &target, payload)
                .await;
        }

        self.apply_watch_requests(&current, author_id, channel_id)
            .await;
    }

    /// Register and deregister watches from the parsed modifiers.
    async fn apply_watch_requests(
        &self,
        parsed: &command::Command,
        author_id: u64,
        channel_id: u64,
    ) {
        for raw in &parsed.tokens {
            let Some(token) = command::parse_token(&self.config.prefix, raw) else {
                continue;
            };
            if token.prefix_count != 1 {
                continue;
            }

            if token.modifier.stop_watch {
                self.watches.stop(&token.symbol).await;
            }
            if let Some(bounds) = token.modifier.watch {
                self.watches
                    .start(&token.symbol, bounds.low, bounds.high, author_id, channel_id)
                    .await;
            }
        }
    }

    /// Refresh the activity line and clear the watch list when the market
    /// transitions to closed.
    fn spawn_status_task(&self, ctx: Context) {
        if self.status_started.swap(true, Ordering::SeqCst) {
            return;
        }

        let watches = self.watches.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_secs(STATUS_INTERVAL_SECS));
            let mut was_open = market::is_market_open();
            loop {
                ticker.tick().await;

                let open = market::is_market_open();
                let status = market::status_line();
                tracing::debug!(%status, "updating bot activity");
                ctx.set_activity(Some(ActivityData::watching(status)));

                if was_open && !open {
                    tracing::info!("market closed, clearing watch list");
                    watches.clear().await;
                }
                was_open = open;
            }
        });
    }
}

#[async_trait::async_trait]
impl EventHandler for Bot {
    async fn ready(&self, ctx: Context, ready: Ready) {
        tracing::info!(user = %ready.user.name, "bot is ready, watching for messages");
        self.notifier.attach_http(ctx.http.clone());
        ctx.set_activity(Some(ActivityData::watching(market::status_line())));
        self.spawn_status_task(ctx);
    }

    async fn message(&self, ctx: Context, message: Message) {
        self.process(
            &ctx,
            message.id.get(),
            message.channel_id.get(),
            message.author.id.get(),
            message.author.bot,
            &message.content,
            None,
        )
        .await;
    }

    async fn message_update(
        &self,
        ctx: Context,
        old_if_available: Option<Message>,
        new: Option<Message>,
        event: MessageUpdateEvent,
    ) {
        let old_content = old_if_available.map(|message| message.content);

        let (message_id, channel_id, author_id, author_is_bot, content) = match new {
            Some(message) => (
                message.id.get(),
                message.channel_id.get(),
                message.author.id.get(),
                message.author.bot,
                message.content,
            ),
            None => {
                // Partial update: only usable when the event carries both
                // the new content and the author.
                let (Some(content), Some(author)) = (event.content, event.author) else {
                    return;
                };
                (
                    event.id.get(),
                    event.channel_id.get(),
                    author.id.get(),
                    author.bot,
                    content,
                )
            }
        };

        self.process(
            &ctx,
            message_id,
            channel_id,
            author_id,
            author_is_bot,
            &content,
            old_content.as_deref(),
        )
        .await;
    }
}
