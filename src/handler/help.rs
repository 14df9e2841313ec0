//! Help handler.

use crate::config::Config;
use crate::handler::{CommandEvent, HandlerOutput, MessageHandler};
use crate::render;

pub struct HelpHandler;

#[async_trait::async_trait]
impl MessageHandler for HelpHandler {
    fn tag(&self) -> &'static str {
        "HelpHandler"
    }

    async fn handle(&self, config: &Config, event: &CommandEvent) -> Option<HandlerOutput> {
        if !event.current.is_help {
            return None;
        }

        Some(HandlerOutput::help(render::help_text(&config.prefix)))
    }
}
