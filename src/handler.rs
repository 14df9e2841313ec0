//! Command dispatch and result aggregation.
//!
//! Every handler independently decides whether a command applies to it.
//! All applicable handlers run concurrently and their keyed outputs merge
//! only after every one has settled; help output from any handler
//! short-circuits the merge and is sent alone.

pub mod help;
pub mod lookup;
pub mod news;
pub mod options;
pub mod quote;
pub mod recommend;
pub mod watch;

use crate::command::Command;
use crate::config::Config;
use crate::providers::MarketDataProvider;
use crate::reconcile::Payload;
use std::sync::Arc;

/// The parsed command for the current event, plus the previous revision of
/// the same message when the event is an edit.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandEvent {
    pub current: Command,
    pub old: Option<Command>,
}

/// One handler's contribution to a response.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HandlerOutput {
    pub help_text: Option<String>,
    /// Keyed rendered messages in output order.
    pub messages: Vec<(String, String)>,
    pub error: Option<String>,
}

impl HandlerOutput {
    pub fn messages(messages: Vec<(String, String)>) -> Self {
        Self {
            messages,
            ..Default::default()
        }
    }

    pub fn help(text: String) -> Self {
        Self {
            help_text: Some(text),
            ..Default::default()
        }
    }

    /// A whole-batch failure: the error plus a single `ERROR`-keyed entry
    /// so a mixed response still shows what went wrong.
    pub fn error(text: String) -> Self {
        Self {
            messages: vec![("ERROR".into(), text.clone())],
            error: Some(text),
            ..Default::default()
        }
    }

    /// Insert or replace a keyed entry in place.
    pub fn put(messages: &mut Vec<(String, String)>, key: String, text: String) {
        match messages.iter_mut().find(|(existing, _)| *existing == key) {
            Some((_, slot)) => *slot = text,
            None => messages.push((key, text)),
        }
    }
}

/// One command handler.
#[async_trait::async_trait]
pub trait MessageHandler: Send + Sync {
    fn tag(&self) -> &'static str;

    /// Returns `None` when the command does not apply to this handler.
    async fn handle(&self, config: &Config, event: &CommandEvent) -> Option<HandlerOutput>;
}

/// Fans a command out to every handler and aggregates the results.
pub struct Dispatcher {
    handlers: Vec<Box<dyn MessageHandler>>,
}

impl Dispatcher {
    pub fn new(provider: Arc<dyn MarketDataProvider>) -> Self {
        Self {
            handlers: vec![
                Box::new(help::HelpHandler),
                Box::new(quote::QuoteHandler::new(provider.clone())),
                Box::new(lookup::LookupHandler::new(provider.clone())),
                Box::new(recommend::RecommendHandler::new(provider.clone())),
                Box::new(news::NewsHandler::new(provider.clone())),
                Box::new(options::OptionChainHandler::new(provider)),
            ],
        }
    }

    #[cfg(test)]
    fn with_handlers(handlers: Vec<Box<dyn MessageHandler>>) -> Self {
        Self { handlers }
    }

    /// Run all applicable handlers and merge their outputs into a payload
    /// for the reconciler. `None` means no handler claimed the message.
    pub async fn dispatch(&self, config: &Config, event: &CommandEvent) -> Option<Payload> {
        let work = self.handlers.iter().map(|handler| async move {
            let output = handler.handle(config, event).await?;
            Some((handler.tag(), output))
        });
        let results: Vec<(&'static str, HandlerOutput)> = futures::future::join_all(work)
            .await
            .into_iter()
            .flatten()
            .collect();

        if results.is_empty() {
            tracing::warn!("no handler claimed message, dropping");
            return None;
        }

        let applied: Vec<&str> = results.iter().map(|(tag, _)| *tag).collect();
        tracing::debug!(handlers = ?applied, "handlers settled");

        // Help dominates, but only after every handler has settled.
        for (_, result) in &results {
            if let Some(help) = &result.help_text {
                if !help.trim().is_empty() {
                    return Some(Payload::Plain(help.clone()));
                }
            }
        }

        // Every applicable handler failed outright: a batch-level error
        // that must not disturb previously cached replies.
        if results.iter().all(|(_, result)| result.error.is_some()) {
            let joined = results
                .iter()
                .filter_map(|(_, result)| result.error.clone())
                .collect::<Vec<_>>()
                .join("\n");
            return Some(Payload::Keyed(Err(joined)));
        }

        // Union in handler order; the first writer of a key wins.
        let mut combined: Vec<(String, String)> = Vec::new();
        for (_, result) in results {
            for (key, text) in result.messages {
                if combined.iter().any(|(existing, _)| *existing == key) {
                    continue;
                }
                combined.push((key, text));
            }
        }

        Some(Payload::Keyed(Ok(combined)))
    }
}

#[cfg(test)]
mod tests {
    use super::{CommandEvent, Config, Dispatcher, HandlerOutput, MessageHandler};
    use crate::config::WatchConfig;
    use crate::providers::tests::MockProvider;
    use crate::reconcile::Payload;
    use std::sync::Arc;

    pub(crate) fn test_config(prefix: &str) -> Config {
        Config {
            prefix: prefix.into(),
            token: "test-token".into(),
            target_channels: Vec::new(),
            health_check: None,
            watch: WatchConfig::default(),
        }
    }

    pub(crate) fn event(prefix: &str, content: &str) -> CommandEvent {
        CommandEvent {
            current: crate::command::parse(prefix, content),
            old: None,
        }
    }

    struct FixedHandler {
        output: Option<HandlerOutput>,
    }

    #[async_trait::async_trait]
    impl MessageHandler for FixedHandler {
        fn tag(&self) -> &'static str {
            "FixedHandler"
        }

        async fn handle(&self, _config: &Config, _event: &CommandEvent) -> Option<HandlerOutput> {
            self.output.clone()
        }
    }

    fn fixed(output: Option<HandlerOutput>) -> Box<dyn MessageHandler> {
        Box::new(FixedHandler { output })
    }

    #[tokio::test]
    async fn test_no_output_means_unhandled() {
        let dispatcher = Dispatcher::with_handlers(vec![fixed(None), fixed(None)]);
        let payload = dispatcher
            .dispatch(&test_config("$"), &event("$", "$AAPL"))
            .await;
        assert_eq!(payload, None);
    }

    #[tokio::test]
    async fn test_help_suppresses_keyed_outputs() {
        let dispatcher = Dispatcher::with_handlers(vec![
            fixed(Some(HandlerOutput::messages(vec![(
                "AAPL".into(),
                "quote".into(),
            )]))),
            fixed(Some(HandlerOutput::help("the help".into()))),
        ]);
        let payload = dispatcher
            .dispatch(&test_config("$"), &event("$", "$"))
            .await;
        assert_eq!(payload, Some(Payload::Plain("the help".into())));
    }

    #[tokio::test]
    async fn test_union_is_first_writer_wins() {
        let dispatcher = Dispatcher::with_handlers(vec![
            fixed(Some(HandlerOutput::messages(vec![
                ("AAPL".into(), "first".into()),
                ("MSFT".into(), "msft".into()),
            ]))),
            fixed(Some(HandlerOutput::messages(vec![(
                "AAPL".into(),
                "second".into(),
            )]))),
        ]);
        let payload = dispatcher
            .dispatch(&test_config("$"), &event("$", "$AAPL $MSFT"))
            .await;
        let Some(Payload::Keyed(Ok(messages))) = payload else {
            panic!("expected keyed payload");
        };
        assert_eq!(
            messages,
            vec![
                ("AAPL".to_string(), "first".to_string()),
                ("MSFT".to_string(), "msft".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_all_errors_become_batch_error() {
        let dispatcher =
            Dispatcher::with_handlers(vec![fixed(None), fixed(Some(HandlerOutput::error(
                "provider down".into(),
            )))]);
        let payload = dispatcher
            .dispatch(&test_config("$"), &event("$", "$AAPL"))
            .await;
        assert_eq!(payload, Some(Payload::Keyed(Err("provider down".into()))));
    }

    #[tokio::test]
    async fn test_quote_scenario() {
        let provider = Arc::new(MockProvider::default().with_quote("AAPL", 100.0));
        let dispatcher = Dispatcher::new(provider);
        let payload = dispatcher
            .dispatch(&test_config("$"), &event("$", "$AAPL"))
            .await;

        let Some(Payload::Keyed(Ok(messages))) = payload else {
            panic!("expected keyed payload");
        };
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].0, "AAPL");
    }

    #[tokio::test]
    async fn test_reverse_lookup_scenario_keys_by_resolved_ticker() {
        let provider = Arc::new(
            MockProvider::default()
                .with_lookup("Apple Inc", "AAPL")
                .with_quote("AAPL", 100.0),
        );
        let dispatcher = Dispatcher::new(provider);
        let payload = dispatcher
            .dispatch(&test_config("$"), &event("$", "$$Apple Inc"))
            .await;

        let Some(Payload::Keyed(Ok(messages))) = payload else {
            panic!("expected keyed payload");
        };
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].0, "AAPL");
    }

    #[tokio::test]
    async fn test_recommendation_scenario_never_keys_the_seed() {
        let provider = Arc::new(
            MockProvider::default()
                .with_recommendations("MSFT", &["AAPL", "GOOG"])
                .with_quote("AAPL", 100.0)
                .with_quote("GOOG", 150.0),
        );
        let dispatcher = Dispatcher::new(provider);
        let payload = dispatcher
            .dispatch(&test_config("$"), &event("$", "$$$MSFT"))
            .await;

        let Some(Payload::Keyed(Ok(messages))) = payload else {
            panic!("expected keyed payload");
        };
        let keys: Vec<&str> = messages.iter().map(|(key, _)| key.as_str()).collect();
        assert_eq!(keys, vec!["AAPL", "GOOG"]);
    }

    #[tokio::test]
    async fn test_help_scenario_is_plain() {
        let provider = Arc::new(MockProvider::default());
        let dispatcher = Dispatcher::new(provider);
        let payload = dispatcher
            .dispatch(&test_config("$"), &event("$", "$$$"))
            .await;

        let Some(Payload::Plain(text)) = payload else {
            panic!("expected plain help payload");
        };
        assert!(text.contains("[COMMANDS]"));
    }

    #[tokio::test]
    async fn test_partial_error_stays_keyed() {
        let dispatcher = Dispatcher::with_handlers(vec![
            fixed(Some(HandlerOutput::error("news down".into()))),
            fixed(Some(HandlerOutput::messages(vec![(
                "AAPL".into(),
                "quote".into(),
            )]))),
        ]);
        let payload = dispatcher
            .dispatch(&test_config("$"), &event("$", "$AAPL:news"))
            .await;
        let Some(Payload::Keyed(Ok(messages))) = payload else {
            panic!("expected keyed payload");
        };
        assert!(messages.iter().any(|(key, _)| key == "ERROR"));
        assert!(messages.iter().any(|(key, _)| key == "AAPL"));
    }
}
