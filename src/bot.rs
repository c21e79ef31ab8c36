//! Bot main loop: receives messages from channels, routes them through the
//! mode machine and sends the rendered responses back.

use std::collections::HashMap;
use std::sync::Arc;

use futures::StreamExt;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::Instrument;

use crate::channels::{
    ChannelManager, CliChannel, IncomingMessage, OutgoingResponse, StatusUpdate, TelegramChannel,
};
use crate::config::BotConfig;
use crate::dialog::scripts::{APOLOGY, ORACLE_RETRY};
use crate::dialog::{ModeMachine, Render, SessionStore, Trigger};
use crate::error::{DialogError, Error};
use crate::llm::create_oracle;
use crate::templates::TemplateLibrary;

/// Per-identity inboxes feeding the ordered session workers.
type Workers = HashMap<String, mpsc::UnboundedSender<IncomingMessage>>;

/// The dispatch boundary: every failure below this point becomes a reply.
#[derive(Clone)]
pub struct Bot {
    machine: Arc<ModeMachine>,
    sessions: Arc<SessionStore>,
    templates: Arc<TemplateLibrary>,
    channels: Arc<ChannelManager>,
}

impl Bot {
    pub fn new(
        machine: ModeMachine,
        templates: Arc<TemplateLibrary>,
        channels: ChannelManager,
    ) -> Self {
        Self {
            machine: Arc::new(machine),
            sessions: SessionStore::new(),
            templates,
            channels: Arc::new(channels),
        }
    }

    /// Assemble the bot from configuration: templates, oracle and channels.
    /// The CLI channel is always present; Telegram only with a bot token.
    pub async fn from_config(config: &BotConfig) -> Result<Self, Error> {
        let templates = Arc::new(TemplateLibrary::load(&config.resources_dir).await?);
        let oracle = create_oracle(&config.llm)?;

        let mut channels = ChannelManager::new();
        channels.add(Box::new(CliChannel::new()));
        if let Some(telegram) = &config.telegram {
            tracing::info!(allowed = ?telegram.allowed_users, "Telegram enabled");
            channels.add(Box::new(TelegramChannel::new(
                telegram.bot_token.clone(),
                telegram.allowed_users.clone(),
            )));
        }

        let machine = ModeMachine::new(oracle, Arc::clone(&templates), &config.dialog);
        Ok(Self::new(machine, templates, channels))
    }

    pub fn sessions(&self) -> &Arc<SessionStore> {
        &self.sessions
    }

    pub fn channel_names(&self) -> Vec<&str> {
        self.channels.names()
    }

    /// Run until Ctrl+C or until every channel stream ends.
    ///
    /// Each identity gets one worker that handles its messages in arrival
    /// order; different identities run concurrently. When the streams end,
    /// queued messages are drained before the channels shut down.
    pub async fn run(self) -> Result<(), Error> {
        let mut message_stream = self.channels.start_all().await?;
        tracing::info!(channels = ?self.channels.names(), "Bot ready and listening");

        let mut workers = Workers::new();
        let mut tasks = JoinSet::new();
        let mut interrupted = false;

        loop {
            let message = tokio::select! {
                biased;
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("Ctrl+C received, shutting down...");
                    interrupted = true;
                    break;
                }
                msg = message_stream.next() => {
                    match msg {
                        Some(m) => m,
                        None => {
                            tracing::info!("All channel streams ended, shutting down...");
                            break;
                        }
                    }
                }
            };

            self.route(&mut workers, &mut tasks, message);
        }

        drop(workers);
        if interrupted {
            tasks.shutdown().await;
        } else {
            while let Some(result) = tasks.join_next().await {
                if let Err(e) = result {
                    tracing::error!("Session worker failed: {}", e);
                }
            }
        }

        self.channels.shutdown_all().await?;
        Ok(())
    }

    /// Queue `message` on its identity's worker, starting one if needed.
    fn route(&self, workers: &mut Workers, tasks: &mut JoinSet<()>, message: IncomingMessage) {
        let inbox = workers.entry(session_key(&message)).or_insert_with(|| {
            let (tx, rx) = mpsc::unbounded_channel();
            tasks.spawn(self.clone().serve(rx));
            tx
        });
        if let Err(e) = inbox.send(message) {
            tracing::error!(user_id = %e.0.user_id, "Session worker gone, dropping message");
        }
    }

    /// Handle one identity's messages strictly one after another.
    async fn serve(self, mut inbox: mpsc::UnboundedReceiver<IncomingMessage>) {
        while let Some(message) = inbox.recv().await {
            let responses = self.process(message.clone()).await;
            for response in responses {
                if let Err(e) = self.channels.respond(&message, response).await {
                    tracing::error!(user_id = %message.user_id, "Failed to send response: {}", e);
                    break;
                }
            }
        }
    }

    /// Handle `msg` on its own task so a panicking handler still yields an
    /// apology instead of taking the loop down.
    pub async fn process(&self, msg: IncomingMessage) -> Vec<OutgoingResponse> {
        let bot = self.clone();
        let user_id = msg.user_id.clone();
        match tokio::spawn(async move { bot.handle(&msg).await }).await {
            Ok(responses) => responses,
            Err(e) => {
                tracing::error!(user_id = %user_id, "Message handler panicked: {}", e);
                vec![OutgoingResponse::text(APOLOGY)]
            }
        }
    }

    /// Handle one inbound message and return the responses to send, in order.
    pub async fn handle(&self, msg: &IncomingMessage) -> Vec<OutgoingResponse> {
        let span = tracing::info_span!("message", user_id = %msg.user_id, channel = %msg.channel);
        async {
            let trigger = Trigger::parse(&msg.content, msg.button.as_deref());
            tracing::debug!(?trigger, "Received");

            let handle = self.sessions.get(&session_key(msg)).await;
            let mut session = handle.lock().await;

            if matches!(trigger, Trigger::Text(_) | Trigger::MessageAction(_)) {
                let _ = self
                    .channels
                    .send_status(
                        &msg.channel,
                        StatusUpdate::Thinking("Processing...".into()),
                        &msg.metadata,
                    )
                    .await;
            }

            match self.machine.handle(&mut session, trigger).await {
                Ok(renders) => self.to_responses(renders),
                Err(e) => error_reply(&e)
                    .map(|text| vec![OutgoingResponse::text(text)])
                    .unwrap_or_default(),
            }
        }
        .instrument(span)
        .await
    }

    fn to_responses(&self, renders: Vec<Render>) -> Vec<OutgoingResponse> {
        renders
            .into_iter()
            .filter_map(|render| match render {
                Render::Text(text) => Some(OutgoingResponse::text(text)),
                Render::TextWithChoices { text, choices } => {
                    Some(OutgoingResponse::text(text).with_choices(choices))
                }
                Render::Media(id) => match self.templates.image(&id) {
                    Some(path) => Some(OutgoingResponse::photo(path)),
                    None => {
                        tracing::debug!(image = %id, "No image for media id, skipping");
                        None
                    }
                },
            })
            .collect()
    }
}

/// Sessions are scoped per channel so identities from different transports
/// never share state.
fn session_key(msg: &IncomingMessage) -> String {
    format!("{}:{}", msg.channel, msg.user_id)
}

/// What the user sees for a failed event. `None` means stay silent.
fn error_reply(error: &DialogError) -> Option<&'static str> {
    match error {
        DialogError::OracleFailure(e) => {
            tracing::warn!(error = %e, "Oracle failure surfaced to user");
            Some(ORACLE_RETRY)
        }
        DialogError::InvariantViolation { .. } => {
            tracing::warn!(error = %error, "Ignoring event for inconsistent session");
            None
        }
        DialogError::UnrecognizedTrigger(raw) => {
            tracing::info!(trigger = %raw, "Unrecognized trigger");
            Some(APOLOGY)
        }
        DialogError::MissingTemplate { .. } => {
            tracing::error!(error = %error, "Template missing");
            Some(APOLOGY)
        }
    }
}
