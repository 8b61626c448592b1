use dotenvy::dotenv;
use regex::Regex;
use research_post_bot::bot::handlers::{self, Command, FlowDialogue};
use research_post_bot::bot::state::State;
use research_post_bot::config::Settings;
use research_post_bot::controller::Controller;
use research_post_bot::image::HuggingFaceImageProvider;
use research_post_bot::llm::providers::GeminiProvider;
use research_post_bot::llm::ContentGenerator;
use research_post_bot::search::{SearchGateway, TavilySearch};
use research_post_bot::session::InMemorySessionStore;
use std::io::{self, Write};
use std::sync::Arc;
use std::time::Duration;
use teloxide::dispatching::dialogue::InMemStorage;
use teloxide::dispatching::UpdateHandler;
use teloxide::error_handlers::LoggingErrorHandler;
use teloxide::prelude::*;
use teloxide::types::CallbackQuery;
use teloxide::update_listeners::Polling;
use tracing::{error, info};
use tracing_subscriber::{prelude::*, EnvFilter};

/// Regex patterns for redacting sensitive data
struct RedactionPatterns {
    token_url: Regex,
    token_bare: Regex,
    token_prefixed: Regex,
    query_key: Regex,
    bearer: Regex,
}

impl RedactionPatterns {
    /// Initialize all regex patterns
    ///
    /// # Errors
    ///
    /// Returns an error if any regex pattern is invalid
    fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            token_url: Regex::new(r"(https?://[^/]+/bot)([0-9]+:[A-Za-z0-9_-]+)(/['\s]*)")?,
            token_bare: Regex::new(r"([0-9]{8,10}:[A-Za-z0-9_-]{35})")?,
            token_prefixed: Regex::new(r"(bot[0-9]{8,10}:)[A-Za-z0-9_-]+")?,
            query_key: Regex::new(r"([?&]key=)[^\s&]+")?,
            bearer: Regex::new(r"(Bearer )[A-Za-z0-9_.-]+")?,
        })
    }

    fn redact(&self, input: &str) -> String {
        let mut output = input.to_string();
        output = self
            .token_url
            .replace_all(&output, "$1[TELEGRAM_TOKEN]$3")
            .to_string();
        output = self
            .token_bare
            .replace_all(&output, "[TELEGRAM_TOKEN]")
            .to_string();
        output = self
            .token_prefixed
            .replace_all(&output, "$1[TELEGRAM_TOKEN]")
            .to_string();
        output = self.query_key.replace_all(&output, "$1[MASKED]").to_string();
        output = self.bearer.replace_all(&output, "$1[MASKED]").to_string();
        output
    }
}

struct RedactingWriter<W: Write> {
    inner: W,
    patterns: Arc<RedactionPatterns>,
}

impl<W: Write> RedactingWriter<W> {
    const fn new(inner: W, patterns: Arc<RedactionPatterns>) -> Self {
        Self { inner, patterns }
    }
}

impl<W: Write> Write for RedactingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let s = String::from_utf8_lossy(buf);
        let redacted = self.patterns.redact(&s);
        self.inner.write_all(redacted.as_bytes())?;
        // Report the original length; the redacted text may be shorter or longer
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

struct RedactingMakeWriter<F> {
    make_inner: F,
    patterns: Arc<RedactionPatterns>,
}

impl<F> RedactingMakeWriter<F> {
    const fn new(make_inner: F, patterns: Arc<RedactionPatterns>) -> Self {
        Self {
            make_inner,
            patterns,
        }
    }
}

impl<'a, F, W> tracing_subscriber::fmt::MakeWriter<'a> for RedactingMakeWriter<F>
where
    F: Fn() -> W + 'static,
    W: Write,
{
    type Writer = RedactingWriter<W>;

    fn make_writer(&'a self) -> Self::Writer {
        RedactingWriter::new((self.make_inner)(), self.patterns.clone())
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();

    // Redaction must exist before the first log line
    let patterns = Arc::new(RedactionPatterns::new().map_err(|e| {
        eprintln!("Failed to compile regex patterns: {e}");
        e
    })?);

    init_logging(patterns);

    info!("Starting research post bot...");

    let settings = init_settings();
    let controller = init_controller(&settings);

    let bot = Bot::new(settings.telegram_token.clone());
    let dialogues = InMemStorage::<State>::new();

    let listener = Polling::builder(bot.clone())
        .timeout(Duration::from_secs(u64::from(settings.poll_timeout_secs)))
        .delete_webhook()
        .await
        .build();

    info!(
        poll_timeout_secs = settings.poll_timeout_secs,
        "Bot is running..."
    );

    Dispatcher::builder(bot, setup_handler())
        .dependencies(dptree::deps![controller, settings, dialogues])
        // One key for every update: updates are processed strictly in arrival order
        .distribution_function(|_| Some(()))
        .enable_ctrlc_handler()
        .build()
        .dispatch_with_listener(
            listener,
            LoggingErrorHandler::with_custom_text("An error from the update listener"),
        )
        .await;

    info!("Bot stopped.");
    Ok(())
}

fn init_logging(patterns: Arc<RedactionPatterns>) {
    let make_writer = RedactingMakeWriter::new(io::stderr, patterns);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(make_writer))
        .init();
}

fn init_settings() -> Arc<Settings> {
    match Settings::new() {
        Ok(s) => {
            info!(secrets = %s.masked_summary(), "Configuration loaded successfully.");
            Arc::new(s)
        }
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    }
}

fn init_controller(settings: &Settings) -> Arc<Controller> {
    let tavily = match TavilySearch::new(&settings.tavily_api_key) {
        Ok(t) => t,
        Err(e) => {
            error!("Failed to initialize search provider: {}", e);
            std::process::exit(1);
        }
    };

    let gemini = GeminiProvider::new(
        settings.gemini_api_key.clone(),
        Duration::from_secs(settings.llm_http_timeout_secs),
    )
    .with_api_base(settings.gemini_api_base.clone());

    let images = HuggingFaceImageProvider::new(
        settings.hf_api_token.clone(),
        settings.image_model_url.clone(),
        Duration::from_secs(settings.image_timeout_secs),
    );

    info!(
        model = %settings.gemini_model,
        image_model = %settings.image_model_url,
        session_capacity = settings.session_capacity,
        "Providers initialized."
    );

    Arc::new(Controller::new(
        Arc::new(InMemorySessionStore::new(settings.session_capacity)),
        SearchGateway::new(Arc::new(tavily)),
        ContentGenerator::new(Arc::new(gemini), settings.gemini_model.clone()),
        Arc::new(images),
    ))
}

fn setup_handler() -> UpdateHandler<teloxide::RequestError> {
    dptree::entry()
        .branch(
            Update::filter_callback_query()
                .enter_dialogue::<CallbackQuery, InMemStorage<State>, State>()
                .endpoint(handle_callback),
        )
        .branch(
            Update::filter_message()
                .enter_dialogue::<Message, InMemStorage<State>, State>()
                .branch(
                    dptree::entry()
                        .filter_command::<Command>()
                        .endpoint(handle_command),
                )
                .branch(
                    dptree::case![State::AwaitingImagePrompt].endpoint(handle_image_prompt),
                )
                .branch(
                    dptree::case![State::Start]
                        .filter(|msg: Message| msg.text().is_some())
                        .endpoint(handle_text),
                ),
        )
}

async fn handle_command(
    bot: Bot,
    msg: Message,
    cmd: Command,
    controller: Arc<Controller>,
    dialogue: FlowDialogue,
) -> Result<(), teloxide::RequestError> {
    let chat_id = msg.chat.id;
    let res = match cmd {
        Command::Start | Command::Help => handlers::start(bot.clone(), msg, dialogue).await,
        Command::Search(query) => {
            handlers::search(bot.clone(), msg, query, controller, dialogue).await
        }
        Command::Clear => handlers::clear(bot.clone(), msg, controller, dialogue).await,
    };
    if let Err(e) = res {
        error!("Command error: {}", e);
        handlers::report_unexpected(&bot, chat_id).await;
    }
    respond(())
}

async fn handle_text(bot: Bot, msg: Message) -> Result<(), teloxide::RequestError> {
    let chat_id = msg.chat.id;
    if let Err(e) = handlers::handle_text(bot.clone(), msg).await {
        error!("Text handler error: {}", e);
        handlers::report_unexpected(&bot, chat_id).await;
    }
    respond(())
}

async fn handle_image_prompt(
    bot: Bot,
    msg: Message,
    controller: Arc<Controller>,
    dialogue: FlowDialogue,
) -> Result<(), teloxide::RequestError> {
    let chat_id = msg.chat.id;
    if let Err(e) = handlers::handle_image_prompt(bot.clone(), msg, controller, dialogue).await {
        error!("Image prompt handler error: {}", e);
        handlers::report_unexpected(&bot, chat_id).await;
    }
    respond(())
}

async fn handle_callback(
    bot: Bot,
    q: CallbackQuery,
    controller: Arc<Controller>,
    dialogue: FlowDialogue,
) -> Result<(), teloxide::RequestError> {
    let query = q.clone();
    if let Err(e) = handlers::handle_callback(bot.clone(), q, controller, dialogue).await {
        error!("Callback handler error: {}", e);
        handlers::report_unexpected_callback(&bot, &query).await;
    }
    respond(())
}
