use super::state::State;
use super::views::{self, DefaultFlowView, FlowView, Rendered};
use crate::controller::{CallbackAction, Controller, FlowError, Screen};
use anyhow::{anyhow, Result};
use std::sync::Arc;
use teloxide::{
    dispatching::dialogue::{Dialogue, InMemStorage},
    prelude::*,
    types::{CallbackQuery, ChatId, InputFile, MessageId, ParseMode, ReplyParameters},
    utils::command::BotCommands,
    RequestError,
};
use tracing::{error, info, warn};

/// Dialogue handle stored per chat
pub type FlowDialogue = Dialogue<State, InMemStorage<State>>;

/// Supported bot commands
#[derive(BotCommands, Clone)]
#[command(rename_rule = "lowercase", description = "Supported commands:")]
pub enum Command {
    /// Show the welcome message
    #[command(description = "Start the bot.")]
    Start,
    /// Show usage
    #[command(description = "Show usage.")]
    Help,
    /// Search the web and start a new session
    #[command(description = "Search the web: /search <query>.")]
    Search(String),
    /// Forget the current search
    #[command(description = "Forget the current search.")]
    Clear,
}

fn reset_error(e: impl std::fmt::Display) -> anyhow::Error {
    anyhow!("Dialogue storage error: {e}")
}

fn is_too_long(err: &RequestError) -> bool {
    err.to_string().to_lowercase().contains("too long")
}

fn is_not_modified(err: &RequestError) -> bool {
    err.to_string().to_lowercase().contains("message is not modified")
}

/// Where a rendered screen goes
#[derive(Debug, Clone, Copy)]
enum Target {
    /// The "searching" placeholder; failures are written into it
    Placeholder(MessageId),
    /// The message whose button was pressed
    Edit(MessageId),
    /// A new message
    New,
}

async fn answer_callback(bot: &Bot, q: &CallbackQuery, text: Option<&str>) {
    let mut req = bot.answer_callback_query(q.id.clone());
    if let Some(text) = text {
        req = req.text(views::toast(text));
    }
    if let Err(e) = req.await {
        warn!(error = %e, "Failed to answer callback query");
    }
}

/// Send the generic notice after a handler failed
pub async fn report_unexpected(bot: &Bot, chat_id: ChatId) {
    if let Err(e) = bot
        .send_message(chat_id, DefaultFlowView::unexpected_error())
        .await
    {
        warn!(chat_id = chat_id.0, error = %e, "Failed to send error notice");
    }
}

/// Generic notice for a failed button press: answers the query, then posts to the chat
pub async fn report_unexpected_callback(bot: &Bot, q: &CallbackQuery) {
    answer_callback(bot, q, Some(DefaultFlowView::unexpected_error())).await;
    if let Some(message) = q.message.as_ref() {
        report_unexpected(bot, message.chat().id).await;
    }
}

/// Start and help handler
///
/// # Errors
///
/// Returns an error if the welcome message cannot be sent.
pub async fn start(bot: Bot, msg: Message, dialogue: FlowDialogue) -> Result<()> {
    info!(chat_id = msg.chat.id.0, "Welcome requested");
    dialogue.update(State::Start).await.map_err(reset_error)?;

    bot.send_message(msg.chat.id, DefaultFlowView::welcome_message())
        .parse_mode(ParseMode::Html)
        .await?;
    Ok(())
}

/// `/search <query>` handler
///
/// Shows a placeholder, then edits it into the result list. Failures are
/// replied to the command message and the placeholder is removed.
///
/// # Errors
///
/// Returns an error if Telegram API calls fail.
pub async fn search(
    bot: Bot,
    msg: Message,
    query: String,
    controller: Arc<Controller>,
    dialogue: FlowDialogue,
) -> Result<()> {
    let chat_id = msg.chat.id;
    dialogue.update(State::Start).await.map_err(reset_error)?;

    if query.trim().is_empty() {
        bot.send_message(chat_id, DefaultFlowView::search_usage())
            .reply_parameters(ReplyParameters::new(msg.id))
            .await?;
        return Ok(());
    }

    let placeholder = bot
        .send_message(chat_id, DefaultFlowView::searching())
        .await?;

    match controller.search(chat_id.0, &query).await {
        Ok(screen) => {
            present(&bot, chat_id, Target::Placeholder(placeholder.id), &screen).await
        }
        Err(e) => {
            warn!(chat_id = chat_id.0, error = %e, "Search step failed");
            if let Err(e) = bot.delete_message(chat_id, placeholder.id).await {
                warn!(chat_id = chat_id.0, error = %e, "Failed to delete placeholder");
            }
            bot.send_message(chat_id, DefaultFlowView::notice(&e))
                .reply_parameters(ReplyParameters::new(msg.id))
                .await?;
            Ok(())
        }
    }
}

/// `/clear` handler
///
/// # Errors
///
/// Returns an error if the session store or Telegram fails.
pub async fn clear(
    bot: Bot,
    msg: Message,
    controller: Arc<Controller>,
    dialogue: FlowDialogue,
) -> Result<()> {
    dialogue.update(State::Start).await.map_err(reset_error)?;
    let existed = controller.clear(msg.chat.id.0).await?;
    bot.send_message(msg.chat.id, DefaultFlowView::session_cleared(existed))
        .await?;
    Ok(())
}

/// Text outside of any prompt request
///
/// # Errors
///
/// Returns an error if the reply cannot be sent.
pub async fn handle_text(bot: Bot, msg: Message) -> Result<()> {
    let text = msg.text().unwrap_or_default().trim();
    let reply = if text.starts_with("/search") {
        DefaultFlowView::search_usage()
    } else if text.starts_with('/') {
        DefaultFlowView::unknown_command()
    } else {
        DefaultFlowView::use_search_hint()
    };
    bot.send_message(msg.chat.id, reply).await?;
    Ok(())
}

/// Text received after the user chose a custom thumbnail prompt
///
/// # Errors
///
/// Returns an error if Telegram API calls fail.
pub async fn handle_image_prompt(
    bot: Bot,
    msg: Message,
    controller: Arc<Controller>,
    dialogue: FlowDialogue,
) -> Result<()> {
    let chat_id = msg.chat.id;
    let Some(description) = msg.text().map(str::trim).filter(|t| !t.is_empty()) else {
        bot.send_message(chat_id, DefaultFlowView::describe_image())
            .await?;
        return Ok(());
    };

    dialogue.update(State::Start).await.map_err(reset_error)?;

    match controller.custom_thumbnail(chat_id.0, description).await {
        Ok(screen) => present(&bot, chat_id, Target::New, &screen).await,
        Err(e) => report(&bot, chat_id, &e).await,
    }
}

/// Inline button handler
///
/// Quick steps answer the callback with their notice. Steps that call a
/// provider answer immediately with a progress toast and report failures as
/// chat messages.
///
/// # Errors
///
/// Returns an error if Telegram API calls fail.
pub async fn handle_callback(
    bot: Bot,
    q: CallbackQuery,
    controller: Arc<Controller>,
    dialogue: FlowDialogue,
) -> Result<()> {
    let Some(data) = q.data.as_deref() else {
        return Ok(());
    };

    let action = match data.parse::<CallbackAction>() {
        Ok(action) => action,
        Err(e) => {
            warn!(error = %e, "Ignoring callback");
            answer_callback(&bot, &q, Some(DefaultFlowView::unknown_command())).await;
            return Ok(());
        }
    };

    let Some((chat_id, message_id)) = q.message.as_ref().map(|msg| (msg.chat().id, msg.id()))
    else {
        warn!(action = %action, "Callback message missing chat id");
        answer_callback(&bot, &q, Some(DefaultFlowView::unexpected_error())).await;
        return Ok(());
    };

    let progress = DefaultFlowView::progress_toast(action);
    if progress.is_some() {
        answer_callback(&bot, &q, progress).await;
    }

    match controller.handle_callback(chat_id.0, action).await {
        Ok(screen) => {
            if progress.is_none() {
                answer_callback(&bot, &q, None).await;
            }
            let target = match screen {
                Screen::AwaitingImagePrompt => {
                    dialogue
                        .update(State::AwaitingImagePrompt)
                        .await
                        .map_err(reset_error)?;
                    Target::New
                }
                Screen::Thumbnail { .. } => Target::New,
                _ => Target::Edit(message_id),
            };
            present(&bot, chat_id, target, &screen).await
        }
        Err(e) if progress.is_none() => {
            warn!(chat_id = chat_id.0, action = %action, error = %e, "Callback step failed");
            answer_callback(&bot, &q, Some(DefaultFlowView::notice(&e))).await;
            Ok(())
        }
        Err(e) => report(&bot, chat_id, &e).await,
    }
}

async fn report(bot: &Bot, chat_id: ChatId, err: &FlowError) -> Result<()> {
    match err {
        FlowError::Store(_) => error!(chat_id = chat_id.0, error = %err, "Step failed"),
        _ => warn!(chat_id = chat_id.0, error = %err, "Step failed"),
    }
    bot.send_message(chat_id, DefaultFlowView::notice(err))
        .await?;
    Ok(())
}

/// Show a screen at `target`.
///
/// A screen that cannot be shown becomes a notice. A placeholder always ends up
/// holding either the screen or the notice.
async fn present(bot: &Bot, chat_id: ChatId, target: Target, screen: &Screen) -> Result<()> {
    let rendered = match views::render::<DefaultFlowView>(screen) {
        Ok(rendered) => rendered,
        Err(e) => {
            warn!(chat_id = chat_id.0, error = %e, "Screen not rendered");
            return show_notice(bot, chat_id, target, DefaultFlowView::render_too_large()).await;
        }
    };

    let sent = match rendered {
        Rendered::Text { text, keyboard } => {
            if let Target::Placeholder(message_id) | Target::Edit(message_id) = target {
                let mut req = bot
                    .edit_message_text(chat_id, message_id, text)
                    .parse_mode(ParseMode::Html);
                if let Some(keyboard) = keyboard {
                    req = req.reply_markup(keyboard);
                }
                req.await.map(|_| ())
            } else {
                let mut req = bot.send_message(chat_id, text).parse_mode(ParseMode::Html);
                if let Some(keyboard) = keyboard {
                    req = req.reply_markup(keyboard);
                }
                req.await.map(|_| ())
            }
        }
        Rendered::Photo {
            image,
            caption,
            keyboard,
        } => bot
            .send_photo(chat_id, InputFile::memory(image.to_vec()).file_name("thumbnail.png"))
            .caption(caption)
            .parse_mode(ParseMode::Html)
            .reply_markup(keyboard)
            .await
            .map(|_| ()),
    };

    match sent {
        Ok(()) => Ok(()),
        Err(e) if is_not_modified(&e) => Ok(()),
        Err(e) if is_too_long(&e) => {
            warn!(chat_id = chat_id.0, error = %e, "Telegram rejected message length");
            show_notice(bot, chat_id, target, DefaultFlowView::render_too_large()).await
        }
        Err(e) => match target {
            Target::Placeholder(_) => {
                error!(chat_id = chat_id.0, error = %e, "Failed to show screen");
                show_notice(bot, chat_id, target, DefaultFlowView::unexpected_error()).await
            }
            Target::Edit(_) | Target::New => Err(e.into()),
        },
    }
}

/// Put `notice` into the placeholder, or send it as a new message
async fn show_notice(bot: &Bot, chat_id: ChatId, target: Target, notice: &str) -> Result<()> {
    if let Target::Placeholder(message_id) = target {
        match bot.edit_message_text(chat_id, message_id, notice).await {
            Ok(_) => return Ok(()),
            Err(e) => warn!(chat_id = chat_id.0, error = %e, "Failed to edit placeholder"),
        }
    }
    bot.send_message(chat_id, notice).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::MockImageProvider;
    use crate::llm::{ContentGenerator, MockLlmProvider};
    use crate::search::{MockSearchProvider, SearchGateway};
    use crate::session::{InMemorySessionStore, SearchResult};
    use serde_json::{json, Value};
    use wiremock::matchers::{body_string_contains, method, path_regex};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    type TestResult = std::result::Result<(), Box<dyn std::error::Error>>;

    const CHAT: i64 = 42;

    fn message_json(message_id: i32, text: &str) -> Value {
        json!({
            "message_id": message_id,
            "date": 1_700_000_000,
            "chat": {"id": CHAT, "type": "private", "first_name": "Tester"},
            "from": {"id": CHAT, "is_bot": false, "first_name": "Tester"},
            "text": text
        })
    }

    fn ok_message(message_id: i32) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(json!({
            "ok": true,
            "result": message_json(message_id, "ok")
        }))
    }

    fn api_error(description: &str) -> ResponseTemplate {
        ResponseTemplate::new(400).set_body_json(json!({
            "ok": false,
            "error_code": 400,
            "description": description
        }))
    }

    fn callback_query(with_message: bool) -> std::result::Result<CallbackQuery, serde_json::Error> {
        let mut query = json!({
            "id": "4382bfdwdsb323b2d9",
            "from": {"id": CHAT, "is_bot": false, "first_name": "Tester"},
            "chat_instance": "-42",
            "data": "generate_content"
        });
        if with_message {
            query["message"] = message_json(7, "results");
        }
        serde_json::from_value(query)
    }

    fn bot_for(server: &MockServer) -> std::result::Result<Bot, Box<dyn std::error::Error>> {
        Ok(Bot::new("123456:test-token").set_api_url(reqwest::Url::parse(&server.uri())?))
    }

    fn controller(search: MockSearchProvider) -> Arc<Controller> {
        Arc::new(Controller::new(
            Arc::new(InMemorySessionStore::new(10)),
            SearchGateway::new(Arc::new(search)),
            ContentGenerator::new(Arc::new(MockLlmProvider::new()), "test-model"),
            Arc::new(MockImageProvider::new()),
        ))
    }

    fn three_results() -> MockSearchProvider {
        let mut search = MockSearchProvider::new();
        search.expect_search().times(1).returning(|_| {
            Ok((0..3)
                .map(|i| SearchResult {
                    title: format!("Result {i}"),
                    url: format!("https://example.com/{i}"),
                    content: format!("Snippet {i}"),
                })
                .collect())
        });
        search
    }

    fn dialogue() -> FlowDialogue {
        FlowDialogue::new(InMemStorage::<State>::new(), ChatId(CHAT))
    }

    async fn mount_placeholder(server: &MockServer) {
        Mock::given(method("POST"))
            .and(path_regex(r"(?i)/sendmessage$"))
            .respond_with(ok_message(10))
            .expect(1)
            .mount(server)
            .await;
    }

    #[test]
    fn test_commands_parse() {
        let cmd = Command::parse("/search rust vs go", "research_bot").expect("valid command");
        assert!(matches!(cmd, Command::Search(ref q) if q == "rust vs go"));
        assert!(matches!(
            Command::parse("/clear", "research_bot"),
            Ok(Command::Clear)
        ));
        assert!(matches!(
            Command::parse("/help", "research_bot"),
            Ok(Command::Help)
        ));
    }

    #[test]
    fn test_command_descriptions_list_search() {
        let text = Command::descriptions().to_string();
        assert!(text.contains("/search"));
        assert!(text.contains("/clear"));
    }

    #[tokio::test]
    async fn test_rejected_results_edit_turns_placeholder_into_notice() -> TestResult {
        let server = MockServer::start().await;
        mount_placeholder(&server).await;
        Mock::given(method("POST"))
            .and(path_regex(r"(?i)/editmessagetext$"))
            .and(body_string_contains("Web Search Results"))
            .respond_with(api_error("Bad Request: BUTTON_URL_INVALID"))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path_regex(r"(?i)/editmessagetext$"))
            .and(body_string_contains("unexpected error"))
            .respond_with(ok_message(10))
            .expect(1)
            .mount(&server)
            .await;

        let msg: Message = serde_json::from_value(message_json(5, "/search rust"))?;
        search(
            bot_for(&server)?,
            msg,
            "rust".to_string(),
            controller(three_results()),
            dialogue(),
        )
        .await?;
        Ok(())
    }

    #[tokio::test]
    async fn test_too_long_results_turn_placeholder_into_notice() -> TestResult {
        let server = MockServer::start().await;
        mount_placeholder(&server).await;
        Mock::given(method("POST"))
            .and(path_regex(r"(?i)/editmessagetext$"))
            .and(body_string_contains("Web Search Results"))
            .respond_with(api_error("Bad Request: message is too long"))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path_regex(r"(?i)/editmessagetext$"))
            .and(body_string_contains("Message too long"))
            .respond_with(ok_message(10))
            .expect(1)
            .mount(&server)
            .await;

        let msg: Message = serde_json::from_value(message_json(5, "/search rust"))?;
        search(
            bot_for(&server)?,
            msg,
            "rust".to_string(),
            controller(three_results()),
            dialogue(),
        )
        .await?;
        Ok(())
    }

    #[tokio::test]
    async fn test_callback_without_message_is_answered() -> TestResult {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path_regex(r"(?i)/answercallbackquery$"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true, "result": true})))
            .expect(1)
            .mount(&server)
            .await;

        let mut search = MockSearchProvider::new();
        search.expect_search().never();

        handle_callback(
            bot_for(&server)?,
            callback_query(false)?,
            controller(search),
            dialogue(),
        )
        .await?;
        Ok(())
    }

    #[tokio::test]
    async fn test_unexpected_callback_failure_answers_and_notifies() -> TestResult {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path_regex(r"(?i)/answercallbackquery$"))
            .and(body_string_contains("unexpected error"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true, "result": true})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path_regex(r"(?i)/sendmessage$"))
            .and(body_string_contains("unexpected error"))
            .respond_with(ok_message(11))
            .expect(1)
            .mount(&server)
            .await;

        report_unexpected_callback(&bot_for(&server)?, &callback_query(true)?).await;
        Ok(())
    }
}
