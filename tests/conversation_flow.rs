use bytes::Bytes;
use research_post_bot::controller::{
    CallbackAction, Controller, FlowError, Platform, PromptChoice, Screen,
};
use research_post_bot::image::{ImageError, ImageProvider};
use research_post_bot::llm::{ContentGenerator, LlmError, LlmProvider};
use research_post_bot::search::{SearchError, SearchGateway, SearchProvider};
use research_post_bot::session::{InMemorySessionStore, SearchResult, SessionStore};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

const CHAT: i64 = 42;

type TestResult = Result<(), Box<dyn std::error::Error>>;

fn results(count: usize) -> Vec<SearchResult> {
    (0..count)
        .map(|i| SearchResult {
            title: format!("Rust vs Go, part {i}"),
            url: format!("https://example.com/rust-go/{i}"),
            content: format!("Benchmark notes {i}"),
        })
        .collect()
}

/// Search provider answering from a queue of scripted outcomes
struct ScriptedSearch {
    outcomes: Mutex<VecDeque<Result<Vec<SearchResult>, SearchError>>>,
    calls: Arc<AtomicUsize>,
}

#[async_trait::async_trait]
impl SearchProvider for ScriptedSearch {
    async fn search(&self, _query: &str) -> Result<Vec<SearchResult>, SearchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.outcomes
            .lock()
            .map_err(|_| SearchError::Unavailable("poisoned".into()))?
            .pop_front()
            .unwrap_or_else(|| Ok(results(3)))
    }
}

/// Text provider returning numbered drafts, or a network error once `down` is set
struct CountingLlm {
    calls: Arc<AtomicUsize>,
    down: Arc<AtomicBool>,
}

#[async_trait::async_trait]
impl LlmProvider for CountingLlm {
    async fn generate_text(
        &self,
        _prompt: &str,
        _model_id: &str,
        _max_tokens: u32,
    ) -> Result<String, LlmError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.down.load(Ordering::SeqCst) {
            return Err(LlmError::NetworkError("connection reset".into()));
        }
        Ok(format!("Tweet: draft {n}"))
    }
}

/// Image provider that records prompts and answers with a fixed outcome
struct RecordingImage {
    fail_with_status: Option<u16>,
    prompts: Arc<Mutex<Vec<String>>>,
}

#[async_trait::async_trait]
impl ImageProvider for RecordingImage {
    async fn generate_image(&self, prompt: &str) -> Result<Bytes, ImageError> {
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(prompt.to_string());
        }
        match self.fail_with_status {
            Some(status) => Err(ImageError::Status {
                status,
                message: "Service Unavailable".into(),
            }),
            None => Ok(Bytes::from_static(b"\x89PNG")),
        }
    }
}

struct Harness {
    controller: Controller,
    store: Arc<InMemorySessionStore>,
    search_calls: Arc<AtomicUsize>,
    llm_calls: Arc<AtomicUsize>,
    llm_down: Arc<AtomicBool>,
    image_prompts: Arc<Mutex<Vec<String>>>,
}

impl Harness {
    fn new(
        search: Vec<Result<Vec<SearchResult>, SearchError>>,
        image_status: Option<u16>,
    ) -> Self {
        let store = Arc::new(InMemorySessionStore::new(100));
        let search_calls = Arc::new(AtomicUsize::new(0));
        let llm_calls = Arc::new(AtomicUsize::new(0));
        let llm_down = Arc::new(AtomicBool::new(false));
        let image_prompts = Arc::new(Mutex::new(Vec::new()));

        let controller = Controller::new(
            store.clone(),
            SearchGateway::new(Arc::new(ScriptedSearch {
                outcomes: Mutex::new(search.into()),
                calls: search_calls.clone(),
            })),
            ContentGenerator::new(
                Arc::new(CountingLlm {
                    calls: llm_calls.clone(),
                    down: llm_down.clone(),
                }),
                "test-model",
            ),
            Arc::new(RecordingImage {
                fail_with_status: image_status,
                prompts: image_prompts.clone(),
            }),
        );

        Self {
            controller,
            store,
            search_calls,
            llm_calls,
            llm_down,
            image_prompts,
        }
    }

    fn image_calls(&self) -> usize {
        self.image_prompts.lock().map(|p| p.len()).unwrap_or_default()
    }
}

#[tokio::test]
async fn search_creates_session_with_results() -> TestResult {
    let h = Harness::new(vec![Ok(results(3))], None);

    let screen = h.controller.search(CHAT, "rust vs go").await?;
    assert!(matches!(screen, Screen::SearchResults { ref results, .. } if results.len() == 3));

    let session = h.store.get(CHAT).await?.ok_or("missing session")?;
    assert_eq!(session.results.len(), 3);
    assert_eq!(session.query, "rust vs go");
    assert!(session.content().is_none());
    Ok(())
}

#[tokio::test]
async fn platform_choice_stores_generated_content() -> TestResult {
    let h = Harness::new(vec![Ok(results(3))], None);
    h.controller.search(CHAT, "rust vs go").await?;

    let menu = h
        .controller
        .handle_callback(CHAT, CallbackAction::Generate)
        .await?;
    assert!(matches!(menu, Screen::PlatformMenu));
    assert_eq!(h.llm_calls.load(Ordering::SeqCst), 0);

    let screen = h
        .controller
        .handle_callback(CHAT, CallbackAction::Platform(Platform::Twitter))
        .await?;
    match screen {
        Screen::Content {
            platform,
            text,
            revised,
        } => {
            assert_eq!(platform, Some(Platform::Twitter));
            assert_eq!(text, "Tweet: draft 1");
            assert!(!revised);
        }
        other => return Err(format!("unexpected screen {other:?}").into()),
    }

    let session = h.store.get(CHAT).await?.ok_or("missing session")?;
    assert_eq!(session.content(), Some("Tweet: draft 1"));
    Ok(())
}

#[tokio::test]
async fn image_failure_keeps_content() -> TestResult {
    let h = Harness::new(vec![Ok(results(3))], Some(503));
    h.controller.search(CHAT, "rust vs go").await?;
    h.controller
        .handle_callback(CHAT, CallbackAction::Platform(Platform::LinkedIn))
        .await?;

    let err = h
        .controller
        .handle_callback(CHAT, CallbackAction::ThumbnailPrompt(PromptChoice::Default))
        .await
        .expect_err("image provider is down");
    assert!(matches!(
        err,
        FlowError::ImageUnavailable(ImageError::Status { status: 503, .. })
    ));

    let session = h.store.get(CHAT).await?.ok_or("missing session")?;
    assert_eq!(session.content(), Some("Tweet: draft 1"));
    assert_eq!(h.image_calls(), 1);
    Ok(())
}

#[tokio::test]
async fn regenerations_keep_only_latest_content() -> TestResult {
    let h = Harness::new(vec![Ok(results(2))], None);
    h.controller.search(CHAT, "rust vs go").await?;

    for _ in 0..4 {
        let screen = h
            .controller
            .handle_callback(CHAT, CallbackAction::Regenerate)
            .await?;
        assert!(matches!(screen, Screen::Content { revised: true, .. }));
    }

    let session = h.store.get(CHAT).await?.ok_or("missing session")?;
    assert_eq!(session.content(), Some("Tweet: draft 4"));
    assert_eq!(h.llm_calls.load(Ordering::SeqCst), 4);
    Ok(())
}

#[tokio::test]
async fn generation_failure_keeps_previous_content() -> TestResult {
    let h = Harness::new(vec![Ok(results(3))], None);
    h.controller.search(CHAT, "rust vs go").await?;
    h.controller
        .handle_callback(CHAT, CallbackAction::Platform(Platform::Twitter))
        .await?;

    h.llm_down.store(true, Ordering::SeqCst);
    let err = h
        .controller
        .handle_callback(CHAT, CallbackAction::Regenerate)
        .await
        .expect_err("text provider is down");
    assert!(matches!(
        err,
        FlowError::GenerationFailed(LlmError::NetworkError(_))
    ));
    assert_eq!(h.llm_calls.load(Ordering::SeqCst), 2);

    let session = h.store.get(CHAT).await?.ok_or("missing session")?;
    assert_eq!(session.content(), Some("Tweet: draft 1"));
    Ok(())
}

#[tokio::test]
async fn empty_search_leaves_previous_session() -> TestResult {
    let h = Harness::new(vec![Ok(results(3)), Ok(Vec::new())], None);
    h.controller.search(CHAT, "rust vs go").await?;
    h.controller
        .handle_callback(CHAT, CallbackAction::Platform(Platform::Instagram))
        .await?;

    let err = h
        .controller
        .search(CHAT, "zxqv nonsense")
        .await
        .expect_err("no results");
    assert!(matches!(err, FlowError::Search(SearchError::NoResults)));

    let session = h.store.get(CHAT).await?.ok_or("missing session")?;
    assert_eq!(session.query, "rust vs go");
    assert_eq!(session.results.len(), 3);
    assert_eq!(session.content(), Some("Tweet: draft 1"));
    Ok(())
}

#[tokio::test]
async fn callback_without_session_calls_no_provider() {
    let h = Harness::new(Vec::new(), None);

    for action in [
        CallbackAction::Generate,
        CallbackAction::Platform(Platform::Twitter),
        CallbackAction::Regenerate,
        CallbackAction::CreateThumbnail,
        CallbackAction::ThumbnailPrompt(PromptChoice::Default),
        CallbackAction::ThumbnailPrompt(PromptChoice::Custom),
    ] {
        let err = h
            .controller
            .handle_callback(CHAT, action)
            .await
            .expect_err("no session");
        assert!(matches!(err, FlowError::SessionExpired), "{action}");
    }

    assert_eq!(h.search_calls.load(Ordering::SeqCst), 0);
    assert_eq!(h.llm_calls.load(Ordering::SeqCst), 0);
    assert_eq!(h.image_calls(), 0);
}

#[tokio::test]
async fn thumbnail_before_content_is_rejected() -> TestResult {
    let h = Harness::new(vec![Ok(results(3))], None);
    h.controller.search(CHAT, "rust vs go").await?;

    let err = h
        .controller
        .handle_callback(CHAT, CallbackAction::CreateThumbnail)
        .await
        .expect_err("no content yet");
    assert!(matches!(err, FlowError::ContentMissing));
    assert_eq!(h.image_calls(), 0);
    Ok(())
}

#[tokio::test]
async fn custom_thumbnail_combines_description_and_content() -> TestResult {
    let h = Harness::new(vec![Ok(results(3))], None);
    h.controller.search(CHAT, "rust vs go").await?;
    h.controller
        .handle_callback(CHAT, CallbackAction::Platform(Platform::Twitter))
        .await?;

    let ask = h
        .controller
        .handle_callback(CHAT, CallbackAction::ThumbnailPrompt(PromptChoice::Custom))
        .await?;
    assert!(matches!(ask, Screen::AwaitingImagePrompt));
    assert_eq!(h.image_calls(), 0);

    let screen = h
        .controller
        .custom_thumbnail(CHAT, "  a crab racing a gopher  ")
        .await?;
    assert!(matches!(screen, Screen::Thumbnail { ref content, .. } if content == "Tweet: draft 1"));

    let prompts = h.image_prompts.lock().map_err(|_| "poisoned")?.clone();
    assert_eq!(prompts.len(), 1);
    assert!(prompts[0].starts_with("a crab racing a gopher."));
    assert!(prompts[0].contains("Tweet: draft 1"));
    Ok(())
}

#[tokio::test]
async fn clear_forgets_session() -> TestResult {
    let h = Harness::new(vec![Ok(results(3))], None);
    h.controller.search(CHAT, "rust vs go").await?;

    assert!(h.controller.clear(CHAT).await?);
    assert!(!h.controller.clear(CHAT).await?);

    let err = h
        .controller
        .handle_callback(CHAT, CallbackAction::Generate)
        .await
        .expect_err("session cleared");
    assert!(matches!(err, FlowError::SessionExpired));
    Ok(())
}

#[tokio::test]
async fn sessions_are_isolated_per_chat() -> TestResult {
    let h = Harness::new(vec![Ok(results(3)), Ok(results(5))], None);
    h.controller.search(1, "rust").await?;
    h.controller.search(2, "go").await?;

    h.controller
        .handle_callback(1, CallbackAction::Platform(Platform::Twitter))
        .await?;

    let first = h.store.get(1).await?.ok_or("missing session 1")?;
    let second = h.store.get(2).await?.ok_or("missing session 2")?;
    assert_eq!(first.results.len(), 3);
    assert_eq!(second.results.len(), 5);
    assert!(first.content().is_some());
    assert!(second.content().is_none());
    Ok(())
}
