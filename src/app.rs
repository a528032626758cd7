use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Local};
use llama_buddy::{DispatchError, Dispatcher, LastExchange, Message, TaskKey, Transcript};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::error;

pub const FAILURE_HINT: &str = "Failed to get response. Please check your API key and try again.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    Editing,
}

/// A failure shown to the user in place of a reply. Never enters the transcript.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub message: String,
    pub hint: &'static str,
}

impl Notice {
    fn from_error(err: &DispatchError) -> Self {
        Self {
            message: err.to_string(),
            hint: FAILURE_HINT,
        }
    }
}

pub struct App {
    // Core state
    pub should_quit: bool,
    pub input_mode: InputMode,
    pub task: TaskKey,
    pub show_debug: bool,

    // Chat state
    pub transcript: Transcript,
    pub query_input: String,
    pub query_cursor: usize, // cursor position in query_input, in chars
    pub query_loading: bool,
    pub query_task: Option<JoinHandle<Result<String, DispatchError>>>,
    pub notice: Option<Notice>,
    /// Set while the throttle holds the current request back.
    pub throttled_until: Option<Instant>,

    // Chat view geometry, updated during render
    pub chat_scroll: u16,
    pub chat_height: u16,
    pub chat_width: u16,

    // Animation state
    pub animation_frame: u8, // 0-2 for ellipsis animation

    // Status info (sidebar)
    pub last_request_at: Option<DateTime<Local>>,
    pub last_exchange: Option<LastExchange>,

    pub dispatcher: Arc<Dispatcher>,
}

impl App {
    pub fn new(dispatcher: Dispatcher, task: TaskKey) -> Self {
        Self {
            should_quit: false,
            input_mode: InputMode::Editing,
            task,
            show_debug: false,

            transcript: Transcript::new(),
            query_input: String::new(),
            query_cursor: 0,
            query_loading: false,
            query_task: None,
            notice: None,
            throttled_until: None,

            chat_scroll: 0,
            chat_height: 0,
            chat_width: 0,

            animation_frame: 0,

            last_request_at: None,
            last_exchange: None,

            dispatcher: Arc::new(dispatcher),
        }
    }

    pub fn model(&self) -> &str {
        self.dispatcher.model()
    }

    pub fn request_interval(&self) -> Duration {
        self.dispatcher.min_interval()
    }

    pub fn is_busy(&self) -> bool {
        self.query_task.is_some()
    }

    /// Append the typed prompt and start a dispatch in the background.
    /// Ignored while a dispatch is pending.
    pub fn submit_query(&mut self) {
        let prompt = self.query_input.trim().to_string();
        if prompt.is_empty() || self.is_busy() {
            return;
        }

        self.transcript.append(Message::user(prompt.clone()));
        self.query_input.clear();
        self.query_cursor = 0;
        self.notice = None;
        self.query_loading = true;

        self.throttled_until = self
            .dispatcher
            .current_wait()
            .filter(|wait| !wait.is_zero())
            .map(|wait| Instant::now() + wait);

        // Scroll to bottom so "Thinking..." is visible
        self.scroll_chat_to_bottom();

        let dispatcher = self.dispatcher.clone();
        let task = self.task;
        self.query_task = Some(tokio::spawn(async move {
            dispatcher.dispatch(&prompt, task).await
        }));
    }

    /// Collect a finished dispatch, if any, into the transcript or a notice.
    pub async fn poll_query_task(&mut self) {
        let finished = self
            .query_task
            .as_ref()
            .is_some_and(|handle| handle.is_finished());
        if !finished {
            return;
        }
        let Some(handle) = self.query_task.take() else {
            return;
        };

        self.query_loading = false;
        self.throttled_until = None;

        match handle.await {
            Ok(Ok(reply)) => {
                self.transcript.append(Message::assistant(reply));
            }
            Ok(Err(err)) => {
                self.notice = Some(Notice::from_error(&err));
            }
            Err(join_err) => {
                error!("Dispatch task failed: {join_err}");
                self.notice = Some(Notice {
                    message: format!("Connection Error: {join_err}"),
                    hint: FAILURE_HINT,
                });
            }
        }

        self.last_request_at = self.dispatcher.last_request_at();
        self.last_exchange = self.dispatcher.last_exchange();
        self.scroll_chat_to_bottom();
    }

    /// Seconds left on the throttle, if the current request is still held back.
    pub fn throttle_remaining(&self) -> Option<u64> {
        let until = self.throttled_until?;
        let remaining = until.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            None
        } else {
            Some(remaining.as_secs() + 1)
        }
    }

    pub fn select_task(&mut self, task: TaskKey) {
        self.task = task;
    }

    pub fn cycle_task(&mut self) {
        self.task = self.task.next();
    }

    pub fn toggle_debug(&mut self) {
        self.show_debug = !self.show_debug;
    }

    /// Tick animation frame (called by Tick event)
    pub fn tick_animation(&mut self) {
        if self.query_loading {
            self.animation_frame = (self.animation_frame + 1) % 3;
        }
    }

    pub fn scroll_down(&mut self) {
        let max = self.total_chat_lines().saturating_sub(self.visible_height());
        self.chat_scroll = (self.chat_scroll + 1).min(max);
    }

    pub fn scroll_up(&mut self) {
        self.chat_scroll = self.chat_scroll.saturating_sub(1);
    }

    pub fn scroll_chat_to_bottom(&mut self) {
        let total_lines = self.total_chat_lines();
        let visible_height = self.visible_height();
        self.chat_scroll = total_lines.saturating_sub(visible_height);
    }

    fn visible_height(&self) -> u16 {
        if self.chat_height > 0 {
            self.chat_height
        } else {
            20
        }
    }

    /// Rendered line count of the chat pane, including wrapping.
    fn total_chat_lines(&self) -> u16 {
        // Before the first render the pane width is unknown
        let wrap_width = if self.chat_width > 0 {
            self.chat_width
        } else {
            50
        };
        crate::ui::chat_line_count(self, wrap_width)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use llama_buddy::{CompletionClient, Config, Role};

    fn app() -> App {
        let config = Config {
            // Nothing listens here; dispatches fail fast with a connection error.
            endpoint: "http://127.0.0.1:9/v1/chat/completions".to_string(),
            timeout_secs: 2,
            ..Config::default()
        };
        let client = CompletionClient::new(&config, "test-key").unwrap();
        App::new(Dispatcher::new(client, Duration::ZERO), TaskKey::Chat)
    }

    #[tokio::test]
    async fn empty_input_is_not_submitted() {
        let mut app = app();
        app.query_input = "   ".to_string();
        app.submit_query();
        assert!(!app.is_busy());
        assert_eq!(app.transcript.len(), 1);
    }

    #[tokio::test]
    async fn failed_dispatch_sets_notice_without_assistant_entry() {
        let mut app = app();
        app.query_input = "hello".to_string();
        app.submit_query();
        assert!(app.is_busy());
        assert_eq!(app.transcript.last().map(|m| m.role()), Some(Role::User));

        while app.is_busy() {
            tokio::time::sleep(Duration::from_millis(20)).await;
            app.poll_query_task().await;
        }

        assert_eq!(app.transcript.len(), 2);
        assert_eq!(app.transcript.last().map(|m| m.role()), Some(Role::User));
        let notice = app.notice.expect("notice set");
        assert!(notice.message.starts_with("Connection Error"));
        assert_eq!(notice.hint, FAILURE_HINT);
        assert!(!app.query_loading);
    }

    #[tokio::test]
    async fn second_submit_is_ignored_while_busy() {
        let mut app = app();
        app.query_input = "first".to_string();
        app.submit_query();
        app.query_input = "second".to_string();
        app.submit_query();
        assert_eq!(app.transcript.len(), 2);
        assert_eq!(app.query_input, "second");
    }

    #[test]
    fn scroll_to_bottom_follows_rendered_lines() {
        let mut app = app();
        app.transcript = Transcript::empty();
        app.chat_width = 10;
        app.chat_height = 1;

        // Fences are dropped and a line exactly as wide as the pane stays on one row
        app.task = TaskKey::Code;
        app.transcript.append(Message::assistant("```\nabcdefghi\n```"));
        app.scroll_chat_to_bottom();
        assert_eq!(app.chat_scroll, 2);

        // Wide characters wrap by display width, not char count
        app.task = TaskKey::Chat;
        app.transcript = Transcript::empty();
        app.transcript.append(Message::assistant("你好你好你好"));
        app.scroll_chat_to_bottom();
        assert_eq!(app.chat_scroll, 3);
    }

    #[test]
    fn cycling_tasks_wraps() {
        let config = Config::default();
        let client = CompletionClient::new(&config, "k").unwrap();
        let mut app = App::new(Dispatcher::new(client, Duration::ZERO), TaskKey::Explain);
        app.cycle_task();
        assert_eq!(app.task, TaskKey::Chat);
    }
}
