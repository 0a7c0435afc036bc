use banter_core::{
    Action, ChatRole, Config, Controller, HttpRelay, SessionState, Store, Submission,
};
use ratatui::widgets::ListState;

use crate::tui::EventSender;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    Editing,
}

pub struct App {
    // Core state
    pub should_quit: bool,
    pub input_mode: InputMode,

    // Conversation
    pub store: Store,
    pub controller: Controller<HttpRelay>,
    pub submission: Option<Submission>,
    events: EventSender,

    // Prompt being composed
    pub prompt: String,
    pub prompt_cursor: usize, // in chars, not bytes

    // Chat view
    pub chat_scroll: u16,
    pub chat_height: u16, // inner height, set during render
    pub chat_width: u16,  // inner width, set during render
    pub follow_tail: bool,

    // Animation state
    pub animation_frame: u8, // 0-2 for ellipsis animation

    // Model picker state
    pub show_model_picker: bool,
    pub available_models: Vec<String>,
    pub model_picker_state: ListState,

    pub relay_url: String,
}

impl App {
    pub fn new(config: &Config, events: EventSender) -> Self {
        let relay = HttpRelay::new(config.relay_url(), config.request_timeout());
        let controller = Controller::new(relay, config.instruction_table())
            .with_typing_delay(config.typing_delay())
            .with_timeout(config.request_timeout())
            .with_random_session();

        let mut available_models = config.models();
        let default_model = config.default_model().to_string();
        if !available_models.contains(&default_model) {
            available_models.insert(0, default_model.clone());
        }

        Self {
            should_quit: false,
            input_mode: InputMode::Editing,

            store: Store::new(SessionState::new(&default_model, config.system_instruction())),
            controller,
            submission: None,
            events,

            prompt: String::new(),
            prompt_cursor: 0,

            chat_scroll: 0,
            chat_height: 0,
            chat_width: 0,
            follow_tail: true,

            animation_frame: 0,

            show_model_picker: false,
            available_models,
            model_picker_state: ListState::default(),

            relay_url: config.relay_url().to_string(),
        }
    }

    pub fn state(&self) -> &SessionState {
        self.store.state()
    }

    /// Send the composed prompt. Ignored while a reply is pending or the prompt is blank.
    pub fn submit_prompt(&mut self) {
        // Between SET_LOADING(false) and the first reveal frame the store looks idle,
        // so also wait for the task itself.
        if self.exchange_running() {
            return;
        }
        if let Some(submission) =
            self.controller
                .submit(&mut self.store, &mut self.prompt, self.events.clone())
        {
            self.submission = Some(submission);
            self.prompt_cursor = 0;
            self.follow_tail = true;
        }
    }

    /// Apply an action coming back from the running exchange.
    pub fn apply(&mut self, action: Action) {
        self.store.dispatch(action);
    }

    pub fn exchange_running(&self) -> bool {
        self.submission.as_ref().is_some_and(|s| !s.is_finished())
    }

    /// Start a new chat. Does not interrupt a reply that is still arriving.
    pub fn clear_conversation(&mut self) {
        self.controller.clear(&mut self.store, &mut self.prompt);
        self.prompt_cursor = 0;
        self.chat_scroll = 0;
        self.follow_tail = true;
    }

    /// Abort the pending reply, if there is one.
    pub fn stop_generating(&mut self) -> bool {
        match self.submission.take() {
            Some(submission) if !submission.is_finished() => {
                submission.cancel();
                true
            }
            _ => false,
        }
    }

    pub fn shutdown(&mut self) {
        if self.stop_generating() {
            log::info!("[tui] cancelled pending reply on exit");
        }
    }

    /// Tick animation frame (called by Tick event)
    pub fn tick_animation(&mut self) {
        if self.state().loading {
            self.animation_frame = (self.animation_frame + 1) % 3;
        }
        if self.submission.as_ref().is_some_and(Submission::is_finished) {
            self.submission = None;
        }
    }

    // Prompt editing

    pub fn insert_char(&mut self, c: char) {
        let byte_pos = char_to_byte_index(&self.prompt, self.prompt_cursor);
        self.prompt.insert(byte_pos, c);
        self.prompt_cursor += 1;
    }

    pub fn delete_before_cursor(&mut self) {
        if self.prompt_cursor > 0 {
            self.prompt_cursor -= 1;
            let byte_pos = char_to_byte_index(&self.prompt, self.prompt_cursor);
            self.prompt.remove(byte_pos);
        }
    }

    pub fn delete_at_cursor(&mut self) {
        if self.prompt_cursor < self.prompt.chars().count() {
            let byte_pos = char_to_byte_index(&self.prompt, self.prompt_cursor);
            self.prompt.remove(byte_pos);
        }
    }

    pub fn move_cursor_left(&mut self) {
        self.prompt_cursor = self.prompt_cursor.saturating_sub(1);
    }

    pub fn move_cursor_right(&mut self) {
        self.prompt_cursor = (self.prompt_cursor + 1).min(self.prompt.chars().count());
    }

    pub fn move_cursor_home(&mut self) {
        self.prompt_cursor = 0;
    }

    pub fn move_cursor_end(&mut self) {
        self.prompt_cursor = self.prompt.chars().count();
    }

    // Chat scrolling

    pub fn scroll_up(&mut self, lines: u16) {
        self.follow_tail = false;
        self.chat_scroll = self.chat_scroll.saturating_sub(lines);
    }

    pub fn scroll_down(&mut self, lines: u16) {
        let max = self.max_scroll();
        self.chat_scroll = self.chat_scroll.saturating_add(lines).min(max);
        self.follow_tail = self.chat_scroll >= max;
    }

    pub fn scroll_half_page_up(&mut self) {
        self.scroll_up((self.chat_height / 2).max(1));
    }

    pub fn scroll_half_page_down(&mut self) {
        self.scroll_down((self.chat_height / 2).max(1));
    }

    pub fn scroll_to_top(&mut self) {
        self.follow_tail = false;
        self.chat_scroll = 0;
    }

    pub fn scroll_to_bottom(&mut self) {
        self.follow_tail = true;
        self.chat_scroll = self.max_scroll();
    }

    pub fn max_scroll(&self) -> u16 {
        self.chat_line_count().saturating_sub(self.chat_height)
    }

    /// Rough count of wrapped lines in the chat pane, matching the layout in `ui`.
    pub fn chat_line_count(&self) -> u16 {
        // Default to 50 columns before the first render
        let width = if self.chat_width > 0 { self.chat_width as usize } else { 50 };

        let wrapped = |text: &str| -> usize {
            text.lines()
                .map(|line| line.chars().count() / width + 1)
                .sum::<usize>()
                .max(1)
        };

        let state = self.state();
        let mut total: usize = state
            .conversation
            .iter()
            .map(|entry| 2 + wrapped(&entry.text)) // role line + text + blank
            .sum();
        if state.loading {
            total += 2;
        }
        if !state.typing_text.is_empty() {
            total += 1 + wrapped(&state.typing_text);
        }
        total.min(u16::MAX as usize) as u16
    }

    pub fn role_label(role: ChatRole) -> &'static str {
        match role {
            ChatRole::User => "You:",
            ChatRole::Assistant => "AI:",
        }
    }

    // Model picker methods

    pub fn open_model_picker(&mut self) {
        if self.available_models.is_empty() {
            return;
        }
        let current_idx = self
            .available_models
            .iter()
            .position(|m| m == &self.state().selected_model)
            .unwrap_or(0);
        self.model_picker_state.select(Some(current_idx));
        self.show_model_picker = true;
    }

    pub fn model_picker_nav_down(&mut self) {
        let len = self.available_models.len();
        if len > 0 {
            let i = self.model_picker_state.selected().unwrap_or(0);
            self.model_picker_state.select(Some((i + 1).min(len - 1)));
        }
    }

    pub fn model_picker_nav_up(&mut self) {
        let i = self.model_picker_state.selected().unwrap_or(0);
        self.model_picker_state.select(Some(i.saturating_sub(1)));
    }

    /// Switch to the highlighted model. Already rendered history is left as is.
    pub fn select_model(&mut self) {
        let Some(model) = self
            .model_picker_state
            .selected()
            .and_then(|i| self.available_models.get(i))
            .cloned()
        else {
            return;
        };

        self.show_model_picker = false;
        if let Err(e) = Config::save_default_model(&model) {
            log::warn!("[tui] could not save default model: {e:#}");
        }
        self.store.dispatch(Action::SetModel(model));
    }
}

/// Convert a character index to a byte index for UTF-8 safe string operations
fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
    s.char_indices()
        .nth(char_idx)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    fn app() -> App {
        let (tx, _rx) = mpsc::unbounded_channel();
        App::new(&Config::new(), tx.into())
    }

    #[test]
    fn test_editing_is_char_aware() {
        let mut app = app();
        for c in "héllo".chars() {
            app.insert_char(c);
        }
        app.move_cursor_home();
        app.move_cursor_right();
        app.delete_at_cursor();
        assert_eq!(app.prompt, "hllo");

        app.move_cursor_end();
        app.delete_before_cursor();
        assert_eq!(app.prompt, "hll");
        assert_eq!(app.prompt_cursor, 3);
    }

    #[test]
    fn test_blank_prompt_is_not_sent() {
        let mut app = app();
        app.prompt = "   ".to_string();
        app.submit_prompt();
        assert!(app.submission.is_none());
        assert!(app.state().conversation.is_empty());
        assert!(!app.state().loading);
    }

    #[test]
    fn test_clear_keeps_selected_model() {
        let mut app = app();
        app.store.dispatch(Action::SetModel("mistral".into()));
        app.store.dispatch(Action::UserInput("hi".into()));
        app.prompt = "draft".into();
        app.prompt_cursor = 5;

        app.clear_conversation();

        assert!(app.state().conversation.is_empty());
        assert_eq!(app.state().selected_model, "mistral");
        assert!(app.prompt.is_empty());
        assert_eq!(app.prompt_cursor, 0);
    }

    #[test]
    fn test_model_picker_starts_on_current_model() {
        let mut app = app();
        app.store.dispatch(Action::SetModel("gemma".into()));
        app.open_model_picker();
        assert!(app.show_model_picker);
        assert_eq!(app.model_picker_state.selected(), Some(2));

        app.model_picker_nav_down();
        app.model_picker_nav_down();
        assert_eq!(app.model_picker_state.selected(), Some(3));
    }

    /// Never answers, so the exchange task stays alive until cancelled.
    struct SilentRelay;

    #[async_trait::async_trait]
    impl banter_core::Relay for SilentRelay {
        async fn send(&self, _request: &banter_core::RelayRequest) -> anyhow::Result<String> {
            std::future::pending().await
        }
    }

    #[tokio::test]
    async fn test_submit_refused_while_exchange_task_alive() {
        let mut app = app();

        // A task that has already cleared loading but not yet started the reveal.
        let side = Controller::new(SilentRelay, banter_core::InstructionTable::default());
        let mut scratch = Store::new(SessionState::new("llama3", ""));
        let (tx, _rx) = mpsc::unbounded_channel::<Action>();
        let running = side
            .submit(&mut scratch, &mut "earlier".to_string(), tx)
            .unwrap();
        app.submission = Some(running);
        assert!(!app.state().is_busy());
        assert!(app.exchange_running());

        app.prompt = "second".into();
        app.submit_prompt();
        assert!(app.state().conversation.is_empty());
        assert_eq!(app.prompt, "second");

        assert!(app.stop_generating());
        assert!(!app.exchange_running());
    }

    #[test]
    fn test_line_count_tracks_reveal() {
        let mut app = app();
        app.chat_width = 10;
        app.apply(Action::UserInput("hello".into()));
        let base = app.chat_line_count();
        app.apply(Action::SetTyping("a".repeat(25)));
        assert_eq!(app.chat_line_count(), base + 1 + 3);
    }
}
