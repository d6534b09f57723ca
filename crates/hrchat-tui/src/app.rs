use ratatui::layout::Rect;
use ratatui::widgets::ListState;
use hrchat_core::{
    CandidateSummary, Composer, Orchestrator, PendingExchange, Session, SessionStore,
};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    Editing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocusPane {
    Sessions,
    Chat,
}

pub struct App {
    // Core state
    pub should_quit: bool,
    pub input_mode: InputMode,
    pub focus: FocusPane,

    // Sessions
    pub store: SessionStore,
    pub active_id: String,
    pub sessions_state: ListState,

    // Exchange state
    pub orchestrator: Orchestrator,
    pub composer: Composer,
    pub input_cursor: usize, // cursor position in composer.input (chars)
    pub pending: Option<PendingExchange>,

    // Chat view
    pub chat_scroll: u16,
    pub chat_height: u16, // Height of chat area for scroll calculations
    pub chat_width: u16,  // Width of chat area for wrap calculations

    // Panel areas for mouse hit-testing (updated during render)
    pub sessions_area: Option<Rect>,
    pub chat_area: Option<Rect>,

    // Animation state
    pub animation_frame: u8, // 0-2 for ellipsis animation

    pub backend_url: String,
}

impl App {
    pub fn new(store: SessionStore, orchestrator: Orchestrator, backend_url: String) -> Self {
        let active_id = store.first().id.clone();
        let mut sessions_state = ListState::default();
        sessions_state.select(Some(0));

        Self {
            should_quit: false,
            input_mode: InputMode::Normal,
            focus: FocusPane::Sessions,
            store,
            active_id,
            sessions_state,
            orchestrator,
            composer: Composer::new(),
            input_cursor: 0,
            pending: None,
            chat_scroll: 0,
            chat_height: 0,
            chat_width: 0,
            sessions_area: None,
            chat_area: None,
            animation_frame: 0,
            backend_url,
        }
    }

    /// The session shown in the chat pane
    pub fn active_session(&self) -> &Session {
        self.store
            .get(&self.active_id)
            .unwrap_or_else(|| self.store.first())
    }

    pub fn active_candidates(&self) -> Vec<CandidateSummary> {
        self.active_session()
            .candidates
            .iter()
            .filter_map(CandidateSummary::from_value)
            .collect()
    }

    /// True while a reply is outstanding
    pub fn is_loading(&self) -> bool {
        self.pending.is_some()
    }

    /// True while a reply for the visible session is outstanding
    pub fn is_active_loading(&self) -> bool {
        self.pending
            .as_ref()
            .is_some_and(|p| p.session_id() == self.active_id)
    }

    pub fn activate(&mut self, id: String) {
        let index = self
            .store
            .sessions()
            .iter()
            .position(|s| s.id == id)
            .unwrap_or(0);
        self.active_id = self.store.sessions()[index].id.clone();
        self.sessions_state.select(Some(index));
        self.scroll_chat_to_bottom();
    }

    pub fn new_session(&mut self) {
        let id = self.store.create_session();
        self.activate(id);
    }

    pub fn delete_active_session(&mut self) {
        let deleted = self.active_id.clone();
        let next = self.store.delete_session(&deleted);
        debug!(deleted = %deleted, next = %next, "switching after delete");
        self.activate(next);
    }

    pub fn sessions_nav_down(&mut self) {
        let len = self.store.sessions().len();
        let i = self.sessions_state.selected().unwrap_or(0);
        if i + 1 < len {
            let id = self.store.sessions()[i + 1].id.clone();
            self.activate(id);
        }
    }

    pub fn sessions_nav_up(&mut self) {
        let i = self.sessions_state.selected().unwrap_or(0);
        if i > 0 {
            let id = self.store.sessions()[i - 1].id.clone();
            self.activate(id);
        }
    }

    /// Enter editing mode unless an exchange is still in flight
    pub fn begin_editing(&mut self) {
        if !self.composer.is_busy() {
            self.input_mode = InputMode::Editing;
            self.input_cursor = self.composer.input.chars().count();
        }
    }

    /// Start an exchange for the current input in the active session
    pub fn submit(&mut self) {
        let pending = self
            .orchestrator
            .start(&mut self.store, &mut self.composer, &self.active_id);

        if let Some(pending) = pending {
            self.pending = Some(pending);
            self.input_mode = InputMode::Normal;
            // Scroll to bottom so "Thinking..." is visible
            self.scroll_chat_to_bottom();
        }
    }

    /// Commit the outstanding exchange once its reply has arrived
    pub async fn poll_exchange(&mut self) {
        if !self.pending.as_ref().is_some_and(|p| p.is_finished()) {
            return;
        }

        if let Some(pending) = self.pending.take() {
            let landed_in_view = pending.session_id() == self.active_id;
            self.orchestrator
                .finish(&mut self.store, &mut self.composer, pending)
                .await;
            self.input_cursor = 0;
            if landed_in_view {
                self.scroll_chat_to_bottom();
            }
        }
    }

    /// Tick animation frame (called by Tick event)
    pub fn tick_animation(&mut self) {
        if self.is_loading() {
            self.animation_frame = (self.animation_frame + 1) % 3;
        }
    }

    pub fn scroll_down(&mut self) {
        self.chat_scroll = self.chat_scroll.saturating_add(1);
    }

    pub fn scroll_up(&mut self) {
        self.chat_scroll = self.chat_scroll.saturating_sub(1);
    }

    pub fn scroll_page_down(&mut self) {
        let page = self.chat_height.max(2) / 2;
        self.chat_scroll = self.chat_scroll.saturating_add(page);
    }

    pub fn scroll_page_up(&mut self) {
        let page = self.chat_height.max(2) / 2;
        self.chat_scroll = self.chat_scroll.saturating_sub(page);
    }

    /// Scroll chat so the last message (or "Thinking...") is visible
    pub fn scroll_chat_to_bottom(&mut self) {
        // Use actual chat width for wrap calculation, default to 50 if not set
        let wrap_width = if self.chat_width > 0 {
            self.chat_width as usize
        } else {
            50
        };

        let mut total_lines: u16 = 0;

        for msg in &self.active_session().messages {
            total_lines = total_lines.saturating_add(1); // Role line ("You:" or "HR:")
            for line in msg.text.lines() {
                // Use character count, not byte length, for proper UTF-8 handling
                let char_count = line.chars().count();
                total_lines = total_lines.saturating_add(((char_count / wrap_width) + 1) as u16);
            }
            total_lines = total_lines.saturating_add(1); // Blank line after message
        }

        if self.is_active_loading() {
            total_lines = total_lines.saturating_add(2);
        }

        let visible_height = if self.chat_height > 0 {
            self.chat_height
        } else {
            20
        };

        self.chat_scroll = total_lines.saturating_sub(visible_height);
    }
}
