use andf_core::{format, SendOutcome, Session};
use ratatui::layout::Rect;

/// Convert a character index to a byte index for UTF-8 safe string operations
pub fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
    s.char_indices()
        .nth(char_idx)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

pub struct App {
    pub should_quit: bool,
    pub session: Session,

    // Input state (the draft itself lives in the session)
    pub cursor: usize, // cursor position in the draft, in chars

    // Chat history view
    pub chat_scroll: u16,
    pub follow_bottom: bool,
    pub chat_height: u16, // Height of chat area for scroll calculations
    pub chat_width: u16,  // Width of chat area for wrap calculations
    pub chat_area: Option<Rect>,

    // Suggestion highlighted with Tab, if any
    pub suggestion_idx: Option<usize>,

    // Animation state
    pub animation_frame: u8, // 0-2 for ellipsis animation
}

impl App {
    pub fn new(session: Session) -> Self {
        Self {
            should_quit: false,
            session,
            cursor: 0,
            chat_scroll: 0,
            follow_bottom: true,
            chat_height: 0,
            chat_width: 0,
            chat_area: None,
            suggestion_idx: None,
            animation_frame: 0,
        }
    }

    /// Editing is locked while an exchange is outstanding
    pub fn input_enabled(&self) -> bool {
        !self.session.is_awaiting()
    }

    pub fn send_draft(&mut self) -> SendOutcome {
        let outcome = self.session.submit_draft();
        if outcome.is_accepted() {
            self.cursor = 0;
            self.suggestion_idx = None;
            self.follow_bottom = true;
        }
        outcome
    }

    // Draft editing

    pub fn insert_char(&mut self, c: char) {
        if !self.input_enabled() {
            return;
        }
        let cursor = self.cursor;
        let draft = self.session.draft_mut();
        let byte_pos = char_to_byte_index(draft, cursor);
        draft.insert(byte_pos, c);
        self.cursor += 1;
    }

    /// Paste into the draft. The input box is a single row, so line breaks
    /// become spaces.
    pub fn insert_str(&mut self, text: &str) {
        let flat = text.replace("\r\n", " ");
        for c in flat.chars() {
            let c = if c == '\n' || c == '\r' { ' ' } else { c };
            if !c.is_control() {
                self.insert_char(c);
            }
        }
    }

    pub fn backspace(&mut self) {
        if !self.input_enabled() || self.cursor == 0 {
            return;
        }
        self.cursor -= 1;
        let cursor = self.cursor;
        let draft = self.session.draft_mut();
        let byte_pos = char_to_byte_index(draft, cursor);
        draft.remove(byte_pos);
    }

    pub fn delete(&mut self) {
        if !self.input_enabled() {
            return;
        }
        let cursor = self.cursor;
        let draft = self.session.draft_mut();
        if cursor < draft.chars().count() {
            let byte_pos = char_to_byte_index(draft, cursor);
            draft.remove(byte_pos);
        }
    }

    pub fn cursor_left(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }

    pub fn cursor_right(&mut self) {
        let char_count = self.session.draft().chars().count();
        self.cursor = (self.cursor + 1).min(char_count);
    }

    pub fn cursor_home(&mut self) {
        self.cursor = 0;
    }

    pub fn cursor_end(&mut self) {
        self.cursor = self.session.draft().chars().count();
    }

    /// Step through the suggestions, copying the highlighted one into the draft
    pub fn cycle_suggestion(&mut self, forward: bool) {
        let count = self.session.suggestions().len();
        if count == 0 || !self.input_enabled() {
            return;
        }
        let next = match (self.suggestion_idx, forward) {
            (None, true) => 0,
            (None, false) => count - 1,
            (Some(i), true) => (i + 1) % count,
            (Some(i), false) => (i + count - 1) % count,
        };
        if self.session.select_suggestion(next) {
            self.suggestion_idx = Some(next);
            self.cursor_end();
        }
    }

    /// Tick animation frame (called by Tick event)
    pub fn tick_animation(&mut self) {
        if self.session.is_awaiting() {
            self.animation_frame = (self.animation_frame + 1) % 3;
        }
    }

    // Chat scrolling

    pub fn scroll_up(&mut self, lines: u16) {
        self.chat_scroll = self.chat_scroll.saturating_sub(lines);
        self.follow_bottom = false;
    }

    pub fn scroll_down(&mut self, lines: u16) {
        let max_scroll = self.max_scroll();
        self.chat_scroll = self.chat_scroll.saturating_add(lines).min(max_scroll);
        self.follow_bottom = self.chat_scroll >= max_scroll;
    }

    pub fn page_size(&self) -> u16 {
        self.chat_height.max(2) / 2
    }

    /// Keep the newest message (and the typing indicator) in view
    pub fn scroll_to_bottom(&mut self) {
        self.chat_scroll = self.max_scroll();
    }

    fn max_scroll(&self) -> u16 {
        // Default to 20 rows if the area has not been measured yet
        let visible_height = if self.chat_height > 0 { self.chat_height } else { 20 };
        self.total_chat_lines().saturating_sub(visible_height)
    }

    /// Rows the chat history takes once wrapped, mirroring `ui::chat_lines`
    pub fn total_chat_lines(&self) -> u16 {
        // Use actual chat width for wrap calculation, default to 50 if not set
        let wrap_width = if self.chat_width > 0 { self.chat_width as usize } else { 50 };

        let mut total_lines: usize = 0;
        for message in self.session.messages() {
            let view = format::view(message);
            total_lines += 1; // Role and time line
            total_lines += wrapped_rows(&view.content, wrap_width);
            let has_details = view.confidence_label.is_some()
                || view.sources_label.is_some()
                || view.latency_label.is_some();
            if has_details {
                total_lines += 1;
            }
            total_lines += 1; // Blank line after message
        }

        if self.session.is_awaiting() {
            total_lines += 2; // Role line + typing indicator
        }

        total_lines.min(u16::MAX as usize) as u16
    }
}

fn wrapped_rows(content: &str, wrap_width: usize) -> usize {
    content
        .lines()
        .map(|line| {
            // Use character count, not byte length, for proper UTF-8 handling
            let char_count = line.chars().count();
            if char_count == 0 {
                1
            } else {
                char_count.div_ceil(wrap_width)
            }
        })
        .sum::<usize>()
        .max(1)
}
