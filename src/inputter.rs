use ratatui::crossterm::event::{self, KeyCode, KeyModifiers};
use tracing::trace;

/// Line editor behind the quick-search box. Every edit is observable via
/// `get` so the table can refilter on each keystroke.
#[derive(Default)]
pub struct Inputter {
    current_input: String,
    cursor_pos: usize,
    input_width: usize,
    finished: bool,
    canceled: bool,
}

#[derive(Default, Clone, Debug)]
pub struct InputResult {
    pub input: String,
    pub finished: bool,
    pub canceled: bool,
    pub cursor_pos: usize,
}

impl Inputter {
    pub fn read(&mut self, key: event::KeyEvent) -> InputResult {
        let result = match (key.code, key.modifiers) {
            (KeyCode::Enter, KeyModifiers::NONE) => self.enter(),
            (KeyCode::Esc, KeyModifiers::NONE) => self.escape(),
            (KeyCode::Backspace, KeyModifiers::NONE) => self.backspace(),
            (KeyCode::Left, KeyModifiers::NONE) => self.left(),
            (KeyCode::Right, KeyModifiers::NONE) => self.right(),
            (kc, km) => self.key(kc, km),
        };
        trace!("Input: {:?} => \"{}\"", key.code, result.input);
        result
    }

    pub fn set(&mut self, s: &str) {
        self.current_input = s.to_string();
        self.cursor_pos = s.chars().count();
    }

    pub fn get(&self) -> InputResult {
        InputResult {
            canceled: self.canceled,
            finished: self.finished,
            input: self.current_input.clone(),
            cursor_pos: self.cursor_pos,
        }
    }

    pub fn set_width(&mut self, width: usize) {
        self.input_width = width;
    }

    pub fn clear(&mut self) {
        self.canceled = false;
        self.finished = false;
        self.current_input.clear();
        self.cursor_pos = 0;
    }

    fn enter(&mut self) -> InputResult {
        self.finished = true;
        self.get()
    }

    fn escape(&mut self) -> InputResult {
        self.clear();
        self.canceled = true;
        self.finished = true;
        self.get()
    }

    fn backspace(&mut self) -> InputResult {
        if self.cursor_pos > 0 {
            self.cursor_pos -= 1;
            let at = self.byte_pos();
            self.current_input.remove(at);
        }
        self.get()
    }

    fn left(&mut self) -> InputResult {
        self.cursor_pos = self.cursor_pos.saturating_sub(1);
        self.get()
    }

    fn right(&mut self) -> InputResult {
        if self.cursor_pos < self.current_input.chars().count() {
            self.cursor_pos += 1;
        }
        self.get()
    }

    fn key(&mut self, code: KeyCode, _modifier: KeyModifiers) -> InputResult {
        if let Some(chr) = code.as_char() {
            let at = self.byte_pos();
            self.current_input.insert(at, chr);
            self.cursor_pos += 1;
        }
        self.get()
    }

    fn byte_pos(&self) -> usize {
        self.current_input
            .char_indices()
            .nth(self.cursor_pos)
            .map(|(byte_idx, _)| byte_idx)
            .unwrap_or(self.current_input.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratatui::crossterm::event::KeyEvent;

    fn press(inputter: &mut Inputter, code: KeyCode) -> InputResult {
        inputter.read(KeyEvent::from(code))
    }

    #[test]
    fn edits_at_the_cursor() {
        let mut inputter = Inputter::default();
        press(&mut inputter, KeyCode::Char('a'));
        press(&mut inputter, KeyCode::Char('c'));
        press(&mut inputter, KeyCode::Left);
        press(&mut inputter, KeyCode::Char('b'));
        assert_eq!(inputter.get().input, "abc");

        press(&mut inputter, KeyCode::Backspace);
        assert_eq!(inputter.get().input, "ac");
    }

    #[test]
    fn escape_cancels_and_clears() {
        let mut inputter = Inputter::default();
        inputter.set("chess");
        let result = press(&mut inputter, KeyCode::Esc);
        assert!(result.canceled && result.finished);
        assert_eq!(result.input, "");
    }

    #[test]
    fn enter_commits_the_text() {
        let mut inputter = Inputter::default();
        inputter.set("go");
        let result = press(&mut inputter, KeyCode::Enter);
        assert!(result.finished && !result.canceled);
        assert_eq!(result.input, "go");
    }
}
