use std::sync::mpsc::Receiver;
use std::time::Duration;

use tracing::trace;

use ratatui::crossterm::event::{self, Event, KeyCode, KeyModifiers};

use crate::domain::{Message, SheetConfig, SheetError};
use crate::model::Model;

pub struct Controller {
    event_poll_time: u64,
    rx: Receiver<Message>,
}

impl Controller {
    pub fn new(cfg: &SheetConfig, rx: Receiver<Message>) -> Self {
        Self {
            event_poll_time: cfg.event_poll_time,
            rx,
        }
    }

    pub fn handle_event(&self, model: &Model) -> Result<Option<Message>, SheetError> {
        // fetch completions first, then the terminal
        if let Ok(message) = self.rx.try_recv() {
            return Ok(Some(message));
        }

        if event::poll(Duration::from_millis(self.event_poll_time))? {
            match event::read()? {
                Event::Key(key) if key.kind == event::KeyEventKind::Press => {
                    if model.raw_keyevents() {
                        return Ok(Some(Message::RawKey(key)));
                    }
                    return Ok(self.handle_key(key));
                }
                Event::Resize(width, height) => {
                    return Ok(Some(Message::Resize(width as usize, height as usize)));
                }
                _ => {}
            }
        }
        Ok(None)
    }

    fn handle_key(&self, key: event::KeyEvent) -> Option<Message> {
        let message = match (key.code, key.modifiers) {
            (KeyCode::Char('q'), KeyModifiers::NONE) => Some(Message::Quit),
            (KeyCode::Tab, _) => Some(Message::FocusNext),
            (KeyCode::BackTab, _) => Some(Message::FocusPrev),
            (KeyCode::Up, _) | (KeyCode::Char('k'), KeyModifiers::NONE) => Some(Message::MoveUp),
            (KeyCode::Down, _) | (KeyCode::Char('j'), KeyModifiers::NONE) => {
                Some(Message::MoveDown)
            }
            (KeyCode::Left, _) | (KeyCode::Char('h'), KeyModifiers::NONE) => {
                Some(Message::MoveLeft)
            }
            (KeyCode::Right, _) | (KeyCode::Char('l'), KeyModifiers::NONE) => {
                Some(Message::MoveRight)
            }
            (KeyCode::PageUp, _) => Some(Message::MovePageUp),
            (KeyCode::PageDown, _) => Some(Message::MovePageDown),
            (KeyCode::Home, _) | (KeyCode::Char('g'), KeyModifiers::NONE) => {
                Some(Message::MoveBeginning)
            }
            (KeyCode::End, _) | (KeyCode::Char('G'), KeyModifiers::SHIFT) => {
                Some(Message::MoveEnd)
            }
            (KeyCode::Char('/'), _) => Some(Message::Search),
            (KeyCode::Char('s'), KeyModifiers::NONE) => Some(Message::SortAscending),
            (KeyCode::Char('S'), KeyModifiers::SHIFT) => Some(Message::SortDescending),
            (KeyCode::Char('r'), KeyModifiers::NONE) => Some(Message::Reload),
            (KeyCode::Char('e'), KeyModifiers::NONE) => Some(Message::Export),
            (KeyCode::Char('c'), KeyModifiers::NONE) => Some(Message::ClearFilters),
            (KeyCode::Char('y'), KeyModifiers::NONE) => Some(Message::CopyCell),
            (KeyCode::Char('Y'), KeyModifiers::SHIFT) => Some(Message::CopyRow),
            (KeyCode::Char('?'), _) => Some(Message::Help),
            (KeyCode::Esc, _) => Some(Message::Exit),
            _ => None,
        };
        trace!("Mapped: {key:?} => {message:?}");
        message
    }
}
