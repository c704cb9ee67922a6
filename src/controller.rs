use std::time::Duration;
use tracing::trace;

use crate::domain::{Message, TSConfig, TSError};
use crate::model::Model;
use ratatui::crossterm::event::{self, Event, KeyCode, KeyEvent, KeyModifiers};

pub struct Controller {
    event_poll_time: u64,
}

impl Controller {
    pub fn new(cfg: &TSConfig) -> Self {
        Self {
            event_poll_time: cfg.event_poll_time,
        }
    }

    pub fn handle_event(&self, model: &Model) -> Result<Option<Message>, TSError> {
        if event::poll(Duration::from_millis(self.event_poll_time))? {
            return match event::read()? {
                // crossterm also emits release and repeat events on Windows
                Event::Key(key) if key.kind == event::KeyEventKind::Press => {
                    if model.raw_keyevents() {
                        Ok(Some(Message::RawKey(key)))
                    } else {
                        Ok(self.handle_key(key))
                    }
                }
                Event::Resize(width, height) => {
                    Ok(Some(Message::Resize(width as usize, height as usize)))
                }
                _ => Ok(None),
            };
        }
        Ok(None)
    }

    pub fn handle_key(&self, key: KeyEvent) -> Option<Message> {
        let message = match (key.code, key.modifiers) {
            (KeyCode::Char('c'), KeyModifiers::CONTROL) => Some(Message::Quit),
            (KeyCode::Char('q'), _) => Some(Message::Quit),
            (KeyCode::Esc, _) => Some(Message::Exit),
            (KeyCode::Enter, _) => Some(Message::Enter),
            (KeyCode::Up, _) | (KeyCode::Char('k'), _) => Some(Message::MoveUp),
            (KeyCode::Down, _) | (KeyCode::Char('j'), _) => Some(Message::MoveDown),
            (KeyCode::Left, _) | (KeyCode::Char('h'), _) => Some(Message::MoveLeft),
            (KeyCode::Right, _) | (KeyCode::Char('l'), _) => Some(Message::MoveRight),
            (KeyCode::PageUp, _) => Some(Message::MovePageUp),
            (KeyCode::PageDown, _) => Some(Message::MovePageDown),
            (KeyCode::Home, _) | (KeyCode::Char('g'), _) => Some(Message::MoveBeginning),
            (KeyCode::End, _) | (KeyCode::Char('G'), _) => Some(Message::MoveEnd),
            (KeyCode::Char('s'), _) => Some(Message::SortColumn),
            (KeyCode::Char('/'), _) => Some(Message::Search),
            (KeyCode::Char('n'), _) => Some(Message::SearchNext),
            (KeyCode::Char('N'), _) => Some(Message::SearchPrev),
            (KeyCode::Char('f'), _) => Some(Message::Filter),
            (KeyCode::Char('y'), _) => Some(Message::CopyCell),
            (KeyCode::Char('Y'), _) => Some(Message::CopyRow),
            (KeyCode::Char('T'), _) => Some(Message::CopyTable),
            (KeyCode::Char('?'), _) => Some(Message::Help),
            _ => None,
        };
        trace!("Mapped: {key:?} => {message:?}");
        message
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[test]
    fn maps_sort_and_navigation_keys() {
        let controller = Controller::new(&TSConfig::default());
        assert_eq!(
            controller.handle_key(key(KeyCode::Char('s'))),
            Some(Message::SortColumn)
        );
        assert_eq!(
            controller.handle_key(key(KeyCode::Char('l'))),
            Some(Message::MoveRight)
        );
        assert_eq!(
            controller.handle_key(KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL)),
            Some(Message::Quit)
        );
        assert_eq!(controller.handle_key(key(KeyCode::Char('x'))), None);
    }
}
