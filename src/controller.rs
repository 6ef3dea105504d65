use std::time::Duration;
use tracing::trace;

use crate::domain::{Message, RVConfig, RVError};
use crate::model::Model;
use ratatui::crossterm::event::{self, Event, KeyCode};

pub struct Controller {
    event_poll_time: u64,
}

impl Controller {
    pub fn new(cfg: &RVConfig) -> Self {
        Self {
            event_poll_time: cfg.event_poll_time,
        }
    }

    /// Poll for one terminal event and map it to a Message. Returns None
    /// on the idle tick, which the model uses to drive its deadlines.
    pub fn handle_event(&self, model: &Model) -> Result<Option<Message>, RVError> {
        if event::poll(Duration::from_millis(self.event_poll_time))? {
            match event::read()? {
                Event::Key(key) if key.kind == event::KeyEventKind::Press => {
                    // While the query line is active the model consumes
                    // keys unmapped.
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
        let message = match key.code {
            KeyCode::Char('q') => Some(Message::Quit),
            KeyCode::Up | KeyCode::Char('k') => Some(Message::MoveUp),
            KeyCode::Down | KeyCode::Char('j') => Some(Message::MoveDown),
            KeyCode::Left | KeyCode::Char('h') => Some(Message::MoveLeft),
            KeyCode::Right | KeyCode::Char('l') => Some(Message::MoveRight),
            KeyCode::PageUp => Some(Message::MovePageUp),
            KeyCode::PageDown => Some(Message::MovePageDown),
            KeyCode::Home | KeyCode::Char('g') => Some(Message::MoveTop),
            KeyCode::End | KeyCode::Char('G') => Some(Message::MoveBottom),
            KeyCode::Char('s') => Some(Message::SortColumn),
            KeyCode::Tab => Some(Message::SwitchView),
            KeyCode::Char('/') => Some(Message::Filter),
            KeyCode::Enter => Some(Message::Enter),
            KeyCode::Char('y') => Some(Message::Copy),
            KeyCode::Char('Y') => Some(Message::CopyRow),
            KeyCode::Char('?') => Some(Message::Help),
            KeyCode::Esc => Some(Message::Exit),
            _ => None,
        };
        trace!("Mapped: {key:?} => {message:?}");
        message
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::RVConfig;

    fn controller() -> Controller {
        Controller::new(&RVConfig::default())
    }

    #[test]
    fn navigation_keys_map_to_moves() {
        let c = controller();
        assert!(matches!(
            c.handle_key(KeyCode::Char('j').into()),
            Some(Message::MoveDown)
        ));
        assert!(matches!(
            c.handle_key(KeyCode::Up.into()),
            Some(Message::MoveUp)
        ));
        assert!(matches!(
            c.handle_key(KeyCode::Char('G').into()),
            Some(Message::MoveBottom)
        ));
    }

    #[test]
    fn action_keys_map_to_their_messages() {
        let c = controller();
        assert!(matches!(
            c.handle_key(KeyCode::Char('s').into()),
            Some(Message::SortColumn)
        ));
        assert!(matches!(
            c.handle_key(KeyCode::Char('/').into()),
            Some(Message::Filter)
        ));
        assert!(matches!(
            c.handle_key(KeyCode::Char('y').into()),
            Some(Message::Copy)
        ));
        assert!(matches!(
            c.handle_key(KeyCode::Char('q').into()),
            Some(Message::Quit)
        ));
    }

    #[test]
    fn unmapped_keys_produce_nothing() {
        let c = controller();
        assert!(c.handle_key(KeyCode::Char('z').into()).is_none());
        assert!(c.handle_key(KeyCode::F(5).into()).is_none());
    }
}
