use std::sync::mpsc::{Receiver, TryRecvError};
use std::time::Duration;
use tracing::{trace, warn};

use ratatui::crossterm::event::{self, Event, KeyCode};
use crate::domain::{IntakeError, Message, TVConfig};

pub struct Controller {
    event_poll_time: u64,
    receiver: Receiver<Message>,
}

impl Controller {
    pub fn new(cfg: &TVConfig, receiver: Receiver<Message>) -> Self {
        Self {
            event_poll_time: cfg.event_poll_time,
            receiver,
        }
    }

    /// Returns the next message for the model. Messages from background
    /// fetches take precedence over terminal events.
    pub fn handle_event(&self) -> Result<Option<Message>, IntakeError> {
        match self.receiver.try_recv() {
            Ok(message) => return Ok(Some(message)),
            Err(TryRecvError::Empty) => {}
            Err(TryRecvError::Disconnected) => warn!("Message channel disconnected"),
        }

        if event::poll(Duration::from_millis(self.event_poll_time))? {
            match event::read()? {
                Event::Key(key) if key.kind == event::KeyEventKind::Press => {
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
            KeyCode::Char('j') | KeyCode::Down => Some(Message::MoveDown),
            KeyCode::Char('k') | KeyCode::Up => Some(Message::MoveUp),
            KeyCode::Char('h') | KeyCode::Left => Some(Message::MoveLeft),
            KeyCode::Char('l') | KeyCode::Right => Some(Message::MoveRight),
            KeyCode::PageDown => Some(Message::MovePageDown),
            KeyCode::PageUp => Some(Message::MovePageUp),
            KeyCode::Char('g') | KeyCode::Home => Some(Message::MoveBeginning),
            KeyCode::Char('G') | KeyCode::End => Some(Message::MoveEnd),
            KeyCode::Char('s') => Some(Message::ToggleSort),
            KeyCode::Enter => Some(Message::Enter),
            KeyCode::Esc => Some(Message::Exit),
            KeyCode::Char('?') => Some(Message::Help),
            KeyCode::Char('L') => Some(Message::CycleLocation),
            KeyCode::Char('a') => Some(Message::CycleAuthStatus),
            KeyCode::Char('r') => Some(Message::Reload),
            _ => None,
        };
        trace!("Mapped: {key:?} => {message:?}");
        message
    }
}

#[cfg(test)]
mod tests {
    use std::sync::mpsc;

    use ratatui::crossterm::event::{KeyEvent, KeyModifiers};

    use super::*;

    fn controller() -> (Controller, mpsc::Sender<Message>) {
        let (sender, receiver) = mpsc::channel();
        (Controller::new(&TVConfig::default(), receiver), sender)
    }

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn assert_mapped(controller: &Controller, keys: &[(KeyEvent, &str)]) {
        for (event, expected) in keys {
            let message = controller.handle_key(*event);
            assert_eq!(format!("{message:?}"), format!("Some({expected})"), "{event:?}");
        }
    }

    #[test]
    fn maps_navigation_keys() {
        let (controller, _sender) = controller();
        assert_mapped(
            &controller,
            &[
                (key(KeyCode::Char('j')), "MoveDown"),
                (key(KeyCode::Up), "MoveUp"),
                (key(KeyCode::End), "MoveEnd"),
                (KeyEvent::new(KeyCode::Char('G'), KeyModifiers::SHIFT), "MoveEnd"),
            ],
        );
    }

    #[test]
    fn maps_table_keys() {
        let (controller, _sender) = controller();
        assert_mapped(
            &controller,
            &[
                (key(KeyCode::Char('s')), "ToggleSort"),
                (key(KeyCode::Char('L')), "CycleLocation"),
                (key(KeyCode::Char('a')), "CycleAuthStatus"),
                (key(KeyCode::Esc), "Exit"),
            ],
        );
        assert!(controller.handle_key(key(KeyCode::Char('x'))).is_none());
    }

    #[test]
    fn channel_messages_come_first() {
        let (controller, sender) = controller();
        sender.send(Message::LoadMore).unwrap();
        assert!(matches!(controller.handle_event(), Ok(Some(Message::LoadMore))));
    }
}
