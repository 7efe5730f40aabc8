//! Keyboard capture and change-or-keepalive input sending.

use macroquad::prelude::{is_key_down, KeyCode};
use shared::Input;

/// Resend period for unchanged input. The periodic resend doubles as the
/// liveness signal the server's timeout sweep watches for.
const KEEPALIVE_MS: u64 = 100;

pub struct InputManager {
    last_sent: Option<Input>,
    last_send_ms: u64,
}

impl InputManager {
    pub fn new() -> Self {
        Self {
            last_sent: None,
            last_send_ms: 0,
        }
    }

    /// Samples the keyboard and returns an input to transmit when the state
    /// changed or the keep-alive period elapsed.
    pub fn poll(&mut self, now_ms: u64) -> Option<Input> {
        let left = is_key_down(KeyCode::A) || is_key_down(KeyCode::Left);
        let right = is_key_down(KeyCode::D) || is_key_down(KeyCode::Right);
        let space = is_key_down(KeyCode::Space);
        self.update_state(left, right, space, now_ms)
    }

    fn update_state(&mut self, left: bool, right: bool, space: bool, now_ms: u64) -> Option<Input> {
        let input = Input { left, right, space };

        let changed = self.last_sent != Some(input);
        let keepalive_due = now_ms.saturating_sub(self.last_send_ms) >= KEEPALIVE_MS;

        if changed || keepalive_due {
            self.last_sent = Some(input);
            self.last_send_ms = now_ms;
            Some(input)
        } else {
            None
        }
    }

    /// The input state last put on the wire.
    pub fn current(&self) -> Input {
        self.last_sent.unwrap_or_default()
    }
}

impl Default for InputManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_sample_is_always_sent() {
        let mut manager = InputManager::new();
        let sent = manager.update_state(false, false, false, 0);
        assert_eq!(sent, Some(Input::default()));
    }

    #[test]
    fn unchanged_input_waits_for_keepalive() {
        let mut manager = InputManager::new();
        manager.update_state(false, true, false, 1000);

        assert_eq!(manager.update_state(false, true, false, 1050), None);
        let resent = manager.update_state(false, true, false, 1100);
        assert_eq!(
            resent,
            Some(Input {
                left: false,
                right: true,
                space: false,
            })
        );
    }

    #[test]
    fn changes_are_sent_immediately() {
        let mut manager = InputManager::new();
        manager.update_state(false, false, false, 1000);

        let sent = manager.update_state(false, false, true, 1001);
        assert_eq!(
            sent,
            Some(Input {
                left: false,
                right: false,
                space: true,
            })
        );
        assert!(manager.current().space);
    }
}
