//! Session events delivered to the host UI
//!
//! The engine never touches score or lives itself. It reports what happened
//! and the host decides what that means; `Scoreboard` is the reference
//! implementation used by the native demo and tests.

use glam::Vec2;

use crate::config::GameConfig;

/// Something the host should know about
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SessionEvent {
    /// A target was sliced
    Score {
        points: u32,
        /// Popup position in screen pixels (origin top-left)
        screen_pos: Vec2,
    },
    /// A live target fell out of the scene unsliced
    Miss,
    /// A bomb was sliced
    Bomb,
}

/// Host-side listener
pub trait SessionEvents {
    fn on_score(&mut self, points: u32, screen_pos: Vec2);
    fn on_miss(&mut self);
    fn on_bomb(&mut self);
}

/// Deliver queued events in order, draining the queue
pub fn dispatch(events: &mut Vec<SessionEvent>, listener: &mut dyn SessionEvents) {
    for event in events.drain(..) {
        match event {
            SessionEvent::Score { points, screen_pos } => listener.on_score(points, screen_pos),
            SessionEvent::Miss => listener.on_miss(),
            SessionEvent::Bomb => listener.on_bomb(),
        }
    }
}

/// Recording listener
impl SessionEvents for Vec<SessionEvent> {
    fn on_score(&mut self, points: u32, screen_pos: Vec2) {
        self.push(SessionEvent::Score { points, screen_pos });
    }

    fn on_miss(&mut self) {
        self.push(SessionEvent::Miss);
    }

    fn on_bomb(&mut self) {
        self.push(SessionEvent::Bomb);
    }
}

/// Listener that drops everything
#[derive(Debug, Default, Clone, Copy)]
pub struct IgnoreEvents;

impl SessionEvents for IgnoreEvents {
    fn on_score(&mut self, _points: u32, _screen_pos: Vec2) {}
    fn on_miss(&mut self) {}
    fn on_bomb(&mut self) {}
}

/// Reference score/lives keeper
#[derive(Debug, Clone, Default)]
pub struct Scoreboard {
    pub config: GameConfig,
    pub misses: u32,
    pub bombs_hit: u32,
    pub targets_hit: u32,
}

impl Scoreboard {
    pub fn new(config: GameConfig) -> Self {
        Self {
            config,
            misses: 0,
            bombs_hit: 0,
            targets_hit: 0,
        }
    }

    /// Reset score/lives for a fresh run. The engine restart is separate.
    pub fn restart(&mut self) {
        self.config.score = 0;
        self.config.lives = 3;
        self.config.game_over = false;
        self.config.is_playing = true;
        self.misses = 0;
        self.bombs_hit = 0;
        self.targets_hit = 0;
    }
}

impl SessionEvents for Scoreboard {
    fn on_score(&mut self, points: u32, _screen_pos: Vec2) {
        if self.config.game_over {
            return;
        }
        self.config.score += u64::from(points);
        self.targets_hit += 1;
    }

    fn on_miss(&mut self) {
        // Misses are tallied but never cost a life
        self.misses += 1;
    }

    fn on_bomb(&mut self) {
        if self.config.game_over {
            return;
        }
        self.bombs_hit += 1;
        self.config.lives = self.config.lives.saturating_sub(1);
        if self.config.lives == 0 {
            self.config.game_over = true;
            log::info!("Game over at score {}", self.config.score);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dispatch_preserves_order() {
        let mut queue = vec![
            SessionEvent::Miss,
            SessionEvent::Score {
                points: 10,
                screen_pos: Vec2::new(1.0, 2.0),
            },
            SessionEvent::Bomb,
        ];
        let expected = queue.clone();
        let mut recorded: Vec<SessionEvent> = Vec::new();
        dispatch(&mut queue, &mut recorded);
        assert!(queue.is_empty());
        assert_eq!(recorded, expected);
    }

    #[test]
    fn test_scoreboard_three_bombs_ends_game() {
        let mut board = Scoreboard::new(GameConfig::default());
        board.on_score(50, Vec2::ZERO);
        board.on_bomb();
        board.on_bomb();
        assert!(!board.config.game_over);
        board.on_bomb();
        assert!(board.config.game_over);
        assert_eq!(board.config.lives, 0);

        // Inert after game over
        board.on_score(10, Vec2::ZERO);
        board.on_bomb();
        assert_eq!(board.config.score, 50);
        assert_eq!(board.bombs_hit, 3);

        board.restart();
        assert_eq!(board.config.lives, 3);
        assert_eq!(board.config.score, 0);
        assert!(!board.config.game_over);
    }

    #[test]
    fn test_miss_does_not_cost_lives() {
        let mut board = Scoreboard::default();
        board.on_miss();
        board.on_miss();
        assert_eq!(board.config.lives, 3);
        assert_eq!(board.misses, 2);
    }
}
