//! Players of one session: nicknames, answer flags and scores.

use std::time::SystemTime;

use indexmap::IndexMap;
use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;

use crate::state::pin::Pin;

/// Upper bound on nickname length, in characters.
pub const MAX_NICKNAME_CHARS: usize = 32;

/// Player info tracked during a live session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Player {
    /// Display name, unique within the session (case-insensitive).
    pub nickname: String,
    /// Authenticated user behind the nickname, when known.
    pub user_id: Option<String>,
    /// Session joined.
    pub session_pin: Pin,
    /// Join time.
    pub joined_at: SystemTime,
    /// Number of correct answers so far.
    pub score: u32,
    /// Reset when the next question opens.
    pub has_answered_current_question: bool,
}

/// Row of the final (or live) ranking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct LeaderboardEntry {
    /// 1-based position; tied scores share a rank.
    pub rank: usize,
    /// Player nickname.
    pub nickname: String,
    /// Correct answers.
    pub score: u32,
}

/// Roster failures surfaced to callers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RosterError {
    /// Another player already uses this nickname.
    #[error("nickname `{0}` is already taken")]
    NicknameTaken(String),
    /// Empty or too long once trimmed.
    #[error("nickname must be between 1 and {MAX_NICKNAME_CHARS} characters")]
    InvalidNickname,
    /// No such player in the roster.
    #[error("no player named `{0}` in this session")]
    UnknownPlayer(String),
}

/// Joined participants of one session, kept in join order.
#[derive(Debug, Clone)]
pub struct PlayerRoster {
    pin: Pin,
    players: IndexMap<String, Player>,
}

fn roster_key(nickname: &str) -> String {
    nickname.trim().to_lowercase()
}

impl PlayerRoster {
    /// Empty roster for session `pin`.
    pub fn new(pin: Pin) -> Self {
        Self {
            pin,
            players: IndexMap::new(),
        }
    }

    /// Check-and-insert a new player.
    pub fn join(&mut self, nickname: &str, user_id: Option<String>) -> Result<Player, RosterError> {
        let display = nickname.trim();
        let length = display.chars().count();
        if length == 0 || length > MAX_NICKNAME_CHARS {
            return Err(RosterError::InvalidNickname);
        }

        let key = roster_key(display);
        if self.players.contains_key(&key) {
            return Err(RosterError::NicknameTaken(display.to_string()));
        }

        let player = Player {
            nickname: display.to_string(),
            user_id,
            session_pin: self.pin,
            joined_at: SystemTime::now(),
            score: 0,
            has_answered_current_question: false,
        };
        self.players.insert(key, player.clone());
        Ok(player)
    }

    /// Case-insensitive lookup.
    pub fn get(&self, nickname: &str) -> Option<&Player> {
        self.players.get(&roster_key(nickname))
    }

    /// Flag the player as having answered; returns `true` only for the first call per question.
    pub fn mark_answered(&mut self, nickname: &str) -> Result<bool, RosterError> {
        let player = self
            .players
            .get_mut(&roster_key(nickname))
            .ok_or_else(|| RosterError::UnknownPlayer(nickname.to_string()))?;

        let first = !player.has_answered_current_question;
        player.has_answered_current_question = true;
        Ok(first)
    }

    /// Add `points` to the player's score.
    pub fn award(&mut self, nickname: &str, points: u32) -> Result<u32, RosterError> {
        let player = self
            .players
            .get_mut(&roster_key(nickname))
            .ok_or_else(|| RosterError::UnknownPlayer(nickname.to_string()))?;

        player.score += points;
        Ok(player.score)
    }

    /// True once at least one player joined and every joined player answered.
    pub fn all_answered(&self) -> bool {
        !self.players.is_empty()
            && self
                .players
                .values()
                .all(|player| player.has_answered_current_question)
    }

    /// Players who answered the current question.
    pub fn answered_count(&self) -> usize {
        self.players
            .values()
            .filter(|player| player.has_answered_current_question)
            .count()
    }

    /// Clear the answered flag of every player before the next question.
    pub fn reset_answers(&mut self) {
        for player in self.players.values_mut() {
            player.has_answered_current_question = false;
        }
    }

    /// Joined players.
    pub fn len(&self) -> usize {
        self.players.len()
    }

    /// True before anyone joins.
    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    /// Players in join order.
    pub fn iter(&self) -> impl Iterator<Item = &Player> {
        self.players.values()
    }

    /// Players ordered by score (descending), ties kept in join order.
    pub fn leaderboard(&self) -> Vec<LeaderboardEntry> {
        let mut ranked: Vec<&Player> = self.players.values().collect();
        ranked.sort_by(|a, b| b.score.cmp(&a.score));

        let mut entries: Vec<LeaderboardEntry> = Vec::with_capacity(ranked.len());
        for (position, player) in ranked.into_iter().enumerate() {
            let rank = match entries.last() {
                Some(previous) if previous.score == player.score => previous.rank,
                _ => position + 1,
            };
            entries.push(LeaderboardEntry {
                rank,
                nickname: player.nickname.clone(),
                score: player.score,
            });
        }
        entries
    }
}
