use crate::battle::{Adventure, BattleSession, EnemyCatalog, Pacing, Reward};
use crate::error::GameError;
use crate::lifecycle::TickReport;
use crate::model::{Creature, FullState, Rules, MAX_FRIENDSHIP};
use chrono::{DateTime, Utc};
use log::{info, warn};
use rand::Rng;
use std::time::Instant;

/// A dismissible message box.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Notice {
    pub title: String,
    pub body: String,
}

impl Notice {
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
        }
    }
}

impl From<GameError> for Notice {
    fn from(e: GameError) -> Self {
        Notice::new(e.title(), e.to_string())
    }
}

/// The live game: persisted state plus what only exists while playing.
/// Every roster mutation goes through here.
pub struct GameState {
    pub full: FullState,
    pub rules: Rules,
    pub catalog: EnemyCatalog,
    pub pacing: Pacing,
    adventure: Option<Adventure>,
    in_conflict: bool,
}

impl GameState {
    pub fn new(full: FullState, rules: Rules, catalog: EnemyCatalog) -> Self {
        Self {
            full,
            rules,
            catalog,
            pacing: Pacing::default(),
            adventure: None,
            in_conflict: false,
        }
    }

    /// Copy handed to the autosave so it never sees a half-applied update.
    pub fn snapshot(&self) -> FullState {
        self.full.clone()
    }

    pub fn tick<R: Rng + ?Sized>(&mut self, rng: &mut R, now: DateTime<Utc>) -> TickReport {
        let report = self
            .full
            .tick_lifecycle(&self.rules, rng, now, self.in_conflict);
        self.in_conflict = !report.conflict.is_empty();
        report
    }

    pub fn tick_motion<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        self.full.tick_motion(&self.rules, rng);
    }

    pub fn feed(&mut self, id: &str, now: DateTime<Utc>) -> Result<(), GameError> {
        if self.full.food == 0 {
            return Err(GameError::InsufficientFood);
        }
        let rules = &self.rules;
        let c = self
            .full
            .roster
            .iter_mut()
            .find(|c| c.id == id && c.is_alive)
            .ok_or_else(|| GameError::CreatureNotFound(id.to_string()))?;
        c.satiety = (c.satiety + rules.feed_satiety).min(c.max_satiety);
        c.friendship = (c.friendship + rules.feed_friendship).min(MAX_FRIENDSHIP);
        c.last_fed = now;
        let text = format!("Fed {}. It looks happy! (satiety {:.0})", c.name, c.satiety);
        self.full.food -= 1;
        self.full.log(now, text);
        info!("fed {id}, {} food left", self.full.food);
        Ok(())
    }

    pub fn gacha<R: Rng + ?Sized>(
        &mut self,
        rng: &mut R,
        now: DateTime<Utc>,
    ) -> Result<Creature, GameError> {
        self.full.gacha_draw(&self.rules, rng, now)
    }

    pub fn breed<R: Rng + ?Sized>(
        &mut self,
        rng: &mut R,
        now: DateTime<Utc>,
    ) -> Result<Creature, GameError> {
        self.full.breed(&self.rules, rng, now)
    }

    pub fn adventure(&self) -> Option<&Adventure> {
        self.adventure.as_ref()
    }

    /// Opens the single adventure slot.
    pub fn start_adventure<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Result<(), GameError> {
        if self.adventure.is_some() {
            return Err(GameError::AdventureInProgress);
        }
        let session = BattleSession::start(&self.full.roster, &self.catalog, rng)?;
        self.adventure = Some(Adventure::new(session, self.pacing));
        Ok(())
    }

    pub fn attack(&mut self, now: Instant) -> Result<(), GameError> {
        self.adventure
            .as_mut()
            .ok_or(GameError::NoAdventure)?
            .request_attack(now)
    }

    /// Advances the battle presentation. A failing session is torn down so
    /// the slot frees up.
    pub fn update_adventure<R: Rng + ?Sized>(
        &mut self,
        now: Instant,
        rng: &mut R,
        clock: DateTime<Utc>,
    ) -> Result<(), GameError> {
        let Some(adv) = self.adventure.as_mut() else {
            return Ok(());
        };
        if let Err(e) = adv.update(now, rng) {
            warn!("adventure failed mid-fight: {e}");
            self.abandon_adventure(clock);
            return Err(e);
        }
        Ok(())
    }

    /// Collects the reward of a resolved adventure and frees the slot.
    /// Returns the diary lines that were written.
    pub fn finish_adventure<R: Rng + ?Sized>(
        &mut self,
        rng: &mut R,
        now: DateTime<Utc>,
    ) -> Result<Vec<String>, GameError> {
        let adv = self.adventure.as_mut().ok_or(GameError::NoAdventure)?;
        let reward = adv.take_reward().ok_or(GameError::OutOfTurn)?;
        self.adventure = None;
        Ok(self.apply_reward(&reward, rng, now))
    }

    /// Drops the session without a reward (screen torn down, error).
    pub fn abandon_adventure(&mut self, now: DateTime<Utc>) {
        if self.adventure.take().is_some() {
            self.full.log(now, "The adventure ended abruptly.");
        }
    }

    /// Folds a reward into the den: purse, new friend, friendship, diary.
    pub fn apply_reward<R: Rng + ?Sized>(
        &mut self,
        reward: &Reward,
        rng: &mut R,
        now: DateTime<Utc>,
    ) -> Vec<String> {
        let mut lines = Vec::new();
        lines.push(if !reward.message.is_empty() {
            reward.message.clone()
        } else if reward.defeated {
            "The adventure ended in failure...".to_string()
        } else {
            "Came back from the adventure safely!".to_string()
        });

        if reward.food_found > 0 {
            self.full.food += reward.food_found;
            lines.push(format!("Found {} food!", reward.food_found));
        }
        if reward.tokens_found > 0 {
            self.full.tokens += reward.tokens_found;
            lines.push(format!("Found {} gacha token(s)!", reward.tokens_found));
        }
        if let Some(species) = reward.new_creature {
            match self.full.adopt(species, 1, &self.rules, rng, now) {
                Ok(c) => lines.push(format!("Met a new friend, {}!", c.name)),
                Err(GameError::RosterFull { .. }) => {
                    lines.push("Almost made a new friend, but the den was full...".to_string())
                }
                Err(e) => warn!("could not add adventure friend: {e}"),
            }
        }
        if reward.xp_gained > 0 {
            for id in &reward.party_ids {
                let Some(c) = self.full.creature_mut(id) else {
                    continue;
                };
                if !c.is_alive {
                    continue;
                }
                let before = c.friendship;
                c.friendship = (before + reward.xp_gained as f64).min(MAX_FRIENDSHIP);
                if c.friendship > before {
                    lines.push(format!(
                        "{} learned from the trip; friendship is now {:.0}!",
                        c.name, c.friendship
                    ));
                }
            }
        }
        let nothing = !reward.defeated
            && reward.food_found == 0
            && reward.tokens_found == 0
            && reward.new_creature.is_none()
            && reward.xp_gained == 0;
        if lines.len() <= 1 && nothing {
            lines.push("Nothing much came of it.".to_string());
        }

        for line in &lines {
            self.full.log(now, line.clone());
        }
        lines
    }

    pub fn toggle_bgm(&mut self) -> bool {
        self.full.bgm_on = !self.full.bgm_on;
        self.full.bgm_on
    }
}
