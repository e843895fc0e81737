use crate::error::GameError;
use crate::model::{Creature, Species, SpeciesChoice};
use log::{debug, info};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::{Duration, Instant};

const LOG_LINES: usize = 4;
/// Xp basis for a defeat when there is no enemy to read it from.
const FALLBACK_XP: u32 = 5;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct CreatureDrop {
    pub chance: f64,
    pub kind: SpeciesChoice,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct RewardSpec {
    #[serde(default)]
    pub food: u32,
    #[serde(default)]
    pub tokens: u32,
    #[serde(default)]
    pub xp: u32,
    #[serde(default)]
    pub creature: Option<CreatureDrop>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct EnemyTemplate {
    pub name: String,
    pub hp: u32,
    pub attack: u32,
    pub defense: u32,
    #[serde(default)]
    pub reward: RewardSpec,
    pub glyph: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct EnemyCatalog {
    pub enemies: Vec<EnemyTemplate>,
}

impl Default for EnemyCatalog {
    fn default() -> Self {
        Self {
            enemies: vec![
                EnemyTemplate {
                    name: "Forest Slime".to_string(),
                    hp: 30,
                    attack: 5,
                    defense: 2,
                    reward: RewardSpec {
                        food: 1,
                        xp: 5,
                        ..RewardSpec::default()
                    },
                    glyph: "(~)".to_string(),
                },
                EnemyTemplate {
                    name: "Cave Bat".to_string(),
                    hp: 20,
                    attack: 7,
                    defense: 1,
                    reward: RewardSpec {
                        tokens: 1,
                        xp: 3,
                        ..RewardSpec::default()
                    },
                    glyph: "^v^".to_string(),
                },
                EnemyTemplate {
                    name: "Lost-Woods Wolf".to_string(),
                    hp: 60,
                    attack: 10,
                    defense: 4,
                    reward: RewardSpec {
                        food: 3,
                        tokens: 0,
                        xp: 12,
                        creature: Some(CreatureDrop {
                            chance: 0.1,
                            kind: SpeciesChoice::Random,
                        }),
                    },
                    glyph: "=W=".to_string(),
                },
            ],
        }
    }
}

impl EnemyCatalog {
    pub fn pick<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<&EnemyTemplate> {
        if self.enemies.is_empty() {
            return None;
        }
        Some(&self.enemies[rng.gen_range(0..self.enemies.len())])
    }
}

pub fn attack_power(growth: f64, friendship: f64) -> i64 {
    5 + (growth / 15.0).floor() as i64 + (friendship / 25.0).floor() as i64
}

/// Damage a party member deals. Never below 1.
pub fn player_damage(growth: f64, friendship: f64, enemy_defense: u32) -> u32 {
    (attack_power(growth, friendship) - enemy_defense as i64).max(1) as u32
}

/// Damage an enemy deals; the defender's growth soaks some of it. Never below 1.
pub fn enemy_damage(enemy_attack: u32, player_growth: f64) -> u32 {
    (enemy_attack as i64 - (player_growth / 20.0).floor() as i64).max(1) as u32
}

#[derive(Clone, Debug, PartialEq)]
pub struct Fighter {
    pub id: String,
    pub name: String,
    pub species: Species,
    pub growth: f64,
    pub friendship: f64,
    pub max_hp: f64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    PlayerTurn,
    EnemyTurn,
    Victory,
    Defeat,
    Resolved,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    Victory,
    Defeat,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Strike {
    pub damage: u32,
    pub finished: bool,
}

/// What a finished adventure hands back to the game state.
#[derive(Clone, Debug, PartialEq)]
pub struct Reward {
    pub party_ids: Vec<String>,
    pub xp_gained: u32,
    pub food_found: u32,
    pub tokens_found: u32,
    pub new_creature: Option<Species>,
    pub message: String,
    pub defeated: bool,
}

pub fn compute_reward<R: Rng + ?Sized>(
    outcome: Outcome,
    enemy: Option<&EnemyTemplate>,
    party_ids: Vec<String>,
    rng: &mut R,
) -> Reward {
    let mut reward = Reward {
        party_ids,
        xp_gained: 0,
        food_found: 0,
        tokens_found: 0,
        new_creature: None,
        message: String::new(),
        defeated: outcome == Outcome::Defeat,
    };
    match (outcome, enemy) {
        (Outcome::Victory, Some(e)) => {
            reward.xp_gained = e.reward.xp;
            reward.food_found = e.reward.food;
            reward.tokens_found = e.reward.tokens;
            reward.message = format!("Won against {}!", e.name);
            if let Some(drop) = &e.reward.creature {
                if rng.gen::<f64>() < drop.chance {
                    reward.new_creature = Some(drop.kind.resolve(rng));
                }
            }
        }
        (Outcome::Victory, None) => {
            reward.message = "Came back from the adventure safely!".to_string();
        }
        (Outcome::Defeat, Some(e)) => {
            reward.xp_gained = e.reward.xp / 3;
            reward.message = format!("Lost to {}...", e.name);
        }
        (Outcome::Defeat, None) => {
            reward.xp_gained = FALLBACK_XP / 3;
            reward.message = "Lost the fight...".to_string();
        }
    }
    reward
}

/// One encounter between the lead party member and a single enemy.
#[derive(Clone, Debug)]
pub struct BattleSession {
    pub party_ids: Vec<String>,
    pub fighter: Fighter,
    pub enemy: EnemyTemplate,
    pub player_hp: f64,
    pub enemy_hp: u32,
    phase: Phase,
    log: VecDeque<String>,
}

impl BattleSession {
    /// Rolls an enemy and sends the first living creature of `party` at it.
    pub fn start<R: Rng + ?Sized>(
        party: &[Creature],
        catalog: &EnemyCatalog,
        rng: &mut R,
    ) -> Result<Self, GameError> {
        let lead = party
            .iter()
            .find(|c| c.is_alive)
            .ok_or(GameError::NoLivingCreatures)?;
        let enemy = catalog.pick(rng).ok_or(GameError::EmptyCatalog)?.clone();
        let fighter = Fighter {
            id: lead.id.clone(),
            name: lead.name.clone(),
            species: lead.species,
            growth: lead.growth,
            friendship: lead.friendship,
            max_hp: lead.max_hp,
        };
        let mut session = Self {
            party_ids: vec![lead.id.clone()],
            player_hp: lead.hp,
            enemy_hp: enemy.hp,
            fighter,
            enemy,
            phase: Phase::PlayerTurn,
            log: VecDeque::with_capacity(LOG_LINES),
        };
        session.note(format!(
            "[{}] ran into [{}] {} on the trail!",
            session.fighter.name, session.enemy.name, session.enemy.glyph
        ));
        info!("adventure: {} vs {}", session.fighter.id, session.enemy.name);
        Ok(session)
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Recent log lines, newest first.
    pub fn log(&self) -> impl Iterator<Item = &str> {
        self.log.iter().map(String::as_str)
    }

    pub fn note(&mut self, line: String) {
        self.log.push_front(line);
        self.log.truncate(LOG_LINES);
    }

    fn check_turn(&self, want: Phase) -> Result<(), GameError> {
        match self.phase {
            Phase::Resolved => Err(GameError::NoAdventure),
            p if p == want => Ok(()),
            _ => Err(GameError::OutOfTurn),
        }
    }

    pub fn player_attack(&mut self) -> Result<Strike, GameError> {
        self.check_turn(Phase::PlayerTurn)?;
        let damage = player_damage(
            self.fighter.growth,
            self.fighter.friendship,
            self.enemy.defense,
        );
        self.enemy_hp = self.enemy_hp.saturating_sub(damage);
        self.note(format!("[{}] takes {damage} damage!", self.enemy.name));
        let finished = self.enemy_hp == 0;
        if finished {
            self.note(format!("[{}] was defeated!", self.enemy.name));
            self.phase = Phase::Victory;
        } else {
            self.phase = Phase::EnemyTurn;
        }
        debug!("player hit for {damage}, enemy at {}", self.enemy_hp);
        Ok(Strike { damage, finished })
    }

    pub fn enemy_attack(&mut self) -> Result<Strike, GameError> {
        self.check_turn(Phase::EnemyTurn)?;
        let damage = enemy_damage(self.enemy.attack, self.fighter.growth);
        self.player_hp = (self.player_hp - damage as f64).max(0.0);
        self.note(format!("[{}] takes {damage} damage!", self.fighter.name));
        let finished = self.player_hp <= 0.0;
        if finished {
            self.note(format!("[{}] collapsed...", self.fighter.name));
            self.phase = Phase::Defeat;
        } else {
            self.phase = Phase::PlayerTurn;
        }
        debug!("enemy hit for {damage}, player at {}", self.player_hp);
        Ok(Strike { damage, finished })
    }

    /// Computes the reward once the fight is over. Only succeeds once.
    pub fn resolve<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Result<Reward, GameError> {
        let outcome = match self.phase {
            Phase::Victory => Outcome::Victory,
            Phase::Defeat => Outcome::Defeat,
            Phase::Resolved => return Err(GameError::NoAdventure),
            Phase::PlayerTurn | Phase::EnemyTurn => return Err(GameError::OutOfTurn),
        };
        self.phase = Phase::Resolved;
        let reward = compute_reward(outcome, Some(&self.enemy), self.party_ids.clone(), rng);
        info!(
            "adventure resolved: {:?}, xp {}, food {}, tokens {}",
            outcome, reward.xp_gained, reward.food_found, reward.tokens_found
        );
        Ok(reward)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Step {
    PlayerStrike,
    EnemyStrike,
    Payout,
}

/// Presentation delays. They only decide when a step lands, never its result.
#[derive(Clone, Copy, Debug)]
pub struct Pacing {
    pub before_strike: Duration,
    pub after_finish: Duration,
}

impl Default for Pacing {
    fn default() -> Self {
        Self {
            before_strike: Duration::from_millis(700),
            after_finish: Duration::from_millis(1000),
        }
    }
}

/// A battle session plus its pending presentation step.
#[derive(Clone, Debug)]
pub struct Adventure {
    pub session: BattleSession,
    pacing: Pacing,
    pending: Option<(Step, Instant)>,
    reward: Option<Reward>,
}

impl Adventure {
    pub fn new(session: BattleSession, pacing: Pacing) -> Self {
        Self {
            session,
            pacing,
            pending: None,
            reward: None,
        }
    }

    /// True while a strike or the payout is waiting on its delay.
    pub fn is_animating(&self) -> bool {
        self.pending.is_some()
    }

    pub fn reward(&self) -> Option<&Reward> {
        self.reward.as_ref()
    }

    pub fn take_reward(&mut self) -> Option<Reward> {
        self.reward.take()
    }

    /// The player pressed attack. The blow lands after the strike delay.
    pub fn request_attack(&mut self, now: Instant) -> Result<(), GameError> {
        if self.session.phase() == Phase::Resolved {
            return Err(GameError::NoAdventure);
        }
        if self.session.phase() != Phase::PlayerTurn || self.pending.is_some() {
            return Err(GameError::OutOfTurn);
        }
        let line = format!("[{}] attacks!", self.session.fighter.name);
        self.session.note(line);
        self.pending = Some((Step::PlayerStrike, now + self.pacing.before_strike));
        Ok(())
    }

    /// Lands every step whose delay has run out by `now`.
    pub fn update<R: Rng + ?Sized>(&mut self, now: Instant, rng: &mut R) -> Result<(), GameError> {
        while let Some((step, due)) = self.pending {
            if now < due {
                break;
            }
            self.pending = None;
            match step {
                Step::PlayerStrike => {
                    let strike = self.session.player_attack()?;
                    if strike.finished {
                        self.pending = Some((Step::Payout, due + self.pacing.after_finish));
                    } else {
                        let line = format!(
                            "[{}] {} attacks!",
                            self.session.enemy.name, self.session.enemy.glyph
                        );
                        self.session.note(line);
                        self.pending = Some((Step::EnemyStrike, due + self.pacing.before_strike));
                    }
                }
                Step::EnemyStrike => {
                    let strike = self.session.enemy_attack()?;
                    if strike.finished {
                        self.pending = Some((Step::Payout, due + self.pacing.after_finish));
                    }
                }
                Step::Payout => {
                    self.reward = Some(self.session.resolve(rng)?);
                }
            }
        }
        Ok(())
    }
}
