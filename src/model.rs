use chrono::{DateTime, Duration as ChronoDuration, Utc};
use log::warn;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

pub const MAX_HP: f64 = 100.0;
pub const MAX_SATIETY: f64 = 100.0;
pub const MAX_FRIENDSHIP: f64 = 100.0;
pub const MAX_GROWTH: f64 = 100.0;

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Species {
    Duck,
    Bear,
    Hybrid,
}

impl Species {
    /// Species a gacha draw or a "random" drop can produce.
    pub const PRIMARY: [Species; 2] = [Species::Duck, Species::Bear];

    pub fn label(self) -> &'static str {
        match self {
            Species::Duck => "Duck",
            Species::Bear => "Bear",
            Species::Hybrid => "Hybrid",
        }
    }

    pub fn slug(self) -> &'static str {
        match self {
            Species::Duck => "duck",
            Species::Bear => "bear",
            Species::Hybrid => "hybrid",
        }
    }

    pub fn glyph(self) -> char {
        match self {
            Species::Duck => 'D',
            Species::Bear => 'B',
            Species::Hybrid => 'P',
        }
    }

    pub fn lines(self) -> &'static [&'static str] {
        match self {
            Species::Duck => &[
                "Quack!",
                "Hungry, quack...",
                "Play with me, quack!",
                "Nice weather today, quack.",
            ],
            Species::Bear => &[
                "Grrr!",
                "I want honey...",
                "I'll get stronger!",
                "Time for a lazy day.",
            ],
            Species::Hybrid => &[
                "Quack...? Grr?",
                "I feel strange...",
                "I like both!",
                "A whole new world!",
            ],
        }
    }

    pub fn random_primary<R: Rng + ?Sized>(rng: &mut R) -> Species {
        Species::PRIMARY[rng.gen_range(0..Species::PRIMARY.len())]
    }
}

/// Which species a spawn request produces.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SpeciesChoice {
    Random,
    Species(Species),
}

impl SpeciesChoice {
    pub fn resolve<R: Rng + ?Sized>(self, rng: &mut R) -> Species {
        match self {
            SpeciesChoice::Random => Species::random_primary(rng),
            SpeciesChoice::Species(s) => s,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct Vec2 {
    pub x: f64,
    pub y: f64,
}

impl Vec2 {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Pending auto-clear of a speech bubble. At most one per creature; a new
/// one replaces (cancels) the old.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SpeechTimer {
    pub clear_at: DateTime<Utc>,
}

/// Equality covers the persisted fields only; a bubble on screen does not
/// make two otherwise identical creatures differ.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Creature {
    pub id: String,
    pub name: String,
    pub species: Species,
    pub hp: f64,
    pub max_hp: f64,
    pub satiety: f64,
    pub max_satiety: f64,
    pub friendship: f64,
    pub growth: f64,
    pub generation: u32,
    pub pos: Vec2,
    pub target: Vec2,
    pub is_moving: bool,
    #[serde(skip)]
    pub speech: Option<String>,
    #[serde(skip)]
    pub speech_timer: Option<SpeechTimer>,
    pub last_spoke: DateTime<Utc>,
    pub last_fed: DateTime<Utc>,
    pub is_alive: bool,
    pub acquired_at: DateTime<Utc>,
}

impl PartialEq for Creature {
    fn eq(&self, other: &Self) -> bool {
        let Creature {
            id,
            name,
            species,
            hp,
            max_hp,
            satiety,
            max_satiety,
            friendship,
            growth,
            generation,
            pos,
            target,
            is_moving,
            speech: _,
            speech_timer: _,
            last_spoke,
            last_fed,
            is_alive,
            acquired_at,
        } = self;
        *id == other.id
            && *name == other.name
            && *species == other.species
            && *hp == other.hp
            && *max_hp == other.max_hp
            && *satiety == other.satiety
            && *max_satiety == other.max_satiety
            && *friendship == other.friendship
            && *growth == other.growth
            && *generation == other.generation
            && *pos == other.pos
            && *target == other.target
            && *is_moving == other.is_moving
            && *last_spoke == other.last_spoke
            && *last_fed == other.last_fed
            && *is_alive == other.is_alive
            && *acquired_at == other.acquired_at
    }
}

impl Creature {
    pub fn speed(&self) -> f64 {
        1.0 + self.growth / 50.0
    }

    pub fn can_breed(&self, rules: &Rules) -> bool {
        self.is_alive
            && self.growth >= rules.breed_min_growth
            && self.friendship >= rules.breed_min_friendship
    }

    /// Shows `text` and schedules its removal, replacing any earlier timer.
    pub fn say(&mut self, text: &str, now: DateTime<Utc>, shown_for: ChronoDuration) {
        self.speech = Some(text.to_string());
        self.last_spoke = now;
        self.speech_timer = Some(SpeechTimer {
            clear_at: now + shown_for,
        });
    }

    pub fn clear_speech(&mut self) {
        self.speech = None;
        self.speech_timer = None;
    }

    /// Fires the pending clear if it is due. Returns true when a bubble went away.
    pub fn expire_speech(&mut self, now: DateTime<Utc>) -> bool {
        match self.speech_timer {
            Some(t) if now >= t.clear_at => {
                self.clear_speech();
                true
            }
            _ => false,
        }
    }

    /// Pulls every numeric field back into range. Returns true if anything moved.
    pub fn clamp_vitals(&mut self) -> bool {
        let before = (
            self.hp,
            self.max_hp,
            self.satiety,
            self.max_satiety,
            self.friendship,
            self.growth,
            self.generation,
            self.is_alive,
        );
        if self.max_hp.is_nan() || self.max_hp <= 0.0 {
            self.max_hp = MAX_HP;
        }
        if self.max_satiety.is_nan() || self.max_satiety <= 0.0 {
            self.max_satiety = MAX_SATIETY;
        }
        self.hp = clamp_or_zero(self.hp, self.max_hp);
        self.satiety = clamp_or_zero(self.satiety, self.max_satiety);
        self.friendship = clamp_or_zero(self.friendship, MAX_FRIENDSHIP);
        self.growth = clamp_or_zero(self.growth, MAX_GROWTH);
        self.generation = self.generation.max(1);
        if self.hp <= 0.0 {
            self.is_alive = false;
            self.satiety = 0.0;
        }
        before
            != (
                self.hp,
                self.max_hp,
                self.satiety,
                self.max_satiety,
                self.friendship,
                self.growth,
                self.generation,
                self.is_alive,
            )
    }
}

fn clamp_or_zero(v: f64, max: f64) -> f64 {
    if v.is_nan() {
        0.0
    } else {
        v.clamp(0.0, max)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct DiaryEntry {
    pub at: DateTime<Utc>,
    pub text: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct EncyclopediaEntry {
    pub id: String,
    pub name: String,
    pub species: Species,
    pub acquired_at: DateTime<Utc>,
    pub discovered_at: DateTime<Utc>,
}

/// Balancing knobs. Rates are per lifecycle tick.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Rules {
    pub lifecycle_tick_ms: u64,
    pub motion_tick_ms: u64,
    pub autosave_secs: u64,
    pub satiety_decay: f64,
    pub starving_hp_decay: f64,
    pub growth_rate: f64,
    pub conflict_hp_penalty: f64,
    pub talk_interval_secs: i64,
    pub speech_display_secs: i64,
    pub diary_digest_secs: i64,
    pub encyclopedia_threshold: f64,
    pub corpse_grace_hours: i64,
    pub max_living: usize,
    pub feed_satiety: f64,
    pub feed_friendship: f64,
    pub breed_min_growth: f64,
    pub breed_min_friendship: f64,
    pub parent_pick_attempts: u32,
    pub arena_w: f64,
    pub arena_h: f64,
    pub start_food: u32,
    pub start_tokens: u32,
}

impl Default for Rules {
    fn default() -> Self {
        // arena is the 400x667 playfield minus the sprite size and the button bar
        Self {
            lifecycle_tick_ms: 1000,
            motion_tick_ms: 60,
            autosave_secs: 60,
            satiety_decay: 0.2,
            starving_hp_decay: 0.1,
            growth_rate: 0.05,
            conflict_hp_penalty: 0.1,
            talk_interval_secs: 30,
            speech_display_secs: 5,
            diary_digest_secs: 120,
            encyclopedia_threshold: 80.0,
            corpse_grace_hours: 24,
            max_living: 10,
            feed_satiety: 20.0,
            feed_friendship: 5.0,
            breed_min_growth: 50.0,
            breed_min_friendship: 50.0,
            parent_pick_attempts: 20,
            arena_w: 400.0 - 40.0,
            arena_h: 667.0 - 40.0 - 150.0,
            start_food: 10,
            start_tokens: 3,
        }
    }
}

impl Rules {
    pub fn random_spot<R: Rng + ?Sized>(&self, rng: &mut R) -> Vec2 {
        Vec2::new(
            rng.gen::<f64>() * self.arena_w,
            rng.gen::<f64>() * self.arena_h,
        )
    }
}

fn default_food() -> u32 {
    10
}

fn default_tokens() -> u32 {
    3
}

fn default_true() -> bool {
    true
}

/// Everything that is persisted for one player.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct FullState {
    #[serde(default)]
    pub roster: Vec<Creature>,
    #[serde(default = "default_food")]
    pub food: u32,
    #[serde(default = "default_tokens")]
    pub tokens: u32,
    #[serde(default)]
    pub diary: Vec<DiaryEntry>,
    #[serde(default)]
    pub encyclopedia: Vec<EncyclopediaEntry>,
    #[serde(default = "default_true")]
    pub bgm_on: bool,
    #[serde(default = "Utc::now")]
    pub last_diary_at: DateTime<Utc>,
}

impl FullState {
    pub fn empty(now: DateTime<Utc>) -> Self {
        Self {
            roster: Vec::new(),
            food: default_food(),
            tokens: default_tokens(),
            diary: Vec::new(),
            encyclopedia: Vec::new(),
            bgm_on: true,
            last_diary_at: now,
        }
    }

    pub fn living_count(&self) -> usize {
        self.roster.iter().filter(|c| c.is_alive).count()
    }

    pub fn creature(&self, id: &str) -> Option<&Creature> {
        self.roster.iter().find(|c| c.id == id)
    }

    pub fn creature_mut(&mut self, id: &str) -> Option<&mut Creature> {
        self.roster.iter_mut().find(|c| c.id == id)
    }

    pub fn in_encyclopedia(&self, id: &str) -> bool {
        self.encyclopedia.iter().any(|e| e.id == id)
    }

    /// True if `id` names a creature in the den or one the encyclopedia
    /// remembers. Pruned corpses live on there, so their ids stay taken.
    pub fn id_in_use(&self, id: &str) -> bool {
        self.roster.iter().any(|c| c.id == id) || self.in_encyclopedia(id)
    }

    pub fn log(&mut self, at: DateTime<Utc>, text: impl Into<String>) {
        self.diary.push(DiaryEntry {
            at,
            text: text.into(),
        });
    }

    /// Repairs data written by older or buggy builds instead of failing the load.
    /// Returns how many records were touched.
    pub fn sanitize(&mut self) -> usize {
        let mut fixed = 0;

        let mut seen = HashSet::new();
        let before = self.roster.len();
        self.roster.retain(|c| seen.insert(c.id.clone()));
        fixed += before - self.roster.len();

        for c in &mut self.roster {
            if c.clamp_vitals() {
                warn!("clamped out-of-range vitals on {}", c.id);
                fixed += 1;
            }
        }

        let mut seen = HashSet::new();
        let before = self.encyclopedia.len();
        self.encyclopedia.retain(|e| seen.insert(e.id.clone()));
        fixed += before - self.encyclopedia.len();

        if fixed > 0 {
            warn!("repaired {fixed} record(s) in loaded save");
        }
        fixed
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::TimeZone;

    pub(crate) fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 1, 12, 0, 0).unwrap()
    }

    pub(crate) fn creature(id: &str, species: Species, now: DateTime<Utc>) -> Creature {
        Creature {
            id: id.to_string(),
            name: format!("{} #{id}", species.label()),
            species,
            hp: MAX_HP,
            max_hp: MAX_HP,
            satiety: 50.0,
            max_satiety: MAX_SATIETY,
            friendship: 50.0,
            growth: 50.0,
            generation: 1,
            pos: Vec2::new(10.0, 10.0),
            target: Vec2::new(100.0, 100.0),
            is_moving: true,
            speech: None,
            speech_timer: None,
            last_spoke: now,
            last_fed: now,
            is_alive: true,
            acquired_at: now,
        }
    }

    #[test]
    fn say_replaces_the_pending_clear() {
        let now = t0();
        let mut c = creature("duck-0001", Species::Duck, now);
        c.say("Quack!", now, ChronoDuration::seconds(5));
        c.say("Grr", now + ChronoDuration::seconds(3), ChronoDuration::seconds(5));

        assert!(!c.expire_speech(now + ChronoDuration::seconds(6)));
        assert_eq!(c.speech.as_deref(), Some("Grr"));
        assert!(c.expire_speech(now + ChronoDuration::seconds(8)));
        assert!(c.speech.is_none() && c.speech_timer.is_none());
    }

    #[test]
    fn sanitize_clamps_and_kills_zero_hp() {
        let now = t0();
        let mut st = FullState::empty(now);
        let mut bad = creature("bear-0001", Species::Bear, now);
        bad.hp = -3.0;
        bad.satiety = 250.0;
        bad.friendship = f64::NAN;
        st.roster.push(bad);
        st.roster.push(creature("bear-0001", Species::Bear, now));

        assert!(st.sanitize() >= 2);
        assert_eq!(st.roster.len(), 1);
        let c = &st.roster[0];
        assert_eq!(c.hp, 0.0);
        assert_eq!(c.satiety, 0.0);
        assert_eq!(c.friendship, 0.0);
        assert!(!c.is_alive);
    }

    #[test]
    fn missing_fields_take_defaults() {
        let st: FullState = serde_json::from_str("{}").unwrap();
        assert_eq!(st.food, 10);
        assert_eq!(st.tokens, 3);
        assert!(st.bgm_on);
        assert!(st.roster.is_empty() && st.diary.is_empty() && st.encyclopedia.is_empty());
    }

    #[test]
    fn species_choice_reads_random_or_exact() {
        let r: SpeciesChoice = serde_json::from_str("\"random\"").unwrap();
        assert_eq!(r, SpeciesChoice::Random);
        let e: SpeciesChoice = serde_json::from_str("{\"species\":\"bear\"}").unwrap();
        assert_eq!(e, SpeciesChoice::Species(Species::Bear));
    }
}
