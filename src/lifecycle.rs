use crate::model::{Creature, DiaryEntry, EncyclopediaEntry, FullState, Rules, MAX_GROWTH};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use log::{debug, info};
use rand::Rng;

/// What one lifecycle tick changed. Callers use the flags to decide
/// whether the diary or encyclopedia need persisting or redrawing.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TickReport {
    pub deaths: Vec<String>,
    pub unlocked: Vec<String>,
    pub spoke: Vec<String>,
    /// Ids of the starving creatures that fought this tick (empty if no conflict).
    pub conflict: Vec<String>,
    pub pruned: usize,
    pub diary_changed: bool,
    pub encyclopedia_changed: bool,
}

fn die(c: &mut Creature, diary: &mut Vec<DiaryEntry>, report: &mut TickReport, now: DateTime<Utc>) {
    c.is_alive = false;
    c.hp = 0.0;
    c.satiety = 0.0;
    c.clear_speech();
    diary.push(DiaryEntry {
        at: now,
        text: format!("{} has become a star...", c.name),
    });
    report.deaths.push(c.id.clone());
    report.diary_changed = true;
    info!("{} died", c.id);
}

fn step_toward(v: f64, target: f64, speed: f64) -> f64 {
    if v < target {
        (v + speed).min(target)
    } else if v > target {
        (v - speed).max(target)
    } else {
        v
    }
}

impl FullState {
    /// One pass of the slow simulation clock: hunger, starvation, growth,
    /// chatter, death, encyclopedia unlocks, squabbles and corpse cleanup.
    ///
    /// `in_conflict` says whether the previous tick ended with a squabble;
    /// the diary only notes a squabble when one starts.
    pub fn tick_lifecycle<R: Rng + ?Sized>(
        &mut self,
        rules: &Rules,
        rng: &mut R,
        now: DateTime<Utc>,
        in_conflict: bool,
    ) -> TickReport {
        let mut report = TickReport::default();
        let talk_interval = ChronoDuration::seconds(rules.talk_interval_secs);
        let shown_for = ChronoDuration::seconds(rules.speech_display_secs);

        let FullState {
            roster,
            diary,
            encyclopedia,
            ..
        } = self;

        let mut starving = Vec::new();

        for (i, c) in roster.iter_mut().enumerate() {
            if !c.is_alive {
                continue;
            }

            c.satiety = (c.satiety - rules.satiety_decay).max(0.0);
            let mut hungry = false;
            if c.satiety <= 0.0 {
                c.satiety = 0.0;
                c.hp = (c.hp - rules.starving_hp_decay).max(0.0);
                hungry = c.hp > 0.0;
            }
            c.growth = (c.growth + rules.growth_rate).min(MAX_GROWTH);

            if c.hp <= 0.0 {
                die(c, diary, &mut report, now);
                continue;
            }
            if hungry {
                starving.push(i);
            }

            if now - c.last_spoke > talk_interval && c.speech.is_none() {
                let lines = c.species.lines();
                let line = lines[rng.gen_range(0..lines.len())];
                c.say(line, now, shown_for);
                report.spoke.push(c.id.clone());
            }

            if c.friendship >= rules.encyclopedia_threshold
                && !encyclopedia.iter().any(|e| e.id == c.id)
            {
                encyclopedia.push(EncyclopediaEntry {
                    id: c.id.clone(),
                    name: c.name.clone(),
                    species: c.species,
                    acquired_at: c.acquired_at,
                    discovered_at: now,
                });
                diary.push(DiaryEntry {
                    at: now,
                    text: format!(
                        "Our bond with {} grew deep; it is now in the encyclopedia!",
                        c.name
                    ),
                });
                report.unlocked.push(c.id.clone());
                report.diary_changed = true;
                report.encyclopedia_changed = true;
                info!("{} unlocked in the encyclopedia", c.id);
            }
        }

        if starving.len() >= 2 {
            let mut names = Vec::with_capacity(starving.len());
            for &i in &starving {
                let c = &mut roster[i];
                names.push(c.name.clone());
                report.conflict.push(c.id.clone());
                c.hp = (c.hp - rules.conflict_hp_penalty).max(0.0);
                if c.hp <= 0.0 {
                    die(c, diary, &mut report, now);
                }
            }
            if !in_conflict {
                diary.push(DiaryEntry {
                    at: now,
                    text: format!("{} squabbled over scraps of food.", names.join(", ")),
                });
                report.diary_changed = true;
            }
            debug!("starvation squabble among {:?}", report.conflict);
        }

        let grace = ChronoDuration::hours(rules.corpse_grace_hours);
        let before = roster.len();
        roster.retain(|c| c.is_alive || now - c.acquired_at <= grace);
        report.pruned = before - roster.len();
        if report.pruned > 0 {
            debug!("pruned {} old corpse(s)", report.pruned);
        }

        if now - self.last_diary_at > ChronoDuration::seconds(rules.diary_digest_secs) {
            let text = format!(
                "Den report: {} living, {} food, {} tokens.",
                self.living_count(),
                self.food,
                self.tokens
            );
            self.log(now, text);
            self.last_diary_at = now;
            report.diary_changed = true;
        }

        report
    }

    /// One pass of the fast clock: wanderers step toward their target and
    /// pick a new one on arrival. Never touches vitals.
    pub fn tick_motion<R: Rng + ?Sized>(&mut self, rules: &Rules, rng: &mut R) {
        for c in self
            .roster
            .iter_mut()
            .filter(|c| c.is_alive && c.is_moving)
        {
            let speed = c.speed();
            if (c.pos.x - c.target.x).abs() < speed && (c.pos.y - c.target.y).abs() < speed {
                c.target = rules.random_spot(rng);
            } else {
                c.pos.x = step_toward(c.pos.x, c.target.x, speed);
                c.pos.y = step_toward(c.pos.y, c.target.y, speed);
            }
        }
    }

    /// Fires due speech-clear timers. Returns how many bubbles went away.
    pub fn expire_speech(&mut self, now: DateTime<Utc>) -> usize {
        let mut cleared = 0;
        for c in &mut self.roster {
            if c.expire_speech(now) {
                cleared += 1;
            }
        }
        cleared
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::tests::{creature, t0};
    use crate::model::{Species, Vec2, MAX_HP, MAX_SATIETY};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn secs(n: i64) -> ChronoDuration {
        ChronoDuration::seconds(n)
    }

    fn one(c: Creature) -> FullState {
        let mut st = FullState::empty(c.acquired_at);
        st.roster.push(c);
        st
    }

    #[test]
    fn vitals_stay_in_range_over_long_runs() {
        let now = t0();
        let mut rng = StdRng::seed_from_u64(11);
        let rules = Rules::default();
        let mut st = FullState::empty(now);
        for i in 0..6 {
            let mut c = creature(&format!("c{i}"), Species::Duck, now);
            c.satiety = rng.gen_range(0.0..MAX_SATIETY);
            c.hp = rng.gen_range(0.5..MAX_HP);
            c.growth = rng.gen_range(0.0..100.0);
            c.friendship = rng.gen_range(0.0..100.0);
            st.roster.push(c);
        }
        let mut conflict = false;
        for t in 1..=3000 {
            let r = st.tick_lifecycle(&rules, &mut rng, now + secs(t), conflict);
            conflict = !r.conflict.is_empty();
            for c in &st.roster {
                assert!((0.0..=c.max_hp).contains(&c.hp));
                assert!((0.0..=c.max_satiety).contains(&c.satiety));
                assert!((0.0..=100.0).contains(&c.growth));
                assert!((0.0..=100.0).contains(&c.friendship));
                assert!(c.is_alive || c.hp == 0.0);
            }
        }
    }

    #[test]
    fn starving_creature_dies_exactly_once() {
        let now = t0();
        let mut c = creature("duck-0001", Species::Duck, now);
        c.satiety = 0.0;
        c.hp = 0.05;
        let mut st = one(c);
        let mut rng = StdRng::seed_from_u64(12);
        let rules = Rules::default();

        let r = st.tick_lifecycle(&rules, &mut rng, now + secs(1), false);
        assert_eq!(r.deaths, ["duck-0001"]);
        assert!(r.diary_changed);
        for t in 2..10 {
            let r = st.tick_lifecycle(&rules, &mut rng, now + secs(t), false);
            assert!(r.deaths.is_empty());
        }
        let c = &st.roster[0];
        assert!(!c.is_alive);
        assert_eq!((c.hp, c.satiety), (0.0, 0.0));
        let deaths = st.diary.iter().filter(|d| d.text.contains("star")).count();
        assert_eq!(deaths, 1);
    }

    #[test]
    fn death_cancels_pending_speech() {
        let now = t0();
        let mut c = creature("bear-0001", Species::Bear, now);
        c.say("Grrr!", now, secs(5));
        c.satiety = 0.0;
        c.hp = 0.1;
        let mut st = one(c);
        let mut rng = StdRng::seed_from_u64(13);
        st.tick_lifecycle(&Rules::default(), &mut rng, now + secs(1), false);
        assert!(st.roster[0].speech.is_none());
        assert!(st.roster[0].speech_timer.is_none());
    }

    #[test]
    fn encyclopedia_unlocks_once_per_creature() {
        let now = t0();
        let mut st = one(creature("duck-0001", Species::Duck, now));
        let mut rng = StdRng::seed_from_u64(14);
        let rules = Rules::default();
        for t in 1..20 {
            st.roster[0].friendship = if t % 2 == 0 { 85.0 } else { 60.0 };
            st.roster[0].satiety = 50.0;
            st.tick_lifecycle(&rules, &mut rng, now + secs(t), false);
        }
        assert_eq!(st.encyclopedia.len(), 1);
        assert_eq!(st.encyclopedia[0].id, "duck-0001");
        assert_eq!(st.encyclopedia[0].discovered_at, now + secs(2));
        let notes = st.diary.iter().filter(|d| d.text.contains("encyclopedia")).count();
        assert_eq!(notes, 1);
    }

    #[test]
    fn speech_waits_for_the_interval_and_a_clear_bubble() {
        let now = t0();
        let mut st = one(creature("duck-0001", Species::Duck, now));
        let mut rng = StdRng::seed_from_u64(15);
        let rules = Rules::default();

        let r = st.tick_lifecycle(&rules, &mut rng, now + secs(30), false);
        assert!(r.spoke.is_empty());

        let r = st.tick_lifecycle(&rules, &mut rng, now + secs(31), false);
        assert_eq!(r.spoke, ["duck-0001"]);
        let said = st.roster[0].speech.clone().unwrap();
        assert!(Species::Duck.lines().contains(&said.as_str()));
        assert_eq!(
            st.roster[0].speech_timer.unwrap().clear_at,
            now + secs(36)
        );

        assert_eq!(st.expire_speech(now + secs(35)), 0);
        assert_eq!(st.expire_speech(now + secs(36)), 1);
        assert!(st.roster[0].speech.is_none());

        // last_spoke moved, so the next line waits another interval
        let r = st.tick_lifecycle(&rules, &mut rng, now + secs(50), false);
        assert!(r.spoke.is_empty());
    }

    #[test]
    fn two_starving_creatures_squabble() {
        let now = t0();
        let mut st = FullState::empty(now);
        for id in ["a", "b"] {
            let mut c = creature(id, Species::Bear, now);
            c.satiety = 0.0;
            st.roster.push(c);
        }
        let rules = Rules::default();
        let mut rng = StdRng::seed_from_u64(16);

        let r = st.tick_lifecycle(&rules, &mut rng, now + secs(1), false);
        assert_eq!(r.conflict, ["a", "b"]);
        let expected = MAX_HP - rules.starving_hp_decay - rules.conflict_hp_penalty;
        assert!((st.roster[0].hp - expected).abs() < 1e-9);
        let notes = st.diary.iter().filter(|d| d.text.contains("squabbled")).count();
        assert_eq!(notes, 1);

        st.tick_lifecycle(&rules, &mut rng, now + secs(2), true);
        let notes = st.diary.iter().filter(|d| d.text.contains("squabbled")).count();
        assert_eq!(notes, 1);
    }

    #[test]
    fn a_lone_starving_creature_does_not_squabble() {
        let now = t0();
        let mut st = FullState::empty(now);
        let mut hungry = creature("a", Species::Duck, now);
        hungry.satiety = 0.0;
        st.roster.push(hungry);
        st.roster.push(creature("b", Species::Duck, now));
        let mut rng = StdRng::seed_from_u64(17);
        let r = st.tick_lifecycle(&Rules::default(), &mut rng, now + secs(1), false);
        assert!(r.conflict.is_empty());
    }

    #[test]
    fn old_corpses_are_pruned_and_recent_ones_kept() {
        let now = t0();
        let mut st = FullState::empty(now);
        let mut old_dead = creature("old", Species::Duck, now - ChronoDuration::hours(25));
        old_dead.is_alive = false;
        old_dead.hp = 0.0;
        let mut fresh_dead = creature("fresh", Species::Duck, now - ChronoDuration::hours(1));
        fresh_dead.is_alive = false;
        fresh_dead.hp = 0.0;
        let old_alive = creature("elder", Species::Bear, now - ChronoDuration::hours(90));
        st.roster.extend([old_dead, fresh_dead, old_alive]);

        let mut rng = StdRng::seed_from_u64(18);
        let r = st.tick_lifecycle(&Rules::default(), &mut rng, now, false);
        assert_eq!(r.pruned, 1);
        let ids: Vec<_> = st.roster.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, ["fresh", "elder"]);
    }

    #[test]
    fn digest_is_written_every_couple_of_minutes() {
        let now = t0();
        let mut st = one(creature("a", Species::Duck, now));
        let mut rng = StdRng::seed_from_u64(19);
        let rules = Rules::default();
        let r = st.tick_lifecycle(&rules, &mut rng, now + secs(120), false);
        assert!(!r.diary_changed);
        let r = st.tick_lifecycle(&rules, &mut rng, now + secs(121), false);
        assert!(r.diary_changed);
        assert!(st.diary.last().unwrap().text.starts_with("Den report: 1 living"));
        assert_eq!(st.last_diary_at, now + secs(121));
    }

    #[test]
    fn quiet_tick_reports_nothing() {
        let now = t0();
        let mut st = one(creature("a", Species::Duck, now));
        let mut rng = StdRng::seed_from_u64(20);
        let r = st.tick_lifecycle(&Rules::default(), &mut rng, now + secs(1), false);
        assert_eq!(r, TickReport::default());
        let c = &st.roster[0];
        assert!((c.satiety - 49.8).abs() < 1e-9);
        assert!((c.growth - 50.05).abs() < 1e-9);
    }

    #[test]
    fn motion_steps_at_growth_speed_then_retargets() {
        let now = t0();
        let mut c = creature("a", Species::Duck, now);
        c.growth = 50.0;
        c.pos = Vec2::new(0.0, 0.0);
        c.target = Vec2::new(5.0, 1.0);
        let mut st = one(c);
        let rules = Rules::default();
        let mut rng = StdRng::seed_from_u64(21);

        st.tick_motion(&rules, &mut rng);
        assert_eq!(st.roster[0].pos, Vec2::new(2.0, 1.0));
        st.tick_motion(&rules, &mut rng);
        assert_eq!(st.roster[0].pos, Vec2::new(4.0, 1.0));
        st.tick_motion(&rules, &mut rng);
        assert_eq!(st.roster[0].pos, Vec2::new(4.0, 1.0));
        assert_ne!(st.roster[0].target, Vec2::new(5.0, 1.0));
        let t = st.roster[0].target;
        assert!(t.x >= 0.0 && t.x <= rules.arena_w && t.y >= 0.0 && t.y <= rules.arena_h);
    }

    #[test]
    fn dead_or_resting_creatures_do_not_move() {
        let now = t0();
        let mut dead = creature("a", Species::Duck, now);
        dead.is_alive = false;
        dead.pos = Vec2::new(0.0, 0.0);
        let mut resting = creature("b", Species::Bear, now);
        resting.is_moving = false;
        resting.pos = Vec2::new(0.0, 0.0);
        let mut st = FullState::empty(now);
        st.roster.extend([dead, resting]);
        let mut rng = StdRng::seed_from_u64(22);
        st.tick_motion(&Rules::default(), &mut rng);
        assert!(st.roster.iter().all(|c| c.pos == Vec2::new(0.0, 0.0)));
    }
}
