use crate::error::GameError;
use crate::model::{Creature, FullState, Rules, Species, MAX_HP, MAX_SATIETY};
use chrono::{DateTime, Utc};
use log::{debug, info};
use rand::Rng;

const SUFFIX_TRIES: usize = 64;

/// Builds a creature with starter stats at a random spot in the arena.
///
/// The id is `<species>-<suffix>`. When no suffix is given a random
/// four-digit hex tag is drawn until it names no creature `den` has ever
/// held.
pub fn new_creature<R: Rng + ?Sized>(
    species: Species,
    suffix: Option<&str>,
    generation: u32,
    den: &FullState,
    rules: &Rules,
    rng: &mut R,
    now: DateTime<Utc>,
) -> Creature {
    let suffix = match suffix {
        Some(s) => s.to_string(),
        None => fresh_suffix(species, den, rng),
    };
    let pos = rules.random_spot(rng);
    let target = rules.random_spot(rng);
    Creature {
        id: format!("{}-{}", species.slug(), suffix),
        name: format!("{} #{}", species.label(), suffix),
        species,
        hp: MAX_HP,
        max_hp: MAX_HP,
        satiety: MAX_SATIETY / 2.0,
        max_satiety: MAX_SATIETY,
        friendship: 50.0,
        growth: 50.0,
        generation: generation.max(1),
        pos,
        target,
        is_moving: true,
        speech: None,
        speech_timer: None,
        last_spoke: now,
        last_fed: now,
        is_alive: true,
        acquired_at: now,
    }
}

fn fresh_suffix<R: Rng + ?Sized>(species: Species, den: &FullState, rng: &mut R) -> String {
    let taken = |s: &str| den.id_in_use(&format!("{}-{}", species.slug(), s));
    for _ in 0..SUFFIX_TRIES {
        let s = format!("{:04x}", rng.gen::<u16>());
        if !taken(&s) {
            return s;
        }
    }
    // the random source keeps colliding; walk the tag space instead
    let mut n: u32 = 0;
    loop {
        let s = format!("{n:04x}");
        if !taken(&s) {
            return s;
        }
        n += 1;
    }
}

/// Duck + Duck stays Duck, Bear + Bear stays Bear, anything else is Hybrid.
pub fn offspring_species(a: Species, b: Species) -> Species {
    match (a, b) {
        (Species::Duck, Species::Duck) => Species::Duck,
        (Species::Bear, Species::Bear) => Species::Bear,
        _ => Species::Hybrid,
    }
}

/// Picks two distinct roster indices out of `eligible`.
///
/// Random picks retry up to `attempts` times on a self-pairing, then fall
/// back to the first eligible creature and the next distinct one.
fn pick_parents<R: Rng + ?Sized>(
    eligible: &[usize],
    attempts: u32,
    rng: &mut R,
) -> Option<(usize, usize)> {
    if eligible.len() < 2 {
        return None;
    }
    let first = eligible[rng.gen_range(0..eligible.len())];
    let mut second = eligible[rng.gen_range(0..eligible.len())];
    let mut tries = 0;
    while first == second && tries < attempts {
        second = eligible[rng.gen_range(0..eligible.len())];
        tries += 1;
    }
    if first != second {
        return Some((first, second));
    }
    debug!("parent pick kept colliding after {tries} tries, using fallback pair");
    let first = eligible[0];
    eligible
        .iter()
        .copied()
        .find(|&i| i != first)
        .map(|second| (first, second))
}

impl FullState {
    /// Appends a new creature if the living cap allows it.
    pub fn adopt<R: Rng + ?Sized>(
        &mut self,
        species: Species,
        generation: u32,
        rules: &Rules,
        rng: &mut R,
        now: DateTime<Utc>,
    ) -> Result<Creature, GameError> {
        if self.living_count() >= rules.max_living {
            return Err(GameError::RosterFull {
                max: rules.max_living,
            });
        }
        let c = new_creature(species, None, generation, self, rules, rng, now);
        self.roster.push(c.clone());
        Ok(c)
    }

    /// Spends one token on a random Duck or Bear.
    pub fn gacha_draw<R: Rng + ?Sized>(
        &mut self,
        rules: &Rules,
        rng: &mut R,
        now: DateTime<Utc>,
    ) -> Result<Creature, GameError> {
        if self.tokens == 0 {
            return Err(GameError::InsufficientTokens);
        }
        let species = Species::random_primary(rng);
        let c = self.adopt(species, 1, rules, rng, now)?;
        self.tokens -= 1;
        self.log(now, format!("{} arrived from the gacha!", c.name));
        info!("gacha produced {} ({} tokens left)", c.id, self.tokens);
        Ok(c)
    }

    pub fn breed<R: Rng + ?Sized>(
        &mut self,
        rules: &Rules,
        rng: &mut R,
        now: DateTime<Utc>,
    ) -> Result<Creature, GameError> {
        let eligible: Vec<usize> = self
            .roster
            .iter()
            .enumerate()
            .filter(|(_, c)| c.can_breed(rules))
            .map(|(i, _)| i)
            .collect();
        if eligible.len() < 2 {
            return Err(GameError::NotEnoughParents);
        }
        if self.living_count() >= rules.max_living {
            return Err(GameError::RosterFull {
                max: rules.max_living,
            });
        }

        let (a, b) = pick_parents(&eligible, rules.parent_pick_attempts, rng)
            .ok_or(GameError::NotEnoughParents)?;
        let (pa, pb) = (&self.roster[a], &self.roster[b]);
        let species = offspring_species(pa.species, pb.species);
        let generation = pa.generation.max(pb.generation) + 1;
        let parents = (pa.name.clone(), pb.name.clone());

        let child = self.adopt(species, generation, rules, rng, now)?;
        self.log(
            now,
            format!(
                "{} and {} welcomed a new life, {}! (generation {})",
                parents.0, parents.1, child.name, generation
            ),
        );
        info!(
            "bred {} from {} x {} (gen {generation})",
            child.id, self.roster[a].id, self.roster[b].id
        );
        Ok(child)
    }
}

/// Starting den: one Duck, one Bear, the default purse and a first diary line.
pub fn starter_state<R: Rng + ?Sized>(rules: &Rules, rng: &mut R, now: DateTime<Utc>) -> FullState {
    let mut st = FullState::empty(now);
    st.food = rules.start_food;
    st.tokens = rules.start_tokens;
    let duck = new_creature(Species::Duck, Some("001"), 1, &st, rules, rng, now);
    st.roster.push(duck);
    let bear = new_creature(Species::Bear, Some("002"), 1, &st, rules, rng, now);
    st.roster.push(bear);
    st.log(now, "A new adventure begins!");
    st
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::tests::{creature, t0};
    use chrono::Duration as ChronoDuration;
    use rand::rngs::mock::StepRng;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::collections::HashSet;

    fn den(n: usize) -> FullState {
        let now = t0();
        let mut st = FullState::empty(now);
        for i in 0..n {
            let sp = if i % 2 == 0 { Species::Duck } else { Species::Bear };
            st.roster.push(creature(&format!("c{i}"), sp, now));
        }
        st
    }

    #[test]
    fn gacha_needs_a_token() {
        let mut st = den(1);
        st.tokens = 0;
        let mut rng = StdRng::seed_from_u64(1);
        let err = st.gacha_draw(&Rules::default(), &mut rng, t0()).unwrap_err();
        assert_eq!(err, GameError::InsufficientTokens);
        assert_eq!(st.roster.len(), 1);
    }

    #[test]
    fn gacha_refuses_a_full_den_without_spending() {
        let mut st = den(10);
        st.tokens = 2;
        let mut rng = StdRng::seed_from_u64(2);
        let err = st.gacha_draw(&Rules::default(), &mut rng, t0()).unwrap_err();
        assert_eq!(err, GameError::RosterFull { max: 10 });
        assert_eq!(st.tokens, 2);
    }

    #[test]
    fn gacha_spends_one_token_and_logs() {
        let mut st = den(0);
        st.tokens = 3;
        let mut rng = StdRng::seed_from_u64(3);
        let c = st.gacha_draw(&Rules::default(), &mut rng, t0()).unwrap();
        assert_eq!(st.tokens, 2);
        assert_eq!(c.generation, 1);
        assert!(Species::PRIMARY.contains(&c.species));
        assert_eq!(st.roster.len(), 1);
        assert!(st.diary.last().unwrap().text.contains(&c.name));
    }

    #[test]
    fn dead_creatures_do_not_count_towards_the_cap() {
        let mut st = den(10);
        st.roster[0].is_alive = false;
        st.roster[0].hp = 0.0;
        let mut rng = StdRng::seed_from_u64(4);
        assert!(st.gacha_draw(&Rules::default(), &mut rng, t0()).is_ok());
        assert_eq!(st.living_count(), 10);
    }

    #[test]
    fn breeding_needs_two_eligible_parents() {
        let rules = Rules::default();
        let mut rng = StdRng::seed_from_u64(5);
        let mut st = den(3);
        st.roster[1].growth = 49.9;
        st.roster[2].friendship = 10.0;
        assert_eq!(
            st.breed(&rules, &mut rng, t0()).unwrap_err(),
            GameError::NotEnoughParents
        );

        let mut st = den(2);
        st.roster[1].is_alive = false;
        st.roster[1].hp = 0.0;
        assert_eq!(
            st.breed(&rules, &mut rng, t0()).unwrap_err(),
            GameError::NotEnoughParents
        );
    }

    #[test]
    fn breeding_respects_the_cap() {
        let mut st = den(10);
        let mut rng = StdRng::seed_from_u64(6);
        assert_eq!(
            st.breed(&Rules::default(), &mut rng, t0()).unwrap_err(),
            GameError::RosterFull { max: 10 }
        );
        assert_eq!(st.roster.len(), 10);
    }

    #[test]
    fn stuck_random_source_still_yields_distinct_parents() {
        // StepRng(0, 0) always picks index 0, so every random pair collides
        let mut st = den(0);
        let now = t0();
        let mut a = creature("a", Species::Duck, now);
        a.generation = 3;
        let mut b = creature("b", Species::Duck, now);
        b.generation = 1;
        st.roster.push(a);
        st.roster.push(b);

        let mut rng = StepRng::new(0, 0);
        let child = st.breed(&Rules::default(), &mut rng, now).unwrap();
        assert_eq!(child.species, Species::Duck);
        assert_eq!(child.generation, 4);
        assert!(st.diary.last().unwrap().text.contains("Duck #a"));
        assert!(st.diary.last().unwrap().text.contains("Duck #b"));
    }

    #[test]
    fn offspring_species_table() {
        use Species::*;
        assert_eq!(offspring_species(Duck, Duck), Duck);
        assert_eq!(offspring_species(Bear, Bear), Bear);
        assert_eq!(offspring_species(Duck, Bear), Hybrid);
        assert_eq!(offspring_species(Hybrid, Duck), Hybrid);
        assert_eq!(offspring_species(Hybrid, Hybrid), Hybrid);
    }

    #[test]
    fn mixed_pair_makes_a_hybrid_one_generation_down() {
        let mut st = den(2);
        st.roster[1].generation = 2;
        let mut rng = StdRng::seed_from_u64(7);
        let child = st.breed(&Rules::default(), &mut rng, t0()).unwrap();
        assert_eq!(child.species, Species::Hybrid);
        assert_eq!(child.generation, 3);
        assert_eq!(st.roster.len(), 3);
    }

    #[test]
    fn ids_stay_unique_even_when_tags_collide() {
        let rules = Rules::default();
        let mut st = den(0);
        let mut rng = StepRng::new(0, 0);
        for _ in 0..5 {
            st.adopt(Species::Duck, 1, &rules, &mut rng, t0()).unwrap();
        }
        let ids: HashSet<_> = st.roster.iter().map(|c| c.id.clone()).collect();
        assert_eq!(ids.len(), 5);
    }

    #[test]
    fn pruned_ids_are_not_handed_out_again() {
        let rules = Rules::default();
        let now = t0();
        let mut st = den(0);
        let mut rng = StepRng::new(0, 0);

        let first = st.adopt(Species::Duck, 1, &rules, &mut rng, now).unwrap();
        st.roster[0].friendship = 90.0;
        st.tick_lifecycle(&rules, &mut rng, now + ChronoDuration::seconds(1), false);
        assert!(st.in_encyclopedia(&first.id));

        st.roster[0].is_alive = false;
        st.roster[0].hp = 0.0;
        let r = st.tick_lifecycle(&rules, &mut rng, now + ChronoDuration::hours(25), false);
        assert_eq!(r.pruned, 1);
        assert!(st.roster.is_empty());

        let later = now + ChronoDuration::hours(26);
        let second = st.adopt(Species::Duck, 1, &rules, &mut rng, later).unwrap();
        assert_ne!(second.id, first.id);

        st.roster[0].friendship = 90.0;
        let r = st.tick_lifecycle(&rules, &mut rng, later + ChronoDuration::seconds(1), false);
        assert_eq!(r.unlocked, [second.id.clone()]);
        assert_eq!(st.encyclopedia.len(), 2);
    }

    #[test]
    fn starter_den_has_a_duck_and_a_bear() {
        let mut rng = StdRng::seed_from_u64(8);
        let st = starter_state(&Rules::default(), &mut rng, t0());
        let ids: Vec<_> = st.roster.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, ["duck-001", "bear-002"]);
        assert_eq!((st.food, st.tokens), (10, 3));
        assert_eq!(st.diary.len(), 1);
        for c in &st.roster {
            assert!(c.pos.x >= 0.0 && c.pos.x <= Rules::default().arena_w);
            assert!(c.pos.y >= 0.0 && c.pos.y <= Rules::default().arena_h);
        }
    }
}
