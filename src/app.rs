use crate::audio::BgmController;
use crate::battle::EnemyCatalog;
use crate::config::{
    init_logging, load_enemy_catalog, load_settings, project_paths, save_settings_atomic, Paths,
    Settings,
};
use crate::error::GameError;
use crate::game::{GameState, Notice};
use crate::identity::{resolve_key, Identity};
use crate::input::{collect_input_nonblocking, map_event_to_action, Action};
use crate::model::{FullState, Rules};
use crate::render::{
    draw_adventure, draw_center_box, draw_den, draw_diary, draw_encyclopedia, draw_notice,
    draw_text, help_line, Terminal, HELP_TEXT,
};
use crate::storage::{load_game, new_game, save_game, FileStore};
use chrono::Utc;
use crossterm::style::Color;
use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::time::{Duration, Instant};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Scene {
    /// Waiting on the identity or the first load.
    Loading,
    /// No save exists for this player.
    Start,
    /// Loading failed; offer another try.
    Retry,
    Den,
    Adventure,
    Diary,
    Encyclopedia,
    Help,
}

pub struct App {
    settings: Settings,
    paths: Paths,
    rules: Rules,
    catalog: EnemyCatalog,
    store: FileStore,
    identity: Identity,
    rng: StdRng,
    term: Terminal,
    game: Option<GameState>,
    scene: Scene,
    notice: Option<Notice>,
    selected: usize,
    scroll: usize,
    bgm: BgmController,
    should_quit: bool,
    autosave_at: Instant,
}

impl App {
    fn init() -> anyhow::Result<Self> {
        let paths = project_paths()?;
        let settings = load_settings(&paths.settings_path);
        if let Err(e) = init_logging(&paths.log_path, &settings.log_filter) {
            eprintln!("critterden: logging disabled: {e:#}");
        }
        info!("starting, data in {}", paths.saves_dir.display());
        let rules = Rules::default();

        let rng = match settings.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let catalog = load_enemy_catalog(&paths.enemies_path);
        let store = FileStore::new(&paths.saves_dir);

        let mut term = Terminal::begin()?;
        term.cur.color = settings.enable_color;

        Ok(Self {
            autosave_at: Instant::now() + Duration::from_secs(rules.autosave_secs),
            settings,
            paths,
            rules,
            catalog,
            store,
            identity: Identity::Pending,
            rng,
            term,
            game: None,
            scene: Scene::Loading,
            notice: None,
            selected: 0,
            scroll: 0,
            bgm: BgmController::default(),
            should_quit: false,
        })
    }

    fn run(&mut self) -> anyhow::Result<()> {
        let fps = self.settings.fps_cap.clamp(10, 240);
        let frame_dt = Duration::from_secs_f32(1.0 / fps as f32);
        let life_step = Duration::from_millis(self.rules.lifecycle_tick_ms);
        let motion_step = Duration::from_millis(self.rules.motion_tick_ms);
        let autosave_every = Duration::from_secs(self.rules.autosave_secs);

        let mut last_frame = Instant::now();
        let mut life_accum = Duration::ZERO;
        let mut motion_accum = Duration::ZERO;

        while !self.should_quit {
            self.term.resize_if_needed()?;

            if self.scene == Scene::Loading {
                self.load();
            }

            // input
            let events = collect_input_nonblocking(frame_dt)?;
            for ev in events {
                if let Some(action) = map_event_to_action(&self.scene, self.notice.is_some(), &ev)
                {
                    self.handle(action);
                    if self.should_quit {
                        break;
                    }
                }
            }

            // sim fixed-step, two clocks
            let now = Instant::now();
            let real_dt = now.saturating_duration_since(last_frame);
            last_frame = now;
            if self.game.is_some() {
                life_accum = life_accum.saturating_add(real_dt);
                motion_accum = motion_accum.saturating_add(real_dt);
            }
            while life_accum >= life_step {
                self.lifecycle_tick();
                life_accum = life_accum.saturating_sub(life_step);
            }
            while motion_accum >= motion_step {
                if let Some(game) = self.game.as_mut() {
                    game.tick_motion(&mut self.rng);
                }
                motion_accum = motion_accum.saturating_sub(motion_step);
            }
            self.frame_update(now);

            self.render_frame()?;

            if Instant::now() >= self.autosave_at {
                self.save_now(false);
                self.autosave_at = Instant::now() + autosave_every;
            }

            spin_sleep(frame_dt, Instant::now());
        }
        Ok(())
    }

    fn shutdown(&mut self) -> anyhow::Result<()> {
        if let Some(game) = self.game.as_mut() {
            let now = Utc::now();
            let ready = game.adventure().is_some_and(|a| a.reward().is_some());
            if ready {
                if let Err(e) = game.finish_adventure(&mut self.rng, now) {
                    warn!("could not collect reward on exit: {e}");
                }
            } else {
                game.abandon_adventure(now);
            }
        }
        self.save_now(false);
        self.bgm.stop();
        self.term.end()?;
        save_settings_atomic(&self.paths.settings_path, &self.settings)?;
        info!("bye");
        Ok(())
    }

    fn load(&mut self) {
        match load_game(&self.store, &self.identity) {
            Ok(full) => self.enter_game(full),
            Err(GameError::NotFound) => {
                info!("no save yet; showing start screen");
                self.scene = Scene::Start;
            }
            Err(GameError::NotReady) => {
                self.scene = Scene::Loading;
                self.resolve_identity();
            }
            Err(e) => {
                warn!("load failed: {e}");
                self.scene = Scene::Retry;
                self.notice = Some(e.into());
            }
        }
    }

    /// Settles the player key; the next loading frame retries the load.
    fn resolve_identity(&mut self) {
        if self.identity.is_ready() {
            return;
        }
        let (key, fresh) = resolve_key(self.settings.player_id.as_deref(), &mut self.rng);
        if fresh {
            self.settings.player_id = Some(key.to_string());
            // keep the key even if the session crashes before exit
            if let Err(e) = save_settings_atomic(&self.paths.settings_path, &self.settings) {
                warn!("could not store new player id: {e:#}");
            }
            info!("new player {key}");
        }
        self.identity = Identity::Ready(key);
    }

    fn enter_game(&mut self, full: FullState) {
        self.bgm.sync(full.bgm_on);
        self.game = Some(GameState::new(
            full,
            self.rules.clone(),
            self.catalog.clone(),
        ));
        self.scene = Scene::Den;
        self.selected = 0;
    }

    fn start_new_game(&mut self) {
        match new_game(
            &self.store,
            &self.identity,
            &self.rules,
            &mut self.rng,
            Utc::now(),
        ) {
            Ok(full) => self.enter_game(full),
            Err(e) => {
                warn!("new game failed: {e}");
                self.notice = Some(e.into());
            }
        }
    }

    fn handle(&mut self, action: Action) {
        debug!("action {action:?} in {:?}", self.scene);
        match action {
            Action::Quit => self.should_quit = true,
            Action::Dismiss => self.notice = None,
            Action::Help => self.scene = Scene::Help,
            Action::Back => {
                if self.scene == Scene::Adventure {
                    self.leave_adventure();
                } else if self.game.is_some() {
                    self.scene = Scene::Den;
                }
            }
            Action::Retry => self.load(),
            Action::NewGame => self.start_new_game(),
            Action::Diary | Action::Encyclopedia => {
                self.scroll = 0;
                self.scene = if action == Action::Diary {
                    Scene::Diary
                } else {
                    Scene::Encyclopedia
                };
            }
            Action::Move(d) => self.move_cursor(d),
            Action::Save => self.save_now(true),
            Action::Collect => self.collect_reward(),
            Action::Feed
            | Action::Gacha
            | Action::Breed
            | Action::Adventure
            | Action::Attack
            | Action::ToggleBgm => self.game_action(action),
        }
    }

    fn move_cursor(&mut self, d: i32) {
        let Some(game) = &self.game else {
            return;
        };
        match self.scene {
            Scene::Den => {
                let len = game.full.roster.len();
                if len > 0 {
                    self.selected = (self.selected as i64 + d as i64).rem_euclid(len as i64) as usize;
                }
            }
            Scene::Diary | Scene::Encyclopedia => {
                let len = if self.scene == Scene::Diary {
                    game.full.diary.len()
                } else {
                    game.full.encyclopedia.len()
                };
                let max = len.saturating_sub(1) as i64;
                self.scroll = (self.scroll as i64 + d as i64).clamp(0, max) as usize;
            }
            _ => {}
        }
    }

    fn game_action(&mut self, action: Action) {
        let Some(game) = self.game.as_mut() else {
            return;
        };
        let now = Utc::now();
        let result = match action {
            Action::Feed => {
                let Some(id) = game.full.roster.get(self.selected).map(|c| c.id.clone()) else {
                    return;
                };
                game.feed(&id, now).map(|()| None)
            }
            Action::Gacha => game.gacha(&mut self.rng, now).map(|c| {
                Some(Notice::new(
                    "New friend!",
                    format!("{} joined the den.", c.name),
                ))
            }),
            Action::Breed => game.breed(&mut self.rng, now).map(|c| {
                Some(Notice::new(
                    "A baby was born!",
                    format!("Welcome, {} (generation {}).", c.name, c.generation),
                ))
            }),
            Action::Adventure => game.start_adventure(&mut self.rng).map(|()| {
                self.scene = Scene::Adventure;
                None
            }),
            Action::Attack => match game.attack(Instant::now()) {
                Ok(()) => Ok(None),
                // mashing space mid-animation is expected
                Err(GameError::OutOfTurn) => {
                    debug!("attack ignored, not our turn");
                    Ok(None)
                }
                Err(e) => Err(e),
            },
            Action::ToggleBgm => {
                let on = game.toggle_bgm();
                self.bgm.sync(on);
                Ok(None)
            }
            _ => Ok(None),
        };
        match result {
            Ok(notice) => {
                if notice.is_some() {
                    self.notice = notice;
                }
            }
            Err(e) => {
                info!("{action:?} refused: {e}");
                self.notice = Some(e.into());
            }
        }
    }

    fn collect_reward(&mut self) {
        let Some(game) = self.game.as_mut() else {
            return;
        };
        match game.finish_adventure(&mut self.rng, Utc::now()) {
            Ok(lines) => {
                self.notice = Some(Notice::new("Adventure report", lines.join("\n")));
                self.scene = Scene::Den;
            }
            Err(GameError::OutOfTurn) => debug!("nothing to collect yet"),
            Err(e) => {
                self.notice = Some(e.into());
                self.scene = Scene::Den;
            }
        }
    }

    /// Esc on the battle screen: collect if the fight is over, otherwise run.
    fn leave_adventure(&mut self) {
        let Some(game) = self.game.as_mut() else {
            return;
        };
        if game.adventure().is_some_and(|a| a.reward().is_some()) {
            self.collect_reward();
        } else {
            game.abandon_adventure(Utc::now());
            self.scene = Scene::Den;
        }
    }

    fn lifecycle_tick(&mut self) {
        let Some(game) = self.game.as_mut() else {
            return;
        };
        let report = game.tick(&mut self.rng, Utc::now());
        if !report.unlocked.is_empty() && self.notice.is_none() {
            let names: Vec<&str> = report
                .unlocked
                .iter()
                .filter_map(|id| game.full.creature(id).map(|c| c.name.as_str()))
                .collect();
            self.notice = Some(Notice::new(
                "Encyclopedia",
                format!("{} became a close friend!", names.join(", ")),
            ));
        }
        if report.encyclopedia_changed || !report.deaths.is_empty() {
            self.save_now(false);
        }
    }

    fn frame_update(&mut self, now: Instant) {
        let Some(game) = self.game.as_mut() else {
            return;
        };
        game.full.expire_speech(Utc::now());
        if let Err(e) = game.update_adventure(now, &mut self.rng, Utc::now()) {
            self.notice = Some(e.into());
        }
        if self.scene == Scene::Adventure && game.adventure().is_none() {
            self.scene = Scene::Den;
        }
        let len = game.full.roster.len();
        if self.selected >= len {
            self.selected = len.saturating_sub(1);
        }
    }

    fn render_frame(&mut self) -> anyhow::Result<()> {
        let buf = &mut self.term.cur;
        buf.clear(Color::Black);

        match (self.scene, &self.game) {
            (Scene::Loading, _) => draw_center_box(buf, "Critterden", "Waking up the den..."),
            (Scene::Start, _) => draw_center_box(
                buf,
                "Welcome to Critterden",
                "There is no den here yet.\n\nPress N to move in with a duck and a bear.",
            ),
            (Scene::Retry, _) => draw_center_box(
                buf,
                "Critterden",
                "Your den could not be loaded.\n\nPress R to try again.",
            ),
            (Scene::Help, _) => draw_center_box(buf, "How to play", HELP_TEXT),
            (Scene::Den, Some(g)) => draw_den(buf, g, self.selected),
            (Scene::Adventure, Some(g)) => draw_adventure(buf, g),
            (Scene::Diary, Some(g)) => draw_diary(buf, g, self.scroll),
            (Scene::Encyclopedia, Some(g)) => draw_encyclopedia(buf, g, self.scroll),
            (_, None) => {}
        }

        let bgm_on = self.game.as_ref().is_some_and(|g| g.full.bgm_on);
        let y = buf.h.saturating_sub(1);
        draw_text(buf, 1, y, &help_line(&self.scene, bgm_on), Color::Grey, Color::Black);

        if let Some(notice) = &self.notice {
            draw_notice(buf, notice);
        }

        self.term.present(true)?;
        Ok(())
    }

    /// Writes a snapshot of the den. `announce` turns success into a notice;
    /// failures always surface unless another notice is already showing.
    fn save_now(&mut self, announce: bool) {
        let Some(game) = &self.game else {
            return;
        };
        let snapshot = game.snapshot();
        match save_game(&self.store, &self.identity, &snapshot) {
            Ok(()) => {
                if announce {
                    self.notice = Some(Notice::new("Saved", "Your den is safe."));
                }
            }
            Err(e) => {
                if announce || self.notice.is_none() {
                    self.notice = Some(Notice::new("Save failed", e.to_string()));
                }
            }
        }
    }
}

pub fn run() -> anyhow::Result<()> {
    let mut app = App::init()?;
    let result = app.run();
    app.shutdown()?;
    result
}

/* -----------------------------
   Frame pacing helper
------------------------------ */

fn spin_sleep(target: Duration, now: Instant) {
    let end = now + target;
    loop {
        let t = Instant::now();
        if t >= end {
            break;
        }
        let left = end - t;
        if left > Duration::from_millis(2) {
            std::thread::sleep(Duration::from_millis(1));
        } else {
            std::hint::spin_loop();
        }
    }
}
