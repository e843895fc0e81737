use crate::app::Scene;
use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use std::time::Duration;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Action {
    Quit,
    Back,
    Help,
    Dismiss,
    Move(i32),
    Feed,
    Gacha,
    Breed,
    Adventure,
    Attack,
    Collect,
    Diary,
    Encyclopedia,
    Save,
    ToggleBgm,
    NewGame,
    Retry,
}

#[derive(Clone, Debug)]
pub struct InputEvent {
    pub key: KeyCode,
    pub mods: KeyModifiers,
}

pub fn collect_input_nonblocking(max_frame_time: Duration) -> anyhow::Result<Vec<InputEvent>> {
    let mut out = Vec::new();

    // poll with a tiny timeout so we stay responsive
    let timeout = std::cmp::min(Duration::from_millis(1), max_frame_time);
    while event::poll(timeout)? {
        if let Event::Key(k) = event::read()? {
            if k.kind == KeyEventKind::Press || k.kind == KeyEventKind::Repeat {
                out.push(InputEvent {
                    key: k.code,
                    mods: k.modifiers,
                });
                if out.len() >= 32 {
                    break;
                }
            }
        }
    }
    Ok(out)
}

/// `notice_open` swallows everything except what closes the box (and quit).
pub fn map_event_to_action(scene: &Scene, notice_open: bool, ev: &InputEvent) -> Option<Action> {
    if ev.mods.contains(KeyModifiers::CONTROL) && ev.key == KeyCode::Char('c') {
        return Some(Action::Quit);
    }
    let key = match ev.key {
        KeyCode::Char(ch) => KeyCode::Char(ch.to_ascii_lowercase()),
        k => k,
    };
    if notice_open {
        return match key {
            KeyCode::Enter | KeyCode::Esc | KeyCode::Char(' ') => Some(Action::Dismiss),
            _ => None,
        };
    }
    if key == KeyCode::Char('q') {
        return Some(Action::Quit);
    }

    match scene {
        Scene::Den => match key {
            KeyCode::Up | KeyCode::Char('k') => Some(Action::Move(-1)),
            KeyCode::Down | KeyCode::Char('j') => Some(Action::Move(1)),
            KeyCode::Char('f') => Some(Action::Feed),
            KeyCode::Char('g') => Some(Action::Gacha),
            KeyCode::Char('b') => Some(Action::Breed),
            KeyCode::Char('a') => Some(Action::Adventure),
            KeyCode::Char('d') => Some(Action::Diary),
            KeyCode::Char('e') => Some(Action::Encyclopedia),
            KeyCode::Char('s') => Some(Action::Save),
            KeyCode::Char('m') => Some(Action::ToggleBgm),
            KeyCode::Char('h') => Some(Action::Help),
            _ => None,
        },
        Scene::Adventure => match key {
            KeyCode::Char(' ') => Some(Action::Attack),
            KeyCode::Enter => Some(Action::Collect),
            KeyCode::Esc => Some(Action::Back),
            _ => None,
        },
        Scene::Diary | Scene::Encyclopedia => match key {
            KeyCode::Up | KeyCode::Char('k') => Some(Action::Move(-1)),
            KeyCode::Down | KeyCode::Char('j') => Some(Action::Move(1)),
            KeyCode::PageUp => Some(Action::Move(-10)),
            KeyCode::PageDown => Some(Action::Move(10)),
            KeyCode::Esc | KeyCode::Char('d') | KeyCode::Char('e') => Some(Action::Back),
            _ => None,
        },
        Scene::Help => match key {
            KeyCode::Esc | KeyCode::Char('h') => Some(Action::Back),
            _ => None,
        },
        Scene::Start => match key {
            KeyCode::Char('n') => Some(Action::NewGame),
            _ => None,
        },
        Scene::Retry => match key {
            KeyCode::Char('r') => Some(Action::Retry),
            _ => None,
        },
        Scene::Loading => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(code: KeyCode) -> InputEvent {
        InputEvent {
            key: code,
            mods: KeyModifiers::NONE,
        }
    }

    #[test]
    fn den_keys_map_to_care_actions() {
        let den = Scene::Den;
        assert_eq!(
            map_event_to_action(&den, false, &key(KeyCode::Char('F'))),
            Some(Action::Feed)
        );
        assert_eq!(
            map_event_to_action(&den, false, &key(KeyCode::Down)),
            Some(Action::Move(1))
        );
        assert_eq!(map_event_to_action(&den, false, &key(KeyCode::Char(' '))), None);
    }

    #[test]
    fn open_notice_eats_keys() {
        let den = Scene::Den;
        assert_eq!(map_event_to_action(&den, true, &key(KeyCode::Char('f'))), None);
        assert_eq!(
            map_event_to_action(&den, true, &key(KeyCode::Enter)),
            Some(Action::Dismiss)
        );
        let ctrl_c = InputEvent {
            key: KeyCode::Char('c'),
            mods: KeyModifiers::CONTROL,
        };
        assert_eq!(map_event_to_action(&den, true, &ctrl_c), Some(Action::Quit));
    }

    #[test]
    fn new_game_only_from_the_start_screen() {
        let n = key(KeyCode::Char('n'));
        assert_eq!(map_event_to_action(&Scene::Start, false, &n), Some(Action::NewGame));
        assert_eq!(map_event_to_action(&Scene::Den, false, &n), None);
    }
}
