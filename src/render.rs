use crate::app::Scene;
use crate::battle::Phase;
use crate::game::{GameState, Notice};
use crate::model::{Creature, Species, MAX_FRIENDSHIP, MAX_GROWTH};
use crossterm::{
    cursor, execute, queue,
    style::{Color, Print, ResetColor, SetBackgroundColor, SetForegroundColor},
    terminal::{
        self, BeginSynchronizedUpdate, Clear, ClearType, DisableLineWrap, EnableLineWrap,
        EndSynchronizedUpdate, EnterAlternateScreen, LeaveAlternateScreen,
    },
};
use std::cmp::min;
use std::io::{self, Write};

const PANEL_W: u16 = 34;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Cell {
    pub ch: char,
    pub fg: Color,
    pub bg: Color,
    pub bold: bool,
}

impl Default for Cell {
    fn default() -> Self {
        Self {
            ch: ' ',
            fg: Color::White,
            bg: Color::Black,
            bold: false,
        }
    }
}

pub struct CellBuffer {
    pub w: u16,
    pub h: u16,
    pub cells: Vec<Cell>,
    /// Off means every draw call lands in plain white.
    pub color: bool,
}

impl CellBuffer {
    pub fn new(w: u16, h: u16) -> Self {
        Self {
            w,
            h,
            cells: vec![Cell::default(); (w as usize) * (h as usize)],
            color: true,
        }
    }
    pub fn idx(&self, x: u16, y: u16) -> usize {
        (y as usize) * (self.w as usize) + (x as usize)
    }
    pub fn set(&mut self, x: u16, y: u16, mut c: Cell) {
        if x < self.w && y < self.h {
            if !self.color {
                c.fg = Color::White;
            }
            let i = self.idx(x, y);
            self.cells[i] = c;
        }
    }
    pub fn get(&self, x: u16, y: u16) -> Option<Cell> {
        (x < self.w && y < self.h).then(|| self.cells[self.idx(x, y)])
    }
    pub fn clear(&mut self, bg: Color) {
        for c in &mut self.cells {
            c.ch = ' ';
            c.fg = Color::White;
            c.bg = bg;
            c.bold = false;
        }
    }
}

pub struct Terminal {
    out: io::Stdout,
    pub cols: u16,
    pub rows: u16,
    prev: CellBuffer,
    pub cur: CellBuffer,
}

impl Terminal {
    pub fn begin() -> anyhow::Result<Self> {
        let mut out = io::stdout();
        execute!(
            out,
            EnterAlternateScreen,
            cursor::Hide,
            DisableLineWrap,
            terminal::Clear(ClearType::All)
        )?;
        terminal::enable_raw_mode()?;

        let (cols, rows) = terminal::size()?;
        Ok(Self {
            out,
            cols,
            rows,
            prev: CellBuffer::new(cols, rows),
            cur: CellBuffer::new(cols, rows),
        })
    }

    pub fn end(&mut self) -> anyhow::Result<()> {
        queue!(
            self.out,
            BeginSynchronizedUpdate,
            ResetColor,
            Clear(ClearType::All),
            cursor::Show,
            EnableLineWrap,
            EndSynchronizedUpdate,
            LeaveAlternateScreen
        )?;
        self.out.flush()?;
        terminal::disable_raw_mode()?;
        Ok(())
    }

    pub fn resize_if_needed(&mut self) -> anyhow::Result<bool> {
        let (c, r) = terminal::size()?;
        if c == self.cols && r == self.rows {
            return Ok(false);
        }
        let color = self.cur.color;
        self.cols = c;
        self.rows = r;
        self.prev = CellBuffer::new(c, r);
        self.cur = CellBuffer::new(c, r);
        self.cur.color = color;
        // the fresh `prev` is blank, so force every cell out once
        execute!(self.out, terminal::Clear(ClearType::All))?;
        Ok(true)
    }

    pub fn present(&mut self, diff_only: bool) -> anyhow::Result<()> {
        queue!(self.out, BeginSynchronizedUpdate)?;

        let mut last_fg = None;
        let mut last_bg = None;

        for y in 0..self.rows {
            for x in 0..self.cols {
                let i = self.cur.idx(x, y);
                let c = self.cur.cells[i];
                if diff_only && c == self.prev.cells[i] {
                    continue;
                }

                queue!(self.out, cursor::MoveTo(x, y))?;

                if last_fg != Some(c.fg) {
                    queue!(self.out, SetForegroundColor(c.fg))?;
                    last_fg = Some(c.fg);
                }
                if last_bg != Some(c.bg) {
                    queue!(self.out, SetBackgroundColor(c.bg))?;
                    last_bg = Some(c.bg);
                }

                queue!(self.out, Print(c.ch))?;
            }
        }

        queue!(self.out, ResetColor, EndSynchronizedUpdate)?;
        self.out.flush()?;
        self.prev.cells.copy_from_slice(&self.cur.cells);
        Ok(())
    }
}

/* -----------------------------
   Primitives
------------------------------ */

pub fn draw_text(buf: &mut CellBuffer, x: u16, y: u16, s: &str, fg: Color, bg: Color) {
    for (i, ch) in s.chars().enumerate() {
        let xx = x.saturating_add(i as u16);
        if xx >= buf.w || y >= buf.h {
            break;
        }
        buf.set(
            xx,
            y,
            Cell {
                ch,
                fg,
                bg,
                bold: false,
            },
        );
    }
}

fn bar(value01: f64, width: usize) -> String {
    let v = if value01.is_nan() {
        0.0
    } else {
        value01.clamp(0.0, 1.0)
    };
    let fill = (v * width as f64 + 0.5) as usize;
    let mut s = String::new();
    s.push('[');
    for i in 0..width {
        s.push(if i < fill { '█' } else { ' ' });
    }
    s.push(']');
    s
}

/// Greedy word wrap; words longer than `width` are split.
pub fn wrap(text: &str, width: usize) -> Vec<String> {
    let width = width.max(1);
    let mut out = Vec::new();
    for para in text.lines() {
        let mut line = String::new();
        for word in para.split_whitespace() {
            let mut word: Vec<char> = word.chars().collect();
            while word.len() > width {
                if !line.is_empty() {
                    out.push(std::mem::take(&mut line));
                }
                out.push(word.drain(..width).collect());
            }
            let word: String = word.into_iter().collect();
            let needed = line.chars().count() + usize::from(!line.is_empty()) + word.chars().count();
            if needed > width && !line.is_empty() {
                out.push(std::mem::take(&mut line));
            }
            if !line.is_empty() {
                line.push(' ');
            }
            line.push_str(&word);
        }
        out.push(line);
    }
    out
}

fn species_color(s: Species) -> Color {
    match s {
        Species::Duck => Color::Yellow,
        Species::Bear => Color::DarkYellow,
        Species::Hybrid => Color::Magenta,
    }
}

fn cell(ch: char, fg: Color) -> Cell {
    Cell {
        ch,
        fg,
        bg: Color::Black,
        bold: false,
    }
}

pub fn draw_box(buf: &mut CellBuffer, x0: u16, y0: u16, bw: u16, bh: u16, title: &str) {
    if bw < 2 || bh < 2 {
        return;
    }
    let fg = Color::White;
    for y in y0..y0 + bh {
        for x in x0..x0 + bw {
            buf.set(x, y, cell(' ', fg));
        }
    }
    for x in x0..x0 + bw {
        buf.set(x, y0, cell('─', fg));
        buf.set(x, y0 + bh - 1, cell('─', fg));
    }
    for y in y0..y0 + bh {
        buf.set(x0, y, cell('│', fg));
        buf.set(x0 + bw - 1, y, cell('│', fg));
    }
    buf.set(x0, y0, cell('┌', fg));
    buf.set(x0 + bw - 1, y0, cell('┐', fg));
    buf.set(x0, y0 + bh - 1, cell('└', fg));
    buf.set(x0 + bw - 1, y0 + bh - 1, cell('┘', fg));
    if !title.is_empty() {
        draw_text(buf, x0 + 2, y0, &format!(" {title} "), Color::Cyan, Color::Black);
    }
}

/// Centered box with wrapped body text.
pub fn draw_center_box(buf: &mut CellBuffer, title: &str, body: &str) {
    let bw = min(60, buf.w.saturating_sub(4));
    let inner = bw.saturating_sub(4) as usize;
    let lines = wrap(body, inner);
    let bh = min(lines.len() as u16 + 4, buf.h.saturating_sub(2));
    let x0 = (buf.w - bw) / 2;
    let y0 = (buf.h - bh) / 2;
    draw_box(buf, x0, y0, bw, bh, title);
    for (i, line) in lines.iter().enumerate() {
        let y = y0 + 2 + i as u16;
        if y >= y0 + bh - 1 {
            break;
        }
        draw_text(buf, x0 + 2, y, line, Color::White, Color::Black);
    }
}

/* -----------------------------
   Scenes
------------------------------ */

fn draw_roster(buf: &mut CellBuffer, game: &GameState, selected: usize) {
    let bg = Color::Black;
    let full = &game.full;
    let head = format!(
        "Food {}  Tokens {}  Den {}/{}",
        full.food,
        full.tokens,
        full.living_count(),
        game.rules.max_living
    );
    draw_text(buf, 1, 1, &head, Color::White, bg);

    let mut y = 3;
    for (i, c) in full.roster.iter().enumerate() {
        if y + 3 >= buf.h.saturating_sub(1) {
            break;
        }
        let marker = if i == selected { '>' } else { ' ' };
        let fg = if !c.is_alive {
            Color::DarkGrey
        } else if i == selected {
            Color::Yellow
        } else {
            Color::White
        };
        let status = if c.is_alive { "" } else { " (star)" };
        draw_text(
            buf,
            1,
            y,
            &format!("{marker} {} g{}{status}", c.name, c.generation),
            fg,
            bg,
        );
        if c.is_alive {
            let meters = format!(
                "  HP {} Food {}",
                bar(c.hp / c.max_hp, 6),
                bar(c.satiety / c.max_satiety, 6)
            );
            draw_text(buf, 1, y + 1, &meters, fg, bg);
            let meters = format!(
                "  Fr {} Gr {}",
                bar(c.friendship / MAX_FRIENDSHIP, 6),
                bar(c.growth / MAX_GROWTH, 6)
            );
            draw_text(buf, 1, y + 2, &meters, fg, bg);
            y += 3;
        } else {
            y += 1;
        }
    }
}

fn arena_cell(game: &GameState, c: &Creature, x0: u16, w: u16, h: u16) -> (u16, u16) {
    let fx = (c.pos.x / game.rules.arena_w).clamp(0.0, 1.0);
    let fy = (c.pos.y / game.rules.arena_h).clamp(0.0, 1.0);
    let x = x0 + 1 + (fx * w.saturating_sub(3) as f64) as u16;
    let y = 2 + (fy * h.saturating_sub(4) as f64) as u16;
    (x, y)
}

fn draw_arena(buf: &mut CellBuffer, game: &GameState) {
    let x0 = PANEL_W;
    let w = buf.w.saturating_sub(x0);
    let h = buf.h.saturating_sub(1);
    if w < 8 || h < 6 {
        return;
    }
    draw_box(buf, x0, 0, w, h, "The Den");
    for c in game.full.roster.iter().filter(|c| c.is_alive) {
        let (x, y) = arena_cell(game, c, x0, w, h);
        buf.set(
            x,
            y,
            Cell {
                ch: c.species.glyph(),
                fg: species_color(c.species),
                bg: Color::Black,
                bold: true,
            },
        );
    }
    // bubbles after glyphs so text stays readable
    for c in game.full.roster.iter().filter(|c| c.is_alive) {
        let Some(text) = &c.speech else {
            continue;
        };
        let (x, y) = arena_cell(game, c, x0, w, h);
        let room = (x0 + w - 1).saturating_sub(x) as usize;
        let said: String = format!("\"{text}\"").chars().take(room).collect();
        draw_text(buf, x, y.saturating_sub(1).max(1), &said, Color::Cyan, Color::Black);
    }
}

pub fn draw_den(buf: &mut CellBuffer, game: &GameState, selected: usize) {
    draw_roster(buf, game, selected);
    draw_arena(buf, game);
}

pub fn draw_adventure(buf: &mut CellBuffer, game: &GameState) {
    let Some(adv) = game.adventure() else {
        return;
    };
    let s = &adv.session;
    let bw = min(64, buf.w.saturating_sub(2));
    let bh = min(16, buf.h.saturating_sub(2));
    let x0 = (buf.w - bw) / 2;
    let y0 = (buf.h - bh) / 2;
    draw_box(buf, x0, y0, bw, bh, "Adventure");

    let bg = Color::Black;
    let enemy = format!(
        "{} {}  HP {} {}/{}",
        s.enemy.glyph,
        s.enemy.name,
        bar(s.enemy_hp as f64 / s.enemy.hp.max(1) as f64, 10),
        s.enemy_hp,
        s.enemy.hp
    );
    draw_text(buf, x0 + 2, y0 + 2, &enemy, Color::Red, bg);
    let hero = format!(
        "{}  {}  HP {} {:.0}/{:.0}",
        s.fighter.species.glyph(),
        s.fighter.name,
        bar(s.player_hp / s.fighter.max_hp, 10),
        s.player_hp,
        s.fighter.max_hp
    );
    draw_text(buf, x0 + 2, y0 + 4, &hero, species_color(s.fighter.species), bg);

    let mut lines: Vec<&str> = s.log().collect();
    lines.reverse();
    for (i, line) in lines.iter().enumerate() {
        let line: String = line.chars().take(bw.saturating_sub(4) as usize).collect();
        draw_text(buf, x0 + 2, y0 + 6 + i as u16, &line, Color::White, bg);
    }

    let prompt = if adv.reward().is_some() {
        "enter: head home"
    } else if adv.is_animating() {
        "..."
    } else {
        match s.phase() {
            Phase::PlayerTurn => "space: attack | esc: run home",
            Phase::Victory | Phase::Defeat | Phase::EnemyTurn | Phase::Resolved => "...",
        }
    };
    draw_text(buf, x0 + 2, y0 + bh - 2, prompt, Color::Yellow, bg);
}

pub fn draw_diary(buf: &mut CellBuffer, game: &GameState, scroll: usize) {
    let h = buf.h.saturating_sub(1);
    let w = buf.w;
    draw_box(buf, 0, 0, w, h, "Diary");
    let rows = h.saturating_sub(2) as usize;
    let entries = game.full.diary.iter().rev().skip(scroll).take(rows);
    for (i, e) in entries.enumerate() {
        let line = format!("{}  {}", e.at.format("%m-%d %H:%M"), e.text);
        let line: String = line.chars().take(w.saturating_sub(3) as usize).collect();
        draw_text(buf, 2, 1 + i as u16, &line, Color::White, Color::Black);
    }
    if game.full.diary.is_empty() {
        draw_text(buf, 2, 1, "Nothing written yet.", Color::DarkGrey, Color::Black);
    }
}

pub fn draw_encyclopedia(buf: &mut CellBuffer, game: &GameState, scroll: usize) {
    let h = buf.h.saturating_sub(1);
    let w = buf.w;
    let title = format!("Encyclopedia ({})", game.full.encyclopedia.len());
    draw_box(buf, 0, 0, w, h, &title);
    let rows = h.saturating_sub(2) as usize;
    for (i, e) in game
        .full
        .encyclopedia
        .iter()
        .skip(scroll)
        .take(rows)
        .enumerate()
    {
        let line = format!(
            "{} {:<16} met {}  befriended {}",
            e.species.glyph(),
            e.name,
            e.acquired_at.format("%Y-%m-%d"),
            e.discovered_at.format("%Y-%m-%d")
        );
        draw_text(buf, 2, 1 + i as u16, &line, species_color(e.species), Color::Black);
    }
    if game.full.encyclopedia.is_empty() {
        let hint = "Become close friends with a creature to record it here.";
        draw_text(buf, 2, 1, hint, Color::DarkGrey, Color::Black);
    }
}

pub fn draw_notice(buf: &mut CellBuffer, notice: &Notice) {
    let body = format!("{}\n\nenter: ok", notice.body);
    draw_center_box(buf, &notice.title, &body);
}

pub fn help_line(scene: &Scene, bgm_on: bool) -> String {
    match scene {
        Scene::Den => format!(
            "q quit | ↑↓ pick | f feed | g gacha | b breed | a adventure | d diary | e book | s save | m music ({}) | h help",
            if bgm_on { "on" } else { "off" }
        ),
        Scene::Adventure => "space attack | enter collect | esc leave".to_string(),
        Scene::Diary | Scene::Encyclopedia => "↑↓ scroll | esc back".to_string(),
        Scene::Help => "esc back | q quit".to_string(),
        Scene::Start => "n new game | q quit".to_string(),
        Scene::Retry => "r retry | q quit".to_string(),
        Scene::Loading => "q quit".to_string(),
    }
}

pub const HELP_TEXT: &str = "Look after a den of ducks, bears and their hybrid young.\n\
Creatures get hungry over time; starving ones lose health and squabble. \
Fed creatures grow and grow fond of you.\n\n\
F feed the selected creature (costs 1 food).\n\
G spend a token on a random new friend.\n\
B breed two grown, friendly creatures.\n\
A send your first living creature on an adventure.\n\
D diary, E encyclopedia, M music, S save now.\n\n\
The den holds 10 living creatures.";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bar_fills_proportionally() {
        assert_eq!(bar(0.5, 4), "[██  ]");
        assert_eq!(bar(2.0, 2), "[██]");
        assert_eq!(bar(f64::NAN, 2), "[  ]");
    }

    #[test]
    fn wrap_respects_width() {
        let lines = wrap("the quick brown fox jumps", 10);
        assert_eq!(lines, ["the quick", "brown fox", "jumps"]);
        assert!(wrap("abcdefghijkl", 5).iter().all(|l| l.chars().count() <= 5));
        assert_eq!(wrap("a\n\nb", 5), ["a", "", "b"]);
    }

    #[test]
    fn draw_text_clips_at_the_edge() {
        let mut buf = CellBuffer::new(4, 1);
        draw_text(&mut buf, 2, 0, "hello", Color::Red, Color::Black);
        assert_eq!(buf.get(3, 0).map(|c| c.ch), Some('e'));
        assert_eq!(buf.get(4, 0), None);
    }

    #[test]
    fn monochrome_buffers_drop_color() {
        let mut buf = CellBuffer::new(2, 1);
        buf.color = false;
        draw_text(&mut buf, 0, 0, "x", Color::Red, Color::Black);
        assert_eq!(buf.get(0, 0).map(|c| c.fg), Some(Color::White));
    }
}
