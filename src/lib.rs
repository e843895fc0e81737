//! Critterden: a terminal creature-raising game. Ducks, bears and their
//! hybrid young live in a small den, get hungry, grow, breed and go on
//! turn-based adventures.

pub mod app;
pub mod audio;
pub mod battle;
pub mod config;
pub mod error;
pub mod game;
pub mod identity;
pub mod input;
pub mod lifecycle;
pub mod model;
pub mod render;
pub mod spawn;
pub mod storage;
