//! Connect Column - persisted sessions for a column-drop game
//!
//! This library stores game sessions (players, turn, lifecycle state) and
//! decides whether a proposed move is currently legal.

pub mod config;
pub mod db;
pub mod models;
pub mod services;
