//! A3S Stow CLI - image archives and volume housekeeping.

pub mod commands;
pub mod output;
