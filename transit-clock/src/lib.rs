//! Transit clock server.
//!
//! Answers "when is my next bus, when will it get there, and is anything
//! wrong on the line" for a fixed set of origin/destination legs, by
//! combining a GTFS timetable with live delay and incident feeds.

pub mod config;
pub mod domain;
pub mod legs;
pub mod realtime;
pub mod refresh;
pub mod schedule;
pub mod web;
