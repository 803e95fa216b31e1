//! Domain events shared by every event-sourced module.

pub mod event;

pub use event::Event;
