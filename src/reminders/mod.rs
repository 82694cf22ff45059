//! # Reminder Engine
//!
//! Follow-ups for unanswered bot responses: the [`ReminderService`] contract
//! (create, cancel, claim, mark, fail) and the periodic [`ReminderWorker`]
//! sweep that dispatches due reminders.

pub mod service;
pub mod worker;

pub use service::ReminderService;
pub use worker::{ReminderSweepOutcome, ReminderWorker};
