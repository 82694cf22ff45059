//! # Data Layer
//!
//! sqlx-backed row models for the four core tables. Each model owns its SQL,
//! including the row-locking variants the orchestration layer depends on
//! (`FOR UPDATE` for first-message determination and reminder cancellation,
//! `FOR UPDATE SKIP LOCKED` for reminder claiming).
//!
//! Enums are stored as text and parsed through the closed enums in
//! [`crate::constants`], with safe defaults applied at this boundary so a
//! corrupted row never panics core logic.

pub mod chat_session;
pub mod classification;
pub mod message;
pub mod reminder;

pub use chat_session::{ChatSession, SessionChannel};
pub use classification::{Classification, NewClassification};
pub use message::{Message, NewMessage};
pub use reminder::{NewReminder, Reminder};
