//! URL matching and content rewriting.
//!
//! These modules are pure functions over strings; nothing here touches the
//! database.

pub mod content;
pub mod pattern;
pub mod serial;
pub mod summary;
