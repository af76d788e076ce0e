// src/portal/mod.rs
// =============================================================================
// Everything specific to the course portal's pages:
// - parse: CSS selectors for each page template
// - session: login and dashboard subject discovery
// =============================================================================

pub mod parse;
pub mod session;

pub use session::{find_subjects, login};
