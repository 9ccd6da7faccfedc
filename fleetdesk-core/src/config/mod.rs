//! User preferences.

mod preferences;

pub use preferences::Preferences;
