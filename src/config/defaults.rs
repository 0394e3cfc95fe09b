//! Default values for configuration fields.
//!
//! These functions are used by serde for default deserialization.

use std::path::PathBuf;

pub fn destination() -> PathBuf {
    "_site".into()
}

pub fn include() -> Vec<String> {
    vec![".htaccess".into()]
}

/// Dotfiles, `#autosave#` files, `backup~` files and vim swap files.
pub fn exclude_patterns() -> Vec<String> {
    vec![
        r"^[\.#].*".into(),
        r".*~$".into(),
        r".*\.s[uvw][a-z]$".into(),
    ]
}

/// Changes under these directories affect pages other than themselves.
pub fn full_build_patterns() -> Vec<String> {
    vec!["_layouts".into(), "_includes".into()]
}

pub fn permalink() -> String {
    "/{year}/{month}/{day}/{title}.html".into()
}

pub mod serve {
    pub fn host() -> String {
        "localhost".into()
    }

    pub fn port() -> u16 {
        8000
    }
}
