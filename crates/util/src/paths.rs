use std::path::PathBuf;

use dirs_next::home_dir;

/// Expands a leading `~` to the home directory. Other paths are returned trimmed but otherwise unchanged.
pub fn expand_tilde(path: &str) -> PathBuf {
    let trimmed = path.trim();
    let home = || home_dir().unwrap_or_else(|| PathBuf::from("~"));
    if trimmed == "~" {
        return home();
    }
    match trimmed.strip_prefix("~/").or_else(|| trimmed.strip_prefix("~\\")) {
        Some(rest) => home().join(rest),
        None => PathBuf::from(trimmed),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_paths_are_untouched() {
        assert_eq!(expand_tilde(" /etc/flowparams/settings.json "), PathBuf::from("/etc/flowparams/settings.json"));
        assert_eq!(expand_tilde("relative/settings.json"), PathBuf::from("relative/settings.json"));
    }

    #[test]
    fn tilde_expands_to_home() {
        let Some(home) = home_dir() else {
            return;
        };
        assert_eq!(expand_tilde("~"), home);
        assert_eq!(expand_tilde("~/flowparams/settings.json"), home.join("flowparams/settings.json"));
    }
}
