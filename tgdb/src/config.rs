/// Per-user persisted state: config directory, gdb init file, log file,
/// all resolved from `$HOME`.
use std::path::{Path, PathBuf};

/// `$HOME/.tgdb` by default; the directory is created if missing.
pub fn config_dir() -> PathBuf {
    let home = std::env::var_os("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."));
    home.join(".tgdb")
}

pub fn ensure_config_dir() -> std::io::Result<PathBuf> {
    let dir = config_dir();
    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}

pub fn log_file_path(dir: &Path) -> PathBuf {
    dir.join("tgdb.log")
}

/// Writes the gdb init file this core requires be loaded with `-x`:
/// forces annotate level 2 and disables pagination so prompts do not
/// stall behind a `--More--` interstitial.
pub fn write_init_file(dir: &Path) -> std::io::Result<PathBuf> {
    let path = dir.join("tgdb_gdb_init");
    std::fs::write(&path, "set annotate 2\nset height 0\n")?;
    Ok(path)
}

/// `$TERM`, read for the readline fd the core reserves a slot for in the
/// event loop; the core does not interpret its value.
pub fn term_env() -> Option<String> {
    std::env::var("TERM").ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_file_contains_required_directives() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_init_file(dir.path()).unwrap();
        let contents = std::fs::read_to_string(path).unwrap();
        assert!(contents.contains("set annotate 2"));
        assert!(contents.contains("set height 0"));
    }
}
