use std::path::{Path, PathBuf};

use bot_core::BotScriptError;
use walkdir::WalkDir;

use crate::map_cli_source_path;

const SCRIPT_SUFFIXES: [&str; 2] = [".bot.xml", ".html"];

pub(crate) fn is_bot_script(path: &Path) -> bool {
    path.to_str()
        .is_some_and(|raw| SCRIPT_SUFFIXES.iter().any(|suffix| raw.ends_with(suffix)))
}

pub(crate) fn resolve_scripts_dir(scripts_dir: &str) -> Result<PathBuf, BotScriptError> {
    let path = PathBuf::from(scripts_dir);
    let absolute = if path.is_absolute() {
        path
    } else {
        std::env::current_dir()
            .map_err(map_cli_source_path)?
            .join(path)
    };

    if !absolute.exists() {
        return Err(BotScriptError::new(
            "CLI_SOURCE_NOT_FOUND",
            format!("scripts-dir does not exist: {}", absolute.display()),
        ));
    }

    if !absolute.is_dir() {
        return Err(BotScriptError::new(
            "CLI_SOURCE_NOT_DIR",
            format!("scripts-dir is not a directory: {}", absolute.display()),
        ));
    }

    Ok(absolute)
}

/// Bot script files under `scripts_dir`, sorted by path.
pub(crate) fn find_bot_scripts(scripts_dir: &Path) -> Result<Vec<PathBuf>, BotScriptError> {
    let mut scripts = WalkDir::new(scripts_dir)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file() && is_bot_script(entry.path()))
        .map(|entry| entry.into_path())
        .collect::<Vec<_>>();
    scripts.sort();

    if scripts.is_empty() {
        return Err(BotScriptError::new(
            "CLI_SOURCE_EMPTY",
            format!("No .bot.xml/.html files under {}", scripts_dir.display()),
        ));
    }

    Ok(scripts)
}
