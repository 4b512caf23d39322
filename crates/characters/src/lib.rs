//! Character file loading and validation for Troupe.
//!
//! Characters are JSON persona files. Bare filenames resolve against the
//! conventional characters directory; anything with a path separator
//! resolves against the current working directory. A missing or invalid
//! file is fatal at load time — the host never starts with a partial
//! character list.

use std::path::{Path, PathBuf};

use tracing::info;
use troupe_core::character::Character;
use troupe_core::error::CharacterError;

/// Name of the built-in character used when no paths are given.
pub const DEFAULT_CHARACTER_NAME: &str = "Troupe";

/// Resolve a character argument to a concrete path.
///
/// `norinder.json` → `<characters_dir>/norinder.json`;
/// `./personas/norinder.json` and absolute paths are taken as given.
pub fn resolve_path(arg: &str, characters_dir: &Path) -> PathBuf {
    let candidate = Path::new(arg);
    if candidate.is_absolute() || arg.contains(std::path::MAIN_SEPARATOR) || arg.contains('/') {
        candidate.to_path_buf()
    } else {
        characters_dir.join(arg)
    }
}

/// Load one character file, validate it, and fill identity defaults.
pub fn load_character(path: &Path) -> Result<Character, CharacterError> {
    if !path.exists() {
        return Err(CharacterError::NotFound {
            path: path.display().to_string(),
        });
    }

    let content = std::fs::read_to_string(path).map_err(|e| CharacterError::ReadFailed {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;

    let mut character: Character =
        serde_json::from_str(&content).map_err(|e| CharacterError::ParseFailed {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;

    validate(&character)?;
    character.fill_defaults();

    info!(
        character = %character.name,
        id = %character.id(),
        clients = character.declared_clients().len(),
        "Loaded character"
    );
    Ok(character)
}

/// Load every path in order. The whole load fails on the first bad file.
pub fn load_characters(
    args: &[String],
    characters_dir: &Path,
) -> Result<Vec<Character>, CharacterError> {
    let mut characters = Vec::with_capacity(args.len());
    for arg in args {
        let path = resolve_path(arg, characters_dir);
        characters.push(load_character(&path)?);
    }
    Ok(characters)
}

/// The built-in character used when the CLI receives no character argument.
pub fn default_character() -> Character {
    let mut character = Character::new(DEFAULT_CHARACTER_NAME);
    character.fill_defaults();
    character
}

fn validate(character: &Character) -> Result<(), CharacterError> {
    if character.name.trim().is_empty() {
        return Err(CharacterError::Invalid {
            name: "<unnamed>".into(),
            reason: "character name must not be empty".into(),
        });
    }
    if character.provider.trim().is_empty() {
        return Err(CharacterError::Invalid {
            name: character.name.clone(),
            reason: "provider must not be empty".into(),
        });
    }
    Ok(())
}
