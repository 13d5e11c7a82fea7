//! Reading and writing the state log as TOML
//!
//! Saves are atomic: the log is written to a temporary file in the target directory
//! and then renamed over the old file, so a crash mid-write can't leave a torn log.

use super::StateLog;
use crate::error::Result;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// File name of the state log inside the working directory
pub const STATE_LOG_FILE_NAME: &str = "state_log.toml";

/// Path of the state log for a working directory (current directory if `None`)
pub fn state_log_path(save_to_dir: Option<&Path>) -> PathBuf {
    match save_to_dir {
        Some(dir) => dir.join(STATE_LOG_FILE_NAME),
        None => PathBuf::from(STATE_LOG_FILE_NAME),
    }
}

pub fn encode(state_log: &StateLog) -> Result<String> {
    Ok(toml::to_string_pretty(state_log)?)
}

pub fn decode(content: &str) -> Result<StateLog> {
    Ok(toml::from_str(content)?)
}

/// Load the state log from disk, or create and save a fresh one if none exists
pub fn load(path: &Path) -> Result<StateLog> {
    match std::fs::read_to_string(path) {
        Ok(content) => {
            let state_log = decode(&content)?;
            log::debug!("Loaded state log from {}", path.display());
            Ok(state_log)
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            log::info!("No state log at {}, creating a new one", path.display());
            let state_log = StateLog::new();
            save(&state_log, path)?;
            Ok(state_log)
        }
        Err(e) => Err(e.into()),
    }
}

/// Replace the state log on disk, creating parent directories if needed
pub fn save(state_log: &StateLog, path: &Path) -> Result<()> {
    let content = encode(state_log)?;

    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(parent)?;

    let mut temp_file = NamedTempFile::new_in(parent)?;
    temp_file.write_all(content.as_bytes())?;
    temp_file.flush()?;
    temp_file.persist(path).map_err(|e| e.error)?;

    log::debug!("Saved state log to {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GetterError;
    use crate::state::{never_updated, ReleaseInfo};
    use chrono::NaiveDate;
    use tempfile::TempDir;

    #[test]
    fn default_log_round_trips() {
        let state_log = StateLog::new();
        let decoded = decode(&encode(&state_log).unwrap()).unwrap();

        assert_eq!(decoded, state_log);
        assert_eq!(decoded.goatbots.prices_updated_at, never_updated());
        assert_eq!(decoded.goatbots.card_definitions_updated_at, never_updated());
        assert_eq!(decoded.scryfall.bulk_data_updated_at, never_updated());
        assert!(decoded.scryfall.next_released_mtgo_set.is_none());
    }

    #[test]
    fn encoded_log_has_sections_and_empty_release_entry() {
        let content = encode(&StateLog::new()).unwrap();
        assert!(content.contains("[goatbots]"));
        assert!(content.contains("[scryfall]"));
        assert!(content.contains("[scryfall.next_released_mtgo_set]"));
        assert!(content.contains("name = \"\""));
        assert!(content.contains("1970-01-01T00:00:00Z"));
    }

    #[test]
    fn populated_release_round_trips() {
        let mut state_log = StateLog::new();
        state_log.record_next_release(ReleaseInfo {
            name: "Lost Caverns of Ixalan Commander".to_string(),
            released_at: NaiveDate::from_ymd_opt(2023, 11, 17).unwrap(),
            mtgo_code: "lcc".to_string(),
        });

        let content = encode(&state_log).unwrap();
        assert!(content.contains("released_at = \"2023-11-17\""));
        assert_eq!(decode(&content).unwrap(), state_log);
    }

    #[test]
    fn decode_accepts_log_without_release_table() {
        let content = r#"
title = "log for MTGO Getter state, such as updated_at timestamps"

[goatbots]
card_definitions_updated_at = "2023-09-02T21:13:13Z"
prices_updated_at = "2023-09-03T05:00:00Z"

[scryfall]
bulk_data_updated_at = "1970-01-01T00:00:00Z"
"#;
        let state_log = decode(content).unwrap();
        assert!(state_log.scryfall.next_released_mtgo_set.is_none());
        assert_eq!(
            state_log.goatbots.prices_updated_at.to_rfc3339(),
            "2023-09-03T05:00:00+00:00"
        );
    }

    #[test]
    fn decode_rejects_partial_release_entry() {
        let content = r#"
title = "x"

[goatbots]
card_definitions_updated_at = "1970-01-01T00:00:00Z"
prices_updated_at = "1970-01-01T00:00:00Z"

[scryfall]
bulk_data_updated_at = "1970-01-01T00:00:00Z"

[scryfall.next_released_mtgo_set]
name = "Lost Caverns of Ixalan"
released_at = ""
mtgo_code = "lci"
"#;
        assert!(matches!(decode(content), Err(GetterError::Decode(_))));
    }

    #[test]
    fn decode_rejects_garbage() {
        assert!(matches!(
            decode("this is = not [valid"),
            Err(GetterError::Decode(_))
        ));
        assert!(matches!(
            decode("title = \"missing sections\""),
            Err(GetterError::Decode(_))
        ));
    }

    #[test]
    fn load_creates_default_log_when_missing() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join(STATE_LOG_FILE_NAME);
        assert!(!path.exists());

        let state_log = load(&path).unwrap();

        assert_eq!(state_log, StateLog::new());
        assert!(path.exists());
        assert_eq!(load(&path).unwrap(), state_log);
    }

    #[test]
    fn load_fails_on_malformed_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join(STATE_LOG_FILE_NAME);
        std::fs::write(&path, "not toml at all [[[").unwrap();

        assert!(matches!(load(&path), Err(GetterError::Decode(_))));
    }

    #[test]
    fn save_replaces_contents_and_leaves_no_temp_files() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join(STATE_LOG_FILE_NAME);

        let mut state_log = StateLog::new();
        save(&state_log, &path).unwrap();
        state_log.title = "changed".to_string();
        save(&state_log, &path).unwrap();

        assert_eq!(load(&path).unwrap().title, "changed");
        let entries: Vec<_> = std::fs::read_dir(temp_dir.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn state_log_path_uses_working_directory() {
        assert_eq!(state_log_path(None), PathBuf::from("state_log.toml"));
        assert_eq!(
            state_log_path(Some(Path::new("data"))),
            Path::new("data").join("state_log.toml")
        );
    }
}
