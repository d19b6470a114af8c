//! User settings persisted as TOML next to the database.

use std::fs;
use std::path::{Path, PathBuf};

use directories::UserDirs;
use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::db::default_db_path;
use crate::error::{DirectoryError, DirectoryResult};
use crate::transfer::DEFAULT_DELIMITER;

const SETTINGS_FILE_NAME: &str = "settings.toml";

pub const DEFAULT_LANDLINE_MASK: &str = "(##) ####-####";
pub const DEFAULT_CELL_MASK: &str = "(##) #####-####";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub database_path: Option<PathBuf>,
    pub alternate_database_path: Option<PathBuf>,
    /// 0 selects `database_path`, 1 the alternate.
    pub database_index: u8,
    pub landline_mask: String,
    pub cell_mask: String,
    pub allow_reset: bool,
    pub allow_import: bool,
    pub allow_export: bool,
    pub notices_dir: Option<PathBuf>,
    pub export_delimiter: char,
    pub log_level: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            database_path: None,
            alternate_database_path: None,
            database_index: 0,
            landline_mask: DEFAULT_LANDLINE_MASK.into(),
            cell_mask: DEFAULT_CELL_MASK.into(),
            allow_reset: true,
            allow_import: true,
            allow_export: true,
            notices_dir: None,
            export_delimiter: char::from(DEFAULT_DELIMITER),
            log_level: "info".into(),
        }
    }
}

pub fn settings_path(data_dir: &Path) -> PathBuf {
    data_dir.join(SETTINGS_FILE_NAME)
}

impl Settings {
    /// Read settings from `path`. A missing file yields the defaults.
    pub fn load(path: &Path) -> DirectoryResult<Self> {
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                info!(
                    "event=settings_load module=config status=default path={}",
                    path.display()
                );
                return Ok(Self::default());
            }
            Err(err) => return Err(DirectoryError::file(path, err)),
        };

        let settings: Settings = toml::from_str(&text)
            .map_err(|err| DirectoryError::Config(format!("{}: {err}", path.display())))?;
        settings.check()?;
        Ok(settings)
    }

    pub fn save(&self, path: &Path) -> DirectoryResult<()> {
        self.check()?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|err| DirectoryError::file(parent, err))?;
        }
        let text = toml::to_string_pretty(self)
            .map_err(|err| DirectoryError::Config(err.to_string()))?;
        fs::write(path, text).map_err(|err| DirectoryError::file(path, err))?;
        info!(
            "event=settings_save module=config status=ok path={}",
            path.display()
        );
        Ok(())
    }

    fn check(&self) -> DirectoryResult<()> {
        if self.database_index > 1 {
            return Err(DirectoryError::Config(format!(
                "database_index must be 0 or 1, got {}",
                self.database_index
            )));
        }
        if !self.export_delimiter.is_ascii() || self.export_delimiter.is_ascii_alphanumeric() {
            return Err(DirectoryError::Config(format!(
                "unusable export delimiter {:?}",
                self.export_delimiter
            )));
        }
        Ok(())
    }

    /// Database file currently in use, falling back to the default location
    /// inside `data_dir` when the selected slot is unset.
    pub fn current_database_path(&self, data_dir: &Path) -> PathBuf {
        let selected = match self.database_index {
            1 => self.alternate_database_path.as_ref(),
            _ => self.database_path.as_ref(),
        };
        selected
            .cloned()
            .unwrap_or_else(|| default_db_path(data_dir))
    }

    /// Point the active slot at `new_path`. When `new_path` does not exist yet
    /// and the current file does, the current file is moved there.
    pub fn update_database_path(&mut self, data_dir: &Path, new_path: &Path) -> DirectoryResult<()> {
        let current = self.current_database_path(data_dir);

        if !new_path.exists() && current.exists() && current != new_path {
            if let Some(parent) = new_path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent).map_err(|err| DirectoryError::file(parent, err))?;
            }
            fs::rename(&current, new_path).map_err(|err| DirectoryError::file(&current, err))?;
            warn!(
                "event=database_moved module=config status=ok from={} to={}",
                current.display(),
                new_path.display()
            );
        }

        let slot = match self.database_index {
            1 => &mut self.alternate_database_path,
            _ => &mut self.database_path,
        };
        *slot = Some(new_path.to_path_buf());
        Ok(())
    }

    /// Import and export are offered only when both toggles are on.
    pub fn import_export_enabled(&self) -> bool {
        self.allow_import && self.allow_export
    }

    pub fn export_delimiter_byte(&self) -> u8 {
        u8::try_from(u32::from(self.export_delimiter)).unwrap_or(DEFAULT_DELIMITER)
    }

    /// Folder notices are written to: the configured one, else Documents,
    /// else the home directory.
    pub fn notices_dir(&self) -> DirectoryResult<PathBuf> {
        if let Some(dir) = &self.notices_dir {
            return Ok(dir.clone());
        }
        let user_dirs = UserDirs::new()
            .ok_or_else(|| DirectoryError::Config("could not locate home directory".into()))?;
        Ok(user_dirs
            .document_dir()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| user_dirs.home_dir().to_path_buf()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::load(&settings_path(dir.path())).unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.landline_mask, DEFAULT_LANDLINE_MASK);
        assert!(settings.import_export_enabled());
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = settings_path(dir.path());
        fs::write(&path, "allow_export = false\nexport_delimiter = \";\"\n").unwrap();

        let settings = Settings::load(&path).unwrap();
        assert!(!settings.import_export_enabled());
        assert!(settings.allow_import);
        assert_eq!(settings.export_delimiter_byte(), b';');
        assert_eq!(settings.cell_mask, DEFAULT_CELL_MASK);
    }

    #[test]
    fn malformed_file_is_a_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = settings_path(dir.path());
        fs::write(&path, "database_index = \"first\"").unwrap();
        assert!(matches!(
            Settings::load(&path),
            Err(DirectoryError::Config(_))
        ));

        fs::write(&path, "database_index = 4").unwrap();
        assert!(matches!(
            Settings::load(&path),
            Err(DirectoryError::Config(_))
        ));
    }

    #[test]
    fn save_then_load_keeps_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = settings_path(dir.path());
        let settings = Settings {
            alternate_database_path: Some(dir.path().join("alt.sqlite")),
            database_index: 1,
            allow_reset: false,
            ..Settings::default()
        };

        settings.save(&path).unwrap();
        assert_eq!(Settings::load(&path).unwrap(), settings);
    }

    #[test]
    fn current_path_follows_index_and_default() {
        let dir = tempfile::tempdir().unwrap();
        let mut settings = Settings::default();
        assert_eq!(
            settings.current_database_path(dir.path()),
            default_db_path(dir.path())
        );

        settings.alternate_database_path = Some(PathBuf::from("/tmp/alt.sqlite"));
        settings.database_index = 1;
        assert_eq!(
            settings.current_database_path(dir.path()),
            PathBuf::from("/tmp/alt.sqlite")
        );
    }

    #[test]
    fn update_moves_active_file_when_target_is_new() {
        let dir = tempfile::tempdir().unwrap();
        let mut settings = Settings::default();
        let current = settings.current_database_path(dir.path());
        fs::write(&current, b"db").unwrap();

        let target = dir.path().join("moved").join("directory.sqlite");
        settings.update_database_path(dir.path(), &target).unwrap();

        assert!(!current.exists());
        assert_eq!(fs::read(&target).unwrap(), b"db");
        assert_eq!(settings.current_database_path(dir.path()), target);
    }

    #[test]
    fn update_adopts_existing_target_without_moving() {
        let dir = tempfile::tempdir().unwrap();
        let mut settings = Settings::default();
        let current = settings.current_database_path(dir.path());
        fs::write(&current, b"old").unwrap();
        let target = dir.path().join("other.sqlite");
        fs::write(&target, b"other").unwrap();

        settings.update_database_path(dir.path(), &target).unwrap();

        assert_eq!(fs::read(&current).unwrap(), b"old");
        assert_eq!(settings.database_path.as_deref(), Some(target.as_path()));
    }
}
