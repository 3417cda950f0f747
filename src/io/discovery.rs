use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use super::error::IoError;
use crate::domain::Entity;

/// The three input files of a load, located in one data directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataFiles {
    pub users: PathBuf,
    pub cards: PathBuf,
    pub transactions: PathBuf,
    /// Every CSV file seen in the directory
    pub csv_files: Vec<PathBuf>,
}

impl DataFiles {
    /// Locate the users, cards and transactions CSVs in `dir`
    ///
    /// A file belongs to an entity when its name contains the entity token
    /// (e.g. `users_data.csv`). Each chosen file must have a header row with
    /// an `id` column. Nothing is opened for writing.
    pub fn discover(dir: impl AsRef<Path>) -> Result<Self, IoError> {
        let dir = dir.as_ref();
        if !dir.is_dir() {
            return Err(IoError::DataDirNotFound(dir.to_path_buf()));
        }

        let mut csv_files: Vec<PathBuf> = fs::read_dir(dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.is_file() && path.extension().is_some_and(|ext| ext == "csv"))
            .collect();
        csv_files.sort();

        if csv_files.is_empty() {
            return Err(IoError::NoCsvFiles(dir.to_path_buf()));
        }

        let find = |entity: Entity| -> Result<PathBuf, IoError> {
            let path = csv_files
                .iter()
                .find(|path| {
                    path.file_name()
                        .and_then(|name| name.to_str())
                        .is_some_and(|name| name.contains(entity.file_token()))
                })
                .cloned()
                .ok_or(IoError::MissingEntityFile(entity))?;
            require_id_column(&path)?;
            debug!(%entity, path = %path.display(), "Discovered input file");
            Ok(path)
        };

        Ok(Self {
            users: find(Entity::Users)?,
            cards: find(Entity::Cards)?,
            transactions: find(Entity::Transactions)?,
            csv_files,
        })
    }

    /// Input file for `entity`
    pub fn path(&self, entity: Entity) -> &Path {
        match entity {
            Entity::Users => &self.users,
            Entity::Cards => &self.cards,
            Entity::Transactions => &self.transactions,
        }
    }
}

fn require_id_column(path: &Path) -> Result<(), IoError> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)?;

    if reader.headers()?.iter().any(|h| h == "id") {
        Ok(())
    } else {
        Err(IoError::MissingColumn {
            path: path.to_path_buf(),
            column: "id".to_string(),
        })
    }
}
