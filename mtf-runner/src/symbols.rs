//! Symbol universe: which symbols take part in cross-market analysis.
//!
//! Stored as a TOML file with a `used` and an `ignored` list. Moving a symbol
//! between the lists returns a new universe; saving is a separate step.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum SymbolError {
    #[error("'{0}' is not in the ignored list")]
    NotIgnored(String),
    #[error("'{0}' is not in the used list")]
    NotUsed(String),
    #[error("failed to access {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("parse symbol TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("serialize symbol TOML: {0}")]
    Serialize(#[from] toml::ser::Error),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolUniverse {
    #[serde(default)]
    pub used: Vec<String>,
    #[serde(default)]
    pub ignored: Vec<String>,
}

impl SymbolUniverse {
    pub fn from_toml(content: &str) -> Result<Self, SymbolError> {
        Ok(toml::from_str(content)?)
    }

    pub fn to_toml(&self) -> Result<String, SymbolError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Load from `path`. A missing file is an empty universe.
    pub fn load(path: &Path) -> Result<Self, SymbolError> {
        match std::fs::read_to_string(path) {
            Ok(content) => Self::from_toml(&content),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(source) => Err(SymbolError::Io {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    pub fn save(&self, path: &Path) -> Result<(), SymbolError> {
        std::fs::write(path, self.to_toml()?).map_err(|source| SymbolError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn active_symbols(&self) -> &[String] {
        &self.used
    }

    pub fn is_active(&self, symbol: &str) -> bool {
        self.used.iter().any(|s| s == symbol)
    }

    pub fn move_to_used(&self, symbol: &str) -> Result<Self, SymbolError> {
        let mut next = self.clone();
        let pos = next
            .ignored
            .iter()
            .position(|s| s == symbol)
            .ok_or_else(|| SymbolError::NotIgnored(symbol.to_string()))?;
        let moved = next.ignored.remove(pos);
        next.used.push(moved);
        Ok(next)
    }

    pub fn move_to_ignored(&self, symbol: &str) -> Result<Self, SymbolError> {
        let mut next = self.clone();
        let pos = next
            .used
            .iter()
            .position(|s| s == symbol)
            .ok_or_else(|| SymbolError::NotUsed(symbol.to_string()))?;
        let moved = next.used.remove(pos);
        next.ignored.push(moved);
        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn universe() -> SymbolUniverse {
        SymbolUniverse {
            used: vec!["eurusd".into()],
            ignored: vec!["xauusd".into(), "nzdcad".into()],
        }
    }

    #[test]
    fn move_is_pure() {
        let before = universe();
        let after = before.move_to_used("xauusd").unwrap();
        assert_eq!(before, universe());
        assert_eq!(after.used, vec!["eurusd", "xauusd"]);
        assert_eq!(after.ignored, vec!["nzdcad"]);
        assert!(after.is_active("xauusd"));
    }

    #[test]
    fn unknown_symbol_is_an_error() {
        assert!(matches!(
            universe().move_to_used("eurusd"),
            Err(SymbolError::NotIgnored(s)) if s == "eurusd"
        ));
        assert!(matches!(
            universe().move_to_ignored("btcusd"),
            Err(SymbolError::NotUsed(_))
        ));
    }

    #[test]
    fn save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("symbols.toml");
        assert_eq!(SymbolUniverse::load(&path).unwrap(), SymbolUniverse::default());

        let u = universe().move_to_ignored("eurusd").unwrap();
        u.save(&path).unwrap();
        let loaded = SymbolUniverse::load(&path).unwrap();
        assert_eq!(loaded, u);
        assert!(loaded.active_symbols().is_empty());
    }
}
