use std::{collections::HashSet, fmt::Display, fs::File, path::Path};

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Spacecraft clock identifier, as used by clock correlation kernels.
pub type MissionId = i32;

const MISSIONSDB: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/src/missions.json"));

/// Mission as given by a caller, either by name or by clock identifier.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(untagged)]
pub enum Mission {
    Name(String),
    Id(MissionId),
}

impl From<&str> for Mission {
    fn from(name: &str) -> Self {
        Mission::Name(name.to_string())
    }
}

impl From<String> for Mission {
    fn from(name: String) -> Self {
        Mission::Name(name)
    }
}

impl From<MissionId> for Mission {
    fn from(id: MissionId) -> Self {
        Mission::Id(id)
    }
}

impl Display for Mission {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Mission::Name(name) => {
                // Capitalize the first letter of every word.
                let mut prev_alpha = false;
                for c in name.chars() {
                    if prev_alpha {
                        write!(f, "{}", c.to_lowercase())?;
                    } else {
                        write!(f, "{}", c.to_uppercase())?;
                    }
                    prev_alpha = c.is_alphabetic();
                }
                Ok(())
            }
            Mission::Id(id) => write!(f, "{id}"),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct MissionEntry {
    pub name: String,
    pub id: MissionId,
    #[serde(default)]
    pub aliases: Vec<String>,
}

impl MissionEntry {
    fn matches(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
            || self.aliases.iter().any(|a| a.eq_ignore_ascii_case(name))
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
struct DB {
    missions: Vec<MissionEntry>,
}

/// Mission name to spacecraft clock identifier registry.
///
/// The default registry uses a database embedded at compile-time. To use a specific/custom
/// database use [with_file](MissionRegistry::with_file).
///
/// # Example
/// ```
/// use ccsds_pus::missions::MissionRegistry;
///
/// let missions = MissionRegistry::default();
/// assert_eq!(missions.lookup("BepiColombo").unwrap().id, -121);
/// ```
#[derive(Debug, Clone)]
pub struct MissionRegistry {
    db: DB,
}

impl Default for MissionRegistry {
    fn default() -> Self {
        let db: DB = serde_json::from_str(MISSIONSDB).expect("built-in mission db is not valid");
        Self { db }
    }
}

impl MissionRegistry {
    /// A registry with no missions; every name lookup fails.
    #[must_use]
    pub fn empty() -> Self {
        Self { db: DB::default() }
    }

    /// Load missions from a JSON file, optionally adding the built-in missions not already
    /// defined in the file.
    ///
    /// # Errors
    /// If the file cannot be read or is not a valid mission database.
    pub fn with_file<P: AsRef<Path>>(path: P, built_in: bool) -> Result<MissionRegistry> {
        let mut db: DB = serde_json::from_reader(File::open(path)?)?;
        let file_ids: HashSet<MissionId> = db.missions.iter().map(|m| m.id).collect();

        if built_in {
            for mission in Self::default().db.missions {
                // skip any that already exist from the file
                if file_ids.contains(&mission.id) {
                    continue;
                }
                db.missions.push(mission);
            }
        }

        Ok(Self { db })
    }

    #[must_use]
    pub fn all(&self) -> &[MissionEntry] {
        &self.db.missions
    }

    /// Case-insensitive lookup by name or alias.
    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<&MissionEntry> {
        self.db.missions.iter().find(|m| m.matches(name.trim()))
    }

    /// Resolve `mission` to a clock identifier. Identifiers are passed through as-is.
    ///
    /// # Errors
    /// [Error::UnknownMission] if a name is not in the registry.
    pub fn resolve(&self, mission: &Mission) -> Result<MissionId> {
        match mission {
            Mission::Id(id) => Ok(*id),
            Mission::Name(name) => self
                .lookup(name)
                .map(|m| m.id)
                .ok_or_else(|| Error::UnknownMission(name.clone())),
        }
    }
}
