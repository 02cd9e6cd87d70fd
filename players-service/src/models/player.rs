//! Player records and Steam profile data

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// 64-bit Steam identifier (fits in SQLite INTEGER)
pub type SteamId = i64;

/// Player row as stored in the `players` table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerRecord {
    /// Steam ID (primary key, never changes)
    pub steam_id: SteamId,
    /// Steam persona name, set when Steam returns a match
    pub name: Option<String>,
    /// Avatar URL, set when Steam returns a match
    pub avatar: Option<String>,
    /// `None` until first reconciled, then whether Steam knew the player
    pub exists: Option<bool>,
    /// When the record was last reconciled
    pub last_update: Option<DateTime<Utc>>,
}

impl PlayerRecord {
    /// Record for an id seen for the first time (nothing known yet)
    pub fn new(steam_id: SteamId) -> Self {
        Self {
            steam_id,
            name: None,
            avatar: None,
            exists: None,
            last_update: None,
        }
    }
}

/// Profile data returned by the enrichment service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerProfile {
    pub steam_id: SteamId,
    /// Steam `personaname`
    pub name: String,
    /// Steam `avatar` (32x32 image URL)
    pub avatar: String,
}

/// Mapping of Steam ID to the profile the enrichment service returned for it
///
/// Built from profiles in the order they were received. When the same id
/// appears more than once the first profile wins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileSet {
    profiles: HashMap<SteamId, PlayerProfile>,
    duplicates: usize,
}

impl ProfileSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_profiles<I>(profiles: I) -> Self
    where
        I: IntoIterator<Item = PlayerProfile>,
    {
        let mut set = Self::new();
        set.extend(profiles);
        set
    }

    /// Add profiles, keeping the existing entry for ids already present
    pub fn extend<I>(&mut self, profiles: I)
    where
        I: IntoIterator<Item = PlayerProfile>,
    {
        for profile in profiles {
            if self.profiles.contains_key(&profile.steam_id) {
                self.duplicates += 1;
                tracing::debug!(
                    steam_id = profile.steam_id,
                    "Duplicate profile in enrichment response, keeping first"
                );
                continue;
            }
            self.profiles.insert(profile.steam_id, profile);
        }
    }

    pub fn get(&self, steam_id: SteamId) -> Option<&PlayerProfile> {
        self.profiles.get(&steam_id)
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }

    /// Number of profiles dropped by the first-wins rule
    pub fn duplicates(&self) -> usize {
        self.duplicates
    }
}
