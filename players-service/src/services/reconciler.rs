//! Reconciliation of enrichment results onto the requested players
//!
//! Every requested player comes back exactly once, in the requested order:
//! - matched: `exists = true`, name and avatar taken from the profile
//! - unmatched: `exists = false`, name and avatar left as they were
//!
//! Both get `last_update = max(previous, now)`.

use chrono::{DateTime, Utc};
use players_common::time::not_before;

use crate::models::{PlayerRecord, ProfileSet};

pub fn reconcile(
    requested: Vec<PlayerRecord>,
    found: &ProfileSet,
    now: DateTime<Utc>,
) -> Vec<PlayerRecord> {
    requested
        .into_iter()
        .map(|mut player| {
            match found.get(player.steam_id) {
                Some(profile) => {
                    player.exists = Some(true);
                    player.name = Some(profile.name.clone());
                    player.avatar = Some(profile.avatar.clone());
                }
                None => player.exists = Some(false),
            }
            player.last_update = Some(not_before(player.last_update, now));
            player
        })
        .collect()
}
