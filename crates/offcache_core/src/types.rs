//! Collection tags and sync status.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// The closed set of collections the cache knows about.
///
/// Adding a collection means adding a variant here and a descriptor in
/// [`crate::CollectionRegistry::standard`]; ad-hoc string names are not
/// accepted anywhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollectionTag {
    /// Teams.
    Teams,
    /// Players.
    Players,
    /// Coaches.
    Coaches,
    /// Games.
    Games,
    /// Stories.
    Stories,
    /// Rewards.
    Rewards,
    /// Special offers.
    SpecialOffers,
    /// Birthday packages.
    BirthdayPackages,
    /// Birthday FAQs.
    BirthdayFaqs,
    /// Promotions.
    Promotions,
    /// Halftime activities.
    HalftimeActivities,
    /// Per-user preferences.
    UserPreferences,
    /// Schools.
    Schools,
}

impl CollectionTag {
    /// Every tag, in declaration order.
    pub const ALL: [CollectionTag; 13] = [
        CollectionTag::Teams,
        CollectionTag::Players,
        CollectionTag::Coaches,
        CollectionTag::Games,
        CollectionTag::Stories,
        CollectionTag::Rewards,
        CollectionTag::SpecialOffers,
        CollectionTag::BirthdayPackages,
        CollectionTag::BirthdayFaqs,
        CollectionTag::Promotions,
        CollectionTag::HalftimeActivities,
        CollectionTag::UserPreferences,
        CollectionTag::Schools,
    ];

    /// Returns the stable storage name of the collection.
    pub const fn as_str(&self) -> &'static str {
        match self {
            CollectionTag::Teams => "teams",
            CollectionTag::Players => "players",
            CollectionTag::Coaches => "coaches",
            CollectionTag::Games => "games",
            CollectionTag::Stories => "stories",
            CollectionTag::Rewards => "rewards",
            CollectionTag::SpecialOffers => "special_offers",
            CollectionTag::BirthdayPackages => "birthday_packages",
            CollectionTag::BirthdayFaqs => "birthday_faqs",
            CollectionTag::Promotions => "promotions",
            CollectionTag::HalftimeActivities => "halftime_activities",
            CollectionTag::UserPreferences => "user_preferences",
            CollectionTag::Schools => "schools",
        }
    }
}

impl fmt::Display for CollectionTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown collection name.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown collection: {0}")]
pub struct ParseCollectionTagError(pub String);

impl FromStr for CollectionTag {
    type Err = ParseCollectionTagError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CollectionTag::ALL
            .into_iter()
            .find(|tag| tag.as_str() == s)
            .ok_or_else(|| ParseCollectionTagError(s.to_string()))
    }
}

/// Where a record stands relative to the remote service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SyncStatus {
    /// Matches the last known server state.
    Synced,
    /// Has a local mutation the server has not acknowledged.
    Pending,
    /// Changed both locally and remotely; waiting for a resolution.
    Conflict,
    /// The server rejected the last push permanently.
    Error,
}

impl SyncStatus {
    /// Returns true if the record carries local changes the server lacks.
    pub fn has_local_changes(&self) -> bool {
        matches!(self, SyncStatus::Pending | SyncStatus::Conflict)
    }
}
