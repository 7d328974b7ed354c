//! Document-store seeds: user documents, rating documents and a manifest.
//!
//! Users are emitted in id order. Rating documents receive sequential ids
//! from 1 in that same traversal, so a user's `ratings` array always lists
//! ascending ids.

use std::collections::{BTreeSet, HashMap};
use std::path::Path;

use serde::Serialize;
use tracing::warn;

use crate::csv_source::{io_error, open_parent};
use crate::error::{ConfigurationError, InputError, SeedError};
use crate::model::{AppUser, EntityId, FavoriteKind, FavoriteRecord, ProfileStats, RatingRecord};
use crate::resolver::SeedSet;
use crate::sql::{APP_USER, SqlValue, parse_script};

/// File name of the user documents.
pub const USERS_FILE: &str = "users.json";
/// File name of the rating documents.
pub const RATINGS_FILE: &str = "ratings.json";
/// File name of the manifest.
pub const MANIFEST_FILE: &str = "manifest.json";

/// Favourite ids grouped by kind.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Favorites {
    /// Favourite anime ids.
    pub anime: Vec<EntityId>,
    /// Favourite character ids.
    pub characters: Vec<EntityId>,
    /// Favourite person ids.
    pub people: Vec<EntityId>,
}

/// A user document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserDocument {
    /// Application user id.
    pub id: EntityId,
    /// Watch list counters.
    pub stats: ProfileStats,
    /// Ids of the user's rating documents.
    pub ratings: Vec<EntityId>,
    /// Favourite ids.
    pub favorites: Favorites,
}

/// A rating document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RatingDocument {
    /// Sequential rating id.
    pub id: EntityId,
    /// Owning user.
    pub user_id: EntityId,
    /// Rated anime.
    pub anime_id: EntityId,
    /// Watch status in lower snake case.
    pub status: String,
    /// Score given.
    pub score: i64,
    /// Episodes watched.
    pub num_watched_episodes: i64,
}

/// Summary written next to the documents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Manifest {
    /// User documents file name.
    pub users_file: String,
    /// Rating documents file name.
    pub ratings_file: String,
    /// Number of user documents.
    pub users_count: usize,
    /// Number of rating documents.
    pub ratings_count: usize,
    /// Ids of the users covered, ascending.
    pub user_ids: Vec<EntityId>,
}

/// Restricts document references to a set of emitted entities.
///
/// `None` leaves that reference kind unrestricted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentScope {
    anime: Option<BTreeSet<EntityId>>,
    characters: Option<BTreeSet<EntityId>>,
    people: Option<BTreeSet<EntityId>>,
}

impl DocumentScope {
    /// Keeps every rating and favourite.
    #[must_use]
    pub fn unrestricted() -> Self {
        Self::default()
    }

    /// Keeps only references resolving inside `seed_set`.
    #[must_use]
    pub fn from_seed_set(seed_set: &SeedSet) -> Self {
        Self {
            anime: Some(seed_set.anime_ids()),
            characters: Some(seed_set.character_ids()),
            people: Some(seed_set.person_ids()),
        }
    }

    fn admits(&self, kind: FavoriteKind, id: EntityId) -> bool {
        let allowed = match kind {
            FavoriteKind::Anime => &self.anime,
            FavoriteKind::Character => &self.characters,
            FavoriteKind::Person => &self.people,
        };
        allowed.as_ref().is_none_or(|ids| ids.contains(&id))
    }
}

/// User and rating documents built together.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentSet {
    /// User documents, ascending by id.
    pub users: Vec<UserDocument>,
    /// Rating documents, ascending by id.
    pub ratings: Vec<RatingDocument>,
}

impl DocumentSet {
    /// Builds the manifest for this set.
    #[must_use]
    pub fn manifest(&self) -> Manifest {
        Manifest {
            users_file: USERS_FILE.to_owned(),
            ratings_file: RATINGS_FILE.to_owned(),
            users_count: self.users.len(),
            ratings_count: self.ratings.len(),
            user_ids: self.users.iter().map(|user| user.id).collect(),
        }
    }
}

/// Builds the documents for `users`.
///
/// `ratings` and `favorites` may hold rows of other users; they are matched
/// by username and kept in input order.
#[must_use]
pub fn build_documents(
    users: &[AppUser],
    ratings: &[RatingRecord],
    favorites: &[FavoriteRecord],
    scope: &DocumentScope,
) -> DocumentSet {
    let mut ratings_by_user: HashMap<&str, Vec<&RatingRecord>> = HashMap::new();
    for rating in ratings {
        if scope.admits(FavoriteKind::Anime, rating.anime_id) {
            ratings_by_user
                .entry(rating.username.as_str())
                .or_default()
                .push(rating);
        }
    }
    let mut favorites_by_user: HashMap<&str, Favorites> = HashMap::new();
    for favorite in favorites.iter().filter(|fav| scope.admits(fav.kind, fav.id)) {
        let entry = favorites_by_user
            .entry(favorite.username.as_str())
            .or_default();
        match favorite.kind {
            FavoriteKind::Anime => entry.anime.push(favorite.id),
            FavoriteKind::Character => entry.characters.push(favorite.id),
            FavoriteKind::Person => entry.people.push(favorite.id),
        }
    }

    let mut ordered: Vec<&AppUser> = users.iter().collect();
    ordered.sort_by_key(|user| user.id);

    let mut documents = DocumentSet::default();
    let mut next_rating: i64 = 1;
    for user in ordered {
        let mut rating_ids = Vec::new();
        for rating in ratings_by_user
            .get(user.username.as_str())
            .into_iter()
            .flatten()
        {
            let id = EntityId::new(next_rating);
            next_rating += 1;
            rating_ids.push(id);
            documents.ratings.push(RatingDocument {
                id,
                user_id: user.id,
                anime_id: rating.anime_id,
                status: rating.status.clone(),
                score: rating.score,
                num_watched_episodes: rating.num_watched_episodes,
            });
        }
        documents.users.push(UserDocument {
            id: user.id,
            stats: user.stats,
            ratings: rating_ids,
            favorites: favorites_by_user
                .remove(user.username.as_str())
                .unwrap_or_default(),
        });
    }
    documents
}

/// Parses a comma-separated list of user ids.
///
/// # Errors
///
/// Returns [`ConfigurationError::InvalidUserId`] for a non-integer entry or
/// [`ConfigurationError::EmptyUserIds`] when no ids remain.
pub fn parse_user_ids(raw: &str) -> Result<Vec<EntityId>, ConfigurationError> {
    let ids = raw
        .split([',', '\n', '\r'])
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(|item| {
            item.parse::<i64>()
                .map(EntityId::new)
                .map_err(|_| ConfigurationError::InvalidUserId {
                    value: item.to_owned(),
                })
        })
        .collect::<Result<Vec<_>, _>>()?;
    if ids.is_empty() {
        return Err(ConfigurationError::EmptyUserIds);
    }
    Ok(ids)
}

fn read_text(path: &Path) -> Result<String, InputError> {
    let (dir, file_name) = open_parent(path)?;
    dir.read_to_string(&file_name)
        .map_err(|err| io_error(path, &err))
}

/// Reads user ids from a file separated by commas or newlines.
///
/// # Errors
///
/// Returns [`SeedError::Input`] if the file cannot be read, or
/// [`SeedError::Configuration`] if it holds no valid ids.
pub fn parse_user_ids_file(path: &Path) -> Result<Vec<EntityId>, SeedError> {
    Ok(parse_user_ids(&read_text(path)?)?)
}

/// Collects the user ids inserted by an emitted `app_user` script.
///
/// # Errors
///
/// Returns [`SeedError::Input`] if the script cannot be read,
/// [`SeedError::Script`] if it does not parse, or
/// [`SeedError::Configuration`] if it inserts no users.
pub fn user_ids_from_app_user_script(path: &Path) -> Result<Vec<EntityId>, SeedError> {
    let contents = read_text(path)?;
    let statements = parse_script(&APP_USER.file_name(), &contents)?;
    let ids: Vec<EntityId> = statements
        .iter()
        .filter_map(|statement| match statement.value("id") {
            Some(SqlValue::Integer(id)) => Some(EntityId::new(*id)),
            _ => None,
        })
        .collect();
    if ids.is_empty() {
        return Err(ConfigurationError::EmptyUserIds.into());
    }
    Ok(ids)
}

/// Selects the users of `universe` whose ids were requested.
///
/// Unknown ids are logged and skipped.
///
/// # Errors
///
/// Returns [`ConfigurationError::NoKnownUsers`] if no requested id exists.
pub fn resolve_users(
    universe: &[AppUser],
    requested: &[EntityId],
) -> Result<Vec<AppUser>, ConfigurationError> {
    let wanted: BTreeSet<EntityId> = requested.iter().copied().collect();
    let found: Vec<AppUser> = universe
        .iter()
        .filter(|user| wanted.contains(&user.id))
        .cloned()
        .collect();
    let known: BTreeSet<EntityId> = found.iter().map(|user| user.id).collect();
    let missing: Vec<String> = wanted
        .difference(&known)
        .map(ToString::to_string)
        .collect();
    if !missing.is_empty() {
        warn!(missing = %missing.join(","), "some user ids were not found in the profile dataset");
    }
    if found.is_empty() {
        return Err(ConfigurationError::NoKnownUsers {
            requested: wanted.len(),
        });
    }
    Ok(found)
}
