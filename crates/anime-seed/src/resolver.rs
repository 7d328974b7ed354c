//! Derivation of a referentially closed seed set from sampled primaries.
//!
//! Junction rows survive only when their primary side was sampled. Related
//! ids then either pull their entity into the seed set (characters, people)
//! or must already belong to it (anime favourites, genres). A related id that
//! does not exist in its source table is reported as a [`ReferentialIssue`]
//! and the row is dropped.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;

use tracing::{info, warn};

use crate::datasets::Datasets;
use crate::error::ClosureError;
use crate::model::{
    Anime, AnimeCharacter, AnimeGenre, AnimeStaff, AppUser, Character, Entity, EntityId,
    FavoriteKind, Genre, Junction, Named, Person, UserFavorite,
};
use crate::sampler::PrimarySample;

/// A junction row dropped because its related id is absent from the source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferentialIssue {
    /// Junction table the row belonged to.
    pub table: &'static str,
    /// Column holding the unresolved id.
    pub column: &'static str,
    /// Primary-side id of the dropped row.
    pub entity_id: EntityId,
    /// The id that could not be resolved.
    pub missing_id: EntityId,
}

impl fmt::Display for ReferentialIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{} {} (referenced by {}) does not exist in the source data",
            self.table, self.column, self.missing_id, self.entity_id
        )
    }
}

/// How a junction's related endpoint is treated.
#[derive(Debug, Clone, Copy)]
pub enum Endpoint<'a> {
    /// Referenced ids join the output; they only need to exist in `known`.
    Closure {
        /// Every id present in the related source table.
        known: &'a BTreeSet<EntityId>,
    },
    /// Rows are kept only when the related id is already in `included`.
    Restricted {
        /// Every id present in the related source table.
        known: &'a BTreeSet<EntityId>,
        /// Ids already part of the output.
        included: &'a BTreeSet<EntityId>,
    },
}

/// Rows retained from one junction table and the related ids they reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved<R> {
    /// Retained rows in source order.
    pub rows: Vec<R>,
    /// Related ids referenced by the retained rows.
    pub referenced: BTreeSet<EntityId>,
}

/// Filters one junction table against the sampled primaries.
///
/// Dropped rows whose related id does not exist are appended to `issues`
/// and logged as warnings.
pub fn resolve_junction<R: Junction + Clone>(
    table: &'static str,
    related_column: &'static str,
    rows: &[R],
    sampled: &BTreeSet<EntityId>,
    endpoint: Endpoint<'_>,
    issues: &mut Vec<ReferentialIssue>,
) -> Resolved<R> {
    let mut resolved = Resolved {
        rows: Vec::new(),
        referenced: BTreeSet::new(),
    };
    for row in rows.iter().filter(|row| sampled.contains(&row.entity_id())) {
        let related = row.related_id();
        let (known, included) = match endpoint {
            Endpoint::Closure { known } => (known, None),
            Endpoint::Restricted { known, included } => (known, Some(included)),
        };
        if !known.contains(&related) {
            let issue = ReferentialIssue {
                table,
                column: related_column,
                entity_id: row.entity_id(),
                missing_id: related,
            };
            warn!(%issue, "junction row dropped");
            issues.push(issue);
            continue;
        }
        if included.is_some_and(|ids| !ids.contains(&related)) {
            continue;
        }
        resolved.referenced.insert(related);
        resolved.rows.push(row.clone());
    }
    resolved
}

/// Keeps the entities whose id is in `ids`, preserving source order.
#[must_use]
pub fn retain_referenced<E: Entity + Clone>(entities: &[E], ids: &BTreeSet<EntityId>) -> Vec<E> {
    entities
        .iter()
        .filter(|entity| ids.contains(&entity.id()))
        .cloned()
        .collect()
}

fn id_set<E: Entity>(entities: &[E]) -> BTreeSet<EntityId> {
    entities.iter().map(Entity::id).collect()
}

/// Builds the genre lookup: sorted distinct names with ids from 1.
#[must_use]
pub fn genre_lookup(anime: &[Anime]) -> Vec<Genre> {
    let names: BTreeSet<&str> = anime
        .iter()
        .flat_map(|title| title.genres.iter().map(String::as_str))
        .collect();
    names
        .into_iter()
        .zip(1_i64..)
        .map(|(name, id)| Named {
            id: EntityId::new(id),
            name: name.to_owned(),
        })
        .collect()
}

/// The resolved, referentially closed seed set.
#[derive(Debug, Clone, PartialEq)]
pub struct SeedSet {
    /// Genre lookup table (always complete).
    pub genres: Vec<Genre>,
    /// Sampled anime.
    pub anime: Vec<Anime>,
    /// Characters referenced by retained rows.
    pub characters: Vec<Character>,
    /// People referenced by retained rows.
    pub people: Vec<Person>,
    /// Genres of the sampled anime.
    pub anime_genres: Vec<AnimeGenre>,
    /// Characters of the sampled anime.
    pub anime_characters: Vec<AnimeCharacter>,
    /// Staff of the sampled anime.
    pub anime_staff: Vec<AnimeStaff>,
    /// Sampled users.
    pub users: Vec<AppUser>,
    /// Favourite anime of sampled users, restricted to sampled anime.
    pub favorite_anime: Vec<UserFavorite>,
    /// Favourite characters of sampled users.
    pub favorite_characters: Vec<UserFavorite>,
    /// Favourite people of sampled users.
    pub favorite_people: Vec<UserFavorite>,
    /// Rows dropped for dangling references.
    pub issues: Vec<ReferentialIssue>,
}

impl SeedSet {
    /// Derives every dependent row for `sample`.
    #[must_use]
    pub fn resolve(datasets: &Datasets, sample: &PrimarySample) -> Self {
        let mut issues = Vec::new();

        let anime = retain_referenced(&datasets.anime, &sample.anime);
        let genres = genre_lookup(&datasets.anime);
        let anime_genres = link_genres(&anime, &genres);

        let known_anime = id_set(&datasets.anime);
        let known_characters = id_set(&datasets.characters);
        let known_people = id_set(&datasets.people);

        let anime_characters = resolve_junction(
            "anime_character",
            "character_id",
            &datasets.anime_characters,
            &sample.anime,
            Endpoint::Closure {
                known: &known_characters,
            },
            &mut issues,
        );
        let anime_staff = resolve_junction(
            "anime_staff",
            "person_id",
            &datasets.anime_staff,
            &sample.anime,
            Endpoint::Closure {
                known: &known_people,
            },
            &mut issues,
        );

        let users = retain_referenced(&datasets.users, &sample.users);
        let mut favorites = favorites_by_kind(datasets, &users);
        let favorite_anime = resolve_junction(
            "user_favorite_anime",
            "anime_id",
            &favorites.remove(&FavoriteKind::Anime).unwrap_or_default(),
            &sample.users,
            Endpoint::Restricted {
                known: &known_anime,
                included: &sample.anime,
            },
            &mut issues,
        );
        let favorite_characters = resolve_junction(
            "user_favorite_character",
            "character_id",
            &favorites.remove(&FavoriteKind::Character).unwrap_or_default(),
            &sample.users,
            Endpoint::Closure {
                known: &known_characters,
            },
            &mut issues,
        );
        let favorite_people = resolve_junction(
            "user_favorite_person",
            "person_id",
            &favorites.remove(&FavoriteKind::Person).unwrap_or_default(),
            &sample.users,
            Endpoint::Closure {
                known: &known_people,
            },
            &mut issues,
        );

        let character_ids: BTreeSet<EntityId> = anime_characters
            .referenced
            .union(&favorite_characters.referenced)
            .copied()
            .collect();
        let person_ids: BTreeSet<EntityId> = anime_staff
            .referenced
            .union(&favorite_people.referenced)
            .copied()
            .collect();

        let seed_set = Self {
            genres,
            anime,
            characters: retain_referenced(&datasets.characters, &character_ids),
            people: retain_referenced(&datasets.people, &person_ids),
            anime_genres,
            anime_characters: anime_characters.rows,
            anime_staff: anime_staff.rows,
            users,
            favorite_anime: favorite_anime.rows,
            favorite_characters: favorite_characters.rows,
            favorite_people: favorite_people.rows,
            issues,
        };
        info!(
            anime = seed_set.anime.len(),
            characters = seed_set.characters.len(),
            people = seed_set.people.len(),
            users = seed_set.users.len(),
            dropped = seed_set.issues.len(),
            "seed set resolved"
        );
        seed_set
    }

    /// Ids of the anime in the seed set.
    #[must_use]
    pub fn anime_ids(&self) -> BTreeSet<EntityId> {
        id_set(&self.anime)
    }

    /// Ids of the characters in the seed set.
    #[must_use]
    pub fn character_ids(&self) -> BTreeSet<EntityId> {
        id_set(&self.characters)
    }

    /// Ids of the people in the seed set.
    #[must_use]
    pub fn person_ids(&self) -> BTreeSet<EntityId> {
        id_set(&self.people)
    }

    /// Ids of the users in the seed set.
    #[must_use]
    pub fn user_ids(&self) -> BTreeSet<EntityId> {
        id_set(&self.users)
    }

    /// Checks that every junction endpoint resolves inside the seed set.
    ///
    /// # Errors
    ///
    /// Returns [`ClosureError::DanglingReference`] for the first endpoint
    /// that does not resolve.
    pub fn verify_closure(&self) -> Result<(), ClosureError> {
        let anime = self.anime_ids();
        let genres = id_set(&self.genres);
        let characters = self.character_ids();
        let people = self.person_ids();
        let users = self.user_ids();

        check_links("anime_genre", ("anime_id", "genre_id"), &self.anime_genres, &anime, &genres)?;
        check_links(
            "anime_character",
            ("anime_id", "character_id"),
            &self.anime_characters,
            &anime,
            &characters,
        )?;
        check_links("anime_staff", ("anime_id", "person_id"), &self.anime_staff, &anime, &people)?;
        check_links(
            "user_favorite_anime",
            ("user_id", "anime_id"),
            &self.favorite_anime,
            &users,
            &anime,
        )?;
        check_links(
            "user_favorite_character",
            ("user_id", "character_id"),
            &self.favorite_characters,
            &users,
            &characters,
        )?;
        check_links(
            "user_favorite_person",
            ("user_id", "person_id"),
            &self.favorite_people,
            &users,
            &people,
        )
    }
}

fn check_links<R: Junction>(
    table: &'static str,
    (entity_column, related_column): (&'static str, &'static str),
    rows: &[R],
    entities: &BTreeSet<EntityId>,
    related: &BTreeSet<EntityId>,
) -> Result<(), ClosureError> {
    for row in rows {
        if !entities.contains(&row.entity_id()) {
            return Err(ClosureError::DanglingReference {
                table,
                column: entity_column,
                id: row.entity_id(),
            });
        }
        if !related.contains(&row.related_id()) {
            return Err(ClosureError::DanglingReference {
                table,
                column: related_column,
                id: row.related_id(),
            });
        }
    }
    Ok(())
}

fn link_genres(anime: &[Anime], genres: &[Genre]) -> Vec<AnimeGenre> {
    let by_name: HashMap<&str, EntityId> = genres
        .iter()
        .map(|genre| (genre.name.as_str(), genre.id))
        .collect();
    anime
        .iter()
        .flat_map(|title| {
            let ids: BTreeSet<EntityId> = title
                .genres
                .iter()
                .filter_map(|name| by_name.get(name.as_str()).copied())
                .collect();
            ids.into_iter().map(|genre_id| AnimeGenre {
                anime_id: title.id,
                genre_id,
            })
        })
        .collect()
}

fn favorites_by_kind(
    datasets: &Datasets,
    users: &[AppUser],
) -> BTreeMap<FavoriteKind, Vec<UserFavorite>> {
    let ids: HashMap<&str, EntityId> = users
        .iter()
        .map(|user| (user.username.as_str(), user.id))
        .collect();
    let mut grouped: BTreeMap<FavoriteKind, Vec<UserFavorite>> = BTreeMap::new();
    for record in &datasets.favorites {
        if let Some(&user_id) = ids.get(record.username.as_str()) {
            grouped.entry(record.kind).or_default().push(UserFavorite {
                user_id,
                related_id: record.id,
            });
        }
    }
    grouped
}
