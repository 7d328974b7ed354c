//! Entity, junction and record types loaded from the datasets.
//!
//! Primary entities (anime, app users) are sampled; secondary entities
//! (characters, people) are only carried into a seed set when a retained
//! junction row references them.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Integer identifier shared by every entity table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(i64);

impl EntityId {
    /// Wraps a raw identifier.
    #[must_use]
    pub const fn new(raw: i64) -> Self {
        Self(raw)
    }

    /// Returns the raw identifier.
    #[must_use]
    pub const fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for EntityId {
    fn from(raw: i64) -> Self {
        Self(raw)
    }
}

/// A row with its own identifier.
pub trait Entity {
    /// Returns the row's identifier.
    fn id(&self) -> EntityId;
}

/// An association row between a primary entity and a related entity.
pub trait Junction {
    /// Identifier on the primary (sampled) side.
    fn entity_id(&self) -> EntityId;
    /// Identifier on the related side.
    fn related_id(&self) -> EntityId;
}

/// An anime title.
#[derive(Debug, Clone, PartialEq)]
pub struct Anime {
    /// Anime identifier.
    pub id: EntityId,
    /// Display title.
    pub title: String,
    /// Media type such as `TV` or `Movie`.
    pub media_type: Option<String>,
    /// Episode count, when known.
    pub episodes: Option<i64>,
    /// Average score, when known.
    pub score: Option<f64>,
    /// Genre names in dataset order.
    pub genres: Vec<String>,
}

/// An application user derived from a profile row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppUser {
    /// One-based position of the profile row.
    pub id: EntityId,
    /// Unique username.
    pub username: String,
    /// Self-reported gender, when present.
    pub gender: Option<String>,
    /// Join date as recorded in the dataset.
    pub joined: Option<String>,
    /// Watch list counters from the profile row.
    pub stats: ProfileStats,
}

/// A named secondary entity (character or person).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Named {
    /// Identifier.
    pub id: EntityId,
    /// Display name.
    pub name: String,
}

/// An anime character.
pub type Character = Named;

/// A real person (staff or voice actor).
pub type Person = Named;

/// A genre lookup row.
pub type Genre = Named;

macro_rules! impl_entity {
    ($($ty:ty),+ $(,)?) => {
        $(impl Entity for $ty {
            fn id(&self) -> EntityId {
                self.id
            }
        })+
    };
}

impl_entity!(Anime, AppUser, Named);

impl Entity for EntityId {
    fn id(&self) -> EntityId {
        *self
    }
}

/// Links an anime to a genre.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnimeGenre {
    /// Anime identifier.
    pub anime_id: EntityId,
    /// Genre identifier.
    pub genre_id: EntityId,
}

/// Links an anime to one of its characters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnimeCharacter {
    /// Anime identifier.
    pub anime_id: EntityId,
    /// Character identifier.
    pub character_id: EntityId,
    /// Role such as `Main` or `Supporting`.
    pub role: Option<String>,
}

/// Links an anime to a staff member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnimeStaff {
    /// Anime identifier.
    pub anime_id: EntityId,
    /// Person identifier.
    pub person_id: EntityId,
    /// Staff position such as `Director`.
    pub position: Option<String>,
}

/// Links a user to a favourite anime, character or person.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UserFavorite {
    /// User identifier.
    pub user_id: EntityId,
    /// Identifier of the favourite.
    pub related_id: EntityId,
}

impl Junction for AnimeGenre {
    fn entity_id(&self) -> EntityId {
        self.anime_id
    }

    fn related_id(&self) -> EntityId {
        self.genre_id
    }
}

impl Junction for AnimeCharacter {
    fn entity_id(&self) -> EntityId {
        self.anime_id
    }

    fn related_id(&self) -> EntityId {
        self.character_id
    }
}

impl Junction for AnimeStaff {
    fn entity_id(&self) -> EntityId {
        self.anime_id
    }

    fn related_id(&self) -> EntityId {
        self.person_id
    }
}

impl Junction for UserFavorite {
    fn entity_id(&self) -> EntityId {
        self.user_id
    }

    fn related_id(&self) -> EntityId {
        self.related_id
    }
}

/// What a favourites row points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FavoriteKind {
    /// An anime title.
    Anime,
    /// A character.
    Character,
    /// A person.
    Person,
}

impl FavoriteKind {
    /// Parses the dataset's `fav_type` column.
    ///
    /// Unknown kinds yield `None` and the row is skipped.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "anime" => Some(Self::Anime),
            "character" => Some(Self::Character),
            "people" | "person" => Some(Self::Person),
            _ => None,
        }
    }
}

/// A favourites row keyed by username, as read from `favs.csv`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FavoriteRecord {
    /// Username owning the favourite.
    pub username: String,
    /// Kind of favourite.
    pub kind: FavoriteKind,
    /// Identifier of the favourite.
    pub id: EntityId,
}

/// A rating row keyed by username, as read from `ratings.csv`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RatingRecord {
    /// Username owning the rating.
    pub username: String,
    /// Rated anime.
    pub anime_id: EntityId,
    /// Watch status in lower snake case.
    pub status: String,
    /// Score given by the user.
    pub score: i64,
    /// Episodes watched.
    pub num_watched_episodes: i64,
}

/// Watch list counters from a profile row.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileStats {
    /// Titles currently being watched.
    pub watching: i64,
    /// Titles completed.
    pub completed: i64,
    /// Titles on hold.
    pub on_hold: i64,
    /// Titles dropped.
    pub dropped: i64,
    /// Titles planned.
    pub plan_to_watch: i64,
}
