//! Typed loaders for the CSV datasets.
//!
//! Each loader checks the file's header for its fixed column set before
//! reading rows. Identifier columns must hold integers; counters are read
//! leniently. Duplicate entity ids keep the first row.

use std::collections::{BTreeSet, HashSet};
use std::path::{Path, PathBuf};

use cap_std::fs::Dir;
use tracing::{debug, warn};

use crate::csv_source::{normalize_status, open_input_dir, read_rows};
use crate::distinct::split_list_cell;
use crate::error::InputError;
use crate::model::{
    Anime, AnimeCharacter, AnimeStaff, AppUser, Character, EntityId, FavoriteKind,
    FavoriteRecord, Named, Person, ProfileStats, RatingRecord,
};

/// Anime titles: `anime_id, title, type, episodes, score, genres`.
pub const ANIME_CSV: &str = "anime.csv";
/// Characters: `character_id, name`.
pub const CHARACTERS_CSV: &str = "characters.csv";
/// People: `person_id, name`.
pub const PEOPLE_CSV: &str = "people.csv";
/// Anime to character links: `anime_id, character_id, role`.
pub const ANIME_CHARACTERS_CSV: &str = "anime_characters.csv";
/// Anime to staff links: `anime_id, person_id, position`.
pub const ANIME_STAFF_CSV: &str = "anime_staff.csv";
/// User profiles: `username, gender, joined, watching, completed, on_hold,
/// dropped, plan_to_watch`.
pub const PROFILES_CSV: &str = "profiles.csv";
/// User favourites: `username, fav_type, id`.
pub const FAVS_CSV: &str = "favs.csv";
/// User ratings: `username, anime_id, status, score, num_watched_episodes`.
pub const RATINGS_CSV: &str = "ratings.csv";

/// A directory of CSV datasets opened with a capability handle.
#[derive(Debug)]
pub struct DatasetDir {
    root: PathBuf,
    dir: Dir,
}

impl DatasetDir {
    /// Opens the dataset directory.
    ///
    /// # Errors
    ///
    /// Returns [`InputError::MissingFile`] if the directory does not exist,
    /// or [`InputError::Io`] if it cannot be opened.
    pub fn open(root: &Path) -> Result<Self, InputError> {
        Ok(Self {
            root: root.to_path_buf(),
            dir: open_input_dir(root)?,
        })
    }

    /// Returns the directory path.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Loads `anime.csv` in file order.
    ///
    /// The `genres` cell may be a list (`["Action", "Drama"]`) or a plain
    /// comma-separated string.
    ///
    /// # Errors
    ///
    /// Returns [`InputError`] if the file is missing, malformed, lacks a
    /// column, or holds a non-integer `anime_id`.
    pub fn load_anime(&self) -> Result<Vec<Anime>, InputError> {
        let mut seen = HashSet::new();
        read_rows(
            &self.dir,
            &self.root,
            ANIME_CSV,
            &["anime_id", "title", "type", "episodes", "score", "genres"],
            |row| {
                let id = row.id(0, "anime_id")?;
                if !seen.insert(id) {
                    warn!(file = ANIME_CSV, %id, line = row.line(), "duplicate anime id ignored");
                    return Ok(None);
                }
                Ok(Some(Anime {
                    id,
                    title: row.text(1).to_owned(),
                    media_type: row.optional_text(2),
                    episodes: row.optional_int(3),
                    score: row.optional_float(4),
                    genres: parse_genres(row.text(5)),
                }))
            },
        )
    }

    /// Loads `characters.csv`.
    ///
    /// # Errors
    ///
    /// Returns [`InputError`] on a missing file, bad header or bad id.
    pub fn load_characters(&self) -> Result<Vec<Character>, InputError> {
        self.load_named(CHARACTERS_CSV, "character_id")
    }

    /// Loads `people.csv`.
    ///
    /// # Errors
    ///
    /// Returns [`InputError`] on a missing file, bad header or bad id.
    pub fn load_people(&self) -> Result<Vec<Person>, InputError> {
        self.load_named(PEOPLE_CSV, "person_id")
    }

    fn load_named(&self, file_name: &str, id_column: &'static str) -> Result<Vec<Named>, InputError> {
        let mut seen = HashSet::new();
        read_rows(&self.dir, &self.root, file_name, &[id_column, "name"], |row| {
            let id = row.id(0, id_column)?;
            if !seen.insert(id) {
                warn!(file = file_name, %id, line = row.line(), "duplicate id ignored");
                return Ok(None);
            }
            Ok(Some(Named {
                id,
                name: row.text(1).to_owned(),
            }))
        })
    }

    /// Loads `anime_characters.csv`.
    ///
    /// # Errors
    ///
    /// Returns [`InputError`] on a missing file, bad header or bad id.
    pub fn load_anime_characters(&self) -> Result<Vec<AnimeCharacter>, InputError> {
        read_rows(
            &self.dir,
            &self.root,
            ANIME_CHARACTERS_CSV,
            &["anime_id", "character_id", "role"],
            |row| {
                Ok(Some(AnimeCharacter {
                    anime_id: row.id(0, "anime_id")?,
                    character_id: row.id(1, "character_id")?,
                    role: row.optional_text(2),
                }))
            },
        )
    }

    /// Loads `anime_staff.csv`.
    ///
    /// # Errors
    ///
    /// Returns [`InputError`] on a missing file, bad header or bad id.
    pub fn load_anime_staff(&self) -> Result<Vec<AnimeStaff>, InputError> {
        read_rows(
            &self.dir,
            &self.root,
            ANIME_STAFF_CSV,
            &["anime_id", "person_id", "position"],
            |row| {
                Ok(Some(AnimeStaff {
                    anime_id: row.id(0, "anime_id")?,
                    person_id: row.id(1, "person_id")?,
                    position: row.optional_text(2),
                }))
            },
        )
    }

    /// Loads `profiles.csv` as application users.
    ///
    /// A user's id is the one-based position of its data row, so ids stay
    /// stable for a given file. Rows repeating an earlier username or lacking
    /// one are skipped but still consume their position.
    ///
    /// # Errors
    ///
    /// Returns [`InputError`] on a missing file or bad header.
    pub fn load_users(&self) -> Result<Vec<AppUser>, InputError> {
        let mut seen = HashSet::new();
        let mut position: i64 = 0;
        read_rows(
            &self.dir,
            &self.root,
            PROFILES_CSV,
            &[
                "username",
                "gender",
                "joined",
                "watching",
                "completed",
                "on_hold",
                "dropped",
                "plan_to_watch",
            ],
            |row| {
                position += 1;
                let username = row.text(0);
                if username.is_empty() || !seen.insert(username.to_owned()) {
                    debug!(file = PROFILES_CSV, line = row.line(), "profile row skipped");
                    return Ok(None);
                }
                Ok(Some(AppUser {
                    id: EntityId::new(position),
                    username: username.to_owned(),
                    gender: row.optional_text(1),
                    joined: row.optional_text(2),
                    stats: ProfileStats {
                        watching: row.count(3),
                        completed: row.count(4),
                        on_hold: row.count(5),
                        dropped: row.count(6),
                        plan_to_watch: row.count(7),
                    },
                }))
            },
        )
    }

    /// Loads `favs.csv`, keeping rows owned by `usernames` when given.
    ///
    /// Rows with an unknown `fav_type` or a non-positive id are skipped.
    ///
    /// # Errors
    ///
    /// Returns [`InputError`] on a missing file or bad header.
    pub fn load_favorites(
        &self,
        usernames: Option<&BTreeSet<String>>,
    ) -> Result<Vec<FavoriteRecord>, InputError> {
        read_rows(
            &self.dir,
            &self.root,
            FAVS_CSV,
            &["username", "fav_type", "id"],
            |row| {
                let username = row.text(0);
                if usernames.is_some_and(|wanted| !wanted.contains(username)) {
                    return Ok(None);
                }
                let Some(kind) = FavoriteKind::parse(row.text(1)) else {
                    return Ok(None);
                };
                let id = row.count(2);
                if id <= 0 {
                    return Ok(None);
                }
                Ok(Some(FavoriteRecord {
                    username: username.to_owned(),
                    kind,
                    id: EntityId::new(id),
                }))
            },
        )
    }

    /// Loads `ratings.csv` rows owned by `usernames`, in file order.
    ///
    /// # Errors
    ///
    /// Returns [`InputError`] on a missing file or bad header.
    pub fn load_ratings(
        &self,
        usernames: &BTreeSet<String>,
    ) -> Result<Vec<RatingRecord>, InputError> {
        read_rows(
            &self.dir,
            &self.root,
            RATINGS_CSV,
            &["username", "anime_id", "status", "score", "num_watched_episodes"],
            |row| {
                let username = row.text(0);
                if !usernames.contains(username) {
                    return Ok(None);
                }
                Ok(Some(RatingRecord {
                    username: username.to_owned(),
                    anime_id: EntityId::new(row.count(1)),
                    status: normalize_status(row.text(2)),
                    score: row.count(3),
                    num_watched_episodes: row.count(4),
                }))
            },
        )
    }
}

fn parse_genres(raw: &str) -> Vec<String> {
    split_list_cell(raw).unwrap_or_else(|| {
        raw.split(',')
            .map(str::trim)
            .filter(|genre| !genre.is_empty())
            .map(str::to_owned)
            .collect()
    })
}

/// Every dataset the relational seed needs, loaded into memory.
#[derive(Debug, Clone, PartialEq)]
pub struct Datasets {
    /// Anime universe in file order.
    pub anime: Vec<Anime>,
    /// Character table.
    pub characters: Vec<Character>,
    /// Person table.
    pub people: Vec<Person>,
    /// Anime to character links.
    pub anime_characters: Vec<AnimeCharacter>,
    /// Anime to staff links.
    pub anime_staff: Vec<AnimeStaff>,
    /// User universe in file order.
    pub users: Vec<AppUser>,
    /// Every favourites row.
    pub favorites: Vec<FavoriteRecord>,
}

impl Datasets {
    /// Loads every dataset the relational seed needs.
    ///
    /// # Errors
    ///
    /// Returns the first [`InputError`] met.
    pub fn load(dir: &DatasetDir) -> Result<Self, InputError> {
        let datasets = Self {
            anime: dir.load_anime()?,
            characters: dir.load_characters()?,
            people: dir.load_people()?,
            anime_characters: dir.load_anime_characters()?,
            anime_staff: dir.load_anime_staff()?,
            users: dir.load_users()?,
            favorites: dir.load_favorites(None)?,
        };
        debug!(
            root = %dir.root().display(),
            anime = datasets.anime.len(),
            characters = datasets.characters.len(),
            people = datasets.people.len(),
            users = datasets.users.len(),
            "datasets loaded"
        );
        Ok(datasets)
    }
}
