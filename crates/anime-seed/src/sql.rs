//! Idempotent SQL seed statements.
//!
//! Each seed table renders one `INSERT ... ON CONFLICT DO NOTHING` statement
//! per row into its own numbered script. The numbering fixes the load order:
//! lookups and primaries first, then the junctions that reference them.
//! [`parse_script`] reads the same statement shape back for replay.

use std::fmt;

use crate::error::ScriptError;
use crate::model::{
    Anime, AnimeCharacter, AnimeGenre, AnimeStaff, AppUser, EntityId, Named, UserFavorite,
};
use crate::resolver::SeedSet;

/// A literal in an `INSERT` statement.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    /// `NULL`.
    Null,
    /// An integer literal.
    Integer(i64),
    /// A decimal literal.
    Real(f64),
    /// A single-quoted string literal.
    Text(String),
}

impl SqlValue {
    fn text(value: &str) -> Self {
        Self::Text(value.to_owned())
    }

    fn optional_text(value: Option<&String>) -> Self {
        value.map_or(Self::Null, |text| Self::Text(text.clone()))
    }

    const fn id(value: EntityId) -> Self {
        Self::Integer(value.get())
    }
}

impl fmt::Display for SqlValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("NULL"),
            Self::Integer(value) => write!(f, "{value}"),
            Self::Real(value) if value.is_finite() => write!(f, "{value:?}"),
            Self::Real(_) => f.write_str("NULL"),
            Self::Text(value) => write!(f, "'{}'", value.replace('\'', "''")),
        }
    }
}

/// Static description of a seed table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeedTable {
    /// Script number prefix.
    pub prefix: &'static str,
    /// Table name.
    pub name: &'static str,
    /// Inserted columns in statement order.
    pub columns: &'static [&'static str],
    /// Columns forming the table's uniqueness constraint.
    pub key: &'static [&'static str],
}

impl SeedTable {
    /// Name of the script holding this table's statements.
    #[must_use]
    pub fn file_name(&self) -> String {
        format!("{}_{}_seed.sql", self.prefix, self.name)
    }
}

/// Genre lookup.
pub const GENRE: SeedTable = SeedTable {
    prefix: "001",
    name: "genre",
    columns: &["id", "name"],
    key: &["id"],
};
/// Anime titles.
pub const ANIME: SeedTable = SeedTable {
    prefix: "010",
    name: "anime",
    columns: &["id", "title", "type", "episodes", "score"],
    key: &["id"],
};
/// Characters.
pub const CHARACTER: SeedTable = SeedTable {
    prefix: "011",
    name: "character",
    columns: &["id", "name"],
    key: &["id"],
};
/// People.
pub const PERSON: SeedTable = SeedTable {
    prefix: "012",
    name: "person",
    columns: &["id", "name"],
    key: &["id"],
};
/// Anime to genre links.
pub const ANIME_GENRE: SeedTable = SeedTable {
    prefix: "013",
    name: "anime_genre",
    columns: &["anime_id", "genre_id"],
    key: &["anime_id", "genre_id"],
};
/// Anime to character links.
pub const ANIME_CHARACTER: SeedTable = SeedTable {
    prefix: "014",
    name: "anime_character",
    columns: &["anime_id", "character_id", "role"],
    key: &["anime_id", "character_id"],
};
/// Anime to staff links.
pub const ANIME_STAFF: SeedTable = SeedTable {
    prefix: "015",
    name: "anime_staff",
    columns: &["anime_id", "person_id", "position"],
    key: &["anime_id", "person_id", "position"],
};
/// Application users.
pub const APP_USER: SeedTable = SeedTable {
    prefix: "021",
    name: "app_user",
    columns: &["id", "username", "gender", "joined"],
    key: &["id"],
};
/// Favourite anime.
pub const USER_FAVORITE_ANIME: SeedTable = SeedTable {
    prefix: "022",
    name: "user_favorite_anime",
    columns: &["user_id", "anime_id"],
    key: &["user_id", "anime_id"],
};
/// Favourite characters.
pub const USER_FAVORITE_CHARACTER: SeedTable = SeedTable {
    prefix: "023",
    name: "user_favorite_character",
    columns: &["user_id", "character_id"],
    key: &["user_id", "character_id"],
};
/// Favourite people.
pub const USER_FAVORITE_PERSON: SeedTable = SeedTable {
    prefix: "024",
    name: "user_favorite_person",
    columns: &["user_id", "person_id"],
    key: &["user_id", "person_id"],
};

/// Every seed table in load order.
pub const SEED_TABLES: [SeedTable; 11] = [
    GENRE,
    ANIME,
    CHARACTER,
    PERSON,
    ANIME_GENRE,
    ANIME_CHARACTER,
    ANIME_STAFF,
    APP_USER,
    USER_FAVORITE_ANIME,
    USER_FAVORITE_CHARACTER,
    USER_FAVORITE_PERSON,
];

/// Looks up a seed table by name.
#[must_use]
pub fn seed_table(name: &str) -> Option<&'static SeedTable> {
    SEED_TABLES.iter().find(|table| table.name == name)
}

/// A row that renders into an `INSERT` statement.
pub trait SqlRow {
    /// Values in the column order of the row's table.
    fn sql_values(&self) -> Vec<SqlValue>;
}

impl SqlRow for Named {
    fn sql_values(&self) -> Vec<SqlValue> {
        vec![SqlValue::id(self.id), SqlValue::text(&self.name)]
    }
}

impl SqlRow for Anime {
    fn sql_values(&self) -> Vec<SqlValue> {
        vec![
            SqlValue::id(self.id),
            SqlValue::text(&self.title),
            SqlValue::optional_text(self.media_type.as_ref()),
            self.episodes.map_or(SqlValue::Null, SqlValue::Integer),
            self.score.map_or(SqlValue::Null, SqlValue::Real),
        ]
    }
}

impl SqlRow for AnimeGenre {
    fn sql_values(&self) -> Vec<SqlValue> {
        vec![SqlValue::id(self.anime_id), SqlValue::id(self.genre_id)]
    }
}

impl SqlRow for AnimeCharacter {
    fn sql_values(&self) -> Vec<SqlValue> {
        vec![
            SqlValue::id(self.anime_id),
            SqlValue::id(self.character_id),
            SqlValue::optional_text(self.role.as_ref()),
        ]
    }
}

impl SqlRow for AnimeStaff {
    fn sql_values(&self) -> Vec<SqlValue> {
        vec![
            SqlValue::id(self.anime_id),
            SqlValue::id(self.person_id),
            SqlValue::optional_text(self.position.as_ref()),
        ]
    }
}

impl SqlRow for AppUser {
    fn sql_values(&self) -> Vec<SqlValue> {
        vec![
            SqlValue::id(self.id),
            SqlValue::text(&self.username),
            SqlValue::optional_text(self.gender.as_ref()),
            SqlValue::optional_text(self.joined.as_ref()),
        ]
    }
}

impl SqlRow for UserFavorite {
    fn sql_values(&self) -> Vec<SqlValue> {
        vec![SqlValue::id(self.user_id), SqlValue::id(self.related_id)]
    }
}

/// One `INSERT ... ON CONFLICT DO NOTHING` statement.
#[derive(Debug, Clone, PartialEq)]
pub struct InsertStatement {
    /// Target table.
    pub table: String,
    /// Column names.
    pub columns: Vec<String>,
    /// Values, one per column.
    pub values: Vec<SqlValue>,
}

impl InsertStatement {
    /// Builds the statement inserting `row` into `table`.
    #[must_use]
    pub fn for_row<R: SqlRow>(table: &SeedTable, row: &R) -> Self {
        Self {
            table: table.name.to_owned(),
            columns: table.columns.iter().map(|column| (*column).to_owned()).collect(),
            values: row.sql_values(),
        }
    }

    /// Returns the value bound to `column`, if present.
    #[must_use]
    pub fn value(&self, column: &str) -> Option<&SqlValue> {
        self.columns
            .iter()
            .position(|name| name == column)
            .and_then(|index| self.values.get(index))
    }

    /// Parses a single statement (with or without the trailing `;`).
    ///
    /// # Errors
    ///
    /// Returns a description of the first mismatch with the emitted shape.
    pub fn parse(text: &str) -> Result<Self, String> {
        let mut cursor = Cursor::new(text.trim().trim_end_matches(';'));
        cursor.keyword("INSERT")?;
        cursor.keyword("INTO")?;
        let table = cursor.ident()?;
        let columns = cursor.list(Cursor::ident)?;
        cursor.keyword("VALUES")?;
        let values = cursor.list(Cursor::value)?;
        cursor.keyword("ON")?;
        cursor.keyword("CONFLICT")?;
        cursor.keyword("DO")?;
        cursor.keyword("NOTHING")?;
        cursor.end()?;
        if columns.len() != values.len() {
            return Err(format!(
                "{} columns but {} values",
                columns.len(),
                values.len()
            ));
        }
        Ok(Self {
            table,
            columns,
            values,
        })
    }
}

impl fmt::Display for InsertStatement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "INSERT INTO {} ({}) VALUES (", self.table, self.columns.join(", "))?;
        for (index, value) in self.values.iter().enumerate() {
            if index > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{value}")?;
        }
        f.write_str(") ON CONFLICT DO NOTHING;")
    }
}

/// A numbered SQL script for one table.
#[derive(Debug, Clone, PartialEq)]
pub struct SqlArtifact {
    /// Script file name, e.g. `010_anime_seed.sql`.
    pub file_name: String,
    /// Target table.
    pub table: &'static str,
    /// One statement per row.
    pub statements: Vec<InsertStatement>,
}

impl SqlArtifact {
    /// Builds the script for `rows` of `table`.
    #[must_use]
    pub fn new<R: SqlRow>(table: &SeedTable, rows: &[R]) -> Self {
        Self {
            file_name: table.file_name(),
            table: table.name,
            statements: rows
                .iter()
                .map(|row| InsertStatement::for_row(table, row))
                .collect(),
        }
    }

    /// Renders the script, one statement per line.
    #[must_use]
    pub fn render(&self) -> String {
        self.statements
            .iter()
            .map(|statement| format!("{statement}\n"))
            .collect()
    }
}

/// Builds every SQL artifact for `seed_set` in load order.
#[must_use]
pub fn sql_artifacts(seed_set: &SeedSet) -> Vec<SqlArtifact> {
    vec![
        SqlArtifact::new(&GENRE, &seed_set.genres),
        SqlArtifact::new(&ANIME, &seed_set.anime),
        SqlArtifact::new(&CHARACTER, &seed_set.characters),
        SqlArtifact::new(&PERSON, &seed_set.people),
        SqlArtifact::new(&ANIME_GENRE, &seed_set.anime_genres),
        SqlArtifact::new(&ANIME_CHARACTER, &seed_set.anime_characters),
        SqlArtifact::new(&ANIME_STAFF, &seed_set.anime_staff),
        SqlArtifact::new(&APP_USER, &seed_set.users),
        SqlArtifact::new(&USER_FAVORITE_ANIME, &seed_set.favorite_anime),
        SqlArtifact::new(&USER_FAVORITE_CHARACTER, &seed_set.favorite_characters),
        SqlArtifact::new(&USER_FAVORITE_PERSON, &seed_set.favorite_people),
    ]
}

/// Splits a script into statements and parses each one.
///
/// Statements end at a `;` outside a string literal. Blank lines and `--`
/// comment lines between statements are ignored.
///
/// # Errors
///
/// Returns [`ScriptError::Parse`] naming the first statement that does not
/// match the emitted shape.
pub fn parse_script(script: &str, contents: &str) -> Result<Vec<InsertStatement>, ScriptError> {
    split_statements(contents)
        .into_iter()
        .enumerate()
        .map(|(index, text)| {
            InsertStatement::parse(&text).map_err(|message| ScriptError::Parse {
                script: script.to_owned(),
                index,
                message,
            })
        })
        .collect()
}

fn split_statements(contents: &str) -> Vec<String> {
    let mut statements = Vec::new();
    let mut current = String::new();
    let mut in_literal = false;
    let mut chars = contents.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '-' if !in_literal && chars.peek() == Some(&'-') => {
                // Line comment: drop it up to the newline.
                while chars.next_if(|next| *next != '\n').is_some() {}
                continue;
            }
            '\'' => in_literal = !in_literal,
            _ => {}
        }
        current.push(c);
        if c == ';' && !in_literal {
            statements.push(std::mem::take(&mut current));
        }
    }
    statements.push(current);
    statements
        .into_iter()
        .map(|text| text.trim().to_owned())
        .filter(|text| !text.is_empty())
        .collect()
}

/// Hand-rolled scanner for the emitted statement shape.
struct Cursor<'a> {
    rest: &'a str,
}

impl<'a> Cursor<'a> {
    const fn new(text: &'a str) -> Self {
        Self { rest: text }
    }

    fn skip_whitespace(&mut self) {
        self.rest = self.rest.trim_start();
    }

    fn eat(&mut self, expected: char) -> Result<(), String> {
        self.skip_whitespace();
        self.rest = self
            .rest
            .strip_prefix(expected)
            .ok_or_else(|| format!("expected '{expected}' at '{}'", self.preview()))?;
        Ok(())
    }

    fn keyword(&mut self, keyword: &str) -> Result<(), String> {
        self.skip_whitespace();
        let word = self.take_while(|c| c.is_ascii_alphabetic());
        if word.eq_ignore_ascii_case(keyword) {
            Ok(())
        } else {
            Err(format!("expected {keyword}, found '{word}'"))
        }
    }

    fn ident(&mut self) -> Result<String, String> {
        self.skip_whitespace();
        let word = self.take_while(|c| c.is_ascii_alphanumeric() || c == '_');
        if word.is_empty() || word.starts_with(|c: char| c.is_ascii_digit()) {
            return Err(format!("expected identifier at '{}'", self.preview()));
        }
        Ok(word.to_owned())
    }

    fn list<T>(
        &mut self,
        mut item: impl FnMut(&mut Self) -> Result<T, String>,
    ) -> Result<Vec<T>, String> {
        self.eat('(')?;
        let mut items = vec![item(self)?];
        loop {
            self.skip_whitespace();
            if self.rest.starts_with(')') {
                self.eat(')')?;
                return Ok(items);
            }
            self.eat(',')?;
            items.push(item(self)?);
        }
    }

    fn value(&mut self) -> Result<SqlValue, String> {
        self.skip_whitespace();
        if self.rest.starts_with('\'') {
            return self.text_literal();
        }
        let token = self.take_while(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '+' | '.'));
        if token.eq_ignore_ascii_case("NULL") {
            return Ok(SqlValue::Null);
        }
        if let Ok(integer) = token.parse::<i64>() {
            return Ok(SqlValue::Integer(integer));
        }
        token
            .parse::<f64>()
            .ok()
            .filter(|value| value.is_finite())
            .map(SqlValue::Real)
            .ok_or_else(|| format!("expected literal, found '{token}'"))
    }

    fn text_literal(&mut self) -> Result<SqlValue, String> {
        let source = self.rest;
        let mut text = String::new();
        let mut chars = source.char_indices().skip(1).peekable();
        while let Some((offset, c)) = chars.next() {
            if c != '\'' {
                text.push(c);
                continue;
            }
            if chars.next_if(|(_, next)| *next == '\'').is_some() {
                text.push('\'');
                continue;
            }
            self.rest = source.get(offset + 1..).unwrap_or_default();
            return Ok(SqlValue::Text(text));
        }
        Err("unterminated string literal".to_owned())
    }

    fn end(&mut self) -> Result<(), String> {
        self.skip_whitespace();
        if self.rest.is_empty() {
            Ok(())
        } else {
            Err(format!("unexpected trailing input '{}'", self.preview()))
        }
    }

    fn take_while(&mut self, accept: impl Fn(char) -> bool) -> &'a str {
        let end = self
            .rest
            .char_indices()
            .find(|(_, c)| !accept(*c))
            .map_or(self.rest.len(), |(offset, _)| offset);
        let (taken, rest) = self.rest.split_at(end);
        self.rest = rest;
        taken
    }

    fn preview(&self) -> &'a str {
        let end = self
            .rest
            .char_indices()
            .nth(24)
            .map_or(self.rest.len(), |(offset, _)| offset);
        self.rest.get(..end).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;
    use crate::model::ProfileStats;

    fn user(id: i64, username: &str, gender: Option<&str>) -> AppUser {
        AppUser {
            id: EntityId::new(id),
            username: username.to_owned(),
            gender: gender.map(str::to_owned),
            joined: Some("2010-01-01".to_owned()),
            stats: ProfileStats::default(),
        }
    }

    #[test]
    fn renders_text_with_doubled_quotes_and_nulls() {
        let statement = InsertStatement::for_row(&APP_USER, &user(7, "o'brien", None));

        assert_eq!(
            statement.to_string(),
            "INSERT INTO app_user (id, username, gender, joined) VALUES \
             (7, 'o''brien', NULL, '2010-01-01') ON CONFLICT DO NOTHING;"
        );
    }

    #[test]
    fn renders_anime_scores_as_decimals() {
        let anime = Anime {
            id: EntityId::new(1),
            title: "Cowboy Bebop".to_owned(),
            media_type: Some("TV".to_owned()),
            episodes: Some(26),
            score: Some(9.0),
            genres: Vec::new(),
        };

        assert_eq!(
            InsertStatement::for_row(&ANIME, &anime).to_string(),
            "INSERT INTO anime (id, title, type, episodes, score) VALUES \
             (1, 'Cowboy Bebop', 'TV', 26, 9.0) ON CONFLICT DO NOTHING;"
        );
    }

    #[rstest]
    #[case(user(1, "alice", Some("Female")))]
    #[case(user(2, "it's; tricky", None))]
    #[case(user(3, "", Some("''")))]
    fn rendered_statements_parse_back(#[case] row: AppUser) {
        let statement = InsertStatement::for_row(&APP_USER, &row);

        let parsed = InsertStatement::parse(&statement.to_string()).expect("parse");

        assert_eq!(parsed, statement);
    }

    #[test]
    fn scripts_split_on_unquoted_semicolons() {
        let script = SqlArtifact::new(
            &APP_USER,
            &[user(1, "semi;colon", None), user(2, "bob", None)],
        )
        .render();

        let statements = parse_script("021_app_user_seed.sql", &script).expect("parse");

        assert_eq!(statements.len(), 2);
        assert_eq!(
            statements.first().and_then(|s| s.value("username")),
            Some(&SqlValue::Text("semi;colon".to_owned()))
        );
    }

    #[test]
    fn comment_apostrophes_do_not_open_literals() {
        let script = "-- don't edit by hand\n\
            INSERT INTO genre (id, name) VALUES (1, 'Action') ON CONFLICT DO NOTHING;\n\
            INSERT INTO genre (id, name) VALUES (2, 'Drama') ON CONFLICT DO NOTHING; -- it's fine\n";

        let statements = parse_script("001_genre_seed.sql", script).expect("parse");

        assert_eq!(statements.len(), 2);
        assert_eq!(
            statements.last().and_then(|s| s.value("name")),
            Some(&SqlValue::Text("Drama".to_owned()))
        );
    }

    #[rstest]
    #[case("INSERT INTO t (a) VALUES (1);", "expected ON")]
    #[case("INSERT INTO t (a, b) VALUES (1) ON CONFLICT DO NOTHING;", "2 columns but 1 values")]
    #[case("UPDATE t SET a = 1;", "expected INSERT")]
    fn reports_unexpected_statement_shapes(#[case] script: &str, #[case] fragment: &str) {
        let err = parse_script("bad.sql", script).expect_err("should fail");

        let ScriptError::Parse { index, message, .. } = err else {
            panic!("expected parse error, got {err:?}");
        };
        assert_eq!(index, 0);
        assert!(message.contains(fragment), "unexpected message: {message}");
    }

    #[test]
    fn seed_tables_are_numbered_in_load_order() {
        let names: Vec<String> = SEED_TABLES.iter().map(SeedTable::file_name).collect();
        let mut sorted = names.clone();
        sorted.sort();

        assert_eq!(names, sorted);
        assert_eq!(names.first().map(String::as_str), Some("001_genre_seed.sql"));
        assert_eq!(
            names.last().map(String::as_str),
            Some("024_user_favorite_person_seed.sql")
        );
    }
}
