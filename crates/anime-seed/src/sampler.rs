//! Deterministic sampling of primary entities.
//!
//! A run owns one ChaCha8 stream seeded from the requested `u64`. Anime are
//! drawn first, then users, so the pair of samples is a pure function of the
//! seed and the two universes.

use std::collections::BTreeSet;

use rand::SeedableRng;
use rand::seq::SliceRandom;
use rand_chacha::ChaCha8Rng;
use tracing::info;

use crate::error::ConfigurationError;
use crate::model::{Entity, EntityId};

/// Entity label used in anime sampling errors and logs.
pub const ANIME: &str = "anime";

/// Entity label used in user sampling errors and logs.
pub const USERS: &str = "users";

/// Label used when sampling a bare identifier universe.
pub const IDS: &str = "ids";

/// A seeded stream of uniform samples without replacement.
#[derive(Debug, Clone)]
pub struct Sampler {
    rng: ChaCha8Rng,
}

impl Sampler {
    /// Creates a sampler whose stream is fixed by `seed`.
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    /// Draws `n` distinct elements of `universe`, returned in universe order.
    ///
    /// A partial Fisher-Yates shuffle over element positions makes every
    /// `n`-subset equally likely for a given stream state.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::SampleTooLarge`] if `n` exceeds the
    /// universe size. The stream is left untouched in that case.
    pub fn draw<T: Clone>(
        &mut self,
        entity: &'static str,
        universe: &[T],
        n: usize,
    ) -> Result<Vec<T>, ConfigurationError> {
        if n > universe.len() {
            return Err(ConfigurationError::SampleTooLarge {
                entity,
                requested: n,
                available: universe.len(),
            });
        }
        let mut positions: Vec<usize> = (0..universe.len()).collect();
        let (chosen, _) = positions.partial_shuffle(&mut self.rng, n);
        let mut picked = chosen.to_vec();
        picked.sort_unstable();
        Ok(picked
            .into_iter()
            .filter_map(|position| universe.get(position).cloned())
            .collect())
    }
}

/// Samples `n` identifiers from `universe` with a fresh stream for `seed`.
///
/// # Errors
///
/// Returns [`ConfigurationError::SampleTooLarge`] if `n` exceeds the universe
/// size.
///
/// # Examples
///
/// ```
/// use anime_seed::{EntityId, sample_ids};
///
/// let universe: Vec<EntityId> = (1..=10).map(EntityId::new).collect();
/// let first = sample_ids(&universe, 3, 42).expect("sample fits");
/// let second = sample_ids(&universe, 3, 42).expect("sample fits");
///
/// assert_eq!(first.len(), 3);
/// assert_eq!(first, second);
/// ```
pub fn sample_ids(
    universe: &[EntityId],
    n: usize,
    seed: u64,
) -> Result<Vec<EntityId>, ConfigurationError> {
    Sampler::new(seed).draw(IDS, universe, n)
}

/// Sizes and seed of a sampling run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampleRequest {
    anime_count: usize,
    user_count: usize,
    seed: u64,
}

impl SampleRequest {
    /// Validates and builds a request.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::EmptySample`] when `anime_count` is zero.
    pub fn new(
        anime_count: usize,
        user_count: usize,
        seed: u64,
    ) -> Result<Self, ConfigurationError> {
        if anime_count == 0 {
            return Err(ConfigurationError::EmptySample { entity: ANIME });
        }
        Ok(Self {
            anime_count,
            user_count,
            seed,
        })
    }

    /// Number of anime to sample.
    #[must_use]
    pub const fn anime_count(&self) -> usize {
        self.anime_count
    }

    /// Number of users to sample.
    #[must_use]
    pub const fn user_count(&self) -> usize {
        self.user_count
    }

    /// Seed of the sampling stream.
    #[must_use]
    pub const fn seed(&self) -> u64 {
        self.seed
    }
}

/// The sampled primary identifiers of a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PrimarySample {
    /// Sampled anime ids.
    pub anime: BTreeSet<EntityId>,
    /// Sampled user ids.
    pub users: BTreeSet<EntityId>,
}

/// Draws the anime sample, then the user sample, from one stream.
///
/// Both sizes are checked before anything is drawn.
///
/// # Errors
///
/// Returns [`ConfigurationError::SampleTooLarge`] if either count exceeds
/// its universe.
pub fn sample_primaries<A: Entity, U: Entity>(
    anime: &[A],
    users: &[U],
    request: SampleRequest,
) -> Result<PrimarySample, ConfigurationError> {
    if request.user_count > users.len() {
        return Err(ConfigurationError::SampleTooLarge {
            entity: USERS,
            requested: request.user_count,
            available: users.len(),
        });
    }
    let anime_ids: Vec<EntityId> = anime.iter().map(Entity::id).collect();
    let user_ids: Vec<EntityId> = users.iter().map(Entity::id).collect();

    let mut sampler = Sampler::new(request.seed);
    let sample = PrimarySample {
        anime: sampler
            .draw(ANIME, &anime_ids, request.anime_count)?
            .into_iter()
            .collect(),
        users: sampler
            .draw(USERS, &user_ids, request.user_count)?
            .into_iter()
            .collect(),
    };
    info!(
        seed = request.seed,
        anime = sample.anime.len(),
        users = sample.users.len(),
        "primary entities sampled"
    );
    Ok(sample)
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use rstest::{fixture, rstest};

    use super::*;

    #[fixture]
    fn ten_anime() -> Vec<EntityId> {
        (1..=10).map(EntityId::new).collect()
    }

    #[rstest]
    #[case(0, 1)]
    #[case(1, 42)]
    #[case(3, 42)]
    #[case(3, 7)]
    #[case(9, 1234)]
    #[case(10, 99)]
    fn returns_exactly_n_distinct_members(
        ten_anime: Vec<EntityId>,
        #[case] n: usize,
        #[case] seed: u64,
    ) {
        let sample = sample_ids(&ten_anime, n, seed).expect("sample fits");
        let distinct: HashSet<_> = sample.iter().copied().collect();

        assert_eq!(sample.len(), n);
        assert_eq!(distinct.len(), n);
        assert!(sample.iter().all(|id| ten_anime.contains(id)));
    }

    #[rstest]
    fn same_seed_yields_same_sample(ten_anime: Vec<EntityId>) {
        let first = sample_ids(&ten_anime, 3, 42).expect("sample fits");
        let second = sample_ids(&ten_anime, 3, 42).expect("sample fits");

        assert_eq!(first, second);
    }

    #[rstest]
    fn seeds_spread_over_different_subsets(ten_anime: Vec<EntityId>) {
        let samples: HashSet<Vec<EntityId>> = (0..20)
            .map(|seed| sample_ids(&ten_anime, 3, seed).expect("sample fits"))
            .collect();

        assert!(samples.len() > 1, "every seed produced the same subset");
    }

    #[rstest]
    fn samples_are_reported_in_universe_order(ten_anime: Vec<EntityId>) {
        let sample = sample_ids(&ten_anime, 5, 42).expect("sample fits");
        let mut sorted = sample.clone();
        sorted.sort_unstable();

        assert_eq!(sample, sorted);
    }

    #[test]
    fn rejects_samples_larger_than_the_universe() {
        let universe: Vec<EntityId> = (1..=200).map(EntityId::new).collect();

        let result = sample_ids(&universe, 1000, 42);

        assert_eq!(
            result,
            Err(ConfigurationError::SampleTooLarge {
                entity: IDS,
                requested: 1000,
                available: 200,
            })
        );
    }

    #[test]
    fn rejects_zero_anime_requests() {
        assert_eq!(
            SampleRequest::new(0, 1, 42),
            Err(ConfigurationError::EmptySample { entity: ANIME })
        );
    }

    #[test]
    fn anime_draw_does_not_depend_on_user_count() {
        let anime: Vec<EntityId> = (1..=10).map(EntityId::new).collect();
        let users: Vec<EntityId> = (1..=5).map(EntityId::new).collect();
        let fewer = sample_primaries(&anime, &users, SampleRequest::new(3, 1, 42).expect("valid"))
            .expect("sample fits");
        let more = sample_primaries(&anime, &users, SampleRequest::new(3, 4, 42).expect("valid"))
            .expect("sample fits");

        assert_eq!(fewer.anime, more.anime);
        assert_eq!(more.users.len(), 4);
    }

    #[test]
    fn rejects_oversized_user_sample() {
        let anime: Vec<EntityId> = (1..=10).map(EntityId::new).collect();
        let users: Vec<EntityId> = (1..=2).map(EntityId::new).collect();

        let result =
            sample_primaries(&anime, &users, SampleRequest::new(3, 5, 42).expect("valid"));

        assert_eq!(
            result,
            Err(ConfigurationError::SampleTooLarge {
                entity: USERS,
                requested: 5,
                available: 2,
            })
        );
    }
}
