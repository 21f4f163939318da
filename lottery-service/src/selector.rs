//! Winner selection over a day's ballot pool.

use rand::seq::SliceRandom;
use rand::Rng;
use thiserror::Error;

use crate::database::models::Ballot;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SelectError {
    /// Precondition violation: callers must gate empty pools before selecting.
    #[error("cannot select a winner from an empty ballot pool")]
    EmptyInput,
}

/// Pick one winning ballot uniformly at random. Weighting is ballot-level:
/// a user holding more ballots wins proportionally more often, as with
/// physical raffle tickets.
pub fn select<'a, R: Rng + ?Sized>(
    ballots: &'a [Ballot],
    rng: &mut R,
) -> Result<&'a Ballot, SelectError> {
    ballots.choose(rng).ok_or(SelectError::EmptyInput)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn ballot(id: i64) -> Ballot {
        Ballot {
            id,
            lottery_id: 1,
            user_id: Some(1),
            submission_date: NaiveDate::from_ymd_opt(2024, 6, 10).unwrap(),
        }
    }

    #[test]
    fn picks_only_from_the_supplied_pool() {
        let pool = vec![ballot(3), ballot(7), ballot(11)];
        let mut rng = rand::thread_rng();
        for _ in 0..200 {
            let winner = select(&pool, &mut rng).unwrap();
            assert!(pool.iter().any(|b| b.id == winner.id));
        }
    }

    #[test]
    fn single_ballot_always_wins() {
        let pool = vec![ballot(42)];
        let mut rng = rand::thread_rng();
        assert_eq!(select(&pool, &mut rng).unwrap().id, 42);
    }

    #[test]
    fn seeded_selection_is_deterministic() {
        let pool: Vec<Ballot> = (1..=50).map(ballot).collect();

        let mut first = StdRng::seed_from_u64(7);
        let mut second = StdRng::seed_from_u64(7);
        for _ in 0..20 {
            assert_eq!(
                select(&pool, &mut first).unwrap().id,
                select(&pool, &mut second).unwrap().id
            );
        }
    }

    #[test]
    fn empty_pool_is_an_error() {
        let mut rng = rand::thread_rng();
        assert_eq!(select(&[], &mut rng), Err(SelectError::EmptyInput));
    }
}
