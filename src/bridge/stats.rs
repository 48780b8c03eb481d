use crate::untappd::Checkin;

/// How one user rated one beer.
#[derive(Debug, Clone, PartialEq)]
pub struct BeerStats<'a> {
    pub count: usize,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    /// Matching check-in with the greatest identifier.
    pub most_recent: Option<&'a Checkin>,
}

impl BeerStats<'_> {
    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }
}

/// Rating summary over a user's whole history.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UserStats {
    pub count: usize,
    pub mean: f64,
    pub stdev: f64,
}

/// Statistics of every check-in of `beer_id` in `checkins`. With no match the
/// count is zero and the rating fields are zero.
pub fn beer_stats(checkins: &[Checkin], beer_id: u64) -> BeerStats<'_> {
    let mut stats = BeerStats {
        count: 0,
        min: f64::MAX,
        max: f64::MIN,
        mean: 0.0,
        most_recent: None,
    };
    let mut total = 0.0;

    for checkin in checkins.iter().filter(|c| c.beer.id == beer_id) {
        if stats.most_recent.is_none_or(|latest| checkin.id > latest.id) {
            stats.most_recent = Some(checkin);
        }
        stats.min = stats.min.min(checkin.rating);
        stats.max = stats.max.max(checkin.rating);
        total += checkin.rating;
        stats.count += 1;
    }

    if stats.count == 0 {
        stats.min = 0.0;
        stats.max = 0.0;
    } else {
        stats.mean = total / stats.count as f64;
    }
    stats
}

/// Count, mean and population standard deviation of all ratings, or `None`
/// for an empty history.
pub fn user_stats(checkins: &[Checkin]) -> Option<UserStats> {
    if checkins.is_empty() {
        return None;
    }

    let count = checkins.len();
    let mean = checkins.iter().map(|c| c.rating).sum::<f64>() / count as f64;
    let variance = checkins
        .iter()
        .map(|c| (c.rating - mean).powi(2))
        .sum::<f64>()
        / count as f64;

    Some(UserStats {
        count,
        mean,
        stdev: variance.sqrt(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::untappd::models::fixtures::checkin;

    #[test]
    fn aggregates_matching_beer() {
        let history = vec![
            checkin(1, "bob", 42, 3.0, 0),
            checkin(3, "bob", 42, 5.0, 10),
            checkin(2, "bob", 42, 4.0, 20),
            checkin(4, "bob", 99, 1.0, 30),
        ];

        let stats = beer_stats(&history, 42);

        assert_eq!(stats.count, 3);
        assert_eq!(stats.min, 3.0);
        assert_eq!(stats.max, 5.0);
        assert_eq!(stats.mean, 4.0);
        assert_eq!(stats.most_recent.map(|c| c.id), Some(3));
    }

    #[test]
    fn most_recent_follows_identifier_not_timestamp() {
        // id 8 is older by timestamp but has the greater identifier
        let history = vec![checkin(8, "bob", 42, 2.0, 0), checkin(5, "bob", 42, 4.0, 60)];

        let stats = beer_stats(&history, 42);

        assert_eq!(stats.most_recent.map(|c| c.id), Some(8));
    }

    #[test]
    fn no_match_yields_empty_stats() {
        let history = vec![checkin(1, "bob", 7, 3.0, 0)];

        let stats = beer_stats(&history, 42);

        assert!(stats.is_empty());
        assert_eq!(stats.count, 0);
        assert!(stats.most_recent.is_none());
        assert!(!stats.mean.is_nan());
    }

    #[test]
    fn user_stats_use_population_deviation() {
        let history = vec![
            checkin(1, "bob", 1, 3.0, 0),
            checkin(2, "bob", 2, 4.0, 1),
            checkin(3, "bob", 3, 5.0, 2),
        ];

        let stats = user_stats(&history).expect("non-empty history has stats");

        assert_eq!(stats.count, 3);
        assert!((stats.mean - 4.0).abs() < 1e-9);
        assert!((stats.stdev - (2.0f64 / 3.0).sqrt()).abs() < 1e-9);
    }

    #[test]
    fn empty_history_has_no_user_stats() {
        assert!(user_stats(&[]).is_none());
    }
}
