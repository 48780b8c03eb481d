use std::collections::{BTreeMap, HashSet};

use crate::untappd::{Checkin, sort_chronologically};

/// Every check-in seen so far, per roster user, oldest first.
///
/// Entries are only ever appended; a user's identifiers are unique.
#[derive(Debug, Default)]
pub struct CheckinHistory {
    users: BTreeMap<String, Vec<Checkin>>,
}

impl CheckinHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces a user's history with a backfill result.
    pub fn seed(&mut self, user: &str, checkins: Vec<Checkin>) {
        let mut seen = HashSet::new();
        let mut checkins: Vec<Checkin> = checkins
            .into_iter()
            .filter(|checkin| seen.insert(checkin.id))
            .collect();
        sort_chronologically(&mut checkins);
        self.users.insert(user.to_string(), checkins);
    }

    pub fn checkins(&self, user: &str) -> &[Checkin] {
        self.users.get(user).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Users in name order with their histories.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[Checkin])> {
        self.users
            .iter()
            .map(|(user, checkins)| (user.as_str(), checkins.as_slice()))
    }

    pub fn contains(&self, user: &str, checkin_id: u64) -> bool {
        self.checkins(user).iter().any(|known| known.id == checkin_id)
    }

    /// Appends `checkin` unless its identifier is already known.
    pub fn record(&mut self, user: &str, checkin: Checkin) -> bool {
        if self.contains(user, checkin.id) {
            return false;
        }
        self.users.entry(user.to_string()).or_default().push(checkin);
        true
    }

    pub fn sort_user(&mut self, user: &str) {
        if let Some(checkins) = self.users.get_mut(user) {
            sort_chronologically(checkins);
        }
    }

    #[cfg(test)]
    pub fn len(&self, user: &str) -> usize {
        self.checkins(user).len()
    }
}

/// Check-ins from a poll that are not yet in `user`'s history, oldest first.
/// Duplicates inside the poll itself are reported once.
pub fn select_new(history: &CheckinHistory, user: &str, mut polled: Vec<Checkin>) -> Vec<Checkin> {
    sort_chronologically(&mut polled);
    let mut seen = HashSet::new();
    polled
        .into_iter()
        .filter(|checkin| !history.contains(user, checkin.id) && seen.insert(checkin.id))
        .collect()
}
