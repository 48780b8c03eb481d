use std::collections::{HashMap, VecDeque};

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::time::Instant;

use crate::untappd::models::fixtures::checkin;
use crate::untappd::{Checkin, CheckinSource, UntappdError};

#[derive(Debug, Clone)]
pub(crate) struct BoundedCall {
    pub(crate) user: String,
    pub(crate) at: Instant,
    pub(crate) max_id: u64,
    pub(crate) limit: u32,
}

type Scripted = VecDeque<Result<Vec<Checkin>, UntappdError>>;

/// Replays queued responses; an exhausted script answers with no check-ins.
#[derive(Default)]
pub(crate) struct ScriptedSource {
    bounded: Mutex<Scripted>,
    recent: Mutex<HashMap<String, Scripted>>,
    bounded_calls: Mutex<Vec<BoundedCall>>,
    recent_calls: Mutex<Vec<String>>,
}

impl ScriptedSource {
    pub(crate) fn push_bounded(&self, response: Result<Vec<Checkin>, UntappdError>) {
        self.bounded.lock().push_back(response);
    }

    pub(crate) fn push_recent(&self, user: &str, response: Result<Vec<Checkin>, UntappdError>) {
        self.recent
            .lock()
            .entry(user.to_string())
            .or_default()
            .push_back(response);
    }

    pub(crate) fn bounded_calls(&self) -> Vec<BoundedCall> {
        self.bounded_calls.lock().clone()
    }

    pub(crate) fn recent_calls(&self) -> Vec<String> {
        self.recent_calls.lock().clone()
    }
}

#[async_trait]
impl CheckinSource for ScriptedSource {
    async fn recent_checkins(&self, user_name: &str) -> Result<Vec<Checkin>, UntappdError> {
        self.recent_calls.lock().push(user_name.to_string());
        self.recent
            .lock()
            .get_mut(user_name)
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(|| Ok(Vec::new()))
    }

    async fn checkins_between(
        &self,
        user_name: &str,
        _min_id: u64,
        max_id: u64,
        limit: u32,
    ) -> Result<Vec<Checkin>, UntappdError> {
        self.bounded_calls.lock().push(BoundedCall {
            user: user_name.to_string(),
            at: Instant::now(),
            max_id,
            limit,
        });
        self.bounded.lock().pop_front().unwrap_or_else(|| Ok(Vec::new()))
    }
}

/// A user with check-ins `1..=total`, served newest first with an inclusive
/// `max_id` bound.
pub(crate) struct PagedSource {
    checkins: Vec<Checkin>,
    calls: Mutex<Vec<BoundedCall>>,
}

impl PagedSource {
    pub(crate) fn new(user: &str, total: u64) -> Self {
        let checkins = (1..=total)
            .rev()
            .map(|id| checkin(id, user, id % 5, 3.0, id as u32))
            .collect();
        Self {
            checkins,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn limits(&self) -> Vec<u32> {
        self.calls.lock().iter().map(|call| call.limit).collect()
    }

    pub(crate) fn max_ids(&self) -> Vec<u64> {
        self.calls.lock().iter().map(|call| call.max_id).collect()
    }
}

#[async_trait]
impl CheckinSource for PagedSource {
    async fn recent_checkins(&self, _user_name: &str) -> Result<Vec<Checkin>, UntappdError> {
        Ok(self.checkins.iter().take(25).cloned().collect())
    }

    async fn checkins_between(
        &self,
        user_name: &str,
        min_id: u64,
        max_id: u64,
        limit: u32,
    ) -> Result<Vec<Checkin>, UntappdError> {
        self.calls.lock().push(BoundedCall {
            user: user_name.to_string(),
            at: Instant::now(),
            max_id,
            limit,
        });
        Ok(self
            .checkins
            .iter()
            .filter(|c| c.id > min_id && c.id <= max_id)
            .take(limit as usize)
            .cloned()
            .collect())
    }
}
