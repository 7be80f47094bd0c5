use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use rocket::tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::model::voter::VoterId;

type VoterLock = Arc<AsyncMutex<()>>;

/// In-process per-voter commit locks.
///
/// Locks are created on demand and dropped again once nobody holds or
/// waits on them.
#[derive(Debug, Default)]
pub struct VoterLocks {
    locks: Mutex<HashMap<VoterId, VoterLock>>,
}

impl VoterLocks {
    /// Acquire the locks of every given voter.
    /// Locks are taken in sorted order, so overlapping callers cannot deadlock.
    pub async fn acquire<'a>(&self, voters: impl IntoIterator<Item = &'a VoterId>) -> VoterGuard<'_> {
        let mut voters = voters.into_iter().cloned().collect::<Vec<_>>();
        voters.sort_unstable();
        voters.dedup();

        let mut guards = Vec::with_capacity(voters.len());
        for voter in voters {
            let lock = self.map().entry(voter).or_default().clone();
            guards.push(lock.lock_owned().await);
        }

        VoterGuard {
            locks: self,
            guards,
        }
    }

    /// Number of voters with a live lock.
    pub fn len(&self) -> usize {
        self.map().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn map(&self) -> MutexGuard<'_, HashMap<VoterId, VoterLock>> {
        // The map is always left consistent, so a poisoned lock is still usable.
        self.locks.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Held voter locks; released on drop.
#[derive(Debug)]
pub struct VoterGuard<'a> {
    locks: &'a VoterLocks,
    guards: Vec<OwnedMutexGuard<()>>,
}

impl Drop for VoterGuard<'_> {
    fn drop(&mut self) {
        self.guards.clear();
        self.locks
            .map()
            .retain(|_, lock| Arc::strong_count(lock) > 1);
    }
}
