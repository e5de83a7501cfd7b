//! Job table - ordered job records with a pid index
//!
//! Records are kept in start order. A pid maps to the most recent job that
//! used it. Finished jobs beyond `max_finished` are evicted oldest-finished
//! first; running jobs are never evicted.

use crate::job::{JobId, JobRecord};
use std::collections::{BTreeMap, HashMap};

#[derive(Debug)]
pub struct JobTable {
    jobs: BTreeMap<JobId, JobRecord>,
    by_pid: HashMap<u32, JobId>,
    max_finished: usize,
}

impl JobTable {
    pub fn new(max_finished: usize) -> Self {
        Self {
            jobs: BTreeMap::new(),
            by_pid: HashMap::with_capacity(16),
            max_finished,
        }
    }

    pub fn insert(&mut self, record: JobRecord) {
        self.by_pid.insert(record.pid, record.id);
        self.jobs.insert(record.id, record);
    }

    pub fn get(&self, id: JobId) -> Option<&JobRecord> {
        self.jobs.get(&id)
    }

    pub fn get_mut(&mut self, id: JobId) -> Option<&mut JobRecord> {
        self.jobs.get_mut(&id)
    }

    pub fn by_pid(&self, pid: u32) -> Option<&JobRecord> {
        self.by_pid.get(&pid).and_then(|id| self.jobs.get(id))
    }

    pub fn by_pid_mut(&mut self, pid: u32) -> Option<&mut JobRecord> {
        let id = *self.by_pid.get(&pid)?;
        self.jobs.get_mut(&id)
    }

    /// All jobs in start order
    pub fn iter(&self) -> impl Iterator<Item = &JobRecord> {
        self.jobs.values()
    }

    pub fn running(&self) -> impl Iterator<Item = &JobRecord> {
        self.jobs.values().filter(|job| job.is_running())
    }

    pub fn running_count(&self) -> usize {
        self.running().count()
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    /// Drop the oldest finished jobs until at most `max_finished` remain
    pub fn evict_finished(&mut self) -> Vec<JobId> {
        let mut finished: Vec<_> = self
            .jobs
            .values()
            .filter(|job| !job.is_running())
            .map(|job| (job.ended_at, job.id))
            .collect();

        if finished.len() <= self.max_finished {
            return Vec::new();
        }

        finished.sort();
        let excess = finished.len() - self.max_finished;
        let evicted: Vec<JobId> = finished.into_iter().take(excess).map(|(_, id)| id).collect();

        for id in &evicted {
            if let Some(job) = self.jobs.remove(id) {
                if self.by_pid.get(&job.pid) == Some(id) {
                    self.by_pid.remove(&job.pid);
                }
            }
        }

        evicted
    }
}
