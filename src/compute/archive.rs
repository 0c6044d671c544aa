//! Hall of Fame archive and the fire-and-forget persistence boundary.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::schema::Candidate;

/// Default Hall of Fame capacity.
pub const HOF_CAPACITY: usize = 30;

/// Bounded, fitness-sorted archive of historically best candidates.
///
/// Invariants: always sorted ascending by fitness, no two entries with
/// identical fitness, never more than `capacity` entries. Used only as
/// a reseeding source during stagnation recovery.
#[derive(Debug, Clone)]
pub struct HallOfFame {
    entries: Vec<Candidate>,
    capacity: usize,
}

impl Default for HallOfFame {
    fn default() -> Self {
        Self::new(HOF_CAPACITY)
    }
}

impl HallOfFame {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Vec::new(),
            capacity: capacity.max(1),
        }
    }

    /// Insert a candidate, deduplicating by fitness value, keeping the
    /// archive sorted ascending and truncated to capacity.
    pub fn insert(&mut self, candidate: &Candidate) {
        if !candidate.is_viable() {
            return;
        }
        if self.entries.iter().any(|e| e.fitness == candidate.fitness) {
            return;
        }
        let position = self
            .entries
            .partition_point(|e| e.fitness < candidate.fitness);
        self.entries.insert(position, candidate.clone());
        self.entries.truncate(self.capacity);
    }

    /// Best (lowest-fitness) entry.
    pub fn best(&self) -> Option<&Candidate> {
        self.entries.first()
    }

    /// Entry at `index` (ascending fitness order).
    pub fn get(&self, index: usize) -> Option<&Candidate> {
        self.entries.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Candidate> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// External persistence collaborator. Receives the current best
/// candidate on a wall-clock interval; failures must never affect the
/// run (the controller logs and continues).
pub trait SnapshotSink: Send {
    fn persist(&mut self, candidate: &Candidate) -> io::Result<()>;
}

/// Sink writing the best candidate as JSON to a fixed path.
pub struct JsonSnapshotSink {
    path: PathBuf,
}

impl JsonSnapshotSink {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl SnapshotSink for JsonSnapshotSink {
    fn persist(&mut self, candidate: &Candidate) -> io::Result<()> {
        let json = serde_json::to_string_pretty(candidate)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        fs::write(&self.path, json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Chromosome;

    fn candidate(fitness: f64) -> Candidate {
        Candidate {
            chromosome: Chromosome::new([-0.5, 0.5, 0.1, 0.05, 0.0, 0.0]),
            fitness,
            c_model: 0.0,
            alpha_model: 0.0,
            g_model: 0.0,
            delta_c: 0.0,
            delta_alpha: 0.0,
            delta_g: 0.0,
            phi0: 0.0,
            elegance: 0.0,
            generation: 0,
        }
    }

    #[test]
    fn test_sorted_ascending_after_insertions() {
        let mut hof = HallOfFame::new(30);
        for fitness in [0.5, 0.1, 0.9, 0.3, 0.7, 0.2] {
            hof.insert(&candidate(fitness));
        }
        let fitnesses: Vec<f64> = hof.iter().map(|c| c.fitness).collect();
        let mut sorted = fitnesses.clone();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());
        assert_eq!(fitnesses, sorted);
    }

    #[test]
    fn test_dedup_by_fitness() {
        let mut hof = HallOfFame::new(30);
        hof.insert(&candidate(0.5));
        hof.insert(&candidate(0.5));
        hof.insert(&candidate(0.5));
        assert_eq!(hof.len(), 1);
    }

    #[test]
    fn test_capacity_truncation_keeps_best() {
        let mut hof = HallOfFame::new(30);
        for i in 0..100 {
            hof.insert(&candidate(i as f64 * 0.01));
        }
        assert_eq!(hof.len(), 30);
        assert_eq!(hof.best().unwrap().fitness, 0.0);
        // Worst surviving entry is the 30th best.
        assert!(hof.iter().all(|c| c.fitness < 0.30));
    }

    #[test]
    fn test_knockouts_rejected() {
        let mut hof = HallOfFame::new(30);
        hof.insert(&candidate(crate::schema::KNOCKOUT_FITNESS));
        assert!(hof.is_empty());
    }
}
