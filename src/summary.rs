//! Per-frame label tallies shown next to the annotated frame.

use std::fmt;

/// Label to count mapping for the most recently displayed frame.
///
/// Every `update` replaces the tally; nothing accumulates across frames.
/// Labels keep the order in which they were first seen in that frame.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DetectionSummary {
    counts: Vec<(String, usize)>,
}

impl DetectionSummary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_labels<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut summary = Self::new();
        summary.update(labels);
        summary
    }

    pub fn update<I, S>(&mut self, labels: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.counts.clear();
        for label in labels {
            let label = label.as_ref();
            match self.counts.iter_mut().find(|(name, _)| name == label) {
                Some((_, count)) => *count += 1,
                None => self.counts.push((label.to_string(), 1)),
            }
        }
    }

    pub fn clear(&mut self) {
        self.counts.clear();
    }

    pub fn count(&self, label: &str) -> usize {
        self.counts
            .iter()
            .find(|(name, _)| name == label)
            .map_or(0, |(_, count)| *count)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, usize)> {
        self.counts.iter().map(|(name, count)| (name.as_str(), *count))
    }

    pub fn total(&self) -> usize {
        self.counts.iter().map(|(_, count)| count).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }
}

impl fmt::Display for DetectionSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (name, count) in self.iter() {
            writeln!(f, "{}: {}", name, count)?;
        }
        Ok(())
    }
}
