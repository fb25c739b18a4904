//! Steps and step sequences.
//!
//! A [`Step`] is one immutable snapshot of an algorithm trace. A
//! [`StepSequence`] is the ordered, read-only collection an engine plays
//! over. Sequences are built whole and discarded whole: there is no way to
//! mutate a step once the sequence exists, and cloning a sequence shares the
//! same storage.

use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

use serde::de::{DeserializeOwned, Error as _};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::PlaybackError;

/// One snapshot in a precomputed execution trace.
///
/// `P` is the application's visualization payload; the engine never looks
/// inside it. When serialized, the payload's fields sit next to
/// `stepNumber` and `description`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Step<P> {
    /// 0-based position of this step in its sequence.
    pub step_number: usize,
    /// Human-readable account of what happens at this step.
    pub description: String,
    #[serde(flatten)]
    pub payload: P,
}

impl<P> Step<P> {
    pub fn new(step_number: usize, description: impl Into<String>, payload: P) -> Self {
        Self {
            step_number,
            description: description.into(),
            payload,
        }
    }
}

/// An ordered, finite, immutable list of steps indexed `0..len`.
///
/// The empty sequence is legal and means "nothing loaded".
pub struct StepSequence<P> {
    steps: Arc<[Step<P>]>,
}

impl<P> StepSequence<P> {
    /// Build a sequence, checking that every step's number matches its index.
    pub fn new(steps: Vec<Step<P>>) -> Result<Self, PlaybackError> {
        if let Some((position, step)) = steps
            .iter()
            .enumerate()
            .find(|(position, step)| step.step_number != *position)
        {
            return Err(PlaybackError::MalformedSequence {
                position,
                step_number: step.step_number,
            });
        }

        Ok(Self {
            steps: steps.into(),
        })
    }

    /// Build a sequence from descriptions and payloads, numbering the steps
    /// in order.
    pub fn from_payloads<I, D>(items: I) -> Self
    where
        I: IntoIterator<Item = (D, P)>,
        D: Into<String>,
    {
        let steps: Vec<Step<P>> = items
            .into_iter()
            .enumerate()
            .map(|(n, (description, payload))| Step::new(n, description, payload))
            .collect();
        Self {
            steps: steps.into(),
        }
    }

    /// Build a sequence from steps in order, overwriting their numbers.
    ///
    /// For traces seeded with 1-based or missing numbering.
    pub fn renumbered(steps: Vec<Step<P>>) -> Self {
        let steps: Vec<Step<P>> = steps
            .into_iter()
            .enumerate()
            .map(|(n, step)| Step {
                step_number: n,
                ..step
            })
            .collect();
        Self {
            steps: steps.into(),
        }
    }

    pub fn empty() -> Self {
        Self {
            steps: Arc::from(Vec::new()),
        }
    }

    pub fn length(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Index of the final step, or `None` for the empty sequence.
    pub fn last_index(&self) -> Option<usize> {
        self.steps.len().checked_sub(1)
    }

    /// Look up a step, failing if `index` is outside `0..len`.
    pub fn step_at(&self, index: usize) -> Result<&Step<P>, PlaybackError> {
        self.steps
            .get(index)
            .ok_or(PlaybackError::IndexOutOfRange {
                index,
                len: self.steps.len(),
            })
    }

    pub fn get(&self, index: usize) -> Option<&Step<P>> {
        self.steps.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Step<P>> {
        self.steps.iter()
    }

    /// Whether two handles share the same underlying storage.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.steps, &other.steps)
    }
}

impl<P: DeserializeOwned> StepSequence<P> {
    /// Parse a seeded trace: a JSON array of steps.
    pub fn from_json(json: &str) -> Result<Self, PlaybackError> {
        let steps: Vec<Step<P>> = serde_json::from_str(json)?;
        Self::new(steps)
    }
}

impl<P> Clone for StepSequence<P> {
    fn clone(&self) -> Self {
        Self {
            steps: Arc::clone(&self.steps),
        }
    }
}

impl<P> Default for StepSequence<P> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<P> Deref for StepSequence<P> {
    type Target = [Step<P>];

    fn deref(&self) -> &Self::Target {
        &self.steps
    }
}

impl<P: fmt::Debug> fmt::Debug for StepSequence<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.steps.iter()).finish()
    }
}

impl<P: PartialEq> PartialEq for StepSequence<P> {
    fn eq(&self, other: &Self) -> bool {
        self.steps[..] == other.steps[..]
    }
}

impl<P> TryFrom<Vec<Step<P>>> for StepSequence<P> {
    type Error = PlaybackError;

    fn try_from(steps: Vec<Step<P>>) -> Result<Self, Self::Error> {
        Self::new(steps)
    }
}

impl<'a, P> IntoIterator for &'a StepSequence<P> {
    type Item = &'a Step<P>;
    type IntoIter = std::slice::Iter<'a, Step<P>>;

    fn into_iter(self) -> Self::IntoIter {
        self.steps.iter()
    }
}

impl<P: Serialize> Serialize for StepSequence<P> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.steps.iter())
    }
}

impl<'de, P: Deserialize<'de>> Deserialize<'de> for StepSequence<P> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let steps = Vec::<Step<P>>::deserialize(deserializer)?;
        Self::new(steps).map_err(D::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn numbered(n: usize) -> StepSequence<()> {
        StepSequence::from_payloads((0..n).map(|i| (format!("step {i}"), ())))
    }

    #[test]
    fn step_at_rejects_out_of_range() {
        let seq = numbered(3);
        assert_eq!(seq.length(), 3);
        assert_eq!(seq.step_at(2).unwrap().description, "step 2");

        let err = seq.step_at(3).unwrap_err();
        assert!(matches!(
            err,
            PlaybackError::IndexOutOfRange { index: 3, len: 3 }
        ));
    }

    #[test]
    fn empty_sequence_is_legal() {
        let seq = StepSequence::<()>::empty();
        assert!(seq.is_empty());
        assert_eq!(seq.last_index(), None);
        assert!(seq.step_at(0).is_err());
    }

    #[test]
    fn misnumbered_steps_are_rejected() {
        let steps = vec![Step::new(0, "a", ()), Step::new(2, "b", ())];
        let err = StepSequence::new(steps).unwrap_err();
        assert!(matches!(
            err,
            PlaybackError::MalformedSequence {
                position: 1,
                step_number: 2
            }
        ));
    }

    #[test]
    fn renumbering_accepts_one_based_seeds() {
        let steps = vec![Step::new(1, "first", ()), Step::new(2, "second", ())];
        let seq = StepSequence::renumbered(steps);
        assert_eq!(seq[0].step_number, 0);
        assert_eq!(seq[1].step_number, 1);
        assert_eq!(seq[1].description, "second");
    }

    #[test]
    fn clones_share_storage() {
        let seq = numbered(4);
        let other = seq.clone();
        assert!(seq.ptr_eq(&other));
        assert!(!seq.ptr_eq(&numbered(4)));
        assert_eq!(seq, numbered(4));
    }

    #[test]
    fn parses_flattened_payload_from_json() {
        let doc = json!([
            { "stepNumber": 0, "description": "start", "target": 9 },
            { "stepNumber": 1, "description": "found", "target": 9, "found": true }
        ]);

        let seq: StepSequence<serde_json::Value> =
            StepSequence::from_json(&doc.to_string()).unwrap();
        assert_eq!(seq.length(), 2);
        assert_eq!(seq[1].payload["found"], true);
        assert_eq!(seq[0].payload["target"], 9);
    }

    #[test]
    fn json_with_gaps_fails_validation() {
        let doc = r#"[{ "stepNumber": 1, "description": "late" }]"#;
        let err = StepSequence::<serde_json::Value>::from_json(doc).unwrap_err();
        assert!(matches!(err, PlaybackError::MalformedSequence { .. }));
    }
}
