//! Signals - the reports a side receives about what it cannot see directly
//!
//! A signal's public part is its `Report`. Whether the report is accurate,
//! stale or made up is engine metadata: it is stored privately, never
//! serialized, ignored by equality, and only readable from test code.

use serde::{Serialize, Serializer};

use crate::core::types::{ContactId, RegionId, Side, Turn};
use crate::grid::Coord;

/// Kind of information a signal carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalKind {
    Position,
    StrengthEstimate,
    Ownership,
}

/// What a signal is about
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Subject {
    /// An enemy unit, under the observer's own tracking number
    Contact(ContactId),
    Region(RegionId),
}

/// The claim a signal makes
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Payload {
    Position(Coord),
    Strength(u32),
    /// `None` reports the region as neutral
    Ownership(Option<Side>),
}

/// Consumer-visible content of a signal
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Report {
    pub subject: Subject,
    pub payload: Payload,
    /// The turn the report claims to describe
    pub observed_turn: Turn,
}

impl Report {
    pub fn kind(&self) -> SignalKind {
        match self.payload {
            Payload::Position(_) => SignalKind::Position,
            Payload::Strength(_) => SignalKind::StrengthEstimate,
            Payload::Ownership(_) => SignalKind::Ownership,
        }
    }

    /// Turns elapsed between the described turn and `now`
    pub fn age(&self, now: Turn) -> u32 {
        now.saturating_sub(self.observed_turn)
    }
}

/// How a report relates to the truth (engine-internal)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Truthfulness {
    Accurate,
    /// Last confirmed state, no longer current
    Stale,
    /// Deliberately false
    Fabricated,
}

/// A report delivered to one side
#[derive(Debug, Clone)]
pub struct Signal {
    report: Report,
    truth: Truthfulness,
}

impl Signal {
    pub(crate) fn accurate(report: Report) -> Self {
        Self {
            report,
            truth: Truthfulness::Accurate,
        }
    }

    pub(crate) fn stale(report: Report) -> Self {
        Self {
            report,
            truth: Truthfulness::Stale,
        }
    }

    pub(crate) fn fabricated(report: Report) -> Self {
        Self {
            report,
            truth: Truthfulness::Fabricated,
        }
    }

    pub fn report(&self) -> &Report {
        &self.report
    }

    pub fn kind(&self) -> SignalKind {
        self.report.kind()
    }

    pub fn subject(&self) -> Subject {
        self.report.subject
    }

    pub fn payload(&self) -> Payload {
        self.report.payload
    }

    pub fn observed_turn(&self) -> Turn {
        self.report.observed_turn
    }

    /// Test-only instrumentation
    #[cfg(test)]
    pub(crate) fn truthfulness(&self) -> Truthfulness {
        self.truth
    }

    pub(super) fn is_fabricated(&self) -> bool {
        self.truth == Truthfulness::Fabricated
    }

    pub(super) fn is_stale(&self) -> bool {
        self.truth == Truthfulness::Stale
    }
}

/// Two signals are equal when they say the same thing
impl PartialEq for Signal {
    fn eq(&self, other: &Self) -> bool {
        self.report == other.report
    }
}

impl Serialize for Signal {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.report.serialize(serializer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn position_report(turn: Turn) -> Report {
        Report {
            subject: Subject::Contact(ContactId(1)),
            payload: Payload::Position(Coord::new(2, 3)),
            observed_turn: turn,
        }
    }

    #[test]
    fn test_report_kind_and_age() {
        let report = position_report(3);
        assert_eq!(report.kind(), SignalKind::Position);
        assert_eq!(report.age(5), 2);
        assert_eq!(report.age(2), 0);
    }

    #[test]
    fn test_truth_is_invisible_to_consumers() {
        let accurate = Signal::accurate(position_report(4));
        let fabricated = Signal::fabricated(position_report(4));

        assert_eq!(accurate, fabricated);
        assert_eq!(
            serde_json::to_string(&accurate).unwrap(),
            serde_json::to_string(&fabricated).unwrap()
        );
        assert_ne!(accurate.truthfulness(), fabricated.truthfulness());
    }

    #[test]
    fn test_serialized_form_has_no_truth_field() {
        let json = serde_json::to_value(Signal::stale(position_report(1))).unwrap();
        let fields: Vec<&String> = json.as_object().unwrap().keys().collect();
        assert_eq!(fields, vec!["observed_turn", "payload", "subject"]);
    }
}
