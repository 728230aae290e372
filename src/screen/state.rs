use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::MeasurementDraft;

/// Selectable angles, degrees.
pub const ANGLES: [u16; 12] = [0, 30, 60, 90, 120, 150, 180, 210, 240, 270, 300, 330];

/// Selectable distances, meters.
pub const DISTANCES: [f64; 6] = [0.5, 1.0, 2.0, 3.0, 5.0, 8.0];

pub const CENTIMETERS_PER_METER: f64 = 100.0;

pub const EMPTY_LIST_MESSAGE: &str = "No measurements recorded";

pub fn session_name(counter: u32) -> String {
    format!("session{counter}")
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ScreenError {
    #[error("unknown session '{0}'")]
    UnknownSession(String),

    #[error("distance {0} m is not one of the presets")]
    UnsupportedDistance(f64),

    #[error("angle {0}° is not one of the presets")]
    UnsupportedAngle(u16),
}

#[derive(Debug, Clone, PartialEq)]
pub enum ScreenAction {
    SelectSession(String),
    /// Append `session<counter + 1>` to the list and select it.
    CreateSession,
    SelectDistance(f64),
    SelectAngle(u16),
    StartMeasurement { at: DateTime<FixedOffset> },
    ClearMeasurements,
}

/// Work the caller has to carry out after an action.
#[derive(Debug, Clone, PartialEq)]
pub enum ScreenEffect {
    None,
    Record {
        session: String,
        draft: MeasurementDraft,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ScreenState {
    pub sessions: Vec<String>,
    pub session_counter: u32,
    pub selected_session: String,
    pub selected_distance_m: f64,
    pub selected_angle_deg: u16,
    /// Labels of measurements started on this screen, oldest first.
    pub measurements: Vec<String>,
}

impl Default for ScreenState {
    fn default() -> Self {
        let first = session_name(1);
        Self {
            sessions: vec![first.clone()],
            session_counter: 1,
            selected_session: first,
            selected_distance_m: DISTANCES[0],
            selected_angle_deg: ANGLES[0],
            measurements: Vec::new(),
        }
    }
}

impl ScreenState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Screen that already knows `sessions`, with the first one selected.
    pub fn with_sessions<I>(sessions: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        let sessions: Vec<String> = sessions.into_iter().map(Into::into).collect();
        let Some(first) = sessions.first().cloned() else {
            return Self::default();
        };

        Self {
            selected_session: first,
            session_counter: u32::try_from(sessions.len()).unwrap_or(u32::MAX),
            sessions,
            ..Self::default()
        }
    }

    pub fn apply(&mut self, action: ScreenAction) -> Result<ScreenEffect, ScreenError> {
        match action {
            ScreenAction::SelectSession(session) => {
                if !self.sessions.contains(&session) {
                    return Err(ScreenError::UnknownSession(session));
                }
                self.selected_session = session;
            }
            ScreenAction::CreateSession => {
                self.session_counter = self.session_counter.saturating_add(1);
                let session = session_name(self.session_counter);
                self.sessions.push(session.clone());
                self.selected_session = session;
            }
            ScreenAction::SelectDistance(distance) => {
                if !DISTANCES.contains(&distance) {
                    return Err(ScreenError::UnsupportedDistance(distance));
                }
                self.selected_distance_m = distance;
            }
            ScreenAction::SelectAngle(angle) => {
                if !ANGLES.contains(&angle) {
                    return Err(ScreenError::UnsupportedAngle(angle));
                }
                self.selected_angle_deg = angle;
            }
            ScreenAction::StartMeasurement { at } => {
                self.measurements.push(self.label_at(&at));
                let draft = MeasurementDraft::new(
                    self.selected_distance_m * CENTIMETERS_PER_METER,
                    f64::from(self.selected_angle_deg),
                    at.timestamp_millis(),
                );
                return Ok(ScreenEffect::Record {
                    session: self.selected_session.clone(),
                    draft,
                });
            }
            ScreenAction::ClearMeasurements => self.measurements.clear(),
        }

        Ok(ScreenEffect::None)
    }

    fn label_at(&self, at: &DateTime<FixedOffset>) -> String {
        format!(
            "[{}] Distance: {:?} m, Angle: {}°, Time: {}",
            self.selected_session,
            self.selected_distance_m,
            self.selected_angle_deg,
            at.naive_local().format("%Y-%m-%dT%H:%M:%S%.f"),
        )
    }

    /// Newest-first numbered lines, or the empty-list message.
    pub fn display_lines(&self) -> Vec<String> {
        if self.measurements.is_empty() {
            return vec![EMPTY_LIST_MESSAGE.to_string()];
        }

        self.measurements
            .iter()
            .rev()
            .enumerate()
            .map(|(index, label)| format!("{}. {}", index + 1, label))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(raw: &str) -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339(raw).unwrap()
    }

    #[test]
    fn starts_on_first_session_and_first_presets() {
        let state = ScreenState::new();
        assert_eq!(state.sessions, vec!["session1"]);
        assert_eq!(state.selected_session, "session1");
        assert_eq!(state.selected_distance_m, 0.5);
        assert_eq!(state.selected_angle_deg, 0);
        assert_eq!(state.display_lines(), vec![EMPTY_LIST_MESSAGE]);
    }

    #[test]
    fn create_session_numbers_sequentially_and_selects() {
        let mut state = ScreenState::new();
        state.apply(ScreenAction::CreateSession).unwrap();
        state.apply(ScreenAction::CreateSession).unwrap();

        assert_eq!(state.sessions, vec!["session1", "session2", "session3"]);
        assert_eq!(state.selected_session, "session3");

        state
            .apply(ScreenAction::SelectSession("session1".into()))
            .unwrap();
        assert_eq!(state.selected_session, "session1");
    }

    #[test]
    fn rejects_values_outside_presets() {
        let mut state = ScreenState::new();
        assert_eq!(
            state.apply(ScreenAction::SelectSession("nope".into())),
            Err(ScreenError::UnknownSession("nope".into()))
        );
        assert_eq!(
            state.apply(ScreenAction::SelectDistance(4.0)),
            Err(ScreenError::UnsupportedDistance(4.0))
        );
        assert_eq!(
            state.apply(ScreenAction::SelectAngle(45)),
            Err(ScreenError::UnsupportedAngle(45))
        );
        assert_eq!(state, ScreenState::new());
    }

    #[test]
    fn start_measurement_labels_and_emits_draft_in_centimeters() {
        let mut state = ScreenState::new();
        state.apply(ScreenAction::SelectDistance(2.0)).unwrap();
        state.apply(ScreenAction::SelectAngle(90)).unwrap();

        let moment = at("2024-05-01T12:34:56.789+02:00");
        let effect = state
            .apply(ScreenAction::StartMeasurement { at: moment })
            .unwrap();

        assert_eq!(
            effect,
            ScreenEffect::Record {
                session: "session1".into(),
                draft: MeasurementDraft::new(200.0, 90.0, moment.timestamp_millis()),
            }
        );
        assert_eq!(
            state.measurements,
            vec!["[session1] Distance: 2.0 m, Angle: 90°, Time: 2024-05-01T12:34:56.789"]
        );
    }

    #[test]
    fn display_is_newest_first_and_clear_empties() {
        let mut state = ScreenState::new();
        state
            .apply(ScreenAction::StartMeasurement { at: at("2024-05-01T10:00:00Z") })
            .unwrap();
        state.apply(ScreenAction::SelectDistance(0.5)).unwrap();
        state.apply(ScreenAction::SelectAngle(330)).unwrap();
        state
            .apply(ScreenAction::StartMeasurement { at: at("2024-05-01T10:00:01Z") })
            .unwrap();

        let lines = state.display_lines();
        assert_eq!(lines.len(), 2);
        assert_eq!(
            lines[0],
            "1. [session1] Distance: 0.5 m, Angle: 330°, Time: 2024-05-01T10:00:01"
        );
        assert!(lines[1].starts_with("2. [session1] Distance: 0.5 m, Angle: 0°"));

        assert_eq!(
            state.apply(ScreenAction::ClearMeasurements),
            Ok(ScreenEffect::None)
        );
        assert_eq!(state.display_lines(), vec![EMPTY_LIST_MESSAGE]);
    }

    #[test]
    fn with_sessions_selects_first_and_counts() {
        let mut state = ScreenState::with_sessions(["lab", "field"]);
        assert_eq!(state.selected_session, "lab");

        state.apply(ScreenAction::CreateSession).unwrap();
        assert_eq!(state.selected_session, "session3");

        let empty = ScreenState::with_sessions(Vec::<String>::new());
        assert_eq!(empty, ScreenState::new());
    }
}
