use std::fmt::{Display, Formatter};
use std::hash::Hash;
use std::path::PathBuf;

use anyhow::Result;

/// Data type we use to encode an `Action` to feed the model.
pub type ModelActionType = u8;

pub trait Action: Display + Sized + Clone + Copy + Hash + PartialEq + Eq {
    /// Number of possible actions
    const ACTION_SPACE: ModelActionType;
    /// Identifying the Action as a unique value in range (0..Self::ACTION_SPACE)
    fn numeric(&self) -> ModelActionType;
    fn try_from_numeric(value: ModelActionType) -> Result<Self>;
}

/// Produces the flat input vector a [crate::ml_model::model::QValueModel] consumes.
pub trait ToFeatureVector {
    /// Number of elements returned by [Self::to_feature_vector]
    fn feature_len(&self) -> usize;
    fn to_feature_vector(&self) -> Vec<f32>;
}

pub trait DebugVisualizer {
    fn one_line_info(&self) -> String;
}

/// Learning environment, modeling the world of a learning agent
pub trait Environment {
    type S: Clone + DebugVisualizer + ToFeatureVector;
    type A: Action;

    /// Resets the environment to a defined starting point and returns the initial state
    fn reset(&mut self) -> &Self::S;

    /// Current state
    fn state(&self) -> &Self::S;

    /// Performs one time/action-step.
    ///
    /// Applies the given `action` to the environment and returns:
    ///   - next state
    ///   - immediate reward earned during performing that step
    ///   - done flag (e.g. car left the track)
    ///
    fn step(
        &mut self,
        action: Self::A,
    ) -> Result<(&Self::S, f32, bool)>;

    /// Produces a visual snapshot of the current state for external consumers (if supported).
    fn render(&mut self) {}

    /// Releases rendering resources. Must be idempotent.
    fn close(&mut self) {}

    /// True once a host asked to stop (e.g. window closed / interrupt)
    fn quit_requested(&self) -> bool { false }
}

#[derive(Debug, Clone, PartialEq)]
pub enum QlError {
    /// action index outside the declared discrete action set
    InvalidAction(ModelActionType),
    /// checkpoint missing, unreadable or incompatible
    Load { path: PathBuf, reason: String },
    /// malformed input shapes or non-finite values inside the approximator
    Numeric(String),
    IncompatibleModel { expected: Vec<usize>, found: Vec<usize> },
    LockPoisoned,
}

impl QlError {
    pub fn numeric(msg: &str) -> Self { QlError::Numeric(msg.to_string()) }
}

impl Display for QlError {
    fn fmt(
        &self,
        f: &mut Formatter<'_>,
    ) -> std::fmt::Result {
        match self {
            QlError::InvalidAction(value) => write!(f, "action value {} out of range", value),
            QlError::Load { path, reason } => write!(f, "failed to load checkpoint {}: {}", path.display(), reason),
            QlError::Numeric(msg) => write!(f, "numeric failure: {}", msg),
            QlError::IncompatibleModel { expected, found } => {
                write!(f, "model architecture mismatch: expected {:?}, found {:?}", expected, found)
            }
            QlError::LockPoisoned => f.write_str("environment lock poisoned"),
        }
    }
}

impl std::error::Error for QlError {}
