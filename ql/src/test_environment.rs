#![cfg(test)]

use std::fmt::{Display, Formatter};

use anyhow::Result;

use crate::prelude::{Action, DebugVisualizer, Environment, ModelActionType, QlError, ToFeatureVector};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CorridorAction {
    Left,
    Right,
}

impl Display for CorridorAction {
    fn fmt(
        &self,
        f: &mut Formatter<'_>,
    ) -> std::fmt::Result {
        match self {
            CorridorAction::Left => f.write_str("←"),
            CorridorAction::Right => f.write_str("→"),
        }
    }
}

impl Action for CorridorAction {
    const ACTION_SPACE: ModelActionType = 2;

    fn numeric(&self) -> ModelActionType {
        match self {
            CorridorAction::Left => 0,
            CorridorAction::Right => 1,
        }
    }

    fn try_from_numeric(value: ModelActionType) -> Result<Self> {
        match value {
            0 => Ok(CorridorAction::Left),
            1 => Ok(CorridorAction::Right),
            _ => Err(QlError::InvalidAction(value).into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CorridorState {
    len: usize,
    pos: usize,
}

impl ToFeatureVector for CorridorState {
    fn feature_len(&self) -> usize { self.len }

    fn to_feature_vector(&self) -> Vec<f32> {
        let mut v = vec![0.0; self.len];
        v[self.pos] = 1.0;
        v
    }
}

impl DebugVisualizer for CorridorState {
    fn one_line_info(&self) -> String { format!("corridor position {} of {}", self.pos, self.len) }
}

/// One-dimensional corridor: starts in the middle, walking out on the right end pays 1.0, on the left end -1.0.
pub struct CorridorTestEnvironment {
    state: CorridorState,
    pub quit: bool,
    pub closed: bool,
}

impl CorridorTestEnvironment {
    pub fn new(len: usize) -> Self {
        assert!(len >= 2);
        Self {
            state: CorridorState { len, pos: len / 2 },
            quit: false,
            closed: false,
        }
    }
}

impl Environment for CorridorTestEnvironment {
    type S = CorridorState;
    type A = CorridorAction;

    fn reset(&mut self) -> &Self::S {
        self.state.pos = self.state.len / 2;
        &self.state
    }

    fn state(&self) -> &Self::S { &self.state }

    fn step(
        &mut self,
        action: Self::A,
    ) -> Result<(&Self::S, f32, bool)> {
        match action {
            CorridorAction::Left if self.state.pos == 0 => return Ok((&self.state, -1.0, true)),
            CorridorAction::Left => self.state.pos -= 1,
            CorridorAction::Right if self.state.pos + 1 == self.state.len => return Ok((&self.state, 1.0, true)),
            CorridorAction::Right => self.state.pos += 1,
        }
        Ok((&self.state, -0.01, false))
    }

    fn close(&mut self) { self.closed = true; }

    fn quit_requested(&self) -> bool { self.quit }
}
