use crate::{InstanceId, Round};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq)]
pub enum MainVoteValue {
    Value(bool),
    Abstain,
}

impl MainVoteValue {
    pub fn one() -> Self {
        Self::Value(true)
    }

    pub fn zero() -> Self {
        Self::Value(false)
    }
}

impl std::fmt::Display for MainVoteValue {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            MainVoteValue::Value(v) => write!(f, "{}", u8::from(*v)),
            MainVoteValue::Abstain => write!(f, "abstain"),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq)]
pub enum Action {
    PreProcess(bool),
    PreVote(bool),
    MainVote(MainVoteValue),
    /// Our share of the common coin of the round.
    Coin(bool),
    Decision(bool),
}

/// One kind of vote per action. A node sends each kind at most once per round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum VoteKind {
    PreProcess,
    PreVote,
    MainVote,
    Coin,
    Decision,
}

impl Action {
    pub fn kind(&self) -> VoteKind {
        match self {
            Action::PreProcess(_) => VoteKind::PreProcess,
            Action::PreVote(_) => VoteKind::PreVote,
            Action::MainVote(_) => VoteKind::MainVote,
            Action::Coin(_) => VoteKind::Coin,
            Action::Decision(_) => VoteKind::Decision,
        }
    }
}

#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub instance: InstanceId,
    pub round: Round,
    pub action: Action,
    /// Free-form justification. Only logged.
    pub justification: String,
}

impl Message {
    pub fn action_str(&self) -> &str {
        match self.action {
            Action::PreProcess(_) => "pre-process",
            Action::PreVote(_) => "pre-vote",
            Action::MainVote(_) => "main-vote",
            Action::Coin(_) => "coin",
            Action::Decision(_) => "decision",
        }
    }
}
