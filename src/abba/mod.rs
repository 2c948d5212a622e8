pub mod error;
pub mod message;
mod votes;

use self::error::{Error, Result};
use self::message::{Action, MainVoteValue, Message, VoteKind};
use self::votes::{count_bits, quorum_votes, VoteTable};
use crate::broadcaster::Broadcaster;
use crate::coin::{CoinScheme, CoinService};
use crate::{bundle, InstanceId, NodeId, Round};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

pub(crate) const MODULE_NAME: &str = "abba";

/// The ABBA holds the information for Asynchronous Binary Byzantine Agreement protocol.
///
/// Every round moves through the phases pre-process (round one only),
/// pre-vote, main-vote and, when the main-votes disagree, coin. A node
/// decides once a quorum of main-votes carries the same value, and also
/// adopts any decision a peer announces.
pub(crate) struct Abba {
    instance: InstanceId,
    i: NodeId,        // this node
    threshold: usize, // the quorum, $2f+1$
    started: bool,
    votes: VoteTable,
    sent: BTreeSet<(Round, VoteKind)>,
    coin_scheme: Arc<dyn CoinScheme>,
    coins: CoinService,
    decided_value: Option<bool>,
}

impl Abba {
    pub fn new(
        instance: InstanceId,
        i: NodeId,
        threshold: usize,
        coin_scheme: Arc<dyn CoinScheme>,
    ) -> Self {
        Self {
            instance,
            i,
            threshold,
            started: false,
            votes: VoteTable::new(threshold),
            sent: BTreeSet::new(),
            coin_scheme,
            coins: CoinService::new(threshold),
            decided_value: None,
        }
    }

    /// Starts the agreement with our input bit. Calling it again is a no-op.
    pub fn start(
        &mut self,
        input: bool,
        justification: String,
        broadcaster: &mut Broadcaster,
    ) -> Result<()> {
        if self.started || self.decided_value.is_some() {
            return Ok(());
        }
        self.started = true;
        log::info!(
            "[{} {}] starting abba with input {} ({})",
            self.i,
            self.instance,
            u8::from(input),
            justification
        );
        self.send_once(1, Action::PreProcess(input), justification, broadcaster)
    }

    // receive_message process the received message 'msg` from `sender`
    pub fn receive_message(
        &mut self,
        sender: NodeId,
        msg: Message,
        broadcaster: &mut Broadcaster,
    ) -> Result<()> {
        log::debug!(
            "[{} {}] received {} message: {:?} from {}",
            self.i,
            self.instance,
            msg.action_str(),
            msg.action,
            sender
        );

        self.check_message(&msg)?;

        if self.decided_value.is_some() {
            log::trace!("[{} {}] already decided", self.i, self.instance);
            return Ok(());
        }

        if let Action::Coin(share) = msg.action {
            return self.on_coin_share(sender, msg.round, share, broadcaster);
        }

        let round = msg.round;
        if !self.votes.add(round, sender, &msg.action) {
            log::debug!(
                "[{} {}] duplicated {} from {} in round {}",
                self.i,
                self.instance,
                msg.action_str(),
                sender,
                round
            );
            return Ok(());
        }

        match msg.action {
            Action::PreProcess(_) => self.on_pre_process(round, broadcaster),
            Action::PreVote(_) => self.on_pre_vote(round, broadcaster),
            Action::MainVote(_) => self.on_main_vote(round, broadcaster),
            Action::Decision(value) => {
                log::info!(
                    "[{} {}] adopting decision {} of {}",
                    self.i,
                    self.instance,
                    u8::from(value),
                    sender
                );
                self.decided_value = Some(value);
                Ok(())
            }
            Action::Coin(_) => Ok(()),
        }
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    pub fn decided_value(&self) -> Option<bool> {
        self.decided_value
    }

    pub fn coin(&self, round: Round) -> Option<bool> {
        self.coins.coin(round)
    }

    pub fn pre_votes(&self, round: Round) -> Option<&BTreeMap<NodeId, bool>> {
        self.votes.pre_vote.votes(&round)
    }

    pub fn main_votes(&self, round: Round) -> Option<&BTreeMap<NodeId, MainVoteValue>> {
        self.votes.main_vote.votes(&round)
    }

    // Round one: pre-vote the simple majority of a quorum of pre-process
    // votes. Ties go to one.
    fn on_pre_process(&mut self, round: Round, broadcaster: &mut Broadcaster) -> Result<()> {
        if round != 1 {
            return Ok(());
        }
        let (ones, zeros) = match quorum_votes(&self.votes.pre_process, round) {
            Some(votes) => count_bits(votes.values()),
            None => return Ok(()),
        };
        self.send_once(
            round,
            Action::PreVote(ones >= zeros),
            String::new(),
            broadcaster,
        )
    }

    fn on_pre_vote(&mut self, round: Round, broadcaster: &mut Broadcaster) -> Result<()> {
        let (ones, zeros) = match quorum_votes(&self.votes.pre_vote, round) {
            Some(votes) => count_bits(votes.values()),
            None => return Ok(()),
        };
        let value = if ones >= self.threshold {
            MainVoteValue::one()
        } else if zeros >= self.threshold {
            MainVoteValue::zero()
        } else {
            MainVoteValue::Abstain
        };
        self.send_once(round, Action::MainVote(value), String::new(), broadcaster)
    }

    fn on_main_vote(&mut self, round: Round, broadcaster: &mut Broadcaster) -> Result<()> {
        let unanimous = match quorum_votes(&self.votes.main_vote, round) {
            Some(votes) => {
                let mut values = votes.values().copied();
                match values.next() {
                    Some(MainVoteValue::Value(v)) => {
                        values.all(|m| m == MainVoteValue::Value(v)).then_some(v)
                    }
                    _ => None,
                }
            }
            None => return Ok(()),
        };

        if let Some(value) = unanimous {
            return self.decide(round, value, broadcaster);
        }

        let share = self.coin_scheme.make_share(self.i, self.instance, round);
        self.send_once(round, Action::Coin(share), String::new(), broadcaster)?;
        self.try_pre_vote(round + 1, broadcaster)
    }

    fn on_coin_share(
        &mut self,
        sender: NodeId,
        round: Round,
        share: bool,
        broadcaster: &mut Broadcaster,
    ) -> Result<()> {
        if !self
            .coin_scheme
            .verify_share(sender, self.instance, round, share)
        {
            return Err(Error::InvalidMessage(format!(
                "invalid coin share from {sender} in round {round}"
            )));
        }
        let coin = self
            .coins
            .on_share(self.coin_scheme.as_ref(), round, sender, share);
        if let Some(coin) = coin {
            log::debug!(
                "[{} {}] coin of round {} is {}",
                self.i,
                self.instance,
                round,
                u8::from(coin)
            );
            self.try_pre_vote(round + 1, broadcaster)?;
        }
        Ok(())
    }

    // Pre-vote for a round after the first, from the main-votes of the
    // previous round: any zero wins, then any one, and only if every
    // main-vote abstained the coin decides.
    fn try_pre_vote(&mut self, round: Round, broadcaster: &mut Broadcaster) -> Result<()> {
        if round <= 1 || self.sent.contains(&(round, VoteKind::PreVote)) {
            return Ok(());
        }
        let prev = round - 1;
        let main_votes = match quorum_votes(&self.votes.main_vote, prev) {
            Some(votes) => votes,
            None => return Ok(()),
        };

        let value = if main_votes.values().any(|m| *m == MainVoteValue::zero()) {
            false
        } else if main_votes.values().any(|m| *m == MainVoteValue::one()) {
            true
        } else {
            match self.coins.coin(prev) {
                Some(coin) => coin,
                None => return Ok(()),
            }
        };
        self.send_once(round, Action::PreVote(value), String::new(), broadcaster)
    }

    fn decide(&mut self, round: Round, value: bool, broadcaster: &mut Broadcaster) -> Result<()> {
        if self.decided_value.is_some() {
            return Ok(());
        }
        log::info!(
            "[{} {}] decided {} in round {}",
            self.i,
            self.instance,
            u8::from(value),
            round
        );
        self.decided_value = Some(value);
        self.send_once(round, Action::Decision(value), String::new(), broadcaster)
    }

    fn check_message(&self, msg: &Message) -> Result<()> {
        if msg.instance != self.instance {
            return Err(Error::InvalidMessage(format!(
                "invalid instance. expected: {}, got {}",
                self.instance, msg.instance
            )));
        }
        if msg.round == 0 || msg.round == Round::MAX {
            return Err(Error::InvalidMessage(format!("invalid round {}", msg.round)));
        }
        Ok(())
    }

    // send_once broadcasts a vote of the given kind for `round` the first
    // time it is asked to, and handles it as if we received it.
    fn send_once(
        &mut self,
        round: Round,
        action: Action,
        justification: String,
        broadcaster: &mut Broadcaster,
    ) -> Result<()> {
        if !self.sent.insert((round, action.kind())) {
            return Ok(());
        }
        let msg = Message {
            instance: self.instance,
            round,
            action,
            justification,
        };
        log::debug!(
            "[{} {}] broadcasting {} in round {}: {:?}",
            self.i,
            self.instance,
            msg.action_str(),
            round,
            action
        );
        broadcaster.broadcast(bundle::Message::Abba(msg.clone()));
        self.receive_message(self.i, msg, broadcaster)
    }
}


#[cfg(test)]
#[path = "./proptest.rs"]
mod proptest;
