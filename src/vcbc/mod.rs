pub mod error;
pub mod message;

use self::error::{Error, Result};
use self::message::{CertProposal, Echo, Message};
use crate::broadcaster::Broadcaster;
use crate::quorum::QuorumStore;
use crate::{bundle, InstanceId, NodeId, Proposal, Step};
use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, BTreeSet};
use std::time::{SystemTime, UNIX_EPOCH};

pub(crate) const MODULE_NAME: &str = "vcbc";

/// Client input is echoed at this step.
pub const INPUT_STEP: Step = 1;

/// A proposal whose proposer showed a quorum of echoes for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertifiedProposal {
    pub value: Proposal,
    pub proof: String,
}

// Echo-based consistent broadcast for one instance.
//
// Every node echoes its own client value. A node without a value yet also
// relays the first value a peer echoes at the input step, once. A node whose
// own input collects a quorum of echoes broadcasts it as a certified
// proposal, once.
pub(crate) struct Vcbc {
    instance: InstanceId,
    i: NodeId, // this node
    input: Option<Proposal>,
    echoed: BTreeSet<(Step, Proposal)>,
    relayed: bool,
    echoes: QuorumStore<(Step, Proposal)>,
    cert_sent: bool,
    certified: BTreeMap<NodeId, CertifiedProposal>,
}

impl Vcbc {
    pub fn new(instance: InstanceId, i: NodeId, threshold: usize) -> Self {
        Self {
            instance,
            i,
            input: None,
            echoed: BTreeSet::new(),
            relayed: false,
            echoes: QuorumStore::new(threshold),
            cert_sent: false,
            certified: BTreeMap::new(),
        }
    }

    /// Records the client value of this node and echoes it.
    ///
    /// Proposing the same value again is a no-op. If a quorum already echoed
    /// the value before the client submitted it, the certificate goes out now.
    pub fn propose(&mut self, value: Proposal, broadcaster: &mut Broadcaster) -> Result<()> {
        if value.is_empty() {
            return Err(Error::EmptyProposal);
        }
        match &self.input {
            Some(input) if input == &value => return Ok(()),
            Some(_) => return Err(Error::DuplicatedProposal(self.instance)),
            None => {}
        }

        log::info!(
            "[{} {}] proposing {} bytes",
            self.i,
            self.instance,
            value.len()
        );
        self.input = Some(value.clone());
        self.try_broadcast_cert(INPUT_STEP, &value, broadcaster)?;
        self.echo(INPUT_STEP, value, broadcaster)
    }

    pub fn receive_message(
        &mut self,
        sender: NodeId,
        msg: Message,
        broadcaster: &mut Broadcaster,
    ) -> Result<()> {
        log::debug!(
            "[{} {}] received {} message from {}",
            self.i,
            self.instance,
            msg.action_str(),
            sender
        );

        if msg.instance() != self.instance {
            return Err(Error::InvalidMessage(format!(
                "invalid instance. expected: {}, got {}",
                self.instance,
                msg.instance()
            )));
        }

        match msg {
            Message::Echo(echo) => self.on_echo(sender, echo, broadcaster),
            Message::CertProposal(cert) => self.on_cert_proposal(sender, cert),
        }
    }

    /// Certified proposals by proposer.
    pub fn certified(&self) -> &BTreeMap<NodeId, CertifiedProposal> {
        &self.certified
    }

    pub fn input(&self) -> Option<&Proposal> {
        self.input.as_ref()
    }

    pub fn is_cert_sent(&self) -> bool {
        self.cert_sent
    }

    pub fn echo_count(&self, step: Step, value: &Proposal) -> usize {
        self.echoes.count(&(step, value.clone()))
    }

    fn on_echo(&mut self, sender: NodeId, echo: Echo, broadcaster: &mut Broadcaster) -> Result<()> {
        if echo.value.is_empty() {
            return Err(Error::InvalidMessage(format!(
                "empty echo from {sender}"
            )));
        }

        if sender != self.i && echo.step == INPUT_STEP && self.input.is_none() && !self.relayed {
            self.relayed = true;
            self.echo(echo.step, echo.value.clone(), broadcaster)?;
        }

        let added = self.echoes.add((echo.step, echo.value.clone()), sender, ());
        if added.crossed() {
            log::debug!(
                "[{} {}] echo quorum reached at step {}",
                self.i,
                self.instance,
                echo.step
            );
            self.try_broadcast_cert(echo.step, &echo.value, broadcaster)?;
        }
        Ok(())
    }

    fn on_cert_proposal(&mut self, proposer: NodeId, cert: CertProposal) -> Result<()> {
        if cert.value.is_empty() {
            return Err(Error::InvalidMessage(format!(
                "empty certified proposal from {proposer}"
            )));
        }

        match self.certified.entry(proposer) {
            Entry::Vacant(e) => {
                log::info!(
                    "[{} {}] certified proposal from {}: {}",
                    self.i,
                    self.instance,
                    proposer,
                    cert.proof
                );
                e.insert(CertifiedProposal {
                    value: cert.value,
                    proof: cert.proof,
                });
            }
            Entry::Occupied(e) => {
                if e.get().value != cert.value {
                    log::warn!(
                        "[{} {}] ignoring conflicting certified proposal from {}",
                        self.i,
                        self.instance,
                        proposer
                    );
                }
            }
        }
        Ok(())
    }

    fn try_broadcast_cert(
        &mut self,
        step: Step,
        value: &Proposal,
        broadcaster: &mut Broadcaster,
    ) -> Result<()> {
        if self.cert_sent || self.input.as_ref() != Some(value) {
            return Ok(());
        }
        let key = (step, value.clone());
        if !self.echoes.has_quorum(&key) {
            return Ok(());
        }

        let signers: Vec<String> = self.echoes.signers(&key).map(|s| s.to_string()).collect();
        let proof = format!(
            "QC|proposer={}|inst={}|step={}|signers={}",
            self.i,
            self.instance,
            step,
            signers.join(",")
        );
        self.cert_sent = true;
        self.broadcast(
            Message::CertProposal(CertProposal {
                instance: self.instance,
                value: value.clone(),
                proof,
            }),
            broadcaster,
        )
    }

    fn echo(&mut self, step: Step, value: Proposal, broadcaster: &mut Broadcaster) -> Result<()> {
        if !self.echoed.insert((step, value.clone())) {
            return Ok(());
        }
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();
        self.broadcast(
            Message::Echo(Echo {
                instance: self.instance,
                step,
                value,
                timestamp,
            }),
            broadcaster,
        )
    }

    // broadcast sends the message `msg` to all other peers in the network
    // and handles it as if we received it from ourselves.
    fn broadcast(&mut self, msg: Message, broadcaster: &mut Broadcaster) -> Result<()> {
        broadcaster.broadcast(bundle::Message::Vcbc(msg.clone()));
        self.receive_message(self.i, msg, broadcaster)
    }
}
