//! C2: owns outstanding transactions keyed by a registry-wide transaction
//! id, and knows how to build the right variant from a REQ opcode.

use crate::message::InternalReqType;
use crate::opcode::ReqOpcode;
use crate::payload::SharedPayload;
use crate::phase::Phase;
use crate::transaction::Transaction;
use crate::translate::req_opcode_to_internal;
use std::collections::HashMap;

#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistryError {
    #[error("no outstanding transaction for key {0}")]
    UnknownTransaction(u32),
    #[error("opcode {0} does not belong to any known transaction class")]
    UnsupportedTransaction(ReqOpcode),
}

/// `logical_txn_id → Transaction`. The key is `phase.txn_id + lpid*1024`,
/// formed by the caller. The registry itself is agnostic to how the key
/// is constructed.
#[derive(Default)]
pub struct Registry {
    outstanding: HashMap<u32, Transaction>,
}

impl Registry {
    pub fn new() -> Registry {
        Registry {
            outstanding: HashMap::new(),
        }
    }

    /// Build the right variant for `opcode` and insert it under `key`.
    /// Any opcode not in one of the three known transaction classes
    /// fails with `UnsupportedTransaction`.
    pub fn insert(
        &mut self,
        key: u32,
        opcode: ReqOpcode,
        payload: SharedPayload,
        phase: Phase,
    ) -> Result<(), RegistryError> {
        let req_type = req_opcode_to_internal(opcode)
            .map_err(|_| RegistryError::UnsupportedTransaction(opcode))?;
        let txn = Transaction::new(req_type, payload, phase)
            .ok_or(RegistryError::UnsupportedTransaction(opcode))?;
        self.outstanding.insert(key, txn);
        Ok(())
    }

    pub fn get_mut(&mut self, key: u32) -> Result<&mut Transaction, RegistryError> {
        self.outstanding
            .get_mut(&key)
            .ok_or(RegistryError::UnknownTransaction(key))
    }

    pub fn erase(&mut self, key: u32) {
        self.outstanding.remove(&key);
    }

    pub fn contains(&self, key: u32) -> bool {
        self.outstanding.contains_key(&key)
    }

    pub fn len(&self) -> usize {
        self.outstanding.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outstanding.is_empty()
    }

    /// Keys of every transaction still outstanding; used by the generator
    /// at teardown.
    pub fn outstanding_keys(&self) -> impl Iterator<Item = &u32> {
        self.outstanding.keys()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payload::{Payload, Size};
    use crate::phase::Channel;

    #[test]
    fn unsupported_opcode_is_rejected_at_factory_time() {
        let mut reg = Registry::new();
        let payload = Payload::new(0x1000, Size::B64, 64);
        let phase = Phase::new(Channel::Req, 1);
        // STASH_ONCE_SEP_SHARED is dataless and supported; WriteNoSnpPtl is
        // write and supported. There is no opcode in `ReqOpcode` outside
        // the three classes, so exercise the factory success path instead
        // and assert the registry actually holds an entry afterward.
        reg.insert(1, ReqOpcode::ReadShared, payload, phase).unwrap();
        assert!(reg.contains(1));
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn erase_removes_the_entry() {
        let mut reg = Registry::new();
        let payload = Payload::new(0x1000, Size::B64, 64);
        let phase = Phase::new(Channel::Req, 1);
        reg.insert(1, ReqOpcode::Evict, payload, phase).unwrap();
        reg.erase(1);
        assert!(!reg.contains(1));
    }
}
