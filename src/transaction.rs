//! C3: per-variant handlers that consume incoming Data/Response messages,
//! update accumulated state, and decide terminal vs. continue.
//!
//! Modeled as a tagged sum (`Transaction`), not an inheritance hierarchy,
//! per the "Polymorphic transactions" design note.

use crate::message::{Data, DataKind, InternalReqType, Response, RspKind};
use crate::payload::SharedPayload;
use crate::phase::{Channel, Phase, RespState};
use crate::translate::{internal_data_to_chi, internal_response_to_chi, TranslateError};

/// `true` if the transaction's registry entry should be erased after this
/// message is handled.
pub type Terminal = bool;

pub struct ReadTransaction {
    pub payload: SharedPayload,
    pub phase: Phase,
    pub data_msgs_per_line: u32,
    pub data_msg_cnt: u32,
}

pub struct WriteTransaction {
    pub payload: SharedPayload,
    pub phase: Phase,
    pub recv_comp: bool,
    pub recv_dbid: bool,
}

pub struct DatalessTransaction {
    pub payload: SharedPayload,
    pub phase: Phase,
}

pub enum Transaction {
    Read(ReadTransaction),
    Write(WriteTransaction),
    Dataless(DatalessTransaction),
}

/// What the controller does once a transaction's handler has run: call
/// `bw` with the stamped phase, and possibly emit a synthesized CompAck.
pub struct HandleOutcome {
    pub terminal: Terminal,
    pub bw_phase: Phase,
    pub send_comp_ack: bool,
    /// `false` for a non-forwarded data beat: the controller must still
    /// erase on terminal but must not invoke `bw`.
    pub forward: bool,
}

impl HandleOutcome {
    fn forwarded(terminal: Terminal, bw_phase: Phase, send_comp_ack: bool) -> HandleOutcome {
        HandleOutcome {
            terminal,
            bw_phase,
            send_comp_ack,
            forward: true,
        }
    }
}

impl Transaction {
    /// Classify `req_type` into the Read/Write/Dataless opcode class and
    /// construct the corresponding variant. `data_msgs_per_line` is only
    /// meaningful for reads.
    pub fn new(req_type: InternalReqType, payload: SharedPayload, phase: Phase) -> Option<Transaction> {
        use InternalReqType as I;
        match req_type {
            I::ReadShared
            | I::ReadOnce
            | I::ReadNoSnp
            | I::ReadUnique
            | I::ReadNotSharedDirty
            | I::MakeReadUnique => {
                let line_size = payload.borrow().data.len();
                let beat_size = 32usize; // bus data-beat width assumed by the bridge's single Data-message granularity
                let data_msgs_per_line = (line_size / beat_size).max(1) as u32;
                Some(Transaction::Read(ReadTransaction {
                    payload,
                    phase,
                    data_msgs_per_line,
                    data_msg_cnt: 0,
                }))
            }
            I::WriteUniquePtl | I::WriteUniqueFull | I::WriteUniqueZero | I::WriteBackFull | I::WriteEvictFull => {
                Some(Transaction::Write(WriteTransaction {
                    payload,
                    phase,
                    recv_comp: false,
                    recv_dbid: false,
                }))
            }
            I::CleanUnique | I::Evict | I::StashOnceShared | I::StashOnceUnique => {
                Some(Transaction::Dataless(DatalessTransaction { payload, phase }))
            }
        }
    }

    pub fn phase(&self) -> &Phase {
        match self {
            Transaction::Read(t) => &t.phase,
            Transaction::Write(t) => &t.phase,
            Transaction::Dataless(t) => &t.phase,
        }
    }

    pub fn payload(&self) -> &SharedPayload {
        match self {
            Transaction::Read(t) => &t.payload,
            Transaction::Write(t) => &t.payload,
            Transaction::Dataless(t) => &t.payload,
        }
    }

    pub fn handle_response(&mut self, msg: &Response) -> Result<HandleOutcome, TranslateError> {
        match self {
            Transaction::Read(t) => t.handle_response(msg),
            Transaction::Write(t) => t.handle_response(msg),
            Transaction::Dataless(t) => t.handle_response(msg),
        }
    }

    pub fn handle_data(&mut self, msg: &Data) -> Result<HandleOutcome, TranslateError> {
        match self {
            Transaction::Read(t) => t.handle_data(msg),
            _ => unreachable!("only ReadTransaction accepts Data messages"),
        }
    }
}

/// Translate the internal response type to a CHI RSP opcode + resp state,
/// stamp the phase, and return it. Terminal
/// defaults to "not a retry"; callers override when their class needs a
/// different rule.
fn common_response_handle(phase: &mut Phase, msg: &Response) -> Result<Terminal, TranslateError> {
    let (rsp_opcode, resp) = internal_response_to_chi(msg.kind)?;
    phase.channel = Channel::Rsp;
    phase.rsp_opcode = Some(rsp_opcode);
    phase.resp = resp;
    phase.txn_id = (msg.txn_id % 1024) as u16;
    Ok(!matches!(msg.kind, RspKind::RetryAck))
}

impl ReadTransaction {
    pub fn handle_response(&mut self, msg: &Response) -> Result<HandleOutcome, TranslateError> {
        self.phase.dbid = (msg.txn_id % 1024) as u16;
        let terminal = common_response_handle(&mut self.phase, msg)?;
        Ok(HandleOutcome::forwarded(terminal, self.phase, false))
    }

    /// Whether `payload.address - msg.addr` is within the bit-mask gate
    /// that allows this beat to be forwarded upstream. Full-line payloads
    /// always forward.
    fn forward(&self, msg: &Data, line_size: usize) -> bool {
        let full_line = self.payload.borrow().size.bytes() >= line_size;
        if full_line {
            return true;
        }
        let offset = self.payload.borrow().address.wrapping_sub(msg.addr);
        if offset >= 64 {
            return false;
        }
        (msg.bit_mask >> offset) & 1 == 1
    }

    pub fn handle_data(&mut self, msg: &Data) -> Result<HandleOutcome, TranslateError> {
        self.data_msg_cnt += 1;

        {
            let mut payload = self.payload.borrow_mut();
            let line_size = payload.data.len();
            for b in 0..line_size.min(64) {
                if (msg.bit_mask >> b) & 1 == 1 && b < msg.data_blk.len() {
                    payload.data[b] = msg.data_blk[b];
                }
            }
        }

        let (dat_opcode, resp) = internal_data_to_chi(msg.kind);
        self.phase.channel = Channel::Dat;
        self.phase.dat_opcode = Some(dat_opcode);
        self.phase.resp = Some(resp);
        self.phase.txn_id = (msg.txn_id % 1024) as u16;

        let line_size = self.payload.borrow().data.len();
        let first_set_bit = msg.bit_mask.trailing_zeros() as u64;
        self.phase.data_id = crate::phase::data_id(msg.addr + first_set_bit, 256);

        // Non-forwarded beats are still counted toward `data_msg_cnt` but
        // are dropped upstream.
        let forward = self.forward(msg, line_size);

        if self.data_msg_cnt == self.data_msgs_per_line {
            let send_comp_ack = !self.phase.exp_comp_ack;
            Ok(HandleOutcome {
                terminal: true,
                bw_phase: self.phase,
                send_comp_ack,
                forward,
            })
        } else {
            Ok(HandleOutcome {
                terminal: false,
                bw_phase: self.phase,
                send_comp_ack: false,
                forward,
            })
        }
    }

    pub fn forwarded_for_test(&self, msg: &Data, line_size: usize) -> bool {
        self.forward(msg, line_size)
    }
}

impl DatalessTransaction {
    pub fn handle_response(&mut self, msg: &Response) -> Result<HandleOutcome, TranslateError> {
        debug_assert!(
            matches!(msg.kind, RspKind::Comp(_) | RspKind::RetryAck),
            "DatalessTransaction only accepts Comp or RetryAck"
        );
        let terminal = common_response_handle(&mut self.phase, msg)?;
        Ok(HandleOutcome::forwarded(terminal, self.phase, false))
    }
}

impl WriteTransaction {
    pub fn handle_response(&mut self, msg: &Response) -> Result<HandleOutcome, TranslateError> {
        match msg.kind {
            RspKind::CompDbidResp => {
                self.recv_comp = true;
                self.recv_dbid = true;
            }
            RspKind::Comp(_) => self.recv_comp = true,
            RspKind::DbidResp => self.recv_dbid = true,
            _ => {}
        }
        self.phase.dbid = (msg.txn_id % 1024) as u16;
        common_response_handle(&mut self.phase, msg)?;
        Ok(HandleOutcome::forwarded(
            self.recv_comp && self.recv_dbid,
            self.phase,
            false,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payload::{Payload, Size};

    fn read_txn(exp_comp_ack: bool) -> ReadTransaction {
        let payload = Payload::new(0x1000, Size::B64, 64);
        let mut phase = Phase::new(Channel::Req, 7);
        phase.exp_comp_ack = exp_comp_ack;
        ReadTransaction {
            payload,
            phase,
            data_msgs_per_line: 2,
            data_msg_cnt: 0,
        }
    }

    fn comp_data(addr: u64, txn_id: u32, bit_mask: u64, fill: u8) -> Data {
        Data {
            addr,
            txn_id,
            kind: DataKind::CompData(RespState::Uc),
            data_blk: vec![fill; 64],
            bit_mask,
            destination: 0,
        }
    }

    #[test]
    fn read_shared_completes_after_two_beats_no_synth_comp_ack() {
        let mut txn = read_txn(true);
        let beat1 = comp_data(0x1000, 7, 0x0000_0000_ffff_ffff, 0xAA);
        let out1 = txn.handle_data(&beat1).unwrap();
        assert!(!out1.terminal);

        let beat2 = comp_data(0x1000, 7, 0xffff_ffff_0000_0000, 0xBB);
        let out2 = txn.handle_data(&beat2).unwrap();
        assert!(out2.terminal);
        assert!(!out2.send_comp_ack);
        assert_eq!(txn.payload.borrow().data[0], 0xAA);
        assert_eq!(txn.payload.borrow().data[63], 0xBB);
    }

    #[test]
    fn read_shared_with_implicit_comp_ack_synthesizes_one() {
        let mut txn = read_txn(false);
        txn.handle_data(&comp_data(0x1000, 7, u64::MAX, 0xAA)).unwrap();
        let out2 = txn.handle_data(&comp_data(0x1000, 7, u64::MAX, 0xBB)).unwrap();
        assert!(out2.terminal);
        assert!(out2.send_comp_ack);
    }

    #[test]
    fn partial_size_payload_only_forwards_beats_covering_its_offset() {
        let payload = Payload::new(0x1004, Size::B4, 64);
        let mut txn = ReadTransaction {
            payload,
            phase: Phase::new(Channel::Req, 7),
            data_msgs_per_line: 2,
            data_msg_cnt: 0,
        };
        // Beat covers bytes [0, 32) of the line starting at 0x1000; the
        // payload's own offset (4) falls inside this beat's mask.
        let covering = comp_data(0x1000, 7, 0x0000_0000_ffff_ffff, 0xAA);
        let out1 = txn.handle_data(&covering).unwrap();
        assert!(out1.forward);

        // Second beat covers bytes [32, 64); offset 4 is outside its mask.
        let not_covering = comp_data(0x1000, 7, 0xffff_ffff_0000_0000, 0xBB);
        let out2 = txn.handle_data(&not_covering).unwrap();
        assert!(!out2.forward);
        assert!(out2.terminal, "still counts toward data_msg_cnt regardless of forwarding");
    }

    #[test]
    fn write_fused_comp_dbid_terminates_immediately() {
        let payload = Payload::new(0x2000, Size::B64, 64);
        let mut txn = WriteTransaction {
            payload,
            phase: Phase::new(Channel::Req, 42),
            recv_comp: false,
            recv_dbid: false,
        };
        let msg = Response {
            txn_id: 42,
            kind: RspKind::CompDbidResp,
            destination: 0,
        };
        let out = txn.handle_response(&msg).unwrap();
        assert!(out.terminal);
        assert!(txn.recv_comp && txn.recv_dbid);
    }

    #[test]
    fn write_split_dbid_then_comp_terminates_on_second() {
        let payload = Payload::new(0x2000, Size::B64, 64);
        let mut txn = WriteTransaction {
            payload,
            phase: Phase::new(Channel::Req, 43),
            recv_comp: false,
            recv_dbid: false,
        };
        let dbid = Response {
            txn_id: 43,
            kind: RspKind::DbidResp,
            destination: 0,
        };
        let out1 = txn.handle_response(&dbid).unwrap();
        assert!(!out1.terminal);

        let comp = Response {
            txn_id: 43,
            kind: RspKind::Comp(RespState::I),
            destination: 0,
        };
        let out2 = txn.handle_response(&comp).unwrap();
        assert!(out2.terminal);
    }

    #[test]
    fn retry_ack_never_terminates() {
        let payload = Payload::new(0x3000, Size::B64, 64);
        let mut txn = DatalessTransaction {
            payload,
            phase: Phase::new(Channel::Req, 9),
        };
        let msg = Response {
            txn_id: 9,
            kind: RspKind::RetryAck,
            destination: 0,
        };
        let out = txn.handle_response(&msg).unwrap();
        assert!(!out.terminal);
    }
}
