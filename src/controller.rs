//! C4: receives upstream CHI submissions, constructs and emits internal
//! messages via the downstream interface; receives internal messages and
//! dispatches them into the registry; synthesizes implicit CompAck; routes
//! credit grants and snoops.

use crate::downstream::Downstream;
use crate::message::{map_address_to_downstream, Data, Request, Response, RspKind, Snoop};
use crate::opcode::{ReqOpcode, RspOpcode};
use crate::payload::{Payload, SharedPayload, Size};
use crate::phase::{line_address, transaction_size, Channel, Phase};
use crate::registry::{Registry, RegistryError};
use crate::translate::{chi_data_to_internal, chi_response_to_internal, internal_snp_to_chi, req_opcode_to_internal};
use log::debug;

pub struct BridgeController<D: Downstream> {
    pub registry: Registry,
    downstream: D,
    bw: Option<Box<dyn FnMut(SharedPayload, Phase)>>,
    line_size: usize,
}

impl<D: Downstream> BridgeController<D> {
    pub fn new(downstream: D, line_size: usize) -> BridgeController<D> {
        BridgeController {
            registry: Registry::new(),
            downstream,
            bw: None,
            line_size,
        }
    }

    /// Wires the generator's receive callback in, as a single-assignment
    /// function-valued field.
    pub fn set_bw(&mut self, cb: impl FnMut(SharedPayload, Phase) + 'static) {
        self.bw = Some(Box::new(cb));
    }

    pub fn downstream(&self) -> &D {
        &self.downstream
    }

    fn call_bw(&mut self, payload: SharedPayload, phase: Phase) {
        if let Some(bw) = self.bw.as_mut() {
            bw(payload, phase);
        }
    }

    /// The registry key multiplexes `lpid` with the wire `txn_id`
    /// key.
    pub fn registry_key(phase_txn_id: u16, lpid: u8) -> u32 {
        phase_txn_id as u32 + (lpid as u32) * 1024
    }

    pub fn send_msg(&mut self, payload: SharedPayload, phase: Phase) {
        match phase.channel {
            Channel::Req => self.send_request(payload, phase),
            Channel::Dat => self.send_data(payload, phase),
            Channel::Rsp => self.send_response(payload, phase),
            Channel::Snp => panic!("controller never emits on the SNP channel"),
        }
    }

    pub fn send_request(&mut self, payload: SharedPayload, phase: Phase) {
        let opcode = phase.req_opcode.expect("REQ phase must carry a req_opcode");
        let req_type = req_opcode_to_internal(opcode).expect("unsupported opcode should be rejected before send");
        let (acc_addr, acc_size) = Self::req_addr_and_size(&payload, opcode, self.line_size);
        let (addr, lpid, ns) = {
            let p = payload.borrow();
            (line_address(p.address, self.line_size as u64), p.lpid, p.ns)
        };
        let key = Self::registry_key(phase.txn_id, lpid);
        let req = Request {
            addr,
            acc_addr,
            acc_size,
            req_type,
            allow_retry: phase.allow_retry,
            txn_id: key,
            ns,
            destination: map_address_to_downstream(addr),
        };
        debug!("send_request txn_id={} type={}", key, req_type);
        self.downstream.send_request(req);
        self.registry
            .insert(key, opcode, payload, phase)
            .expect("opcode already validated above");
    }

    /// `WRITE_NO_SNP_PTL` derives its request address/size from the
    /// byte-enable mask; every other opcode uses the payload's own
    /// address/size.
    fn req_addr_and_size(payload: &SharedPayload, opcode: ReqOpcode, line_size: usize) -> (u64, usize) {
        let p = payload.borrow();
        if opcode == ReqOpcode::WriteNoSnpPtl {
            let acc_addr = line_address(p.address, line_size as u64) + p.ctz_byte_enable() as u64;
            let acc_size = p.popcount_byte_enable() as usize;
            (acc_addr, acc_size)
        } else {
            let size = transaction_size(p.size, line_size);
            debug_assert!(size >= p.popcount_byte_enable() as usize);
            (p.address, size)
        }
    }

    pub fn send_data(&mut self, payload: SharedPayload, phase: Phase) {
        let dat_opcode = phase.dat_opcode.expect("DAT phase must carry a dat_opcode");
        let kind = chi_data_to_internal(dat_opcode, phase.resp).expect("unsupported dat opcode/resp");
        let lpid = payload.borrow().lpid;
        let key = Self::registry_key(phase.txn_id, lpid);
        let window_start = (phase.data_id as u64) * 16;
        let (data_blk, bit_mask, addr) = {
            let p = payload.borrow();
            let window_mask: u64 = 0xFFFF_FFFFu64.checked_shl(window_start as u32).unwrap_or(0);
            (p.data.clone(), p.byte_enable & window_mask, line_address(p.address, self.line_size as u64))
        };
        let msg = Data {
            addr,
            txn_id: key,
            kind,
            data_blk,
            bit_mask,
            destination: map_address_to_downstream(addr),
        };
        debug!("send_data txn_id={}", key);
        self.downstream.send_data(msg);
    }

    pub fn send_response(&mut self, payload: SharedPayload, phase: Phase) {
        let rsp_opcode = phase.rsp_opcode.expect("RSP phase must carry a rsp_opcode");
        let kind = chi_response_to_internal(rsp_opcode, phase.resp).expect("unsupported rsp opcode/resp");
        let lpid = payload.borrow().lpid;
        let key = Self::registry_key(phase.txn_id, lpid);
        let addr = line_address(payload.borrow().address, self.line_size as u64);
        let msg = Response {
            txn_id: key,
            kind,
            destination: map_address_to_downstream(addr),
        };
        debug!("send_response txn_id={}", key);
        self.downstream.send_response(msg);
    }

    /// This bridge only plays the RN-F role: it never receives an
    /// upstream-bound request.
    pub fn recv_request(&mut self, _msg: Request) {
        panic!("recv_request is unused by this bridge's role");
    }

    pub fn recv_snoop(&mut self, msg: Snoop) {
        let payload = Payload::new(msg.addr, Size::B64, self.line_size);
        payload.borrow_mut().ns = msg.ns;
        let snp_opcode = internal_snp_to_chi(msg.kind);
        let mut phase = Phase::new(Channel::Snp, (msg.txn_id % 1024) as u16);
        phase.snp_opcode = Some(snp_opcode);
        debug!("recv_snoop txn_id={}", phase.txn_id);
        // No registry entry is created; `payload` is owned solely by this
        // call into `bw`.
        self.call_bw(payload, phase);
    }

    pub fn recv_response(&mut self, msg: Response) -> Result<(), RegistryError> {
        if matches!(msg.kind, RspKind::PcrdGrant) {
            let payload = Payload::new(0, Size::B64, self.line_size);
            let mut phase = Phase::new(Channel::Rsp, (msg.txn_id % 1024) as u16);
            phase.rsp_opcode = Some(RspOpcode::PcrdGrant);
            phase.pcrd_type = 0; // this bridge never differentiates credit pools
            debug!("recv_response PcrdGrant, no registry lookup");
            self.call_bw(payload, phase);
            return Ok(());
        }
        let txn = self.registry.get_mut(msg.txn_id)?;
        let outcome = txn
            .handle_response(&msg)
            .expect("response opcode/resp already validated at emission");
        let payload = txn.payload().clone();
        if outcome.terminal {
            self.registry.erase(msg.txn_id);
        }
        self.call_bw(payload, outcome.bw_phase);
        Ok(())
    }

    pub fn recv_data(&mut self, msg: Data) -> Result<(), RegistryError> {
        let txn = self.registry.get_mut(msg.txn_id)?;
        let outcome = txn
            .handle_data(&msg)
            .expect("data opcode/resp already validated at emission");
        let payload = txn.payload().clone();
        if outcome.terminal {
            self.registry.erase(msg.txn_id);
        }
        if outcome.forward {
            self.call_bw(payload.clone(), outcome.bw_phase);
        }
        if outcome.send_comp_ack {
            self.send_synthesized_comp_ack(msg.txn_id, &payload);
        }
        Ok(())
    }

    fn send_synthesized_comp_ack(&mut self, key: u32, payload: &SharedPayload) {
        let addr = line_address(payload.borrow().address, self.line_size as u64);
        let msg = Response {
            txn_id: key,
            kind: RspKind::CompAck,
            destination: map_address_to_downstream(addr),
        };
        debug!("synthesizing CompAck for txn_id={}", key);
        self.downstream.send_response(msg);
    }
}
