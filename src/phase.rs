//! The per-beat value object carried alongside a `Payload` on every send or
//! callback. Copied, never shared.

use crate::opcode::{DatOpcode, ReqOpcode, RspOpcode, SnpOpcode};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Req,
    Dat,
    Rsp,
    Snp,
}

/// MOESI-like coherence state, including the "passing dirty" variants CHI
/// attaches to a response or data beat.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RespState {
    I,
    Sc,
    Uc,
    Ud,
    Sd,
    IPd,
    ScPd,
    UcPd,
    UdPd,
    SdPd,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RespErr {
    Ok,
    ExOk,
    DErr,
    NdErr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Order {
    NoOrder,
    RequestAccepted,
    RequestOrder,
    EndpointOrder,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagOp {
    Invalid,
    Transfer,
    Update,
    Match,
    Fetch,
}

/// A value object describing the current CHI beat. Each transaction stores
/// the phase of its most recent observed beat; a fresh `Phase` is built for
/// every send.
#[derive(Debug, Clone, Copy)]
pub struct Phase {
    pub channel: Channel,
    pub req_opcode: Option<ReqOpcode>,
    pub dat_opcode: Option<DatOpcode>,
    pub rsp_opcode: Option<RspOpcode>,
    pub snp_opcode: Option<SnpOpcode>,
    /// 12-bit field; stored and compared modulo 1024.
    pub txn_id: u16,
    pub resp: Option<RespState>,
    pub dbid: u16,
    pub data_id: u8,
    pub pcrd_type: u8,
    pub exp_comp_ack: bool,
    pub allow_retry: bool,
    pub lcrd: bool,
    pub snp_attr: bool,
    pub do_dwt: bool,
    pub order: Order,
    pub resp_err: RespErr,
    pub tag_op: TagOp,
    pub qos: u8,
    pub c_busy: u8,
}

impl Phase {
    /// A blank phase on the given channel, with every opcode field unset
    /// and otherwise-defaulted flags. Callers fill in the fields relevant
    /// to their channel before sending.
    pub fn new(channel: Channel, txn_id: u16) -> Phase {
        Phase {
            channel,
            req_opcode: None,
            dat_opcode: None,
            rsp_opcode: None,
            snp_opcode: None,
            txn_id: txn_id % 1024,
            resp: None,
            dbid: 0,
            data_id: 0,
            pcrd_type: 0,
            exp_comp_ack: false,
            allow_retry: false,
            lcrd: false,
            snp_attr: false,
            do_dwt: false,
            order: Order::NoOrder,
            resp_err: RespErr::Ok,
            tag_op: TagOp::Invalid,
            qos: 0,
            c_busy: 0,
        }
    }
}

/// `line_address(a) = a & ~(line_size - 1)`.
pub fn line_address(addr: u64, line_size: u64) -> u64 {
    addr & !(line_size - 1)
}

/// Bus-width-dependent data beat index within a line.
///
/// - 128-bit bus: bits [5:4] of the address.
/// - 256-bit bus: bits [5:4] masked with `0b10` (only bit 5 survives).
/// - ≥512-bit bus: always 0.
pub fn data_id(addr: u64, bus_width_bits: u32) -> u8 {
    let bits54 = ((addr >> 4) & 0b11) as u8;
    match bus_width_bits {
        128 => bits54,
        256 => bits54 & 0b10,
        _ => 0,
    }
}

/// `transaction_size(enum) = 1 << enum_ordinal`, capped at the line size.
pub fn transaction_size(size: crate::payload::Size, line_size: usize) -> usize {
    size.bytes().min(line_size)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_address_masks_to_line_boundary() {
        assert_eq!(line_address(0x1003, 64), 0x1000);
        assert_eq!(line_address(0x1000, 64), 0x1000);
    }

    #[test]
    fn data_id_depends_only_on_address_bits_and_bus_width() {
        assert_eq!(data_id(0x30, 128), 0b11);
        assert_eq!(data_id(0x30, 256), 0b10);
        assert_eq!(data_id(0x1000, 512), 0);
        assert_eq!(data_id(0x1030, 512), 0);
    }

    #[test]
    fn phase_new_reduces_txn_id_mod_1024() {
        let p = Phase::new(Channel::Req, 1024 + 7);
        assert_eq!(p.txn_id, 7);
    }
}
