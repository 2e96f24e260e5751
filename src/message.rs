//! The internal message-based coherence protocol: the three typed messages
//! (Request, Data, Response) that the bridge speaks to the downstream
//! protocol, plus the classification enums C1 translates CHI opcodes into.

use crate::phase::RespState;
use std::fmt;

/// Internal request type, the target of the CHI→internal REQ mapping.
/// Two pairs are deliberately collapsed onto one variant:
/// `ReadClean`/`ReadOnce` CHI opcodes both produce `ReadOnce` here, and
/// `CleanUnique`/`MakeUnique` both produce `CleanUnique` here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InternalReqType {
    ReadShared,
    ReadOnce,
    ReadUnique,
    MakeReadUnique,
    ReadNotSharedDirty,
    ReadNoSnp,
    CleanUnique,
    Evict,
    StashOnceShared,
    StashOnceUnique,
    WriteUniquePtl,
    WriteUniqueFull,
    WriteUniqueZero,
    WriteBackFull,
    WriteEvictFull,
}

impl fmt::Display for InternalReqType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Internal data-beat kind. Each state-qualified CHI family (`CompData_*`,
/// `CBWrData_*`, `SnpRespData_*`) becomes one variant here carrying the
/// `RespState` as a field, rather than one enum variant per state. The
/// qualifying states a given variant may legally carry are validated in
/// `translate`, not encoded in the type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataKind {
    /// State-independent; CHI's `NON_COPY_BACK_WR_DATA`.
    NonCopyBackWrData,
    /// CHI's `COPY_BACK_WR_DATA`; valid states I, UC, SC, UD_PD.
    CopyBackWrData(RespState),
    /// CHI's `SNP_RESP_DATA`; valid states I, SC, UC, SD, I_PD, SC_PD
    /// (UC_PD/SD_PD are normalized to UC/SD by the translator).
    SnpRespData(RespState),
    /// Same as `SnpRespData` but forwarded to a peer requester.
    SnpRespDataFwded(RespState),
    /// Downstream read completion data; valid states I, SC, UC, UD, SD.
    CompData(RespState),
    /// Downstream read completion data with a separate response; only UC
    /// is used by this bridge.
    DataSepResp(RespState),
}

impl fmt::Display for DataKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Internal response kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RspKind {
    CompAck,
    /// Valid state I only.
    SnpResp(RespState),
    /// Valid states I, UC, UD_PD.
    Comp(RespState),
    CompDbidResp,
    DbidResp,
    RetryAck,
    PcrdGrant,
}

impl fmt::Display for RspKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnpKind {
    SnpOnce,
    SnpOnceFwd,
    SnpShared,
    SnpUnique,
    SnpCleanInvalid,
}

impl fmt::Display for SnpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// An opaque downstream machine identifier. The bridge does not perform
/// address-range discovery; `map_address_to_downstream` below is a
/// placeholder collaborator returning a constant.
pub type Destination = u32;

#[derive(Debug, Clone)]
pub struct Request {
    pub addr: u64,
    pub acc_addr: u64,
    pub acc_size: usize,
    pub req_type: InternalReqType,
    pub allow_retry: bool,
    pub txn_id: u32,
    pub ns: bool,
    pub destination: Destination,
}

#[derive(Debug, Clone)]
pub struct Data {
    pub addr: u64,
    pub txn_id: u32,
    pub kind: DataKind,
    pub data_blk: Vec<u8>,
    pub bit_mask: u64,
    pub destination: Destination,
}

#[derive(Debug, Clone)]
pub struct Response {
    pub txn_id: u32,
    pub kind: RspKind,
    pub destination: Destination,
}

#[derive(Debug, Clone)]
pub struct Snoop {
    pub addr: u64,
    pub txn_id: u32,
    pub kind: SnpKind,
    pub ns: bool,
}

/// Address-range discovery is out of scope. Always routes to
/// a single downstream machine.
pub fn map_address_to_downstream(_addr: u64) -> Destination {
    0
}
