//! C1: pure, total-with-explicit-reject opcode and response-state
//! translators between CHI wire opcodes and the internal protocol's types.
//!
//! Every function here either returns a value or an error; there is no
//! silent passthrough.

use crate::message::{DataKind, InternalReqType, RspKind, SnpKind};
use crate::opcode::{DatOpcode, ReqOpcode, RspOpcode, SnpOpcode};
use crate::phase::RespState;

#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TranslateError {
    #[error("no internal mapping for CHI REQ opcode {0}")]
    UnsupportedReqOpcode(ReqOpcode),
    #[error("no internal mapping for CHI DAT opcode {0} with resp {1:?}")]
    UnsupportedDatOpcode(DatOpcode, Option<RespState>),
    #[error("no internal mapping for CHI RSP opcode {0} with resp {1:?}")]
    UnsupportedRspOpcode(RspOpcode, Option<RespState>),
    #[error("no internal mapping for CHI SNP opcode {0}")]
    UnsupportedSnpOpcode(SnpOpcode),
    #[error("resp state {0:?} is not valid for this message")]
    InvalidResp(RespState),
}

/// CHI→internal REQ opcode.
///
/// `ReadClean`/`ReadOnce` both collapse onto `ReadOnce`; `CleanUnique`/
/// `MakeUnique` both collapse onto `CleanUnique`.
pub fn req_opcode_to_internal(op: ReqOpcode) -> Result<InternalReqType, TranslateError> {
    use InternalReqType as I;
    use ReqOpcode as R;
    Ok(match op {
        R::ReadShared => I::ReadShared,
        R::ReadOnce => I::ReadOnce,
        R::ReadClean => I::ReadOnce, // collapsed: ReadClean/ReadOnce -> ReadOnce
        R::ReadUnique | R::ReadPreferUnique => I::ReadUnique,
        R::MakeReadUnique => I::MakeReadUnique,
        R::ReadNotSharedDirty => I::ReadNotSharedDirty,
        R::ReadNoSnp => I::ReadNoSnp,
        R::CleanUnique | R::MakeUnique => I::CleanUnique, // collapsed
        R::Evict => I::Evict,
        R::StashOnceSepShared => I::StashOnceShared,
        R::StashOnceSepUnique => I::StashOnceUnique,
        R::WriteNoSnpPtl => I::WriteUniquePtl,
        R::WriteNoSnpFull | R::WriteUniqueFull => I::WriteUniqueFull,
        R::WriteUniqueZero => I::WriteUniqueZero,
        R::WriteBackFull => I::WriteBackFull,
        R::WriteEvictOrEvict => I::WriteEvictFull,
    })
}

/// Canonical internal→CHI REQ opcode, used by the generator/tests to
/// construct a request and by the round-trip test below. For
/// the collapsed pairs this returns one representative opcode; re-running
/// it through `req_opcode_to_internal` always yields the same
/// `InternalReqType` it started from.
pub fn internal_req_type_to_canonical_opcode(t: InternalReqType) -> ReqOpcode {
    use InternalReqType as I;
    use ReqOpcode as R;
    match t {
        I::ReadShared => R::ReadShared,
        I::ReadOnce => R::ReadOnce,
        I::ReadUnique => R::ReadUnique,
        I::MakeReadUnique => R::MakeReadUnique,
        I::ReadNotSharedDirty => R::ReadNotSharedDirty,
        I::ReadNoSnp => R::ReadNoSnp,
        I::CleanUnique => R::CleanUnique,
        I::Evict => R::Evict,
        I::StashOnceShared => R::StashOnceSepShared,
        I::StashOnceUnique => R::StashOnceSepUnique,
        I::WriteUniquePtl => R::WriteNoSnpPtl,
        I::WriteUniqueFull => R::WriteNoSnpFull,
        I::WriteUniqueZero => R::WriteUniqueZero,
        I::WriteBackFull => R::WriteBackFull,
        I::WriteEvictFull => R::WriteEvictOrEvict,
    }
}

/// CHI→internal DAT opcode, qualified by the current coherence state.
pub fn chi_data_to_internal(
    op: DatOpcode,
    resp: Option<RespState>,
) -> Result<DataKind, TranslateError> {
    use RespState as S;
    match op {
        DatOpcode::NonCopyBackWrData => Ok(DataKind::NonCopyBackWrData),
        DatOpcode::CopyBackWrData => match resp {
            Some(s @ (S::I | S::Uc | S::Sc | S::UdPd)) => Ok(DataKind::CopyBackWrData(s)),
            other => Err(TranslateError::UnsupportedDatOpcode(op, other)),
        },
        DatOpcode::SnpRespData => match resp {
            Some(s @ (S::I | S::Sc | S::Uc | S::Sd | S::IPd | S::ScPd)) => {
                Ok(DataKind::SnpRespData(s))
            }
            // UC_PD maps to UC, SD_PD maps to SD.
            Some(S::UcPd) => Ok(DataKind::SnpRespData(S::Uc)),
            Some(S::SdPd) => Ok(DataKind::SnpRespData(S::Sd)),
            None => Err(TranslateError::UnsupportedDatOpcode(op, None)),
        },
        DatOpcode::SnpRespDataFwded => match resp {
            Some(s @ (S::I | S::Sc | S::Uc | S::Sd | S::IPd | S::ScPd)) => {
                Ok(DataKind::SnpRespDataFwded(s))
            }
            Some(S::UcPd) => Ok(DataKind::SnpRespDataFwded(S::Uc)),
            Some(S::SdPd) => Ok(DataKind::SnpRespDataFwded(S::Sd)),
            None => Err(TranslateError::UnsupportedDatOpcode(op, None)),
        },
        DatOpcode::CompData => match resp {
            Some(s) => Ok(DataKind::CompData(s)),
            None => Err(TranslateError::UnsupportedDatOpcode(op, None)),
        },
        DatOpcode::DataSepResp => match resp {
            Some(S::Uc) => Ok(DataKind::DataSepResp(S::Uc)),
            other => Err(TranslateError::UnsupportedDatOpcode(op, other)),
        },
    }
}

/// CHI→internal RSP opcode: `COMP_ACK`→`CompAck`;
/// `SNP_RESP` with `RESP_I`→`SnpResp_I`; everything else in `SNP_RESP`
/// fails.
pub fn chi_response_to_internal(
    op: RspOpcode,
    resp: Option<RespState>,
) -> Result<RspKind, TranslateError> {
    match op {
        RspOpcode::CompAck => Ok(RspKind::CompAck),
        RspOpcode::SnpResp => match resp {
            Some(RespState::I) => Ok(RspKind::SnpResp(RespState::I)),
            other => Err(TranslateError::UnsupportedRspOpcode(op, other)),
        },
        _ => Err(TranslateError::UnsupportedRspOpcode(op, resp)),
    }
}

/// internal→CHI DAT opcode + state: groups by
/// coherence family and emits the opcode byte.
pub fn internal_data_to_chi(kind: DataKind) -> (DatOpcode, RespState) {
    match kind {
        DataKind::NonCopyBackWrData => (DatOpcode::NonCopyBackWrData, RespState::I),
        DataKind::CopyBackWrData(s) => (DatOpcode::CopyBackWrData, s),
        DataKind::SnpRespData(s) => (DatOpcode::SnpRespData, s),
        DataKind::SnpRespDataFwded(s) => (DatOpcode::SnpRespDataFwded, s),
        DataKind::CompData(s) => (DatOpcode::CompData, s),
        DataKind::DataSepResp(s) => (DatOpcode::DataSepResp, s),
    }
}

/// internal→CHI RSP opcode: `Comp_{I,UC,UD_PD}`→
/// `COMP`, `CompDBIDResp`→`COMP_DBID_RESP` (resp `I`), `RetryAck`→
/// `RETRY_ACK` (resp `I`). `DbidResp` and `PcrdGrant` are carried 1:1,
/// with no resp state.
pub fn internal_response_to_chi(kind: RspKind) -> Result<(RspOpcode, Option<RespState>), TranslateError> {
    match kind {
        RspKind::CompAck => Ok((RspOpcode::CompAck, None)),
        RspKind::SnpResp(s) => Ok((RspOpcode::SnpResp, Some(s))),
        RspKind::Comp(s @ (RespState::I | RespState::Uc | RespState::UdPd)) => {
            Ok((RspOpcode::Comp, Some(s)))
        }
        RspKind::Comp(s) => Err(TranslateError::InvalidResp(s)),
        RspKind::CompDbidResp => Ok((RspOpcode::CompDbidResp, Some(RespState::I))),
        RspKind::DbidResp => Ok((RspOpcode::DbidResp, None)),
        RspKind::RetryAck => Ok((RspOpcode::RetryAck, Some(RespState::I))),
        RspKind::PcrdGrant => Ok((RspOpcode::PcrdGrant, None)),
    }
}

/// internal→CHI SNP opcode.
pub fn internal_snp_to_chi(kind: SnpKind) -> SnpOpcode {
    match kind {
        SnpKind::SnpOnce => SnpOpcode::SnpOnce,
        SnpKind::SnpOnceFwd => SnpOpcode::SnpOnceFwd,
        SnpKind::SnpShared => SnpOpcode::SnpShared,
        SnpKind::SnpUnique => SnpOpcode::SnpUnique,
        SnpKind::SnpCleanInvalid => SnpOpcode::SnpCleanInvalid,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_shared_translates_to_read_shared() {
        assert_eq!(
            req_opcode_to_internal(ReqOpcode::ReadShared).unwrap(),
            InternalReqType::ReadShared
        );
    }

    #[test]
    fn read_clean_and_read_once_both_collapse() {
        assert_eq!(
            req_opcode_to_internal(ReqOpcode::ReadClean).unwrap(),
            InternalReqType::ReadOnce
        );
        assert_eq!(
            req_opcode_to_internal(ReqOpcode::ReadOnce).unwrap(),
            InternalReqType::ReadOnce
        );
    }

    #[test]
    fn round_trip_every_supported_req_opcode() {
        let all = [
            ReqOpcode::ReadShared,
            ReqOpcode::ReadClean,
            ReqOpcode::ReadOnce,
            ReqOpcode::ReadNoSnp,
            ReqOpcode::ReadUnique,
            ReqOpcode::ReadNotSharedDirty,
            ReqOpcode::ReadPreferUnique,
            ReqOpcode::MakeReadUnique,
            ReqOpcode::WriteNoSnpPtl,
            ReqOpcode::WriteNoSnpFull,
            ReqOpcode::WriteUniqueZero,
            ReqOpcode::WriteUniqueFull,
            ReqOpcode::WriteBackFull,
            ReqOpcode::WriteEvictOrEvict,
            ReqOpcode::CleanUnique,
            ReqOpcode::MakeUnique,
            ReqOpcode::Evict,
            ReqOpcode::StashOnceSepShared,
            ReqOpcode::StashOnceSepUnique,
        ];
        for op in all {
            let internal = req_opcode_to_internal(op).unwrap();
            let canonical = internal_req_type_to_canonical_opcode(internal);
            let internal2 = req_opcode_to_internal(canonical).unwrap();
            assert_eq!(internal, internal2, "round trip broke for {op}");
        }
    }

    #[test]
    fn copy_back_wr_data_rejects_unlisted_state() {
        assert!(chi_data_to_internal(DatOpcode::CopyBackWrData, Some(RespState::Sd)).is_err());
        assert!(chi_data_to_internal(DatOpcode::CopyBackWrData, Some(RespState::I)).is_ok());
    }

    #[test]
    fn snp_resp_data_normalizes_pd_variants() {
        assert_eq!(
            chi_data_to_internal(DatOpcode::SnpRespData, Some(RespState::UcPd)).unwrap(),
            DataKind::SnpRespData(RespState::Uc)
        );
        assert_eq!(
            chi_data_to_internal(DatOpcode::SnpRespData, Some(RespState::SdPd)).unwrap(),
            DataKind::SnpRespData(RespState::Sd)
        );
    }

    #[test]
    fn snp_resp_requires_resp_i() {
        assert!(chi_response_to_internal(RspOpcode::SnpResp, Some(RespState::I)).is_ok());
        assert!(chi_response_to_internal(RspOpcode::SnpResp, Some(RespState::Sc)).is_err());
    }

    #[test]
    fn comp_rejects_unlisted_state() {
        assert!(internal_response_to_chi(RspKind::Comp(RespState::Sc)).is_err());
        assert!(internal_response_to_chi(RspKind::Comp(RespState::Uc)).is_ok());
    }
}
