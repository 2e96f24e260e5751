//! The abstract downstream protocol surface.
//!
//! Grounded on `tv::TVConnection` + `cec::noop::LogOnlyConn` from the
//! teacher repo: an abstract hardware/protocol boundary with a log-only
//! test double standing in for a real network.

use crate::message::{Data, Request, Response};
use log::debug;

pub trait Downstream {
    fn send_request(&mut self, msg: Request);
    fn send_data(&mut self, msg: Data);
    fn send_response(&mut self, msg: Response);
}

/// Records every sent message for test assertions, and logs them the way
/// `LogOnlyConn` logs faked hardware calls.
#[derive(Default)]
pub struct RecordingDownstream {
    pub requests: Vec<Request>,
    pub data: Vec<Data>,
    pub responses: Vec<Response>,
}

impl RecordingDownstream {
    pub fn new() -> RecordingDownstream {
        RecordingDownstream::default()
    }
}

impl Downstream for RecordingDownstream {
    fn send_request(&mut self, msg: Request) {
        debug!("downstream request: txn_id={} type={}", msg.txn_id, msg.req_type);
        self.requests.push(msg);
    }

    fn send_data(&mut self, msg: Data) {
        debug!("downstream data: txn_id={} kind={}", msg.txn_id, msg.kind);
        self.data.push(msg);
    }

    fn send_response(&mut self, msg: Response) {
        debug!("downstream response: txn_id={} kind={}", msg.txn_id, msg.kind);
        self.responses.push(msg);
    }
}
