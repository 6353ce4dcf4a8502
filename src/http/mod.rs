//! HTTP surface
//!
//! Route names and response envelopes follow the existing client contract
//! (`/GetAllowance`, `/GetBalance`, `/SetApprove`), so they are not renamed.

pub mod handlers;
pub mod router;

pub use router::create_router;

use crate::approval::ApprovalPipeline;
use crate::ledger::Ledger;
use crate::query::QueryService;
use crate::validation;

/// Shared, read-only state handed to every handler
pub struct AppState<L> {
    pub queries: QueryService<L>,
    pub approvals: ApprovalPipeline<L>,
    pub strict_addresses: bool,
}

impl<L> Clone for AppState<L> {
    fn clone(&self) -> Self {
        Self {
            queries: self.queries.clone(),
            approvals: self.approvals.clone(),
            strict_addresses: self.strict_addresses,
        }
    }
}

impl<L: Ledger> AppState<L> {
    pub fn new(queries: QueryService<L>, approvals: ApprovalPipeline<L>, strict: bool) -> Self {
        Self {
            queries,
            approvals: approvals.with_strict_addresses(strict),
            strict_addresses: strict,
        }
    }

    pub(crate) fn accepts_address(&self, address: &str) -> bool {
        if self.strict_addresses {
            validation::is_valid_hex_address(address)
        } else {
            validation::is_valid_address(address)
        }
    }
}
