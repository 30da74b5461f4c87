//! Service façades bound into the local registry
//!
//! Thin layers over the ledger, the command queue, and the coordinator:
//! `auth` (always bound), one user service per session, and `peer` for the
//! other daemon.

use rmi::RmiError;

use crate::ledger::LedgerError;

pub mod auth;
pub mod peer;
pub mod user;

pub use auth::AuthService;
pub use peer::PeerService;
pub use user::UserService;

/// Map a ledger failure onto a wire fault. Domain messages are client-facing;
/// internal diagnostics are logged here and replaced with a generic message.
pub(crate) fn ledger_fault(error: LedgerError) -> RmiError {
    match error {
        LedgerError::Domain(message) => RmiError::domain(message),
        LedgerError::Internal(diagnostic) => {
            tracing::error!(error = %diagnostic, "ledger internal error");
            RmiError::internal("internal server error")
        }
    }
}
