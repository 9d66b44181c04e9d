// Obscura — Gateway Module
//
// Unix Domain Socket transport for the vault service. Decodes JSON-RPC 2.0
// requests into plain values, calls the service, and encodes the outcome.

mod protocol;
mod uds;

pub use uds::UdsServer;
