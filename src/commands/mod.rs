// ABOUTME: Command module aggregator for the pullwarden CLI.
// ABOUTME: Re-exports the classify, verify, pull, scan and growth handlers.

mod classify;
mod growth;
mod pull;
mod scan;
mod services;
mod verify;

pub use classify::classify;
pub use growth::growth;
pub use pull::pull;
pub use scan::{ScanArgs, scan};
pub use verify::verify;
