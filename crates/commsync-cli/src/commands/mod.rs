pub mod common;
pub mod grant;
pub mod merge;
pub mod reconcile;
pub mod resolve;
pub mod session;
