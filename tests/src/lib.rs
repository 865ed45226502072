//! Empty library target; this crate exists to host cross-crate end-to-end
//! tests under `tests/` (Cargo's integration-test convention), matching the
//! teacher workspace's top-level `tests` crate.
