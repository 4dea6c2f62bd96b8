//! CLI Exit Code Registry
//!
//! Single source of truth for `tally` exit codes. Scripts rely on them.
//!
//! # Exit Codes
//!
//! | Code | Meaning                                                   |
//! |------|-----------------------------------------------------------|
//! | 0    | Success                                                   |
//! | 1    | General error (unspecified)                               |
//! | 2    | Usage error (bad args, bad rule expression)               |
//! | 3    | Invalid audit / recon / context config                    |
//! | 4    | Runtime failure (unreadable file, bad CSV, rule eval)     |
//! | 5    | Findings present: missing identifiers or unmatched records |
//!
//! Code 5 is only returned with `--strict`; without it a run that completes
//! exits 0 whatever it found.
//!
//! # Adding New Exit Codes
//!
//! 1. Add the constant below
//! 2. Document what triggers it
//! 3. Update the table above

// =============================================================================
// Universal (0-2)
// =============================================================================

/// Success - command completed without errors.
pub const EXIT_SUCCESS: u8 = 0;

/// General error - unspecified failure.
/// Avoid using this; prefer a specific error code.
pub const EXIT_ERROR: u8 = 1;

/// Usage error - bad arguments, unparseable expressions.
pub const EXIT_USAGE: u8 = 2;

// =============================================================================
// Audit / recon (3-5)
// =============================================================================

/// Config failed to parse or validate (includes identifier templates).
pub const EXIT_INVALID_CONFIG: u8 = 3;

/// Run failed after the config was accepted.
pub const EXIT_RUNTIME: u8 = 4;

/// `--strict` run found missing identifiers or unmatched primary records.
pub const EXIT_FINDINGS: u8 = 5;
