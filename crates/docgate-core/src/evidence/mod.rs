//! Evidence verification.
//!
//! Artifacts cite implementation pointers in an evidence table. Each row
//! names a pointer, an `Existing` or `Planned` status, a `docs:` heading and
//! a `ts:` anchor. Verification checks every row against the files on disk
//! and returns the complete list of violations.

mod row;
mod verifier;

pub use row::{
    parse_evidence_tables, EvidenceRef, EvidenceRow, EvidenceSource, EvidenceStatus,
    EvidenceTables, MalformedRow, EVIDENCE_COLUMNS, EVIDENCE_TABLE_HEADER,
};
pub use verifier::{
    verify_evidence, EvidenceError, EvidenceIssue, EvidenceVerdict, EvidenceVerifier,
};
