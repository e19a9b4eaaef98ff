//! Test harness: a simulated rollup hosting one `CompanyReviewContract`.

pub mod simulated;
