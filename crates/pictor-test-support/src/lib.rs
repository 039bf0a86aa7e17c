#![forbid(unsafe_code)]
#![deny(
    warnings,
    dead_code,
    unused,
    unused_imports,
    unused_must_use,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]

//! Shared test doubles for the facade suites.
//! Layout: fixtures.rs (sample data and logging), mocks.rs (scripted
//! pipeline and surface doubles).

pub mod fixtures;
pub mod mocks;
