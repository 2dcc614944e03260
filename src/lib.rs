//! Workspace umbrella crate.
//!
//! Re-exports the catalog crates so host applications can depend on
//! `catalog-workspace` alone. The `service` feature (on by default) adds the
//! sync engine and the [`LibraryService`](service::LibraryService) façade;
//! without it only the catalog store and the filter/sort engine are pulled in.

pub use core_library as library;
pub use core_runtime as runtime;

#[cfg(feature = "service")]
pub use core_service as service;
#[cfg(feature = "service")]
pub use core_sync as sync;

pub use core_library::{
    apply_filter_sort, FilterState, SortColumn, SortDirection, SortState, TriState,
};
#[cfg(feature = "service")]
pub use core_service::{CoreError, LibraryService};
