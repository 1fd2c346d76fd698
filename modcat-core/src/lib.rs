//! modcat library exports

pub mod catalog;
pub mod collect;
pub mod config;
pub mod error;
pub mod ids;
pub mod manual;
pub mod reconcile;
pub mod selector;
pub mod session;

pub use catalog::Catalog;
pub use collect::{CollectedAuthor, CollectedGroup, CollectedMod, CollectedSet};
pub use config::{ModcatConfig, ReconcileConfig};
pub use error::{CatalogError, ErrorKind, Result, Violation};
pub use manual::{apply_manual_row, apply_manual_rows, ManualCategory, ManualReport, ManualRow};
pub use reconcile::{reconcile, ChangeLog, ReconcileOutcome};
pub use selector::{CatalogSelector, CatalogSource, DownloadLatch, Selection};
pub use session::CatalogSession;
