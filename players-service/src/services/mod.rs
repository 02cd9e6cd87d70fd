//! Pipeline components and their collaborators
//!
//! Leaves first: stale selection, enrichment clients, batched enrichment,
//! reconciliation, bulk persistence.

pub mod batch_enricher;
pub mod bulk_persister;
pub mod offline_client;
pub mod reconciler;
pub mod stale_selector;
pub mod steam_client;
pub mod traits;

pub use batch_enricher::{BatchEnricher, DownloadProgress, Enrichment};
pub use bulk_persister::store_players;
pub use offline_client::OfflineSteamClient;
pub use reconciler::reconcile;
pub use stale_selector::select_stale;
pub use steam_client::SteamWebApiClient;
pub use traits::{
    EnrichmentService, NullTelemetry, ProgressError, ProgressSink, SourceOfTruth, TelemetrySink,
};
