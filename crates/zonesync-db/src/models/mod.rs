//! Table models. One file per table, query methods on the model struct.

pub mod import_queue;
pub mod operation_log;
pub mod production_area;
pub mod production_city;
pub mod production_district;
pub mod staging_area;
pub mod staging_city;
pub mod staging_district;
pub mod staging_status;
pub mod zone_snapshot;

pub use import_queue::{CreateImportQueueEntry, ImportQueueEntry, QueueStatus};
pub use operation_log::{OperationLogEntry, OperationStatus};
pub use production_area::{ProductionArea, UpsertProductionArea};
pub use production_city::{ProductionCity, UpsertProductionCity};
pub use production_district::{ProductionDistrict, UpsertProductionDistrict};
pub use staging_area::{CreateStagingArea, StagingArea};
pub use staging_city::{CreateStagingCity, StagingCity};
pub use staging_district::{CreateStagingDistrict, StagingDistrict};
pub use staging_status::StagingStatus;
pub use zone_snapshot::{CreateSnapshotRecord, ZoneSnapshotRecord};
