mod atomic_io;
mod occupancy;
mod records;
mod store;
mod types;

pub use occupancy::{
    EntityRegistry, OccupancyFilter, OccupancyQuery, RegistryError, OCCUPANCY_TOLERANCE_DEG,
};
pub use records::{
    load_map_file, parse_map_json, save_map_file, LoadedMap, MalformedRecord, MapLoadError,
    RecordKind,
};
pub(crate) use types::string_id;
pub use store::{JsonFileWaterNodeStore, StoreError, WaterNodeStore};
pub use types::{
    BridgeConnection, BridgePoint, BuildingPoint, CanalPoint, EntityCategory, EntityId, MapData,
    Parcel, ParcelId, PlacedEntity, PointKind, WaterConnection, WaterNode, WaterNodeId,
};
