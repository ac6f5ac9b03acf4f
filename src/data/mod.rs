/// Data layer: core types, waveform loading, picks, filtering, and export.
///
/// Architecture:
/// ```text
///  .parquet / .json / .csv
///        │
///        ▼
///   ┌──────────┐
///   │  loader   │  parse file → StationSet
///   └──────────┘
///        │
///        ▼
///   ┌────────────┐      ┌───────────────┐
///   │ StationSet  │      │ PickRegistry   │  events ▸ picks
///   └────────────┘      └───────────────┘
///        │                     │
///        ▼                     ▼
///   ┌──────────┐       ┌──────────────┐
///   │  filter   │       │  io / hypo    │  JSON/CSV picks, .sta stations
///   └──────────┘       └──────────────┘
/// ```
///
/// Nothing in here depends on the rendering layer; the UI observes
/// [`picks::RegistryChange`] notifications and draws from these types.
pub mod filter;
pub mod hypo;
pub mod io;
pub mod loader;
pub mod model;
pub mod picks;
