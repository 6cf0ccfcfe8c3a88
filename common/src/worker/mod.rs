// Worker-side state kept by the engine

pub mod capabilities;

pub use capabilities::{
    capabilities_key, CapabilityCache, CapabilityLoaderConfig, RefreshOutcome, LOADER_GUARD,
};
