pub mod manifest_loader;

pub use manifest_loader::{parse_manifest, ManifestEntry};
