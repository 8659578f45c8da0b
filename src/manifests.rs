//! Writes database manifests to the content-addressed store.

use orbiter_core::{Manifest, ObjectHash, ObjectStore, ObjectStoreError, WriteOptions, DAG_CBOR};

#[derive(Debug, Clone, Default)]
pub struct ManifestOptions {
    /// Store-type-specific defaults to freeze into the manifest, echoed
    /// verbatim.
    pub defaults: Option<serde_json::Map<String, serde_json::Value>>,

    /// Compute the manifest hash without persisting it.
    pub only_hash: bool,

    /// Codec override; `dag-cbor` when unset.
    pub codec: Option<String>,
}

/// Build the manifest record for a new database and persist it. Returns
/// the content hash, which becomes the `root` of every address referring
/// to this database.
pub async fn create_db_manifest<O: ObjectStore>(
    object_store: &O,
    name: &str,
    db_type: &str,
    access_controller_path: &str,
    options: &ManifestOptions,
) -> Result<ObjectHash, ObjectStoreError> {
    let manifest = Manifest {
        name: name.to_string(),
        db_type: db_type.to_string(),
        access_controller: access_controller_path.to_string(),
        defaults: options.defaults.clone(),
    };

    let value =
        serde_json::to_value(&manifest).map_err(|error| ObjectStoreError::Codec(error.to_string()))?;

    let codec = options.codec.as_deref().unwrap_or(DAG_CBOR);

    let write_options = WriteOptions {
        only_hash: options.only_hash,
    };

    object_store.write(codec, &value, &write_options).await
}

#[cfg(test)]
mod tests {
    use orbiter_testing::MemoryObjectStore;
    use serde_json::json;

    use super::*;

    #[tokio::test]
    async fn writes_the_wire_shape() {
        let objects = MemoryObjectStore::new("peer");

        let root = create_db_manifest(
            &objects,
            "journal",
            "feed",
            "/ipfs/Qmac",
            &ManifestOptions::default(),
        )
        .await
        .unwrap();

        let stored = objects.get(&root).unwrap();

        assert_eq!(
            stored,
            json!({"name": "journal", "type": "feed", "accessController": "/ipfs/Qmac"})
        );
    }

    #[tokio::test]
    async fn defaults_are_echoed_verbatim() {
        let objects = MemoryObjectStore::new("peer");

        let mut defaults = serde_json::Map::new();
        defaults.insert("ref".to_string(), json!(10));

        let options = ManifestOptions {
            defaults: Some(defaults),
            ..Default::default()
        };

        let root = create_db_manifest(&objects, "journal", "feed", "/ipfs/Qmac", &options)
            .await
            .unwrap();

        let stored = objects.get(&root).unwrap();
        assert_eq!(stored["defaults"], json!({"ref": 10}));
    }

    #[tokio::test]
    async fn only_hash_skips_persistence() {
        let objects = MemoryObjectStore::new("peer");

        let options = ManifestOptions {
            only_hash: true,
            ..Default::default()
        };

        let root = create_db_manifest(&objects, "journal", "feed", "/ipfs/Qmac", &options)
            .await
            .unwrap();

        assert!(!objects.contains(&root));
    }
}
