use std::sync::Arc;

use orbiter_core::{
    AccessController, AccessControllerFactory, AccessEnv, AccessError, AccessSpec, Object,
    ObjectStore, Platform, WriteOptions, DAG_CBOR,
};

const IPFS_PREFIX: &str = "/ipfs/";

struct WriteListController {
    write: Vec<String>,
}

impl AccessController for WriteListController {
    fn write(&self) -> &[String] {
        &self.write
    }
}

/// Access-controller factory fake: descriptors live in the object store
/// under `/ipfs/<hash>` paths, like the real ipfs-backed factory.
#[derive(Clone, Default)]
pub struct ToyAccessFactory;

impl<P: Platform> AccessControllerFactory<P> for ToyAccessFactory {
    async fn create(
        &self,
        env: &AccessEnv<P>,
        ac_type: &str,
        spec: &AccessSpec,
    ) -> Result<String, AccessError> {
        let descriptor: Object = serde_json::json!({
            "type": ac_type,
            "name": spec.name,
            "write": spec.write.clone().unwrap_or_else(|| vec![env.identity.id.clone()]),
        });

        let hash = env
            .object_store
            .write(DAG_CBOR, &descriptor, &WriteOptions::default())
            .await?;

        Ok(format!("{IPFS_PREFIX}{hash}"))
    }

    async fn resolve(
        &self,
        env: &AccessEnv<P>,
        path: &str,
        spec: &AccessSpec,
    ) -> Result<Arc<dyn AccessController>, AccessError> {
        let hash = path.strip_prefix(IPFS_PREFIX).unwrap_or(path);

        let descriptor = env.object_store.read(hash).await?;

        let write = descriptor
            .get("write")
            .and_then(|value| value.as_array())
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| id.as_str().map(str::to_string))
                    .collect()
            })
            .or_else(|| spec.write.clone())
            .unwrap_or_else(|| vec![env.identity.id.clone()]);

        Ok(Arc::new(WriteListController { write }))
    }
}
