//! The controller façade: create, open and resolve databases, and tear
//! everything down on stop.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tokio::task::JoinHandle;
use tracing::{info, instrument};

use crate::manifests::{self, ManifestOptions};
use crate::migrations::{self, MigrationEnv};
use crate::prelude::*;

/// Default base directory when the caller does not supply one.
pub const DEFAULT_DIRECTORY: &str = "./orbitdb";

/// Access-controller type used when the caller does not name one.
pub const DEFAULT_AC_TYPE: &str = "ipfs";

pub(crate) type ChannelOf<P> = <<P as Platform>::PubSub as PubSub>::Channel;
pub(crate) type InboxOf<P> = <<P as Platform>::PubSub as PubSub>::Inbox;

/// Options for constructing a controller.
pub struct OrbitDbOptions<P: Platform> {
    /// Base directory for keystore, caches and per-database data.
    pub directory: Option<PathBuf>,

    /// Local storage adapter; a default one is instantiated when absent.
    pub storage: Option<P::Storage>,

    /// Keystore override; created under `<directory>/<peerId>/keystore`
    /// when absent.
    pub keystore: Option<P::Keystore>,

    /// Identity override; derived from the peer id when absent.
    pub identity: Option<Identity>,

    /// Pubsub overlay client. Without one the controller works in
    /// local-only mode and no store is ever replicated.
    pub pubsub: Option<P::PubSub>,

    /// Store type registry. Extend with
    /// [`TypeRegistry::register`] before constructing the controller.
    pub registry: TypeRegistry<P>,

    /// External access-controller factory.
    pub access: P::AccessFactory,
}

impl<P: Platform> OrbitDbOptions<P> {
    pub fn new(registry: TypeRegistry<P>, access: P::AccessFactory) -> Self {
        Self {
            directory: None,
            storage: None,
            keystore: None,
            identity: None,
            pubsub: None,
            registry,
            access,
        }
    }
}

/// Options shared by `create` and `open`.
#[derive(Debug, Clone, Default)]
pub struct OpenOptions {
    /// Base directory override for this database.
    pub directory: Option<PathBuf>,

    /// Allow `open` to create the database when given a name instead of
    /// an address.
    pub create: bool,

    /// Overwrite an existing local database on `create`. Defaults to
    /// false on a direct `create` call and true when `open` forwards a
    /// name to `create`.
    pub overwrite: Option<bool>,

    /// Fail instead of waiting for the manifest when the database is not
    /// known locally.
    pub local_only: bool,

    /// Bind the store to the pubsub overlay. Defaults to true.
    pub replicate: Option<bool>,

    /// Expected store type; checked against the manifest on `open`.
    pub db_type: Option<String>,

    /// Merge the manifest's frozen defaults underneath these options.
    pub merge_defaults: bool,

    /// Access-controller parameters for `create`.
    pub access_controller: Option<AccessSpec>,

    /// Identity override for this store.
    pub identity: Option<Identity>,

    /// Store-type-specific options; frozen into the manifest on `create`.
    pub defaults: Option<serde_json::Map<String, serde_json::Value>>,
}

/// State shared between the façade, the background dispatchers and the
/// close hooks injected into stores.
pub(crate) struct Shared<P: Platform> {
    pub(crate) identity: Identity,
    pub(crate) object_store: P::ObjectStore,
    pub(crate) pubsub: Option<P::PubSub>,
    pub(crate) keystore: P::Keystore,
    pub(crate) storage: P::Storage,
    pub(crate) directory: PathBuf,
    pub(crate) default_cache_dir: PathBuf,
    pub(crate) registry: TypeRegistry<P>,
    pub(crate) access: P::AccessFactory,

    pub(crate) stores: Mutex<HashMap<String, SharedStore>>,
    pub(crate) caches: tokio::sync::Mutex<HashMap<PathBuf, CacheOf<P>>>,
    pub(crate) channels: tokio::sync::Mutex<HashMap<PeerId, ChannelOf<P>>>,
    pub(crate) dispatchers: Mutex<HashMap<String, JoinHandle<()>>>,
    pub(crate) forwarders: Mutex<HashMap<String, JoinHandle<()>>>,
    pub(crate) channel_tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl<P: Platform> Shared<P> {
    pub(crate) fn access_env(&self) -> AccessEnv<P> {
        AccessEnv {
            object_store: self.object_store.clone(),
            identity: self.identity.clone(),
        }
    }
}

/// The OrbitDB controller. At most one live store per address; every
/// replicated store is bound to the pubsub overlay under its address.
pub struct OrbitDb<P: Platform> {
    pub(crate) shared: Arc<Shared<P>>,
}

impl<P: Platform> OrbitDb<P> {
    /// Construct a controller bound to an object store. Derives the peer
    /// id, ensures the base directory, and sets up keystore, identity and
    /// the default cache.
    pub async fn new(
        object_store: P::ObjectStore,
        options: OrbitDbOptions<P>,
    ) -> Result<Self, Error> {
        let peer_id = object_store.id().await?;

        let directory = options
            .directory
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DIRECTORY));

        std::fs::create_dir_all(&directory)?;

        let storage = options.storage.unwrap_or_default();

        let keystore = match options.keystore {
            Some(keystore) => keystore,
            None => P::Keystore::create(&directory.join(&peer_id).join("keystore"))?,
        };

        let identity = match options.identity {
            Some(identity) => identity,
            None => {
                P::IdentityProvider::default()
                    .create_identity(&peer_id, &keystore)
                    .await?
            }
        };

        let default_cache_dir = directory.join(&peer_id).join("cache");

        let shared = Arc::new(Shared {
            identity,
            object_store,
            pubsub: options.pubsub,
            keystore,
            storage,
            directory,
            default_cache_dir,
            registry: options.registry,
            access: options.access,
            stores: Default::default(),
            caches: Default::default(),
            channels: Default::default(),
            dispatchers: Default::default(),
            forwarders: Default::default(),
            channel_tasks: Default::default(),
        });

        // materialize the default cache eagerly so a bad storage adapter
        // fails construction instead of the first open
        shared.load_cache(None).await?;

        info!(identity = %shared.identity.id, "controller ready");

        Ok(Self { shared })
    }

    pub fn identity(&self) -> &Identity {
        &self.shared.identity
    }

    pub fn directory(&self) -> &Path {
        &self.shared.directory
    }

    /// Addresses of the currently live stores.
    pub fn stores(&self) -> Vec<String> {
        self.shared.stores.lock().unwrap().keys().cloned().collect()
    }

    /// Live store registered under an address, if any.
    pub fn store(&self, address: &str) -> Option<SharedStore> {
        self.shared.stores.lock().unwrap().get(address).cloned()
    }

    /// Cache store for a directory (the default one when `None`). Lazily
    /// created; repeated calls with the same directory reuse storage.
    pub async fn cache(&self, directory: Option<&Path>) -> Result<CacheOf<P>, Error> {
        let cache = self.shared.load_cache(directory).await?;
        Ok(cache)
    }

    /// Resolve the address a `create(name, type, options)` call would
    /// produce, computing the manifest hash without persisting it.
    pub async fn determine_address(
        &self,
        name: &str,
        db_type: &str,
        options: &OpenOptions,
    ) -> Result<Address, Error> {
        self.resolve_address(name, db_type, options, true).await
    }

    async fn resolve_address(
        &self,
        name: &str,
        db_type: &str,
        options: &OpenOptions,
        only_hash: bool,
    ) -> Result<Address, Error> {
        if !self.shared.registry.contains(db_type) {
            return Err(Error::InvalidType(db_type.to_string()));
        }

        if Address::is_valid(name) {
            return Err(Error::NameIsAddress(name.to_string()));
        }

        let mut spec = options.access_controller.clone().unwrap_or_default();

        if spec.name.is_none() {
            spec.name = Some(name.to_string());
        }

        if spec.ac_type.is_none() {
            spec.ac_type = Some(DEFAULT_AC_TYPE.to_string());
        }

        // the default writer rule: no write list means the controller
        // identity is the single writer, also when only a read list was
        // given
        if spec.write.is_none() {
            spec.write = Some(vec![self.shared.identity.id.clone()]);
        }

        let ac_type = spec.ac_type.clone().unwrap_or_default();

        let env = self.shared.access_env();

        let ac_path = self.shared.access.create(&env, &ac_type, &spec).await?;

        let manifest_options = ManifestOptions {
            defaults: options.defaults.clone(),
            only_hash,
            codec: None,
        };

        let root = manifests::create_db_manifest(
            &self.shared.object_store,
            name,
            db_type,
            &ac_path,
            &manifest_options,
        )
        .await?;

        let address = Address::new(root, name)?;

        Ok(address)
    }

    /// Create a new database: write its manifest, record it in the local
    /// cache index, run migrations, and open it.
    #[instrument(skip_all, fields(name = %name, db_type = %db_type))]
    pub async fn create(
        &self,
        name: &str,
        db_type: &str,
        options: OpenOptions,
    ) -> Result<SharedStore, Error> {
        let address = self.resolve_address(name, db_type, &options, false).await?;

        let cache = self.shared.load_cache(options.directory.as_deref()).await?;

        let exists = Shared::<P>::have_local_data(&cache, &address).await?;

        if exists && !options.overwrite.unwrap_or(false) {
            return Err(Error::AlreadyExists(address.to_string()));
        }

        let env = MigrationEnv {
            directory: options
                .directory
                .as_deref()
                .unwrap_or(&self.shared.directory),
        };

        migrations::run(&env, &address)?;

        Shared::<P>::add_manifest_to_cache(&cache, &address).await?;

        info!(address = %address, db_type, "database created");

        self.open_address(&address, options).await
    }

    /// Open a database by address, or by name when `create` is set.
    #[instrument(skip_all, fields(address_or_name = %address_or_name))]
    pub async fn open(
        &self,
        address_or_name: &str,
        options: OpenOptions,
    ) -> Result<SharedStore, Error> {
        if !Address::is_valid(address_or_name) {
            if !options.create {
                return Err(Error::CreateNotSet(address_or_name.to_string()));
            }

            let Some(db_type) = options.db_type.clone() else {
                return Err(Error::TypeMissing(self.shared.registry.tags().join(", ")));
            };

            let mut forwarded = options;
            forwarded.overwrite = Some(forwarded.overwrite.unwrap_or(true));

            return self.create(address_or_name, &db_type, forwarded).await;
        }

        let address = Address::parse(address_or_name)?;

        self.open_address(&address, options).await
    }

    async fn open_address(
        &self,
        address: &Address,
        options: OpenOptions,
    ) -> Result<SharedStore, Error> {
        let cache = self.shared.load_cache(options.directory.as_deref()).await?;

        let present = Shared::<P>::have_local_data(&cache, address).await?;

        if options.local_only && !present {
            return Err(Error::NotFoundLocally(address.to_string()));
        }

        // without local_only this read waits for the manifest to appear
        let value = self.shared.object_store.read(address.root()).await?;

        let manifest: Manifest = serde_json::from_value(value)
            .map_err(|error| ObjectStoreError::Codec(error.to_string()))?;

        if let Some(requested) = &options.db_type {
            if *requested != manifest.db_type {
                return Err(Error::TypeMismatch {
                    address: address.to_string(),
                    actual: manifest.db_type,
                    requested: requested.clone(),
                });
            }
        }

        Shared::<P>::add_manifest_to_cache(&cache, address).await?;

        // manifest defaults sit underneath caller options; with
        // merge_defaults unset the stored defaults are ignored entirely
        let mut defaults = serde_json::Map::new();

        if options.merge_defaults {
            if let Some(frozen) = &manifest.defaults {
                defaults.extend(frozen.clone());
            }
        }

        if let Some(caller) = &options.defaults {
            defaults.extend(caller.clone());
        }

        self.shared
            .create_store(crate::lifecycle::CreateStoreParams {
                db_type: manifest.db_type.clone(),
                address: address.clone(),
                cache,
                identity: options.identity.clone(),
                replicate: options.replicate.unwrap_or(true),
                access_controller_address: Some(manifest.access_controller.clone()),
                access_spec: options.access_controller.clone().unwrap_or_default(),
                defaults,
            })
            .await
    }

    /// Close every live store, cache, channel and the keystore, and
    /// disconnect from pubsub. Safe to invoke when nothing is open.
    #[instrument(skip_all)]
    pub async fn stop(&self) -> Result<(), Error> {
        self.shared.keystore.close().await?;

        let caches: Vec<_> = {
            let mut caches = self.shared.caches.lock().await;
            caches.drain().map(|(_, cache)| cache).collect()
        };

        let results = futures_util::future::join_all(
            caches.iter().map(|cache| cache.close()),
        )
        .await;

        for result in results {
            result?;
        }

        let stores: Vec<SharedStore> = {
            let stores = self.shared.stores.lock().unwrap();
            stores.values().cloned().collect()
        };

        for store in stores {
            store.close().await?;
        }

        self.shared.stores.lock().unwrap().clear();

        let channels: Vec<_> = {
            let mut channels = self.shared.channels.lock().await;
            channels.drain().map(|(_, channel)| channel).collect()
        };

        for channel in channels {
            channel.close().await?;
        }

        for (_, handle) in self.shared.dispatchers.lock().unwrap().drain() {
            handle.abort();
        }

        for handle in self.shared.channel_tasks.lock().unwrap().drain(..) {
            handle.abort();
        }

        if let Some(pubsub) = &self.shared.pubsub {
            pubsub.disconnect().await?;
        }

        info!("controller stopped");

        Ok(())
    }

    /// Alias for [`OrbitDb::stop`].
    pub async fn disconnect(&self) -> Result<(), Error> {
        self.stop().await
    }

    async fn open_as(
        &self,
        tag: &str,
        name_or_address: &str,
        mut options: OpenOptions,
    ) -> Result<SharedStore, Error> {
        options.create = true;
        options.db_type = Some(tag.to_string());

        self.open(name_or_address, options).await
    }

    pub async fn feed(&self, name: &str, options: OpenOptions) -> Result<SharedStore, Error> {
        self.open_as(tags::FEED, name, options).await
    }

    pub async fn eventlog(&self, name: &str, options: OpenOptions) -> Result<SharedStore, Error> {
        self.open_as(tags::EVENTLOG, name, options).await
    }

    /// Alias for [`OrbitDb::eventlog`].
    pub async fn log(&self, name: &str, options: OpenOptions) -> Result<SharedStore, Error> {
        self.eventlog(name, options).await
    }

    pub async fn keyvalue(&self, name: &str, options: OpenOptions) -> Result<SharedStore, Error> {
        self.open_as(tags::KEYVALUE, name, options).await
    }

    /// Alias for [`OrbitDb::keyvalue`].
    pub async fn kvstore(&self, name: &str, options: OpenOptions) -> Result<SharedStore, Error> {
        self.keyvalue(name, options).await
    }

    pub async fn counter(&self, name: &str, options: OpenOptions) -> Result<SharedStore, Error> {
        self.open_as(tags::COUNTER, name, options).await
    }

    pub async fn docstore(&self, name: &str, options: OpenOptions) -> Result<SharedStore, Error> {
        self.open_as(tags::DOCSTORE, name, options).await
    }

    /// Alias for [`OrbitDb::docstore`].
    pub async fn docs(&self, name: &str, options: OpenOptions) -> Result<SharedStore, Error> {
        self.docstore(name, options).await
    }
}
