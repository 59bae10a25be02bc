//! # rexlist to-do
//!
//! A persisted, ordered to-do list built on the rexlist unidirectional store.
//!
//! Views dispatch [`AppAction`]s. The [`PersistentStoreMiddleware`] forwards
//! edits to storage; storage commits them and publishes the whole index
//! ordered list on its change stream; the middleware feeds each list back as
//! [`PersistentStoreAction::TaskListModified`], which the reducer folds into
//! [`AppState`]. The stored list is the source of truth; local state mirrors
//! it.
//!
//! ## Modules
//!
//! - [`types`]: Tasks, application state and its lenses
//! - [`actions`]: The action tree and its prisms
//! - [`reducer`]: Sub-reducers and the composed app reducer
//! - [`persistence`]: The storage contract
//! - [`reconcile`]: Pure index planning for add, delete, move and clear
//! - [`database`]: In-memory task database with optional JSON file
//! - [`middleware`]: The persistence middleware and the app pipeline
//! - [`views`]: Task list and task cell projections
//! - [`config`]: Environment configuration
//!
//! ## Example
//!
//! ```no_run
//! use rexlist_todo::{build_store, AppAction, AppConfig, LifecycleAction, ListAction, TaskDatabase};
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), rexlist_runtime::StoreError> {
//! let store = build_store(Arc::new(TaskDatabase::in_memory()), &AppConfig::default());
//!
//! store.send(AppAction::Lifecycle(LifecycleAction::DidBecomeActive)).await?;
//! store.send(AppAction::List(ListAction::Add { name: "Buy milk".to_string() })).await?;
//! # Ok(())
//! # }
//! ```

pub mod actions;
pub mod config;
pub mod database;
pub mod middleware;
pub mod persistence;
pub mod reconcile;
pub mod reducer;
pub mod types;
pub mod views;

pub use actions::{
    AppAction, LifecycleAction, ListAction, PersistentStoreAction, TaskAction, TaskPatch,
};
pub use config::{AppConfig, ConfigError};
pub use database::TaskDatabase;
pub use middleware::{app_pipeline, PersistenceSettings, PersistentStoreMiddleware};
pub use persistence::{PersistenceError, PersistenceService, PersistenceServiceExt, TaskFilter};
pub use reducer::{app_reducer, AppReducer};
pub use types::{AppLifecycle, AppState, Task, TaskId, TaskListState};

use rexlist_runtime::Store;
use std::sync::Arc;

/// The application store
pub type AppStore = Store<AppState, AppAction, AppReducer>;

/// Wire the application store to `service`
///
/// The store starts empty; send [`PersistentStoreAction::ConnectToStore`]
/// and [`LifecycleAction::DidBecomeActive`] to check storage and start
/// mirroring it.
#[must_use]
pub fn build_store(service: Arc<dyn PersistenceService>, config: &AppConfig) -> AppStore {
    Store::with_config(
        AppState::default(),
        app_reducer(),
        app_pipeline(service, config.persistence_settings()),
        config.store_config(),
    )
}
