/// Content script runtime
use std::rc::Rc;

use futures::channel::mpsc;
use futures::{Stream, StreamExt};
use wasm_bindgen_futures::spawn_local;

use crate::chrome::{self, ChromeStore};
use crate::config::HostConfig;
use crate::lifecycle::LifecycleController;
use crate::mount::{DomMountAdapter, MountAdapter};
use crate::registry;
use crate::storage::{SettingsStore, StoreChange};

/// Start the runtime for the current page.
///
/// The storage listener is registered before the initial load; changes that
/// arrive meanwhile queue up and are applied once the load has finished.
pub fn start(config: HostConfig) {
    let registry = match registry::builtin() {
        Ok(registry) => Rc::new(registry),
        Err(e) => {
            log::error!("Feature registry is invalid: {}", e);
            return;
        }
    };

    let page_url = web_sys::window()
        .and_then(|w| w.location().href().ok())
        .unwrap_or_default();

    let (sender, receiver) = mpsc::unbounded();
    let subscription = chrome::subscribe(config.clone(), move |change| {
        // Only fails once the runtime has gone away with the page
        let _ = sender.unbounded_send(change);
    });

    let controller = LifecycleController::new(registry, ChromeStore::new(config), DomMountAdapter::new(), page_url);

    spawn_local(async move {
        let _subscription = subscription;
        drive(&controller, receiver).await;
    });
}

/// Run the initial load, then apply changes in arrival order
pub async fn drive<S, M>(controller: &LifecycleController<S, M>, mut changes: impl Stream<Item = StoreChange> + Unpin)
where
    S: SettingsStore,
    M: MountAdapter,
{
    controller.on_initial_load().await;

    while let Some(change) = changes.next().await {
        controller.on_store_change(change).await;
    }
}
