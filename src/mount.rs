//! Mounting feature payloads onto the page.
//!
//! The lifecycle controller only sees the [`MountAdapter`] contract. The DOM
//! implementation dispatches on the feature's behavior: imperative payloads
//! run their own routines, render payloads get a Yew app inside a shadow
//! surface that is updated in place and torn down whole.

use yew::AppHandle;

use crate::dom::{self, Surface};
use crate::error::MountError;
use crate::feature::{Behavior, FeatureDescriptor, FeatureSettings};
use crate::ui::surface::{FeatureSurface, FeatureSurfaceProps};

/// Install, update and remove a feature's observable effects.
#[allow(async_fn_in_trait)]
pub trait MountAdapter {
    type Handle;

    async fn activate(&self, feature: &FeatureDescriptor, settings: &FeatureSettings) -> Result<Self::Handle, MountError>;

    /// Re-apply fresh settings to an active mount without disposing it
    async fn update(
        &self,
        feature: &FeatureDescriptor,
        handle: &mut Self::Handle,
        settings: &FeatureSettings,
    ) -> Result<(), MountError>;

    /// Fully reverse what `activate` created
    async fn deactivate(&self, feature: &FeatureDescriptor, handle: Self::Handle) -> Result<(), MountError>;
}

pub enum MountHandle {
    Imperative,
    Surface {
        host_id: String,
        app: AppHandle<FeatureSurface>,
    },
}

#[derive(Debug, Default)]
pub struct DomMountAdapter;

impl DomMountAdapter {
    pub fn new() -> Self {
        DomMountAdapter
    }
}

impl MountAdapter for DomMountAdapter {
    type Handle = MountHandle;

    async fn activate(&self, feature: &FeatureDescriptor, settings: &FeatureSettings) -> Result<MountHandle, MountError> {
        match &feature.behavior {
            Behavior::Imperative(payload) => {
                if let Err(e) = payload.execute(settings) {
                    // Undo whatever the routine managed before it failed
                    if let Err(cleanup) = payload.cleanup() {
                        log::warn!("Cleanup after failed activation of {} also failed: {}", feature.id, cleanup);
                    }
                    return Err(e);
                }
                Ok(MountHandle::Imperative)
            }
            Behavior::Render(render) => {
                let host_id = dom::surface_id(feature.id);
                let surface = match Surface::attach(&host_id) {
                    Ok(surface) => surface,
                    Err(e) => {
                        if let Err(cleanup) = dom::remove_surface(&host_id) {
                            log::warn!("Failed to remove partial surface {}: {}", host_id, cleanup);
                        }
                        return Err(e);
                    }
                };
                let props = FeatureSurfaceProps {
                    settings: settings.clone(),
                    render: *render,
                };
                let app = yew::Renderer::<FeatureSurface>::with_root_and_props(surface.container, props).render();
                Ok(MountHandle::Surface { host_id, app })
            }
        }
    }

    async fn update(
        &self,
        feature: &FeatureDescriptor,
        handle: &mut MountHandle,
        settings: &FeatureSettings,
    ) -> Result<(), MountError> {
        match (&feature.behavior, handle) {
            (Behavior::Imperative(payload), MountHandle::Imperative) => payload.execute(settings),
            (Behavior::Render(render), MountHandle::Surface { app, .. }) => {
                app.update(FeatureSurfaceProps {
                    settings: settings.clone(),
                    render: *render,
                });
                Ok(())
            }
            _ => Err(MountError::HandleMismatch(feature.id.to_string())),
        }
    }

    async fn deactivate(&self, feature: &FeatureDescriptor, handle: MountHandle) -> Result<(), MountError> {
        match (&feature.behavior, handle) {
            (Behavior::Imperative(payload), MountHandle::Imperative) => payload.cleanup(),
            (_, MountHandle::Surface { host_id, app }) => {
                app.destroy();
                dom::remove_surface(&host_id)
            }
            _ => Err(MountError::HandleMismatch(feature.id.to_string())),
        }
    }
}


#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use futures::executor::block_on;
    use yew::html;

    use super::*;
    use crate::feature::ImperativeFeature;

    /// Imperative payload that logs its calls and can fail after its effect
    #[derive(Clone, Default)]
    struct Counting {
        calls: Rc<RefCell<Vec<&'static str>>>,
        fail_execute: bool,
    }

    impl Counting {
        fn calls(&self) -> Vec<&'static str> {
            self.calls.borrow().clone()
        }
    }

    impl ImperativeFeature for Counting {
        fn execute(&self, _settings: &FeatureSettings) -> Result<(), MountError> {
            self.calls.borrow_mut().push("execute");
            if self.fail_execute {
                Err(MountError::Script("badge missing".to_string()))
            } else {
                Ok(())
            }
        }

        fn cleanup(&self) -> Result<(), MountError> {
            self.calls.borrow_mut().push("cleanup");
            Ok(())
        }
    }

    fn imperative(payload: &Counting) -> FeatureDescriptor {
        FeatureDescriptor::new("counting", "Counting", "", Behavior::Imperative(Box::new(payload.clone())))
    }

    #[test]
    fn test_imperative_lifecycle() {
        let adapter = DomMountAdapter::new();
        let payload = Counting::default();
        let feature = imperative(&payload);
        let settings = FeatureSettings::default();

        let mut handle = block_on(adapter.activate(&feature, &settings)).unwrap();
        assert!(matches!(handle, MountHandle::Imperative));
        assert_eq!(payload.calls(), vec!["execute"]);

        // Updated in place: no cleanup between runs
        block_on(adapter.update(&feature, &mut handle, &settings)).unwrap();
        assert_eq!(payload.calls(), vec!["execute", "execute"]);

        block_on(adapter.deactivate(&feature, handle)).unwrap();
        assert_eq!(payload.calls(), vec!["execute", "execute", "cleanup"]);
    }

    #[test]
    fn test_failed_activation_is_rolled_back() {
        let adapter = DomMountAdapter::new();
        let payload = Counting {
            fail_execute: true,
            ..Counting::default()
        };
        let feature = imperative(&payload);

        let result = block_on(adapter.activate(&feature, &FeatureSettings::default()));

        assert!(matches!(result, Err(MountError::Script(_))));
        assert_eq!(payload.calls(), vec!["execute", "cleanup"]);
    }

    #[test]
    fn test_handle_mismatch() {
        let adapter = DomMountAdapter::new();
        let render = FeatureDescriptor::new("render", "Render", "", Behavior::Render(|_| html! {}));

        let mut handle = MountHandle::Imperative;
        let result = block_on(adapter.update(&render, &mut handle, &FeatureSettings::default()));
        assert!(matches!(result, Err(MountError::HandleMismatch(id)) if id == "render"));

        let result = block_on(adapter.deactivate(&render, MountHandle::Imperative));
        assert!(matches!(result, Err(MountError::HandleMismatch(_))));
    }
}
