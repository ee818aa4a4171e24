/// Root component mounted inside a feature's shadow surface
use yew::prelude::*;

use crate::feature::{FeatureSettings, RenderFn};

#[derive(Properties, Clone)]
pub struct FeatureSurfaceProps {
    pub settings: FeatureSettings,
    pub render: RenderFn,
}

impl PartialEq for FeatureSurfaceProps {
    fn eq(&self, other: &Self) -> bool {
        self.settings == other.settings && std::ptr::fn_addr_eq(self.render, other.render)
    }
}

#[function_component(FeatureSurface)]
pub fn feature_surface(props: &FeatureSurfaceProps) -> Html {
    (props.render)(&props.settings)
}
