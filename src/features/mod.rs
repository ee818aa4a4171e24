/// Built-in feature payloads
pub mod banner;
pub mod volume_booster;
