pub mod api;
pub mod config;
mod engine;
mod integrations;

pub use config::Config;
pub use config::LogLevel;
pub use engine::BinarySensorState;
pub use engine::Device;
pub use engine::Engine;
pub use engine::EntityInfo;
pub use engine::LightState;
pub use engine::SensorState;
pub use engine::State;
