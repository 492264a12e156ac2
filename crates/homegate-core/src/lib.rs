//! Homegate Core: device, scene and command model
//!
//! Types shared between the policy engine and the rest of the hub. The
//! device/scene graph owns `Device` and `Scene`; the tool-call layer builds
//! `DeviceCommand` and `SceneCommand`. Nothing in here talks to hardware.

pub mod clock;
pub mod command;
pub mod data_model;
pub mod error;

pub use clock::{Clock, ManualClock, SystemClock};
pub use command::{
    Command, CommandKind, CommandParameter, CommandParameters, DeviceCommand, ParameterKind,
    SceneCommand,
};
pub use data_model::{Capability, Device, DeviceType, Scene};
pub use error::{HubError, HubResult};

/// Homegate engine version
pub const HOMEGATE_VERSION: &str = "1.0.0";
