//! Device and scene records owned by the hub's device graph
//!
//! The policy engine only reads these; adapters and the graph store own them.
use serde::{Deserialize, Serialize};
use std::fmt;

/// What a command operates on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    Switch,
    Dimmer,
    ColorControl,
    Lock,
    Alarm,
    Thermostat,
    Climate,
    Cover,
    Fan,
    MediaPlayer,
    Sensor,
    Camera,
}

impl Capability {
    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::Switch => "switch",
            Capability::Dimmer => "dimmer",
            Capability::ColorControl => "color_control",
            Capability::Lock => "lock",
            Capability::Alarm => "alarm",
            Capability::Thermostat => "thermostat",
            Capability::Climate => "climate",
            Capability::Cover => "cover",
            Capability::Fan => "fan",
            Capability::MediaPlayer => "media_player",
            Capability::Sensor => "sensor",
            Capability::Camera => "camera",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Physical kind of a device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceType {
    Light,
    Switch,
    Outlet,
    Lock,
    Thermostat,
    Sensor,
    Cover,
    Fan,
    MediaPlayer,
    Camera,
    Alarm,
    Other,
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            DeviceType::Light => "light",
            DeviceType::Switch => "switch",
            DeviceType::Outlet => "outlet",
            DeviceType::Lock => "lock",
            DeviceType::Thermostat => "thermostat",
            DeviceType::Sensor => "sensor",
            DeviceType::Cover => "cover",
            DeviceType::Fan => "fan",
            DeviceType::MediaPlayer => "media_player",
            DeviceType::Camera => "camera",
            DeviceType::Alarm => "alarm",
            DeviceType::Other => "other",
        };
        f.write_str(name)
    }
}

/// A device as known to the device graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Device {
    pub id: String,

    #[serde(rename = "type")]
    pub device_type: DeviceType,

    #[serde(default)]
    pub capabilities: Vec<Capability>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub area_id: Option<String>,

    pub adapter_id: String,

    #[serde(default = "default_true")]
    pub online: bool,
}

fn default_true() -> bool {
    true
}

impl Device {
    pub fn new(id: impl Into<String>, device_type: DeviceType, adapter_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            device_type,
            capabilities: Vec::new(),
            area_id: None,
            adapter_id: adapter_id.into(),
            online: true,
        }
    }

    pub fn with_capability(mut self, capability: Capability) -> Self {
        self.capabilities.push(capability);
        self
    }

    pub fn in_area(mut self, area_id: impl Into<String>) -> Self {
        self.area_id = Some(area_id.into());
        self
    }

    pub fn offline(mut self) -> Self {
        self.online = false;
        self
    }

    pub fn has_capability(&self, capability: Capability) -> bool {
        self.capabilities.contains(&capability)
    }
}

/// A scene as known to the device graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scene {
    pub id: String,
    pub name: String,
    pub adapter_id: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl Scene {
    pub fn new(id: impl Into<String>, name: impl Into<String>, adapter_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            adapter_id: adapter_id.into(),
            tags: Vec::new(),
        }
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_builder() {
        let device = Device::new("front_door", DeviceType::Lock, "zwave")
            .with_capability(Capability::Lock)
            .in_area("hallway");

        assert!(device.has_capability(Capability::Lock));
        assert!(!device.has_capability(Capability::Switch));
        assert_eq!(device.area_id.as_deref(), Some("hallway"));
        assert!(device.online);
    }

    #[test]
    fn test_device_serde_uses_type_key() {
        let json = serde_json::json!({
            "id": "d1",
            "type": "thermostat",
            "capabilities": ["thermostat", "climate"],
            "adapter_id": "hue"
        });
        let device: Device = serde_json::from_value(json).unwrap();
        assert_eq!(device.device_type, DeviceType::Thermostat);
        assert_eq!(device.capabilities.len(), 2);
        assert!(device.online);
    }

    #[test]
    fn test_capability_display() {
        assert_eq!(Capability::MediaPlayer.to_string(), "media_player");
        assert_eq!(DeviceType::Lock.to_string(), "lock");
    }
}
