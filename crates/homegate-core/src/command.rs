//! Commands produced by the tool-call layer
//!
//! Parameters arrive as an open JSON object. Names the policy engine knows how
//! to range-check are lifted into `ParameterKind` so bounds checks match on a
//! closed set; everything else rides along untouched as `Other`.
use crate::data_model::Capability;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Numeric parameters subject to range checks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParameterKind {
    Temperature,
    Brightness,
    Position,
    Volume,
    Value,
}

impl ParameterKind {
    /// Order in which rule ranges are checked against a command.
    pub const RANGE_CHECK_ORDER: [ParameterKind; 5] = [
        ParameterKind::Temperature,
        ParameterKind::Brightness,
        ParameterKind::Position,
        ParameterKind::Volume,
        ParameterKind::Value,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ParameterKind::Temperature => "temperature",
            ParameterKind::Brightness => "brightness",
            ParameterKind::Position => "position",
            ParameterKind::Volume => "volume",
            ParameterKind::Value => "value",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::RANGE_CHECK_ORDER.into_iter().find(|k| k.name() == name)
    }
}

impl fmt::Display for ParameterKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A single command parameter
#[derive(Debug, Clone, PartialEq)]
pub enum CommandParameter {
    Numeric { kind: ParameterKind, value: f64 },
    Other { name: String, value: Value },
}

impl CommandParameter {
    /// Classify a raw name/value pair. Known names only become numeric when
    /// the value is a JSON number.
    pub fn from_raw(name: impl Into<String>, value: Value) -> Self {
        let name = name.into();
        match (ParameterKind::from_name(&name), value.as_f64()) {
            (Some(kind), Some(number)) => CommandParameter::Numeric { kind, value: number },
            _ => CommandParameter::Other { name, value },
        }
    }

    pub fn name(&self) -> &str {
        match self {
            CommandParameter::Numeric { kind, .. } => kind.name(),
            CommandParameter::Other { name, .. } => name,
        }
    }

    fn to_json(&self) -> Value {
        match self {
            CommandParameter::Numeric { value, .. } => serde_json::Number::from_f64(*value)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            CommandParameter::Other { value, .. } => value.clone(),
        }
    }
}

/// Parameter bag of a command. At most one entry per name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "BTreeMap<String, Value>", into = "BTreeMap<String, Value>")]
pub struct CommandParameters {
    entries: Vec<CommandParameter>,
}

impl CommandParameters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a numeric parameter
    pub fn with(mut self, kind: ParameterKind, value: f64) -> Self {
        self.insert(CommandParameter::Numeric { kind, value });
        self
    }

    /// Set an arbitrary parameter
    pub fn with_raw(mut self, name: impl Into<String>, value: Value) -> Self {
        self.insert(CommandParameter::from_raw(name, value));
        self
    }

    /// Insert, replacing any entry with the same name
    pub fn insert(&mut self, parameter: CommandParameter) {
        match self.entries.iter_mut().find(|p| p.name() == parameter.name()) {
            Some(existing) => *existing = parameter,
            None => self.entries.push(parameter),
        }
    }

    /// Numeric value for a known parameter, if present and numeric
    pub fn numeric(&self, kind: ParameterKind) -> Option<f64> {
        self.entries.iter().find_map(|p| match p {
            CommandParameter::Numeric { kind: k, value } if *k == kind => Some(*value),
            _ => None,
        })
    }

    /// Raw JSON value of any parameter by name
    pub fn get(&self, name: &str) -> Option<Value> {
        self.entries
            .iter()
            .find(|p| p.name() == name)
            .map(CommandParameter::to_json)
    }

    pub fn iter(&self) -> impl Iterator<Item = &CommandParameter> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl From<BTreeMap<String, Value>> for CommandParameters {
    fn from(map: BTreeMap<String, Value>) -> Self {
        let mut params = CommandParameters::new();
        for (name, value) in map {
            params.insert(CommandParameter::from_raw(name, value));
        }
        params
    }
}

impl From<CommandParameters> for BTreeMap<String, Value> {
    fn from(params: CommandParameters) -> Self {
        params
            .entries
            .iter()
            .map(|p| (p.name().to_string(), p.to_json()))
            .collect()
    }
}

/// A command against a single device
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceCommand {
    pub device_id: String,
    pub capability: Capability,
    pub action: String,
    #[serde(default)]
    pub parameters: CommandParameters,
}

impl DeviceCommand {
    pub fn new(device_id: impl Into<String>, capability: Capability, action: impl Into<String>) -> Self {
        Self {
            device_id: device_id.into(),
            capability,
            action: action.into(),
            parameters: CommandParameters::new(),
        }
    }

    pub fn with_parameter(mut self, kind: ParameterKind, value: f64) -> Self {
        self.parameters.insert(CommandParameter::Numeric { kind, value });
        self
    }

    pub fn with_parameters(mut self, parameters: CommandParameters) -> Self {
        self.parameters = parameters;
        self
    }
}

/// A request to activate a scene
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneCommand {
    pub scene_id: String,
    #[serde(default)]
    pub parameters: CommandParameters,
}

impl SceneCommand {
    pub fn new(scene_id: impl Into<String>) -> Self {
        Self {
            scene_id: scene_id.into(),
            parameters: CommandParameters::new(),
        }
    }

    pub fn with_parameters(mut self, parameters: CommandParameters) -> Self {
        self.parameters = parameters;
        self
    }
}

/// Whether a command targets a device or a scene
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandKind {
    Device,
    Scene,
}

/// Either kind of command, as recorded in audit entries and pending confirmations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Command {
    Device(DeviceCommand),
    Scene(SceneCommand),
}

impl Command {
    pub fn kind(&self) -> CommandKind {
        match self {
            Command::Device(_) => CommandKind::Device,
            Command::Scene(_) => CommandKind::Scene,
        }
    }

    pub fn device_id(&self) -> Option<&str> {
        match self {
            Command::Device(c) => Some(&c.device_id),
            Command::Scene(_) => None,
        }
    }

    pub fn scene_id(&self) -> Option<&str> {
        match self {
            Command::Scene(c) => Some(&c.scene_id),
            Command::Device(_) => None,
        }
    }
}

impl From<DeviceCommand> for Command {
    fn from(command: DeviceCommand) -> Self {
        Command::Device(command)
    }
}

impl From<SceneCommand> for Command {
    fn from(command: SceneCommand) -> Self {
        Command::Scene(command)
    }
}
