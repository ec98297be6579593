//! Common types for the netgym environment abstraction.
//!
//! Space descriptors and data containers are plain serializable values. The
//! session never inspects them beyond forwarding; only the codec and the
//! optional action validation look inside.

use serde::{Deserialize, Serialize};

/// Identifier of one agent in the simulated environment.
///
/// Assigned by the simulation before the session starts and never changed
/// afterwards. Serialized as a bare integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AgentId(pub u32);

impl AgentId {
    /// Returns the raw integer value.
    pub fn as_u32(&self) -> u32 {
        self.0
    }
}

impl From<u32> for AgentId {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

impl std::fmt::Display for AgentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "agent-{}", self.0)
    }
}

/// Element type of a box space or box container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dtype {
    Int,
    Uint,
    Float,
    Double,
}

impl Dtype {
    pub fn name(&self) -> &'static str {
        match self {
            Dtype::Int => "int",
            Dtype::Uint => "uint",
            Dtype::Float => "float",
            Dtype::Double => "double",
        }
    }
}

/// Schema describing the domain of an observation or action value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SpaceDescriptor {
    /// Integers in `0..n`.
    Discrete { n: u64 },

    /// n-dimensional array with a single scalar bound pair.
    ///
    /// Infinite bounds mark an unbounded side and travel as `"inf"`/`"-inf"`.
    Box {
        #[serde(with = "bound")]
        low: f64,
        #[serde(with = "bound")]
        high: f64,
        shape: Vec<u32>,
        dtype: Dtype,
    },

    /// Ordered composition of sub-spaces.
    Tuple { elements: Vec<SpaceDescriptor> },

    /// Named composition of sub-spaces. Element order is preserved on the wire.
    Dict { elements: Vec<NamedSpace> },
}

/// JSON has no infinities, so box bounds are written as numbers or as the
/// strings `"inf"`/`"-inf"`. NaN is written as `"nan"` but never read back.
mod bound {
    use serde::de::{self, Unexpected};
    use serde::{Deserialize, Deserializer, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Number(f64),
        Text(String),
    }

    pub fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        if value.is_finite() {
            serializer.serialize_f64(*value)
        } else if value.is_nan() {
            serializer.serialize_str("nan")
        } else if *value > 0.0 {
            serializer.serialize_str("inf")
        } else {
            serializer.serialize_str("-inf")
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        match Repr::deserialize(deserializer)? {
            Repr::Number(value) => Ok(value),
            Repr::Text(text) => match text.as_str() {
                "inf" => Ok(f64::INFINITY),
                "-inf" => Ok(f64::NEG_INFINITY),
                other => Err(de::Error::invalid_value(
                    Unexpected::Str(other),
                    &"a number, \"inf\" or \"-inf\"",
                )),
            },
        }
    }
}

/// A named entry of a dict space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamedSpace {
    pub name: String,
    pub space: SpaceDescriptor,
}

impl SpaceDescriptor {
    /// Creates a discrete space over `0..n`.
    pub fn discrete(n: u64) -> Self {
        Self::Discrete { n }
    }

    /// Creates a box space.
    pub fn bounded_box(low: f64, high: f64, shape: Vec<u32>, dtype: Dtype) -> Self {
        Self::Box {
            low,
            high,
            shape,
            dtype,
        }
    }

    /// Creates a tuple space.
    pub fn tuple(elements: Vec<SpaceDescriptor>) -> Self {
        Self::Tuple { elements }
    }

    /// Creates a dict space from `(name, space)` pairs, keeping their order.
    pub fn dict<S: Into<String>>(elements: impl IntoIterator<Item = (S, SpaceDescriptor)>) -> Self {
        Self::Dict {
            elements: elements
                .into_iter()
                .map(|(name, space)| NamedSpace {
                    name: name.into(),
                    space,
                })
                .collect(),
        }
    }

    /// Returns the kind name used on the wire.
    pub fn kind_name(&self) -> &'static str {
        match self {
            SpaceDescriptor::Discrete { .. } => "discrete",
            SpaceDescriptor::Box { .. } => "box",
            SpaceDescriptor::Tuple { .. } => "tuple",
            SpaceDescriptor::Dict { .. } => "dict",
        }
    }
}

/// Typed payload of a box container.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "dtype", content = "values", rename_all = "lowercase")]
pub enum BoxData {
    Int(Vec<i64>),
    Uint(Vec<u64>),
    Float(Vec<f32>),
    Double(Vec<f64>),
}

impl BoxData {
    pub fn dtype(&self) -> Dtype {
        match self {
            BoxData::Int(_) => Dtype::Int,
            BoxData::Uint(_) => Dtype::Uint,
            BoxData::Float(_) => Dtype::Float,
            BoxData::Double(_) => Dtype::Double,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            BoxData::Int(v) => v.len(),
            BoxData::Uint(v) => v.len(),
            BoxData::Float(v) => v.len(),
            BoxData::Double(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns every element widened to `f64` (for bound checks).
    pub fn to_f64_vec(&self) -> Vec<f64> {
        match self {
            BoxData::Int(v) => v.iter().map(|x| *x as f64).collect(),
            BoxData::Uint(v) => v.iter().map(|x| *x as f64).collect(),
            BoxData::Float(v) => v.iter().map(|x| *x as f64).collect(),
            BoxData::Double(v) => v.clone(),
        }
    }
}

/// A concrete observation or action value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DataContainer {
    Discrete { value: u64 },
    Box { shape: Vec<u32>, data: BoxData },
    Tuple { elements: Vec<DataContainer> },
    Dict { elements: Vec<NamedData> },
}

/// A named entry of a dict container.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamedData {
    pub name: String,
    pub value: DataContainer,
}

impl DataContainer {
    /// Creates a discrete value.
    pub fn discrete(value: u64) -> Self {
        Self::Discrete { value }
    }

    /// Creates a box value; `shape` defaults to the flat length of `data`.
    pub fn boxed(shape: Option<Vec<u32>>, data: BoxData) -> Self {
        let shape = shape.unwrap_or_else(|| vec![data.len() as u32]);
        Self::Box { shape, data }
    }

    /// Creates a tuple value.
    pub fn tuple(elements: Vec<DataContainer>) -> Self {
        Self::Tuple { elements }
    }

    /// Creates a dict value from `(name, value)` pairs, keeping their order.
    pub fn dict<S: Into<String>>(elements: impl IntoIterator<Item = (S, DataContainer)>) -> Self {
        Self::Dict {
            elements: elements
                .into_iter()
                .map(|(name, value)| NamedData {
                    name: name.into(),
                    value,
                })
                .collect(),
        }
    }

    /// Returns the kind name used on the wire.
    pub fn kind_name(&self) -> &'static str {
        match self {
            DataContainer::Discrete { .. } => "discrete",
            DataContainer::Box { .. } => "box",
            DataContainer::Tuple { .. } => "tuple",
            DataContainer::Dict { .. } => "dict",
        }
    }

    /// Returns the value of a discrete container.
    pub fn as_discrete(&self) -> Option<u64> {
        match self {
            DataContainer::Discrete { value } => Some(*value),
            _ => None,
        }
    }

    /// Returns the payload of a box container.
    pub fn as_box(&self) -> Option<&BoxData> {
        match self {
            DataContainer::Box { data, .. } => Some(data),
            _ => None,
        }
    }

    /// Returns false if any float element (at any depth) is NaN or infinite.
    pub fn is_finite(&self) -> bool {
        match self {
            DataContainer::Discrete { .. } => true,
            DataContainer::Box { data, .. } => match data {
                BoxData::Float(v) => v.iter().all(|x| x.is_finite()),
                BoxData::Double(v) => v.iter().all(|x| x.is_finite()),
                BoxData::Int(_) | BoxData::Uint(_) => true,
            },
            DataContainer::Tuple { elements } => elements.iter().all(DataContainer::is_finite),
            DataContainer::Dict { elements } => elements.iter().all(|e| e.value.is_finite()),
        }
    }
}

/// Per-agent entry of the one-time init message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentInitRecord {
    pub agent_id: AgentId,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub obs_space: Option<SpaceDescriptor>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub act_space: Option<SpaceDescriptor>,
}

/// Per-agent entry of a state batch, assembled every step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentStateRecord {
    pub agent_id: AgentId,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub obs: Option<DataContainer>,

    pub reward: f32,

    pub done: bool,

    #[serde(default)]
    pub info: String,
}

/// Action chosen by the peer for one agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentActionRecord {
    pub agent_id: AgentId,
    pub action: DataContainer,
}

impl AgentActionRecord {
    pub fn new(agent_id: impl Into<AgentId>, action: DataContainer) -> Self {
        Self {
            agent_id: agent_id.into(),
            action,
        }
    }
}
