//! Node animation: keyframe channels grouped into named clips.

use crate::math::{Quaternion, Vector3D};

/// Out-of-range behaviour of a channel. Values match `aiAnimBehaviour`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum AnimationBehaviour {
    /// Use the node's default transform.
    #[default]
    Default = 0,
    /// Hold the nearest key.
    Constant = 1,
    /// Extrapolate from the nearest two keys.
    Linear = 2,
    /// Wrap around.
    Repeat = 3,
}

impl AnimationBehaviour {
    /// Parse a native value. Unknown values map to `Default`.
    pub fn from_raw(raw: u32) -> Self {
        match raw {
            1 => Self::Constant,
            2 => Self::Linear,
            3 => Self::Repeat,
            _ => Self::Default,
        }
    }
}

/// A timed vector value (position or scale).
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct VectorKey {
    /// Time of the key, in ticks.
    pub time: f64,
    /// Value at that time.
    pub value: Vector3D,
}

impl VectorKey {
    /// Create a key.
    pub const fn new(time: f64, value: Vector3D) -> Self {
        Self { time, value }
    }
}

/// A timed rotation.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct QuaternionKey {
    /// Time of the key, in ticks.
    pub time: f64,
    /// Rotation at that time.
    pub value: Quaternion,
}

impl QuaternionKey {
    /// Create a key.
    pub const fn new(time: f64, value: Quaternion) -> Self {
        Self { time, value }
    }
}

/// Keyframes for one node, matched by name.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct NodeAnimationChannel {
    /// Name of the animated node.
    pub node_name: String,
    /// Position keys, in time order.
    pub position_keys: Vec<VectorKey>,
    /// Rotation keys, in time order.
    pub rotation_keys: Vec<QuaternionKey>,
    /// Scaling keys, in time order.
    pub scaling_keys: Vec<VectorKey>,
    /// Behaviour before the first key.
    pub pre_state: AnimationBehaviour,
    /// Behaviour after the last key.
    pub post_state: AnimationBehaviour,
}

impl NodeAnimationChannel {
    /// An empty channel for `node_name`.
    pub fn new(node_name: impl Into<String>) -> Self {
        Self {
            node_name: node_name.into(),
            ..Self::default()
        }
    }

    /// Whether any keys are present.
    pub fn has_keys(&self) -> bool {
        !self.position_keys.is_empty()
            || !self.rotation_keys.is_empty()
            || !self.scaling_keys.is_empty()
    }

    /// Time of the last key across all three tracks.
    pub fn last_key_time(&self) -> Option<f64> {
        let last_pos = self.position_keys.last().map(|k| k.time);
        let last_rot = self.rotation_keys.last().map(|k| k.time);
        let last_scale = self.scaling_keys.last().map(|k| k.time);
        [last_pos, last_rot, last_scale]
            .into_iter()
            .flatten()
            .reduce(f64::max)
    }
}

/// A named animation clip.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Animation {
    /// Clip name (may be empty).
    pub name: String,
    /// Duration in ticks.
    pub duration_in_ticks: f64,
    /// Ticks per second; zero when unspecified by the source file.
    pub ticks_per_second: f64,
    /// One channel per animated node.
    pub node_channels: Vec<NodeAnimationChannel>,
}

impl Animation {
    /// A named, empty clip.
    pub fn new(name: impl Into<String>, duration_in_ticks: f64, ticks_per_second: f64) -> Self {
        Self {
            name: name.into(),
            duration_in_ticks,
            ticks_per_second,
            node_channels: Vec::new(),
        }
    }

    /// Duration in seconds, if the tick rate is known.
    pub fn duration_seconds(&self) -> Option<f64> {
        (self.ticks_per_second > 0.0).then(|| self.duration_in_ticks / self.ticks_per_second)
    }

    /// Channel animating `node_name`, if any.
    pub fn channel(&self, node_name: &str) -> Option<&NodeAnimationChannel> {
        self.node_channels.iter().find(|c| c.node_name == node_name)
    }
}
