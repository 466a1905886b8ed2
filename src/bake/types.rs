use std::fmt;
use std::path::PathBuf;

use crate::graph::{NodeId, sockets};

/// One baked PBR channel. Declaration order is the pass order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Channel {
    BaseColor,
    Metallic,
    Roughness,
    Emission,
    Alpha,
    Normal,
}

/// How a channel is captured.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BakeStrategy {
    /// Route the socket's source through an emission shader and bake `EMIT`.
    SocketRedirect,
    /// Bake `NORMAL` straight from the unmodified graph.
    Direct,
}

impl Channel {
    pub const ALL: [Channel; 6] = [
        Channel::BaseColor,
        Channel::Metallic,
        Channel::Roughness,
        Channel::Emission,
        Channel::Alpha,
        Channel::Normal,
    ];

    /// Principled input the channel feeds.
    pub fn socket(self) -> &'static str {
        match self {
            Channel::BaseColor => sockets::BASE_COLOR,
            Channel::Metallic => sockets::METALLIC,
            Channel::Roughness => sockets::ROUGHNESS,
            Channel::Emission => sockets::EMISSION,
            Channel::Alpha => sockets::ALPHA,
            Channel::Normal => sockets::NORMAL,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Channel::BaseColor => "Albedo",
            Channel::Metallic => "Metal",
            Channel::Roughness => "Rough",
            Channel::Emission => "Emit",
            Channel::Alpha => "Opacity",
            Channel::Normal => "Normal",
        }
    }

    /// File-name suffix of the persisted texture.
    pub fn suffix(self) -> &'static str {
        match self {
            Channel::BaseColor => "ALBEDO",
            Channel::Metallic => "METAL",
            Channel::Roughness => "ROUGH",
            Channel::Emission => "EMIT",
            Channel::Alpha => "OPACITY",
            Channel::Normal => "NORMAL",
        }
    }

    pub fn strategy(self) -> BakeStrategy {
        match self {
            Channel::Normal => BakeStrategy::Direct,
            _ => BakeStrategy::SocketRedirect,
        }
    }

    pub fn mode(self) -> BakeMode {
        match self.strategy() {
            BakeStrategy::SocketRedirect => BakeMode::Emit,
            BakeStrategy::Direct => BakeMode::Normal,
        }
    }

    /// Only albedo holds visual color; every other channel is linear data.
    pub fn is_color_data(self) -> bool {
        matches!(self, Channel::BaseColor)
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BakeMode {
    Emit,
    Normal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BakeDevice {
    Gpu,
    Cpu,
}

/// Renderer settings applied once before the first pass.
#[derive(Debug, Clone, PartialEq)]
pub struct BakeSettings {
    pub samples: u32,
    pub device: BakeDevice,
    pub denoise: bool,
}

impl Default for BakeSettings {
    fn default() -> Self {
        Self {
            samples: 16,
            device: BakeDevice::Gpu,
            denoise: true,
        }
    }
}

/// Texture node the backend must bake into for one material.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BakeTarget {
    pub material: String,
    pub node: NodeId,
}

/// Everything the backend needs for one call. Selection is explicit here
/// instead of living on the nodes.
#[derive(Debug, Clone)]
pub struct BakeRequest<'a> {
    pub mode: BakeMode,
    pub channel: Channel,
    pub targets: &'a [BakeTarget],
    pub settings: &'a BakeSettings,
}

/// Immutable handle to a persisted and reloaded bake result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BakedTexture {
    pub channel: Channel,
    pub path: PathBuf,
    pub width: u32,
    pub height: u32,
}

/// Per-channel results in pass order. `None` marks a skipped pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BakedChannels {
    entries: Vec<(Channel, Option<BakedTexture>)>,
}

impl BakedChannels {
    pub(crate) fn push(&mut self, channel: Channel, texture: Option<BakedTexture>) {
        self.entries.push((channel, texture));
    }

    pub fn get(&self, channel: Channel) -> Option<&BakedTexture> {
        self.entries
            .iter()
            .find(|(c, _)| *c == channel)
            .and_then(|(_, t)| t.as_ref())
    }

    /// Whether the channel's pass ran at all (baked or skipped).
    pub fn contains(&self, channel: Channel) -> bool {
        self.entries.iter().any(|(c, _)| *c == channel)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Channel, Option<&BakedTexture>)> {
        self.entries.iter().map(|(c, t)| (*c, t.as_ref()))
    }

    pub fn baked(&self) -> impl Iterator<Item = &BakedTexture> {
        self.entries.iter().filter_map(|(_, t)| t.as_ref())
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
