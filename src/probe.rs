//! Configuration-only readiness check for the delivery channel.
//!
//! The probe never touches the network. It decides whether the channel can be
//! used by looking at the three credentials, in a fixed order, and reports the
//! first one that is missing or still set to its placeholder.

use crate::config::ChannelConfig;
use crate::domain::{ChannelStatus, ConfigField};

/// Check the channel configuration.
///
/// Returns [`ChannelStatus::Misconfigured`] naming the first unusable field
/// (service, then template, then key), or [`ChannelStatus::Ready`].
pub fn probe(config: &ChannelConfig) -> ChannelStatus {
    ConfigField::ALL
        .into_iter()
        .find(|&field| is_unset(config, field))
        .map_or(ChannelStatus::Ready, ChannelStatus::Misconfigured)
}

fn is_unset(config: &ChannelConfig, field: ConfigField) -> bool {
    let value = config.get(field).trim();
    value.is_empty() || value == ChannelConfig::placeholder(field)
}
