// SPDX-FileCopyrightText: 2026 DVR Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Channel directory lookup.

use std::collections::HashMap;

use crate::types::{Channel, ChannelId};

/// Resolves channel ids to channels (and so to their tuner input).
pub trait ChannelLookup: Send + Sync {
    fn channel(&self, id: ChannelId) -> Option<Channel>;
}

/// Fixed channel directory.
#[derive(Debug, Clone, Default)]
pub struct StaticChannels {
    channels: HashMap<ChannelId, Channel>,
}

impl StaticChannels {
    pub fn new(channels: impl IntoIterator<Item = Channel>) -> Self {
        Self {
            channels: channels.into_iter().map(|c| (c.id, c)).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }
}

impl ChannelLookup for StaticChannels {
    fn channel(&self, id: ChannelId) -> Option<Channel> {
        self.channels.get(&id).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::InputId;

    #[test]
    fn static_channels_resolve_by_id() {
        let channels = StaticChannels::new([Channel {
            id: ChannelId(7),
            input_id: InputId::new("hw0"),
            display_number: "7-1".into(),
            name: "News".into(),
        }]);
        assert_eq!(channels.len(), 1);
        assert_eq!(channels.channel(ChannelId(7)).map(|c| c.name), Some("News".to_string()));
        assert!(channels.channel(ChannelId(8)).is_none());
    }
}
