//! Discussion mapper: which message to reply to in the linked discussion
//! group for a given channel post.
//!
//! Bots cannot query this mapping directly. When comments are enabled,
//! Telegram mirrors every channel post into the discussion group as an
//! automatic forward carrying its channel origin; observing that forward is
//! the correlation signal. Associations live in memory with a TTL; they
//! are re-derivable from each new event and need not survive a restart.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::debug;

use quip_telegram::types::{Message, MessageOrigin};

/// The two ways a mapping request reaches the mapper.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MapperEvent {
    /// Caption pipeline asking where to reply for a channel post.
    Lookup {
        channel_id: i64,
        channel_message_id: i64,
    },
    /// Transport observed the mirrored copy of a channel post.
    AutoForward {
        discussion_chat_id: i64,
        discussion_message_id: i64,
        origin_channel_id: i64,
        origin_message_id: i64,
    },
}

impl MapperEvent {
    /// Classify an inbound group message; only automatic forwards with a
    /// channel origin carry the correlation signal.
    pub fn from_group_message(msg: &Message) -> Option<Self> {
        if !msg.is_auto_forward() {
            return None;
        }
        match msg.forward_origin.as_ref()? {
            MessageOrigin::Channel { chat, message_id } => Some(MapperEvent::AutoForward {
                discussion_chat_id: msg.chat.id,
                discussion_message_id: msg.message_id,
                origin_channel_id: chat.id,
                origin_message_id: *message_id,
            }),
            MessageOrigin::Other => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiscussionRef {
    pub chat_id: i64,
    pub message_id: i64,
}

pub struct DiscussionMapper {
    ttl: Duration,
    entries: Mutex<HashMap<(i64, i64), (DiscussionRef, Instant)>>,
}

impl DiscussionMapper {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Feed one event through the mapper. AutoForward records the
    /// association (and echoes it); Lookup reads it if still fresh.
    pub fn apply(&self, event: MapperEvent) -> Option<DiscussionRef> {
        let mut entries = self.entries.lock().expect("discussion map lock");
        let now = Instant::now();
        match event {
            MapperEvent::AutoForward {
                discussion_chat_id,
                discussion_message_id,
                origin_channel_id,
                origin_message_id,
            } => {
                let target = DiscussionRef {
                    chat_id: discussion_chat_id,
                    message_id: discussion_message_id,
                };
                entries.insert((origin_channel_id, origin_message_id), (target, now));
                debug!(
                    origin_channel_id,
                    origin_message_id, discussion_chat_id, "discussion mapping recorded"
                );
                Some(target)
            }
            MapperEvent::Lookup {
                channel_id,
                channel_message_id,
            } => {
                let key = (channel_id, channel_message_id);
                match entries.get(&key) {
                    Some((target, stamp)) if now.duration_since(*stamp) <= self.ttl => Some(*target),
                    Some(_) => {
                        entries.remove(&key);
                        None
                    }
                    None => None,
                }
            }
        }
    }

    /// Resolve with a bounded wait: the automatic forward races the channel
    /// post webhook, so the mapping may arrive a few seconds late. Gives up
    /// after the schedule is exhausted.
    pub async fn resolve_waiting(
        &self,
        channel_id: i64,
        channel_message_id: i64,
    ) -> Option<DiscussionRef> {
        const DELAYS_MS: [u64; 6] = [500, 1_000, 2_000, 4_000, 8_000, 12_000];

        let lookup = MapperEvent::Lookup {
            channel_id,
            channel_message_id,
        };
        for delay_ms in DELAYS_MS {
            if let Some(target) = self.apply(lookup) {
                return Some(target);
            }
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
        }
        self.apply(lookup)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quip_telegram::types::Chat;

    fn mapper() -> DiscussionMapper {
        DiscussionMapper::new(Duration::from_secs(3600))
    }

    fn forward(origin_channel_id: i64, origin_message_id: i64) -> MapperEvent {
        MapperEvent::AutoForward {
            discussion_chat_id: -2002,
            discussion_message_id: 99,
            origin_channel_id,
            origin_message_id,
        }
    }

    #[test]
    fn test_lookup_before_forward_misses() {
        let map = mapper();
        let miss = map.apply(MapperEvent::Lookup {
            channel_id: -1001,
            channel_message_id: 42,
        });
        assert_eq!(miss, None);
    }

    #[test]
    fn test_forward_then_lookup_resolves() {
        let map = mapper();
        map.apply(forward(-1001, 42));
        let target = map
            .apply(MapperEvent::Lookup {
                channel_id: -1001,
                channel_message_id: 42,
            })
            .unwrap();
        assert_eq!(target, DiscussionRef { chat_id: -2002, message_id: 99 });
    }

    #[test]
    fn test_expired_mapping_is_dropped() {
        let map = DiscussionMapper::new(Duration::ZERO);
        map.apply(forward(-1001, 42));
        std::thread::sleep(Duration::from_millis(2));
        let miss = map.apply(MapperEvent::Lookup {
            channel_id: -1001,
            channel_message_id: 42,
        });
        assert_eq!(miss, None);
    }

    #[test]
    fn test_event_from_auto_forward_message() {
        let msg = Message {
            message_id: 7,
            chat: Chat {
                id: -2002,
                kind: "supergroup".to_string(),
                title: None,
            },
            date: 0,
            photo: None,
            caption: None,
            media_group_id: None,
            is_automatic_forward: Some(true),
            forward_origin: Some(MessageOrigin::Channel {
                chat: Chat {
                    id: -1001,
                    kind: "channel".to_string(),
                    title: None,
                },
                message_id: 42,
            }),
        };
        let event = MapperEvent::from_group_message(&msg).unwrap();
        assert_eq!(
            event,
            MapperEvent::AutoForward {
                discussion_chat_id: -2002,
                discussion_message_id: 7,
                origin_channel_id: -1001,
                origin_message_id: 42,
            }
        );
    }

    #[test]
    fn test_plain_group_message_is_not_a_signal() {
        let msg = Message {
            message_id: 8,
            chat: Chat {
                id: -2002,
                kind: "supergroup".to_string(),
                title: None,
            },
            date: 0,
            photo: None,
            caption: None,
            media_group_id: None,
            is_automatic_forward: None,
            forward_origin: None,
        };
        assert!(MapperEvent::from_group_message(&msg).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_resolve_waiting_finds_earlier_forward() {
        let map = mapper();
        map.apply(forward(-1001, 42));
        let target = map.resolve_waiting(-1001, 42).await.unwrap();
        assert_eq!(target.message_id, 99);
    }

    #[tokio::test(start_paused = true)]
    async fn test_resolve_waiting_gives_up() {
        let map = mapper();
        assert!(map.resolve_waiting(-1001, 42).await.is_none());
    }
}
