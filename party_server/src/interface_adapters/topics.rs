// Topic naming for one party and reply-address resolution.

use crate::interface_adapters::protocol::RequestKind;
use uuid::Uuid;

const ROOT: &str = "party";

/// Topic names for a single party `party.{p}.*`.
#[derive(Debug, Clone)]
pub struct PartyTopics {
    party_id: Uuid,
}

impl PartyTopics {
    pub fn new(party_id: Uuid) -> Self {
        Self { party_id }
    }

    /// Topic the listener for `kind` consumes.
    pub fn request(&self, kind: RequestKind) -> String {
        format!("{ROOT}.{}.{kind}", self.party_id)
    }

    /// Canonical (un-suffixed) response topic, if the request gets a reply.
    pub fn response(&self, kind: RequestKind) -> Option<String> {
        let leaf = match kind {
            RequestKind::AddPlayer => "map",
            RequestKind::ChangeState => "state",
            RequestKind::Sync => "sync",
            RequestKind::Input => return None,
        };
        Some(format!("{ROOT}.{}.{leaf}", self.party_id))
    }

    /// Per-player sync topic the tick broadcaster publishes on.
    pub fn sync_for(&self, player_id: Uuid) -> String {
        format!("{ROOT}.{}.sync.{player_id}", self.party_id)
    }
}

/// Topic the owner receives the freshly generated party on.
pub fn creation_topic(owner_id: Uuid) -> String {
    format!("{ROOT}.creation.{owner_id}")
}

/// Suffix addressing one player under a canonical topic.
pub fn player_suffix(player_id: Uuid) -> String {
    format!(".{player_id}")
}

/// Resolves where a reply goes.
///
/// An empty address means the canonical topic itself, an address starting
/// with `.` is appended to it, and anything else is already a full topic.
pub fn resolve_reply(canonical: &str, address: &str) -> String {
    if address.is_empty() {
        canonical.to_string()
    } else if address.starts_with('.') {
        format!("{canonical}{address}")
    } else {
        address.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_and_response_topics_follow_party_layout() {
        let id = Uuid::nil();
        let topics = PartyTopics::new(id);
        assert_eq!(
            topics.request(RequestKind::AddPlayer),
            format!("party.{id}.addPlayer")
        );
        assert_eq!(topics.request(RequestKind::Input), format!("party.{id}.input"));
        assert_eq!(
            topics.response(RequestKind::AddPlayer),
            Some(format!("party.{id}.map"))
        );
        assert_eq!(
            topics.response(RequestKind::ChangeState),
            Some(topics.request(RequestKind::ChangeState))
        );
        assert_eq!(topics.response(RequestKind::Input), None);
    }

    #[test]
    fn suffix_is_appended_only_when_suffix_shaped() {
        let player = Uuid::nil();
        let canonical = "party.p.sync";
        assert_eq!(
            resolve_reply(canonical, &player_suffix(player)),
            format!("party.p.sync.{player}")
        );
        assert_eq!(resolve_reply(canonical, ""), canonical);
        assert_eq!(resolve_reply(canonical, "clients.inbox.1"), "clients.inbox.1");
    }

    #[test]
    fn broadcast_topic_matches_suffixed_sync_reply() {
        let party = Uuid::new_v4();
        let player = Uuid::new_v4();
        let topics = PartyTopics::new(party);
        let canonical = topics.response(RequestKind::Sync).expect("sync replies");
        assert_eq!(
            topics.sync_for(player),
            resolve_reply(&canonical, &player_suffix(player))
        );
        assert_eq!(creation_topic(player), format!("party.creation.{player}"));
    }
}
