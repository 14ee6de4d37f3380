/// Topic dispatcher for inbound gossip messages.
///
/// Pure demultiplexer: looks at the topic tag in frame 0, checks the frame
/// count, and logs the payload. Nothing is decoded into domain state.
use std::fmt;

use bytes::Bytes;
use serde::Serialize;

/// Recognized topic tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Topic {
    Block,
    Assets,
    Issues,
    Transfer,
    Proof,
    Pay,
    Rpc,
    Peer,
    Heart,
}

impl Topic {
    pub const ALL: [Topic; 9] = [
        Topic::Block,
        Topic::Assets,
        Topic::Issues,
        Topic::Transfer,
        Topic::Proof,
        Topic::Pay,
        Topic::Rpc,
        Topic::Peer,
        Topic::Heart,
    ];

    pub fn from_tag(tag: &[u8]) -> Option<Self> {
        Self::ALL.into_iter().find(|topic| topic.tag().as_bytes() == tag)
    }

    pub fn tag(self) -> &'static str {
        match self {
            Topic::Block => "block",
            Topic::Assets => "assets",
            Topic::Issues => "issues",
            Topic::Transfer => "transfer",
            Topic::Proof => "proof",
            Topic::Pay => "pay",
            Topic::Rpc => "rpc",
            Topic::Peer => "peer",
            Topic::Heart => "heart",
        }
    }

    /// Frames expected after the tag.
    pub fn arity(self) -> usize {
        match self {
            Topic::Rpc => 2,
            Topic::Peer => 3,
            _ => 1,
        }
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// What the dispatcher did with a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    /// Recognized topic with enough frames; payload logged.
    Dispatched(Topic),
    /// Unknown tag; dropped.
    Unrecognized { tag: String },
    /// Known tag but too few frames; dropped.
    Malformed {
        topic: Topic,
        expected: usize,
        actual: usize,
    },
    /// No frames at all after the envelope; dropped.
    Empty,
}

impl Dispatch {
    pub fn topic(&self) -> Option<Topic> {
        match self {
            Dispatch::Dispatched(topic) | Dispatch::Malformed { topic, .. } => Some(*topic),
            _ => None,
        }
    }
}

/// Demultiplex one message (envelope already stripped) received from `source`.
pub fn dispatch(source: &str, frames: &[Bytes]) -> Dispatch {
    let Some((tag, payload)) = frames.split_first() else {
        tracing::warn!(client = %source, "receive empty message");
        return Dispatch::Empty;
    };

    tracing::info!(client = %source, "incoming message");

    let Some(topic) = Topic::from_tag(tag) else {
        let tag = String::from_utf8_lossy(tag).into_owned();
        tracing::warn!(
            client = %source,
            tag = %tag,
            data = %hex_frames(payload),
            "receive unhandled"
        );
        return Dispatch::Unrecognized { tag };
    };

    if payload.len() < topic.arity() {
        tracing::warn!(
            client = %source,
            topic = %topic,
            expected = topic.arity(),
            actual = payload.len(),
            "receive malformed"
        );
        return Dispatch::Malformed {
            topic,
            expected: topic.arity(),
            actual: payload.len(),
        };
    }

    match topic {
        Topic::Block => tracing::info!(block = %hex::encode(&payload[0]), "receive block"),
        Topic::Assets => tracing::info!(asset = %hex::encode(&payload[0]), "receive asset"),
        Topic::Issues => tracing::info!(issue = %hex::encode(&payload[0]), "receive issue"),
        Topic::Transfer => {
            tracing::info!(transfer = %hex::encode(&payload[0]), "receive transfer")
        }
        Topic::Proof => tracing::info!(proof = %hex::encode(&payload[0]), "receive proof"),
        Topic::Pay => tracing::info!(pay = %hex::encode(&payload[0]), "receive pay"),
        Topic::Rpc => tracing::info!(
            fingerprint = %hex::encode(&payload[0]),
            rpc = %hex::encode(&payload[1]),
            "receive rpc"
        ),
        Topic::Peer => tracing::info!(
            peer = %hex::encode(&payload[0]),
            broadcast = %hex::encode(&payload[1]),
            listener = %hex::encode(&payload[2]),
            "receive peer"
        ),
        Topic::Heart => tracing::info!(heart = %hex::encode(&payload[0]), "receive heart"),
    }

    Dispatch::Dispatched(topic)
}

fn hex_frames(frames: &[Bytes]) -> String {
    frames.iter().map(hex::encode).collect::<Vec<_>>().join(" ")
}
