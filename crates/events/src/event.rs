use chrono::{DateTime, Utc};

/// A fact recorded on an aggregate stream.
///
/// Stored events are never rewritten; a change in payload shape bumps
/// [`Event::schema_version`] so older rows stay readable.
pub trait Event: Clone + core::fmt::Debug + Send + Sync + 'static {
    /// Dotted name stored alongside the payload, e.g.
    /// `"inventory.record.stock_moved"`.
    fn event_type(&self) -> &'static str;

    /// Payload schema revision. Unrelated to the stream revision.
    fn schema_version(&self) -> u32;

    /// Business time of the fact.
    fn occurred_at(&self) -> DateTime<Utc>;

    /// Name of the stream kind, the part of `event_type` before the last dot.
    fn stream_kind(&self) -> &'static str {
        let name = self.event_type();
        name.rsplit_once('.').map(|(kind, _)| kind).unwrap_or(name)
    }
}
