//! Result types returned by the renderer.

use crate::host::RecordId;
use crate::pipeline::attachment::Attachment;

/// Key of a rendered stream: a record, or the merged document that could not
/// be attributed to single records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StreamKey {
    Record(RecordId),
    Merged,
}

impl StreamKey {
    pub fn record_id(&self) -> Option<RecordId> {
        match self {
            StreamKey::Record(id) => Some(*id),
            StreamKey::Merged => None,
        }
    }
}

/// PDF bytes of one key, plus the stored attachment they came from (or that
/// the host should update when saving attachments).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReportStream {
    pub stream: Option<Vec<u8>>,
    pub attachment: Option<Attachment>,
}

impl ReportStream {
    pub fn rendered(pdf: Vec<u8>) -> Self {
        Self {
            stream: Some(pdf),
            attachment: None,
        }
    }
}

/// Insertion-ordered map of [`StreamKey`] → [`ReportStream`].
///
/// Record order follows the request; a merged result holds the single
/// [`StreamKey::Merged`] entry.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReportStreams {
    entries: Vec<(StreamKey, ReportStream)>,
}

impl ReportStreams {
    pub fn new() -> Self {
        Self::default()
    }

    /// A result made of one merged document.
    pub fn merged(pdf: Vec<u8>) -> Self {
        Self {
            entries: vec![(StreamKey::Merged, ReportStream::rendered(pdf))],
        }
    }

    /// Insert or replace `key`, keeping its original position on replace.
    pub fn insert(&mut self, key: StreamKey, value: ReportStream) {
        match self.entries.iter().position(|(k, _)| *k == key) {
            Some(pos) => self.entries[pos].1 = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn get(&self, key: &StreamKey) -> Option<&ReportStream> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn get_mut(&mut self, key: &StreamKey) -> Option<&mut ReportStream> {
        self.entries
            .iter_mut()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }

    pub fn record(&self, id: RecordId) -> Option<&ReportStream> {
        self.get(&StreamKey::Record(id))
    }

    pub fn contains_key(&self, key: &StreamKey) -> bool {
        self.get(key).is_some()
    }

    pub fn keys(&self) -> impl Iterator<Item = &StreamKey> {
        self.entries.iter().map(|(k, _)| k)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&StreamKey, &ReportStream)> {
        self.entries.iter().map(|(k, v)| (k, v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether this result is a single merged document.
    pub fn is_merged(&self) -> bool {
        self.contains_key(&StreamKey::Merged)
    }

    /// Records still without PDF bytes, in insertion order.
    pub fn pending_ids(&self) -> Vec<RecordId> {
        self.entries
            .iter()
            .filter(|(_, v)| v.stream.is_none())
            .filter_map(|(k, _)| k.record_id())
            .collect()
    }
}

impl IntoIterator for ReportStreams {
    type Item = (StreamKey, ReportStream);
    type IntoIter = std::vec::IntoIter<(StreamKey, ReportStream)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

/// What [`crate::report::ReportRenderer::pre_render`] produced.
#[derive(Debug, Clone, PartialEq)]
pub enum PreRendered {
    /// Test mode: the host HTML, no engine involved.
    Html(Vec<u8>),
    Pdf(ReportStreams),
}

impl PreRendered {
    /// `"html"` or `"pdf"`.
    pub fn report_type(&self) -> &'static str {
        match self {
            PreRendered::Html(_) => "html",
            PreRendered::Pdf(_) => "pdf",
        }
    }
}
