/// Wire format of a repository index, in fallback order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndexFormat {
    /// `index-v1.jar` carrying JSON.
    Current,
    /// `index.jar` carrying XML.
    Legacy,
}

impl IndexFormat {
    /// Formats a sync tries, most preferred first.
    pub const CANDIDATES: [IndexFormat; 2] = [IndexFormat::Current, IndexFormat::Legacy];

    pub fn jar_name(self) -> &'static str {
        match self {
            IndexFormat::Current => "index-v1.jar",
            IndexFormat::Legacy => "index.jar",
        }
    }

    pub fn content_name(self) -> &'static str {
        match self {
            IndexFormat::Current => "index-v1.json",
            IndexFormat::Legacy => "index.xml",
        }
    }

    /// Legacy indexes declare their signing key inline, which must agree with
    /// the jar signer.
    pub fn certificate_from_index(self) -> bool {
        matches!(self, IndexFormat::Legacy)
    }
}
