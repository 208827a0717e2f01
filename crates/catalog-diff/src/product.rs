use std::fmt;

/// Identifier of a product as reported by the external catalog (`oid`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProductId(String);

impl ProductId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProductId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The shape a snapshot store expects its keys to have.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KeyFormat {
    /// 24 hexadecimal characters, the catalog's object-id form.
    ObjectId,
    /// Any non-empty identifier without surrounding whitespace.
    #[default]
    Opaque,
}

impl KeyFormat {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "object-id" | "objectid" | "oid" => Some(Self::ObjectId),
            "opaque" | "string" => Some(Self::Opaque),
            _ => None,
        }
    }
}

impl fmt::Display for KeyFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ObjectId => write!(f, "object-id"),
            Self::Opaque => write!(f, "opaque"),
        }
    }
}

/// Why a catalog id could not become a store key.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum KeyError {
    #[error("empty product id")]
    Empty,

    #[error("product id {0:?} has surrounding whitespace")]
    Whitespace(String),

    #[error("product id {id:?} is not a 24 character hex object id")]
    NotObjectId { id: String },
}

/// A product id in the store's native key form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProductKey(String);

impl ProductKey {
    const OBJECT_ID_LEN: usize = 24;

    pub fn parse(id: &ProductId, format: KeyFormat) -> Result<Self, KeyError> {
        let raw = id.as_str();
        if raw.is_empty() {
            return Err(KeyError::Empty);
        }
        if raw.trim() != raw {
            return Err(KeyError::Whitespace(raw.to_owned()));
        }

        match format {
            KeyFormat::Opaque => Ok(Self(raw.to_owned())),
            KeyFormat::ObjectId => {
                if raw.len() == Self::OBJECT_ID_LEN && raw.bytes().all(|b| b.is_ascii_hexdigit()) {
                    Ok(Self(raw.to_ascii_lowercase()))
                } else {
                    Err(KeyError::NotObjectId { id: raw.to_owned() })
                }
            }
        }
    }

    /// Wrap a key that was already validated, e.g. one read back from storage.
    pub fn from_stored(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProductKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One product as decoded from a catalog page. Lives only while its page is processed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Product {
    pub id: ProductId,
    /// Competitor ids in arrival order; may contain duplicates.
    pub competitors: Vec<String>,
}

impl Product {
    pub fn new<I, S>(id: impl Into<String>, competitors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            id: ProductId::new(id),
            competitors: competitors.into_iter().map(Into::into).collect(),
        }
    }
}

/// 1-based index of a catalog page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PageIndex(u32);

impl PageIndex {
    pub const FIRST: PageIndex = PageIndex(1);

    /// Returns `None` for zero; pages start at 1.
    pub fn new(n: u32) -> Option<Self> {
        (n > 0).then_some(Self(n))
    }

    pub fn get(self) -> u32 {
        self.0
    }

    pub fn next(self) -> Option<Self> {
        self.0.checked_add(1).map(Self)
    }
}

impl fmt::Display for PageIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_id_keys_are_lowercased() {
        let id = ProductId::new("5F1A2B3C4D5E6F7A8B9C0D1E");
        let key = ProductKey::parse(&id, KeyFormat::ObjectId).unwrap();
        assert_eq!(key.as_str(), "5f1a2b3c4d5e6f7a8b9c0d1e");
    }

    #[test]
    fn object_id_rejects_wrong_length_and_non_hex() {
        let short = ProductId::new("abc123");
        assert!(matches!(
            ProductKey::parse(&short, KeyFormat::ObjectId),
            Err(KeyError::NotObjectId { .. })
        ));

        let not_hex = ProductId::new("zzzzzzzzzzzzzzzzzzzzzzzz");
        assert!(matches!(
            ProductKey::parse(&not_hex, KeyFormat::ObjectId),
            Err(KeyError::NotObjectId { .. })
        ));
    }

    #[test]
    fn opaque_accepts_any_trimmed_id() {
        let key = ProductKey::parse(&ProductId::new("p1"), KeyFormat::Opaque).unwrap();
        assert_eq!(key.as_str(), "p1");
    }

    #[test]
    fn empty_and_padded_ids_are_rejected_in_every_format() {
        for format in [KeyFormat::Opaque, KeyFormat::ObjectId] {
            assert_eq!(
                ProductKey::parse(&ProductId::new(""), format),
                Err(KeyError::Empty)
            );
            assert!(matches!(
                ProductKey::parse(&ProductId::new(" p1"), format),
                Err(KeyError::Whitespace(_))
            ));
        }
    }

    #[test]
    fn key_format_parse_accepts_aliases() {
        assert_eq!(KeyFormat::parse("object-id"), Some(KeyFormat::ObjectId));
        assert_eq!(KeyFormat::parse("OID"), Some(KeyFormat::ObjectId));
        assert_eq!(KeyFormat::parse("opaque"), Some(KeyFormat::Opaque));
        assert_eq!(KeyFormat::parse("uuid"), None);
    }

    #[test]
    fn page_index_starts_at_one() {
        assert_eq!(PageIndex::new(0), None);
        assert_eq!(PageIndex::new(1), Some(PageIndex::FIRST));
        assert_eq!(PageIndex::FIRST.next().map(PageIndex::get), Some(2));
    }
}
