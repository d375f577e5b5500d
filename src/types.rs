use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use url::Url;

/* ---------------- hosts ---------------- */

/// Partition key of the profile store.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct HostKey(pub String);

impl HostKey {
    /// Canonicalize host to a stable key: lowercase + IDNA/Punycode, then drop
    /// `www.` and one generic two-letter subdomain (`en.`, `us.`, `uk.`).
    fn canonicalize(host: &str) -> String {
        let lower = host.trim().trim_end_matches('.').to_ascii_lowercase();
        let ascii = idna::domain_to_ascii(&lower).unwrap_or(lower);
        let mut rest = ascii.strip_prefix("www.").unwrap_or(&ascii);
        let labels = rest.split('.').count();
        if labels > 2 {
            if let Some((first, tail)) = rest.split_once('.') {
                if first.len() == 2
                    && first.chars().all(|c| c.is_ascii_alphabetic())
                    && !is_country_suffix(tail)
                {
                    rest = tail;
                }
            }
        }
        rest.to_string()
    }

    pub fn from_url(url: &Url) -> Option<Self> {
        url.host_str().map(|h| HostKey(Self::canonicalize(h)))
    }

    /// Build a HostKey from raw user text; tolerates a scheme and path.
    pub fn from_raw(host: &str) -> Self {
        let trimmed = host.trim();
        let without_scheme = trimmed
            .split_once("://")
            .map(|(_, rest)| rest)
            .unwrap_or(trimmed);
        let authority = without_scheme
            .split(['/', '?', '#'])
            .next()
            .unwrap_or(without_scheme);
        let hostname = authority.rsplit('@').next().unwrap_or(authority);
        let hostname = hostname.split(':').next().unwrap_or(hostname);
        HostKey(Self::canonicalize(hostname))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Second-level labels registries use under a country code (`co.uk`, `com.au`).
const COUNTRY_SECOND_LEVEL: &[&str] = &["ac", "co", "com", "edu", "go", "gov", "ne", "net", "or", "org"];

/// `co.uk`-style suffix: stripping down to it would merge unrelated sites.
fn is_country_suffix(host: &str) -> bool {
    match host.split_once('.') {
        Some((second, tld)) => {
            tld.len() == 2 && !tld.contains('.') && COUNTRY_SECOND_LEVEL.contains(&second)
        }
        None => true,
    }
}

impl std::fmt::Display for HostKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/* ---------------- buckets ---------------- */

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BucketKind {
    List,
    Anchors,
    Containers,
    Broad,
    Candidates,
}

impl BucketKind {
    /// Cascade order.
    pub const ORDER: [BucketKind; 5] = [
        BucketKind::List,
        BucketKind::Anchors,
        BucketKind::Containers,
        BucketKind::Broad,
        BucketKind::Candidates,
    ];

    pub fn cap(self) -> usize {
        match self {
            BucketKind::List => crate::config::LIST_CAP,
            BucketKind::Anchors | BucketKind::Containers | BucketKind::Broad => {
                crate::config::BUCKET_CAP
            }
            BucketKind::Candidates => crate::config::CANDIDATES_CAP,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            BucketKind::List => "list",
            BucketKind::Anchors => "anchors",
            BucketKind::Containers => "containers",
            BucketKind::Broad => "broad",
            BucketKind::Candidates => "candidates",
        }
    }
}

/// Named selector lists, one per role.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Buckets {
    #[serde(default)]
    pub list: Vec<String>,
    #[serde(default)]
    pub anchors: Vec<String>,
    #[serde(default)]
    pub containers: Vec<String>,
    #[serde(default)]
    pub broad: Vec<String>,
    #[serde(default)]
    pub candidates: Vec<String>,
}

impl Buckets {
    pub fn get(&self, kind: BucketKind) -> &Vec<String> {
        match kind {
            BucketKind::List => &self.list,
            BucketKind::Anchors => &self.anchors,
            BucketKind::Containers => &self.containers,
            BucketKind::Broad => &self.broad,
            BucketKind::Candidates => &self.candidates,
        }
    }

    pub fn get_mut(&mut self, kind: BucketKind) -> &mut Vec<String> {
        match kind {
            BucketKind::List => &mut self.list,
            BucketKind::Anchors => &mut self.anchors,
            BucketKind::Containers => &mut self.containers,
            BucketKind::Broad => &mut self.broad,
            BucketKind::Candidates => &mut self.candidates,
        }
    }

    pub fn is_empty(&self) -> bool {
        BucketKind::ORDER.iter().all(|k| self.get(*k).is_empty())
    }

    pub fn len(&self) -> usize {
        BucketKind::ORDER.iter().map(|k| self.get(*k).len()).sum()
    }
}

/* ---------------- field rules ---------------- */

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FieldMode {
    #[default]
    Text,
    Html,
}

/// How to read one field from a card. An empty selector means the card itself.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawFieldRule")]
pub struct FieldRule {
    pub selectors: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attribute: Option<String>,
    pub mode: FieldMode,
}

impl FieldRule {
    pub fn new<S: Into<String>>(selectors: impl IntoIterator<Item = S>) -> Self {
        Self {
            selectors: selectors.into_iter().map(Into::into).collect(),
            attribute: None,
            mode: FieldMode::Text,
        }
    }

    pub fn with_attribute(mut self, attribute: &str) -> Self {
        self.attribute = Some(attribute.to_string());
        self
    }
}

/// Persisted and configured rules come as a string, an array, or an object.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawFieldRule {
    One(String),
    Many(Vec<String>),
    Full {
        #[serde(default)]
        selector: Option<String>,
        #[serde(default)]
        selectors: Vec<String>,
        #[serde(default)]
        attribute: Option<String>,
        #[serde(default)]
        mode: FieldMode,
    },
}

impl From<RawFieldRule> for FieldRule {
    fn from(raw: RawFieldRule) -> Self {
        match raw {
            RawFieldRule::One(s) => FieldRule::new([s.trim().to_string()]),
            RawFieldRule::Many(v) => FieldRule::new(v.into_iter().map(|s| s.trim().to_string())),
            RawFieldRule::Full {
                selector,
                mut selectors,
                attribute,
                mode,
            } => {
                if let Some(s) = selector {
                    selectors.insert(0, s);
                }
                FieldRule {
                    selectors: selectors.into_iter().map(|s| s.trim().to_string()).collect(),
                    attribute: attribute.filter(|a| !a.trim().is_empty()),
                    mode,
                }
            }
        }
    }
}

pub type FieldRules = BTreeMap<String, FieldRule>;

/* ---------------- mining ---------------- */

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateSelector {
    pub selector: String,
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "name", rename_all = "camelCase")]
pub enum MiningSource {
    Platform(String),
    Microdata,
    DomSweep,
    Fallback,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MiningResult {
    pub primary_selector: Option<String>,
    pub candidates: Vec<CandidateSelector>,
    pub fields: FieldRules,
    pub confidence: f64,
    pub source: MiningSource,
    #[serde(default)]
    pub containers: Vec<String>,
}

/* ---------------- items ---------------- */

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedItem {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub href: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sale_price: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compare_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Fields read through custom rules (`brand`, `rating`, ...).
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, String>,
    /// Ranking score; never persisted.
    #[serde(skip)]
    pub score: i32,
}

impl ExtractedItem {
    /// Number of populated fields, used to break dedup ties.
    pub fn populated(&self) -> usize {
        [
            &self.title,
            &self.href,
            &self.price,
            &self.image,
            &self.description,
        ]
        .iter()
        .filter(|f| f.is_some())
        .count()
            + self.extra.len()
    }
}

/* ---------------- profiles ---------------- */

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchPredicate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path_regex: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub query_keys: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template_hash: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileMetrics {
    pub runs: u32,
    pub avg_items: u32,
    pub last_seen: DateTime<Utc>,
}

/// Learned, host-scoped selector bundle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub id: String,
    #[serde(rename = "match", default)]
    pub match_predicate: MatchPredicate,
    #[serde(default)]
    pub buckets: Buckets,
    #[serde(default)]
    pub fields: FieldRules,
    pub metrics: ProfileMetrics,
}

/// What one run wants merged into a host's profiles.
#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    pub id: Option<String>,
    pub url: Option<String>,
    pub buckets: Buckets,
    pub fields: FieldRules,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunMetrics {
    pub items: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BestProfile {
    pub profile: Option<Profile>,
    pub buckets: Buckets,
    pub score: u32,
}

/* ---------------- responses ---------------- */

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub ok: bool,
    pub data: Option<T>,
    pub error: Option<String>,
}
impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            ok: true,
            data: Some(data),
            error: None,
        }
    }
    pub fn err(msg: impl Into<String>) -> Self {
        Self {
            ok: false,
            data: None,
            error: Some(msg.into()),
        }
    }
}
