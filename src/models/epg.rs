use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize, Serializer};

/// Programme entry with UTC start/stop instants
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Programme {
    pub channel: String,
    pub title: String,
    pub description: String,
    #[serde(serialize_with = "serialize_instant")]
    pub start: DateTime<Utc>,
    #[serde(serialize_with = "serialize_instant")]
    pub stop: DateTime<Utc>,
}

/// Body of `/epg`, also the value held by the EPG cache
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EpgResponse {
    pub programmes: Vec<Programme>,
}

/// `programme` element as it appears in an XMLTV document
#[derive(Debug, Default, Deserialize)]
pub struct ProgrammeRaw {
    #[serde(rename = "@channel", default)]
    pub channel: String,
    #[serde(rename = "@start", default)]
    pub start: Option<String>,
    #[serde(rename = "@stop", default)]
    pub stop: Option<String>,
    #[serde(default)]
    pub title: Vec<TextNode>,
    #[serde(default)]
    pub desc: Vec<TextNode>,
}

impl ProgrammeRaw {
    pub fn title(&self) -> &str {
        self.title.first().map(|t| t.value.as_str()).unwrap_or_default()
    }

    pub fn description(&self) -> &str {
        self.desc.first().map(|d| d.value.as_str()).unwrap_or_default()
    }
}

/// Element whose only interesting content is its text (`lang` and other attributes are ignored).
/// Mixed content keeps only the leading text: `<title>A <i>b</i></title>` reads as `"A"`.
#[derive(Debug, Default, Deserialize)]
pub struct TextNode {
    #[serde(rename = "$text", default)]
    pub value: String,
}

/// Root `tv` element. `channel` and other children are ignored.
#[derive(Debug, Default, Deserialize)]
pub struct TvDocument {
    #[serde(rename = "programme", default)]
    pub programmes: Vec<ProgrammeRaw>,
}

/// ISO-8601 with millisecond precision, e.g. `2025-10-18T12:00:00.000Z`
fn serialize_instant<S: Serializer>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&value.to_rfc3339_opts(SecondsFormat::Millis, true))
}
