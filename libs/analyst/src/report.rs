use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

const FALLBACK_SUMMARY_CHARS: usize = 200;
const FALLBACK_IMPORTANCE: u8 = 5;

/// Strip an optional ```json fence and parse the object inside.
pub fn parse_json_reply<T: DeserializeOwned>(reply: &str) -> Option<T> {
    let body = unfence(reply);
    if let Ok(parsed) = serde_json::from_str(body) {
        return Some(parsed);
    }

    // models sometimes wrap the object in prose
    let start = body.find('{')?;
    let end = body.rfind('}')?;
    if end <= start {
        return None;
    }
    serde_json::from_str(&body[start..=end]).ok()
}

fn unfence(reply: &str) -> &str {
    let trimmed = reply.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.rsplit_once("```").map_or(rest, |(body, _)| body).trim()
}

/// Accepts either a plain string or an object with a text-ish field.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Text(pub String);

impl<'de> Deserialize<'de> for Text {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        Ok(Text(flatten(&value)))
    }
}

fn flatten(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        Value::Object(map) => {
            for key in ["point", "action", "text", "direction", "reasoning"] {
                if let Some(Value::String(s)) = map.get(key) {
                    return s.clone();
                }
            }
            value.to_string()
        }
        other => other.to_string(),
    }
}

fn lenient_score<'de, D>(deserializer: D) -> Result<u8, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    let score = match value {
        Value::Number(n) => n.as_f64().unwrap_or(0.0),
        Value::String(s) => s.trim().parse().unwrap_or(0.0),
        _ => 0.0,
    };
    Ok(score.round().clamp(0.0, 10.0) as u8)
}

/// `null` reads as the field's default.
fn nullable<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn lenient_sentiment<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let sentiment: Option<String> = Option::deserialize(deserializer)?;
    Ok(sentiment
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(neutral))
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ImpactField {
    Detailed(PriceImpact),
    Plain(String),
}

fn lenient_impact<'de, D>(deserializer: D) -> Result<Option<PriceImpact>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let impact = match Option::<ImpactField>::deserialize(deserializer)? {
        Some(ImpactField::Detailed(impact)) => Some(impact),
        Some(ImpactField::Plain(direction)) => Some(PriceImpact {
            direction,
            ..Default::default()
        }),
        None => None,
    };
    Ok(impact)
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct PriceImpact {
    #[serde(default, deserialize_with = "nullable")]
    pub direction: String,
    #[serde(default, deserialize_with = "nullable")]
    pub magnitude: String,
    #[serde(default, deserialize_with = "nullable")]
    pub reasoning: String,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct Recommendation {
    #[serde(default, deserialize_with = "nullable")]
    pub action: String,
    #[serde(default, deserialize_with = "nullable")]
    pub confidence: String,
    #[serde(default, deserialize_with = "nullable")]
    pub reasoning: String,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum RecommendationField {
    Detailed(Recommendation),
    Plain(String),
}

/// Scored news analysis.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct NewsAnalysis {
    #[serde(default, deserialize_with = "lenient_score")]
    pub importance_score: u8,
    #[serde(default = "neutral", deserialize_with = "lenient_sentiment")]
    pub sentiment: String,
    #[serde(default, alias = "news_summary", deserialize_with = "nullable")]
    pub summary: String,
    #[serde(default, deserialize_with = "nullable")]
    pub key_points: Vec<Text>,
    #[serde(default, deserialize_with = "lenient_impact")]
    pub price_impact: Option<PriceImpact>,
    #[serde(default)]
    pub recommendation: Option<RecommendationField>,
    #[serde(default, deserialize_with = "nullable")]
    pub catalysts: Vec<Text>,
}

fn neutral() -> String {
    "neutral".to_string()
}

impl NewsAnalysis {
    /// Analysis used when there is nothing to analyze.
    pub fn quiet() -> Self {
        Self {
            importance_score: 0,
            sentiment: neutral(),
            summary: "No recent news found.".to_string(),
            ..Default::default()
        }
    }

    /// Read a model reply; anything unparseable becomes a mid-importance
    /// free-text summary.
    pub fn from_reply(reply: &str) -> Self {
        parse_json_reply(reply).unwrap_or_else(|| Self {
            importance_score: FALLBACK_IMPORTANCE,
            sentiment: neutral(),
            summary: reply.trim().chars().take(FALLBACK_SUMMARY_CHARS).collect(),
            ..Default::default()
        })
    }

    pub fn action(&self) -> Option<&str> {
        let action = match self.recommendation.as_ref()? {
            RecommendationField::Detailed(r) => r.action.as_str(),
            RecommendationField::Plain(s) => s.as_str(),
        };
        (!action.trim().is_empty()).then_some(action)
    }
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct Answer {
    #[serde(default, deserialize_with = "nullable")]
    pub answer: String,
    #[serde(default, deserialize_with = "nullable")]
    pub detailed_explanation: String,
    #[serde(default, deserialize_with = "nullable")]
    pub key_takeaways: Vec<Text>,
    #[serde(default, deserialize_with = "nullable")]
    pub related_risks: Vec<Text>,
    #[serde(default, deserialize_with = "nullable")]
    pub suggested_follow_up: String,
    #[serde(default, deserialize_with = "nullable")]
    pub confidence: String,
}

impl Answer {
    /// Unparseable replies are relayed verbatim.
    pub fn from_reply(reply: &str) -> Self {
        match parse_json_reply::<Answer>(reply) {
            Some(answer) if !answer.answer.trim().is_empty() => answer,
            _ => Self {
                answer: reply.trim().to_string(),
                ..Default::default()
            },
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct DeepDive {
    #[serde(default, deserialize_with = "nullable")]
    pub topic: String,
    #[serde(default, deserialize_with = "nullable")]
    pub overview: String,
    #[serde(default, deserialize_with = "nullable")]
    pub key_points: Vec<Text>,
    #[serde(default, deserialize_with = "nullable")]
    pub bull_case: String,
    #[serde(default, deserialize_with = "nullable")]
    pub bear_case: String,
    #[serde(default, deserialize_with = "nullable")]
    pub timeline: String,
    #[serde(default, deserialize_with = "nullable")]
    pub catalysts: Vec<Text>,
    #[serde(default, deserialize_with = "nullable")]
    pub metrics_to_watch: Vec<Text>,
    #[serde(default, deserialize_with = "nullable")]
    pub investor_action: String,
    #[serde(default, deserialize_with = "nullable")]
    pub confidence: String,
}

impl DeepDive {
    pub fn from_reply(topic: &str, reply: &str) -> Self {
        let mut dive = match parse_json_reply::<DeepDive>(reply) {
            Some(dive) if !dive.overview.trim().is_empty() => dive,
            _ => Self {
                overview: reply.trim().to_string(),
                ..Default::default()
            },
        };
        if dive.topic.trim().is_empty() {
            dive.topic = topic.to_string();
        }
        dive
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fenced_json_parses() {
        let reply = "```json\n{\"importance_score\": 8, \"sentiment\": \"bullish\", \"news_summary\": \"beat\"}\n```";
        let a = NewsAnalysis::from_reply(reply);
        assert_eq!(a.importance_score, 8);
        assert_eq!(a.sentiment, "bullish");
        assert_eq!(a.summary, "beat");
    }

    #[test]
    fn json_inside_prose_parses() {
        let reply = "Here you go: {\"importance_score\": \"7\", \"key_points\": [{\"point\": \"a\"}, \"b\"]} hope it helps";
        let a = NewsAnalysis::from_reply(reply);
        assert_eq!(a.importance_score, 7);
        assert_eq!(a.key_points, vec![Text("a".into()), Text("b".into())]);
    }

    #[test]
    fn non_json_degrades_to_text() {
        let a = NewsAnalysis::from_reply("The stock looks fine.");
        assert_eq!(a.importance_score, 5);
        assert_eq!(a.summary, "The stock looks fine.");

        let answer = Answer::from_reply("Plain words.");
        assert_eq!(answer.answer, "Plain words.");

        let dive = DeepDive::from_reply("risks", "Some prose");
        assert_eq!(dive.topic, "risks");
        assert_eq!(dive.overview, "Some prose");
    }

    #[test]
    fn recommendation_object_or_string() {
        let a = NewsAnalysis::from_reply(r#"{"recommendation": {"action": "buy", "confidence": "high"}}"#);
        assert_eq!(a.action(), Some("buy"));

        let a = NewsAnalysis::from_reply(r#"{"recommendation": "hold"}"#);
        assert_eq!(a.action(), Some("hold"));

        let a = NewsAnalysis::from_reply(r#"{"importance_score": 42}"#);
        assert_eq!(a.importance_score, 10);
        assert_eq!(a.action(), None);
    }

    #[test]
    fn nulls_and_plain_impact_keep_the_score() {
        let a = NewsAnalysis::from_reply(
            r#"{"importance_score": 9, "sentiment": null, "summary": "Big deal", "key_points": null, "recommendation": null}"#,
        );
        assert_eq!(a.importance_score, 9);
        assert_eq!(a.sentiment, "neutral");
        assert_eq!(a.summary, "Big deal");
        assert!(a.key_points.is_empty());

        let a = NewsAnalysis::from_reply(
            r#"{"importance_score": 8, "price_impact": "positive", "catalysts": [null, "guidance"]}"#,
        );
        assert_eq!(a.importance_score, 8);
        assert_eq!(a.price_impact.map(|p| p.direction).as_deref(), Some("positive"));
        assert_eq!(a.catalysts, vec![Text(String::new()), Text("guidance".into())]);

        let answer = Answer::from_reply(r#"{"answer": "Yes", "detailed_explanation": null}"#);
        assert_eq!(answer.answer, "Yes");
        assert!(answer.detailed_explanation.is_empty());

        let dive = DeepDive::from_reply("ai", r#"{"overview": "Strong", "bull_case": null}"#);
        assert_eq!(dive.overview, "Strong");
        assert_eq!(dive.topic, "ai");
    }
}
