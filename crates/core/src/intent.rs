use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Confidence assigned when the classifier output cannot be trusted.
pub const FALLBACK_CONFIDENCE: f32 = 0.5;
pub const DEFAULT_MIN_CONFIDENCE: f32 = 0.4;

const RULE_CONFIDENCE: f32 = 0.8;
const WEAK_RULE_CONFIDENCE: f32 = 0.6;

const INFO_CUES: [&str; 7] = [
    "cho tôi biết về",
    "giới thiệu về",
    "thông tin về",
    "thông tin",
    "tell me about",
    "information about",
    "what is",
];

/// Well-known Hanoi landmarks with their common English names.
pub const KNOWN_LANDMARKS: [(&str, &[&str]); 7] = [
    ("Hồ Gươm", &["ho guom", "hoan kiem", "sword lake"]),
    ("Hồ Tây", &["ho tay", "west lake"]),
    ("Văn Miếu", &["van mieu", "temple of literature"]),
    ("Lăng Bác", &["lang bac", "ho chi minh mausoleum"]),
    ("Hoàng Thành", &["hoang thanh", "imperial citadel"]),
    ("Chùa Một Cột", &["chua mot cot", "one pillar pagoda"]),
    ("Đền Ngọc Sơn", &["den ngoc son", "ngoc son temple"]),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    SearchPlaces,
    NearbyLandmark,
    SemanticSearch,
    PlaceInfo,
    ComparePlaces,
    PlanItinerary,
    RecommendPlaces,
    Unknown,
}

impl Intent {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "search_places" => Some(Self::SearchPlaces),
            "nearby_landmark" => Some(Self::NearbyLandmark),
            "semantic_search" => Some(Self::SemanticSearch),
            "place_info" => Some(Self::PlaceInfo),
            "compare_places" => Some(Self::ComparePlaces),
            "plan_itinerary" => Some(Self::PlanItinerary),
            "recommend_places" => Some(Self::RecommendPlaces),
            "unknown" => Some(Self::Unknown),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::SearchPlaces => "search_places",
            Self::NearbyLandmark => "nearby_landmark",
            Self::SemanticSearch => "semantic_search",
            Self::PlaceInfo => "place_info",
            Self::ComparePlaces => "compare_places",
            Self::PlanItinerary => "plan_itinerary",
            Self::RecommendPlaces => "recommend_places",
            Self::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Locale {
    Vi,
    En,
}

impl Locale {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "vi" | "vi-vn" | "vietnamese" => Some(Self::Vi),
            "en" | "en-us" | "en-gb" | "english" => Some(Self::En),
            _ => None,
        }
    }

    pub fn as_code(self) -> &'static str {
        match self {
            Self::Vi => "vi",
            Self::En => "en",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct IntentEntities {
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default)]
    pub landmark_name: Option<String>,
    #[serde(default)]
    pub place_names: Vec<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub interests: Vec<String>,
    #[serde(default)]
    pub companions: Option<String>,
    #[serde(default)]
    pub duration_hours: Option<f64>,
    #[serde(default)]
    pub query_description: Option<String>,
    #[serde(default)]
    pub lat: Option<f64>,
    #[serde(default)]
    pub lon: Option<f64>,
    #[serde(default)]
    pub radius_meters: Option<f64>,
    #[serde(default)]
    pub budget_per_person: Option<u64>,
    #[serde(default)]
    pub num_people: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntentResult {
    pub intent: Intent,
    pub confidence: f32,
    pub entities: IntentEntities,
}

/// Wire shape a language model is asked to produce.
#[derive(Debug, Deserialize)]
struct RawClassification {
    intent: String,
    confidence: f32,
    #[serde(default)]
    entities: Option<RawEntities>,
}

#[derive(Debug, Default, Deserialize)]
struct RawEntities {
    #[serde(default)]
    categories: Vec<String>,
    #[serde(default)]
    landmark_name: Option<String>,
    #[serde(default)]
    place_name: Option<String>,
    #[serde(default)]
    place_names: Vec<String>,
    #[serde(default)]
    location: Option<String>,
    #[serde(default)]
    preferences: Option<RawPreferences>,
    #[serde(default)]
    duration_hours: Option<f64>,
    #[serde(default)]
    query_description: Option<String>,
    #[serde(default)]
    lat: Option<f64>,
    #[serde(default)]
    lon: Option<f64>,
    #[serde(default)]
    radius_meters: Option<f64>,
    #[serde(default)]
    budget: Option<u64>,
    #[serde(default)]
    num_people: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct RawPreferences {
    #[serde(default)]
    companions: Option<String>,
    #[serde(default)]
    interests: Vec<String>,
}

pub fn normalize_text(input: &str) -> String {
    input
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .trim()
        .to_string()
}

/// Vietnamese when the text carries Vietnamese-specific letters or tone marks.
pub fn detect_locale(explicit: Option<Locale>, text: &str) -> Locale {
    if let Some(locale) = explicit {
        return locale;
    }

    let vietnamese = text.chars().any(|ch| {
        matches!(ch, 'đ' | 'Đ' | 'ơ' | 'Ơ' | 'ư' | 'Ư' | 'ă' | 'Ă')
            || ('\u{1EA0}'..='\u{1EF9}').contains(&ch)
    });
    if vietnamese {
        Locale::Vi
    } else {
        Locale::En
    }
}

/// Intent used whenever classification cannot be trusted: a semantic search
/// over the whole message.
pub fn semantic_fallback(message: &str) -> IntentResult {
    IntentResult {
        intent: Intent::SemanticSearch,
        confidence: FALLBACK_CONFIDENCE,
        entities: IntentEntities {
            query_description: Some(message.trim().to_string()),
            ..IntentEntities::default()
        },
    }
}

/// Validates free-form classifier output. Markdown fences are stripped;
/// anything malformed, unknown or below `min_confidence` fails closed to
/// [`semantic_fallback`].
pub fn parse_classifier_output(raw: &str, message: &str, min_confidence: f32) -> IntentResult {
    let cleaned = strip_code_fences(raw);
    let value = match serde_json::from_str::<Value>(&cleaned) {
        Ok(value @ Value::Object(_)) => value,
        _ => return semantic_fallback(message),
    };
    let Ok(parsed) = serde_json::from_value::<RawClassification>(value) else {
        return semantic_fallback(message);
    };

    let intent = match Intent::parse(&parsed.intent) {
        Some(Intent::Unknown) | None => return semantic_fallback(message),
        Some(intent) => intent,
    };
    if !parsed.confidence.is_finite()
        || !(0.0..=1.0).contains(&parsed.confidence)
        || parsed.confidence < min_confidence
    {
        return semantic_fallback(message);
    }

    let mut entities = into_entities(parsed.entities.unwrap_or_default());
    if intent == Intent::SemanticSearch && entities.query_description.is_none() {
        entities.query_description = Some(message.trim().to_string());
    }

    IntentResult {
        intent,
        confidence: parsed.confidence,
        entities,
    }
}

fn strip_code_fences(raw: &str) -> String {
    raw.replace("```json", "")
        .replace("```JSON", "")
        .replace("```", "")
        .trim()
        .to_string()
}

fn into_entities(raw: RawEntities) -> IntentEntities {
    let preferences = raw.preferences.unwrap_or_default();
    let mut place_names = clean_list(raw.place_names);
    if let Some(name) = non_blank(raw.place_name) {
        if !place_names.contains(&name) {
            place_names.insert(0, name);
        }
    }

    IntentEntities {
        categories: clean_list(raw.categories)
            .into_iter()
            .map(|category| category.to_lowercase())
            .collect(),
        landmark_name: non_blank(raw.landmark_name),
        place_names,
        location: non_blank(raw.location),
        interests: clean_list(preferences.interests),
        companions: non_blank(preferences.companions),
        duration_hours: raw.duration_hours.filter(|hours| hours.is_finite() && *hours >= 0.0),
        query_description: non_blank(raw.query_description),
        lat: raw.lat.filter(|value| value.is_finite()),
        lon: raw.lon.filter(|value| value.is_finite()),
        radius_meters: raw.radius_meters.filter(|value| value.is_finite() && *value > 0.0),
        budget_per_person: raw.budget,
        num_people: raw.num_people.filter(|people| *people > 0),
    }
}

fn clean_list(values: Vec<String>) -> Vec<String> {
    values
        .into_iter()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .collect()
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Offline keyword classifier for Vietnamese and English messages.
pub fn classify_intent_rules(text: &str) -> IntentResult {
    let normalized = normalize_text(text);
    if normalized.is_empty() {
        return IntentResult {
            intent: Intent::Unknown,
            confidence: 0.0,
            entities: IntentEntities::default(),
        };
    }

    let lower = normalized.to_lowercase();
    let place_names = extract_place_names(&normalized);
    let entities = IntentEntities {
        categories: extract_categories(&lower),
        landmark_name: extract_landmark(&normalized),
        interests: extract_interests(&lower),
        duration_hours: extract_duration_hours(&lower),
        radius_meters: extract_radius_meters(&lower),
        budget_per_person: extract_budget(&lower),
        num_people: extract_people(&lower),
        place_names,
        ..IntentEntities::default()
    };

    let (intent, confidence) = if contains_any(&lower, &["so sánh", "compare", "khác nhau", " vs ", "versus"])
        || (entities.place_names.len() >= 2 && contains_any(&lower, &[" hay ", " or "]))
    {
        (Intent::ComparePlaces, RULE_CONFIDENCE)
    } else if contains_any(
        &lower,
        &["lịch trình", "kế hoạch", "itinerary", "plan a", "plan my", "day trip", "lịch đi chơi"],
    ) {
        (Intent::PlanItinerary, RULE_CONFIDENCE)
    } else if contains_any(&lower, &INFO_CUES) {
        (Intent::PlaceInfo, RULE_CONFIDENCE)
    } else if contains_any(&lower, &["gợi ý", "đề xuất", "recommend", "suggest", "phù hợp"]) {
        (Intent::RecommendPlaces, RULE_CONFIDENCE)
    } else if entities.landmark_name.is_some()
        && (!entities.categories.is_empty()
            || contains_any(&lower, &["gần", "xung quanh", "quanh", "near", "around"]))
    {
        (Intent::NearbyLandmark, RULE_CONFIDENCE)
    } else if !entities.categories.is_empty()
        && contains_any(
            &lower,
            &["lãng mạn", "view", "đẹp", "yên tĩnh", "hẹn hò", "romantic", "quiet", "cozy", "beautiful"],
        )
    {
        (Intent::SemanticSearch, WEAK_RULE_CONFIDENCE)
    } else if !entities.categories.is_empty() {
        (Intent::SearchPlaces, RULE_CONFIDENCE)
    } else {
        (Intent::SemanticSearch, FALLBACK_CONFIDENCE)
    };

    let mut entities = entities;
    if matches!(intent, Intent::SemanticSearch | Intent::RecommendPlaces) {
        entities.query_description = Some(normalized.clone());
    }
    if intent == Intent::PlaceInfo && entities.place_names.is_empty() {
        entities.place_names.push(strip_info_cues(&normalized));
    }

    IntentResult {
        intent,
        confidence,
        entities,
    }
}

/// First known landmark mentioned in the text, by its Vietnamese name.
pub fn extract_landmark(text: &str) -> Option<String> {
    extract_place_names(text).into_iter().next()
}

/// Known landmarks mentioned in the text, in order of appearance.
pub fn extract_place_names(text: &str) -> Vec<String> {
    let lower = text.to_lowercase();
    let mut found = KNOWN_LANDMARKS
        .iter()
        .filter_map(|(name, aliases)| {
            std::iter::once(*name)
                .chain(aliases.iter().copied())
                .filter_map(|candidate| lower.find(&candidate.to_lowercase()))
                .min()
                .map(|position| (position, name.to_string()))
        })
        .collect::<Vec<_>>();
    found.sort();
    found.into_iter().map(|(_, name)| name).collect()
}

fn extract_categories(lower: &str) -> Vec<String> {
    const CATEGORY_CUES: [(&str, &[&str]); 13] = [
        ("cafe", &["cafe", "cà phê", "coffee", "quán cà phê"]),
        ("restaurant", &["nhà hàng", "restaurant", "quán ăn"]),
        ("street_food", &["ăn vặt", "street food", "đồ ăn đường phố"]),
        ("hotel", &["khách sạn", "hotel"]),
        ("hostel", &["hostel", "nhà nghỉ"]),
        ("museum", &["bảo tàng", "museum"]),
        ("temple", &["chùa", "đền", "temple", "pagoda"]),
        ("park", &["công viên", "park"]),
        ("market", &["chợ", "market"]),
        ("shopping_mall", &["trung tâm thương mại", "shopping mall", "mall"]),
        ("bar", &["quán bar", "bar", "pub", "bia"]),
        ("spa", &["spa", "massage"]),
        ("cinema", &["rạp chiếu phim", "cinema", "movie"]),
    ];

    CATEGORY_CUES
        .iter()
        .filter(|(_, cues)| cues.iter().any(|cue| contains_term(lower, cue)))
        .map(|(category, _)| category.to_string())
        .collect()
}

fn extract_interests(lower: &str) -> Vec<String> {
    const INTEREST_CUES: [(&str, &[&str]); 6] = [
        ("food", &["ẩm thực", "ăn uống", "food", "eat"]),
        ("culture", &["văn hóa", "lịch sử", "culture", "history", "historical"]),
        ("shopping", &["mua sắm", "shopping"]),
        ("nature", &["thiên nhiên", "nature", "outdoor"]),
        ("nightlife", &["về đêm", "nightlife"]),
        ("relax", &["thư giãn", "relax"]),
    ];

    INTEREST_CUES
        .iter()
        .filter(|(_, cues)| cues.iter().any(|cue| contains_term(lower, cue)))
        .map(|(interest, _)| interest.to_string())
        .collect()
}

fn extract_duration_hours(lower: &str) -> Option<f64> {
    if contains_any(lower, &["1 ngày", "một ngày", "cả ngày", "full day", "one day", "1 day"]) {
        return Some(8.0);
    }
    if contains_any(lower, &["nửa ngày", "half day", "half a day"]) {
        return Some(4.0);
    }
    number_with_unit(lower, &["giờ", "tiếng", "h", "hours", "hour", "hrs"])
}

fn extract_radius_meters(lower: &str) -> Option<f64> {
    number_with_unit(lower, &["km", "kilomet", "kilometers"])
        .map(|km| km * 1_000.0)
        .or_else(|| number_with_unit(lower, &["m", "mét", "meters"]))
}

fn extract_budget(lower: &str) -> Option<u64> {
    if !contains_any(lower, &["ngân sách", "budget", "dưới", "under", "không quá", "tối đa"]) {
        return None;
    }
    lower.split_whitespace().find_map(|token| {
        let token = token.trim_matches(|ch: char| !ch.is_alphanumeric());
        let thousands = token
            .strip_suffix('k')
            .and_then(|number| number.parse::<u64>().ok())
            .map(|number| number * 1_000);
        thousands.or_else(|| {
            let digits = token
                .trim_end_matches("vnd")
                .trim_end_matches('đ')
                .replace(['.', ','], "");
            digits.parse::<u64>().ok().filter(|amount| *amount >= 1_000)
        })
    })
}

fn extract_people(lower: &str) -> Option<u32> {
    number_with_unit(lower, &["người", "people", "persons", "pax", "adults"])
        .filter(|count| *count >= 1.0 && count.fract() == 0.0)
        .map(|count| count as u32)
}

/// Finds `<number> <unit>` or `<number><unit>` for any of the units.
fn number_with_unit(lower: &str, units: &[&str]) -> Option<f64> {
    let tokens = lower
        .split_whitespace()
        .map(|token| token.trim_matches(|ch: char| matches!(ch, ',' | '.' | '?' | '!' | '(' | ')')))
        .collect::<Vec<_>>();

    for (index, token) in tokens.iter().enumerate() {
        if let Some(number) = parse_number(token) {
            if tokens.get(index + 1).is_some_and(|next| units.contains(next)) {
                return Some(number);
            }
            continue;
        }
        for unit in units {
            if let Some(number) = token.strip_suffix(unit).and_then(parse_number) {
                return Some(number);
            }
        }
    }
    None
}

fn parse_number(token: &str) -> Option<f64> {
    if token.is_empty() || !token.starts_with(|ch: char| ch.is_ascii_digit()) {
        return None;
    }
    token
        .replace(',', ".")
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
}

fn strip_info_cues(text: &str) -> String {
    let lower = text.to_lowercase();
    // byte offsets from the lowercased copy only apply when lengths agree
    if lower.len() == text.len() {
        for cue in INFO_CUES {
            let Some(index) = lower.find(cue) else {
                continue;
            };
            let rest = text
                .get(index + cue.len()..)
                .map(|rest| normalize_text(rest.trim_matches(|ch: char| ch.is_whitespace() || ch == '?')))
                .unwrap_or_default();
            if !rest.is_empty() {
                return rest;
            }
        }
    }
    text.to_string()
}

/// ASCII single words must match a whole word; phrases and accented terms
/// match as substrings.
fn contains_term(lower: &str, term: &str) -> bool {
    if term.is_ascii() && !term.contains(' ') {
        lower
            .split(|ch: char| !ch.is_alphanumeric())
            .any(|word| word == term)
    } else {
        lower.contains(term)
    }
}

fn contains_any(input: &str, needles: &[&str]) -> bool {
    needles.iter().any(|needle| input.contains(needle))
}
