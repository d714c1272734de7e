use serde_json::Value;
use wayfinder_core::{NarrativeError, NarrativeGenerator};

const LISTED_PLACES: usize = 5;

/// Deterministic narrator that summarises the structured chat context. Used
/// as the default generator and as the fallback when another one fails.
#[derive(Debug, Default, Clone, Copy)]
pub struct TemplateNarrator;

impl TemplateNarrator {
    pub fn render(&self, context: &Value) -> String {
        let vi = context["locale"].as_str() != Some("en");
        let payload = &context["payload"];

        match payload["kind"].as_str() {
            Some("places") => render_places(&payload["result"], vi),
            Some("itinerary") => render_itinerary(&payload["plan"], vi),
            Some("comparison") => render_comparison(payload, vi),
            Some("clarification") => payload["question"].as_str().unwrap_or_default().to_string(),
            _ => pick(vi, "Mình chưa có kết quả nào.", "I have nothing to show yet.").to_string(),
        }
    }
}

impl NarrativeGenerator for TemplateNarrator {
    async fn generate(&self, _prompt: &str, context: &Value) -> Result<String, NarrativeError> {
        if !context.is_object() {
            return Err(NarrativeError::Failed("context must be an object".to_string()));
        }
        Ok(self.render(context))
    }
}

fn pick<'a>(vi: bool, vietnamese: &'a str, english: &'a str) -> &'a str {
    if vi {
        vietnamese
    } else {
        english
    }
}

fn render_places(result: &Value, vi: bool) -> String {
    let candidates = result["candidates"].as_array().map(Vec::as_slice).unwrap_or_default();
    if candidates.is_empty() {
        return pick(vi, "Không tìm thấy địa điểm phù hợp.", "No matching places found.").to_string();
    }

    let mut lines = Vec::with_capacity(candidates.len().min(LISTED_PLACES) + 1);
    let heading = match result["landmark"]["name"].as_str() {
        Some(landmark) if vi => format!("Tìm thấy {} địa điểm gần {landmark}:", candidates.len()),
        Some(landmark) => format!("Found {} places near {landmark}:", candidates.len()),
        None if vi => format!("Tìm thấy {} địa điểm:", candidates.len()),
        None => format!("Found {} places:", candidates.len()),
    };
    lines.push(heading);

    for (index, place) in candidates.iter().take(LISTED_PLACES).enumerate() {
        let mut line = format!("{}. {}", index + 1, place["name"].as_str().unwrap_or("?"));
        let mut details = Vec::new();
        if let Some(meters) = place["distance_meters"].as_f64() {
            details.push(format_distance(meters));
        }
        if let Some(tier) = place["price_estimate"]["tier"].as_str() {
            details.push(tier.to_string());
        }
        match place["open_state"].as_str() {
            Some("open") => details.push(pick(vi, "đang mở cửa", "open now").to_string()),
            Some("closed") => details.push(pick(vi, "đang đóng cửa", "closed now").to_string()),
            _ => {}
        }
        if !details.is_empty() {
            line.push_str(&format!(" ({})", details.join(", ")));
        }
        lines.push(line);
    }

    if result["unavailable_sources"]
        .as_array()
        .is_some_and(|sources| !sources.is_empty())
    {
        lines.push(
            pick(
                vi,
                "Một số nguồn dữ liệu tạm thời không khả dụng, kết quả có thể chưa đầy đủ.",
                "Some data sources were unavailable, so results may be incomplete.",
            )
            .to_string(),
        );
    }

    lines.join("\n")
}

fn render_itinerary(plan: &Value, vi: bool) -> String {
    let stops = plan["stops"].as_array().map(Vec::as_slice).unwrap_or_default();
    if stops.is_empty() {
        return pick(vi, "Lịch trình trống.", "The itinerary is empty.").to_string();
    }

    let total = plan["total_duration_minutes"].as_u64().unwrap_or_default();
    let mut lines = vec![if vi {
        format!("Lịch trình {} điểm dừng, khoảng {total} phút:", stops.len())
    } else {
        format!("Itinerary with {} stops, about {total} minutes:", stops.len())
    }];

    for (index, stop) in stops.iter().enumerate() {
        let name = stop["place"]["name"].as_str().unwrap_or("?");
        let when = match stop["arrival_time"].as_str() {
            Some(time) => time.chars().take(5).collect::<String>(),
            None => format!("+{}'", stop["arrival_offset_minutes"].as_u64().unwrap_or_default()),
        };
        lines.push(format!("{}. {when} {name}", index + 1));
    }

    let cost = &plan["cost"];
    if let (Some(avg), Some(currency)) = (
        cost["per_person"]["avg"].as_u64(),
        cost["currency"].as_str(),
    ) {
        lines.push(if vi {
            format!("Chi phí ước tính: {} {currency}/người.", format_amount(avg))
        } else {
            format!("Estimated cost: {} {currency} per person.", format_amount(avg))
        });
    }

    lines.join("\n")
}

fn render_comparison(payload: &Value, vi: bool) -> String {
    let entries = payload["comparison"]["entries"]
        .as_array()
        .map(Vec::as_slice)
        .unwrap_or_default();
    let mut lines = vec![pick(vi, "So sánh chi phí:", "Price comparison:").to_string()];

    for entry in entries {
        let name = entry["name"].as_str().unwrap_or("?");
        let avg = format_amount(entry["avg_cost"].as_u64().unwrap_or_default());
        let tier = entry["tier"].as_str().unwrap_or_default();
        let note = match entry["note"].as_str() {
            Some("most_affordable") => pick(vi, " (rẻ nhất)", " (most affordable)"),
            Some("most_expensive") => pick(vi, " (đắt nhất)", " (most expensive)"),
            _ => "",
        };
        lines.push(format!(
            "{}. {name}: ~{avg} {tier}{note}",
            entry["rank"].as_u64().unwrap_or_default()
        ));
    }

    let unresolved = payload["unresolved"]
        .as_array()
        .map(|names| names.iter().filter_map(Value::as_str).collect::<Vec<_>>())
        .unwrap_or_default();
    if !unresolved.is_empty() {
        lines.push(format!(
            "{} {}",
            pick(vi, "Không tìm thấy:", "Not found:"),
            unresolved.join(", ")
        ));
    }

    lines.join("\n")
}

fn format_distance(meters: f64) -> String {
    if meters >= 1_000.0 {
        format!("{:.1} km", meters / 1_000.0)
    } else {
        format!("{} m", meters.round() as u64)
    }
}

/// Thousands grouped with dots, as prices are written in Vietnam.
fn format_amount(amount: u64) -> String {
    let digits = amount.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (index, ch) in digits.chars().enumerate() {
        if index > 0 && (digits.len() - index) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(ch);
    }
    grouped
}
