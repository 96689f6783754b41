pub mod log;
pub mod telegram;

use crate::domain::entities::content_item::ContentItem;
use crate::domain::entities::prediction::Prediction;
use crate::domain::values::sentiment::SentimentDirection;

/// Plain-text alert body shared by every notifier.
pub fn render_message(item: &ContentItem, predictions: &[Prediction]) -> String {
    let mut lines = vec![format!(
        "[{}] {}",
        item.ticker.as_deref().unwrap_or("-"),
        item.title
    )];
    for p in predictions {
        let arrow = match p.sentiment_direction {
            SentimentDirection::Positive => "▲",
            SentimentDirection::Negative => "▼",
            SentimentDirection::Neutral => "■",
        };
        lines.push(format!(
            "{arrow} {} ({:+.2}) impact={} urgency={} relevance={:.2}",
            p.sentiment_direction, p.sentiment_score, p.impact_level, p.urgency_level, p.relevance_score
        ));
        if !p.reasoning.is_empty() {
            lines.push(p.reasoning.clone());
        }
    }
    lines.push(format!("{} · {}", item.source, item.published_at.format("%Y-%m-%d %H:%M UTC")));
    if let Some(url) = &item.url {
        lines.push(url.clone());
    }
    lines.join("\n")
}
