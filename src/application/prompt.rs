//! Prompt construction for per-item predictions and per-ticker reports.

use crate::application::embed::SimilarItem;
use crate::domain::entities::content_item::ContentItem;
use crate::domain::entities::market_data::PriceChanges;
use crate::domain::entities::prediction::Prediction;
use crate::domain::values::market_calendar::to_kst;
use std::fmt::Write;

pub const PREDICTION_SYSTEM_PROMPT: &str = "당신은 한국 주식시장 뉴스의 주가 영향을 분석하는 애널리스트입니다. \
반드시 요청된 JSON 형식으로만 답하세요.";

pub const REPORT_SYSTEM_PROMPT: &str = "당신은 한국 주식 종목 리포트를 작성하는 애널리스트입니다. \
반드시 요청된 JSON 형식으로만 답하세요.";

const SIMILAR_BODY_CHARS: usize = 150;

fn truncate_chars(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        format!("{}...", text.chars().take(max).collect::<String>())
    }
}

fn fmt_change(v: Option<f64>) -> String {
    v.map(|x| format!("{x:+.2}%")).unwrap_or_else(|| "N/A".to_string())
}

/// Mean change per horizon across neighbours that have data for it.
fn pattern_stats(similar: &[SimilarItem]) -> Vec<(i64, f64, usize)> {
    PriceChanges::HORIZONS
        .iter()
        .filter_map(|&d| {
            let values: Vec<f64> = similar
                .iter()
                .filter_map(|s| s.price_changes.as_ref()?.get(d))
                .collect();
            if values.is_empty() {
                None
            } else {
                Some((d, values.iter().sum::<f64>() / values.len() as f64, values.len()))
            }
        })
        .collect()
}

pub fn build_prediction_prompt(
    item: &ContentItem,
    ticker_code: &str,
    ticker_name: &str,
    base_price: Option<f64>,
    similar: &[SimilarItem],
) -> String {
    let mut p = String::new();
    let _ = writeln!(p, "## 분석 대상 뉴스");
    let _ = writeln!(p, "**종목**: {ticker_name} ({ticker_code})");
    let _ = writeln!(p, "**제목**: {}", item.title);
    let _ = writeln!(p, "**내용**: {}", item.body);
    let _ = writeln!(p, "**출처**: {}", item.source);
    let _ = writeln!(p, "**발표일시**: {}", to_kst(item.published_at).format("%Y-%m-%d %H:%M"));
    match base_price {
        Some(price) => {
            let _ = writeln!(p, "**현재가**: {price:.0}원");
        }
        None => {
            let _ = writeln!(p, "**현재가**: 정보 없음");
        }
    }

    let _ = writeln!(p, "\n## 유사 과거 뉴스 ({}건)", similar.len());
    if similar.is_empty() {
        let _ = writeln!(p, "유사 뉴스 없음");
    } else {
        let _ = writeln!(p, "| # | 유사도 | 발표일 | 제목 | T+1 | T+2 | T+3 | T+5 | T+10 | T+20 |");
        let _ = writeln!(p, "|---|---|---|---|---|---|---|---|---|---|");
        for (i, s) in similar.iter().enumerate() {
            let c = s.price_changes.clone().unwrap_or_default();
            let _ = writeln!(
                p,
                "| {} | {:.1}% | {} | {} | {} | {} | {} | {} | {} | {} |",
                i + 1,
                s.similarity * 100.0,
                to_kst(s.item.published_at).format("%Y-%m-%d"),
                truncate_chars(&s.item.title, SIMILAR_BODY_CHARS),
                fmt_change(c.d1),
                fmt_change(c.d2),
                fmt_change(c.d3),
                fmt_change(c.d5),
                fmt_change(c.d10),
                fmt_change(c.d20),
            );
        }
        let stats = pattern_stats(similar);
        if !stats.is_empty() {
            let _ = writeln!(p, "\n**유사 뉴스 패턴 평균**:");
            for (d, avg, n) in stats {
                let _ = writeln!(p, "- T+{d}일: 평균 {avg:+.2}% ({n}건)");
            }
        }
    }

    p.push_str(
        r#"
## 응답 형식
다음 JSON 객체 하나만 출력하세요.
```json
{
  "sentiment_direction": "positive | negative | neutral",
  "sentiment_score": -1.0 ~ 1.0,
  "impact_level": "low | medium | high | critical",
  "relevance_score": 0.0 ~ 1.0,
  "urgency_level": "routine | notable | urgent | breaking",
  "impact_analysis": {
    "business_impact": "사업 영향",
    "market_sentiment": "시장 심리",
    "industry_impact": "산업 영향",
    "investment_perspective": "투자 관점"
  },
  "reasoning": "판단 근거"
}
```
sentiment_score의 부호는 sentiment_direction과 일치해야 합니다."#,
    );
    p
}

pub fn build_report_prompt(
    ticker_code: &str,
    ticker_name: &str,
    base_price: Option<f64>,
    predictions: &[(Prediction, String)],
) -> String {
    let mut p = String::new();
    let _ = writeln!(p, "## 종목: {ticker_name} ({ticker_code})");
    match base_price {
        Some(price) => {
            let _ = writeln!(p, "**현재가**: {price:.0}원");
        }
        None => {
            let _ = writeln!(p, "**현재가**: 정보 없음");
        }
    }
    let _ = writeln!(p, "\n## 최근 7일 뉴스 영향 분석 ({}건)", predictions.len());
    for (pred, title) in predictions {
        let _ = writeln!(
            p,
            "- [{}] {} | 감성 {} ({:+.2}) | 영향 {} | {}",
            to_kst(pred.created_at).format("%m-%d %H:%M"),
            title,
            pred.sentiment_direction,
            pred.sentiment_score,
            pred.impact_level,
            truncate_chars(&pred.reasoning, 120),
        );
    }
    p.push_str(
        r#"
## 응답 형식
다음 JSON 객체 하나만 출력하세요. 가격은 원 단위 숫자입니다.
```json
{
  "overall_summary": "종합 요약",
  "short_term_scenario": "1주 시나리오",
  "medium_term_scenario": "1개월 시나리오",
  "long_term_scenario": "3개월 이상 시나리오",
  "risk_factors": ["위험 요인"],
  "opportunity_factors": ["기회 요인"],
  "recommendation": "매수 | 보유 | 매도",
  "price_targets": {
    "base_price": 0,
    "short_term_target": 0,
    "short_term_support": 0,
    "medium_term_target": 0,
    "medium_term_support": 0,
    "long_term_target": 0
  }
}
```"#,
    );
    p
}
