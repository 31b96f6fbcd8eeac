// SPDX-License-Identifier: MIT

//! Pattern-table field extraction
//!
//! Last tier of the chain: pulls entity, document type, and date out of
//! extracted text (or the filename when there is no text) with fixed regex
//! tables. Always available, never calls out.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;

use super::{DocumentAnalyzer, Tier, Verdict};
use crate::extract::{ExtractedContent, SourceDocument};

/// Canonical document types with their trigger keywords, in priority order.
/// The first canonical whose keyword appears wins.
const DOC_TYPE_TABLE: &[(&str, &[&str])] = &[
    ("临时开放日公告", &["临时开放日公告", "开放日公告", "开放公告"]),
    ("打款凭证", &["打款凭证", "付款凭证", "汇款回单", "转账回单"]),
    ("基本信息表", &["基本信息表", "信息表"]),
    ("确认函", &["确认函", "确认书"]),
    ("合同", &["合同", "协议"]),
    ("说明书", &["说明书", "产品说明书", "募集说明书"]),
    ("年度报告", &["年度报告", "年报"]),
    ("季度报告", &["季度报告", "季报"]),
    ("月度报告", &["月度报告", "月报"]),
];

/// Phone camera exports carry this prefix and are overwhelmingly payment
/// screenshots in this domain.
const CAMERA_EXPORT_MARKER: &str = "微信图片";
const CAMERA_EXPORT_TYPE: &str = "打款凭证";

/// Numeric dates, separators optional so compact YYYYMMDD also matches.
static DATE_NUMERIC: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"((?:19|20)\d{2})[./-]?\s?(0?[1-9]|1[0-2])[./-]?\s?(0?[1-9]|[12]\d|3[01])")
        .expect("date regex")
});

/// Chinese-style dates, 2025年8月22日.
static DATE_CHINESE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"((?:19|20)\d{2})年\s*(0?[1-9]|1[0-2])月\s*(0?[1-9]|[12]\d|3[01])日?")
        .expect("date regex")
});

/// Fund names with optional series/tranche markers, lazy head so the suffix
/// anchors the match.
static FUND_NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[一-龥A-Za-z0-9]+?(?:\d+号)?(?:\d+期)?(?:私募(?:证券)?投资)?基金")
        .expect("fund regex")
});

/// Anything ending in 基金, the loosest fund form.
static FUND_NAME_LOOSE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[一-龥A-Za-z0-9]+基金").expect("fund regex"));

/// Asset/fund management companies.
static MANAGEMENT_COMPANY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"[一-龥A-Za-z0-9]{2,30}(?:投资管理|资产管理|基金管理)(?:有限公司|股份公司|有限责任公司)",
    )
    .expect("company regex")
});

/// General company names, tried last.
static GENERAL_COMPANY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[一-龥A-Za-z0-9]{2,30}(?:有限公司|股份公司|有限责任公司)")
        .expect("company regex")
});

/// Extract a date from `text`, normalized to YYYYMMDD.
pub fn extract_date(text: &str) -> Option<String> {
    for pattern in [&*DATE_NUMERIC, &*DATE_CHINESE] {
        if let Some(caps) = pattern.captures(text) {
            let year = &caps[1];
            let month: u32 = caps[2].parse().ok()?;
            let day: u32 = caps[3].parse().ok()?;
            return Some(format!("{}{:02}{:02}", year, month, day));
        }
    }
    None
}

/// Map keyword hits to a canonical document type.
pub fn extract_doc_type(text: &str) -> Option<String> {
    for (canonical, keywords) in DOC_TYPE_TABLE {
        if keywords.iter().any(|kw| text.contains(kw)) {
            return Some(canonical.to_string());
        }
    }
    if text.contains(CAMERA_EXPORT_MARKER) {
        return Some(CAMERA_EXPORT_TYPE.to_string());
    }
    None
}

/// Extract the entity (fund, then management company, then any company).
/// Within a pattern the longest match wins; fuller names carry more
/// information.
pub fn extract_entity(text: &str) -> Option<String> {
    for pattern in [
        &*FUND_NAME,
        &*FUND_NAME_LOOSE,
        &*MANAGEMENT_COMPANY,
        &*GENERAL_COMPANY,
    ] {
        let longest = pattern
            .find_iter(text)
            .map(|m| m.as_str())
            .max_by_key(|m| m.chars().count());
        if let Some(name) = longest {
            return Some(name.to_string());
        }
    }
    None
}

/// Compose `entity-type-date` from whichever fields are present, or `None`
/// when nothing was recognized.
pub fn compose_fields(text: &str) -> Option<String> {
    let mut parts = Vec::new();
    if let Some(entity) = extract_entity(text) {
        parts.push(entity);
    }
    if let Some(doc_type) = extract_doc_type(text) {
        parts.push(doc_type);
    }
    if let Some(date) = extract_date(text) {
        parts.push(date);
    }

    if parts.is_empty() {
        None
    } else {
        Some(parts.join("-"))
    }
}

/// Regex-table analyzer over extracted text, falling back to the filename.
pub struct HeuristicFieldAnalyzer;

impl HeuristicFieldAnalyzer {
    pub fn new() -> Self {
        Self
    }
}

impl Default for HeuristicFieldAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DocumentAnalyzer for HeuristicFieldAnalyzer {
    fn name(&self) -> &str {
        "heuristic"
    }

    fn tier(&self) -> Tier {
        Tier::Heuristic
    }

    async fn analyze(
        &self,
        document: &SourceDocument,
        content: Option<&ExtractedContent>,
    ) -> Verdict {
        if let Some(ExtractedContent::Text { text, .. }) = content {
            if let Some(candidate) = compose_fields(text) {
                return Verdict::Accepted(candidate);
            }
        }

        let stem = document.file_stem();
        match compose_fields(&stem) {
            Some(candidate) => Verdict::Accepted(candidate),
            None => Verdict::declined("no recognizable fields in content or filename"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn date_forms_normalize_to_yyyymmdd() {
        assert_eq!(extract_date("签署日期 2025-08-22").as_deref(), Some("20250822"));
        assert_eq!(extract_date("日期：2025/8/22").as_deref(), Some("20250822"));
        assert_eq!(extract_date("2025年8月22日 发布").as_deref(), Some("20250822"));
        assert_eq!(extract_date("IMG_20250822_120000").as_deref(), Some("20250822"));
        assert_eq!(extract_date("没有日期的文本"), None);
    }

    #[test]
    fn doc_type_priority_order_holds() {
        // Both 确认函 and 合同 appear; 确认函 sits earlier in the table.
        let text = "基金合同项下的份额确认函";
        assert_eq!(extract_doc_type(text).as_deref(), Some("确认函"));

        assert_eq!(extract_doc_type("临时开放日公告").as_deref(), Some("临时开放日公告"));
        assert_eq!(extract_doc_type("季报摘要").as_deref(), Some("季度报告"));
        assert_eq!(extract_doc_type("完全无关的文本"), None);
    }

    #[test]
    fn camera_exports_map_to_payment_voucher() {
        assert_eq!(extract_doc_type("微信图片_20250822").as_deref(), Some("打款凭证"));
    }

    #[test]
    fn entity_extraction_prefers_longest_fund_name() {
        let text = "展弘稳进1号7期私募基金 与 某基金 的比较";
        assert_eq!(
            extract_entity(text).as_deref(),
            Some("展弘稳进1号7期私募基金")
        );
    }

    #[test]
    fn entity_falls_back_to_company_names() {
        assert_eq!(
            extract_entity("甲方：展弘投资管理有限公司").as_deref(),
            Some("展弘投资管理有限公司")
        );
        assert_eq!(
            extract_entity("某某贸易有限公司 发票").as_deref(),
            Some("某某贸易有限公司")
        );
        assert_eq!(extract_entity("无主体信息"), None);
    }

    #[test]
    fn compose_joins_available_fields() {
        let text = "展弘稳进1号7期私募基金临时开放日公告，开放日为2025年8月22日";
        assert_eq!(
            compose_fields(text).as_deref(),
            Some("展弘稳进1号7期私募基金-临时开放日公告-20250822")
        );

        // Missing entity still composes.
        assert_eq!(
            compose_fields("打款凭证 2025-06-06").as_deref(),
            Some("打款凭证-20250606")
        );

        assert_eq!(compose_fields("abc"), None);
    }

    #[tokio::test]
    async fn camera_export_filename_is_named_from_stem() {
        let analyzer = HeuristicFieldAnalyzer::new();
        let document = SourceDocument::new(PathBuf::from("/in/微信图片_20250822.jpg"));

        match analyzer.analyze(&document, None).await {
            Verdict::Accepted(candidate) => assert_eq!(candidate, "打款凭证-20250822"),
            Verdict::Declined { reason, .. } => panic!("declined: {}", reason),
        }
    }

    #[tokio::test]
    async fn extracted_text_takes_precedence_over_stem() {
        let analyzer = HeuristicFieldAnalyzer::new();
        let document = SourceDocument::new(PathBuf::from("/in/scan001.pdf"));
        let content = ExtractedContent::Text {
            text: "展弘稳进1号7期私募基金临时开放日公告 2025年8月22日".to_string(),
            page_count: 1,
        };

        match analyzer.analyze(&document, Some(&content)).await {
            Verdict::Accepted(candidate) => {
                assert_eq!(candidate, "展弘稳进1号7期私募基金-临时开放日公告-20250822")
            }
            Verdict::Declined { reason, .. } => panic!("declined: {}", reason),
        }
    }

    #[tokio::test]
    async fn unrecognizable_document_declines() {
        let analyzer = HeuristicFieldAnalyzer::new();
        let document = SourceDocument::new(PathBuf::from("/in/IMG001.jpg"));

        match analyzer.analyze(&document, None).await {
            Verdict::Declined { .. } => {}
            Verdict::Accepted(candidate) => panic!("unexpected acceptance: {}", candidate),
        }
    }
}
