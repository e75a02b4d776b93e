//! Guideline synthesis — aggregates competitor-page signal for a keyword
//! into a persisted benchmark profile.

use sqlx::PgPool;
use tracing::{info, warn};
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::guidelines::{ContentGuidelinesRow, ImportantTerm};
use crate::nlp::TextAnalyzer;
use crate::serp::fetch::{FetchedPage, PageFetcher};
use crate::serp::RankingProvider;

/// How many top-ranking results are scraped per keyword.
pub const MAX_COMPETITORS: usize = 5;
/// Cap on the number of important terms kept in a profile.
pub const MAX_GUIDELINE_TERMS: usize = 20;

const FALLBACK_WORD_COUNT: usize = 1500;

/// Aggregated profile before persistence.
#[derive(Debug, Clone, PartialEq)]
pub struct GuidelineProfile {
    pub keyword: String,
    pub language_code: String,
    pub country: String,
    pub min_words: i32,
    pub max_words: i32,
    pub avg_words: i32,
    pub avg_h1_count: i32,
    pub avg_h2_count: i32,
    pub avg_h3_count: i32,
    pub competitor_count: i32,
    pub important_terms: Vec<ImportantTerm>,
}

/// Runs the full synthesis for one (page, keyword) pair and upserts the
/// resulting profile. Idempotent: re-running converges to the same stored
/// profile, fetch non-determinism aside.
pub async fn synthesize_guidelines(
    pool: &PgPool,
    analyzer: &TextAnalyzer,
    ranking: &dyn RankingProvider,
    fetcher: &dyn PageFetcher,
    page_id: Uuid,
    keyword: &str,
    country: &str,
    language: &str,
) -> Result<ContentGuidelinesRow, AppError> {
    info!("Synthesizing guidelines for page {page_id} (\"{keyword}\")");

    let competitors = gather_competitors(ranking, fetcher, keyword, country, language).await?;
    let profile = aggregate(analyzer, keyword, country, language, &competitors);

    let guidelines = upsert_guidelines(pool, page_id, &profile).await?;
    info!(
        "Guidelines stored for page {page_id}: {} competitors, {} terms",
        profile.competitor_count,
        profile.important_terms.len()
    );
    Ok(guidelines)
}

/// Fetches up to [`MAX_COMPETITORS`] competitor pages, skipping any source
/// that fails. A ranking-lookup error propagates (retryable); a fully failed
/// scrape degrades to the placeholder competitor so scoring stays operational.
pub async fn gather_competitors(
    ranking: &dyn RankingProvider,
    fetcher: &dyn PageFetcher,
    keyword: &str,
    country: &str,
    language: &str,
) -> Result<Vec<FetchedPage>, AppError> {
    let results = ranking.search(keyword, country, language).await?;

    let mut competitors = Vec::new();
    for result in results.iter().take(MAX_COMPETITORS) {
        if let Some(page) = fetcher.fetch(&result.url).await {
            competitors.push(page);
        }
    }

    if competitors.is_empty() {
        warn!("No competitor content could be scraped for \"{keyword}\", using placeholder profile");
        competitors.push(fallback_competitor(keyword));
    }

    Ok(competitors)
}

/// Placeholder competitor used when every scrape fails. Fixed statistics keep
/// downstream scoring operational at degraded fidelity.
pub fn fallback_competitor(keyword: &str) -> FetchedPage {
    FetchedPage {
        url: String::new(),
        title: format!("Placeholder result for {keyword}"),
        meta_description: String::new(),
        h1: vec![format!("About {keyword}")],
        h2: vec![format!("{keyword} overview")],
        h3: vec![],
        body_text: format!("Placeholder competitor content for {keyword}"),
        word_count: FALLBACK_WORD_COUNT,
    }
}

/// Aggregates competitor extracts into a profile. Word-count guidance is a
/// smoothing heuristic (0.9×min observed, 1.1×max observed), not a
/// statistical bound.
pub fn aggregate(
    analyzer: &TextAnalyzer,
    keyword: &str,
    country: &str,
    language: &str,
    competitors: &[FetchedPage],
) -> GuidelineProfile {
    let count = competitors.len().max(1) as f64;

    let word_counts: Vec<usize> = competitors.iter().map(|c| c.word_count).collect();
    let avg_words =
        (word_counts.iter().sum::<usize>() as f64 / count).round() as i32;
    let min_observed = word_counts.iter().min().copied().unwrap_or(0);
    let max_observed = word_counts.iter().max().copied().unwrap_or(0);

    let avg_h1_count = heading_average(competitors, |c| c.h1.len());
    let avg_h2_count = heading_average(competitors, |c| c.h2.len());
    let avg_h3_count = heading_average(competitors, |c| c.h3.len());

    let combined: String = competitors
        .iter()
        .map(|c| c.body_text.as_str())
        .collect::<Vec<_>>()
        .join(" ");
    let key_terms = analyzer.extract_key_terms(&combined, MAX_GUIDELINE_TERMS);

    let mut important_terms: Vec<ImportantTerm> = key_terms
        .iter()
        .map(|kt| {
            let counts: Vec<usize> = competitors
                .iter()
                .map(|c| analyzer.term_count(&c.body_text, &kt.term))
                .collect();
            term_statistics(&kt.term, kt.importance as f64 / 10.0, &counts)
        })
        .collect();

    // The literal keyword must always participate in coverage scoring.
    let keyword_normalized = keyword.to_lowercase();
    if !important_terms
        .iter()
        .any(|t| t.term_normalized == keyword_normalized)
    {
        let counts: Vec<usize> = competitors
            .iter()
            .map(|c| c.body_text.to_lowercase().matches(&keyword_normalized).count())
            .collect();
        important_terms.insert(0, term_statistics(&keyword_normalized, 1.0, &counts));
    }

    GuidelineProfile {
        keyword: keyword.to_string(),
        language_code: language.to_string(),
        country: country.to_string(),
        min_words: (min_observed as f64 * 0.9).round() as i32,
        max_words: (max_observed as f64 * 1.1).round() as i32,
        avg_words,
        avg_h1_count,
        avg_h2_count,
        avg_h3_count,
        competitor_count: competitors.len() as i32,
        important_terms,
    }
}

fn heading_average(competitors: &[FetchedPage], level: impl Fn(&FetchedPage) -> usize) -> i32 {
    let count = competitors.len().max(1) as f64;
    let total: usize = competitors.iter().map(level).sum();
    (total as f64 / count).round() as i32
}

fn term_statistics(normalized: &str, importance: f64, counts: &[usize]) -> ImportantTerm {
    let total = counts.len().max(1) as f64;
    let present = counts.iter().filter(|&&c| c > 0).count() as f64;
    ImportantTerm {
        term: normalized.to_string(),
        term_normalized: normalized.to_string(),
        importance,
        min_count: counts.iter().min().copied().unwrap_or(0) as i32,
        max_count: counts.iter().max().copied().unwrap_or(0) as i32,
        avg_count: counts.iter().sum::<usize>() as f64 / total,
        percentage_present: present / total * 100.0,
    }
}

/// Create-or-replace keyed by page id. The profile is recreated wholesale,
/// never incrementally patched.
pub async fn upsert_guidelines(
    pool: &PgPool,
    page_id: Uuid,
    profile: &GuidelineProfile,
) -> Result<ContentGuidelinesRow, AppError> {
    let terms = serde_json::to_value(&profile.important_terms)
        .map_err(|e| AppError::Internal(e.into()))?;

    let row = sqlx::query_as::<_, ContentGuidelinesRow>(
        r#"
        INSERT INTO content_guidelines
            (audit_page_id, keyword, language_code, country, min_words, max_words,
             avg_words, avg_h1_count, avg_h2_count, avg_h3_count, competitor_count,
             important_terms)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
        ON CONFLICT (audit_page_id) DO UPDATE SET
            keyword = EXCLUDED.keyword,
            language_code = EXCLUDED.language_code,
            country = EXCLUDED.country,
            min_words = EXCLUDED.min_words,
            max_words = EXCLUDED.max_words,
            avg_words = EXCLUDED.avg_words,
            avg_h1_count = EXCLUDED.avg_h1_count,
            avg_h2_count = EXCLUDED.avg_h2_count,
            avg_h3_count = EXCLUDED.avg_h3_count,
            competitor_count = EXCLUDED.competitor_count,
            important_terms = EXCLUDED.important_terms,
            last_updated = NOW()
        RETURNING *
        "#,
    )
    .bind(page_id)
    .bind(&profile.keyword)
    .bind(&profile.language_code)
    .bind(&profile.country)
    .bind(profile.min_words)
    .bind(profile.max_words)
    .bind(profile.avg_words)
    .bind(profile.avg_h1_count)
    .bind(profile.avg_h2_count)
    .bind(profile.avg_h3_count)
    .bind(profile.competitor_count)
    .bind(terms)
    .fetch_one(pool)
    .await?;

    Ok(row)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::serp::SerpResult;
    use async_trait::async_trait;

    fn competitor(word_count: usize, h2: usize, body: &str) -> FetchedPage {
        FetchedPage {
            url: "https://example.com".to_string(),
            title: String::new(),
            meta_description: String::new(),
            h1: vec!["heading".to_string()],
            h2: vec!["sub".to_string(); h2],
            h3: vec![],
            body_text: body.to_string(),
            word_count,
        }
    }

    struct StubRanking {
        results: Vec<SerpResult>,
    }

    #[async_trait]
    impl RankingProvider for StubRanking {
        async fn search(
            &self,
            _keyword: &str,
            _country: &str,
            _language: &str,
        ) -> Result<Vec<SerpResult>, AppError> {
            Ok(self.results.clone())
        }
    }

    struct FailingFetcher;

    #[async_trait]
    impl PageFetcher for FailingFetcher {
        async fn fetch(&self, _url: &str) -> Option<FetchedPage> {
            None
        }
    }

    fn stub_results(n: usize) -> Vec<SerpResult> {
        (1..=n)
            .map(|i| SerpResult {
                position: i as i32,
                title: format!("Result {i}"),
                url: format!("https://example.com/{i}"),
                snippet: None,
            })
            .collect()
    }

    #[test]
    fn test_aggregate_word_count_guidance() {
        let analyzer = TextAnalyzer::new();
        let competitors = vec![
            competitor(1000, 2, "alpha content"),
            competitor(2000, 4, "alpha content"),
            competitor(1500, 3, "alpha content"),
        ];
        let profile = aggregate(&analyzer, "alpha", "us", "en", &competitors);
        assert_eq!(profile.avg_words, 1500);
        // 0.9 × min observed, 1.1 × max observed
        assert_eq!(profile.min_words, 900);
        assert_eq!(profile.max_words, 2200);
        assert_eq!(profile.competitor_count, 3);
        assert_eq!(profile.avg_h1_count, 1);
        assert_eq!(profile.avg_h2_count, 3);
    }

    #[test]
    fn test_aggregate_term_statistics_across_competitors() {
        let analyzer = TextAnalyzer::new();
        let competitors = vec![
            competitor(100, 1, "crawling crawling budget"),
            competitor(100, 1, "budget planning"),
        ];
        let profile = aggregate(&analyzer, "crawling", "us", "en", &competitors);

        let crawling = profile
            .important_terms
            .iter()
            .find(|t| t.term_normalized == "crawling")
            .unwrap();
        assert_eq!(crawling.min_count, 0);
        assert_eq!(crawling.max_count, 2);
        assert!((crawling.avg_count - 1.0).abs() < f64::EPSILON);
        assert!((crawling.percentage_present - 50.0).abs() < f64::EPSILON);

        let budget = profile
            .important_terms
            .iter()
            .find(|t| t.term_normalized == "budget")
            .unwrap();
        assert!((budget.percentage_present - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_aggregate_force_includes_missing_keyword() {
        let analyzer = TextAnalyzer::new();
        let competitors = vec![competitor(100, 1, "unrelated body text")];
        let profile = aggregate(&analyzer, "quantum widgets", "us", "en", &competitors);
        let first = &profile.important_terms[0];
        assert_eq!(first.term_normalized, "quantum widgets");
        assert!((first.importance - 1.0).abs() < f64::EPSILON);
        assert_eq!(first.max_count, 0);
    }

    #[test]
    fn test_aggregate_keeps_extracted_keyword_without_duplicate() {
        let analyzer = TextAnalyzer::new();
        let competitors = vec![competitor(100, 1, "sitemap sitemap sitemap tips")];
        let profile = aggregate(&analyzer, "Sitemap", "us", "en", &competitors);
        let matches = profile
            .important_terms
            .iter()
            .filter(|t| t.term_normalized == "sitemap")
            .count();
        assert_eq!(matches, 1);
    }

    #[test]
    fn test_aggregate_caps_term_list() {
        let analyzer = TextAnalyzer::new();
        let body = (0..40)
            .map(|i| format!("uniqueterm{i:02}"))
            .collect::<Vec<_>>()
            .join(" ");
        let competitors = vec![competitor(100, 1, &body)];
        let profile = aggregate(&analyzer, "uniqueterm00", "us", "en", &competitors);
        assert!(profile.important_terms.len() <= MAX_GUIDELINE_TERMS);
    }

    #[test]
    fn test_fallback_competitor_contains_keyword() {
        let fallback = fallback_competitor("crawl budget");
        assert_eq!(fallback.word_count, 1500);
        assert!(fallback.body_text.contains("crawl budget"));
        assert_eq!(fallback.h1.len(), 1);
    }

    #[tokio::test]
    async fn test_gather_competitors_falls_back_when_all_fetches_fail() {
        let ranking = StubRanking {
            results: stub_results(8),
        };
        let competitors =
            gather_competitors(&ranking, &FailingFetcher, "crawl budget", "us", "en")
                .await
                .unwrap();
        assert_eq!(competitors.len(), 1);
        assert_eq!(competitors[0], fallback_competitor("crawl budget"));
    }

    #[tokio::test]
    async fn test_gather_competitors_caps_at_five_sources() {
        struct CountingFetcher(std::sync::Mutex<usize>);

        #[async_trait]
        impl PageFetcher for CountingFetcher {
            async fn fetch(&self, _url: &str) -> Option<FetchedPage> {
                *self.0.lock().unwrap() += 1;
                Some(competitor(500, 1, "some body text"))
            }
        }

        let ranking = StubRanking {
            results: stub_results(10),
        };
        let fetcher = CountingFetcher(std::sync::Mutex::new(0));
        let competitors = gather_competitors(&ranking, &fetcher, "seo", "us", "en")
            .await
            .unwrap();
        assert_eq!(competitors.len(), MAX_COMPETITORS);
        assert_eq!(*fetcher.0.lock().unwrap(), MAX_COMPETITORS);
    }
}
