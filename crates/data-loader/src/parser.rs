//! Parsers for the news click dataset files.
//!
//! - articles_metadata.csv: article_id,category_id,created_at_ts,publisher_id,words_count
//! - clicks.csv: user_id,click_article_id,click_timestamp[,interaction_type[,click_rank]]
//! - articles_embeddings.csv: article_id,v0,v1,...
//!
//! A header line is optional. When present, click columns are located by
//! name, so raw session exports with extra columns load as well.
//!
//! A malformed row never aborts a load: it is skipped, counted in the
//! returned `ParseReport` and logged.

use crate::error::{DataLoadError, Result};
use crate::types::*;
use std::fs;
use std::path::Path;
use tracing::{debug, warn};

/// Timestamps above this value are taken to be milliseconds
const MILLIS_THRESHOLD: i64 = 100_000_000_000;

/// Parsed records plus the bookkeeping needed to report corruption
#[derive(Debug, Clone)]
pub struct ParseReport<T> {
    pub records: Vec<T>,
    /// Data rows that could not be parsed
    pub skipped: usize,
    /// Data rows seen (header and blank lines excluded)
    pub total: usize,
}

impl<T> ParseReport<T> {
    fn new() -> Self {
        Self {
            records: Vec::new(),
            skipped: 0,
            total: 0,
        }
    }

    /// Fraction of data rows that were skipped
    pub fn corruption_rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.skipped as f64 / self.total as f64
        }
    }
}

/// Read a whole file into memory, mapping a missing file to `FileNotFound`
fn read_file(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => DataLoadError::FileNotFound {
            path: path.display().to_string(),
        },
        _ => DataLoadError::IoError(e),
    })
}

fn file_label(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Normalise a timestamp to seconds
pub fn normalize_timestamp(raw: i64) -> Timestamp {
    if raw.abs() > MILLIS_THRESHOLD {
        raw / 1000
    } else {
        raw
    }
}

/// True when the first field of a line is not numeric, i.e. a header row
fn looks_like_header(line: &str) -> bool {
    line.split(',')
        .next()
        .map(|first| first.trim().parse::<i64>().is_err())
        .unwrap_or(false)
}

fn field<'a>(parts: &[&'a str], idx: usize, name: &str, file: &str, line: usize) -> Result<&'a str> {
    parts
        .get(idx)
        .map(|s| s.trim())
        .ok_or_else(|| DataLoadError::ParseError {
            file: file.to_string(),
            line,
            reason: format!("Missing {}", name),
        })
}

fn parse_num<T: std::str::FromStr>(value: &str, name: &str, file: &str, line: usize) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    value.parse().map_err(|e: T::Err| DataLoadError::ParseError {
        file: file.to_string(),
        line,
        reason: format!("Invalid {}: {}", name, e),
    })
}

/// Drive a line parser over file content, collecting rows and counting failures
fn parse_lines<T>(
    content: &str,
    file: &str,
    mut on_header: impl FnMut(&str),
    mut parse_row: impl FnMut(&str, usize) -> Result<T>,
) -> ParseReport<T> {
    let mut report = ParseReport::new();

    for (idx, line) in content.lines().enumerate() {
        let line_no = idx + 1;
        let line_trimmed = line.trim();
        if line_trimmed.is_empty() {
            continue; // Skip empty lines
        }
        if report.total == 0 && report.skipped == 0 && looks_like_header(line_trimmed) {
            on_header(line_trimmed);
            continue;
        }

        report.total += 1;
        match parse_row(line_trimmed, line_no) {
            Ok(record) => report.records.push(record),
            Err(e) => {
                report.skipped += 1;
                debug!("Skipping row: {}", e);
            }
        }
    }

    if report.skipped > 0 {
        warn!(
            "{}: skipped {} of {} rows ({:.2}% corrupt)",
            file,
            report.skipped,
            report.total,
            report.corruption_rate() * 100.0
        );
    }
    report
}

// =============================================================================
// Articles
// =============================================================================

/// Parse article metadata from file content
pub fn parse_articles_str(content: &str, file: &str) -> ParseReport<Article> {
    parse_lines(content, file, |_| {}, |line, line_no| {
        let parts: Vec<&str> = line.split(',').collect();

        let id = field(&parts, 0, "article_id", file, line_no)?;
        let category = field(&parts, 1, "category_id", file, line_no)?;
        let created_at = field(&parts, 2, "created_at_ts", file, line_no)?;
        // Column 3 is the publisher, unused
        let words = field(&parts, 4, "words_count", file, line_no)?;

        Ok(Article {
            id: parse_num(id, "article_id", file, line_no)?,
            category_id: parse_num(category, "category_id", file, line_no)?,
            published_at: normalize_timestamp(parse_num(created_at, "created_at_ts", file, line_no)?),
            words_count: parse_num(words, "words_count", file, line_no)?,
        })
    })
}

/// Parse the articles metadata file
pub fn parse_articles(path: &Path) -> Result<ParseReport<Article>> {
    let content = read_file(path)?;
    Ok(parse_articles_str(&content, &file_label(path)))
}

// =============================================================================
// Clicks
// =============================================================================

/// Column positions of the click fields
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ClickLayout {
    user_id: usize,
    article_id: usize,
    timestamp: usize,
    kind: Option<usize>,
    click_rank: Option<usize>,
}

impl Default for ClickLayout {
    fn default() -> Self {
        Self {
            user_id: 0,
            article_id: 1,
            timestamp: 2,
            kind: Some(3),
            click_rank: Some(4),
        }
    }
}

impl ClickLayout {
    /// Locate columns by name. Unknown headers fall back to the positional layout.
    fn from_header(header: &str) -> Self {
        let names: Vec<String> = header
            .split(',')
            .map(|s| s.trim().to_ascii_lowercase())
            .collect();
        let find = |candidates: &[&str]| names.iter().position(|n| candidates.contains(&n.as_str()));

        match (
            find(&["user_id"]),
            find(&["click_article_id", "article_id"]),
            find(&["click_timestamp", "timestamp"]),
        ) {
            (Some(user_id), Some(article_id), Some(timestamp)) => Self {
                user_id,
                article_id,
                timestamp,
                kind: find(&["interaction_type", "kind"]),
                click_rank: find(&["click_rank", "click_ranking"]),
            },
            _ => Self::default(),
        }
    }
}

/// Parse click log content
pub fn parse_clicks_str(content: &str, file: &str) -> ParseReport<RawInteraction> {
    let header_layout = std::cell::Cell::new(None);

    parse_lines(
        content,
        file,
        |header| header_layout.set(Some(ClickLayout::from_header(header))),
        |line, line_no| {
            let layout: ClickLayout = header_layout.get().unwrap_or_default();
            let parts: Vec<&str> = line.split(',').collect();

            let user_id = field(&parts, layout.user_id, "user_id", file, line_no)?;
            let article_id = field(&parts, layout.article_id, "click_article_id", file, line_no)?;
            let timestamp = field(&parts, layout.timestamp, "click_timestamp", file, line_no)?;

            let kind = match layout.kind.and_then(|idx| parts.get(idx)) {
                Some(raw) => InteractionKind::parse(raw)?,
                None => InteractionKind::View,
            };
            let click_rank = match layout.click_rank.and_then(|idx| parts.get(idx)) {
                Some(raw) if !raw.trim().is_empty() => {
                    let rank: u32 = parse_num(raw.trim(), "click_rank", file, line_no)?;
                    if rank == 0 {
                        return Err(DataLoadError::InvalidValue {
                            field: "click_rank".to_string(),
                            value: "0".to_string(),
                        });
                    }
                    Some(rank)
                }
                _ => None,
            };

            Ok(RawInteraction {
                user_id: parse_num(user_id, "user_id", file, line_no)?,
                article_id: parse_num(article_id, "click_article_id", file, line_no)?,
                timestamp: normalize_timestamp(parse_num(timestamp, "click_timestamp", file, line_no)?),
                kind,
                click_rank,
            })
        },
    )
}

/// Parse the clicks file
pub fn parse_clicks(path: &Path) -> Result<ParseReport<RawInteraction>> {
    let content = read_file(path)?;
    Ok(parse_clicks_str(&content, &file_label(path)))
}

// =============================================================================
// Embeddings
// =============================================================================

/// Parse embedding rows from file content.
///
/// Dimension consistency is checked later by `EmbeddingSnapshot::new`; rows
/// with a different length than the first good row are skipped here.
pub fn parse_embeddings_str(content: &str, file: &str) -> ParseReport<(ArticleId, Vec<f32>)> {
    let mut expected_dim: Option<usize> = None;

    parse_lines(content, file, |_| {}, |line, line_no| {
        let mut parts = line.split(',');
        let id = parts.next().ok_or_else(|| DataLoadError::ParseError {
            file: file.to_string(),
            line: line_no,
            reason: "Missing article_id".to_string(),
        })?;
        let article_id: ArticleId = parse_num(id.trim(), "article_id", file, line_no)?;

        let vector = parts
            .map(|v| parse_num::<f32>(v.trim(), "embedding value", file, line_no))
            .collect::<Result<Vec<f32>>>()?;

        if vector.is_empty() || vector.iter().any(|x| !x.is_finite()) {
            return Err(DataLoadError::ParseError {
                file: file.to_string(),
                line: line_no,
                reason: "Empty or non-finite embedding".to_string(),
            });
        }
        match expected_dim {
            Some(dim) if dim != vector.len() => {
                return Err(DataLoadError::DimensionMismatch {
                    article_id,
                    expected: dim,
                    found: vector.len(),
                });
            }
            None => expected_dim = Some(vector.len()),
            _ => {}
        }

        Ok((article_id, vector))
    })
}

/// Parse the embeddings file
pub fn parse_embeddings(path: &Path) -> Result<ParseReport<(ArticleId, Vec<f32>)>> {
    let content = read_file(path)?;
    Ok(parse_embeddings_str(&content, &file_label(path)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_timestamp() {
        assert_eq!(normalize_timestamp(1_506_826_800_000), 1_506_826_800);
        assert_eq!(normalize_timestamp(1_506_826_800), 1_506_826_800);
    }

    #[test]
    fn test_parse_articles_skips_bad_rows() {
        let content = "article_id,category_id,created_at_ts,publisher_id,words_count\n\
                       1,10,1506826800000,0,200\n\
                       2,oops,1506826800000,0,200\n\
                       3,11,1506826900,0,150\n";
        let report = parse_articles_str(content, "articles_metadata.csv");

        assert_eq!(report.records.len(), 2);
        assert_eq!(report.skipped, 1);
        assert_eq!(report.total, 3);
        assert_eq!(report.records[0].published_at, 1_506_826_800);
        assert!((report.corruption_rate() - 1.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_parse_clicks_positional() {
        let content = "5,1,100,like,2\n5,2,200\n6,1,300,view,\n";
        let report = parse_clicks_str(content, "clicks.csv");

        assert_eq!(report.skipped, 0);
        assert_eq!(report.records.len(), 3);
        assert_eq!(report.records[0].kind, InteractionKind::Like);
        assert_eq!(report.records[0].click_rank, Some(2));
        assert_eq!(report.records[1].kind, InteractionKind::View);
        assert_eq!(report.records[2].click_rank, None);
    }

    #[test]
    fn test_parse_clicks_header_layout() {
        let content = "user_id,session_id,session_start,session_size,click_article_id,click_timestamp,click_environment\n\
                       0,1506825423271737,1506825423000,2,157541,1506826828020,4\n\
                       0,1506825423271737,1506825423000,2,68866,1506826858020,4\n";
        let report = parse_clicks_str(content, "clicks_hour_000.csv");

        assert_eq!(report.skipped, 0);
        assert_eq!(report.records.len(), 2);
        assert_eq!(report.records[0].article_id, 157541);
        assert_eq!(report.records[0].timestamp, 1_506_826_828);
        assert_eq!(report.records[0].kind, InteractionKind::View);
    }

    #[test]
    fn test_parse_clicks_rejects_zero_rank_and_unknown_kind() {
        let content = "1,1,100,view,0\n1,2,100,share,1\n1,3,100,view,1\n";
        let report = parse_clicks_str(content, "clicks.csv");

        assert_eq!(report.records.len(), 1);
        assert_eq!(report.skipped, 2);
    }

    #[test]
    fn test_parse_embeddings_skips_wrong_dimension() {
        let content = "1,0.1,0.2,0.3\n2,0.1,0.2\n3,0.3,0.2,0.1\n4,nan,0.0,0.0\n";
        let report = parse_embeddings_str(content, "articles_embeddings.csv");

        assert_eq!(report.records.len(), 2);
        assert_eq!(report.skipped, 2);
        assert_eq!(report.records[1].0, 3);
    }

    #[test]
    fn test_missing_file() {
        let result = parse_clicks(Path::new("/definitely/not/here/clicks.csv"));
        assert!(matches!(result, Err(DataLoadError::FileNotFound { .. })));
    }
}
