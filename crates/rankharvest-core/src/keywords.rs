use std::path::Path;

use crate::error::HarvestError;
use crate::models::KeywordTask;

/// Parse a keyword list: one `keyword<TAB>group` pair per line.
///
/// Lines that do not have exactly two tab-separated fields are dropped.
pub fn parse_keywords(text: &str) -> Vec<KeywordTask> {
    text.split('\n')
        .filter_map(|line| {
            let mut fields = line.split('\t');
            match (fields.next(), fields.next(), fields.next()) {
                (Some(keyword), Some(group), None) => {
                    Some(KeywordTask::new(keyword.trim(), group.trim()))
                }
                _ => None,
            }
        })
        .collect()
}

/// Read and parse the keyword file at `path`.
pub async fn load_keywords(path: &Path) -> Result<Vec<KeywordTask>, HarvestError> {
    let text = tokio::fs::read_to_string(path).await.map_err(|e| {
        HarvestError::KeywordSource(format!("Can't load keywords file {}: {e}", path.display()))
    })?;
    let keywords = parse_keywords(&text);
    tracing::info!(path = %path.display(), count = keywords.len(), "Loaded keywords");
    Ok(keywords)
}
