use super::model::ScoredItem;
use crate::backend::ItemCatalog;

/// Splits the raw `problemPrefix` parameter into prefixes. Segments are
/// trimmed and blank ones dropped, so an empty prefix never selects everything.
pub fn parse_prefixes(raw: &str) -> Vec<String> {
    if raw.contains(',') {
        raw.split(',')
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(str::to_string)
            .collect()
    } else {
        let p = raw.trim();
        if p.is_empty() {
            Vec::new()
        } else {
            vec![p.to_string()]
        }
    }
}

pub fn matches_any(code: &str, prefixes: &[String]) -> bool {
    prefixes.iter().any(|p| code.starts_with(p.as_str()))
}

/// Union of items matching any prefix, sorted by code with duplicates removed.
pub fn select_items<C>(catalog: &C, raw_prefix: &str) -> anyhow::Result<Vec<ScoredItem>>
where
    C: ItemCatalog + ?Sized,
{
    let prefixes = parse_prefixes(raw_prefix);
    if prefixes.is_empty() {
        return Ok(Vec::new());
    }
    let mut items: Vec<ScoredItem> = catalog
        .items_matching(&prefixes)?
        .into_iter()
        .filter(|i| matches_any(&i.code, &prefixes))
        .collect();
    items.sort_by(|a, b| a.code.cmp(&b.code));
    items.dedup_by(|a, b| a.code == b.code);
    Ok(items)
}

pub fn headers(items: &[ScoredItem]) -> Vec<String> {
    let mut codes: Vec<String> = items.iter().map(|i| i.code.clone()).collect();
    codes.sort();
    codes
}
