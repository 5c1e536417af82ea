use super::PinCite;

/// Number of distinct `keywords` present (case-insensitively) on the page
/// the citation was found on. Citations without a page, or whose page is
/// outside `pages`, score zero.
pub fn score_citation<S: AsRef<str>, K: AsRef<str>>(
    cite: &PinCite,
    pages: &[S],
    keywords: &[K],
) -> usize {
    let Some(text) = cite
        .page
        .and_then(|p| p.checked_sub(1))
        .and_then(|i| pages.get(i))
    else {
        return 0;
    };
    let text = text.as_ref().to_lowercase();

    keywords
        .iter()
        .map(|k| k.as_ref().trim().to_lowercase())
        .filter(|k| !k.is_empty() && text.contains(k.as_str()))
        .count()
}

/// Picks up to `max` citations relevant to a report section.
///
/// Citations are ranked by [`score_citation`], highest first, earliest index
/// on ties. When nothing scores, the first `min(max, 2)` citations of `cites`
/// are returned so a section is never left without any reference.
pub fn select_for_section<S: AsRef<str>, K: AsRef<str>>(
    cites: &[PinCite],
    pages: Option<&[S]>,
    keywords: &[K],
    max: usize,
) -> Vec<PinCite> {
    if max == 0 {
        return Vec::new();
    }

    let mut scored: Vec<(usize, &PinCite)> = match pages {
        Some(pages) => cites
            .iter()
            .map(|c| (score_citation(c, pages, keywords), c))
            .filter(|(score, _)| *score > 0)
            .collect(),
        None => Vec::new(),
    };

    if scored.is_empty() {
        return cites.iter().take(max.min(2)).cloned().collect();
    }

    scored.sort_by(|(sa, a), (sb, b)| sb.cmp(sa).then(a.index.cmp(&b.index)));
    scored.into_iter().take(max).map(|(_, c)| c.clone()).collect()
}
