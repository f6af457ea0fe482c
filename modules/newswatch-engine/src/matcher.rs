//! Keyword matching of user filters against the current story set.
//!
//! Pure: the output depends only on the filters' keywords and the stories,
//! so rerunning it over an unchanged set yields the same matches.

use newswatch_common::{Story, UserFilter};

/// Lowercased title and snippet for every story, built once per story set
/// and reused for every profile in a cascade.
pub struct MatchIndex<'a> {
    stories: &'a [Story],
    haystacks: Vec<(String, String)>,
}

impl<'a> MatchIndex<'a> {
    pub fn new(stories: &'a [Story]) -> Self {
        let haystacks = stories
            .iter()
            .map(|s| (s.title.to_lowercase(), s.snippet.to_lowercase()))
            .collect();
        Self { stories, haystacks }
    }

    /// Stories matched by one filter, in feed order, at most `max` of them.
    ///
    /// Keywords are tried in the filter's order; each keyword scans the whole
    /// feed. A story already taken by an earlier keyword is skipped, and the
    /// scan stops the moment the cap is reached.
    pub fn match_filter(&self, filter: &UserFilter, max: usize) -> Vec<Story> {
        let keywords: Vec<String> = filter
            .active_keywords()
            .map(|k| k.trim().to_lowercase())
            .collect();
        if keywords.is_empty() || max == 0 {
            return Vec::new();
        }

        let mut keep = vec![false; self.stories.len()];
        let mut matched = 0usize;
        'keywords: for keyword in &keywords {
            for (i, (title, snippet)) in self.haystacks.iter().enumerate() {
                if keep[i] {
                    continue;
                }
                if title.contains(keyword.as_str()) || snippet.contains(keyword.as_str()) {
                    keep[i] = true;
                    matched += 1;
                    if matched == max {
                        break 'keywords;
                    }
                }
            }
        }

        self.stories
            .iter()
            .zip(keep)
            .filter_map(|(story, kept)| kept.then(|| story.clone()))
            .collect()
    }

    /// Rematch every filter independently; `matched_stories` is replaced wholesale.
    pub fn match_filters(&self, filters: &[UserFilter], max: usize) -> Vec<UserFilter> {
        filters
            .iter()
            .map(|filter| UserFilter {
                matched_stories: self.match_filter(filter, max),
                ..filter.clone()
            })
            .collect()
    }
}

/// One-shot form of [`MatchIndex::match_filters`].
pub fn match_filters(filters: &[UserFilter], stories: &[Story], max: usize) -> Vec<UserFilter> {
    MatchIndex::new(stories).match_filters(filters, max)
}
