/// 称谓 (匹配前去掉)
const HONORIFICS: &[&str] = &[
    "hr", "fru", "frk", "mr", "mrs", "ms", "miss", "dr", "prof", "sir",
];

/// 姓名模糊匹配
///
/// 归一化: 小写、去称谓、逗号/句点视为分隔、合并空白。
/// 评分: 最长匹配块比率 (非编辑距离), 同时计算按词排序后的比率, 取较大值。
/// 两个方向都算一遍, 保证 score(a, b) == score(b, a)。
#[derive(Debug, Clone, Copy)]
pub struct NameMatcher {
    threshold: f64,
}

impl Default for NameMatcher {
    fn default() -> Self {
        Self { threshold: 0.6 }
    }
}

impl NameMatcher {
    pub fn new(threshold: f64) -> Self {
        Self {
            threshold: threshold.clamp(0.0, 1.0),
        }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// 返回 [0, 1] 之间的分数
    pub fn score(&self, requested: &str, candidate: &str) -> f64 {
        let a = normalize(requested);
        let b = normalize(candidate);
        if a.is_empty() || b.is_empty() {
            return 0.0;
        }

        let naive = symmetric_ratio(&a, &b);
        let sorted = symmetric_ratio(&token_sorted(&a), &token_sorted(&b));
        naive.max(sorted)
    }

    pub fn is_match(&self, score: f64) -> bool {
        score >= self.threshold
    }
}

/// 归一化姓名
pub fn normalize(name: &str) -> String {
    let lowered = name.to_lowercase();
    lowered
        .split(|c: char| c.is_whitespace() || c == ',' || c == '.')
        .filter(|t| !t.is_empty())
        .filter(|t| !HONORIFICS.contains(t))
        .collect::<Vec<_>>()
        .join(" ")
}

fn token_sorted(normalized: &str) -> String {
    let mut tokens: Vec<&str> = normalized.split(' ').collect();
    tokens.sort_unstable();
    tokens.join(" ")
}

fn symmetric_ratio(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    ratio(&a, &b).max(ratio(&b, &a))
}

/// 2 * M / T, M 为所有匹配块长度之和
fn ratio(a: &[char], b: &[char]) -> f64 {
    let total = a.len() + b.len();
    if total == 0 {
        return 1.0;
    }
    2.0 * matching_chars(a, b) as f64 / total as f64
}

/// 递归取最长公共子串, 再分别处理左右两侧
fn matching_chars(a: &[char], b: &[char]) -> usize {
    let (i, j, size) = longest_match(a, b);
    if size == 0 {
        return 0;
    }
    size + matching_chars(&a[..i], &b[..j]) + matching_chars(&a[i + size..], &b[j + size..])
}

/// 最长公共子串 (a 中最靠前者优先, 其次 b 中最靠前者)
fn longest_match(a: &[char], b: &[char]) -> (usize, usize, usize) {
    let mut best = (0, 0, 0);
    let mut prev = vec![0usize; b.len() + 1];
    for (i, ca) in a.iter().enumerate() {
        let mut curr = vec![0usize; b.len() + 1];
        for (j, cb) in b.iter().enumerate() {
            if ca == cb {
                let len = prev[j] + 1;
                curr[j + 1] = len;
                if len > best.2 {
                    best = (i + 1 - len, j + 1 - len, len);
                }
            }
        }
        prev = curr;
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalization_strips_honorifics_and_punctuation() {
        assert_eq!(normalize("  Hr.  Peter   HANSEN "), "peter hansen");
        assert_eq!(normalize("Jensen, Anna"), "jensen anna");
        assert_eq!(normalize("Fru"), "");
    }

    #[test]
    fn reordered_name_scores_full_match() {
        let m = NameMatcher::default();
        let s = m.score("Anna Jensen", "Jensen, Anna");
        assert!((s - 1.0).abs() < 1e-9, "score was {s}");
        assert!(m.is_match(s));
    }

    #[test]
    fn token_sorted_never_below_naive_when_only_order_differs() {
        let a = normalize("Mette Kirstine Sørensen");
        let b = normalize("Sørensen Mette Kirstine");
        let naive = symmetric_ratio(&a, &b);
        let m = NameMatcher::default();
        assert!(m.score(&a, &b) >= naive);
    }

    #[test]
    fn score_is_symmetric() {
        let m = NameMatcher::default();
        let pairs = [
            ("Anna Jensen", "Anne Jensen"),
            ("abcd", "bcda"),
            ("Lars Peter Møller", "Møller, Lars"),
            ("xyz", "Hansen"),
        ];
        for (a, b) in pairs {
            assert_eq!(m.score(a, b), m.score(b, a), "{a} / {b}");
        }
    }

    #[test]
    fn ratio_matches_longest_block_semantics() {
        let a: Vec<char> = "abcd".chars().collect();
        let b: Vec<char> = "bcde".chars().collect();
        assert!((ratio(&a, &b) - 0.75).abs() < 1e-9);
    }

    #[test]
    fn dissimilar_names_fall_below_threshold() {
        let m = NameMatcher::default();
        let s = m.score("Anna Jensen", "Bo Kristoffersen");
        assert!(s < 0.6, "score was {s}");
        assert!(!m.is_match(s));
    }

    #[test]
    fn empty_after_normalization_scores_zero() {
        let m = NameMatcher::default();
        assert_eq!(m.score("Hr.", "Hr."), 0.0);
        assert_eq!(m.score("", "Anna"), 0.0);
    }

    #[test]
    fn exact_match_still_goes_through_normalization() {
        let m = NameMatcher::new(0.99);
        assert!(m.is_match(m.score("ANNA JENSEN", "anna   jensen")));
    }
}
