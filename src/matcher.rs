use itertools::Itertools;
use regex::Regex;
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// Certification programs tracked per plant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CertifyingBody {
    Asc,
    Bap,
    FriendOfTheSea,
    Fip,
    MarinTrust,
}

impl CertifyingBody {
    pub const ALL: [CertifyingBody; 5] = [
        CertifyingBody::Asc,
        CertifyingBody::Bap,
        CertifyingBody::FriendOfTheSea,
        CertifyingBody::Fip,
        CertifyingBody::MarinTrust,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CertifyingBody::Asc => "ASC",
            CertifyingBody::Bap => "BAP",
            CertifyingBody::FriendOfTheSea => "FOS",
            CertifyingBody::Fip => "FIP",
            CertifyingBody::MarinTrust => "MarinTrust",
        }
    }

    /// Column header used in the spreadsheet output.
    pub fn column(&self) -> &'static str {
        match self {
            CertifyingBody::Asc => "ASC Cert",
            CertifyingBody::Bap => "BAP Cert",
            CertifyingBody::FriendOfTheSea => "FOS Cert",
            CertifyingBody::Fip => "FIP Cert",
            CertifyingBody::MarinTrust => "MarinTrust Cert",
        }
    }

    pub fn keywords(&self) -> &'static [&'static str] {
        match self {
            CertifyingBody::Asc => &["ASC", "A.S.C.", "Aquaculture Stewardship Council"],
            CertifyingBody::Bap => &["BAP", "Best Aquaculture Practices", "Global Seafood Alliance"],
            CertifyingBody::FriendOfTheSea => &[
                "Friend of the Sea",
                "FOS",
                "WSO",
                "World Sustainability Organization",
            ],
            CertifyingBody::Fip => &["FIP", "Fisheries Improvement Project"],
            CertifyingBody::MarinTrust => &["Marin Trust"],
        }
    }
}

impl fmt::Display for CertifyingBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CertifyingBody {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CertifyingBody::ALL
            .into_iter()
            .find(|body| body.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("Unknown certifying body: {}", s))
    }
}

#[derive(Debug)]
struct Pattern {
    keyword: String,
    regex: Regex,
}

impl Pattern {
    /// Abbreviations ("ASC", "A.S.C.") match in any case when written solid,
    /// but their letters separated by one or two punctuation or space
    /// characters only match in upper case, so prose like "such as C" is left
    /// alone. Phrases match their words in any case joined by any run of
    /// non-word characters, which also covers slugs such as
    /// `friend-of-the-sea`. Every form is anchored on word boundaries.
    fn compile(keyword: &str) -> Option<Pattern> {
        let words = keyword
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .collect::<Vec<_>>();
        if words.is_empty() {
            return None;
        }

        let is_abbreviation = words.iter().all(|w| w.chars().count() == 1)
            || (words.len() == 1 && words[0].chars().all(char::is_uppercase));

        let body = if is_abbreviation {
            let letters = words.concat().to_uppercase();
            let spaced = letters
                .chars()
                .map(|c| regex::escape(c.encode_utf8(&mut [0; 4])))
                .join(r"[\W_]{1,2}");
            format!("(?i:{})|{}", regex::escape(&letters), spaced)
        } else {
            format!("(?i:{})", words.iter().map(|w| regex::escape(w)).join(r"[\W_]*"))
        };

        let regex = Regex::new(&format!(r"\b(?:{})\b", body)).ok()?;

        Some(Pattern {
            keyword: keyword.to_string(),
            regex,
        })
    }
}

#[derive(Debug)]
struct KeywordSet {
    body: CertifyingBody,
    patterns: Vec<Pattern>,
}

/// Tests extracted text against the keyword sets of the certifying bodies a
/// plant has not matched yet.
#[derive(Debug)]
pub struct Matcher {
    sets: Vec<KeywordSet>,
}

impl Default for Matcher {
    fn default() -> Self {
        Matcher::new(
            CertifyingBody::ALL
                .into_iter()
                .map(|body| (body, body.keywords().iter().copied())),
        )
    }
}

impl Matcher {
    pub fn new<I, K, S>(sets: I) -> Self
    where
        I: IntoIterator<Item = (CertifyingBody, K)>,
        K: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let sets = sets
            .into_iter()
            .map(|(body, keywords)| KeywordSet {
                body,
                patterns: keywords
                    .into_iter()
                    .filter_map(|k| Pattern::compile(k.as_ref()))
                    .collect(),
            })
            .collect();
        Matcher { sets }
    }

    /// Returns every pending body satisfied by `text`, along with the first
    /// keyword of its set that matched.
    pub fn find<'a>(
        &'a self,
        text: &str,
        pending: &BTreeSet<CertifyingBody>,
    ) -> Vec<(CertifyingBody, &'a str)> {
        if text.trim().is_empty() {
            return vec![];
        }

        self.sets
            .iter()
            .filter(|set| pending.contains(&set.body))
            .filter_map(|set| {
                set.patterns
                    .iter()
                    .find(|p| p.regex.is_match(text))
                    .map(|p| (set.body, p.keyword.as_str()))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn all_pending() -> BTreeSet<CertifyingBody> {
        CertifyingBody::ALL.into_iter().collect()
    }

    fn bodies(found: Vec<(CertifyingBody, &str)>) -> Vec<CertifyingBody> {
        found.into_iter().map(|(b, _)| b).collect()
    }

    #[test]
    fn punctuated_abbreviation_matches() {
        let m = Matcher::default();
        for text in [
            "We are A.S.C. certified",
            "We are A S C certified",
            "We are ASC certified",
            "we are asc-certified",
            "A. S. C. chain of custody",
        ] {
            assert_eq!(bodies(m.find(text, &all_pending())), vec![CertifyingBody::Asc], "{text}");
        }
    }

    #[test]
    fn abbreviation_inside_word_does_not_match() {
        let m = Matcher::default();
        assert!(m.find("Files are stored as ASCII text", &all_pending()).is_empty());
        assert!(m.find("Baptist church and a fossil museum", &all_pending()).is_empty());
        assert!(m.find("Mascot of the company", &all_pending()).is_empty());
        assert!(m
            .find("Our fillets are rich in vitamins such as C and D.", &all_pending())
            .is_empty());
        assert!(m.find("Grade b, a, p and so on", &all_pending()).is_empty());
    }

    #[test]
    fn phrases_match_case_and_slug_variants() {
        let m = Matcher::default();
        assert_eq!(
            bodies(m.find("certified by friend-of-the-sea", &all_pending())),
            vec![CertifyingBody::FriendOfTheSea]
        );
        assert_eq!(
            bodies(m.find("BEST AQUACULTURE PRACTICES 4 stars", &all_pending())),
            vec![CertifyingBody::Bap]
        );
        assert_eq!(
            bodies(m.find("MarinTrust approved raw material", &all_pending())),
            vec![CertifyingBody::MarinTrust]
        );
        assert_eq!(
            bodies(m.find("part of a Fisheries\nImprovement Project", &all_pending())),
            vec![CertifyingBody::Fip]
        );
    }

    #[test]
    fn multiple_bodies_on_one_page() {
        let m = Matcher::default();
        let text = "Our farms hold ASC and BAP certification, members of Marin Trust.";
        assert_eq!(
            bodies(m.find(text, &all_pending())),
            vec![CertifyingBody::Asc, CertifyingBody::Bap, CertifyingBody::MarinTrust]
        );
    }

    #[test]
    fn matched_bodies_are_not_tested_again() {
        let m = Matcher::default();
        let pending = [CertifyingBody::Bap, CertifyingBody::Fip].into_iter().collect();
        assert!(m.find("ASC certified", &pending).is_empty());
        assert_eq!(
            m.find("BAP and Best Aquaculture Practices", &pending),
            vec![(CertifyingBody::Bap, "BAP")]
        );
    }

    #[test]
    fn empty_text_matches_nothing() {
        let m = Matcher::default();
        assert!(m.find("", &all_pending()).is_empty());
        assert!(m.find("   \n", &all_pending()).is_empty());
    }

    #[test]
    fn certifying_body_round_trips_through_str() {
        for body in CertifyingBody::ALL {
            assert_eq!(body.as_str().parse::<CertifyingBody>(), Ok(body));
        }
        assert!("MSC".parse::<CertifyingBody>().is_err());
    }
}
