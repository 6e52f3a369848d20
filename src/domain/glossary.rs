use std::collections::BTreeMap;

use uuid::Uuid;

const OPEN: &str = "<<";
const CLOSE: &str = ">>";

#[derive(Debug, Clone, PartialEq)]
pub struct Glossary {
    pub id: Uuid,
    pub name: String,
    pub language_pair: String,
    pub terms: BTreeMap<String, String>,
}

/// Two-pass glossary enforcement around a translation engine.
///
/// `protect` wraps source terms in sentinels before the text goes to the engine,
/// `restore` swaps each sentinel span for the glossary's target term verbatim.
/// Grammatical agreement around a forced term may suffer; that is accepted.
#[derive(Debug, Clone, Default)]
pub struct GlossaryProtector {
    // Longest first, so "machine learning" wins over "learning" at the same offset.
    terms: Vec<(String, String)>,
}

impl GlossaryProtector {
    pub fn new(terms: &BTreeMap<String, String>) -> Self {
        let mut terms: Vec<(String, String)> = terms
            .iter()
            .filter(|(source, _)| !source.is_empty())
            .map(|(s, t)| (s.clone(), t.clone()))
            .collect();
        terms.sort_by(|a, b| b.0.len().cmp(&a.0.len()).then_with(|| a.0.cmp(&b.0)));
        Self { terms }
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    pub fn protect(&self, text: &str) -> String {
        if self.terms.is_empty() {
            return text.to_string();
        }

        let mut out = String::with_capacity(text.len() + 8);
        let mut rest = text;
        while let Some(c) = rest.chars().next() {
            match self.terms.iter().find(|(source, _)| rest.starts_with(source.as_str())) {
                Some((source, _)) => {
                    out.push_str(OPEN);
                    out.push_str(source);
                    out.push_str(CLOSE);
                    rest = &rest[source.len()..];
                }
                None => {
                    out.push(c);
                    rest = &rest[c.len_utf8()..];
                }
            }
        }
        out
    }

    pub fn restore(&self, translated: &str) -> String {
        let mut out = translated.to_string();
        for (source, target) in &self.terms {
            let marked = format!("{OPEN}{source}{CLOSE}");
            if out.contains(&marked) {
                out = out.replace(&marked, target);
            }
        }
        out
    }
}
