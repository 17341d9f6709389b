//! Short paper identifiers for prompt legibility.
//!
//! The aggregation prompt refers to papers as `{LastName}{Year}` labels
//! instead of raw DOIs, which the model reproduces far more reliably. Labels
//! are assigned per run over exactly the paper set being aggregated — the set
//! changes as new evidence arrives, so a persistent global registry would
//! either leak unrelated papers into prompts or grow without bound.

use std::collections::BTreeMap;

/// Bibliographic fields needed to derive a short id.
#[derive(Debug, Clone)]
pub struct PaperBib {
    /// DOI or other permanent identifier.
    pub durable_id: String,
    /// Semicolon-delimited `"Last, First"` entries.
    pub authors: String,
    pub year: Option<i32>,
}

/// Bijective short-id ↔ durable-id mapping for one aggregation run.
#[derive(Debug, Clone, Default)]
pub struct ShortIdTable {
    short_to_durable: BTreeMap<String, String>,
    durable_to_short: BTreeMap<String, String>,
}

impl ShortIdTable {
    pub fn durable_for(&self, short_id: &str) -> Option<&str> {
        self.short_to_durable.get(short_id).map(String::as_str)
    }

    pub fn short_for(&self, durable_id: &str) -> Option<&str> {
        self.durable_to_short.get(durable_id).map(String::as_str)
    }

    /// Iterate `(short_id, durable_id)` pairs in short-id order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.short_to_durable
            .iter()
            .map(|(s, d)| (s.as_str(), d.as_str()))
    }

    pub fn len(&self) -> usize {
        self.short_to_durable.len()
    }

    pub fn is_empty(&self) -> bool {
        self.short_to_durable.is_empty()
    }
}

/// Assign a short id to every paper. Always succeeds: missing author or year
/// degrades the label to `Unknown` parts but never fails the run.
pub fn assign(papers: &[PaperBib]) -> ShortIdTable {
    let mut groups: BTreeMap<String, Vec<&PaperBib>> = BTreeMap::new();
    for paper in papers {
        groups.entry(base_id(paper)).or_default().push(paper);
    }

    let mut table = ShortIdTable::default();
    for (base, mut group) in groups {
        if group.len() == 1 {
            insert(&mut table, base, &group[0].durable_id);
            continue;
        }
        // Deterministic disambiguation, independent of input order.
        group.sort_by(|a, b| a.durable_id.cmp(&b.durable_id));
        for (i, paper) in group.iter().enumerate() {
            insert(&mut table, format!("{base}{}", suffix(i)), &paper.durable_id);
        }
    }
    table
}

fn insert(table: &mut ShortIdTable, short_id: String, durable_id: &str) {
    table
        .durable_to_short
        .insert(durable_id.to_string(), short_id.clone());
    table.short_to_durable.insert(short_id, durable_id.to_string());
}

fn base_id(paper: &PaperBib) -> String {
    let name = last_name_label(&paper.authors);
    let year = paper
        .year
        .map(|y| y.to_string())
        .unwrap_or_else(|| "Unknown".to_string());
    format!("{name}{year}")
}

/// Last name of the first author: substring before the first comma of the
/// first semicolon-delimited entry, non-alphabetic characters stripped,
/// each word capitalized and concatenated.
fn last_name_label(authors: &str) -> String {
    let first_entry = authors.split(';').next().unwrap_or("");
    let last_name = first_entry.split(',').next().unwrap_or("").trim();

    let label: String = last_name
        .split_whitespace()
        .map(|word| {
            let cleaned: String = word.chars().filter(|c| c.is_alphabetic()).collect();
            let mut chars = cleaned.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect();

    if label.is_empty() {
        "Unknown".to_string()
    } else {
        label
    }
}

/// `0 → a`, `25 → z`, `26 → aa`, … so arbitrarily large collision groups
/// still get distinct suffixes.
fn suffix(mut index: usize) -> String {
    let mut out = Vec::new();
    loop {
        out.push(b'a' + (index % 26) as u8);
        index /= 26;
        if index == 0 {
            break;
        }
        index -= 1;
    }
    out.reverse();
    String::from_utf8(out).unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bib(durable_id: &str, authors: &str, year: Option<i32>) -> PaperBib {
        PaperBib {
            durable_id: durable_id.into(),
            authors: authors.into(),
            year,
        }
    }

    #[test]
    fn single_paper_gets_unqualified_id() {
        let table = assign(&[bib("10.1/a", "Smith, John; Doe, Jane", Some(2020))]);
        assert_eq!(table.durable_for("Smith2020"), Some("10.1/a"));
        assert_eq!(table.short_for("10.1/a"), Some("Smith2020"));
    }

    #[test]
    fn collisions_disambiguated_by_durable_id_order() {
        let papers = [
            bib("10.1/b", "Smith, Jane", Some(2020)),
            bib("10.1/a", "Smith, John", Some(2020)),
        ];
        let table = assign(&papers);
        assert_eq!(table.durable_for("Smith2020a"), Some("10.1/a"));
        assert_eq!(table.durable_for("Smith2020b"), Some("10.1/b"));

        // Input order must not matter.
        let reversed = [papers[1].clone(), papers[0].clone()];
        let table2 = assign(&reversed);
        assert_eq!(table2.durable_for("Smith2020a"), Some("10.1/a"));
        assert_eq!(table2.durable_for("Smith2020b"), Some("10.1/b"));
    }

    #[test]
    fn assignment_is_a_bijection() {
        let table = assign(&[
            bib("10.1/a", "Smith, John", Some(2020)),
            bib("10.1/b", "Smith, Jane", Some(2020)),
            bib("10.1/c", "Nguyen, T.", Some(2019)),
        ]);
        assert_eq!(table.len(), 3);
        for (short_id, durable_id) in table.iter() {
            assert_eq!(table.short_for(durable_id), Some(short_id));
        }
    }

    #[test]
    fn multi_word_last_name_concatenated() {
        let table = assign(&[bib("10.1/a", "van der Berg, Anna", Some(2021))]);
        assert_eq!(table.durable_for("VanDerBerg2021"), Some("10.1/a"));
    }

    #[test]
    fn non_alphabetic_characters_stripped() {
        let table = assign(&[bib("10.1/a", "O'Brien-Smith, Pat", Some(2018))]);
        assert_eq!(table.durable_for("OBrienSmith2018"), Some("10.1/a"));
    }

    #[test]
    fn missing_author_and_year_degrade_to_unknown() {
        let table = assign(&[bib("10.1/a", "", None)]);
        assert_eq!(table.durable_for("UnknownUnknown"), Some("10.1/a"));

        let table = assign(&[bib("10.1/b", "Lee, Min", None)]);
        assert_eq!(table.durable_for("LeeUnknown"), Some("10.1/b"));
    }

    #[test]
    fn suffix_sequence_extends_past_z() {
        assert_eq!(suffix(0), "a");
        assert_eq!(suffix(25), "z");
        assert_eq!(suffix(26), "aa");
        assert_eq!(suffix(27), "ab");
        assert_eq!(suffix(52), "ba");
    }

    #[test]
    fn large_collision_group_stays_bijective() {
        let papers: Vec<PaperBib> = (0..30)
            .map(|i| bib(&format!("10.1/{i:02}"), "Smith, A.", Some(2020)))
            .collect();
        let table = assign(&papers);
        assert_eq!(table.len(), 30);
        assert_eq!(table.durable_for("Smith2020a"), Some("10.1/00"));
        assert_eq!(table.durable_for("Smith2020aa"), Some("10.1/26"));
    }
}
