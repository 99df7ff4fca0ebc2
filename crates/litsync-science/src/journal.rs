//! Canonicalization of journal name strings and journal-family grouping.
//!
//! The variant table and group list are static domain data curated from the
//! corpus, not derived from the live dataset. Every function here is a pure
//! lookup: ingestion and aggregation must agree on the same canonical name.

use std::collections::HashMap;

use once_cell::sync::Lazy;

/// A parent journal title together with its known sub-imprint titles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JournalGroup {
    pub parent: &'static str,
    pub children: &'static [&'static str],
}

/// Known variants: NLM-style location qualifiers, MEDLINE abbreviations,
/// leading articles, casing. Keys are lowercased and trimmed.
const VARIANTS: &[(&str, &str)] = &[
    ("hypertension (dallas, tex. : 1979)", "Hypertension"),
    ("hypertension (dallas, tex : 1979)", "Hypertension"),
    ("the new england journal of medicine", "New England Journal of Medicine"),
    ("n engl j med", "New England Journal of Medicine"),
    ("jama : the journal of the american medical association", "JAMA"),
    ("the journal of the american medical association", "JAMA"),
    ("lancet (london, england)", "Lancet"),
    ("the lancet", "Lancet"),
    ("bmj (clinical research ed.)", "BMJ"),
    ("bmj (clinical research ed)", "BMJ"),
    ("british medical journal", "BMJ"),
    ("circulation (new york, n.y.)", "Circulation"),
    ("eur heart j", "European Heart Journal"),
    ("european heart journal supplements : journal of the european society of cardiology", "European Heart Journal Supplements"),
    ("j am coll cardiol", "Journal of the American College of Cardiology"),
    ("journal of the american college of cardiology : jacc", "Journal of the American College of Cardiology"),
    ("j hypertens", "Journal of Hypertension"),
    ("journal of hypertension (los angeles, calif.)", "Journal of Hypertension"),
    ("am j hypertens", "American Journal of Hypertension"),
    ("american journal of hypertension : journal of the american society of hypertension", "American Journal of Hypertension"),
    ("j clin hypertens (greenwich, conn.)", "Journal of Clinical Hypertension"),
    ("the journal of clinical hypertension", "Journal of Clinical Hypertension"),
    ("clin auton res", "Clinical Autonomic Research"),
    ("clinical autonomic research : official journal of the clinical autonomic research society", "Clinical Autonomic Research"),
    ("front cardiovasc med", "Frontiers in Cardiovascular Medicine"),
    ("front physiol", "Frontiers in Physiology"),
    ("eur j heart fail", "European Journal of Heart Failure"),
    ("european journal of heart failure : journal of the working group on heart failure of the european society of cardiology", "European Journal of Heart Failure"),
    ("esc heart fail", "ESC Heart Failure"),
    ("int j cardiol", "International Journal of Cardiology"),
    ("heart (british cardiac society)", "Heart"),
    ("am j cardiol", "American Journal of Cardiology"),
    ("the american journal of cardiology", "American Journal of Cardiology"),
    ("jacc heart fail", "JACC: Heart Failure"),
    ("jacc: heart failure", "JACC: Heart Failure"),
    ("circ heart fail", "Circulation: Heart Failure"),
    ("circulation. heart failure", "Circulation: Heart Failure"),
    ("circ res", "Circulation Research"),
    ("circulation research", "Circulation Research"),
    ("auton neurosci", "Autonomic Neuroscience"),
    ("autonomic neuroscience : basic & clinical", "Autonomic Neuroscience"),
    ("j card fail", "Journal of Cardiac Failure"),
    ("journal of cardiac failure", "Journal of Cardiac Failure"),
    ("blood press", "Blood Pressure"),
    ("blood pressure (stockholm, sweden)", "Blood Pressure"),
];

/// Journal families used for aggregation. Invariant (checked by test, not at
/// runtime): a name is a child of at most one group, and no group's parent
/// reappears as another group's child.
const GROUPS: &[JournalGroup] = &[
    JournalGroup {
        parent: "BMJ",
        children: &["BMJ Open", "BMJ Case Reports", "Open Heart", "Heart"],
    },
    JournalGroup {
        parent: "Lancet",
        children: &[
            "Lancet Neurology",
            "Lancet Diabetes & Endocrinology",
            "EClinicalMedicine",
        ],
    },
    JournalGroup {
        parent: "JAMA",
        children: &["JAMA Cardiology", "JAMA Internal Medicine", "JAMA Network Open"],
    },
    JournalGroup {
        parent: "Circulation",
        children: &[
            "Circulation Research",
            "Circulation: Heart Failure",
            "Circulation: Arrhythmia and Electrophysiology",
        ],
    },
    JournalGroup {
        parent: "European Heart Journal",
        children: &[
            "European Heart Journal Supplements",
            "European Heart Journal - Case Reports",
        ],
    },
    JournalGroup {
        parent: "Journal of the American College of Cardiology",
        children: &["JACC: Heart Failure", "JACC: Basic to Translational Science"],
    },
];

static VARIANT_INDEX: Lazy<HashMap<&'static str, &'static str>> =
    Lazy::new(|| VARIANTS.iter().copied().collect());

/// Canonical display name for a raw journal string. Case-insensitive,
/// whitespace-trimmed lookup; a miss returns the trimmed input unchanged,
/// never a fabricated canonical name.
pub fn normalize(raw: &str) -> String {
    let trimmed = raw.trim();
    let key = trimmed.to_lowercase();
    match VARIANT_INDEX.get(key.as_str()) {
        Some(canonical) => (*canonical).to_string(),
        None => trimmed.to_string(),
    }
}

/// The family a journal belongs to, whether as parent or child.
pub fn find_parent_group(name: &str) -> Option<&'static JournalGroup> {
    let canonical = normalize(name);
    GROUPS.iter().find(|group| {
        group.parent == canonical || group.children.contains(&canonical.as_str())
    })
}

/// Whether the name resolves to curated domain data at all: either a known
/// variant or a member of a journal family.
pub fn is_recognized(name: &str) -> bool {
    let key = name.trim().to_lowercase();
    VARIANT_INDEX.contains_key(key.as_str()) || find_parent_group(name).is_some()
}

pub fn is_parent_journal(name: &str) -> bool {
    let canonical = normalize(name);
    GROUPS.iter().any(|group| group.parent == canonical)
}

/// Child titles for a parent journal; empty when the name heads no family.
pub fn get_child_journals(name: &str) -> Vec<&'static str> {
    let canonical = normalize(name);
    GROUPS
        .iter()
        .find(|group| group.parent == canonical)
        .map(|group| group.children.to_vec())
        .unwrap_or_default()
}
