use std::time::Duration;

use chrono::NaiveDate;
use quick_xml::events::Event;
use quick_xml::Reader;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Result, ScienceError};
use crate::http::RateLimitedClient;

const BASE_URL: &str = "https://eutils.ncbi.nlm.nih.gov/entrez/eutils";

/// One ESearch page: total hit count plus the PMIDs of this window.
#[derive(Debug, Clone)]
pub struct SearchPage {
    pub count: u64,
    pub ids: Vec<String>,
}

/// Bibliographic record as ESummary reports it, before normalization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PubMedRecord {
    pub pmid: String,
    pub title: String,
    pub journal: String,
    pub doi: Option<String>,
    pub pub_date: Option<String>,
    pub authors: Vec<String>,
}

impl PubMedRecord {
    pub fn from_json(uid: &str, v: &Value) -> Self {
        let title = v
            .get("title")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .trim()
            .to_string();

        let journal = v
            .get("fulljournalname")
            .or_else(|| v.get("source"))
            .and_then(Value::as_str)
            .unwrap_or_default()
            .trim()
            .to_string();

        let doi = v
            .get("articleids")
            .and_then(Value::as_array)
            .and_then(|ids| {
                ids.iter().find_map(|entry| {
                    let idtype = entry.get("idtype").and_then(Value::as_str)?;
                    if !idtype.eq_ignore_ascii_case("doi") {
                        return None;
                    }
                    entry
                        .get("value")
                        .and_then(Value::as_str)
                        .map(str::trim)
                        .filter(|value| !value.is_empty())
                        .map(ToOwned::to_owned)
                })
            });

        let pub_date = v
            .get("pubdate")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(ToOwned::to_owned);

        let authors = v
            .get("authors")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(|author| author.get("name").and_then(Value::as_str))
                    .map(ToOwned::to_owned)
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default();

        Self {
            pmid: uid.to_string(),
            title,
            journal,
            doi,
            pub_date,
            authors,
        }
    }
}

/// NCBI E-utilities client: ESearch for PMID pages, ESummary for record
/// fields, EFetch for abstract text (XML only on that endpoint).
pub struct PubMedSource {
    client: RateLimitedClient,
    base_url: String,
    email: Option<String>,
}

impl PubMedSource {
    pub fn new(email: Option<String>) -> Self {
        // NCBI allows 3 req/s without an API key.
        Self::with_config(BASE_URL.to_string(), email, Duration::from_millis(340))
    }

    fn with_config(base_url: String, email: Option<String>, min_interval: Duration) -> Self {
        Self {
            client: RateLimitedClient::new(min_interval, 3, "litsync/0.1"),
            base_url,
            email,
        }
    }

    pub fn new_for_tests(base_url: String) -> Self {
        Self::with_config(base_url, None, Duration::from_millis(1))
    }

    /// One window of the result set for `term`, optionally restricted to
    /// records dated on or after `min_date`.
    pub async fn search_page(
        &self,
        term: &str,
        min_date: Option<NaiveDate>,
        retstart: u64,
        retmax: u32,
    ) -> Result<SearchPage> {
        let mut url = format!(
            "{}/esearch.fcgi?db=pubmed&retmode=json&term={}&retstart={retstart}&retmax={retmax}",
            self.base_url,
            urlencoding::encode(term)
        );
        if let Some(date) = min_date {
            url.push_str(&format!(
                "&datetype=edat&mindate={}",
                date.format("%Y/%m/%d")
            ));
        }
        self.append_email(&mut url);

        let json: Value = self.client.get_json(&url).await?;
        let result = json
            .get("esearchresult")
            .ok_or_else(|| ScienceError::Parse("missing esearchresult".to_string()))?;

        let count = result
            .get("count")
            .and_then(as_flexible_u64)
            .unwrap_or(0);
        let ids = result
            .get("idlist")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(ToOwned::to_owned)
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default();

        Ok(SearchPage { count, ids })
    }

    pub async fn fetch_summaries(&self, pmids: &[String]) -> Result<Vec<PubMedRecord>> {
        if pmids.is_empty() {
            return Ok(Vec::new());
        }

        let mut url = format!(
            "{}/esummary.fcgi?db=pubmed&retmode=json&id={}",
            self.base_url,
            pmids.join(",")
        );
        self.append_email(&mut url);

        let json: Value = self.client.get_json(&url).await?;
        let result = json
            .get("result")
            .ok_or_else(|| ScienceError::Parse("missing esummary result".to_string()))?;

        let uids = result
            .get("uids")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default();

        Ok(uids
            .into_iter()
            .filter_map(|uid| result.get(uid).map(|entry| PubMedRecord::from_json(uid, entry)))
            .collect())
    }

    /// Abstract text for one PMID; `Ok(None)` when the record has none.
    /// Labeled sections come back as "LABEL: text" so downstream
    /// segmentation sees the structure the journal published.
    pub async fn fetch_abstract(&self, pmid: &str) -> Result<Option<String>> {
        let mut url = format!(
            "{}/efetch.fcgi?db=pubmed&retmode=xml&id={pmid}",
            self.base_url
        );
        self.append_email(&mut url);

        let xml = self.client.get(&url).await?;
        parse_abstract_xml(&xml)
    }

    fn append_email(&self, url: &mut String) {
        if let Some(email) = self.email.as_deref().filter(|e| !e.is_empty()) {
            url.push_str("&email=");
            url.push_str(&urlencoding::encode(email));
        }
    }
}

/// Pulls every `<AbstractText>` out of an EFetch payload, keeping the
/// `Label` attribute as a leading "LABEL: " marker when present.
fn parse_abstract_xml(xml: &str) -> Result<Option<String>> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut segments: Vec<String> = Vec::new();
    let mut in_abstract_text = false;
    let mut current = String::new();
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) if e.local_name().as_ref() == b"AbstractText" => {
                in_abstract_text = true;
                current.clear();
                for attr in e.attributes().flatten() {
                    if attr.key.local_name().as_ref() == b"Label" {
                        if let Ok(label) = attr.unescape_value() {
                            let label = label.trim().to_string();
                            if !label.is_empty() {
                                current.push_str(&label);
                                current.push_str(": ");
                            }
                        }
                    }
                }
            }
            Ok(Event::End(e)) if e.local_name().as_ref() == b"AbstractText" => {
                in_abstract_text = false;
                let segment = current.trim().to_string();
                if !segment.is_empty() {
                    segments.push(segment);
                }
            }
            Ok(Event::Text(t)) if in_abstract_text => {
                let text = t
                    .unescape()
                    .map_err(|e| ScienceError::Parse(e.to_string()))?;
                if !current.is_empty() && !current.ends_with(' ') && !current.ends_with(": ") {
                    current.push(' ');
                }
                current.push_str(text.trim());
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(ScienceError::Parse(e.to_string())),
            _ => {}
        }
        buf.clear();
    }

    if segments.is_empty() {
        Ok(None)
    } else {
        Ok(Some(segments.join(" ")))
    }
}

fn as_flexible_u64(value: &Value) -> Option<u64> {
    // E-utilities serialize counts as strings in JSON mode.
    value
        .as_u64()
        .or_else(|| value.as_str().and_then(|s| s.parse::<u64>().ok()))
}

#[cfg(test)]
mod tests {
    use mockito::{Matcher, Server};

    use super::*;

    #[test]
    fn parses_summary_record_with_doi() {
        let entry = serde_json::json!({
            "uid": "38000001",
            "title": "Baroreflex activation therapy in resistant hypertension.",
            "fulljournalname": "Hypertension (Dallas, Tex. : 1979)",
            "pubdate": "2024 Mar",
            "articleids": [
                {"idtype": "pubmed", "value": "38000001"},
                {"idtype": "doi", "value": "10.1161/HYP.0000000000000001"}
            ],
            "authors": [{"name": "Smith J"}, {"name": "Jones K"}]
        });

        let record = PubMedRecord::from_json("38000001", &entry);
        assert_eq!(record.pmid, "38000001");
        assert_eq!(record.doi.as_deref(), Some("10.1161/HYP.0000000000000001"));
        assert_eq!(record.journal, "Hypertension (Dallas, Tex. : 1979)");
        assert_eq!(record.authors.len(), 2);
    }

    #[test]
    fn abstract_xml_keeps_section_labels() {
        let xml = r#"<PubmedArticleSet><PubmedArticle><MedlineCitation><Article>
            <Abstract>
              <AbstractText Label="BACKGROUND">Resistant hypertension is common.</AbstractText>
              <AbstractText Label="METHODS">We enrolled 100 patients.</AbstractText>
            </Abstract>
        </Article></MedlineCitation></PubmedArticle></PubmedArticleSet>"#;

        let text = parse_abstract_xml(xml).unwrap().unwrap();
        assert_eq!(
            text,
            "BACKGROUND: Resistant hypertension is common. METHODS: We enrolled 100 patients."
        );
    }

    #[test]
    fn abstract_xml_without_abstract_is_none() {
        let xml = "<PubmedArticleSet><PubmedArticle/></PubmedArticleSet>";
        assert_eq!(parse_abstract_xml(xml).unwrap(), None);
    }

    #[tokio::test]
    async fn search_page_parses_string_count() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/esearch.fcgi")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(
                r#"{"esearchresult": {"count": "123", "idlist": ["38000001", "38000002"]}}"#,
            )
            .create_async()
            .await;

        let source = PubMedSource::new_for_tests(server.url());
        let page = source.search_page("barostim", None, 0, 50).await.unwrap();
        assert_eq!(page.count, 123);
        assert_eq!(page.ids.len(), 2);
    }
}
