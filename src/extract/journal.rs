//! Open Journal Systems article page extractor
//!
//! Reads Dublin Core `<meta>` tags, the breadcrumb trail, the citation block
//! and the author list, and produces one record per author.

use crate::extract::{ExtractError, Record, RecordExtractor};
use scraper::{ElementRef, Html, Selector};
use url::Url;

/// Extracts article metadata from OJS article pages
///
/// An article without listed authors still yields one record, with `author`
/// and `affiliation` missing. A page with neither a title nor any Dublin Core
/// metadata is rejected as [`ExtractError::NotAnArticle`].
#[derive(Debug, Clone)]
pub struct JournalArticleExtractor {
    journal: Selector,
    section: Selector,
    title: Selector,
    citation: Selector,
    citation_styles: Selector,
    doi: Selector,
    author_name: Selector,
    keywords_block: Selector,
    license_link: Selector,
    pdf_link: Selector,
    any_dublin_core: Selector,
}

impl JournalArticleExtractor {
    pub fn new() -> Result<Self, ExtractError> {
        Ok(Self {
            journal: selector("nav.cmp_breadcrumbs li:nth-of-type(3) a")?,
            section: selector("nav.cmp_breadcrumbs li:nth-of-type(4) span")?,
            title: selector("h1.page_title")?,
            citation: selector("div.csl-entry")?,
            citation_styles: selector(".citation_formats_styles a")?,
            doi: selector("section.item.doi a[href]")?,
            author_name: selector("span.name")?,
            keywords_block: selector("section.item.keywords .value")?,
            license_link: selector(r#"a[rel="license"][href]"#)?,
            pdf_link: selector("a.obj_galley_link.pdf[href]")?,
            any_dublin_core: selector(r#"meta[name^="DC."]"#)?,
        })
    }

    fn authors(&self, document: &Html) -> Vec<(String, Option<String>)> {
        document
            .select(&self.author_name)
            .filter_map(|name| {
                let text = element_text(name)?;
                Some((text, affiliation_after(name)))
            })
            .collect()
    }

    /// `DC.Subject` tags, or the visible keywords block
    fn keywords(&self, document: &Html) -> Option<String> {
        let subjects = meta_contents(document, "DC.Subject");
        if !subjects.is_empty() {
            return Some(subjects.join("; "));
        }
        first_text(document, &self.keywords_block)
    }

    fn license(&self, document: &Html) -> Option<String> {
        meta_content(document, "DC.Rights").or_else(|| {
            document
                .select(&self.license_link)
                .next()
                .and_then(|a| a.value().attr("href"))
                .map(|href| href.trim().to_string())
        })
    }

    fn citation_formats(&self, document: &Html) -> Option<String> {
        let styles: Vec<String> = document
            .select(&self.citation_styles)
            .filter_map(element_text)
            .collect();
        if styles.is_empty() {
            None
        } else {
            Some(styles.join(", "))
        }
    }
}

impl RecordExtractor for JournalArticleExtractor {
    fn extract(&self, body: &str, leaf_url: &Url) -> Result<Vec<Record>, ExtractError> {
        let document = Html::parse_document(body);

        let title = first_text(&document, &self.title);
        if title.is_none() && document.select(&self.any_dublin_core).next().is_none() {
            return Err(ExtractError::NotAnArticle(
                "no page title and no Dublin Core metadata".to_string(),
            ));
        }

        let doi = document
            .select(&self.doi)
            .next()
            .and_then(|a| a.value().attr("href"))
            .map(|href| href.trim().to_string());

        let pdf_url = document
            .select(&self.pdf_link)
            .next()
            .and_then(|a| a.value().attr("href"))
            .and_then(|href| leaf_url.join(href.trim()).ok())
            .map(|u| u.to_string());

        let base = Record::new(leaf_url.as_str())
            .with_field("journal", first_text(&document, &self.journal))
            .with_field("issn", meta_content(&document, "DC.Source.ISSN"))
            .with_field("volume", meta_content(&document, "DC.Source.Volume"))
            .with_field("issue", meta_content(&document, "DC.Source.Issue"))
            .with_field("submitted", meta_content(&document, "DC.Date.dateSubmitted"))
            .with_field("published", meta_content(&document, "DC.Date.created"))
            .with_field("title", title)
            .with_field("section", first_text(&document, &self.section))
            .with_field("pages", page_range(&document))
            .with_field("doi", doi)
            .with_field("author", None::<String>)
            .with_field("affiliation", None::<String>)
            .with_field("keywords", self.keywords(&document))
            .with_field("citation", first_text(&document, &self.citation))
            .with_field("citation_formats", self.citation_formats(&document))
            .with_field("abstract", meta_content(&document, "DC.Description"))
            .with_field("license", self.license(&document))
            .with_field("pdf_url", pdf_url);

        let authors = self.authors(&document);
        if authors.is_empty() {
            return Ok(vec![base]);
        }

        Ok(authors
            .into_iter()
            .map(|(name, affiliation)| {
                let mut record = base.clone();
                record.set("author", Some(name));
                record.set("affiliation", affiliation);
                record
            })
            .collect())
    }
}

fn selector(css: &str) -> Result<Selector, ExtractError> {
    Selector::parse(css)
        .map_err(|e| ExtractError::InvalidSelector(format!("{:?}: {:?}", css, e)))
}

/// Collapses whitespace; empty text counts as missing
fn element_text(element: ElementRef<'_>) -> Option<String> {
    let text = element
        .text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ");
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

fn first_text(document: &Html, selector: &Selector) -> Option<String> {
    document.select(selector).next().and_then(element_text)
}

fn meta_content(document: &Html, name: &str) -> Option<String> {
    meta_contents(document, name).into_iter().next()
}

/// Non-empty `content` of every `<meta name=...>` tag, in document order
fn meta_contents(document: &Html, name: &str) -> Vec<String> {
    let css = format!(r#"meta[name="{}"]"#, name);
    let Ok(selector) = Selector::parse(&css) else {
        return Vec::new();
    };
    document
        .select(&selector)
        .filter_map(|meta| meta.value().attr("content"))
        .map(str::trim)
        .filter(|content| !content.is_empty())
        .map(str::to_string)
        .collect()
}

/// `first-last` from the citation page metas
fn page_range(document: &Html) -> Option<String> {
    match (
        meta_content(document, "citation_firstpage"),
        meta_content(document, "citation_lastpage"),
    ) {
        (Some(first), Some(last)) if first != last => Some(format!("{}-{}", first, last)),
        (Some(first), _) => Some(first),
        (None, last) => last,
    }
}

/// Finds the affiliation listed after an author name, stopping at the next name
fn affiliation_after(name: ElementRef<'_>) -> Option<String> {
    for sibling in name.next_siblings().filter_map(ElementRef::wrap) {
        let mut classes = sibling.value().classes();
        if classes.any(|c| c == "affiliation") {
            return element_text(sibling);
        }
        if sibling.value().classes().any(|c| c == "name") {
            break;
        }
    }
    None
}
