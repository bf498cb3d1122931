//! services/api/src/adapters/open_library.rs
//!
//! This module contains the adapter for the Open Library catalogue.
//! It implements the `BookSearchService` port from the `core` crate.

use async_trait::async_trait;
use readtention_core::ports::{
    BookDetails, BookSearchService, BookSummary, CoverSet, IsbnBook, PortResult, Ratings,
};
use serde::{de::DeserializeOwned, Deserialize};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{error, info};

const COVERS_BASE: &str = "https://covers.openlibrary.org/b";
const MAX_SUBJECTS: usize = 5;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements `BookSearchService` against the Open Library search API.
#[derive(Clone)]
pub struct OpenLibraryAdapter {
    client: reqwest::Client,
    base_url: String,
}

impl OpenLibraryAdapter {
    /// Creates a new `OpenLibraryAdapter`.
    pub fn new(base_url: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    async fn fetch(&self, query: &str, limit: usize) -> Result<SearchResponse, reqwest::Error> {
        let limit = limit.to_string();
        self.get_json("/search.json", &[("q", query), ("limit", limit.as_str())])
            .await
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str, query: &[(&str, &str)]) -> Result<T, reqwest::Error> {
        self.client
            .get(format!("{}{}", self.base_url, path))
            .query(query)
            .send()
            .await?
            .error_for_status()?
            .json::<T>()
            .await
    }
}

/// Builds a cover image URL for any identifier type Open Library supports
/// (`isbn`, `oclc`, `lccn`, `olid`, `id`) and size (`S`, `M`, `L`).
pub fn cover_url(identifier: &str, kind: &str, size: &str) -> String {
    format!("{}/{}/{}-{}.jpg", COVERS_BASE, kind, identifier, size)
}

/// The query used for trending books, optionally scoped to a subject.
pub fn trending_query(subject: Option<&str>) -> String {
    match subject.map(str::trim).filter(|s| !s.is_empty()) {
        Some(subject) => format!("subject:\"{}\" AND ratings_count:>100", subject),
        None => "ratings_count:>1000".to_string(),
    }
}

//=========================================================================================
// Open Library Response Structs
//=========================================================================================

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    docs: Vec<SearchDoc>,
}

#[derive(Deserialize)]
struct SearchDoc {
    key: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    author_name: Vec<String>,
    first_publish_year: Option<i32>,
    cover_edition_key: Option<String>,
    number_of_pages_median: Option<u32>,
    #[serde(default)]
    subject: Vec<String>,
    #[serde(default)]
    first_sentence: Vec<String>,
    ratings_average: Option<f64>,
    ratings_count: Option<u64>,
}

impl SearchDoc {
    fn into_summary(self) -> BookSummary {
        let author = self
            .author_name
            .first()
            .cloned()
            .unwrap_or_else(|| "Unknown Author".to_string());
        let cover_url_for = |size: &str| {
            self.cover_edition_key
                .as_deref()
                .map(|olid| cover_url(olid, "olid", size))
        };
        BookSummary {
            id: self.key.clone(),
            title: self.title.clone(),
            author,
            authors: self.author_name.clone(),
            cover_url: cover_url_for("M"),
            cover_large: cover_url_for("L"),
            publish_year: self.first_publish_year,
            page_count: self.number_of_pages_median,
            subjects: self.subject.iter().take(MAX_SUBJECTS).cloned().collect(),
            description: self.first_sentence.first().cloned(),
            ratings: Ratings {
                average: self.ratings_average,
                count: self.ratings_count,
            },
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum TextValue {
    Plain(String),
    Typed { value: String },
}

impl TextValue {
    fn into_string(self) -> String {
        match self {
            TextValue::Plain(text) | TextValue::Typed { value: text } => text,
        }
    }
}

#[derive(Deserialize)]
struct TypedTimestamp {
    value: String,
}

#[derive(Deserialize)]
struct WorkResponse {
    #[serde(default)]
    title: String,
    description: Option<TextValue>,
    #[serde(default)]
    subjects: Vec<String>,
    #[serde(default)]
    covers: Vec<i64>,
    created: Option<TypedTimestamp>,
    last_modified: Option<TypedTimestamp>,
}

impl WorkResponse {
    fn into_details(self) -> BookDetails {
        BookDetails {
            title: self.title,
            description: self.description.map(TextValue::into_string),
            subjects: self.subjects,
            covers: self
                .covers
                .into_iter()
                // Open Library uses -1 for a removed cover.
                .filter(|id| *id > 0)
                .map(|id| {
                    let id = id.to_string();
                    CoverSet {
                        small: cover_url(&id, "id", "S"),
                        medium: cover_url(&id, "id", "M"),
                        large: cover_url(&id, "id", "L"),
                    }
                })
                .collect(),
            created: self.created.map(|t| t.value),
            last_modified: self.last_modified.map(|t| t.value),
        }
    }
}

#[derive(Deserialize)]
struct Named {
    name: String,
}

#[derive(Deserialize)]
struct Excerpt {
    text: String,
}

#[derive(Deserialize)]
struct EditionData {
    #[serde(default)]
    title: String,
    #[serde(default)]
    authors: Vec<Named>,
    publish_date: Option<String>,
    #[serde(default)]
    publishers: Vec<Named>,
    number_of_pages: Option<u32>,
    cover: Option<serde_json::Value>,
    #[serde(default)]
    subjects: Vec<Named>,
    #[serde(default)]
    excerpts: Vec<Excerpt>,
    url: Option<String>,
}

impl EditionData {
    fn into_book(self, isbn: &str) -> IsbnBook {
        let has_cover = self.cover.is_some();
        let cover_for = |size: &str| has_cover.then(|| cover_url(isbn, "isbn", size));
        IsbnBook {
            title: self.title,
            authors: self.authors.into_iter().map(|a| a.name).collect(),
            publish_date: self.publish_date,
            publishers: self.publishers.into_iter().map(|p| p.name).collect(),
            page_count: self.number_of_pages,
            cover_url: cover_for("M"),
            cover_large: cover_for("L"),
            subjects: self.subjects.into_iter().map(|s| s.name).collect(),
            description: self.excerpts.into_iter().next().map(|e| e.text),
            url: self.url,
        }
    }
}

//=========================================================================================
// `BookSearchService` Trait Implementation
//=========================================================================================

#[async_trait]
impl BookSearchService for OpenLibraryAdapter {
    /// Searches by title, author or ISBN. Lookup failures yield an empty list.
    async fn search_books(&self, query: &str, limit: usize) -> PortResult<Vec<BookSummary>> {
        match self.fetch(query, limit).await {
            Ok(response) => {
                info!("Open Library returned {} results for '{}'", response.docs.len(), query);
                Ok(response.docs.into_iter().map(SearchDoc::into_summary).collect())
            }
            Err(e) => {
                error!("Error searching books for '{}': {}", query, e);
                Ok(Vec::new())
            }
        }
    }

    async fn trending_books(&self, subject: Option<&str>, limit: usize) -> PortResult<Vec<BookSummary>> {
        self.search_books(&trending_query(subject), limit).await
    }

    async fn books_by_author(&self, author: &str, limit: usize) -> PortResult<Vec<BookSummary>> {
        self.search_books(&format!("author:\"{}\"", author), limit).await
    }

    async fn book_details(&self, work_key: &str) -> PortResult<Option<BookDetails>> {
        match self.get_json::<WorkResponse>(&format!("{}.json", work_key), &[]).await {
            Ok(work) => Ok(Some(work.into_details())),
            Err(e) => {
                error!("Error fetching book details for '{}': {}", work_key, e);
                Ok(None)
            }
        }
    }

    async fn book_by_isbn(&self, isbn: &str) -> PortResult<Option<IsbnBook>> {
        let bibkey = format!("ISBN:{}", isbn);
        let query = [("bibkeys", bibkey.as_str()), ("format", "json"), ("jscmd", "data")];
        match self.get_json::<HashMap<String, EditionData>>("/api/books", &query).await {
            Ok(mut editions) => Ok(editions.remove(&bibkey).map(|edition| edition.into_book(isbn))),
            Err(e) => {
                error!("Error fetching book by ISBN '{}': {}", isbn, e);
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trending_query_depends_on_subject() {
        assert_eq!(trending_query(None), "ratings_count:>1000");
        assert_eq!(trending_query(Some("  ")), "ratings_count:>1000");
        assert_eq!(
            trending_query(Some("philosophy")),
            "subject:\"philosophy\" AND ratings_count:>100"
        );
    }

    #[test]
    fn search_doc_maps_to_summary() {
        let doc: SearchDoc = serde_json::from_value(serde_json::json!({
            "key": "/works/OL17930368W",
            "title": "Atomic Habits",
            "author_name": ["James Clear"],
            "first_publish_year": 2016,
            "cover_edition_key": "OL28012385M",
            "subject": ["Habit", "Self-help", "Success", "Behavior modification", "Psychology", "Extra"],
            "ratings_average": 4.2,
            "ratings_count": 310
        }))
        .unwrap();

        let summary = doc.into_summary();
        assert_eq!(summary.author, "James Clear");
        assert_eq!(
            summary.cover_url.as_deref(),
            Some("https://covers.openlibrary.org/b/olid/OL28012385M-M.jpg")
        );
        assert_eq!(summary.subjects.len(), MAX_SUBJECTS);
        assert_eq!(summary.ratings.count, Some(310));
        assert_eq!(summary.page_count, None);
    }

    #[test]
    fn work_description_may_be_typed() {
        let work: WorkResponse = serde_json::from_value(serde_json::json!({
            "title": "Atomic Habits",
            "description": { "type": "/type/text", "value": "Tiny changes." },
            "covers": [12539702, -1],
            "created": { "type": "/type/datetime", "value": "2018-10-16T10:00:00" }
        }))
        .unwrap();

        let details = work.into_details();
        assert_eq!(details.description.as_deref(), Some("Tiny changes."));
        assert_eq!(details.covers.len(), 1);
        assert_eq!(details.covers[0].large, "https://covers.openlibrary.org/b/id/12539702-L.jpg");
        assert_eq!(details.created.as_deref(), Some("2018-10-16T10:00:00"));
        assert!(details.last_modified.is_none());

        let plain: WorkResponse =
            serde_json::from_value(serde_json::json!({ "title": "Dune", "description": "Spice." })).unwrap();
        assert_eq!(plain.into_details().description.as_deref(), Some("Spice."));
    }

    #[test]
    fn edition_maps_to_isbn_book() {
        let edition: EditionData = serde_json::from_value(serde_json::json!({
            "title": "Atomic Habits",
            "authors": [{ "name": "James Clear", "url": "https://openlibrary.org/authors/OL7422948A" }],
            "publishers": [{ "name": "Avery" }],
            "number_of_pages": 320,
            "cover": { "medium": "https://covers.openlibrary.org/b/id/1-M.jpg" },
            "excerpts": [{ "text": "The fate of British Cycling changed one day in 2003." }]
        }))
        .unwrap();

        let book = edition.into_book("9780735211292");
        assert_eq!(book.authors, vec!["James Clear"]);
        assert_eq!(book.publishers, vec!["Avery"]);
        assert_eq!(
            book.cover_url.as_deref(),
            Some("https://covers.openlibrary.org/b/isbn/9780735211292-M.jpg")
        );
        assert!(book.description.unwrap().starts_with("The fate"));

        let bare: EditionData = serde_json::from_value(serde_json::json!({ "title": "Untitled" })).unwrap();
        assert!(bare.into_book("0000000000").cover_large.is_none());
    }

    #[test]
    fn missing_author_falls_back() {
        let doc: SearchDoc = serde_json::from_value(serde_json::json!({ "key": "/works/OL1W" })).unwrap();
        let summary = doc.into_summary();
        assert_eq!(summary.author, "Unknown Author");
        assert!(summary.cover_url.is_none());
    }
}
