use url::form_urlencoded;

/// Cell receiving the title formula; results spill down column A.
pub const TITLE_CELL: &str = "A1";
/// Cell receiving the URL formula; results spill down column B.
pub const URL_CELL: &str = "B1";

/// Builds the IMPORTXML formulas that make the rendering surface fetch and
/// evaluate one search result page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryTemplate {
    /// Search front-end, e.g. `https://www.google.com`.
    pub search_domain: String,
    pub results_per_page: u32,
    /// Zero-based offset of the first result.
    pub start_offset: u32,
    pub title_xpath: String,
    pub url_xpath: String,
    /// Function argument separator; `;` on comma-decimal spreadsheet locales.
    pub separator: String,
}

impl Default for QueryTemplate {
    fn default() -> Self {
        Self {
            search_domain: "https://www.google.com".to_string(),
            results_per_page: 100,
            start_offset: 0,
            title_xpath: "//h3[@class='r']".to_string(),
            url_xpath: "//h3[@class='r']/a/@href".to_string(),
            separator: ",".to_string(),
        }
    }
}

impl QueryTemplate {
    /// Search page URL for `keyword`.
    pub fn search_url(&self, keyword: &str) -> String {
        let escaped: String = form_urlencoded::byte_serialize(keyword.as_bytes()).collect();
        format!(
            "{}/search?q={}&num={}&start={}",
            self.search_domain.trim_end_matches('/'),
            escaped,
            self.results_per_page,
            self.start_offset
        )
    }

    pub fn title_formula(&self, keyword: &str) -> String {
        self.formula(keyword, &self.title_xpath)
    }

    pub fn url_formula(&self, keyword: &str) -> String {
        self.formula(keyword, &self.url_xpath)
    }

    fn formula(&self, keyword: &str, xpath: &str) -> String {
        format!(
            "=IMPORTXML({}{} {})",
            string_literal(&self.search_url(keyword)),
            self.separator,
            string_literal(xpath)
        )
    }
}

/// Quote a value as a spreadsheet string literal (inner quotes doubled).
fn string_literal(value: &str) -> String {
    format!("\"{}\"", value.replace('"', "\"\""))
}
