//! RIAA gold & platinum award search pages.

use scraper::{Html, Selector};

use crate::clients::http::{PageFetcher, fill_template};
use crate::error::FetchError;
use crate::model::CertificationEntry;

/// One award search: a two-month release window for albums or singles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AwardPeriod {
    pub year: i32,
    pub category: String,
    pub from: String,
    pub to: String,
}

impl AwardPeriod {
    pub fn label(&self) -> String {
        format!("{} {}..{}", self.category, self.from, self.to)
    }
}

/// All searches for `year`: six two-month windows per category.
pub fn periods_for_year(year: i32) -> Vec<AwardPeriod> {
    let mut periods = Vec::with_capacity(12);
    for first_month in (1..12).step_by(2) {
        for category in ["album", "single"] {
            periods.push(AwardPeriod {
                year,
                category: category.to_string(),
                from: format!("{year}-{first_month:02}-01"),
                // the site accepts day 31 for every month
                to: format!("{year}-{:02}-31", first_month + 1),
            });
        }
    }
    periods
}

pub trait AwardSource {
    fn awards(&self, period: &AwardPeriod) -> Result<Option<Vec<CertificationEntry>>, FetchError>;
}

pub struct Riaa<'a> {
    fetcher: &'a dyn PageFetcher,
    album_url: &'a str,
    single_url: &'a str,
}

impl<'a> Riaa<'a> {
    pub fn new(fetcher: &'a dyn PageFetcher, album_url: &'a str, single_url: &'a str) -> Self {
        Self {
            fetcher,
            album_url,
            single_url,
        }
    }
}

impl AwardSource for Riaa<'_> {
    fn awards(&self, period: &AwardPeriod) -> Result<Option<Vec<CertificationEntry>>, FetchError> {
        let template = if period.category == "album" {
            self.album_url
        } else {
            self.single_url
        };
        let url = fill_template(
            template,
            &[("FROM", period.from.as_str()), ("TO", period.to.as_str())],
        );
        let body = self.fetcher.get_text(&url)?;
        let entries = parse_award_page(&body, period)?;
        Ok(if entries.is_empty() { None } else { Some(entries) })
    }
}

fn selector(css: &str) -> Result<Selector, FetchError> {
    Selector::parse(css).map_err(|err| FetchError::Parse(format!("selector {css}: {err}")))
}

pub fn parse_award_page(html: &str, period: &AwardPeriod) -> Result<Vec<CertificationEntry>, FetchError> {
    let document = Html::parse_document(html);
    let table_selector = selector("table#search-award-table")?;
    let row_selector = selector("tr.table_award_row")?;
    let artist_selector = selector("td.artists_cell")?;
    let name_selector = selector("td.others_cell")?;

    let Some(table) = document.select(&table_selector).next() else {
        return Ok(Vec::new());
    };

    let mut entries = Vec::new();
    for row in table.select(&row_selector) {
        let cell_text = |selector: &Selector| {
            row.select(selector)
                .next()
                .map(|cell| cell.text().collect::<String>().trim().to_lowercase())
        };
        let (Some(artist), Some(name)) = (cell_text(&artist_selector), cell_text(&name_selector))
        else {
            return Err(FetchError::Shape(format!(
                "award row without artist/title cells in {}",
                period.label()
            )));
        };

        entries.push(CertificationEntry {
            artist,
            category: period.category.clone(),
            name,
            release_year: period.year,
            period_from: period.from.clone(),
        });
    }

    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::http::testing::CannedFetcher;

    #[test]
    fn year_splits_into_twelve_searches() {
        let periods = periods_for_year(1999);
        assert_eq!(periods.len(), 12);
        assert_eq!(periods[0].from, "1999-01-01");
        assert_eq!(periods[0].to, "1999-02-31");
        assert_eq!(periods[1].category, "single");
        assert_eq!(periods[11].from, "1999-11-01");
        assert_eq!(periods[11].to, "1999-12-31");
    }

    #[test]
    fn award_rows_are_lowercased() {
        let period = &periods_for_year(1999)[0];
        let html = r#"
            <table id="search-award-table">
              <tr class="table_award_row">
                <td class="artists_cell"> Marvin Gaye &amp; Tammi Terrell </td>
                <td class="others_cell">Greatest Hits</td>
                <td class="others_cell">Gold</td>
              </tr>
            </table>
        "#;

        let entries = parse_award_page(html, period).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].artist, "marvin gaye & tammi terrell");
        assert_eq!(entries[0].name, "greatest hits");
        assert_eq!(entries[0].release_year, 1999);
        assert_eq!(entries[0].period_from, "1999-01-01");
    }

    #[test]
    fn empty_search_result_is_none() {
        let fetcher = CannedFetcher::default()
            .with_page("https://riaa.test/album/1999-01-01/1999-02-31", "<html></html>");
        let riaa = Riaa::new(
            &fetcher,
            "https://riaa.test/album/{FROM}/{TO}",
            "https://riaa.test/single/{FROM}/{TO}",
        );

        let awards = riaa.awards(&periods_for_year(1999)[0]).unwrap();
        assert_eq!(awards, None);
    }
}
