//! Billboard Hot 100 weekly chart pages.

use scraper::{ElementRef, Html, Selector};

use crate::clients::http::{PageFetcher, fill_template};
use crate::error::FetchError;
use crate::model::ChartEntry;

pub trait ChartSource {
    /// Ranked entries of one chart week; `None` when the page has no chart.
    fn weekly_chart(&self, chart_week: &str) -> Result<Option<Vec<ChartEntry>>, FetchError>;
}

pub struct Billboard<'a> {
    fetcher: &'a dyn PageFetcher,
    base_url: &'a str,
}

impl<'a> Billboard<'a> {
    pub fn new(fetcher: &'a dyn PageFetcher, base_url: &'a str) -> Self {
        Self { fetcher, base_url }
    }
}

impl ChartSource for Billboard<'_> {
    fn weekly_chart(&self, chart_week: &str) -> Result<Option<Vec<ChartEntry>>, FetchError> {
        let url = fill_template(self.base_url, &[("CHART_WEEK", chart_week)]);
        let body = self.fetcher.get_text(&url)?;
        parse_chart_page(&body, chart_week)
    }
}

fn selector(css: &str) -> Result<Selector, FetchError> {
    Selector::parse(css).map_err(|err| FetchError::Parse(format!("selector {css}: {err}")))
}

fn element_text(element: ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_string()
}

pub fn parse_chart_page(html: &str, chart_week: &str) -> Result<Option<Vec<ChartEntry>>, FetchError> {
    let document = Html::parse_document(html);
    let chart_selector = selector("div.chart-results-list")?;
    let row_selector = selector("div.o-chart-results-list-row-container")?;
    let item_selector = selector("li.o-chart-results-list__item")?;
    let artist_selector = selector("span")?;
    let song_selector = selector("h3")?;

    let Some(chart) = document.select(&chart_selector).next() else {
        return Ok(None);
    };

    let mut entries = Vec::new();
    for (index, row) in chart.select(&row_selector).enumerate() {
        let items = row.select(&item_selector).collect::<Vec<ElementRef<'_>>>();

        // newer layouts carry title and artist in the fourth item, older ones in the third
        let pair = [3usize, 2].iter().find_map(|&slot| {
            let item = items.get(slot)?;
            let artist = item.select(&artist_selector).next()?;
            let song = item.select(&song_selector).next()?;
            Some((element_text(artist), element_text(song)))
        });

        let Some((artist, song)) = pair else {
            return Err(FetchError::Shape(format!(
                "chart row {} of {chart_week} has no title/artist item",
                index + 1
            )));
        };

        entries.push(ChartEntry {
            artist,
            song,
            chart_week: chart_week.to_string(),
            position: (index + 1) as u32,
        });
    }

    Ok(Some(entries))
}
