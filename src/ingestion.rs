use crate::error::{BillingError, Result};
use crate::schema::{
    ConsumptionInterval, GspRegion, PriceCapEntry, RatePeriod, StandingChargePeriod,
};
use log::debug;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Envelope of every paginated retailer endpoint. Paging fields such as
/// `count` and `next` are ignored.
#[derive(Debug, Deserialize)]
struct ResultsPage<T> {
    results: Vec<T>,
}

fn parse_page<T: DeserializeOwned>(json: &str) -> Result<Vec<T>> {
    let page: ResultsPage<T> = serde_json::from_str(json)?;
    Ok(page.results)
}

/// Parses one consumption page into ascending order. The retailer returns
/// newest readings first.
pub fn parse_consumption_page(json: &str) -> Result<Vec<ConsumptionInterval>> {
    let mut intervals: Vec<ConsumptionInterval> = parse_page(json)?;
    intervals.sort_by_key(|c| c.interval_start);
    debug!("Parsed {} consumption intervals", intervals.len());
    Ok(intervals)
}

/// Flattens several rate pages (typically one per month) into one
/// ascending series.
pub fn parse_rate_pages<S: AsRef<str>>(pages: &[S]) -> Result<Vec<RatePeriod>> {
    let mut rates = Vec::new();
    for page in pages {
        rates.extend(parse_page::<RatePeriod>(page.as_ref())?);
    }
    rates.sort_by_key(|r| r.valid_from);
    debug!("Parsed {} rate periods from {} pages", rates.len(), pages.len());
    Ok(rates)
}

pub fn parse_standing_charge_page(json: &str) -> Result<Vec<StandingChargePeriod>> {
    let mut charges: Vec<StandingChargePeriod> = parse_page(json)?;
    charges.sort_by_key(|c| c.valid_from);
    Ok(charges)
}

/// Reads the tab-separated price-cap table (`Date`, `E`, `G`, `Region`)
/// and keeps one region's rows, oldest first.
pub fn parse_price_caps_tsv<R: Read>(reader: R, region: GspRegion) -> Result<Vec<PriceCapEntry>> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .trim(csv::Trim::All)
        .from_reader(reader);

    let key = region.table_key();
    let mut caps = Vec::new();
    for (row, record) in csv_reader.deserialize::<PriceCapEntry>().enumerate() {
        let entry = record?;
        match entry.region.as_deref() {
            Some(r) if r == key || r == key.trim_start_matches('_') => caps.push(entry),
            Some(_) => {}
            None => {
                return Err(BillingError::InvalidPriceCap(format!(
                    "Row {} has no Region column",
                    row + 1
                )))
            }
        }
    }

    caps.sort_by_key(|c| c.effective_date);
    debug!("Loaded {} price cap rows for region {}", caps.len(), region);
    Ok(caps)
}

pub fn load_price_caps_tsv<P: AsRef<Path>>(
    path: P,
    region: GspRegion,
) -> Result<Vec<PriceCapEntry>> {
    let file = File::open(path.as_ref())?;
    parse_price_caps_tsv(file, region)
}
