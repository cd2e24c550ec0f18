// Normalized country catalog entities shared by the reconciler, the stores and the API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const WEEKDAYS: [&str; 7] = [
    "monday",
    "tuesday",
    "wednesday",
    "thursday",
    "friday",
    "saturday",
    "sunday",
];

/// Scalar attributes of a country. Written by the reconciler and by the
/// create/update API; child collections are never part of this struct.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CountryFields {
    pub common_name: String,
    pub official_name: String,
    pub cca2: String,
    pub cca3: String,
    #[serde(default)]
    pub ccn3: Option<String>,
    #[serde(default)]
    pub cioc: Option<String>,
    #[serde(default = "default_true")]
    pub independent: bool,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub un_member: bool,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub subregion: Option<String>,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    #[serde(default)]
    pub landlocked: bool,
    #[serde(default)]
    pub area: Option<f64>,
    #[serde(default)]
    pub population: Option<i64>,
    #[serde(default)]
    pub tlds: Vec<String>,
    #[serde(default = "default_start_of_week")]
    pub start_of_week: String,
    #[serde(default = "empty_object")]
    pub gini: Value,
    #[serde(default)]
    pub fifa: Option<String>,
    #[serde(default)]
    pub car_signs: Vec<String>,
    #[serde(default)]
    pub car_side: Option<String>,
    #[serde(default)]
    pub timezones: Vec<String>,
    #[serde(default)]
    pub continents: Vec<String>,
    #[serde(default)]
    pub google_maps_url: Option<String>,
    #[serde(default)]
    pub openstreetmap_url: Option<String>,
    #[serde(default)]
    pub flag_png_url: Option<String>,
    #[serde(default)]
    pub flag_svg_url: Option<String>,
    #[serde(default)]
    pub flag_alt: Option<String>,
    #[serde(default)]
    pub coat_of_arms_png_url: Option<String>,
    #[serde(default)]
    pub coat_of_arms_svg_url: Option<String>,
    #[serde(default)]
    pub postal_code_format: Option<String>,
    #[serde(default)]
    pub postal_code_regex: Option<String>,
}

fn default_true() -> bool {
    true
}

pub fn default_start_of_week() -> String {
    "monday".to_string()
}

fn empty_object() -> Value {
    Value::Object(Map::new())
}

impl CountryFields {
    /// Minimal field set with every optional attribute at its default.
    pub fn new(common_name: &str, official_name: &str, cca2: &str, cca3: &str) -> Self {
        Self {
            common_name: common_name.to_string(),
            official_name: official_name.to_string(),
            cca2: cca2.to_string(),
            cca3: cca3.to_string(),
            ccn3: None,
            cioc: None,
            independent: true,
            status: None,
            un_member: false,
            region: None,
            subregion: None,
            latitude: None,
            longitude: None,
            landlocked: false,
            area: None,
            population: None,
            tlds: Vec::new(),
            start_of_week: default_start_of_week(),
            gini: empty_object(),
            fifa: None,
            car_signs: Vec::new(),
            car_side: None,
            timezones: Vec::new(),
            continents: Vec::new(),
            google_maps_url: None,
            openstreetmap_url: None,
            flag_png_url: None,
            flag_svg_url: None,
            flag_alt: None,
            coat_of_arms_png_url: None,
            coat_of_arms_svg_url: None,
            postal_code_format: None,
            postal_code_regex: None,
        }
    }

    /// Field-level validation applied to direct API writes.
    pub fn validate(&self) -> Vec<FieldError> {
        let mut errors = Vec::new();
        if self.common_name.trim().is_empty() {
            errors.push(FieldError::new("common_name", "must not be blank"));
        }
        if self.official_name.trim().is_empty() {
            errors.push(FieldError::new("official_name", "must not be blank"));
        }
        if !is_alpha_code(&self.cca2, 2) {
            errors.push(FieldError::new("cca2", "must be exactly 2 ASCII letters"));
        }
        if !is_alpha_code(&self.cca3, 3) {
            errors.push(FieldError::new("cca3", "must be exactly 3 ASCII letters"));
        }
        if let Some(ccn3) = self.ccn3.as_deref() {
            if ccn3.len() != 3 || !ccn3.bytes().all(|b| b.is_ascii_digit()) {
                errors.push(FieldError::new("ccn3", "must be exactly 3 digits"));
            }
        }
        if !WEEKDAYS.contains(&self.start_of_week.as_str()) {
            errors.push(FieldError::new(
                "start_of_week",
                "must be a lowercase weekday name",
            ));
        }
        if let Some(lat) = self.latitude {
            if !(-90.0..=90.0).contains(&lat) {
                errors.push(FieldError::new("latitude", "must be between -90 and 90"));
            }
        }
        if let Some(lng) = self.longitude {
            if !(-180.0..=180.0).contains(&lng) {
                errors.push(FieldError::new("longitude", "must be between -180 and 180"));
            }
        }
        if matches!(self.area, Some(a) if a < 0.0) {
            errors.push(FieldError::new("area", "must not be negative"));
        }
        if matches!(self.population, Some(p) if p < 0) {
            errors.push(FieldError::new("population", "must not be negative"));
        }
        if !self.gini.is_object() {
            errors.push(FieldError::new("gini", "must be an object of year to value"));
        }
        errors
    }
}

fn is_alpha_code(code: &str, len: usize) -> bool {
    code.len() == len && code.bytes().all(|b| b.is_ascii_alphabetic())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: &str, message: &str) -> Self {
        Self {
            field: field.to_string(),
            message: message.to_string(),
        }
    }
}

/// A persisted country row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Country {
    pub id: i64,
    #[serde(flatten)]
    pub fields: CountryFields,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Language {
    pub code: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Currency {
    pub code: String,
    pub name: String,
    pub symbol: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapitalCity {
    pub name: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

/// Native name or translation keyed by language code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalizedName {
    pub language_code: String,
    pub official_name: String,
    pub common_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Demonym {
    pub language: String,
    pub male: String,
    pub female: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DialingCode {
    pub root: String,
    pub suffixes: Vec<String>,
}

/// Country plus the two child collections the list view needs.
#[derive(Debug, Clone, PartialEq)]
pub struct CountrySummary {
    pub country: Country,
    pub native_names: Vec<LocalizedName>,
    pub capitals: Vec<String>,
}

/// Country with every owned collection, reference link and outbound border.
#[derive(Debug, Clone, PartialEq)]
pub struct CountryDetail {
    pub country: Country,
    pub capitals: Vec<CapitalCity>,
    pub native_names: Vec<LocalizedName>,
    pub alt_spellings: Vec<String>,
    pub languages: Vec<Language>,
    pub currencies: Vec<Currency>,
    pub demonyms: Vec<Demonym>,
    pub translations: Vec<LocalizedName>,
    pub dialing_code: Option<DialingCode>,
    /// `cca3` codes of the border targets.
    pub borders: Vec<String>,
}

/// Read-side filter for list queries.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CountryFilter {
    /// Case-insensitive region equality.
    pub region: Option<String>,
    /// Language code linked through `country_languages`.
    pub language: Option<String>,
    pub exclude_id: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    pub page_size: u32,
}

impl PageRequest {
    pub const DEFAULT_PAGE_SIZE: u32 = 50;
    pub const MAX_PAGE_SIZE: u32 = 250;

    /// Clamp raw query values: page starts at 1, size within 1..=MAX_PAGE_SIZE.
    pub fn new(page: Option<u32>, page_size: Option<u32>) -> Self {
        Self {
            page: page.unwrap_or(1).max(1),
            page_size: page_size
                .unwrap_or(Self::DEFAULT_PAGE_SIZE)
                .clamp(1, Self::MAX_PAGE_SIZE),
        }
    }

    pub fn offset(&self) -> i64 {
        i64::from(self.page - 1) * i64::from(self.page_size)
    }

    pub fn limit(&self) -> i64 {
        i64::from(self.page_size)
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(None, None)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    pub count: i64,
    pub page: u32,
    pub page_size: u32,
    pub results: Vec<T>,
}

impl<T> Page<T> {
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            count: self.count,
            page: self.page,
            page_size: self.page_size,
            results: self.results.into_iter().map(f).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_request_clamps() {
        let p = PageRequest::new(Some(0), Some(10_000));
        assert_eq!(p.page, 1);
        assert_eq!(p.page_size, PageRequest::MAX_PAGE_SIZE);
        assert_eq!(p.offset(), 0);

        let p = PageRequest::new(Some(3), Some(20));
        assert_eq!(p.offset(), 40);
        assert_eq!(p.limit(), 20);
    }

    #[test]
    fn test_validate_accepts_minimal_fields() {
        let f = CountryFields::new("Peru", "Republic of Peru", "PE", "PER");
        assert!(f.validate().is_empty());
    }

    #[test]
    fn test_validate_reports_each_bad_field() {
        let mut f = CountryFields::new("", "x", "P", "PE1");
        f.start_of_week = "funday".into();
        f.latitude = Some(91.0);
        f.population = Some(-1);
        let fields: Vec<String> = f.validate().into_iter().map(|e| e.field).collect();
        assert_eq!(
            fields,
            vec![
                "common_name",
                "cca2",
                "cca3",
                "start_of_week",
                "latitude",
                "population"
            ]
        );
    }

    #[test]
    fn test_fields_deserialize_with_defaults() {
        let f: CountryFields = serde_json::from_value(serde_json::json!({
            "common_name": "Chad",
            "official_name": "Republic of Chad",
            "cca2": "TD",
            "cca3": "TCD"
        }))
        .unwrap();
        assert!(f.independent);
        assert!(!f.landlocked);
        assert_eq!(f.start_of_week, "monday");
        assert!(f.gini.is_object());
    }
}
