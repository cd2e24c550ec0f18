// API request/response models (DTOs)

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::model::{CountryDetail, CountrySummary, FieldError, LocalizedName, PageRequest};

/// Standard API response wrapper
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<FieldError>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<Meta>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            errors: Vec::new(),
            meta: Some(Meta::now()),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
            errors: Vec::new(),
            meta: Some(Meta::now()),
        }
    }

    pub fn with_errors(mut self, errors: Vec<FieldError>) -> Self {
        self.errors = errors;
        self
    }
}

/// Metadata included in all API responses
#[derive(Debug, Serialize, Deserialize)]
pub struct Meta {
    pub timestamp: DateTime<Utc>,
    pub request_id: String,
    pub version: String,
}

impl Meta {
    pub fn now() -> Self {
        Self {
            timestamp: Utc::now(),
            request_id: uuid::Uuid::new_v4().to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub database: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

impl PageQuery {
    pub fn request(&self) -> PageRequest {
        PageRequest::new(self.page, self.page_size)
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub page: Option<u32>,
    pub page_size: Option<u32>,
    pub region: Option<String>,
    pub language: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SearchQuery {
    pub q: Option<String>,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NameFormsView {
    pub official: String,
    pub common: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NameView {
    pub common: String,
    pub official: String,
    #[serde(rename = "nativeName")]
    pub native_name: IndexMap<String, NameFormsView>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageView {
    pub png: Option<String>,
    pub svg: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alt: Option<String>,
}

fn localized_map(names: &[LocalizedName]) -> IndexMap<String, NameFormsView> {
    names
        .iter()
        .map(|n| {
            (
                n.language_code.clone(),
                NameFormsView {
                    official: n.official_name.clone(),
                    common: n.common_name.clone(),
                },
            )
        })
        .collect()
}

/// Row of the country list endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CountryListItem {
    pub id: i64,
    pub name: NameView,
    pub cca2: String,
    pub capital: Vec<String>,
    pub population: Option<i64>,
    pub timezones: Vec<String>,
    pub flags: ImageView,
}

impl From<CountrySummary> for CountryListItem {
    fn from(s: CountrySummary) -> Self {
        let f = s.country.fields;
        Self {
            id: s.country.id,
            name: NameView {
                common: f.common_name,
                official: f.official_name,
                native_name: localized_map(&s.native_names),
            },
            cca2: f.cca2,
            capital: s.capitals,
            population: f.population,
            timezones: f.timezones,
            flags: ImageView {
                png: f.flag_png_url,
                svg: f.flag_svg_url,
                alt: f.flag_alt,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrencyView {
    pub name: String,
    pub symbol: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IddView {
    pub root: String,
    pub suffixes: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DemonymView {
    pub f: String,
    pub m: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MapsView {
    pub google_maps: Option<String>,
    pub open_street_maps: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CarView {
    pub signs: Vec<String>,
    pub side: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapitalInfoView {
    pub latlng: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostalCodeView {
    pub format: Option<String>,
    pub regex: Option<String>,
}

/// Full country in the REST Countries payload shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CountryDetailView {
    pub id: i64,
    pub name: NameView,
    pub tld: Vec<String>,
    pub cca2: String,
    pub ccn3: Option<String>,
    pub cca3: String,
    pub cioc: Option<String>,
    pub independent: bool,
    pub status: Option<String>,
    pub un_member: bool,
    pub currencies: IndexMap<String, CurrencyView>,
    pub idd: IddView,
    pub capital: Vec<String>,
    pub alt_spellings: Vec<String>,
    pub region: Option<String>,
    pub subregion: Option<String>,
    pub languages: IndexMap<String, String>,
    pub latlng: Vec<f64>,
    pub landlocked: bool,
    pub borders: Vec<String>,
    pub area: Option<f64>,
    pub demonyms: IndexMap<String, DemonymView>,
    pub translations: IndexMap<String, NameFormsView>,
    pub flag: String,
    pub maps: MapsView,
    pub population: Option<i64>,
    pub gini: Value,
    pub fifa: Option<String>,
    pub car: CarView,
    pub timezones: Vec<String>,
    pub continents: Vec<String>,
    pub flags: ImageView,
    pub coat_of_arms: ImageView,
    pub start_of_week: String,
    pub capital_info: CapitalInfoView,
    pub postal_code: PostalCodeView,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Regional-indicator emoji for a 2-letter code; empty for anything else.
pub fn flag_emoji(cca2: &str) -> String {
    if cca2.len() != 2 || !cca2.bytes().all(|b| b.is_ascii_alphabetic()) {
        return String::new();
    }
    cca2.to_ascii_uppercase()
        .bytes()
        .filter_map(|b| char::from_u32(0x1F1E6 + u32::from(b - b'A')))
        .collect()
}

impl From<CountryDetail> for CountryDetailView {
    fn from(d: CountryDetail) -> Self {
        let id = d.country.id;
        let created_at = d.country.created_at;
        let updated_at = d.country.updated_at;
        let f = d.country.fields;

        let latlng = match (f.latitude, f.longitude) {
            (Some(lat), Some(lng)) => vec![lat, lng],
            _ => Vec::new(),
        };
        let capital_latlng = match d.capitals.first() {
            Some(c) => match (c.latitude, c.longitude) {
                (Some(lat), Some(lng)) => vec![lat, lng],
                _ => Vec::new(),
            },
            None => Vec::new(),
        };
        let idd = d
            .dialing_code
            .map(|dc| IddView {
                root: dc.root,
                suffixes: dc.suffixes,
            })
            .unwrap_or(IddView {
                root: String::new(),
                suffixes: Vec::new(),
            });

        Self {
            id,
            name: NameView {
                common: f.common_name,
                official: f.official_name,
                native_name: localized_map(&d.native_names),
            },
            tld: f.tlds,
            flag: flag_emoji(&f.cca2),
            cca2: f.cca2,
            ccn3: f.ccn3,
            cca3: f.cca3,
            cioc: f.cioc,
            independent: f.independent,
            status: f.status,
            un_member: f.un_member,
            currencies: d
                .currencies
                .into_iter()
                .map(|c| {
                    (
                        c.code,
                        CurrencyView {
                            name: c.name,
                            symbol: c.symbol,
                        },
                    )
                })
                .collect(),
            idd,
            capital: d.capitals.into_iter().map(|c| c.name).collect(),
            alt_spellings: d.alt_spellings,
            region: f.region,
            subregion: f.subregion,
            languages: d.languages.into_iter().map(|l| (l.code, l.name)).collect(),
            latlng,
            landlocked: f.landlocked,
            borders: d.borders,
            area: f.area,
            demonyms: d
                .demonyms
                .into_iter()
                .map(|dm| {
                    (
                        dm.language,
                        DemonymView {
                            f: dm.female,
                            m: dm.male,
                        },
                    )
                })
                .collect(),
            translations: localized_map(&d.translations),
            maps: MapsView {
                google_maps: f.google_maps_url,
                open_street_maps: f.openstreetmap_url,
            },
            population: f.population,
            gini: f.gini,
            fifa: f.fifa,
            car: CarView {
                signs: f.car_signs,
                side: f.car_side,
            },
            timezones: f.timezones,
            continents: f.continents,
            flags: ImageView {
                png: f.flag_png_url,
                svg: f.flag_svg_url,
                alt: f.flag_alt,
            },
            coat_of_arms: ImageView {
                png: f.coat_of_arms_png_url,
                svg: f.coat_of_arms_svg_url,
                alt: None,
            },
            start_of_week: f.start_of_week,
            capital_info: CapitalInfoView {
                latlng: capital_latlng,
            },
            postal_code: PostalCodeView {
                format: f.postal_code_format,
                regex: f.postal_code_regex,
            },
            created_at,
            updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CapitalCity, Country, CountryFields, Currency, DialingCode};

    fn detail() -> CountryDetail {
        let mut fields = CountryFields::new("Peru", "Republic of Peru", "PE", "PER");
        fields.latitude = Some(-10.0);
        fields.longitude = Some(-76.0);
        let now = Utc::now();
        let mut d = CountryDetail {
            country: Country {
                id: 7,
                fields,
                created_at: now,
                updated_at: now,
            },
            capitals: Vec::new(),
            native_names: Vec::new(),
            alt_spellings: Vec::new(),
            languages: Vec::new(),
            currencies: Vec::new(),
            demonyms: Vec::new(),
            translations: Vec::new(),
            dialing_code: None,
            borders: Vec::new(),
        };
        d.capitals = vec![CapitalCity {
            name: "Lima".into(),
            latitude: Some(-12.05),
            longitude: Some(-77.05),
        }];
        d.currencies = vec![Currency {
            code: "PEN".into(),
            name: "Peruvian sol".into(),
            symbol: "S/ ".into(),
        }];
        d.borders = vec!["BOL".into(), "BRA".into()];
        d
    }

    #[test]
    fn test_flag_emoji() {
        assert_eq!(flag_emoji("PE"), "\u{1F1F5}\u{1F1EA}");
        assert_eq!(flag_emoji("pe"), "\u{1F1F5}\u{1F1EA}");
        assert_eq!(flag_emoji("P1"), "");
        assert_eq!(flag_emoji(""), "");
    }

    #[test]
    fn test_detail_view_uses_restcountries_keys() {
        let v = serde_json::to_value(CountryDetailView::from(detail())).unwrap();
        assert_eq!(v["name"]["common"], "Peru");
        assert_eq!(v["capital"], serde_json::json!(["Lima"]));
        assert_eq!(v["capitalInfo"]["latlng"], serde_json::json!([-12.05, -77.05]));
        assert_eq!(v["latlng"], serde_json::json!([-10.0, -76.0]));
        assert_eq!(v["currencies"]["PEN"]["name"], "Peruvian sol");
        assert_eq!(v["borders"], serde_json::json!(["BOL", "BRA"]));
        assert_eq!(v["startOfWeek"], "monday");
        assert_eq!(v["unMember"], false);
        assert!(v["coatOfArms"].get("alt").is_none());
    }

    #[test]
    fn test_missing_dialing_code_renders_empty_idd() {
        let v = CountryDetailView::from(detail());
        assert_eq!(v.idd.root, "");
        assert!(v.idd.suffixes.is_empty());

        let mut d = detail();
        d.dialing_code = Some(DialingCode {
            root: "+5".into(),
            suffixes: vec!["1".into()],
        });
        let v = CountryDetailView::from(d);
        assert_eq!(v.idd.root, "+5");
    }
}
