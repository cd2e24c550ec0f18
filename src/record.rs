//! Typed view over one raw REST Countries record.
//!
//! Every field is optional and nullable: the upstream payload omits keys
//! freely and sometimes sends explicit `null`. A value of the wrong shape
//! (for example `capital` as a string instead of a list) is a parse error
//! for the whole record.

use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::model::{
    default_start_of_week, CapitalCity, CountryFields, Demonym, DialingCode, LocalizedName,
};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CountryRecord {
    pub name: Option<NameBlock>,
    pub cca2: Option<String>,
    pub cca3: Option<String>,
    pub ccn3: Option<String>,
    pub cioc: Option<String>,
    pub independent: Option<bool>,
    pub status: Option<String>,
    pub un_member: Option<bool>,
    pub currencies: Option<IndexMap<String, CurrencyBlock>>,
    pub idd: Option<IddBlock>,
    pub capital: Option<Vec<String>>,
    pub alt_spellings: Option<Vec<String>>,
    pub region: Option<String>,
    pub subregion: Option<String>,
    pub languages: Option<IndexMap<String, String>>,
    pub latlng: Option<Vec<f64>>,
    pub landlocked: Option<bool>,
    pub borders: Option<Vec<String>>,
    pub area: Option<f64>,
    pub demonyms: Option<IndexMap<String, DemonymBlock>>,
    pub translations: Option<IndexMap<String, NameForms>>,
    pub maps: Option<MapsBlock>,
    pub population: Option<i64>,
    pub gini: Option<Map<String, Value>>,
    pub fifa: Option<String>,
    pub car: Option<CarBlock>,
    pub timezones: Option<Vec<String>>,
    pub continents: Option<Vec<String>>,
    pub flags: Option<ImageBlock>,
    pub coat_of_arms: Option<ImageBlock>,
    pub start_of_week: Option<String>,
    pub capital_info: Option<CapitalInfo>,
    pub postal_code: Option<PostalCodeBlock>,
    pub tld: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NameBlock {
    pub common: Option<String>,
    pub official: Option<String>,
    pub native_name: Option<IndexMap<String, NameForms>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NameForms {
    pub official: Option<String>,
    pub common: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CurrencyBlock {
    pub name: Option<String>,
    pub symbol: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct IddBlock {
    pub root: Option<String>,
    pub suffixes: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DemonymBlock {
    pub m: Option<String>,
    pub f: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MapsBlock {
    pub google_maps: Option<String>,
    pub open_street_maps: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CarBlock {
    pub signs: Option<Vec<String>>,
    pub side: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ImageBlock {
    pub png: Option<String>,
    pub svg: Option<String>,
    pub alt: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CapitalInfo {
    pub latlng: Option<Vec<f64>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PostalCodeBlock {
    pub format: Option<String>,
    pub regex: Option<String>,
}

/// Display name of a raw record, readable even when the record fails to parse.
pub fn display_name(raw: &Value) -> String {
    raw.pointer("/name/common")
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
        .unwrap_or("Unknown")
        .to_string()
}

/// First two elements of a coordinate pair; shorter pairs yield `None`s.
pub fn lat_lng(pair: Option<&[f64]>) -> (Option<f64>, Option<f64>) {
    let pair = pair.unwrap_or(&[]);
    (pair.first().copied(), pair.get(1).copied())
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

impl CountryRecord {
    pub fn from_value(raw: &Value) -> Result<Self, serde_json::Error> {
        Self::deserialize(raw)
    }

    /// Non-empty 3-letter code, the record's identity.
    pub fn cca3(&self) -> Option<String> {
        non_empty(&self.cca3)
    }

    pub fn cca2(&self) -> Option<String> {
        non_empty(&self.cca2)
    }

    /// Scalar attributes with the import defaults applied.
    pub fn country_fields(&self, cca3: &str, cca2: &str) -> CountryFields {
        let name = self.name.clone().unwrap_or_default();
        let (latitude, longitude) = lat_lng(self.latlng.as_deref());
        let maps = self.maps.clone().unwrap_or_default();
        let flags = self.flags.clone().unwrap_or_default();
        let coat = self.coat_of_arms.clone().unwrap_or_default();
        let car = self.car.clone().unwrap_or_default();
        let postal = self.postal_code.clone().unwrap_or_default();

        CountryFields {
            common_name: name.common.unwrap_or_default(),
            official_name: name.official.unwrap_or_default(),
            cca2: cca2.to_string(),
            cca3: cca3.to_string(),
            ccn3: non_empty(&self.ccn3),
            cioc: non_empty(&self.cioc),
            independent: self.independent.unwrap_or(true),
            status: non_empty(&self.status),
            un_member: self.un_member.unwrap_or(false),
            region: non_empty(&self.region),
            subregion: non_empty(&self.subregion),
            latitude,
            longitude,
            landlocked: self.landlocked.unwrap_or(false),
            area: self.area,
            population: self.population,
            tlds: self.tld.clone().unwrap_or_default(),
            start_of_week: non_empty(&self.start_of_week).unwrap_or_else(default_start_of_week),
            gini: Value::Object(self.gini.clone().unwrap_or_default()),
            fifa: non_empty(&self.fifa),
            car_signs: car.signs.unwrap_or_default(),
            car_side: non_empty(&car.side),
            timezones: self.timezones.clone().unwrap_or_default(),
            continents: self.continents.clone().unwrap_or_default(),
            google_maps_url: non_empty(&maps.google_maps),
            openstreetmap_url: non_empty(&maps.open_street_maps),
            flag_png_url: non_empty(&flags.png),
            flag_svg_url: non_empty(&flags.svg),
            flag_alt: non_empty(&flags.alt),
            coat_of_arms_png_url: non_empty(&coat.png),
            coat_of_arms_svg_url: non_empty(&coat.svg),
            postal_code_format: non_empty(&postal.format),
            postal_code_regex: non_empty(&postal.regex),
        }
    }

    /// Capitals in source order; only the first one carries `capitalInfo.latlng`.
    pub fn capitals(&self) -> Vec<CapitalCity> {
        let (lat, lng) = lat_lng(
            self.capital_info
                .as_ref()
                .and_then(|info| info.latlng.as_deref()),
        );
        self.capital
            .iter()
            .flatten()
            .enumerate()
            .map(|(i, name)| CapitalCity {
                name: name.clone(),
                latitude: if i == 0 { lat } else { None },
                longitude: if i == 0 { lng } else { None },
            })
            .collect()
    }

    pub fn native_names(&self) -> Vec<LocalizedName> {
        self.name
            .as_ref()
            .and_then(|n| n.native_name.as_ref())
            .map(localized)
            .unwrap_or_default()
    }

    pub fn translations(&self) -> Vec<LocalizedName> {
        self.translations.as_ref().map(localized).unwrap_or_default()
    }

    pub fn alt_spellings(&self) -> Vec<String> {
        self.alt_spellings.clone().unwrap_or_default()
    }

    pub fn demonyms(&self) -> Vec<Demonym> {
        self.demonyms
            .iter()
            .flatten()
            .map(|(lang, d)| Demonym {
                language: lang.clone(),
                male: d.m.clone().unwrap_or_default(),
                female: d.f.clone().unwrap_or_default(),
            })
            .collect()
    }

    /// Absent or empty `idd` means no dialing record; a block with only one
    /// part defaults the other to empty.
    pub fn dialing_code(&self) -> Option<DialingCode> {
        let idd = self.idd.as_ref()?;
        if idd.root.is_none() && idd.suffixes.is_none() {
            return None;
        }
        Some(DialingCode {
            root: idd.root.clone().unwrap_or_default(),
            suffixes: idd.suffixes.clone().unwrap_or_default(),
        })
    }

    pub fn language_pairs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.languages
            .iter()
            .flatten()
            .map(|(code, name)| (code.as_str(), name.as_str()))
    }

    pub fn currency_entries(&self) -> impl Iterator<Item = (&str, &CurrencyBlock)> {
        self.currencies
            .iter()
            .flatten()
            .map(|(code, block)| (code.as_str(), block))
    }

    pub fn language_codes(&self) -> impl Iterator<Item = &str> {
        self.language_pairs().map(|(code, _)| code)
    }

    pub fn currency_codes(&self) -> impl Iterator<Item = &str> {
        self.currency_entries().map(|(code, _)| code)
    }

    pub fn border_codes(&self) -> impl Iterator<Item = &str> {
        self.borders.iter().flatten().map(String::as_str)
    }
}

fn localized(map: &IndexMap<String, NameForms>) -> Vec<LocalizedName> {
    map.iter()
        .map(|(lang, forms)| LocalizedName {
            language_code: lang.clone(),
            official_name: forms.official.clone().unwrap_or_default(),
            common_name: forms.common.clone().unwrap_or_default(),
        })
        .collect()
}
